// ============================================================================
// EDITOR: the single engine interface
// ============================================================================
//
// Owns the document, the interaction state and the display buffer. Every
// mutating call recomposites the display synchronously before returning.

use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::canvas::{BlendMode, Document, Layer, LayerId, RasterBuffer};
use crate::compositor::{self, Overlays, PreviewTicker};
use crate::config::EditorConfig;
use crate::error::EngineResult;
use crate::history::{HistoryLog, UndoEntry};
use crate::interaction::{InteractionState, LayerMove, Modifiers, SelectionKind, Tool, TransformDrag};
use crate::io::{self, ExportFormat};
use crate::ops::clipboard::{self, ClipboardImage};
use crate::ops::filters::{self, FilterKind};
use crate::ops::stroke::{BrushSettings, StrokeMode, StrokeSession};
use crate::ops::transform::{self, FlipAxis, RotateDirection};
use crate::selection::{Point, SelRect, Selection};

/// Direction for a one-step layer reorder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerDirection {
    Up,
    Down,
}

pub struct Editor {
    doc: Document,
    config: EditorConfig,
    log: HistoryLog,
    tool: Tool,
    brush: BrushSettings,
    state: InteractionState,
    clipboard: Option<ClipboardImage>,
    ticker: PreviewTicker,
    display: RasterBuffer,
}

impl Editor {
    /// A document holding one transparent "Background" layer of the
    /// configured size.
    pub fn new(config: EditorConfig) -> EngineResult<Self> {
        let config = config.sanitized();
        let background = Layer::new("Background", config.document_width, config.document_height)?;
        Self::with_layer(config, background)
    }

    /// A document whose only layer is the image at `path`, bound to it for
    /// save-back.
    pub fn open(config: EditorConfig, path: &Path) -> EngineResult<Self> {
        Self::with_layer(config, io::load_layer(path)?)
    }

    pub fn with_layer(config: EditorConfig, layer: Layer) -> EngineResult<Self> {
        let config = config.sanitized();
        let layer = layer.with_history_capacity(config.undo_capacity);
        let display = RasterBuffer::try_new(layer.width(), layer.height())?;
        let mut doc = Document::new();
        doc.push_layer(layer);

        let mut editor = Self {
            doc,
            log: HistoryLog::new(config.history_log_capacity),
            tool: Tool::default(),
            brush: config.brush.clamped(),
            state: InteractionState::Idle,
            clipboard: None,
            ticker: PreviewTicker::new(Duration::from_millis(config.preview_interval_ms)),
            display,
            config,
        };
        editor.refresh();
        tracing::info!(
            "Editor ready: {}x{} document, undo capacity {}",
            editor.display.width(),
            editor.display.height(),
            editor.config.undo_capacity
        );
        Ok(editor)
    }

    // ------------------------------------------------------------------
    // Outbound
    // ------------------------------------------------------------------

    pub fn display(&self) -> &RasterBuffer {
        &self.display
    }

    pub fn history_log(&self) -> &HistoryLog {
        &self.log
    }

    /// Number of throttled "preview changed" ticks emitted so far.
    pub fn preview_tick(&self) -> u64 {
        self.ticker.ticks()
    }

    pub fn selection_bounds(&self) -> Option<SelRect> {
        self.doc.selection.bounding_box()
    }

    pub fn can_undo(&self) -> bool {
        self.doc.active_layer().is_some_and(|l| l.history.can_undo())
    }

    pub fn can_redo(&self) -> bool {
        self.doc.active_layer().is_some_and(|l| l.history.can_redo())
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn brush(&self) -> &BrushSettings {
        &self.brush
    }

    pub fn interaction(&self) -> &InteractionState {
        &self.state
    }

    pub fn clipboard(&self) -> Option<&ClipboardImage> {
        self.clipboard.as_ref()
    }

    pub fn active_layer_id(&self) -> Option<LayerId> {
        self.doc.active_id()
    }

    /// Layers only, without selection or handle overlays.
    pub fn flatten(&self) -> EngineResult<RasterBuffer> {
        compositor::composite_layers(&self.doc, self.fallback_size())
    }

    /// Encode the flattened document. Unsupported formats fall back to PNG;
    /// the format actually used is returned alongside the bytes.
    pub fn export(&self, format: ExportFormat, quality: Option<u8>) -> EngineResult<(Vec<u8>, ExportFormat)> {
        let flat = self.flatten()?;
        io::encode_with_fallback(&flat, format, quality.unwrap_or(self.config.export_quality))
    }

    pub fn export_to_path(&self, path: &Path, format: Option<ExportFormat>) -> EngineResult<ExportFormat> {
        let flat = self.flatten()?;
        io::export_to_path(&flat, path, format, self.config.export_quality)
    }

    /// Write a file-backed layer back in its original format.
    pub fn save_back<W: Write>(&self, id: LayerId, sink: &mut W) -> EngineResult<bool> {
        match self.doc.layer(id) {
            Some(layer) => io::save_back(layer, sink, self.config.export_quality),
            None => Ok(false),
        }
    }

    // ------------------------------------------------------------------
    // Strokes
    // ------------------------------------------------------------------

    pub fn begin_stroke(&mut self, p: Point, mode: StrokeMode) -> EngineResult<bool> {
        self.settle()?;
        let brush = self.brush.clone();
        let Some(layer) = self.doc.active_layer_mut() else {
            return Ok(false);
        };
        if !layer.visible {
            return Ok(false);
        }
        let session = StrokeSession::begin(layer, mode, &brush, p)?;
        self.state = InteractionState::DrawingStroke(session);
        self.refresh();
        Ok(true)
    }

    pub fn continue_stroke(&mut self, p: Point) -> bool {
        let InteractionState::DrawingStroke(session) = &mut self.state else {
            return false;
        };
        let Some(layer) = self.doc.layer_mut(session.layer_id()) else {
            return false;
        };
        session.extend(layer, p);
        self.refresh();
        true
    }

    /// Finish the live stroke. True when it changed pixels (one undo entry).
    pub fn end_stroke(&mut self) -> bool {
        let session = match std::mem::take(&mut self.state) {
            InteractionState::DrawingStroke(s) => s,
            other => {
                self.state = other;
                return false;
            }
        };
        let mode = session.mode();
        let Some(layer) = self.doc.layer_mut(session.layer_id()) else {
            return false;
        };
        let changed = session.finish(layer);
        if changed {
            self.log.push(mode.label());
        }
        self.refresh();
        changed
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    pub fn begin_selection(&mut self, kind: SelectionKind, p: Point) -> EngineResult<()> {
        self.settle()?;
        match kind {
            SelectionKind::Rect => self.doc.selection.set_rectangle(p.x, p.y, 0.0, 0.0),
            SelectionKind::Polygon => self.doc.selection.begin_polygon(p),
        }
        self.state = InteractionState::DraggingSelection { kind, start: p };
        self.refresh();
        Ok(())
    }

    pub fn update_selection(&mut self, p: Point) -> bool {
        let InteractionState::DraggingSelection { kind, start } = self.state else {
            return false;
        };
        match kind {
            SelectionKind::Rect => {
                let r = SelRect::from_corners(start, p);
                self.doc.selection.set_rectangle(r.x, r.y, r.width, r.height);
            }
            SelectionKind::Polygon => self.doc.selection.extend_polygon(p),
        }
        self.refresh();
        true
    }

    /// Release the selection drag. Returns whether a usable selection
    /// resulted; degenerate rectangles and short polygons are dropped.
    pub fn end_selection(&mut self) -> bool {
        if !matches!(self.state, InteractionState::DraggingSelection { .. }) {
            return false;
        }
        self.state = InteractionState::Idle;
        let valid = self.doc.selection.is_valid();
        if !valid {
            self.doc.selection.clear();
        }
        tracing::debug!("Selection committed: {:?}", self.doc.selection.bounding_box());
        self.refresh();
        valid
    }

    /// Programmatic rectangle selection.
    pub fn select_rect(&mut self, x: f32, y: f32, width: f32, height: f32) -> EngineResult<()> {
        self.settle()?;
        self.doc.selection.set_rectangle(x, y, width, height);
        self.refresh();
        Ok(())
    }

    /// Programmatic polygon selection.
    pub fn select_polygon(&mut self, points: &[Point]) -> EngineResult<()> {
        self.settle()?;
        match points.split_first() {
            Some((first, rest)) => {
                self.doc.selection.begin_polygon(*first);
                for p in rest {
                    self.doc.selection.extend_polygon(*p);
                }
            }
            None => self.doc.selection.clear(),
        }
        self.refresh();
        Ok(())
    }

    pub fn clear_selection(&mut self) -> EngineResult<()> {
        self.settle()?;
        self.doc.selection.clear();
        self.refresh();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Interactive transform
    // ------------------------------------------------------------------

    /// Grab the handle of the active layer under `p`. False on a miss.
    pub fn begin_transform_drag(&mut self, p: Point) -> EngineResult<bool> {
        self.settle()?;
        let Some(layer) = self.doc.active_layer() else {
            return Ok(false);
        };
        let rect = layer.placement();
        let Some(handle) = transform::hit_handle(rect, p, self.config.handle_hit_radius) else {
            return Ok(false);
        };
        tracing::debug!("Grabbed {:?} handle of '{}'", handle, layer.name);
        self.state = InteractionState::DraggingHandle(TransformDrag::new(layer.id, handle, rect, p));
        self.refresh();
        Ok(true)
    }

    pub fn update_transform_drag(&mut self, p: Point, mods: Modifiers) -> bool {
        let InteractionState::DraggingHandle(drag) = &mut self.state else {
            return false;
        };
        drag.update(p, mods);
        self.refresh();
        true
    }

    /// Resample the layer into the dragged rectangle. `Ok(false)` when the
    /// rectangle did not change.
    pub fn end_transform_drag(&mut self) -> EngineResult<bool> {
        let drag = match std::mem::take(&mut self.state) {
            InteractionState::DraggingHandle(d) => d,
            other => {
                self.state = other;
                return Ok(false);
            }
        };
        let Some(layer) = self.doc.layer_mut(drag.layer) else {
            return Ok(false);
        };
        let result = transform::commit_rect(layer, drag.preview);
        if let Ok(true) = result {
            self.log.push("Transform");
        }
        self.refresh();
        result
    }

    // ------------------------------------------------------------------
    // Move tool
    // ------------------------------------------------------------------

    pub fn begin_move(&mut self, p: Point) -> EngineResult<bool> {
        self.settle()?;
        let Some(layer) = self.doc.active_layer() else {
            return Ok(false);
        };
        let snapshot = UndoEntry::layer(layer)?;
        self.state = InteractionState::MovingLayer(LayerMove {
            layer: layer.id,
            start_point: p,
            start_x: layer.x,
            start_y: layer.y,
            snapshot,
        });
        Ok(true)
    }

    pub fn update_move(&mut self, p: Point) -> bool {
        let InteractionState::MovingLayer(mv) = &self.state else {
            return false;
        };
        let (x, y) = mv.offset_at(p);
        let Some(layer) = self.doc.layer_mut(mv.layer) else {
            return false;
        };
        layer.x = x;
        layer.y = y;
        self.refresh();
        true
    }

    pub fn end_move(&mut self) -> bool {
        let mv = match std::mem::take(&mut self.state) {
            InteractionState::MovingLayer(m) => m,
            other => {
                self.state = other;
                return false;
            }
        };
        let Some(layer) = self.doc.layer_mut(mv.layer) else {
            return false;
        };
        if (layer.x, layer.y) == (mv.start_x, mv.start_y) {
            return false;
        }
        layer.record(mv.snapshot);
        self.log.push("Move Layer");
        self.refresh();
        true
    }

    // ------------------------------------------------------------------
    // Pointer routing
    // ------------------------------------------------------------------

    pub fn set_tool(&mut self, tool: Tool) -> EngineResult<()> {
        self.settle()?;
        if self.tool != tool {
            tracing::debug!("Tool: {} -> {}", self.tool.name(), tool.name());
            self.tool = tool;
            self.refresh();
        }
        Ok(())
    }

    pub fn set_brush(&mut self, brush: BrushSettings) {
        self.brush = brush.clamped();
    }

    pub fn pointer_down(&mut self, p: Point) -> EngineResult<()> {
        if let Some(mode) = self.tool.stroke_mode() {
            return self.begin_stroke(p, mode).map(drop);
        }
        match self.tool {
            Tool::Brush | Tool::Eraser => Ok(()),
            Tool::Select => self.begin_selection(SelectionKind::Rect, p),
            Tool::Lasso => self.begin_selection(SelectionKind::Polygon, p),
            Tool::Transform => self.begin_transform_drag(p).map(drop),
            Tool::Move => self.begin_move(p).map(drop),
            Tool::Eyedropper => {
                self.pick_color(p);
                Ok(())
            }
        }
    }

    pub fn pointer_move(&mut self, p: Point, mods: Modifiers) {
        match self.state {
            InteractionState::Idle => {}
            InteractionState::DrawingStroke(_) => {
                self.continue_stroke(p);
            }
            InteractionState::DraggingSelection { .. } => {
                self.update_selection(p);
            }
            InteractionState::DraggingHandle(_) => {
                self.update_transform_drag(p, mods);
            }
            InteractionState::MovingLayer(_) => {
                self.update_move(p);
            }
        }
    }

    pub fn pointer_up(&mut self) -> EngineResult<()> {
        self.settle()
    }

    /// Sample the composited colour under `p` into the brush. Fully
    /// transparent pixels leave the brush untouched.
    pub fn pick_color(&mut self, p: Point) -> Option<[u8; 3]> {
        let px = compositor::sample(&self.doc, p.x, p.y);
        if px[3] == 0 {
            return None;
        }
        let color = [px[0], px[1], px[2]];
        self.brush.color = color;
        Some(color)
    }

    /// End whatever gesture is live exactly as a pointer release would.
    fn settle(&mut self) -> EngineResult<()> {
        match self.state {
            InteractionState::Idle => {}
            InteractionState::DrawingStroke(_) => {
                self.end_stroke();
            }
            InteractionState::DraggingSelection { .. } => {
                self.end_selection();
            }
            InteractionState::DraggingHandle(_) => {
                self.end_transform_drag()?;
            }
            InteractionState::MovingLayer(_) => {
                self.end_move();
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Region operations
    // ------------------------------------------------------------------

    pub fn apply_filter(&mut self, kind: &FilterKind) -> EngineResult<bool> {
        self.settle()?;
        let Some((layer, selection)) = self.doc.active_with_selection() else {
            return Ok(false);
        };
        let applied = filters::apply_filter(layer, selection, kind)?;
        if applied {
            self.log.push(kind.label());
            self.refresh();
        }
        Ok(applied)
    }

    pub fn rotate(&mut self, dir: RotateDirection) -> EngineResult<bool> {
        self.settle()?;
        let Some(layer) = self.doc.active_layer_mut() else {
            return Ok(false);
        };
        let done = transform::rotate90(layer, dir)?;
        self.after_layer_op(done, dir.label());
        Ok(done)
    }

    pub fn flip(&mut self, axis: FlipAxis) -> EngineResult<bool> {
        self.settle()?;
        let Some(layer) = self.doc.active_layer_mut() else {
            return Ok(false);
        };
        let done = transform::flip(layer, axis)?;
        self.after_layer_op(done, axis.label());
        Ok(done)
    }

    pub fn resize(&mut self, width: i64, height: i64) -> EngineResult<bool> {
        self.settle()?;
        let Some(layer) = self.doc.active_layer_mut() else {
            return Ok(false);
        };
        let done = transform::resize(layer, width, height)?;
        self.after_layer_op(done, "Resize");
        Ok(done)
    }

    /// Crop the active layer to the selection's bounding box. The selection
    /// is dropped afterwards even when nothing was cropped.
    pub fn crop_to_selection(&mut self) -> EngineResult<bool> {
        self.settle()?;
        let done = match self.doc.active_with_selection() {
            Some((layer, selection)) => transform::crop_to_selection(layer, selection)?,
            None => false,
        };
        let had_selection = self.doc.selection != Selection::None;
        self.doc.selection.clear();
        if done {
            self.log.push("Crop");
        }
        if done || had_selection {
            self.refresh();
        }
        Ok(done)
    }

    pub fn undo(&mut self) -> EngineResult<bool> {
        self.settle()?;
        let Some(layer) = self.doc.active_layer_mut() else {
            return Ok(false);
        };
        let done = layer.undo()?;
        self.after_layer_op(done, "Undo");
        Ok(done)
    }

    pub fn redo(&mut self) -> EngineResult<bool> {
        self.settle()?;
        let Some(layer) = self.doc.active_layer_mut() else {
            return Ok(false);
        };
        let done = layer.redo()?;
        self.after_layer_op(done, "Redo");
        Ok(done)
    }

    fn after_layer_op(&mut self, done: bool, label: &str) {
        if done {
            self.log.push(label);
            self.refresh();
        }
    }

    // ------------------------------------------------------------------
    // Layer management
    // ------------------------------------------------------------------

    fn adopt(&mut self, layer: Layer, label: &str) -> LayerId {
        let layer = layer.with_history_capacity(self.config.undo_capacity);
        tracing::debug!("{}: '{}' ({}x{})", label, layer.name, layer.width(), layer.height());
        let id = self.doc.push_layer(layer);
        self.log.push(label);
        self.refresh();
        id
    }

    /// New transparent layer of the configured document size, on top and
    /// active. Unnamed layers are numbered.
    pub fn add_empty_layer(&mut self, name: Option<&str>) -> EngineResult<LayerId> {
        let name = match name {
            Some(n) => n.to_string(),
            None => format!("Layer {}", self.doc.layers.len() + 1),
        };
        let layer = Layer::new(name, self.config.document_width, self.config.document_height)?;
        Ok(self.adopt(layer, "Add Layer"))
    }

    /// Decode a file into a new layer bound to it for save-back.
    pub fn add_layer_from_image(&mut self, path: &Path) -> EngineResult<LayerId> {
        let layer = io::load_layer(path)?;
        Ok(self.adopt(layer, "Open Image"))
    }

    /// Decode in-memory bytes into a new, unbound layer.
    pub fn add_layer_from_bytes(&mut self, name: &str, bytes: &[u8]) -> EngineResult<LayerId> {
        let (pixels, _) = io::decode_image(bytes)?;
        Ok(self.adopt(Layer::from_buffer(name, pixels), "Open Image"))
    }

    pub fn add_layer_from_buffer(&mut self, name: &str, pixels: RasterBuffer) -> LayerId {
        self.adopt(Layer::from_buffer(name, pixels), "Add Layer")
    }

    /// The last layer can never be removed.
    pub fn remove_layer(&mut self, id: LayerId) -> bool {
        let Some(removed) = self.doc.remove_layer(id) else {
            return false;
        };
        tracing::debug!("Removed layer '{}'", removed.name);
        self.log.push("Delete Layer");
        self.refresh();
        true
    }

    /// Swap the layer with its neighbour above or below.
    pub fn reorder_layer(&mut self, id: LayerId, dir: LayerDirection) -> bool {
        let Some(idx) = self.doc.index_of(id) else {
            return false;
        };
        let target = match dir {
            LayerDirection::Up => idx + 1,
            LayerDirection::Down => match idx.checked_sub(1) {
                Some(t) => t,
                None => return false,
            },
        };
        self.move_layer_to(id, target)
    }

    /// Move the layer to bottom-based stack position `index`.
    pub fn move_layer_to(&mut self, id: LayerId, index: usize) -> bool {
        let Some(idx) = self.doc.index_of(id) else {
            return false;
        };
        if !self.doc.reorder(idx, index) {
            return false;
        }
        self.log.push("Reorder Layers");
        self.refresh();
        true
    }

    pub fn toggle_visibility(&mut self, id: LayerId) -> bool {
        let Some(layer) = self.doc.layer_mut(id) else {
            return false;
        };
        layer.visible = !layer.visible;
        self.log.push("Toggle Visibility");
        self.refresh();
        true
    }

    pub fn set_opacity(&mut self, id: LayerId, opacity: f32) -> bool {
        let Some(layer) = self.doc.layer_mut(id) else {
            return false;
        };
        layer.set_opacity(opacity);
        self.log.push("Layer Opacity");
        self.refresh();
        true
    }

    pub fn set_blend_mode(&mut self, id: LayerId, mode: BlendMode) -> bool {
        let Some(layer) = self.doc.layer_mut(id) else {
            return false;
        };
        layer.blend_mode = mode;
        self.log.push("Blend Mode");
        self.refresh();
        true
    }

    pub fn set_active_layer(&mut self, id: LayerId) -> EngineResult<bool> {
        self.settle()?;
        let changed = self.doc.set_active(id);
        if changed {
            self.refresh();
        }
        Ok(changed)
    }

    pub fn rename_layer(&mut self, id: LayerId, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() {
            return false;
        }
        let Some(layer) = self.doc.layer_mut(id) else {
            return false;
        };
        layer.name = name.to_string();
        self.log.push("Rename Layer");
        true
    }

    // ------------------------------------------------------------------
    // Clipboard
    // ------------------------------------------------------------------

    /// Copy the selected pixels of the active layer. False without a usable
    /// selection over the layer.
    pub fn copy_selection(&mut self) -> EngineResult<bool> {
        self.settle()?;
        let Some(layer) = self.doc.active_layer() else {
            return Ok(false);
        };
        let Some(clip) = clipboard::copy_selection(layer, &self.doc.selection)? else {
            return Ok(false);
        };
        tracing::debug!("Copied {}x{} at ({}, {})", clip.pixels.width(), clip.pixels.height(), clip.x, clip.y);
        self.clipboard = Some(clip);
        self.log.push("Copy");
        Ok(true)
    }

    /// Copy the selection into a new "Selection" layer and drop the
    /// selection.
    pub fn new_layer_from_selection(&mut self) -> EngineResult<Option<LayerId>> {
        self.settle()?;
        let Some(layer) = self.doc.active_layer() else {
            return Ok(None);
        };
        let Some(clip) = clipboard::copy_selection(layer, &self.doc.selection)? else {
            return Ok(None);
        };
        let layer = clip.to_layer("Selection")?;
        self.doc.selection.clear();
        Ok(Some(self.adopt(layer, "New Layer From Selection")))
    }

    pub fn paste_clipboard(&mut self) -> EngineResult<Option<LayerId>> {
        self.settle()?;
        let Some(clip) = &self.clipboard else {
            return Ok(None);
        };
        let layer = clip.to_layer("Pasted")?;
        Ok(Some(self.adopt(layer, "Paste")))
    }

    // ------------------------------------------------------------------
    // Display
    // ------------------------------------------------------------------

    fn fallback_size(&self) -> (u32, u32) {
        (self.config.document_width, self.config.document_height)
    }

    /// Recomposite the display. On failure the previous display is kept.
    fn refresh(&mut self) {
        let transform = match &self.state {
            InteractionState::DraggingHandle(drag) => Some(drag.preview),
            _ if self.tool == Tool::Transform => self.doc.active_layer().map(|l| l.placement()),
            _ => None,
        };
        let selection = match self.doc.selection {
            Selection::None => None,
            ref sel => Some(sel),
        };
        let overlays = Overlays { selection, transform };
        match compositor::composite(&self.doc, &overlays, self.fallback_size()) {
            Ok(out) => {
                self.display = out;
                self.ticker.observe(Instant::now());
            }
            Err(e) => tracing::warn!("Composite failed, keeping previous display: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn small() -> Editor {
        Editor::new(EditorConfig {
            document_width: 32,
            document_height: 32,
            ..EditorConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn starts_with_one_active_background_layer() {
        let ed = small();
        assert_eq!(ed.document().layers.len(), 1);
        assert_eq!(ed.document().layers[0].name, "Background");
        assert_eq!(ed.active_layer_id(), Some(ed.document().layers[0].id));
        assert_eq!(ed.display().dimensions(), (32, 32));
        assert!(!ed.can_undo());
    }

    #[test]
    fn pointer_routing_follows_tool() {
        let mut ed = small();
        ed.pointer_down(Point::new(4.0, 4.0)).unwrap();
        assert_eq!(ed.interaction().name(), "drawing-stroke");
        ed.pointer_move(Point::new(20.0, 4.0), Modifiers::NONE);
        ed.pointer_up().unwrap();
        assert!(ed.interaction().is_idle());
        assert_eq!(ed.history_log().latest().unwrap().label, "Brush Stroke");
        assert!(ed.can_undo());

        ed.set_tool(Tool::Select).unwrap();
        ed.pointer_down(Point::new(2.0, 2.0)).unwrap();
        ed.pointer_move(Point::new(10.0, 12.0), Modifiers::NONE);
        ed.pointer_up().unwrap();
        assert_eq!(ed.selection_bounds(), Some(SelRect::new(2.0, 2.0, 8.0, 10.0)));
    }

    #[test]
    fn eraser_tool_starts_an_erase_stroke() {
        let mut ed = small();
        ed.pointer_down(Point::new(4.0, 4.0)).unwrap();
        ed.pointer_up().unwrap();
        assert_eq!(ed.flatten().unwrap().pixel(4, 4).unwrap()[3], 255);

        ed.set_tool(Tool::Eraser).unwrap();
        ed.pointer_down(Point::new(4.0, 4.0)).unwrap();
        assert_eq!(ed.interaction().name(), "drawing-stroke");
        ed.pointer_up().unwrap();
        assert_eq!(ed.history_log().latest().unwrap().label, "Eraser Stroke");
        assert_eq!(ed.flatten().unwrap().pixel(4, 4).unwrap()[3], 0);
    }

    #[test]
    fn switching_tools_ends_the_stroke() {
        let mut ed = small();
        ed.begin_stroke(Point::new(5.0, 5.0), StrokeMode::Paint).unwrap();
        ed.set_tool(Tool::Move).unwrap();
        assert!(ed.interaction().is_idle());
        assert!(ed.can_undo());
    }

    #[test]
    fn move_tool_is_one_undo_step() {
        let mut ed = small();
        ed.set_tool(Tool::Move).unwrap();
        ed.pointer_down(Point::new(0.0, 0.0)).unwrap();
        ed.pointer_move(Point::new(3.0, 1.0), Modifiers::NONE);
        ed.pointer_move(Point::new(6.0, 2.0), Modifiers::NONE);
        ed.pointer_up().unwrap();
        let layer = ed.document().active_layer().unwrap();
        assert_eq!((layer.x, layer.y), (6, 2));
        assert!(ed.undo().unwrap());
        let layer = ed.document().active_layer().unwrap();
        assert_eq!((layer.x, layer.y), (0, 0));
    }

    #[test]
    fn transform_drag_resamples_on_release() {
        let mut ed = small();
        ed.set_tool(Tool::Transform).unwrap();
        ed.pointer_down(Point::new(32.0, 32.0)).unwrap();
        assert_eq!(ed.interaction().name(), "dragging-handle");
        ed.pointer_move(Point::new(16.0, 24.0), Modifiers::NONE);
        ed.pointer_up().unwrap();
        assert_eq!(ed.document().active_layer().unwrap().pixels.dimensions(), (16, 24));
        assert_eq!(ed.history_log().latest().unwrap().label, "Transform");
    }

    #[test]
    fn transform_miss_stays_idle() {
        let mut ed = small();
        ed.set_tool(Tool::Transform).unwrap();
        ed.pointer_down(Point::new(16.0, 16.0)).unwrap();
        assert!(ed.interaction().is_idle());
    }

    #[test]
    fn eyedropper_takes_composited_colour() {
        let mut ed = small();
        let red = RasterBuffer::try_filled(4, 4, Rgba([200, 10, 10, 255])).unwrap();
        ed.add_layer_from_buffer("red", red);
        ed.set_tool(Tool::Eyedropper).unwrap();
        ed.pointer_down(Point::new(1.0, 1.0)).unwrap();
        assert_eq!(ed.brush().color, [200, 10, 10]);
        assert_eq!(ed.pick_color(Point::new(20.0, 20.0)), None);
    }

    #[test]
    fn crop_clears_selection() {
        let mut ed = small();
        ed.select_rect(4.0, 4.0, 8.0, 6.0).unwrap();
        assert!(ed.crop_to_selection().unwrap());
        let layer = ed.document().active_layer().unwrap();
        assert_eq!(layer.pixels.dimensions(), (8, 6));
        assert_eq!((layer.x, layer.y), (4, 4));
        assert_eq!(ed.selection_bounds(), None);
    }

    #[test]
    fn clipboard_round_trip_creates_layers() {
        let mut ed = small();
        ed.select_rect(2.0, 3.0, 5.0, 5.0).unwrap();
        assert!(ed.copy_selection().unwrap());
        let pasted = ed.paste_clipboard().unwrap().unwrap();
        let layer = ed.document().layer(pasted).unwrap();
        assert_eq!(layer.name, "Pasted");
        assert_eq!((layer.x, layer.y), (2, 3));

        let sel = ed.new_layer_from_selection().unwrap().unwrap();
        assert_eq!(ed.document().layer(sel).unwrap().name, "Selection");
        assert_eq!(ed.active_layer_id(), Some(sel));
        assert_eq!(ed.selection_bounds(), None);
        assert_eq!(ed.new_layer_from_selection().unwrap(), None);
    }

    #[test]
    fn layer_management() {
        let mut ed = small();
        let bg = ed.document().layers[0].id;
        let top = ed.add_empty_layer(None).unwrap();
        assert_eq!(ed.document().layer(top).unwrap().name, "Layer 2");
        assert!(ed.reorder_layer(top, LayerDirection::Down));
        assert_eq!(ed.document().layers[0].id, top);
        assert!(!ed.reorder_layer(top, LayerDirection::Down));
        assert!(ed.rename_layer(bg, "Base"));
        assert!(!ed.rename_layer(bg, "   "));
        assert!(ed.set_opacity(bg, 3.0));
        assert_eq!(ed.document().layer(bg).unwrap().opacity(), 1.0);
        assert!(ed.remove_layer(bg));
        assert!(!ed.remove_layer(top));
        assert_eq!(ed.active_layer_id(), Some(top));
    }

    #[test]
    fn mutations_emit_preview_ticks() {
        let ed = small();
        assert_eq!(ed.preview_tick(), 1);
    }
}
