//! Serializable editor commands.
//!
//! Every inbound [`Editor`] operation has a JSON form so scripts and the
//! CLI can drive the engine without linking against it:
//!
//! ```json
//! [
//!   { "op": "select_rect", "x": 10, "y": 10, "width": 40, "height": 40 },
//!   { "op": "apply_filter", "kind": { "filter": "sepia", "amount": 60 } },
//!   { "op": "rotate", "direction": "cw" }
//! ]
//! ```
//!
//! Layers are addressed by stack index (0 = bottom), id, or name; omitting
//! `layer` targets the active layer.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::canvas::{BlendMode, LayerId};
use crate::editor::{Editor, LayerDirection};
use crate::error::{EngineError, EngineResult};
use crate::interaction::{Modifiers, SelectionKind, Tool};
use crate::ops::filters::FilterKind;
use crate::ops::stroke::{BrushSettings, StrokeMode};
use crate::ops::transform::{FlipAxis, RotateDirection};
use crate::selection::Point;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LayerRef {
    Index(usize),
    Id(LayerId),
    Name(String),
}

impl LayerRef {
    pub fn resolve(&self, editor: &Editor) -> Option<LayerId> {
        let layers = &editor.document().layers;
        match self {
            LayerRef::Index(i) => layers.get(*i).map(|l| l.id),
            LayerRef::Id(id) => layers.iter().find(|l| l.id == *id).map(|l| l.id),
            LayerRef::Name(name) => layers.iter().rev().find(|l| &l.name == name).map(|l| l.id),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EditorCommand {
    // Pointer gestures
    BeginStroke {
        x: f32,
        y: f32,
        #[serde(default = "default_stroke_mode")]
        mode: StrokeMode,
    },
    ContinueStroke { x: f32, y: f32 },
    EndStroke,
    BeginSelection { kind: SelectionKind, x: f32, y: f32 },
    UpdateSelection { x: f32, y: f32 },
    EndSelection,
    BeginTransformDrag { x: f32, y: f32 },
    UpdateTransformDrag {
        x: f32,
        y: f32,
        #[serde(default)]
        shift: bool,
    },
    EndTransformDrag,
    PointerDown { x: f32, y: f32 },
    PointerMove {
        x: f32,
        y: f32,
        #[serde(default)]
        shift: bool,
    },
    PointerUp,
    SetTool { tool: Tool },
    SetBrush { brush: BrushSettings },
    PickColor { x: f32, y: f32 },

    // Selection
    SelectRect { x: f32, y: f32, width: f32, height: f32 },
    SelectPolygon { points: Vec<Point> },
    ClearSelection,

    // Region operations
    ApplyFilter { kind: FilterKind },
    Rotate { direction: RotateDirection },
    Flip { axis: FlipAxis },
    Resize { width: i64, height: i64 },
    CropToSelection,
    Undo,
    Redo,

    // Layers
    AddEmptyLayer {
        #[serde(default)]
        name: Option<String>,
    },
    AddLayerFromImage { path: PathBuf },
    RemoveLayer {
        #[serde(default)]
        layer: Option<LayerRef>,
    },
    ReorderLayer {
        #[serde(default)]
        layer: Option<LayerRef>,
        direction: LayerDirection,
    },
    MoveLayerTo {
        #[serde(default)]
        layer: Option<LayerRef>,
        index: usize,
    },
    ToggleVisibility {
        #[serde(default)]
        layer: Option<LayerRef>,
    },
    SetOpacity {
        #[serde(default)]
        layer: Option<LayerRef>,
        opacity: f32,
    },
    SetBlendMode {
        #[serde(default)]
        layer: Option<LayerRef>,
        mode: BlendMode,
    },
    SetActiveLayer { layer: LayerRef },
    RenameLayer {
        #[serde(default)]
        layer: Option<LayerRef>,
        name: String,
    },

    // Clipboard
    CopySelection,
    NewLayerFromSelection,
    PasteClipboard,
}

fn default_stroke_mode() -> StrokeMode {
    StrokeMode::Paint
}

impl EditorCommand {
    /// Parse a JSON array of commands.
    pub fn parse_script(src: &str) -> EngineResult<Vec<EditorCommand>> {
        serde_json::from_str(src).map_err(|e| EngineError::config(format!("invalid command script: {e}")))
    }

    /// Run against `editor`. Returns whether anything changed; invalid
    /// targets are no-ops.
    pub fn execute(&self, editor: &mut Editor) -> EngineResult<bool> {
        tracing::debug!("Command: {:?}", self);
        use EditorCommand as C;
        let changed = match self {
            C::BeginStroke { x, y, mode } => editor.begin_stroke(Point::new(*x, *y), *mode)?,
            C::ContinueStroke { x, y } => editor.continue_stroke(Point::new(*x, *y)),
            C::EndStroke => editor.end_stroke(),
            C::BeginSelection { kind, x, y } => {
                editor.begin_selection(*kind, Point::new(*x, *y))?;
                true
            }
            C::UpdateSelection { x, y } => editor.update_selection(Point::new(*x, *y)),
            C::EndSelection => editor.end_selection(),
            C::BeginTransformDrag { x, y } => editor.begin_transform_drag(Point::new(*x, *y))?,
            C::UpdateTransformDrag { x, y, shift } => {
                editor.update_transform_drag(Point::new(*x, *y), Modifiers { shift: *shift })
            }
            C::EndTransformDrag => editor.end_transform_drag()?,
            C::PointerDown { x, y } => {
                editor.pointer_down(Point::new(*x, *y))?;
                true
            }
            C::PointerMove { x, y, shift } => {
                editor.pointer_move(Point::new(*x, *y), Modifiers { shift: *shift });
                true
            }
            C::PointerUp => {
                editor.pointer_up()?;
                true
            }
            C::SetTool { tool } => {
                editor.set_tool(*tool)?;
                true
            }
            C::SetBrush { brush } => {
                editor.set_brush(brush.clone());
                true
            }
            C::PickColor { x, y } => editor.pick_color(Point::new(*x, *y)).is_some(),

            C::SelectRect { x, y, width, height } => {
                editor.select_rect(*x, *y, *width, *height)?;
                true
            }
            C::SelectPolygon { points } => {
                editor.select_polygon(points)?;
                true
            }
            C::ClearSelection => {
                editor.clear_selection()?;
                true
            }

            C::ApplyFilter { kind } => editor.apply_filter(kind)?,
            C::Rotate { direction } => editor.rotate(*direction)?,
            C::Flip { axis } => editor.flip(*axis)?,
            C::Resize { width, height } => editor.resize(*width, *height)?,
            C::CropToSelection => editor.crop_to_selection()?,
            C::Undo => editor.undo()?,
            C::Redo => editor.redo()?,

            C::AddEmptyLayer { name } => {
                editor.add_empty_layer(name.as_deref())?;
                true
            }
            C::AddLayerFromImage { path } => {
                editor.add_layer_from_image(path)?;
                true
            }
            C::RemoveLayer { layer } => match target(editor, layer.as_ref()) {
                Some(id) => editor.remove_layer(id),
                None => false,
            },
            C::ReorderLayer { layer, direction } => match target(editor, layer.as_ref()) {
                Some(id) => editor.reorder_layer(id, *direction),
                None => false,
            },
            C::MoveLayerTo { layer, index } => match target(editor, layer.as_ref()) {
                Some(id) => editor.move_layer_to(id, *index),
                None => false,
            },
            C::ToggleVisibility { layer } => match target(editor, layer.as_ref()) {
                Some(id) => editor.toggle_visibility(id),
                None => false,
            },
            C::SetOpacity { layer, opacity } => match target(editor, layer.as_ref()) {
                Some(id) => editor.set_opacity(id, *opacity),
                None => false,
            },
            C::SetBlendMode { layer, mode } => match target(editor, layer.as_ref()) {
                Some(id) => editor.set_blend_mode(id, *mode),
                None => false,
            },
            C::SetActiveLayer { layer } => match layer.resolve(editor) {
                Some(id) => editor.set_active_layer(id)?,
                None => false,
            },
            C::RenameLayer { layer, name } => match target(editor, layer.as_ref()) {
                Some(id) => editor.rename_layer(id, name),
                None => false,
            },

            C::CopySelection => editor.copy_selection()?,
            C::NewLayerFromSelection => editor.new_layer_from_selection()?.is_some(),
            C::PasteClipboard => editor.paste_clipboard()?.is_some(),
        };
        Ok(changed)
    }
}

fn target(editor: &Editor, layer: Option<&LayerRef>) -> Option<LayerId> {
    match layer {
        Some(r) => r.resolve(editor),
        None => editor.active_layer_id(),
    }
}

/// Run a whole script, stopping at the first error.
pub fn run_script(editor: &mut Editor, commands: &[EditorCommand]) -> EngineResult<usize> {
    let mut changed = 0;
    for cmd in commands {
        if cmd.execute(editor)? {
            changed += 1;
        }
    }
    Ok(changed)
}
