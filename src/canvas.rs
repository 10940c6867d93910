use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::history::LayerHistory;
use crate::selection::Selection;

/// Largest accepted buffer edge, in pixels.
pub const MAX_DIMENSION: u32 = 32_768;
/// Largest accepted buffer area, in pixels.
pub const MAX_PIXELS: u64 = 256 * 1024 * 1024;

// ============================================================================
// RASTER BUFFER
// ============================================================================

/// Integer rectangle in buffer space. Always lies inside the buffer it was
/// computed for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn full(width: u32, height: u32) -> Self {
        Self { x: 0, y: 0, width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Owned RGBA8 pixel grid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RasterBuffer {
    image: RgbaImage,
}

impl RasterBuffer {
    /// Allocate a fully transparent buffer, failing instead of aborting when
    /// the size is unreasonable or the allocator refuses.
    pub fn try_new(width: u32, height: u32) -> EngineResult<Self> {
        let len = Self::checked_len(width, height)?;
        let mut data: Vec<u8> = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|_| EngineError::Allocation { width, height })?;
        data.resize(len, 0);
        let image = RgbaImage::from_raw(width, height, data)
            .ok_or(EngineError::Allocation { width, height })?;
        Ok(Self { image })
    }

    pub fn try_filled(width: u32, height: u32, color: Rgba<u8>) -> EngineResult<Self> {
        let mut buf = Self::try_new(width, height)?;
        for px in buf.image.pixels_mut() {
            *px = color;
        }
        Ok(buf)
    }

    /// Validate a target size without allocating it.
    pub fn check_dimensions(width: u32, height: u32) -> EngineResult<()> {
        Self::checked_len(width, height).map(|_| ())
    }

    fn checked_len(width: u32, height: u32) -> EngineResult<usize> {
        let err = EngineError::Allocation { width, height };
        if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(err);
        }
        let pixels = width as u64 * height as u64;
        if pixels > MAX_PIXELS {
            return Err(err);
        }
        usize::try_from(pixels)
            .ok()
            .and_then(|p| p.checked_mul(4))
            .ok_or(err)
    }

    pub fn from_image(image: RgbaImage) -> Self {
        Self { image }
    }

    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        RgbaImage::from_raw(width, height, data).map(|image| Self { image })
    }

    pub fn try_clone(&self) -> EngineResult<Self> {
        let (width, height) = self.dimensions();
        let src = self.image.as_raw();
        let mut data: Vec<u8> = Vec::new();
        data.try_reserve_exact(src.len())
            .map_err(|_| EngineError::Allocation { width, height })?;
        data.extend_from_slice(src);
        Self::from_raw(width, height, data).ok_or(EngineError::Allocation { width, height })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut RgbaImage {
        &mut self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn as_raw_mut(&mut self) -> &mut [u8] {
        &mut self.image
    }

    /// Pixel at (x, y), or `None` outside the buffer.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba<u8>> {
        (x < self.width() && y < self.height()).then(|| *self.image.get_pixel(x, y))
    }

    /// Write one pixel; out-of-bounds writes are ignored.
    pub fn set_pixel(&mut self, x: u32, y: u32, color: Rgba<u8>) {
        if x < self.width() && y < self.height() {
            self.image.put_pixel(x, y, color);
        }
    }

    /// Copy of a sub-rectangle, clamped to the buffer.
    pub fn region(&self, region: Region) -> EngineResult<RasterBuffer> {
        let r = self.clamp_region(region);
        let mut out = RasterBuffer::try_new(r.width.max(1), r.height.max(1))?;
        if r.is_empty() {
            return Ok(out);
        }
        let row_bytes = r.width as usize * 4;
        let src_stride = self.width() as usize * 4;
        let src = self.image.as_raw();
        for (row, dst) in out.as_raw_mut().chunks_exact_mut(row_bytes).enumerate() {
            let start = (r.y as usize + row) * src_stride + r.x as usize * 4;
            dst.copy_from_slice(&src[start..start + row_bytes]);
        }
        Ok(out)
    }

    /// Overwrite pixels with `src` placed at (dx, dy). Parts of `src` falling
    /// outside this buffer are dropped. No blending.
    pub fn blit(&mut self, src: &RasterBuffer, dx: i64, dy: i64) {
        let (dw, dh) = (self.width() as i64, self.height() as i64);
        let (sw, sh) = (src.width() as i64, src.height() as i64);
        let x0 = dx.max(0);
        let y0 = dy.max(0);
        let x1 = (dx + sw).min(dw);
        let y1 = (dy + sh).min(dh);
        if x0 >= x1 || y0 >= y1 {
            return;
        }
        let span = ((x1 - x0) * 4) as usize;
        let dst_stride = dw as usize * 4;
        let src_stride = sw as usize * 4;
        let src_raw = src.as_raw();
        let dst_raw: &mut [u8] = &mut self.image;
        for y in y0..y1 {
            let s = (y - dy) as usize * src_stride + (x0 - dx) as usize * 4;
            let d = y as usize * dst_stride + x0 as usize * 4;
            dst_raw[d..d + span].copy_from_slice(&src_raw[s..s + span]);
        }
    }

    pub fn clamp_region(&self, r: Region) -> Region {
        let x = r.x.min(self.width());
        let y = r.y.min(self.height());
        let width = r.width.min(self.width() - x);
        let height = r.height.min(self.height() - y);
        Region { x, y, width, height }
    }

    pub fn flip_horizontal(&mut self) {
        image::imageops::flip_horizontal_in_place(&mut self.image);
    }

    pub fn flip_vertical(&mut self) {
        image::imageops::flip_vertical_in_place(&mut self.image);
    }

    /// Quarter turn clockwise into a freshly allocated buffer.
    pub fn rotated_cw(&self) -> EngineResult<RasterBuffer> {
        let (w, h) = self.dimensions();
        let mut out = RasterBuffer::try_new(h, w)?;
        for (x, y, px) in self.image.enumerate_pixels() {
            out.image.put_pixel(h - 1 - y, x, *px);
        }
        Ok(out)
    }

    pub fn rotated_ccw(&self) -> EngineResult<RasterBuffer> {
        let (w, h) = self.dimensions();
        let mut out = RasterBuffer::try_new(h, w)?;
        for (x, y, px) in self.image.enumerate_pixels() {
            out.image.put_pixel(y, w - 1 - x, *px);
        }
        Ok(out)
    }

    pub fn rotated_180(&self) -> EngineResult<RasterBuffer> {
        let mut out = self.try_clone()?;
        image::imageops::rotate180_in_place(&mut out.image);
        Ok(out)
    }
}

// ============================================================================
// BLEND MODES
// ============================================================================

/// Per-layer compositing operator. Names follow the canvas
/// `globalCompositeOperation` values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlendMode {
    #[default]
    Normal,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    ColorDodge,
    ColorBurn,
    HardLight,
    SoftLight,
    Difference,
    Exclusion,
}

impl BlendMode {
    pub fn all() -> &'static [BlendMode] {
        &[
            BlendMode::Normal,
            BlendMode::Multiply,
            BlendMode::Screen,
            BlendMode::Overlay,
            BlendMode::Darken,
            BlendMode::Lighten,
            BlendMode::ColorDodge,
            BlendMode::ColorBurn,
            BlendMode::HardLight,
            BlendMode::SoftLight,
            BlendMode::Difference,
            BlendMode::Exclusion,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            BlendMode::Normal => "normal",
            BlendMode::Multiply => "multiply",
            BlendMode::Screen => "screen",
            BlendMode::Overlay => "overlay",
            BlendMode::Darken => "darken",
            BlendMode::Lighten => "lighten",
            BlendMode::ColorDodge => "color-dodge",
            BlendMode::ColorBurn => "color-burn",
            BlendMode::HardLight => "hard-light",
            BlendMode::SoftLight => "soft-light",
            BlendMode::Difference => "difference",
            BlendMode::Exclusion => "exclusion",
        }
    }

    /// Parse a mode name; "source-over" is accepted as an alias of normal.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        if name == "source-over" {
            return Some(BlendMode::Normal);
        }
        Self::all().iter().copied().find(|m| m.name() == name)
    }

    /// Composite `top` over `base` with this operator. `opacity` scales the
    /// top alpha; the result alpha is always source-over.
    pub fn blend_pixel(self, base: Rgba<u8>, top: Rgba<u8>, opacity: f32) -> Rgba<u8> {
        if top[3] == 0 || opacity <= 0.0 {
            return base;
        }
        if self == BlendMode::Normal && opacity >= 1.0 && top[3] == 255 {
            return top;
        }

        let opacity = opacity.clamp(0.0, 1.0);
        let base_a = base[3] as f32 / 255.0;
        let top_a = (top[3] as f32 / 255.0) * opacity;

        let out_a = top_a + base_a * (1.0 - top_a);
        if out_a <= 0.0 {
            return Rgba([0, 0, 0, 0]);
        }

        let mut out = [0u8; 4];
        for c in 0..3 {
            let cb = base[c] as f32 / 255.0;
            let cs = top[c] as f32 / 255.0;
            // Where the backdrop is transparent the source colour shows unmixed.
            let mixed = (1.0 - base_a) * cs + base_a * self.channel(cb, cs);
            let v = (mixed * top_a + cb * base_a * (1.0 - top_a)) / out_a;
            out[c] = (v * 255.0).round().clamp(0.0, 255.0) as u8;
        }
        out[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
        Rgba(out)
    }

    fn channel(self, cb: f32, cs: f32) -> f32 {
        match self {
            BlendMode::Normal => cs,
            BlendMode::Multiply => cb * cs,
            BlendMode::Screen => cb + cs - cb * cs,
            BlendMode::Overlay => hard_light_channel(cs, cb),
            BlendMode::Darken => cb.min(cs),
            BlendMode::Lighten => cb.max(cs),
            BlendMode::ColorDodge => color_dodge_channel(cb, cs),
            BlendMode::ColorBurn => color_burn_channel(cb, cs),
            BlendMode::HardLight => hard_light_channel(cb, cs),
            BlendMode::SoftLight => soft_light_channel(cb, cs),
            BlendMode::Difference => (cb - cs).abs(),
            BlendMode::Exclusion => cb + cs - 2.0 * cb * cs,
        }
    }
}

impl std::fmt::Display for BlendMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for BlendMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BlendMode::from_name(s).ok_or_else(|| EngineError::config(format!("unknown blend mode '{s}'")))
    }
}

fn hard_light_channel(cb: f32, cs: f32) -> f32 {
    if cs <= 0.5 {
        cb * 2.0 * cs
    } else {
        let s = 2.0 * cs - 1.0;
        cb + s - cb * s
    }
}

fn color_dodge_channel(cb: f32, cs: f32) -> f32 {
    if cb <= 0.0 {
        0.0
    } else if cs >= 1.0 {
        1.0
    } else {
        (cb / (1.0 - cs)).min(1.0)
    }
}

fn color_burn_channel(cb: f32, cs: f32) -> f32 {
    if cb >= 1.0 {
        1.0
    } else if cs <= 0.0 {
        0.0
    } else {
        1.0 - ((1.0 - cb) / cs).min(1.0)
    }
}

fn soft_light_channel(cb: f32, cs: f32) -> f32 {
    if cs <= 0.5 {
        cb - (1.0 - 2.0 * cs) * cb * (1.0 - cb)
    } else {
        let d = if cb <= 0.25 {
            ((16.0 * cb - 12.0) * cb + 4.0) * cb
        } else {
            cb.sqrt()
        };
        cb + (2.0 * cs - 1.0) * (d - cb)
    }
}

// ============================================================================
// LAYER
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(pub Uuid);

impl LayerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for LayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Where a layer's pixels came from, kept only so the layer can be written
/// back in its original format.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceBinding {
    pub handle: PathBuf,
    pub mime: String,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

pub struct Layer {
    pub id: LayerId,
    pub name: String,
    pub visible: bool,
    opacity: f32,
    pub blend_mode: BlendMode,
    pub pixels: RasterBuffer,
    /// Placement of the buffer's top-left corner in document space.
    pub x: i32,
    pub y: i32,
    pub source: Option<SourceBinding>,
    pub history: LayerHistory,
}

impl Layer {
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> EngineResult<Self> {
        Ok(Self::from_buffer(name, RasterBuffer::try_new(width, height)?))
    }

    pub fn from_buffer(name: impl Into<String>, pixels: RasterBuffer) -> Self {
        Self {
            id: LayerId::new(),
            name: name.into(),
            visible: true,
            opacity: 1.0,
            blend_mode: BlendMode::Normal,
            pixels,
            x: 0,
            y: 0,
            source: None,
            history: LayerHistory::default(),
        }
    }

    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history = LayerHistory::new(capacity);
        self
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn set_opacity(&mut self, opacity: f32) {
        self.opacity = if opacity.is_nan() { 1.0 } else { opacity.clamp(0.0, 1.0) };
    }

    pub fn placement(&self) -> Placement {
        Placement {
            x: self.x as f32,
            y: self.y as f32,
            width: self.width() as f32,
            height: self.height() as f32,
        }
    }

    /// Document point to buffer coordinates, if it falls on the layer.
    pub fn doc_to_local(&self, x: f32, y: f32) -> Option<(u32, u32)> {
        let lx = (x - self.x as f32).floor();
        let ly = (y - self.y as f32).floor();
        if lx < 0.0 || ly < 0.0 || lx >= self.width() as f32 || ly >= self.height() as f32 {
            return None;
        }
        Some((lx as u32, ly as u32))
    }
}

impl std::fmt::Debug for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Layer")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("size", &self.pixels.dimensions())
            .field("offset", &(self.x, self.y))
            .field("visible", &self.visible)
            .field("opacity", &self.opacity)
            .field("blend_mode", &self.blend_mode)
            .finish()
    }
}

// ============================================================================
// DOCUMENT
// ============================================================================

/// Ordered layer stack (index 0 is the bottom), the active layer and the
/// document-wide selection.
#[derive(Debug, Default)]
pub struct Document {
    pub layers: Vec<Layer>,
    active: Option<LayerId>,
    pub selection: Selection,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_id(&self) -> Option<LayerId> {
        self.active
    }

    pub fn index_of(&self, id: LayerId) -> Option<usize> {
        self.layers.iter().position(|l| l.id == id)
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn layer_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.id == id)
    }

    pub fn active_layer(&self) -> Option<&Layer> {
        self.active.and_then(|id| self.layer(id))
    }

    pub fn active_layer_mut(&mut self) -> Option<&mut Layer> {
        let id = self.active?;
        self.layer_mut(id)
    }

    /// The active layer together with the selection, borrowed separately so
    /// region operations can mutate one while reading the other.
    pub fn active_with_selection(&mut self) -> Option<(&mut Layer, &Selection)> {
        let id = self.active?;
        let layer = self.layers.iter_mut().find(|l| l.id == id)?;
        Some((layer, &self.selection))
    }

    pub fn set_active(&mut self, id: LayerId) -> bool {
        if self.index_of(id).is_some() {
            self.active = Some(id);
            true
        } else {
            false
        }
    }

    /// Push a layer on top of the stack and make it active.
    pub fn push_layer(&mut self, layer: Layer) -> LayerId {
        let id = layer.id;
        self.layers.push(layer);
        self.active = Some(id);
        id
    }

    /// Remove a layer. The last remaining layer cannot be removed. When the
    /// active layer goes, the topmost remaining layer becomes active.
    pub fn remove_layer(&mut self, id: LayerId) -> Option<Layer> {
        if self.layers.len() <= 1 {
            return None;
        }
        let idx = self.index_of(id)?;
        let removed = self.layers.remove(idx);
        if self.active == Some(id) {
            self.active = self.layers.last().map(|l| l.id);
        }
        Some(removed)
    }

    /// Move the layer at `from` to position `to` (both bottom-based indices).
    pub fn reorder(&mut self, from: usize, to: usize) -> bool {
        let len = self.layers.len();
        if from >= len || to >= len || from == to {
            return false;
        }
        let layer = self.layers.remove(from);
        self.layers.insert(to, layer);
        true
    }

    /// Size of the composited output: the largest layer extent on each axis.
    pub fn display_size(&self, fallback: (u32, u32)) -> (u32, u32) {
        if self.layers.is_empty() {
            return fallback;
        }
        let w = self.layers.iter().map(|l| l.width()).max().unwrap_or(fallback.0);
        let h = self.layers.iter().map(|l| l.height()).max().unwrap_or(fallback.1);
        (w, h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(w: u32, h: u32) -> RasterBuffer {
        let mut buf = RasterBuffer::try_new(w, h).unwrap();
        for y in 0..h {
            for x in 0..w {
                buf.set_pixel(x, y, Rgba([x as u8, y as u8, (x * y) as u8, 255]));
            }
        }
        buf
    }

    #[test]
    fn try_new_rejects_absurd_sizes() {
        assert!(matches!(
            RasterBuffer::try_new(MAX_DIMENSION + 1, 1),
            Err(EngineError::Allocation { .. })
        ));
        assert!(RasterBuffer::try_new(0, 10).is_err());
        assert!(RasterBuffer::try_new(20_000, 20_000).is_err());
        let buf = RasterBuffer::try_new(3, 2).unwrap();
        assert_eq!(buf.as_raw(), &[0u8; 24][..]);
    }

    #[test]
    fn rotations_move_corners() {
        let src = checker(4, 2);
        let cw = src.rotated_cw().unwrap();
        assert_eq!(cw.dimensions(), (2, 4));
        // top-left ends up top-right
        assert_eq!(cw.pixel(1, 0), src.pixel(0, 0));
        let ccw = src.rotated_ccw().unwrap();
        // top-left ends up bottom-left
        assert_eq!(ccw.pixel(0, 3), src.pixel(0, 0));
        assert_eq!(cw.rotated_ccw().unwrap(), src);
        assert_eq!(src.rotated_180().unwrap().pixel(3, 1), src.pixel(0, 0));
    }

    #[test]
    fn blit_clips_to_destination() {
        let mut dst = RasterBuffer::try_new(4, 4).unwrap();
        let src = checker(3, 3);
        dst.blit(&src, -1, 2);
        assert_eq!(dst.pixel(0, 2), src.pixel(1, 0));
        assert_eq!(dst.pixel(1, 3), src.pixel(2, 1));
        assert_eq!(dst.pixel(0, 0), Some(Rgba([0, 0, 0, 0])));
    }

    #[test]
    fn region_copy_matches_source() {
        let src = checker(5, 5);
        let r = src.region(Region { x: 1, y: 2, width: 10, height: 2 }).unwrap();
        assert_eq!(r.dimensions(), (4, 2));
        assert_eq!(r.pixel(0, 0), src.pixel(1, 2));
        assert_eq!(r.pixel(3, 1), src.pixel(4, 3));
    }

    #[test]
    fn blend_normal_and_modes() {
        let base = Rgba([200, 100, 50, 255]);
        let top = Rgba([10, 20, 30, 255]);
        assert_eq!(BlendMode::Normal.blend_pixel(base, top, 1.0), top);
        assert_eq!(BlendMode::Normal.blend_pixel(base, Rgba([0, 0, 0, 0]), 1.0), base);
        assert_eq!(BlendMode::Darken.blend_pixel(base, top, 1.0), Rgba([10, 20, 30, 255]));
        assert_eq!(BlendMode::Lighten.blend_pixel(base, top, 1.0), Rgba([200, 100, 50, 255]));
        assert_eq!(BlendMode::Difference.blend_pixel(base, top, 1.0), Rgba([190, 80, 20, 255]));
        let white = Rgba([255, 255, 255, 255]);
        assert_eq!(BlendMode::Multiply.blend_pixel(base, white, 1.0), base);
        assert_eq!(BlendMode::Screen.blend_pixel(base, white, 1.0), white);
    }

    #[test]
    fn blend_onto_transparent_keeps_source_colour() {
        let clear = Rgba([0, 0, 0, 0]);
        let top = Rgba([40, 80, 120, 255]);
        for mode in BlendMode::all() {
            assert_eq!(mode.blend_pixel(clear, top, 1.0), top, "{mode}");
        }
        let half = BlendMode::Normal.blend_pixel(clear, top, 0.5);
        assert_eq!(half, Rgba([40, 80, 120, 128]));
    }

    #[test]
    fn blend_mode_names_round_trip_through_serde() {
        let json = serde_json::to_string(&BlendMode::ColorDodge).unwrap();
        assert_eq!(json, "\"color-dodge\"");
        assert_eq!(BlendMode::from_name("Hard-Light"), Some(BlendMode::HardLight));
        assert_eq!(BlendMode::from_name("source-over"), Some(BlendMode::Normal));
        assert!("bogus".parse::<BlendMode>().is_err());
    }

    #[test]
    fn removing_active_picks_topmost_and_last_layer_stays() {
        let mut doc = Document::new();
        let a = doc.push_layer(Layer::new("a", 2, 2).unwrap());
        let b = doc.push_layer(Layer::new("b", 2, 2).unwrap());
        let c = doc.push_layer(Layer::new("c", 2, 2).unwrap());
        doc.set_active(b);
        assert!(doc.remove_layer(b).is_some());
        assert_eq!(doc.active_id(), Some(c));
        assert!(doc.remove_layer(c).is_some());
        assert_eq!(doc.active_id(), Some(a));
        assert!(doc.remove_layer(a).is_none());
        assert_eq!(doc.layers.len(), 1);
    }

    #[test]
    fn display_size_is_max_extent() {
        let mut doc = Document::new();
        assert_eq!(doc.display_size((7, 9)), (7, 9));
        doc.push_layer(Layer::new("wide", 30, 5).unwrap());
        doc.push_layer(Layer::new("tall", 10, 40).unwrap());
        assert_eq!(doc.display_size((7, 9)), (30, 40));
    }

    #[test]
    fn opacity_is_clamped() {
        let mut layer = Layer::new("l", 1, 1).unwrap();
        layer.set_opacity(3.0);
        assert_eq!(layer.opacity(), 1.0);
        layer.set_opacity(-1.0);
        assert_eq!(layer.opacity(), 0.0);
    }
}
