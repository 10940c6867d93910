// ============================================================================
// STROKE RASTERIZER: brush and eraser strokes on a single layer
// ============================================================================
//
// A stroke keeps the pre-stroke pixels and a coverage value per pixel.
// Segments raise coverage (max, never sum) and the touched pixels are
// recomputed from the pre-stroke base, so overlapping segments and round
// joins never double up. The base doubles as the stroke's undo snapshot.
// ============================================================================

use image::Rgba;
use serde::{Deserialize, Serialize};

use crate::canvas::{Layer, LayerId, RasterBuffer};
use crate::error::{EngineError, EngineResult};
use crate::history::UndoEntry;
use crate::selection::Point;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrushSettings {
    /// Stroke width in pixels.
    pub size: f32,
    pub color: [u8; 3],
    /// Uniform alpha multiplier, not a falloff profile.
    pub hardness: f32,
}

impl Default for BrushSettings {
    fn default() -> Self {
        Self {
            size: 12.0,
            color: [0, 0, 0],
            hardness: 1.0,
        }
    }
}

impl BrushSettings {
    pub fn clamped(&self) -> Self {
        Self {
            size: if self.size.is_finite() { self.size.max(1.0) } else { 1.0 },
            color: self.color,
            hardness: if self.hardness.is_finite() { self.hardness.clamp(0.0, 1.0) } else { 1.0 },
        }
    }
}

/// Parse `#rrggbb`, `rrggbb` or `#rgb`.
pub fn parse_hex_color(s: &str) -> Option<[u8; 3]> {
    let hex = s.trim().trim_start_matches('#');
    if !hex.is_ascii() {
        return None;
    }
    match hex.len() {
        6 => {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            Some([r, g, b])
        }
        3 => {
            let d = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
            Some([d(0)?, d(1)?, d(2)?])
        }
        _ => None,
    }
}

pub fn to_hex_color(c: [u8; 3]) -> String {
    format!("#{:02x}{:02x}{:02x}", c[0], c[1], c[2])
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrokeMode {
    Paint,
    Erase,
}

impl StrokeMode {
    pub fn label(&self) -> &'static str {
        match self {
            StrokeMode::Paint => "Brush Stroke",
            StrokeMode::Erase => "Eraser Stroke",
        }
    }
}

// ============================================================================
// STROKE SESSION
// ============================================================================

pub struct StrokeSession {
    layer: LayerId,
    mode: StrokeMode,
    brush: BrushSettings,
    base: RasterBuffer,
    coverage: Vec<f32>,
    last: Point,
    touched: bool,
}

impl StrokeSession {
    /// Start a stroke on `layer` at document point `p`, stamping a dot there.
    pub fn begin(layer: &mut Layer, mode: StrokeMode, brush: &BrushSettings, p: Point) -> EngineResult<Self> {
        let base = layer.pixels.try_clone()?;
        let (w, h) = base.dimensions();
        let len = w as usize * h as usize;
        let mut coverage = Vec::new();
        coverage
            .try_reserve_exact(len)
            .map_err(|_| EngineError::Allocation { width: w, height: h })?;
        coverage.resize(len, 0.0);

        let local = Point::new(p.x - layer.x as f32, p.y - layer.y as f32);
        let mut session = Self {
            layer: layer.id,
            mode,
            brush: brush.clamped(),
            base,
            coverage,
            last: local,
            touched: false,
        };
        session.segment(layer, local, local);
        Ok(session)
    }

    pub fn layer_id(&self) -> LayerId {
        self.layer
    }

    pub fn mode(&self) -> StrokeMode {
        self.mode
    }

    /// Extend the stroke to document point `p`.
    pub fn extend(&mut self, layer: &mut Layer, p: Point) {
        let local = Point::new(p.x - layer.x as f32, p.y - layer.y as f32);
        let from = self.last;
        self.segment(layer, from, local);
        self.last = local;
    }

    /// End the stroke. Records one undo entry when any pixel changed.
    pub fn finish(self, layer: &mut Layer) -> bool {
        if !self.touched || layer.pixels.dimensions() != self.base.dimensions() {
            return false;
        }
        if layer.pixels == self.base {
            return false;
        }
        layer.record(UndoEntry::Pixels(self.base));
        true
    }

    fn segment(&mut self, layer: &mut Layer, a: Point, b: Point) {
        if layer.pixels.dimensions() != self.base.dimensions() {
            return;
        }
        let (w, h) = self.base.dimensions();
        let radius = self.brush.size / 2.0;
        let reach = radius + 1.0;

        let x0 = (a.x.min(b.x) - reach).floor().max(0.0);
        let y0 = (a.y.min(b.y) - reach).floor().max(0.0);
        let x1 = (a.x.max(b.x) + reach).ceil().min(w as f32);
        let y1 = (a.y.max(b.y) + reach).ceil().min(h as f32);
        if x0 >= x1 || y0 >= y1 {
            return;
        }

        for y in y0 as u32..y1 as u32 {
            for x in x0 as u32..x1 as u32 {
                let c = Point::new(x as f32 + 0.5, y as f32 + 0.5);
                let cov = (radius + 0.5 - distance_to_segment(c, a, b)).clamp(0.0, 1.0);
                let i = y as usize * w as usize + x as usize;
                if cov <= self.coverage[i] {
                    continue;
                }
                self.coverage[i] = cov;
                let Some(base) = self.base.pixel(x, y) else { continue };
                let px = match self.mode {
                    StrokeMode::Paint => paint_over(base, self.brush.color, cov * self.brush.hardness),
                    StrokeMode::Erase => erase(base, cov * self.brush.hardness),
                };
                layer.pixels.set_pixel(x, y, px);
                self.touched = true;
            }
        }
    }
}

fn distance_to_segment(p: Point, a: Point, b: Point) -> f32 {
    let (abx, aby) = (b.x - a.x, b.y - a.y);
    let len2 = abx * abx + aby * aby;
    let t = if len2 <= f32::EPSILON {
        0.0
    } else {
        (((p.x - a.x) * abx + (p.y - a.y) * aby) / len2).clamp(0.0, 1.0)
    };
    let (cx, cy) = (a.x + abx * t, a.y + aby * t);
    (p.x - cx).hypot(p.y - cy)
}

/// Source-over of an opaque colour at `alpha` onto `base`.
fn paint_over(base: Rgba<u8>, color: [u8; 3], alpha: f32) -> Rgba<u8> {
    let sa = alpha.clamp(0.0, 1.0);
    if sa <= 0.0 {
        return base;
    }
    let ba = base[3] as f32 / 255.0;
    let out_a = sa + ba * (1.0 - sa);
    let mut out = [0u8; 4];
    for c in 0..3 {
        let v = (color[c] as f32 * sa + base[c] as f32 * ba * (1.0 - sa)) / out_a;
        out[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgba(out)
}

/// Destination-out: scale the alpha down, leave colour alone.
fn erase(base: Rgba<u8>, amount: f32) -> Rgba<u8> {
    let keep = 1.0 - amount.clamp(0.0, 1.0);
    let a = (base[3] as f32 * keep).round().clamp(0.0, 255.0) as u8;
    Rgba([base[0], base[1], base[2], a])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn black(size: f32) -> BrushSettings {
        BrushSettings { size, color: [0, 0, 0], hardness: 1.0 }
    }

    #[test]
    fn hex_colours() {
        assert_eq!(parse_hex_color("#ff8000"), Some([255, 128, 0]));
        assert_eq!(parse_hex_color("0a0B0c"), Some([10, 11, 12]));
        assert_eq!(parse_hex_color("#f00"), Some([255, 0, 0]));
        assert_eq!(parse_hex_color("#12345"), None);
        assert_eq!(parse_hex_color("#gg0000"), None);
        assert_eq!(to_hex_color([255, 128, 0]), "#ff8000");
    }

    #[test]
    fn diagonal_stroke_paints_centre_and_leaves_corners() {
        let mut layer = Layer::new("l", 100, 100).unwrap();
        let mut s = StrokeSession::begin(&mut layer, StrokeMode::Paint, &black(5.0), Point::new(10.0, 10.0)).unwrap();
        s.extend(&mut layer, Point::new(90.0, 90.0));
        assert!(s.finish(&mut layer));
        assert_eq!(layer.pixels.pixel(50, 50).unwrap().0, [0, 0, 0, 255]);
        assert_eq!(layer.pixels.pixel(90, 10).unwrap().0, [0, 0, 0, 0]);
        assert_eq!(layer.history.undo_count(), 1);
    }

    #[test]
    fn overlapping_segments_do_not_stack_alpha() {
        let mut layer = Layer::new("l", 40, 40).unwrap();
        let brush = BrushSettings { size: 6.0, color: [255, 0, 0], hardness: 0.5 };
        let mut s = StrokeSession::begin(&mut layer, StrokeMode::Paint, &brush, Point::new(5.0, 20.0)).unwrap();
        s.extend(&mut layer, Point::new(35.0, 20.0));
        s.extend(&mut layer, Point::new(5.0, 20.0));
        s.extend(&mut layer, Point::new(35.0, 20.0));
        s.finish(&mut layer);
        assert_eq!(layer.pixels.pixel(20, 20).unwrap().0, [255, 0, 0, 128]);
    }

    #[test]
    fn eraser_clears_alpha_and_offset_is_respected() {
        let buf = RasterBuffer::try_filled(20, 20, Rgba([9, 9, 9, 255])).unwrap();
        let mut layer = Layer::from_buffer("l", buf);
        layer.x = 100;
        layer.y = 100;
        let mut s = StrokeSession::begin(&mut layer, StrokeMode::Erase, &black(4.0), Point::new(110.0, 102.0)).unwrap();
        s.extend(&mut layer, Point::new(110.0, 118.0));
        assert!(s.finish(&mut layer));
        assert_eq!(layer.pixels.pixel(10, 10).unwrap()[3], 0);
        assert_eq!(layer.pixels.pixel(1, 10).unwrap()[3], 255);
    }

    #[test]
    fn stroke_off_layer_records_nothing() {
        let mut layer = Layer::new("l", 10, 10).unwrap();
        let mut s = StrokeSession::begin(&mut layer, StrokeMode::Paint, &black(2.0), Point::new(-50.0, -50.0)).unwrap();
        s.extend(&mut layer, Point::new(-40.0, -60.0));
        assert!(!s.finish(&mut layer));
        assert_eq!(layer.history.undo_count(), 0);
    }
}
