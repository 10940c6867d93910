// ============================================================================
// COMPOSITOR: layer stack to display buffer, plus overlays
// ============================================================================

use std::time::{Duration, Instant};

use image::Rgba;
use rayon::prelude::*;

use crate::canvas::{Document, Placement, RasterBuffer};
use crate::error::EngineResult;
use crate::ops::transform::Handle;
use crate::selection::{Point, Selection};

pub const OVERLAY_COLOR: Rgba<u8> = Rgba([0x25, 0x63, 0xeb, 0xff]);
/// Dash pattern of the selection outline: pixels on, pixels off.
pub const DASH_ON: f32 = 6.0;
pub const DASH_OFF: f32 = 4.0;
pub const HANDLE_SIZE: i64 = 7;

/// Non-persistent decorations drawn after the layers.
#[derive(Clone, Copy, Debug, Default)]
pub struct Overlays<'a> {
    pub selection: Option<&'a Selection>,
    /// Rectangle to outline with transform handles.
    pub transform: Option<Placement>,
}

/// Blend all visible layers bottom to top into a fresh transparent buffer
/// of the document's display size.
pub fn composite_layers(doc: &Document, fallback: (u32, u32)) -> EngineResult<RasterBuffer> {
    let (w, h) = doc.display_size(fallback);
    let mut out = RasterBuffer::try_new(w, h)?;
    let stride = w as usize * 4;
    let visible: Vec<_> = doc.layers.iter().filter(|l| l.visible).collect();
    if visible.is_empty() {
        return Ok(out);
    }

    out.as_raw_mut()
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row)| {
            let y = y as i64;
            for layer in &visible {
                let ly = y - layer.y as i64;
                if ly < 0 || ly >= layer.height() as i64 {
                    continue;
                }
                let lx0 = layer.x as i64;
                let x_start = lx0.max(0);
                let x_end = (lx0 + layer.width() as i64).min(w as i64);
                for x in x_start..x_end {
                    let Some(top) = layer.pixels.pixel((x - lx0) as u32, ly as u32) else {
                        continue;
                    };
                    let pi = x as usize * 4;
                    let base = Rgba([row[pi], row[pi + 1], row[pi + 2], row[pi + 3]]);
                    let px = layer.blend_mode.blend_pixel(base, top, layer.opacity());
                    row[pi..pi + 4].copy_from_slice(&px.0);
                }
            }
        });
    Ok(out)
}

/// Composited colour of the single document pixel containing (x, y).
pub fn sample(doc: &Document, x: f32, y: f32) -> Rgba<u8> {
    let mut px = Rgba([0, 0, 0, 0]);
    for layer in doc.layers.iter().filter(|l| l.visible) {
        if let Some((lx, ly)) = layer.doc_to_local(x, y)
            && let Some(top) = layer.pixels.pixel(lx, ly)
        {
            px = layer.blend_mode.blend_pixel(px, top, layer.opacity());
        }
    }
    px
}

/// Layers plus overlays: what the presentation layer shows.
pub fn composite(doc: &Document, overlays: &Overlays<'_>, fallback: (u32, u32)) -> EngineResult<RasterBuffer> {
    let mut out = composite_layers(doc, fallback)?;
    if let Some(sel) = overlays.selection {
        draw_selection_outline(&mut out, sel);
    }
    if let Some(rect) = overlays.transform {
        draw_transform_overlay(&mut out, rect);
    }
    Ok(out)
}

// ============================================================================
// OVERLAYS
// ============================================================================

fn plot(buf: &mut RasterBuffer, x: f32, y: f32) {
    let (x, y) = (x.floor(), y.floor());
    if x >= 0.0 && y >= 0.0 {
        buf.set_pixel(x as u32, y as u32, OVERLAY_COLOR);
    }
}

/// Stroke a path one pixel wide. `dash` is (on, off) with the phase carried
/// across segments; `None` draws solid.
fn stroke_path(buf: &mut RasterBuffer, points: &[Point], closed: bool, dash: Option<(f32, f32)>) {
    if points.len() < 2 {
        return;
    }
    let mut travelled = 0.0f32;
    let count = if closed { points.len() } else { points.len() - 1 };
    for i in 0..count {
        let a = points[i];
        let b = points[(i + 1) % points.len()];
        let len = (b.x - a.x).hypot(b.y - a.y);
        let steps = len.ceil().max(1.0) as u32;
        for s in 0..steps {
            let t = s as f32 / steps as f32;
            let on = match dash {
                Some((on, off)) => (travelled + t * len) % (on + off) < on,
                None => true,
            };
            if on {
                plot(buf, a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t);
            }
        }
        travelled += len;
    }
}

pub fn draw_selection_outline(buf: &mut RasterBuffer, selection: &Selection) {
    let dash = Some((DASH_ON, DASH_OFF));
    match selection {
        Selection::None => {}
        Selection::Rect(r) => {
            if r.is_degenerate() {
                return;
            }
            // Inset the right/bottom edges so they land on the last covered pixel.
            let (l, t) = (r.x, r.y);
            let (rr, bb) = (r.right() - 1.0, r.bottom() - 1.0);
            let corners = [
                Point::new(l, t),
                Point::new(rr.max(l), t),
                Point::new(rr.max(l), bb.max(t)),
                Point::new(l, bb.max(t)),
            ];
            stroke_path(buf, &corners, true, dash);
        }
        Selection::Polygon { points } => {
            stroke_path(buf, points, points.len() >= 3, dash);
        }
    }
}

pub fn draw_transform_overlay(buf: &mut RasterBuffer, rect: Placement) {
    let (l, t) = (rect.x, rect.y);
    let (r, b) = (rect.x + rect.width - 1.0, rect.y + rect.height - 1.0);
    let outline = [
        Point::new(l, t),
        Point::new(r.max(l), t),
        Point::new(r.max(l), b.max(t)),
        Point::new(l, b.max(t)),
    ];
    stroke_path(buf, &outline, true, None);

    let half = HANDLE_SIZE / 2;
    for handle in Handle::all() {
        let p = handle.position(rect);
        let (cx, cy) = (p.x.round() as i64, p.y.round() as i64);
        for y in cy - half..=cy + half {
            for x in cx - half..=cx + half {
                if x >= 0 && y >= 0 {
                    buf.set_pixel(x as u32, y as u32, OVERLAY_COLOR);
                }
            }
        }
    }
}

// ============================================================================
// PREVIEW TICKER
// ============================================================================

/// Throttled "preview changed" counter for thumbnail refreshes.
#[derive(Debug)]
pub struct PreviewTicker {
    interval: Duration,
    last: Option<Instant>,
    ticks: u64,
}

impl PreviewTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval, last: None, ticks: 0 }
    }

    /// Note a composite at `now`. Returns true when a tick was emitted.
    pub fn observe(&mut self, now: Instant) -> bool {
        let due = match self.last {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        };
        if due {
            self.last = Some(now);
            self.ticks += 1;
        }
        due
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

impl Default for PreviewTicker {
    fn default() -> Self {
        Self::new(Duration::from_millis(200))
    }
}
