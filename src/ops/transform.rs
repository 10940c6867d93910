// ============================================================================
// TRANSFORM OPERATIONS: rotate, flip, resize, crop and handle-drag resize
// ============================================================================

use image::imageops::{self, FilterType};
use serde::{Deserialize, Serialize};

use crate::canvas::{Layer, Placement, RasterBuffer};
use crate::error::EngineResult;
use crate::history::UndoEntry;
use crate::selection::{Point, Selection};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotateDirection {
    Cw,
    Ccw,
    #[serde(alias = "flip")]
    Flip180,
}

impl RotateDirection {
    pub fn label(&self) -> &'static str {
        match self {
            RotateDirection::Cw => "Rotate 90° CW",
            RotateDirection::Ccw => "Rotate 90° CCW",
            RotateDirection::Flip180 => "Rotate 180°",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlipAxis {
    Horizontal,
    Vertical,
}

impl FlipAxis {
    pub fn label(&self) -> &'static str {
        match self {
            FlipAxis::Horizontal => "Flip Horizontal",
            FlipAxis::Vertical => "Flip Vertical",
        }
    }
}

// ============================================================================
// PROGRAMMATIC TRANSFORMS
// ============================================================================

/// Quarter or half turn of the layer's buffer. The anchor stays put.
pub fn rotate90(layer: &mut Layer, dir: RotateDirection) -> EngineResult<bool> {
    let snapshot = UndoEntry::layer(layer)?;
    let rotated = match dir {
        RotateDirection::Cw => layer.pixels.rotated_cw()?,
        RotateDirection::Ccw => layer.pixels.rotated_ccw()?,
        RotateDirection::Flip180 => layer.pixels.rotated_180()?,
    };
    layer.pixels = rotated;
    layer.record(snapshot);
    Ok(true)
}

/// Mirror in place; dimensions never change so a pixel snapshot suffices.
pub fn flip(layer: &mut Layer, axis: FlipAxis) -> EngineResult<bool> {
    let snapshot = UndoEntry::pixels(layer)?;
    match axis {
        FlipAxis::Horizontal => layer.pixels.flip_horizontal(),
        FlipAxis::Vertical => layer.pixels.flip_vertical(),
    }
    layer.record(snapshot);
    Ok(true)
}

/// Bilinear resample of a whole buffer.
fn resample(src: &RasterBuffer, width: u32, height: u32) -> EngineResult<RasterBuffer> {
    RasterBuffer::check_dimensions(width, height)?;
    Ok(RasterBuffer::from_image(imageops::resize(
        src.image(),
        width,
        height,
        FilterType::Triangle,
    )))
}

/// Stretch the layer to `width` x `height`. Non-positive sizes and a
/// resize to the current size are no-ops.
pub fn resize(layer: &mut Layer, width: i64, height: i64) -> EngineResult<bool> {
    if width <= 0 || height <= 0 {
        return Ok(false);
    }
    let (w, h) = (
        u32::try_from(width).unwrap_or(u32::MAX),
        u32::try_from(height).unwrap_or(u32::MAX),
    );
    if (w, h) == layer.pixels.dimensions() {
        return Ok(false);
    }
    RasterBuffer::check_dimensions(w, h)?;
    let snapshot = UndoEntry::layer(layer)?;
    let resized = resample(&layer.pixels, w, h)?;
    layer.pixels = resized;
    layer.record(snapshot);
    Ok(true)
}

/// Crop the layer to the selection's footprint on it. The anchor moves to
/// the clamped region's document position. Without a valid selection, or
/// when the selection misses the layer, nothing happens.
pub fn crop_to_selection(layer: &mut Layer, selection: &Selection) -> EngineResult<bool> {
    let Some(region) = selection.region_in_layer(layer) else {
        return Ok(false);
    };
    if region.is_empty() {
        return Ok(false);
    }
    let snapshot = UndoEntry::layer(layer)?;
    let cropped = layer.pixels.region(region)?;
    layer.pixels = cropped;
    layer.x += region.x as i32;
    layer.y += region.y as i32;
    layer.record(snapshot);
    Ok(true)
}

/// Parse "800x600" (also `X` or `×`). Anything malformed or non-positive
/// gives `None`.
pub fn parse_size(s: &str) -> Option<(u32, u32)> {
    let s = s.trim();
    let (w, h) = s.split_once(['x', 'X', '×'])?;
    let w: u32 = w.trim().parse().ok()?;
    let h: u32 = h.trim().parse().ok()?;
    (w > 0 && h > 0).then_some((w, h))
}

// ============================================================================
// INTERACTIVE HANDLES
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Handle {
    Nw,
    N,
    Ne,
    E,
    Se,
    S,
    Sw,
    W,
}

impl Handle {
    pub fn all() -> &'static [Handle] {
        &[
            Handle::Nw,
            Handle::N,
            Handle::Ne,
            Handle::E,
            Handle::Se,
            Handle::S,
            Handle::Sw,
            Handle::W,
        ]
    }

    pub fn moves_left(self) -> bool {
        matches!(self, Handle::Nw | Handle::W | Handle::Sw)
    }

    pub fn moves_right(self) -> bool {
        matches!(self, Handle::Ne | Handle::E | Handle::Se)
    }

    pub fn moves_top(self) -> bool {
        matches!(self, Handle::Nw | Handle::N | Handle::Ne)
    }

    pub fn moves_bottom(self) -> bool {
        matches!(self, Handle::Sw | Handle::S | Handle::Se)
    }

    pub fn is_corner(self) -> bool {
        matches!(self, Handle::Nw | Handle::Ne | Handle::Se | Handle::Sw)
    }

    /// Hotspot position on `rect`.
    pub fn position(self, rect: Placement) -> Point {
        let (l, t) = (rect.x, rect.y);
        let (r, b) = (rect.x + rect.width, rect.y + rect.height);
        let (cx, cy) = ((l + r) / 2.0, (t + b) / 2.0);
        match self {
            Handle::Nw => Point::new(l, t),
            Handle::N => Point::new(cx, t),
            Handle::Ne => Point::new(r, t),
            Handle::E => Point::new(r, cy),
            Handle::Se => Point::new(r, b),
            Handle::S => Point::new(cx, b),
            Handle::Sw => Point::new(l, b),
            Handle::W => Point::new(l, cy),
        }
    }
}

/// Closest handle within `radius` of `p`, if any.
pub fn hit_handle(rect: Placement, p: Point, radius: f32) -> Option<Handle> {
    Handle::all()
        .iter()
        .map(|&h| {
            let hp = h.position(rect);
            (h, (hp.x - p.x).hypot(hp.y - p.y))
        })
        .filter(|&(_, d)| d <= radius)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(h, _)| h)
}

/// Live preview rectangle for dragging `handle` of `start` by (dx, dy).
/// Only the edges on the handle's side move; dragging past the opposite
/// edge flips the rectangle. With `keep_aspect` the start ratio is kept and
/// the dimension that changed more relative to the start drives the other.
pub fn drag_rect(start: Placement, handle: Handle, dx: f32, dy: f32, keep_aspect: bool) -> Placement {
    let mut left = start.x;
    let mut top = start.y;
    let mut right = start.x + start.width;
    let mut bottom = start.y + start.height;

    if handle.moves_left() {
        left += dx;
    }
    if handle.moves_right() {
        right += dx;
    }
    if handle.moves_top() {
        top += dy;
    }
    if handle.moves_bottom() {
        bottom += dy;
    }

    if keep_aspect && start.width > 0.0 && start.height > 0.0 {
        let ratio = start.width / start.height;
        let w = right - left;
        let h = bottom - top;
        let rel_w = (w.abs() / start.width - 1.0).abs();
        let rel_h = (h.abs() / start.height - 1.0).abs();
        let width_drives = if handle.is_corner() {
            rel_w >= rel_h
        } else {
            handle.moves_left() || handle.moves_right()
        };

        if width_drives {
            let new_h = (w.abs() / ratio).copysign(if h == 0.0 { 1.0 } else { h });
            if handle.moves_top() {
                top = bottom - new_h;
            } else {
                bottom = top + new_h;
            }
        } else {
            let new_w = (h.abs() * ratio).copysign(if w == 0.0 { 1.0 } else { w });
            if handle.moves_left() {
                left = right - new_w;
            } else {
                right = left + new_w;
            }
        }
    }

    if right < left {
        std::mem::swap(&mut left, &mut right);
    }
    if bottom < top {
        std::mem::swap(&mut top, &mut bottom);
    }
    Placement {
        x: left,
        y: top,
        width: right - left,
        height: bottom - top,
    }
}

/// Integer placement a preview rectangle commits to.
pub fn snap_rect(rect: Placement) -> (i32, i32, u32, u32) {
    (
        rect.x.round() as i32,
        rect.y.round() as i32,
        rect.width.round().max(1.0) as u32,
        rect.height.round().max(1.0) as u32,
    )
}

/// Commit a preview rectangle: resample to its size and move the anchor.
/// A rectangle that snaps to the current placement is a no-op.
pub fn commit_rect(layer: &mut Layer, rect: Placement) -> EngineResult<bool> {
    let (x, y, w, h) = snap_rect(rect);
    let same_size = (w, h) == layer.pixels.dimensions();
    if same_size && (x, y) == (layer.x, layer.y) {
        return Ok(false);
    }
    RasterBuffer::check_dimensions(w, h)?;
    let snapshot = UndoEntry::layer(layer)?;
    if !same_size {
        let resized = resample(&layer.pixels, w, h)?;
        layer.pixels = resized;
    }
    layer.x = x;
    layer.y = y;
    layer.record(snapshot);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn rect(x: f32, y: f32, w: f32, h: f32) -> Placement {
        Placement { x, y, width: w, height: h }
    }

    fn numbered(w: u32, h: u32) -> Layer {
        let mut buf = RasterBuffer::try_new(w, h).unwrap();
        for y in 0..h {
            for x in 0..w {
                buf.set_pixel(x, y, Rgba([x as u8, y as u8, 7, 255]));
            }
        }
        Layer::from_buffer("n", buf)
    }

    #[test]
    fn rotate_cw_swaps_dimensions_and_keeps_anchor() {
        let mut layer = numbered(100, 50);
        layer.x = 4;
        layer.y = -3;
        assert!(rotate90(&mut layer, RotateDirection::Cw).unwrap());
        assert_eq!(layer.pixels.dimensions(), (50, 100));
        assert_eq!((layer.x, layer.y), (4, -3));
    }

    #[test]
    fn four_quarter_turns_are_identity() {
        let mut layer = numbered(7, 3);
        let before = layer.pixels.clone();
        for _ in 0..4 {
            rotate90(&mut layer, RotateDirection::Cw).unwrap();
        }
        assert_eq!(layer.pixels, before);
    }

    #[test]
    fn flip_twice_is_identity() {
        let mut layer = numbered(5, 4);
        let before = layer.pixels.clone();
        flip(&mut layer, FlipAxis::Horizontal).unwrap();
        assert_eq!(layer.pixels.pixel(0, 0), before.pixel(4, 0));
        flip(&mut layer, FlipAxis::Horizontal).unwrap();
        assert_eq!(layer.pixels, before);
    }

    #[test]
    fn resize_rejects_non_positive() {
        let mut layer = numbered(10, 10);
        assert!(!resize(&mut layer, 0, 10).unwrap());
        assert!(!resize(&mut layer, 10, -1).unwrap());
        assert!(!resize(&mut layer, 10, 10).unwrap());
        assert_eq!(layer.history.undo_count(), 0);
        assert!(resize(&mut layer, 25, 4).unwrap());
        assert_eq!(layer.pixels.dimensions(), (25, 4));
    }

    #[test]
    fn resize_too_large_fails_without_mutation() {
        let mut layer = numbered(10, 10);
        let err = resize(&mut layer, 100_000, 10).unwrap_err();
        assert!(matches!(err, crate::error::EngineError::Allocation { .. }));
        assert_eq!(layer.pixels.dimensions(), (10, 10));
        assert_eq!(layer.history.undo_count(), 0);
    }

    #[test]
    fn crop_moves_anchor_to_region_origin() {
        let mut layer = numbered(20, 20);
        layer.x = 5;
        layer.y = 5;
        let mut sel = Selection::None;
        sel.set_rectangle(10.0, 0.0, 8.0, 10.0);
        assert!(crop_to_selection(&mut layer, &sel).unwrap());
        // region in layer space: x 5..13, y 0..5
        assert_eq!(layer.pixels.dimensions(), (8, 5));
        assert_eq!((layer.x, layer.y), (10, 5));
        assert_eq!(layer.pixels.pixel(0, 0).unwrap().0, [5, 0, 7, 255]);
    }

    #[test]
    fn parse_size_accepts_and_rejects() {
        assert_eq!(parse_size("800x600"), Some((800, 600)));
        assert_eq!(parse_size(" 12 X 3 "), Some((12, 3)));
        assert_eq!(parse_size("4×5"), Some((4, 5)));
        assert_eq!(parse_size("0x5"), None);
        assert_eq!(parse_size("800"), None);
        assert_eq!(parse_size("axb"), None);
        assert_eq!(parse_size("-3x4"), None);
    }

    #[test]
    fn hit_picks_nearest_handle_within_radius() {
        let r = rect(0.0, 0.0, 100.0, 50.0);
        assert_eq!(hit_handle(r, Point::new(2.0, 3.0), 8.0), Some(Handle::Nw));
        assert_eq!(hit_handle(r, Point::new(100.0, 25.0), 8.0), Some(Handle::E));
        assert_eq!(hit_handle(r, Point::new(50.0, 25.0), 8.0), None);
    }

    #[test]
    fn edge_handles_move_only_their_edge() {
        let r = rect(10.0, 10.0, 100.0, 50.0);
        assert_eq!(drag_rect(r, Handle::E, 20.0, 99.0, false), rect(10.0, 10.0, 120.0, 50.0));
        assert_eq!(drag_rect(r, Handle::N, 99.0, -5.0, false), rect(10.0, 5.0, 100.0, 55.0));
        assert_eq!(drag_rect(r, Handle::Nw, 10.0, 10.0, false), rect(20.0, 20.0, 90.0, 40.0));
    }

    #[test]
    fn dragging_past_the_opposite_edge_normalizes() {
        let r = rect(0.0, 0.0, 10.0, 10.0);
        let out = drag_rect(r, Handle::E, -15.0, 0.0, false);
        assert_eq!(out, rect(-5.0, 0.0, 5.0, 10.0));
    }

    #[test]
    fn aspect_lock_follows_dominant_dimension() {
        let r = rect(0.0, 0.0, 100.0, 50.0);
        // width grows 50%, height 10%: width wins
        let out = drag_rect(r, Handle::Se, 50.0, 5.0, true);
        assert_eq!(out, rect(0.0, 0.0, 150.0, 75.0));
        // height doubles: height wins, anchored on the right edge
        let out = drag_rect(r, Handle::Sw, 0.0, 50.0, true);
        assert_eq!(out, rect(-100.0, 0.0, 200.0, 100.0));
    }

    #[test]
    fn commit_noop_when_unchanged() {
        let mut layer = numbered(10, 10);
        let unchanged = layer.placement();
        assert!(!commit_rect(&mut layer, unchanged).unwrap());
        assert!(commit_rect(&mut layer, rect(3.2, 4.0, 20.0, 10.0)).unwrap());
        assert_eq!(layer.pixels.dimensions(), (20, 10));
        assert_eq!((layer.x, layer.y), (3, 4));
        assert!(layer.undo().unwrap());
        assert_eq!(layer.pixels.dimensions(), (10, 10));
        assert_eq!((layer.x, layer.y), (0, 0));
    }
}
