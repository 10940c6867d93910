use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::canvas::{Layer, Region};

/// Denominator floor for the polygon ray-casting test.
const EDGE_EPSILON: f32 = 1e-6;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle in document space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SelRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl SelRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Rectangle spanned by two corners in any order.
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            width: (a.x - b.x).abs(),
            height: (a.y - b.y).abs(),
        }
    }

    pub fn is_degenerate(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

// ============================================================================
// SELECTION
// ============================================================================

/// Document-scoped selection. A rectangle with a non-positive side and a
/// polygon with fewer than three vertices both behave as no selection.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Selection {
    #[default]
    None,
    Rect(SelRect),
    Polygon { points: Vec<Point> },
}

impl Selection {
    pub fn set_rectangle(&mut self, x: f32, y: f32, width: f32, height: f32) {
        *self = Selection::Rect(SelRect::new(x, y, width, height));
    }

    pub fn begin_polygon(&mut self, p: Point) {
        *self = Selection::Polygon { points: vec![p] };
    }

    /// Append a vertex to the polygon being captured. Ignored unless a
    /// polygon is in progress.
    pub fn extend_polygon(&mut self, p: Point) {
        if let Selection::Polygon { points } = self {
            if points.last() != Some(&p) {
                points.push(p);
            }
        }
    }

    pub fn clear(&mut self) {
        *self = Selection::None;
    }

    /// True when region operations should honour this selection.
    pub fn is_valid(&self) -> bool {
        match self {
            Selection::None => false,
            Selection::Rect(r) => !r.is_degenerate(),
            Selection::Polygon { points } => points.len() >= 3,
        }
    }

    pub fn is_polygon(&self) -> bool {
        matches!(self, Selection::Polygon { .. }) && self.is_valid()
    }

    pub fn bounding_box(&self) -> Option<SelRect> {
        if !self.is_valid() {
            return None;
        }
        match self {
            Selection::None => None,
            Selection::Rect(r) => Some(*r),
            Selection::Polygon { points } => {
                let (mut min_x, mut min_y) = (f32::INFINITY, f32::INFINITY);
                let (mut max_x, mut max_y) = (f32::NEG_INFINITY, f32::NEG_INFINITY);
                for p in points {
                    min_x = min_x.min(p.x);
                    min_y = min_y.min(p.y);
                    max_x = max_x.max(p.x);
                    max_y = max_y.max(p.y);
                }
                let r = SelRect::new(min_x, min_y, max_x - min_x, max_y - min_y);
                (!r.is_degenerate()).then_some(r)
            }
        }
    }

    /// Document-space containment test. Everything is "inside" a missing
    /// selection.
    pub fn contains(&self, x: f32, y: f32) -> bool {
        if !self.is_valid() {
            return true;
        }
        match self {
            Selection::None => true,
            Selection::Rect(r) => r.contains(x, y),
            Selection::Polygon { points } => point_in_polygon(points, x, y),
        }
    }

    /// Selection bounding box translated into `layer`'s buffer space and
    /// clamped to it. `None` when there is no valid selection; an empty
    /// region when the selection misses the layer.
    pub fn region_in_layer(&self, layer: &Layer) -> Option<Region> {
        let bb = self.bounding_box()?;
        let (w, h) = (layer.width() as i64, layer.height() as i64);
        let x0 = (bb.x.floor() as i64 - layer.x as i64).clamp(0, w);
        let y0 = (bb.y.floor() as i64 - layer.y as i64).clamp(0, h);
        let x1 = (bb.right().ceil() as i64 - layer.x as i64).clamp(0, w);
        let y1 = (bb.bottom().ceil() as i64 - layer.y as i64).clamp(0, h);
        Some(Region {
            x: x0 as u32,
            y: y0 as u32,
            width: (x1 - x0).max(0) as u32,
            height: (y1 - y0).max(0) as u32,
        })
    }

    /// Whether the layer pixel (lx, ly) is selected, tested at its centre
    /// in document space.
    pub fn contains_layer_pixel(&self, layer: &Layer, lx: u32, ly: u32) -> bool {
        let dx = lx as f32 + layer.x as f32 + 0.5;
        let dy = ly as f32 + layer.y as f32 + 0.5;
        self.contains(dx, dy)
    }

    /// Row-major inside/outside flags for every pixel of `region`, or `None`
    /// when the selection is not a valid polygon (the whole region counts).
    pub fn polygon_mask(&self, layer: &Layer, region: Region) -> Option<Vec<bool>> {
        let Selection::Polygon { points } = self else { return None };
        if points.len() < 3 {
            return None;
        }
        let (ox, oy) = (layer.x as f32, layer.y as f32);
        let w = region.width as usize;
        let mut mask = vec![false; w * region.height as usize];
        if w == 0 {
            return Some(mask);
        }
        mask.par_chunks_mut(w).enumerate().for_each(|(row, flags)| {
            let dy = (region.y as usize + row) as f32 + oy + 0.5;
            for (col, flag) in flags.iter_mut().enumerate() {
                let dx = (region.x as usize + col) as f32 + ox + 0.5;
                *flag = point_in_polygon(points, dx, dy);
            }
        });
        Some(mask)
    }
}

/// Even-odd ray casting with a horizontal ray towards +x.
pub fn point_in_polygon(points: &[Point], x: f32, y: f32) -> bool {
    let n = points.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (pi, pj) = (points[i], points[j]);
        if (pi.y > y) != (pj.y > y) {
            let mut denom = pj.y - pi.y;
            if denom.abs() < EDGE_EPSILON {
                denom = EDGE_EPSILON.copysign(denom);
            }
            let cross_x = (pj.x - pi.x) * (y - pi.y) / denom + pi.x;
            if x < cross_x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}
