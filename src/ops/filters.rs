// ============================================================================
// FILTER PIPELINE: selection-aware application of adjustments and effects
// ============================================================================
//
// 1. target region = selection bounding box ∩ layer (whole layer without a
//    selection; a selection that misses the layer is a no-op)
// 2. pixel snapshot of the layer
// 3. filter runs on a copy of the region
// 4. polygon selections restore out-of-polygon pixels from the copy
// 5. write back, then record the snapshot
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::canvas::{Layer, RasterBuffer, Region};
use crate::error::EngineResult;
use crate::history::UndoEntry;
use crate::ops::{adjustments, effects};
use crate::selection::Selection;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "filter", rename_all = "snake_case")]
pub enum FilterKind {
    BrightnessContrast {
        #[serde(default)]
        brightness: f32,
        #[serde(default)]
        contrast: f32,
    },
    Grayscale,
    Sepia {
        #[serde(default = "default_sepia")]
        amount: f32,
    },
    Threshold {
        #[serde(default = "default_threshold")]
        threshold: i32,
    },
    Invert,
    Emboss,
    Pixelate {
        #[serde(default = "default_block")]
        block_size: u32,
    },
}

fn default_sepia() -> f32 {
    60.0
}

fn default_threshold() -> i32 {
    128
}

fn default_block() -> u32 {
    8
}

impl FilterKind {
    /// Same filter with every parameter pulled into its documented range.
    pub fn clamped(&self) -> FilterKind {
        let finite = |v: f32| if v.is_finite() { v } else { 0.0 };
        match *self {
            FilterKind::BrightnessContrast { brightness, contrast } => FilterKind::BrightnessContrast {
                brightness: finite(brightness).clamp(-100.0, 100.0),
                contrast: finite(contrast).clamp(-100.0, 100.0),
            },
            FilterKind::Sepia { amount } => FilterKind::Sepia {
                amount: finite(amount).clamp(0.0, 100.0),
            },
            FilterKind::Threshold { threshold } => FilterKind::Threshold {
                threshold: threshold.clamp(0, 255),
            },
            FilterKind::Pixelate { block_size } => FilterKind::Pixelate {
                block_size: block_size.clamp(2, 64),
            },
            ref other => other.clone(),
        }
    }

    /// History label.
    pub fn label(&self) -> &'static str {
        match self {
            FilterKind::BrightnessContrast { .. } => "Brightness/Contrast",
            FilterKind::Grayscale => "Grayscale",
            FilterKind::Sepia { .. } => "Sepia",
            FilterKind::Threshold { .. } => "Threshold",
            FilterKind::Invert => "Invert",
            FilterKind::Emboss => "Emboss",
            FilterKind::Pixelate { .. } => "Pixelate",
        }
    }

    /// Run the filter over a whole buffer in place.
    pub fn run(&self, buf: &mut RasterBuffer) -> EngineResult<()> {
        match self.clamped() {
            FilterKind::BrightnessContrast { brightness, contrast } => {
                adjustments::brightness_contrast(buf, brightness, contrast)
            }
            FilterKind::Grayscale => adjustments::grayscale(buf),
            FilterKind::Sepia { amount } => adjustments::sepia(buf, amount),
            FilterKind::Threshold { threshold } => adjustments::threshold(buf, threshold as u8),
            FilterKind::Invert => adjustments::invert(buf),
            FilterKind::Emboss => effects::emboss(buf)?,
            FilterKind::Pixelate { block_size } => *buf = effects::pixelate(buf, block_size)?,
        }
        Ok(())
    }
}

/// Region a filter or copy should cover: the selection's clamped footprint
/// on the layer, or the whole layer. `None` means "nothing to do".
pub fn target_region(layer: &Layer, selection: &Selection) -> Option<Region> {
    match selection.region_in_layer(layer) {
        Some(r) if r.is_empty() => None,
        Some(r) => Some(r),
        None => {
            let full = Region::full(layer.width(), layer.height());
            (!full.is_empty()).then_some(full)
        }
    }
}

/// Apply `kind` to `layer` through `selection`. Returns whether anything was
/// written; on error the layer and its history are untouched.
pub fn apply_filter(layer: &mut Layer, selection: &Selection, kind: &FilterKind) -> EngineResult<bool> {
    let Some(region) = target_region(layer, selection) else {
        tracing::debug!("{}: selection does not touch layer '{}'", kind.label(), layer.name);
        return Ok(false);
    };

    let snapshot = UndoEntry::pixels(layer)?;
    let original = layer.pixels.region(region)?;
    let mut work = original.try_clone()?;
    kind.run(&mut work)?;

    if let Some(mask) = selection.polygon_mask(layer, region) {
        let orig_raw = original.as_raw();
        for (i, px) in work.as_raw_mut().chunks_exact_mut(4).enumerate() {
            if !mask[i] {
                px.copy_from_slice(&orig_raw[i * 4..i * 4 + 4]);
            }
        }
    }

    layer.pixels.blit(&work, region.x as i64, region.y as i64);
    layer.record(snapshot);
    tracing::debug!(
        "{} on '{}' at {}x{}+{}+{}",
        kind.label(),
        layer.name,
        region.width,
        region.height,
        region.x,
        region.y
    );
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::Point;
    use image::Rgba;

    fn gradient(w: u32, h: u32) -> Layer {
        let mut buf = RasterBuffer::try_new(w, h).unwrap();
        for y in 0..h {
            for x in 0..w {
                buf.set_pixel(x, y, Rgba([(x * 5) as u8, (y * 5) as u8, 90, 255]));
            }
        }
        Layer::from_buffer("g", buf)
    }

    #[test]
    fn rect_selection_limits_the_filter() {
        let mut layer = gradient(50, 50);
        let before = layer.pixels.clone();
        let mut sel = Selection::None;
        sel.set_rectangle(10.0, 10.0, 20.0, 20.0);
        assert!(apply_filter(&mut layer, &sel, &FilterKind::Invert).unwrap());
        for y in 0..50 {
            for x in 0..50 {
                let inside = (10..30).contains(&x) && (10..30).contains(&y);
                let b = before.pixel(x, y).unwrap();
                let a = layer.pixels.pixel(x, y).unwrap();
                if inside {
                    assert_eq!(a.0, [255 - b[0], 255 - b[1], 255 - b[2], b[3]]);
                } else {
                    assert_eq!(a, b);
                }
            }
        }
        assert_eq!(layer.history.undo_count(), 1);
    }

    #[test]
    fn polygon_outside_pixels_untouched() {
        let mut layer = gradient(20, 20);
        let before = layer.pixels.clone();
        let mut sel = Selection::None;
        sel.begin_polygon(Point::new(0.0, 0.0));
        sel.extend_polygon(Point::new(20.0, 0.0));
        sel.extend_polygon(Point::new(0.0, 20.0));
        assert!(apply_filter(&mut layer, &sel, &FilterKind::Grayscale).unwrap());
        // (18, 18) is inside the bounding box but outside the triangle
        assert_eq!(layer.pixels.pixel(18, 18), before.pixel(18, 18));
        assert_ne!(layer.pixels.pixel(2, 2), before.pixel(2, 2));
    }

    #[test]
    fn selection_off_layer_is_a_no_op() {
        let mut layer = gradient(10, 10);
        let mut sel = Selection::None;
        sel.set_rectangle(100.0, 100.0, 5.0, 5.0);
        assert!(!apply_filter(&mut layer, &sel, &FilterKind::Invert).unwrap());
        assert_eq!(layer.history.undo_count(), 0);
    }

    #[test]
    fn two_vertex_polygon_filters_whole_layer() {
        let mut layer = gradient(4, 4);
        let before = layer.pixels.clone();
        let mut sel = Selection::None;
        sel.begin_polygon(Point::new(0.0, 0.0));
        sel.extend_polygon(Point::new(1.0, 1.0));
        assert!(apply_filter(&mut layer, &sel, &FilterKind::Invert).unwrap());
        assert_ne!(layer.pixels.pixel(3, 3), before.pixel(3, 3));
    }

    #[test]
    fn params_are_clamped_and_deserialize_with_defaults() {
        let k: FilterKind = serde_json::from_str(r#"{"filter":"sepia"}"#).unwrap();
        assert_eq!(k, FilterKind::Sepia { amount: 60.0 });
        let k: FilterKind = serde_json::from_str(r#"{"filter":"threshold","threshold":900}"#).unwrap();
        assert_eq!(k.clamped(), FilterKind::Threshold { threshold: 255 });
        let k = FilterKind::Pixelate { block_size: 0 };
        assert_eq!(k.clamped(), FilterKind::Pixelate { block_size: 2 });
        let k = FilterKind::Pixelate { block_size: 500 };
        assert_eq!(k.clamped(), FilterKind::Pixelate { block_size: 64 });
    }
}
