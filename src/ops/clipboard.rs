// ============================================================================
// CLIPBOARD: copy the selected part of a layer out as a standalone image
// ============================================================================

use crate::canvas::{Layer, RasterBuffer};
use crate::error::EngineResult;
use crate::selection::Selection;

/// Copied pixels plus the document position they were copied from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClipboardImage {
    pub pixels: RasterBuffer,
    pub x: i32,
    pub y: i32,
}

impl ClipboardImage {
    /// Fresh layer holding a copy of these pixels at the copied position.
    pub fn to_layer(&self, name: &str) -> EngineResult<Layer> {
        let mut layer = Layer::from_buffer(name, self.pixels.try_clone()?);
        layer.x = self.x;
        layer.y = self.y;
        Ok(layer)
    }
}

/// Copy the selected part of `layer`. Polygon selections leave the pixels
/// outside the polygon transparent. `None` without a valid selection or
/// when the selection misses the layer.
pub fn copy_selection(layer: &Layer, selection: &Selection) -> EngineResult<Option<ClipboardImage>> {
    let Some(region) = selection.region_in_layer(layer) else {
        return Ok(None);
    };
    if region.is_empty() {
        return Ok(None);
    }
    let mut pixels = layer.pixels.region(region)?;
    if let Some(mask) = selection.polygon_mask(layer, region) {
        for (px, inside) in pixels.as_raw_mut().chunks_exact_mut(4).zip(mask) {
            if !inside {
                px.copy_from_slice(&[0, 0, 0, 0]);
            }
        }
    }
    Ok(Some(ClipboardImage {
        pixels,
        x: layer.x + region.x as i32,
        y: layer.y + region.y as i32,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::Point;
    use image::Rgba;

    fn solid(w: u32, h: u32) -> Layer {
        Layer::from_buffer("s", RasterBuffer::try_filled(w, h, Rgba([1, 2, 3, 255])).unwrap())
    }

    #[test]
    fn rect_copy_is_clamped_and_positioned() {
        let mut layer = solid(10, 10);
        layer.x = 2;
        let mut sel = Selection::None;
        sel.set_rectangle(0.0, 4.0, 5.0, 20.0);
        let clip = copy_selection(&layer, &sel).unwrap().unwrap();
        assert_eq!(clip.pixels.dimensions(), (3, 6));
        assert_eq!((clip.x, clip.y), (2, 4));
        let pasted = clip.to_layer("Pasted").unwrap();
        assert_eq!((pasted.x, pasted.y), (2, 4));
        assert_ne!(pasted.id, layer.id);
    }

    #[test]
    fn polygon_copy_clears_outside() {
        let layer = solid(10, 10);
        let mut sel = Selection::None;
        sel.begin_polygon(Point::new(0.0, 0.0));
        sel.extend_polygon(Point::new(10.0, 0.0));
        sel.extend_polygon(Point::new(0.0, 10.0));
        let clip = copy_selection(&layer, &sel).unwrap().unwrap();
        assert_eq!(clip.pixels.pixel(1, 1).unwrap().0, [1, 2, 3, 255]);
        assert_eq!(clip.pixels.pixel(9, 9).unwrap().0, [0, 0, 0, 0]);
    }

    #[test]
    fn nothing_to_copy_without_selection() {
        let layer = solid(4, 4);
        assert!(copy_selection(&layer, &Selection::None).unwrap().is_none());
    }
}
