// ============================================================================
// ADJUSTMENT OPERATIONS: per-pixel colour filters
// ============================================================================
//
// Every function here works on a buffer holding just the target region; the
// selection mask is applied later by the filter pipeline. Colour filters
// touch R, G, B and leave alpha alone. Rows run in parallel via rayon.
// ============================================================================

use rayon::prelude::*;

use crate::canvas::RasterBuffer;

/// Fixed-point BT.709 luma scaled by 10 000 (0..=2_550_000).
#[inline]
pub fn luma_scaled(r: u8, g: u8, b: u8) -> u32 {
    2126 * r as u32 + 7152 * g as u32 + 722 * b as u32
}

/// BT.709 luma rounded to the nearest integer.
#[inline]
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((luma_scaled(r, g, b) + 5_000) / 10_000) as u8
}

#[inline]
fn to_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

// ============================================================================
// HELPER: parallel per-pixel transform
// ============================================================================

/// Apply `transform` to every pixel of `buf`. `transform` receives and
/// returns one RGBA pixel.
fn apply_pixel_transform<F>(buf: &mut RasterBuffer, transform: F)
where
    F: Fn([u8; 4]) -> [u8; 4] + Sync,
{
    let stride = buf.width() as usize * 4;
    if stride == 0 {
        return;
    }
    buf.as_raw_mut().par_chunks_mut(stride).for_each(|row| {
        for px in row.chunks_exact_mut(4) {
            let out = transform([px[0], px[1], px[2], px[3]]);
            px.copy_from_slice(&out);
        }
    });
}

// ============================================================================
// INSTANT OPERATIONS
// ============================================================================

/// Invert R, G, B. Alpha is preserved.
pub fn invert(buf: &mut RasterBuffer) {
    apply_pixel_transform(buf, |[r, g, b, a]| [255 - r, 255 - g, 255 - b, a]);
}

pub fn grayscale(buf: &mut RasterBuffer) {
    apply_pixel_transform(buf, |[r, g, b, a]| {
        let y = luma(r, g, b);
        [y, y, y, a]
    });
}

/// Black and white: 255 where luma >= `threshold`, else 0.
pub fn threshold(buf: &mut RasterBuffer, threshold: u8) {
    let t = threshold as u32 * 10_000;
    apply_pixel_transform(buf, move |[r, g, b, a]| {
        let v = if luma_scaled(r, g, b) >= t { 255 } else { 0 };
        [v, v, v, a]
    });
}

// ============================================================================
// PARAMETRIC OPERATIONS
// ============================================================================

/// Sepia tone blended with the original by `amount` (0..=100).
pub fn sepia(buf: &mut RasterBuffer, amount: f32) {
    let t = amount.clamp(0.0, 100.0) / 100.0;
    apply_pixel_transform(buf, move |[r, g, b, a]| {
        let (rf, gf, bf) = (r as f32, g as f32, b as f32);
        let sr = 0.393 * rf + 0.769 * gf + 0.189 * bf;
        let sg = 0.349 * rf + 0.686 * gf + 0.168 * bf;
        let sb = 0.272 * rf + 0.534 * gf + 0.131 * bf;
        [
            to_u8(rf + (sr - rf) * t),
            to_u8(gf + (sg - gf) * t),
            to_u8(bf + (sb - bf) * t),
            a,
        ]
    });
}

/// Brightness/Contrast adjustment.
/// `brightness`: -100..100 (offset of up to a full channel range)
/// `contrast`: -100..100 (multiplier around 128)
pub fn brightness_contrast(buf: &mut RasterBuffer, brightness: f32, contrast: f32) {
    let brightness = brightness.clamp(-100.0, 100.0);
    let contrast = contrast.clamp(-100.0, 100.0);
    let offset = 255.0 * brightness / 100.0;
    let factor = (259.0 * (contrast + 255.0)) / (255.0 * (259.0 - contrast));
    apply_pixel_transform(buf, move |[r, g, b, a]| {
        let f = |v: u8| to_u8(factor * (v as f32 - 128.0) + 128.0 + offset);
        [f(r), f(g), f(b), a]
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn uniform(color: [u8; 4]) -> RasterBuffer {
        RasterBuffer::try_filled(3, 2, Rgba(color)).unwrap()
    }

    fn first(buf: &RasterBuffer) -> [u8; 4] {
        buf.pixel(0, 0).unwrap().0
    }

    #[test]
    fn luma_of_white_and_grey() {
        assert_eq!(luma_scaled(255, 255, 255), 2_550_000);
        assert_eq!(luma(128, 128, 128), 128);
        assert_eq!(luma(255, 0, 0), 54);
    }

    #[test]
    fn invert_keeps_alpha() {
        let mut buf = uniform([10, 20, 30, 77]);
        invert(&mut buf);
        assert_eq!(first(&buf), [245, 235, 225, 77]);
    }

    #[test]
    fn threshold_boundary_is_inclusive() {
        let mut buf = uniform([128, 128, 128, 255]);
        threshold(&mut buf, 128);
        assert!(buf.image().pixels().all(|p| p.0 == [255, 255, 255, 255]));

        let mut buf = uniform([127, 127, 127, 255]);
        threshold(&mut buf, 128);
        assert_eq!(first(&buf), [0, 0, 0, 255]);
    }

    #[test]
    fn grayscale_uses_bt709() {
        let mut buf = uniform([0, 255, 0, 200]);
        grayscale(&mut buf);
        assert_eq!(first(&buf), [182, 182, 182, 200]);
    }

    #[test]
    fn sepia_amount_zero_is_identity_and_full_caps() {
        let mut buf = uniform([100, 150, 200, 255]);
        sepia(&mut buf, 0.0);
        assert_eq!(first(&buf), [100, 150, 200, 255]);

        let mut buf = uniform([255, 255, 255, 255]);
        sepia(&mut buf, 100.0);
        assert_eq!(first(&buf), [255, 255, 239, 255]);
    }

    #[test]
    fn partial_sepia_clamps_only_the_blended_result() {
        // sepia red of 200 grey is 270.2; halfway back to 200 is 235.1
        let mut buf = uniform([200, 200, 200, 255]);
        sepia(&mut buf, 50.0);
        assert_eq!(first(&buf), [235, 220, 194, 255]);
    }

    #[test]
    fn brightness_contrast_neutral_and_extremes() {
        let mut buf = uniform([12, 128, 240, 255]);
        brightness_contrast(&mut buf, 0.0, 0.0);
        assert_eq!(first(&buf), [12, 128, 240, 255]);

        brightness_contrast(&mut buf, 100.0, 0.0);
        assert_eq!(first(&buf), [255, 255, 255, 255]);

        // contrast is clamped to 100 rather than blowing up near 259
        let mut buf = uniform([100, 128, 160, 255]);
        brightness_contrast(&mut buf, 0.0, 1000.0);
        let factor = (259.0f32 * 355.0) / (255.0 * 159.0);
        let expected = (factor * (100.0 - 128.0) + 128.0).round() as u8;
        assert_eq!(first(&buf)[0], expected);
        assert_eq!(first(&buf)[1], 128);
    }
}
