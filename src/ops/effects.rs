// ============================================================================
// SPATIAL EFFECTS: neighbourhood and resampling filters
// ============================================================================

use image::imageops::{self, FilterType};
use rayon::prelude::*;

use crate::canvas::RasterBuffer;
use crate::error::EngineResult;

/// Row-major 3x3 emboss kernel.
const EMBOSS_KERNEL: [i32; 9] = [-2, -1, 0, -1, 1, 1, 0, 1, 2];
const EMBOSS_BIAS: i32 = 128;

/// 3x3 emboss on R, G, B. The one-pixel border of `buf` is left as is and
/// every output pixel reads from the unmodified input.
pub fn emboss(buf: &mut RasterBuffer) -> EngineResult<()> {
    let (w, h) = buf.dimensions();
    if w < 3 || h < 3 {
        return Ok(());
    }
    let src = buf.try_clone()?;
    let src_raw = src.as_raw();
    let stride = w as usize * 4;

    buf.as_raw_mut()
        .par_chunks_mut(stride)
        .enumerate()
        .skip(1)
        .take(h as usize - 2)
        .for_each(|(y, row_out)| {
            for x in 1..w as usize - 1 {
                let pi = x * 4;
                for c in 0..3 {
                    let mut acc = 0i32;
                    for ky in 0..3 {
                        let row = (y + ky - 1) * stride;
                        for kx in 0..3 {
                            let si = row + (x + kx - 1) * 4 + c;
                            acc += EMBOSS_KERNEL[ky * 3 + kx] * src_raw[si] as i32;
                        }
                    }
                    row_out[pi + c] = (acc + EMBOSS_BIAS).clamp(0, 255) as u8;
                }
            }
        });
    Ok(())
}

/// Mosaic: smooth downscale by `block_size`, then nearest-neighbour back up
/// to the original size. Returns a new buffer of the same dimensions.
pub fn pixelate(buf: &RasterBuffer, block_size: u32) -> EngineResult<RasterBuffer> {
    let bs = block_size.max(2);
    let (w, h) = buf.dimensions();
    let sw = (w / bs).max(1);
    let sh = (h / bs).max(1);
    RasterBuffer::check_dimensions(sw, sh)?;
    let small = imageops::resize(buf.image(), sw, sh, FilterType::Triangle);
    let big = imageops::resize(&small, w, h, FilterType::Nearest);
    Ok(RasterBuffer::from_image(big))
}
