// ============================================================================
// IMAGE I/O: decode into layers, encode exports, save-back
// ============================================================================

use std::io::{Cursor, Write};
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::io::{Limits, Reader as ImageReader};
use image::{ColorType, DynamicImage, ImageEncoder, ImageFormat, ImageOutputFormat};
use serde::{Deserialize, Serialize};

use crate::canvas::{Layer, RasterBuffer, SourceBinding, MAX_DIMENSION};
use crate::error::{EngineError, EngineResult};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Png,
    Jpeg,
    Webp,
    Bmp,
    Gif,
    Avif,
}

impl ExportFormat {
    pub fn all() -> &'static [ExportFormat] {
        &[
            ExportFormat::Png,
            ExportFormat::Jpeg,
            ExportFormat::Webp,
            ExportFormat::Bmp,
            ExportFormat::Gif,
            ExportFormat::Avif,
        ]
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Jpeg => "jpg",
            ExportFormat::Webp => "webp",
            ExportFormat::Bmp => "bmp",
            ExportFormat::Gif => "gif",
            ExportFormat::Avif => "avif",
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            ExportFormat::Png => "image/png",
            ExportFormat::Jpeg => "image/jpeg",
            ExportFormat::Webp => "image/webp",
            ExportFormat::Bmp => "image/bmp",
            ExportFormat::Gif => "image/gif",
            ExportFormat::Avif => "image/avif",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "png" => Some(ExportFormat::Png),
            "jpg" | "jpeg" => Some(ExportFormat::Jpeg),
            "webp" => Some(ExportFormat::Webp),
            "bmp" => Some(ExportFormat::Bmp),
            "gif" => Some(ExportFormat::Gif),
            "avif" => Some(ExportFormat::Avif),
            _ => None,
        }
    }

    pub fn from_mime(mime: &str) -> Option<Self> {
        Self::all().iter().copied().find(|f| f.mime() == mime.trim().to_ascii_lowercase())
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension().and_then(|e| e.to_str()).and_then(Self::from_extension)
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s)
            .or_else(|| Self::from_mime(s))
            .ok_or_else(|| EngineError::unsupported(s.to_string()))
    }
}

fn mime_for(format: ImageFormat) -> Option<&'static str> {
    match format {
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::WebP => Some("image/webp"),
        ImageFormat::Gif => Some("image/gif"),
        ImageFormat::Bmp => Some("image/bmp"),
        _ => None,
    }
}

// ============================================================================
// DECODING
// ============================================================================

/// Decode an in-memory image. Returns the pixels and the detected mime type.
pub fn decode_image(bytes: &[u8]) -> EngineResult<(RasterBuffer, &'static str)> {
    let format = image::guess_format(bytes).map_err(|e| EngineError::decode(e.to_string()))?;
    let mime = mime_for(format)
        .ok_or_else(|| EngineError::decode(format!("unsupported format: {:?}", format)))?;

    let mut reader = ImageReader::with_format(Cursor::new(bytes), format);
    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_DIMENSION);
    limits.max_image_height = Some(MAX_DIMENSION);
    reader.limits(limits);
    let img = reader.decode().map_err(|e| match e {
        image::ImageError::Limits(_) => EngineError::decode(format!("image too large: {e}")),
        other => EngineError::decode(other.to_string()),
    })?;
    let rgba = img.into_rgba8();
    RasterBuffer::check_dimensions(rgba.width(), rgba.height())?;
    Ok((RasterBuffer::from_image(rgba), mime))
}

/// Read and decode `path` into a new layer named after the file, bound to
/// it for save-back.
pub fn load_layer(path: &Path) -> EngineResult<Layer> {
    let bytes = std::fs::read(path)?;
    let (pixels, mime) = decode_image(&bytes)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Image".to_string());
    let mut layer = Layer::from_buffer(name, pixels);
    layer.source = Some(SourceBinding {
        handle: path.to_path_buf(),
        mime: mime.to_string(),
    });
    tracing::info!(
        "Loaded {} ({}x{}, {})",
        path.display(),
        layer.width(),
        layer.height(),
        mime
    );
    Ok(layer)
}

// ============================================================================
// ENCODING
// ============================================================================

/// Encode `buf` in `format`. `quality` (1..=100) only affects JPEG.
pub fn encode(buf: &RasterBuffer, format: ExportFormat, quality: u8) -> EngineResult<Vec<u8>> {
    let (w, h) = buf.dimensions();
    let mut out = Vec::new();
    match format {
        ExportFormat::Png => {
            PngEncoder::new(&mut out).write_image(buf.as_raw(), w, h, ColorType::Rgba8)?;
        }
        ExportFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgba8(buf.image().clone()).to_rgb8();
            let mut encoder = JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
            encoder.encode(rgb.as_raw(), w, h, ColorType::Rgb8)?;
        }
        ExportFormat::Bmp => out = encode_bmp(buf),
        ExportFormat::Webp | ExportFormat::Gif | ExportFormat::Avif => {
            let target = match format {
                ExportFormat::Webp => ImageFormat::WebP,
                ExportFormat::Gif => ImageFormat::Gif,
                _ => ImageFormat::Avif,
            };
            let mut cursor = Cursor::new(Vec::new());
            DynamicImage::ImageRgba8(buf.image().clone())
                .write_to(&mut cursor, ImageOutputFormat::from(target))
                .map_err(|e| match e {
                    image::ImageError::Unsupported(_) => EngineError::unsupported(format.mime()),
                    other => EngineError::Image(other),
                })?;
            out = cursor.into_inner();
        }
    }
    Ok(out)
}

/// Like [`encode`], falling back to PNG when `format` cannot be produced.
/// Returns the bytes and the format actually used.
pub fn encode_with_fallback(buf: &RasterBuffer, format: ExportFormat, quality: u8) -> EngineResult<(Vec<u8>, ExportFormat)> {
    match encode(buf, format, quality) {
        Ok(bytes) => Ok((bytes, format)),
        Err(e) if e.is_unsupported() && format != ExportFormat::Png => {
            tracing::warn!("{} export unavailable ({}), falling back to PNG", format.mime(), e);
            Ok((encode(buf, ExportFormat::Png, quality)?, ExportFormat::Png))
        }
        Err(e) => Err(e),
    }
}

/// Uncompressed 24-bit BMP: 14-byte file header, 40-byte info header,
/// bottom-up BGR rows padded to four bytes. Alpha is dropped.
pub fn encode_bmp(buf: &RasterBuffer) -> Vec<u8> {
    const FILE_HEADER: u32 = 14;
    const INFO_HEADER: u32 = 40;
    let (w, h) = buf.dimensions();
    let row_size = (w * 3 + 3) & !3;
    let pixel_bytes = row_size * h;
    let file_size = FILE_HEADER + INFO_HEADER + pixel_bytes;

    let mut out = Vec::with_capacity(file_size as usize);
    // BITMAPFILEHEADER
    out.extend_from_slice(b"BM");
    out.extend_from_slice(&file_size.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&(FILE_HEADER + INFO_HEADER).to_le_bytes());
    // BITMAPINFOHEADER
    out.extend_from_slice(&INFO_HEADER.to_le_bytes());
    out.extend_from_slice(&(w as i32).to_le_bytes());
    out.extend_from_slice(&(h as i32).to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&24u16.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // BI_RGB
    out.extend_from_slice(&pixel_bytes.to_le_bytes());
    out.extend_from_slice(&0i32.to_le_bytes());
    out.extend_from_slice(&0i32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());

    let pad = (row_size - w * 3) as usize;
    let stride = w as usize * 4;
    let raw = buf.as_raw();
    for y in (0..h as usize).rev() {
        for px in raw[y * stride..(y + 1) * stride].chunks_exact(4) {
            out.extend_from_slice(&[px[2], px[1], px[0]]);
        }
        out.extend(std::iter::repeat_n(0u8, pad));
    }
    out
}

/// Encode to a file, picking the format from the extension (PNG when the
/// extension is unknown) and falling back to PNG when it is unsupported.
pub fn export_to_path(buf: &RasterBuffer, path: &Path, format: Option<ExportFormat>, quality: u8) -> EngineResult<ExportFormat> {
    let format = format.or_else(|| ExportFormat::from_path(path)).unwrap_or_default();
    let (bytes, used) = encode_with_fallback(buf, format, quality)?;
    std::fs::write(path, bytes)?;
    tracing::info!("Exported {} as {}", path.display(), used.mime());
    Ok(used)
}

/// Write a bound layer back in its original format to `sink`. Layers that
/// were not loaded from a file are skipped (`Ok(false)`).
pub fn save_back<W: Write>(layer: &Layer, sink: &mut W, quality: u8) -> EngineResult<bool> {
    let Some(binding) = &layer.source else {
        return Ok(false);
    };
    let format = ExportFormat::from_mime(&binding.mime)
        .ok_or_else(|| EngineError::unsupported(binding.mime.clone()))?;
    let bytes = encode(&layer.pixels, format, quality)?;
    sink.write_all(&bytes)?;
    sink.flush()?;
    tracing::info!("Saved '{}' back as {}", layer.name, binding.mime);
    Ok(true)
}
