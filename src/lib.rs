// lib.rs
//
// image-adapter: converts one in-memory image between representations
//
// - encoded blob (PNG / JPEG / WebP bytes plus a MIME type)
// - raw RGBA pixel buffer
// - decoded bitmap handle
// - named file
// - drawing surface, shared or one-shot, onscreen or offscreen
//
// Decoding and rasterisation go through two injected capabilities,
// `BitmapDecoder` and `SurfaceFactory`. `RasterDecoder` and
// `RasterSurfaceFactory` are the CPU implementations shipped with the crate.

pub mod engine;
pub mod error;
pub mod ops;

use image::ImageReader;
use std::io::{BufRead, Cursor, Seek};

pub use engine::{
    AdapterConfig, Bitmap, BitmapDecoder, DrawingSurface, EncodedBlob, ImageAdapter, ImageFile,
    PixelBuffer, RasterDecoder, RasterSurface, RasterSurfaceFactory, SourceImage, SourceKind,
    Surface, SurfaceCapabilities, SurfaceFactory, SurfaceKind, SurfaceLimits, SurfaceOptions,
};
pub use error::{AdapterError, ErrorCategory, Result};
pub use ops::{Dimensions, EncodeOptions, OutputFormat, Region};

/// Header-only image metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectMetadata {
    pub width: u32,
    pub height: u32,
    /// Detected format, lowercase (jpeg, png, webp, ...)
    pub format: Option<String>,
}

fn read_inspect_metadata<R: BufRead + Seek>(reader: R) -> Result<InspectMetadata> {
    let reader = ImageReader::new(reader)
        .with_guessed_format()
        .map_err(|e| AdapterError::decode_failed(format!("failed to read image header: {e}")))?;

    let format = reader.format().map(|f| format!("{:?}", f).to_lowercase());
    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| AdapterError::decode_failed(format!("failed to read dimensions: {e}")))?;

    Ok(InspectMetadata {
        width,
        height,
        format,
    })
}

/// Read width, height and format WITHOUT decoding pixels.
///
/// Useful to reject oversized blobs before handing them to an adapter.
pub fn inspect_header_from_bytes(data: &[u8]) -> Result<InspectMetadata> {
    read_inspect_metadata(Cursor::new(data))
}

/// Get library version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Formats the raster decoder accepts.
pub fn supported_input_formats() -> Vec<String> {
    vec![
        "jpeg".to_string(),
        "jpg".to_string(),
        "png".to_string(),
        "webp".to_string(),
    ]
}

/// Formats a raster surface can export to.
pub fn supported_output_formats() -> Vec<String> {
    vec![
        OutputFormat::Png.extension().to_string(),
        OutputFormat::Jpeg.extension().to_string(),
        OutputFormat::WebP.extension().to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::encode_png;
    use image::{Rgba, RgbaImage};

    #[test]
    fn test_inspect_header_png() {
        let img = RgbaImage::from_pixel(12, 7, Rgba([1, 2, 3, 255]));
        let bytes = encode_png(&img).unwrap();
        let meta = inspect_header_from_bytes(&bytes).unwrap();
        assert_eq!(meta.width, 12);
        assert_eq!(meta.height, 7);
        assert_eq!(meta.format.as_deref(), Some("png"));
    }

    #[test]
    fn test_inspect_header_garbage() {
        let err = inspect_header_from_bytes(b"definitely not an image").unwrap_err();
        assert!(matches!(err, AdapterError::DecodeFailed { .. }));
    }

    #[test]
    fn test_supported_formats() {
        assert!(supported_input_formats().contains(&"webp".to_string()));
        let out = supported_output_formats();
        assert!(out.contains(&"png".to_string()));
        assert!(out.contains(&"jpg".to_string()) || out.contains(&"jpeg".to_string()));
        assert!(!version().is_empty());
    }
}
