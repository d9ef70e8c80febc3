// src/engine.rs
//
// The core of image-adapter. An adapter that:
// 1. Holds one source image (encoded blob, pixel buffer or bitmap)
// 2. Decodes through an injected BitmapDecoder
// 3. Draws onto surfaces from an injected SurfaceFactory and reads them back
//
// This file is a facade over the decomposed modules in engine/

// =============================================================================
// SECURITY LIMITS
// =============================================================================

/// Maximum allowed image dimension (width or height).
/// Images larger than 32768x32768 are rejected to prevent decompression bombs.
/// This is the same limit used by libvips/sharp.
pub const MAX_DIMENSION: u32 = 32768;

/// Maximum allowed total pixels (width * height).
/// 100 megapixels = 400MB uncompressed RGBA. Beyond this is likely malicious.
pub const MAX_PIXELS: u64 = 100_000_000;

// =============================================================================
// MODULE DECOMPOSITION
// =============================================================================

mod api;
mod common;
mod config;
mod decoder;
mod encoder;
mod io;
mod surface;

pub use api::ImageAdapter;
pub use common::{run_with_panic_policy, EngineResult};
pub use config::{AdapterConfig, SurfaceLimits, SurfaceOptions, SHARED_SURFACE_ENV};
pub use decoder::{
    decode_image, decode_image_with_limits, decode_jpeg_mozjpeg,
    decode_png_zune, decode_webp_libwebp, decode_with_image_crate, detect_format,
    ensure_dimensions_safe, BitmapDecoder, RasterDecoder,
};
pub use encoder::{
    encode_jpeg, encode_png, encode_rgba, encode_webp, encode_webp_lossless, flatten_on_black,
    QualitySettings,
};
pub use io::{
    check_region, Bitmap, EncodedBlob, ImageFile, PixelBuffer, SourceImage, SourceKind,
    BYTES_PER_PIXEL,
};
pub use surface::{
    DrawingSurface, ExportFuture, RasterSurface, RasterSurfaceFactory, Surface,
    SurfaceCapabilities, SurfaceFactory, SurfaceKind,
};
