// src/engine/decoder.rs
//
// The Bitmap Decoder capability and the raster backend that implements it.
// Encoded sources are routed by magic bytes: JPEG (mozjpeg), PNG (zune-png),
// WebP (libwebp), everything else through the image crate.

use crate::engine::common::{run_with_panic_policy, EngineResult};
use crate::engine::config::SurfaceLimits;
use crate::engine::io::{check_region, Bitmap, EncodedBlob, PixelBuffer, SourceImage};
use crate::error::AdapterError;
use crate::ops::Region;
use image::{
    DynamicImage, GrayAlphaImage, GrayImage, ImageFormat, ImageReader, RgbImage, RgbaImage,
};
use mozjpeg::Decompress;
use std::future::Future;
use std::io::Cursor;
use std::sync::Arc;
use tracing::debug;
use webp::{BitstreamFeatures, Decoder as WebPDecoder};
use zune_core::bytestream::ZCursor;
use zune_core::colorspace::ColorSpace;
use zune_core::options::DecoderOptions;
use zune_png::PngDecoder;

type DecoderResult<T> = EngineResult<T>;

/// Turns any [`SourceImage`] into a decoded [`Bitmap`].
///
/// When `region` is given the result covers only that region. Implementations
/// should crop while decoding where the format allows it instead of building
/// the full bitmap first. Out-of-range regions are the implementation's call.
pub trait BitmapDecoder: Send + Sync {
    fn decode(
        &self,
        source: &SourceImage,
        region: Option<Region>,
    ) -> impl Future<Output = DecoderResult<Bitmap>> + Send;
}

impl<D: BitmapDecoder> BitmapDecoder for Arc<D> {
    fn decode(
        &self,
        source: &SourceImage,
        region: Option<Region>,
    ) -> impl Future<Output = DecoderResult<Bitmap>> + Send {
        (**self).decode(source, region)
    }
}

/// CPU decoder backed by mozjpeg, zune-png, libwebp and the image crate.
///
/// Regions must be non-empty and lie inside the source; anything else fails
/// with `InvalidRegionDimensions` / `InvalidRegionBounds`.
#[derive(Clone, Debug, Default)]
pub struct RasterDecoder {
    limits: SurfaceLimits,
}

impl RasterDecoder {
    pub fn new(limits: SurfaceLimits) -> Self {
        Self { limits }
    }

    /// Synchronous body of [`BitmapDecoder::decode`].
    pub fn decode_sync(
        &self,
        source: &SourceImage,
        region: Option<Region>,
    ) -> DecoderResult<Bitmap> {
        match source {
            SourceImage::Encoded(blob) => self.decode_blob(blob, region),
            SourceImage::Pixels(buffer) => self.decode_pixels(buffer, region),
            SourceImage::Bitmap(bitmap) => crop_bitmap(bitmap, region),
        }
    }

    fn decode_blob(&self, blob: &EncodedBlob, region: Option<Region>) -> DecoderResult<Bitmap> {
        let (img, format) = decode_image_with_limits(blob.bytes(), &self.limits)?;
        debug!(
            target: "image_adapter::decode",
            format = ?format,
            width = img.width(),
            height = img.height(),
            "decoded blob"
        );
        // The codecs decode whole frames. Crop before the RGBA conversion so
        // only the region is converted and kept.
        let rgba = match region {
            None => img.into_rgba8(),
            Some(r) => {
                check_region(r, img.width(), img.height())?;
                img.crop_imm(r.x, r.y, r.width, r.height).into_rgba8()
            }
        };
        Ok(Bitmap::new(rgba))
    }

    fn decode_pixels(
        &self,
        buffer: &PixelBuffer,
        region: Option<Region>,
    ) -> DecoderResult<Bitmap> {
        self.limits.enforce(buffer.width(), buffer.height())?;
        match region {
            None => Ok(Bitmap::from_pixels(buffer.clone())),
            // Copies only the region rows
            Some(r) => Ok(Bitmap::from_pixels(buffer.crop(r)?)),
        }
    }
}

impl BitmapDecoder for RasterDecoder {
    async fn decode(
        &self,
        source: &SourceImage,
        region: Option<Region>,
    ) -> DecoderResult<Bitmap> {
        self.decode_sync(source, region)
    }
}

fn crop_bitmap(bitmap: &Bitmap, region: Option<Region>) -> DecoderResult<Bitmap> {
    match region {
        None => Ok(bitmap.clone()),
        Some(r) => Ok(Bitmap::from_pixels(bitmap.pixels().crop(r)?)),
    }
}

/// Decode JPEG using mozjpeg (backed by libjpeg-turbo)
pub fn decode_jpeg_mozjpeg(data: &[u8], limits: &SurfaceLimits) -> DecoderResult<DynamicImage> {
    run_with_panic_policy("decode:mozjpeg", || {
        if !data.windows(2).any(|pair| pair == [0xFF, 0xD9]) {
            return Err(AdapterError::decode_failed(
                "mozjpeg: missing JPEG EOI marker",
            ));
        }

        let decompress = Decompress::new_mem(data).map_err(|e| {
            AdapterError::decode_failed(format!("mozjpeg decompress init failed: {e:?}"))
        })?;

        let mut decompress = decompress.rgb().map_err(|e| {
            AdapterError::decode_failed(format!("mozjpeg rgb conversion failed: {e:?}"))
        })?;

        let width = u32::try_from(decompress.width())
            .map_err(|_| AdapterError::dimension_exceeds_limit(u32::MAX, limits.max_dimension))?;
        let height = u32::try_from(decompress.height())
            .map_err(|_| AdapterError::dimension_exceeds_limit(u32::MAX, limits.max_dimension))?;
        limits.enforce(width, height)?;

        let pixels: Vec<[u8; 3]> = decompress.read_scanlines().map_err(|e| {
            AdapterError::decode_failed(format!("mozjpeg: failed to read scanlines: {e:?}"))
        })?;
        let flat_pixels: Vec<u8> = pixels.into_iter().flatten().collect();

        let rgb_image = RgbImage::from_raw(width, height, flat_pixels).ok_or_else(|| {
            AdapterError::decode_failed("mozjpeg: failed to create image from raw data")
        })?;

        Ok(DynamicImage::ImageRgb8(rgb_image))
    })
}

/// Decode non-JPEG formats using the image crate under the panic policy.
pub fn decode_with_image_crate(data: &[u8]) -> DecoderResult<DynamicImage> {
    run_with_panic_policy("decode:image", || {
        image::load_from_memory(data)
            .map_err(|e| AdapterError::decode_failed(format!("decode failed: {e}")))
    })
}

/// Decode PNG using zune-png. 16-bit input is stripped to 8 bits.
pub fn decode_png_zune(data: &[u8], limits: &SurfaceLimits) -> DecoderResult<DynamicImage> {
    run_with_panic_policy("decode:png", || {
        let options = DecoderOptions::default().png_set_strip_to_8bit(true);
        let mut decoder = PngDecoder::new_with_options(ZCursor::new(data), options);
        decoder
            .decode_headers()
            .map_err(|e| AdapterError::decode_failed(format!("png: bad header: {e}")))?;
        let info = decoder
            .info()
            .ok_or_else(|| AdapterError::decode_failed("png: missing header info"))?;
        let width = info.width as u32;
        let height = info.height as u32;
        limits.enforce(width, height)?;

        let pixels = decoder
            .decode()
            .map_err(|e| AdapterError::decode_failed(format!("png: decode failed: {e}")))?;
        let buf = match pixels {
            zune_core::result::DecodingResult::U8(v) => v,
            _ => {
                return Err(AdapterError::decode_failed(
                    "png: unexpected non-U8 pixel buffer",
                ))
            }
        };

        let colorspace = decoder
            .colorspace()
            .ok_or_else(|| AdapterError::decode_failed("png: missing colorspace"))?;

        let img = match colorspace {
            ColorSpace::RGB => RgbImage::from_raw(width, height, buf)
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(|| AdapterError::decode_failed("png: failed to build RGB image"))?,
            ColorSpace::RGBA => RgbaImage::from_raw(width, height, buf)
                .map(DynamicImage::ImageRgba8)
                .ok_or_else(|| AdapterError::decode_failed("png: failed to build RGBA image"))?,
            ColorSpace::Luma => GrayImage::from_raw(width, height, buf)
                .map(DynamicImage::ImageLuma8)
                .ok_or_else(|| AdapterError::decode_failed("png: failed to build Luma image"))?,
            ColorSpace::LumaA => GrayAlphaImage::from_raw(width, height, buf)
                .map(DynamicImage::ImageLumaA8)
                .ok_or_else(|| AdapterError::decode_failed("png: failed to build LumaA image"))?,
            other => {
                return Err(AdapterError::decode_failed(format!(
                    "png: unsupported colorspace {:?}",
                    other
                )))
            }
        };

        Ok(img)
    })
}

/// Decode WebP using libwebp. Animated WebP falls back to the image crate.
pub fn decode_webp_libwebp(data: &[u8], limits: &SurfaceLimits) -> DecoderResult<DynamicImage> {
    run_with_panic_policy("decode:webp", || {
        // Parse header first to avoid allocating huge buffers on malformed files
        let features = BitstreamFeatures::new(data).ok_or_else(|| {
            AdapterError::decode_failed("webp: failed to read bitstream features")
        })?;

        if features.has_animation() {
            return image::load_from_memory(data).map_err(|e| {
                AdapterError::decode_failed(format!("webp (animated) decode failed: {e}"))
            });
        }

        limits.enforce(features.width(), features.height())?;

        let decoded = WebPDecoder::new(data)
            .decode()
            .ok_or_else(|| AdapterError::decode_failed("webp: decode failed"))?;

        limits.enforce(decoded.width(), decoded.height())?;

        Ok(decoded.to_image())
    })
}

/// Detect input format using magic bytes. Returns None if unknown.
pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
    image::guess_format(bytes).ok()
}

/// Unified decode entrypoint with the default limits.
pub fn decode_image(bytes: &[u8]) -> DecoderResult<(DynamicImage, Option<ImageFormat>)> {
    decode_image_with_limits(bytes, &SurfaceLimits::default())
}

/// Detect the format once, route to the matching decoder, and return the
/// decoded image with the detected format.
pub fn decode_image_with_limits(
    bytes: &[u8],
    limits: &SurfaceLimits,
) -> DecoderResult<(DynamicImage, Option<ImageFormat>)> {
    if bytes.is_empty() {
        return Err(AdapterError::decode_failed("empty input"));
    }
    ensure_dimensions_safe(bytes, limits)?;
    let detected = detect_format(bytes);
    let img = match detected {
        Some(ImageFormat::Jpeg) => decode_jpeg_mozjpeg(bytes, limits)?,
        Some(ImageFormat::Png) => decode_png_zune(bytes, limits)?,
        Some(ImageFormat::WebP) => decode_webp_libwebp(bytes, limits)?,
        Some(_) => decode_with_image_crate(bytes)?,
        None => return Err(AdapterError::unsupported_format("unknown")),
    };
    limits.enforce(img.width(), img.height())?;
    Ok((img, detected))
}

/// Read the header and reject oversized images before decoding.
/// Headers that cannot be read are left for the decoder to report.
pub fn ensure_dimensions_safe(bytes: &[u8], limits: &SurfaceLimits) -> DecoderResult<()> {
    let cursor = Cursor::new(bytes);
    if let Ok(reader) = ImageReader::new(cursor).with_guessed_format() {
        if let Ok((width, height)) = reader.into_dimensions() {
            return limits.enforce(width, height);
        }
    }
    Ok(())
}
