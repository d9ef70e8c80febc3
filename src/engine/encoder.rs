// src/engine/encoder.rs
//
// Encoders used by surface export: JPEG (mozjpeg), PNG (image crate), WebP (libwebp).
// All of them take the surface's RGBA8 pixels.

use crate::engine::common::{run_with_panic_policy, EngineResult};
use crate::error::AdapterError;
use crate::ops::{EncodeOptions, OutputFormat};
use image::{ImageFormat, RgbaImage};
use mozjpeg::{ColorSpace, Compress, ScanMode};
use std::io::Cursor;

type EncoderResult<T> = EngineResult<T>;

/// Single source of truth for deriving per-format encoder settings from a
/// 0-100 quality value. Bands:
/// - High (>=85)
/// - Balanced (70-84)
/// - Fast (50-69)
/// - Fastest (<50)
#[derive(Debug, Clone, Copy)]
pub struct QualitySettings {
    quality: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QualityBand {
    High,
    Balanced,
    Fast,
    Fastest,
}

impl QualitySettings {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.min(100) as f32,
        }
    }

    pub fn quality(&self) -> f32 {
        self.quality
    }

    fn band(&self) -> QualityBand {
        if self.quality >= 85.0 {
            QualityBand::High
        } else if self.quality >= 70.0 {
            QualityBand::Balanced
        } else if self.quality >= 50.0 {
            QualityBand::Fast
        } else {
            QualityBand::Fastest
        }
    }

    pub fn webp_method(&self) -> i32 {
        4
    }

    pub fn webp_sns_strength(&self) -> i32 {
        match self.band() {
            QualityBand::High => 50,
            QualityBand::Balanced => 70,
            QualityBand::Fast | QualityBand::Fastest => 80,
        }
    }

    pub fn webp_filter_strength(&self) -> i32 {
        if self.quality >= 80.0 {
            20
        } else if self.quality >= 60.0 {
            30
        } else {
            40
        }
    }

    pub fn webp_filter_sharpness(&self) -> i32 {
        match self.band() {
            QualityBand::High => 2,
            QualityBand::Balanced | QualityBand::Fast | QualityBand::Fastest => 0,
        }
    }

    pub fn jpeg_smoothing(&self) -> u8 {
        if self.quality >= 90.0 {
            0
        } else if self.quality >= 70.0 {
            5
        } else if self.quality >= 60.0 {
            10
        } else {
            18
        }
    }
}

/// Encode `img` according to `options`.
pub fn encode_rgba(img: &RgbaImage, options: &EncodeOptions) -> EncoderResult<Vec<u8>> {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return Err(AdapterError::export_failed(
            options.format.mime(),
            format!("surface has zero area ({w}x{h})"),
        ));
    }
    match options.format {
        OutputFormat::Png => encode_png(img),
        OutputFormat::Jpeg => encode_jpeg(img, options.quality_percent().unwrap_or(92)),
        OutputFormat::WebP => {
            if options.effective_quality() == Some(1.0) {
                encode_webp_lossless(img)
            } else {
                encode_webp(img, options.quality_percent().unwrap_or(80))
            }
        }
    }
}

/// Flatten RGBA onto opaque black, the way a canvas exports to formats
/// without alpha.
pub fn flatten_on_black(img: &RgbaImage) -> Vec<u8> {
    let mut out = Vec::with_capacity(img.width() as usize * img.height() as usize * 3);
    for px in img.pixels() {
        let [r, g, b, a] = px.0;
        let a = a as u16;
        out.push(((r as u16 * a + 127) / 255) as u8);
        out.push(((g as u16 * a + 127) / 255) as u8);
        out.push(((b as u16 * a + 127) / 255) as u8);
    }
    out
}

/// Encode to JPEG using mozjpeg with web-oriented settings
pub fn encode_jpeg(img: &RgbaImage, quality: u8) -> EncoderResult<Vec<u8>> {
    run_with_panic_policy("encode:jpeg", || {
        let (w, h) = img.dimensions();
        let pixels = flatten_on_black(img);
        let expected_len = (w as usize) * (h as usize) * 3;
        if pixels.len() != expected_len {
            return Err(AdapterError::corrupted_image());
        }

        let settings = QualitySettings::new(quality);
        let mut comp = Compress::new(ColorSpace::JCS_RGB);
        comp.set_size(w as usize, h as usize);
        comp.set_color_space(ColorSpace::JCS_YCbCr);
        comp.set_chroma_sampling_pixel_sizes((2, 2), (2, 2));
        comp.set_progressive_mode();
        comp.set_optimize_coding(true);
        comp.set_optimize_scans(true);
        comp.set_scan_optimization_mode(ScanMode::AllComponentsTogether);
        comp.set_smoothing_factor(settings.jpeg_smoothing());
        // The scan settings above reset the quantization tables; quality must come last.
        comp.set_quality(settings.quality());

        let estimated_size = (w as usize * h as usize * 3 / 10).max(4096);
        let mut output = Vec::with_capacity(estimated_size);
        {
            let mut writer = comp.start_compress(&mut output).map_err(|e| {
                AdapterError::export_failed(
                    "image/jpeg",
                    format!("mozjpeg: failed to start compress: {e:?}"),
                )
            })?;

            let stride = w as usize * 3;
            for row in pixels.chunks(stride) {
                writer.write_scanlines(row).map_err(|e| {
                    AdapterError::export_failed(
                        "image/jpeg",
                        format!("mozjpeg: failed to write scanlines: {e:?}"),
                    )
                })?;
            }

            writer.finish().map_err(|e| {
                AdapterError::export_failed(
                    "image/jpeg",
                    format!("mozjpeg: failed to finish: {e:?}"),
                )
            })?;
        }
        Ok(output)
    })
}

/// Encode to PNG using the image crate
pub fn encode_png(img: &RgbaImage) -> EncoderResult<Vec<u8>> {
    run_with_panic_policy("encode:png", || {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .map_err(|e| {
                AdapterError::export_failed("image/png", format!("PNG encode failed: {e}"))
            })?;
        Ok(buf)
    })
}

/// Encode to lossy WebP, keeping the alpha channel
pub fn encode_webp(img: &RgbaImage, quality: u8) -> EncoderResult<Vec<u8>> {
    run_with_panic_policy("encode:webp", || {
        let (w, h) = img.dimensions();
        let encoder = webp::Encoder::from_rgba(img.as_raw(), w, h);

        let mut config = webp::WebPConfig::new()
            .map_err(|_| AdapterError::internal_panic("failed to create WebPConfig"))?;

        let settings = QualitySettings::new(quality);
        config.quality = settings.quality();
        config.method = settings.webp_method();
        config.pass = 1;
        config.preprocessing = 0;
        config.sns_strength = settings.webp_sns_strength();
        config.autofilter = 1;
        config.filter_strength = settings.webp_filter_strength();
        config.filter_sharpness = settings.webp_filter_sharpness();

        let mem = encoder.encode_advanced(&config).map_err(|e| {
            AdapterError::export_failed("image/webp", format!("WebP encode failed: {e:?}"))
        })?;

        Ok(mem.to_vec())
    })
}

/// Encode to lossless WebP
pub fn encode_webp_lossless(img: &RgbaImage) -> EncoderResult<Vec<u8>> {
    run_with_panic_policy("encode:webp:lossless", || {
        let (w, h) = img.dimensions();
        let encoder = webp::Encoder::from_rgba(img.as_raw(), w, h);
        Ok(encoder.encode_lossless().to_vec())
    })
}
