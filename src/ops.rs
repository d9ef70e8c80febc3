// src/ops.rs
//
// Request parameters for conversions: regions and encode options.
// These are small Copy/Clone values; nothing here touches pixels.

use std::str::FromStr;
use tracing::warn;

/// Default JPEG quality when none (or an out-of-range value) is given.
pub const DEFAULT_JPEG_QUALITY: f32 = 0.92;

/// Default WebP quality when none (or an out-of-range value) is given.
pub const DEFAULT_WEBP_QUALITY: f32 = 0.80;

/// Width and height of an image, in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// A rectangle in source-image coordinates.
///
/// No invariant ties a region to the image it is applied to. Whether an
/// out-of-range region is clipped or rejected is up to the decoder or
/// surface that receives it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The whole extent of a `width` x `height` image.
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Exclusive right edge, saturating instead of wrapping.
    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    /// Exclusive bottom edge, saturating instead of wrapping.
    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }

    /// True when the region lies entirely inside a `width` x `height` image.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.x as u64 + self.width as u64 <= width as u64
            && self.y as u64 + self.height as u64 <= height as u64
    }

    /// Same size, moved to the origin.
    pub fn at_origin(&self) -> Self {
        Self::full(self.width, self.height)
    }
}

impl From<Dimensions> for Region {
    fn from(dims: Dimensions) -> Self {
        Region::full(dims.width, dims.height)
    }
}

/// Output format for encoding
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Png,
    Jpeg,
    WebP,
}

/// Parse a short format name ("png", "jpg", "webp", ...).
impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(format: &str) -> Result<Self, Self::Err> {
        match format.to_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            "webp" => Ok(Self::WebP),
            other => Err(format!("unsupported format: {other}")),
        }
    }
}

impl OutputFormat {
    /// Parse a MIME type ("image/png", ...). Parameters after `;` are ignored.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim().to_lowercase();
        match essence.as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/webp" => Some(Self::WebP),
            _ => None,
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::WebP => "webp",
        }
    }
}

/// Format and quality for a surface export.
///
/// `quality` follows the canvas convention: a number in `0.0..=1.0`,
/// ignored for PNG, and replaced by the format default when out of range.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct EncodeOptions {
    pub format: OutputFormat,
    pub quality: Option<f32>,
}

impl EncodeOptions {
    pub fn new(format: OutputFormat, quality: Option<f32>) -> Self {
        Self { format, quality }
    }

    pub fn png() -> Self {
        Self::new(OutputFormat::Png, None)
    }

    pub fn jpeg(quality: f32) -> Self {
        Self::new(OutputFormat::Jpeg, Some(quality))
    }

    pub fn webp(quality: f32) -> Self {
        Self::new(OutputFormat::WebP, Some(quality))
    }

    /// Build options from a MIME type string.
    ///
    /// Unknown or missing types fall back to PNG, which is what a canvas
    /// export does.
    pub fn from_mime(mime: Option<&str>, quality: Option<f32>) -> Self {
        let format = match mime {
            None => OutputFormat::Png,
            Some(m) => OutputFormat::from_mime(m).unwrap_or_else(|| {
                warn!(target: "image_adapter::export", mime = m, "unsupported export type, falling back to image/png");
                OutputFormat::Png
            }),
        };
        Self::new(format, quality)
    }

    /// The quality actually used, in `0.0..=1.0`. `None` for lossless formats.
    pub fn effective_quality(&self) -> Option<f32> {
        let default = match self.format {
            OutputFormat::Png => return None,
            OutputFormat::Jpeg => DEFAULT_JPEG_QUALITY,
            OutputFormat::WebP => DEFAULT_WEBP_QUALITY,
        };
        Some(match self.quality {
            Some(q) if (0.0..=1.0).contains(&q) => q,
            _ => default,
        })
    }

    /// Effective quality on the 0-100 scale used by the encoders.
    pub fn quality_percent(&self) -> Option<u8> {
        self.effective_quality()
            .map(|q| (q * 100.0).round().clamp(0.0, 100.0) as u8)
    }
}
