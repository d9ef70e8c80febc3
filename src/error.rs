// src/error.rs
//
// Unified error handling for image-adapter
// Uses thiserror for simple, type-safe error handling
//
// Error Taxonomy:
// - UserError: Invalid input or call order, recoverable
// - CodecError: Format/encoding issues
// - ResourceLimit: Surface/dimension limits and platform constraints
// - InternalBug: Library bugs (should not happen)

use std::borrow::Cow;
use thiserror::Error;

/// Error taxonomy for callers that want to branch on the kind of failure
/// rather than on individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCategory {
    /// Invalid input or call order, recoverable by the caller
    UserError,
    /// Format/encoding issues
    CodecError,
    /// Surface/dimension limits and missing platform capabilities
    ResourceLimit,
    /// Library bugs (should not happen)
    InternalBug,
}

/// image-adapter error types
///
/// Every conversion either completes or fails with one of these. There is no
/// partial result and no retry.
#[derive(Debug, Error)]
pub enum AdapterError {
    // Adapter state
    #[error("No image bound to the adapter. Call set_image() or pass an image at construction")]
    NoImageBound,

    // Drawing
    #[error("Cannot draw {kind} source onto a surface: {reason}")]
    UnsupportedSourceForDraw {
        kind: Cow<'static, str>,
        reason: Cow<'static, str>,
    },

    #[error("Drawing surface unavailable: {reason}")]
    SurfaceUnavailable { reason: Cow<'static, str> },

    #[error("Platform does not support {feature}")]
    PlatformUnsupported { feature: Cow<'static, str> },

    // Export
    #[error("Failed to export surface as {format}: {message}")]
    ExportFailed {
        format: Cow<'static, str>,
        message: Cow<'static, str>,
    },

    #[error("Failed to write file '{path}': {source}")]
    FileWriteFailed {
        path: Cow<'static, str>,
        #[source]
        source: std::io::Error,
    },

    // Decode Errors
    #[error("Unsupported image format: {format}")]
    UnsupportedFormat { format: Cow<'static, str> },

    #[error("Failed to decode image: {message}")]
    DecodeFailed { message: Cow<'static, str> },

    #[error("Corrupted image data")]
    CorruptedImage,

    // Size Limit Errors
    #[error("Image dimension {dimension} exceeds maximum {max}")]
    DimensionExceedsLimit { dimension: u32, max: u32 },

    #[error("Image pixel count {pixels} exceeds maximum {max}")]
    PixelCountExceedsLimit { pixels: u64, max: u64 },

    // Region Errors
    #[error("Region ({x}+{width}, {y}+{height}) exceeds image dimensions ({img_width}x{img_height})")]
    InvalidRegionBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        img_width: u32,
        img_height: u32,
    },

    #[error("Invalid region dimensions: width={width}, height={height}")]
    InvalidRegionDimensions { width: u32, height: u32 },

    #[error("Invalid value for {name}: {value}. {reason}")]
    InvalidArgument {
        name: Cow<'static, str>,
        value: Cow<'static, str>,
        reason: Cow<'static, str>,
    },

    // Internal Errors
    #[error("Internal error: {message}")]
    InternalPanic { message: Cow<'static, str> },
}

impl Clone for AdapterError {
    fn clone(&self) -> Self {
        match self {
            Self::NoImageBound => Self::NoImageBound,
            Self::UnsupportedSourceForDraw { kind, reason } => Self::UnsupportedSourceForDraw {
                kind: kind.clone(),
                reason: reason.clone(),
            },
            Self::SurfaceUnavailable { reason } => Self::SurfaceUnavailable {
                reason: reason.clone(),
            },
            Self::PlatformUnsupported { feature } => Self::PlatformUnsupported {
                feature: feature.clone(),
            },
            Self::ExportFailed { format, message } => Self::ExportFailed {
                format: format.clone(),
                message: message.clone(),
            },
            Self::FileWriteFailed { path, source } => Self::FileWriteFailed {
                path: path.clone(),
                source: std::io::Error::new(source.kind(), source.to_string()),
            },
            Self::UnsupportedFormat { format } => Self::UnsupportedFormat {
                format: format.clone(),
            },
            Self::DecodeFailed { message } => Self::DecodeFailed {
                message: message.clone(),
            },
            Self::CorruptedImage => Self::CorruptedImage,
            Self::DimensionExceedsLimit { dimension, max } => Self::DimensionExceedsLimit {
                dimension: *dimension,
                max: *max,
            },
            Self::PixelCountExceedsLimit { pixels, max } => Self::PixelCountExceedsLimit {
                pixels: *pixels,
                max: *max,
            },
            Self::InvalidRegionBounds {
                x,
                y,
                width,
                height,
                img_width,
                img_height,
            } => Self::InvalidRegionBounds {
                x: *x,
                y: *y,
                width: *width,
                height: *height,
                img_width: *img_width,
                img_height: *img_height,
            },
            Self::InvalidRegionDimensions { width, height } => Self::InvalidRegionDimensions {
                width: *width,
                height: *height,
            },
            Self::InvalidArgument {
                name,
                value,
                reason,
            } => Self::InvalidArgument {
                name: name.clone(),
                value: value.clone(),
                reason: reason.clone(),
            },
            Self::InternalPanic { message } => Self::InternalPanic {
                message: message.clone(),
            },
        }
    }
}

// Constructor Helpers
impl AdapterError {
    pub fn no_image_bound() -> Self {
        Self::NoImageBound
    }

    pub fn unsupported_source_for_draw(
        kind: impl Into<Cow<'static, str>>,
        reason: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::UnsupportedSourceForDraw {
            kind: kind.into(),
            reason: reason.into(),
        }
    }

    pub fn surface_unavailable(reason: impl Into<Cow<'static, str>>) -> Self {
        Self::SurfaceUnavailable {
            reason: reason.into(),
        }
    }

    pub fn platform_unsupported(feature: impl Into<Cow<'static, str>>) -> Self {
        Self::PlatformUnsupported {
            feature: feature.into(),
        }
    }

    pub fn export_failed(
        format: impl Into<Cow<'static, str>>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::ExportFailed {
            format: format.into(),
            message: message.into(),
        }
    }

    pub fn file_write_failed(path: impl Into<Cow<'static, str>>, source: std::io::Error) -> Self {
        Self::FileWriteFailed {
            path: path.into(),
            source,
        }
    }

    pub fn unsupported_format(format: impl Into<Cow<'static, str>>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    pub fn decode_failed(message: impl Into<Cow<'static, str>>) -> Self {
        Self::DecodeFailed {
            message: message.into(),
        }
    }

    pub fn corrupted_image() -> Self {
        Self::CorruptedImage
    }

    pub fn dimension_exceeds_limit(dimension: u32, max: u32) -> Self {
        Self::DimensionExceedsLimit { dimension, max }
    }

    pub fn pixel_count_exceeds_limit(pixels: u64, max: u64) -> Self {
        Self::PixelCountExceedsLimit { pixels, max }
    }

    pub fn invalid_region_bounds(
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        img_width: u32,
        img_height: u32,
    ) -> Self {
        Self::InvalidRegionBounds {
            x,
            y,
            width,
            height,
            img_width,
            img_height,
        }
    }

    pub fn invalid_region_dimensions(width: u32, height: u32) -> Self {
        Self::InvalidRegionDimensions { width, height }
    }

    pub fn invalid_argument(
        name: impl Into<Cow<'static, str>>,
        value: impl Into<Cow<'static, str>>,
        reason: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn internal_panic(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InternalPanic {
            message: message.into(),
        }
    }

    /// Check if this error is recoverable (caller can fix it)
    ///
    /// Consistent with category():
    /// - UserError errors are always recoverable
    /// - ResourceLimit errors are recoverable (smaller region, other backend, etc.)
    /// - CodecError and InternalBug errors are not recoverable
    pub fn is_recoverable(&self) -> bool {
        match self.category() {
            ErrorCategory::UserError | ErrorCategory::ResourceLimit => true,
            ErrorCategory::CodecError | ErrorCategory::InternalBug => false,
        }
    }

    /// Get the error category for this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NoImageBound
            | Self::UnsupportedSourceForDraw { .. }
            | Self::InvalidRegionBounds { .. }
            | Self::InvalidRegionDimensions { .. }
            | Self::InvalidArgument { .. } => ErrorCategory::UserError,

            Self::UnsupportedFormat { .. }
            | Self::DecodeFailed { .. }
            | Self::CorruptedImage
            | Self::ExportFailed { .. } => ErrorCategory::CodecError,

            // FileWriteFailed sits here because the usual causes (disk full,
            // permissions) are environmental, like a missing surface.
            Self::DimensionExceedsLimit { .. }
            | Self::PixelCountExceedsLimit { .. }
            | Self::SurfaceUnavailable { .. }
            | Self::PlatformUnsupported { .. }
            | Self::FileWriteFailed { .. } => ErrorCategory::ResourceLimit,

            Self::InternalPanic { .. } => ErrorCategory::InternalBug,
        }
    }
}

impl ErrorCategory {
    /// Get string representation of error category
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::UserError => "UserError",
            ErrorCategory::CodecError => "CodecError",
            ErrorCategory::ResourceLimit => "ResourceLimit",
            ErrorCategory::InternalBug => "InternalBug",
        }
    }

    /// Get the IMAGE_ADAPTER_* error code string for this category
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCategory::UserError => "IMAGE_ADAPTER_USER_ERROR",
            ErrorCategory::CodecError => "IMAGE_ADAPTER_CODEC_ERROR",
            ErrorCategory::ResourceLimit => "IMAGE_ADAPTER_RESOURCE_LIMIT",
            ErrorCategory::InternalBug => "IMAGE_ADAPTER_INTERNAL_BUG",
        }
    }
}

// Result type alias
pub type Result<T> = std::result::Result<T, AdapterError>;
