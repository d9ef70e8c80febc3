// src/engine/config.rs
//
// Adapter configuration, drawing-context options and backend size limits.

use crate::engine::{MAX_DIMENSION, MAX_PIXELS};
use crate::error::AdapterError;

/// Environment variable that turns on the shared surface in `AdapterConfig::from_env()`.
pub const SHARED_SURFACE_ENV: &str = "IMAGE_ADAPTER_SHARED_SURFACE";

const STRICT_MAX_DIMENSION: u32 = 16384;
const STRICT_MAX_PIXELS: u64 = 40_000_000; // ~8K x 5K

/// Attributes requested when a 2D drawing context is created.
///
/// The defaults ask for an opaque, CPU-readable context: conversions read
/// pixels back far more often than they display them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SurfaceOptions {
    /// When false the surface is opaque: it starts black and every stored
    /// pixel has alpha 255.
    pub alpha: bool,
    pub will_read_frequently: bool,
    pub desynchronized: bool,
}

impl Default for SurfaceOptions {
    fn default() -> Self {
        Self {
            alpha: false,
            will_read_frequently: true,
            desynchronized: false,
        }
    }
}

impl SurfaceOptions {
    /// Transparent context; pixels keep their alpha.
    pub fn transparent() -> Self {
        Self {
            alpha: true,
            ..Self::default()
        }
    }
}

/// Size limits enforced by the raster backend on decoded images and surfaces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SurfaceLimits {
    pub max_dimension: u32,
    pub max_pixels: u64,
}

impl Default for SurfaceLimits {
    fn default() -> Self {
        Self {
            max_dimension: MAX_DIMENSION,
            max_pixels: MAX_PIXELS,
        }
    }
}

impl SurfaceLimits {
    pub fn strict() -> Self {
        Self {
            max_dimension: STRICT_MAX_DIMENSION,
            max_pixels: STRICT_MAX_PIXELS,
        }
    }

    pub fn unlimited() -> Self {
        Self {
            max_dimension: u32::MAX,
            max_pixels: u64::MAX,
        }
    }

    /// Reject `width` x `height` if either side or the area is over the limit.
    pub fn enforce(&self, width: u32, height: u32) -> Result<(), AdapterError> {
        if width > self.max_dimension || height > self.max_dimension {
            return Err(AdapterError::dimension_exceeds_limit(
                width.max(height),
                self.max_dimension,
            ));
        }
        let pixels = width as u64 * height as u64;
        if pixels > self.max_pixels {
            return Err(AdapterError::pixel_count_exceeds_limit(
                pixels,
                self.max_pixels,
            ));
        }
        Ok(())
    }
}

/// Adapter behaviour chosen at construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct AdapterConfig {
    /// Reuse one adapter-owned surface for every surface-backed conversion.
    ///
    /// Callers that enable this must not overlap conversions on the same
    /// adapter: a second conversion may resize and redraw the surface before
    /// the first one has read it back.
    pub shared_surface: bool,
    pub surface: SurfaceOptions,
}

impl AdapterConfig {
    /// A fresh surface for every conversion.
    pub fn one_shot() -> Self {
        Self::default()
    }

    /// One reusable surface, resized per call.
    pub fn shared() -> Self {
        Self {
            shared_surface: true,
            ..Self::default()
        }
    }

    pub fn with_surface_options(mut self, options: SurfaceOptions) -> Self {
        self.surface = options;
        self
    }

    /// Defaults, with `IMAGE_ADAPTER_SHARED_SURFACE` deciding the sharing mode.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(shared) = std::env::var(SHARED_SURFACE_ENV)
            .ok()
            .and_then(|raw| parse_flag(&raw))
        {
            config.shared_surface = shared;
        }
        config
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
