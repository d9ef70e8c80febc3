// src/engine/api.rs
//
// ImageAdapter: holds one source image and converts it to pixel buffers,
// encoded blobs, bitmaps, files and drawing surfaces.
// This is the main public API of the crate.

use crate::engine::config::AdapterConfig;
use crate::engine::decoder::BitmapDecoder;
use crate::engine::io::{Bitmap, EncodedBlob, ImageFile, PixelBuffer, SourceImage};
use crate::engine::surface::{
    DrawingSurface, Surface, SurfaceCapabilities, SurfaceFactory, SurfaceKind,
};
use crate::error::{AdapterError, Result};
use crate::ops::{Dimensions, EncodeOptions, Region};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, trace};

/// Converts one bound source image between representations.
///
/// Usage:
/// ```no_run
/// # async fn run(png: Vec<u8>) -> image_adapter::Result<()> {
/// use image_adapter::{
///     AdapterConfig, EncodedBlob, ImageAdapter, RasterDecoder, RasterSurfaceFactory, Region,
/// };
///
/// let blob = EncodedBlob::new(png, "image/png");
/// let adapter = ImageAdapter::new(
///     RasterDecoder::default(),
///     RasterSurfaceFactory::default(),
///     Some(blob.into()),
///     AdapterConfig::default(),
/// )?;
/// let pixels = adapter.to_pixel_buffer(Some(Region::new(0, 0, 16, 16))).await?;
/// assert_eq!(pixels.width(), 16);
/// # Ok(())
/// # }
/// ```
pub struct ImageAdapter<D, F: SurfaceFactory> {
    decoder: D,
    factory: F,
    /// The bound source. Conversions fail with `NoImageBound` while unset.
    image: Option<SourceImage>,
    config: AdapterConfig,
    /// Adapter-owned surface, present only when `config.shared_surface` is set.
    shared: Option<Arc<Mutex<F::Surface>>>,
}

impl<D, F: SurfaceFactory> fmt::Debug for ImageAdapter<D, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageAdapter")
            .field("image", &self.image.as_ref().map(SourceImage::kind))
            .field("config", &self.config)
            .field("shared", &self.shared.is_some())
            .finish_non_exhaustive()
    }
}

impl<D, F> ImageAdapter<D, F>
where
    D: BitmapDecoder,
    F: SurfaceFactory,
{
    // =========================================================================
    // CONSTRUCTION & BINDING
    // =========================================================================

    /// Create an adapter. With `config.shared_surface` set, the reusable
    /// surface is allocated here (0x0, onscreen), so a factory that cannot
    /// provide one fails construction with `SurfaceUnavailable`.
    pub fn new(
        decoder: D,
        factory: F,
        image: Option<SourceImage>,
        config: AdapterConfig,
    ) -> Result<Self> {
        let shared = if config.shared_surface {
            let surface = factory.create(SurfaceKind::Onscreen, 0, 0, &config.surface)?;
            trace!(target: "image_adapter::surface", "allocated shared surface");
            Some(Arc::new(Mutex::new(surface)))
        } else {
            None
        };
        Ok(Self {
            decoder,
            factory,
            image,
            config,
            shared,
        })
    }

    /// Rebind the source. Nothing is validated or released.
    pub fn set_image(&mut self, image: impl Into<SourceImage>) -> &mut Self {
        self.image = Some(image.into());
        self
    }

    pub fn image(&self) -> Option<&SourceImage> {
        self.image.as_ref()
    }

    pub fn clear_image(&mut self) -> Option<SourceImage> {
        self.image.take()
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    fn source(&self) -> Result<&SourceImage> {
        self.image.as_ref().ok_or_else(AdapterError::no_image_bound)
    }

    // =========================================================================
    // DECODING
    // =========================================================================

    /// Decode the bound source, cropped to `region` when given.
    /// Every call returns a new handle.
    pub async fn decode(&self, region: Option<Region>) -> Result<Bitmap> {
        let source = self.source()?;
        self.decoder.decode(source, region).await
    }

    /// Alias of [`decode`](Self::decode).
    pub async fn to_image_bitmap(&self, region: Option<Region>) -> Result<Bitmap> {
        self.decode(region).await
    }

    /// Width and height of the bound source, read from a full decode.
    pub async fn probe_resolution(&self) -> Result<Dimensions> {
        let bitmap = self.decode(None).await?;
        let dims = bitmap.dimensions();
        bitmap.close();
        Ok(dims)
    }

    async fn resolve_region(&self, region: Option<Region>) -> Result<Region> {
        match region {
            Some(r) => Ok(r),
            None => Ok(Region::from(self.probe_resolution().await?)),
        }
    }

    /// The image to draw and the part of it to draw.
    ///
    /// Encoded sources are decoded first, cropped to `region`, so the bitmap
    /// is drawn from its origin. Other sources are drawn as they are.
    async fn drawable(&self, region: Option<Region>) -> Result<(SourceImage, Region)> {
        let source = self.source()?;
        match source {
            SourceImage::Encoded(_) => {
                let bitmap = self.decoder.decode(source, region).await?;
                let target = match region {
                    Some(r) => r.at_origin(),
                    None => Region::from(bitmap.dimensions()),
                };
                trace!(
                    target: "image_adapter::decode",
                    width = bitmap.width(),
                    height = bitmap.height(),
                    "decoded blob for drawing"
                );
                Ok((SourceImage::Bitmap(bitmap), target))
            }
            SourceImage::Pixels(_) | SourceImage::Bitmap(_) => {
                Ok((source.clone(), self.resolve_region(region).await?))
            }
        }
    }

    // =========================================================================
    // SURFACES
    // =========================================================================

    /// Draw `region` of the bound source at the origin of a surface sized to
    /// the region.
    ///
    /// The shared surface is used when `prefer_shared` is set and the adapter
    /// owns one; otherwise a fresh onscreen surface is created. The bound
    /// source is drawn as it is, so an encoded source fails with
    /// `UnsupportedSourceForDraw`, as do pixel buffers on a factory without
    /// `PUT_PIXELS`. The async conversions decode blobs before calling this.
    pub fn materialize_surface(
        &self,
        region: Region,
        prefer_shared: bool,
    ) -> Result<DrawingSurface<F::Surface>> {
        let source = self.source()?;
        self.draw_source(source, region, prefer_shared)
    }

    /// The bound source on an onscreen surface, honouring the adapter's
    /// sharing mode. Encoded sources are decoded first.
    pub async fn to_surface(&self, region: Option<Region>) -> Result<DrawingSurface<F::Surface>> {
        let (source, region) = self.drawable(region).await?;
        self.draw_source(&source, region, self.config.shared_surface)
    }

    /// The bound source on a fresh offscreen surface. Never shared.
    /// Encoded sources are decoded first.
    pub async fn to_offscreen_surface(
        &self,
        region: Option<Region>,
    ) -> Result<DrawingSurface<F::Surface>> {
        if !self
            .factory
            .capabilities()
            .contains(SurfaceCapabilities::OFFSCREEN)
        {
            return Err(AdapterError::platform_unsupported("offscreen surfaces"));
        }
        let (source, region) = self.drawable(region).await?;
        self.check_drawable(&source)?;

        let mut surface = self.factory.create(
            SurfaceKind::Offscreen,
            region.width,
            region.height,
            &self.config.surface,
        )?;
        trace!(
            target: "image_adapter::surface",
            width = region.width,
            height = region.height,
            "allocated offscreen surface"
        );
        draw_onto(&mut surface, &source, region)?;
        Ok(DrawingSurface::one_shot(surface))
    }

    fn check_drawable(&self, source: &SourceImage) -> Result<()> {
        match source {
            SourceImage::Encoded(_) => Err(AdapterError::unsupported_source_for_draw(
                source.kind().as_str(),
                "encoded blobs must be decoded before drawing",
            )),
            SourceImage::Pixels(_)
                if !self
                    .factory
                    .capabilities()
                    .contains(SurfaceCapabilities::PUT_PIXELS) =>
            {
                Err(AdapterError::unsupported_source_for_draw(
                    source.kind().as_str(),
                    "surface factory cannot store raw pixels",
                ))
            }
            SourceImage::Pixels(_) | SourceImage::Bitmap(_) => Ok(()),
        }
    }

    fn draw_source(
        &self,
        source: &SourceImage,
        region: Region,
        prefer_shared: bool,
    ) -> Result<DrawingSurface<F::Surface>> {
        self.check_drawable(source)?;

        match (&self.shared, prefer_shared) {
            (Some(shared), true) => {
                trace!(
                    target: "image_adapter::surface",
                    width = region.width,
                    height = region.height,
                    "reusing shared surface"
                );
                {
                    // Resize and draw under one lock
                    let mut surface = shared.lock();
                    surface.set_size(region.width, region.height)?;
                    draw_onto(&mut *surface, source, region)?;
                }
                Ok(DrawingSurface::shared(Arc::clone(shared)))
            }
            _ => {
                let mut surface = self.factory.create(
                    SurfaceKind::Onscreen,
                    region.width,
                    region.height,
                    &self.config.surface,
                )?;
                trace!(
                    target: "image_adapter::surface",
                    width = region.width,
                    height = region.height,
                    "allocated one-shot surface"
                );
                draw_onto(&mut surface, source, region)?;
                Ok(DrawingSurface::one_shot(surface))
            }
        }
    }

    // =========================================================================
    // CONVERSIONS
    // =========================================================================

    /// Raw RGBA pixels of `region` (the whole image when `None`).
    ///
    /// A pixel-buffer source with no region is returned as is. An encoded
    /// source is decoded and cropped first, then drawn like a bitmap.
    pub async fn to_pixel_buffer(&self, region: Option<Region>) -> Result<PixelBuffer> {
        let source = self.source()?;
        debug!(
            target: "image_adapter::convert",
            source = source.kind().as_str(),
            region = ?region,
            "to_pixel_buffer"
        );

        if let (SourceImage::Pixels(buffer), None) = (source, region) {
            debug!(target: "image_adapter::convert", "returning source pixel buffer");
            return Ok(buffer.clone());
        }

        let (source, region) = self.drawable(region).await?;
        let surface = self.draw_source(&source, region, self.config.shared_surface)?;
        surface.get_pixels(region.at_origin())
    }

    /// Encoded form of `region`. Defaults to PNG.
    ///
    /// An encoded source is returned as is; `options` and `region` are
    /// ignored for it.
    pub async fn to_encoded_blob(
        &self,
        options: Option<&EncodeOptions>,
        region: Option<Region>,
    ) -> Result<EncodedBlob> {
        let source = self.source()?;
        debug!(
            target: "image_adapter::convert",
            source = source.kind().as_str(),
            format = ?options.map(|o| o.format),
            region = ?region,
            "to_encoded_blob"
        );
        if let SourceImage::Encoded(blob) = source {
            debug!(target: "image_adapter::convert", "returning source blob");
            return Ok(blob.clone());
        }

        let (source, region) = self.drawable(region).await?;
        let surface = self.draw_source(&source, region, self.config.shared_surface)?;
        let default_options = EncodeOptions::default();
        let options = options.unwrap_or(&default_options);
        surface.export_encoded(options).await
    }

    /// [`to_encoded_blob`](Self::to_encoded_blob) wrapped as a named file.
    /// `last_modified` defaults to now.
    pub async fn to_file(
        &self,
        name: impl Into<String>,
        last_modified: Option<SystemTime>,
        options: Option<&EncodeOptions>,
        region: Option<Region>,
    ) -> Result<ImageFile> {
        let blob = self.to_encoded_blob(options, region).await?;
        Ok(ImageFile::new(name, last_modified, blob))
    }
}

/// Draw `region` of `source` at the surface origin.
fn draw_onto<S: Surface + ?Sized>(
    surface: &mut S,
    source: &SourceImage,
    region: Region,
) -> Result<()> {
    match source {
        SourceImage::Bitmap(bitmap) => surface.draw_bitmap(bitmap, region, (0, 0)),
        SourceImage::Pixels(buffer) => surface.put_pixels(buffer, region, (0, 0)),
        SourceImage::Encoded(_) => Err(AdapterError::unsupported_source_for_draw(
            source.kind().as_str(),
            "encoded blobs must be decoded before drawing",
        )),
    }
}
