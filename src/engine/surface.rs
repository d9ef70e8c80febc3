// src/engine/surface.rs
//
// The Drawing Surface capability and its raster (CPU) implementation.
//
// A surface is a 2D RGBA raster that can receive bitmaps and pixel buffers,
// hand pixels back, and export itself as an encoded blob. The adapter only
// ever talks to surfaces through the `Surface` / `SurfaceFactory` traits.

use crate::engine::common::EngineResult;
use crate::engine::config::{SurfaceLimits, SurfaceOptions};
use crate::engine::encoder::encode_rgba;
use crate::engine::io::{Bitmap, EncodedBlob, PixelBuffer, BYTES_PER_PIXEL};
use crate::error::AdapterError;
use crate::ops::{Dimensions, EncodeOptions, Region};
use bitflags::bitflags;
use image::{Rgba, RgbaImage};
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Future returned by [`Surface::export_encoded`]. It owns everything it needs,
/// so it can outlive the lock on the surface that produced it.
pub type ExportFuture =
    Pin<Box<dyn Future<Output = EngineResult<EncodedBlob>> + Send + 'static>>;

bitflags! {
    /// Optional features a surface factory may provide.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct SurfaceCapabilities: u32 {
        /// `Surface::put_pixels` is usable.
        const PUT_PIXELS = 1 << 0;
        /// Surfaces of `SurfaceKind::Offscreen` can be created.
        const OFFSCREEN = 1 << 1;
        /// `Surface::export_encoded` is usable.
        const EXPORT = 1 << 2;
    }
}

/// Where a surface lives. Onscreen surfaces may be attached to a display;
/// offscreen surfaces never are.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceKind {
    Onscreen,
    Offscreen,
}

/// A 2D raster target.
pub trait Surface: Send {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// Resize to `width` x `height`. Contents are reset, as when a canvas is
    /// resized.
    fn set_size(&mut self, width: u32, height: u32) -> EngineResult<()>;

    /// Draw `src` of `bitmap` with its top-left corner at `dst`.
    fn draw_bitmap(&mut self, bitmap: &Bitmap, src: Region, dst: (u32, u32)) -> EngineResult<()>;

    /// Store `src` of `buffer` at `dst`, replacing what is there.
    fn put_pixels(
        &mut self,
        buffer: &PixelBuffer,
        src: Region,
        dst: (u32, u32),
    ) -> EngineResult<()>;

    /// Read `region` back as a pixel buffer.
    fn get_pixels(&self, region: Region) -> EngineResult<PixelBuffer>;

    /// Export the current contents.
    ///
    /// The contents are captured when this is called; the returned future only
    /// encodes. Later draws do not affect an export already requested.
    fn export_encoded(&self, options: &EncodeOptions) -> ExportFuture;

    fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width(), self.height())
    }
}

/// Creates drawing surfaces.
pub trait SurfaceFactory: Send + Sync {
    type Surface: Surface;

    fn capabilities(&self) -> SurfaceCapabilities;

    /// Create a `width` x `height` surface. Fails with `SurfaceUnavailable`
    /// when no 2D context can be provided.
    fn create(
        &self,
        kind: SurfaceKind,
        width: u32,
        height: u32,
        options: &SurfaceOptions,
    ) -> EngineResult<Self::Surface>;
}

impl<F: SurfaceFactory> SurfaceFactory for Arc<F> {
    type Surface = F::Surface;

    fn capabilities(&self) -> SurfaceCapabilities {
        (**self).capabilities()
    }

    fn create(
        &self,
        kind: SurfaceKind,
        width: u32,
        height: u32,
        options: &SurfaceOptions,
    ) -> EngineResult<Self::Surface> {
        (**self).create(kind, width, height, options)
    }
}

/// A surface handed out by the adapter: either a one-shot surface or the
/// adapter's shared one.
///
/// Cloning shares the same underlying surface.
pub struct DrawingSurface<S> {
    inner: Arc<Mutex<S>>,
    shared: bool,
}

impl<S> Clone for DrawingSurface<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            shared: self.shared,
        }
    }
}

impl<S> fmt::Debug for DrawingSurface<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DrawingSurface")
            .field("shared", &self.shared)
            .finish_non_exhaustive()
    }
}

impl<S: Surface> DrawingSurface<S> {
    pub(crate) fn one_shot(surface: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(surface)),
            shared: false,
        }
    }

    pub(crate) fn shared(inner: Arc<Mutex<S>>) -> Self {
        Self {
            inner,
            shared: true,
        }
    }

    /// True when this is the adapter-owned surface reused across calls.
    pub fn is_shared(&self) -> bool {
        self.shared
    }

    /// Lock the surface. Do not hold the guard across an `.await`.
    pub fn lock(&self) -> MutexGuard<'_, S> {
        self.inner.lock()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn dimensions(&self) -> Dimensions {
        self.inner.lock().dimensions()
    }

    /// Read `region` of the surface.
    pub fn get_pixels(&self, region: Region) -> EngineResult<PixelBuffer> {
        self.inner.lock().get_pixels(region)
    }

    /// Export the surface. The contents are captured before the first await.
    pub async fn export_encoded(&self, options: &EncodeOptions) -> EngineResult<EncodedBlob> {
        let export = self.inner.lock().export_encoded(options);
        export.await
    }
}

/// CPU raster surface backed by an `RgbaImage`.
pub struct RasterSurface {
    pixels: RgbaImage,
    kind: SurfaceKind,
    options: SurfaceOptions,
    limits: SurfaceLimits,
    exportable: bool,
}

impl fmt::Debug for RasterSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterSurface")
            .field("width", &self.pixels.width())
            .field("height", &self.pixels.height())
            .field("kind", &self.kind)
            .field("options", &self.options)
            .finish()
    }
}

impl RasterSurface {
    fn new(
        kind: SurfaceKind,
        width: u32,
        height: u32,
        options: SurfaceOptions,
        limits: SurfaceLimits,
        exportable: bool,
    ) -> EngineResult<Self> {
        Ok(Self {
            pixels: blank(width, height, &options, &limits)?,
            kind,
            options,
            limits,
            exportable,
        })
    }

    pub fn kind(&self) -> SurfaceKind {
        self.kind
    }

    pub fn options(&self) -> SurfaceOptions {
        self.options
    }

    /// Copy `src` of `buffer` to `dst`, clipped to the surface. Bitmaps blend
    /// source-over; stored pixels replace what is there.
    fn blit(&mut self, buffer: &PixelBuffer, src: Region, dst: (u32, u32), blend: bool) {
        let surface = self.dimensions();
        let (w, h) = clipped_extent(src, buffer.width(), buffer.height(), dst, surface);
        let stride = buffer.width() as usize * BYTES_PER_PIXEL;
        let data = buffer.data();
        for row in 0..h {
            let start = (src.y + row) as usize * stride + src.x as usize * BYTES_PER_PIXEL;
            for col in 0..w as usize {
                let i = start + col * BYTES_PER_PIXEL;
                let px = [data[i], data[i + 1], data[i + 2], data[i + 3]];
                self.store(dst.0 + col as u32, dst.1 + row, px, blend);
            }
        }
    }

    fn store(&mut self, x: u32, y: u32, px: [u8; 4], blend: bool) {
        let out = if blend {
            source_over(self.pixels.get_pixel(x, y).0, px)
        } else {
            px
        };
        let out = if self.options.alpha {
            out
        } else {
            opaque(out)
        };
        self.pixels.put_pixel(x, y, Rgba(out));
    }
}

impl Surface for RasterSurface {
    fn width(&self) -> u32 {
        self.pixels.width()
    }

    fn height(&self) -> u32 {
        self.pixels.height()
    }

    fn set_size(&mut self, width: u32, height: u32) -> EngineResult<()> {
        self.pixels = blank(width, height, &self.options, &self.limits)?;
        Ok(())
    }

    fn draw_bitmap(&mut self, bitmap: &Bitmap, src: Region, dst: (u32, u32)) -> EngineResult<()> {
        self.blit(bitmap.pixels(), src, dst, true);
        Ok(())
    }

    fn put_pixels(
        &mut self,
        buffer: &PixelBuffer,
        src: Region,
        dst: (u32, u32),
    ) -> EngineResult<()> {
        self.blit(buffer, src, dst, false);
        Ok(())
    }

    fn get_pixels(&self, region: Region) -> EngineResult<PixelBuffer> {
        self.limits.enforce(region.width, region.height)?;
        let mut out = RgbaImage::new(region.width, region.height);
        let (w, h) = (self.pixels.width(), self.pixels.height());
        for row in 0..region.height {
            let sy = region.y as u64 + row as u64;
            if sy >= h as u64 {
                break;
            }
            for col in 0..region.width {
                let sx = region.x as u64 + col as u64;
                if sx >= w as u64 {
                    break;
                }
                out.put_pixel(col, row, *self.pixels.get_pixel(sx as u32, sy as u32));
            }
        }
        PixelBuffer::try_from(out)
    }

    fn export_encoded(&self, options: &EncodeOptions) -> ExportFuture {
        let options = options.clone();
        let snapshot = if self.exportable {
            Ok(self.pixels.clone())
        } else {
            Err(AdapterError::export_failed(
                options.format.mime(),
                "surface export is not supported",
            ))
        };
        Box::pin(async move {
            let pixels = snapshot?;
            let bytes = encode_rgba(&pixels, &options)?;
            Ok(EncodedBlob::new(bytes, options.format.mime()))
        })
    }
}

/// Factory for [`RasterSurface`]s.
#[derive(Clone, Debug)]
pub struct RasterSurfaceFactory {
    limits: SurfaceLimits,
    capabilities: SurfaceCapabilities,
}

impl Default for RasterSurfaceFactory {
    fn default() -> Self {
        Self::new(SurfaceLimits::default())
    }
}

impl RasterSurfaceFactory {
    pub fn new(limits: SurfaceLimits) -> Self {
        Self {
            limits,
            capabilities: SurfaceCapabilities::all(),
        }
    }

    /// Restrict the advertised capabilities, e.g. to emulate a platform
    /// without offscreen surfaces.
    pub fn with_capabilities(mut self, capabilities: SurfaceCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }
}

impl SurfaceFactory for RasterSurfaceFactory {
    type Surface = RasterSurface;

    fn capabilities(&self) -> SurfaceCapabilities {
        self.capabilities
    }

    fn create(
        &self,
        kind: SurfaceKind,
        width: u32,
        height: u32,
        options: &SurfaceOptions,
    ) -> EngineResult<RasterSurface> {
        let offscreen = self.capabilities.contains(SurfaceCapabilities::OFFSCREEN);
        if kind == SurfaceKind::Offscreen && !offscreen {
            return Err(AdapterError::platform_unsupported("offscreen surfaces"));
        }
        RasterSurface::new(
            kind,
            width,
            height,
            *options,
            self.limits,
            self.capabilities.contains(SurfaceCapabilities::EXPORT),
        )
    }
}

fn blank(
    width: u32,
    height: u32,
    options: &SurfaceOptions,
    limits: &SurfaceLimits,
) -> EngineResult<RgbaImage> {
    limits
        .enforce(width, height)
        .map_err(|e| AdapterError::surface_unavailable(format!("{width}x{height}: {e}")))?;
    let fill = if options.alpha {
        Rgba([0, 0, 0, 0])
    } else {
        Rgba([0, 0, 0, 255])
    };
    Ok(RgbaImage::from_pixel(width, height, fill))
}

/// Width and height of the part of `src` that lands on the surface.
fn clipped_extent(
    src: Region,
    source_width: u32,
    source_height: u32,
    dst: (u32, u32),
    surface: Dimensions,
) -> (u32, u32) {
    let avail_src_w = source_width.saturating_sub(src.x);
    let avail_src_h = source_height.saturating_sub(src.y);
    let avail_dst_w = surface.width.saturating_sub(dst.0);
    let avail_dst_h = surface.height.saturating_sub(dst.1);
    (
        src.width.min(avail_src_w).min(avail_dst_w),
        src.height.min(avail_src_h).min(avail_dst_h),
    )
}

/// Non-premultiplied source-over compositing.
fn source_over(dst: [u8; 4], src: [u8; 4]) -> [u8; 4] {
    let sa = src[3] as u32;
    if sa == 255 {
        return src;
    }
    if sa == 0 {
        return dst;
    }
    let da = dst[3] as u32;
    // alpha scaled by 255
    let out_a = sa * 255 + da * (255 - sa);
    if out_a == 0 {
        return [0, 0, 0, 0];
    }
    let mut out = [0u8; 4];
    for c in 0..3 {
        let num = src[c] as u32 * sa * 255 + dst[c] as u32 * da * (255 - sa);
        out[c] = ((num + out_a / 2) / out_a) as u8;
    }
    out[3] = ((out_a + 127) / 255) as u8;
    out
}

/// Flatten onto black with alpha 255.
fn opaque(px: [u8; 4]) -> [u8; 4] {
    let a = px[3] as u32;
    if a == 255 {
        return px;
    }
    [
        ((px[0] as u32 * a + 127) / 255) as u8,
        ((px[1] as u32 * a + 127) / 255) as u8,
        ((px[2] as u32 * a + 127) / 255) as u8,
        255,
    ]
}
