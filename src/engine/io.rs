// src/engine/io.rs
//
// Image representations: the source variants an adapter can hold and the
// artifacts it produces (blobs, pixel buffers, bitmaps, files).

use crate::error::AdapterError;
use crate::ops::{Dimensions, Region};
use image::RgbaImage;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

type IoResult<T> = std::result::Result<T, AdapterError>;

/// Bytes per RGBA8 pixel.
pub const BYTES_PER_PIXEL: usize = 4;

/// Encoded image bytes (PNG, JPEG, WebP, ...) tagged with a MIME type.
///
/// Cloning shares the bytes; [`EncodedBlob::ptr_eq`] tells whether two blobs
/// are the same allocation.
#[derive(Clone)]
pub struct EncodedBlob {
    bytes: Arc<[u8]>,
    mime: Arc<str>,
}

impl EncodedBlob {
    pub fn new(bytes: impl Into<Arc<[u8]>>, mime: impl Into<Arc<str>>) -> Self {
        Self {
            bytes: bytes.into(),
            mime: mime.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.bytes, &other.bytes)
    }
}

impl fmt::Debug for EncodedBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedBlob")
            .field("mime", &self.mime)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Raw RGBA8 pixels, non-premultiplied, rows tightly packed.
#[derive(Clone)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Arc<[u8]>,
}

impl PixelBuffer {
    /// Wrap `data` as a `width` x `height` RGBA8 buffer.
    ///
    /// Fails with `InvalidArgument` unless `data.len() == width * height * 4`.
    pub fn new(width: u32, height: u32, data: impl Into<Arc<[u8]>>) -> IoResult<Self> {
        let data = data.into();
        let expected = expected_len(width, height)?;
        if data.len() != expected {
            return Err(AdapterError::invalid_argument(
                "data",
                format!("{} bytes", data.len()),
                format!("expected {expected} bytes for {width}x{height} RGBA8"),
            ));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// A fully transparent black buffer.
    pub fn transparent(width: u32, height: u32) -> IoResult<Self> {
        let len = expected_len(width, height)?;
        Self::new(width, height, vec![0u8; len])
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// RGBA of the pixel at (x, y), or `None` outside the buffer.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        let px = &self.data[idx..idx + BYTES_PER_PIXEL];
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Copy `region` into a new buffer. The region must lie inside.
    pub fn crop(&self, region: Region) -> IoResult<Self> {
        check_region(region, self.width, self.height)?;
        let stride = self.width as usize * BYTES_PER_PIXEL;
        let row_len = region.width as usize * BYTES_PER_PIXEL;
        let mut out = Vec::with_capacity(row_len * region.height as usize);
        for row in region.y..region.bottom() {
            let start = row as usize * stride + region.x as usize * BYTES_PER_PIXEL;
            out.extend_from_slice(&self.data[start..start + row_len]);
        }
        Self::new(region.width, region.height, out)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    pub fn to_rgba_image(&self) -> IoResult<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.data.to_vec())
            .ok_or_else(AdapterError::corrupted_image)
    }
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

impl PartialEq for PixelBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.width == other.width && self.height == other.height && self.data == other.data
    }
}

impl TryFrom<RgbaImage> for PixelBuffer {
    type Error = AdapterError;

    fn try_from(img: RgbaImage) -> IoResult<Self> {
        let (w, h) = img.dimensions();
        Self::new(w, h, img.into_raw())
    }
}

/// A decoded bitmap handle.
///
/// Pixels are stored the same way as in [`PixelBuffer`], so a bitmap made
/// from a buffer shares its storage. Each decode produces a new handle.
/// [`Bitmap::close`] releases it explicitly; dropping it does the same.
#[derive(Clone)]
pub struct Bitmap {
    pixels: PixelBuffer,
}

impl Bitmap {
    pub fn new(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            pixels: PixelBuffer {
                width,
                height,
                data: image.into_raw().into(),
            },
        }
    }

    /// Wrap `pixels` without copying.
    pub fn from_pixels(pixels: PixelBuffer) -> Self {
        Self { pixels }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> Dimensions {
        self.pixels.dimensions()
    }

    pub fn pixels(&self) -> &PixelBuffer {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        self.pixels.pixel(x, y)
    }

    pub fn to_rgba_image(&self) -> IoResult<RgbaImage> {
        self.pixels.to_rgba_image()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.pixels.ptr_eq(&other.pixels)
    }

    /// Release this handle.
    pub fn close(self) {}
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bitmap")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

impl From<RgbaImage> for Bitmap {
    fn from(image: RgbaImage) -> Self {
        Self::new(image)
    }
}

impl From<PixelBuffer> for Bitmap {
    fn from(pixels: PixelBuffer) -> Self {
        Self::from_pixels(pixels)
    }
}

/// Which variant a [`SourceImage`] is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    Encoded,
    Pixels,
    Bitmap,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Encoded => "encoded blob",
            SourceKind::Pixels => "pixel buffer",
            SourceKind::Bitmap => "bitmap",
        }
    }
}

/// The image an adapter converts from.
#[derive(Clone, Debug)]
pub enum SourceImage {
    Encoded(EncodedBlob),
    Pixels(PixelBuffer),
    Bitmap(Bitmap),
}

impl SourceImage {
    pub fn kind(&self) -> SourceKind {
        match self {
            SourceImage::Encoded(_) => SourceKind::Encoded,
            SourceImage::Pixels(_) => SourceKind::Pixels,
            SourceImage::Bitmap(_) => SourceKind::Bitmap,
        }
    }
}

impl From<EncodedBlob> for SourceImage {
    fn from(blob: EncodedBlob) -> Self {
        SourceImage::Encoded(blob)
    }
}

impl From<PixelBuffer> for SourceImage {
    fn from(buffer: PixelBuffer) -> Self {
        SourceImage::Pixels(buffer)
    }
}

impl From<Bitmap> for SourceImage {
    fn from(bitmap: Bitmap) -> Self {
        SourceImage::Bitmap(bitmap)
    }
}

/// An encoded blob with a file name and modification time.
///
/// `name` is not validated; keeping it to 255 bytes or fewer is the caller's
/// responsibility.
#[derive(Clone, Debug)]
pub struct ImageFile {
    name: String,
    last_modified: SystemTime,
    blob: EncodedBlob,
}

impl ImageFile {
    pub fn new(
        name: impl Into<String>,
        last_modified: Option<SystemTime>,
        blob: EncodedBlob,
    ) -> Self {
        Self {
            name: name.into(),
            last_modified: last_modified.unwrap_or_else(SystemTime::now),
            blob,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn last_modified(&self) -> SystemTime {
        self.last_modified
    }

    pub fn blob(&self) -> &EncodedBlob {
        &self.blob
    }

    pub fn mime(&self) -> &str {
        self.blob.mime()
    }

    pub fn bytes(&self) -> &[u8] {
        self.blob.bytes()
    }

    pub fn size(&self) -> usize {
        self.blob.len()
    }

    pub fn into_blob(self) -> EncodedBlob {
        self.blob
    }

    /// Write the file into `dir` under its own name and return the full path.
    pub fn persist(&self, dir: impl AsRef<Path>) -> IoResult<PathBuf> {
        let path = dir.as_ref().join(&self.name);
        std::fs::write(&path, self.blob.bytes()).map_err(|e| {
            AdapterError::file_write_failed(path.to_string_lossy().to_string(), e)
        })?;
        Ok(path)
    }
}

fn expected_len(width: u32, height: u32) -> IoResult<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(BYTES_PER_PIXEL))
        .ok_or_else(|| {
            AdapterError::pixel_count_exceeds_limit(
                width as u64 * height as u64,
                (usize::MAX / BYTES_PER_PIXEL) as u64,
            )
        })
}

/// Validate that `region` is non-empty and inside a `width` x `height` image.
pub fn check_region(region: Region, width: u32, height: u32) -> IoResult<()> {
    if region.is_empty() {
        return Err(AdapterError::invalid_region_dimensions(
            region.width,
            region.height,
        ));
    }
    if !region.fits_within(width, height) {
        return Err(AdapterError::invalid_region_bounds(
            region.x,
            region.y,
            region.width,
            region.height,
            width,
            height,
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> PixelBuffer {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[x as u8, y as u8, 128, 255]);
            }
        }
        PixelBuffer::new(width, height, data).unwrap()
    }

    #[test]
    fn test_pixel_buffer_rejects_wrong_length() {
        let err = PixelBuffer::new(2, 2, vec![0u8; 15]).unwrap_err();
        assert!(matches!(err, AdapterError::InvalidArgument { .. }));
    }

    #[test]
    fn test_pixel_buffer_crop_copies_sub_rectangle() {
        let buf = gradient(8, 6);
        let cropped = buf.crop(Region::new(2, 3, 4, 2)).unwrap();
        assert_eq!(cropped.dimensions(), Dimensions::new(4, 2));
        assert_eq!(cropped.pixel(0, 0), Some([2, 3, 128, 255]));
        assert_eq!(cropped.pixel(3, 1), Some([5, 4, 128, 255]));
        assert_eq!(cropped.pixel(4, 0), None);
    }

    #[test]
    fn test_pixel_buffer_crop_out_of_bounds() {
        let buf = gradient(4, 4);
        let err = buf.crop(Region::new(2, 2, 3, 1)).unwrap_err();
        assert!(matches!(err, AdapterError::InvalidRegionBounds { .. }));
    }

    #[test]
    fn test_clone_shares_allocation() {
        let blob = EncodedBlob::new(vec![1u8, 2, 3], "image/png");
        let other = EncodedBlob::new(vec![1u8, 2, 3], "image/png");
        assert!(blob.ptr_eq(&blob.clone()));
        assert!(!blob.ptr_eq(&other));

        let buf = gradient(2, 2);
        assert!(buf.ptr_eq(&buf.clone()));
        assert_eq!(buf, gradient(2, 2));
    }

    #[test]
    fn test_source_kind() {
        assert_eq!(SourceImage::from(gradient(3, 2)).kind(), SourceKind::Pixels);
        let blob = SourceImage::from(EncodedBlob::new(Vec::new(), "image/png"));
        assert_eq!(blob.kind(), SourceKind::Encoded);
        let bitmap = SourceImage::from(Bitmap::from_pixels(gradient(1, 1)));
        assert_eq!(bitmap.kind(), SourceKind::Bitmap);
    }

    #[test]
    fn test_bitmap_from_pixels_shares_storage() {
        let buf = gradient(4, 3);
        let bitmap = Bitmap::from_pixels(buf.clone());
        assert!(bitmap.pixels().ptr_eq(&buf));
        assert_eq!(bitmap.dimensions(), Dimensions::new(4, 3));
        assert_eq!(bitmap.pixel(3, 2), Some([3, 2, 128, 255]));

        let owned = Bitmap::new(bitmap.to_rgba_image().unwrap());
        assert!(!owned.ptr_eq(&bitmap));
        assert_eq!(owned.pixels(), bitmap.pixels());
    }

    #[test]
    fn test_image_file_defaults_and_persist() {
        let before = SystemTime::now();
        let file = ImageFile::new("a.png", None, EncodedBlob::new(vec![9u8; 4], "image/png"));
        assert!(file.last_modified() >= before);
        assert_eq!(file.size(), 4);

        let dir = tempfile::tempdir().unwrap();
        let path = file.persist(dir.path()).unwrap();
        assert_eq!(std::fs::read(path).unwrap(), vec![9u8; 4]);
    }

    #[test]
    fn test_image_file_persist_into_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let file = ImageFile::new("a.png", None, EncodedBlob::new(vec![1u8], "image/png"));
        let err = file.persist(dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, AdapterError::FileWriteFailed { .. }));
    }
}
