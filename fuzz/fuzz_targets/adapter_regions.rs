#![no_main]

//! Fuzz target for region handling across every source kind and both
//! surface modes. Conversions may fail, but must not panic.

use arbitrary::{Arbitrary, Unstructured};
use image::RgbaImage;
use image_adapter::engine::encode_png;
use image_adapter::{
    AdapterConfig, Bitmap, EncodedBlob, ImageAdapter, PixelBuffer, RasterDecoder,
    RasterSurfaceFactory, Region, SourceImage, SurfaceLimits,
};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct RegionSeed {
    kind: u8,
    shared: bool,
    width: u8,
    height: u8,
    x: u16,
    y: u16,
    w: u16,
    h: u16,
}

fuzz_target!(|data: &[u8]| {
    let mut unstructured = Unstructured::new(data);
    let seed: RegionSeed = match RegionSeed::arbitrary(&mut unstructured) {
        Ok(s) => s,
        Err(_) => return,
    };

    let w = seed.width as u32 % 64 + 1;
    let h = seed.height as u32 % 64 + 1;
    let img = RgbaImage::from_fn(w, h, |x, y| image::Rgba([x as u8, y as u8, 0, 255]));
    let source: SourceImage = match seed.kind % 3 {
        0 => match encode_png(&img) {
            Ok(bytes) => EncodedBlob::new(bytes, "image/png").into(),
            Err(_) => return,
        },
        1 => match PixelBuffer::try_from(img) {
            Ok(buffer) => buffer.into(),
            Err(_) => return,
        },
        _ => Bitmap::new(img).into(),
    };

    let config = if seed.shared {
        AdapterConfig::shared()
    } else {
        AdapterConfig::one_shot()
    };
    let limits = SurfaceLimits {
        max_dimension: 1024,
        max_pixels: 1 << 20,
    };
    let adapter = match ImageAdapter::new(
        RasterDecoder::new(limits),
        RasterSurfaceFactory::new(limits),
        Some(source),
        config,
    ) {
        Ok(adapter) => adapter,
        Err(_) => return,
    };

    let region = Region::new(seed.x as u32, seed.y as u32, seed.w as u32, seed.h as u32);
    let runtime = match tokio::runtime::Builder::new_current_thread().build() {
        Ok(rt) => rt,
        Err(_) => return,
    };
    runtime.block_on(async {
        let _ = adapter.to_pixel_buffer(Some(region)).await;
        let _ = adapter.to_encoded_blob(None, Some(region)).await;
    });
});
