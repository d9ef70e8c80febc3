#![no_main]

//! Fuzz target for surface export encoding.
//! Tests JPEG (mozjpeg), PNG and WebP (lossy and lossless) for crashes and memory issues.

use arbitrary::{Arbitrary, Unstructured};
use image::RgbaImage;
use image_adapter::engine::encode_rgba;
use image_adapter::{EncodeOptions, OutputFormat};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct EncodeSeed {
    format: u8,
    quality: u8,
    width: u8,
    height: u8,
}

fn build_image(data: &[u8], width: u8, height: u8) -> RgbaImage {
    // Limit dimensions to avoid OOM (max 128x128 = 64KB RGBA); zero sides allowed
    let w = width as u32 % 128;
    let h = height as u32 % 128;
    let pixel_count = (w * h * 4) as usize;

    let mut buffer = vec![0u8; pixel_count];
    for (i, byte) in buffer.iter_mut().enumerate() {
        *byte = data.get(i % data.len().max(1)).copied().unwrap_or(128);
    }

    RgbaImage::from_raw(w, h, buffer).unwrap_or_else(|| RgbaImage::new(1, 1))
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }

    let mut unstructured = Unstructured::new(data);
    let seed: EncodeSeed = match EncodeSeed::arbitrary(&mut unstructured) {
        Ok(s) => s,
        Err(_) => return,
    };

    let img = build_image(data, seed.width, seed.height);
    // Includes out-of-range values, which must fall back to the default
    let quality = Some(seed.quality as f32 / 200.0);

    let format = match seed.format % 3 {
        0 => OutputFormat::Jpeg,
        1 => OutputFormat::Png,
        _ => OutputFormat::WebP,
    };

    // We only care about panics/crashes, not encoding errors
    let _ = encode_rgba(&img, &EncodeOptions::new(format, quality));
});
