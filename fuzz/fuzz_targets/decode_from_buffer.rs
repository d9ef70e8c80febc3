#![no_main]

use image_adapter::engine::{decode_image_with_limits, SurfaceLimits};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    // Strict limits keep a hostile header from allocating gigabytes
    let _ = decode_image_with_limits(data, &SurfaceLimits::strict());
});
