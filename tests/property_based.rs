use image::{Rgba, RgbaImage};
use image_adapter::engine::encode_png;
use image_adapter::{
    AdapterConfig, Bitmap, Dimensions, EncodedBlob, ImageAdapter, PixelBuffer, RasterDecoder,
    RasterSurfaceFactory, Region, SourceImage, SurfaceOptions,
};
use proptest::prelude::*;
use std::future::Future;

fn create_test_image(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8, 255])
    })
}

fn block_on<F: Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(future)
}

fn adapter(source: SourceImage, shared: bool) -> ImageAdapter<RasterDecoder, RasterSurfaceFactory> {
    let config = if shared {
        AdapterConfig::shared()
    } else {
        AdapterConfig::one_shot()
    };
    ImageAdapter::new(
        RasterDecoder::default(),
        RasterSurfaceFactory::default(),
        Some(source),
        config.with_surface_options(SurfaceOptions::transparent()),
    )
    .unwrap()
}

fn source_of_kind(kind: u8, img: &RgbaImage) -> SourceImage {
    match kind % 3 {
        0 => EncodedBlob::new(encode_png(img).unwrap(), "image/png").into(),
        1 => PixelBuffer::try_from(img.clone()).unwrap().into(),
        _ => Bitmap::new(img.clone()).into(),
    }
}

fn valid_region_strategy() -> impl Strategy<Value = (u32, u32, Region)> {
    (1u32..=48, 1u32..=48)
        .prop_flat_map(|(img_w, img_h)| {
            let w = 1u32..=img_w;
            let h = 1u32..=img_h;
            (Just(img_w), Just(img_h), w, h)
        })
        .prop_flat_map(|(img_w, img_h, w, h)| {
            (
                Just(img_w),
                Just(img_h),
                Just(w),
                Just(h),
                0u32..=img_w - w,
                0u32..=img_h - h,
            )
        })
        .prop_map(|(img_w, img_h, w, h, x, y)| (img_w, img_h, Region::new(x, y, w, h)))
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 48,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_region_extraction_matches_crop(
        (img_w, img_h, region) in valid_region_strategy(),
        kind in 0u8..3,
        shared in any::<bool>(),
    ) {
        let img = create_test_image(img_w, img_h);
        let adapter = adapter(source_of_kind(kind, &img), shared);
        let pixels = block_on(adapter.to_pixel_buffer(Some(region))).unwrap();

        let expected = image::imageops::crop_imm(
            &img,
            region.x,
            region.y,
            region.width,
            region.height,
        )
        .to_image();
        prop_assert_eq!(pixels.dimensions(), region.dimensions());
        prop_assert_eq!(pixels.to_rgba_image().unwrap(), expected);
    }

    #[test]
    fn prop_full_conversion_matches_probe(
        img_w in 1u32..=48,
        img_h in 1u32..=48,
        kind in 0u8..3,
        shared in any::<bool>(),
    ) {
        let img = create_test_image(img_w, img_h);
        let adapter = adapter(source_of_kind(kind, &img), shared);
        let (probe, pixels) = block_on(async {
            let probe = adapter.probe_resolution().await.unwrap();
            let pixels = adapter.to_pixel_buffer(None).await.unwrap();
            (probe, pixels)
        });
        prop_assert_eq!(probe, Dimensions::new(img_w, img_h));
        prop_assert_eq!(pixels.dimensions(), probe);
    }

    #[test]
    fn prop_png_export_is_lossless(
        (img_w, img_h, region) in valid_region_strategy(),
    ) {
        let img = create_test_image(img_w, img_h);
        let adapter = adapter(Bitmap::new(img.clone()).into(), false);
        let blob = block_on(adapter.to_encoded_blob(None, Some(region))).unwrap();
        let (decoded, _) = image_adapter::engine::decode_image(blob.bytes()).unwrap();
        let expected = image::imageops::crop_imm(
            &img,
            region.x,
            region.y,
            region.width,
            region.height,
        )
        .to_image();
        prop_assert_eq!(decoded.to_rgba8(), expected);
    }
}
