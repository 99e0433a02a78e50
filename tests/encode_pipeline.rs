//! End-to-end tests against the real codecs.
//!
//! Sources are generated in memory so the tests need no fixture files.

use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use squeeze::compress::{
    CompressError, MAX_SEARCH_ATTEMPTS, compress, encode_at_quality, encode_to_target_size,
    search_target_size,
};
use squeeze::imaging::{
    CropArea, EncodeBackend, EncodeRequest, Format, PRINT_DPI, Quality, ResizeMethod,
    ResizeParams, RustBackend, Unit, resize, to_pixels_at,
};
use squeeze::session::Session;
use squeeze::source::SourceImage;
use std::io::Cursor;
use std::time::Duration;

/// A noisy gradient: compresses poorly enough that quality matters.
fn photo_like(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let noise = (x.wrapping_mul(7919) ^ y.wrapping_mul(104_729)) % 61;
        Rgb([
            ((x * 255 / width) as u8).wrapping_add(noise as u8),
            ((y * 255 / height) as u8).wrapping_add((noise * 3) as u8),
            (((x + y) * 127 / (width + height)) as u8).wrapping_add((noise * 2) as u8),
        ])
    })
}

fn encoded(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, format).unwrap();
    out.into_inner()
}

fn png_source(width: u32, height: u32) -> SourceImage {
    let img = DynamicImage::ImageRgb8(photo_like(width, height));
    SourceImage::decode(&RustBackend::new(), encoded(&img, ImageFormat::Png)).unwrap()
}

#[test]
fn target_search_stays_within_budget() {
    let backend = RustBackend::new();
    let source = png_source(160, 120);
    let high = encode_at_quality(&backend, &source, Format::Jpeg, Quality::new(95)).unwrap();
    let target = high.size_bytes() / 2;

    let outcome = search_target_size(&backend, &source, Format::Jpeg, target);
    let best = outcome.best.expect("half the q95 size is reachable");

    assert!(best.size_bytes() <= target);
    assert!(best.quality_used() < Quality::new(95));
    assert!(outcome.attempts <= MAX_SEARCH_ATTEMPTS);
}

#[test]
fn webp_target_search_produces_decodable_output() {
    let backend = RustBackend::new();
    let source = png_source(96, 96);
    let reference = encode_at_quality(&backend, &source, Format::Webp, Quality::new(90)).unwrap();

    let result =
        encode_to_target_size(&backend, &source, Format::Webp, reference.size_bytes() * 3 / 4)
            .unwrap();
    let decoded = backend.decode(result.bytes()).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (96, 96));
}

#[test]
fn png_ignores_quality_and_budget() {
    let backend = RustBackend::new();
    let source = png_source(64, 64);

    let low = encode_at_quality(&backend, &source, Format::Png, Quality::new(1)).unwrap();
    let tiny_budget = encode_to_target_size(&backend, &source, Format::Png, 1).unwrap();

    assert_eq!(low.quality_used(), Quality::MAX);
    assert_eq!(low.bytes(), tiny_budget.bytes());
}

#[test]
fn impossible_budget_is_reported_with_smallest_size() {
    let backend = RustBackend::new();
    let source = png_source(128, 128);

    let err = compress(&backend, &source, EncodeRequest::target_bytes(Format::Jpeg, 16))
        .unwrap_err();
    match err {
        CompressError::BudgetUnreachable {
            target_bytes,
            smallest,
        } => {
            assert_eq!(target_bytes, 16);
            assert!(smallest.unwrap() > 16);
        }
        other => panic!("expected BudgetUnreachable, got {other:?}"),
    }
}

#[test]
fn jpeg_encoding_is_deterministic() {
    let backend = RustBackend::new();
    let source = png_source(48, 32);

    let a = encode_at_quality(&backend, &source, Format::Jpeg, Quality::new(70)).unwrap();
    let b = encode_at_quality(&backend, &source, Format::Jpeg, Quality::new(70)).unwrap();
    assert_eq!(a.bytes(), b.bytes());
}

#[test]
fn transparent_png_to_jpeg_drops_alpha() {
    let backend = RustBackend::new();
    let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(20, 20, Rgba([10, 200, 30, 0])));
    let source = SourceImage::decode(&backend, encoded(&img, ImageFormat::Png)).unwrap();

    let result = encode_at_quality(&backend, &source, Format::Jpeg, Quality::new(80)).unwrap();
    let decoded = backend.decode(result.bytes()).unwrap();
    assert!(!decoded.color().has_alpha());
}

#[test]
fn resized_source_compresses_relative_to_original_file() {
    let backend = RustBackend::new();
    let source = png_source(200, 100);
    let params = ResizeParams {
        width: 50.0,
        height: 50.0,
        unit: Unit::Percent,
        method: ResizeMethod::Exact,
    };

    let resized = resize(&source, &params);
    let report = compress(
        &backend,
        &resized,
        EncodeRequest::quality(Format::Jpeg, Quality::new(60)),
    )
    .unwrap();

    assert_eq!((resized.width(), resized.height()), (100, 50));
    assert_eq!(report.original_size, source.original_size());
    assert!(report.reduction_percent > 0.0);
}

#[test]
fn print_crop_encodes_at_exact_pixel_size() {
    let backend = RustBackend::new();
    let mut session = Session::new(RustBackend::new(), 4);
    let png = encoded(&DynamicImage::ImageRgb8(photo_like(300, 200)), ImageFormat::Png);
    session.load(png, Some("portrait.png")).unwrap();

    // 35x45 mm at print resolution.
    let output = (
        to_pixels_at(35.0, Unit::Mm, 0, PRINT_DPI),
        to_pixels_at(45.0, Unit::Mm, 0, PRINT_DPI),
    );
    let area = CropArea::centered((300, 200), output).moved_to(1000, 0, (300, 200));
    assert_eq!(area.x + area.width, 300);

    session.crop(&area, output).unwrap();
    let report = session
        .compress(EncodeRequest::quality(Format::Jpeg, Quality::new(95)))
        .unwrap();
    let decoded = backend.decode(report.result.bytes()).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (413, 531));
}

#[test]
fn session_round_trip_with_real_backend() {
    let tmp = tempfile::TempDir::new().unwrap();
    let path = tmp.path().join("scene.png");
    std::fs::write(
        &path,
        encoded(&DynamicImage::ImageRgb8(photo_like(80, 60)), ImageFormat::Png),
    )
    .unwrap();

    let mut session = Session::new(RustBackend::new(), 16);
    let source = session.open(&path).unwrap();
    assert_eq!(source.format(), Some(Format::Png));

    let request = EncodeRequest::target_bytes(Format::Webp, source.original_size() / 3);
    let first = session.compress(request).unwrap();
    let second = session.compress(request).unwrap();
    assert_eq!(first.result, second.result);
    assert!(session.cache_stats().hits >= first.attempts);

    let live = session.live(Duration::from_millis(5)).unwrap();
    let ticket = live
        .update(EncodeRequest::quality(Format::Jpeg, Quality::new(40)))
        .unwrap();
    let outcome = live.wait_for(ticket, Duration::from_secs(10)).unwrap();
    assert!(outcome.is_ok());
}
