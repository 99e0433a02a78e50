//! Production codec backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP) | `image::load_from_memory` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder::new_with_quality` |
//! | Encode → PNG | `image::codecs::png::PngEncoder` (lossless, quality ignored) |
//! | Encode → WebP | `webp::Encoder` (libwebp, lossy at the given quality) |
//!
//! The `image` crate's own WebP encoder is lossless only, which would make
//! the target-size search useless for WebP; hence libwebp.

use super::backend::{BackendError, EncodeBackend};
use super::params::{Format, Quality};
use crate::source::SourceImage;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, RgbImage, RgbaImage};
use std::borrow::Cow;

/// Codec backend built on the `image` and `webp` crates.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn as_rgb8(img: &DynamicImage) -> Cow<'_, RgbImage> {
    match img {
        DynamicImage::ImageRgb8(rgb) => Cow::Borrowed(rgb),
        other => Cow::Owned(other.to_rgb8()),
    }
}

fn as_rgba8(img: &DynamicImage) -> Cow<'_, RgbaImage> {
    match img {
        DynamicImage::ImageRgba8(rgba) => Cow::Borrowed(rgba),
        other => Cow::Owned(other.to_rgba8()),
    }
}

/// JPEG has no alpha channel; transparency is dropped.
fn encode_jpeg(img: &DynamicImage, quality: Quality) -> Result<Vec<u8>, BackendError> {
    let rgb = as_rgb8(img);
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality.value() as u8)
        .write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
        .map_err(|e| BackendError::EncodeFailed(format!("JPEG encode failed: {e}")))?;
    Ok(out)
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, BackendError> {
    let mut out = Vec::new();
    img.write_with_encoder(PngEncoder::new(&mut out))
        .map_err(|e| BackendError::EncodeFailed(format!("PNG encode failed: {e}")))?;
    Ok(out)
}

fn encode_webp(img: &DynamicImage, quality: Quality) -> Result<Vec<u8>, BackendError> {
    let rgba = as_rgba8(img);
    let encoder = webp::Encoder::from_rgba(rgba.as_raw(), rgba.width(), rgba.height());
    let mem = encoder
        .encode_simple(false, quality.value() as f32)
        .map_err(|e| BackendError::EncodeFailed(format!("WebP encode failed: {e:?}")))?;
    Ok(mem.to_vec())
}

impl EncodeBackend for RustBackend {
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, BackendError> {
        image::load_from_memory(bytes).map_err(|e| BackendError::DecodeFailed(e.to_string()))
    }

    fn encode(
        &self,
        source: &SourceImage,
        format: Format,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError> {
        let img = source.image();
        match format {
            Format::Jpeg => encode_jpeg(img, quality),
            Format::Png => encode_png(img),
            Format::Webp => encode_webp(img, quality),
        }
    }
}
