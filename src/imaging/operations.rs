//! High-level pixel operations.
//!
//! These functions combine calculations with the `image` crate's resampling
//! and return a new, derived [`SourceImage`]. Encoding is left to the
//! [`compress`](crate::compress) module.

use super::calculations::{CropArea, ResizePlan, plan_resize, to_pixels};
use super::params::ResizeParams;
use crate::source::SourceImage;
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};

/// Target box in pixels for `params` applied to `source`.
pub fn target_pixels(source: &SourceImage, params: &ResizeParams) -> (u32, u32) {
    (
        to_pixels(params.width, params.unit, source.width()),
        to_pixels(params.height, params.unit, source.height()),
    )
}

/// Resize a source according to `params`.
///
/// The result remembers the original file size of `source`, so reduction
/// figures computed on it stay relative to the uploaded file.
pub fn resize(source: &SourceImage, params: &ResizeParams) -> SourceImage {
    let original = (source.width(), source.height());
    let target = target_pixels(source, params);
    let img = source.image();

    let resized = match plan_resize(original, target, params.method) {
        ResizePlan::Stretch { width, height } => {
            img.resize_exact(width, height, FilterType::Lanczos3)
        }
        ResizePlan::Letterbox {
            canvas_width,
            canvas_height,
            width,
            height,
            x,
            y,
        } => {
            let scaled = img.resize_exact(width, height, FilterType::Lanczos3).to_rgba8();
            // Transparent sources are flattened onto white.
            let mut canvas =
                RgbaImage::from_pixel(canvas_width, canvas_height, Rgba([255, 255, 255, 255]));
            imageops::overlay(&mut canvas, &scaled, x as i64, y as i64);
            DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(canvas).to_rgb8())
        }
        ResizePlan::Cover {
            width,
            height,
            x,
            y,
            crop_width,
            crop_height,
        } => img
            .resize_exact(width, height, FilterType::Lanczos3)
            .crop_imm(x, y, crop_width, crop_height),
        ResizePlan::Region {
            area,
            width,
            height,
        } => cut_and_scale(img, &area, (width, height)),
    };

    log::debug!(
        "resized {}x{} -> {}x{} ({:?})",
        original.0,
        original.1,
        resized.width(),
        resized.height(),
        params.method
    );
    SourceImage::derived(resized, source)
}

/// Cut `area` out of `source` and scale it to exactly `output` pixels.
///
/// `area` is clamped to the source bounds first. Like [`resize`], the result
/// keeps the original file size of `source`.
pub fn crop_region(source: &SourceImage, area: &CropArea, output: (u32, u32)) -> SourceImage {
    let (src_w, src_h) = (source.width(), source.height());
    let width = area.width.clamp(1, src_w.max(1));
    let height = area.height.clamp(1, src_h.max(1));
    let area = CropArea {
        width,
        height,
        ..*area
    }
    .moved_to(area.x as i64, area.y as i64, (src_w, src_h));

    let cropped = cut_and_scale(source.image(), &area, output);
    log::debug!(
        "cropped {}x{} at ({}, {}) -> {}x{}",
        area.width,
        area.height,
        area.x,
        area.y,
        cropped.width(),
        cropped.height()
    );
    SourceImage::derived(cropped, source)
}

fn cut_and_scale(img: &DynamicImage, area: &CropArea, output: (u32, u32)) -> DynamicImage {
    let (width, height) = (output.0.max(1), output.1.max(1));
    let region = img.crop_imm(area.x, area.y, area.width, area.height);
    if (region.width(), region.height()) == (width, height) {
        region
    } else {
        region.resize_exact(width, height, FilterType::Lanczos3)
    }
}
