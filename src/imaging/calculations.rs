//! Pure calculation functions: byte sizes, resize geometry, target limits.
//!
//! All functions here are pure and testable without any I/O or images.

use super::params::{ResizeMethod, Unit};
use std::fmt;
use thiserror::Error;

/// Screen resolution assumed when converting physical units to pixels.
pub const DPI: f64 = 96.0;

/// Print resolution used when a crop's output size is given in physical units.
pub const PRINT_DPI: f64 = 300.0;

const SIZE_UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

/// Format a byte count for display.
///
/// The unit is chosen as `floor(log1024(bytes))` (capped at GB) and the
/// value is shown with one decimal, dropping a trailing `.0`.
///
/// # Examples
/// ```
/// # use squeeze::imaging::format_file_size;
/// assert_eq!(format_file_size(0), "0 B");
/// assert_eq!(format_file_size(1536), "1.5 KB");
/// assert_eq!(format_file_size(1024 * 1024), "1 MB");
/// ```
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut exponent = 0;
    while exponent < SIZE_UNITS.len() - 1 && bytes >= 1024u64.pow(exponent as u32 + 1) {
        exponent += 1;
    }
    let value = bytes as f64 / 1024f64.powi(exponent as i32);
    let rounded = (value * 10.0).round() / 10.0;
    if rounded.fract() == 0.0 {
        format!("{} {}", rounded as u64, SIZE_UNITS[exponent])
    } else {
        format!("{:.1} {}", rounded, SIZE_UNITS[exponent])
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid size '{0}' (examples: 250000, 200KB, 1.5MB)")]
pub struct ParseSizeError(String);

/// Parse a human byte size: a bare number of bytes or a B/KB/MB/GB suffix.
///
/// Suffixes are case-insensitive and 1024-based; decimals are allowed.
pub fn parse_byte_size(input: &str) -> Result<u64, ParseSizeError> {
    let err = || ParseSizeError(input.to_string());
    let trimmed = input.trim();
    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (number, suffix) = trimmed.split_at(split);
    let value: f64 = number.parse().map_err(|_| err())?;
    let multiplier = match suffix.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 1.0,
        "k" | "kb" | "kib" => 1024.0,
        "m" | "mb" | "mib" => 1024.0 * 1024.0,
        "g" | "gb" | "gib" => 1024.0 * 1024.0 * 1024.0,
        _ => return Err(err()),
    };
    let bytes = value * multiplier;
    if !bytes.is_finite() || bytes < 0.0 {
        return Err(err());
    }
    Ok(bytes.round() as u64)
}

/// Percentage saved relative to the original, never negative.
///
/// Returns 0 when the original size is unknown (0).
pub fn size_reduction_percent(original_size: u64, result_size: u64) -> f64 {
    if original_size == 0 {
        return 0.0;
    }
    let saved = (original_size as f64 - result_size as f64) / original_size as f64 * 100.0;
    saved.max(0.0)
}

/// Convert a dimension in `unit` to pixels at screen resolution ([`DPI`]).
///
/// `reference` is the original pixel size along the same axis, used for `%`.
/// The result is at least 1.
pub fn to_pixels(value: f64, unit: Unit, reference: u32) -> u32 {
    to_pixels_at(value, unit, reference, DPI)
}

/// Like [`to_pixels`], but physical units are converted at `dpi`.
///
/// ```
/// # use squeeze::imaging::{PRINT_DPI, Unit, to_pixels_at};
/// // A 35 mm wide print at 300 DPI.
/// assert_eq!(to_pixels_at(35.0, Unit::Mm, 0, PRINT_DPI), 413);
/// ```
pub fn to_pixels_at(value: f64, unit: Unit, reference: u32, dpi: f64) -> u32 {
    let px = match unit {
        Unit::Px => value,
        Unit::Percent => value / 100.0 * reference as f64,
        Unit::Mm => value * dpi / 25.4,
        Unit::Cm => value * dpi / 2.54,
        Unit::In => value * dpi,
    };
    (px.round().max(1.0)) as u32
}

/// Which dimension the user edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Width,
    Height,
}

/// Apply an edit to one dimension, keeping the original aspect ratio.
///
/// Returns the new `(width, height)` in the same unit as `value`. The edited
/// dimension is floored at 1; the other is rounded to a whole number.
pub fn locked_dimensions(original: (u32, u32), edited: Axis, value: f64) -> (f64, f64) {
    let (orig_w, orig_h) = original;
    let aspect = orig_w as f64 / orig_h.max(1) as f64;
    let value = value.max(1.0);
    match edited {
        Axis::Width => (value, (value / aspect).round()),
        Axis::Height => ((value * aspect).round(), value),
    }
}

/// How to produce the output bitmap for a resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizePlan {
    /// Scale the whole source to `width`×`height` (aspect not preserved).
    Stretch { width: u32, height: u32 },
    /// Scale to `width`×`height`, then paste at (`x`, `y`) on a white
    /// `canvas_width`×`canvas_height` canvas.
    Letterbox {
        canvas_width: u32,
        canvas_height: u32,
        width: u32,
        height: u32,
        x: u32,
        y: u32,
    },
    /// Scale to `width`×`height`, then cut the `crop_width`×`crop_height`
    /// window at (`x`, `y`).
    Cover {
        width: u32,
        height: u32,
        x: u32,
        y: u32,
        crop_width: u32,
        crop_height: u32,
    },
    /// Cut `area` from the source, then scale it to exactly
    /// `width`×`height`.
    Region {
        area: CropArea,
        width: u32,
        height: u32,
    },
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimensionError {
    #[error("both width and height are needed unless the aspect ratio is kept")]
    Missing,
    #[error("with the aspect ratio kept, give only one of width and height")]
    Overconstrained,
}

/// Complete a requested box from the dimensions the user gave.
///
/// Without `keep_aspect` both are required. With it, exactly one drives the
/// other through [`locked_dimensions`]; in `%` the same percentage applies
/// to both axes.
pub fn resolve_dimensions(
    original: (u32, u32),
    width: Option<f64>,
    height: Option<f64>,
    unit: Unit,
    keep_aspect: bool,
) -> Result<(f64, f64), DimensionError> {
    match (width, height, keep_aspect) {
        (Some(w), Some(h), false) => Ok((w, h)),
        (Some(_), Some(_), true) => Err(DimensionError::Overconstrained),
        (Some(w), None, true) if unit == Unit::Percent => Ok((w, w)),
        (None, Some(h), true) if unit == Unit::Percent => Ok((h, h)),
        (Some(w), None, true) => Ok(locked_dimensions(original, Axis::Width, w)),
        (None, Some(h), true) => Ok(locked_dimensions(original, Axis::Height, h)),
        _ => Err(DimensionError::Missing),
    }
}

/// A rectangle of source pixels to cut out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropArea {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropArea {
    /// The largest rectangle with the aspect ratio of `target` that fits in
    /// `image`, centered.
    ///
    /// ```
    /// # use squeeze::imaging::CropArea;
    /// // A square out of a landscape image keeps the full height.
    /// let area = CropArea::centered((400, 200), (50, 50));
    /// assert_eq!(area, CropArea { x: 100, y: 0, width: 200, height: 200 });
    /// ```
    pub fn centered(image: (u32, u32), target: (u32, u32)) -> CropArea {
        let (img_w, img_h) = (image.0.max(1), image.1.max(1));
        let aspect = target.0.max(1) as f64 / target.1.max(1) as f64;
        let (width, height) = if img_w as f64 / img_h as f64 > aspect {
            (((img_h as f64 * aspect).round() as u32).clamp(1, img_w), img_h)
        } else {
            (img_w, ((img_w as f64 / aspect).round() as u32).clamp(1, img_h))
        };
        CropArea {
            x: (img_w - width) / 2,
            y: (img_h - height) / 2,
            width,
            height,
        }
    }

    /// Move the top-left corner to (`x`, `y`), keeping the rectangle inside
    /// `image`. The size is unchanged.
    pub fn moved_to(self, x: i64, y: i64, image: (u32, u32)) -> CropArea {
        let max_x = image.0.saturating_sub(self.width) as i64;
        let max_y = image.1.saturating_sub(self.height) as i64;
        CropArea {
            x: x.min(max_x).max(0) as u32,
            y: y.min(max_y).max(0) as u32,
            ..self
        }
    }
}

/// Compute the resize plan for a source of `original` pixels into a
/// `target` pixel box.
pub fn plan_resize(original: (u32, u32), target: (u32, u32), method: ResizeMethod) -> ResizePlan {
    let (orig_w, orig_h) = (original.0.max(1), original.1.max(1));
    let (tgt_w, tgt_h) = (target.0.max(1), target.1.max(1));
    let scale_x = tgt_w as f64 / orig_w as f64;
    let scale_y = tgt_h as f64 / orig_h as f64;
    let scaled = |scale: f64| {
        (
            ((orig_w as f64 * scale).round() as u32).max(1),
            ((orig_h as f64 * scale).round() as u32).max(1),
        )
    };

    match method {
        ResizeMethod::Exact => ResizePlan::Stretch {
            width: tgt_w,
            height: tgt_h,
        },
        ResizeMethod::Fit => {
            let (w, h) = scaled(scale_x.min(scale_y));
            let (w, h) = (w.min(tgt_w), h.min(tgt_h));
            ResizePlan::Letterbox {
                canvas_width: tgt_w,
                canvas_height: tgt_h,
                width: w,
                height: h,
                x: (tgt_w - w) / 2,
                y: (tgt_h - h) / 2,
            }
        }
        ResizeMethod::Fill => {
            let (w, h) = scaled(scale_x.max(scale_y));
            let (w, h) = (w.max(tgt_w), h.max(tgt_h));
            ResizePlan::Cover {
                width: w,
                height: h,
                x: (w - tgt_w) / 2,
                y: (h - tgt_h) / 2,
                crop_width: tgt_w,
                crop_height: tgt_h,
            }
        }
        ResizeMethod::Crop => ResizePlan::Region {
            area: CropArea::centered((orig_w, orig_h), (tgt_w, tgt_h)),
            width: tgt_w,
            height: tgt_h,
        },
    }
}

/// Slider bounds for target-size mode, in KB, derived from the original size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetLimits {
    /// Smallest recommended target: 5% of the original, at least 10 KB,
    /// but never above `max_kb`.
    pub min_kb: u64,
    /// The original size; larger targets make no sense.
    pub max_kb: u64,
    /// Suggested starting target: half the original.
    pub default_kb: u64,
}

pub fn target_limits(original_size: u64) -> TargetLimits {
    let original_kb = (original_size as f64 / 1024.0).round();
    let max_kb = original_kb as u64;
    TargetLimits {
        min_kb: ((original_kb * 0.05).round() as u64).max(10).min(max_kb),
        max_kb,
        default_kb: (original_kb * 0.5).round() as u64,
    }
}

/// Guidance about a requested target size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetAdvice {
    /// Larger than the original; it will be clamped.
    TooLarge { max_kb: u64 },
    /// Below the recommended minimum; expect heavy artifacts.
    VerySmall { min_kb: u64 },
    /// Within 10% of the original; little will be saved.
    NearOriginal,
}

impl fmt::Display for TargetAdvice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetAdvice::TooLarge { max_kb } => write!(
                f,
                "Target size cannot be larger than original ({max_kb} KB)"
            ),
            TargetAdvice::VerySmall { min_kb } => write!(
                f,
                "Very small target size may result in poor quality (min recommended: {min_kb} KB)"
            ),
            TargetAdvice::NearOriginal => {
                f.write_str("Target size is close to original - compression will be minimal")
            }
        }
    }
}

/// Check a target against [`target_limits`]. `None` means the target is fine,
/// or the original is unknown or under half a kilobyte.
pub fn target_advice(target_bytes: u64, original_size: u64) -> Option<TargetAdvice> {
    let limits = target_limits(original_size);
    if limits.max_kb == 0 {
        return None;
    }
    let target_kb = target_bytes as f64 / 1024.0;
    if target_kb > limits.max_kb as f64 {
        Some(TargetAdvice::TooLarge {
            max_kb: limits.max_kb,
        })
    } else if target_kb < limits.min_kb as f64 {
        Some(TargetAdvice::VerySmall {
            min_kb: limits.min_kb,
        })
    } else if target_kb > limits.max_kb as f64 * 0.9 {
        Some(TargetAdvice::NearOriginal)
    } else {
        None
    }
}

/// Output file name: the input's stem with the format's extension.
///
/// ```
/// # use squeeze::imaging::{Format, output_file_name};
/// assert_eq!(output_file_name("photo.png", Format::Jpeg), "photo.jpg");
/// assert_eq!(output_file_name("archive.tar.png", Format::Webp), "archive.tar.webp");
/// ```
pub fn output_file_name(input_name: &str, format: super::params::Format) -> String {
    let stem = match input_name.rfind('.') {
        Some(idx) if idx > 0 => &input_name[..idx],
        _ => input_name,
    };
    format!("{}.{}", stem, format.extension())
}
