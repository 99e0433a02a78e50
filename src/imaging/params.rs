//! Parameter types for encode and resize operations.
//!
//! These types describe *what* to produce, not *how*. They are the interface
//! between the [`compress`](crate::compress) orchestration (which decides
//! which quality to try) and the [`backend`](super::backend) (which does the
//! actual pixel work).
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1-100, default 75). Clamped on construction;
//!   parses from a number or a preset name.
//! - [`Format`]: Output format: JPEG, PNG, or WebP.
//! - [`QualityMode`]: Either an explicit quality or a target byte budget.
//! - [`EncodeRequest`]: Format + quality mode, validated against the source size.
//! - [`ResizeParams`]: Target box, unit, and method for a resize.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Quality(u32);

impl Quality {
    /// Highest quality; also the nominal value for lossless formats.
    pub const MAX: Quality = Quality(100);
    pub const MIN: Quality = Quality(1);

    /// Named qualities, from best to smallest.
    pub const PRESETS: [(&'static str, Quality); 5] = [
        ("maximum", Quality(100)),
        ("high", Quality(95)),
        ("good", Quality(85)),
        ("medium", Quality(75)),
        ("low", Quality(60)),
    ];

    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    /// Look up a preset by name, ignoring case.
    pub fn preset(name: &str) -> Option<Quality> {
        Self::PRESETS
            .iter()
            .find(|(preset, _)| preset.eq_ignore_ascii_case(name))
            .map(|&(_, quality)| quality)
    }

    pub fn value(self) -> u32 {
        self.0
    }

    /// Human-readable description of how aggressive this quality is.
    pub fn label(self) -> &'static str {
        match self.0 {
            90.. => "Minimal compression - Best quality",
            70..=89 => "Light compression - Good quality",
            50..=69 => "Medium compression - Balanced",
            30..=49 => "Heavy compression - Smaller file",
            _ => "Maximum compression - Smallest file",
        }
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(75)
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid quality '{0}' (1-100, or maximum, high, good, medium, low)")]
pub struct ParseQualityError(String);

/// A number (clamped to 1-100) or a preset name.
impl FromStr for Quality {
    type Err = ParseQualityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.parse::<u32>() {
            Ok(value) => Ok(Quality::new(value)),
            Err(_) => Quality::preset(s).ok_or_else(|| ParseQualityError(s.to_string())),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unsupported format '{0}' (expected jpeg, png, or webp)")]
pub struct ParseFormatError(String);

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Jpeg,
    Png,
    Webp,
}

impl Format {
    pub const ALL: [Format; 3] = [Format::Jpeg, Format::Png, Format::Webp];

    pub fn mime(self) -> &'static str {
        match self {
            Format::Jpeg => "image/jpeg",
            Format::Png => "image/png",
            Format::Webp => "image/webp",
        }
    }

    /// File extension used when naming output files.
    pub fn extension(self) -> &'static str {
        match self {
            Format::Jpeg => "jpg",
            Format::Png => "png",
            Format::Webp => "webp",
        }
    }

    /// PNG is lossless: the quality knob has no effect on its output.
    pub fn supports_quality(self) -> bool {
        !matches!(self, Format::Png)
    }

    /// Map a detected `image` crate format onto the formats we can write.
    pub fn from_image_format(format: image::ImageFormat) -> Option<Self> {
        match format {
            image::ImageFormat::Jpeg => Some(Format::Jpeg),
            image::ImageFormat::Png => Some(Format::Png),
            image::ImageFormat::WebP => Some(Format::Webp),
            _ => None,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Format::Jpeg => "jpeg",
            Format::Png => "png",
            Format::Webp => "webp",
        };
        f.write_str(name)
    }
}

impl FromStr for Format {
    type Err = ParseFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(Format::Jpeg),
            "png" => Ok(Format::Png),
            "webp" => Ok(Format::Webp),
            _ => Err(ParseFormatError(s.to_string())),
        }
    }
}

/// How the caller wants the output quality chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityMode {
    /// Encode once at this quality.
    Percentage(Quality),
    /// Search for the highest quality whose output fits in this many bytes.
    TargetBytes(u64),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("target size must be greater than zero")]
    ZeroTarget,
}

/// A validated encode request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeRequest {
    pub format: Format,
    pub mode: QualityMode,
}

impl EncodeRequest {
    pub fn quality(format: Format, quality: Quality) -> Self {
        Self {
            format,
            mode: QualityMode::Percentage(quality),
        }
    }

    pub fn target_bytes(format: Format, target: u64) -> Self {
        Self {
            format,
            mode: QualityMode::TargetBytes(target),
        }
    }

    /// Validate against the original file size.
    ///
    /// A zero budget is rejected. A budget above the original size is
    /// clamped down to it (an original size of 0 means "unknown" and
    /// disables the clamp).
    pub fn normalized(self, original_size: u64) -> Result<Self, RequestError> {
        let mode = match self.mode {
            QualityMode::Percentage(q) => QualityMode::Percentage(q),
            QualityMode::TargetBytes(0) => return Err(RequestError::ZeroTarget),
            QualityMode::TargetBytes(target) if original_size > 0 => {
                QualityMode::TargetBytes(target.min(original_size))
            }
            QualityMode::TargetBytes(target) => QualityMode::TargetBytes(target),
        };
        Ok(Self { mode, ..self })
    }
}

/// Length unit for resize dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    #[default]
    Px,
    Percent,
    Mm,
    Cm,
    In,
}

impl FromStr for Unit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "px" => Ok(Unit::Px),
            "%" | "percent" => Ok(Unit::Percent),
            "mm" => Ok(Unit::Mm),
            "cm" => Ok(Unit::Cm),
            "in" | "inch" => Ok(Unit::In),
            other => Err(format!("unknown unit '{other}' (expected px, %, mm, cm, in)")),
        }
    }
}

/// How the source is mapped onto the target box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeMethod {
    /// Stretch to the exact box; may distort.
    Exact,
    /// Scale to fit inside the box, centered on a white background.
    #[default]
    Fit,
    /// Scale to cover the box, center-cropping the overflow.
    Fill,
    /// Cut the largest centered region of the box's aspect ratio and
    /// scale it to the box.
    Crop,
}

impl FromStr for ResizeMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" => Ok(ResizeMethod::Exact),
            "fit" => Ok(ResizeMethod::Fit),
            "fill" => Ok(ResizeMethod::Fill),
            "crop" => Ok(ResizeMethod::Crop),
            other => Err(format!(
                "unknown resize method '{other}' (expected exact, fit, fill, crop)"
            )),
        }
    }
}

/// Parameters for a resize operation, in user units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeParams {
    pub width: f64,
    pub height: f64,
    pub unit: Unit,
    pub method: ResizeMethod,
}
