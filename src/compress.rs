//! Re-encoding and target-size compression.
//!
//! This is the core of the crate. Everything else either feeds it a
//! [`SourceImage`] or consumes the [`EncodeResult`] it produces.
//!
//! # Operations
//!
//! - [`encode_at_quality`]: one encode at a fixed quality.
//! - [`encode_to_target_size`]: search for the highest quality whose output
//!   fits in a byte budget.
//! - [`compress`]: validate an [`EncodeRequest`], dispatch to one of the
//!   above, and report the result with its size reduction.
//!
//! # Target-size search
//!
//! The search is a binary search over the integer qualities 1..=100 that
//! keeps the highest probed quality whose output is within budget:
//!
//! ```text
//! low = 1, high = 100
//! while low <= high:
//!     mid = (low + high) / 2
//!     size(mid) <= target  →  best = mid, low = mid + 1
//!     size(mid) >  target  →  high = mid - 1
//! ```
//!
//! It probes at most [`MAX_SEARCH_ATTEMPTS`] qualities. The result is exact
//! only if output size never decreases as quality increases. Real encoders
//! occasionally break that at the extremes, in which case the search can
//! settle on a quality below the true optimum (it never returns an output
//! over budget). Neighbors are not re-verified; the probe count stays fixed.
//!
//! A codec error aborts the search: whatever was found so far is returned,
//! and the error is kept in [`SearchOutcome::failure`].
//!
//! # Lossless formats
//!
//! PNG has no quality knob. It is always encoded once at quality 100 and
//! reported as such, and a byte budget is advisory: the single PNG encoding
//! is returned even when it is larger than the budget.

use crate::imaging::{
    BackendError, EncodeBackend, EncodeRequest, Format, Quality, QualityMode, RequestError,
    format_file_size, size_reduction_percent,
};
use crate::source::SourceImage;
use base64::{Engine as _, engine::general_purpose};
use thiserror::Error;

/// Upper bound on encodes performed by one target-size search (⌈log2 100⌉).
pub const MAX_SEARCH_ATTEMPTS: u32 = 7;

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("{format} encode failed: {source}")]
    PrimitiveFailed {
        format: Format,
        #[source]
        source: BackendError,
    },
}

#[derive(Error, Debug)]
pub enum CompressError {
    #[error(transparent)]
    Encode(#[from] EncodeError),
    /// Not a defect: even the lowest quality is over budget.
    #[error("a target of {target_bytes} bytes is unreachable for this image")]
    BudgetUnreachable {
        target_bytes: u64,
        /// Smallest output seen during the search, if any encode succeeded.
        smallest: Option<u64>,
    },
    #[error("invalid request: {0}")]
    Request(#[from] RequestError),
}

/// One encoded output. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeResult {
    bytes: Vec<u8>,
    format: Format,
    quality_used: Quality,
}

impl EncodeResult {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// The quality the bytes were actually encoded at (100 for PNG).
    pub fn quality_used(&self) -> Quality {
        self.quality_used
    }

    /// Embeddable `data:` URI for previews.
    pub fn data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.format.mime(),
            general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

/// Encode `source` once.
///
/// `quality` is already clamped to 1..=100 by [`Quality`]. For PNG it is
/// replaced by 100 before the backend is called.
pub fn encode_at_quality(
    backend: &impl EncodeBackend,
    source: &SourceImage,
    format: Format,
    quality: Quality,
) -> Result<EncodeResult, EncodeError> {
    let quality = if format.supports_quality() {
        quality
    } else {
        Quality::MAX
    };
    let bytes = backend
        .encode(source, format, quality)
        .map_err(|source| EncodeError::PrimitiveFailed { format, source })?;
    Ok(EncodeResult {
        bytes,
        format,
        quality_used: quality,
    })
}

/// Everything a target-size search learned.
#[derive(Debug)]
pub struct SearchOutcome {
    /// Highest-quality probe within budget.
    pub best: Option<EncodeResult>,
    /// Number of encodes performed.
    pub attempts: u32,
    /// Smallest output seen, with the quality that produced it.
    pub smallest: Option<(u64, Quality)>,
    /// The codec error that ended the search early, if any.
    pub failure: Option<EncodeError>,
}

/// Run the target-size search and return the full [`SearchOutcome`].
///
/// See the [module docs](self) for the algorithm and its guarantees.
pub fn search_target_size(
    backend: &impl EncodeBackend,
    source: &SourceImage,
    format: Format,
    target_bytes: u64,
) -> SearchOutcome {
    if !format.supports_quality() {
        return match encode_at_quality(backend, source, format, Quality::MAX) {
            Ok(result) => SearchOutcome {
                smallest: Some((result.size_bytes(), result.quality_used())),
                best: Some(result),
                attempts: 1,
                failure: None,
            },
            Err(e) => SearchOutcome {
                best: None,
                attempts: 1,
                smallest: None,
                failure: Some(e),
            },
        };
    }

    let (mut low, mut high) = (Quality::MIN.value(), Quality::MAX.value());
    let mut outcome = SearchOutcome {
        best: None,
        attempts: 0,
        smallest: None,
        failure: None,
    };

    while low <= high {
        let mid = (low + high) / 2;
        outcome.attempts += 1;
        let result = match encode_at_quality(backend, source, format, Quality::new(mid)) {
            Ok(result) => result,
            Err(e) => {
                log::warn!("target-size search aborted at quality {mid}: {e}");
                outcome.failure = Some(e);
                break;
            }
        };

        let size = result.size_bytes();
        log::debug!(
            "search {format} q={mid}: {} (target {})",
            format_file_size(size),
            format_file_size(target_bytes)
        );
        if outcome.smallest.is_none_or(|(smallest, _)| size < smallest) {
            outcome.smallest = Some((size, result.quality_used()));
        }

        if size <= target_bytes {
            outcome.best = Some(result);
            low = mid + 1;
        } else {
            // mid >= 1, so this cannot underflow; high = 0 ends the loop.
            high = mid - 1;
        }
    }

    outcome
}

/// Highest probed quality whose output fits in `target_bytes`.
///
/// `None` means the budget is unreachable (or the codec failed before any
/// probe fit). PNG bypasses the search and always returns its single
/// lossless encoding.
pub fn encode_to_target_size(
    backend: &impl EncodeBackend,
    source: &SourceImage,
    format: Format,
    target_bytes: u64,
) -> Option<EncodeResult> {
    search_target_size(backend, source, format, target_bytes).best
}

/// A finished compression with the figures shown to the user.
#[derive(Debug, Clone)]
pub struct CompressReport {
    pub result: EncodeResult,
    /// The request after validation (target clamped to the original size).
    pub request: EncodeRequest,
    pub original_size: u64,
    /// `(original - result) / original * 100`, floored at 0.
    pub reduction_percent: f64,
    /// Encodes performed to produce this result.
    pub attempts: u32,
}

impl CompressReport {
    pub fn quality_used(&self) -> Quality {
        self.result.quality_used()
    }

    pub fn size_label(&self) -> String {
        format_file_size(self.result.size_bytes())
    }
}

/// Validate `request` and produce an encoding of `source` that satisfies it.
pub fn compress(
    backend: &impl EncodeBackend,
    source: &SourceImage,
    request: EncodeRequest,
) -> Result<CompressReport, CompressError> {
    let request = request.normalized(source.original_size())?;
    let format = request.format;

    let (result, attempts) = match request.mode {
        QualityMode::Percentage(quality) => {
            (encode_at_quality(backend, source, format, quality)?, 1)
        }
        QualityMode::TargetBytes(target_bytes) => {
            let outcome = search_target_size(backend, source, format, target_bytes);
            match (outcome.best, outcome.failure) {
                (Some(best), _) => (best, outcome.attempts),
                (None, Some(failure)) => return Err(failure.into()),
                (None, None) => {
                    return Err(CompressError::BudgetUnreachable {
                        target_bytes,
                        smallest: outcome.smallest.map(|(size, _)| size),
                    });
                }
            }
        }
    };

    let original_size = source.original_size();
    Ok(CompressReport {
        reduction_percent: size_reduction_percent(original_size, result.size_bytes()),
        result,
        request,
        original_size,
        attempts,
    })
}

/// Quality used when converting to `format` without an explicit setting.
pub fn convert_quality(format: Format, lossy_quality: Quality) -> Quality {
    if format.supports_quality() {
        lossy_quality
    } else {
        Quality::MAX
    }
}

/// A short note about the trade-offs of converting between two formats.
pub fn conversion_note(from: Option<Format>, to: Format) -> Option<&'static str> {
    match (from?, to) {
        (Format::Jpeg, Format::Png) => Some(
            "Converting from JPEG (lossy) to PNG (lossless) will preserve maximum quality but increase file size.",
        ),
        (Format::Jpeg, Format::Webp) => {
            Some("WebP typically provides better compression than JPEG with similar quality.")
        }
        (Format::Png, Format::Jpeg) => Some(
            "Converting from PNG (lossless) to JPEG (lossy) will reduce file size but may lose transparency.",
        ),
        (Format::Png, Format::Webp) => Some(
            "WebP can provide better compression than PNG while maintaining transparency support.",
        ),
        _ => None,
    }
}
