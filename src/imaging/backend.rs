//! Decode/encode backend trait and shared types.
//!
//! The [`EncodeBackend`] trait is the one primitive the compression core
//! depends on: turn source bytes into a bitmap, and turn a bitmap into an
//! encoded buffer for a given format and quality.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend). Tests use the
//! [`MockBackend`](tests::MockBackend) below, whose output size is a
//! function of quality, so search behavior can be checked exactly.

use super::params::{Format, Quality};
use crate::source::SourceImage;
use image::DynamicImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Decode failed: {0}")]
    DecodeFailed(String),
    #[error("Encode failed: {0}")]
    EncodeFailed(String),
}

/// Trait for image codec backends.
///
/// Implementations must be deterministic: encoding the same source with the
/// same format and quality yields byte-identical output. `Sync` so a single
/// backend can serve the live worker thread and the caller at once.
pub trait EncodeBackend: Sync {
    /// Decode an encoded image into a bitmap.
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, BackendError>;

    /// Serialize a source bitmap. `quality` is ignored by lossless formats.
    fn encode(
        &self,
        source: &SourceImage,
        format: Format,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError>;
}
