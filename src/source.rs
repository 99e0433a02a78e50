//! The decoded source image every operation reads from.
//!
//! A [`SourceImage`] is created once per load and never mutated afterwards.
//! Operations that change pixels (resize) produce a new, *derived* source
//! that remembers the original file size so size-reduction figures stay
//! relative to what the user started with.

use crate::cache::{hash_bytes, hash_image};
use crate::imaging::{BackendError, EncodeBackend, Format};
use image::DynamicImage;
use std::path::Path;

/// An immutable decoded image plus the facts about the file it came from.
#[derive(Debug, Clone)]
pub struct SourceImage {
    image: DynamicImage,
    original_size: u64,
    format: Option<Format>,
    name: Option<String>,
    content_hash: String,
}

impl SourceImage {
    /// Decode encoded bytes through the backend.
    ///
    /// The content hash is the SHA-256 of the encoded bytes, so two loads of
    /// the same file share cache entries.
    pub fn decode(backend: &impl EncodeBackend, bytes: Vec<u8>) -> Result<Self, BackendError> {
        let image = backend.decode(&bytes)?;
        let format = image::guess_format(&bytes)
            .ok()
            .and_then(Format::from_image_format);
        Ok(Self {
            image,
            original_size: bytes.len() as u64,
            format,
            name: None,
            content_hash: hash_bytes(&bytes),
        })
    }

    /// Read and decode a file, keeping its file name.
    pub fn open(backend: &impl EncodeBackend, path: &Path) -> Result<Self, BackendError> {
        let bytes = std::fs::read(path)?;
        let source = Self::decode(backend, bytes)?;
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned());
        Ok(Self { name, ..source })
    }

    /// Wrap an in-memory bitmap that has no backing file.
    pub fn from_image(image: DynamicImage) -> Self {
        let content_hash = hash_image(&image);
        Self {
            image,
            original_size: 0,
            format: None,
            name: None,
            content_hash,
        }
    }

    /// A new source from processed pixels, inheriting the parent's file facts.
    pub fn derived(image: DynamicImage, parent: &SourceImage) -> Self {
        Self {
            original_size: parent.original_size,
            format: parent.format,
            name: parent.name.clone(),
            ..Self::from_image(image)
        }
    }

    pub fn with_name(self, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..self
        }
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Size in bytes of the file this image was loaded from (0 if unknown).
    pub fn original_size(&self) -> u64 {
        self.original_size
    }

    /// Detected input format, when it is one we can also write.
    pub fn format(&self) -> Option<Format> {
        self.format
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Hex SHA-256 identifying this image's content.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }
}
