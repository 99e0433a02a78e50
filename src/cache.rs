//! Encode cache for repeated requests against the same source.
//!
//! Interactive use re-encodes the same image over and over: a slider that
//! returns to a previous value, or a target-size search whose probe points
//! overlap with an earlier search. This module memoizes encoded buffers so
//! those repeats skip the codec entirely.
//!
//! # Design
//!
//! The cache is **content-addressed**: the key is the SHA-256 of the source
//! (see [`SourceImage::content_hash`](crate::source::SourceImage::content_hash))
//! plus the output format and quality. Two different images never share an
//! entry, even when their encoded data starts with the same bytes.
//!
//! The cache is bounded (LRU, [`lru`] crate) and owned by whoever owns the
//! [`CachingBackend`], normally a [`Session`](crate::session::Session).
//! Nothing is global; [`CachingBackend::clear`] drops every entry.
//!
//! Only successful encodes are stored. Failures are always retried on the
//! next request.

use crate::imaging::{BackendError, EncodeBackend, Format, Quality};
use crate::source::SourceImage;
use image::DynamicImage;
use lru::LruCache;
use sha2::{Digest, Sha256};
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};

/// Default number of encoded buffers kept.
pub const DEFAULT_CAPACITY: usize = 32;

/// Identity of one encoded output.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub source_hash: String,
    pub format: Format,
    pub quality: u32,
}

impl CacheKey {
    pub fn new(source: &SourceImage, format: Format, quality: Quality) -> Self {
        Self {
            source_hash: source.content_hash().to_string(),
            format,
            quality: quality.value(),
        }
    }
}

/// Bounded LRU map from [`CacheKey`] to encoded bytes.
pub struct EncodeCache {
    entries: LruCache<CacheKey, Vec<u8>>,
    stats: CacheStats,
}

impl EncodeCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: LruCache::new(capacity),
            stats: CacheStats::default(),
        }
    }

    /// Like [`new`](Self::new), treating 0 as 1.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN))
    }

    /// Look up an entry, marking it most recently used.
    pub fn get(&mut self, key: &CacheKey) -> Option<Vec<u8>> {
        match self.entries.get(key) {
            Some(bytes) => {
                self.stats.hit();
                Some(bytes.clone())
            }
            None => {
                self.stats.miss();
                None
            }
        }
    }

    pub fn insert(&mut self, key: CacheKey, bytes: Vec<u8>) {
        self.entries.put(key, bytes);
    }

    /// Drop every entry. Statistics are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

/// Backend adapter that consults an [`EncodeCache`] before encoding.
pub struct CachingBackend<B> {
    inner: B,
    cache: Mutex<EncodeCache>,
}

impl<B: EncodeBackend> CachingBackend<B> {
    pub fn new(inner: B, capacity: usize) -> Self {
        Self {
            inner,
            cache: Mutex::new(EncodeCache::with_capacity(capacity)),
        }
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.lock().stats()
    }

    fn lock(&self) -> MutexGuard<'_, EncodeCache> {
        self.cache.lock().unwrap_or_else(|poisoned| {
            log::warn!("encode cache lock poisoned, continuing with recovered state");
            poisoned.into_inner()
        })
    }
}

impl<B: EncodeBackend> EncodeBackend for CachingBackend<B> {
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, BackendError> {
        self.inner.decode(bytes)
    }

    fn encode(
        &self,
        source: &SourceImage,
        format: Format,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError> {
        let key = CacheKey::new(source, format, quality);
        if let Some(bytes) = self.lock().get(&key) {
            log::debug!("cache hit: {format} q={}", quality.value());
            return Ok(bytes);
        }
        // The lock is not held while encoding.
        let bytes = self.inner.encode(source, format, quality)?;
        self.lock().insert(key, bytes.clone());
        Ok(bytes)
    }
}

/// SHA-256 of a byte buffer, returned as a hex string.
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// SHA-256 of a bitmap's dimensions, pixel layout, and raw samples.
pub fn hash_image(image: &DynamicImage) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"pixels\0");
    hasher.update(image.width().to_le_bytes());
    hasher.update(image.height().to_le_bytes());
    hasher.update(format!("{:?}", image.color()).as_bytes());
    hasher.update(image.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Hit/miss counters for a cache.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub misses: u32,
}

impl CacheStats {
    pub fn hit(&mut self) {
        self.hits += 1;
    }

    pub fn miss(&mut self) {
        self.misses += 1;
    }

    pub fn total(&self) -> u32 {
        self.hits + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 {
            write!(
                f,
                "{} cached, {} encoded ({} total)",
                self.hits,
                self.misses,
                self.total()
            )
        } else {
            write!(f, "{} encoded", self.misses)
        }
    }
}
