//! One loaded image and everything derived from it.
//!
//! A [`Session`] owns the encode cache and at most one [`SourceImage`].
//! Loading a new image replaces the previous one wholesale; removing it
//! also empties the cache.
//!
//! This is the catch-and-log boundary: [`Session::compress`] turns every
//! failure into `None` plus a log line, for callers that only want "a
//! result or nothing". [`Session::try_compress`] keeps the error.

use crate::cache::{CacheStats, CachingBackend};
use crate::compress::{CompressError, CompressReport, compress};
use crate::imaging::{
    BackendError, CropArea, EncodeBackend, EncodeRequest, ResizeParams, crop_region, resize,
};
use crate::live::LiveCompressor;
use crate::source::SourceImage;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("no image loaded")]
    NoSource,
    #[error(transparent)]
    Compress(#[from] CompressError),
}

pub struct Session<B> {
    backend: Arc<CachingBackend<B>>,
    source: Option<Arc<SourceImage>>,
}

impl<B: EncodeBackend> Session<B> {
    pub fn new(backend: B, cache_capacity: usize) -> Self {
        Self {
            backend: Arc::new(CachingBackend::new(backend, cache_capacity)),
            source: None,
        }
    }

    /// Decode `bytes` and make them the current source.
    ///
    /// On failure the previous source is kept.
    pub fn load(
        &mut self,
        bytes: Vec<u8>,
        name: Option<&str>,
    ) -> Result<Arc<SourceImage>, BackendError> {
        let mut source = SourceImage::decode(self.backend.as_ref(), bytes)?;
        if let Some(name) = name {
            source = source.with_name(name);
        }
        Ok(self.replace(source))
    }

    /// Read and load a file.
    pub fn open(&mut self, path: &Path) -> Result<Arc<SourceImage>, BackendError> {
        let source = SourceImage::open(self.backend.as_ref(), path)?;
        Ok(self.replace(source))
    }

    /// Make an already decoded image the current source.
    pub fn replace(&mut self, source: SourceImage) -> Arc<SourceImage> {
        log::debug!(
            "source: {} ({}x{}, {} bytes)",
            source.name().unwrap_or("<memory>"),
            source.width(),
            source.height(),
            source.original_size()
        );
        let source = Arc::new(source);
        self.source = Some(Arc::clone(&source));
        source
    }

    /// Replace the current source with a resized copy.
    pub fn resize(&mut self, params: &ResizeParams) -> Option<Arc<SourceImage>> {
        let resized = resize(self.source.as_deref()?, params);
        Some(self.replace(resized))
    }

    /// Replace the current source with `area` cut out and scaled to `output`.
    pub fn crop(&mut self, area: &CropArea, output: (u32, u32)) -> Option<Arc<SourceImage>> {
        let cropped = crop_region(self.source.as_deref()?, area, output);
        Some(self.replace(cropped))
    }

    /// Drop the source and every cached encoding.
    pub fn remove(&mut self) {
        self.source = None;
        self.backend.clear();
    }

    pub fn source(&self) -> Option<&Arc<SourceImage>> {
        self.source.as_ref()
    }

    pub fn backend(&self) -> &Arc<CachingBackend<B>> {
        &self.backend
    }

    pub fn try_compress(&self, request: EncodeRequest) -> Result<CompressReport, SessionError> {
        let source = self.source.as_deref().ok_or(SessionError::NoSource)?;
        Ok(compress(self.backend.as_ref(), source, request)?)
    }

    /// Compress the current source, logging any failure.
    pub fn compress(&self, request: EncodeRequest) -> Option<CompressReport> {
        match self.try_compress(request) {
            Ok(report) => Some(report),
            Err(SessionError::Compress(CompressError::Encode(e))) => {
                log::error!("compression failed: {e}");
                None
            }
            Err(e) => {
                log::warn!("no result: {e}");
                None
            }
        }
    }

    pub fn clear_cache(&self) {
        self.backend.clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.backend.stats()
    }
}

impl<B: EncodeBackend + Send + 'static> Session<B> {
    /// Start debounced compression of the current source.
    ///
    /// The compressor shares this session's cache. It keeps working on the
    /// source it was started with even if the session loads another one.
    pub fn live(&self, window: Duration) -> Option<LiveCompressor> {
        let source = Arc::clone(self.source.as_ref()?);
        Some(LiveCompressor::start(Arc::clone(&self.backend), source, window))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::MockBackend;
    use crate::imaging::{Format, Quality, ResizeMethod, Unit};

    fn session() -> Session<MockBackend> {
        Session::new(MockBackend::linear(20), 8)
    }

    #[test]
    fn compress_without_source_is_none() {
        let session = session();
        assert!(
            session
                .compress(EncodeRequest::quality(Format::Jpeg, Quality::new(50)))
                .is_none()
        );
        assert!(matches!(
            session.try_compress(EncodeRequest::quality(Format::Jpeg, Quality::new(50))),
            Err(SessionError::NoSource)
        ));
    }

    #[test]
    fn load_then_compress() {
        let mut session = session();
        let source = session.load(vec![7; 5000], Some("a.jpg")).unwrap();
        assert_eq!(source.name(), Some("a.jpg"));

        let report = session
            .compress(EncodeRequest::target_bytes(Format::Jpeg, 1000))
            .unwrap();
        assert_eq!(report.quality_used().value(), 50);
    }

    #[test]
    fn unreachable_budget_becomes_none() {
        let mut session = session();
        session.load(vec![7; 5000], None).unwrap();
        assert!(
            session
                .compress(EncodeRequest::target_bytes(Format::Jpeg, 10))
                .is_none()
        );
    }

    #[test]
    fn failed_load_keeps_previous_source() {
        let mut session = session();
        session.load(vec![1; 10], Some("keep")).unwrap();
        assert!(session.load(Vec::new(), Some("broken")).is_err());
        assert_eq!(session.source().unwrap().name(), Some("keep"));
    }

    #[test]
    fn load_replaces_source_wholesale() {
        let mut session = session();
        session.load(vec![1; 10], Some("first")).unwrap();
        session.load(vec![2; 20], None).unwrap();

        let source = session.source().unwrap();
        assert_eq!(source.name(), None);
        assert_eq!(source.original_size(), 20);
    }

    #[test]
    fn repeated_requests_hit_the_cache() {
        let mut session = session();
        session.load(vec![7; 5000], None).unwrap();
        let request = EncodeRequest::quality(Format::Webp, Quality::new(40));

        session.compress(request).unwrap();
        session.compress(request).unwrap();

        assert_eq!(session.backend().inner().encode_count(), 1);
        assert_eq!(session.cache_stats().hits, 1);
    }

    #[test]
    fn remove_drops_source_and_cache() {
        let mut session = session();
        session.load(vec![7; 5000], None).unwrap();
        session
            .compress(EncodeRequest::quality(Format::Jpeg, Quality::new(40)))
            .unwrap();

        session.remove();
        assert!(session.source().is_none());
        assert!(session.backend().is_empty());
    }

    #[test]
    fn resize_replaces_source_keeping_original_size() {
        let mut session = session();
        session.load(vec![7; 5000], None).unwrap();
        let params = ResizeParams {
            width: 2.0,
            height: 2.0,
            unit: Unit::Px,
            method: ResizeMethod::Exact,
        };

        let resized = session.resize(&params).unwrap();
        assert_eq!((resized.width(), resized.height()), (2, 2));
        assert_eq!(resized.original_size(), 5000);
    }

    #[test]
    fn crop_replaces_source_with_exact_output() {
        let mut session = session();
        let area = CropArea::centered((4, 3), (1, 1));
        assert!(session.crop(&area, (8, 8)).is_none());

        session.load(vec![7; 5000], Some("portrait.jpg")).unwrap();
        let cropped = session.crop(&area, (8, 8)).unwrap();

        assert_eq!((cropped.width(), cropped.height()), (8, 8));
        assert_eq!(cropped.original_size(), 5000);
        assert_eq!(session.source().unwrap().name(), Some("portrait.jpg"));
    }

    #[test]
    fn live_requires_a_source() {
        let session = session();
        assert!(session.live(Duration::from_millis(1)).is_none());
    }

    #[test]
    fn live_shares_the_session_cache() {
        let mut session = session();
        session.load(vec![7; 5000], None).unwrap();
        let request = EncodeRequest::quality(Format::Jpeg, Quality::new(33));
        session.compress(request).unwrap();

        let live = session.live(Duration::from_millis(1)).unwrap();
        let ticket = live.update(request).unwrap();
        assert!(live.wait_for(ticket, Duration::from_secs(5)).is_some());

        assert_eq!(session.backend().inner().encode_count(), 1);
    }
}
