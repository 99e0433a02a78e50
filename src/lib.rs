//! # squeeze
//!
//! Re-encode images as JPEG, PNG or WebP, either at a chosen quality or at
//! the highest quality that fits a byte budget.
//!
//! # Pipeline
//!
//! ```text
//! bytes / path ──decode──▶ SourceImage ──(resize / crop)──▶ SourceImage
//!                                │
//!                  EncodeRequest ▼
//!                compress: quality → one encode
//!                          target  → binary search over quality 1..=100
//!                                │
//!                                ▼
//!                          CompressReport (bytes, quality used, reduction)
//! ```
//!
//! Every encode goes through the [`EncodeBackend`](imaging::EncodeBackend)
//! trait, so the search logic is tested against a mock whose output size
//! is an exact function of quality.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`compress`] | Single-quality encode, target-size search, request dispatch |
//! | [`imaging`] | Codec backend, parameters, size/geometry calculations, resize and crop |
//! | [`source`] | The immutable decoded source image |
//! | [`cache`] | Content-addressed LRU cache of encoded buffers |
//! | [`live`] | Debouncer and last-write-wins result slot for interactive use |
//! | [`session`] | Owns the current source and cache; catch-and-log boundary |
//! | [`config`] | `squeeze.toml` loading, validation, and merging |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Search Over Quality, Not Bytes
//!
//! Encoders expose quality, not size. The target-size mode binary-searches
//! the integer quality range and keeps the best probe within budget, which
//! bounds the work at seven encodes per request. The search assumes size
//! grows with quality; see [`compress`] for what happens when it does not.
//!
//! ## PNG Is Lossless
//!
//! PNG output is always encoded once at quality 100. A byte budget for PNG
//! is advisory; the single encoding is returned even when it is too big.
//!
//! ## Lossy WebP Through libwebp
//!
//! The `image` crate only writes lossless WebP, so lossy WebP goes through
//! the `webp` crate. JPEG and PNG use the `image` codecs directly.

pub mod cache;
pub mod compress;
pub mod config;
pub mod imaging;
pub mod live;
pub mod output;
pub mod session;
pub mod source;
