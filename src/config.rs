//! Configuration module.
//!
//! Handles loading, validating, and merging `squeeze.toml`. Stock defaults
//! are the base layer; a user file overrides just the keys it names.
//!
//! ## Config File Location
//!
//! The CLI looks for, in order:
//!
//! 1. the file given with `--config FILE` (must exist);
//! 2. `squeeze.toml` in the working directory, if present;
//! 3. otherwise, stock defaults only.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [compress]
//! quality = 75              # Default quality for `compress` (1-100)
//! # format = "webp"         # Output format; omit to keep the input format
//!
//! [convert]
//! lossy_quality = 95        # Quality for lossy targets in `convert`
//!
//! [live]
//! debounce_ms = 300         # Quiescence window for live updates
//!
//! [cache]
//! capacity = 32             # Encoded buffers kept per session
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::cache::DEFAULT_CAPACITY;
use crate::imaging::{Format, Quality};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// File name looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "squeeze.toml";

/// Longest accepted debounce window.
pub const MAX_DEBOUNCE_MS: u64 = 10_000;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `squeeze.toml`.
///
/// All fields have defaults. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub compress: CompressConfig,
    pub convert: ConvertConfig,
    pub live: LiveConfig,
    pub cache: CacheConfig,
}

impl Config {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.compress.quality) {
            return Err(ConfigError::Validation(
                "compress.quality must be 1-100".into(),
            ));
        }
        if !(1..=100).contains(&self.convert.lossy_quality) {
            return Err(ConfigError::Validation(
                "convert.lossy_quality must be 1-100".into(),
            ));
        }
        if self.live.debounce_ms > MAX_DEBOUNCE_MS {
            return Err(ConfigError::Validation(format!(
                "live.debounce_ms must be at most {MAX_DEBOUNCE_MS}"
            )));
        }
        if self.cache.capacity == 0 {
            return Err(ConfigError::Validation(
                "cache.capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Defaults for the `compress` command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompressConfig {
    pub quality: u32,
    /// Output format. `None` keeps the input's format.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<Format>,
}

impl Default for CompressConfig {
    fn default() -> Self {
        Self {
            quality: Quality::default().value(),
            format: None,
        }
    }
}

impl CompressConfig {
    pub fn quality(&self) -> Quality {
        Quality::new(self.quality)
    }
}

/// Defaults for the `convert` command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConvertConfig {
    /// Used for JPEG and WebP targets. PNG always uses 100.
    pub lossy_quality: u32,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self { lossy_quality: 95 }
    }
}

impl ConvertConfig {
    pub fn lossy_quality(&self) -> Quality {
        Quality::new(self.lossy_quality)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LiveConfig {
    pub debounce_ms: u64,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self { debounce_ms: 300 }
    }
}

impl LiveConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

/// [`Config::default`] as a TOML table, the layer a user file is merged onto.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(Config::default()).expect("Config::default serializes to a TOML table")
}

/// Lay `overlay` over `base`. Nested tables combine key by key; any other
/// overlay value wins outright, and base keys absent from the overlay stay.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    let overrides = match overlay {
        toml::Value::Table(table) => table,
        other => return other,
    };
    let mut merged = match base {
        toml::Value::Table(table) => table,
        _ => return toml::Value::Table(overrides),
    };
    for (key, value) in overrides {
        let combined = match merged.remove(&key) {
            Some(existing) => merge_toml(existing, value),
            None => value,
        };
        merged.insert(key, combined);
    }
    toml::Value::Table(merged)
}

/// Parse `path` as TOML. A missing file is `Ok(None)`, not an error.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(toml::from_str(&text)?))
}

/// Build a validated [`Config`] from the stock layer and an optional user layer.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<Config, ConfigError> {
    let config: Config = overlay.into_iter().fold(base, merge_toml).try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the effective config.
///
/// An `explicit` path must exist. Without one, `squeeze.toml` in `dir` is
/// used when present.
pub fn load_config(explicit: Option<&Path>, dir: &Path) -> Result<Config, ConfigError> {
    let overlay = match explicit {
        Some(path) => {
            log::debug!("config: {}", path.display());
            let content = fs::read_to_string(path)?;
            Some(toml::from_str(&content)?)
        }
        None => load_raw_config(&dir.join(CONFIG_FILE_NAME))?,
    };
    resolve_config(stock_defaults_value(), overlay)
}

/// Returns a fully-commented stock `squeeze.toml` with all keys.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# squeeze configuration
# =====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# squeeze reads ./squeeze.toml when present, or the file given with
# --config. Unknown keys cause an error.

# ---------------------------------------------------------------------------
# compress command
# ---------------------------------------------------------------------------
[compress]
# Quality used when neither --quality nor --target-size is given (1-100).
quality = 75

# Output format: "jpeg", "png" or "webp".
# When omitted, the input's format is kept (PNG inputs stay PNG).
# format = "webp"

# ---------------------------------------------------------------------------
# convert command
# ---------------------------------------------------------------------------
[convert]
# Quality for JPEG and WebP targets. PNG output is always lossless.
lossy_quality = 95

# ---------------------------------------------------------------------------
# live command
# ---------------------------------------------------------------------------
[live]
# Milliseconds without a new setting before the image is re-encoded.
debounce_ms = 300

# ---------------------------------------------------------------------------
# Encode cache
# ---------------------------------------------------------------------------
[cache]
# Number of encoded buffers kept in memory while a source is loaded.
capacity = 32
"##
}
