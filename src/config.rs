//! Journal configuration module.
//!
//! Handles loading, validating, and merging the journal's `config.toml`.
//! Stock defaults are the base layer; the user file only needs the keys it
//! wants to change.
//!
//! ## Config File Location
//!
//! ```text
//! journal/
//! ├── config.toml              # Optional, overrides stock defaults
//! ├── periods.yaml             # Optional named date ranges
//! └── 2023/
//!     └── 05-01-park/
//!         ├── entry.md
//!         ├── track.gpx
//!         └── photos/
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! title = "Journal"
//!
//! [gallery]
//! directory = "photos"            # Default gallery directory, relative to the entry
//! include = "*.jpg"               # Default glob for gallery images
//! thumbnail_directory = "thumbs"  # Pre-made thumbnails, relative to the gallery directory
//!
//! [tracks]
//! default_file = "track.gpx"      # Default track file for map blocks
//! gpx_extensions = ["gpx"]
//! nmea_extensions = ["nmea", "nma"]
//!
//! [images]
//! display_width = 2000
//! thumbnail_width = 600
//! quality = 95                    # JPEG quality (1-100)
//!
//! [periods]
//! file = "periods.yaml"
//!
//! [processing]
//! max_processes = 4               # Max render workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const CONFIG_FILENAME: &str = "config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Journal configuration loaded from `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JournalConfig {
    /// Site title shown in page headers.
    pub title: String,
    pub gallery: GalleryConfig,
    pub tracks: TracksConfig,
    pub images: ImagesConfig,
    pub periods: PeriodsConfig,
    pub processing: ProcessingConfig,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            title: "Journal".to_string(),
            gallery: GalleryConfig::default(),
            tracks: TracksConfig::default(),
            images: ImagesConfig::default(),
            periods: PeriodsConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl JournalConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.images.quality == 0 || self.images.quality > 100 {
            return Err(ConfigError::Validation(
                "images.quality must be 1-100".into(),
            ));
        }
        if self.images.display_width == 0 || self.images.thumbnail_width == 0 {
            return Err(ConfigError::Validation(
                "images.display_width and images.thumbnail_width must be non-zero".into(),
            ));
        }
        if self.gallery.include.trim().is_empty() {
            return Err(ConfigError::Validation(
                "gallery.include must not be empty".into(),
            ));
        }
        if let Some(ext) = self
            .tracks
            .gpx_extensions
            .iter()
            .find(|e| self.tracks.nmea_extensions.contains(e))
        {
            return Err(ConfigError::Validation(format!(
                "track extension '{ext}' is listed as both GPX and NMEA"
            )));
        }
        Ok(())
    }
}

/// Defaults for `:: gallery` blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GalleryConfig {
    pub directory: String,
    pub include: String,
    /// Subdirectory of a gallery holding camera- or tool-made thumbnails.
    /// When a thumbnail exists there it is used as the scaling source.
    pub thumbnail_directory: String,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            directory: "photos".to_string(),
            include: "*.jpg".to_string(),
            thumbnail_directory: "thumbs".to_string(),
        }
    }
}

/// Track file defaults and format dispatch tables.
///
/// Extensions are matched case-insensitively and without the leading dot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TracksConfig {
    pub default_file: String,
    pub gpx_extensions: Vec<String>,
    pub nmea_extensions: Vec<String>,
}

impl Default for TracksConfig {
    fn default() -> Self {
        Self {
            default_file: "track.gpx".to_string(),
            gpx_extensions: vec!["gpx".to_string()],
            nmea_extensions: vec!["nmea".to_string(), "nma".to_string()],
        }
    }
}

/// Output image scaling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    pub display_width: u32,
    pub thumbnail_width: u32,
    pub quality: u32,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            display_width: 2000,
            thumbnail_width: 600,
            quality: 95,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PeriodsConfig {
    /// Sidecar file with named date ranges, relative to the journal root.
    pub file: String,
}

impl Default for PeriodsConfig {
    fn default() -> Self {
        Self {
            file: "periods.yaml".to_string(),
        }
    }
}

/// Parallel rendering settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of render workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)`, at least 1
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(JournalConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `config.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the directory has no config file.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Load the journal config from `<root>/config.toml`.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(root: &Path) -> Result<JournalConfig, ConfigError> {
    let merged = match load_raw_config(root)? {
        Some(overlay) => merge_toml(stock_defaults_value(), overlay),
        None => stock_defaults_value(),
    };
    let config: JournalConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Returns a fully-commented stock `config.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Simple Journal Configuration
# ===========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# Site title shown in page headers.
title = "Journal"

# ---------------------------------------------------------------------------
# Galleries (":: gallery" blocks)
# ---------------------------------------------------------------------------
[gallery]
# Directory scanned when a block gives no `path`, relative to the entry file.
directory = "photos"

# Glob for gallery images when a block gives no `include`.
include = "*.jpg"

# Subdirectory of a gallery with ready-made thumbnails (optional).
thumbnail_directory = "thumbs"

# ---------------------------------------------------------------------------
# GPS tracks (":: map" blocks)
# ---------------------------------------------------------------------------
[tracks]
# Track file used when a block gives no `file`, relative to the entry file.
default_file = "track.gpx"

# Extensions (without dot) read as GPX XML and NMEA 0183 sentences.
gpx_extensions = ["gpx"]
nmea_extensions = ["nmea", "nma"]

# ---------------------------------------------------------------------------
# Published images
# ---------------------------------------------------------------------------
[images]
# Maximum width in pixels of the full-size variant.
display_width = 2000

# Maximum width in pixels of gallery thumbnails and index previews.
thumbnail_width = 600

# JPEG encoding quality (1 = worst, 100 = best).
quality = 95

# ---------------------------------------------------------------------------
# Periods
# ---------------------------------------------------------------------------
[periods]
# YAML file mapping period names to {from, to} dates (YYYY-MM-DD).
file = "periods.yaml"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel render workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = JournalConfig::default();
        assert_eq!(config.title, "Journal");
        assert_eq!(config.gallery.directory, "photos");
        assert_eq!(config.gallery.include, "*.jpg");
        assert_eq!(config.tracks.default_file, "track.gpx");
        assert_eq!(config.tracks.gpx_extensions, vec!["gpx"]);
        assert_eq!(config.tracks.nmea_extensions, vec!["nmea", "nma"]);
        assert_eq!(config.images.display_width, 2000);
        assert_eq!(config.images.thumbnail_width, 600);
        assert_eq!(config.images.quality, 95);
        assert_eq!(config.periods.file, "periods.yaml");
        assert!(config.processing.max_processes.is_none());
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
[tracks]
nmea_extensions = ["log"]
"#;
        let config: JournalConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.tracks.nmea_extensions, vec!["log"]);
        // Untouched values keep their defaults
        assert_eq!(config.tracks.gpx_extensions, vec!["gpx"]);
        assert_eq!(config.images.quality, 95);
    }

    #[test]
    fn unknown_keys_rejected() {
        let toml = r#"
[gallery]
directroy = "pics"
"#;
        let result: Result<JournalConfig, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn validate_rejects_bad_quality() {
        let mut config = JournalConfig::default();
        config.images.quality = 0;
        assert!(config.validate().is_err());
        config.images.quality = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_overlapping_track_extensions() {
        let mut config = JournalConfig::default();
        config.tracks.nmea_extensions.push("gpx".into());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("'gpx'"));
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_toml_overrides_leaf_and_keeps_siblings() {
        let base: toml::Value = toml::from_str(
            r#"
[images]
display_width = 2000
quality = 95
"#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str(
            r#"
[images]
quality = 80
"#,
        )
        .unwrap();
        let merged = merge_toml(base, overlay);
        let images = merged.get("images").unwrap();
        assert_eq!(images.get("quality").unwrap().as_integer(), Some(80));
        assert_eq!(images.get("display_width").unwrap().as_integer(), Some(2000));
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.title, "Journal");
    }

    #[test]
    fn load_config_merges_user_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            "title = \"Travels\"\n[processing]\nmax_processes = 2\n",
        )
        .unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.title, "Travels");
        assert_eq!(config.processing.max_processes, Some(2));
        assert_eq!(config.gallery.directory, "photos");
    }

    #[test]
    fn load_config_surfaces_validation_errors() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            "[images]\nthumbnail_width = 0\n",
        )
        .unwrap();
        assert!(matches!(
            load_config(tmp.path()),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn stock_config_parses_to_defaults() {
        let config: JournalConfig = toml::from_str(stock_config_toml()).unwrap();
        let defaults = JournalConfig::default();
        assert_eq!(config.title, defaults.title);
        assert_eq!(config.tracks.nmea_extensions, defaults.tracks.nmea_extensions);
        assert_eq!(config.images.quality, defaults.images.quality);
        config.validate().unwrap();
    }

    #[test]
    fn effective_threads_clamps_to_cores() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let config = ProcessingConfig {
            max_processes: Some(cores + 64),
        };
        assert_eq!(effective_threads(&config), cores);
        let config = ProcessingConfig {
            max_processes: Some(0),
        };
        assert_eq!(effective_threads(&config), 1);
        assert_eq!(effective_threads(&ProcessingConfig::default()), cores);
    }
}
