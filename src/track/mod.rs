//! GPS track loading.
//!
//! Two formats are understood, picked by file extension:
//!
//! | Format | Default extensions | Points taken from |
//! |---|---|---|
//! | GPX 1.1 | `gpx` | every `trkpt` with a `<time>` child |
//! | NMEA 0183 | `nmea`, `nma` | `RMC` sentences with status `A` |
//!
//! Points come back in file order. Chronological order is assumed by the
//! correlator but not checked. A file that fails to parse fails as a whole;
//! there is no partial track.

pub mod correlate;
mod gpx;
mod nmea;

use crate::config::TracksConfig;
use crate::types::TrackPoint;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

pub use correlate::{MAX_DELTA_SECONDS, correlate, nearest};

#[derive(Error, Debug)]
pub enum TrackError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("Invalid GPX: {0}")]
    Gpx(String),
    #[error("Invalid NMEA sentence on line {line}: {message}")]
    Nmea { line: usize, message: String },
    #[error("Unknown track file extension '{0}'")]
    UnknownExtension(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackFormat {
    Gpx,
    Nmea,
}

/// Pick the parser for `path` from the configured extension lists.
pub fn format_for(path: &Path, config: &TracksConfig) -> Result<TrackFormat, TrackError> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let listed = |list: &[String]| {
        list.iter()
            .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(&ext))
    };
    if listed(&config.gpx_extensions) {
        Ok(TrackFormat::Gpx)
    } else if listed(&config.nmea_extensions) {
        Ok(TrackFormat::Nmea)
    } else {
        Err(TrackError::UnknownExtension(ext))
    }
}

/// Read and parse a track file.
pub fn load_track(path: &Path, config: &TracksConfig) -> Result<Vec<TrackPoint>, TrackError> {
    let format = format_for(path, config)?;
    let text = std::fs::read_to_string(path)?;
    let points = match format {
        TrackFormat::Gpx => gpx::parse(&text)?,
        TrackFormat::Nmea => nmea::parse(&text)?,
    };
    debug!(path = %path.display(), points = points.len(), "loaded track");
    Ok(points)
}
