//! Image capture metadata resolution.
//!
//! Turns raw EXIF strings into the typed values the pipeline works with.
//!
//! ## Capture time
//!
//! EXIF `DateTimeOriginal` is a wall-clock time without a zone
//! (`2023:05:01 14:30:00`). Track points are UTC, so before correlation the
//! capture time has to become an instant:
//!
//! - If the camera wrote `OffsetTimeOriginal` (`+02:00`), that offset is used.
//! - Otherwise the time is taken to be in the build machine's local zone.
//!   A wall-clock time that does not exist locally (DST gap) is dropped.
//!
//! ## Position
//!
//! GPS latitude and longitude are only used as a pair; a file with one but not
//! the other has no position.

use crate::imaging::exif_parser::ExifData;
use crate::imaging::ImageMetadata;
use crate::types::LatLon;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};

const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Resolve raw EXIF values into capture metadata.
pub fn resolve(exif: &ExifData) -> ImageMetadata {
    let taken_at = exif.date_time_original.as_deref().and_then(|dt| {
        parse_capture_time(dt, exif.offset_time_original.as_deref())
    });
    let location = match (exif.gps_latitude, exif.gps_longitude) {
        (Some(lat), Some(lon)) if valid_position(lat, lon) => Some(LatLon::new(lat, lon)),
        _ => None,
    };
    ImageMetadata { taken_at, location }
}

/// Parse an EXIF capture time, applying `offset` when present.
pub fn parse_capture_time(datetime: &str, offset: Option<&str>) -> Option<DateTime<Utc>> {
    let datetime = datetime.trim();
    if let Some(offset) = offset.map(str::trim).filter(|o| !o.is_empty()) {
        return DateTime::parse_from_str(
            &format!("{datetime} {offset}"),
            &format!("{EXIF_DATETIME_FORMAT} %:z"),
        )
        .ok()
        .map(|dt| dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(datetime, EXIF_DATETIME_FORMAT).ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Cameras without a fix write zeros; a 0/0 position is treated as absent.
fn valid_position(lat: f64, lon: f64) -> bool {
    (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon) && !(lat == 0.0 && lon == 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    // =========================================================================
    // parse_capture_time
    // =========================================================================

    #[test]
    fn capture_time_with_offset() {
        assert_eq!(
            parse_capture_time("2023:05:01 14:30:00", Some("+02:00")),
            Some(utc("2023-05-01T12:30:00Z"))
        );
        assert_eq!(
            parse_capture_time("2023:05:01 14:30:00", Some("-05:00")),
            Some(utc("2023-05-01T19:30:00Z"))
        );
    }

    #[test]
    fn capture_time_without_offset_uses_local_zone() {
        let expected = Local
            .with_ymd_and_hms(2023, 5, 1, 14, 30, 0)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc));
        assert_eq!(parse_capture_time("2023:05:01 14:30:00", None), expected);
    }

    #[test]
    fn capture_time_rejects_garbage() {
        assert_eq!(parse_capture_time("0000:00:00 00:00:00", Some("+00:00")), None);
        assert_eq!(parse_capture_time("yesterday", None), None);
        assert_eq!(parse_capture_time("2023:05:01 14:30:00", Some("CEST")), None);
    }

    // =========================================================================
    // resolve
    // =========================================================================

    #[test]
    fn resolve_full_exif() {
        let exif = ExifData {
            date_time_original: Some("2023:05:01 14:30:00".into()),
            offset_time_original: Some("+00:00".into()),
            gps_latitude: Some(52.5),
            gps_longitude: Some(-13.41),
        };
        let meta = resolve(&exif);
        assert_eq!(meta.taken_at, Some(utc("2023-05-01T14:30:00Z")));
        assert_eq!(meta.location, Some(LatLon::new(52.5, -13.41)));
    }

    #[test]
    fn resolve_requires_both_coordinates() {
        let exif = ExifData {
            gps_latitude: Some(52.5),
            ..Default::default()
        };
        assert_eq!(resolve(&exif).location, None);
    }

    #[test]
    fn resolve_drops_null_island_and_out_of_range() {
        let zero = ExifData {
            gps_latitude: Some(0.0),
            gps_longitude: Some(0.0),
            ..Default::default()
        };
        assert_eq!(resolve(&zero).location, None);

        let bogus = ExifData {
            gps_latitude: Some(95.0),
            gps_longitude: Some(10.0),
            ..Default::default()
        };
        assert_eq!(resolve(&bogus).location, None);
    }

    #[test]
    fn resolve_empty_exif() {
        assert_eq!(resolve(&ExifData::default()), ImageMetadata::default());
    }
}
