//! NMEA 0183 track parsing.
//!
//! A log is a sequence of sentences, one per line:
//!
//! ```text
//! $GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230323,003.1,W*6A
//!  ^^^^^ ^^^^^^ ^ ^^^^^^^^^^ ^^^^^^^^^^^         ^^^^^^        ^^ checksum
//!  addr  time   status  lat        lon           date
//! ```
//!
//! Every non-blank line has to be a well-formed sentence, but only `RMC`
//! sentences with an active fix (`A`) become track points. Void fixes and
//! other sentence types are skipped.

use super::TrackError;
use crate::types::{LatLon, TrackPoint};
use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};

pub(super) fn parse(text: &str) -> Result<Vec<TrackPoint>, TrackError> {
    let mut points = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let point = parse_sentence(line).map_err(|message| TrackError::Nmea {
            line: idx + 1,
            message,
        })?;
        points.extend(point);
    }
    Ok(points)
}

/// Parse one sentence. `Ok(None)` means well-formed but not a usable fix.
fn parse_sentence(line: &str) -> Result<Option<TrackPoint>, String> {
    let body = line
        .strip_prefix('$')
        .or_else(|| line.strip_prefix('!'))
        .ok_or_else(|| "sentence must start with '$' or '!'".to_string())?;

    let body = match body.split_once('*') {
        Some((data, checksum)) => {
            verify_checksum(data, checksum)?;
            data
        }
        None => body,
    };

    let fields: Vec<&str> = body.split(',').collect();
    let address = fields[0];
    if address.len() < 5 || !address.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(format!("invalid address '{address}'"));
    }
    if !address.ends_with("RMC") {
        return Ok(None);
    }
    parse_rmc(&fields)
}

fn verify_checksum(data: &str, checksum: &str) -> Result<(), String> {
    let expected = u8::from_str_radix(checksum.trim(), 16)
        .map_err(|_| format!("invalid checksum '{checksum}'"))?;
    let actual = data.bytes().fold(0u8, |acc, b| acc ^ b);
    if actual != expected {
        return Err(format!(
            "checksum mismatch: expected {expected:02X}, computed {actual:02X}"
        ));
    }
    Ok(())
}

/// `RMC,time,status,lat,N/S,lon,E/W,speed,course,date,...`
fn parse_rmc(fields: &[&str]) -> Result<Option<TrackPoint>, String> {
    if fields.len() < 10 {
        return Err(format!("RMC sentence has {} fields, need 10", fields.len()));
    }
    if fields[2] != "A" {
        return Ok(None);
    }
    let time = parse_time(fields[1])?;
    let date = parse_date(fields[9])?;
    let lat = parse_coordinate(fields[3], fields[4], 2)?;
    let lon = parse_coordinate(fields[5], fields[6], 3)?;
    Ok(Some(TrackPoint {
        position: LatLon::new(lat, lon),
        time: Utc.from_utc_datetime(&date.and_time(time)),
    }))
}

/// `hhmmss` with optional fractional seconds.
fn parse_time(field: &str) -> Result<NaiveTime, String> {
    let invalid = || format!("invalid time '{field}'");
    let (whole, frac) = field.split_once('.').unwrap_or((field, ""));
    if whole.len() != 6 || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let num = |range: std::ops::Range<usize>| whole[range].parse::<u32>().map_err(|_| invalid());
    if !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    // Digits past nanoseconds are dropped, never rounded into the next second
    let digits: String = frac.chars().take(9).collect();
    let nanos = if digits.is_empty() {
        0
    } else {
        format!("{digits:0<9}").parse::<u32>().map_err(|_| invalid())?
    };
    NaiveTime::from_hms_nano_opt(num(0..2)?, num(2..4)?, num(4..6)?, nanos).ok_or_else(invalid)
}

/// `ddmmyy`, years taken as 2000 + yy.
fn parse_date(field: &str) -> Result<NaiveDate, String> {
    let invalid = || format!("invalid date '{field}'");
    if field.len() != 6 || !field.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let num = |range: std::ops::Range<usize>| field[range].parse::<u32>().map_err(|_| invalid());
    NaiveDate::from_ymd_opt(2000 + num(4..6)? as i32, num(2..4)?, num(0..2)?).ok_or_else(invalid)
}

/// `ddmm.mmmm` / `dddmm.mmmm` plus hemisphere.
fn parse_coordinate(field: &str, hemisphere: &str, degree_digits: usize) -> Result<f64, String> {
    let invalid = || format!("invalid coordinate '{field}{hemisphere}'");
    if field.len() <= degree_digits || !field.is_char_boundary(degree_digits) {
        return Err(invalid());
    }
    let degrees: f64 = field[..degree_digits].parse().map_err(|_| invalid())?;
    let minutes: f64 = field[degree_digits..].parse().map_err(|_| invalid())?;
    if minutes >= 60.0 {
        return Err(invalid());
    }
    let value = degrees + minutes / 60.0;
    match hemisphere {
        "N" | "E" => Ok(value),
        "S" | "W" => Ok(-value),
        _ => Err(invalid()),
    }
}
