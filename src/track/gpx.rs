//! GPX track parsing.
//!
//! Only `trkpt` elements are read; routes and waypoints are ignored. Element
//! names are matched on their local part so namespaced documents
//! (`<gpx:trkpt>`) work too.

use super::TrackError;
use crate::types::{LatLon, TrackPoint};
use chrono::{DateTime, Utc};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

/// Point under construction while inside a `<trkpt>`.
struct PendingPoint {
    position: LatLon,
    time: Option<String>,
}

pub(super) fn parse(text: &str) -> Result<Vec<TrackPoint>, TrackError> {
    let mut reader = Reader::from_str(text);
    let mut points = Vec::new();
    let mut pending: Option<PendingPoint> = None;
    let mut in_time = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"trkpt" => pending = Some(PendingPoint {
                    position: read_position(&e)?,
                    time: None,
                }),
                b"time" if pending.is_some() => in_time = true,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"trkpt" => {
                let position = read_position(&e)?;
                return Err(TrackError::Gpx(format!(
                    "track point at {},{} has no <time>",
                    position.lat, position.lon
                )));
            }
            Event::Text(t) if in_time => {
                if let Some(p) = pending.as_mut() {
                    p.time
                        .get_or_insert_with(String::new)
                        .push_str(&String::from_utf8_lossy(&t));
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"time" => in_time = false,
                b"trkpt" => {
                    if let Some(p) = pending.take() {
                        points.push(finish_point(p)?);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(points)
}

fn read_position(e: &BytesStart<'_>) -> Result<LatLon, TrackError> {
    let mut lat = None;
    let mut lon = None;
    for attr in e.attributes().flatten() {
        let value = String::from_utf8_lossy(&attr.value).to_string();
        match attr.key.as_ref() {
            b"lat" => lat = Some(parse_coordinate("lat", &value)?),
            b"lon" => lon = Some(parse_coordinate("lon", &value)?),
            _ => {}
        }
    }
    match (lat, lon) {
        (Some(lat), Some(lon)) => Ok(LatLon::new(lat, lon)),
        _ => Err(TrackError::Gpx(
            "track point is missing lat or lon".to_string(),
        )),
    }
}

fn parse_coordinate(name: &str, value: &str) -> Result<f64, TrackError> {
    value
        .trim()
        .parse()
        .map_err(|_| TrackError::Gpx(format!("invalid {name} '{value}'")))
}

fn finish_point(p: PendingPoint) -> Result<TrackPoint, TrackError> {
    let raw = p.time.ok_or_else(|| {
        TrackError::Gpx(format!(
            "track point at {},{} has no <time>",
            p.position.lat, p.position.lon
        ))
    })?;
    let time = DateTime::parse_from_rfc3339(raw.trim())
        .map_err(|e| TrackError::Gpx(format!("invalid time '{}': {}", raw.trim(), e)))?
        .with_timezone(&Utc);
    Ok(TrackPoint {
        position: p.position,
        time,
    })
}
