//! Matching photo capture times to track points.

use crate::types::TrackPoint;
use chrono::{DateTime, TimeDelta, Utc};

/// A photo is placed on the track only when the nearest point is closer in
/// time than this.
pub const MAX_DELTA_SECONDS: i64 = 120;

/// The point nearest in time to `target`, and the absolute difference.
///
/// Linear scan; on ties the earliest point in the track wins.
pub fn nearest(points: &[TrackPoint], target: DateTime<Utc>) -> Option<(&TrackPoint, TimeDelta)> {
    let mut best: Option<(&TrackPoint, TimeDelta)> = None;
    for point in points {
        let delta = (point.time - target).abs();
        match best {
            Some((_, best_delta)) if delta >= best_delta => {}
            _ => best = Some((point, delta)),
        }
    }
    best
}

/// The nearest point, if it lies within [`MAX_DELTA_SECONDS`].
pub fn correlate(points: &[TrackPoint], target: DateTime<Utc>) -> Option<&TrackPoint> {
    nearest(points, target)
        .filter(|(_, delta)| *delta < TimeDelta::seconds(MAX_DELTA_SECONDS))
        .map(|(point, _)| point)
}
