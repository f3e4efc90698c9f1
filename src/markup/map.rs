//! The `:: map` addin (alias `:: gpx`).
//!
//! Loads a track next to the document and places the document's gallery
//! photos on it by capture time. The page gets a container with the track and
//! markers embedded as JSON; drawing the map is left to client-side script.

use super::{MarkupContext, MarkupError};
use crate::track::{self, correlate};
use crate::types::{Gallery, LatLon, LocatedImage, TrackMap};
use maud::{PreEscaped, html};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

pub const SINGLE_MAP_ID: &str = "single-map";

/// YAML payload of a map block.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MapBlock {
    pub file: Option<String>,
}

pub fn element_id(ordinal: usize) -> String {
    format!("map-{ordinal:02}")
}

/// Load the block's track and correlate every dated image in `galleries`.
///
/// Galleries must be complete before this runs.
pub fn build(
    block: &MapBlock,
    doc_dir: &Path,
    ordinal: usize,
    galleries: &[Gallery],
    ctx: &MarkupContext<'_>,
) -> Result<TrackMap, MarkupError> {
    let track_path = doc_dir.join(block.file.as_deref().unwrap_or(&ctx.tracks.default_file));
    let points = track::load_track(&track_path, ctx.tracks).map_err(|source| MarkupError::Track {
        path: track_path.clone(),
        source,
    })?;

    let mut located = Vec::new();
    for image in galleries.iter().flat_map(|g| &g.images) {
        let Some(taken_at) = image.taken_at else {
            continue;
        };
        let Some(point) = correlate(&points, taken_at) else {
            continue;
        };
        if let Some(own) = image.location {
            debug!(
                image = %image.path.display(),
                distance_km = own.haversine_km(&point.position),
                "image has its own position; using track position"
            );
        }
        located.push(LocatedImage {
            uri: image.resource.uri.clone(),
            thumb_uri: image.thumbnail.as_ref().map(|t| t.uri.clone()),
            position: point.position,
        });
    }

    Ok(TrackMap {
        ordinal,
        element_id: element_id(ordinal),
        track_path: Some(track_path),
        points,
        located,
    })
}

/// A trackless map of the images that carry their own GPS position.
pub fn geotagged(galleries: &[Gallery]) -> Option<TrackMap> {
    let located: Vec<LocatedImage> = galleries
        .iter()
        .flat_map(|g| &g.images)
        .filter_map(|image| {
            image.location.map(|position| LocatedImage {
                uri: image.resource.uri.clone(),
                thumb_uri: image.thumbnail.as_ref().map(|t| t.uri.clone()),
                position,
            })
        })
        .collect();
    if located.is_empty() {
        return None;
    }
    Some(TrackMap {
        ordinal: 0,
        element_id: SINGLE_MAP_ID.to_string(),
        track_path: None,
        points: Vec::new(),
        located,
    })
}

#[derive(Serialize)]
struct MapData<'a> {
    track: Vec<[f64; 2]>,
    images: Vec<MapImage<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MapImage<'a> {
    uri: &'a str,
    thumb_uri: Option<&'a str>,
    lat_lng: [f64; 2],
}

fn lat_lng(p: &LatLon) -> [f64; 2] {
    [p.lat, p.lon]
}

/// Map data as JSON, safe to embed in a `<script>` element.
pub fn data_json(map: &TrackMap) -> Result<String, MarkupError> {
    let data = MapData {
        track: map.points.iter().map(|p| lat_lng(&p.position)).collect(),
        images: map
            .located
            .iter()
            .map(|l| MapImage {
                uri: &l.uri,
                thumb_uri: l.thumb_uri.as_deref(),
                lat_lng: lat_lng(&l.position),
            })
            .collect(),
    };
    Ok(serde_json::to_string(&data)?.replace("</", "<\\/"))
}

pub fn render_html(map: &TrackMap) -> Result<String, MarkupError> {
    let json = data_json(map)?;
    Ok(html! {
        div class="gpx-map" id=(map.element_id) {
            script type="application/json" class="map-data" { (PreEscaped(json)) }
        }
    }
    .into_string())
}
