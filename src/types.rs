//! Shared data model for journal documents.
//!
//! A [`Document`] is created once per markdown file while the store loads,
//! gets its galleries and maps appended by the markup pipeline, and is
//! read-only from then on. Rendering only ever sees `&Document`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

pub const CATEGORY_LOCATION: &str = "location";
pub const CATEGORY_PEOPLE: &str = "people";
pub const CATEGORY_PERIOD: &str = "period";
pub const CATEGORY_GENERAL: &str = "general";

/// Case-folded, trimmed tag name. This is the tag's identity.
pub fn normalize_tag_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// A tag attached to a document.
///
/// Equality and hashing use the normalized name only; the category is a
/// display grouping and two tags with the same name but different categories
/// are the same tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub category: String,
}

impl Tag {
    pub fn new(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
        }
    }

    pub fn normalized(&self) -> String {
        normalize_tag_name(&self.name)
    }
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        self.normalized() == other.normalized()
    }
}

impl Eq for Tag {}

impl Hash for Tag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized().hash(state);
    }
}

/// A named, inclusive date range. Documents inside it get a `period` tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Period {
    pub name: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl Period {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }

    pub fn tag(&self) -> Tag {
        Tag::new(self.name.clone(), CATEGORY_PERIOD)
    }
}

/// Output-addressable handle for a file that ends up in the build directory.
///
/// `uri` is relative to the build directory root, which is also where all
/// entry pages live, so it can be used verbatim in `href`/`src` attributes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resource {
    pub stable_id: String,
    pub uri: String,
}

/// A source file paired with the resource it is published as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    pub source: PathBuf,
    pub resource: Resource,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Great-circle distance in kilometres.
    pub fn haversine_km(&self, other: &LatLon) -> f64 {
        const EARTH_RADIUS_KM: f64 = 6371.0;
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let dlat = lat2 - lat1;
        let dlon = (other.lon - self.lon).to_radians();
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackPoint {
    pub position: LatLon,
    pub time: DateTime<Utc>,
}

/// One photo inside a gallery.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub path: PathBuf,
    pub resource: Resource,
    pub thumbnail: Option<Resource>,
    pub taken_at: Option<DateTime<Utc>>,
    pub location: Option<LatLon>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Gallery {
    pub ordinal: usize,
    pub element_id: String,
    pub directory: PathBuf,
    pub images: Vec<Image>,
}

/// A gallery image placed on a map.
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedImage {
    pub uri: String,
    pub thumb_uri: Option<String>,
    pub position: LatLon,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackMap {
    pub ordinal: usize,
    pub element_id: String,
    /// `None` for the coordinates-only map built from geotagged photos.
    pub track_path: Option<PathBuf>,
    pub points: Vec<TrackPoint>,
    pub located: Vec<LocatedImage>,
}

/// One journal entry.
#[derive(Debug, Clone)]
pub struct Document {
    /// Source file; unique within a store.
    pub path: PathBuf,
    pub title: String,
    pub date: NaiveDate,
    pub author: Option<String>,
    pub tags: Vec<Tag>,
    pub abstract_text: Option<String>,
    pub preview: Option<MediaRef>,
    pub galleries: Vec<Gallery>,
    pub maps: Vec<TrackMap>,
    /// Local files referenced from the markdown body.
    pub assets: Vec<MediaRef>,
    pub period: Option<String>,
    pub has_front_matter: bool,
    /// Rendered HTML fragment of the body, addin output included.
    pub body_html: String,
}

impl Document {
    /// A document with no tags, media or body yet.
    pub fn new(path: impl Into<PathBuf>, title: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            path: path.into(),
            title: title.into(),
            date,
            author: None,
            tags: Vec::new(),
            abstract_text: None,
            preview: None,
            galleries: Vec::new(),
            maps: Vec::new(),
            assets: Vec::new(),
            period: None,
            has_front_matter: false,
            body_html: String::new(),
        }
    }

    /// Directory containing the source file.
    pub fn directory(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    pub fn has_tag(&self, normalized_name: &str) -> bool {
        self.tags.iter().any(|t| t.normalized() == normalized_name)
    }

    pub fn images(&self) -> impl Iterator<Item = &Image> {
        self.galleries.iter().flat_map(|g| g.images.iter())
    }
}
