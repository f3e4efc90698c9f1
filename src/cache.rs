//! Build cache for incremental builds.
//!
//! Every entry page links to its chronological neighbours, so a page can go
//! stale without its own source changing: a new entry appears next to it, or
//! its neighbour is deleted. The cache remembers the previous build's document
//! order so [`crate::dirty`] can spot exactly those pages.
//!
//! # Design
//!
//! The cache is **positional**: `documents` is the previous build's
//! date-descending order, and an entry's index in that list is its position.
//! There is no explicit index field. Comparing neighbours between two builds
//! is then a matter of looking one slot up and one slot down in each list.
//!
//! Only output identity is compared, never content. Content staleness is the
//! job of the modification-time check in [`crate::dirty`].
//!
//! ## Storage
//!
//! The cache is a JSON file at `<output_dir>/cache.json`:
//!
//! ```json
//! {
//!   "version": 1,
//!   "documents": [
//!     {
//!       "title": "A walk in the park",
//!       "tags": [{ "name": "Berlin", "category": "location" }],
//!       "date": "2023-05-01",
//!       "path": "journal/2023/park/entry.md",
//!       "outputPath": "2023-05-01-a_walk_in_the_park.html"
//!     }
//!   ]
//! }
//! ```
//!
//! It lives in the output directory so it travels with the published site.
//! A missing or unreadable cache is not an error: the build treats every
//! document as new. Saving writes a temporary file first and renames it over
//! the old cache, so a crash mid-write leaves the previous cache intact.

use crate::naming;
use crate::types::{Document, Tag};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Name of the cache file within the output directory.
const CACHE_FILENAME: &str = "cache.json";

/// Version of the cache format. Bump this to invalidate all existing caches
/// when the format changes.
const CACHE_VERSION: u32 = 1;

/// Snapshot of one rendered document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub title: String,
    pub tags: Vec<Tag>,
    pub date: NaiveDate,
    pub path: PathBuf,
    /// Entry file name relative to the output directory.
    pub output_path: String,
}

impl CacheEntry {
    pub fn from_document(doc: &Document) -> Self {
        Self {
            title: doc.title.clone(),
            tags: doc.tags.clone(),
            date: doc.date,
            path: doc.path.clone(),
            output_path: naming::entry_file(doc),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildCache {
    pub version: u32,
    pub documents: Vec<CacheEntry>,
}

impl Default for BuildCache {
    fn default() -> Self {
        Self::empty()
    }
}

impl BuildCache {
    /// Create an empty cache (first build, or a cache that could not be read).
    pub fn empty() -> Self {
        Self {
            version: CACHE_VERSION,
            documents: Vec::new(),
        }
    }

    /// Snapshot of `documents` in their current order.
    pub fn from_documents(documents: &[Document]) -> Self {
        Self {
            version: CACHE_VERSION,
            documents: documents.iter().map(CacheEntry::from_document).collect(),
        }
    }

    /// Load from the output directory. Returns an empty cache if the file
    /// doesn't exist or can't be parsed (version mismatch, corruption).
    pub fn load(output_dir: &Path) -> Self {
        let path = cache_path(output_dir);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no build cache; first build");
                return Self::empty();
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not read build cache");
                return Self::empty();
            }
        };
        let cache: Self = match serde_json::from_str(&content) {
            Ok(c) => c,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not parse build cache");
                return Self::empty();
            }
        };
        if cache.version != CACHE_VERSION {
            warn!(
                path = %path.display(),
                found = cache.version,
                expected = CACHE_VERSION,
                "build cache version mismatch"
            );
            return Self::empty();
        }
        debug!(entries = cache.documents.len(), "loaded build cache");
        cache
    }

    /// Save to the output directory, replacing any previous cache.
    pub fn save(&self, output_dir: &Path) -> io::Result<()> {
        let path = cache_path(output_dir);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &path)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Position of a source path in the cached order.
    pub fn position(&self, path: &Path) -> Option<usize> {
        self.documents.iter().position(|e| e.path == path)
    }
}

/// Resolve the cache file path for an output directory.
pub fn cache_path(output_dir: &Path) -> PathBuf {
    output_dir.join(CACHE_FILENAME)
}
