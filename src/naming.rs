//! Output path convention for the build directory.
//!
//! Every file the build writes gets its name from here, and every name is a
//! pure function of the thing it represents. That is what lets render workers
//! write in parallel without coordinating: two documents can only collide if
//! they share a date and normalized title, which the store rejects at load time.
//!
//! ```text
//! dist/
//! ├── index.html                      # latest year
//! ├── index_2022.html                 # older years
//! ├── 2023-05-01-a_walk_in_the_park.html
//! ├── tag-berlin.html
//! ├── tags.html
//! ├── cal-2023-05.html
//! ├── style.css
//! ├── cache.json
//! └── media/
//!     ├── 3f2a9c0d1e4b5a67.jpg        # display variant
//!     └── 3f2a9c0d1e4b5a67-thumb.jpg  # thumbnail variant
//! ```

use crate::types::{Document, Resource, Tag};
use chrono::NaiveDate;
use sha2::{Digest, Sha256};
use std::path::Path;

pub const TAGS_INDEX_FILE: &str = "tags.html";
pub const STYLESHEET_FILE: &str = "style.css";
pub const MEDIA_DIR: &str = "media";

/// Lowercase, trim, and replace everything outside `[a-z0-9]` with `_`.
pub fn normalize_file_name(s: &str) -> String {
    s.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_lowercase() || c.is_ascii_digit() { c } else { '_' })
        .collect()
}

pub fn entry_file_for(date: NaiveDate, title: &str) -> String {
    format!("{}-{}.html", date.format("%Y-%m-%d"), normalize_file_name(title))
}

/// `YYYY-MM-DD-<normalized title>.html`
pub fn entry_file(doc: &Document) -> String {
    entry_file_for(doc.date, &doc.title)
}

pub fn calendar_file(year: i32, month: u32) -> String {
    format!("cal-{year:04}-{month:02}.html")
}

pub fn tag_file(tag: &Tag) -> String {
    format!("tag-{}.html", normalize_file_name(&tag.normalized()))
}

/// The latest year is the site's landing page; older years get their own file.
pub fn index_file(year: i32, latest_year: i32) -> String {
    if year == latest_year {
        "index.html".to_string()
    } else {
        format!("index_{year}.html")
    }
}

/// First 16 hex digits of SHA-256 over the source path.
pub fn stable_id(source: &Path) -> String {
    let digest = Sha256::digest(source.to_string_lossy().as_bytes());
    format!("{:x}", digest)[..16].to_string()
}

/// Which published form of a source file a resource refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// Scaled down to the display width, re-encoded as JPEG.
    Display,
    /// Scaled down to the thumbnail width, re-encoded as JPEG.
    Thumbnail,
    /// Copied byte-for-byte, keeping its (lowercased) extension.
    Original,
}

pub fn media_resource(source: &Path, variant: Variant) -> Resource {
    let id = stable_id(source);
    let uri = match variant {
        Variant::Display => format!("{MEDIA_DIR}/{id}.jpg"),
        Variant::Thumbnail => format!("{MEDIA_DIR}/{id}-thumb.jpg"),
        Variant::Original => {
            let ext = source
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_lowercase())
                .unwrap_or_else(|| "bin".to_string());
            format!("{MEDIA_DIR}/{id}-full.{ext}")
        }
    };
    Resource { stable_id: id, uri }
}
