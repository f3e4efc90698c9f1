//! Front matter: the YAML header of a journal entry.
//!
//! ```text
//! ---
//! title: A walk in the park
//! date: 2023-05-01
//! author: Jo
//! abstract: Sun, ducks, and far too many photos.
//! preview: photos/ducks.jpg
//! tags:
//!   location: [Berlin, Tiergarten]
//!   people: [Sam]
//! ---
//! The body starts here.
//! ```
//!
//! Front matter is optional. When the first non-blank text of a file is not
//! `---`, the whole file is body and the date has to come from the path
//! (`2023-05-01-park.md` or `2023-05-01-park/entry.md`).

use crate::types::Tag;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

const MARKER: &str = "---";

#[derive(Error, Debug)]
pub enum FrontMatterError {
    #[error("front matter has no closing '---' line")]
    Unterminated,
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FrontMatter {
    pub title: Option<String>,
    pub date: Option<String>,
    pub author: Option<String>,
    pub preview: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    /// Category name to tag names.
    pub tags: BTreeMap<String, Vec<String>>,
}

impl FrontMatter {
    /// Tags in category order, then in the order written.
    pub fn tags(&self) -> Vec<Tag> {
        self.tags
            .iter()
            .flat_map(|(category, names)| names.iter().map(move |name| Tag::new(name.clone(), category.clone())))
            .collect()
    }

    pub fn parsed_date(&self) -> Result<Option<NaiveDate>, FrontMatterError> {
        self.date.as_deref().map(parse_date).transpose()
    }
}

/// Raw front matter and body of a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Split<'a> {
    pub front_matter: Option<&'a str>,
    pub body: &'a str,
}

pub fn split(source: &str) -> Result<Split<'_>, FrontMatterError> {
    let start = source.trim_start();
    if !start.starts_with(MARKER) {
        return Ok(Split {
            front_matter: None,
            body: source,
        });
    }

    // Content begins on the line after the opening marker.
    let after_open = match start.find('\n') {
        Some(nl) => &start[nl + 1..],
        None => return Err(FrontMatterError::Unterminated),
    };

    let mut offset = 0;
    for line in after_open.split_inclusive('\n') {
        if line.trim() == MARKER {
            return Ok(Split {
                front_matter: Some(&after_open[..offset]),
                body: &after_open[offset + line.len()..],
            });
        }
        offset += line.len();
    }
    Err(FrontMatterError::Unterminated)
}

pub fn parse(yaml: &str) -> Result<FrontMatter, FrontMatterError> {
    if yaml.trim().is_empty() {
        return Ok(FrontMatter::default());
    }
    Ok(serde_yaml::from_str(yaml)?)
}

/// `YYYY-MM-DD`, or the date part of a date-time.
///
/// An RFC 3339 time keeps its own offset; the calendar day is the one the
/// author wrote, not the UTC day.
pub fn parse_date(value: &str) -> Result<NaiveDate, FrontMatterError> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.date_naive());
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|dt| dt.date())
        .ok_or_else(|| FrontMatterError::InvalidDate(value.to_string()))
}

/// Date from a `YYYY-MM-DD` prefix of the file stem or, failing that, of the
/// parent directory name.
pub fn date_from_path(path: &Path) -> Option<NaiveDate> {
    let stem = path.file_stem().map(|s| s.to_string_lossy());
    let parent = path
        .parent()
        .and_then(|p| p.file_name())
        .map(|s| s.to_string_lossy());
    [stem, parent].into_iter().flatten().find_map(|name| {
        name.get(..10)
            .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
    })
}

/// Title for a document without one: the file stem minus any date prefix,
/// else the parent directory name minus any date prefix, else the stem.
pub fn title_from_path(path: &Path) -> String {
    fn strip_date(name: &str) -> &str {
        let rest = match name.get(..10) {
            Some(prefix) if NaiveDate::parse_from_str(prefix, "%Y-%m-%d").is_ok() => &name[10..],
            _ => name,
        };
        rest.trim_matches(|c: char| c == '-' || c == '_' || c.is_whitespace())
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let parent = path
        .parent()
        .and_then(|p| p.file_name())
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let found = [stem.as_str(), parent.as_str()]
        .into_iter()
        .map(strip_date)
        .find(|t| !t.is_empty())
        .map(str::to_string);
    found.unwrap_or(stem)
}
