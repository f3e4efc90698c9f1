//! Markdown conversion with addin blocks.
//!
//! A document body is plain CommonMark plus `:: key` blocks (see [`blocks`]).
//! Two addins exist:
//!
//! | Key | Addin | Side effect on the document | Output |
//! |---|---|---|---|
//! | `gallery` | [`Addin::Gallery`] | appends a [`Gallery`](crate::types::Gallery) | thumbnail grid |
//! | `map`, `gpx` | [`Addin::Map`] | appends a [`TrackMap`](crate::types::TrackMap) | map container with JSON data |
//!
//! Conversion runs in a fixed order so that maps always see every gallery of
//! the document:
//!
//! 1. scan blocks and parse every payload (bad YAML fails here, before any
//!    side effect)
//! 2. build galleries in source order
//! 3. build maps in source order
//! 4. render markdown, swapping each block placeholder for its addin HTML
//!
//! Ordinals are counted per addin kind, so the second gallery is `gallery-01`
//! no matter how many maps precede it.
//!
//! Relative image references in the body (`![](sunset.jpg)`) are rewritten to
//! media resources and recorded as document assets for the renderer to copy.
//! Lone images and `<rb-video>` elements become figures (see [`figures`]).

pub mod blocks;
mod figures;
pub mod gallery;
pub mod map;

use crate::config::{GalleryConfig, TracksConfig};
use crate::imaging::{BackendError, ImageBackend};
use crate::naming::{Variant, media_resource};
use crate::track::TrackError;
use crate::types::{Document, MediaRef};
use blocks::Block;
use gallery::GalleryBlock;
use map::MapBlock;
use pulldown_cmark::{CowStr, Event, Options, Parser, Tag, html as md_html};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum MarkupError {
    #[error("Invalid {addin} block on body line {line}: {source}")]
    Yaml {
        addin: &'static str,
        line: usize,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("Invalid include pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
    #[error("Cannot read gallery directory {}: {source}", .path.display())]
    Gallery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Cannot load track {}: {source}", .path.display())]
    Track {
        path: PathBuf,
        #[source]
        source: TrackError,
    },
    #[error("Image metadata error: {0}")]
    Metadata(#[from] BackendError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The block handlers. Closed set; a new addin is a new variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Addin {
    Gallery,
    Map,
}

impl Addin {
    /// Look up a block key, case-insensitively.
    pub fn from_key(key: &str) -> Option<Self> {
        match key.to_lowercase().as_str() {
            "gallery" => Some(Addin::Gallery),
            "map" | "gpx" => Some(Addin::Map),
            _ => None,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Addin::Gallery => "gallery",
            Addin::Map => "map",
        }
    }
}

/// What addins need from outside the document.
pub struct MarkupContext<'a> {
    pub gallery: &'a GalleryConfig,
    pub tracks: &'a TracksConfig,
    pub backend: &'a dyn ImageBackend,
}

enum Parsed {
    Gallery(GalleryBlock),
    Map(MapBlock),
}

fn parse_payload<T: DeserializeOwned + Default>(block: &Block) -> Result<T, MarkupError> {
    match block.payload.as_deref() {
        Some(yaml) if !yaml.trim().is_empty() => {
            serde_yaml::from_str(yaml).map_err(|source| MarkupError::Yaml {
                addin: block.addin.key(),
                line: block.line,
                source,
            })
        }
        _ => Ok(T::default()),
    }
}

/// Convert `body` and attach its galleries, maps, assets and HTML to `doc`.
///
/// On error `doc` is left untouched.
pub fn convert(doc: &mut Document, body: &str, ctx: &MarkupContext<'_>) -> Result<(), MarkupError> {
    let doc_dir = doc.directory().to_path_buf();
    let scanned = blocks::scan(body);

    let parsed = scanned
        .blocks
        .iter()
        .map(|block| match block.addin {
            Addin::Gallery => parse_payload(block).map(Parsed::Gallery),
            Addin::Map => parse_payload(block).map(Parsed::Map),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut rendered = vec![String::new(); parsed.len()];

    let mut galleries = Vec::new();
    for (idx, item) in parsed.iter().enumerate() {
        if let Parsed::Gallery(block) = item {
            let gallery = gallery::build(block, &doc_dir, galleries.len(), ctx)?;
            rendered[idx] = gallery::render_html(&gallery);
            galleries.push(gallery);
        }
    }

    let mut maps = Vec::new();
    for (idx, item) in parsed.iter().enumerate() {
        if let Parsed::Map(block) = item {
            let track_map = map::build(block, &doc_dir, maps.len(), &galleries, ctx)?;
            rendered[idx] = map::render_html(&track_map)?;
            maps.push(track_map);
        }
    }

    if maps.is_empty()
        && let Some(single) = map::geotagged(&galleries)
        && let Some(first) = parsed.iter().position(|p| matches!(p, Parsed::Gallery(_)))
    {
        rendered[first] = format!("{}{}", map::render_html(&single)?, rendered[first]);
        maps.push(single);
    }

    let mut assets = Vec::new();
    let body_html = render_markdown(&scanned.markdown, &rendered, &doc_dir, &mut assets);

    doc.galleries = galleries;
    doc.maps = maps;
    doc.assets = assets;
    doc.body_html = body_html;
    Ok(())
}

fn render_markdown(
    markdown: &str,
    rendered: &[String],
    doc_dir: &Path,
    assets: &mut Vec<MediaRef>,
) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_FOOTNOTES);

    let events: Vec<Event<'_>> = Parser::new_ext(markdown, options)
        .map(|event| match event {
            Event::Html(raw) => match blocks::placeholder_index(&raw).and_then(|i| rendered.get(i)) {
                Some(addin_html) => Event::Html(CowStr::from(addin_html.clone())),
                None => Event::Html(raw),
            },
            Event::Start(Tag::Image {
                link_type,
                dest_url,
                title,
                id,
            }) => {
                let dest_url = match local_asset(doc_dir, &dest_url) {
                    Some(asset) => {
                        let uri = asset.resource.uri.clone();
                        if !assets.iter().any(|a| a.source == asset.source) {
                            assets.push(asset);
                        }
                        CowStr::from(uri)
                    }
                    None => dest_url,
                };
                Event::Start(Tag::Image {
                    link_type,
                    dest_url,
                    title,
                    id,
                })
            }
            other => other,
        })
        .collect();

    let mut html = String::new();
    md_html::push_html(&mut html, figures::implicit_figures(events).into_iter());
    figures::embed_videos(&html, doc_dir, assets)
}

/// Resolve a relative image or video reference to a file next to the document.
fn local_asset(doc_dir: &Path, url: &str) -> Option<MediaRef> {
    let is_external = url.is_empty()
        || url.contains("://")
        || url.starts_with('/')
        || url.starts_with('#')
        || url.starts_with("data:");
    if is_external {
        return None;
    }
    let source = doc_dir.join(url);
    if !source.is_file() {
        warn!(file = %source.display(), "referenced file does not exist");
        return None;
    }
    let resource = media_resource(&source, Variant::Original);
    Some(MediaRef { source, resource })
}
