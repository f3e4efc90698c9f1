//! Figures in the rendered body.
//!
//! Two rewrites run after block placeholders are resolved:
//!
//! - a paragraph holding nothing but an image becomes a `<figure>` whose
//!   caption is the image's alt text
//! - `<rb-video src="clip.mp4">Caption</rb-video>` becomes a `<figure>` with
//!   an HTML5 video player; a relative `src` is a document asset
//!
//! Videos are matched on the final HTML, so an element shown inside a code
//! span or fence (where `<` is escaped) is left alone.

use super::local_asset;
use crate::types::MediaRef;
use maud::{PreEscaped, html};
use pulldown_cmark::{CowStr, Event, Tag, TagEnd};
use regex::{Captures, Regex};
use std::path::Path;
use std::sync::LazyLock;
use tracing::warn;

/// Replace every lone-image paragraph with figure HTML.
pub fn implicit_figures(events: Vec<Event<'_>>) -> Vec<Event<'_>> {
    let mut out = Vec::with_capacity(events.len());
    let mut idx = 0;
    while idx < events.len() {
        match lone_image(&events[idx..]) {
            Some((figure, consumed)) => {
                out.push(Event::Html(CowStr::from(figure)));
                idx += consumed;
            }
            None => {
                out.push(events[idx].clone());
                idx += 1;
            }
        }
    }
    out
}

/// `Start(Paragraph) Start(Image) .. End(Image) End(Paragraph)` at the head
/// of `events`, as figure HTML plus the number of events it spans.
fn lone_image(events: &[Event<'_>]) -> Option<(String, usize)> {
    let [
        Event::Start(Tag::Paragraph),
        Event::Start(Tag::Image {
            dest_url, title, ..
        }),
        rest @ ..,
    ] = events
    else {
        return None;
    };
    let end = rest.iter().position(|e| matches!(e, Event::End(TagEnd::Image)))?;
    if !matches!(rest.get(end + 1), Some(Event::End(TagEnd::Paragraph))) {
        return None;
    }

    let alt: String = rest[..end]
        .iter()
        .filter_map(|e| match e {
            Event::Text(text) | Event::Code(text) => Some(&**text),
            _ => None,
        })
        .collect();
    let src: &str = dest_url;
    let title: &str = title;
    let title = (!title.is_empty()).then_some(title);

    let figure = html! {
        figure {
            img src=(src) alt=(alt) title=[title];
            @if !alt.is_empty() {
                figcaption { (alt) }
            }
        }
    };
    Some((figure.into_string(), end + 4))
}

// ASCII classes only: the regex crate is built without Unicode tables
static VIDEO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)(?:<p>[ \t\r\n]*)?<rb-video((?:[ \t\r\n][^>]*)?)>(.*?)</rb-video>(?:[ \t\r\n]*</p>)?")
        .unwrap()
});
static SRC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:^|[ \t\r\n])src[ \t\r\n]*=[ \t\r\n]*(?:"([^"]*)"|'([^']*)')"#).unwrap()
});

/// Swap `<rb-video>` elements for video figures, collecting local files as
/// assets. An element without a `src` is kept as written.
pub fn embed_videos(html: &str, doc_dir: &Path, assets: &mut Vec<MediaRef>) -> String {
    VIDEO
        .replace_all(html, |caps: &Captures<'_>| {
            let src = SRC
                .captures(&caps[1])
                .and_then(|c| c.get(1).or_else(|| c.get(2)))
                .map(|m| m.as_str().trim())
                .unwrap_or_default();
            if src.is_empty() {
                warn!(element = %&caps[0], "video element has no src attribute");
                return caps[0].to_string();
            }

            let uri = match local_asset(doc_dir, src) {
                Some(asset) => {
                    let uri = asset.resource.uri.clone();
                    if !assets.iter().any(|a| a.source == asset.source) {
                        assets.push(asset);
                    }
                    uri
                }
                None => src.to_string(),
            };
            // The caption is body HTML the markdown renderer already produced
            let caption = caps[2].trim();

            html! {
                figure class="video" {
                    video controls {
                        source src=(uri) type="video/mp4";
                    }
                    @if !caption.is_empty() {
                        figcaption { (PreEscaped(caption)) }
                    }
                }
            }
            .into_string()
        })
        .into_owned()
}
