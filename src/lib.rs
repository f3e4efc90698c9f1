//! # Simple Journal
//!
//! An incremental static site generator for dated markdown journals. Every
//! markdown file under the journal root is one entry; the site is one page per
//! entry plus year indexes, tag pages, a tags overview and a month calendar.
//!
//! # Architecture: Plan, Render, Finish
//!
//! ```text
//! 1. Plan     journal/  →  Store + DirtySet     (load, sort, diff against cache.json)
//! 2. Render   DirtySet  →  dist/*.html, media/  (parallel, one page per entry)
//! 3. Finish   Store     →  indexes, tags, calendar, cache.json
//! ```
//!
//! Only planning sees the whole journal as mutable state. From rendering on
//! the document collection is read-only and shared by every worker.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`store`] | Walks the journal, parses front matter, applies periods, answers queries |
//! | [`frontmatter`] | Splits and parses the YAML block at the top of an entry |
//! | [`markup`] | `:: gallery` and `:: map` blocks, then markdown to HTML |
//! | [`track`] | GPX and NMEA track loading, photo to track point correlation |
//! | [`cache`] | `cache.json`: the previous build's document order |
//! | [`dirty`] | Staleness and neighbour propagation into one dirty set |
//! | [`render`] | Worker pool that writes entry pages and image variants |
//! | [`generate`] | Maud templates for every page, derived page writer |
//! | [`calendar`] | Month grouping and calendar grids |
//! | [`pipeline`] | Plan, render and finish wired together |
//! | [`config`] | `config.toml` loading, merging over stock defaults, validation |
//! | [`naming`] | Output file names and media resource ids |
//! | [`imaging`] | EXIF reading and JPEG scaling behind [`imaging::ImageBackend`] |
//! | [`metadata`] | Raw EXIF values to capture time and position |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Neighbour-Aware Incremental Builds
//!
//! Each entry page links to the next newer and next older entry. Adding one
//! entry therefore changes two pages that were not edited. [`dirty`] compares
//! the new order with the cached one position by position and marks exactly
//! those pages, on top of the usual modification-time check.
//!
//! ## Maud Over Template Engines
//!
//! HTML is generated with [Maud](https://maud.lambda.xyz/). Templates are Rust
//! code, interpolation is escaped, and there is no template directory to ship.
//!
//! ## Pure-Rust Imaging
//!
//! Scaling uses the `image` crate and EXIF is read by a small built-in parser,
//! so the binary has no system dependencies.

pub mod cache;
pub mod calendar;
pub mod config;
pub mod dirty;
pub mod frontmatter;
pub mod generate;
pub mod imaging;
pub mod markup;
pub mod metadata;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod render;
pub mod store;
pub mod track;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
