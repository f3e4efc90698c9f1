//! CLI output formatting for all build stages.
//!
//! Output is information-first: every entry leads with its positional index,
//! date and title, with the source path shown as indented `Source:` context.
//!
//! ## Load
//!
//! ```text
//! Entries
//! 001 2023-06-02 Lake Day (1 gallery, 1 map)
//!     Source: 2023/lake/entry.md
//!     Period: Summer
//! 002 2023-05-01 Park
//!     Source: 2023/park/entry.md
//!
//! Tags
//!     location: Berlin, Lisbon
//!     people: Anna
//!
//! Periods
//!     Summer: 2023-06-01 .. 2023-08-31
//! ```
//!
//! ## Dirty set
//!
//! ```text
//! 2 of 5 entries to render
//!     new: 1
//!     neighbour: 1
//! ```
//!
//! ## Render
//!
//! ```text
//! Lake Day → 2023-06-02-lake_day.html
//!     Images: 4 scaled, 2 fresh, 0 copied
//! FAILED Park
//!     Source: /journal/2023/park/entry.md
//!     Error: image ...: decode failed
//! ```
//!
//! Each stage has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout.

use crate::dirty::DirtySet;
use crate::pipeline::BuildReport;
use crate::render::{RenderEvent, VariantCounts};
use crate::store::Store;
use crate::types::Document;
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Truncate text to `max` characters, appending `...` if truncated.
fn truncate_desc(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let head: String = text.chars().take(max).collect();
        format!("{}...", head)
    }
}

/// `1 map`, `2 maps`
fn count(n: usize, singular: &str, plural: &str) -> String {
    format!("{} {}", n, if n == 1 { singular } else { plural })
}

/// Path relative to `root` when it lives below it.
fn relative(path: &Path, root: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).display().to_string()
}

/// `001 2023-05-01 Park (1 gallery, 1 map)`
fn entry_header(index: usize, doc: &Document) -> String {
    let mut parts = Vec::new();
    if !doc.galleries.is_empty() {
        parts.push(count(doc.galleries.len(), "gallery", "galleries"));
    }
    if !doc.maps.is_empty() {
        parts.push(count(doc.maps.len(), "map", "maps"));
    }
    let header = format!("{} {} {}", format_index(index), doc.date.format("%Y-%m-%d"), doc.title);
    if parts.is_empty() {
        header
    } else {
        format!("{} ({})", header, parts.join(", "))
    }
}

// ============================================================================
// Load
// ============================================================================

/// Inventory of a loaded journal: entries, tag catalogue and periods.
pub fn format_load_output(store: &Store) -> Vec<String> {
    let root = store.root();
    let mut lines = vec!["Entries".to_string()];
    for (i, doc) in store.documents().iter().enumerate() {
        lines.push(entry_header(i + 1, doc));
        lines.push(format!("{}Source: {}", indent(1), relative(&doc.path, root)));
        if let Some(text) = &doc.abstract_text {
            lines.push(format!("{}Abstract: {}", indent(1), truncate_desc(text, 60)));
        }
        if let Some(period) = &doc.period {
            lines.push(format!("{}Period: {}", indent(1), period));
        }
    }

    let by_category = store.tags_by_category();
    if !by_category.is_empty() {
        lines.push(String::new());
        lines.push("Tags".to_string());
        for (category, tags) in &by_category {
            let names: Vec<&str> = tags.iter().map(|t| t.name.as_str()).collect();
            lines.push(format!("{}{}: {}", indent(1), category, names.join(", ")));
        }
    }

    if !store.periods().is_empty() {
        lines.push(String::new());
        lines.push("Periods".to_string());
        for period in store.periods() {
            lines.push(format!(
                "{}{}: {} .. {}",
                indent(1),
                period.name,
                period.from.format("%Y-%m-%d"),
                period.to.format("%Y-%m-%d")
            ));
        }
    }
    lines
}

pub fn print_load_output(store: &Store) {
    for line in format_load_output(store) {
        println!("{}", line);
    }
}

// ============================================================================
// Dirty set
// ============================================================================

pub fn format_dirty_output(dirty: &DirtySet, total: usize) -> Vec<String> {
    if dirty.is_empty() {
        return vec!["Nothing to do".to_string()];
    }
    let mut lines = vec![format!("{} of {} entries to render", dirty.len(), total)];
    for (reason, n) in dirty.reason_counts() {
        lines.push(format!("{}{}: {}", indent(1), reason, n));
    }
    lines
}

pub fn print_dirty_output(dirty: &DirtySet, total: usize) {
    for line in format_dirty_output(dirty, total) {
        println!("{}", line);
    }
}

// ============================================================================
// Render
// ============================================================================

fn variant_line(variants: &VariantCounts) -> Option<String> {
    if *variants == VariantCounts::default() {
        return None;
    }
    Some(format!(
        "{}Images: {} scaled, {} fresh, {} copied",
        indent(1),
        variants.written,
        variants.fresh,
        variants.copied
    ))
}

/// Format a single render progress event as display lines.
pub fn format_render_event(event: &RenderEvent) -> Vec<String> {
    match event {
        RenderEvent::Rendered {
            title,
            output,
            variants,
        } => {
            let mut lines = vec![format!("{} \u{2192} {}", title, output)];
            lines.extend(variant_line(variants));
            lines
        }
        RenderEvent::Failed { title, path, error } => vec![
            format!("FAILED {}", title),
            format!("{}Source: {}", indent(1), path.display()),
            format!("{}Error: {}", indent(1), error),
        ],
    }
}

// ============================================================================
// Build report
// ============================================================================

pub fn format_build_report(report: &BuildReport) -> Vec<String> {
    let Some(summary) = &report.summary else {
        return vec![format!("Nothing to do ({} entries up to date)", report.documents)];
    };
    let mut lines = vec![format!(
        "Rendered {}, failed {}, {} unchanged",
        count(summary.rendered.len(), "entry", "entries"),
        summary.failed.len(),
        report.documents.saturating_sub(report.dirty.len())
    )];
    for failure in &summary.failed {
        lines.push(format!("{}{}: {}", indent(1), failure.title, failure.error));
    }
    lines.push(format!("Wrote {}", count(report.pages.len(), "derived page", "derived pages")));
    if !report.cache_written {
        lines.push("Cache: not written".to_string());
    }
    lines
}

pub fn print_build_report(report: &BuildReport) {
    for line in format_build_report(report) {
        println!("{}", line);
    }
}
