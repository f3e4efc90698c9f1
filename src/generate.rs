//! HTML site generation.
//!
//! Entry pages are rendered one per document by the render workers; every
//! other page is derived from the whole store and rewritten in one pass after
//! the workers finish.
//!
//! ## Generated Pages
//!
//! - **Entry pages** (`YYYY-MM-DD-title.html`): one document with links to its
//!   newer and older neighbours
//! - **Year indexes** (`index.html`, `index_YYYY.html`): documents grouped by
//!   month, one page per year, latest year as the landing page
//! - **Tag pages** (`tag-<name>.html`): documents carrying a tag, by month
//! - **Tags overview** (`tags.html`): places, people, other tags and periods
//! - **Calendar pages** (`cal-YYYY-MM.html`): month grids between the oldest
//!   and newest document
//!
//! ## CSS
//!
//! `static/style.css` is embedded at compile time and written next to the
//! pages as `style.css`.
//!
//! ## HTML Generation
//!
//! Uses [maud](https://maud.lambda.xyz/) for compile-time HTML templating.
//! Templates are type-safe Rust code with automatic XSS escaping. Document
//! bodies are already HTML and are inserted with `PreEscaped`.

use crate::calendar::{self, CalendarMonth, MonthGroup};
use crate::naming;
use crate::store::Store;
use crate::types::{CATEGORY_GENERAL, CATEGORY_LOCATION, CATEGORY_PEOPLE, Document, Period, Tag};
use chrono::{Datelike, NaiveDate};
use maud::{DOCTYPE, Markup, PreEscaped, html};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("IO error writing {file}: {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },
}

const CSS_STATIC: &str = include_str!("../static/style.css");

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Write one page into the output directory.
pub fn write_page(output_dir: &Path, file: &str, content: &str) -> Result<(), GenerateError> {
    fs::write(output_dir.join(file), content).map_err(|source| GenerateError::Io {
        file: file.to_string(),
        source,
    })
}

/// Write every page derived from the whole store, plus the stylesheet.
///
/// The store must be sorted newest first. Returns the written file names.
pub fn write_derived_pages(
    store: &Store,
    output_dir: &Path,
    site_title: &str,
) -> Result<Vec<String>, GenerateError> {
    let mut written = Vec::new();
    let mut write = |file: String, markup: Markup| -> Result<(), GenerateError> {
        write_page(output_dir, &file, &markup.into_string())?;
        debug!(file = %file, "wrote page");
        written.push(file);
        Ok(())
    };

    let all: Vec<&Document> = store.documents().iter().collect();
    let years = years_newest_first(&all);
    let latest_year = years.first().copied().unwrap_or_default();
    for &year in &years {
        let in_year: Vec<&Document> = all.iter().copied().filter(|d| d.date.year() == year).collect();
        write(
            naming::index_file(year, latest_year),
            render_index(site_title, &calendar::month_groups(&in_year), &years, year, latest_year),
        )?;
    }

    for tag in store.tags() {
        let documents = store.documents_by_tag(&tag.name);
        write(
            naming::tag_file(tag),
            render_tag_page(site_title, tag, &calendar::month_groups(&documents)),
        )?;
    }

    write(
        naming::TAGS_INDEX_FILE.to_string(),
        render_tags_overview(site_title, &store.tags_by_category(), store.periods()),
    )?;

    if let (Some(newest), Some(oldest)) = (all.first(), all.last()) {
        for month in calendar::months_between(oldest.date, newest.date) {
            let page = calendar::calendar_month(store, month, oldest.date, newest.date);
            write(
                naming::calendar_file(month.year(), month.month()),
                render_calendar(site_title, &page),
            )?;
        }
    }

    write_page(output_dir, naming::STYLESHEET_FILE, CSS_STATIC)?;
    written.push(naming::STYLESHEET_FILE.to_string());
    Ok(written)
}

fn years_newest_first(documents: &[&Document]) -> Vec<i32> {
    let mut years: Vec<i32> = documents.iter().map(|d| d.date.year()).collect();
    years.sort_unstable_by(|a, b| b.cmp(a));
    years.dedup();
    years
}

// ============================================================================
// HTML Components
// ============================================================================

/// Renders the base HTML document structure
fn base_document(title: &str, body_class: &str, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) }
                link rel="stylesheet" href=(naming::STYLESHEET_FILE);
            }
            body class=(body_class) {
                (content)
            }
        }
    }
}

fn site_header(site_title: &str) -> Markup {
    html! {
        header.site-header {
            a.site-title href="index.html" { (site_title) }
            nav.site-nav {
                a href="index.html" { "Journal" }
                a href=(naming::TAGS_INDEX_FILE) { "Tags" }
            }
        }
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format("%A, %-d %B %Y").to_string()
}

fn tag_links(tags: &[Tag]) -> Markup {
    html! {
        ul.tags {
            @for tag in tags {
                li class={ "tag tag-" (tag.category) } {
                    a href=(naming::tag_file(tag)) { (tag.name) }
                }
            }
        }
    }
}

/// Preview thumbnail, title, date and abstract of one document.
fn document_card(doc: &Document) -> Markup {
    html! {
        article.entry-card {
            @if let Some(preview) = &doc.preview {
                a href=(naming::entry_file(doc)) {
                    img.preview src=(preview.resource.uri) alt=(doc.title) loading="lazy";
                }
            }
            h3 { a href=(naming::entry_file(doc)) { (doc.title) } }
            time datetime=(doc.date.format("%Y-%m-%d").to_string()) { (format_date(doc.date)) }
            @if let Some(text) = &doc.abstract_text {
                p.abstract { (text) }
            }
        }
    }
}

fn month_sections(groups: &[MonthGroup<'_>]) -> Markup {
    html! {
        @for group in groups {
            section.month {
                h2 {
                    a href=(naming::calendar_file(group.month.year(), group.month.month())) {
                        (group.month.format("%B %Y").to_string())
                    }
                }
                @for doc in &group.documents {
                    (document_card(doc))
                }
            }
        }
    }
}

// ============================================================================
// Page Renderers
// ============================================================================

/// One journal entry with links to its neighbours.
///
/// `newer` is the next document forward in time, `older` the one before.
pub fn render_entry(
    site_title: &str,
    doc: &Document,
    newer: Option<&Document>,
    older: Option<&Document>,
) -> Markup {
    let content = html! {
        (site_header(site_title))
        main.entry {
            header.entry-header {
                h1 { (doc.title) }
                a.entry-date href=(naming::calendar_file(doc.date.year(), doc.date.month())) {
                    time datetime=(doc.date.format("%Y-%m-%d").to_string()) { (format_date(doc.date)) }
                }
                @if let Some(author) = &doc.author {
                    p.author { (author) }
                }
                @if !doc.tags.is_empty() {
                    (tag_links(&doc.tags))
                }
                @if let Some(text) = &doc.abstract_text {
                    p.abstract { (text) }
                }
            }
            div.entry-body { (PreEscaped(&doc.body_html)) }
        }
        nav.entry-nav {
            @if let Some(older) = older {
                a.older rel="prev" href=(naming::entry_file(older)) { "← " (older.title) }
            }
            @if let Some(newer) = newer {
                a.newer rel="next" href=(naming::entry_file(newer)) { (newer.title) " →" }
            }
        }
    };
    base_document(&doc.title, "entry-page", content)
}

fn render_index(
    site_title: &str,
    groups: &[MonthGroup<'_>],
    years: &[i32],
    year: i32,
    latest_year: i32,
) -> Markup {
    let content = html! {
        (site_header(site_title))
        nav.years {
            @for &y in years {
                @if y == year {
                    span.current { (y) }
                } @else {
                    a href=(naming::index_file(y, latest_year)) { (y) }
                }
            }
        }
        main.index-page {
            (month_sections(groups))
        }
    };
    base_document(&format!("{site_title} · {year}"), "index-page", content)
}

fn render_tag_page(site_title: &str, tag: &Tag, groups: &[MonthGroup<'_>]) -> Markup {
    let content = html! {
        (site_header(site_title))
        main.tag-page {
            h1 { (tag.name) }
            (month_sections(groups))
        }
    };
    base_document(&format!("{site_title} · {}", tag.name), "tag-page", content)
}

fn render_tags_overview(
    site_title: &str,
    by_category: &BTreeMap<String, Vec<Tag>>,
    periods: &[Period],
) -> Markup {
    let sections: Vec<(&str, Vec<Tag>)> = [
        ("Places", CATEGORY_LOCATION),
        ("People", CATEGORY_PEOPLE),
        ("Other", CATEGORY_GENERAL),
    ]
    .into_iter()
    .filter_map(|(label, category)| {
        let mut tags = by_category.get(category)?.clone();
        tags.sort_by_key(|t| t.normalized());
        Some((label, tags))
    })
    .collect();
    let mut periods: Vec<&Period> = periods.iter().collect();
    periods.sort_by(|a, b| b.from.cmp(&a.from));

    let content = html! {
        (site_header(site_title))
        main.tags-page {
            @for (label, tags) in &sections {
                section.tag-category {
                    h2 { (label) }
                    (tag_links(tags))
                }
            }
            @if !periods.is_empty() {
                section.periods {
                    h2 { "Periods" }
                    ul {
                        @for period in &periods {
                            li {
                                a href=(naming::tag_file(&period.tag())) { (period.name) }
                                " "
                                span.range {
                                    (period.from.format("%Y-%m-%d").to_string()) " – " (period.to.format("%Y-%m-%d").to_string())
                                }
                            }
                        }
                    }
                }
            }
        }
    };
    base_document(&format!("{site_title} · Tags"), "tags-page", content)
}

fn month_link(month: Option<NaiveDate>, label: &str, class: &str) -> Markup {
    html! {
        @match month {
            Some(m) => {
                a class=(class) href=(naming::calendar_file(m.year(), m.month())) { (label) }
            }
            None => {
                span class={ (class) " disabled" } { (label) }
            }
        }
    }
}

fn render_calendar(site_title: &str, page: &CalendarMonth<'_>) -> Markup {
    let content = html! {
        (site_header(site_title))
        main.calendar-page {
            nav.calendar-nav {
                (month_link(page.prev_year, "«", "prev-year"))
                (month_link(page.prev_month, "‹", "prev-month"))
                h1 { (page.month.format("%B %Y").to_string()) }
                (month_link(page.next_month, "›", "next-month"))
                (month_link(page.next_year, "»", "next-year"))
            }
            table.calendar {
                thead {
                    tr {
                        @for day in WEEKDAYS {
                            th { (day) }
                        }
                    }
                }
                tbody {
                    @for week in &page.weeks {
                        tr {
                            @for day in week {
                                @let period = day.period.map(|p| p.name.as_str());
                                td.day.other-month[!day.in_month] title=[period] {
                                    span.day-number { (day.date.day()) }
                                    @if let Some(doc) = day.document {
                                        a href=(naming::entry_file(doc)) {
                                            @if let Some(preview) = &doc.preview {
                                                img src=(preview.resource.uri) alt=(doc.title) loading="lazy";
                                            } @else {
                                                (doc.title)
                                            }
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    };
    base_document(
        &format!("{site_title} · {}", page.month.format("%B %Y")),
        "calendar-page",
        content,
    )
}
