//! The `:: gallery` addin.
//!
//! Lists the images in a directory next to the document, reads their capture
//! metadata, and orders them by capture time. Images without a timestamp go
//! last, ordered by path.

use super::{MarkupContext, MarkupError};
use crate::naming::{Variant, media_resource};
use crate::types::{Gallery, Image};
use glob::Pattern;
use maud::html;
use serde::Deserialize;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use tracing::warn;

/// YAML payload of a gallery block.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GalleryBlock {
    #[serde(alias = "directory")]
    pub path: Option<String>,
    pub include: Option<String>,
}

pub fn element_id(ordinal: usize) -> String {
    format!("gallery-{ordinal:02}")
}

/// Resolve the block against the document directory and collect its images.
pub fn build(
    block: &GalleryBlock,
    doc_dir: &Path,
    ordinal: usize,
    ctx: &MarkupContext<'_>,
) -> Result<Gallery, MarkupError> {
    let directory = doc_dir.join(block.path.as_deref().unwrap_or(&ctx.gallery.directory));
    let include = block.include.as_deref().unwrap_or(&ctx.gallery.include);
    let matcher = Pattern::new(include).map_err(|source| MarkupError::Pattern {
        pattern: include.to_string(),
        source,
    })?;

    let mut images = Vec::new();
    for path in list_matching(&directory, &matcher)? {
        let meta = ctx.backend.read_metadata(&path)?;
        images.push(Image {
            resource: media_resource(&path, Variant::Display),
            thumbnail: Some(media_resource(&path, Variant::Thumbnail)),
            taken_at: meta.taken_at,
            location: meta.location,
            path,
        });
    }
    images.sort_by(compare_images);

    Ok(Gallery {
        ordinal,
        element_id: element_id(ordinal),
        directory,
        images,
    })
}

/// Regular files in `directory` whose name matches. A missing directory is
/// an empty gallery, not an error.
fn list_matching(directory: &Path, matcher: &Pattern) -> Result<Vec<PathBuf>, MarkupError> {
    let entries = match std::fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(directory = %directory.display(), "gallery directory does not exist");
            return Ok(Vec::new());
        }
        Err(source) => {
            return Err(MarkupError::Gallery {
                path: directory.to_path_buf(),
                source,
            });
        }
    };

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| MarkupError::Gallery {
            path: directory.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        let name = entry.file_name();
        // fs::metadata follows symlinks, so linked photos count as files
        if matcher.matches(&name.to_string_lossy())
            && std::fs::metadata(&path).is_ok_and(|m| m.is_file())
        {
            paths.push(path);
        }
    }
    Ok(paths)
}

/// Dated images first by time, then undated; path breaks every tie.
pub fn compare_images(a: &Image, b: &Image) -> Ordering {
    match (a.taken_at, b.taken_at) {
        (Some(ta), Some(tb)) => ta.cmp(&tb).then_with(|| a.path.cmp(&b.path)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.path.cmp(&b.path),
    }
}

pub fn render_html(gallery: &Gallery) -> String {
    html! {
        div class="gallery" id=(gallery.element_id) {
            @for image in &gallery.images {
                @let thumb = image.thumbnail.as_ref().unwrap_or(&image.resource);
                @let title = image.taken_at.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string());
                div class="gallery-entry" {
                    a href=(image.resource.uri) {
                        img class="gallery-item" src=(thumb.uri) title=[title];
                    }
                }
            }
        }
    }
    .into_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GalleryConfig, TracksConfig};
    use crate::imaging::ImageMetadata;
    use crate::imaging::backend::tests::MockBackend;
    use chrono::{DateTime, Utc};
    use std::fs;
    use tempfile::TempDir;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn dated<'a>(name: &'a str, s: &str) -> (&'a str, ImageMetadata) {
        (
            name,
            ImageMetadata {
                taken_at: Some(at(s)),
                location: None,
            },
        )
    }

    fn touch(dir: &Path, names: &[&str]) {
        fs::create_dir_all(dir).unwrap();
        for name in names {
            fs::write(dir.join(name), b"jpeg").unwrap();
        }
    }

    fn build_default(doc_dir: &Path, backend: &MockBackend) -> Gallery {
        let gallery_config = GalleryConfig::default();
        let tracks = TracksConfig::default();
        let ctx = MarkupContext {
            gallery: &gallery_config,
            tracks: &tracks,
            backend,
        };
        build(&GalleryBlock::default(), doc_dir, 0, &ctx).unwrap()
    }

    fn names(gallery: &Gallery) -> Vec<String> {
        gallery
            .images
            .iter()
            .map(|i| i.path.file_name().unwrap().to_string_lossy().to_string())
            .collect()
    }

    // =========================================================================
    // Ordering
    // =========================================================================

    #[test]
    fn dated_images_sort_by_time_undated_last() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("photos"), &["a.jpg", "b.jpg", "c.jpg"]);
        let backend = MockBackend::with_metadata(vec![
            dated("a.jpg", "2023-05-01T12:00:00Z"),
            dated("b.jpg", "2023-05-01T10:00:00Z"),
        ]);

        let gallery = build_default(tmp.path(), &backend);
        assert_eq!(names(&gallery), vec!["b.jpg", "a.jpg", "c.jpg"]);
    }

    #[test]
    fn undated_images_sort_by_path() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("photos"), &["z.jpg", "m.jpg", "a.jpg"]);

        let gallery = build_default(tmp.path(), &MockBackend::new());
        assert_eq!(names(&gallery), vec!["a.jpg", "m.jpg", "z.jpg"]);
    }

    #[test]
    fn equal_timestamps_tie_break_on_path() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("photos"), &["y.jpg", "x.jpg"]);
        let backend = MockBackend::with_metadata(vec![
            dated("y.jpg", "2023-05-01T10:00:00Z"),
            dated("x.jpg", "2023-05-01T10:00:00Z"),
        ]);

        let gallery = build_default(tmp.path(), &backend);
        assert_eq!(names(&gallery), vec!["x.jpg", "y.jpg"]);
    }

    // =========================================================================
    // Listing
    // =========================================================================

    #[test]
    fn include_pattern_and_directory_from_block() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("day1"), &["a.png", "b.jpg", "c.png"]);
        fs::create_dir_all(tmp.path().join("day1/sub.png")).unwrap();

        let gallery_config = GalleryConfig::default();
        let tracks = TracksConfig::default();
        let backend = MockBackend::new();
        let ctx = MarkupContext {
            gallery: &gallery_config,
            tracks: &tracks,
            backend: &backend,
        };
        let block = GalleryBlock {
            path: Some("day1".into()),
            include: Some("*.png".into()),
        };
        let gallery = build(&block, tmp.path(), 3, &ctx).unwrap();

        assert_eq!(names(&gallery), vec!["a.png", "c.png"]);
        assert_eq!(gallery.ordinal, 3);
        assert_eq!(gallery.element_id, "gallery-03");
        assert_eq!(gallery.directory, tmp.path().join("day1"));
    }

    #[test]
    fn include_supports_classes_and_single_chars() {
        let tmp = TempDir::new().unwrap();
        touch(
            &tmp.path().join("photos"),
            &["a.JPG", "b.jpg", "c.png", "day1.jpg", "day12.jpg"],
        );
        let gallery_config = GalleryConfig::default();
        let tracks = TracksConfig::default();
        let backend = MockBackend::new();
        let ctx = MarkupContext {
            gallery: &gallery_config,
            tracks: &tracks,
            backend: &backend,
        };

        let any_case = GalleryBlock {
            path: None,
            include: Some("?.[jJ][pP][gG]".into()),
        };
        let gallery = build(&any_case, tmp.path(), 0, &ctx).unwrap();
        assert_eq!(names(&gallery), vec!["a.JPG", "b.jpg"]);

        let one_digit = GalleryBlock {
            path: None,
            include: Some("day?.jpg".into()),
        };
        let gallery = build(&one_digit, tmp.path(), 0, &ctx).unwrap();
        assert_eq!(names(&gallery), vec!["day1.jpg"]);
    }

    #[test]
    fn missing_directory_is_empty_gallery() {
        let tmp = TempDir::new().unwrap();
        let gallery = build_default(tmp.path(), &MockBackend::new());
        assert!(gallery.images.is_empty());
    }

    #[test]
    fn bad_include_pattern_errors() {
        let tmp = TempDir::new().unwrap();
        let gallery_config = GalleryConfig::default();
        let tracks = TracksConfig::default();
        let backend = MockBackend::new();
        let ctx = MarkupContext {
            gallery: &gallery_config,
            tracks: &tracks,
            backend: &backend,
        };
        let block = GalleryBlock {
            path: None,
            include: Some("[".into()),
        };
        assert!(matches!(
            build(&block, tmp.path(), 0, &ctx),
            Err(MarkupError::Pattern { .. })
        ));
    }

    // =========================================================================
    // HTML
    // =========================================================================

    #[test]
    fn render_html_links_display_and_thumbnail() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("photos"), &["a.jpg", "b.jpg"]);
        let backend = MockBackend::with_metadata(vec![dated("a.jpg", "2023-05-01T10:20:30Z")]);
        let gallery = build_default(tmp.path(), &backend);

        let html = render_html(&gallery);
        let a = &gallery.images[0];
        assert!(html.starts_with(r#"<div class="gallery" id="gallery-00">"#));
        assert!(html.contains(&format!(
            r#"<div class="gallery-entry"><a href="{}"><img class="gallery-item" src="{}" title="2023-05-01 10:20:30"></a></div>"#,
            a.resource.uri,
            a.thumbnail.as_ref().unwrap().uri
        )));
        // Undated image has no title attribute
        assert_eq!(html.matches("title=").count(), 1);
        assert_eq!(html.matches("gallery-entry").count(), 2);
    }
}
