//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait is the seam between the journal pipeline and
//! pixel work: galleries ask it for capture metadata while the store loads,
//! and render workers ask it for display and thumbnail variants.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend).

use super::params::ResizeParams;
use crate::types::LatLon;
use chrono::{DateTime, Utc};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Capture metadata extracted from EXIF.
///
/// Both fields are optional; a photo without EXIF is still a valid gallery
/// entry, it just sorts after the dated ones and never lands on a map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageMetadata {
    pub taken_at: Option<DateTime<Utc>>,
    pub location: Option<LatLon>,
}

/// Trait for image processing backends.
pub trait ImageBackend: Sync {
    /// Get image dimensions.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Read capture time and GPS position. Missing or unreadable EXIF is
    /// not an error; it yields empty metadata.
    fn read_metadata(&self, path: &Path) -> Result<ImageMetadata, BackendError>;

    /// Scale `source` down to fit `max_width` and write it to `output`.
    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Mock backend that records operations without decoding anything.
    /// Uses Mutex (not RefCell) so it is Sync and works with rayon's par_iter.
    ///
    /// Metadata is served by file name; unknown files get empty metadata.
    /// `resize` writes a small placeholder so freshness checks see an output.
    #[derive(Default)]
    pub struct MockBackend {
        pub metadata_by_name: Mutex<HashMap<String, ImageMetadata>>,
        pub failing_sources: Mutex<Vec<String>>,
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Identify(String),
        ReadMetadata(String),
        Resize {
            source: String,
            output: String,
            max_width: u32,
            quality: u32,
        },
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_metadata(entries: Vec<(&str, ImageMetadata)>) -> Self {
            let map = entries
                .into_iter()
                .map(|(name, meta)| (name.to_string(), meta))
                .collect();
            Self {
                metadata_by_name: Mutex::new(map),
                ..Self::default()
            }
        }

        /// Make `resize` fail for any source whose file name matches.
        pub fn fail_on(self, file_name: &str) -> Self {
            self.failing_sources
                .lock()
                .unwrap()
                .push(file_name.to_string());
            self
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        pub fn resize_count(&self) -> usize {
            self.get_operations()
                .iter()
                .filter(|op| matches!(op, RecordedOp::Resize { .. }))
                .count()
        }
    }

    fn file_name(path: &Path) -> String {
        path.file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    impl ImageBackend for MockBackend {
        fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Identify(path.to_string_lossy().to_string()));
            Ok(Dimensions {
                width: 4000,
                height: 3000,
            })
        }

        fn read_metadata(&self, path: &Path) -> Result<ImageMetadata, BackendError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::ReadMetadata(path.to_string_lossy().to_string()));
            Ok(self
                .metadata_by_name
                .lock()
                .unwrap()
                .get(&file_name(path))
                .cloned()
                .unwrap_or_default())
        }

        fn resize(&self, params: &ResizeParams) -> Result<(), BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::Resize {
                source: params.source.to_string_lossy().to_string(),
                output: params.output.to_string_lossy().to_string(),
                max_width: params.max_width,
                quality: params.quality.value(),
            });
            if self
                .failing_sources
                .lock()
                .unwrap()
                .contains(&file_name(&params.source))
            {
                return Err(BackendError::ProcessingFailed(format!(
                    "mock failure for {}",
                    params.source.display()
                )));
            }
            if let Some(parent) = params.output.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&params.output, b"mock")?;
            Ok(())
        }
    }

    #[test]
    fn mock_serves_metadata_by_file_name() {
        let taken = DateTime::parse_from_rfc3339("2023-05-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let backend = MockBackend::with_metadata(vec![(
            "a.jpg",
            ImageMetadata {
                taken_at: Some(taken),
                location: None,
            },
        )]);

        let meta = backend.read_metadata(Path::new("/j/photos/a.jpg")).unwrap();
        assert_eq!(meta.taken_at, Some(taken));
        let meta = backend.read_metadata(Path::new("/j/photos/b.jpg")).unwrap();
        assert_eq!(meta, ImageMetadata::default());

        let ops = backend.get_operations();
        assert_eq!(ops.len(), 2);
        assert!(matches!(&ops[0], RecordedOp::ReadMetadata(p) if p == "/j/photos/a.jpg"));
    }

    #[test]
    fn mock_records_resize_and_writes_output() {
        let tmp = tempfile::TempDir::new().unwrap();
        let backend = MockBackend::new();
        let output = tmp.path().join("media/x.jpg");

        backend
            .resize(&ResizeParams {
                source: "/source.jpg".into(),
                output: output.clone(),
                max_width: 600,
                quality: super::super::params::Quality::new(90),
            })
            .unwrap();

        assert!(output.exists());
        assert!(matches!(
            &backend.get_operations()[0],
            RecordedOp::Resize {
                max_width: 600,
                quality: 90,
                ..
            }
        ));
    }

    #[test]
    fn mock_fails_on_request() {
        let tmp = tempfile::TempDir::new().unwrap();
        let backend = MockBackend::new().fail_on("broken.jpg");
        let result = backend.resize(&ResizeParams {
            source: "/photos/broken.jpg".into(),
            output: tmp.path().join("out.jpg"),
            max_width: 600,
            quality: super::super::params::Quality::default(),
        });
        assert!(result.is_err());
        assert_eq!(backend.resize_count(), 1);
    }
}
