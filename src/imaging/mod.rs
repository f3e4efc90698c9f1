//! Image handling in pure Rust, statically linked.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::image_dimensions` |
//! | **EXIF metadata** | custom parser (JPEG APP1 + TIFF IFD) |
//! | **Resize → JPEG** | Lanczos3 + `JpegEncoder` |
//!
//! The module is split into:
//! - **Calculations**: pure dimension math (unit testable)
//! - **Parameters**: data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **EXIF parser**: capture time and GPS position from raw file bytes

pub mod backend;
mod calculations;
pub(crate) mod exif_parser;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend, ImageMetadata};
pub use calculations::fit_to_width;
pub use params::{Quality, ResizeParams};
pub use rust_backend::RustBackend;
