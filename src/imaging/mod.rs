//! Image processing in pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `ImageReader::into_dimensions` |
//! | **Resize** | `DynamicImage::resize_exact` with a configurable filter (Lanczos3 by default) |
//! | **Encode** | back into the source's own format |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for long-edge geometry (unit testable)
//! - **Parameters**: Data structures describing a resize
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]

pub mod backend;
mod calculations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{MAX_EDGE, Orientation, check_output_size, fit_long_edge};
pub use params::{Algorithm, Quality, ResizeParams};
pub use rust_backend::{RustBackend, supported_extensions};
