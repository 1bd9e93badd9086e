//! Raster image processing.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image` crate, `tiff` for multi-page TIFF |
//! | **Resize / thumbnail** | Lanczos3, `resize_exact` / `resize_to_fill` |
//! | **Rotate** | lossless quarter turns, `imageproc` otherwise |
//! | **Encode** | JPEG (quality, density), AVIF (rav1e), PNG, TIFF, WebP, GIF, BMP |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`RasterEngine`] / [`RasterImage`] traits + [`RustBackend`]
//! - **Operations**: The transform plan and its execution against a backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{Dimensions, Layer, LayerId, RasterEngine, RasterError, RasterImage};
pub use calculations::{box_from_size, fit_within};
pub use params::{EncodeOptions, Palette, Quality, ThumbnailMode};
pub use rust_backend::RustBackend;
