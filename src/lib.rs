//! # Image Transmuter
//!
//! Converts one image file into another according to a target specification:
//! size, resize policy, rotation, metadata stripping, alpha flattening, quality
//! and resolution. Sources the raster engine cannot open directly (vector
//! artwork, multi-page TIFF, layered Photoshop documents, files carrying an
//! embedded preview) are normalized to a single flat raster first.
//!
//! # Architecture: Four-Stage Pipeline
//!
//! ```text
//! 1. Normalize   source      →  working source   (flat raster the engine can open)
//! 2. Transform   working     →  raster image     (resize, rotate, RGB, strip)
//! 3. Encode      raster      →  destination      (format from the extension)
//! 4. Clean       call scope  →  nothing left     (always, success or failure)
//! ```
//!
//! Every collaborator sits behind a trait so the pipeline logic is testable
//! without decoding a single pixel:
//!
//! | Collaborator | Trait | Default |
//! |---|---|---|
//! | Raster engine | [`imaging::RasterEngine`] | [`imaging::RustBackend`] |
//! | Format sniffing | [`media::MediaIdentifier`] | [`metadata::SniffingIdentifier`] |
//! | Vector rasterizer | [`vector::VectorRasterizer`] | [`vector::GhostscriptRasterizer`] |
//! | Preview extractor | [`preview::PreviewExtractor`] | [`preview::ExiftoolExtractor`] |
//! | Temporary files | [`temp::TemporaryStorage`] | [`temp::ScopedTempFiles`] |
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`transmuter`] | Pipeline orchestrator: validation, stages, unconditional cleanup |
//! | [`normalize`] | Format normalizer: preview, vector, multi-layer and layered-document rules |
//! | [`imaging`] | Raster engine traits, box math, transform plan, pure-Rust backend |
//! | [`spec`] | Target specifications (`ImageSpec` and the kinds this crate rejects) |
//! | [`media`] | Source media handles, format tags, orientation hints |
//! | [`metadata`] | Content-sniffing identifier with EXIF orientation |
//! | [`preview`] | Embedded preview extraction and largest-candidate selection |
//! | [`vector`] | Vector-to-raster conversion through Ghostscript |
//! | [`temp`] | Call-scoped temporary files and directories |
//! | [`config`] | `transmuter.toml` loading and validation |
//! | [`error`] | The single error type callers see |
//!
//! # Example
//!
//! ```no_run
//! use image_transmuter::{ImageSpec, ImageTransmuter, TransmuterConfig};
//! use std::path::Path;
//!
//! let transmuter = ImageTransmuter::new(TransmuterConfig::default());
//! let spec = ImageSpec::new().with_size(800, 800).with_strip(true);
//! transmuter.execute_path(&spec.into(), Path::new("scan.tif"), Path::new("scan.jpg"))?;
//! # Ok::<(), image_transmuter::TransmuteError>(())
//! ```
//!
//! # Design Decisions
//!
//! ## No Process-Wide Toggles
//!
//! Autorotation and embedded-preview preference live in [`TransmuterConfig`],
//! owned by each [`ImageTransmuter`]. Two transmuters in one process can run
//! with different settings, and tests never race on shared state.
//!
//! ## Stable Layer Identifiers
//!
//! Layers are addressed by [`imaging::LayerId`], never by position, so removing
//! one layer cannot shift which layer another removal hits.
//!
//! ## One Error, Tagged With Its Origin
//!
//! Callers see [`TransmuteError`] only. A collaborator failure records which
//! [`Subsystem`] failed and which [`Stage`] was running, and keeps the
//! collaborator's own error as its source.

pub mod config;
pub mod error;
pub mod imaging;
pub mod media;
pub mod metadata;
pub mod normalize;
pub mod preview;
pub mod spec;
pub mod temp;
pub mod transmuter;
pub mod vector;

pub use config::TransmuterConfig;
pub use error::{Subsystem, TransmuteError};
pub use media::{FormatTag, MediaKind, Orientation, SourceMedia};
pub use spec::{ImageSpec, ResizeMode, ResolutionUnit, Specification};
pub use transmuter::{ImageTransmuter, Stage};

#[cfg(test)]
pub(crate) mod test_helpers;
