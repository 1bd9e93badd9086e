//! Raster engine traits and shared types.
//!
//! [`RasterEngine`] opens files; [`RasterImage`] is the decoded, in-memory image
//! the pipeline transforms and encodes. Images are released when dropped, so
//! holding a `Box<dyn RasterImage>` in a narrow scope bounds native memory use.
//!
//! Layers are addressed by [`LayerId`], assigned once when the image is opened.
//! Removing a layer never changes the id of another one, so a list of ids taken
//! before a removal stays valid after it.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend).

use super::params::{EncodeOptions, Palette, ThumbnailMode};
use std::fmt;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RasterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Invalid encoder option: {0}")]
    InvalidOption(String),
    #[error("No layer with id {0}")]
    LayerNotFound(LayerId),
    #[error("Cannot merge layers: {0}")]
    MergeFailed(String),
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn area(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Stable identifier of a layer within one opened image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(pub usize);

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A layer as enumerated by [`RasterImage::layers`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layer {
    pub id: LayerId,
    pub size: Dimensions,
}

/// Raster decode entry point.
pub trait RasterEngine: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn RasterImage>, RasterError>;
}

/// A decoded image.
///
/// Transform operations apply to every remaining layer; [`size`](Self::size)
/// and [`save`](Self::save) use the first one.
pub trait RasterImage {
    fn size(&self) -> Dimensions;

    /// Remaining layers, in container order.
    fn layers(&self) -> Vec<Layer>;

    fn remove_layer(&mut self, id: LayerId) -> Result<(), RasterError>;

    /// Composite the remaining layers into one.
    fn merge_layers(&mut self) -> Result<(), RasterError>;

    /// Encode a single layer, format chosen from the path extension.
    fn save_layer(&self, id: LayerId, path: &Path) -> Result<(), RasterError>;

    /// Scale to exactly `size`.
    fn resize(&mut self, size: Dimensions) -> Result<(), RasterError>;

    fn thumbnail(&mut self, size: Dimensions, mode: ThumbnailMode) -> Result<(), RasterError>;

    /// Rotate clockwise by `degrees`.
    fn rotate(&mut self, degrees: i32) -> Result<(), RasterError>;

    fn use_palette(&mut self, palette: Palette) -> Result<(), RasterError>;

    /// Drop embedded metadata and color profiles.
    fn strip(&mut self) -> Result<(), RasterError>;

    fn save(&self, path: &Path, options: &EncodeOptions) -> Result<(), RasterError>;
}
