//! Parameter types for image operations.
//!
//! These types describe *what* to do, not *how* to do it. They are the interface
//! between the pipeline (which decides what the output must look like) and the
//! [`backend`](super::backend) (which does the pixel work).
//!
//! ## Types
//!
//! - [`ThumbnailMode`]: how a thumbnail fills its box.
//! - [`Palette`]: target color palette.
//! - [`Quality`]: validated lossy encoding quality (1–100).
//! - [`EncodeOptions`]: the option set handed to `save`, mapped from an
//!   [`ImageSpec`] by [`EncodeOptions::from_spec`].

use crate::spec::{ImageSpec, ResolutionUnit};

/// How a thumbnail relates to its box.
///
/// Fit-mode resizes never go through a thumbnail: they are planned as an exact
/// resize to the size [`box_from_size`](super::box_from_size) computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbnailMode {
    /// Scale to cover the box, then center-crop to it.
    Outbound,
}

/// Canonical color palettes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Palette {
    Rgb,
}

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u32);

impl Quality {
    /// `None` when `value` is outside 1..=100.
    pub fn new(value: u32) -> Option<Self> {
        (1..=100).contains(&value).then_some(Self(value))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(75)
    }
}

/// Encoder option set.
///
/// Values are passed through from the specification untouched; range checks are
/// the encoder's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Composite transparent pixels onto the background and drop the alpha channel.
    pub disable_alpha: bool,
    pub quality: u32,
    pub resolution_unit: ResolutionUnit,
    pub resolution_x: u32,
    pub resolution_y: u32,
    pub background_color: Option<String>,
}

impl EncodeOptions {
    /// Map specification fields onto encoder options.
    ///
    /// Flattening applies whatever the output extension is.
    pub fn from_spec(spec: &ImageSpec) -> Self {
        Self {
            disable_alpha: spec.flatten,
            quality: spec.quality,
            resolution_unit: spec.resolution_unit,
            resolution_x: spec.resolution_x,
            resolution_y: spec.resolution_y,
            background_color: spec.background_color.clone(),
        }
    }
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self::from_spec(&ImageSpec::default())
    }
}
