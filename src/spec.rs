//! Target specifications.
//!
//! A [`Specification`] describes the desired output. Only the [`Image`](Specification::Image)
//! kind is handled by this crate; the other kinds exist so callers holding a mixed
//! bag of specifications get a clean "not supported" error instead of a type error
//! at the call site.

use serde::{Deserialize, Serialize};

/// Resize policy applied when a target size is set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeMode {
    /// Fit inside the box, preserving aspect ratio.
    #[default]
    Fit,
    /// Fill the box exactly, cropping the overflow.
    Outbound,
}

/// Unit of the encoded resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionUnit {
    #[default]
    #[serde(rename = "ppi")]
    PixelsPerInch,
    #[serde(rename = "ppc")]
    PixelsPerCentimeter,
}

/// Kinds of specification a transmuter may be handed.
#[derive(Debug, Clone, PartialEq)]
pub enum Specification {
    Image(ImageSpec),
    Audio,
    Video,
    Animation,
}

impl Specification {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Specification::Image(_) => "image",
            Specification::Audio => "audio",
            Specification::Video => "video",
            Specification::Animation => "animation",
        }
    }
}

impl From<ImageSpec> for Specification {
    fn from(spec: ImageSpec) -> Self {
        Specification::Image(spec)
    }
}

/// Description of the desired raster output.
///
/// Width and height are set together through [`ImageSpec::with_size`], so a
/// specification never carries only one of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImageSpec {
    size: Option<(u32, u32)>,
    pub resize_mode: ResizeMode,
    /// Explicit rotation in degrees, clockwise. `None` defers to the source orientation.
    pub rotation_angle: Option<i32>,
    pub strip: bool,
    pub flatten: bool,
    pub quality: u32,
    pub resolution_unit: ResolutionUnit,
    pub resolution_x: u32,
    pub resolution_y: u32,
    /// Hex color (`#rrggbb` or `rrggbb`) used behind transparent pixels when flattening.
    pub background_color: Option<String>,
}

impl Default for ImageSpec {
    fn default() -> Self {
        Self {
            size: None,
            resize_mode: ResizeMode::Fit,
            rotation_angle: None,
            strip: false,
            flatten: false,
            quality: 75,
            resolution_unit: ResolutionUnit::PixelsPerInch,
            resolution_x: 72,
            resolution_y: 72,
            background_color: None,
        }
    }
}

impl ImageSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.size = Some((width, height));
        self
    }

    pub fn without_size(mut self) -> Self {
        self.size = None;
        self
    }

    pub fn with_resize_mode(mut self, mode: ResizeMode) -> Self {
        self.resize_mode = mode;
        self
    }

    pub fn with_rotation(mut self, degrees: i32) -> Self {
        self.rotation_angle = Some(degrees);
        self
    }

    pub fn with_strip(mut self, strip: bool) -> Self {
        self.strip = strip;
        self
    }

    pub fn with_flatten(mut self, flatten: bool) -> Self {
        self.flatten = flatten;
        self
    }

    pub fn with_quality(mut self, quality: u32) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_resolution(mut self, unit: ResolutionUnit, x: u32, y: u32) -> Self {
        self.resolution_unit = unit;
        self.resolution_x = x;
        self.resolution_y = y;
        self
    }

    pub fn with_background_color(mut self, color: impl Into<String>) -> Self {
        self.background_color = Some(color.into());
        self
    }

    pub fn width(&self) -> Option<u32> {
        self.size.map(|(w, _)| w)
    }

    pub fn height(&self) -> Option<u32> {
        self.size.map(|(_, h)| h)
    }

    /// Target `(width, height)`, present only when both were given.
    pub fn size(&self) -> Option<(u32, u32)> {
        self.size
    }
}
