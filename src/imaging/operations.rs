//! Geometric and color transform of an opened image.
//!
//! [`plan_transform`] decides what to do from the specification and the image
//! state; [`apply_transform`] runs the plan against a [`RasterImage`]. The split
//! keeps every decision testable without pixels.

use super::backend::{Dimensions, RasterError, RasterImage};
use super::calculations::box_from_size;
use super::params::{Palette, ThumbnailMode};
use crate::media::Orientation;
use crate::spec::{ImageSpec, ResizeMode};
use tracing::debug;

/// Resize step of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeStep {
    /// Scale to the box, aspect ratio already folded into it.
    Resize(Dimensions),
    /// Fill the box and crop.
    Outbound(Dimensions),
}

/// Everything the transform stage will do, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformPlan {
    pub resize: Option<ResizeStep>,
    pub rotation: Option<i32>,
    pub palette: Palette,
    pub strip: bool,
}

/// Decide the rotation.
///
/// An explicit angle always wins, zero included. Without one, the orientation
/// hint is used when `autorotate` is on; otherwise nothing rotates.
pub fn plan_rotation(
    autorotate: bool,
    explicit: Option<i32>,
    orientation: Orientation,
) -> Option<i32> {
    match explicit {
        Some(angle) => Some(angle),
        None if autorotate => Some(orientation.degrees()),
        None => None,
    }
}

/// Build the plan for an image currently sized `current`.
pub fn plan_transform(
    spec: &ImageSpec,
    current: Dimensions,
    orientation: Orientation,
    autorotate: bool,
) -> TransformPlan {
    let resize = spec.size().and_then(|target| {
        box_from_size(target, current, spec.resize_mode).map(|size| match spec.resize_mode {
            ResizeMode::Fit => ResizeStep::Resize(size),
            ResizeMode::Outbound => ResizeStep::Outbound(size),
        })
    });

    TransformPlan {
        resize,
        rotation: plan_rotation(autorotate, spec.rotation_angle, orientation),
        palette: Palette::Rgb,
        strip: spec.strip,
    }
}

/// Run `plan`: resize, rotate, palette, strip.
pub fn apply_transform(image: &mut dyn RasterImage, plan: &TransformPlan) -> Result<(), RasterError> {
    match plan.resize {
        Some(ResizeStep::Resize(size)) => {
            debug!(from = %image.size(), to = %size, "Resizing");
            image.resize(size)?;
        }
        Some(ResizeStep::Outbound(size)) => {
            debug!(from = %image.size(), to = %size, "Thumbnailing (outbound)");
            image.thumbnail(size, ThumbnailMode::Outbound)?;
        }
        None => {}
    }

    if let Some(degrees) = plan.rotation {
        debug!(degrees, "Rotating");
        image.rotate(degrees)?;
    }

    image.use_palette(plan.palette)?;

    if plan.strip {
        debug!("Stripping metadata");
        image.strip()?;
    }

    Ok(())
}
