//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

use super::backend::Dimensions;
use crate::spec::ResizeMode;

/// Compute the box an image of size `source` is resized to for a `target`
/// request, or `None` when no resize should happen.
///
/// - [`ResizeMode::Fit`]: the result preserves the source aspect ratio and never
///   exceeds `target` in either dimension. A source that already fits is left
///   alone (no enlargement).
/// - [`ResizeMode::Outbound`]: the result is exactly `target`; the caller fills
///   and crops.
/// - Zero-sized targets or sources are degenerate, and a target equal to the
///   source size is a no-op; both yield `None`.
///
/// # Examples
/// ```
/// # use image_transmuter::imaging::{Dimensions, box_from_size};
/// # use image_transmuter::spec::ResizeMode;
/// // 1600x1200 into 800x800 keeps 4:3 → 800x600
/// assert_eq!(
///     box_from_size((800, 800), Dimensions::new(1600, 1200), ResizeMode::Fit),
///     Some(Dimensions::new(800, 600))
/// );
///
/// // Outbound always lands on the requested box
/// assert_eq!(
///     box_from_size((800, 800), Dimensions::new(1600, 1200), ResizeMode::Outbound),
///     Some(Dimensions::new(800, 800))
/// );
/// ```
pub fn box_from_size(
    target: (u32, u32),
    source: Dimensions,
    mode: ResizeMode,
) -> Option<Dimensions> {
    let (tgt_w, tgt_h) = target;
    if tgt_w == 0 || tgt_h == 0 || source.width == 0 || source.height == 0 {
        return None;
    }
    if (tgt_w, tgt_h) == (source.width, source.height) {
        return None;
    }

    match mode {
        ResizeMode::Outbound => Some(Dimensions::new(tgt_w, tgt_h)),
        ResizeMode::Fit => {
            if source.width <= tgt_w && source.height <= tgt_h {
                return None;
            }
            Some(fit_within(source, (tgt_w, tgt_h)))
        }
    }
}

/// Scale `source` down to the largest size inside `bounds` with the same aspect ratio.
///
/// One dimension matches its bound exactly; the other is rounded and kept >= 1.
pub fn fit_within(source: Dimensions, bounds: (u32, u32)) -> Dimensions {
    let (max_w, max_h) = bounds;
    let ratio_w = max_w as f64 / source.width as f64;
    let ratio_h = max_h as f64 / source.height as f64;

    if ratio_w <= ratio_h {
        // Width is the binding edge
        let h = (source.height as f64 * ratio_w).round() as u32;
        Dimensions::new(max_w, h.clamp(1, max_h))
    } else {
        // Height is the binding edge
        let w = (source.width as f64 * ratio_h).round() as u32;
        Dimensions::new(w.clamp(1, max_w), max_h)
    }
}
