//! Mapping a user-drawn selection onto a captured frame.

use screenlens_ipc::Rect;
use tracing::{debug, warn};

use crate::diagnostics::{Anomaly, DiagnosticsSink};
use crate::error::CaptureError;
use crate::frame::Bitmap;
use crate::pool::{BitmapPool, PooledBitmap};
use crate::CaptureResult;

/// Crop geometry derived from a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropBounds {
    /// Crop rectangle moved into frame coordinates.
    pub absolute: Rect,

    /// Width after clamping to the frame's right edge.
    pub width: i32,

    /// Height after clamping to the frame's bottom edge.
    pub height: i32,
}

impl CropBounds {
    /// Compute absolute bounds for `crop_rect`, which is relative to
    /// `parent_rect`, on a frame of the given size.
    ///
    /// Returns `None` when the selection cannot be placed in `i32` frame
    /// coordinates.
    pub fn compute(
        frame_width: u32,
        frame_height: u32,
        parent_rect: Rect,
        crop_rect: Rect,
    ) -> Option<Self> {
        let absolute = crop_rect.checked_offset(parent_rect.left, parent_rect.top)?;
        let frame_width = i32::try_from(frame_width).ok()?;
        let frame_height = i32::try_from(frame_height).ok()?;
        let width = absolute.width().min(frame_width.saturating_sub(absolute.left));
        let height = absolute.height().min(frame_height.saturating_sub(absolute.top));

        Some(Self {
            absolute,
            width,
            height,
        })
    }

    /// Positive size with the top-left corner inside the frame.
    pub fn is_legal(&self) -> bool {
        self.width > 0 && self.height > 0 && self.absolute.left >= 0 && self.absolute.top >= 0
    }

    /// Whether the requested rectangle had to be shrunk.
    pub fn was_clamped(&self) -> bool {
        self.width < self.absolute.width() || self.height < self.absolute.height()
    }

    /// Bounds actually cut out of the frame: the clamped rectangle
    /// intersected with the frame. May be empty.
    pub fn effective(&self, frame_width: u32, frame_height: u32) -> Rect {
        let frame_width = i32::try_from(frame_width).unwrap_or(i32::MAX);
        let frame_height = i32::try_from(frame_height).unwrap_or(i32::MAX);
        let left = self.absolute.left.clamp(0, frame_width);
        let top = self.absolute.top.clamp(0, frame_height);
        let right = self.absolute.right.clamp(left, frame_width);
        let bottom = self.absolute.bottom.clamp(top, frame_height);
        Rect::new(left, top, right, bottom)
    }
}

/// Cut the selection out of a full frame.
///
/// Illegal or clamped bounds are reported to `diagnostics` and the crop is
/// still attempted on the part inside the frame. An empty result fails with
/// [`CaptureError::IllegalCropBounds`].
pub fn crop_frame(
    frame: &PooledBitmap,
    parent_rect: Rect,
    crop_rect: Rect,
    pool: &BitmapPool,
    diagnostics: &dyn DiagnosticsSink,
) -> CaptureResult<Bitmap> {
    let (frame_width, frame_height) = (frame.width(), frame.height());
    debug!(
        frame_width,
        frame_height,
        parent = %parent_rect,
        crop = %crop_rect,
        "Cropping frame"
    );

    let Some(bounds) = CropBounds::compute(frame_width, frame_height, parent_rect, crop_rect)
    else {
        warn!(
            parent = %parent_rect,
            crop = %crop_rect,
            "Selection lies outside frame coordinates"
        );
        diagnostics.report(Anomaly::IllegalCropBounds {
            frame_width,
            frame_height,
            parent_rect,
            crop_rect,
            absolute: crop_rect,
            width: crop_rect.width(),
            height: crop_rect.height(),
        });
        return Err(CaptureError::IllegalCropBounds {
            left: crop_rect.left,
            top: crop_rect.top,
            width: crop_rect.width(),
            height: crop_rect.height(),
            frame_width,
            frame_height,
        });
    };
    if !bounds.is_legal() || bounds.was_clamped() {
        diagnostics.report(Anomaly::IllegalCropBounds {
            frame_width,
            frame_height,
            parent_rect,
            crop_rect,
            absolute: bounds.absolute,
            width: bounds.width,
            height: bounds.height,
        });
    }

    let effective = bounds.effective(frame_width, frame_height);
    if effective.is_empty() {
        return Err(CaptureError::IllegalCropBounds {
            left: bounds.absolute.left,
            top: bounds.absolute.top,
            width: bounds.width,
            height: bounds.height,
            frame_width,
            frame_height,
        });
    }

    let cropped = frame.copy_region(
        pool,
        effective.left as u32,
        effective.top as u32,
        effective.width() as u32,
        effective.height() as u32,
    );
    debug!(width = cropped.width(), height = cropped.height(), "Cropped bitmap");

    Ok(cropped.into_bitmap())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_into_parent() {
        let bounds = CropBounds::compute(
            1000,
            1000,
            Rect::new(100, 200, 600, 700),
            Rect::new(10, 20, 60, 80),
        )
        .unwrap();
        assert_eq!(bounds.absolute, Rect::new(110, 220, 160, 280));
        assert_eq!((bounds.width, bounds.height), (50, 60));
        assert!(bounds.is_legal());
        assert!(!bounds.was_clamped());
    }

    #[test]
    fn negative_origin_is_illegal_but_still_intersected() {
        let bounds = CropBounds::compute(
            100,
            100,
            Rect::new(0, 0, 100, 100),
            Rect::new(-10, 5, 30, 25),
        )
        .unwrap();
        assert!(!bounds.is_legal());
        assert_eq!(bounds.effective(100, 100), Rect::new(0, 5, 30, 25));
    }

    #[test]
    fn crop_starting_past_the_frame_is_empty() {
        let bounds = CropBounds::compute(
            100,
            100,
            Rect::new(0, 0, 100, 100),
            Rect::new(120, 10, 150, 40),
        )
        .unwrap();
        assert!(bounds.width <= 0);
        assert!(bounds.effective(100, 100).is_empty());
    }

    #[test]
    fn parent_at_the_coordinate_limit_has_no_bounds() {
        let bounds = CropBounds::compute(
            100,
            60,
            Rect::new(i32::MAX - 5, 0, i32::MAX, 60),
            Rect::new(10, 0, 20, 10),
        );
        assert_eq!(bounds, None);
    }

    #[test]
    fn far_negative_selection_clamps_without_overflow() {
        let bounds = CropBounds::compute(
            100,
            60,
            Rect::new(0, 0, 100, 60),
            Rect::new(i32::MIN, i32::MIN, i32::MAX, i32::MAX),
        )
        .unwrap();
        assert!(!bounds.is_legal());
        assert_eq!(bounds.effective(100, 60), Rect::new(0, 0, 100, 60));
    }
}
