//! Anomaly reporting for the capture pipeline.

use std::fmt;

use tracing::warn;

use crate::format::PixelFormat;
use screenlens_ipc::Rect;

/// Something unexpected that did not necessarily fail the capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anomaly {
    /// The reader format was corrected after a platform mismatch.
    FormatMismatch {
        previous: PixelFormat,
        corrected: PixelFormat,
    },

    /// The crop computed from the selection fell outside the frame.
    IllegalCropBounds {
        frame_width: u32,
        frame_height: u32,
        parent_rect: Rect,
        crop_rect: Rect,
        absolute: Rect,
        width: i32,
        height: i32,
    },

    /// The decoded buffer was narrower than the screen.
    NarrowBuffer { buffer_width: u32, screen_width: u32 },

    /// Closing an acquired image failed.
    ImageCloseFailed(String),

    /// Detaching the image-available listener failed.
    ListenerDetachFailed(String),
}

impl Anomaly {
    /// Short stable name, used for counting.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FormatMismatch { .. } => "format_mismatch",
            Self::IllegalCropBounds { .. } => "illegal_crop_bounds",
            Self::NarrowBuffer { .. } => "narrow_buffer",
            Self::ImageCloseFailed(_) => "image_close_failed",
            Self::ListenerDetachFailed(_) => "listener_detach_failed",
        }
    }
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FormatMismatch {
                previous,
                corrected,
            } => write!(
                f,
                "Format not matched, changed the image reader format from {previous} to {corrected}"
            ),
            Self::IllegalCropBounds {
                frame_width,
                frame_height,
                parent_rect,
                crop_rect,
                absolute,
                width,
                height,
            } => write!(
                f,
                "Crop attributes are illegal, bitmap size: {frame_width}x{frame_height}, \
                 parentRect: {parent_rect}, cropRect: {crop_rect}, rect: {absolute}, \
                 width: {width}, height: {height}"
            ),
            Self::NarrowBuffer {
                buffer_width,
                screen_width,
            } => write!(
                f,
                "Buffered bitmap is narrower than the screen: {buffer_width} < {screen_width}"
            ),
            Self::ImageCloseFailed(message) => write!(f, "Error while closing image: {message}"),
            Self::ListenerDetachFailed(message) => {
                write!(f, "Error while detaching image listener: {message}")
            }
        }
    }
}

/// Fire-and-forget receiver of anomalies.
///
/// Implementations must not block and must not fail the caller.
pub trait DiagnosticsSink: Send + Sync {
    fn report(&self, anomaly: Anomaly);
}

/// Sink that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl DiagnosticsSink for TracingDiagnostics {
    fn report(&self, anomaly: Anomaly) {
        warn!(kind = anomaly.kind(), "{}", anomaly);
    }
}
