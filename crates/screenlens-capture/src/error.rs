//! Error types for the capture module.

use std::time::Duration;

use thiserror::Error;

use crate::format::PixelFormat;

/// Errors that can occur during capture operations.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// No capture grant has been stored, or it was released.
    #[error("Screen capture is not authorized")]
    NotAuthorized,

    /// No usable frame arrived before the deadline.
    #[error("Timed out after {0:?} waiting for a frame")]
    Timeout(Duration),

    /// The reader produced no image, or only whole-black frames.
    #[error("No image data found")]
    NoImageData,

    /// The reader's pixel format did not match the producer's.
    ///
    /// The corrected format has already been persisted for the next session.
    #[error("Image reader format mismatch, switched to {corrected}")]
    FormatMismatch { corrected: PixelFormat },

    /// The crop rectangle does not intersect the frame.
    #[error("Illegal crop bounds: {width}x{height} at ({left}, {top}) on a {frame_width}x{frame_height} frame")]
    IllegalCropBounds {
        left: i32,
        top: i32,
        width: i32,
        height: i32,
        frame_width: u32,
        frame_height: u32,
    },

    /// The platform refused to hand out a projection.
    #[error("Media projection unavailable")]
    ProjectionUnavailable,

    /// The awaiting caller went away before a frame was delivered.
    #[error("Frame request cancelled")]
    Cancelled,

    /// Error reported by the platform capture API.
    #[error("Platform error: {0}")]
    Platform(String),
}

impl CaptureError {
    /// Message suitable for the error dialog.
    pub fn user_message(&self) -> String {
        match self {
            Self::NotAuthorized => {
                "Screen capture permission is missing, please grant it again".to_string()
            }
            Self::Timeout(_) => "Capturing the screen took too long, please retry".to_string(),
            Self::NoImageData => "No image data was captured, please retry".to_string(),
            Self::FormatMismatch { .. } => {
                "The image format is not supported by this device, please retry".to_string()
            }
            Self::IllegalCropBounds { .. } => {
                "The selected area is outside the screen, please select again".to_string()
            }
            other => other.to_string(),
        }
    }
}
