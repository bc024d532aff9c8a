//! Screen projection capture for screenlens.
//!
//! This crate owns the privileged capture session, pulls usable frames out
//! of the mirrored display, and crops the user's selection out of them. The
//! platform itself sits behind the traits in [`platform`]; [`replay`] implements
//! them over scripted frames.

mod acquire;
mod crop;
mod decode;
mod diagnostics;
mod error;
mod format;
mod frame;
mod manager;
pub mod platform;
mod pool;
pub mod replay;

pub use acquire::{
    AcquireOptions, Acquisition, FrameAcquirer, Resolver, MAX_BLACK_FRAME_RETRY,
};
pub use crop::{crop_frame, CropBounds};
pub use diagnostics::{Anomaly, DiagnosticsSink, TracingDiagnostics};
pub use error::CaptureError;
pub use format::{
    parse_format_mismatch, FormatStore, JsonFormatStore, MemoryFormatStore, PixelFormat,
};
pub use frame::Bitmap;
pub use manager::{CaptureManager, MIRROR_DISPLAY_NAME, READER_MAX_IMAGES};
pub use pool::{BitmapKey, BitmapPool, PooledBitmap, DEFAULT_BUFFERS_PER_KEY};
pub use replay::{ReplayFrame, ReplayPlatform, ReplayStats};

/// Result type for capture operations.
pub type CaptureResult<T> = Result<T, CaptureError>;
