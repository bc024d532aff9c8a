//! Seams to the platform screen-capture API.
//!
//! The capture manager only talks to these traits. A host implements them
//! over the real projection service; tests implement them with fakes.

use std::sync::Arc;

use screenlens_ipc::{CaptureToken, ScreenSize};

use crate::format::PixelFormat;
use crate::CaptureResult;

/// Identifies the output surface a virtual display renders into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u64);

/// Current geometry of the physical display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayMetrics {
    /// Real size, including system bars.
    pub size: ScreenSize,

    /// Density in dots per inch.
    pub density_dpi: u32,
}

/// Lifecycle notifications from an open projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionEvent {
    /// The projection was stopped, by us or by the system.
    Stopped,

    /// The captured content changed size.
    ContentResized { width: u32, height: u32 },

    /// The captured content became visible or hidden.
    VisibilityChanged { visible: bool },
}

/// Callback receiving [`ProjectionEvent`]s on the platform's thread.
pub type ProjectionListener = Box<dyn Fn(ProjectionEvent) + Send + Sync>;

/// Callback fired on the platform's worker thread when the reader has a
/// new image. The reader is passed in so the callback holds no reference
/// to it.
pub type ImageAvailableListener = Arc<dyn Fn(&dyn ImageReader) + Send + Sync>;

/// Entry point into the platform capture service.
pub trait CapturePlatform: Send + Sync {
    /// Turn a grant into a live projection.
    fn open_projection(
        &self,
        token: &CaptureToken,
        listener: ProjectionListener,
    ) -> CaptureResult<Box<dyn Projection>>;

    /// Create a reader that receives frames of the given size and format.
    fn new_image_reader(
        &self,
        size: ScreenSize,
        format: PixelFormat,
        max_images: u32,
    ) -> CaptureResult<Arc<dyn ImageReader>>;

    /// Geometry of the display as of now.
    fn display_metrics(&self) -> DisplayMetrics;
}

/// A granted screen projection.
pub trait Projection: Send {
    /// Mirror the screen into `surface`.
    fn create_virtual_display(
        &mut self,
        name: &str,
        size: ScreenSize,
        density_dpi: u32,
        surface: SurfaceId,
    ) -> CaptureResult<Box<dyn VirtualDisplay>>;

    /// Stop projecting. The projection is unusable afterwards.
    fn stop(&mut self) -> CaptureResult<()>;
}

/// An off-screen display mirroring the screen.
pub trait VirtualDisplay: Send {
    fn resize(&mut self, size: ScreenSize, density_dpi: u32) -> CaptureResult<()>;

    fn set_surface(&mut self, surface: SurfaceId) -> CaptureResult<()>;

    fn release(&mut self) -> CaptureResult<()>;
}

/// Receives mirrored frames.
pub trait ImageReader: Send + Sync {
    /// Surface to render into.
    fn surface(&self) -> SurfaceId;

    /// Latest queued image, dropping older ones. `None` if nothing is queued.
    fn acquire_latest_image(&self) -> CaptureResult<Option<Box<dyn Image>>>;

    /// Install or clear the image-available listener.
    fn set_on_image_available(&self, listener: Option<ImageAvailableListener>)
        -> CaptureResult<()>;

    fn close(&self) -> CaptureResult<()>;
}

/// The first plane of an acquired image.
#[derive(Debug, Clone, Copy)]
pub struct Plane<'a> {
    /// Bytes between the starts of two rows.
    pub row_stride: usize,

    /// Bytes between two pixels of a row.
    pub pixel_stride: usize,

    pub buffer: &'a [u8],
}

/// An image acquired from a reader. Must be closed to free its slot.
pub trait Image: Send {
    fn plane(&self) -> Plane<'_>;

    fn close(self: Box<Self>) -> CaptureResult<()>;
}
