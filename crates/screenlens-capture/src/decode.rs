//! Copying acquired images into pooled bitmaps.

use screenlens_ipc::ScreenSize;
use tracing::trace;

use crate::diagnostics::{Anomaly, DiagnosticsSink};
use crate::error::CaptureError;
use crate::format::PixelFormat;
use crate::platform::Plane;
use crate::pool::{BitmapPool, PooledBitmap};
use crate::CaptureResult;

/// Decode the first plane of an image into a screen-sized bitmap.
///
/// Rows may carry padding, so the plane is first copied into a buffer
/// `row_stride / pixel_stride` pixels wide. A padded buffer is cut down to
/// the screen width and returned to the pool. A buffer narrower than the
/// screen is reported and used as-is.
pub(crate) fn decode_plane(
    plane: Plane<'_>,
    screen: ScreenSize,
    format: PixelFormat,
    pool: &BitmapPool,
    diagnostics: &dyn DiagnosticsSink,
) -> CaptureResult<PooledBitmap> {
    if plane.pixel_stride == 0 || plane.row_stride < plane.pixel_stride {
        return Err(CaptureError::Platform(format!(
            "Invalid plane strides: row {}, pixel {}",
            plane.row_stride, plane.pixel_stride
        )));
    }
    if screen.width == 0 || screen.height == 0 {
        return Err(CaptureError::Platform(format!(
            "Invalid screen size {screen}"
        )));
    }

    let buffer_width = (plane.row_stride / plane.pixel_stride) as u32;
    let mut buffered = pool.acquire(buffer_width, screen.height, format);

    // The last row of a plane is often unpadded, so the source can be a
    // little shorter than the destination.
    let dst = buffered.pixels_mut();
    let copied = dst.len().min(plane.buffer.len());
    dst[..copied].copy_from_slice(&plane.buffer[..copied]);
    dst[copied..].fill(0);

    trace!(buffer_width, screen = %screen, copied, "Decoded image plane");

    if buffer_width > screen.width {
        return Ok(buffered.copy_region(pool, 0, 0, screen.width, screen.height));
    }

    if buffer_width < screen.width {
        diagnostics.report(Anomaly::NarrowBuffer {
            buffer_width,
            screen_width: screen.width,
        });
    }

    Ok(buffered)
}
