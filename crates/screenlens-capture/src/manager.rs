//! Capture session management.
//!
//! The manager owns the projection, the virtual display mirroring the
//! screen, and the image reader behind it. Everything is created lazily on
//! the first frame request and either kept for later requests or torn down
//! after each one, depending on the grant.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use screenlens_ipc::{CaptureToken, Rect};
use tracing::{debug, info, instrument, warn};

use crate::acquire::{AcquireOptions, FrameAcquirer, MAX_BLACK_FRAME_RETRY};
use crate::crop::crop_frame;
use crate::diagnostics::{Anomaly, DiagnosticsSink};
use crate::error::CaptureError;
use crate::format::{parse_format_mismatch, FormatStore};
use crate::frame::Bitmap;
use crate::platform::{
    CapturePlatform, DisplayMetrics, Projection, ProjectionEvent, VirtualDisplay,
};
use crate::pool::{BitmapPool, PooledBitmap};
use crate::CaptureResult;

/// Name given to the mirroring virtual display.
pub const MIRROR_DISPLAY_NAME: &str = "screen-mirror";

/// Images the reader may hold at once.
pub const READER_MAX_IMAGES: u32 = 2;

#[derive(Clone)]
struct CaptureGrant {
    token: CaptureToken,
    keep_session: bool,
}

/// Live platform objects of the current session.
#[derive(Default)]
struct SessionResources {
    projection: Option<Box<dyn Projection>>,
    acquirer: Option<FrameAcquirer>,
    display: Option<Box<dyn VirtualDisplay>>,

    /// Display geometry seen by the previous request. Survives teardown so a
    /// rotation between two sessions is still noticed.
    last_metrics: Option<DisplayMetrics>,
}

/// Owns the capture session and produces frames on demand.
pub struct CaptureManager {
    platform: Arc<dyn CapturePlatform>,
    format_store: Arc<dyn FormatStore>,
    diagnostics: Arc<dyn DiagnosticsSink>,
    pool: BitmapPool,
    grant: Mutex<Option<CaptureGrant>>,
    resources: Mutex<SessionResources>,
    in_flight: tokio::sync::Mutex<()>,
    max_black_retry: u32,
}

impl CaptureManager {
    /// Create a manager without a grant.
    pub fn new(
        platform: Arc<dyn CapturePlatform>,
        format_store: Arc<dyn FormatStore>,
        diagnostics: Arc<dyn DiagnosticsSink>,
    ) -> Self {
        Self {
            platform,
            format_store,
            diagnostics,
            pool: BitmapPool::default(),
            grant: Mutex::new(None),
            resources: Mutex::new(SessionResources::default()),
            in_flight: tokio::sync::Mutex::new(()),
            max_black_retry: MAX_BLACK_FRAME_RETRY,
        }
    }

    /// Override how many whole-black frames are tolerated.
    pub fn with_max_black_retry(mut self, max_black_retry: u32) -> Self {
        self.max_black_retry = max_black_retry;
        self
    }

    /// Pool the manager decodes frames into.
    pub fn pool(&self) -> &BitmapPool {
        &self.pool
    }

    /// Store a capture grant, dropping any session of a previous grant.
    #[instrument(name = "capture_grant", skip(self, token))]
    pub fn grant(&self, token: CaptureToken, keep_session: bool) {
        self.release_resources();
        *self.grant.lock() = Some(CaptureGrant {
            token,
            keep_session,
        });
        info!("Capture granted");
    }

    /// Returns true if a grant is stored.
    pub fn is_granted(&self) -> bool {
        self.grant.lock().is_some()
    }

    /// Whether the session outlives each request. False without a grant.
    pub fn keeps_session(&self) -> bool {
        self.grant
            .lock()
            .as_ref()
            .is_some_and(|grant| grant.keep_session)
    }

    /// Tear down the session and forget the grant. Safe to call repeatedly.
    #[instrument(name = "capture_release", skip(self))]
    pub fn release(&self) {
        self.release_resources();
        *self.grant.lock() = None;
    }

    /// Capture one full-screen frame.
    ///
    /// Requests are served one at a time. Without `keep_session` the session
    /// is rebuilt for this request and torn down afterwards, whatever the
    /// outcome.
    #[instrument(name = "capture_request_frame", skip(self))]
    pub async fn request_frame(&self, timeout: Duration) -> CaptureResult<PooledBitmap> {
        let _in_flight = self.in_flight.lock().await;

        let keep_session = self.keeps_session();
        if !keep_session {
            self.release_resources();
        }

        let teardown = (!keep_session).then_some(SessionTeardown(self));
        let result = self.capture(timeout, keep_session).await;
        drop(teardown);

        result.map_err(|e| self.handle_failure(e))
    }

    /// Capture a frame and cut `crop_rect` (relative to `parent_rect`) out
    /// of it. The full frame goes back to the pool on every path.
    pub async fn extract_region(
        &self,
        parent_rect: Rect,
        crop_rect: Rect,
        timeout: Duration,
    ) -> CaptureResult<Bitmap> {
        debug!(parent = %parent_rect, crop = %crop_rect, "Extracting region");
        let frame = self.request_frame(timeout).await?;
        crop_frame(
            &frame,
            parent_rect,
            crop_rect,
            &self.pool,
            self.diagnostics.as_ref(),
        )
    }

    async fn capture(&self, timeout: Duration, keep_session: bool) -> CaptureResult<PooledBitmap> {
        let grant = self.grant.lock().clone().ok_or_else(|| {
            warn!("No capture grant stored");
            CaptureError::NotAuthorized
        })?;

        let (acquirer, options) = self.prepare_session(&grant, keep_session)?;

        debug!(?timeout, "Awaiting frame");
        let acquired = tokio::time::timeout(timeout, acquirer.acquire(options))
            .await
            .map_err(|_| {
                warn!(?timeout, "Timed out waiting for a frame");
                CaptureError::Timeout(timeout)
            })??;

        match acquired {
            Some(frame) => {
                debug!(
                    width = frame.width(),
                    height = frame.height(),
                    screen = %options.screen,
                    "Frame captured"
                );
                Ok(frame)
            }
            None => {
                warn!("Only whole-black frames were captured");
                Err(CaptureError::NoImageData)
            }
        }
    }

    /// Make sure projection, reader and display exist and match the screen.
    fn prepare_session(
        &self,
        grant: &CaptureGrant,
        keep_session: bool,
    ) -> CaptureResult<(FrameAcquirer, AcquireOptions)> {
        let mut guard = self.resources.lock();
        let resources = &mut *guard;

        if resources.projection.is_none() {
            debug!("Creating projection");
            let projection = self
                .platform
                .open_projection(&grant.token, Box::new(log_projection_event))?;
            resources.projection = Some(projection);
        }

        let metrics = self.platform.display_metrics();
        let configuration_changed = resources.last_metrics != Some(metrics);
        resources.last_metrics = Some(metrics);

        let format = self.format_store.load();
        let acquirer = match &resources.acquirer {
            Some(acquirer) => acquirer.clone(),
            None => {
                debug!(size = %metrics.size, %format, "Creating image reader");
                let reader =
                    self.platform
                        .new_image_reader(metrics.size, format, READER_MAX_IMAGES)?;
                let acquirer =
                    FrameAcquirer::new(reader, self.pool.clone(), Arc::clone(&self.diagnostics));
                resources.acquirer = Some(acquirer.clone());
                acquirer
            }
        };
        let surface = acquirer.reader().surface();

        match resources.display.as_mut() {
            None => {
                debug!(size = %metrics.size, dpi = metrics.density_dpi, "Creating virtual display");
                let projection = resources
                    .projection
                    .as_mut()
                    .ok_or(CaptureError::ProjectionUnavailable)?;
                let display = projection.create_virtual_display(
                    MIRROR_DISPLAY_NAME,
                    metrics.size,
                    metrics.density_dpi,
                    surface,
                )?;
                resources.display = Some(display);
            }
            Some(display) if configuration_changed => {
                debug!(size = %metrics.size, dpi = metrics.density_dpi, "Screen configuration changed, resizing virtual display");
                display.resize(metrics.size, metrics.density_dpi)?;
                display.set_surface(surface)?;
            }
            Some(_) => {}
        }

        let options = AcquireOptions {
            screen: metrics.size,
            format,
            max_black_retry: self.max_black_retry,
            keep_session,
        };

        Ok((acquirer, options))
    }

    /// Turn platform format errors into [`CaptureError::FormatMismatch`]
    /// after persisting the corrected format.
    fn handle_failure(&self, error: CaptureError) -> CaptureError {
        warn!("Capture failed: {}", error);

        let Some(corrected) = parse_format_mismatch(&error.to_string()) else {
            return error;
        };

        let previous = self.format_store.load();
        warn!(%previous, %corrected, "Format not matched, changing the image reader format");
        if let Err(e) = self.format_store.store(corrected) {
            warn!("Failed to persist image reader format: {}", e);
        }
        self.diagnostics.report(Anomaly::FormatMismatch {
            previous,
            corrected,
        });

        // The reader still has the old format; the next request builds a new one.
        self.release_resources();

        CaptureError::FormatMismatch { corrected }
    }

    /// Tear down reader, display and projection. Errors are ignored.
    fn release_resources(&self) {
        let (acquirer, display, projection) = {
            let mut resources = self.resources.lock();
            (
                resources.acquirer.take(),
                resources.display.take(),
                resources.projection.take(),
            )
        };

        if acquirer.is_none() && display.is_none() && projection.is_none() {
            return;
        }
        debug!("Releasing capture resources");

        if let Some(acquirer) = acquirer {
            let reader = acquirer.reader();
            if let Err(e) = reader.set_on_image_available(None) {
                debug!("Ignoring listener detach error: {}", e);
            }
            if let Err(e) = reader.close() {
                debug!("Ignoring image reader close error: {}", e);
            }
        }

        if let Some(mut display) = display {
            if let Err(e) = display.release() {
                debug!("Ignoring virtual display release error: {}", e);
            }
        }

        if let Some(mut projection) = projection {
            if let Err(e) = projection.stop() {
                debug!("Ignoring projection stop error: {}", e);
            }
        }
    }
}

/// Releases a per-request session when dropped, also when the request
/// future is cancelled mid-await.
struct SessionTeardown<'a>(&'a CaptureManager);

impl Drop for SessionTeardown<'_> {
    fn drop(&mut self) {
        self.0.release_resources();
    }
}

impl Drop for CaptureManager {
    fn drop(&mut self) {
        self.release_resources();
    }
}

fn log_projection_event(event: ProjectionEvent) {
    match event {
        ProjectionEvent::Stopped => debug!("Projection stopped"),
        ProjectionEvent::ContentResized { width, height } => {
            debug!(width, height, "Projection content resized")
        }
        ProjectionEvent::VisibilityChanged { visible } => {
            debug!(visible, "Projection content visibility changed")
        }
    }
}
