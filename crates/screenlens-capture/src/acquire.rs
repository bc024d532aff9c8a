//! Frame acquisition from an image reader.
//!
//! Frames are delivered through the reader's image-available callback on the
//! platform's worker thread. The first frames of a fresh mirror are often
//! whole black, so those are recycled and waited through, up to a bound.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use screenlens_ipc::ScreenSize;
use tokio::sync::oneshot;
use tracing::{debug, info, trace, warn};

use crate::decode::decode_plane;
use crate::diagnostics::{Anomaly, DiagnosticsSink};
use crate::error::CaptureError;
use crate::format::PixelFormat;
use crate::platform::{Image, ImageAvailableListener, ImageReader};
use crate::pool::{BitmapPool, PooledBitmap};
use crate::CaptureResult;

/// Whole-black frames tolerated before giving up.
pub const MAX_BLACK_FRAME_RETRY: u32 = 10;

/// Outcome of one acquisition: a frame, or `None` when only black frames
/// arrived.
pub type Acquisition = CaptureResult<Option<PooledBitmap>>;

/// Parameters of one acquisition.
#[derive(Debug, Clone, Copy)]
pub struct AcquireOptions {
    /// Size the frame is decoded to.
    pub screen: ScreenSize,

    /// Format the reader was created with.
    pub format: PixelFormat,

    /// Whole-black frames tolerated before resolving with no image.
    pub max_black_retry: u32,

    /// Whether the session outlives this capture. Only kept sessions are
    /// remembered as warmed up.
    pub keep_session: bool,
}

/// Delivers a value at most once, whichever side gets there first.
///
/// Both the listener and the cancelled awaiting side go through
/// [`Resolver::claim`], so a late callback can never resolve twice.
pub struct Resolver<T> {
    resolved: AtomicBool,
    sender: Mutex<Option<oneshot::Sender<T>>>,
}

impl<T> Resolver<T> {
    pub fn new(sender: oneshot::Sender<T>) -> Self {
        Self {
            resolved: AtomicBool::new(false),
            sender: Mutex::new(Some(sender)),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.load(Ordering::Acquire)
    }

    fn claim(&self) -> bool {
        !self.resolved.swap(true, Ordering::AcqRel)
    }

    /// Deliver `value`. Returns true only if it reached a live receiver;
    /// otherwise the value is dropped here.
    pub fn resolve(&self, value: T) -> bool {
        if !self.claim() {
            return false;
        }
        match self.sender.lock().take() {
            Some(sender) => sender.send(value).is_ok(),
            None => false,
        }
    }

    /// Mark resolved without delivering anything.
    pub fn cancel(&self) -> bool {
        let claimed = self.claim();
        self.sender.lock().take();
        claimed
    }
}

/// Pulls usable frames out of one image reader.
///
/// Cloning shares the reader and its warmed-up flag.
#[derive(Clone)]
pub struct FrameAcquirer {
    reader: Arc<dyn ImageReader>,
    pool: BitmapPool,
    diagnostics: Arc<dyn DiagnosticsSink>,
    warmed_up: Arc<AtomicBool>,
}

impl FrameAcquirer {
    pub fn new(
        reader: Arc<dyn ImageReader>,
        pool: BitmapPool,
        diagnostics: Arc<dyn DiagnosticsSink>,
    ) -> Self {
        Self {
            reader,
            pool,
            diagnostics,
            warmed_up: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn reader(&self) -> &Arc<dyn ImageReader> {
        &self.reader
    }

    /// Whether a real frame has already come through this reader.
    pub fn is_warmed_up(&self) -> bool {
        self.warmed_up.load(Ordering::Acquire)
    }

    /// Wait for a frame that is not whole black.
    ///
    /// Resolves with `Ok(None)` once more than `max_black_retry` black frames
    /// arrived. Dropping the future detaches the listener.
    pub async fn acquire(&self, options: AcquireOptions) -> Acquisition {
        if options.keep_session && self.is_warmed_up() {
            debug!("Reader is warmed up, acquiring latest image directly");
            return self.acquire_latest(options).map(Some);
        }

        let (sender, receiver) = oneshot::channel();
        let resolver = Arc::new(Resolver::new(sender));

        self.reader
            .set_on_image_available(Some(self.listener(Arc::clone(&resolver), options)))?;
        let _guard = ListenerGuard {
            reader: self.reader.as_ref(),
            resolver: resolver.as_ref(),
            diagnostics: self.diagnostics.as_ref(),
        };

        trace!("Waiting for image-available callback");
        receiver.await.map_err(|_| CaptureError::Cancelled)?
    }

    fn acquire_latest(&self, options: AcquireOptions) -> CaptureResult<PooledBitmap> {
        let image = self
            .reader
            .acquire_latest_image()?
            .ok_or(CaptureError::NoImageData)?;
        let decoded = decode_plane(
            image.plane(),
            options.screen,
            options.format,
            &self.pool,
            self.diagnostics.as_ref(),
        );
        close_image(image, self.diagnostics.as_ref());
        decoded
    }

    fn listener(
        &self,
        resolver: Arc<Resolver<Acquisition>>,
        options: AcquireOptions,
    ) -> ImageAvailableListener {
        let pool = self.pool.clone();
        let diagnostics = Arc::clone(&self.diagnostics);
        let warmed_up = Arc::clone(&self.warmed_up);
        let black_frames = AtomicU32::new(0);

        Arc::new(move |reader: &dyn ImageReader| {
            if resolver.is_resolved() {
                detach_listener(reader, diagnostics.as_ref());
                return;
            }

            let image = match reader.acquire_latest_image() {
                Ok(Some(image)) => image,
                Ok(None) => {
                    trace!("Image available but nothing queued");
                    return;
                }
                Err(e) => {
                    warn!("Error when acquiring image: {}", e);
                    detach_listener(reader, diagnostics.as_ref());
                    resolver.resolve(Err(e));
                    return;
                }
            };

            let decoded = decode_plane(
                image.plane(),
                options.screen,
                options.format,
                &pool,
                diagnostics.as_ref(),
            );
            close_image(image, diagnostics.as_ref());

            let bitmap = match decoded {
                Ok(bitmap) => bitmap,
                Err(e) => {
                    warn!("Error when decoding image: {}", e);
                    detach_listener(reader, diagnostics.as_ref());
                    resolver.resolve(Err(e));
                    return;
                }
            };

            if !bitmap.is_whole_black() {
                detach_listener(reader, diagnostics.as_ref());
                if resolver.resolve(Ok(Some(bitmap))) && options.keep_session {
                    warmed_up.store(true, Ordering::Release);
                }
                return;
            }

            // Back to the pool before waiting for the next one.
            drop(bitmap);
            let seen = black_frames.load(Ordering::Acquire);
            info!(seen, "Image is whole black");
            if seen >= options.max_black_retry {
                detach_listener(reader, diagnostics.as_ref());
                resolver.resolve(Ok(None));
            } else {
                black_frames.store(seen + 1, Ordering::Release);
            }
        })
    }
}

/// Cancels the resolver and detaches the listener when the awaiting future
/// completes or is dropped.
struct ListenerGuard<'a> {
    reader: &'a dyn ImageReader,
    resolver: &'a Resolver<Acquisition>,
    diagnostics: &'a dyn DiagnosticsSink,
}

impl Drop for ListenerGuard<'_> {
    fn drop(&mut self) {
        if self.resolver.cancel() {
            warn!("Frame acquisition cancelled");
        }
        detach_listener(self.reader, self.diagnostics);
    }
}

fn detach_listener(reader: &dyn ImageReader, diagnostics: &dyn DiagnosticsSink) {
    if let Err(e) = reader.set_on_image_available(None) {
        diagnostics.report(Anomaly::ListenerDetachFailed(e.to_string()));
    }
}

fn close_image(image: Box<dyn Image>, diagnostics: &dyn DiagnosticsSink) {
    if let Err(e) = image.close() {
        diagnostics.report(Anomaly::ImageCloseFailed(e.to_string()));
    }
}
