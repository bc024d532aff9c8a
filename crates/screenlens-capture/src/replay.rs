//! A capture platform that replays scripted frames.
//!
//! Frames are served in script order from a background thread, the same way
//! a real reader fires its image-available callback from the platform's
//! worker thread. The last frame repeats once the script runs dry unless
//! repetition is turned off. Lifecycle calls are counted in
//! [`ReplayStats`].

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use screenlens_ipc::{CaptureToken, ScreenSize};
use tracing::{debug, trace};

use crate::error::CaptureError;
use crate::format::PixelFormat;
use crate::platform::{
    CapturePlatform, DisplayMetrics, Image, ImageAvailableListener, ImageReader, Plane,
    Projection, ProjectionEvent, ProjectionListener, SurfaceId, VirtualDisplay,
};
use crate::CaptureResult;

/// Delay between two image-available callbacks.
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(5);

/// One scripted frame as the reader would hand it out.
#[derive(Debug, Clone)]
pub struct ReplayFrame {
    pub row_stride: usize,
    pub pixel_stride: usize,
    pub data: Bytes,
}

impl ReplayFrame {
    /// Tightly packed 4-byte pixels. `None` if `data` is too short.
    pub fn from_rgba(width: u32, height: u32, data: impl Into<Bytes>) -> Option<Self> {
        let data = data.into();
        let row_stride = width as usize * 4;
        if data.len() < row_stride * height as usize {
            return None;
        }
        Some(Self {
            row_stride,
            pixel_stride: 4,
            data,
        })
    }

    /// Every pixel set to `rgba`, each row followed by `padding_px` pixels
    /// of garbage.
    pub fn solid(size: ScreenSize, rgba: [u8; 4], padding_px: u32) -> Self {
        let row_px = (size.width + padding_px) as usize;
        let mut data = Vec::with_capacity(row_px * 4 * size.height as usize);
        for _ in 0..size.height {
            for _ in 0..size.width {
                data.extend_from_slice(&rgba);
            }
            for _ in 0..padding_px {
                data.extend_from_slice(&[0xee; 4]);
            }
        }
        Self {
            row_stride: row_px * 4,
            pixel_stride: 4,
            data: Bytes::from(data),
        }
    }

    /// A whole-black frame.
    pub fn black(size: ScreenSize) -> Self {
        Self::solid(size, [0; 4], 0)
    }
}

/// Counters of platform calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub projections_opened: u32,
    pub projections_stopped: u32,
    pub readers_created: u32,
    pub readers_closed: u32,
    pub displays_created: u32,
    pub displays_released: u32,
    pub display_resizes: u32,
    pub surfaces_set: u32,
    pub listeners_installed: u32,
    pub listeners_cleared: u32,
    pub images_acquired: u32,
    pub images_closed: u32,
    pub callbacks_fired: u32,
}

#[derive(Debug, Default)]
struct Script {
    frames: VecDeque<ReplayFrame>,
    last: Option<ReplayFrame>,
    repeat_last: bool,
    pending_error: Option<String>,
}

impl Script {
    fn has_frame(&self) -> bool {
        !self.frames.is_empty() || (self.repeat_last && self.last.is_some())
    }

    fn next(&mut self) -> Option<ReplayFrame> {
        match self.frames.pop_front() {
            Some(frame) => {
                self.last = Some(frame.clone());
                Some(frame)
            }
            None if self.repeat_last => self.last.clone(),
            None => None,
        }
    }
}

struct Shared {
    script: Mutex<Script>,
    stats: Mutex<ReplayStats>,
    metrics: Mutex<DisplayMetrics>,
    frame_interval: Mutex<Duration>,
    next_surface: AtomicU64,
}

/// Scriptable [`CapturePlatform`].
#[derive(Clone)]
pub struct ReplayPlatform {
    shared: Arc<Shared>,
}

impl ReplayPlatform {
    pub fn new(metrics: DisplayMetrics) -> Self {
        Self {
            shared: Arc::new(Shared {
                script: Mutex::new(Script {
                    repeat_last: true,
                    ..Script::default()
                }),
                stats: Mutex::new(ReplayStats::default()),
                metrics: Mutex::new(metrics),
                frame_interval: Mutex::new(DEFAULT_FRAME_INTERVAL),
                next_surface: AtomicU64::new(1),
            }),
        }
    }

    /// Queue a frame behind the ones already scripted.
    pub fn push_frame(&self, frame: ReplayFrame) {
        self.shared.script.lock().frames.push_back(frame);
    }

    /// Queue `count` whole-black frames of the current screen size.
    pub fn push_black_frames(&self, count: u32) {
        let size = self.shared.metrics.lock().size;
        let mut script = self.shared.script.lock();
        for _ in 0..count {
            script.frames.push_back(ReplayFrame::black(size));
        }
    }

    /// Whether the last frame keeps being served once the script is empty.
    pub fn set_repeat_last(&self, repeat: bool) {
        self.shared.script.lock().repeat_last = repeat;
    }

    /// Make the next image acquisition fail with `message`.
    pub fn fail_next_acquire(&self, message: impl Into<String>) {
        self.shared.script.lock().pending_error = Some(message.into());
    }

    pub fn set_metrics(&self, metrics: DisplayMetrics) {
        *self.shared.metrics.lock() = metrics;
    }

    pub fn set_frame_interval(&self, interval: Duration) {
        *self.shared.frame_interval.lock() = interval;
    }

    pub fn stats(&self) -> ReplayStats {
        *self.shared.stats.lock()
    }
}

impl CapturePlatform for ReplayPlatform {
    fn open_projection(
        &self,
        token: &CaptureToken,
        listener: ProjectionListener,
    ) -> CaptureResult<Box<dyn Projection>> {
        if token.0.is_empty() {
            return Err(CaptureError::ProjectionUnavailable);
        }
        self.shared.stats.lock().projections_opened += 1;
        Ok(Box::new(ReplayProjection {
            shared: Arc::clone(&self.shared),
            listener,
            stopped: false,
        }))
    }

    fn new_image_reader(
        &self,
        size: ScreenSize,
        format: PixelFormat,
        max_images: u32,
    ) -> CaptureResult<Arc<dyn ImageReader>> {
        debug!(%size, %format, max_images, "Replay reader created");
        self.shared.stats.lock().readers_created += 1;
        let surface = SurfaceId(self.shared.next_surface.fetch_add(1, Ordering::Relaxed));
        let shared = Arc::clone(&self.shared);
        let reader: Arc<ReplayReader> = Arc::new_cyclic(|this| ReplayReader {
            this: this.clone(),
            shared,
            surface,
            listener: Mutex::new(None),
            generation: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        });
        Ok(reader)
    }

    fn display_metrics(&self) -> DisplayMetrics {
        *self.shared.metrics.lock()
    }
}

struct ReplayProjection {
    shared: Arc<Shared>,
    listener: ProjectionListener,
    stopped: bool,
}

impl Projection for ReplayProjection {
    fn create_virtual_display(
        &mut self,
        name: &str,
        size: ScreenSize,
        density_dpi: u32,
        _surface: SurfaceId,
    ) -> CaptureResult<Box<dyn VirtualDisplay>> {
        if self.stopped {
            return Err(CaptureError::Platform("projection already stopped".to_string()));
        }
        debug!(name, %size, density_dpi, "Replay display created");
        self.shared.stats.lock().displays_created += 1;
        (self.listener)(ProjectionEvent::ContentResized {
            width: size.width,
            height: size.height,
        });
        Ok(Box::new(ReplayDisplay {
            shared: Arc::clone(&self.shared),
        }))
    }

    fn stop(&mut self) -> CaptureResult<()> {
        if !self.stopped {
            self.stopped = true;
            self.shared.stats.lock().projections_stopped += 1;
            (self.listener)(ProjectionEvent::Stopped);
        }
        Ok(())
    }
}

struct ReplayDisplay {
    shared: Arc<Shared>,
}

impl VirtualDisplay for ReplayDisplay {
    fn resize(&mut self, _size: ScreenSize, _density_dpi: u32) -> CaptureResult<()> {
        self.shared.stats.lock().display_resizes += 1;
        Ok(())
    }

    fn set_surface(&mut self, _surface: SurfaceId) -> CaptureResult<()> {
        self.shared.stats.lock().surfaces_set += 1;
        Ok(())
    }

    fn release(&mut self) -> CaptureResult<()> {
        self.shared.stats.lock().displays_released += 1;
        Ok(())
    }
}

struct ReplayReader {
    this: Weak<ReplayReader>,
    shared: Arc<Shared>,
    surface: SurfaceId,
    listener: Mutex<Option<ImageAvailableListener>>,
    generation: AtomicU64,
    closed: AtomicBool,
}

impl ReplayReader {
    /// Fire the listener for every available frame until it is replaced,
    /// cleared or the reader closes.
    fn deliver(reader: Arc<ReplayReader>, generation: u64) {
        loop {
            let interval = *reader.shared.frame_interval.lock();
            thread::sleep(interval);

            if reader.closed.load(Ordering::Acquire)
                || reader.generation.load(Ordering::Acquire) != generation
            {
                break;
            }

            let ready = {
                let script = reader.shared.script.lock();
                script.has_frame() || script.pending_error.is_some()
            };
            if !ready {
                continue;
            }

            let Some(listener) = reader.listener.lock().clone() else {
                break;
            };
            reader.shared.stats.lock().callbacks_fired += 1;
            trace!(generation, "Replay image available");
            listener(reader.as_ref());
        }
    }
}

impl ImageReader for ReplayReader {
    fn surface(&self) -> SurfaceId {
        self.surface
    }

    fn acquire_latest_image(&self) -> CaptureResult<Option<Box<dyn Image>>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(CaptureError::Platform("image reader already closed".to_string()));
        }

        let frame = {
            let mut script = self.shared.script.lock();
            if let Some(message) = script.pending_error.take() {
                return Err(CaptureError::Platform(message));
            }
            script.next()
        };

        Ok(frame.map(|frame| {
            self.shared.stats.lock().images_acquired += 1;
            Box::new(ReplayImage {
                shared: Arc::clone(&self.shared),
                frame,
            }) as Box<dyn Image>
        }))
    }

    fn set_on_image_available(
        &self,
        listener: Option<ImageAvailableListener>,
    ) -> CaptureResult<()> {
        let install = listener.is_some();
        *self.listener.lock() = listener;
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;

        {
            let mut stats = self.shared.stats.lock();
            if install {
                stats.listeners_installed += 1;
            } else {
                stats.listeners_cleared += 1;
            }
        }

        if install {
            if let Some(reader) = self.this.upgrade() {
                thread::spawn(move || Self::deliver(reader, generation));
            }
        }
        Ok(())
    }

    fn close(&self) -> CaptureResult<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.shared.stats.lock().readers_closed += 1;
        }
        Ok(())
    }
}

struct ReplayImage {
    shared: Arc<Shared>,
    frame: ReplayFrame,
}

impl Image for ReplayImage {
    fn plane(&self) -> Plane<'_> {
        Plane {
            row_stride: self.frame.row_stride,
            pixel_stride: self.frame.pixel_stride,
            buffer: &self.frame.data,
        }
    }

    fn close(self: Box<Self>) -> CaptureResult<()> {
        self.shared.stats.lock().images_closed += 1;
        Ok(())
    }
}
