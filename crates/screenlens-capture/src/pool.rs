//! Reusable bitmap buffers.
//!
//! Full-screen frames are large and arrive in bursts while the mirror warms
//! up, so their buffers are recycled. A [`PooledBitmap`] returns its buffer
//! to the pool when dropped, which covers every early-exit path.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::trace;

use crate::format::PixelFormat;
use crate::frame::{self, Bitmap};

/// Buffers are only interchangeable when all three match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BitmapKey {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl BitmapKey {
    fn buffer_size(&self) -> usize {
        Bitmap::buffer_size(self.width, self.height, self.format)
    }
}

/// Free buffers kept per key.
pub const DEFAULT_BUFFERS_PER_KEY: usize = 2;

#[derive(Debug)]
struct PoolInner {
    free: HashMap<BitmapKey, Vec<Vec<u8>>>,
    max_per_key: usize,
    outstanding: usize,
}

impl PoolInner {
    fn release(&mut self, key: BitmapKey, buffer: Vec<u8>) {
        self.outstanding = self.outstanding.saturating_sub(1);
        let free = self.free.entry(key).or_default();
        if free.len() < self.max_per_key {
            free.push(buffer);
        }
    }
}

/// Pool of pixel buffers keyed by (width, height, format).
#[derive(Debug, Clone)]
pub struct BitmapPool {
    inner: Arc<Mutex<PoolInner>>,
}

impl BitmapPool {
    /// Create a pool that keeps at most `max_per_key` free buffers per key.
    pub fn new(max_per_key: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(PoolInner {
                free: HashMap::new(),
                max_per_key,
                outstanding: 0,
            })),
        }
    }

    /// Take a buffer for the given key, reusing a free one if possible.
    ///
    /// Reused buffers keep their old contents; callers overwrite them.
    pub fn acquire(&self, width: u32, height: u32, format: PixelFormat) -> PooledBitmap {
        let key = BitmapKey {
            width,
            height,
            format,
        };

        let mut inner = self.inner.lock();
        inner.outstanding += 1;
        let pixels = match inner.free.get_mut(&key).and_then(Vec::pop) {
            Some(buffer) => {
                trace!(width, height, "Reusing pooled bitmap");
                buffer
            }
            None => vec![0u8; key.buffer_size()],
        };

        PooledBitmap {
            key,
            pixels,
            pool: Arc::downgrade(&self.inner),
        }
    }

    /// Number of free buffers for a key.
    pub fn available(&self, width: u32, height: u32, format: PixelFormat) -> usize {
        let key = BitmapKey {
            width,
            height,
            format,
        };
        self.inner.lock().free.get(&key).map_or(0, Vec::len)
    }

    /// Buffers handed out and not yet returned.
    pub fn outstanding(&self) -> usize {
        self.inner.lock().outstanding
    }
}

impl Default for BitmapPool {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFERS_PER_KEY)
    }
}

/// A bitmap whose buffer belongs to a [`BitmapPool`].
#[derive(Debug)]
pub struct PooledBitmap {
    key: BitmapKey,
    pixels: Vec<u8>,
    pool: Weak<Mutex<PoolInner>>,
}

impl PooledBitmap {
    pub fn width(&self) -> u32 {
        self.key.width
    }

    pub fn height(&self) -> u32 {
        self.key.height
    }

    pub fn format(&self) -> PixelFormat {
        self.key.format
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    /// Bytes of one pixel, or `None` outside the bitmap.
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        frame::pixel_at(
            &self.pixels,
            self.key.width,
            self.key.height,
            self.key.format,
            x,
            y,
        )
    }

    /// Returns true if every channel of every pixel is zero.
    pub fn is_whole_black(&self) -> bool {
        frame::is_whole_black(&self.pixels)
    }

    /// Copy a sub-rectangle into a new pooled bitmap.
    ///
    /// The rectangle must already be clamped to this bitmap.
    pub(crate) fn copy_region(
        &self,
        pool: &BitmapPool,
        left: u32,
        top: u32,
        width: u32,
        height: u32,
    ) -> PooledBitmap {
        debug_assert!(left + width <= self.width() && top + height <= self.height());

        let bpp = self.format().bytes_per_pixel();
        let src_stride = self.width() as usize * bpp;
        let row_len = width as usize * bpp;

        let mut out = pool.acquire(width, height, self.format());
        for (row, dst) in out.pixels.chunks_exact_mut(row_len).enumerate() {
            let start = (top as usize + row) * src_stride + left as usize * bpp;
            dst.copy_from_slice(&self.pixels[start..start + row_len]);
        }
        out
    }

    /// Detach the buffer from the pool and turn it into a [`Bitmap`].
    pub fn into_bitmap(mut self) -> Bitmap {
        let pixels = std::mem::take(&mut self.pixels);
        if let Some(pool) = self.pool.upgrade() {
            let mut inner = pool.lock();
            inner.outstanding = inner.outstanding.saturating_sub(1);
        }
        self.pool = Weak::new();

        Bitmap {
            data: Bytes::from(pixels),
            width: self.key.width,
            height: self.key.height,
            format: self.key.format,
        }
    }
}

impl Drop for PooledBitmap {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.upgrade() {
            let buffer = std::mem::take(&mut self.pixels);
            pool.lock().release(self.key, buffer);
        }
    }
}
