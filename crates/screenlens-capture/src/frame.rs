//! Captured bitmap types.

use bytes::Bytes;

use crate::format::PixelFormat;

/// An immutable, owned bitmap handed to OCR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    /// Packed pixel data, `width * height * bytes_per_pixel` bytes.
    pub data: Bytes,

    /// Width in pixels.
    pub width: u32,

    /// Height in pixels.
    pub height: u32,

    /// Pixel layout of `data`.
    pub format: PixelFormat,
}

impl Bitmap {
    /// Create a bitmap, checking that the buffer matches the dimensions.
    pub fn new(data: Bytes, width: u32, height: u32, format: PixelFormat) -> Option<Self> {
        if data.len() != Self::buffer_size(width, height, format) {
            return None;
        }

        Some(Self {
            data,
            width,
            height,
            format,
        })
    }

    /// Expected buffer size for the given dimensions.
    pub fn buffer_size(width: u32, height: u32, format: PixelFormat) -> usize {
        width as usize * height as usize * format.bytes_per_pixel()
    }

    /// Bytes of one pixel, or `None` outside the bitmap.
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        pixel_at(&self.data, self.width, self.height, self.format, x, y)
    }

    /// Returns true if every channel of every pixel is zero.
    pub fn is_whole_black(&self) -> bool {
        is_whole_black(&self.data)
    }
}

pub(crate) fn pixel_at(
    data: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
    x: u32,
    y: u32,
) -> Option<&[u8]> {
    if x >= width || y >= height {
        return None;
    }
    let bpp = format.bytes_per_pixel();
    let offset = (y as usize * width as usize + x as usize) * bpp;
    data.get(offset..offset + bpp)
}

/// A frame of a mirror that has not rendered yet is all zero bits,
/// alpha included.
pub(crate) fn is_whole_black(data: &[u8]) -> bool {
    data.iter().all(|&byte| byte == 0)
}
