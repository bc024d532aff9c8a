//! Pixel format codes and their persistence.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Platform pixel format code used when creating an image reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PixelFormat(pub i32);

impl PixelFormat {
    /// 32-bit RGBA, 8 bits per channel.
    pub const RGBA_8888: PixelFormat = PixelFormat(1);

    /// 32-bit RGBX, alpha ignored.
    pub const RGBX_8888: PixelFormat = PixelFormat(2);

    /// 32-bit BGRA, 8 bits per channel.
    pub const BGRA_8888: PixelFormat = PixelFormat(5);

    /// Bytes per pixel of the first plane. Every format the mirror can emit
    /// is packed 32-bit.
    pub const fn bytes_per_pixel(self) -> usize {
        4
    }
}

impl Default for PixelFormat {
    fn default() -> Self {
        Self::RGBA_8888
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

fn format_mismatch_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"producer output buffer format 0x([0-9a-fA-F]+)")
            .expect("format mismatch pattern is valid")
    })
}

/// Extract the producer's format from a reader format-mismatch message.
///
/// Returns `None` when the message is not a format mismatch.
pub fn parse_format_mismatch(message: &str) -> Option<PixelFormat> {
    let captures = format_mismatch_regex().captures(message)?;
    let code = i32::from_str_radix(captures.get(1)?.as_str(), 16).ok()?;
    Some(PixelFormat(code))
}

/// Persists the image reader format across sessions.
pub trait FormatStore: Send + Sync {
    /// Format to create the next reader with.
    fn load(&self) -> PixelFormat;

    /// Remember a corrected format.
    fn store(&self, format: PixelFormat) -> std::io::Result<()>;
}

/// In-memory store, for tests and ephemeral hosts.
#[derive(Debug, Default)]
pub struct MemoryFormatStore {
    format: Mutex<PixelFormat>,
}

impl MemoryFormatStore {
    pub fn new(format: PixelFormat) -> Self {
        Self {
            format: Mutex::new(format),
        }
    }
}

impl FormatStore for MemoryFormatStore {
    fn load(&self) -> PixelFormat {
        *self.format.lock()
    }

    fn store(&self, format: PixelFormat) -> std::io::Result<()> {
        *self.format.lock() = format;
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct FormatFile {
    image_reader_format: PixelFormat,
}

/// Store backed by a small JSON file.
#[derive(Debug)]
pub struct JsonFormatStore {
    path: PathBuf,
    cached: Mutex<PixelFormat>,
}

impl JsonFormatStore {
    /// Open the store, reading the current value if the file exists.
    ///
    /// An unreadable file is logged and treated as the default format.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let format = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<FormatFile>(&contents) {
                Ok(file) => file.image_reader_format,
                Err(e) => {
                    warn!(path = %path.display(), "Ignoring unreadable format file: {}", e);
                    PixelFormat::default()
                }
            },
            Err(_) => PixelFormat::default(),
        };

        debug!(path = %path.display(), %format, "Opened format store");

        Self {
            path,
            cached: Mutex::new(format),
        }
    }
}

impl FormatStore for JsonFormatStore {
    fn load(&self) -> PixelFormat {
        *self.cached.lock()
    }

    fn store(&self, format: PixelFormat) -> std::io::Result<()> {
        let mut cached = self.cached.lock();
        let contents = serde_json::to_string_pretty(&FormatFile {
            image_reader_format: format,
        })?;
        std::fs::write(&self.path, contents)?;
        *cached = format;
        Ok(())
    }
}
