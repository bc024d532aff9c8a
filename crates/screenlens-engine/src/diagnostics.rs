//! Anomaly counting.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::warn;

use screenlens_capture::{Anomaly, DiagnosticsSink};

/// Counters at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiagnosticsSnapshot {
    pub format_mismatches: u64,
    pub illegal_crop_bounds: u64,
    pub narrow_buffers: u64,
    pub image_close_failures: u64,
    pub listener_detach_failures: u64,
    pub total: u64,
    pub last_anomaly: Option<String>,
    pub uptime_seconds: u64,
}

/// Counts reported anomalies by kind and logs each one.
pub struct DiagnosticsCollector {
    started: Instant,
    format_mismatches: AtomicU64,
    illegal_crop_bounds: AtomicU64,
    narrow_buffers: AtomicU64,
    image_close_failures: AtomicU64,
    listener_detach_failures: AtomicU64,
    last_anomaly: RwLock<Option<String>>,
}

impl DiagnosticsCollector {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            format_mismatches: AtomicU64::new(0),
            illegal_crop_bounds: AtomicU64::new(0),
            narrow_buffers: AtomicU64::new(0),
            image_close_failures: AtomicU64::new(0),
            listener_detach_failures: AtomicU64::new(0),
            last_anomaly: RwLock::new(None),
        }
    }

    fn counter(&self, anomaly: &Anomaly) -> &AtomicU64 {
        match anomaly {
            Anomaly::FormatMismatch { .. } => &self.format_mismatches,
            Anomaly::IllegalCropBounds { .. } => &self.illegal_crop_bounds,
            Anomaly::NarrowBuffer { .. } => &self.narrow_buffers,
            Anomaly::ImageCloseFailed(_) => &self.image_close_failures,
            Anomaly::ListenerDetachFailed(_) => &self.listener_detach_failures,
        }
    }

    /// Get current counters.
    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        let format_mismatches = self.format_mismatches.load(Ordering::Relaxed);
        let illegal_crop_bounds = self.illegal_crop_bounds.load(Ordering::Relaxed);
        let narrow_buffers = self.narrow_buffers.load(Ordering::Relaxed);
        let image_close_failures = self.image_close_failures.load(Ordering::Relaxed);
        let listener_detach_failures = self.listener_detach_failures.load(Ordering::Relaxed);

        DiagnosticsSnapshot {
            format_mismatches,
            illegal_crop_bounds,
            narrow_buffers,
            image_close_failures,
            listener_detach_failures,
            total: format_mismatches
                + illegal_crop_bounds
                + narrow_buffers
                + image_close_failures
                + listener_detach_failures,
            last_anomaly: self.last_anomaly.read().clone(),
            uptime_seconds: self.started.elapsed().as_secs(),
        }
    }
}

impl Default for DiagnosticsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticsSink for DiagnosticsCollector {
    fn report(&self, anomaly: Anomaly) {
        warn!(kind = anomaly.kind(), "{}", anomaly);
        self.counter(&anomaly).fetch_add(1, Ordering::Relaxed);
        *self.last_anomaly.write() = Some(anomaly.to_string());
    }
}
