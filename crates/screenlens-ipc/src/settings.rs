//! User settings read by the engine.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{OcrProvider, TranslationProviderType};

/// Errors raised while loading or saving settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Reading or writing the settings file failed.
    #[error("Settings IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The settings file is not valid JSON for [`Settings`].
    #[error("Invalid settings file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Settings consumed by the capture and overlay core.
///
/// Unknown or missing keys fall back to their defaults, so older files keep
/// loading after new settings are added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Upper bound for a single screen capture, in milliseconds.
    pub capture_timeout_ms: u64,

    /// Keep the platform capture session alive between captures.
    pub keep_capture_session: bool,

    /// Fade the main bar out after it stops being used.
    pub enable_fade_out_while_idle: bool,

    /// Delay before the main bar fades out, in milliseconds.
    pub fade_out_delay_ms: u64,

    /// Opacity the main bar fades to (0.0 - 1.0).
    pub fade_out_alpha: f32,

    pub ocr_provider: OcrProvider,

    /// Language the recognizer runs with.
    pub ocr_lang: String,

    pub translation_provider: TranslationProviderType,

    /// Target language for translation.
    pub translation_lang: String,

    /// Contact address sent to MyMemory to raise the anonymous quota.
    pub my_memory_email: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            capture_timeout_ms: 5000,
            keep_capture_session: true,
            enable_fade_out_while_idle: true,
            fade_out_delay_ms: 5000,
            fade_out_alpha: 0.2,
            ocr_provider: OcrProvider::default(),
            ocr_lang: "en".to_string(),
            translation_provider: TranslationProviderType::default(),
            translation_lang: "en".to_string(),
            my_memory_email: None,
        }
    }
}

impl Settings {
    /// Load settings from a JSON file, or defaults if it does not exist.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&contents)?;
        Ok(settings.sanitized())
    }

    /// Save settings to a JSON file.
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Clamp out-of-range values into their valid ranges.
    pub fn sanitized(mut self) -> Self {
        self.capture_timeout_ms = self.capture_timeout_ms.max(1);
        self.fade_out_alpha = if self.fade_out_alpha.is_finite() {
            self.fade_out_alpha.clamp(0.0, 1.0)
        } else {
            Self::default().fade_out_alpha
        };
        self
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_timeout_ms)
    }

    pub fn fade_out_delay(&self) -> Duration {
        Duration::from_millis(self.fade_out_delay_ms)
    }
}
