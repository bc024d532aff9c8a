//! Common types used across IPC messages.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle in screen pixels, stored as edges.
///
/// `right` and `bottom` are exclusive, so `width()` is `right - left`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    /// Create a rectangle from its edges.
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Saturates instead of overflowing on extreme edges.
    pub fn width(&self) -> i32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> i32 {
        self.bottom.saturating_sub(self.top)
    }

    /// Returns true if the rectangle has no positive area.
    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    /// Translate the rectangle by the given offsets, or `None` if any edge
    /// leaves the `i32` range.
    pub fn checked_offset(&self, dx: i32, dy: i32) -> Option<Self> {
        Some(Self::new(
            self.left.checked_add(dx)?,
            self.top.checked_add(dy)?,
            self.right.checked_add(dx)?,
            self.bottom.checked_add(dy)?,
        ))
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rect({}, {} - {}, {})",
            self.left, self.top, self.right, self.bottom
        )
    }
}

/// Physical size of the display being mirrored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl ScreenSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for ScreenSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Opaque capture authorization issued by the platform's permission flow.
///
/// The core never inspects the token; it is handed back to the platform
/// when a projection is opened.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureToken(pub String);

impl fmt::Debug for CaptureToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CaptureToken(..)")
    }
}

/// Text recognition backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OcrProvider {
    /// On-device ML Kit recognizer.
    #[default]
    GoogleMlKit,

    /// Tesseract with downloaded trained data.
    Tesseract,
}

/// Translation backend selected by the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TranslationProviderType {
    /// On-device ML Kit translation.
    #[default]
    GoogleMlKit,

    /// Microsoft Azure Translator REST API.
    MicrosoftAzure,

    /// MyMemory REST API.
    MyMemory,

    /// Hand the text to the Google Translate app.
    GoogleTranslateApp,

    /// Hand the text to the Bing Translator app.
    BingTranslateApp,

    /// Hand the text to the Papago app.
    PapagoTranslateApp,

    /// Hand the text to the Yandex Translate app.
    YandexTranslateApp,

    /// Hand the text to any app accepting a text share.
    OtherTranslateApp,

    /// Recognize only, never translate.
    OcrOnly,
}

impl TranslationProviderType {
    /// Returns true if the provider produces a translation in-process.
    ///
    /// External-app providers and `OcrOnly` finish with the recognized text
    /// alone.
    pub fn translates_in_process(self) -> bool {
        matches!(
            self,
            Self::GoogleMlKit | Self::MicrosoftAzure | Self::MyMemory
        )
    }
}

/// Presentation state of the floating main bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MainBarState {
    /// Whether the bar is drawn at all.
    pub draw_main_bar: bool,

    /// Language label, e.g. `"en>ja"`.
    pub lang_text: String,

    pub display_select_button: bool,
    pub display_translate_button: bool,
    pub display_close_button: bool,

    /// Whether the overflow menu is open.
    pub display_menu: bool,
}

impl Default for MainBarState {
    fn default() -> Self {
        Self {
            draw_main_bar: true,
            lang_text: String::new(),
            display_select_button: false,
            display_translate_button: false,
            display_close_button: false,
            display_menu: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_geometry() {
        let rect = Rect::new(10, 20, 50, 80);
        assert_eq!(rect.width(), 40);
        assert_eq!(rect.height(), 60);
        assert!(!rect.is_empty());
        assert_eq!(rect.checked_offset(5, -5), Some(Rect::new(15, 15, 55, 75)));
    }

    #[test]
    fn inverted_rect_is_empty() {
        assert!(Rect::new(50, 50, 10, 80).is_empty());
        assert!(Rect::new(0, 0, 10, 0).is_empty());
    }

    #[test]
    fn extreme_edges_do_not_overflow() {
        let rect = Rect::new(i32::MIN, i32::MIN, i32::MAX, i32::MAX);
        assert_eq!(rect.width(), i32::MAX);
        assert_eq!(rect.height(), i32::MAX);
        assert!(!rect.is_empty());

        let near_edge = Rect::new(10, 0, 20, 10);
        assert_eq!(near_edge.checked_offset(i32::MAX - 5, 0), None);
        assert_eq!(
            near_edge.checked_offset(0, i32::MIN),
            Some(Rect::new(10, i32::MIN, 20, i32::MIN + 10))
        );
    }

    #[test]
    fn token_debug_hides_contents() {
        let token = CaptureToken("secret-grant".to_string());
        assert_eq!(format!("{token:?}"), "CaptureToken(..)");
    }

    #[test]
    fn provider_classification() {
        assert!(TranslationProviderType::MyMemory.translates_in_process());
        assert!(!TranslationProviderType::OcrOnly.translates_in_process());
    }
}
