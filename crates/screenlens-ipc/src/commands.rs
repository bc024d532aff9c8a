//! Commands sent from the UI to the engine.

use serde::{Deserialize, Serialize};

use crate::types::{CaptureToken, OcrProvider, Rect, TranslationProviderType};

/// User-level navigation requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NavigationAction {
    /// Open the circling overlay.
    NavigateToScreenCircling,

    /// The user finished drawing a region.
    NavigateToScreenCircled { parent_rect: Rect, selected_rect: Rect },

    /// Close the circling overlay without capturing.
    CancelScreenCircling,

    /// Capture the circled region and recognize it.
    NavigateToScreenCapturing {
        ocr_provider: OcrProvider,
        ocr_lang: String,
    },

    /// Dismiss the result or error and return to idle.
    NavigateToIdle,
}

/// Buttons on the main bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MainBarButton {
    /// Start circling.
    Select,

    /// Capture the circled region with the current OCR language.
    Translate,

    /// Cancel circling.
    Close,

    /// The language label.
    LanguageBlock,
}

/// Commands that the UI can send to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EngineCommand {
    /// Store a capture grant from the permission flow.
    Grant {
        token: CaptureToken,
        /// Keep the platform session alive between captures.
        keep_session: bool,
    },

    /// Drive the navigation state machine.
    Navigate(NavigationAction),

    /// Attach the main bar.
    ShowMainBar,

    /// Detach the main bar.
    HideMainBar,

    /// An item of the main bar menu was picked (`None` closes the menu).
    MainBarMenuItem(Option<String>),

    /// Open the main bar menu.
    OpenMainBarMenu,

    /// A main bar button was clicked.
    MainBarClicked(MainBarButton),

    /// The user picked new languages or providers.
    SetLanguages {
        ocr_provider: OcrProvider,
        ocr_lang: String,
        translation_provider: TranslationProviderType,
        translation_lang: String,
    },

    /// Return to idle and detach every overlay.
    DetachAll,

    /// Drop the capture grant and release its resources.
    ReleaseCapture,

    /// Request the current navigation state.
    GetState,

    /// Shutdown the engine completely.
    Shutdown,
}
