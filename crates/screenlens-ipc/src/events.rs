//! Events sent from the engine to the UI.

use serde::{Deserialize, Serialize};

use crate::state::NavState;
use crate::types::MainBarState;

/// Window-level intents emitted as navigation progresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverlayIntent {
    /// Raise the main bar above the other overlays.
    TopMainBar,
    ShowScreenCirclingView,
    HideScreenCirclingView,
    ShowResultView,
    HideResultView,
    ShowErrorDialog { message: String },
}

/// Main bar actions that the host must carry out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MainBarAction {
    RescheduleFadeOut,
    MoveToEdgeIfEnabled,
    OpenLanguageSelectionPanel,
    OpenSettings,
    OpenBrowser { url: String },
    OpenVersionHistory,
    OpenReadme,
    HideMainBar,
    ExitApp,
    ShowMenu,
    HideMenu,
}

/// Events that the engine can send to the UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EngineEvent {
    /// Navigation state has changed.
    StateChanged {
        /// Previous state.
        previous: Box<NavState>,

        /// Current state.
        current: Box<NavState>,
    },

    /// An overlay intent was applied.
    Overlay(OverlayIntent),

    /// The main bar was attached (`true`) or detached (`false`).
    MainBarVisibility(bool),

    /// Updated main bar presentation.
    MainBar(MainBarState),

    /// The main bar asks the host to do something.
    MainBarAction(MainBarAction),

    /// Error occurred.
    Error {
        /// User-facing message.
        message: String,
    },

    /// Engine is ready.
    Ready,

    /// Engine has shut down.
    Shutdown,
}
