//! Typed UI<->Engine messages for screenlens.
//!
//! This crate defines the navigation state, the commands the UI sends to the
//! engine, the events the engine publishes back, and the value types shared
//! between the capture and engine crates.

mod commands;
mod events;
mod settings;
mod state;
mod types;

pub use commands::{EngineCommand, MainBarButton, NavigationAction};
pub use events::{EngineEvent, MainBarAction, OverlayIntent};
pub use settings::{Settings, SettingsError};
pub use state::{NavState, NavStateKind, RecognitionResult, Selection};
pub use types::{
    CaptureToken, MainBarState, OcrProvider, Rect, ScreenSize, TranslationProviderType,
};

use crossbeam_channel::{Receiver, Sender};

/// Channel capacity for commands (UI → Engine).
pub const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Channel capacity for events (Engine → UI).
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Creates a bounded command channel.
pub fn command_channel() -> (Sender<EngineCommand>, Receiver<EngineCommand>) {
    crossbeam_channel::bounded(COMMAND_CHANNEL_CAPACITY)
}

/// Creates a bounded event channel.
pub fn event_channel() -> (Sender<EngineEvent>, Receiver<EngineEvent>) {
    crossbeam_channel::bounded(EVENT_CHANNEL_CAPACITY)
}
