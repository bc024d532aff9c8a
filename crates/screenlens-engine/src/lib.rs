//! Core engine for screenlens.
//!
//! This crate owns the floating-window state machine, coordinates the
//! overlay windows, and runs capture, recognition and translation jobs
//! behind a single command loop.

mod coordinator;
mod diagnostics;
mod error;
mod jobs;
mod main_bar;
mod navigator;
mod operator;
mod orchestrator;
mod providers;
mod translator;

pub use coordinator::{ErrorPresenter, OverlayWindow, OverlayWindows, WindowCoordinator};
pub use diagnostics::{DiagnosticsCollector, DiagnosticsSnapshot};
pub use error::{
    EngineError, EngineResult, NavigationError, NavigationResult, RecognitionError,
};
pub use jobs::{JobReport, JobRunner};
pub use main_bar::{lang_text, menu, FadeOutPolicy, MainBarPresenter, MenuLinks};
pub use navigator::{StateNavigator, Transition};
pub use operator::{JobOutcome, JobRequest, Reaction, StateOperator};
pub use orchestrator::{Engine, EngineDeps};
pub use providers::{TextRecognizer, Translator, TranslatorRegistry};
pub use translator::{
    interpret_my_memory_response, my_memory_url, HttpResponse, HttpTransport,
    MyMemoryTranslator, TranslationError, MY_MEMORY_ENDPOINT,
};

use crossbeam_channel::{Receiver, Sender};
use screenlens_ipc::{EngineCommand, EngineEvent};

/// Create an engine instance with IPC channels.
pub fn create_engine(
    command_rx: Receiver<EngineCommand>,
    event_tx: Sender<EngineEvent>,
    deps: EngineDeps,
) -> EngineResult<Engine> {
    Engine::new(command_rx, event_tx, deps)
}
