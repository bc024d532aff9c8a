//! Error types for the engine.

use screenlens_capture::CaptureError;
use thiserror::Error;

use crate::translator::TranslationError;

/// Navigation requests the state machine refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavigationError {
    /// The target is not reachable from the current state.
    #[error("Illegal transition from {from} to {to}")]
    IllegalTransition {
        from: &'static str,
        to: &'static str,
    },

    /// A guarded operation was attempted outside its allowed states.
    #[error("Operation not allowed in state {current}")]
    IllegalState { current: &'static str },
}

/// Result type for navigation operations.
pub type NavigationResult<T> = Result<T, NavigationError>;

/// Failures of a text recognizer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecognitionError {
    #[error("Language {0} is not supported by the recognizer")]
    UnsupportedLanguage(String),

    #[error("Recognition failed: {0}")]
    Failed(String),
}

/// Errors surfaced by the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Navigation(#[from] NavigationError),

    #[error(transparent)]
    Recognition(#[from] RecognitionError),

    #[error(transparent)]
    Translation(#[from] TranslationError),

    /// The worker runtime could not be built.
    #[error("Failed to start worker runtime: {0}")]
    Runtime(#[from] std::io::Error),

    /// A worker task panicked or was cancelled.
    #[error("Worker task failed: {0}")]
    Worker(String),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    /// Message suitable for the error dialog.
    ///
    /// Capture errors use their own wording; provider failures carry the
    /// provider's detail.
    pub fn user_message(&self) -> String {
        match self {
            Self::Capture(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}
