//! Navigation state machine types.

use serde::{Deserialize, Serialize};

use crate::types::{OcrProvider, Rect, TranslationProviderType};

/// The region the user circled, as reported by the circling overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    /// Placement of the circling overlay on screen.
    pub parent_rect: Rect,

    /// User-drawn rectangle, relative to `parent_rect`.
    pub selected_rect: Rect,
}

/// Text recognized from a captured region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionResult {
    /// Language code the recognizer ran with.
    pub lang: String,

    /// Recognized text.
    pub text: String,
}

/// The current navigation state of the overlay.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum NavState {
    /// Only the main bar is shown.
    #[default]
    Idle,

    /// The circling overlay is up and waiting for a drag.
    ScreenCircling,

    /// A region has been drawn and awaits confirmation.
    ScreenCircled { selection: Selection },

    /// A frame is being captured.
    ScreenCapturing {
        selection: Selection,
        ocr_provider: OcrProvider,
        ocr_lang: String,
    },

    /// The cropped region is being recognized.
    TextRecognizing {
        selection: Selection,
        ocr_provider: OcrProvider,
        ocr_lang: String,
    },

    /// Recognized text is being translated.
    TextTranslating {
        recognized: RecognitionResult,
        provider: TranslationProviderType,
    },

    /// Result is on screen.
    ResultDisplaying {
        recognized: RecognitionResult,
        /// `None` when the provider does not translate in-process.
        translated: Option<String>,
        provider: TranslationProviderType,
    },

    /// An error dialog is on screen.
    ErrorDisplaying { message: String },
}

impl NavState {
    /// Returns the data-free discriminant of this state.
    pub fn kind(&self) -> NavStateKind {
        match self {
            Self::Idle => NavStateKind::Idle,
            Self::ScreenCircling => NavStateKind::ScreenCircling,
            Self::ScreenCircled { .. } => NavStateKind::ScreenCircled,
            Self::ScreenCapturing { .. } => NavStateKind::ScreenCapturing,
            Self::TextRecognizing { .. } => NavStateKind::TextRecognizing,
            Self::TextTranslating { .. } => NavStateKind::TextTranslating,
            Self::ResultDisplaying { .. } => NavStateKind::ResultDisplaying,
            Self::ErrorDisplaying { .. } => NavStateKind::ErrorDisplaying,
        }
    }

    /// Returns a simple string representation of the state.
    pub fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// Returns the selection the state carries, if any.
    pub fn selection(&self) -> Option<&Selection> {
        match self {
            Self::ScreenCircled { selection }
            | Self::ScreenCapturing { selection, .. }
            | Self::TextRecognizing { selection, .. } => Some(selection),
            _ => None,
        }
    }
}

/// Discriminant of [`NavState`], used by the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NavStateKind {
    Idle,
    ScreenCircling,
    ScreenCircled,
    ScreenCapturing,
    TextRecognizing,
    TextTranslating,
    ResultDisplaying,
    ErrorDisplaying,
}

impl NavStateKind {
    /// Every kind, in declaration order.
    pub const ALL: [NavStateKind; 8] = [
        Self::Idle,
        Self::ScreenCircling,
        Self::ScreenCircled,
        Self::ScreenCapturing,
        Self::TextRecognizing,
        Self::TextTranslating,
        Self::ResultDisplaying,
        Self::ErrorDisplaying,
    ];

    /// States reachable from this one in a single transition.
    pub fn allowed_next(self) -> &'static [NavStateKind] {
        match self {
            Self::Idle => &[Self::ScreenCircling],
            Self::ScreenCircling => &[Self::Idle, Self::ScreenCircled],
            Self::ScreenCircled => &[Self::Idle, Self::ScreenCapturing],
            Self::ScreenCapturing => &[Self::TextRecognizing, Self::ErrorDisplaying],
            Self::TextRecognizing => &[Self::TextTranslating, Self::ErrorDisplaying],
            Self::TextTranslating => &[Self::ResultDisplaying, Self::ErrorDisplaying],
            Self::ResultDisplaying => &[Self::Idle],
            Self::ErrorDisplaying => &[Self::Idle],
        }
    }

    /// Returns true if `target` is reachable in one transition.
    pub fn can_transition_to(self, target: NavStateKind) -> bool {
        self.allowed_next().contains(&target)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::ScreenCircling => "ScreenCircling",
            Self::ScreenCircled => "ScreenCircled",
            Self::ScreenCapturing => "ScreenCapturing",
            Self::TextRecognizing => "TextRecognizing",
            Self::TextTranslating => "TextTranslating",
            Self::ResultDisplaying => "ResultDisplaying",
            Self::ErrorDisplaying => "ErrorDisplaying",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_state_may_stay_in_place() {
        for kind in NavStateKind::ALL {
            assert!(!kind.can_transition_to(kind), "{kind:?} loops to itself");
        }
    }

    #[test]
    fn every_state_can_reach_idle_eventually() {
        for start in NavStateKind::ALL {
            let mut frontier = vec![start];
            let mut seen = vec![start];
            while let Some(kind) = frontier.pop() {
                for next in kind.allowed_next() {
                    if !seen.contains(next) {
                        seen.push(*next);
                        frontier.push(*next);
                    }
                }
            }
            assert!(
                start == NavStateKind::Idle || seen.contains(&NavStateKind::Idle),
                "{start:?} cannot return to Idle"
            );
        }
    }

    #[test]
    fn kind_matches_payload_variant() {
        let state = NavState::ErrorDisplaying {
            message: "boom".to_string(),
        };
        assert_eq!(state.kind(), NavStateKind::ErrorDisplaying);
        assert_eq!(state.name(), "ErrorDisplaying");
        assert!(state.selection().is_none());
    }
}
