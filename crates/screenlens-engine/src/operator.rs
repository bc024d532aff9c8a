//! Turning navigation actions and job results into transitions.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use screenlens_capture::Bitmap;
use screenlens_ipc::{
    NavState, NavStateKind, NavigationAction, OcrProvider, OverlayIntent, RecognitionResult,
    Selection, Settings, TranslationProviderType,
};

use crate::error::{EngineError, NavigationError, NavigationResult};
use crate::navigator::StateNavigator;

/// Work to run off the engine loop.
#[derive(Debug)]
pub enum JobRequest {
    Capture {
        selection: Selection,
    },
    Recognize {
        bitmap: Bitmap,
        ocr_provider: OcrProvider,
        ocr_lang: String,
    },
    Translate {
        recognized: RecognitionResult,
        provider: TranslationProviderType,
        target_lang: String,
    },
}

/// Result of a [`JobRequest`], fed back into the operator.
#[derive(Debug)]
pub enum JobOutcome {
    Captured(Bitmap),
    Recognized(RecognitionResult),
    Translated(String),
    Failed(EngineError),
}

/// What the engine has to do after a successful step.
#[derive(Debug, Default)]
pub struct Reaction {
    pub intents: Vec<OverlayIntent>,
    pub job: Option<JobRequest>,
}

impl Reaction {
    fn intents(intents: Vec<OverlayIntent>) -> Self {
        Self { intents, job: None }
    }

    fn with_job(mut self, job: JobRequest) -> Self {
        self.job = Some(job);
        self
    }
}

/// Drives the navigator through capture, recognition and translation.
pub struct StateOperator {
    navigator: Arc<StateNavigator>,
    translation_provider: TranslationProviderType,
    translation_lang: String,
}

impl StateOperator {
    pub fn new(navigator: Arc<StateNavigator>, settings: &Settings) -> Self {
        Self {
            navigator,
            translation_provider: settings.translation_provider,
            translation_lang: settings.translation_lang.clone(),
        }
    }

    /// Change the translation target used by later recognitions.
    pub fn set_translation(&mut self, provider: TranslationProviderType, lang: impl Into<String>) {
        self.translation_provider = provider;
        self.translation_lang = lang.into();
    }

    /// Apply a user navigation request.
    #[instrument(name = "navigate", skip(self))]
    pub fn navigate(&self, action: NavigationAction) -> NavigationResult<Reaction> {
        use NavStateKind::*;

        match action {
            NavigationAction::NavigateToScreenCircling => {
                self.navigator.state_in(&[Idle])?;
                self.navigator.request_transition(NavState::ScreenCircling)?;
                Ok(Reaction::intents(vec![
                    OverlayIntent::ShowScreenCirclingView,
                    OverlayIntent::TopMainBar,
                ]))
            }
            NavigationAction::NavigateToScreenCircled {
                parent_rect,
                selected_rect,
            } => {
                self.navigator.state_in(&[ScreenCircling])?;
                self.navigator.request_transition(NavState::ScreenCircled {
                    selection: Selection {
                        parent_rect,
                        selected_rect,
                    },
                })?;
                Ok(Reaction::default())
            }
            NavigationAction::CancelScreenCircling => {
                self.navigator.state_in(&[ScreenCircling, ScreenCircled])?;
                self.navigator.request_transition(NavState::Idle)?;
                Ok(Reaction::intents(vec![OverlayIntent::HideScreenCirclingView]))
            }
            NavigationAction::NavigateToScreenCapturing {
                ocr_provider,
                ocr_lang,
            } => {
                let current = self.navigator.state_in(&[ScreenCircled])?;
                let selection = *current.selection().ok_or(NavigationError::IllegalState {
                    current: current.name(),
                })?;
                self.navigator.request_transition(NavState::ScreenCapturing {
                    selection,
                    ocr_provider,
                    ocr_lang,
                })?;
                info!(selection = %selection.selected_rect, "Capturing selection");
                Ok(
                    Reaction::intents(vec![OverlayIntent::HideScreenCirclingView])
                        .with_job(JobRequest::Capture { selection }),
                )
            }
            NavigationAction::NavigateToIdle => {
                self.navigator.state_in(&[
                    ScreenCircling,
                    ScreenCircled,
                    ResultDisplaying,
                    ErrorDisplaying,
                ])?;
                self.navigator.request_transition(NavState::Idle)?;
                Ok(Reaction::intents(vec![
                    OverlayIntent::HideScreenCirclingView,
                    OverlayIntent::HideResultView,
                ]))
            }
        }
    }

    /// Apply the outcome of a finished job.
    pub fn on_job_outcome(&self, outcome: JobOutcome) -> NavigationResult<Reaction> {
        use NavStateKind::*;

        match outcome {
            JobOutcome::Captured(bitmap) => {
                let (selection, ocr_provider, ocr_lang) =
                    match self.navigator.state_in(&[ScreenCapturing])? {
                        NavState::ScreenCapturing {
                            selection,
                            ocr_provider,
                            ocr_lang,
                        } => (selection, ocr_provider, ocr_lang),
                        other => return Err(illegal(&other)),
                    };
                debug!(width = bitmap.width, height = bitmap.height, "Region captured");

                self.navigator.request_transition(NavState::TextRecognizing {
                    selection,
                    ocr_provider,
                    ocr_lang: ocr_lang.clone(),
                })?;
                Ok(
                    Reaction::intents(vec![OverlayIntent::ShowResultView]).with_job(
                        JobRequest::Recognize {
                            bitmap,
                            ocr_provider,
                            ocr_lang,
                        },
                    ),
                )
            }
            JobOutcome::Recognized(recognized) => {
                self.navigator.state_in(&[TextRecognizing])?;
                let provider = self.translation_provider;
                debug!(chars = recognized.text.chars().count(), ?provider, "Text recognized");

                self.navigator.request_transition(NavState::TextTranslating {
                    recognized: recognized.clone(),
                    provider,
                })?;

                if provider.translates_in_process() {
                    return Ok(Reaction::default().with_job(JobRequest::Translate {
                        recognized,
                        provider,
                        target_lang: self.translation_lang.clone(),
                    }));
                }

                // External apps and OCR-only show the recognized text as is.
                self.navigator.request_transition(NavState::ResultDisplaying {
                    recognized,
                    translated: None,
                    provider,
                })?;
                Ok(Reaction::default())
            }
            JobOutcome::Translated(translated) => {
                let (recognized, provider) = match self.navigator.state_in(&[TextTranslating])? {
                    NavState::TextTranslating {
                        recognized,
                        provider,
                    } => (recognized, provider),
                    other => return Err(illegal(&other)),
                };

                self.navigator.request_transition(NavState::ResultDisplaying {
                    recognized,
                    translated: Some(translated),
                    provider,
                })?;
                Ok(Reaction::default())
            }
            JobOutcome::Failed(error) => {
                self.navigator
                    .state_in(&[ScreenCapturing, TextRecognizing, TextTranslating])?;
                let message = error.user_message();
                info!(%message, "Job failed");

                self.navigator.request_transition(NavState::ErrorDisplaying {
                    message: message.clone(),
                })?;
                Ok(Reaction::intents(vec![
                    OverlayIntent::HideResultView,
                    OverlayIntent::ShowErrorDialog { message },
                ]))
            }
        }
    }

    /// Give up on the job in flight. The pipeline fails with `message`
    /// and returns straight to idle; no dialog is shown.
    pub fn abandon_job(&self, message: &str) -> NavigationResult<Reaction> {
        use NavStateKind::*;

        self.navigator
            .state_in(&[ScreenCapturing, TextRecognizing, TextTranslating])?;
        info!(message, "Abandoning job");

        self.navigator.request_transition(NavState::ErrorDisplaying {
            message: message.to_string(),
        })?;
        self.navigator.request_transition(NavState::Idle)?;
        Ok(Reaction::intents(vec![OverlayIntent::HideResultView]))
    }
}

fn illegal(state: &NavState) -> NavigationError {
    NavigationError::IllegalState {
        current: state.name(),
    }
}

#[cfg(test)]
mod tests {
    use screenlens_capture::{BitmapPool, CaptureError, PixelFormat};
    use screenlens_ipc::Rect;

    use super::*;

    fn solid_bitmap() -> Bitmap {
        let pool = BitmapPool::default();
        let mut pooled = pool.acquire(2, 2, PixelFormat::RGBA_8888);
        pooled.pixels_mut().fill(0x7f);
        pooled.into_bitmap()
    }

    fn operator(provider: TranslationProviderType) -> (StateOperator, Arc<StateNavigator>) {
        let navigator = Arc::new(StateNavigator::new());
        let settings = Settings {
            translation_provider: provider,
            translation_lang: "ja".to_string(),
            ..Settings::default()
        };
        (StateOperator::new(Arc::clone(&navigator), &settings), navigator)
    }

    fn circle(operator: &StateOperator) {
        operator
            .navigate(NavigationAction::NavigateToScreenCircling)
            .unwrap();
        operator
            .navigate(NavigationAction::NavigateToScreenCircled {
                parent_rect: Rect::new(0, 0, 100, 100),
                selected_rect: Rect::new(10, 10, 50, 50),
            })
            .unwrap();
    }

    fn recognized() -> RecognitionResult {
        RecognitionResult {
            lang: "en".to_string(),
            text: "hello".to_string(),
        }
    }

    #[test]
    fn circling_shows_overlay_and_raises_main_bar() {
        let (operator, navigator) = operator(TranslationProviderType::MyMemory);

        let reaction = operator
            .navigate(NavigationAction::NavigateToScreenCircling)
            .unwrap();

        assert_eq!(
            reaction.intents,
            vec![OverlayIntent::ShowScreenCirclingView, OverlayIntent::TopMainBar]
        );
        assert_eq!(navigator.current_kind(), NavStateKind::ScreenCircling);
    }

    #[test]
    fn capturing_requests_capture_of_selection() {
        let (operator, navigator) = operator(TranslationProviderType::MyMemory);
        circle(&operator);

        let reaction = operator
            .navigate(NavigationAction::NavigateToScreenCapturing {
                ocr_provider: OcrProvider::GoogleMlKit,
                ocr_lang: "en".to_string(),
            })
            .unwrap();

        assert_eq!(reaction.intents, vec![OverlayIntent::HideScreenCirclingView]);
        match reaction.job {
            Some(JobRequest::Capture { selection }) => {
                assert_eq!(selection.selected_rect, Rect::new(10, 10, 50, 50));
            }
            other => panic!("unexpected job: {other:?}"),
        }
        assert_eq!(navigator.current_kind(), NavStateKind::ScreenCapturing);
    }

    #[test]
    fn capturing_without_selection_is_refused() {
        let (operator, navigator) = operator(TranslationProviderType::MyMemory);

        let result = operator.navigate(NavigationAction::NavigateToScreenCapturing {
            ocr_provider: OcrProvider::GoogleMlKit,
            ocr_lang: "en".to_string(),
        });

        assert_eq!(
            result.err(),
            Some(NavigationError::IllegalState { current: "Idle" })
        );
        assert_eq!(navigator.current_kind(), NavStateKind::Idle);
    }

    #[test]
    fn full_pipeline_with_in_process_translation() {
        let (operator, navigator) = operator(TranslationProviderType::MyMemory);
        circle(&operator);
        operator
            .navigate(NavigationAction::NavigateToScreenCapturing {
                ocr_provider: OcrProvider::Tesseract,
                ocr_lang: "en".to_string(),
            })
            .unwrap();

        let reaction = operator
            .on_job_outcome(JobOutcome::Captured(solid_bitmap()))
            .unwrap();
        assert_eq!(reaction.intents, vec![OverlayIntent::ShowResultView]);
        assert!(matches!(
            reaction.job,
            Some(JobRequest::Recognize {
                ocr_provider: OcrProvider::Tesseract,
                ..
            })
        ));

        let reaction = operator
            .on_job_outcome(JobOutcome::Recognized(recognized()))
            .unwrap();
        match reaction.job {
            Some(JobRequest::Translate { target_lang, .. }) => assert_eq!(target_lang, "ja"),
            other => panic!("unexpected job: {other:?}"),
        }
        assert_eq!(navigator.current_kind(), NavStateKind::TextTranslating);

        operator
            .on_job_outcome(JobOutcome::Translated("こんにちは".to_string()))
            .unwrap();
        assert_eq!(
            navigator.current(),
            NavState::ResultDisplaying {
                recognized: recognized(),
                translated: Some("こんにちは".to_string()),
                provider: TranslationProviderType::MyMemory,
            }
        );
    }

    #[test]
    fn ocr_only_skips_translation() {
        let (operator, navigator) = operator(TranslationProviderType::OcrOnly);
        circle(&operator);
        operator
            .navigate(NavigationAction::NavigateToScreenCapturing {
                ocr_provider: OcrProvider::GoogleMlKit,
                ocr_lang: "en".to_string(),
            })
            .unwrap();
        operator
            .on_job_outcome(JobOutcome::Captured(solid_bitmap()))
            .unwrap();

        let rx = navigator.subscribe();
        let reaction = operator
            .on_job_outcome(JobOutcome::Recognized(recognized()))
            .unwrap();

        assert!(reaction.job.is_none());
        let kinds: Vec<_> = rx.try_iter().map(|t| t.current.kind()).collect();
        assert_eq!(
            kinds,
            vec![NavStateKind::TextTranslating, NavStateKind::ResultDisplaying]
        );
    }

    #[test]
    fn failure_shows_error_dialog() {
        let (operator, navigator) = operator(TranslationProviderType::MyMemory);
        circle(&operator);
        operator
            .navigate(NavigationAction::NavigateToScreenCapturing {
                ocr_provider: OcrProvider::GoogleMlKit,
                ocr_lang: "en".to_string(),
            })
            .unwrap();

        let reaction = operator
            .on_job_outcome(JobOutcome::Failed(CaptureError::NoImageData.into()))
            .unwrap();

        let message = "No image data was captured, please retry".to_string();
        assert_eq!(
            reaction.intents,
            vec![
                OverlayIntent::HideResultView,
                OverlayIntent::ShowErrorDialog {
                    message: message.clone()
                }
            ]
        );
        assert_eq!(navigator.current(), NavState::ErrorDisplaying { message });

        operator.navigate(NavigationAction::NavigateToIdle).unwrap();
        assert_eq!(navigator.current_kind(), NavStateKind::Idle);
    }

    #[test]
    fn stale_outcome_is_ignored() {
        let (operator, navigator) = operator(TranslationProviderType::MyMemory);

        let result = operator.on_job_outcome(JobOutcome::Translated("late".to_string()));

        assert!(result.is_err());
        assert_eq!(navigator.current_kind(), NavStateKind::Idle);
    }

    #[test]
    fn abandoning_a_job_passes_through_error_to_idle() {
        let (operator, navigator) = operator(TranslationProviderType::MyMemory);
        let transitions = navigator.subscribe();
        circle(&operator);
        operator
            .navigate(NavigationAction::NavigateToScreenCapturing {
                ocr_provider: OcrProvider::GoogleMlKit,
                ocr_lang: "en".to_string(),
            })
            .unwrap();

        let reaction = operator.abandon_job("Cancelled").unwrap();

        assert_eq!(reaction.intents, vec![OverlayIntent::HideResultView]);
        assert!(reaction.job.is_none());
        let kinds: Vec<_> = transitions.try_iter().map(|t| t.current.kind()).collect();
        assert_eq!(
            kinds[kinds.len() - 2..],
            [NavStateKind::ErrorDisplaying, NavStateKind::Idle]
        );
        assert!(operator.abandon_job("Cancelled").is_err());
    }
}
