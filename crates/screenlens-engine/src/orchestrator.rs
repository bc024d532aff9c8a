//! Main engine loop.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, info, instrument, warn};

use screenlens_capture::platform::CapturePlatform;
use screenlens_capture::{CaptureManager, DiagnosticsSink, FormatStore};
use screenlens_ipc::{
    EngineCommand, EngineEvent, MainBarAction, NavState, NavStateKind, NavigationAction,
    OverlayIntent, Settings,
};

use crate::coordinator::{ErrorPresenter, OverlayWindows, WindowCoordinator};
use crate::diagnostics::DiagnosticsCollector;
use crate::error::{EngineResult, NavigationResult};
use crate::jobs::{JobReport, JobRunner};
use crate::main_bar::{MainBarPresenter, MenuLinks};
use crate::navigator::{StateNavigator, Transition};
use crate::operator::{Reaction, StateOperator};
use crate::providers::{TextRecognizer, TranslatorRegistry};

/// Everything the engine is built from.
pub struct EngineDeps {
    pub platform: Arc<dyn CapturePlatform>,
    pub format_store: Arc<dyn FormatStore>,
    pub windows: OverlayWindows,
    pub error_presenter: Box<dyn ErrorPresenter>,
    pub recognizer: Arc<dyn TextRecognizer>,
    pub translators: TranslatorRegistry,
    pub menu_links: MenuLinks,
    pub settings: Settings,
}

/// Owns the navigator, the capture manager, the overlays and the job
/// runner, and drives them from a single thread.
pub struct Engine {
    command_rx: Receiver<EngineCommand>,
    event_tx: Sender<EngineEvent>,
    navigator: Arc<StateNavigator>,
    transitions: Receiver<Transition>,
    operator: StateOperator,
    coordinator: WindowCoordinator,
    main_bar: MainBarPresenter,
    capture: Arc<CaptureManager>,
    diagnostics: Arc<DiagnosticsCollector>,
    jobs: JobRunner,
    outcome_rx: Receiver<JobReport>,
}

/// Failure recorded when overlays are torn down under a running job.
const JOB_DETACHED_MESSAGE: &str = "Capture was cancelled";

impl Engine {
    /// Create a new engine.
    pub fn new(
        command_rx: Receiver<EngineCommand>,
        event_tx: Sender<EngineEvent>,
        deps: EngineDeps,
    ) -> EngineResult<Self> {
        let settings = deps.settings.sanitized();

        let navigator = Arc::new(StateNavigator::new());
        let transitions = navigator.subscribe();
        let operator = StateOperator::new(Arc::clone(&navigator), &settings);
        let coordinator =
            WindowCoordinator::new(deps.windows, deps.error_presenter, event_tx.clone());
        let main_bar = MainBarPresenter::new(&settings, deps.menu_links);

        let diagnostics = Arc::new(DiagnosticsCollector::new());
        let sink: Arc<dyn DiagnosticsSink> = diagnostics.clone();
        let capture = Arc::new(CaptureManager::new(deps.platform, deps.format_store, sink));

        let (jobs, outcome_rx) = JobRunner::new(
            Arc::clone(&capture),
            deps.recognizer,
            deps.translators,
            settings.capture_timeout(),
        )?;

        Ok(Self {
            command_rx,
            event_tx,
            navigator,
            transitions,
            operator,
            coordinator,
            main_bar,
            capture,
            diagnostics,
            jobs,
            outcome_rx,
        })
    }

    pub fn navigator(&self) -> &Arc<StateNavigator> {
        &self.navigator
    }

    pub fn diagnostics(&self) -> &Arc<DiagnosticsCollector> {
        &self.diagnostics
    }

    /// Run the engine (blocking).
    #[instrument(name = "engine_run", skip(self))]
    pub fn run(&mut self) {
        info!("Engine starting");
        self.send_event(EngineEvent::Ready);

        let command_rx = self.command_rx.clone();
        let outcome_rx = self.outcome_rx.clone();
        loop {
            crossbeam_channel::select! {
                recv(command_rx) -> command => match command {
                    Ok(command) => {
                        if !self.handle_command(command) {
                            break;
                        }
                    }
                    Err(_) => {
                        info!("Command channel disconnected, shutting down");
                        break;
                    }
                },
                recv(outcome_rx) -> report => {
                    if let Ok(report) = report {
                        self.handle_report(report);
                    }
                }
            }
        }

        self.capture.release();
        info!("Engine stopped");
    }

    /// Handle a command. Returns false if engine should stop.
    fn handle_command(&mut self, command: EngineCommand) -> bool {
        debug!(?command, "Handling command");

        match command {
            EngineCommand::Grant {
                token,
                keep_session,
            } => self.capture.grant(token, keep_session),
            EngineCommand::Navigate(action) => {
                let reaction = self.operator.navigate(action);
                self.react(reaction);
            }
            EngineCommand::ShowMainBar => self.show_main_bar(),
            EngineCommand::HideMainBar => self.coordinator.hide_main_bar(),
            EngineCommand::OpenMainBarMenu => {
                let actions = self.main_bar.open_menu();
                self.publish_main_bar(actions);
            }
            EngineCommand::MainBarClicked(button) => {
                let (actions, navigation) = self.main_bar.on_button(button);
                self.publish_main_bar(actions);
                if let Some(action) = navigation {
                    let reaction = self.operator.navigate(action);
                    self.react(reaction);
                }
            }
            EngineCommand::SetLanguages {
                ocr_provider,
                ocr_lang,
                translation_provider,
                translation_lang,
            } => {
                info!(
                    ?ocr_provider,
                    %ocr_lang,
                    ?translation_provider,
                    %translation_lang,
                    "Languages changed"
                );
                let actions = self.main_bar.update_languages(
                    ocr_provider,
                    &ocr_lang,
                    translation_provider,
                    &translation_lang,
                );
                self.operator.set_translation(translation_provider, translation_lang);
                self.publish_main_bar(actions);
            }
            EngineCommand::MainBarMenuItem(key) => {
                let actions = self.main_bar.on_menu_item(key.as_deref());
                if actions.contains(&MainBarAction::HideMainBar) {
                    self.coordinator.hide_main_bar();
                }
                self.publish_main_bar(actions);
            }
            EngineCommand::DetachAll => self.detach_all(),
            EngineCommand::ReleaseCapture => self.capture.release(),
            EngineCommand::GetState => self.send_state(),
            EngineCommand::Shutdown => {
                self.detach_all();
                self.capture.release();
                self.send_event(EngineEvent::Shutdown);
                return false;
            }
        }

        true
    }

    fn handle_report(&mut self, report: JobReport) {
        if !self.jobs.is_current(&report) {
            debug!(generation = report.generation, "Dropping stale job outcome");
            return;
        }
        let reaction = self.operator.on_job_outcome(report.outcome);
        self.react(reaction);
    }

    /// Publish what a navigation step changed, then apply its intents and
    /// start its job.
    fn react(&mut self, reaction: NavigationResult<Reaction>) {
        let reaction = match reaction {
            Ok(reaction) => reaction,
            Err(e) => {
                warn!("Ignoring navigation request: {}", e);
                self.publish_transitions();
                return;
            }
        };

        self.publish_transitions();
        for intent in &reaction.intents {
            self.coordinator.handle(intent);
            if let OverlayIntent::ShowErrorDialog { message } = intent {
                self.send_event(EngineEvent::Error {
                    message: message.clone(),
                });
            }
            self.send_event(EngineEvent::Overlay(intent.clone()));
        }
        if let Some(job) = reaction.job {
            self.jobs.dispatch(job);
        }
    }

    fn publish_transitions(&mut self) {
        let transitions: Vec<Transition> = self.transitions.try_iter().collect();
        for Transition { previous, current } in transitions {
            let actions = self.main_bar.on_nav_state(&current);
            self.send_event(EngineEvent::StateChanged {
                previous: Box::new(previous),
                current: Box::new(current),
            });
            self.publish_main_bar(actions);
        }
    }

    fn publish_main_bar(&self, actions: Vec<MainBarAction>) {
        self.send_event(EngineEvent::MainBar(self.main_bar.state().clone()));
        for action in actions {
            self.send_event(EngineEvent::MainBarAction(action));
        }
    }

    fn show_main_bar(&mut self) {
        if self.coordinator.is_main_bar_attached() {
            debug!("Main bar already shown");
            return;
        }
        self.coordinator.show_main_bar();
        let actions = self.main_bar.on_attached();
        self.publish_main_bar(actions);
    }

    /// Cancel any running job, return to idle and detach every overlay.
    #[instrument(name = "detach_all", skip(self))]
    fn detach_all(&mut self) {
        self.jobs.cancel();

        let reaction = match self.navigator.current_kind() {
            NavStateKind::Idle => None,
            NavStateKind::ScreenCapturing
            | NavStateKind::TextRecognizing
            | NavStateKind::TextTranslating => {
                Some(self.operator.abandon_job(JOB_DETACHED_MESSAGE))
            }
            _ => Some(self.operator.navigate(NavigationAction::NavigateToIdle)),
        };
        if let Some(reaction) = reaction {
            self.react(reaction);
        }
        self.coordinator.detach_all();
    }

    fn send_state(&self) {
        let state: NavState = self.navigator.current();
        self.send_event(EngineEvent::StateChanged {
            previous: Box::new(state.clone()),
            current: Box::new(state),
        });
    }

    fn send_event(&self, event: EngineEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            warn!("Failed to send event: {}", e);
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.capture.release();
    }
}
