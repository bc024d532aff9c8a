//! Attaching and detaching overlay windows.

use crossbeam_channel::Sender;
use tracing::{debug, info, warn};

use screenlens_ipc::{EngineEvent, OverlayIntent};

/// A floating window the host can put on or take off the screen.
pub trait OverlayWindow: Send {
    /// Name used in logs.
    fn name(&self) -> &str;

    fn attach(&mut self);

    fn detach(&mut self);
}

/// Shows the error dialog.
pub trait ErrorPresenter: Send {
    fn show_error(&mut self, message: &str);
}

/// The overlays the coordinator manages.
pub struct OverlayWindows {
    pub main_bar: Box<dyn OverlayWindow>,
    pub circling: Box<dyn OverlayWindow>,
    pub result: Box<dyn OverlayWindow>,
}

/// Tracks whether a window is attached and drops redundant requests.
struct ManagedWindow {
    window: Box<dyn OverlayWindow>,
    attached: bool,
}

impl ManagedWindow {
    fn new(window: Box<dyn OverlayWindow>) -> Self {
        Self {
            window,
            attached: false,
        }
    }

    /// Returns false if the window was already attached.
    fn attach(&mut self) -> bool {
        if self.attached {
            debug!(window = self.window.name(), "Already attached");
            return false;
        }
        self.window.attach();
        self.attached = true;
        true
    }

    /// Returns false if the window was not attached.
    fn detach(&mut self) -> bool {
        if !self.attached {
            debug!(window = self.window.name(), "Already detached");
            return false;
        }
        self.window.detach();
        self.attached = false;
        true
    }
}

/// Reacts to overlay intents by attaching and detaching windows.
pub struct WindowCoordinator {
    main_bar: ManagedWindow,
    circling: ManagedWindow,
    result: ManagedWindow,
    error_presenter: Box<dyn ErrorPresenter>,
    event_tx: Sender<EngineEvent>,
}

impl WindowCoordinator {
    pub fn new(
        windows: OverlayWindows,
        error_presenter: Box<dyn ErrorPresenter>,
        event_tx: Sender<EngineEvent>,
    ) -> Self {
        Self {
            main_bar: ManagedWindow::new(windows.main_bar),
            circling: ManagedWindow::new(windows.circling),
            result: ManagedWindow::new(windows.result),
            error_presenter,
            event_tx,
        }
    }

    /// Apply one intent.
    pub fn handle(&mut self, intent: &OverlayIntent) {
        debug!(?intent, "Overlay intent");
        match intent {
            OverlayIntent::TopMainBar => self.top_main_bar(),
            OverlayIntent::ShowScreenCirclingView => {
                self.circling.attach();
            }
            OverlayIntent::HideScreenCirclingView => {
                self.circling.detach();
            }
            OverlayIntent::ShowResultView => {
                self.result.attach();
            }
            OverlayIntent::HideResultView => {
                self.result.detach();
            }
            OverlayIntent::ShowErrorDialog { message } => {
                self.error_presenter.show_error(message);
            }
        }
    }

    pub fn is_main_bar_attached(&self) -> bool {
        self.main_bar.attached
    }

    pub fn is_circling_attached(&self) -> bool {
        self.circling.attached
    }

    pub fn is_result_attached(&self) -> bool {
        self.result.attached
    }

    /// Attach the main bar and announce it. No-op if already shown.
    pub fn show_main_bar(&mut self) {
        if self.main_bar.attach() {
            info!("Main bar shown");
            self.send_event(EngineEvent::MainBarVisibility(true));
        }
    }

    /// Detach the main bar and announce it. No-op if already hidden.
    pub fn hide_main_bar(&mut self) {
        if self.main_bar.detach() {
            info!("Main bar hidden");
            self.send_event(EngineEvent::MainBarVisibility(false));
        }
    }

    /// Hide the main bar and detach every other overlay.
    pub fn detach_all(&mut self) {
        self.hide_main_bar();
        self.circling.detach();
        self.result.detach();
    }

    /// Re-stack the main bar above the other overlays. A hidden main bar
    /// is shown.
    fn top_main_bar(&mut self) {
        if self.main_bar.detach() {
            self.main_bar.attach();
        } else {
            debug!("Main bar was hidden, bringing it to front");
            self.show_main_bar();
        }
    }

    fn send_event(&self, event: EngineEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            warn!("Failed to send event: {}", e);
        }
    }
}
