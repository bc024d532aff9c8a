use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use screenlens_capture::platform::{
    CapturePlatform, DisplayMetrics, ImageReader, Projection, ProjectionListener,
};
use screenlens_capture::{
    Bitmap, CaptureResult, MemoryFormatStore, PixelFormat, ReplayFrame, ReplayPlatform,
};
use screenlens_engine::{
    create_engine, menu, EngineDeps, ErrorPresenter, MenuLinks, OverlayWindow, OverlayWindows,
    RecognitionError, TextRecognizer, TranslationError, Translator, TranslatorRegistry,
};
use screenlens_ipc::{
    command_channel, event_channel, CaptureToken, EngineCommand, EngineEvent, MainBarAction,
    MainBarButton, NavState, NavStateKind, NavigationAction, OcrProvider, OverlayIntent,
    RecognitionResult, Rect, ScreenSize, Settings, TranslationProviderType,
};

const SCREEN: ScreenSize = ScreenSize::new(100, 60);
const WAIT: Duration = Duration::from_secs(5);

type Log = Arc<Mutex<Vec<String>>>;

struct LoggedWindow {
    name: &'static str,
    log: Log,
}

impl OverlayWindow for LoggedWindow {
    fn name(&self) -> &str {
        self.name
    }

    fn attach(&mut self) {
        self.log.lock().push(format!("attach {}", self.name));
    }

    fn detach(&mut self) {
        self.log.lock().push(format!("detach {}", self.name));
    }
}

struct LoggedErrors(Log);

impl ErrorPresenter for LoggedErrors {
    fn show_error(&mut self, message: &str) {
        self.0.lock().push(format!("error {message}"));
    }
}

/// Reports the size of the bitmap it was given.
struct SizeRecognizer;

impl TextRecognizer for SizeRecognizer {
    fn recognize(
        &self,
        bitmap: &Bitmap,
        _provider: OcrProvider,
        lang: &str,
    ) -> Result<RecognitionResult, RecognitionError> {
        if lang == "xx" {
            return Err(RecognitionError::UnsupportedLanguage(lang.to_string()));
        }
        Ok(RecognitionResult {
            lang: lang.to_string(),
            text: format!("{}x{}", bitmap.width, bitmap.height),
        })
    }
}

struct UpperTranslator;

impl Translator for UpperTranslator {
    fn provider_type(&self) -> TranslationProviderType {
        TranslationProviderType::GoogleMlKit
    }

    fn translate(&self, text: &str, _from: &str, to: &str) -> Result<String, TranslationError> {
        Ok(format!("{to}:{}", text.to_uppercase()))
    }
}

/// Dies inside the capture job.
struct PanickingPlatform;

impl CapturePlatform for PanickingPlatform {
    fn open_projection(
        &self,
        _token: &CaptureToken,
        _listener: ProjectionListener,
    ) -> CaptureResult<Box<dyn Projection>> {
        panic!("projection service crashed");
    }

    fn new_image_reader(
        &self,
        _size: ScreenSize,
        _format: PixelFormat,
        _max_images: u32,
    ) -> CaptureResult<Arc<dyn ImageReader>> {
        panic!("image reader service crashed");
    }

    fn display_metrics(&self) -> DisplayMetrics {
        DisplayMetrics {
            size: SCREEN,
            density_dpi: 320,
        }
    }
}

struct Running {
    commands: Sender<EngineCommand>,
    events: Receiver<EngineEvent>,
    log: Log,
    platform: ReplayPlatform,
    handle: Option<JoinHandle<()>>,
}

impl Running {
    fn send(&self, command: EngineCommand) {
        self.commands.send(command).unwrap();
    }

    fn navigate(&self, action: NavigationAction) {
        self.send(EngineCommand::Navigate(action));
    }

    /// Collect events until one matches `done`.
    fn until(&self, done: impl Fn(&EngineEvent) -> bool) -> Vec<EngineEvent> {
        let mut seen = Vec::new();
        loop {
            let event = self
                .events
                .recv_timeout(WAIT)
                .unwrap_or_else(|_| panic!("timed out, events so far: {seen:?}"));
            let finished = done(&event);
            seen.push(event);
            if finished {
                return seen;
            }
        }
    }

    fn until_state(&self, kind: NavStateKind) -> NavState {
        let events = self.until(|e| {
            matches!(e, EngineEvent::StateChanged { current, .. } if current.kind() == kind)
        });
        match events.last() {
            Some(EngineEvent::StateChanged { current, .. }) => (**current).clone(),
            other => panic!("unexpected event {other:?}"),
        }
    }

    fn circle(&self, selected: Rect) {
        self.circle_in(Rect::new(0, 0, 100, 60), selected);
    }

    fn circle_in(&self, parent: Rect, selected: Rect) {
        self.navigate(NavigationAction::NavigateToScreenCircling);
        self.until_state(NavStateKind::ScreenCircling);
        self.navigate(NavigationAction::NavigateToScreenCircled {
            parent_rect: parent,
            selected_rect: selected,
        });
        self.until_state(NavStateKind::ScreenCircled);
    }

    fn capture(&self, ocr_lang: &str) {
        self.navigate(NavigationAction::NavigateToScreenCapturing {
            ocr_provider: OcrProvider::GoogleMlKit,
            ocr_lang: ocr_lang.to_string(),
        });
    }

    fn shutdown(mut self) {
        self.send(EngineCommand::Shutdown);
        self.until(|e| matches!(e, EngineEvent::Shutdown));
        if let Some(handle) = self.handle.take() {
            handle.join().unwrap();
        }
    }
}

fn start(settings: Settings) -> Running {
    let platform = ReplayPlatform::new(DisplayMetrics {
        size: SCREEN,
        density_dpi: 320,
    });
    platform.push_frame(ReplayFrame::solid(SCREEN, [0x20, 0x40, 0x60, 0xff], 0));
    let capture: Arc<dyn CapturePlatform> = Arc::new(platform.clone());
    start_on(settings, platform, capture)
}

/// Run an engine capturing from `capture`; `platform` is only inspected.
fn start_on(
    settings: Settings,
    platform: ReplayPlatform,
    capture: Arc<dyn CapturePlatform>,
) -> Running {
    let log: Log = Arc::default();
    let window = |name| -> Box<dyn OverlayWindow> {
        Box::new(LoggedWindow {
            name,
            log: log.clone(),
        })
    };
    let deps = EngineDeps {
        platform: capture,
        format_store: Arc::new(MemoryFormatStore::new(PixelFormat::RGBA_8888)),
        windows: OverlayWindows {
            main_bar: window("main_bar"),
            circling: window("circling"),
            result: window("result"),
        },
        error_presenter: Box::new(LoggedErrors(log.clone())),
        recognizer: Arc::new(SizeRecognizer),
        translators: [Arc::new(UpperTranslator) as Arc<dyn Translator>]
            .into_iter()
            .collect::<TranslatorRegistry>(),
        menu_links: MenuLinks::default(),
        settings,
    };

    let (commands, command_rx) = command_channel();
    let (event_tx, events) = event_channel();
    let mut engine = create_engine(command_rx, event_tx, deps).unwrap();
    let handle = thread::spawn(move || engine.run());

    let running = Running {
        commands,
        events,
        log,
        platform,
        handle: Some(handle),
    };
    running.until(|e| matches!(e, EngineEvent::Ready));
    running
}

fn granted(settings: Settings) -> Running {
    grant(start(settings))
}

fn grant(running: Running) -> Running {
    running.send(EngineCommand::Grant {
        token: CaptureToken("grant".to_string()),
        keep_session: true,
    });
    running
}

fn state_kinds(events: &[EngineEvent]) -> Vec<NavStateKind> {
    events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::StateChanged { current, .. } => Some(current.kind()),
            _ => None,
        })
        .collect()
}

#[test]
fn circled_region_is_captured_recognized_and_translated() {
    let settings = Settings {
        translation_lang: "ja".to_string(),
        ..Settings::default()
    };
    let running = granted(settings);

    running.circle(Rect::new(10, 10, 50, 40));
    running.capture("en");
    let result = running.until_state(NavStateKind::ResultDisplaying);

    match result {
        NavState::ResultDisplaying {
            recognized,
            translated,
            provider,
        } => {
            assert_eq!(recognized.text, "40x30");
            assert_eq!(translated.as_deref(), Some("ja:40X30"));
            assert_eq!(provider, TranslationProviderType::GoogleMlKit);
        }
        other => panic!("unexpected state {other:?}"),
    }

    let log = running.log.lock().clone();
    assert_eq!(
        log,
        vec![
            "attach circling",
            "attach main_bar",
            "detach circling",
            "attach result"
        ]
    );

    running.navigate(NavigationAction::NavigateToIdle);
    running.until_state(NavStateKind::Idle);
    assert_eq!(running.log.lock().last().map(String::as_str), Some("detach result"));

    running.shutdown();
}

#[test]
fn states_are_published_in_pipeline_order() {
    let running = granted(Settings::default());

    running.circle(Rect::new(0, 0, 20, 20));
    running.capture("en");
    let events = running.until(|e| {
        matches!(e, EngineEvent::StateChanged { current, .. }
            if current.kind() == NavStateKind::ResultDisplaying)
    });

    assert_eq!(
        state_kinds(&events),
        vec![
            NavStateKind::ScreenCapturing,
            NavStateKind::TextRecognizing,
            NavStateKind::TextTranslating,
            NavStateKind::ResultDisplaying,
        ]
    );

    running.shutdown();
}

#[test]
fn ocr_only_skips_translation() {
    let settings = Settings {
        translation_provider: TranslationProviderType::OcrOnly,
        ..Settings::default()
    };
    let running = granted(settings);

    running.circle(Rect::new(0, 0, 30, 10));
    running.capture("en");

    match running.until_state(NavStateKind::ResultDisplaying) {
        NavState::ResultDisplaying {
            recognized,
            translated,
            ..
        } => {
            assert_eq!(recognized.text, "30x10");
            assert_eq!(translated, None);
        }
        other => panic!("unexpected state {other:?}"),
    }

    running.shutdown();
}

#[test]
fn capture_without_grant_shows_error() {
    let running = start(Settings::default());

    running.circle(Rect::new(0, 0, 20, 20));
    running.capture("en");

    let events = running.until(|e| matches!(e, EngineEvent::Error { .. }));
    let message = match events.last() {
        Some(EngineEvent::Error { message }) => message.clone(),
        other => panic!("unexpected event {other:?}"),
    };
    assert_eq!(
        message,
        "Screen capture permission is missing, please grant it again"
    );
    assert!(events.iter().any(|e| matches!(e,
        EngineEvent::StateChanged { current, .. } if current.kind() == NavStateKind::ErrorDisplaying)));
    assert!(running
        .log
        .lock()
        .contains(&format!("error {message}")));
    assert_eq!(running.platform.stats().projections_opened, 0);

    running.navigate(NavigationAction::NavigateToIdle);
    running.until_state(NavStateKind::Idle);
    running.shutdown();
}

#[test]
fn recognizer_failure_shows_error() {
    let running = granted(Settings::default());

    running.circle(Rect::new(0, 0, 20, 20));
    running.capture("xx");

    match running.until_state(NavStateKind::ErrorDisplaying) {
        NavState::ErrorDisplaying { message } => {
            assert_eq!(message, "Language xx is not supported by the recognizer");
        }
        other => panic!("unexpected state {other:?}"),
    }

    running.shutdown();
}

#[test]
fn illegal_navigation_is_ignored() {
    let running = start(Settings::default());

    running.capture("en");
    running.navigate(NavigationAction::NavigateToIdle);
    running.send(EngineCommand::GetState);

    let events = running.until(|e| matches!(e, EngineEvent::StateChanged { .. }));
    assert_eq!(events.len(), 1);
    match events.last() {
        Some(EngineEvent::StateChanged { previous, current }) => {
            assert_eq!(**previous, NavState::Idle);
            assert_eq!(**current, NavState::Idle);
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert!(running.log.lock().is_empty());

    running.shutdown();
}

#[test]
fn main_bar_visibility_is_announced_once() {
    let running = start(Settings::default());

    running.send(EngineCommand::ShowMainBar);
    running.send(EngineCommand::ShowMainBar);
    running.send(EngineCommand::HideMainBar);
    running.send(EngineCommand::HideMainBar);
    running.send(EngineCommand::GetState);

    let events = running.until(|e| matches!(e, EngineEvent::StateChanged { .. }));
    let visibility: Vec<bool> = events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::MainBarVisibility(shown) => Some(*shown),
            _ => None,
        })
        .collect();
    assert_eq!(visibility, vec![true, false]);
    assert_eq!(
        *running.log.lock(),
        vec!["attach main_bar", "detach main_bar"]
    );

    running.shutdown();
}

#[test]
fn circling_raises_the_visible_main_bar() {
    let running = start(Settings::default());

    running.send(EngineCommand::ShowMainBar);
    running.navigate(NavigationAction::NavigateToScreenCircling);
    running.until(|e| matches!(e, EngineEvent::Overlay(OverlayIntent::TopMainBar)));

    assert_eq!(
        *running.log.lock(),
        vec![
            "attach main_bar",
            "attach circling",
            "detach main_bar",
            "attach main_bar"
        ]
    );

    running.shutdown();
}

#[test]
fn menu_hide_detaches_main_bar() {
    let running = start(Settings::default());

    running.send(EngineCommand::ShowMainBar);
    running.send(EngineCommand::OpenMainBarMenu);
    running.until(|e| matches!(e, EngineEvent::MainBarAction(MainBarAction::ShowMenu)));

    running.send(EngineCommand::MainBarMenuItem(Some(menu::HIDE.to_string())));
    let events = running.until(|e| {
        matches!(e, EngineEvent::MainBarAction(MainBarAction::HideMainBar))
    });

    assert!(events
        .iter()
        .any(|e| matches!(e, EngineEvent::MainBarVisibility(false))));
    assert!(events
        .iter()
        .any(|e| matches!(e, EngineEvent::MainBar(state) if !state.display_menu)));

    running.shutdown();
}

#[test]
fn detach_all_returns_to_idle_and_clears_overlays() {
    let running = start(Settings::default());

    running.send(EngineCommand::ShowMainBar);
    running.circle(Rect::new(0, 0, 20, 20));
    running.send(EngineCommand::DetachAll);
    running.until_state(NavStateKind::Idle);
    running.send(EngineCommand::GetState);
    running.until(|e| matches!(e, EngineEvent::StateChanged { .. }));

    let log = running.log.lock().clone();
    assert!(log.ends_with(&["detach circling".to_string(), "detach main_bar".to_string()]));

    running.shutdown();
}

#[test]
fn shutdown_releases_the_capture_session() {
    let running = granted(Settings::default());

    running.circle(Rect::new(0, 0, 20, 20));
    running.capture("en");
    running.until_state(NavStateKind::ResultDisplaying);

    let platform = running.platform.clone();
    assert_eq!(platform.stats().projections_opened, 1);
    running.shutdown();

    let stats = platform.stats();
    assert_eq!(stats.projections_stopped, 1);
    assert_eq!(stats.readers_closed, stats.readers_created);
    assert_eq!(stats.displays_released, stats.displays_created);
}

#[test]
fn hidden_main_bar_is_brought_to_front_when_circling() {
    let running = start(Settings::default());

    running.navigate(NavigationAction::NavigateToScreenCircling);
    let events = running.until(|e| matches!(e, EngineEvent::Overlay(OverlayIntent::TopMainBar)));

    assert!(events
        .iter()
        .any(|e| matches!(e, EngineEvent::MainBarVisibility(true))));
    assert_eq!(
        *running.log.lock(),
        vec!["attach circling", "attach main_bar"]
    );

    running.shutdown();
}

#[test]
fn selection_beyond_coordinate_range_shows_error() {
    let running = granted(Settings::default());

    running.circle_in(
        Rect::new(i32::MAX - 5, 0, i32::MAX, 60),
        Rect::new(10, 0, 20, 10),
    );
    running.capture("en");

    match running.until_state(NavStateKind::ErrorDisplaying) {
        NavState::ErrorDisplaying { message } => {
            assert_eq!(
                message,
                "The selected area is outside the screen, please select again"
            );
        }
        other => panic!("unexpected state {other:?}"),
    }

    running.navigate(NavigationAction::NavigateToIdle);
    running.until_state(NavStateKind::Idle);
    running.shutdown();
}

#[test]
fn panicking_capture_job_shows_worker_error() {
    let platform = ReplayPlatform::new(DisplayMetrics {
        size: SCREEN,
        density_dpi: 320,
    });
    let running = grant(start_on(
        Settings::default(),
        platform,
        Arc::new(PanickingPlatform),
    ));

    running.circle(Rect::new(0, 0, 20, 20));
    running.capture("en");

    match running.until_state(NavStateKind::ErrorDisplaying) {
        NavState::ErrorDisplaying { message } => {
            assert!(message.starts_with("Worker task failed"), "{message}");
        }
        other => panic!("unexpected state {other:?}"),
    }

    running.navigate(NavigationAction::NavigateToIdle);
    running.until_state(NavStateKind::Idle);
    running.shutdown();
}

#[test]
fn detach_all_cancels_the_running_job() {
    let running = granted(Settings::default());
    running.platform.set_frame_interval(Duration::from_millis(300));

    running.circle(Rect::new(0, 0, 20, 20));
    running.capture("en");
    running.until_state(NavStateKind::ScreenCapturing);
    running.send(EngineCommand::DetachAll);
    let events = running.until(|e| {
        matches!(e, EngineEvent::StateChanged { current, .. } if current.kind() == NavStateKind::Idle)
    });

    assert_eq!(
        state_kinds(&events),
        vec![NavStateKind::ErrorDisplaying, NavStateKind::Idle]
    );

    thread::sleep(Duration::from_millis(600));
    running.send(EngineCommand::GetState);
    let events = running.until(|e| matches!(e, EngineEvent::StateChanged { .. }));
    assert_eq!(state_kinds(&events), vec![NavStateKind::Idle]);

    let log = running.log.lock().clone();
    assert!(!log.contains(&"attach result".to_string()), "{log:?}");
    assert!(!log.iter().any(|line| line.starts_with("error ")), "{log:?}");

    running.shutdown();
}

#[test]
fn main_bar_buttons_drive_the_pipeline() {
    let running = granted(Settings::default());

    running.send(EngineCommand::SetLanguages {
        ocr_provider: OcrProvider::GoogleMlKit,
        ocr_lang: "en".to_string(),
        translation_provider: TranslationProviderType::OcrOnly,
        translation_lang: "ja".to_string(),
    });
    running.until(|e| matches!(e, EngineEvent::MainBar(state) if state.lang_text == " en "));

    running.send(EngineCommand::MainBarClicked(MainBarButton::Select));
    let events = running.until(|e| {
        matches!(e, EngineEvent::StateChanged { current, .. }
            if current.kind() == NavStateKind::ScreenCircling)
    });
    assert!(events
        .iter()
        .any(|e| matches!(e, EngineEvent::MainBarAction(MainBarAction::RescheduleFadeOut))));

    running.navigate(NavigationAction::NavigateToScreenCircled {
        parent_rect: Rect::new(0, 0, 100, 60),
        selected_rect: Rect::new(0, 0, 30, 10),
    });
    running.until_state(NavStateKind::ScreenCircled);
    running.send(EngineCommand::MainBarClicked(MainBarButton::Translate));

    match running.until_state(NavStateKind::ResultDisplaying) {
        NavState::ResultDisplaying {
            recognized,
            translated,
            provider,
        } => {
            assert_eq!(recognized.lang, "en");
            assert_eq!(recognized.text, "30x10");
            assert_eq!(translated, None);
            assert_eq!(provider, TranslationProviderType::OcrOnly);
        }
        other => panic!("unexpected state {other:?}"),
    }

    running.send(EngineCommand::MainBarClicked(MainBarButton::LanguageBlock));
    running.until(|e| {
        matches!(e, EngineEvent::MainBarAction(MainBarAction::OpenLanguageSelectionPanel))
    });

    running.shutdown();
}

#[test]
fn close_button_cancels_circling() {
    let running = start(Settings::default());

    running.send(EngineCommand::MainBarClicked(MainBarButton::Select));
    running.until_state(NavStateKind::ScreenCircling);
    running.send(EngineCommand::MainBarClicked(MainBarButton::Close));
    running.until_state(NavStateKind::Idle);

    assert!(running.log.lock().contains(&"detach circling".to_string()));

    running.shutdown();
}
