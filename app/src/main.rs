//! Headless screenlens host.
//!
//! Usage: `screenlens [settings.json] [frame.rgba WxH]`
//!
//! Mirrors a raw RGBA frame (or a generated one) as the screen, circles the
//! middle of it, captures, and prints every engine event as JSON.

mod host;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use crossbeam_channel::Receiver;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use screenlens_capture::platform::DisplayMetrics;
use screenlens_capture::{JsonFormatStore, ReplayFrame, ReplayPlatform};
use screenlens_engine::{create_engine, EngineDeps, MenuLinks, TranslatorRegistry};
use screenlens_ipc::{
    command_channel, event_channel, CaptureToken, EngineCommand, EngineEvent, MainBarButton,
    NavStateKind, NavigationAction, Rect, ScreenSize, Settings,
};

const DEFAULT_SCREEN: ScreenSize = ScreenSize::new(1080, 1920);
const DENSITY_DPI: u32 = 420;
const FORMAT_FILE: &str = "screenlens-format.json";
const EVENT_WAIT: Duration = Duration::from_secs(10);

fn init_logging() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "screenlens=debug,screenlens_engine=debug,screenlens_capture=debug".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn parse_size(text: &str) -> Result<ScreenSize> {
    let (width, height) = text
        .split_once(['x', 'X'])
        .ok_or_else(|| anyhow!("expected WxH, got {text:?}"))?;
    let width = width.parse().with_context(|| format!("bad width in {text:?}"))?;
    let height = height.parse().with_context(|| format!("bad height in {text:?}"))?;
    Ok(ScreenSize::new(width, height))
}

fn load_frame(path: &Path, size: ScreenSize) -> Result<ReplayFrame> {
    let data = std::fs::read(path)
        .with_context(|| format!("failed to read frame {}", path.display()))?;
    ReplayFrame::from_rgba(size.width, size.height, data)
        .ok_or_else(|| anyhow!("{} is smaller than {size}", path.display()))
}

/// Print events until one matches `done`.
fn print_until(events: &Receiver<EngineEvent>, done: impl Fn(&EngineEvent) -> bool) -> Result<EngineEvent> {
    loop {
        let event = events
            .recv_timeout(EVENT_WAIT)
            .context("engine stopped responding")?;
        println!("{}", serde_json::to_string(&event)?);
        if done(&event) {
            return Ok(event);
        }
    }
}

fn reached(kinds: &[NavStateKind]) -> impl Fn(&EngineEvent) -> bool + '_ {
    move |event| {
        matches!(event, EngineEvent::StateChanged { current, .. } if kinds.contains(&current.kind()))
    }
}

fn main() -> Result<()> {
    init_logging();
    info!("Starting screenlens");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let settings = match args.first() {
        Some(path) => Settings::load(Path::new(path))
            .with_context(|| format!("failed to load settings from {path}"))?,
        None => Settings::default(),
    };

    let (screen, frame) = match (args.get(1), args.get(2)) {
        (Some(path), Some(size)) => {
            let size = parse_size(size)?;
            (size, load_frame(&PathBuf::from(path), size)?)
        }
        (Some(_), None) => bail!("a frame file needs its size, e.g. frame.rgba 1080x1920"),
        _ => (
            DEFAULT_SCREEN,
            ReplayFrame::solid(DEFAULT_SCREEN, [0x30, 0x60, 0x90, 0xff], 0),
        ),
    };

    let platform = ReplayPlatform::new(DisplayMetrics {
        size: screen,
        density_dpi: DENSITY_DPI,
    });
    platform.push_frame(frame);

    if settings.translation_provider.translates_in_process() {
        warn!(
            provider = ?settings.translation_provider,
            "No in-process translator is available, translation will fail"
        );
    }

    let keep_session = settings.keep_capture_session;
    let deps = EngineDeps {
        platform: Arc::new(platform),
        format_store: Arc::new(JsonFormatStore::open(FORMAT_FILE)),
        windows: host::console_windows(),
        error_presenter: Box::new(host::ConsoleErrors),
        recognizer: Arc::new(host::RegionSummary),
        translators: TranslatorRegistry::new(),
        menu_links: MenuLinks::default(),
        settings: settings.clone(),
    };

    let (command_tx, command_rx) = command_channel();
    let (event_tx, event_rx) = event_channel();
    let mut engine = create_engine(command_rx, event_tx, deps).context("failed to build engine")?;

    let engine_thread = thread::spawn(move || {
        info!("Engine thread starting");
        engine.run();
        info!("Engine thread stopped");
    });

    print_until(&event_rx, |e| matches!(e, EngineEvent::Ready))?;

    let (width, height) = (screen.width as i32, screen.height as i32);
    let script = [
        EngineCommand::Grant {
            token: CaptureToken("headless".to_string()),
            keep_session,
        },
        EngineCommand::ShowMainBar,
        EngineCommand::SetLanguages {
            ocr_provider: settings.ocr_provider,
            ocr_lang: settings.ocr_lang.clone(),
            translation_provider: settings.translation_provider,
            translation_lang: settings.translation_lang.clone(),
        },
        EngineCommand::MainBarClicked(MainBarButton::Select),
        EngineCommand::Navigate(NavigationAction::NavigateToScreenCircled {
            parent_rect: Rect::new(0, 0, width, height),
            selected_rect: Rect::new(width / 4, height / 4, width * 3 / 4, height * 3 / 4),
        }),
        EngineCommand::MainBarClicked(MainBarButton::Translate),
    ];
    for command in script {
        command_tx.send(command).context("engine command channel closed")?;
    }

    print_until(
        &event_rx,
        reached(&[NavStateKind::ResultDisplaying, NavStateKind::ErrorDisplaying]),
    )?;

    command_tx.send(EngineCommand::Navigate(NavigationAction::NavigateToIdle))?;
    print_until(&event_rx, reached(&[NavStateKind::Idle]))?;

    command_tx.send(EngineCommand::Shutdown)?;
    print_until(&event_rx, |e| matches!(e, EngineEvent::Shutdown))?;

    engine_thread
        .join()
        .map_err(|_| anyhow!("engine thread panicked"))?;
    info!("Screenlens stopped");
    Ok(())
}
