//! Console stand-ins for the overlay windows and providers.

use screenlens_capture::Bitmap;
use screenlens_engine::{
    ErrorPresenter, OverlayWindow, OverlayWindows, RecognitionError, TextRecognizer,
};
use screenlens_ipc::{OcrProvider, RecognitionResult};
use tracing::info;

/// Logs attach and detach instead of drawing.
pub struct ConsoleWindow {
    name: &'static str,
}

impl ConsoleWindow {
    pub fn boxed(name: &'static str) -> Box<dyn OverlayWindow> {
        Box::new(Self { name })
    }
}

impl OverlayWindow for ConsoleWindow {
    fn name(&self) -> &str {
        self.name
    }

    fn attach(&mut self) {
        info!(window = self.name, "Window attached");
    }

    fn detach(&mut self) {
        info!(window = self.name, "Window detached");
    }
}

pub fn console_windows() -> OverlayWindows {
    OverlayWindows {
        main_bar: ConsoleWindow::boxed("main_bar"),
        circling: ConsoleWindow::boxed("circling"),
        result: ConsoleWindow::boxed("result"),
    }
}

pub struct ConsoleErrors;

impl ErrorPresenter for ConsoleErrors {
    fn show_error(&mut self, message: &str) {
        eprintln!("error dialog: {message}");
    }
}

/// Describes the region instead of reading text from it.
pub struct RegionSummary;

impl TextRecognizer for RegionSummary {
    fn recognize(
        &self,
        bitmap: &Bitmap,
        provider: OcrProvider,
        lang: &str,
    ) -> Result<RecognitionResult, RecognitionError> {
        let pixels = bitmap.data.chunks_exact(4);
        let count = pixels.len().max(1) as u64;
        let luma: u64 = pixels
            .map(|px| (u64::from(px[0]) * 299 + u64::from(px[1]) * 587 + u64::from(px[2]) * 114) / 1000)
            .sum();

        Ok(RecognitionResult {
            lang: lang.to_string(),
            text: format!(
                "{}x{} region, mean luma {} ({:?})",
                bitmap.width,
                bitmap.height,
                luma / count,
                provider
            ),
        })
    }
}
