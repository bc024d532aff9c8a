//! Running capture, recognition and translation off the engine loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use tokio::runtime::Runtime;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use screenlens_capture::CaptureManager;

use crate::error::{EngineError, EngineResult};
use crate::operator::{JobOutcome, JobRequest};
use crate::providers::{TextRecognizer, TranslatorRegistry};

/// Worker threads of the job runtime.
const WORKER_THREADS: usize = 2;

/// Everything a job needs, cloned into each task.
#[derive(Clone)]
struct JobContext {
    capture: Arc<CaptureManager>,
    recognizer: Arc<dyn TextRecognizer>,
    translators: TranslatorRegistry,
    capture_timeout: Duration,
}

/// A job outcome tagged with the dispatch that produced it.
#[derive(Debug)]
pub struct JobReport {
    pub generation: u64,
    pub outcome: JobOutcome,
}

/// Owns the worker runtime and reports job outcomes over a channel.
///
/// At most one job is in flight. Every dispatch and every cancel starts a
/// new generation; reports from older generations are stale.
pub struct JobRunner {
    runtime: Option<Runtime>,
    context: JobContext,
    outcome_tx: Sender<JobReport>,
    generation: u64,
    in_flight: Option<AbortHandle>,
}

impl JobRunner {
    pub fn new(
        capture: Arc<CaptureManager>,
        recognizer: Arc<dyn TextRecognizer>,
        translators: TranslatorRegistry,
        capture_timeout: Duration,
    ) -> EngineResult<(Self, Receiver<JobReport>)> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(WORKER_THREADS)
            .thread_name("screenlens-worker")
            .enable_all()
            .build()?;
        let (outcome_tx, outcome_rx) = crossbeam_channel::unbounded();

        let runner = Self {
            runtime: Some(runtime),
            context: JobContext {
                capture,
                recognizer,
                translators,
                capture_timeout,
            },
            outcome_tx,
            generation: 0,
            in_flight: None,
        };
        Ok((runner, outcome_rx))
    }

    /// Start `job`. Its report arrives on the receiver returned by
    /// [`JobRunner::new`], also when the job task panics.
    pub fn dispatch(&mut self, job: JobRequest) {
        let Some(runtime) = &self.runtime else {
            warn!("Job runtime already shut down, dropping job");
            return;
        };

        self.generation += 1;
        let generation = self.generation;
        let task = runtime.spawn(run_job(self.context.clone(), job));
        self.in_flight = Some(task.abort_handle());

        let outcome_tx = self.outcome_tx.clone();
        runtime.spawn(async move {
            let outcome = match task.await {
                Ok(outcome) => outcome,
                Err(e) if e.is_cancelled() => {
                    debug!(generation, "Job cancelled");
                    return;
                }
                Err(e) => {
                    warn!(generation, "Job task died: {}", e);
                    JobOutcome::Failed(EngineError::Worker(e.to_string()))
                }
            };
            if outcome_tx.send(JobReport { generation, outcome }).is_err() {
                debug!("Engine gone, dropping job outcome");
            }
        });
    }

    /// Abort the in-flight job, if any, and mark its report stale.
    ///
    /// Returns true if a job was still running.
    pub fn cancel(&mut self) -> bool {
        self.generation += 1;
        match self.in_flight.take() {
            Some(task) if !task.is_finished() => {
                info!(generation = self.generation, "Cancelling in-flight job");
                task.abort();
                true
            }
            _ => false,
        }
    }

    /// Whether `report` belongs to the latest dispatch.
    pub fn is_current(&self, report: &JobReport) -> bool {
        report.generation == self.generation
    }
}

impl Drop for JobRunner {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

async fn run_job(context: JobContext, job: JobRequest) -> JobOutcome {
    let started = Instant::now();

    let result = match job {
        JobRequest::Capture { selection } => context
            .capture
            .extract_region(
                selection.parent_rect,
                selection.selected_rect,
                context.capture_timeout,
            )
            .await
            .map(JobOutcome::Captured)
            .map_err(EngineError::from),
        JobRequest::Recognize {
            bitmap,
            ocr_provider,
            ocr_lang,
        } => {
            let recognizer = Arc::clone(&context.recognizer);
            blocking(move || {
                recognizer
                    .recognize(&bitmap, ocr_provider, &ocr_lang)
                    .map_err(EngineError::from)
            })
            .await
            .map(JobOutcome::Recognized)
        }
        JobRequest::Translate {
            recognized,
            provider,
            target_lang,
        } => match context.translators.get(provider) {
            Ok(translator) => blocking(move || {
                translator
                    .translate(&recognized.text, &recognized.lang, &target_lang)
                    .map_err(EngineError::from)
            })
            .await
            .map(JobOutcome::Translated),
            Err(e) => Err(e.into()),
        },
    };

    match result {
        Ok(outcome) => {
            info!(elapsed_ms = started.elapsed().as_millis() as u64, "Job finished");
            outcome
        }
        Err(e) => {
            warn!(elapsed_ms = started.elapsed().as_millis() as u64, "Job failed: {}", e);
            JobOutcome::Failed(e)
        }
    }
}

/// Run a provider call on the blocking pool.
async fn blocking<T, F>(call: F) -> EngineResult<T>
where
    F: FnOnce() -> EngineResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(call)
        .await
        .map_err(|e| EngineError::Worker(e.to_string()))?
}
