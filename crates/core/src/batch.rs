//! Batch orchestrator that turns a participant list into a packaged archive.
//!
//! Work is split into chunks. Chunks run one after another; the certificates
//! inside a chunk are composed concurrently on the blocking thread pool.
//! Between chunks the orchestrator yields (and optionally sleeps) so a shared
//! runtime stays responsive during large runs.

use crate::archive::ArchivePackager;
use crate::composer::{compose_prepared, PreparedTemplate};
use crate::config::{
    recommended_batch_size, BatchOutput, BatchState, FailedItem, GeneratorConfig, Progress,
};
use crate::error::{CertificateError, Result};
use crate::model::{EventInfo, GenerationResult, OrgInfo, Participant, TemplateSpec};
use crate::validation::validate_participants;
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

type ComposeFn = Arc<dyn Fn(&Participant) -> Result<Vec<u8>> + Send + Sync>;

/// Cooperative cancellation flag shared between a run and its caller.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Certificates already being composed still finish.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Per-run options.
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Chunk size for this run; overrides the configured one.
    pub batch_size: Option<usize>,

    /// Token checked before every chunk and every certificate.
    pub cancel: CancellationToken,
}

impl BatchOptions {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Runs certificate batches. One run at a time per instance.
pub struct BatchOrchestrator {
    config: Arc<GeneratorConfig>,
    packager: ArchivePackager,
    state: Mutex<BatchState>,
}

impl BatchOrchestrator {
    /// Create an orchestrator with the given configuration.
    pub fn new(config: GeneratorConfig) -> Result<Self> {
        config.validate()?;
        info!(
            "Initializing batch orchestrator for {}x{} mm pages",
            config.page.width_mm, config.page.height_mm
        );
        Ok(Self {
            packager: ArchivePackager::new(config.archive.clone()),
            config: Arc::new(config),
            state: Mutex::new(BatchState::Idle),
        })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> BatchState {
        *self.lock_state()
    }

    fn lock_state(&self) -> MutexGuard<'_, BatchState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, state: BatchState) {
        *self.lock_state() = state;
    }

    /// Claim the orchestrator for a run, returning the state to restore if
    /// the run is rejected before any work starts.
    fn try_start(&self) -> Result<BatchState> {
        let mut state = self.lock_state();
        if *state == BatchState::Running {
            return Err(CertificateError::AlreadyRunning);
        }
        let previous = *state;
        *state = BatchState::Running;
        Ok(previous)
    }

    /// Generate, package and return certificates for every participant.
    ///
    /// `on_progress` is called after each finished certificate, in completion
    /// order.
    pub async fn run<F>(
        &self,
        participants: &[Participant],
        event: &EventInfo,
        org: &OrgInfo,
        template: &TemplateSpec,
        options: BatchOptions,
        on_progress: F,
    ) -> Result<BatchOutput>
    where
        F: FnMut(Progress) + Send,
    {
        let previous = self.try_start()?;

        let prepared = match self.prepare(participants, template).await {
            Ok(prepared) => prepared,
            Err(e) => {
                self.set_state(previous);
                return Err(e);
            }
        };

        let shared_event = Arc::new(event.clone());
        let org = Arc::new(org.clone());
        let config = self.config.clone();
        let compose: ComposeFn = Arc::new(move |participant: &Participant| {
            compose_prepared(participant, &shared_event, &org, &prepared, &config)
        });

        self.execute(participants, &event.title, compose, options, on_progress)
            .await
    }

    async fn prepare(
        &self,
        participants: &[Participant],
        template: &TemplateSpec,
    ) -> Result<PreparedTemplate> {
        validate_participants(participants)?;

        let template = template.clone();
        let config = self.config.clone();
        tokio::task::spawn_blocking(move || PreparedTemplate::prepare(&template, &config))
            .await
            .map_err(|e| CertificateError::Render {
                participant_id: String::new(),
                message: format!("template preparation failed: {}", e),
            })?
    }

    /// Chunked execution and packaging. Expects the state to be Running.
    async fn execute<F>(
        &self,
        participants: &[Participant],
        event_title: &str,
        compose: ComposeFn,
        options: BatchOptions,
        mut on_progress: F,
    ) -> Result<BatchOutput>
    where
        F: FnMut(Progress) + Send,
    {
        let start = Instant::now();
        let total = participants.len();
        let batch_size = options
            .batch_size
            .or(self.config.batch.batch_size)
            .unwrap_or_else(|| recommended_batch_size(total))
            .max(1);
        let chunk_count = total.div_ceil(batch_size);
        let delay = self.config.batch.inter_chunk_delay;
        let cancel = options.cancel;

        info!(
            "Generating {} certificates in {} chunk(s) of up to {}",
            total, chunk_count, batch_size
        );

        let mut results: Vec<GenerationResult> = Vec::with_capacity(total);

        for (chunk_index, chunk) in participants.chunks(batch_size).enumerate() {
            if cancel.is_cancelled() {
                return Err(self.cancelled(results.len(), total));
            }
            debug!(
                "Starting chunk {}/{} with {} participant(s)",
                chunk_index + 1,
                chunk_count,
                chunk.len()
            );

            let mut outcomes = stream::iter(chunk.iter().cloned())
                .map(|participant| compose_one(participant, compose.clone(), cancel.clone()))
                .buffer_unordered(chunk.len());

            while let Some(outcome) = outcomes.next().await {
                let Some(result) = outcome else {
                    continue;
                };
                results.push(result);
                let current = results.last().map(|r| r.participant_name.clone());
                on_progress(Progress::new(results.len(), total, current));
            }

            if results.len() < (chunk_index * batch_size + chunk.len()) {
                return Err(self.cancelled(results.len(), total));
            }

            tokio::task::yield_now().await;
            if chunk_index + 1 < chunk_count && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        let failed: Vec<FailedItem> = results
            .iter()
            .filter_map(|r| match &r.outcome {
                Ok(_) => None,
                Err(error) => Some(FailedItem {
                    participant_id: r.participant_id.clone(),
                    participant_name: r.participant_name.clone(),
                    error: error.clone(),
                }),
            })
            .collect();
        let succeeded = results.len() - failed.len();

        let packager = self.packager.clone();
        let title = event_title.to_string();
        let packed = tokio::task::spawn_blocking(move || packager.pack(&results, &title))
            .await
            .map_err(|e| CertificateError::Packaging(e.to_string()))
            .and_then(|archive| archive);

        match packed {
            Ok(archive) => {
                self.set_state(BatchState::Completed);
                info!(
                    "Batch finished: {} succeeded, {} failed in {:?}",
                    succeeded,
                    failed.len(),
                    start.elapsed()
                );
                Ok(BatchOutput {
                    archive,
                    succeeded,
                    failed,
                    total_duration: start.elapsed(),
                })
            }
            Err(e) => {
                error!("Packaging failed: {}", e);
                self.set_state(BatchState::Failed);
                Err(e)
            }
        }
    }

    fn cancelled(&self, completed: usize, total: usize) -> CertificateError {
        warn!("Batch cancelled after {} of {} certificates", completed, total);
        self.set_state(BatchState::Cancelled);
        CertificateError::Cancelled { completed, total }
    }

    /// Compose a single certificate with this orchestrator's configuration.
    ///
    /// Does not touch the batch state, so it may be called during a run.
    pub async fn generate_single(
        &self,
        participant: &Participant,
        event: &EventInfo,
        org: &OrgInfo,
        template: &TemplateSpec,
    ) -> Result<Vec<u8>> {
        validate_participants(std::slice::from_ref(participant))?;

        let participant = participant.clone();
        let event = event.clone();
        let org = org.clone();
        let template = template.clone();
        let config = self.config.clone();
        let id = participant.id.clone();

        tokio::task::spawn_blocking(move || {
            let prepared = PreparedTemplate::prepare(&template, &config)?;
            compose_prepared(&participant, &event, &org, &prepared, &config)
        })
        .await
        .map_err(|e| CertificateError::Render {
            participant_id: id,
            message: e.to_string(),
        })?
    }
}

/// Compose one participant on the blocking pool. `None` means the item was
/// skipped because cancellation had been requested.
async fn compose_one(
    participant: Participant,
    compose: ComposeFn,
    cancel: CancellationToken,
) -> Option<GenerationResult> {
    if cancel.is_cancelled() {
        return None;
    }

    let task_participant = participant.clone();
    let joined = tokio::task::spawn_blocking(move || compose(&task_participant)).await;

    let result = match joined {
        Ok(Ok(document)) => {
            debug!("Composed certificate for '{}'", participant.id);
            GenerationResult::success(&participant, document)
        }
        Ok(Err(e)) => {
            error!("Certificate for '{}' failed: {}", participant.id, e);
            GenerationResult::failure(&participant, e.to_string())
        }
        Err(e) => {
            error!("Certificate task for '{}' aborted: {}", participant.id, e);
            GenerationResult::failure(&participant, format!("composition task aborted: {}", e))
        }
    };
    Some(result)
}

/// Builder for a [`BatchOrchestrator`] with custom settings.
#[derive(Debug, Clone, Default)]
pub struct BatchOrchestratorBuilder {
    config: GeneratorConfig,
}

impl BatchOrchestratorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the page size.
    pub fn page(mut self, page: crate::model::PageSize) -> Self {
        self.config.page = page;
        self
    }

    /// Set a fixed chunk size.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch.batch_size = Some(batch_size);
        self
    }

    /// Set the pause between chunks.
    pub fn inter_chunk_delay(mut self, delay: Duration) -> Self {
        self.config.batch.inter_chunk_delay = delay;
        self
    }

    /// Set the certificate heading.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.config.certificate.title = title.into();
        self
    }

    /// Build the orchestrator.
    pub fn build(self) -> Result<BatchOrchestrator> {
        BatchOrchestrator::new(self.config)
    }
}
