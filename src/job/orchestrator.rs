//! The job orchestrator.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::{Mutex, RwLock};

use super::status::{InputFile, JobError, JobId, JobResult, JobStatus, PreviewPair};
use super::JobStage;
use crate::align::{AlignOptions, Aligner};
use crate::encode::{self, OutputFormat};
use crate::error::{Error, Result};
use crate::layout::{Composer, FormatConfig};
use crate::loader::{LoadOptions, LoaderRegistry};
use crate::model::{LoadedDocument, NormalizedDocument};
use crate::normalize::{NormalizeOptions, Normalizer};

/// Engine settings shared read-only by every job.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub load: LoadOptions,
    pub normalize: NormalizeOptions,
    pub align: AlignOptions,
    /// Number of aligned units kept for previews
    pub preview_limit: usize,
    /// Overall per-job deadline, checked at stage boundaries
    pub deadline: Option<Duration>,
}

impl EngineOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_load_options(mut self, load: LoadOptions) -> Self {
        self.load = load;
        self
    }

    pub fn with_normalize_options(mut self, normalize: NormalizeOptions) -> Self {
        self.normalize = normalize;
        self
    }

    pub fn with_align_options(mut self, align: AlignOptions) -> Self {
        self.align = align;
        self
    }

    pub fn with_preview_limit(mut self, limit: usize) -> Self {
        self.preview_limit = limit;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            load: LoadOptions::default(),
            normalize: NormalizeOptions::default(),
            align: AlignOptions::default(),
            preview_limit: 10,
            deadline: None,
        }
    }
}

/// Mutable per-job state, written only by the job's worker.
struct JobState {
    stage: JobStage,
    progress: u8,
    history: Vec<JobStage>,
    error: Option<JobError>,
    preview: Option<Vec<PreviewPair>>,
    result: Option<JobResult>,
}

struct JobSlot {
    id: JobId,
    format: OutputFormat,
    state: Mutex<JobState>,
    cancel: AtomicBool,
    done: Receiver<JobStage>,
}

impl JobSlot {
    fn new(id: JobId, format: OutputFormat) -> (Arc<Self>, Sender<JobStage>) {
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        let slot = Arc::new(Self {
            id,
            format,
            state: Mutex::new(JobState {
                stage: JobStage::Submitted,
                progress: 0,
                history: vec![JobStage::Submitted],
                error: None,
                preview: None,
                result: None,
            }),
            cancel: AtomicBool::new(false),
            done: done_rx,
        });
        (slot, done_tx)
    }

    fn status(&self) -> JobStatus {
        let state = self.state.lock();
        JobStatus {
            id: self.id,
            stage: state.stage,
            progress_percent: state.progress,
            format: self.format,
            error: state.error.clone(),
            history: state.history.clone(),
        }
    }

    fn enter(&self, stage: JobStage) {
        let mut state = self.state.lock();
        state.stage = stage;
        if let Some(progress) = stage.progress() {
            state.progress = state.progress.max(progress);
        }
        state.history.push(stage);
    }
}

/// Runs bilingual formatting jobs.
///
/// Each job runs on its own worker thread through Loading, Normalizing,
/// Aligning, Composing and Encoding. Jobs share nothing mutable; the
/// engine options and loader registry are read-only. Cloning an
/// orchestrator yields a handle to the same job table.
#[derive(Clone)]
pub struct Orchestrator {
    options: Arc<EngineOptions>,
    registry: Arc<LoaderRegistry>,
    jobs: Arc<RwLock<HashMap<JobId, Arc<JobSlot>>>>,
}

impl Orchestrator {
    pub fn new(options: EngineOptions) -> Self {
        Self::with_registry(options, LoaderRegistry::with_defaults())
    }

    pub fn with_registry(options: EngineOptions, registry: LoaderRegistry) -> Self {
        Self {
            options: Arc::new(options),
            registry: Arc::new(registry),
            jobs: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Submit a job and start it in the background.
    ///
    /// The configuration is validated here; an invalid one is rejected with
    /// [`Error::Config`] and no job is created.
    pub fn submit_job(
        &self,
        doc1: InputFile,
        doc2: InputFile,
        format: OutputFormat,
        config: FormatConfig,
    ) -> Result<JobId> {
        config.validate()?;

        let id = JobId::new();
        let (slot, done_tx) = JobSlot::new(id, format);
        self.jobs.write().insert(id, Arc::clone(&slot));
        log::info!("Job {} submitted: {} + {} -> {}", id, doc1.name, doc2.name, format);

        let worker = JobWorker {
            slot,
            options: Arc::clone(&self.options),
            registry: Arc::clone(&self.registry),
            config: Arc::new(config),
            started: Instant::now(),
        };
        let spawned = thread::Builder::new()
            .name(format!("bifold-job-{}", id))
            .spawn(move || worker.run(doc1, doc2, done_tx));
        if let Err(e) = spawned {
            self.jobs.write().remove(&id);
            return Err(e.into());
        }
        Ok(id)
    }

    /// Current status of a job.
    pub fn get_status(&self, id: JobId) -> Result<JobStatus> {
        Ok(self.slot(id)?.status())
    }

    /// Sample of aligned pairs, available once alignment has finished.
    pub fn get_preview(&self, id: JobId) -> Result<Vec<PreviewPair>> {
        let slot = self.slot(id)?;
        let state = slot.state.lock();
        state.preview.clone().ok_or(Error::NotReady { stage: state.stage })
    }

    /// Output of a completed job.
    ///
    /// A failed job yields its failure as [`Error::JobFailed`]. Once a
    /// finished job's outcome has been handed out the job is forgotten.
    pub fn get_result(&self, id: JobId) -> Result<JobResult> {
        let mut jobs = self.jobs.write();
        let slot = jobs
            .get(&id)
            .ok_or_else(|| Error::JobNotFound(id.to_string()))?;
        let outcome = {
            let mut state = slot.state.lock();
            let error = state.error.as_ref().map(JobError::to_error);
            match (error, state.result.take()) {
                (Some(error), _) => Err(error),
                (None, Some(result)) => Ok(result),
                (None, None) => return Err(Error::NotReady { stage: state.stage }),
            }
        };
        jobs.remove(&id);
        log::debug!("Job {} retrieved and released", id);
        outcome
    }

    /// Request cancellation; it takes effect at the next stage boundary.
    ///
    /// Cancelling a finished job has no effect.
    pub fn cancel(&self, id: JobId) -> Result<()> {
        let slot = self.slot(id)?;
        slot.cancel.store(true, Ordering::SeqCst);
        log::info!("Job {} cancellation requested", id);
        Ok(())
    }

    /// Block until the job is finished or `timeout` elapses, then report its
    /// status.
    pub fn wait(&self, id: JobId, timeout: Option<Duration>) -> Result<JobStatus> {
        let slot = self.slot(id)?;
        // The worker drops its sender when it finishes, so every waiter wakes.
        match timeout {
            Some(timeout) => {
                if let Err(RecvTimeoutError::Timeout) = slot.done.recv_timeout(timeout) {
                    log::debug!("Job {} still running after {:?}", id, timeout);
                }
            }
            None => {
                let _ = slot.done.recv();
            }
        }
        Ok(slot.status())
    }

    /// Submit a job, wait for it and return its output.
    pub fn run(
        &self,
        doc1: InputFile,
        doc2: InputFile,
        format: OutputFormat,
        config: FormatConfig,
    ) -> Result<JobResult> {
        let id = self.submit_job(doc1, doc2, format, config)?;
        self.wait(id, None)?;
        self.get_result(id)
    }

    /// Forget a finished job without retrieving its output.
    pub fn remove_job(&self, id: JobId) -> bool {
        let mut jobs = self.jobs.write();
        let finished = jobs
            .get(&id)
            .is_some_and(|slot| slot.state.lock().stage.is_terminal());
        if finished {
            jobs.remove(&id);
        }
        finished
    }

    /// Ids of all known jobs.
    pub fn job_ids(&self) -> Vec<JobId> {
        self.jobs.read().keys().copied().collect()
    }

    fn slot(&self, id: JobId) -> Result<Arc<JobSlot>> {
        self.jobs
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::JobNotFound(id.to_string()))
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(EngineOptions::default())
    }
}

/// Everything one job's worker thread owns.
struct JobWorker {
    slot: Arc<JobSlot>,
    options: Arc<EngineOptions>,
    registry: Arc<LoaderRegistry>,
    config: Arc<FormatConfig>,
    started: Instant,
}

type StageResult<T> = std::result::Result<T, (JobStage, Error)>;

impl JobWorker {
    fn run(self, doc1: InputFile, doc2: InputFile, done: Sender<JobStage>) {
        let id = self.slot.id;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.pipeline(doc1, doc2)))
            .unwrap_or_else(|payload| {
                let stage = self.slot.state.lock().stage;
                Err((stage, Error::Internal(panic_message(payload.as_ref()))))
            });
        let final_stage = match outcome {
            Ok(result) => {
                log::info!(
                    "Job {} completed: {} ({} bytes, {} pages) in {:?}",
                    id,
                    result.filename,
                    result.size_bytes,
                    result.page_count,
                    self.started.elapsed()
                );
                let mut state = self.slot.state.lock();
                state.result = Some(result);
                state.stage = JobStage::Completed;
                state.progress = 100;
                state.history.push(JobStage::Completed);
                JobStage::Completed
            }
            Err((stage, error)) => {
                log::warn!("Job {} failed during {}: {}", id, stage, error);
                let mut state = self.slot.state.lock();
                state.error = Some(JobError::new(stage, &error));
                state.stage = JobStage::Failed;
                state.history.push(JobStage::Failed);
                JobStage::Failed
            }
        };
        let _ = done.send(final_stage);
    }

    /// Fail with the current stage if the job was cancelled or is past its
    /// deadline.
    fn checkpoint(&self) -> StageResult<()> {
        let current = self.slot.state.lock().stage;
        if self.slot.cancel.load(Ordering::SeqCst) {
            return Err((current, Error::Cancelled));
        }
        if let Some(deadline) = self.options.deadline {
            if self.started.elapsed() >= deadline {
                return Err((current, Error::DeadlineExceeded));
            }
        }
        Ok(())
    }

    /// Check cancellation and the deadline, then move to `next`.
    fn boundary(&self, next: JobStage) -> StageResult<()> {
        self.checkpoint()?;
        self.slot.enter(next);
        log::info!("Job {} entered {}", self.slot.id, next);
        Ok(())
    }

    fn pipeline(&self, doc1: InputFile, doc2: InputFile) -> StageResult<JobResult> {
        let at = |stage: JobStage| move |error: Error| (stage, error);

        self.boundary(JobStage::Loading)?;
        let (first, second) = self.load(doc1, doc2).map_err(at(JobStage::Loading))?;

        self.boundary(JobStage::Normalizing)?;
        let normalizer = Normalizer::new(self.options.normalize.clone());
        let (first, second): (Result<NormalizedDocument>, Result<NormalizedDocument>) =
            rayon::join(|| normalizer.normalize(first), || normalizer.normalize(second));
        let first = first.map_err(at(JobStage::Normalizing))?;
        let second = second.map_err(at(JobStage::Normalizing))?;

        self.boundary(JobStage::Aligning)?;
        let units = Aligner::new(self.options.align)
            .align(&first, &second)
            .map_err(at(JobStage::Aligning))?;
        let preview = PreviewPair::sample(&units, &first, &second, self.options.preview_limit);
        self.slot.state.lock().preview = Some(preview);

        self.boundary(JobStage::Composing)?;
        let tree = Composer::new(FormatConfig::clone(&self.config))
            .compose(&units, &first, &second)
            .map_err(at(JobStage::Composing))?;
        drop(units);

        self.boundary(JobStage::Encoding)?;
        let encoded = encode::encode(&tree, &self.config, self.slot.format)
            .map_err(at(JobStage::Encoding))?;
        self.checkpoint()?;
        Ok(JobResult::from(encoded))
    }

    /// Load both inputs in parallel; the first document's error wins.
    fn load(&self, doc1: InputFile, doc2: InputFile) -> Result<(LoadedDocument, LoadedDocument)> {
        let (a, b) = (doc1.into_source(), doc2.into_source());
        let options = &self.options.load;
        let (first, second) = rayon::join(
            || self.registry.load(&a, options),
            || self.registry.load(&b, options),
        );
        Ok((first?, second?))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("stage panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("stage panicked: {}", s)
    } else {
        "stage panicked".to_string()
    }
}
