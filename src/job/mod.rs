//! Job orchestration.
//!
//! A job takes two input documents through Loading, Normalizing,
//! Aligning, Composing and Encoding on a worker thread of its own. Callers
//! poll [`Orchestrator::get_status`] or block in [`Orchestrator::wait`].

mod orchestrator;
mod stage;
mod status;

pub use orchestrator::{EngineOptions, Orchestrator};
pub use stage::JobStage;
pub use status::{InputFile, JobError, JobId, JobResult, JobStatus, PreviewPair, PREVIEW_TEXT_LIMIT};

#[cfg(feature = "async")]
impl Orchestrator {
    /// Run a job on the blocking thread pool of the current tokio runtime.
    pub async fn run_async(
        &self,
        doc1: InputFile,
        doc2: InputFile,
        format: crate::encode::OutputFormat,
        config: crate::layout::FormatConfig,
    ) -> crate::Result<JobResult> {
        let orchestrator = self.clone();
        tokio::task::spawn_blocking(move || orchestrator.run(doc1, doc2, format, config))
            .await
            .map_err(|e| crate::Error::Io(std::io::Error::other(e)))?
    }
}
