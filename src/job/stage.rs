//! Job lifecycle stages.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stage of a job.
///
/// Jobs move forward through the pipeline stages in declaration order and
/// end in [`JobStage::Completed`] or [`JobStage::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobStage {
    Submitted,
    Loading,
    Normalizing,
    Aligning,
    Composing,
    Encoding,
    Completed,
    Failed,
}

impl JobStage {
    /// Pipeline stages in execution order.
    pub const PIPELINE: [JobStage; 5] = [
        JobStage::Loading,
        JobStage::Normalizing,
        JobStage::Aligning,
        JobStage::Composing,
        JobStage::Encoding,
    ];

    /// Progress percentage reported while the job is in this stage.
    ///
    /// `Failed` has no percentage of its own; a failed job keeps the
    /// progress of the stage it failed in.
    pub fn progress(&self) -> Option<u8> {
        match self {
            JobStage::Submitted => Some(0),
            JobStage::Loading => Some(20),
            JobStage::Normalizing => Some(40),
            JobStage::Aligning => Some(60),
            JobStage::Composing => Some(80),
            JobStage::Encoding | JobStage::Completed => Some(100),
            JobStage::Failed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStage::Completed | JobStage::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStage::Submitted => "Submitted",
            JobStage::Loading => "Loading",
            JobStage::Normalizing => "Normalizing",
            JobStage::Aligning => "Aligning",
            JobStage::Composing => "Composing",
            JobStage::Encoding => "Encoding",
            JobStage::Completed => "Completed",
            JobStage::Failed => "Failed",
        }
    }
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
