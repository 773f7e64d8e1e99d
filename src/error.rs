//! Error types for the bifold engine.

use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::job::JobStage;

/// Result type alias for bifold operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while loading, aligning, composing or encoding.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// No registered loader or encoder accepts the container.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The container was recognized but its content is malformed.
    #[error("Corrupt input: {0}")]
    CorruptInput(String),

    /// The input holds no extractable blocks.
    #[error("Document is empty")]
    EmptyDocument,

    /// One of the documents has nothing that can be aligned.
    #[error("Alignment infeasible: {0}")]
    AlignmentInfeasible(String),

    /// The output container cannot express part of the composed layout.
    #[error("Output format cannot express: {0}")]
    EncodingUnsupportedFeature(String),

    /// The job was cancelled at a stage boundary.
    #[error("Job was cancelled")]
    Cancelled,

    /// The job ran past its overall deadline.
    #[error("Job deadline exceeded")]
    DeadlineExceeded,

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Unknown job identifier.
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// A pipeline stage aborted unexpectedly.
    #[error("Internal error: {0}")]
    Internal(String),

    /// The requested job artifact is not available at the current stage.
    #[error("Job is not ready (current stage: {stage})")]
    NotReady {
        /// Stage the job was in when queried
        stage: JobStage,
    },

    /// The job ended in failure.
    #[error("Job failed during {stage}: {kind} ({message})")]
    JobFailed {
        /// Error kind that ended the job
        kind: ErrorKind,
        /// Stage the failure originated in
        stage: JobStage,
        /// Human-readable detail
        message: String,
    },
}

impl Error {
    /// Tag used for user-facing display and job status reporting.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) | Error::CorruptInput(_) => ErrorKind::CorruptInput,
            Error::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            Error::EmptyDocument => ErrorKind::EmptyDocument,
            Error::AlignmentInfeasible(_) => ErrorKind::AlignmentInfeasible,
            Error::EncodingUnsupportedFeature(_) => ErrorKind::EncodingUnsupportedFeature,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::DeadlineExceeded => ErrorKind::DeadlineExceeded,
            Error::Config(_) => ErrorKind::InvalidConfig,
            Error::JobNotFound(_) | Error::NotReady { .. } => ErrorKind::InvalidRequest,
            Error::Internal(_) => ErrorKind::Internal,
            Error::JobFailed { kind, .. } => *kind,
        }
    }
}

/// Serializable error tag exposed through job status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// No loader or encoder for the container
    UnsupportedFormat,
    /// Malformed container content
    CorruptInput,
    /// Nothing extractable
    EmptyDocument,
    /// Nothing alignable
    AlignmentInfeasible,
    /// Output container cannot express the layout
    EncodingUnsupportedFeature,
    /// Cancelled by the caller
    Cancelled,
    /// Overall deadline exceeded
    DeadlineExceeded,
    /// Configuration rejected before the job started
    InvalidConfig,
    /// Request does not match the job state
    InvalidRequest,
    /// A stage panicked
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::UnsupportedFormat => "UnsupportedFormat",
            ErrorKind::CorruptInput => "CorruptInput",
            ErrorKind::EmptyDocument => "EmptyDocument",
            ErrorKind::AlignmentInfeasible => "AlignmentInfeasible",
            ErrorKind::EncodingUnsupportedFeature => "EncodingUnsupportedFeature",
            ErrorKind::Cancelled => "Cancelled",
            ErrorKind::DeadlineExceeded => "DeadlineExceeded",
            ErrorKind::InvalidConfig => "InvalidConfig",
            ErrorKind::InvalidRequest => "InvalidRequest",
            ErrorKind::Internal => "Internal",
        };
        f.write_str(name)
    }
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        match err {
            lopdf::Error::IO(e) => Error::Io(e),
            _ => Error::CorruptInput(format!("PDF: {}", err)),
        }
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(e) => Error::Io(e),
            _ => Error::CorruptInput(format!("archive: {}", err)),
        }
    }
}

impl From<roxmltree::Error> for Error {
    fn from(err: roxmltree::Error) -> Self {
        Error::CorruptInput(format!("XML: {}", err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}
