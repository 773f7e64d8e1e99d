//! Job identifiers, inputs and the views callers get back.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::JobStage;
use crate::encode::{EncodedDocument, OutputFormat};
use crate::error::{Error, ErrorKind, Result};
use crate::model::{AlignMethod, AlignedUnit, NormalizedDocument, SourceDocument};

/// Characters of block text kept in a preview pair.
pub const PREVIEW_TEXT_LIMIT: usize = 200;

/// Opaque job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for JobId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(JobId)
            .map_err(|_| Error::JobNotFound(s.to_string()))
    }
}

/// One input document as submitted.
#[derive(Debug, Clone)]
pub struct InputFile {
    /// File name; its extension is the fallback for format detection
    pub name: String,
    pub bytes: Vec<u8>,
}

impl InputFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Read an input from disk.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let source = SourceDocument::from_path(path)?;
        Ok(Self::new(source.name, source.bytes))
    }

    pub(crate) fn into_source(self) -> SourceDocument {
        SourceDocument::new(self.name, self.bytes)
    }
}

/// Why a job failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobError {
    pub kind: ErrorKind,
    /// Stage the error originated in
    pub stage: JobStage,
    pub message: String,
}

impl JobError {
    pub(crate) fn new(stage: JobStage, error: &Error) -> Self {
        Self {
            kind: error.kind(),
            stage,
            message: error.to_string(),
        }
    }

    /// The failure as an [`Error::JobFailed`].
    pub fn to_error(&self) -> Error {
        Error::JobFailed {
            kind: self.kind,
            stage: self.stage,
            message: self.message.clone(),
        }
    }
}

/// Snapshot of a job's progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub id: JobId,
    pub stage: JobStage,
    pub progress_percent: u8,
    pub format: OutputFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
    /// Stages entered so far, in order
    pub history: Vec<JobStage>,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        self.stage.is_terminal()
    }
}

/// Output of a completed job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    #[serde(skip)]
    pub data: Vec<u8>,
    pub filename: String,
    pub size_bytes: usize,
    pub page_count: usize,
    pub mime_type: String,
    pub format: OutputFormat,
}

impl From<EncodedDocument> for JobResult {
    fn from(encoded: EncodedDocument) -> Self {
        Self {
            filename: encoded.format.file_name(),
            size_bytes: encoded.data.len(),
            page_count: encoded.page_count,
            mime_type: encoded.format.mime_type().to_string(),
            format: encoded.format,
            data: encoded.data,
        }
    }
}

/// A sample of aligned text for previews.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewPair {
    pub text1: Option<String>,
    pub text2: Option<String>,
    pub method: AlignMethod,
    pub confidence: f32,
}

impl PreviewPair {
    /// Preview pairs for the first `limit` units.
    pub fn sample(
        units: &[AlignedUnit],
        first: &NormalizedDocument,
        second: &NormalizedDocument,
        limit: usize,
    ) -> Vec<PreviewPair> {
        units
            .iter()
            .take(limit)
            .map(|unit| PreviewPair {
                text1: unit.left().and_then(|r| preview_text(first, r.index())),
                text2: unit.right().and_then(|r| preview_text(second, r.index())),
                method: unit.method(),
                confidence: unit.confidence(),
            })
            .collect()
    }
}

fn preview_text(doc: &NormalizedDocument, index: usize) -> Option<String> {
    let block = doc.block(index)?;
    let text = block.plain_text();
    if text.trim().is_empty() && block.kind.is_image() {
        return Some("[image]".to_string());
    }
    Some(truncate_chars(&text, PREVIEW_TEXT_LIMIT))
}

fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Block, DocumentMetadata, LoadedDocument};
    use crate::normalize::Normalizer;

    fn doc(blocks: Vec<Block>) -> NormalizedDocument {
        let mut loaded = LoadedDocument::new(DocumentMetadata::default());
        blocks.into_iter().for_each(|b| loaded.push(b));
        Normalizer::default().normalize(loaded).unwrap()
    }

    #[test]
    fn test_job_id_round_trip() {
        let id = JobId::new();
        assert_eq!(id.to_string().parse::<JobId>().unwrap(), id);
        assert!(matches!("nope".parse::<JobId>(), Err(Error::JobNotFound(_))));
    }

    #[test]
    fn test_preview_sample_truncates() {
        let long = "word ".repeat(100);
        let a = doc(vec![Block::paragraph(long.clone()), Block::heading("Extra", 1)]);
        let b = doc(vec![Block::paragraph("court")]);
        let units = vec![
            AlignedUnit::pair(0, 0, 0.8, AlignMethod::Structural),
            AlignedUnit::left_only(1),
        ];
        let preview = PreviewPair::sample(&units, &a, &b, 10);

        assert_eq!(preview.len(), 2);
        let text1 = preview[0].text1.as_deref().unwrap();
        assert_eq!(text1.chars().count(), PREVIEW_TEXT_LIMIT + 1);
        assert!(text1.ends_with('…'));
        assert_eq!(preview[0].text2.as_deref(), Some("court"));
        assert_eq!(preview[1].text2, None);
        assert_eq!(preview[1].method, AlignMethod::Unmatched);

        assert_eq!(PreviewPair::sample(&units, &a, &b, 1).len(), 1);
    }

    #[test]
    fn test_result_metadata() {
        let result = JobResult::from(EncodedDocument {
            format: OutputFormat::Pdf,
            data: vec![1, 2, 3],
            page_count: 2,
        });
        assert_eq!(result.filename, "bilingual_output.pdf");
        assert_eq!(result.size_bytes, 3);
        assert_eq!(result.mime_type, "application/pdf");
    }
}
