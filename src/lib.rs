//! # bifold
//!
//! Bilingual document alignment and assembly.
//!
//! bifold takes two documents holding the same content in two languages,
//! aligns them block by block and composes a single bilingual document,
//! either side by side or interleaved.
//!
//! ## Quick Start
//!
//! ```no_run
//! use bifold::{format_files, FormatConfig, OutputFormat};
//!
//! fn main() -> bifold::Result<()> {
//!     let result = format_files(
//!         "chapter_en.docx",
//!         "chapter_ar.docx",
//!         OutputFormat::Pdf,
//!         FormatConfig::default(),
//!     )?;
//!     std::fs::write(&result.filename, &result.data)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Inputs**: plain text, Markdown, DOCX, PDF and EPUB
//! - **Outputs**: DOCX, EPUB, PDF and single-file HTML
//! - **Alignment**: monotone dynamic-programming alignment with structural scoring
//! - **Layouts**: side-by-side columns or interleaved blocks, RTL aware
//! - **Jobs**: background jobs with progress, preview, cancellation and deadlines

pub mod align;
pub mod detect;
pub mod encode;
pub mod error;
pub mod job;
pub mod layout;
pub mod loader;
pub mod model;
pub mod normalize;

// Re-export commonly used types
pub use align::{AlignOptions, Aligner, AlignmentStats, JsonFormat, SimilarityWeights};
pub use detect::{detect_format_from_bytes, detect_format_from_path, InputFormat};
pub use encode::{DocumentEncoder, EncodedDocument, OutputFormat};
pub use error::{Error, ErrorKind, Result};
pub use job::{
    EngineOptions, InputFile, JobError, JobId, JobResult, JobStage, JobStatus, Orchestrator,
    PreviewPair,
};
pub use layout::{
    Composer, FormatConfig, ImagePlacement, ImageQuality, Language, LayoutMode, LayoutTree,
    Margins, PageSize,
};
pub use loader::{DocumentLoader, ErrorMode, LoadOptions, LoaderRegistry};
pub use model::{
    AlignMethod, AlignedUnit, Block, BlockKind, BlockRef, Direction, NormalizedDocument,
    SourceDocument, TextRun, TextStyle,
};
pub use normalize::{CleanupPreset, NormalizeOptions, Normalizer};

use std::path::Path;

/// Crate version, written into generated documents.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Load and normalize a document from disk.
///
/// # Example
///
/// ```no_run
/// use bifold::load_file;
///
/// let doc = load_file("chapter.md").unwrap();
/// println!("Blocks: {}", doc.len());
/// ```
pub fn load_file<P: AsRef<Path>>(path: P) -> Result<NormalizedDocument> {
    Bifold::new().load(path)
}

/// Load and normalize a document held in memory.
///
/// `name` supplies the extension used when the content alone does not
/// identify the format.
pub fn load_bytes(name: &str, bytes: Vec<u8>) -> Result<NormalizedDocument> {
    Bifold::new().load_bytes(name, bytes)
}

/// Align two normalized documents with default options.
pub fn align_documents(
    first: &NormalizedDocument,
    second: &NormalizedDocument,
) -> Result<Vec<AlignedUnit>> {
    Aligner::new(AlignOptions::default()).align(first, second)
}

/// Run a complete job on two in-memory inputs and wait for the result.
pub fn format_documents(
    doc1: InputFile,
    doc2: InputFile,
    format: OutputFormat,
    config: FormatConfig,
) -> Result<JobResult> {
    Orchestrator::default().run(doc1, doc2, format, config)
}

/// Run a complete job on two files and wait for the result.
pub fn format_files<P: AsRef<Path>, Q: AsRef<Path>>(
    path1: P,
    path2: Q,
    format: OutputFormat,
    config: FormatConfig,
) -> Result<JobResult> {
    format_documents(
        InputFile::from_path(path1)?,
        InputFile::from_path(path2)?,
        format,
        config,
    )
}

/// Builder for loading, aligning and formatting document pairs.
///
/// # Example
///
/// ```no_run
/// use bifold::{Bifold, LayoutMode, OutputFormat};
///
/// let result = Bifold::new()
///     .lenient()
///     .with_layout_mode(LayoutMode::Interleaved)
///     .with_title("Collected Essays")
///     .format("essays_en.epub", "essays_fr.epub", OutputFormat::Epub)?;
/// # Ok::<(), bifold::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct Bifold {
    options: EngineOptions,
    config: FormatConfig,
}

impl Bifold {
    /// Create a builder with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip unreadable parts of inputs instead of failing.
    pub fn lenient(mut self) -> Self {
        self.options.load = self.options.load.lenient();
        self
    }

    /// Ignore images in inputs.
    pub fn text_only(mut self) -> Self {
        self.options.load = self.options.load.text_only();
        self
    }

    /// Align sections one after another instead of in parallel.
    pub fn sequential(mut self) -> Self {
        self.options.align = self.options.align.sequential();
        self
    }

    /// Set the text cleanup preset.
    pub fn with_cleanup(mut self, preset: CleanupPreset) -> Self {
        self.options.normalize = self
            .options
            .normalize
            .with_cleanup(normalize::CleanupOptions::from_preset(preset));
        self
    }

    /// Replace the whole formatting configuration.
    pub fn with_config(mut self, config: FormatConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_layout_mode(mut self, mode: LayoutMode) -> Self {
        self.config = self.config.with_layout_mode(mode);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.config = self.config.with_title(title);
        self
    }

    /// Number of aligned units kept for previews.
    pub fn with_preview_limit(mut self, limit: usize) -> Self {
        self.options.preview_limit = limit;
        self
    }

    /// Fail jobs that run longer than `deadline`.
    pub fn with_deadline(mut self, deadline: std::time::Duration) -> Self {
        self.options.deadline = Some(deadline);
        self
    }

    pub fn config(&self) -> &FormatConfig {
        &self.config
    }

    /// Load and normalize one file.
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<NormalizedDocument> {
        let source = SourceDocument::from_path(path)?;
        self.load_source(source)
    }

    /// Load and normalize one in-memory document.
    pub fn load_bytes(&self, name: &str, bytes: Vec<u8>) -> Result<NormalizedDocument> {
        self.load_source(SourceDocument::new(name, bytes))
    }

    fn load_source(&self, source: SourceDocument) -> Result<NormalizedDocument> {
        let loaded = LoaderRegistry::with_defaults().load(&source, &self.options.load)?;
        Normalizer::new(self.options.normalize.clone()).normalize(loaded)
    }

    /// Load both files and align them.
    pub fn align<P: AsRef<Path>, Q: AsRef<Path>>(&self, path1: P, path2: Q) -> Result<AlignedDocuments> {
        let first = self.load(path1)?;
        let second = self.load(path2)?;
        let units = Aligner::new(self.options.align).align(&first, &second)?;
        Ok(AlignedDocuments {
            first,
            second,
            units,
            preview_limit: self.options.preview_limit,
        })
    }

    /// Run a complete job on two files.
    pub fn format<P: AsRef<Path>, Q: AsRef<Path>>(
        self,
        path1: P,
        path2: Q,
        format: OutputFormat,
    ) -> Result<JobResult> {
        let doc1 = InputFile::from_path(path1)?;
        let doc2 = InputFile::from_path(path2)?;
        let config = self.config.clone();
        self.orchestrator().run(doc1, doc2, format, config)
    }

    /// An orchestrator running jobs with this builder's engine options.
    pub fn orchestrator(self) -> Orchestrator {
        Orchestrator::new(self.options)
    }
}

/// Two loaded documents and their alignment.
#[derive(Debug, Clone)]
pub struct AlignedDocuments {
    pub first: NormalizedDocument,
    pub second: NormalizedDocument,
    pub units: Vec<AlignedUnit>,
    preview_limit: usize,
}

impl AlignedDocuments {
    pub fn stats(&self) -> AlignmentStats {
        AlignmentStats::compute(&self.units)
    }

    /// Aligned units as JSON.
    pub fn to_json(&self, format: JsonFormat) -> Result<String> {
        align::to_json(&self.units, &self.first, &self.second, format)
    }

    /// Preview pairs for the leading units.
    pub fn preview(&self) -> Vec<PreviewPair> {
        PreviewPair::sample(&self.units, &self.first, &self.second, self.preview_limit)
    }

    /// Compose the aligned documents into a layout tree.
    pub fn compose(&self, config: &FormatConfig) -> Result<LayoutTree> {
        Composer::new(config.clone()).compose(&self.units, &self.first, &self.second)
    }
}
