//! Document-level types.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{Block, Direction, ImageResource};
use crate::detect::InputFormat;
use crate::error::Result;

/// An input document: opaque bytes plus an optional declared format.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Display name, usually the file name
    pub name: String,

    /// Raw container bytes
    pub bytes: Vec<u8>,

    /// Format declared by the caller; sniffed when absent
    pub declared_format: Option<InputFormat>,
}

impl SourceDocument {
    /// Create a source from bytes; the format is resolved from content or name.
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
            declared_format: None,
        }
    }

    /// Declare the container format explicitly.
    pub fn with_format(mut self, format: InputFormat) -> Self {
        self.declared_format = Some(format);
        self
    }

    /// Read a source from disk.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, bytes))
    }

    /// Extension of the source name, lowercase.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }
}

/// Document metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Document title
    pub title: Option<String>,

    /// Declared language tag (e.g., "en", "ar")
    pub language: Option<String>,

    /// Source name the document was loaded from
    pub source_name: String,

    /// Container format
    pub format: Option<InputFormat>,

    /// Page count for paged sources
    pub page_count: Option<u32>,
}

/// Output of a loader: blocks in reading order plus resources.
#[derive(Debug, Clone, Default)]
pub struct LoadedDocument {
    /// Blocks in reading order
    pub blocks: Vec<Block>,

    /// Image resources keyed by id
    pub resources: BTreeMap<String, ImageResource>,

    /// Metadata
    pub metadata: DocumentMetadata,

    /// Reading order could not be determined with confidence
    pub order_uncertain: bool,
}

impl LoadedDocument {
    pub fn new(metadata: DocumentMetadata) -> Self {
        Self {
            metadata,
            ..Default::default()
        }
    }

    /// Append a block, recording its storage index.
    pub fn push(&mut self, mut block: Block) {
        block.anchor.storage_index = self.blocks.len();
        self.blocks.push(block);
    }

    /// Register an image resource.
    pub fn add_resource(&mut self, id: impl Into<String>, resource: ImageResource) {
        self.resources.insert(id.into(), resource);
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(|b| b.is_empty())
    }
}

/// Output of the normalizer: clean blocks with dense ordinals and directions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedDocument {
    /// Blocks with ordinals `0..len`
    pub blocks: Vec<Block>,

    /// Image resources keyed by id
    #[serde(skip)]
    pub resources: BTreeMap<String, ImageResource>,

    /// Metadata
    pub metadata: DocumentMetadata,

    /// Dominant writing direction
    pub direction: Direction,

    /// Reading order could not be determined with confidence
    pub order_uncertain: bool,
}

impl NormalizedDocument {
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Get a block by ordinal.
    pub fn block(&self, ordinal: usize) -> Option<&Block> {
        self.blocks.get(ordinal)
    }

    /// Resolve the resource behind an image block.
    pub fn resource_for(&self, block: &Block) -> Option<&ImageResource> {
        block
            .image_ref()
            .and_then(|image| self.resources.get(&image.resource_id))
    }

    /// Total characters of text content.
    pub fn total_chars(&self) -> usize {
        self.blocks.iter().map(|b| b.char_len()).sum()
    }

    /// Number of blocks of each kind, keyed by kind label.
    pub fn kind_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for block in &self.blocks {
            *counts.entry(block.kind.to_string()).or_insert(0) += 1;
        }
        counts
    }

    /// Plain text of the whole document.
    pub fn plain_text(&self) -> String {
        self.blocks
            .iter()
            .map(|b| b.plain_text())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_extension() {
        let src = SourceDocument::new("Report.DOCX", vec![1]);
        assert_eq!(src.extension().as_deref(), Some("docx"));
        assert!(src.declared_format.is_none());

        let src = src.with_format(InputFormat::Docx);
        assert_eq!(src.declared_format, Some(InputFormat::Docx));
    }

    #[test]
    fn test_push_records_storage_index() {
        let mut doc = LoadedDocument::default();
        doc.push(Block::paragraph("a"));
        doc.push(Block::paragraph("b"));
        assert_eq!(doc.blocks[1].anchor.storage_index, 1);
        assert!(!doc.is_empty());
    }

    #[test]
    fn test_blank_blocks_count_as_empty() {
        let mut doc = LoadedDocument::default();
        doc.push(Block::paragraph("  "));
        assert!(doc.is_empty());
    }
}
