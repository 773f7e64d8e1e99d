//! Block-level content types.

use serde::{Deserialize, Serialize};

/// Structural kind of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockKind {
    /// Heading with level 1-6
    Heading {
        /// Heading level (1 = top)
        level: u8,
    },
    /// Body paragraph
    Paragraph,
    /// Embedded image
    Image,
    /// Content of one table cell
    TableCell,
    /// Item of a bulleted or numbered list
    ListItem,
}

/// Kind class used for matching; heading levels collapse into one class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KindClass {
    Heading,
    Paragraph,
    Image,
    TableCell,
    ListItem,
}

impl BlockKind {
    /// Create a heading kind, clamping the level to 1-6.
    pub fn heading(level: u8) -> Self {
        BlockKind::Heading {
            level: level.clamp(1, 6),
        }
    }

    /// Matching class of this kind.
    pub fn class(&self) -> KindClass {
        match self {
            BlockKind::Heading { .. } => KindClass::Heading,
            BlockKind::Paragraph => KindClass::Paragraph,
            BlockKind::Image => KindClass::Image,
            BlockKind::TableCell => KindClass::TableCell,
            BlockKind::ListItem => KindClass::ListItem,
        }
    }

    /// Heading level, if this is a heading.
    pub fn heading_level(&self) -> Option<u8> {
        match self {
            BlockKind::Heading { level } => Some(*level),
            _ => None,
        }
    }

    pub fn is_heading(&self) -> bool {
        matches!(self, BlockKind::Heading { .. })
    }

    pub fn is_image(&self) -> bool {
        matches!(self, BlockKind::Image)
    }
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockKind::Heading { level } => write!(f, "heading{}", level),
            BlockKind::Paragraph => write!(f, "paragraph"),
            BlockKind::Image => write!(f, "image"),
            BlockKind::TableCell => write!(f, "table-cell"),
            BlockKind::ListItem => write!(f, "list-item"),
        }
    }
}

/// Writing direction of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Left-to-right
    #[default]
    Ltr,
    /// Right-to-left
    Rtl,
}

impl Direction {
    pub fn is_rtl(&self) -> bool {
        matches!(self, Direction::Rtl)
    }

    /// Value for HTML `dir` attributes.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Ltr => "ltr",
            Direction::Rtl => "rtl",
        }
    }
}

/// Horizontal text alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    /// Start of line (depends on direction)
    #[default]
    Start,
    /// Centered
    Center,
    /// End of line (depends on direction)
    End,
    /// Justified
    Justify,
}

/// Text styling properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    /// Bold text
    pub bold: bool,

    /// Italic text
    pub italic: bool,

    /// Underlined text
    pub underline: bool,
}

impl TextStyle {
    pub fn is_plain(&self) -> bool {
        !self.bold && !self.italic && !self.underline
    }
}

/// A run of text with consistent styling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    /// The text content
    pub text: String,

    /// Text styling
    pub style: TextStyle,
}

impl TextRun {
    /// Create a new text run with default style.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: TextStyle::default(),
        }
    }

    /// Create a bold text run.
    pub fn bold(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: TextStyle {
                bold: true,
                ..Default::default()
            },
        }
    }

    /// Create an italic text run.
    pub fn italic(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: TextStyle {
                italic: true,
                ..Default::default()
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Reference from an image block to a document resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    /// Key into the owning document's resource map
    pub resource_id: String,

    /// Alternative text
    pub alt_text: Option<String>,
}

/// Content carried by a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockPayload {
    /// Styled text runs
    Text {
        /// Runs in reading order
        runs: Vec<TextRun>,
    },
    /// Image reference
    Image(ImageRef),
}

/// Position of a table cell inside its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellPosition {
    /// Table index within the document
    pub table: usize,
    /// Zero-based row
    pub row: usize,
    /// Zero-based column
    pub col: usize,
}

/// Where a block came from in the source container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceAnchor {
    /// 1-based page number for paged sources
    pub page: Option<u32>,
    /// Order in which the block was encountered in storage
    pub storage_index: usize,
}

/// Paragraph-level style hints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockStyle {
    /// Horizontal alignment
    pub alignment: Alignment,

    /// Nesting level for list items (0 = top)
    pub list_level: u8,

    /// Ordered list marker, if numbered
    pub ordered: bool,

    /// Table cell position for table-cell blocks
    pub cell: Option<CellPosition>,
}

/// A contiguous unit of content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Structural kind
    pub kind: BlockKind,

    /// Position within the document (assigned by the normalizer)
    pub ordinal: usize,

    /// Text or image payload
    pub payload: BlockPayload,

    /// Style hints
    pub style: BlockStyle,

    /// Writing direction (assigned by the normalizer)
    pub direction: Direction,

    /// Source position metadata
    pub anchor: SourceAnchor,
}

impl Block {
    /// Create a text block of the given kind.
    pub fn text(kind: BlockKind, runs: Vec<TextRun>) -> Self {
        Self {
            kind,
            ordinal: 0,
            payload: BlockPayload::Text { runs },
            style: BlockStyle::default(),
            direction: Direction::Ltr,
            anchor: SourceAnchor::default(),
        }
    }

    /// Create a paragraph with a single plain run.
    pub fn paragraph(text: impl Into<String>) -> Self {
        Self::text(BlockKind::Paragraph, vec![TextRun::new(text)])
    }

    /// Create a heading with a single plain run.
    pub fn heading(text: impl Into<String>, level: u8) -> Self {
        Self::text(BlockKind::heading(level), vec![TextRun::new(text)])
    }

    /// Create a list item.
    pub fn list_item(text: impl Into<String>, level: u8) -> Self {
        let mut block = Self::text(BlockKind::ListItem, vec![TextRun::new(text)]);
        block.style.list_level = level;
        block
    }

    /// Create a table-cell block.
    pub fn table_cell(text: impl Into<String>, position: CellPosition) -> Self {
        let mut block = Self::text(BlockKind::TableCell, vec![TextRun::new(text)]);
        block.style.cell = Some(position);
        block
    }

    /// Create an image block.
    pub fn image(resource_id: impl Into<String>, alt_text: Option<String>) -> Self {
        Self {
            kind: BlockKind::Image,
            ordinal: 0,
            payload: BlockPayload::Image(ImageRef {
                resource_id: resource_id.into(),
                alt_text,
            }),
            style: BlockStyle::default(),
            direction: Direction::Ltr,
            anchor: SourceAnchor::default(),
        }
    }

    pub fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.style.alignment = alignment;
        self
    }

    pub fn with_anchor(mut self, anchor: SourceAnchor) -> Self {
        self.anchor = anchor;
        self
    }

    /// Text runs, empty for images.
    pub fn runs(&self) -> &[TextRun] {
        match &self.payload {
            BlockPayload::Text { runs } => runs,
            BlockPayload::Image(_) => &[],
        }
    }

    /// Image reference, if this is an image block.
    pub fn image_ref(&self) -> Option<&ImageRef> {
        match &self.payload {
            BlockPayload::Image(image) => Some(image),
            BlockPayload::Text { .. } => None,
        }
    }

    /// Concatenated text of all runs.
    pub fn plain_text(&self) -> String {
        match &self.payload {
            BlockPayload::Text { runs } => runs.iter().map(|r| r.text.as_str()).collect(),
            BlockPayload::Image(image) => image.alt_text.clone().unwrap_or_default(),
        }
    }

    /// Number of characters of text content.
    pub fn char_len(&self) -> usize {
        self.runs().iter().map(|r| r.text.chars().count()).sum()
    }

    /// Check whether the block has nothing to show.
    pub fn is_empty(&self) -> bool {
        match &self.payload {
            BlockPayload::Text { runs } => runs.iter().all(|r| r.text.trim().is_empty()),
            BlockPayload::Image(image) => image.resource_id.is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heading_level_clamped() {
        assert_eq!(BlockKind::heading(9).heading_level(), Some(6));
        assert_eq!(BlockKind::heading(0).heading_level(), Some(1));
    }

    #[test]
    fn test_kind_class_ignores_level() {
        assert_eq!(BlockKind::heading(1).class(), BlockKind::heading(3).class());
        assert_ne!(BlockKind::Paragraph.class(), BlockKind::ListItem.class());
    }

    #[test]
    fn test_plain_text_and_len() {
        let block = Block::text(
            BlockKind::Paragraph,
            vec![TextRun::new("Hello, "), TextRun::bold("world")],
        );
        assert_eq!(block.plain_text(), "Hello, world");
        assert_eq!(block.char_len(), 12);
        assert!(!block.is_empty());
    }

    #[test]
    fn test_empty_detection() {
        assert!(Block::paragraph("   ").is_empty());
        assert!(!Block::image("img1", None).is_empty());
        assert_eq!(Block::image("img1", Some("chart".into())).plain_text(), "chart");
    }

    #[test]
    fn test_kind_serialization() {
        let json = serde_json::to_string(&BlockKind::heading(2)).unwrap();
        assert_eq!(json, r#"{"type":"heading","level":2}"#);
        assert_eq!(BlockKind::TableCell.to_string(), "table-cell");
    }
}
