//! The bilingual layout tree consumed by encoders.

use serde::Serialize;

use super::config::{ImagePlacement, Language, LayoutMode, PageGeometry};
use super::images::{ImageStore, ProcessedImage};
use crate::model::{Alignment, BlockKind, Direction, TextRun};

/// Resolved font for one cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FontSpec {
    pub family: String,
    pub size_pt: f32,
}

/// A placed image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageFrame {
    /// Id in the layout's [`ImageStore`]
    pub image_id: String,
    pub alt: Option<String>,
    pub placement: ImagePlacement,
    pub width_pt: f32,
    pub height_pt: f32,
}

/// Content of one cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CellContent {
    Text { runs: Vec<TextRun> },
    Image(ImageFrame),
}

/// One block of one document, with resolved style.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cell {
    /// Document the block came from
    pub source: Language,
    /// Block ordinal within its document
    pub ordinal: usize,
    pub kind: BlockKind,
    pub direction: Direction,
    pub alignment: Alignment,
    pub list_level: u8,
    pub ordered: bool,
    pub font: FontSpec,
    pub content: CellContent,
    /// Estimated height in points, including spacing after
    pub height_pt: f32,
}

impl Cell {
    pub fn runs(&self) -> &[TextRun] {
        match &self.content {
            CellContent::Text { runs } => runs,
            CellContent::Image(_) => &[],
        }
    }

    pub fn frame(&self) -> Option<&ImageFrame> {
        match &self.content {
            CellContent::Image(frame) => Some(frame),
            CellContent::Text { .. } => None,
        }
    }

    pub fn plain_text(&self) -> String {
        match &self.content {
            CellContent::Text { runs } => runs.iter().map(|r| r.text.as_str()).collect(),
            CellContent::Image(frame) => frame.alt.clone().unwrap_or_default(),
        }
    }

    /// Font size after applying the heading scale.
    pub fn scaled_size(&self) -> f32 {
        self.font.size_pt * super::metrics::font_scale(self.kind)
    }

    /// Kind this cell reads back as when it is stored inside a table.
    fn kind_in_table(&self) -> BlockKind {
        match self.content {
            CellContent::Image(_) => BlockKind::Image,
            CellContent::Text { .. } => BlockKind::TableCell,
        }
    }
}

/// Kind of a layout node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    /// One output page holding sections
    Page { number: u32 },
    /// Content between two top-level headings
    Section {
        /// Continues a section from the previous page
        continued: bool,
    },
    /// Two columns; a missing side makes the other span the full width
    SideBySideRow {
        primary: Option<Cell>,
        secondary: Option<Cell>,
    },
    /// One block stacked in the flow
    InterleavedBlock(Cell),
    /// A full-width image, shared by both sides when identical
    ImageFrame(Cell),
}

/// A node of the layout tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutNode {
    pub kind: NodeKind,
    /// Index of the aligned unit a leaf renders
    pub unit: Option<usize>,
    pub height_pt: f32,
    pub children: Vec<LayoutNode>,
}

impl LayoutNode {
    pub fn leaf(kind: NodeKind, unit: usize, height_pt: f32) -> Self {
        Self {
            kind,
            unit: Some(unit),
            height_pt,
            children: Vec::new(),
        }
    }

    pub fn container(kind: NodeKind, children: Vec<LayoutNode>) -> Self {
        let height_pt = children.iter().map(|c| c.height_pt).sum();
        Self {
            kind,
            unit: None,
            height_pt,
            children,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
            && !matches!(self.kind, NodeKind::Page { .. } | NodeKind::Section { .. })
    }

    /// Leaves of this subtree in order.
    pub fn leaves(&self) -> Vec<&LayoutNode> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a LayoutNode>) {
        if self.is_leaf() {
            out.push(self);
        }
        for child in &self.children {
            child.collect_leaves(out);
        }
    }

    /// Cells of a leaf in reading order.
    pub fn cells(&self) -> Vec<&Cell> {
        match &self.kind {
            NodeKind::SideBySideRow { primary, secondary } => {
                primary.iter().chain(secondary.iter()).collect()
            }
            NodeKind::InterleavedBlock(cell) | NodeKind::ImageFrame(cell) => vec![cell],
            NodeKind::Page { .. } | NodeKind::Section { .. } => Vec::new(),
        }
    }
}

/// A composed bilingual document.
#[derive(Debug, Clone)]
pub struct LayoutTree {
    /// Page nodes in order
    pub pages: Vec<LayoutNode>,
    pub images: ImageStore,
    pub geometry: PageGeometry,
    pub mode: LayoutMode,
    pub title: Option<String>,
    /// Dominant direction of the first and second document
    pub directions: [Direction; 2],
    /// Language tags of the first and second document, when declared
    pub languages: [Option<String>; 2],
}

impl LayoutTree {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// All leaves in document order.
    pub fn leaves(&self) -> Vec<&LayoutNode> {
        self.pages.iter().flat_map(|p| p.leaves()).collect()
    }

    /// All cells in document order.
    pub fn cells(&self) -> Vec<&Cell> {
        self.leaves().into_iter().flat_map(|l| l.cells()).collect()
    }

    pub fn image(&self, frame: &ImageFrame) -> Option<&ProcessedImage> {
        self.images.get(&frame.image_id)
    }

    /// Whether any cell is right-to-left.
    pub fn has_rtl(&self) -> bool {
        self.cells().iter().any(|c| c.direction.is_rtl())
    }

    pub fn direction_of(&self, source: Language) -> Direction {
        match source {
            Language::First => self.directions[0],
            Language::Second => self.directions[1],
        }
    }

    pub fn language_of(&self, source: Language) -> Option<&str> {
        match source {
            Language::First => self.languages[0].as_deref(),
            Language::Second => self.languages[1].as_deref(),
        }
    }

    /// Block kinds an encoding of this tree reads back as.
    ///
    /// Side-by-side rows are written as table rows, so their text cells
    /// read back as table cells; everything else keeps its kind.
    pub fn implied_kinds(&self) -> Vec<BlockKind> {
        let mut kinds = Vec::new();
        for leaf in self.leaves() {
            match &leaf.kind {
                NodeKind::SideBySideRow { .. } => {
                    kinds.extend(leaf.cells().iter().map(|c| c.kind_in_table()))
                }
                NodeKind::InterleavedBlock(cell) => kinds.push(cell.kind),
                NodeKind::ImageFrame(_) => kinds.push(BlockKind::Image),
                NodeKind::Page { .. } | NodeKind::Section { .. } => {}
            }
        }
        kinds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(kind: BlockKind, text: &str) -> Cell {
        Cell {
            source: Language::First,
            ordinal: 0,
            kind,
            direction: Direction::Ltr,
            alignment: Alignment::Start,
            list_level: 0,
            ordered: false,
            font: FontSpec {
                family: "Serif".into(),
                size_pt: 12.0,
            },
            content: CellContent::Text {
                runs: vec![TextRun::new(text)],
            },
            height_pt: 20.0,
        }
    }

    #[test]
    fn test_leaves_and_implied_kinds() {
        let row = LayoutNode::leaf(
            NodeKind::SideBySideRow {
                primary: Some(cell(BlockKind::heading(1), "Title")),
                secondary: Some(cell(BlockKind::heading(1), "Titre")),
            },
            0,
            20.0,
        );
        let block = LayoutNode::leaf(
            NodeKind::InterleavedBlock(cell(BlockKind::ListItem, "item")),
            1,
            20.0,
        );
        let section = LayoutNode::container(NodeKind::Section { continued: false }, vec![row, block]);
        let page = LayoutNode::container(NodeKind::Page { number: 1 }, vec![section]);

        assert_eq!(page.height_pt, 40.0);
        assert_eq!(page.leaves().len(), 2);
        assert_eq!(page.leaves()[0].cells().len(), 2);

        let tree = LayoutTree {
            pages: vec![page],
            images: ImageStore::new(Default::default()),
            geometry: super::super::config::FormatConfig::default().page_geometry(),
            mode: LayoutMode::SideBySide,
            title: None,
            directions: [Direction::Ltr, Direction::Ltr],
            languages: [None, None],
        };
        assert_eq!(
            tree.implied_kinds(),
            vec![BlockKind::TableCell, BlockKind::TableCell, BlockKind::ListItem]
        );
        assert!(!tree.has_rtl());
    }
}
