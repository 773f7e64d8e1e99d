//! Builds the layout tree from aligned units.

use super::config::{FormatConfig, Language, LayoutMode};
use super::images::ImageStore;
use super::metrics::{self, BLOCK_SPACING, COLUMN_GAP, LIST_INDENT};
use super::node::{Cell, CellContent, FontSpec, ImageFrame, LayoutNode, LayoutTree, NodeKind};
use super::paginate::paginate;
use crate::error::{Error, Result};
use crate::model::{AlignedUnit, Block, BlockKind, BlockRef, NormalizedDocument, TextRun};

/// Pixels to points at 96 dpi.
const PT_PER_PX: f32 = 0.75;

/// Largest share of the page height an image frame may take.
const MAX_IMAGE_HEIGHT: f32 = 0.6;

/// Merges aligned units into a paginated [`LayoutTree`].
#[derive(Debug, Clone, Default)]
pub struct Composer {
    config: FormatConfig,
}

/// One side of a unit, ready to become a cell.
#[derive(Clone, Copy)]
struct Side<'d> {
    source: Language,
    block: &'d Block,
    doc: &'d NormalizedDocument,
}

impl Composer {
    pub fn new(config: FormatConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FormatConfig {
        &self.config
    }

    /// Compose aligned units of `first` and `second` into pages.
    pub fn compose(
        &self,
        units: &[AlignedUnit],
        first: &NormalizedDocument,
        second: &NormalizedDocument,
    ) -> Result<LayoutTree> {
        self.config.validate()?;
        if units.is_empty() {
            return Err(Error::AlignmentInfeasible("no aligned units to compose".into()));
        }

        let geometry = self.config.page_geometry();
        let mut images = ImageStore::new(self.config.image_quality);
        let section_level = first
            .blocks
            .iter()
            .chain(&second.blocks)
            .filter_map(|b| b.kind.heading_level())
            .min();

        let mut sections = Vec::new();
        let mut current: Vec<LayoutNode> = Vec::new();
        for (index, unit) in units.iter().enumerate() {
            let left = resolve(first, unit.left(), Language::First)?;
            let right = resolve(second, unit.right(), Language::Second)?;

            let opens_section = left.iter().chain(&right).any(|side| {
                matches!(
                    (side.block.kind.heading_level(), section_level),
                    (Some(level), Some(top)) if level <= top
                )
            });
            if opens_section && !current.is_empty() {
                sections.push(std::mem::take(&mut current));
            }

            let (primary, secondary) = match self.config.primary_language {
                Language::First => (left, right),
                Language::Second => (right, left),
            };
            current.extend(self.unit_nodes(index, primary, secondary, &mut images));
        }
        if !current.is_empty() {
            sections.push(current);
        }

        let pages = paginate(sections, geometry.content_height());
        log::info!(
            "Composed {} units into {} pages ({}, {} images)",
            units.len(),
            pages.len(),
            self.config.layout_mode,
            images.len()
        );

        Ok(LayoutTree {
            pages,
            images,
            geometry,
            mode: self.config.layout_mode,
            title: self
                .config
                .title
                .clone()
                .or_else(|| first.metadata.title.clone()),
            directions: [first.direction, second.direction],
            languages: [first.metadata.language.clone(), second.metadata.language.clone()],
        })
    }

    fn unit_nodes(
        &self,
        index: usize,
        primary: Option<Side<'_>>,
        secondary: Option<Side<'_>>,
        images: &mut ImageStore,
    ) -> Vec<LayoutNode> {
        let full = self.config.page_geometry().content_width();
        let column = (full - COLUMN_GAP) / 2.0;

        if let (Some(p), Some(s)) = (primary, secondary) {
            if let Some(cell) = self.shared_image(p, s, full, images) {
                let height = cell.height_pt;
                return vec![LayoutNode::leaf(NodeKind::ImageFrame(cell), index, height)];
            }
        }

        match self.config.layout_mode {
            LayoutMode::SideBySide => {
                let sides: Vec<Side<'_>> = primary.into_iter().chain(secondary).collect();
                if let [only] = sides.as_slice() {
                    let cell = self.cell(*only, full, images);
                    let height = cell.height_pt;
                    let kind = if cell.frame().is_some() {
                        NodeKind::ImageFrame(cell)
                    } else if primary.is_some() {
                        NodeKind::SideBySideRow {
                            primary: Some(cell),
                            secondary: None,
                        }
                    } else {
                        NodeKind::SideBySideRow {
                            primary: None,
                            secondary: Some(cell),
                        }
                    };
                    return vec![LayoutNode::leaf(kind, index, height)];
                }
                let p = primary.map(|side| self.cell(side, column, images));
                let s = secondary.map(|side| self.cell(side, column, images));
                let height = p
                    .iter()
                    .chain(&s)
                    .map(|c| c.height_pt)
                    .fold(0.0f32, f32::max);
                vec![LayoutNode::leaf(
                    NodeKind::SideBySideRow {
                        primary: p,
                        secondary: s,
                    },
                    index,
                    height,
                )]
            }
            LayoutMode::Interleaved => primary
                .into_iter()
                .chain(secondary)
                .map(|side| {
                    let cell = self.cell(side, full, images);
                    let height = cell.height_pt;
                    let kind = if cell.frame().is_some() {
                        NodeKind::ImageFrame(cell)
                    } else {
                        NodeKind::InterleavedBlock(cell)
                    };
                    LayoutNode::leaf(kind, index, height)
                })
                .collect(),
        }
    }

    /// A single frame when both sides show the same image bytes.
    fn shared_image(
        &self,
        p: Side<'_>,
        s: Side<'_>,
        width: f32,
        images: &mut ImageStore,
    ) -> Option<Cell> {
        let a = p.doc.resource_for(p.block)?;
        let b = s.doc.resource_for(s.block)?;
        let a_id = images.insert(a)?.id.clone();
        let b_id = images.insert(b)?.id.clone();
        if a_id != b_id {
            return None;
        }
        log::debug!("Sharing {} between blocks {} and {}", a_id, p.block.ordinal, s.block.ordinal);
        Some(self.cell(p, width, images))
    }

    fn font(&self, source: Language) -> FontSpec {
        FontSpec {
            family: self.config.font_for(source).to_string(),
            size_pt: self.config.font_size_pt,
        }
    }

    fn cell(&self, side: Side<'_>, width: f32, images: &mut ImageStore) -> Cell {
        let Side { source, block, doc } = side;
        let font = self.font(source);
        let mut kind = block.kind;

        let content = match block.image_ref() {
            Some(image_ref) => {
                let stored = doc
                    .resource_for(block)
                    .and_then(|r| images.insert(r))
                    .map(|img| (img.id.clone(), img.width, img.height));
                match stored {
                    Some((image_id, w, h)) => {
                        let max_h = self.config.page_geometry().content_height() * MAX_IMAGE_HEIGHT;
                        let (width_pt, height_pt) = frame_size(w, h, width, max_h);
                        CellContent::Image(ImageFrame {
                            image_id,
                            alt: image_ref.alt_text.clone(),
                            placement: self.config.image_placement,
                            width_pt,
                            height_pt,
                        })
                    }
                    None => {
                        let label = image_ref
                            .alt_text
                            .clone()
                            .or_else(|| doc.resource_for(block).and_then(|r| r.source.clone()))
                            .unwrap_or_else(|| image_ref.resource_id.clone());
                        log::warn!("Image {} has no embedded data; writing a placeholder", label);
                        kind = BlockKind::Paragraph;
                        CellContent::Text {
                            runs: vec![TextRun::italic(format!("[image: {}]", label))],
                        }
                    }
                }
            }
            None => CellContent::Text {
                runs: block.runs().to_vec(),
            },
        };

        let height_pt = match &content {
            CellContent::Image(frame) => frame.height_pt + font.size_pt * BLOCK_SPACING,
            CellContent::Text { runs } => {
                let text: String = runs.iter().map(|r| r.text.as_str()).collect();
                let indent = if kind == BlockKind::ListItem {
                    LIST_INDENT * (block.style.list_level as f32 + 1.0)
                } else {
                    0.0
                };
                metrics::text_block_height(&text, kind, font.size_pt, (width - indent).max(1.0))
            }
        };

        Cell {
            source,
            ordinal: block.ordinal,
            kind,
            direction: block.direction,
            alignment: block.style.alignment,
            list_level: block.style.list_level,
            ordered: block.style.ordered,
            font,
            content,
            height_pt,
        }
    }
}

fn resolve(
    doc: &NormalizedDocument,
    block: Option<BlockRef>,
    source: Language,
) -> Result<Option<Side<'_>>> {
    let Some(r) = block else {
        return Ok(None);
    };
    let block = doc.block(r.index()).ok_or_else(|| {
        Error::AlignmentInfeasible(format!(
            "aligned unit refers to missing block {} of document {}",
            r.index(),
            u8::from(source)
        ))
    })?;
    Ok(Some(Side { source, block, doc }))
}

/// Fit an image of `w`x`h` pixels into `max_w`x`max_h` points, never upscaling.
fn frame_size(w: Option<u32>, h: Option<u32>, max_w: f32, max_h: f32) -> (f32, f32) {
    match (w, h) {
        (Some(w), Some(h)) if w > 0 && h > 0 => {
            let (w, h) = (w as f32 * PT_PER_PX, h as f32 * PT_PER_PX);
            let scale = (max_w / w).min(max_h / h).min(1.0);
            (w * scale, h * scale)
        }
        _ => {
            let width = max_w * 0.5;
            (width, (width * 0.75).min(max_h))
        }
    }
}
