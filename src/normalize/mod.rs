//! Structural normalization.
//!
//! Turns loader output from any container into the canonical block
//! sequence: cleaned text, no empty blocks, bounded list nesting, row-major
//! table cells, dense ordinals and a detected writing direction per block.
//! Text is never reordered or mirrored for direction.

mod cleanup;

pub use cleanup::{CleanupOptions, CleanupPreset, TextCleanup};

use unicode_bidi::{bidi_class, BidiClass};

use crate::error::{Error, Result};
use crate::model::{
    Block, BlockKind, BlockPayload, Direction, LoadedDocument, NormalizedDocument, TextRun,
};

/// Language tags written right-to-left, used when a document has no
/// strong directional characters.
const RTL_LANGUAGES: &[&str] = &["ar", "he", "fa", "ur", "yi", "ps", "sd", "ug", "dv"];

/// Options for the normalizer.
#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    /// Text cleanup applied to every run
    pub cleanup: CleanupOptions,

    /// Maximum list nesting depth; deeper items are flattened to the last level
    pub max_list_depth: u8,
}

impl NormalizeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set cleanup options.
    pub fn with_cleanup(mut self, cleanup: CleanupOptions) -> Self {
        self.cleanup = cleanup;
        self
    }

    /// Set maximum list nesting depth (at least 1).
    pub fn with_max_list_depth(mut self, depth: u8) -> Self {
        self.max_list_depth = depth.max(1);
        self
    }
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            cleanup: CleanupOptions::default(),
            max_list_depth: 3,
        }
    }
}

/// Maps loader output onto the canonical block sequence.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    options: NormalizeOptions,
    cleanup: TextCleanup,
}

impl Normalizer {
    pub fn new(options: NormalizeOptions) -> Self {
        let cleanup = TextCleanup::new(options.cleanup.clone());
        Self { options, cleanup }
    }

    /// Normalize a loaded document.
    ///
    /// Fails with [`Error::EmptyDocument`] when no block survives cleanup.
    pub fn normalize(&self, doc: LoadedDocument) -> Result<NormalizedDocument> {
        let LoadedDocument {
            blocks,
            resources,
            metadata,
            order_uncertain,
        } = doc;
        let max_level = self.options.max_list_depth.max(1) - 1;

        let mut out = Vec::with_capacity(blocks.len());
        for mut block in blocks {
            match &mut block.payload {
                BlockPayload::Text { runs } => {
                    *runs = self.clean_runs(std::mem::take(runs));
                    if runs.is_empty() {
                        continue;
                    }
                }
                BlockPayload::Image(image) => {
                    if !resources.contains_key(&image.resource_id) {
                        log::warn!(
                            "Dropping image block without resource: {}",
                            image.resource_id
                        );
                        continue;
                    }
                    if let Some(alt) = image.alt_text.take() {
                        let alt = self.cleanup.process(&alt).trim().to_string();
                        image.alt_text = Some(alt).filter(|a| !a.is_empty());
                    }
                }
            }

            if block.kind == BlockKind::ListItem {
                block.style.list_level = block.style.list_level.min(max_level);
            }
            out.push(block);
        }

        linearize_tables(&mut out);

        let doc_direction = document_direction(&out, metadata.language.as_deref());
        for (ordinal, block) in out.iter_mut().enumerate() {
            block.ordinal = ordinal;
            block.direction = detect_direction(&block.plain_text()).unwrap_or(doc_direction);
        }

        if out.is_empty() {
            return Err(Error::EmptyDocument);
        }
        log::debug!(
            "Normalized {} into {} blocks ({})",
            metadata.source_name,
            out.len(),
            doc_direction.as_str()
        );

        Ok(NormalizedDocument {
            blocks: out,
            resources,
            metadata,
            direction: doc_direction,
            order_uncertain,
        })
    }

    /// Clean runs, merge neighbours with equal style and trim the ends.
    fn clean_runs(&self, runs: Vec<TextRun>) -> Vec<TextRun> {
        let mut merged: Vec<TextRun> = Vec::with_capacity(runs.len());
        for run in runs {
            let mut text = self.cleanup.process(&run.text);
            let prev_space = merged.last().map_or(true, |r| r.text.ends_with(' '));
            if prev_space && text.starts_with(' ') {
                text.remove(0);
            }
            if text.is_empty() {
                continue;
            }
            match merged.last_mut() {
                Some(last) if last.style == run.style => last.text.push_str(&text),
                _ => merged.push(TextRun {
                    text,
                    style: run.style,
                }),
            }
        }

        while let Some(last) = merged.last_mut() {
            let trimmed = last.text.trim_end().len();
            last.text.truncate(trimmed);
            if !last.text.is_empty() {
                break;
            }
            merged.pop();
        }
        merged
    }
}

/// Sort each contiguous run of cells from one table into row-major order.
fn linearize_tables(blocks: &mut [Block]) {
    let mut start = 0;
    while start < blocks.len() {
        let Some(table) = blocks[start].style.cell.map(|c| c.table) else {
            start += 1;
            continue;
        };
        let mut end = start + 1;
        while end < blocks.len() && blocks[end].style.cell.map(|c| c.table) == Some(table) {
            end += 1;
        }
        blocks[start..end].sort_by_key(|b| b.style.cell.map(|c| (c.row, c.col)));
        start = end;
    }
}

/// Direction by majority of strong characters, or `None` when the text
/// has no strong characters.
pub fn detect_direction(text: &str) -> Option<Direction> {
    let (ltr, rtl) = strong_counts(text);
    match (ltr, rtl) {
        (0, 0) => None,
        (l, r) if r > l => Some(Direction::Rtl),
        _ => Some(Direction::Ltr),
    }
}

fn strong_counts(text: &str) -> (usize, usize) {
    text.chars().fold((0, 0), |(l, r), c| match bidi_class(c) {
        BidiClass::L => (l + 1, r),
        BidiClass::R | BidiClass::AL => (l, r + 1),
        _ => (l, r),
    })
}

fn document_direction(blocks: &[Block], language: Option<&str>) -> Direction {
    let (ltr, rtl) = blocks.iter().fold((0, 0), |(l, r), b| {
        let (bl, br) = strong_counts(&b.plain_text());
        (l + bl, r + br)
    });
    if ltr == 0 && rtl == 0 {
        let primary = language
            .and_then(|tag| tag.split(['-', '_']).next())
            .map(str::to_ascii_lowercase);
        return match primary {
            Some(tag) if RTL_LANGUAGES.contains(&tag.as_str()) => Direction::Rtl,
            _ => Direction::Ltr,
        };
    }
    if rtl > ltr {
        Direction::Rtl
    } else {
        Direction::Ltr
    }
}
