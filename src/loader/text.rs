//! Plain text loader.
//!
//! Paragraphs are separated by blank lines. Headings and list items are
//! recognized with a few line-shape heuristics.

use std::sync::LazyLock;

use regex::Regex;

use super::{decode_text, DocumentLoader, LoadOptions};
use crate::detect::InputFormat;
use crate::error::Result;
use crate::model::{Block, DocumentMetadata, LoadedDocument, SourceDocument};

static CHAPTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:(?:chapter|part|book|section)\s+([\p{L}\d]+)\b|(?:prologue|epilogue)$)")
        .unwrap()
});
static ROMAN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^m{0,3}(?:cm|cd|d?c{0,3})(?:xc|xl|l?x{0,3})(?:ix|iv|v?i{0,3})$").unwrap()
});
static BLANK_LINE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n[ \t]*\n").unwrap());
static NUMBERED_HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+(?:\.\d+)*)\.?\s+\S").unwrap());
static BULLET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\s*)([-*•▪◦]|\d{1,3}[.)])\s+(.+)$").unwrap());

/// Longest single line still considered a heading candidate.
const MAX_HEADING_CHARS: usize = 80;

/// Loader for `.txt` files.
pub struct TextLoader;

impl TextLoader {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TextLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentLoader for TextLoader {
    fn format(&self) -> InputFormat {
        InputFormat::Text
    }

    fn name(&self) -> &str {
        "text"
    }

    fn supported_extensions(&self) -> &[&str] {
        &["txt", "text"]
    }

    fn load(&self, source: &SourceDocument, _options: &LoadOptions) -> Result<LoadedDocument> {
        let text = decode_text(&source.bytes)?;
        let mut doc = LoadedDocument::new(DocumentMetadata {
            source_name: source.name.clone(),
            ..Default::default()
        });
        for block in parse_text(&text) {
            doc.push(block);
        }
        doc.metadata.title = doc
            .blocks
            .iter()
            .find(|b| b.kind.is_heading())
            .map(|b| b.plain_text());
        Ok(doc)
    }
}

/// Split text into blocks.
pub(crate) fn parse_text(text: &str) -> Vec<Block> {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    let paragraphs: Vec<Vec<&str>> = BLANK_LINE_RE
        .split(&normalized)
        .map(|p| p.lines().filter(|l| !l.trim().is_empty()).collect::<Vec<_>>())
        .filter(|lines| !lines.is_empty())
        .collect();

    let mut blocks = Vec::new();
    for lines in &paragraphs {
        // Setext-style underline: "Title\n=====".
        if lines.len() == 2 {
            let underline = lines[1].trim();
            if underline.len() >= 3 && underline.chars().all(|c| c == '=') {
                blocks.push(Block::heading(lines[0].trim(), 1));
                continue;
            }
            if underline.len() >= 3 && underline.chars().all(|c| c == '-') {
                blocks.push(Block::heading(lines[0].trim(), 2));
                continue;
            }
        }

        if lines.iter().all(|l| BULLET_RE.is_match(l)) {
            for line in lines {
                if let Some(caps) = BULLET_RE.captures(line) {
                    let indent = caps.get(1).map_or(0, |m| m.as_str().len());
                    let mut item = Block::list_item(caps[3].trim(), (indent / 2) as u8);
                    item.style.ordered = caps[2].starts_with(|c: char| c.is_ascii_digit());
                    blocks.push(item);
                }
            }
            continue;
        }

        if lines.len() == 1 {
            if let Some(level) = heading_level(lines[0].trim()) {
                blocks.push(Block::heading(lines[0].trim(), level));
                continue;
            }
        }

        let joined = lines
            .iter()
            .map(|l| l.trim())
            .collect::<Vec<_>>()
            .join(" ");
        blocks.push(Block::paragraph(joined));
    }
    blocks
}

/// Level of a single-line paragraph that reads as a heading: short, with no
/// terminal punctuation, and shaped like `Chapter N`, a section number or
/// all capitals.
fn heading_level(line: &str) -> Option<u8> {
    let chars = line.chars().count();
    if chars == 0 || chars > MAX_HEADING_CHARS {
        return None;
    }
    let ends_sentence = line
        .chars()
        .last()
        .is_some_and(|c| matches!(c, '.' | '!' | '?' | ',' | ';' | '。' | '؟' | '،' | '！' | '？'));
    if ends_sentence {
        return None;
    }

    if let Some(caps) = CHAPTER_RE.captures(line) {
        if caps.get(1).map_or(true, |m| is_ordinal(m.as_str())) {
            return Some(1);
        }
    }
    if let Some(caps) = NUMBERED_HEADING_RE.captures(line) {
        let depth = caps[1].split('.').filter(|s| !s.is_empty()).count();
        return Some(depth.clamp(1, 6) as u8);
    }
    let has_case = line.chars().any(|c| c.is_uppercase());
    if has_case && !line.chars().any(|c| c.is_lowercase()) {
        return Some(1);
    }
    None
}

/// `12`, `IV` or a spelled-out number up to ten.
fn is_ordinal(token: &str) -> bool {
    const WORDS: [&str; 10] = [
        "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
    ];
    token.chars().all(|c| c.is_ascii_digit())
        || ROMAN_RE.is_match(token)
        || WORDS.iter().any(|w| w.eq_ignore_ascii_case(token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BlockKind;

    fn kinds(blocks: &[Block]) -> Vec<BlockKind> {
        blocks.iter().map(|b| b.kind).collect()
    }

    #[test]
    fn test_paragraphs_split_on_blank_lines() {
        let blocks = parse_text("First line\nstill first.\n\nSecond paragraph here.\n");
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].plain_text(), "First line still first.");
    }

    #[test]
    fn test_heading_heuristics() {
        let text = "CHAPTER ONE\n\nThe story begins on a quiet morning.\nIt rained.\n\n\
                    1.2 Background\n\nMore text follows here, in two lines.\nYes.";
        let blocks = parse_text(text);
        assert_eq!(
            kinds(&blocks),
            vec![
                BlockKind::heading(1),
                BlockKind::Paragraph,
                BlockKind::heading(2),
                BlockKind::Paragraph
            ]
        );
    }

    #[test]
    fn test_setext_heading() {
        let blocks = parse_text("Title\n=====\n\nBody text.");
        assert_eq!(blocks[0].kind, BlockKind::heading(1));
        assert_eq!(blocks[0].plain_text(), "Title");
    }

    #[test]
    fn test_list_items() {
        let blocks = parse_text("- apples\n- pears\n  - green pears\n\n1. first\n2. second");
        assert_eq!(blocks.len(), 5);
        assert!(blocks.iter().all(|b| b.kind == BlockKind::ListItem));
        assert_eq!(blocks[2].style.list_level, 1);
        assert!(blocks[3].style.ordered);
    }

    #[test]
    fn test_sentence_is_not_heading() {
        let blocks = parse_text("A short sentence.\n\nAnother one follows\nacross lines.");
        assert_eq!(blocks[0].kind, BlockKind::Paragraph);
    }

    #[test]
    fn test_blank_line_with_whitespace_separates_paragraphs() {
        let blocks = parse_text("First paragraph.\n   \nSecond paragraph.\n\t\nThird.");
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[1].plain_text(), "Second paragraph.");
    }

    #[test]
    fn test_keyword_sentence_is_not_heading() {
        let blocks = parse_text(
            "Part of the day was spent reading by the window.\n\n\
             Section by section, the plan came together.\n\n\
             Section mid season\n\n\
             NASA LAUNCHED IT.\n\n\
             A short line",
        );
        assert!(blocks.iter().all(|b| b.kind == BlockKind::Paragraph));
    }

    #[test]
    fn test_numbered_chapter_lines() {
        let blocks = parse_text("Chapter 12\n\nPart IV\n\nBook one\n\nPrologue\n\nChapter 3.");
        assert_eq!(
            kinds(&blocks),
            vec![
                BlockKind::heading(1),
                BlockKind::heading(1),
                BlockKind::heading(1),
                BlockKind::heading(1),
                BlockKind::Paragraph
            ]
        );
    }

    #[test]
    fn test_load_sets_title() {
        let source = SourceDocument::new("a.txt", b"INTRODUCTION\n\nSome body\ntext.".to_vec());
        let doc = TextLoader::new()
            .load(&source, &LoadOptions::default())
            .unwrap();
        assert_eq!(doc.metadata.title.as_deref(), Some("INTRODUCTION"));
        assert_eq!(doc.blocks.len(), 2);
    }
}
