//! Markdown loader built on pulldown-cmark.

use base64::Engine;
use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};

use super::{decode_text, DocumentLoader, LoadOptions};
use crate::detect::InputFormat;
use crate::error::Result;
use crate::model::{
    mime_from_name, Block, BlockKind, CellPosition, DocumentMetadata, ImageResource,
    LoadedDocument, SourceDocument, TextRun, TextStyle,
};

/// Loader for `.md` files.
pub struct MarkdownLoader;

impl MarkdownLoader {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MarkdownLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentLoader for MarkdownLoader {
    fn format(&self) -> InputFormat {
        InputFormat::Markdown
    }

    fn name(&self) -> &str {
        "markdown"
    }

    fn supported_extensions(&self) -> &[&str] {
        &["md", "markdown"]
    }

    fn load(&self, source: &SourceDocument, options: &LoadOptions) -> Result<LoadedDocument> {
        let text = decode_text(&source.bytes)?;
        let mut doc = LoadedDocument::new(DocumentMetadata {
            source_name: source.name.clone(),
            ..Default::default()
        });

        let mut state = MarkdownState::new(options);
        let mut parser_options = Options::empty();
        parser_options.insert(Options::ENABLE_TABLES);
        parser_options.insert(Options::ENABLE_STRIKETHROUGH);
        for event in Parser::new_ext(&text, parser_options) {
            state.handle(event);
        }
        state.flush();

        for block in state.blocks {
            doc.push(block);
        }
        for (id, resource) in state.resources {
            doc.add_resource(id, resource);
        }
        doc.metadata.title = doc
            .blocks
            .iter()
            .find(|b| b.kind.heading_level() == Some(1))
            .map(|b| b.plain_text());
        Ok(doc)
    }
}

struct TableCursor {
    index: usize,
    row: usize,
    col: usize,
}

struct PendingImage {
    url: String,
    alt: String,
}

struct MarkdownState<'a> {
    options: &'a LoadOptions,
    blocks: Vec<Block>,
    resources: Vec<(String, ImageResource)>,
    runs: Vec<TextRun>,
    bold: usize,
    italic: usize,
    heading: Option<u8>,
    lists: Vec<bool>,
    table: Option<TableCursor>,
    tables_seen: usize,
    image: Option<PendingImage>,
}

impl<'a> MarkdownState<'a> {
    fn new(options: &'a LoadOptions) -> Self {
        Self {
            options,
            blocks: Vec::new(),
            resources: Vec::new(),
            runs: Vec::new(),
            bold: 0,
            italic: 0,
            heading: None,
            lists: Vec::new(),
            table: None,
            tables_seen: 0,
            image: None,
        }
    }

    fn handle(&mut self, event: Event<'_>) {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                self.flush();
                self.heading = Some(level as u8);
            }
            Event::End(TagEnd::Heading(_)) => {
                self.flush();
                self.heading = None;
            }
            Event::Start(Tag::Paragraph) | Event::Start(Tag::CodeBlock(_)) => {
                if self.lists.is_empty() {
                    self.flush();
                } else {
                    self.push_text(" ");
                }
            }
            Event::End(TagEnd::Paragraph) | Event::End(TagEnd::CodeBlock) => {
                if self.lists.is_empty() {
                    self.flush();
                }
            }
            Event::Start(Tag::List(first)) => {
                self.flush();
                self.lists.push(first.is_some());
            }
            Event::End(TagEnd::List(_)) => {
                self.flush();
                self.lists.pop();
            }
            Event::Start(Tag::Item) | Event::End(TagEnd::Item) => self.flush(),
            Event::Start(Tag::Table(_)) => {
                self.flush();
                self.table = Some(TableCursor {
                    index: self.tables_seen,
                    row: 0,
                    col: 0,
                });
                self.tables_seen += 1;
            }
            Event::End(TagEnd::Table) => self.table = None,
            Event::Start(Tag::TableHead | Tag::TableRow) => {
                if let Some(table) = self.table.as_mut() {
                    table.col = 0;
                }
            }
            Event::End(TagEnd::TableHead | TagEnd::TableRow) => {
                if let Some(table) = self.table.as_mut() {
                    table.row += 1;
                }
            }
            Event::Start(Tag::TableCell) => self.runs.clear(),
            Event::End(TagEnd::TableCell) => {
                self.flush();
                if let Some(table) = self.table.as_mut() {
                    table.col += 1;
                }
            }
            Event::Start(Tag::Emphasis) => self.italic += 1,
            Event::End(TagEnd::Emphasis) => self.italic = self.italic.saturating_sub(1),
            Event::Start(Tag::Strong) => self.bold += 1,
            Event::End(TagEnd::Strong) => self.bold = self.bold.saturating_sub(1),
            Event::Start(Tag::Image { dest_url, .. }) => {
                self.flush();
                self.image = Some(PendingImage {
                    url: dest_url.to_string(),
                    alt: String::new(),
                });
            }
            Event::End(TagEnd::Image) => {
                if let Some(image) = self.image.take() {
                    self.push_image(image);
                }
            }
            Event::Text(text) | Event::Code(text) => self.push_text(&text),
            Event::SoftBreak | Event::HardBreak => self.push_text(" "),
            _ => {}
        }
    }

    fn push_text(&mut self, text: &str) {
        if let Some(image) = self.image.as_mut() {
            image.alt.push_str(text);
            return;
        }
        let style = TextStyle {
            bold: self.bold > 0,
            italic: self.italic > 0,
            underline: false,
        };
        match self.runs.last_mut() {
            Some(last) if last.style == style => last.text.push_str(text),
            _ => self.runs.push(TextRun {
                text: text.to_string(),
                style,
            }),
        }
    }

    fn flush(&mut self) {
        let runs = std::mem::take(&mut self.runs);
        if runs.iter().all(|r| r.text.trim().is_empty()) {
            return;
        }

        let mut block = if let Some(table) = &self.table {
            let mut block = Block::text(BlockKind::TableCell, runs);
            block.style.cell = Some(CellPosition {
                table: table.index,
                row: table.row,
                col: table.col,
            });
            block
        } else if let Some(level) = self.heading {
            Block::text(BlockKind::heading(level), runs)
        } else if let Some(ordered) = self.lists.last() {
            let mut block = Block::text(BlockKind::ListItem, runs);
            block.style.list_level = (self.lists.len() - 1) as u8;
            block.style.ordered = *ordered;
            block
        } else {
            Block::text(BlockKind::Paragraph, runs)
        };
        block.anchor.storage_index = self.blocks.len();
        self.blocks.push(block);
    }

    fn push_image(&mut self, image: PendingImage) {
        if !self.options.extract_images {
            return;
        }
        let id = format!("md{}", self.resources.len() + 1);
        let resource = self.resolve_image(&image.url);
        self.resources.push((id.clone(), resource));

        let alt = image.alt.trim();
        let alt = (!alt.is_empty()).then(|| alt.to_string());
        self.blocks.push(Block::image(id, alt));
    }

    fn resolve_image(&self, url: &str) -> ImageResource {
        if let Some(rest) = url.strip_prefix("data:") {
            if let Some((meta, payload)) = rest.split_once(";base64,") {
                if let Ok(data) = base64::engine::general_purpose::STANDARD.decode(payload) {
                    return ImageResource::new(data, meta);
                }
            }
        }

        let is_remote = url.starts_with("http://") || url.starts_with("https://");
        if let (false, Some(base)) = (is_remote, &self.options.base_dir) {
            let path = base.join(url);
            match std::fs::read(&path) {
                Ok(data) => return ImageResource::new(data, mime_from_name(url)).with_source(url),
                Err(e) => log::warn!("Image {} not readable: {}", path.display(), e),
            }
        }
        ImageResource::external(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(md: &str) -> LoadedDocument {
        let source = SourceDocument::new("doc.md", md.as_bytes().to_vec());
        MarkdownLoader::new()
            .load(&source, &LoadOptions::default())
            .unwrap()
    }

    #[test]
    fn test_headings_and_paragraphs() {
        let doc = load("# Title\n\nFirst *para*.\n\n## Sub\n\nSecond.");
        let kinds: Vec<_> = doc.blocks.iter().map(|b| b.kind).collect();
        assert_eq!(
            kinds,
            vec![
                BlockKind::heading(1),
                BlockKind::Paragraph,
                BlockKind::heading(2),
                BlockKind::Paragraph
            ]
        );
        assert_eq!(doc.metadata.title.as_deref(), Some("Title"));
        assert!(doc.blocks[1].runs()[1].style.italic);
    }

    #[test]
    fn test_nested_lists() {
        let doc = load("- one\n- two\n  - two.a\n\n1. first\n");
        let items: Vec<_> = doc
            .blocks
            .iter()
            .map(|b| (b.plain_text(), b.style.list_level, b.style.ordered))
            .collect();
        assert_eq!(
            items,
            vec![
                ("one".to_string(), 0, false),
                ("two".to_string(), 0, false),
                ("two.a".to_string(), 1, false),
                ("first".to_string(), 0, true),
            ]
        );
    }

    #[test]
    fn test_table_cells_row_major() {
        let doc = load("| a | b |\n|---|---|\n| c | d |\n");
        let cells: Vec<_> = doc
            .blocks
            .iter()
            .map(|b| {
                let pos = b.style.cell.unwrap();
                (b.plain_text(), pos.row, pos.col)
            })
            .collect();
        assert_eq!(
            cells,
            vec![
                ("a".to_string(), 0, 0),
                ("b".to_string(), 0, 1),
                ("c".to_string(), 1, 0),
                ("d".to_string(), 1, 1),
            ]
        );
    }

    #[test]
    fn test_external_image_kept_as_reference() {
        let doc = load("Text before.\n\n![A chart](https://example.com/chart.png)\n");
        assert_eq!(doc.blocks.len(), 2);
        assert_eq!(doc.blocks[1].kind, BlockKind::Image);
        assert_eq!(doc.blocks[1].plain_text(), "A chart");
        let resource = doc.resources.get("md1").unwrap();
        assert!(!resource.is_embedded());
    }

    #[test]
    fn test_image_resolved_from_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("pic.png"), [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A])
            .unwrap();
        let source = SourceDocument::new("doc.md", b"![pic](pic.png)".to_vec());
        let options = LoadOptions::default().with_base_dir(dir.path());
        let doc = MarkdownLoader::new().load(&source, &options).unwrap();
        let resource = doc.resources.get("md1").unwrap();
        assert!(resource.is_embedded());
        assert_eq!(resource.mime_type, "image/png");
    }
}
