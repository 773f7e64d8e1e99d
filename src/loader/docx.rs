//! DOCX loader reading WordprocessingML with roxmltree.

use std::collections::{BTreeMap, HashMap};
use std::io::{Cursor, Read};

use roxmltree::Node;
use zip::ZipArchive;

use super::{resolve_href, DocumentLoader, LoadOptions};
use crate::detect::{detect_format_from_bytes, InputFormat};
use crate::error::{Error, Result};
use crate::model::{
    mime_from_name, Alignment, Block, BlockKind, CellPosition, DocumentMetadata, ImageResource,
    LoadedDocument, SourceDocument, TextRun, TextStyle,
};

const DOCUMENT_XML: &str = "word/document.xml";
const RELS_XML: &str = "word/_rels/document.xml.rels";
const STYLES_XML: &str = "word/styles.xml";
const CORE_XML: &str = "docProps/core.xml";
/// English Metric Units per pixel at 96 dpi.
const EMU_PER_PX: u64 = 9525;

/// Loader for `.docx` files.
pub struct DocxLoader;

impl DocxLoader {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DocxLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentLoader for DocxLoader {
    fn format(&self) -> InputFormat {
        InputFormat::Docx
    }

    fn name(&self) -> &str {
        "docx"
    }

    fn supported_extensions(&self) -> &[&str] {
        &["docx"]
    }

    fn matches_signature(&self, bytes: &[u8]) -> bool {
        detect_format_from_bytes(bytes) == Some(InputFormat::Docx)
    }

    fn load(&self, source: &SourceDocument, options: &LoadOptions) -> Result<LoadedDocument> {
        let mut archive = ZipArchive::new(Cursor::new(source.bytes.as_slice()))?;

        let document_xml = read_optional(&mut archive, DOCUMENT_XML)?
            .ok_or_else(|| Error::CorruptInput(format!("{} missing", DOCUMENT_XML)))?;
        let relationships = match read_optional(&mut archive, RELS_XML)? {
            Some(xml) => parse_relationships(&xml)?,
            None => HashMap::new(),
        };
        let heading_styles = match read_optional(&mut archive, STYLES_XML)? {
            Some(xml) => parse_heading_styles(&xml).unwrap_or_else(|e| {
                log::warn!("Ignoring unreadable styles.xml: {}", e);
                HashMap::new()
            }),
            None => HashMap::new(),
        };
        let title = read_optional(&mut archive, CORE_XML)
            .ok()
            .flatten()
            .and_then(|xml| core_title(&xml));

        let tree = roxmltree::Document::parse(&document_xml)?;
        let body = tree
            .descendants()
            .find(|n| is_w(n, "body"))
            .ok_or_else(|| Error::CorruptInput("document.xml has no body".into()))?;

        let mut walker = BodyWalker {
            blocks: Vec::new(),
            images: BTreeMap::new(),
            relationships: &relationships,
            heading_styles: &heading_styles,
            archive: &mut archive,
            options,
            tables: 0,
        };
        walker.container(body);

        let mut doc = LoadedDocument::new(DocumentMetadata {
            title,
            source_name: source.name.clone(),
            ..Default::default()
        });
        let BodyWalker { blocks, images, .. } = walker;
        for block in blocks {
            doc.push(block);
        }
        doc.resources = images;
        Ok(doc)
    }
}

fn read_optional(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
    name: &str,
) -> Result<Option<String>> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut xml = String::new();
    file.read_to_string(&mut xml)
        .map_err(|e| Error::CorruptInput(format!("cannot read {}: {}", name, e)))?;
    Ok(Some(xml))
}

fn is_w(node: &Node<'_, '_>, local: &str) -> bool {
    node.is_element() && node.tag_name().name() == local
}

/// Attribute lookup by local name, ignoring the namespace prefix.
fn attr<'a>(node: &Node<'a, '_>, local: &str) -> Option<&'a str> {
    node.attributes()
        .find(|a| a.name() == local)
        .map(|a| a.value())
}

fn child<'a, 'i>(node: &Node<'a, 'i>, local: &str) -> Option<Node<'a, 'i>> {
    node.children().find(|c| is_w(c, local))
}

/// A toggle property such as `<w:b/>` is on unless `w:val` says otherwise.
fn toggle_on(props: Option<Node<'_, '_>>, local: &str) -> bool {
    props
        .and_then(|p| child(&p, local))
        .map(|n| !matches!(attr(&n, "val"), Some("0" | "false" | "none")))
        .unwrap_or(false)
}

fn parse_relationships(xml: &str) -> Result<HashMap<String, String>> {
    let tree = roxmltree::Document::parse(xml)?;
    Ok(tree
        .descendants()
        .filter(|n| is_w(n, "Relationship"))
        .filter_map(|n| {
            Some((
                n.attribute("Id")?.to_string(),
                n.attribute("Target")?.to_string(),
            ))
        })
        .collect())
}

fn parse_heading_styles(xml: &str) -> Result<HashMap<String, u8>> {
    let tree = roxmltree::Document::parse(xml)?;
    let mut levels = HashMap::new();
    for style in tree.descendants().filter(|n| is_w(n, "style")) {
        let Some(id) = attr(&style, "styleId") else {
            continue;
        };
        let name = child(&style, "name")
            .and_then(|n| attr(&n, "val"))
            .unwrap_or_default()
            .to_ascii_lowercase();
        let outline = child(&style, "pPr")
            .and_then(|p| child(&p, "outlineLvl"))
            .and_then(|n| attr(&n, "val"))
            .and_then(|v| v.parse::<u8>().ok());

        let level = heading_level_from_name(&name)
            .or_else(|| outline.filter(|l| *l < 9).map(|l| l + 1));
        if let Some(level) = level {
            levels.insert(id.to_string(), level.min(6));
        }
    }
    Ok(levels)
}

fn heading_level_from_name(name: &str) -> Option<u8> {
    let lower = name.to_ascii_lowercase().replace(' ', "");
    if lower == "title" {
        return Some(1);
    }
    lower
        .strip_prefix("heading")
        .and_then(|rest| rest.parse::<u8>().ok())
        .filter(|l| (1..=9).contains(l))
        .map(|l| l.min(6))
}

fn core_title(xml: &str) -> Option<String> {
    let tree = roxmltree::Document::parse(xml).ok()?;
    tree.descendants()
        .find(|n| is_w(n, "title"))
        .and_then(|n| n.text())
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Inline content collected from a paragraph.
enum Piece {
    Run(TextRun),
    Image { id: String, alt: Option<String> },
}

struct ParagraphProps {
    kind: BlockKind,
    alignment: Alignment,
    list_level: u8,
}

struct BodyWalker<'w, 'a> {
    blocks: Vec<Block>,
    images: BTreeMap<String, ImageResource>,
    relationships: &'w HashMap<String, String>,
    heading_styles: &'w HashMap<String, u8>,
    archive: &'w mut ZipArchive<Cursor<&'a [u8]>>,
    options: &'w LoadOptions,
    tables: usize,
}

impl BodyWalker<'_, '_> {
    fn container(&mut self, node: Node<'_, '_>) {
        for child in node.children().filter(|c| c.is_element()) {
            match child.tag_name().name() {
                "p" => self.paragraph(child),
                "tbl" => self.table(child),
                "sdt" => {
                    if let Some(content) = self::child(&child, "sdtContent") {
                        self.container(content);
                    }
                }
                _ => {}
            }
        }
    }

    fn paragraph_props(&self, p: Node<'_, '_>) -> ParagraphProps {
        let ppr = child(&p, "pPr");
        let style_id = ppr
            .and_then(|pr| child(&pr, "pStyle"))
            .and_then(|s| attr(&s, "val"))
            .unwrap_or_default();

        let heading = self
            .heading_styles
            .get(style_id)
            .copied()
            .or_else(|| heading_level_from_name(style_id));
        let numbering = ppr.and_then(|pr| child(&pr, "numPr"));
        let is_list = numbering.is_some() || style_id.eq_ignore_ascii_case("ListParagraph");
        let list_level = numbering
            .and_then(|n| child(&n, "ilvl"))
            .and_then(|n| attr(&n, "val"))
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        let kind = match heading {
            Some(level) => BlockKind::heading(level),
            None if is_list => BlockKind::ListItem,
            None => BlockKind::Paragraph,
        };
        let alignment = match ppr
            .and_then(|pr| child(&pr, "jc"))
            .and_then(|j| attr(&j, "val"))
        {
            Some("center") => Alignment::Center,
            Some("both" | "distribute") => Alignment::Justify,
            Some("right" | "end") => Alignment::End,
            _ => Alignment::Start,
        };
        ParagraphProps {
            kind,
            alignment,
            list_level,
        }
    }

    fn paragraph(&mut self, p: Node<'_, '_>) {
        let props = self.paragraph_props(p);
        let mut pieces = Vec::new();
        self.collect_runs(p, &mut pieces);

        let mut runs = Vec::new();
        for piece in pieces {
            match piece {
                Piece::Run(run) => runs.push(run),
                Piece::Image { id, alt } => {
                    self.emit_text(&props, std::mem::take(&mut runs), None);
                    self.blocks.push(Block::image(id, alt));
                }
            }
        }
        self.emit_text(&props, runs, None);
    }

    fn emit_text(&mut self, props: &ParagraphProps, runs: Vec<TextRun>, cell: Option<CellPosition>) {
        if runs.iter().all(|r| r.text.trim().is_empty()) {
            return;
        }
        let kind = if cell.is_some() {
            BlockKind::TableCell
        } else {
            props.kind
        };
        let mut block = Block::text(kind, runs).with_alignment(props.alignment);
        block.style.list_level = props.list_level;
        block.style.cell = cell;
        self.blocks.push(block);
    }

    fn collect_runs(&mut self, node: Node<'_, '_>, pieces: &mut Vec<Piece>) {
        for child in node.children().filter(|c| c.is_element()) {
            match child.tag_name().name() {
                "r" => self.run(child, pieces),
                "hyperlink" | "ins" | "smartTag" | "fldSimple" => self.collect_runs(child, pieces),
                "sdt" => {
                    if let Some(content) = self::child(&child, "sdtContent") {
                        self.collect_runs(content, pieces);
                    }
                }
                _ => {}
            }
        }
    }

    fn run(&mut self, r: Node<'_, '_>, pieces: &mut Vec<Piece>) {
        let rpr = child(&r, "rPr");
        let style = TextStyle {
            bold: toggle_on(rpr, "b"),
            italic: toggle_on(rpr, "i"),
            underline: toggle_on(rpr, "u"),
        };

        let mut text = String::new();
        for node in r.children().filter(|c| c.is_element()) {
            match node.tag_name().name() {
                "t" => text.push_str(node.text().unwrap_or_default()),
                "tab" => text.push('\t'),
                "br" | "cr" => text.push(' '),
                "drawing" | "pict" => {
                    if !text.is_empty() {
                        push_piece_run(pieces, std::mem::take(&mut text), &style);
                    }
                    if let Some(image) = self.drawing(node) {
                        pieces.push(image);
                    }
                }
                _ => {}
            }
        }
        if !text.is_empty() {
            push_piece_run(pieces, text, &style);
        }
    }

    fn drawing(&mut self, node: Node<'_, '_>) -> Option<Piece> {
        if !self.options.extract_images {
            return None;
        }
        let blip = node
            .descendants()
            .find(|n| is_w(n, "blip") || is_w(n, "imagedata"))?;
        let rel_id = attr(&blip, "embed").or_else(|| attr(&blip, "id"))?;
        let target = self.relationships.get(rel_id)?;
        let path = resolve_href(DOCUMENT_XML, target);

        if !self.images.contains_key(&path) {
            let data = match self.archive.by_name(&path) {
                Ok(mut file) => {
                    let mut data = Vec::new();
                    if let Err(e) = file.read_to_end(&mut data) {
                        log::warn!("Cannot read image {}: {}", path, e);
                        return None;
                    }
                    data
                }
                Err(e) => {
                    log::warn!("Image {} missing from archive: {}", path, e);
                    return None;
                }
            };
            let mut resource = ImageResource::new(data, mime_from_name(&path)).with_source(&path);
            if let Some(extent) = node.descendants().find(|n| is_w(n, "extent")) {
                let cx = attr(&extent, "cx").and_then(|v| v.parse::<u64>().ok());
                let cy = attr(&extent, "cy").and_then(|v| v.parse::<u64>().ok());
                if let (Some(cx), Some(cy)) = (cx, cy) {
                    resource =
                        resource.with_dimensions((cx / EMU_PER_PX) as u32, (cy / EMU_PER_PX) as u32);
                }
            }
            self.images.insert(path.clone(), resource);
        }

        let alt = node
            .descendants()
            .find(|n| is_w(n, "docPr"))
            .and_then(|n| attr(&n, "descr").or_else(|| attr(&n, "title")))
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string);
        Some(Piece::Image { id: path, alt })
    }

    fn table(&mut self, tbl: Node<'_, '_>) {
        let index = self.tables;
        self.tables += 1;

        let rows = tbl.children().filter(|c| is_w(c, "tr"));
        for (row, tr) in rows.enumerate() {
            let cells = tr.children().filter(|c| is_w(c, "tc"));
            for (col, tc) in cells.enumerate() {
                let position = CellPosition {
                    table: index,
                    row,
                    col,
                };
                self.cell(tc, position);
            }
        }
    }

    fn cell(&mut self, tc: Node<'_, '_>, position: CellPosition) {
        let mut runs: Vec<TextRun> = Vec::new();
        let mut props = None;
        for p in tc.children().filter(|c| is_w(c, "p")) {
            let paragraph_props = self.paragraph_props(p);
            let mut pieces = Vec::new();
            self.collect_runs(p, &mut pieces);
            for piece in pieces {
                match piece {
                    Piece::Run(run) => runs.push(run),
                    Piece::Image { id, alt } => {
                        let pending = std::mem::take(&mut runs);
                        self.emit_text(&paragraph_props, pending, Some(position));
                        self.blocks.push(Block::image(id, alt));
                    }
                }
            }
            if !runs.is_empty() {
                runs.push(TextRun::new(" "));
            }
            props.get_or_insert(paragraph_props);
        }
        if let Some(props) = props {
            self.emit_text(&props, runs, Some(position));
        }
    }
}

fn push_piece_run(pieces: &mut Vec<Piece>, text: String, style: &TextStyle) {
    if let Some(Piece::Run(last)) = pieces.last_mut() {
        if &last.style == style {
            last.text.push_str(&text);
            return;
        }
    }
    pieces.push(Piece::Run(TextRun {
        text,
        style: style.clone(),
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;

    const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

    fn build_docx(body: &str, extra: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options: FileOptions<'_, ()> = FileOptions::default();
        writer.start_file("word/document.xml", options).unwrap();
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><w:document xmlns:w="{}" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing"><w:body>{}</w:body></w:document>"#,
            W_NS, body
        );
        writer.write_all(xml.as_bytes()).unwrap();
        for (name, content) in extra {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn load(data: Vec<u8>) -> LoadedDocument {
        DocxLoader::new()
            .load(&SourceDocument::new("a.docx", data), &LoadOptions::default())
            .unwrap()
    }

    #[test]
    fn test_headings_lists_and_styles() {
        let data = build_docx(
            r#"<w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t>Intro</w:t></w:r></w:p>
               <w:p><w:pPr><w:jc w:val="center"/></w:pPr><w:r><w:rPr><w:b/></w:rPr><w:t>Bold</w:t></w:r><w:r><w:t xml:space="preserve"> plain</w:t></w:r></w:p>
               <w:p><w:pPr><w:numPr><w:ilvl w:val="1"/><w:numId w:val="1"/></w:numPr></w:pPr><w:r><w:t>Item</w:t></w:r></w:p>
               <w:p><w:r><w:rPr><w:b w:val="0"/></w:rPr><w:t>Not bold</w:t></w:r></w:p>"#,
            &[],
        );
        let doc = load(data);
        assert_eq!(doc.blocks.len(), 4);
        assert_eq!(doc.blocks[0].kind, BlockKind::heading(1));
        assert_eq!(doc.blocks[1].style.alignment, Alignment::Center);
        assert!(doc.blocks[1].runs()[0].style.bold);
        assert_eq!(doc.blocks[1].plain_text(), "Bold plain");
        assert_eq!(doc.blocks[2].kind, BlockKind::ListItem);
        assert_eq!(doc.blocks[2].style.list_level, 1);
        assert!(!doc.blocks[3].runs()[0].style.bold);
    }

    #[test]
    fn test_heading_level_from_styles_part() {
        let styles = format!(
            r#"<w:styles xmlns:w="{}"><w:style w:type="paragraph" w:styleId="Kop2"><w:name w:val="heading 2"/></w:style></w:styles>"#,
            W_NS
        );
        let data = build_docx(
            r#"<w:p><w:pPr><w:pStyle w:val="Kop2"/></w:pPr><w:r><w:t>Sectie</w:t></w:r></w:p>"#,
            &[("word/styles.xml", styles.as_bytes())],
        );
        let doc = load(data);
        assert_eq!(doc.blocks[0].kind, BlockKind::heading(2));
    }

    #[test]
    fn test_table_cells_row_major() {
        let data = build_docx(
            r#"<w:tbl><w:tr><w:tc><w:p><w:r><w:t>a</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>b</w:t></w:r></w:p></w:tc></w:tr>
               <w:tr><w:tc><w:p><w:r><w:t>c</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>d</w:t></w:r></w:p></w:tc></w:tr></w:tbl>"#,
            &[],
        );
        let doc = load(data);
        let cells: Vec<_> = doc
            .blocks
            .iter()
            .map(|b| (b.kind, b.plain_text().trim().to_string(), b.style.cell.unwrap().col))
            .collect();
        assert_eq!(cells.len(), 4);
        assert!(cells.iter().all(|(k, _, _)| *k == BlockKind::TableCell));
        assert_eq!(cells[3].1, "d");
        assert_eq!(cells[3].2, 1);
    }

    #[test]
    fn test_embedded_image() {
        let rels = br#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId5" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="media/image1.png"/></Relationships>"#;
        let png: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];
        let data = build_docx(
            r#"<w:p><w:r><w:t>Caption</w:t></w:r><w:r><w:drawing><wp:inline><wp:extent cx="952500" cy="476250"/><wp:docPr id="1" name="Picture 1" descr="A graph"/><a:graphic><a:graphicData><a:blip r:embed="rId5"/></a:graphicData></a:graphic></wp:inline></w:drawing></w:r></w:p>"#,
            &[("word/_rels/document.xml.rels", rels), ("word/media/image1.png", png)],
        );
        let doc = load(data);
        assert_eq!(doc.blocks.len(), 2);
        assert_eq!(doc.blocks[1].kind, BlockKind::Image);
        assert_eq!(doc.blocks[1].plain_text(), "A graph");
        let resource = doc.resources.get("word/media/image1.png").unwrap();
        assert_eq!(resource.mime_type, "image/png");
        assert_eq!(resource.width, Some(100));
        assert_eq!(resource.height, Some(50));
    }

    #[test]
    fn test_missing_document_part() {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options: FileOptions<'_, ()> = FileOptions::default();
        writer.start_file("word/other.xml", options).unwrap();
        writer.write_all(b"<x/>").unwrap();
        let data = writer.finish().unwrap().into_inner();
        let result = DocxLoader::new().load(&SourceDocument::new("a.docx", data), &LoadOptions::default());
        assert!(matches!(result, Err(Error::CorruptInput(_))));
    }
}
