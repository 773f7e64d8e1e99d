//! PDF loader built on lopdf.
//!
//! Pages are decoded into positioned spans (see [`layout`]), grouped into
//! lines and blocks, and read column by column. Heading levels come from
//! font sizes relative to the document's body size.

mod layout;

use std::io::Cursor;
use std::sync::LazyLock;

use lopdf::{Document as LopdfDocument, Object, ObjectId};
use regex::Regex;

use self::layout::{
    decode_text_simple, detect_columns, detect_headings, group_lines_into_blocks,
    group_spans_into_lines, ColumnLayout, FontStatistics, ImagePlacement, LayoutAnalyzer,
    PageContent, TextBlock, TextSpan,
};
use super::{DocumentLoader, LoadOptions};
use crate::detect::{is_pdf_bytes, InputFormat};
use crate::error::{Error, Result};
use crate::model::{
    Block, BlockKind, DocumentMetadata, ImageResource, LoadedDocument, SourceAnchor, SourceDocument,
    TextRun, TextStyle,
};

static LIST_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:([•▪◦‣*–-])|\(?(\d{1,3})[.)])\s+").unwrap());

/// Loader for `.pdf` files.
pub struct PdfLoader;

impl PdfLoader {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PdfLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentLoader for PdfLoader {
    fn format(&self) -> InputFormat {
        InputFormat::Pdf
    }

    fn name(&self) -> &str {
        "pdf"
    }

    fn supported_extensions(&self) -> &[&str] {
        &["pdf"]
    }

    fn matches_signature(&self, bytes: &[u8]) -> bool {
        is_pdf_bytes(bytes)
    }

    fn load(&self, source: &SourceDocument, options: &LoadOptions) -> Result<LoadedDocument> {
        let pdf = LopdfDocument::load_mem(&source.bytes).map_err(|e| match e {
            lopdf::Error::Decryption(_) => Error::UnsupportedFormat("encrypted PDF".into()),
            other => Error::from(other),
        })?;
        if pdf.is_encrypted() {
            return Err(Error::UnsupportedFormat("encrypted PDF".into()));
        }

        let pages = pdf.get_pages();
        let analyzer = LayoutAnalyzer::new(&pdf);

        let mut contents: Vec<(u32, PageContent)> = Vec::with_capacity(pages.len());
        let mut stats = FontStatistics::default();
        for (&page_num, &page_id) in &pages {
            match analyzer.extract_page(page_id) {
                Ok(content) => {
                    for span in &content.spans {
                        stats.add_size(span.font_size, span.text.chars().count());
                    }
                    contents.push((page_num, content));
                }
                Err(e) if options.is_lenient() => {
                    log::warn!("Skipping page {}: {}", page_num, e);
                }
                Err(e) => return Err(e),
            }
        }
        stats.analyze();
        log::debug!(
            "PDF body size {:.1}pt, {} heading sizes",
            stats.body_size,
            stats.heading_sizes.len()
        );

        let mut doc = LoadedDocument::new(DocumentMetadata {
            title: info_title(&pdf),
            source_name: source.name.clone(),
            page_count: Some(pages.len() as u32),
            ..Default::default()
        });

        for (page_num, content) in contents {
            let (items, uncertain) = page_items(content, &stats);
            if uncertain {
                log::warn!("Page {}: column order is ambiguous, using storage order", page_num);
                doc.order_uncertain = true;
            }

            for item in items {
                let anchor = SourceAnchor {
                    page: Some(page_num),
                    storage_index: 0,
                };
                match item {
                    PageItem::Text(block) => {
                        if let Some(block) = text_block_to_block(&block) {
                            doc.push(block.with_anchor(anchor));
                        }
                    }
                    PageItem::Image(placement) => {
                        if !options.extract_images {
                            continue;
                        }
                        let Some(id) = placement.object_id else {
                            continue;
                        };
                        let resource_id = format!("pdf-img-{}-{}", id.0, id.1);
                        if !doc.resources.contains_key(&resource_id) {
                            match extract_image(&pdf, id) {
                                Some(resource) => doc.add_resource(resource_id.clone(), resource),
                                None => {
                                    log::warn!(
                                        "Page {}: image {} has an unsupported encoding",
                                        page_num,
                                        String::from_utf8_lossy(&placement.name)
                                    );
                                    continue;
                                }
                            }
                        }
                        doc.push(Block::image(resource_id, None).with_anchor(anchor));
                    }
                }
            }
        }

        Ok(doc)
    }
}

enum PageItem {
    Text(TextBlock),
    Image(ImagePlacement),
}

/// Lay out one page; the flag reports an ambiguous column structure.
fn page_items(content: PageContent, stats: &FontStatistics) -> (Vec<PageItem>, bool) {
    let PageContent { spans, images } = content;

    let columns = match detect_columns(&spans) {
        ColumnLayout::Columns(columns) if !columns.is_empty() => columns,
        ColumnLayout::Columns(_) => {
            return (images.into_iter().map(PageItem::Image).collect(), false);
        }
        ColumnLayout::Ambiguous => return (storage_order(spans, images, stats), true),
    };

    let column_of = |x: f32| {
        columns
            .iter()
            .position(|c| c.contains(x))
            .unwrap_or(if x < columns[0].left { 0 } else { columns.len() - 1 })
    };

    let mut per_column: Vec<Vec<TextSpan>> = vec![Vec::new(); columns.len()];
    for span in spans {
        per_column[column_of(span.x)].push(span);
    }
    let mut images_per_column: Vec<Vec<ImagePlacement>> = vec![Vec::new(); columns.len()];
    for image in images {
        images_per_column[column_of(image.x + image.width / 2.0)].push(image);
    }

    let mut items = Vec::new();
    for (spans, images) in per_column.into_iter().zip(images_per_column) {
        let mut lines = group_spans_into_lines(spans, true);
        detect_headings(&mut lines, stats);

        let mut column: Vec<(f32, PageItem)> = group_lines_into_blocks(lines)
            .into_iter()
            .map(|b| (b.top(), PageItem::Text(b)))
            .chain(images.into_iter().map(|i| (i.top, PageItem::Image(i))))
            .collect();
        column.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        items.extend(column.into_iter().map(|(_, item)| item));
    }
    (items, false)
}

/// Content-stream order for pages whose columns cannot be separated.
fn storage_order(
    mut spans: Vec<TextSpan>,
    images: Vec<ImagePlacement>,
    stats: &FontStatistics,
) -> Vec<PageItem> {
    spans.sort_by_key(|s| s.seq);
    let mut lines = group_spans_into_lines(spans, false);
    detect_headings(&mut lines, stats);

    let mut items: Vec<(usize, PageItem)> = group_lines_into_blocks(lines)
        .into_iter()
        .map(|b| (b.min_seq(), PageItem::Text(b)))
        .chain(images.into_iter().map(|i| (i.seq, PageItem::Image(i))))
        .collect();
    items.sort_by_key(|(seq, _)| *seq);
    items.into_iter().map(|(_, item)| item).collect()
}

fn text_block_to_block(block: &TextBlock) -> Option<Block> {
    if block.is_empty() {
        return None;
    }

    let mut runs: Vec<TextRun> = Vec::new();
    for line in &block.lines {
        let text = line.text();
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        let style = TextStyle {
            bold: line.is_bold(),
            italic: line.is_italic(),
            underline: false,
        };
        match runs.last_mut() {
            Some(last) if last.style == style => {
                let joins_hyphen =
                    last.text.ends_with('-') && text.chars().next().is_some_and(char::is_lowercase);
                if joins_hyphen {
                    last.text.pop();
                } else {
                    last.text.push(' ');
                }
                last.text.push_str(text);
            }
            Some(last) => {
                last.text.push(' ');
                runs.push(TextRun {
                    text: text.to_string(),
                    style,
                });
            }
            None => runs.push(TextRun {
                text: text.to_string(),
                style,
            }),
        }
    }

    if block.heading_level > 0 {
        return Some(Block::text(BlockKind::heading(block.heading_level), runs));
    }

    let first = runs.first()?.text.clone();
    if let Some(caps) = LIST_MARKER_RE.captures(&first) {
        let marker_len = caps.get(0).map(|m| m.end()).unwrap_or(0);
        let ordered = caps.get(2).is_some();
        runs[0].text = first[marker_len..].to_string();
        runs.retain(|r| !r.text.is_empty());
        if runs.is_empty() {
            return None;
        }
        let mut item = Block::text(BlockKind::ListItem, runs);
        item.style.ordered = ordered;
        return Some(item);
    }

    Some(Block::text(BlockKind::Paragraph, runs))
}

fn info_title(pdf: &LopdfDocument) -> Option<String> {
    let info_ref = pdf.trailer.get(b"Info").ok()?.as_reference().ok()?;
    let info = pdf.get_dictionary(info_ref).ok()?;
    match info.get(b"Title").ok()? {
        Object::String(bytes, _) => Some(decode_text_simple(bytes))
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty()),
        _ => None,
    }
}

/// Extract an image XObject as JPEG passthrough or re-encoded PNG.
fn extract_image(pdf: &LopdfDocument, id: ObjectId) -> Option<ImageResource> {
    let stream = pdf.get_object(id).ok()?.as_stream().ok()?;
    let dict = &stream.dict;
    if dict.get(b"Subtype").ok()?.as_name_str().ok()? != "Image" {
        return None;
    }

    let dimension = |key: &[u8]| {
        dict.get(key)
            .ok()
            .and_then(|v| v.as_i64().ok())
            .and_then(|v| u32::try_from(v).ok())
    };
    let (width, height) = (dimension(b"Width")?, dimension(b"Height")?);

    let filters: Vec<&str> = match dict.get(b"Filter") {
        Ok(Object::Name(_)) => dict
            .get(b"Filter")
            .ok()
            .and_then(|f| f.as_name_str().ok())
            .into_iter()
            .collect(),
        Ok(Object::Array(arr)) => arr.iter().filter_map(|f| f.as_name_str().ok()).collect(),
        _ => Vec::new(),
    };

    if filters.last() == Some(&"DCTDecode") && filters.len() == 1 {
        return Some(
            ImageResource::new(stream.content.clone(), "image/jpeg").with_dimensions(width, height),
        );
    }
    if filters.iter().any(|f| !matches!(*f, "FlateDecode" | "Fl")) {
        return None;
    }

    let bits = dimension(b"BitsPerComponent").unwrap_or(8);
    let color_space = dict
        .get(b"ColorSpace")
        .ok()
        .and_then(|c| c.as_name_str().ok())
        .unwrap_or("DeviceRGB");
    if bits != 8 {
        return None;
    }

    let raw = if filters.is_empty() {
        stream.content.clone()
    } else {
        stream.decompressed_content().ok()?
    };
    let image = match color_space {
        "DeviceRGB" => image::RgbImage::from_raw(width, height, raw).map(image::DynamicImage::from),
        "DeviceGray" => {
            image::GrayImage::from_raw(width, height, raw).map(image::DynamicImage::from)
        }
        _ => None,
    }?;

    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .ok()?;
    Some(ImageResource::new(png, "image/png").with_dimensions(width, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Stream};

    fn text_op(x: i64, y: i64, size: i64, font: &str, text: &str) -> Vec<Operation> {
        vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![font.into(), size.into()]),
            Operation::new("Td", vec![x.into(), y.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ]
    }

    fn build_pdf(pages: Vec<Vec<Operation>>, title: Option<&str>) -> Vec<u8> {
        let mut doc = LopdfDocument::with_version("1.5");
        let pages_id = doc.new_object_id();
        let regular = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let bold = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica-Bold",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => regular, "F2" => bold },
        });

        let mut kids = Vec::new();
        for operations in pages {
            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }
        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        if let Some(title) = title {
            let info_id = doc.add_object(dictionary! {
                "Title" => Object::string_literal(title),
            });
            doc.trailer.set("Info", info_id);
        }

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    fn load(data: Vec<u8>) -> LoadedDocument {
        PdfLoader::new()
            .load(&SourceDocument::new("doc.pdf", data), &LoadOptions::default())
            .unwrap()
    }

    #[test]
    fn test_headings_and_paragraphs() {
        let mut ops = text_op(72, 760, 24, "F2", "Introduction");
        for y in [720, 706, 692, 678] {
            ops.extend(text_op(72, y, 11, "F1", "The first paragraph of body text."));
        }
        for y in [640, 626, 612, 598] {
            ops.extend(text_op(72, y, 11, "F1", "The second paragraph of body text."));
        }
        for y in [560, 546] {
            ops.extend(text_op(72, y, 11, "F1", "A closing paragraph with more words."));
        }
        let doc = load(build_pdf(vec![ops], Some("Annual Report")));

        assert_eq!(doc.metadata.title.as_deref(), Some("Annual Report"));
        assert_eq!(doc.metadata.page_count, Some(1));
        assert_eq!(doc.blocks[0].kind, BlockKind::heading(1));
        assert_eq!(doc.blocks[0].plain_text(), "Introduction");
        assert!(doc.blocks[0].runs()[0].style.bold);
        assert_eq!(doc.blocks.len(), 4);
        assert_eq!(doc.blocks[1].kind, BlockKind::Paragraph);
        assert_eq!(doc.blocks[3].anchor.page, Some(1));
        assert!(!doc.order_uncertain);
    }

    #[test]
    fn test_pages_in_order_with_anchors() {
        let one = text_op(72, 700, 12, "F1", "Page one text.");
        let two = text_op(72, 700, 12, "F1", "Page two text.");
        let doc = load(build_pdf(vec![one, two], None));
        let texts: Vec<_> = doc.blocks.iter().map(|b| b.plain_text()).collect();
        assert_eq!(texts, vec!["Page one text.", "Page two text."]);
        assert_eq!(doc.blocks[1].anchor.page, Some(2));
        assert_eq!(doc.blocks[1].anchor.storage_index, 1);
    }

    #[test]
    fn test_list_markers() {
        let mut ops = text_op(72, 700, 12, "F1", "1. First step");
        ops.extend(text_op(72, 686, 12, "F1", "continued here"));
        ops.extend(text_op(72, 630, 12, "F1", "- Loose bullet"));
        let doc = load(build_pdf(vec![ops], None));
        assert_eq!(doc.blocks[0].kind, BlockKind::ListItem);
        assert!(doc.blocks[0].style.ordered);
        assert_eq!(doc.blocks[0].plain_text(), "First step continued here");
        assert_eq!(doc.blocks[1].kind, BlockKind::ListItem);
        assert!(!doc.blocks[1].style.ordered);
        assert_eq!(doc.blocks[1].plain_text(), "Loose bullet");
    }

    #[test]
    fn test_two_columns_read_left_first() {
        let mut ops = Vec::new();
        for i in 0..12 {
            let y = 760 - i * 14;
            ops.extend(text_op(50, y, 10, "F1", "left column words go here"));
            ops.extend(text_op(330, y, 10, "F1", "right column words go here"));
        }
        let doc = load(build_pdf(vec![ops], None));
        assert_eq!(doc.blocks.len(), 2);
        assert!(doc.blocks[0].plain_text().starts_with("left"));
        assert!(doc.blocks[1].plain_text().starts_with("right"));
        assert!(!doc.order_uncertain);
    }

    #[test]
    fn test_crossed_gutter_falls_back_to_storage_order() {
        // Right column is written before the left one.
        let mut ops = text_op(100, 740, 10, "F1", "A full width title that crosses the middle gutter");
        for i in 0..40 {
            ops.extend(text_op(330, 700 - i * 14, 10, "F1", "right column text here"));
        }
        for i in 0..40 {
            ops.extend(text_op(50, 700 - i * 14, 10, "F1", "left column text here"));
        }
        let doc = load(build_pdf(vec![ops], None));

        assert!(doc.order_uncertain);
        let first = |needle: &str| {
            doc.blocks
                .iter()
                .position(|b| b.plain_text().contains(needle))
                .unwrap()
        };
        assert_eq!(first("A full width title"), 0);
        assert!(first("right column") < first("left column"));
    }

    #[test]
    fn test_invalid_pdf_is_corrupt() {
        let result = PdfLoader::new().load(
            &SourceDocument::new("bad.pdf", b"%PDF-1.4\nnot really".to_vec()),
            &LoadOptions::default(),
        );
        assert!(matches!(result, Err(Error::CorruptInput(_)) | Err(Error::Io(_))));
    }
}
