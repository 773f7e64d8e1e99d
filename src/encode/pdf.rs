//! PDF encoder built on lopdf.
//!
//! Text is set in the standard 14 fonts with WinAnsi encoding, so the
//! encoder refuses right-to-left text and characters WinAnsi cannot
//! represent. Lines are wrapped with the shared layout metrics; content
//! that outgrows a layout page continues on an overflow page, so the page
//! count reported is the number of pages actually written.

use std::collections::HashMap;
use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document as PdfDocument, Object, ObjectId, Stream, StringFormat};

use super::{DocumentEncoder, EncodedDocument, OutputFormat};
use crate::error::{Error, Result};
use crate::layout::metrics::{self, BLOCK_SPACING, COLUMN_GAP, LINE_HEIGHT, LIST_INDENT};
use crate::layout::{
    Cell, CellContent, FormatConfig, ImageFrame, ImagePlacement, Language, LayoutNode, LayoutTree,
    NodeKind, ProcessedImage,
};
use crate::model::{Alignment, BlockKind, TextRun, TextStyle};

/// Encoder for `.pdf` output.
pub struct PdfEncoder;

impl PdfEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PdfEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentEncoder for PdfEncoder {
    fn format(&self) -> OutputFormat {
        OutputFormat::Pdf
    }

    fn encode(&self, tree: &LayoutTree, _config: &FormatConfig) -> Result<EncodedDocument> {
        check_expressible(tree)?;

        let mut doc = PdfDocument::with_version("1.5");
        let pages_id = doc.new_object_id();
        let fonts = FontTable::register(&mut doc);

        let mut xobjects = Dictionary::new();
        let mut image_names = HashMap::new();
        for (i, image) in tree.images.iter().enumerate() {
            let name = format!("Im{}", i + 1);
            let id = embed_image(&mut doc, image)?;
            xobjects.set(name.as_bytes().to_vec(), id);
            image_names.insert(image.id.clone(), name);
        }

        let mut painter = Painter::new(tree, &image_names);
        for (i, page) in tree.pages.iter().enumerate() {
            if i > 0 {
                painter.end_layout_page();
            }
            for leaf in page.leaves() {
                painter.leaf(leaf);
            }
        }
        let pages = painter.finish();
        let page_count = pages.len();

        let resources_id = doc.add_object(dictionary! {
            "Font" => fonts.resource_dict(),
            "XObject" => xobjects,
        });
        let mut kids = Vec::with_capacity(page_count);
        for operations in pages {
            let content = Content { operations }.encode()?;
            let stream = Stream::new(
                dictionary! { "Filter" => "FlateDecode" },
                deflate(&content)?,
            );
            let content_id = doc.add_object(stream);
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }
        let g = &tree.geometry;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => page_count as i64,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), Object::Real(g.width), Object::Real(g.height)],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut info = dictionary! {
            "Producer" => Object::string_literal(format!("bifold {}", crate::VERSION)),
            "CreationDate" => Object::string_literal(
                chrono::Utc::now().format("D:%Y%m%d%H%M%SZ").to_string()
            ),
        };
        if let Some(title) = &tree.title {
            info.set("Title", text_string(title));
        }
        let info_id = doc.add_object(info);
        doc.trailer.set("Info", info_id);

        let mut data = Vec::new();
        doc.save_to(&mut data)?;
        if page_count != tree.page_count() {
            log::debug!(
                "PDF needed {} pages for {} layout pages",
                page_count,
                tree.page_count()
            );
        }
        Ok(EncodedDocument {
            format: OutputFormat::Pdf,
            data,
            page_count,
        })
    }
}

/// Fail before writing anything when the tree holds text the standard
/// fonts cannot show.
fn check_expressible(tree: &LayoutTree) -> Result<()> {
    for cell in tree.cells() {
        let CellContent::Text { runs } = &cell.content else {
            continue;
        };
        if cell.direction.is_rtl() {
            return Err(Error::EncodingUnsupportedFeature(format!(
                "right-to-left text in PDF (block {} of document {})",
                cell.ordinal,
                u8::from(cell.source)
            )));
        }
        for c in runs.iter().flat_map(|r| r.text.chars()) {
            if win_ansi(c).is_none() {
                return Err(Error::EncodingUnsupportedFeature(format!(
                    "character U+{:04X} outside WinAnsi in PDF (block {} of document {})",
                    c as u32,
                    cell.ordinal,
                    u8::from(cell.source)
                )));
            }
        }
    }
    Ok(())
}

/// WinAnsiEncoding byte for a character.
fn win_ansi(c: char) -> Option<u8> {
    let byte = match c {
        '\t' | '\n' | '\r' => b' ',
        ' '..='~' => c as u8,
        '\u{A0}'..='\u{FF}' => c as u32 as u8,
        '€' => 0x80,
        '‚' => 0x82,
        'ƒ' => 0x83,
        '„' => 0x84,
        '…' => 0x85,
        '†' => 0x86,
        '‡' => 0x87,
        'ˆ' => 0x88,
        '‰' => 0x89,
        'Š' => 0x8A,
        '‹' => 0x8B,
        'Œ' => 0x8C,
        'Ž' => 0x8E,
        '‘' => 0x91,
        '’' => 0x92,
        '“' => 0x93,
        '”' => 0x94,
        '•' => 0x95,
        '–' => 0x96,
        '—' => 0x97,
        '˜' => 0x98,
        '™' => 0x99,
        'š' => 0x9A,
        '›' => 0x9B,
        'œ' => 0x9C,
        'ž' => 0x9E,
        'Ÿ' => 0x9F,
        _ => return None,
    };
    Some(byte)
}

fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars().filter_map(win_ansi).collect()
}

/// A PDF text string: literal when ASCII, UTF-16BE otherwise.
fn text_string(text: &str) -> Object {
    if text.is_ascii() {
        return Object::string_literal(text);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Base14 {
    Helvetica,
    Times,
    Courier,
}

impl Base14 {
    const ALL: [Base14; 3] = [Base14::Helvetica, Base14::Times, Base14::Courier];

    /// Closest standard family for a configured font name.
    fn for_family(family: &str) -> Self {
        let name = family.to_ascii_lowercase();
        if name.contains("courier") || name.contains("mono") {
            Base14::Courier
        } else if name.contains("times")
            || name.contains("georgia")
            || name.contains("garamond")
            || name.contains("cambria")
            || (name.contains("serif") && !name.contains("sans"))
        {
            Base14::Times
        } else {
            Base14::Helvetica
        }
    }

    fn base_font(self, bold: bool, italic: bool) -> &'static str {
        match (self, bold, italic) {
            (Base14::Helvetica, false, false) => "Helvetica",
            (Base14::Helvetica, true, false) => "Helvetica-Bold",
            (Base14::Helvetica, false, true) => "Helvetica-Oblique",
            (Base14::Helvetica, true, true) => "Helvetica-BoldOblique",
            (Base14::Times, false, false) => "Times-Roman",
            (Base14::Times, true, false) => "Times-Bold",
            (Base14::Times, false, true) => "Times-Italic",
            (Base14::Times, true, true) => "Times-BoldItalic",
            (Base14::Courier, false, false) => "Courier",
            (Base14::Courier, true, false) => "Courier-Bold",
            (Base14::Courier, false, true) => "Courier-Oblique",
            (Base14::Courier, true, true) => "Courier-BoldOblique",
        }
    }

    fn index(self) -> usize {
        match self {
            Base14::Helvetica => 0,
            Base14::Times => 1,
            Base14::Courier => 2,
        }
    }
}

/// The twelve text faces of the standard fonts, registered once.
struct FontTable {
    ids: Vec<ObjectId>,
}

impl FontTable {
    fn register(doc: &mut PdfDocument) -> Self {
        let mut ids = Vec::with_capacity(12);
        for family in Base14::ALL {
            for (bold, italic) in [(false, false), (false, true), (true, false), (true, true)] {
                ids.push(doc.add_object(dictionary! {
                    "Type" => "Font",
                    "Subtype" => "Type1",
                    "BaseFont" => family.base_font(bold, italic),
                    "Encoding" => "WinAnsiEncoding",
                }));
            }
        }
        Self { ids }
    }

    fn slot(family: Base14, bold: bool, italic: bool) -> usize {
        family.index() * 4 + usize::from(bold) * 2 + usize::from(italic)
    }

    fn name(family: Base14, bold: bool, italic: bool) -> String {
        format!("F{}", Self::slot(family, bold, italic) + 1)
    }

    fn resource_dict(&self) -> Dictionary {
        let mut dict = Dictionary::new();
        for (slot, id) in self.ids.iter().enumerate() {
            dict.set(format!("F{}", slot + 1).into_bytes(), *id);
        }
        dict
    }
}

/// Add an image XObject, passing JPEG data through when possible.
fn embed_image(doc: &mut PdfDocument, image: &ProcessedImage) -> Result<ObjectId> {
    let decoded = image::load_from_memory(&image.data).map_err(|e| {
        Error::EncodingUnsupportedFeature(format!("{} image {} in PDF: {}", image.mime_type, image.id, e))
    })?;
    let (width, height) = (decoded.width() as i64, decoded.height() as i64);

    if image.mime_type == "image/jpeg" {
        let color_space = match decoded.color() {
            image::ColorType::L8 => Some("DeviceGray"),
            image::ColorType::Rgb8 => Some("DeviceRGB"),
            _ => None,
        };
        if let Some(color_space) = color_space {
            let stream = Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => width,
                    "Height" => height,
                    "ColorSpace" => color_space,
                    "BitsPerComponent" => 8,
                    "Filter" => "DCTDecode",
                },
                image.data.clone(),
            );
            return Ok(doc.add_object(stream));
        }
    }

    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width,
        "Height" => height,
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
        "Filter" => "FlateDecode",
    };
    if decoded.color().has_alpha() {
        let alpha: Vec<u8> = decoded.to_rgba8().pixels().map(|p| p.0[3]).collect();
        let mask = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            },
            deflate(&alpha)?,
        );
        let mask_id = doc.add_object(mask);
        dict.set("SMask", mask_id);
    }
    let rgb = decoded.to_rgb8();
    Ok(doc.add_object(Stream::new(dict, deflate(rgb.as_raw())?)))
}

/// A run of text in one face.
#[derive(Debug, Clone, PartialEq)]
struct Segment {
    text: String,
    style: TextStyle,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Line {
    segments: Vec<Segment>,
    width: f32,
    last: bool,
}

impl Line {
    fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    fn push(&mut self, text: &str, style: &TextStyle, space: bool, size: f32) {
        let space = space && !self.is_empty();
        match self.segments.last_mut() {
            Some(last) if &last.style == style => {
                if space {
                    last.text.push(' ');
                }
                last.text.push_str(text);
            }
            _ => {
                let mut segment = String::new();
                if space {
                    segment.push(' ');
                }
                segment.push_str(text);
                self.segments.push(Segment {
                    text: segment,
                    style: style.clone(),
                });
            }
        }
        if space {
            self.width += metrics::char_width(' ') * size;
        }
        self.width += metrics::text_width(text, size);
    }

    fn spaces(&self) -> usize {
        self.segments
            .iter()
            .map(|s| s.text.chars().filter(|c| *c == ' ').count())
            .sum()
    }
}

struct Word<'r> {
    text: &'r str,
    style: &'r TextStyle,
    space_before: bool,
}

/// Split runs into words, remembering whether whitespace preceded each.
fn words(runs: &[TextRun]) -> Vec<Word<'_>> {
    let mut words = Vec::new();
    let mut pending_space = false;
    for run in runs {
        let starts_with_space = run.text.starts_with(char::is_whitespace);
        let mut any = false;
        for (i, text) in run.text.split_whitespace().enumerate() {
            words.push(Word {
                text,
                style: &run.style,
                space_before: i > 0 || pending_space || starts_with_space,
            });
            any = true;
        }
        if any {
            pending_space = run.text.ends_with(char::is_whitespace);
        } else if !run.text.is_empty() {
            pending_space = true;
        }
    }
    words
}

/// Greedy wrap of styled runs to `width` points, breaking overlong words.
fn wrap_runs(runs: &[TextRun], size: f32, width: f32) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut line = Line::default();
    let space = metrics::char_width(' ') * size;

    for word in words(runs) {
        let word_width = metrics::text_width(word.text, size);
        let gap = if line.is_empty() || !word.space_before {
            0.0
        } else {
            space
        };
        if !line.is_empty() && line.width + gap + word_width > width {
            lines.push(std::mem::take(&mut line));
        }
        if word_width <= width || !line.is_empty() {
            line.push(word.text, word.style, word.space_before, size);
            continue;
        }

        let mut piece = String::new();
        let mut piece_width = 0.0f32;
        for c in word.text.chars() {
            let w = metrics::char_width(c) * size;
            if piece_width + w > width && !piece.is_empty() {
                line.push(&piece, word.style, false, size);
                lines.push(std::mem::take(&mut line));
                piece.clear();
                piece_width = 0.0;
            }
            piece.push(c);
            piece_width += w;
        }
        line.push(&piece, word.style, false, size);
    }
    if !line.is_empty() || lines.is_empty() {
        lines.push(line);
    }
    if let Some(last) = lines.last_mut() {
        last.last = true;
    }
    lines
}

enum Piece<'c> {
    Line(Line),
    Image(&'c ImageFrame),
}

/// One cell placed in a horizontal slot of the content area.
struct Column<'c> {
    cell: &'c Cell,
    x: f32,
    width: f32,
    indent: f32,
    marker: Option<String>,
    pieces: Vec<Piece<'c>>,
}

impl<'c> Column<'c> {
    fn new(cell: &'c Cell, x: f32, width: f32, marker: Option<String>) -> Self {
        let indent = if cell.kind == BlockKind::ListItem {
            LIST_INDENT * (cell.list_level as f32 + 1.0)
        } else {
            0.0
        };
        let pieces = match &cell.content {
            CellContent::Image(frame) => vec![Piece::Image(frame)],
            CellContent::Text { runs } => {
                wrap_runs(runs, cell.scaled_size(), (width - indent).max(1.0))
                    .into_iter()
                    .map(Piece::Line)
                    .collect()
            }
        };
        Self {
            cell,
            x,
            width,
            indent,
            marker,
            pieces,
        }
    }

    fn piece_height(&self, piece: &Piece<'_>) -> f32 {
        match piece {
            Piece::Line(_) => self.cell.scaled_size() * LINE_HEIGHT,
            Piece::Image(frame) => frame.height_pt,
        }
    }

    fn spacing(&self) -> f32 {
        match self.cell.content {
            CellContent::Image(_) => self.cell.font.size_pt * BLOCK_SPACING,
            CellContent::Text { .. } => self.cell.scaled_size() * BLOCK_SPACING,
        }
    }
}

/// Draws layout leaves top to bottom, opening overflow pages as needed.
struct Painter<'t> {
    tree: &'t LayoutTree,
    images: &'t HashMap<String, String>,
    pages: Vec<Vec<Operation>>,
    ops: Vec<Operation>,
    top: f32,
    bottom: f32,
    y: f32,
    used: bool,
    /// Ordered-list counters per document and nesting level
    counters: [Vec<u32>; 2],
}

impl<'t> Painter<'t> {
    fn new(tree: &'t LayoutTree, images: &'t HashMap<String, String>) -> Self {
        let g = &tree.geometry;
        let top = g.height - g.margin_top;
        Self {
            tree,
            images,
            pages: Vec::new(),
            ops: Vec::new(),
            top,
            bottom: g.margin_bottom,
            y: top,
            used: false,
            counters: [Vec::new(), Vec::new()],
        }
    }

    fn end_layout_page(&mut self) {
        if self.used {
            self.break_page();
        }
    }

    fn break_page(&mut self) {
        self.pages.push(std::mem::take(&mut self.ops));
        self.y = self.top;
        self.used = false;
    }

    fn finish(mut self) -> Vec<Vec<Operation>> {
        if self.used || self.pages.is_empty() {
            self.break_page();
        }
        self.pages
    }

    fn ensure(&mut self, height: f32) {
        if self.used && self.y - height < self.bottom {
            self.break_page();
        }
    }

    fn leaf(&mut self, leaf: &LayoutNode) {
        let g = &self.tree.geometry;
        let (left, full) = (g.margin_left, g.content_width());
        let column = (full - COLUMN_GAP) / 2.0;

        let columns = match &leaf.kind {
            NodeKind::SideBySideRow {
                primary: Some(p),
                secondary: Some(s),
            } => vec![
                self.column(p, left, column),
                self.column(s, left + column + COLUMN_GAP, column),
            ],
            NodeKind::SideBySideRow {
                primary: Some(only),
                secondary: None,
            }
            | NodeKind::SideBySideRow {
                primary: None,
                secondary: Some(only),
            }
            | NodeKind::InterleavedBlock(only)
            | NodeKind::ImageFrame(only) => vec![self.column(only, left, full)],
            NodeKind::SideBySideRow { .. } | NodeKind::Page { .. } | NodeKind::Section { .. } => {
                return
            }
        };
        self.draw_columns(&columns);
    }

    fn column<'c>(&mut self, cell: &'c Cell, x: f32, width: f32) -> Column<'c> {
        let marker = self.marker(cell);
        Column::new(cell, x, width, marker)
    }

    fn marker(&mut self, cell: &Cell) -> Option<String> {
        let counters = match cell.source {
            Language::First => &mut self.counters[0],
            Language::Second => &mut self.counters[1],
        };
        if cell.kind != BlockKind::ListItem {
            counters.clear();
            return None;
        }
        let level = cell.list_level as usize;
        counters.resize(level + 1, 0);
        if !cell.ordered {
            counters[level] = 0;
            return Some("•".to_string());
        }
        counters[level] += 1;
        Some(format!("{}.", counters[level]))
    }

    fn draw_columns(&mut self, columns: &[Column<'_>]) {
        let bands = columns.iter().map(|c| c.pieces.len()).max().unwrap_or(0);
        for band in 0..bands {
            let height = columns
                .iter()
                .filter_map(|c| c.pieces.get(band).map(|p| c.piece_height(p)))
                .fold(0.0f32, f32::max);
            self.ensure(height);
            let top = self.y;
            for column in columns {
                match column.pieces.get(band) {
                    Some(Piece::Line(line)) => self.draw_line(column, line, band == 0, top),
                    Some(Piece::Image(frame)) => self.draw_image(column, frame, top),
                    None => {}
                }
            }
            self.y -= height;
            self.used = true;
        }
        let spacing = columns.iter().map(Column::spacing).fold(0.0f32, f32::max);
        self.y -= spacing;
    }

    fn draw_line(&mut self, column: &Column<'_>, line: &Line, first: bool, top: f32) {
        let cell = column.cell;
        let size = cell.scaled_size();
        let family = Base14::for_family(&cell.font.family);
        let heading = cell.kind.is_heading();
        let baseline = top - size;
        let available = column.width - column.indent;

        let offset = match cell.alignment {
            Alignment::Center => (available - line.width) / 2.0,
            Alignment::End => available - line.width,
            Alignment::Start | Alignment::Justify => 0.0,
        }
        .max(0.0);
        let spaces = line.spaces();
        let word_spacing = if cell.alignment == Alignment::Justify && !line.last && spaces > 0 {
            ((available - line.width) / spaces as f32).max(0.0)
        } else {
            0.0
        };
        let start = column.x + column.indent + offset;

        if first {
            if let Some(marker) = &column.marker {
                let x = column.x + column.indent - LIST_INDENT + 2.0;
                self.marker_text(family, size, x, baseline, marker);
            }
        }

        self.ops.push(Operation::new("BT", vec![]));
        self.ops
            .push(Operation::new("Tw", vec![Object::Real(word_spacing)]));
        self.ops.push(Operation::new(
            "Td",
            vec![Object::Real(start), Object::Real(baseline)],
        ));
        let mut underlines = Vec::new();
        let mut x = start;
        for segment in &line.segments {
            let bold = heading || segment.style.bold;
            let name = FontTable::name(family, bold, segment.style.italic);
            self.ops.push(Operation::new(
                "Tf",
                vec![Object::Name(name.into_bytes()), Object::Real(size)],
            ));
            self.ops.push(Operation::new(
                "Tj",
                vec![Object::String(
                    encode_win_ansi(&segment.text),
                    StringFormat::Literal,
                )],
            ));
            let spaces = segment.text.chars().filter(|c| *c == ' ').count() as f32;
            let width = metrics::text_width(&segment.text, size) + spaces * word_spacing;
            if segment.style.underline {
                underlines.push((x, x + width));
            }
            x += width;
        }
        self.ops.push(Operation::new("ET", vec![]));

        for (from, to) in underlines {
            let y = baseline - size * 0.12;
            self.ops.extend([
                Operation::new("w", vec![Object::Real(size * 0.05)]),
                Operation::new("m", vec![Object::Real(from), Object::Real(y)]),
                Operation::new("l", vec![Object::Real(to), Object::Real(y)]),
                Operation::new("S", vec![]),
            ]);
        }
    }

    fn marker_text(&mut self, family: Base14, size: f32, x: f32, y: f32, marker: &str) {
        let name = FontTable::name(family, false, false);
        self.ops.extend([
            Operation::new("BT", vec![]),
            Operation::new("Tw", vec![Object::Real(0.0)]),
            Operation::new(
                "Tf",
                vec![Object::Name(name.into_bytes()), Object::Real(size)],
            ),
            Operation::new("Td", vec![Object::Real(x), Object::Real(y)]),
            Operation::new(
                "Tj",
                vec![Object::String(encode_win_ansi(marker), StringFormat::Literal)],
            ),
            Operation::new("ET", vec![]),
        ]);
    }

    fn draw_image(&mut self, column: &Column<'_>, frame: &ImageFrame, top: f32) {
        let Some(name) = self.images.get(&frame.image_id) else {
            log::warn!("Image {} missing from PDF resources", frame.image_id);
            return;
        };
        let x = match frame.placement {
            ImagePlacement::Left => column.x,
            ImagePlacement::Center => column.x + (column.width - frame.width_pt) / 2.0,
            ImagePlacement::Right => column.x + column.width - frame.width_pt,
        };
        let y = top - frame.height_pt;
        self.ops.extend([
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Real(frame.width_pt),
                    0.into(),
                    0.into(),
                    Object::Real(frame.height_pt),
                    Object::Real(x),
                    Object::Real(y),
                ],
            ),
            Operation::new("Do", vec![Object::Name(name.clone().into_bytes())]),
            Operation::new("Q", vec![]),
        ]);
    }
}
