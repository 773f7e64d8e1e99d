//! DOCX encoder writing WordprocessingML.
//!
//! Side-by-side rows become rows of a two-column table; a row with one
//! side spans both columns. Interleaved blocks and image frames are plain
//! paragraphs. Layout pages are separated by explicit page breaks.

use std::fmt::Write as _;
use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::{escape_xml, DocumentEncoder, EncodedDocument, OutputFormat};
use crate::error::{Error, Result};
use crate::layout::{
    Cell, CellContent, FormatConfig, ImageFrame, ImagePlacement, LayoutNode, LayoutTree, NodeKind,
};
use crate::model::{Alignment, BlockKind, Direction, TextRun};

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const R_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const WP_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
const A_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const PIC_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";
const REL_TYPE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

const EMU_PER_PT: f32 = 12700.0;
const TWIPS_PER_PT: f32 = 20.0;
/// Numbering definitions written to numbering.xml.
const BULLET_NUM_ID: u32 = 1;
const DECIMAL_NUM_ID: u32 = 2;

/// Encoder for `.docx` output.
pub struct DocxEncoder;

impl DocxEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DocxEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentEncoder for DocxEncoder {
    fn format(&self) -> OutputFormat {
        OutputFormat::Docx
    }

    fn encode(&self, tree: &LayoutTree, _config: &FormatConfig) -> Result<EncodedDocument> {
        let mut body = BodyWriter::new(tree);
        for (i, page) in tree.pages.iter().enumerate() {
            if i > 0 {
                body.close_table();
                body.xml.push_str(r#"<w:p><w:r><w:br w:type="page"/></w:r></w:p>"#);
            }
            for leaf in page.leaves() {
                body.leaf(leaf)?;
            }
        }
        body.close_table();

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut put = |name: &str, data: &[u8]| -> Result<()> {
            writer.start_file(name, options)?;
            writer.write_all(data)?;
            Ok(())
        };

        put("[Content_Types].xml", content_types(tree).as_bytes())?;
        put("_rels/.rels", ROOT_RELS.as_bytes())?;
        put("docProps/core.xml", core_xml(tree).as_bytes())?;
        put("word/document.xml", document_xml(tree, &body.xml).as_bytes())?;
        put("word/_rels/document.xml.rels", document_rels(tree).as_bytes())?;
        put("word/styles.xml", styles_xml().as_bytes())?;
        put("word/numbering.xml", NUMBERING_XML.as_bytes())?;
        for image in tree.images.iter() {
            put(&format!("word/media/{}", image.file_name()), &image.data)?;
        }

        let data = writer.finish()?.into_inner();
        Ok(EncodedDocument {
            format: OutputFormat::Docx,
            data,
            page_count: tree.page_count(),
        })
    }
}

struct BodyWriter<'t> {
    tree: &'t LayoutTree,
    xml: String,
    in_table: bool,
    drawings: u32,
}

impl<'t> BodyWriter<'t> {
    fn new(tree: &'t LayoutTree) -> Self {
        Self {
            tree,
            xml: String::new(),
            in_table: false,
            drawings: 0,
        }
    }

    fn leaf(&mut self, leaf: &LayoutNode) -> Result<()> {
        match &leaf.kind {
            NodeKind::SideBySideRow { primary, secondary } => {
                self.open_table();
                self.xml.push_str("<w:tr>");
                match (primary, secondary) {
                    (Some(p), Some(s)) => {
                        self.table_cell(p, 1)?;
                        self.table_cell(s, 1)?;
                    }
                    (Some(only), None) | (None, Some(only)) => self.table_cell(only, 2)?,
                    (None, None) => {}
                }
                self.xml.push_str("</w:tr>");
            }
            NodeKind::InterleavedBlock(cell) | NodeKind::ImageFrame(cell) => {
                self.close_table();
                self.paragraph(cell)?;
            }
            NodeKind::Page { .. } | NodeKind::Section { .. } => {}
        }
        Ok(())
    }

    fn open_table(&mut self) {
        if self.in_table {
            return;
        }
        let half = (self.tree.geometry.content_width() / 2.0 * TWIPS_PER_PT) as u32;
        let _ = write!(
            self.xml,
            r#"<w:tbl><w:tblPr><w:tblW w:w="5000" w:type="pct"/><w:tblLayout w:type="fixed"/><w:tblCellMar><w:left w:w="100" w:type="dxa"/><w:right w:w="100" w:type="dxa"/></w:tblCellMar></w:tblPr><w:tblGrid><w:gridCol w:w="{half}"/><w:gridCol w:w="{half}"/></w:tblGrid>"#
        );
        self.in_table = true;
    }

    fn close_table(&mut self) {
        if self.in_table {
            self.xml.push_str("</w:tbl>");
            self.in_table = false;
        }
    }

    fn table_cell(&mut self, cell: &Cell, span: u32) -> Result<()> {
        self.xml.push_str("<w:tc><w:tcPr>");
        if span > 1 {
            let _ = write!(self.xml, r#"<w:gridSpan w:val="{}"/>"#, span);
        }
        self.xml.push_str("</w:tcPr>");
        self.paragraph(cell)?;
        self.xml.push_str("</w:tc>");
        Ok(())
    }

    fn paragraph(&mut self, cell: &Cell) -> Result<()> {
        let rtl = cell.direction == Direction::Rtl;
        self.xml.push_str("<w:p><w:pPr>");
        if let Some(level) = cell.kind.heading_level() {
            let _ = write!(self.xml, r#"<w:pStyle w:val="Heading{}"/>"#, level);
        }
        if cell.kind == BlockKind::ListItem {
            let num_id = if cell.ordered {
                DECIMAL_NUM_ID
            } else {
                BULLET_NUM_ID
            };
            let _ = write!(
                self.xml,
                r#"<w:numPr><w:ilvl w:val="{}"/><w:numId w:val="{}"/></w:numPr>"#,
                cell.list_level, num_id
            );
        }
        if rtl {
            self.xml.push_str("<w:bidi/>");
        }
        let jc = match cell.frame() {
            Some(frame) => placement_jc(frame.placement),
            None => alignment_jc(cell.alignment),
        };
        if let Some(jc) = jc {
            let _ = write!(self.xml, r#"<w:jc w:val="{}"/>"#, jc);
        }
        self.xml.push_str("</w:pPr>");

        match &cell.content {
            CellContent::Text { runs } => {
                for run in runs {
                    self.run(cell, run, rtl);
                }
            }
            CellContent::Image(frame) => self.drawing(frame)?,
        }
        self.xml.push_str("</w:p>");
        Ok(())
    }

    fn run(&mut self, cell: &Cell, run: &TextRun, rtl: bool) {
        let family = escape_xml(&cell.font.family);
        let half_points = (cell.scaled_size() * 2.0).round() as u32;
        let _ = write!(
            self.xml,
            r#"<w:r><w:rPr><w:rFonts w:ascii="{f}" w:hAnsi="{f}" w:cs="{f}"/>"#,
            f = family
        );
        if run.style.bold {
            self.xml.push_str("<w:b/><w:bCs/>");
        }
        if run.style.italic {
            self.xml.push_str("<w:i/><w:iCs/>");
        }
        if run.style.underline {
            self.xml.push_str(r#"<w:u w:val="single"/>"#);
        }
        if rtl {
            self.xml.push_str("<w:rtl/>");
        }
        let _ = write!(
            self.xml,
            r#"<w:sz w:val="{hp}"/><w:szCs w:val="{hp}"/></w:rPr><w:t xml:space="preserve">{text}</w:t></w:r>"#,
            hp = half_points,
            text = escape_xml(&run.text)
        );
    }

    fn drawing(&mut self, frame: &ImageFrame) -> Result<()> {
        let image = self.tree.image(frame).ok_or_else(|| {
            Error::EncodingUnsupportedFeature(format!("image {} is not in the layout", frame.image_id))
        })?;
        if !matches!(image.mime_type.as_str(), "image/jpeg" | "image/png" | "image/gif") {
            return Err(Error::EncodingUnsupportedFeature(format!(
                "{} images in DOCX",
                image.mime_type
            )));
        }
        self.drawings += 1;
        let id = self.drawings;
        let cx = (frame.width_pt * EMU_PER_PT) as u64;
        let cy = (frame.height_pt * EMU_PER_PT) as u64;
        let alt = escape_xml(frame.alt.as_deref().unwrap_or_default());
        let _ = write!(
            self.xml,
            r#"<w:r><w:drawing><wp:inline distT="0" distB="0" distL="0" distR="0"><wp:extent cx="{cx}" cy="{cy}"/><wp:docPr id="{id}" name="Picture {id}" descr="{alt}"/><a:graphic><a:graphicData uri="{PIC_NS}"><pic:pic><pic:nvPicPr><pic:cNvPr id="{id}" name="{file}"/><pic:cNvPicPr/></pic:nvPicPr><pic:blipFill><a:blip r:embed="{rel}"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill><pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr></pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing></w:r>"#,
            file = image.file_name(),
            rel = image_rel_id(&image.id),
        );
        Ok(())
    }
}

fn alignment_jc(alignment: Alignment) -> Option<&'static str> {
    match alignment {
        Alignment::Start => None,
        Alignment::Center => Some("center"),
        Alignment::End => Some("end"),
        Alignment::Justify => Some("both"),
    }
}

fn placement_jc(placement: ImagePlacement) -> Option<&'static str> {
    match placement {
        ImagePlacement::Center => Some("center"),
        ImagePlacement::Left => Some("left"),
        ImagePlacement::Right => Some("right"),
    }
}

fn image_rel_id(image_id: &str) -> String {
    format!("rId_{}", image_id)
}

fn document_xml(tree: &LayoutTree, body: &str) -> String {
    let g = &tree.geometry;
    let twips = |pt: f32| (pt * TWIPS_PER_PT).round() as u32;
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="{W_NS}" xmlns:r="{R_NS}" xmlns:wp="{WP_NS}" xmlns:a="{A_NS}" xmlns:pic="{PIC_NS}"><w:body>{body}<w:sectPr><w:pgSz w:w="{w}" w:h="{h}"/><w:pgMar w:top="{top}" w:right="{right}" w:bottom="{bottom}" w:left="{left}" w:header="708" w:footer="708" w:gutter="0"/></w:sectPr></w:body></w:document>"#,
        w = twips(g.width),
        h = twips(g.height),
        top = twips(g.margin_top),
        right = twips(g.margin_right),
        bottom = twips(g.margin_bottom),
        left = twips(g.margin_left),
    )
}

fn content_types(tree: &LayoutTree) -> String {
    let mut defaults = String::new();
    let mut seen = Vec::new();
    for image in tree.images.iter() {
        let ext = image.extension();
        if !seen.contains(&ext) {
            seen.push(ext);
            let _ = write!(
                defaults,
                r#"<Default Extension="{}" ContentType="{}"/>"#,
                ext, image.mime_type
            );
        }
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/>{defaults}<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/><Override PartName="/word/numbering.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.numbering+xml"/><Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/></Types>"#
    )
}

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/></Relationships>"#;

fn document_rels(tree: &LayoutTree) -> String {
    let mut rels = format!(
        r#"<Relationship Id="rId1" Type="{REL_TYPE}/styles" Target="styles.xml"/><Relationship Id="rId2" Type="{REL_TYPE}/numbering" Target="numbering.xml"/>"#
    );
    for image in tree.images.iter() {
        let _ = write!(
            rels,
            r#"<Relationship Id="{}" Type="{REL_TYPE}/image" Target="media/{}"/>"#,
            image_rel_id(&image.id),
            image.file_name()
        );
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{rels}</Relationships>"#
    )
}

fn core_xml(tree: &LayoutTree) -> String {
    let title = escape_xml(tree.title.as_deref().unwrap_or("Bilingual document"));
    let created = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"><dc:title>{title}</dc:title><dcterms:created xsi:type="dcterms:W3CDTF">{created}</dcterms:created></cp:coreProperties>"#
    )
}

fn styles_xml() -> String {
    let mut styles = String::new();
    for level in 1..=6u8 {
        let _ = write!(
            styles,
            r#"<w:style w:type="paragraph" w:styleId="Heading{level}"><w:name w:val="heading {level}"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/><w:pPr><w:keepNext/><w:spacing w:before="240" w:after="120"/><w:outlineLvl w:val="{outline}"/></w:pPr><w:rPr><w:b/><w:bCs/></w:rPr></w:style>"#,
            outline = level - 1
        );
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="{W_NS}"><w:docDefaults><w:pPrDefault><w:pPr><w:spacing w:after="120" w:line="300" w:lineRule="auto"/></w:pPr></w:pPrDefault></w:docDefaults><w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/><w:qFormat/></w:style>{styles}</w:styles>"#
    )
}

const NUMBERING_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:numbering xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:abstractNum w:abstractNumId="0"><w:lvl w:ilvl="0"><w:start w:val="1"/><w:numFmt w:val="bullet"/><w:lvlText w:val="•"/><w:pPr><w:ind w:left="720" w:hanging="360"/></w:pPr></w:lvl><w:lvl w:ilvl="1"><w:start w:val="1"/><w:numFmt w:val="bullet"/><w:lvlText w:val="◦"/><w:pPr><w:ind w:left="1440" w:hanging="360"/></w:pPr></w:lvl><w:lvl w:ilvl="2"><w:start w:val="1"/><w:numFmt w:val="bullet"/><w:lvlText w:val="▪"/><w:pPr><w:ind w:left="2160" w:hanging="360"/></w:pPr></w:lvl></w:abstractNum><w:abstractNum w:abstractNumId="1"><w:lvl w:ilvl="0"><w:start w:val="1"/><w:numFmt w:val="decimal"/><w:lvlText w:val="%1."/><w:pPr><w:ind w:left="720" w:hanging="360"/></w:pPr></w:lvl><w:lvl w:ilvl="1"><w:start w:val="1"/><w:numFmt w:val="lowerLetter"/><w:lvlText w:val="%2."/><w:pPr><w:ind w:left="1440" w:hanging="360"/></w:pPr></w:lvl><w:lvl w:ilvl="2"><w:start w:val="1"/><w:numFmt w:val="lowerRoman"/><w:lvlText w:val="%3."/><w:pPr><w:ind w:left="2160" w:hanging="360"/></w:pPr></w:lvl></w:abstractNum><w:num w:numId="1"><w:abstractNumId w:val="0"/></w:num><w:num w:numId="2"><w:abstractNumId w:val="1"/></w:num></w:numbering>"#;
