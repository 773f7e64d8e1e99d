//! XHTML body markup shared by the EPUB and HTML encoders.

use std::fmt::Write as _;

use base64::Engine as _;

use super::escape_xml;
use crate::error::{Error, Result};
use crate::layout::{Cell, CellContent, ImageFrame, LayoutNode, LayoutTree, NodeKind};
use crate::model::{Alignment, BlockKind, TextRun};

/// How `<img>` elements reference image data.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ImageLinks {
    /// Relative path under a directory of the package
    Directory(&'static str),
    /// Inline `data:` URI
    DataUri,
}

#[derive(Debug, Clone, Copy)]
struct OpenList {
    ordered: bool,
    item_open: bool,
}

/// Writes layout leaves as XHTML block elements.
///
/// Consecutive side-by-side rows share one two-column table and consecutive
/// list items share nested lists; [`MarkupWriter::close_blocks`] ends both.
pub(crate) struct MarkupWriter<'t> {
    tree: &'t LayoutTree,
    links: ImageLinks,
    out: String,
    in_table: bool,
    lists: Vec<OpenList>,
}

impl<'t> MarkupWriter<'t> {
    pub fn new(tree: &'t LayoutTree, links: ImageLinks) -> Self {
        Self {
            tree,
            links,
            out: String::new(),
            in_table: false,
            lists: Vec::new(),
        }
    }

    pub fn push_raw(&mut self, markup: &str) {
        self.close_blocks();
        self.out.push_str(markup);
    }

    /// Close open tables and lists and hand back the markup written so far.
    pub fn take(&mut self) -> String {
        self.close_blocks();
        std::mem::take(&mut self.out)
    }

    pub fn leaf(&mut self, leaf: &LayoutNode) -> Result<()> {
        match &leaf.kind {
            NodeKind::SideBySideRow { primary, secondary } => {
                self.close_lists();
                if !self.in_table {
                    self.out.push_str(r#"<table class="bilingual"><tbody>"#);
                    self.in_table = true;
                }
                self.out.push_str("<tr>");
                match (primary, secondary) {
                    (Some(p), Some(s)) => {
                        self.table_cell(p, 1)?;
                        self.table_cell(s, 1)?;
                    }
                    (Some(only), None) | (None, Some(only)) => self.table_cell(only, 2)?,
                    (None, None) => {}
                }
                self.out.push_str("</tr>");
            }
            NodeKind::InterleavedBlock(cell) => self.block(cell)?,
            NodeKind::ImageFrame(cell) => {
                self.close_blocks();
                self.figure(cell)?;
            }
            NodeKind::Page { .. } | NodeKind::Section { .. } => {}
        }
        Ok(())
    }

    pub fn close_blocks(&mut self) {
        self.close_table();
        self.close_lists();
    }

    fn close_table(&mut self) {
        if self.in_table {
            self.out.push_str("</tbody></table>");
            self.in_table = false;
        }
    }

    fn close_lists(&mut self) {
        while !self.lists.is_empty() {
            self.pop_list();
        }
    }

    fn pop_list(&mut self) {
        if let Some(list) = self.lists.pop() {
            if list.item_open {
                self.out.push_str("</li>");
            }
            self.out.push_str(if list.ordered { "</ol>" } else { "</ul>" });
        }
    }

    fn table_cell(&mut self, cell: &Cell, span: u32) -> Result<()> {
        self.out.push_str("<td");
        if span > 1 {
            let _ = write!(self.out, r#" colspan="{}""#, span);
        }
        self.attributes(cell, Some(heading_class(cell.kind)));
        self.out.push('>');
        match &cell.content {
            CellContent::Text { runs } => self.runs(runs),
            CellContent::Image(frame) => self.img(frame)?,
        }
        self.out.push_str("</td>");
        Ok(())
    }

    fn block(&mut self, cell: &Cell) -> Result<()> {
        if cell.kind == BlockKind::ListItem {
            self.close_table();
            self.list_item(cell);
            return Ok(());
        }
        self.close_blocks();
        match cell.kind {
            BlockKind::Heading { level } => {
                let _ = write!(self.out, "<h{}", level.clamp(1, 6));
                self.attributes(cell, None);
                self.out.push('>');
                self.runs(cell.runs());
                let _ = write!(self.out, "</h{}>", level.clamp(1, 6));
            }
            BlockKind::TableCell => {
                self.out.push_str(r#"<table class="cell"><tbody><tr><td"#);
                self.attributes(cell, None);
                self.out.push('>');
                self.runs(cell.runs());
                self.out.push_str("</td></tr></tbody></table>");
            }
            BlockKind::Image => self.figure(cell)?,
            _ => {
                self.out.push_str("<p");
                self.attributes(cell, None);
                self.out.push('>');
                self.runs(cell.runs());
                self.out.push_str("</p>");
            }
        }
        Ok(())
    }

    fn list_item(&mut self, cell: &Cell) {
        let depth = cell.list_level as usize + 1;
        while self.lists.len() > depth {
            self.pop_list();
        }
        if self.lists.len() == depth
            && self.lists.last().map(|l| l.ordered) != Some(cell.ordered)
        {
            self.pop_list();
        }
        while self.lists.len() < depth {
            let ordered = if self.lists.len() + 1 == depth {
                cell.ordered
            } else {
                false
            };
            match self.lists.last_mut() {
                Some(parent) if !parent.item_open => {
                    self.out.push_str("<li>");
                    parent.item_open = true;
                }
                _ => {}
            }
            self.out.push_str(if ordered { "<ol>" } else { "<ul>" });
            self.lists.push(OpenList {
                ordered,
                item_open: false,
            });
        }
        if let Some(list) = self.lists.last_mut() {
            if list.item_open {
                self.out.push_str("</li>");
            }
            list.item_open = true;
        }
        self.out.push_str("<li");
        self.attributes(cell, None);
        self.out.push('>');
        self.runs(cell.runs());
    }

    fn figure(&mut self, cell: &Cell) -> Result<()> {
        match &cell.content {
            CellContent::Image(frame) => {
                let _ = write!(self.out, r#"<figure class="image {}">"#, frame.placement.as_str());
                self.img(frame)?;
                self.out.push_str("</figure>");
            }
            CellContent::Text { runs } => {
                self.out.push_str("<p");
                self.attributes(cell, None);
                self.out.push('>');
                self.runs(runs);
                self.out.push_str("</p>");
            }
        }
        Ok(())
    }

    fn img(&mut self, frame: &ImageFrame) -> Result<()> {
        let image = self.tree.image(frame).ok_or_else(|| {
            Error::EncodingUnsupportedFeature(format!("image {} is not in the layout", frame.image_id))
        })?;
        let src = match self.links {
            ImageLinks::Directory(dir) => format!("{}/{}", dir, image.file_name()),
            ImageLinks::DataUri => format!(
                "data:{};base64,{}",
                image.mime_type,
                base64::engine::general_purpose::STANDARD.encode(&image.data)
            ),
        };
        let _ = write!(
            self.out,
            r#"<img src="{}" alt="{}" style="width:{:.1}pt;height:{:.1}pt"/>"#,
            escape_xml(&src),
            escape_xml(frame.alt.as_deref().unwrap_or_default()),
            frame.width_pt,
            frame.height_pt
        );
        Ok(())
    }

    fn attributes(&mut self, cell: &Cell, class: Option<&str>) {
        let _ = write!(self.out, r#" dir="{}""#, cell.direction.as_str());
        if let Some(lang) = self.tree.language_of(cell.source) {
            let lang = escape_xml(lang);
            let _ = write!(self.out, r#" lang="{lang}" xml:lang="{lang}""#);
        }
        if let Some(class) = class.filter(|c| !c.is_empty()) {
            let _ = write!(self.out, r#" class="{}""#, class);
        }
        let _ = write!(
            self.out,
            r#" style="font-family:'{}';font-size:{:.1}pt{}""#,
            escape_xml(&cell.font.family.replace('\'', "")),
            cell.scaled_size(),
            text_align(cell.alignment)
        );
    }

    fn runs(&mut self, runs: &[TextRun]) {
        for run in runs {
            let mut text = escape_xml(&run.text);
            if run.style.underline {
                text = format!("<u>{}</u>", text);
            }
            if run.style.italic {
                text = format!("<em>{}</em>", text);
            }
            if run.style.bold {
                text = format!("<strong>{}</strong>", text);
            }
            self.out.push_str(&text);
        }
    }
}

fn heading_class(kind: BlockKind) -> &'static str {
    match kind.heading_level() {
        Some(1) => "h1",
        Some(2) => "h2",
        Some(3) => "h3",
        Some(_) => "h4",
        None => "",
    }
}

fn text_align(alignment: Alignment) -> &'static str {
    match alignment {
        Alignment::Start => "",
        Alignment::Center => ";text-align:center",
        Alignment::End => ";text-align:end",
        Alignment::Justify => ";text-align:justify",
    }
}

/// Stylesheet shared by both markup outputs.
pub(crate) const BASE_CSS: &str = "body{margin:0;line-height:1.25}\
table.bilingual{width:100%;border-collapse:collapse;table-layout:fixed}\
table.bilingual td{width:50%;vertical-align:top;padding:0 7pt 0.6em 7pt}\
table.cell{border-collapse:collapse}\
td.h1,td.h2,td.h3,td.h4{font-weight:bold}\
figure.image{margin:0.6em 0}\
figure.center{text-align:center}\
figure.left{text-align:left}\
figure.right{text-align:right}\
p,li{margin:0 0 0.6em 0}\
[dir=rtl]{text-align:right}\n";
