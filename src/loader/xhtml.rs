//! XHTML content walker shared by the EPUB loader.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use roxmltree::{Node, ParsingOptions};

use crate::error::Result;
use crate::model::{Alignment, Block, BlockKind, CellPosition, TextRun, TextStyle};

const XLINK_NS: &str = "http://www.w3.org/1999/xlink";

static NAMED_ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&([A-Za-z][A-Za-z0-9]*);").unwrap());

/// Parse an XHTML document into blocks.
///
/// `resolve_image` maps an `src`/`href` value to a resource id, or `None`
/// when the image should be skipped.
pub(crate) fn parse_xhtml(
    xml: &str,
    resolve_image: &mut dyn FnMut(&str) -> Option<String>,
) -> Result<Vec<Block>> {
    let xml = replace_html_entities(xml);
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let tree = roxmltree::Document::parse_with_options(&xml, options)?;

    let root = tree.root_element();
    let body = root
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "body")
        .unwrap_or(root);

    let mut walker = Walker {
        blocks: Vec::new(),
        tables: 0,
        resolve_image,
    };
    walker.block_element(body, Context::default());
    Ok(walker.blocks)
}

/// HTML named entities are not defined in XML; rewrite the common ones as
/// numeric references so the parser accepts them.
fn replace_html_entities(xml: &str) -> Cow<'_, str> {
    NAMED_ENTITY_RE.replace_all(xml, |caps: &regex::Captures<'_>| {
        let name = &caps[1];
        let code = match name {
            "amp" | "lt" | "gt" | "quot" | "apos" => return format!("&{};", name),
            "nbsp" => 160,
            "shy" => 173,
            "copy" => 169,
            "reg" => 174,
            "laquo" => 171,
            "raquo" => 187,
            "middot" => 183,
            "ndash" => 8211,
            "mdash" => 8212,
            "lsquo" => 8216,
            "rsquo" => 8217,
            "ldquo" => 8220,
            "rdquo" => 8221,
            "bull" => 8226,
            "hellip" => 8230,
            "trade" => 8482,
            "zwnj" => 8204,
            "zwj" => 8205,
            "lrm" => 8206,
            "rlm" => 8207,
            _ => {
                log::debug!("Dropping unknown entity &{};", name);
                return String::new();
            }
        };
        format!("&#{};", code)
    })
}

#[derive(Debug, Clone, Copy, Default)]
struct Context {
    list_depth: u8,
    ordered: bool,
    in_item: bool,
    cell: Option<CellPosition>,
}

impl Context {
    fn default_kind(&self) -> BlockKind {
        if self.cell.is_some() {
            BlockKind::TableCell
        } else if self.in_item {
            BlockKind::ListItem
        } else {
            BlockKind::Paragraph
        }
    }
}

struct Walker<'r> {
    blocks: Vec<Block>,
    tables: usize,
    resolve_image: &'r mut dyn FnMut(&str) -> Option<String>,
}

impl Walker<'_> {
    fn block_element(&mut self, node: Node<'_, '_>, ctx: Context) {
        match node.tag_name().name() {
            name @ ("h1" | "h2" | "h3" | "h4" | "h5" | "h6") => {
                let level = name[1..].parse().unwrap_or(1);
                self.leaf(node, BlockKind::heading(level), ctx);
            }
            "ul" | "ol" => {
                let inner = Context {
                    list_depth: ctx.list_depth.saturating_add(1),
                    ordered: node.tag_name().name() == "ol",
                    ..ctx
                };
                for child in node.children().filter(|c| c.is_element()) {
                    self.block_element(child, inner);
                }
            }
            "li" => {
                let inner = Context {
                    in_item: true,
                    ..ctx
                };
                self.leaf(node, BlockKind::ListItem, inner);
            }
            "table" => self.table(node, ctx),
            "img" | "image" => self.image(node),
            "script" | "style" | "head" | "title" | "nav" => {}
            _ => self.leaf(node, ctx.default_kind(), ctx),
        }
    }

    fn leaf(&mut self, node: Node<'_, '_>, kind: BlockKind, ctx: Context) {
        let mut runs = Vec::new();
        self.inline(node, TextStyle::default(), &mut runs, kind, ctx);
        self.emit(kind, runs, alignment_of(node), ctx);
    }

    fn inline(
        &mut self,
        node: Node<'_, '_>,
        style: TextStyle,
        runs: &mut Vec<TextRun>,
        kind: BlockKind,
        ctx: Context,
    ) {
        for child in node.children() {
            if child.is_text() {
                push_run(runs, child.text().unwrap_or_default(), &style);
                continue;
            }
            if !child.is_element() {
                continue;
            }
            let name = child.tag_name().name();
            match name {
                "br" => push_run(runs, " ", &style),
                "b" | "strong" => {
                    let style = TextStyle {
                        bold: true,
                        ..style.clone()
                    };
                    self.inline(child, style, runs, kind, ctx);
                }
                "i" | "em" | "cite" => {
                    let style = TextStyle {
                        italic: true,
                        ..style.clone()
                    };
                    self.inline(child, style, runs, kind, ctx);
                }
                "u" => {
                    let style = TextStyle {
                        underline: true,
                        ..style.clone()
                    };
                    self.inline(child, style, runs, kind, ctx);
                }
                "script" | "style" => {}
                _ if is_block_name(name) || name == "img" || name == "image" => {
                    self.emit(kind, std::mem::take(runs), alignment_of(node), ctx);
                    self.block_element(child, ctx);
                }
                _ => self.inline(child, style.clone(), runs, kind, ctx),
            }
        }
    }

    fn table(&mut self, node: Node<'_, '_>, ctx: Context) {
        let index = self.tables;
        self.tables += 1;

        let rows = node.descendants().filter(|n| {
            n.is_element()
                && n.tag_name().name() == "tr"
                && n.ancestors()
                    .skip(1)
                    .find(|a| a.is_element() && a.tag_name().name() == "table")
                    == Some(node)
        });
        for (row, tr) in rows.enumerate() {
            let cells = tr
                .children()
                .filter(|c| c.is_element() && matches!(c.tag_name().name(), "td" | "th"));
            for (col, cell) in cells.enumerate() {
                let inner = Context {
                    cell: Some(CellPosition {
                        table: index,
                        row,
                        col,
                    }),
                    ..ctx
                };
                self.leaf(cell, BlockKind::TableCell, inner);
            }
        }
    }

    fn image(&mut self, node: Node<'_, '_>) {
        let src = node
            .attribute("src")
            .or_else(|| node.attribute((XLINK_NS, "href")))
            .or_else(|| node.attribute("href"));
        let Some(src) = src else {
            return;
        };
        if let Some(id) = (self.resolve_image)(src) {
            let alt = node
                .attribute("alt")
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(str::to_string);
            self.blocks.push(Block::image(id, alt));
        }
    }

    fn emit(&mut self, kind: BlockKind, runs: Vec<TextRun>, alignment: Alignment, ctx: Context) {
        if runs.iter().all(|r| r.text.trim().is_empty()) {
            return;
        }
        let mut block = Block::text(kind, runs).with_alignment(alignment);
        if kind == BlockKind::ListItem {
            block.style.list_level = ctx.list_depth.saturating_sub(1);
            block.style.ordered = ctx.ordered;
        }
        if kind == BlockKind::TableCell {
            block.style.cell = ctx.cell;
        }
        self.blocks.push(block);
    }
}

fn push_run(runs: &mut Vec<TextRun>, text: &str, style: &TextStyle) {
    if text.is_empty() {
        return;
    }
    match runs.last_mut() {
        Some(last) if &last.style == style => last.text.push_str(text),
        _ => runs.push(TextRun {
            text: text.to_string(),
            style: style.clone(),
        }),
    }
}

fn is_block_name(name: &str) -> bool {
    matches!(
        name,
        "p" | "div"
            | "section"
            | "article"
            | "aside"
            | "blockquote"
            | "pre"
            | "ul"
            | "ol"
            | "li"
            | "table"
            | "figure"
            | "figcaption"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "header"
            | "footer"
            | "dl"
            | "dt"
            | "dd"
            | "hr"
            | "svg"
    )
}

fn alignment_of(node: Node<'_, '_>) -> Alignment {
    let style = node.attribute("style").unwrap_or_default().replace(' ', "");
    let align = node.attribute("align").unwrap_or_default();
    if style.contains("text-align:center") || align.eq_ignore_ascii_case("center") {
        Alignment::Center
    } else if style.contains("text-align:justify") || align.eq_ignore_ascii_case("justify") {
        Alignment::Justify
    } else if style.contains("text-align:right") || align.eq_ignore_ascii_case("right") {
        Alignment::End
    } else {
        Alignment::Start
    }
}
