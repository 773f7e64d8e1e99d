//! Single-file HTML encoder.
//!
//! Images are embedded as `data:` URIs and each layout page becomes a
//! `div.page` that breaks before the next one when printed. The `@page`
//! rule carries the configured page size and margins.

use std::fmt::Write as _;

use super::markup::{ImageLinks, MarkupWriter, BASE_CSS};
use super::{escape_xml, DocumentEncoder, EncodedDocument, OutputFormat};
use crate::error::{Error, Result};
use crate::layout::{FormatConfig, LayoutTree};

/// Encoder for `.html` output.
pub struct HtmlEncoder;

impl HtmlEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HtmlEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentEncoder for HtmlEncoder {
    fn format(&self) -> OutputFormat {
        OutputFormat::Html
    }

    fn encode(&self, tree: &LayoutTree, config: &FormatConfig) -> Result<EncodedDocument> {
        if let Some(image) = tree.images.iter().find(|i| i.extension() == "bin") {
            return Err(Error::EncodingUnsupportedFeature(format!(
                "{} images in HTML",
                image.mime_type
            )));
        }

        let mut markup = MarkupWriter::new(tree, ImageLinks::DataUri);
        for page in &tree.pages {
            markup.push_raw(r#"<div class="page">"#);
            for leaf in page.leaves() {
                markup.leaf(leaf)?;
            }
            markup.push_raw("</div>");
        }
        let body = markup.take();

        let primary = config.primary_language;
        let lang = escape_xml(tree.language_of(primary).unwrap_or("und"));
        let dir = tree.direction_of(primary).as_str();
        let title = escape_xml(tree.title.as_deref().unwrap_or("Bilingual document"));

        let mut html = String::with_capacity(body.len() + 2048);
        let _ = write!(
            html,
            r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" lang="{lang}" xml:lang="{lang}" dir="{dir}"><head><meta charset="utf-8"/><meta name="generator" content="bifold {version}"/><title>{title}</title><style>{css}{page_css}</style></head><body>{body}</body></html>
"#,
            version = crate::VERSION,
            css = BASE_CSS,
            page_css = page_css(tree),
        );

        Ok(EncodedDocument {
            format: OutputFormat::Html,
            data: html.into_bytes(),
            page_count: tree.page_count(),
        })
    }
}

fn page_css(tree: &LayoutTree) -> String {
    let g = &tree.geometry;
    format!(
        "@page{{size:{:.2}pt {:.2}pt;margin:{:.2}pt {:.2}pt {:.2}pt {:.2}pt}}\
div.page{{max-width:{:.2}pt;margin:0 auto;break-after:page;page-break-after:always}}\
div.page:last-child{{break-after:auto;page-break-after:auto}}\n",
        g.width,
        g.height,
        g.margin_top,
        g.margin_right,
        g.margin_bottom,
        g.margin_left,
        g.content_width(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::test_support::{compose, doc};
    use crate::layout::{test_png, LayoutMode};
    use crate::loader::xhtml::parse_xhtml;
    use crate::model::{Block, BlockKind};

    #[test]
    fn test_single_file_with_embedded_image() {
        let png = test_png(16, 16, true);
        let a = doc(
            vec![Block::paragraph("Caption follows."), Block::image("p.png", None)],
            &[("p.png", png)],
        );
        let b = doc(vec![Block::paragraph("تليها التسمية.")], &[]);
        let config = FormatConfig::new().with_layout_mode(LayoutMode::Interleaved);
        let tree = compose(&a, &b, &config);
        let encoded = HtmlEncoder::new().encode(&tree, &config).unwrap();
        let html = String::from_utf8(encoded.data).unwrap();

        assert!(html.contains("data:image/png;base64,"));
        assert!(html.contains(r#"dir="rtl""#));
        assert!(html.contains("@page{size:595.28pt 841.89pt"));
        assert_eq!(html.matches(r#"<div class="page">"#).count(), tree.page_count());

        let mut resolve = |src: &str| Some(src.to_string());
        let blocks = parse_xhtml(&html, &mut resolve).unwrap();
        let kinds: Vec<BlockKind> = blocks.iter().map(|b| b.kind).collect();
        assert_eq!(kinds, tree.implied_kinds());
    }

    #[test]
    fn test_title_and_language() {
        let mut a = doc(vec![Block::paragraph("Hello")], &[]);
        a.metadata.language = Some("en".into());
        a.metadata.title = Some("Greetings & more".into());
        let b = doc(vec![Block::paragraph("Bonjour")], &[]);
        let config = FormatConfig::default();
        let tree = compose(&a, &b, &config);
        let html = String::from_utf8(HtmlEncoder::new().encode(&tree, &config).unwrap().data).unwrap();

        assert!(html.contains("<title>Greetings &amp; more</title>"));
        assert!(html.contains(r#"lang="en""#));
    }
}
