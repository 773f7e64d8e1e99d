//! EPUB 3 encoder.
//!
//! Every section that starts on a page (rather than continuing from the
//! previous one) opens a new chapter document. EPUB is reflowable, so page
//! boundaries themselves are not written and explicit page margins cannot
//! be honored.

use std::fmt::Write as _;
use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::markup::{ImageLinks, MarkupWriter, BASE_CSS};
use super::{escape_xml, DocumentEncoder, EncodedDocument, OutputFormat};
use crate::error::{Error, Result};
use crate::layout::{FormatConfig, LayoutTree, NodeKind};

const OEBPS: &str = "OEBPS";

/// Encoder for `.epub` output.
pub struct EpubEncoder;

impl EpubEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EpubEncoder {
    fn default() -> Self {
        Self::new()
    }
}

struct Chapter {
    title: String,
    body: String,
}

impl Chapter {
    fn file_name(index: usize) -> String {
        format!("chapter_{:03}.xhtml", index + 1)
    }
}

impl DocumentEncoder for EpubEncoder {
    fn format(&self) -> OutputFormat {
        OutputFormat::Epub
    }

    fn encode(&self, tree: &LayoutTree, config: &FormatConfig) -> Result<EncodedDocument> {
        if config.margins_cm.is_some() {
            return Err(Error::EncodingUnsupportedFeature(
                "page margins in reflowable EPUB".into(),
            ));
        }
        for image in tree.images.iter() {
            if !matches!(
                image.mime_type.as_str(),
                "image/jpeg" | "image/png" | "image/gif" | "image/webp" | "image/svg+xml"
            ) {
                return Err(Error::EncodingUnsupportedFeature(format!(
                    "{} images in EPUB",
                    image.mime_type
                )));
            }
        }

        let chapters = chapters(tree)?;
        let primary = config.primary_language;
        let lang = tree.language_of(primary).unwrap_or("und").to_string();
        let dir = tree.direction_of(primary).as_str();
        let title = tree.title.clone().unwrap_or_else(|| "Bilingual document".into());

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        // The mimetype entry must come first and uncompressed.
        writer.start_file("mimetype", stored)?;
        writer.write_all(OutputFormat::Epub.mime_type().as_bytes())?;

        let mut put = |name: &str, data: &[u8]| -> Result<()> {
            writer.start_file(name, deflated)?;
            writer.write_all(data)?;
            Ok(())
        };
        put("META-INF/container.xml", CONTAINER_XML.as_bytes())?;
        put(
            &format!("{OEBPS}/content.opf"),
            package_opf(tree, &chapters, &title, &lang).as_bytes(),
        )?;
        put(
            &format!("{OEBPS}/nav.xhtml"),
            nav_xhtml(&chapters, &title, &lang, dir).as_bytes(),
        )?;
        put(&format!("{OEBPS}/style.css"), BASE_CSS.as_bytes())?;
        for (i, chapter) in chapters.iter().enumerate() {
            put(
                &format!("{OEBPS}/{}", Chapter::file_name(i)),
                chapter_xhtml(chapter, &lang, dir).as_bytes(),
            )?;
        }
        for image in tree.images.iter() {
            put(&format!("{OEBPS}/images/{}", image.file_name()), &image.data)?;
        }

        let data = writer.finish()?.into_inner();
        Ok(EncodedDocument {
            format: OutputFormat::Epub,
            data,
            page_count: tree.page_count(),
        })
    }
}

fn chapters(tree: &LayoutTree) -> Result<Vec<Chapter>> {
    let mut markup = MarkupWriter::new(tree, ImageLinks::Directory("images"));
    let mut chapters = Vec::new();
    let mut title: Option<String> = None;
    let mut has_content = false;

    for section in tree.pages.iter().flat_map(|p| p.children.iter()) {
        if section.kind == (NodeKind::Section { continued: false }) && has_content {
            chapters.push(Chapter {
                title: title.take().unwrap_or_else(|| format!("Section {}", chapters.len() + 1)),
                body: markup.take(),
            });
            has_content = false;
        }
        for leaf in section.leaves() {
            if title.is_none() {
                title = leaf
                    .cells()
                    .into_iter()
                    .find(|c| c.kind.is_heading())
                    .map(|c| c.plain_text());
            }
            markup.leaf(leaf)?;
            has_content = true;
        }
    }
    if has_content || chapters.is_empty() {
        chapters.push(Chapter {
            title: title.unwrap_or_else(|| format!("Section {}", chapters.len() + 1)),
            body: markup.take(),
        });
    }
    Ok(chapters)
}

const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container"><rootfiles><rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/></rootfiles></container>"#;

fn package_opf(tree: &LayoutTree, chapters: &[Chapter], title: &str, lang: &str) -> String {
    let mut manifest = String::from(
        r#"<item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/><item id="css" href="style.css" media-type="text/css"/>"#,
    );
    let mut spine = String::new();
    for i in 0..chapters.len() {
        let _ = write!(
            manifest,
            r#"<item id="ch{i}" href="{}" media-type="application/xhtml+xml"/>"#,
            Chapter::file_name(i)
        );
        let _ = write!(spine, r#"<itemref idref="ch{i}"/>"#);
    }
    for image in tree.images.iter() {
        let _ = write!(
            manifest,
            r#"<item id="{}" href="images/{}" media-type="{}"/>"#,
            image.id,
            image.file_name(),
            image.mime_type
        );
    }
    let identifier = uuid::Uuid::new_v4();
    let modified = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="book-id"><metadata xmlns:dc="http://purl.org/dc/elements/1.1/"><dc:identifier id="book-id">urn:uuid:{identifier}</dc:identifier><dc:title>{title}</dc:title><dc:language>{lang}</dc:language><meta property="dcterms:modified">{modified}</meta></metadata><manifest>{manifest}</manifest><spine>{spine}</spine></package>"#,
        title = escape_xml(title),
        lang = escape_xml(lang),
    )
}

fn nav_xhtml(chapters: &[Chapter], title: &str, lang: &str, dir: &str) -> String {
    let mut items = String::new();
    for (i, chapter) in chapters.iter().enumerate() {
        let _ = write!(
            items,
            r#"<li><a href="{}">{}</a></li>"#,
            Chapter::file_name(i),
            escape_xml(&chapter.title)
        );
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops" lang="{lang}" xml:lang="{lang}" dir="{dir}"><head><meta charset="utf-8"/><title>{title}</title></head><body><nav epub:type="toc" id="toc"><h1>{title}</h1><ol>{items}</ol></nav></body></html>"#,
        lang = escape_xml(lang),
        title = escape_xml(title),
    )
}

fn chapter_xhtml(chapter: &Chapter, lang: &str, dir: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops" lang="{lang}" xml:lang="{lang}" dir="{dir}"><head><meta charset="utf-8"/><title>{title}</title><link rel="stylesheet" type="text/css" href="style.css"/></head><body>{body}</body></html>"#,
        lang = escape_xml(lang),
        title = escape_xml(&chapter.title),
        body = chapter.body,
    )
}
