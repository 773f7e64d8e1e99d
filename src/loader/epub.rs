//! EPUB loader: container.xml, then the OPF package, then spine documents.

use std::collections::{BTreeMap, HashMap};
use std::io::{Cursor, Read};

use zip::ZipArchive;

use super::xhtml::parse_xhtml;
use super::{resolve_href, DocumentLoader, LoadOptions};
use crate::detect::{detect_format_from_bytes, InputFormat};
use crate::error::{Error, Result};
use crate::model::{mime_from_name, DocumentMetadata, ImageResource, LoadedDocument, SourceDocument};

type Archive<'a> = ZipArchive<Cursor<&'a [u8]>>;

/// Loader for `.epub` files.
pub struct EpubLoader;

impl EpubLoader {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EpubLoader {
    fn default() -> Self {
        Self::new()
    }
}

struct ManifestItem {
    href: String,
    media_type: String,
}

struct Package {
    title: Option<String>,
    language: Option<String>,
    spine: Vec<String>,
}

impl DocumentLoader for EpubLoader {
    fn format(&self) -> InputFormat {
        InputFormat::Epub
    }

    fn name(&self) -> &str {
        "epub"
    }

    fn supported_extensions(&self) -> &[&str] {
        &["epub"]
    }

    fn matches_signature(&self, bytes: &[u8]) -> bool {
        detect_format_from_bytes(bytes) == Some(InputFormat::Epub)
    }

    fn load(&self, source: &SourceDocument, options: &LoadOptions) -> Result<LoadedDocument> {
        let mut archive = ZipArchive::new(Cursor::new(source.bytes.as_slice()))?;

        let container = read_entry_string(&mut archive, "META-INF/container.xml")?;
        let opf_path = rootfile_path(&container)?;
        let opf = read_entry_string(&mut archive, &opf_path)?;
        let package = parse_package(&opf, &opf_path)?;

        let mut doc = LoadedDocument::new(DocumentMetadata {
            title: package.title,
            language: package.language,
            source_name: source.name.clone(),
            ..Default::default()
        });

        let mut resources: BTreeMap<String, ImageResource> = BTreeMap::new();
        for chapter_path in &package.spine {
            let xml = match read_entry_string(&mut archive, chapter_path) {
                Ok(xml) => xml,
                Err(e) if options.is_lenient() => {
                    log::warn!("Skipping spine item {}: {}", chapter_path, e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            let mut resolve = |href: &str| -> Option<String> {
                if !options.extract_images {
                    return None;
                }
                let path = resolve_href(chapter_path, href);
                if resources.contains_key(&path) {
                    return Some(path);
                }
                match read_entry(&mut archive, &path) {
                    Ok(data) => {
                        let resource =
                            ImageResource::new(data, mime_from_name(&path)).with_source(path.clone());
                        resources.insert(path.clone(), resource);
                        Some(path)
                    }
                    Err(e) => {
                        log::warn!("Image {} missing from archive: {}", path, e);
                        None
                    }
                }
            };

            match parse_xhtml(&xml, &mut resolve) {
                Ok(blocks) => blocks.into_iter().for_each(|b| doc.push(b)),
                Err(e) if options.is_lenient() => {
                    log::warn!("Skipping unparsable spine item {}: {}", chapter_path, e);
                }
                Err(e) => return Err(e),
            }
        }

        doc.resources = resources;
        Ok(doc)
    }
}

fn read_entry(archive: &mut Archive<'_>, name: &str) -> Result<Vec<u8>> {
    let mut file = archive
        .by_name(name)
        .map_err(|_| Error::CorruptInput(format!("missing archive entry: {}", name)))?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)?;
    Ok(data)
}

fn read_entry_string(archive: &mut Archive<'_>, name: &str) -> Result<String> {
    let data = read_entry(archive, name)?;
    String::from_utf8(data).map_err(|_| Error::CorruptInput(format!("{} is not UTF-8", name)))
}

fn rootfile_path(container_xml: &str) -> Result<String> {
    let tree = roxmltree::Document::parse(container_xml)?;
    tree.descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "rootfile")
        .and_then(|n| n.attribute("full-path"))
        .map(str::to_string)
        .ok_or_else(|| Error::CorruptInput("container.xml has no rootfile".into()))
}

fn parse_package(opf: &str, opf_path: &str) -> Result<Package> {
    let tree = roxmltree::Document::parse(opf)?;

    let text_of = |local: &str| {
        tree.descendants()
            .find(|n| n.is_element() && n.tag_name().name() == local)
            .and_then(|n| n.text())
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    };

    let manifest: HashMap<&str, ManifestItem> = tree
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "item")
        .filter_map(|n| {
            let id = n.attribute("id")?;
            Some((
                id,
                ManifestItem {
                    href: resolve_href(opf_path, n.attribute("href")?),
                    media_type: n.attribute("media-type").unwrap_or_default().to_string(),
                },
            ))
        })
        .collect();

    let spine: Vec<String> = tree
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "itemref")
        .filter(|n| n.attribute("linear") != Some("no"))
        .filter_map(|n| manifest.get(n.attribute("idref")?))
        .filter(|item| item.media_type.contains("html"))
        .map(|item| item.href.clone())
        .collect();

    if spine.is_empty() {
        return Err(Error::CorruptInput("EPUB spine lists no documents".into()));
    }

    Ok(Package {
        title: text_of("title"),
        language: text_of("language"),
        spine,
    })
}
