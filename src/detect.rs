//! Input format detection from content signatures and file extensions.

use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Input container formats accepted by the loaders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    /// Plain UTF-8 text
    Text,
    /// CommonMark / GitHub-flavoured Markdown
    Markdown,
    /// Office Open XML word-processing document
    Docx,
    /// Portable Document Format
    Pdf,
    /// EPUB 2/3 publication
    Epub,
}

impl InputFormat {
    /// All formats in dispatch order.
    pub const ALL: [InputFormat; 5] = [
        InputFormat::Pdf,
        InputFormat::Docx,
        InputFormat::Epub,
        InputFormat::Markdown,
        InputFormat::Text,
    ];

    /// Map a file extension (without dot, any case) to a format.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "txt" | "text" => Some(InputFormat::Text),
            "md" | "markdown" => Some(InputFormat::Markdown),
            "docx" => Some(InputFormat::Docx),
            "pdf" => Some(InputFormat::Pdf),
            "epub" => Some(InputFormat::Epub),
            _ => None,
        }
    }

    /// Map a file name to a format via its extension.
    pub fn from_file_name(name: &str) -> Option<Self> {
        Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Canonical lowercase label.
    pub fn as_str(&self) -> &'static str {
        match self {
            InputFormat::Text => "text",
            InputFormat::Markdown => "markdown",
            InputFormat::Docx => "docx",
            InputFormat::Pdf => "pdf",
            InputFormat::Epub => "epub",
        }
    }
}

impl std::fmt::Display for InputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// PDF magic bytes: %PDF-
const PDF_MAGIC: &[u8] = b"%PDF-";
/// ZIP local file header: PK\x03\x04
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const EPUB_MIMETYPE: &[u8] = b"application/epub+zip";

/// Detect the container format from leading bytes.
///
/// Only binary containers carry a signature; plain text and Markdown
/// are never detected here and rely on the declared format or extension.
pub fn detect_format_from_bytes(data: &[u8]) -> Option<InputFormat> {
    if is_pdf_bytes(data) {
        return Some(InputFormat::Pdf);
    }
    if !data.starts_with(ZIP_MAGIC) {
        return None;
    }

    // EPUB puts an uncompressed `mimetype` entry first (offset 30 = name, 38 = content).
    if data.len() > 38 + EPUB_MIMETYPE.len()
        && &data[30..38] == b"mimetype"
        && data[38..].starts_with(EPUB_MIMETYPE)
    {
        return Some(InputFormat::Epub);
    }

    let archive = zip::ZipArchive::new(Cursor::new(data)).ok()?;
    let mut has_epub_container = false;
    for name in archive.file_names() {
        if name == "word/document.xml" {
            return Some(InputFormat::Docx);
        }
        if name == "META-INF/container.xml" {
            has_epub_container = true;
        }
    }
    has_epub_container.then_some(InputFormat::Epub)
}

/// Detect the format of a file on disk, falling back to its extension.
pub fn detect_format_from_path<P: AsRef<Path>>(path: P) -> Result<InputFormat> {
    let path = path.as_ref();
    let mut data = Vec::new();
    File::open(path)?.read_to_end(&mut data)?;

    if let Some(format) = detect_format_from_bytes(&data) {
        return Ok(format);
    }
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(InputFormat::from_extension)
        .ok_or_else(|| Error::UnsupportedFormat(path.display().to_string()))
}

/// Check if bytes start with a PDF header.
pub fn is_pdf_bytes(data: &[u8]) -> bool {
    data.len() >= PDF_MAGIC.len() + 3 && data.starts_with(PDF_MAGIC)
}

/// Check if bytes start with a ZIP local file header.
pub fn is_zip_bytes(data: &[u8]) -> bool {
    data.starts_with(ZIP_MAGIC)
}

/// Detect image MIME type from magic bytes.
pub fn detect_image_mime(data: &[u8]) -> Option<&'static str> {
    if data.len() < 8 {
        return None;
    }
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("image/jpeg");
    }
    if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some("image/png");
    }
    if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        return Some("image/gif");
    }
    if data.starts_with(b"BM") {
        return Some("image/bmp");
    }
    if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
        return Some("image/webp");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;

    fn zip_with(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options: FileOptions<'_, ()> = FileOptions::default();
        for (name, content) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_detect_pdf() {
        assert_eq!(
            detect_format_from_bytes(b"%PDF-1.7\n%\xe2\xe3\xcf\xd3"),
            Some(InputFormat::Pdf)
        );
        assert_eq!(detect_format_from_bytes(b"%PDF"), None);
    }

    #[test]
    fn test_detect_docx_by_entry() {
        let data = zip_with(&[
            ("[Content_Types].xml", b"<Types/>"),
            ("word/document.xml", b"<w:document/>"),
        ]);
        assert_eq!(detect_format_from_bytes(&data), Some(InputFormat::Docx));
    }

    #[test]
    fn test_detect_epub_by_mimetype() {
        let data = zip_with(&[
            ("mimetype", b"application/epub+zip"),
            ("META-INF/container.xml", b"<container/>"),
        ]);
        assert_eq!(detect_format_from_bytes(&data), Some(InputFormat::Epub));
    }

    #[test]
    fn test_text_has_no_signature() {
        assert_eq!(detect_format_from_bytes(b"# Heading\n\nBody"), None);
        assert_eq!(detect_format_from_bytes(b"plain words"), None);
    }

    #[test]
    fn test_from_extension() {
        assert_eq!(InputFormat::from_extension("MD"), Some(InputFormat::Markdown));
        assert_eq!(InputFormat::from_file_name("a/b/book.epub"), Some(InputFormat::Epub));
        assert_eq!(InputFormat::from_file_name("slides.pptx"), None);
    }

    #[test]
    fn test_detect_from_path_falls_back_to_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.md");
        std::fs::write(&path, "# Title\n").unwrap();
        assert_eq!(detect_format_from_path(&path).unwrap(), InputFormat::Markdown);

        let other = dir.path().join("notes.xyz");
        std::fs::write(&other, "text").unwrap();
        assert!(matches!(
            detect_format_from_path(&other),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_detect_image_mime() {
        let jpeg = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46];
        assert_eq!(detect_image_mime(&jpeg), Some("image/jpeg"));
        assert_eq!(detect_image_mime(&[0u8; 8]), None);
    }
}
