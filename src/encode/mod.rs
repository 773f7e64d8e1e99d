//! Output encoders.
//!
//! Each [`DocumentEncoder`] serializes a [`LayoutTree`] into one container.
//! An encoder either writes every node or fails with
//! [`Error::EncodingUnsupportedFeature`]; it never drops content.

mod docx;
mod epub;
mod html;
mod markup;
mod pdf;

pub use docx::DocxEncoder;
pub use epub::EpubEncoder;
pub use html::HtmlEncoder;
pub use pdf::PdfEncoder;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::layout::{FormatConfig, LayoutTree};

/// Output container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// WordprocessingML (`.docx`)
    Docx,
    /// EPUB 3 (`.epub`)
    Epub,
    /// PDF (`.pdf`)
    Pdf,
    /// Single-file HTML (`.html`)
    Html,
}

impl OutputFormat {
    pub fn all() -> [OutputFormat; 4] {
        [
            OutputFormat::Docx,
            OutputFormat::Epub,
            OutputFormat::Pdf,
            OutputFormat::Html,
        ]
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Docx => "docx",
            OutputFormat::Epub => "epub",
            OutputFormat::Pdf => "pdf",
            OutputFormat::Html => "html",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            OutputFormat::Epub => "application/epub+zip",
            OutputFormat::Pdf => "application/pdf",
            OutputFormat::Html => "text/html",
        }
    }

    /// Default output file name.
    pub fn file_name(&self) -> String {
        format!("bilingual_output.{}", self.extension())
    }

    /// Format for a file extension, case-insensitive.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "docx" => Some(OutputFormat::Docx),
            "epub" => Some(OutputFormat::Epub),
            "pdf" => Some(OutputFormat::Pdf),
            "html" | "htm" => Some(OutputFormat::Html),
            _ => None,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_extension(s.trim_start_matches('.'))
            .ok_or_else(|| Error::UnsupportedFormat(format!("output format '{}'", s)))
    }
}

/// Bytes of an encoded document with its page count.
#[derive(Debug, Clone)]
pub struct EncodedDocument {
    pub format: OutputFormat,
    pub data: Vec<u8>,
    /// Pages as laid out; PDF reports the pages actually written
    pub page_count: usize,
}

impl EncodedDocument {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Serializes a layout tree into one output container.
pub trait DocumentEncoder: Send + Sync {
    fn format(&self) -> OutputFormat;

    fn encode(&self, tree: &LayoutTree, config: &FormatConfig) -> Result<EncodedDocument>;
}

/// Encoder for an output format.
pub fn encoder_for(format: OutputFormat) -> Box<dyn DocumentEncoder> {
    match format {
        OutputFormat::Docx => Box::new(DocxEncoder::new()),
        OutputFormat::Epub => Box::new(EpubEncoder::new()),
        OutputFormat::Pdf => Box::new(PdfEncoder::new()),
        OutputFormat::Html => Box::new(HtmlEncoder::new()),
    }
}

/// Encode a layout tree in `format`.
pub fn encode(tree: &LayoutTree, config: &FormatConfig, format: OutputFormat) -> Result<EncodedDocument> {
    let encoded = encoder_for(format).encode(tree, config)?;
    log::info!(
        "Encoded {} ({} bytes, {} pages)",
        format,
        encoded.len(),
        encoded.page_count
    );
    Ok(encoded)
}

/// Escape text for XML and HTML content and attribute values.
pub(crate) fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c if (c as u32) < 0x20 && !matches!(c, '\t' | '\n' | '\r') => {}
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::layout::{Composer, FormatConfig, LayoutTree};
    use crate::model::{
        AlignMethod, AlignedUnit, Block, DocumentMetadata, ImageResource, LoadedDocument,
        NormalizedDocument,
    };
    use crate::normalize::Normalizer;

    pub fn doc(blocks: Vec<Block>, images: &[(&str, Vec<u8>)]) -> NormalizedDocument {
        let mut loaded = LoadedDocument::new(DocumentMetadata::default());
        blocks.into_iter().for_each(|b| loaded.push(b));
        for (id, data) in images {
            loaded.add_resource(*id, ImageResource::from_bytes(data.clone()));
        }
        Normalizer::default().normalize(loaded).unwrap()
    }

    /// Compose two documents aligned one-to-one, with unmatched tails.
    pub fn compose(
        a: &NormalizedDocument,
        b: &NormalizedDocument,
        config: &FormatConfig,
    ) -> LayoutTree {
        let shared = a.len().min(b.len());
        let mut units: Vec<AlignedUnit> = (0..shared)
            .map(|i| AlignedUnit::pair(i, i, 0.9, AlignMethod::Structural))
            .collect();
        units.extend((shared..a.len()).map(AlignedUnit::left_only));
        units.extend((shared..b.len()).map(AlignedUnit::right_only));
        Composer::new(config.clone()).compose(&units, a, b).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("DOCX".parse::<OutputFormat>().unwrap(), OutputFormat::Docx);
        assert_eq!(".htm".parse::<OutputFormat>().unwrap(), OutputFormat::Html);
        assert!(matches!(
            "odt".parse::<OutputFormat>(),
            Err(Error::UnsupportedFormat(_))
        ));
        assert_eq!(OutputFormat::Epub.file_name(), "bilingual_output.epub");
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("a < b & \"c\""), "a &lt; b &amp; &quot;c&quot;");
        assert_eq!(escape_xml("bell\u{7}"), "bell");
    }
}
