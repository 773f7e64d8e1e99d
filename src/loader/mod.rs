//! Loaders that turn source containers into ordered blocks.
//!
//! Each container format has a [`DocumentLoader`] that declares the file
//! extensions and content signatures it accepts. The [`LoaderRegistry`]
//! dispatches a [`SourceDocument`] to the first registrant that matches.
//!
//! # Example
//!
//! ```no_run
//! use bifold::loader::{LoaderRegistry, LoadOptions};
//! use bifold::model::SourceDocument;
//!
//! fn main() -> bifold::Result<()> {
//!     let registry = LoaderRegistry::with_defaults();
//!     let source = SourceDocument::from_path("chapter.docx")?;
//!     let loaded = registry.load(&source, &LoadOptions::default())?;
//!     println!("{} blocks", loaded.blocks.len());
//!     Ok(())
//! }
//! ```

mod docx;
mod epub;
mod markdown;
mod options;
mod pdf;
mod text;
pub(crate) mod xhtml;

pub use docx::DocxLoader;
pub use epub::EpubLoader;
pub use markdown::MarkdownLoader;
pub use options::{ErrorMode, LoadOptions};
pub use pdf::PdfLoader;
pub use text::TextLoader;

use std::sync::Arc;

use crate::detect::InputFormat;
use crate::error::{Error, Result};
use crate::model::{LoadedDocument, SourceDocument};

/// Trait for format-specific loaders.
///
/// Implement this trait to add support for a new container format.
pub trait DocumentLoader: Send + Sync {
    /// Container format handled by this loader.
    fn format(&self) -> InputFormat;

    /// Get the name of this loader.
    fn name(&self) -> &str;

    /// Supported file extensions, lowercase without the leading dot.
    fn supported_extensions(&self) -> &[&str];

    /// Check whether the bytes carry this format's content signature.
    fn matches_signature(&self, _bytes: &[u8]) -> bool {
        false
    }

    /// Extract blocks in reading order.
    fn load(&self, source: &SourceDocument, options: &LoadOptions) -> Result<LoadedDocument>;

    /// Check if this loader supports the given extension.
    fn supports_extension(&self, ext: &str) -> bool {
        let ext_lower = ext.to_lowercase();
        self.supported_extensions().iter().any(|e| *e == ext_lower)
    }
}

/// Registry of loaders, consulted in registration order.
pub struct LoaderRegistry {
    loaders: Vec<Arc<dyn DocumentLoader>>,
}

impl LoaderRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            loaders: Vec::new(),
        }
    }

    /// Create a registry with every built-in loader.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(PdfLoader::new()));
        registry.register(Arc::new(DocxLoader::new()));
        registry.register(Arc::new(EpubLoader::new()));
        registry.register(Arc::new(MarkdownLoader::new()));
        registry.register(Arc::new(TextLoader::new()));
        registry
    }

    /// Register a loader after the existing ones.
    pub fn register(&mut self, loader: Arc<dyn DocumentLoader>) {
        self.loaders.push(loader);
    }

    /// Get the first loader for a format.
    pub fn get_by_format(&self, format: InputFormat) -> Option<Arc<dyn DocumentLoader>> {
        self.loaders.iter().find(|l| l.format() == format).cloned()
    }

    /// Get the first loader for a file extension.
    pub fn get_by_extension(&self, ext: &str) -> Option<Arc<dyn DocumentLoader>> {
        self.loaders
            .iter()
            .find(|l| l.supports_extension(ext))
            .cloned()
    }

    /// Check if an extension is supported.
    pub fn supports(&self, ext: &str) -> bool {
        self.get_by_extension(ext).is_some()
    }

    /// Get all supported extensions.
    pub fn supported_extensions(&self) -> Vec<&str> {
        let mut exts: Vec<&str> = self
            .loaders
            .iter()
            .flat_map(|l| l.supported_extensions().iter().copied())
            .collect();
        exts.dedup();
        exts
    }

    /// Pick the loader for a source.
    ///
    /// A declared format wins; otherwise content signatures are tried in
    /// registration order, then the file extension.
    pub fn resolve(&self, source: &SourceDocument) -> Result<Arc<dyn DocumentLoader>> {
        if let Some(format) = source.declared_format {
            return self.get_by_format(format).ok_or_else(|| {
                Error::UnsupportedFormat(format!("no loader registered for {}", format))
            });
        }

        if let Some(loader) = self
            .loaders
            .iter()
            .find(|l| l.matches_signature(&source.bytes))
        {
            return Ok(loader.clone());
        }

        source
            .extension()
            .and_then(|ext| self.get_by_extension(&ext))
            .ok_or_else(|| Error::UnsupportedFormat(source.name.clone()))
    }

    /// Load a source with the loader chosen by [`resolve`](Self::resolve).
    pub fn load(&self, source: &SourceDocument, options: &LoadOptions) -> Result<LoadedDocument> {
        if source.bytes.is_empty() {
            return Err(Error::EmptyDocument);
        }

        let loader = self.resolve(source)?;
        log::debug!("Loading {} with {} loader", source.name, loader.name());

        let mut loaded = loader.load(source, options)?;
        if loaded.is_empty() {
            return Err(Error::EmptyDocument);
        }
        if loaded.metadata.source_name.is_empty() {
            loaded.metadata.source_name = source.name.clone();
        }
        loaded.metadata.format = Some(loader.format());
        Ok(loaded)
    }
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Decode bytes as text: UTF-8 (BOM stripped), UTF-16 with BOM, else Latin-1.
pub(crate) fn decode_text(bytes: &[u8]) -> Result<String> {
    if let Some(rest) = bytes.strip_prefix(b"\xEF\xBB\xBF") {
        return String::from_utf8(rest.to_vec())
            .map_err(|e| Error::CorruptInput(format!("invalid UTF-8: {}", e)));
    }

    let utf16 = |rest: &[u8], big_endian: bool| -> Result<String> {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|c| {
                if big_endian {
                    u16::from_be_bytes([c[0], c[1]])
                } else {
                    u16::from_le_bytes([c[0], c[1]])
                }
            })
            .collect();
        String::from_utf16(&units).map_err(|e| Error::CorruptInput(format!("invalid UTF-16: {}", e)))
    };
    if let Some(rest) = bytes.strip_prefix(b"\xFE\xFF") {
        return utf16(rest, true);
    }
    if let Some(rest) = bytes.strip_prefix(b"\xFF\xFE") {
        return utf16(rest, false);
    }

    match std::str::from_utf8(bytes) {
        Ok(s) => Ok(s.to_string()),
        Err(_) if bytes.contains(&0) => Err(Error::CorruptInput(
            "binary content in a text document".into(),
        )),
        Err(_) => Ok(bytes.iter().map(|&b| b as char).collect()),
    }
}

/// Resolve `href` relative to the archive entry `base_file`.
pub(crate) fn resolve_href(base_file: &str, href: &str) -> String {
    let href = href.split(['#', '?']).next().unwrap_or_default();
    let href = percent_decode(href);

    let mut parts: Vec<&str> = if href.starts_with('/') {
        Vec::new()
    } else {
        let mut base: Vec<&str> = base_file.split('/').collect();
        base.pop();
        base
    };
    for segment in href.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    parts.join("/")
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    let hex = |b: u8| (b as char).to_digit(16).map(|d| d as u8);
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex(bytes[i + 1]), hex(bytes[i + 2])) {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
