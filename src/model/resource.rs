//! Embedded image resources.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::detect::detect_image_mime;

/// An image carried by a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageResource {
    /// Raw binary data; empty for external references
    #[serde(skip_serializing)]
    pub data: Vec<u8>,

    /// MIME type (e.g., "image/jpeg")
    pub mime_type: String,

    /// Original file name or href if known
    pub source: Option<String>,

    /// Width in pixels
    pub width: Option<u32>,

    /// Height in pixels
    pub height: Option<u32>,
}

impl ImageResource {
    /// Create an image resource, sniffing the MIME type from content when possible.
    pub fn new(data: Vec<u8>, fallback_mime: impl Into<String>) -> Self {
        let mime_type = detect_image_mime(&data)
            .map(str::to_string)
            .unwrap_or_else(|| fallback_mime.into());
        Self {
            data,
            mime_type,
            source: None,
            width: None,
            height: None,
        }
    }

    /// Create an image from bytes with a MIME type inferred from the content.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self::new(data, "application/octet-stream")
    }

    /// Create a reference to an image that could not be embedded.
    pub fn external(href: impl Into<String>) -> Self {
        let href = href.into();
        Self {
            data: Vec::new(),
            mime_type: mime_from_name(&href).to_string(),
            source: Some(href),
            width: None,
            height: None,
        }
    }

    /// Set image dimensions.
    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Set the source name.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Whether the image bytes are available.
    pub fn is_embedded(&self) -> bool {
        !self.data.is_empty()
    }

    /// Hex SHA-256 of the image bytes, or of the href for external images.
    pub fn content_hash(&self) -> String {
        let digest = if self.is_embedded() {
            Sha256::digest(&self.data)
        } else {
            Sha256::digest(self.source.as_deref().unwrap_or_default().as_bytes())
        };
        format!("{:x}", digest)
    }

    /// File extension based on MIME type.
    pub fn extension(&self) -> &str {
        match self.mime_type.as_str() {
            "image/jpeg" => "jpg",
            "image/png" => "png",
            "image/gif" => "gif",
            "image/bmp" => "bmp",
            "image/webp" => "webp",
            "image/svg+xml" => "svg",
            _ => "bin",
        }
    }
}

/// Guess an image MIME type from a file name.
pub fn mime_from_name(name: &str) -> &'static str {
    let lower = name.to_ascii_lowercase();
    let ext = lower.rsplit('.').next().unwrap_or_default();
    match ext {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_sniffed_from_content() {
        let png = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];
        let res = ImageResource::new(png, "image/jpeg");
        assert_eq!(res.mime_type, "image/png");
        assert_eq!(res.extension(), "png");
    }

    #[test]
    fn test_identical_bytes_share_hash() {
        let a = ImageResource::from_bytes(vec![1, 2, 3]);
        let b = ImageResource::from_bytes(vec![1, 2, 3]).with_source("copy.png");
        let c = ImageResource::from_bytes(vec![3, 2, 1]);
        assert_eq!(a.content_hash(), b.content_hash());
        assert_ne!(a.content_hash(), c.content_hash());
        assert_eq!(a.content_hash().len(), 64);
    }

    #[test]
    fn test_external_reference() {
        let res = ImageResource::external("figures/chart.PNG");
        assert!(!res.is_embedded());
        assert_eq!(res.mime_type, "image/png");
    }
}
