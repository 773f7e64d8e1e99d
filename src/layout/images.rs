//! Image deduplication and the quality-tier resize policy.

use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};

use super::config::ImageQuality;
use crate::model::ImageResource;

/// An image ready to be embedded in an output container.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedImage {
    /// Stable id within one layout (`image1`, `image2`, ...)
    pub id: String,
    pub data: Vec<u8>,
    pub mime_type: String,
    /// Pixel dimensions, when known
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl ProcessedImage {
    pub fn extension(&self) -> &str {
        match self.mime_type.as_str() {
            "image/jpeg" => "jpg",
            "image/png" => "png",
            "image/gif" => "gif",
            "image/webp" => "webp",
            "image/svg+xml" => "svg",
            _ => "bin",
        }
    }

    /// File name used inside archives.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.id, self.extension())
    }

    /// Whether the image has a JPEG or PNG encoding every output accepts.
    pub fn is_portable(&self) -> bool {
        matches!(self.mime_type.as_str(), "image/jpeg" | "image/png")
    }
}

/// Resize and recompression settings derived from a quality tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityPolicy {
    pub max_edge: u32,
    pub jpeg_quality: u8,
}

impl From<ImageQuality> for QualityPolicy {
    fn from(quality: ImageQuality) -> Self {
        Self {
            max_edge: quality.max_edge_px(),
            jpeg_quality: quality.jpeg_quality(),
        }
    }
}

impl QualityPolicy {
    /// Apply the policy to raw image bytes.
    ///
    /// Images above the edge ceiling are downscaled; images with alpha are
    /// stored as PNG, others as JPEG at the tier quality. A recompressed
    /// image that came out larger than an already portable original is
    /// discarded in favour of the original. Undecodable images pass through.
    pub fn apply(&self, resource: &ImageResource) -> (Vec<u8>, String, Option<u32>, Option<u32>) {
        let original = || {
            (
                resource.data.clone(),
                resource.mime_type.clone(),
                resource.width,
                resource.height,
            )
        };
        let decoded = match image::load_from_memory(&resource.data) {
            Ok(img) => img,
            Err(e) => {
                log::warn!("Passing through undecodable image: {}", e);
                return original();
            }
        };

        let (w, h) = decoded.dimensions();
        let resized = w.max(h) > self.max_edge;
        let img = if resized {
            decoded.resize(self.max_edge, self.max_edge, FilterType::Lanczos3)
        } else {
            decoded
        };
        let (w, h) = img.dimensions();

        let encoded = match self.encode(&img) {
            Some(encoded) => encoded,
            None => return original(),
        };
        let portable = matches!(resource.mime_type.as_str(), "image/jpeg" | "image/png");
        if !resized && portable && encoded.0.len() >= resource.data.len() {
            return (resource.data.clone(), resource.mime_type.clone(), Some(w), Some(h));
        }
        (encoded.0, encoded.1, Some(w), Some(h))
    }

    fn encode(&self, img: &DynamicImage) -> Option<(Vec<u8>, String)> {
        let mut buf = Vec::new();
        if img.color().has_alpha() {
            if let Err(e) = img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png) {
                log::warn!("PNG re-encoding failed: {}", e);
                return None;
            }
            return Some((buf, "image/png".to_string()));
        }
        let rgb = img.to_rgb8();
        let result = {
            let mut encoder = JpegEncoder::new_with_quality(&mut buf, self.jpeg_quality);
            encoder.encode_image(&rgb)
        };
        if let Err(e) = result {
            log::warn!("JPEG re-encoding failed: {}", e);
            return None;
        }
        Some((buf, "image/jpeg".to_string()))
    }
}

/// Images of one layout, deduplicated by content hash.
#[derive(Debug, Clone)]
pub struct ImageStore {
    policy: QualityPolicy,
    by_hash: HashMap<String, String>,
    images: BTreeMap<String, ProcessedImage>,
}

impl ImageStore {
    pub fn new(quality: ImageQuality) -> Self {
        Self {
            policy: quality.into(),
            by_hash: HashMap::new(),
            images: BTreeMap::new(),
        }
    }

    /// Add a resource, returning its processed form.
    ///
    /// Identical bytes share one stored image. Returns `None` for images
    /// whose bytes are not available.
    pub fn insert(&mut self, resource: &ImageResource) -> Option<&ProcessedImage> {
        if !resource.is_embedded() {
            return None;
        }
        let hash = resource.content_hash();
        let id = match self.by_hash.get(&hash) {
            Some(id) => id.clone(),
            None => {
                let id = format!("image{}", self.by_hash.len() + 1);
                let (data, mime_type, width, height) = self.policy.apply(resource);
                log::debug!(
                    "Stored {} ({} -> {} bytes, {})",
                    id,
                    resource.data.len(),
                    data.len(),
                    mime_type
                );
                self.images.insert(
                    id.clone(),
                    ProcessedImage {
                        id: id.clone(),
                        data,
                        mime_type,
                        width,
                        height,
                    },
                );
                self.by_hash.insert(hash, id.clone());
                id
            }
        };
        self.images.get(&id)
    }

    pub fn get(&self, id: &str) -> Option<&ProcessedImage> {
        self.images.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProcessedImage> {
        self.images.values()
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

#[cfg(test)]
pub(crate) fn test_png(width: u32, height: u32, alpha: bool) -> Vec<u8> {
    let img = if alpha {
        DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
            width,
            height,
            image::Rgba([200, 30, 30, 128]),
        ))
    } else {
        DynamicImage::ImageRgb8(image::RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        }))
    };
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_by_content() {
        let mut store = ImageStore::new(ImageQuality::High);
        let png = test_png(4, 4, false);
        let first = store.insert(&ImageResource::from_bytes(png.clone())).unwrap().id.clone();
        let second = store.insert(&ImageResource::from_bytes(png)).unwrap().id.clone();
        assert_eq!(first, second);
        assert_eq!(store.len(), 1);

        let other = store
            .insert(&ImageResource::from_bytes(test_png(5, 5, false)))
            .unwrap()
            .id
            .clone();
        assert_ne!(first, other);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_low_tier_downscales() {
        let mut store = ImageStore::new(ImageQuality::Low);
        let image = store
            .insert(&ImageResource::from_bytes(test_png(1200, 600, false)))
            .unwrap();
        assert_eq!(image.width, Some(800));
        assert_eq!(image.height, Some(400));
        assert_eq!(image.mime_type, "image/jpeg");
    }

    #[test]
    fn test_alpha_kept_as_png() {
        let mut store = ImageStore::new(ImageQuality::Low);
        let image = store
            .insert(&ImageResource::from_bytes(test_png(1000, 10, true)))
            .unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.width, Some(800));
    }

    #[test]
    fn test_external_and_undecodable() {
        let mut store = ImageStore::new(ImageQuality::High);
        assert!(store.insert(&ImageResource::external("pic.png")).is_none());

        let junk = ImageResource::new(vec![1, 2, 3, 4], "image/png");
        let image = store.insert(&junk).unwrap();
        assert_eq!(image.data, vec![1, 2, 3, 4]);
    }
}
