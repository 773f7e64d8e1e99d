//! Output formatting configuration.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Points per centimetre.
pub const PT_PER_CM: f32 = 72.0 / 2.54;

/// Which input document is the primary (source) language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Language {
    /// The first submitted document
    #[default]
    First,
    /// The second submitted document
    Second,
}

impl TryFrom<u8> for Language {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(Language::First),
            2 => Ok(Language::Second),
            other => Err(format!("primaryLanguage must be 1 or 2, got {}", other)),
        }
    }
}

impl From<Language> for u8 {
    fn from(language: Language) -> u8 {
        match language {
            Language::First => 1,
            Language::Second => 2,
        }
    }
}

impl Language {
    pub fn other(self) -> Self {
        match self {
            Language::First => Language::Second,
            Language::Second => Language::First,
        }
    }
}

/// How aligned units are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LayoutMode {
    /// Two columns per unit; unmatched units span the full width
    #[default]
    SideBySide,
    /// Both sides stacked, primary language first
    Interleaved,
}

/// Horizontal placement of image frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImagePlacement {
    #[default]
    Center,
    Left,
    Right,
}

impl ImagePlacement {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImagePlacement::Center => "center",
            ImagePlacement::Left => "left",
            ImagePlacement::Right => "right",
        }
    }
}

/// Image quality tier.
///
/// | Tier   | Longest edge | JPEG quality |
/// |--------|--------------|--------------|
/// | low    | 800 px       | 60           |
/// | medium | 1600 px      | 80           |
/// | high   | 3000 px      | 92           |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageQuality {
    Low,
    Medium,
    #[default]
    High,
}

impl ImageQuality {
    /// Longest edge in pixels an image may keep.
    pub fn max_edge_px(&self) -> u32 {
        match self {
            ImageQuality::Low => 800,
            ImageQuality::Medium => 1600,
            ImageQuality::High => 3000,
        }
    }

    /// JPEG quality used when recompressing.
    pub fn jpeg_quality(&self) -> u8 {
        match self {
            ImageQuality::Low => 60,
            ImageQuality::Medium => 80,
            ImageQuality::High => 92,
        }
    }
}

/// Page size of paged outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageSize {
    #[default]
    A4,
    Letter,
}

impl PageSize {
    /// Width and height in points.
    pub fn dimensions_pt(&self) -> (f32, f32) {
        match self {
            PageSize::A4 => (595.28, 841.89),
            PageSize::Letter => (612.0, 792.0),
        }
    }
}

/// Page margins in centimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    pub top: f32,
    pub bottom: f32,
    pub left: f32,
    pub right: f32,
}

impl Default for Margins {
    fn default() -> Self {
        Self {
            top: 2.5,
            bottom: 2.5,
            left: 2.0,
            right: 2.0,
        }
    }
}

impl Margins {
    pub fn uniform(cm: f32) -> Self {
        Self {
            top: cm,
            bottom: cm,
            left: cm,
            right: cm,
        }
    }

    fn values(&self) -> [f32; 4] {
        [self.top, self.bottom, self.left, self.right]
    }
}

/// Resolved page geometry in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    pub margin_top: f32,
    pub margin_bottom: f32,
    pub margin_left: f32,
    pub margin_right: f32,
}

impl PageGeometry {
    pub fn new(size: PageSize, margins: Margins) -> Self {
        let (width, height) = size.dimensions_pt();
        Self {
            width,
            height,
            margin_top: margins.top * PT_PER_CM,
            margin_bottom: margins.bottom * PT_PER_CM,
            margin_left: margins.left * PT_PER_CM,
            margin_right: margins.right * PT_PER_CM,
        }
    }

    pub fn content_width(&self) -> f32 {
        self.width - self.margin_left - self.margin_right
    }

    pub fn content_height(&self) -> f32 {
        self.height - self.margin_top - self.margin_bottom
    }
}

/// Formatting options for a bilingual output document.
///
/// Field names serialize in camelCase so a JSON file such as
/// `{"fontSizePt": 11, "layoutMode": "interleaved", "primaryLanguage": 2}`
/// can be loaded directly; missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormatConfig {
    /// Font family for the first document
    pub font_lang1: String,

    /// Font family for the second document
    pub font_lang2: String,

    /// Base font size in points
    pub font_size_pt: f32,

    /// Explicit page margins; `None` uses the paged-format defaults
    #[serde(skip_serializing_if = "Option::is_none")]
    pub margins_cm: Option<Margins>,

    /// Horizontal placement of images
    pub image_placement: ImagePlacement,

    /// Image resize and recompression tier
    pub image_quality: ImageQuality,

    /// Document whose blocks come first
    pub primary_language: Language,

    /// Side-by-side or interleaved layout
    pub layout_mode: LayoutMode,

    /// Page size for paged outputs
    pub page_size: PageSize,

    /// Output document title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            font_lang1: "Times New Roman".to_string(),
            font_lang2: "Traditional Arabic".to_string(),
            font_size_pt: 12.0,
            margins_cm: None,
            image_placement: ImagePlacement::default(),
            image_quality: ImageQuality::default(),
            primary_language: Language::default(),
            layout_mode: LayoutMode::default(),
            page_size: PageSize::default(),
            title: None,
        }
    }
}

impl FormatConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Set the font families for both documents.
    pub fn with_fonts(mut self, lang1: impl Into<String>, lang2: impl Into<String>) -> Self {
        self.font_lang1 = lang1.into();
        self.font_lang2 = lang2.into();
        self
    }

    /// Set the base font size.
    pub fn with_font_size(mut self, size_pt: f32) -> Self {
        self.font_size_pt = size_pt;
        self
    }

    /// Set explicit page margins.
    pub fn with_margins(mut self, margins: Margins) -> Self {
        self.margins_cm = Some(margins);
        self
    }

    pub fn with_image_placement(mut self, placement: ImagePlacement) -> Self {
        self.image_placement = placement;
        self
    }

    pub fn with_image_quality(mut self, quality: ImageQuality) -> Self {
        self.image_quality = quality;
        self
    }

    pub fn with_primary_language(mut self, language: Language) -> Self {
        self.primary_language = language;
        self
    }

    pub fn with_layout_mode(mut self, mode: LayoutMode) -> Self {
        self.layout_mode = mode;
        self
    }

    pub fn with_page_size(mut self, size: PageSize) -> Self {
        self.page_size = size;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Margins used for paged output.
    pub fn effective_margins(&self) -> Margins {
        self.margins_cm.unwrap_or_default()
    }

    pub fn page_geometry(&self) -> PageGeometry {
        PageGeometry::new(self.page_size, self.effective_margins())
    }

    /// Font family for one of the two documents.
    pub fn font_for(&self, language: Language) -> &str {
        match language {
            Language::First => &self.font_lang1,
            Language::Second => &self.font_lang2,
        }
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if !(6.0..=72.0).contains(&self.font_size_pt) {
            return Err(Error::Config(format!(
                "fontSizePt must be between 6 and 72, got {}",
                self.font_size_pt
            )));
        }
        if self.font_lang1.trim().is_empty() || self.font_lang2.trim().is_empty() {
            return Err(Error::Config("font names must not be empty".into()));
        }
        if let Some(margins) = &self.margins_cm {
            if margins.values().iter().any(|m| !(0.0..=10.0).contains(m)) {
                return Err(Error::Config(format!(
                    "margins must be between 0 and 10 cm: {:?}",
                    margins
                )));
            }
        }
        let geometry = self.page_geometry();
        if geometry.content_width() <= 0.0 || geometry.content_height() <= 0.0 {
            return Err(Error::Config("margins leave no content area".into()));
        }
        Ok(())
    }
}

impl fmt::Display for LayoutMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutMode::SideBySide => write!(f, "side-by-side"),
            LayoutMode::Interleaved => write!(f, "interleaved"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FormatConfig::default();
        assert_eq!(config.font_lang1, "Times New Roman");
        assert_eq!(config.font_lang2, "Traditional Arabic");
        assert_eq!(config.font_size_pt, 12.0);
        assert!(config.margins_cm.is_none());
        assert_eq!(config.effective_margins(), Margins::default());
        assert_eq!(config.image_quality, ImageQuality::High);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_names() {
        let config = FormatConfig::from_json_str(
            r#"{
                "fontLang1": "Georgia",
                "fontSizePt": 11,
                "marginsCm": {"top": 1, "bottom": 1, "left": 1.5, "right": 1.5},
                "imagePlacement": "left",
                "imageQuality": "low",
                "primaryLanguage": 2,
                "layoutMode": "interleaved",
                "pageSize": "letter"
            }"#,
        )
        .unwrap();
        assert_eq!(config.font_lang1, "Georgia");
        assert_eq!(config.font_lang2, "Traditional Arabic");
        assert_eq!(config.margins_cm.map(|m| m.left), Some(1.5));
        assert_eq!(config.image_placement, ImagePlacement::Left);
        assert_eq!(config.primary_language, Language::Second);
        assert_eq!(config.layout_mode, LayoutMode::Interleaved);
        assert_eq!(config.page_size, PageSize::Letter);

        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"primaryLanguage\":2"));
        assert!(json.contains("\"layoutMode\":\"interleaved\""));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            FormatConfig::from_json_str(r#"{"primaryLanguage": 3}"#),
            Err(Error::Config(_))
        ));
        assert!(FormatConfig::new().with_font_size(2.0).validate().is_err());
        assert!(FormatConfig::new()
            .with_margins(Margins::uniform(11.0))
            .validate()
            .is_err());
        assert!(FormatConfig::new()
            .with_fonts("", "Amiri")
            .validate()
            .is_err());
    }

    #[test]
    fn test_geometry() {
        let geometry = FormatConfig::new()
            .with_margins(Margins::uniform(2.54))
            .page_geometry();
        assert!((geometry.margin_left - 72.0).abs() < 1e-3);
        assert!((geometry.content_width() - (595.28 - 144.0)).abs() < 1e-2);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("format.json");
        std::fs::write(&path, r#"{"imageQuality": "medium"}"#).unwrap();
        let config = FormatConfig::from_json_file(&path).unwrap();
        assert_eq!(config.image_quality, ImageQuality::Medium);
        assert_eq!(config.image_quality.max_edge_px(), 1600);
    }
}
