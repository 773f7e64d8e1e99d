//! JSON export of an alignment for inspection and tooling.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::{AlignMethod, AlignedUnit, BlockKind, BlockRef, Direction, NormalizedDocument};

/// JSON output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonFormat {
    /// Pretty-printed JSON with indentation
    #[default]
    Pretty,
    /// Compact JSON without extra whitespace
    Compact,
}

/// One side of an exported unit.
#[derive(Debug, Clone, Serialize)]
pub struct AlignedBlockView {
    pub index: usize,
    pub kind: BlockKind,
    pub direction: Direction,
    pub text: String,
}

/// One exported unit with the text of both sides resolved.
#[derive(Debug, Clone, Serialize)]
pub struct AlignedPairView {
    pub left: Option<AlignedBlockView>,
    pub right: Option<AlignedBlockView>,
    pub method: AlignMethod,
    pub confidence: f32,
}

impl AlignedPairView {
    pub fn resolve(unit: &AlignedUnit, a: &NormalizedDocument, b: &NormalizedDocument) -> Self {
        Self {
            left: unit.left().and_then(|r| view(a, r)),
            right: unit.right().and_then(|r| view(b, r)),
            method: unit.method(),
            confidence: unit.confidence(),
        }
    }
}

fn view(doc: &NormalizedDocument, r: BlockRef) -> Option<AlignedBlockView> {
    doc.block(r.index()).map(|block| AlignedBlockView {
        index: r.index(),
        kind: block.kind,
        direction: block.direction,
        text: block.plain_text(),
    })
}

/// Convert an alignment to JSON, resolving block text from both documents.
pub fn to_json(
    units: &[AlignedUnit],
    a: &NormalizedDocument,
    b: &NormalizedDocument,
    format: JsonFormat,
) -> Result<String> {
    let views: Vec<AlignedPairView> = units
        .iter()
        .map(|u| AlignedPairView::resolve(u, a, b))
        .collect();
    let result = match format {
        JsonFormat::Pretty => serde_json::to_string_pretty(&views),
        JsonFormat::Compact => serde_json::to_string(&views),
    };

    result.map_err(|e| Error::Io(e.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Block, DocumentMetadata, LoadedDocument};
    use crate::normalize::Normalizer;

    fn doc(texts: &[&str]) -> NormalizedDocument {
        let mut loaded = LoadedDocument::new(DocumentMetadata::default());
        for t in texts {
            loaded.push(Block::paragraph(*t));
        }
        Normalizer::default().normalize(loaded).unwrap()
    }

    #[test]
    fn test_to_json_pretty() {
        let a = doc(&["Hello", "Extra"]);
        let b = doc(&["Bonjour"]);
        let units = vec![
            AlignedUnit::pair(0, 0, 0.9, AlignMethod::Structural),
            AlignedUnit::left_only(1),
        ];
        let json = to_json(&units, &a, &b, JsonFormat::Pretty).unwrap();
        assert!(json.contains("Bonjour"));
        assert!(json.contains("\"unmatched\""));
        assert!(json.contains('\n'));

        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(parsed[1]["right"].is_null());
        assert_eq!(parsed[1]["left"]["text"], "Extra");
    }

    #[test]
    fn test_to_json_compact() {
        let a = doc(&["Hello"]);
        let units = vec![AlignedUnit::pair(0, 0, 1.0, AlignMethod::Exact)];
        let json = to_json(&units, &a, &a, JsonFormat::Compact).unwrap();
        assert!(!json.contains('\n'));
        assert!(json.contains("\"exact\""));
    }
}
