//! Block similarity used as the substitution score of the alignment.

use serde::{Deserialize, Serialize};

use crate::model::{Block, KindClass, NormalizedDocument};

/// Relative weights of the similarity terms.
///
/// The lexical term only counts when at least one side contains numbers,
/// so prose without shared tokens is judged on structure alone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityWeights {
    /// Relative position proximity within the aligned region
    pub position: f32,
    /// Length plausibility after scaling by the document length ratio
    pub length: f32,
    /// Overlap of numeric tokens (dates, figures, section numbers)
    pub lexical: f32,
}

impl Default for SimilarityWeights {
    fn default() -> Self {
        Self {
            position: 0.45,
            length: 0.35,
            lexical: 0.20,
        }
    }
}

/// Multiplier applied when two headings differ in level.
const HEADING_LEVEL_PENALTY: f32 = 0.85;

/// Precomputed features of one block.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockProfile {
    pub class: KindClass,
    pub heading_level: Option<u8>,
    /// Characters of text content
    pub chars: usize,
    /// Sorted, deduplicated numeric tokens in ASCII digits
    pub numbers: Vec<String>,
    /// Case-folded text with collapsed whitespace
    pub key: String,
    /// Content hash for image blocks
    pub image_hash: Option<String>,
}

impl BlockProfile {
    pub fn from_block(block: &Block, doc: &NormalizedDocument) -> Self {
        let text = block.plain_text();
        let image_hash = if block.kind.is_image() {
            doc.resource_for(block).map(|r| r.content_hash())
        } else {
            None
        };
        Self {
            class: block.kind.class(),
            heading_level: block.kind.heading_level(),
            chars: block.char_len(),
            numbers: numeric_tokens(&text),
            key: if block.kind.is_image() {
                String::new()
            } else {
                text.split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" ")
                    .to_lowercase()
            },
            image_hash,
        }
    }

    /// Whether two blocks carry identical content.
    pub fn is_exact_match(&self, other: &BlockProfile) -> bool {
        if self.class != other.class {
            return false;
        }
        match (&self.image_hash, &other.image_hash) {
            (Some(a), Some(b)) => a == b,
            _ => !self.key.is_empty() && self.key == other.key,
        }
    }
}

/// Profiles for every block of a document.
pub fn profile_document(doc: &NormalizedDocument) -> Vec<BlockProfile> {
    doc.blocks
        .iter()
        .map(|b| BlockProfile::from_block(b, doc))
        .collect()
}

/// Ratio of text volume between the second and first document.
///
/// Translations run consistently longer or shorter than their source; the
/// ratio calibrates the length term.
pub fn length_ratio(a: &[BlockProfile], b: &[BlockProfile]) -> f32 {
    let total = |p: &[BlockProfile]| p.iter().map(|x| x.chars).sum::<usize>() as f32;
    let (ta, tb) = (total(a), total(b));
    if ta == 0.0 || tb == 0.0 {
        1.0
    } else {
        tb / ta
    }
}

/// Similarity in `[0, 1]`; zero when the kinds differ.
pub fn similarity(
    a: &BlockProfile,
    b: &BlockProfile,
    pos_a: f32,
    pos_b: f32,
    ratio: f32,
    weights: &SimilarityWeights,
) -> f32 {
    if a.class != b.class {
        return 0.0;
    }
    if a.is_exact_match(b) {
        return 1.0;
    }

    let position = 1.0 - (pos_a - pos_b).abs().min(1.0);
    let length = if a.class == KindClass::Image {
        1.0
    } else {
        length_plausibility(a.chars, b.chars, ratio)
    };

    let mut score = weights.position * position + weights.length * length;
    let mut total = weights.position + weights.length;
    if !a.numbers.is_empty() || !b.numbers.is_empty() {
        score += weights.lexical * jaccard(&a.numbers, &b.numbers);
        total += weights.lexical;
    }

    let mut sim = if total > 0.0 { score / total } else { 0.0 };
    if let (Some(la), Some(lb)) = (a.heading_level, b.heading_level) {
        if la != lb {
            sim *= HEADING_LEVEL_PENALTY;
        }
    }
    sim.clamp(0.0, 1.0)
}

fn length_plausibility(a: usize, b: usize, ratio: f32) -> f32 {
    let expected = a as f32 * ratio;
    let actual = b as f32;
    let (lo, hi) = if expected < actual {
        (expected, actual)
    } else {
        (actual, expected)
    };
    if hi <= 0.0 {
        return 1.0;
    }
    (lo / hi).sqrt()
}

fn jaccard(a: &[String], b: &[String]) -> f32 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let shared = a.iter().filter(|x| b.binary_search(x).is_ok()).count();
    let union = a.len() + b.len() - shared;
    shared as f32 / union as f32
}

/// Numeric tokens with Arabic-Indic and Persian digits folded to ASCII.
pub fn numeric_tokens(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        if let Some(d) = ascii_digit(c) {
            current.push(d);
        } else if matches!(c, '.' | ',' | '٫' | '٬') && !current.is_empty() {
            continue;
        } else if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens.sort();
    tokens.dedup();
    tokens
}

fn ascii_digit(c: char) -> Option<char> {
    let value = match c {
        '0'..='9' => c as u32 - '0' as u32,
        '\u{0660}'..='\u{0669}' => c as u32 - 0x0660,
        '\u{06F0}'..='\u{06F9}' => c as u32 - 0x06F0,
        _ => return None,
    };
    char::from_digit(value, 10)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(class: KindClass, chars: usize, numbers: &[&str]) -> BlockProfile {
        BlockProfile {
            class,
            heading_level: None,
            chars,
            numbers: numbers.iter().map(|s| s.to_string()).collect(),
            key: format!("text-{}", chars),
            image_hash: None,
        }
    }

    #[test]
    fn test_kind_mismatch_is_zero() {
        let a = profile(KindClass::Heading, 20, &[]);
        let b = profile(KindClass::Paragraph, 20, &[]);
        let w = SimilarityWeights::default();
        assert_eq!(similarity(&a, &b, 0.0, 0.0, 1.0, &w), 0.0);
    }

    #[test]
    fn test_same_position_and_length_is_high() {
        let a = profile(KindClass::Paragraph, 100, &[]);
        let b = profile(KindClass::Paragraph, 120, &[]);
        let w = SimilarityWeights::default();
        let sim = similarity(&a, &b, 0.5, 0.5, 1.2, &w);
        assert!(sim > 0.99, "sim = {}", sim);

        let far = similarity(&a, &b, 0.0, 1.0, 1.2, &w);
        assert!(far < sim);
    }

    #[test]
    fn test_length_mismatch_lowers_similarity() {
        let a = profile(KindClass::Paragraph, 400, &[]);
        let b = profile(KindClass::Paragraph, 20, &[]);
        let w = SimilarityWeights::default();
        assert!(similarity(&a, &b, 0.5, 0.5, 1.0, &w) < 0.8);
    }

    #[test]
    fn test_numbers_count_only_when_present() {
        let w = SimilarityWeights::default();
        let a = profile(KindClass::Paragraph, 50, &["1999", "42"]);
        let same = profile(KindClass::Paragraph, 50, &["1999", "42"]);
        let other = profile(KindClass::Paragraph, 50, &["7"]);
        assert!(similarity(&a, &same, 0.2, 0.3, 1.0, &w) > similarity(&a, &other, 0.2, 0.3, 1.0, &w));
    }

    #[test]
    fn test_heading_level_penalty() {
        let w = SimilarityWeights::default();
        let mut a = profile(KindClass::Heading, 10, &[]);
        let mut b = profile(KindClass::Heading, 10, &[]);
        a.heading_level = Some(1);
        b.heading_level = Some(2);
        b.key = "other heading".into();
        let sim = similarity(&a, &b, 0.0, 0.0, 1.0, &w);
        assert!((sim - HEADING_LEVEL_PENALTY).abs() < 1e-4);
    }

    #[test]
    fn test_exact_match_by_text_or_image_hash() {
        let w = SimilarityWeights::default();
        let mut a = profile(KindClass::Image, 0, &[]);
        let mut b = profile(KindClass::Image, 0, &[]);
        a.image_hash = Some("abc".into());
        b.image_hash = Some("abc".into());
        assert!(a.is_exact_match(&b));
        assert_eq!(similarity(&a, &b, 0.0, 1.0, 1.0, &w), 1.0);

        b.image_hash = Some("def".into());
        assert!(!a.is_exact_match(&b));
    }

    #[test]
    fn test_numeric_tokens_fold_digits() {
        assert_eq!(numeric_tokens("Chapter ١٢, page 3.5 and 12"), vec!["12", "35"]);
        assert_eq!(numeric_tokens("no digits"), Vec::<String>::new());
    }
}
