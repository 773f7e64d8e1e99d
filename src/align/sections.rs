//! Heading-based partitioning for large documents.

use std::ops::Range;

use super::similarity::BlockProfile;
use crate::model::KindClass;

/// Smallest heading level, starting at `from`, that occurs in both inputs.
pub fn shared_heading_level(a: &[BlockProfile], b: &[BlockProfile], from: u8) -> Option<u8> {
    (from..=6).find(|&level| has_level(a, level) && has_level(b, level))
}

fn has_level(profiles: &[BlockProfile], level: u8) -> bool {
    profiles.iter().any(|p| p.heading_level == Some(level))
}

/// Split into contiguous sections, each starting at a heading of `level`
/// or above. Content before the first such heading forms a preamble.
pub fn split_sections(profiles: &[BlockProfile], level: u8) -> Vec<Range<usize>> {
    let mut sections = Vec::new();
    let mut start = 0;
    for (i, p) in profiles.iter().enumerate() {
        let boundary = p.heading_level.is_some_and(|l| l <= level);
        if boundary && i > start {
            sections.push(start..i);
            start = i;
        }
    }
    if start < profiles.len() {
        sections.push(start..profiles.len());
    }
    sections
}

/// Summary profile of a section, aligned like a single block.
///
/// Preambles get the paragraph class so they only ever pair with each other.
pub fn section_profile(profiles: &[BlockProfile], range: &Range<usize>) -> BlockProfile {
    let blocks = &profiles[range.clone()];
    let head = blocks.first();
    let is_preamble = head.map_or(true, |p| p.heading_level.is_none());
    let numbers = match head {
        Some(p) if !is_preamble => p.numbers.clone(),
        _ => Vec::new(),
    };

    BlockProfile {
        class: if is_preamble {
            KindClass::Paragraph
        } else {
            KindClass::Heading
        },
        heading_level: None,
        chars: blocks.iter().map(|p| p.chars).sum(),
        numbers,
        key: String::new(),
        image_hash: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(level: Option<u8>, chars: usize) -> BlockProfile {
        BlockProfile {
            class: if level.is_some() {
                KindClass::Heading
            } else {
                KindClass::Paragraph
            },
            heading_level: level,
            chars,
            numbers: Vec::new(),
            key: String::new(),
            image_hash: None,
        }
    }

    #[test]
    fn test_split_with_preamble() {
        let profiles = vec![
            block(None, 10),
            block(Some(1), 5),
            block(None, 10),
            block(Some(2), 5),
            block(None, 10),
            block(Some(1), 5),
        ];
        let sections = split_sections(&profiles, 1);
        assert_eq!(sections, vec![0..1, 1..5, 5..6]);

        let finer = split_sections(&profiles, 2);
        assert_eq!(finer, vec![0..1, 1..3, 3..5, 5..6]);
    }

    #[test]
    fn test_shared_level() {
        let a = vec![block(Some(2), 5), block(Some(3), 5)];
        let b = vec![block(Some(1), 5), block(Some(3), 5)];
        assert_eq!(shared_heading_level(&a, &b, 1), Some(3));
        assert_eq!(shared_heading_level(&a, &b, 4), None);
    }

    #[test]
    fn test_section_profile() {
        let profiles = vec![block(None, 10), block(Some(1), 5), block(None, 20)];
        let preamble = section_profile(&profiles, &(0..1));
        assert_eq!(preamble.class, KindClass::Paragraph);
        let chapter = section_profile(&profiles, &(1..3));
        assert_eq!(chapter.class, KindClass::Heading);
        assert_eq!(chapter.chars, 25);
    }
}
