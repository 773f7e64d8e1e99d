//! Alignment output types.

use serde::{Deserialize, Serialize};

/// Index of a block within one of the two documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockRef(pub usize);

impl BlockRef {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// How an aligned unit was matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlignMethod {
    /// Identical content on both sides (numbers, names, shared images)
    Exact,
    /// Matched by kind, position and length heuristics
    Structural,
    /// No counterpart on the other side
    Unmatched,
}

impl std::fmt::Display for AlignMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlignMethod::Exact => write!(f, "exact"),
            AlignMethod::Structural => write!(f, "structural"),
            AlignMethod::Unmatched => write!(f, "unmatched"),
        }
    }
}

/// A pairing of at most one block from each document.
///
/// At least one side is always present; the constructors are the only way
/// to build a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedUnit {
    left: Option<BlockRef>,
    right: Option<BlockRef>,
    confidence: f32,
    method: AlignMethod,
}

impl AlignedUnit {
    /// A matched pair.
    pub fn pair(left: usize, right: usize, confidence: f32, method: AlignMethod) -> Self {
        Self {
            left: Some(BlockRef(left)),
            right: Some(BlockRef(right)),
            confidence: confidence.clamp(0.0, 1.0),
            method,
        }
    }

    /// A block from the first document with no counterpart.
    pub fn left_only(left: usize) -> Self {
        Self {
            left: Some(BlockRef(left)),
            right: None,
            confidence: 0.0,
            method: AlignMethod::Unmatched,
        }
    }

    /// A block from the second document with no counterpart.
    pub fn right_only(right: usize) -> Self {
        Self {
            left: None,
            right: Some(BlockRef(right)),
            confidence: 0.0,
            method: AlignMethod::Unmatched,
        }
    }

    pub fn left(&self) -> Option<BlockRef> {
        self.left
    }

    pub fn right(&self) -> Option<BlockRef> {
        self.right
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn method(&self) -> AlignMethod {
        self.method
    }

    pub fn is_pair(&self) -> bool {
        self.left.is_some() && self.right.is_some()
    }
}

/// Check that units cover `0..left_len` and `0..right_len` exactly once each,
/// in increasing order on both sides.
pub fn is_monotone_cover(units: &[AlignedUnit], left_len: usize, right_len: usize) -> bool {
    let mut next_left = 0;
    let mut next_right = 0;
    for unit in units {
        if unit.left.is_none() && unit.right.is_none() {
            return false;
        }
        if let Some(BlockRef(i)) = unit.left {
            if i != next_left {
                return false;
            }
            next_left += 1;
        }
        if let Some(BlockRef(j)) = unit.right {
            if j != next_right {
                return false;
            }
            next_right += 1;
        }
    }
    next_left == left_len && next_right == right_len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_keep_one_side() {
        let unit = AlignedUnit::left_only(3);
        assert_eq!(unit.left(), Some(BlockRef(3)));
        assert!(unit.right().is_none());
        assert_eq!(unit.method(), AlignMethod::Unmatched);

        let unit = AlignedUnit::pair(0, 1, 1.7, AlignMethod::Structural);
        assert!(unit.is_pair());
        assert_eq!(unit.confidence(), 1.0);
    }

    #[test]
    fn test_monotone_cover() {
        let units = vec![
            AlignedUnit::left_only(0),
            AlignedUnit::pair(1, 0, 0.9, AlignMethod::Structural),
            AlignedUnit::right_only(1),
        ];
        assert!(is_monotone_cover(&units, 2, 2));
        assert!(!is_monotone_cover(&units, 3, 2));

        let crossing = vec![
            AlignedUnit::pair(0, 1, 0.9, AlignMethod::Structural),
            AlignedUnit::pair(1, 0, 0.9, AlignMethod::Structural),
        ];
        assert!(!is_monotone_cover(&crossing, 2, 2));
    }
}
