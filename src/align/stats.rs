//! Summary statistics over an alignment.

use serde::{Deserialize, Serialize};

use crate::model::{AlignMethod, AlignedUnit};

/// Counts collected from a list of aligned units.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlignmentStats {
    /// Total number of units
    pub unit_count: usize,

    /// Pairs with identical content
    pub exact: usize,

    /// Pairs matched by structure
    pub structural: usize,

    /// Blocks of the first document without counterpart
    pub unmatched_left: usize,

    /// Blocks of the second document without counterpart
    pub unmatched_right: usize,

    /// Mean confidence over matched pairs
    pub mean_confidence: f32,
}

impl AlignmentStats {
    pub fn compute(units: &[AlignedUnit]) -> Self {
        let mut stats = Self {
            unit_count: units.len(),
            ..Default::default()
        };
        let mut confidence = 0.0f32;

        for unit in units {
            match unit.method() {
                AlignMethod::Exact => stats.exact += 1,
                AlignMethod::Structural => stats.structural += 1,
                AlignMethod::Unmatched if unit.left().is_some() => stats.unmatched_left += 1,
                AlignMethod::Unmatched => stats.unmatched_right += 1,
            }
            if unit.is_pair() {
                confidence += unit.confidence();
            }
        }

        let pairs = stats.pair_count();
        if pairs > 0 {
            stats.mean_confidence = confidence / pairs as f32;
        }
        stats
    }

    pub fn pair_count(&self) -> usize {
        self.exact + self.structural
    }

    pub fn unmatched_count(&self) -> usize {
        self.unmatched_left + self.unmatched_right
    }

    /// Share of units that are matched pairs.
    pub fn match_rate(&self) -> f32 {
        if self.unit_count == 0 {
            0.0
        } else {
            self.pair_count() as f32 / self.unit_count as f32
        }
    }
}
