//! Bilingual block alignment.
//!
//! The [`Aligner`] pairs the blocks of two normalized documents with a
//! monotone dynamic program: the result never inverts the order of either
//! document and covers every block exactly once. Large documents are first
//! partitioned at shared heading levels and aligned section by section.
//!
//! # Example
//!
//! ```no_run
//! use bifold::align::{AlignOptions, Aligner};
//! # fn run(a: &bifold::NormalizedDocument, b: &bifold::NormalizedDocument) -> bifold::Result<()> {
//! let units = Aligner::new(AlignOptions::default()).align(a, b)?;
//! println!("{} aligned units", units.len());
//! # Ok(())
//! # }
//! ```

mod dp;
mod export;
mod sections;
mod similarity;
mod stats;

pub use export::{to_json, AlignedBlockView, AlignedPairView, JsonFormat};
pub use similarity::{numeric_tokens, SimilarityWeights};
pub use stats::AlignmentStats;

use std::ops::Range;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use self::dp::{align_dp, DpParams, Step, MAX_TRACEBACK_CELLS};
use self::sections::{section_profile, shared_heading_level, split_sections};
use self::similarity::{length_ratio, profile_document, BlockProfile};
use crate::error::{Error, Result};
use crate::model::{AlignMethod, AlignedUnit, NormalizedDocument};

/// Options for the aligner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AlignOptions {
    /// Cost of leaving a block unmatched
    pub gap_penalty: f32,

    /// Weights of the similarity terms
    pub weights: SimilarityWeights,

    /// Block count above which documents are partitioned by headings
    pub section_threshold: usize,

    /// Align sections on the rayon pool
    pub parallel: bool,
}

impl AlignOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the gap penalty.
    pub fn with_gap_penalty(mut self, penalty: f32) -> Self {
        self.gap_penalty = penalty.max(0.0);
        self
    }

    /// Set similarity weights.
    pub fn with_weights(mut self, weights: SimilarityWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Set the block count above which sections are aligned separately.
    pub fn with_section_threshold(mut self, threshold: usize) -> Self {
        self.section_threshold = threshold.max(1);
        self
    }

    /// Align sections sequentially.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }
}

impl Default for AlignOptions {
    fn default() -> Self {
        Self {
            gap_penalty: 0.45,
            weights: SimilarityWeights::default(),
            section_threshold: 1500,
            parallel: true,
        }
    }
}

/// Pairs blocks of two documents into [`AlignedUnit`]s.
#[derive(Debug, Clone, Default)]
pub struct Aligner {
    options: AlignOptions,
}

enum Region {
    Both(Range<usize>, Range<usize>),
    LeftOnly(Range<usize>),
    RightOnly(Range<usize>),
}

impl Aligner {
    pub fn new(options: AlignOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &AlignOptions {
        &self.options
    }

    /// Align two documents.
    ///
    /// Fails with [`Error::AlignmentInfeasible`] if either document has no
    /// blocks.
    pub fn align(
        &self,
        a: &NormalizedDocument,
        b: &NormalizedDocument,
    ) -> Result<Vec<AlignedUnit>> {
        if a.is_empty() || b.is_empty() {
            let which = if a.is_empty() { "first" } else { "second" };
            return Err(Error::AlignmentInfeasible(format!(
                "the {} document has no alignable blocks",
                which
            )));
        }

        let pa = profile_document(a);
        let pb = profile_document(b);
        let params = DpParams {
            gap_penalty: self.options.gap_penalty,
            length_ratio: length_ratio(&pa, &pb),
            weights: self.options.weights,
            max_cells: MAX_TRACEBACK_CELLS,
        };

        let steps = self.align_region(&pa, &pb, 0..pa.len(), 0..pb.len(), 1, &params);
        let units: Vec<AlignedUnit> = steps.into_iter().map(to_unit).collect();

        log::info!(
            "Aligned {} x {} blocks into {} units",
            pa.len(),
            pb.len(),
            units.len()
        );
        Ok(units)
    }

    fn align_region(
        &self,
        pa: &[BlockProfile],
        pb: &[BlockProfile],
        ra: Range<usize>,
        rb: Range<usize>,
        level: u8,
        params: &DpParams,
    ) -> Vec<Step> {
        let (a, b) = (&pa[ra.clone()], &pb[rb.clone()]);
        let direct = || align_dp(a, b, ra.start, rb.start, params);

        if a.len().max(b.len()) <= self.options.section_threshold || a.is_empty() || b.is_empty() {
            return direct();
        }
        let Some(level) = shared_heading_level(a, b, level) else {
            log::debug!("No shared heading level below {}; aligning {}x{} directly", level, a.len(), b.len());
            return direct();
        };

        let sa = split_sections(a, level);
        let sb = split_sections(b, level);
        if sa.len() < 2 && sb.len() < 2 {
            return self.align_region(pa, pb, ra, rb, level + 1, params);
        }
        log::debug!(
            "Partitioned at heading level {}: {} and {} sections",
            level,
            sa.len(),
            sb.len()
        );

        let summary_a: Vec<_> = sa.iter().map(|r| section_profile(a, r)).collect();
        let summary_b: Vec<_> = sb.iter().map(|r| section_profile(b, r)).collect();
        let shift = |r: &Range<usize>, off: usize| (r.start + off)..(r.end + off);
        let regions: Vec<Region> = align_dp(&summary_a, &summary_b, 0, 0, params)
            .into_iter()
            .map(|step| match step {
                Step::Pair { left, right, .. } => {
                    Region::Both(shift(&sa[left], ra.start), shift(&sb[right], rb.start))
                }
                Step::Left(i) => Region::LeftOnly(shift(&sa[i], ra.start)),
                Step::Right(j) => Region::RightOnly(shift(&sb[j], rb.start)),
            })
            .collect();

        let run = |region: &Region| match region {
            Region::Both(x, y) => {
                self.align_region(pa, pb, x.clone(), y.clone(), level + 1, params)
            }
            Region::LeftOnly(x) => x.clone().map(Step::Left).collect(),
            Region::RightOnly(y) => y.clone().map(Step::Right).collect(),
        };
        let parts: Vec<Vec<Step>> = if self.options.parallel {
            regions.par_iter().map(run).collect()
        } else {
            regions.iter().map(run).collect()
        };
        parts.into_iter().flatten().collect()
    }
}

fn to_unit(step: Step) -> AlignedUnit {
    match step {
        Step::Pair {
            left,
            right,
            similarity,
            exact,
        } => {
            let method = if exact {
                AlignMethod::Exact
            } else {
                AlignMethod::Structural
            };
            AlignedUnit::pair(left, right, similarity, method)
        }
        Step::Left(i) => AlignedUnit::left_only(i),
        Step::Right(j) => AlignedUnit::right_only(j),
    }
}
