//! Monotone sequence alignment over two block ranges.

use std::ops::Range;

use super::similarity::{similarity, BlockProfile, SimilarityWeights};

/// One step of an alignment path, with indices relative to the whole document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    Pair {
        left: usize,
        right: usize,
        similarity: f32,
        exact: bool,
    },
    Left(usize),
    Right(usize),
}

/// Largest traceback matrix kept in memory, in cells. Bigger grids are
/// split in half recursively (Hirschberg) until each piece fits.
pub const MAX_TRACEBACK_CELLS: usize = 1 << 24;

/// Parameters shared by every region of one alignment run.
#[derive(Debug, Clone, Copy)]
pub struct DpParams {
    pub gap_penalty: f32,
    pub length_ratio: f32,
    pub weights: SimilarityWeights,
    pub max_cells: usize,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Move {
    Diagonal,
    Up,
    Left,
}

fn relative(i: usize, len: usize) -> f32 {
    if len > 1 {
        i as f32 / (len - 1) as f32
    } else {
        0.5
    }
}

/// Align `a` against `b`; `a_off`/`b_off` are added to the emitted indices.
///
/// Substitution costs `1 - similarity` and is forbidden between blocks of
/// different kinds; a gap costs `gap_penalty`. Ties prefer the diagonal;
/// between two gaps the unmatched block of the first document comes first.
pub fn align_dp(
    a: &[BlockProfile],
    b: &[BlockProfile],
    a_off: usize,
    b_off: usize,
    params: &DpParams,
) -> Vec<Step> {
    let grid = Grid {
        a,
        b,
        a_off,
        b_off,
        params,
    };
    let (n, m) = (a.len(), b.len());
    if (n + 1).saturating_mul(m + 1) > params.max_cells {
        log::warn!(
            "Alignment grid of {} x {} blocks exceeds {} cells; splitting it",
            n,
            m,
            params.max_cells
        );
    }
    let mut steps = Vec::with_capacity(n.max(m));
    grid.solve(0..n, 0..m, &mut steps);
    steps
}

struct Grid<'a> {
    a: &'a [BlockProfile],
    b: &'a [BlockProfile],
    a_off: usize,
    b_off: usize,
    params: &'a DpParams,
}

impl Grid<'_> {
    fn sim(&self, i: usize, j: usize) -> f32 {
        similarity(
            &self.a[i],
            &self.b[j],
            relative(i, self.a.len()),
            relative(j, self.b.len()),
            self.params.length_ratio,
            &self.params.weights,
        )
    }

    fn substitution(&self, i: usize, j: usize) -> Option<f32> {
        (self.a[i].class == self.b[j].class).then(|| 1.0 - self.sim(i, j))
    }

    fn pair(&self, i: usize, j: usize) -> Step {
        Step::Pair {
            left: self.a_off + i,
            right: self.b_off + j,
            similarity: self.sim(i, j),
            exact: self.a[i].is_exact_match(&self.b[j]),
        }
    }

    fn solve(&self, ra: Range<usize>, rb: Range<usize>, out: &mut Vec<Step>) {
        if ra.is_empty() || rb.is_empty() {
            out.extend(ra.map(|i| Step::Left(self.a_off + i)));
            out.extend(rb.map(|j| Step::Right(self.b_off + j)));
            return;
        }
        let cells = (ra.len() + 1).saturating_mul(rb.len() + 1);
        if cells <= self.params.max_cells || ra.len() == 1 {
            self.traceback(ra, rb, out);
            return;
        }

        let mid = ra.start + ra.len() / 2;
        let head = self.forward(ra.start..mid, rb.clone());
        let tail = self.backward(mid..ra.end, rb.clone());
        let mut split = 0;
        for k in 1..head.len() {
            if head[k] + tail[k] < head[split] + tail[split] {
                split = k;
            }
        }
        let cut = rb.start + split;
        self.solve(ra.start..mid, rb.start..cut, out);
        self.solve(mid..ra.end, cut..rb.end, out);
    }

    /// Cost of aligning `a[ra]` with every prefix of `b[rb]`.
    fn forward(&self, ra: Range<usize>, rb: Range<usize>) -> Vec<f32> {
        let gap = self.params.gap_penalty;
        let mut prev: Vec<f32> = (0..=rb.len()).map(|k| k as f32 * gap).collect();
        let mut curr = vec![0.0f32; rb.len() + 1];
        for i in ra {
            curr[0] = prev[0] + gap;
            for k in 1..=rb.len() {
                let j = rb.start + k - 1;
                let mut best = (curr[k - 1] + gap).min(prev[k] + gap);
                if let Some(cost) = self.substitution(i, j) {
                    best = best.min(prev[k - 1] + cost);
                }
                curr[k] = best;
            }
            std::mem::swap(&mut prev, &mut curr);
        }
        prev
    }

    /// Cost of aligning `a[ra]` with every suffix of `b[rb]`, indexed by
    /// where the suffix starts.
    fn backward(&self, ra: Range<usize>, rb: Range<usize>) -> Vec<f32> {
        let gap = self.params.gap_penalty;
        let w = rb.len();
        let mut prev: Vec<f32> = (0..=w).map(|k| (w - k) as f32 * gap).collect();
        let mut curr = vec![0.0f32; w + 1];
        for i in ra.rev() {
            curr[w] = prev[w] + gap;
            for k in (0..w).rev() {
                let j = rb.start + k;
                let mut best = (curr[k + 1] + gap).min(prev[k] + gap);
                if let Some(cost) = self.substitution(i, j) {
                    best = best.min(prev[k + 1] + cost);
                }
                curr[k] = best;
            }
            std::mem::swap(&mut prev, &mut curr);
        }
        prev
    }

    /// Full matrix alignment of one piece.
    fn traceback(&self, ra: Range<usize>, rb: Range<usize>, out: &mut Vec<Step>) {
        let gap = self.params.gap_penalty;
        let (n, m) = (ra.len(), rb.len());
        let width = m + 1;
        let mut moves = vec![Move::Diagonal; (n + 1) * width];
        let mut prev: Vec<f32> = (0..=m).map(|j| j as f32 * gap).collect();
        let mut curr = vec![0.0f32; width];
        moves[1..width].fill(Move::Left);

        for i in 1..=n {
            curr[0] = i as f32 * gap;
            moves[i * width] = Move::Up;
            for j in 1..=m {
                let mut best = f32::INFINITY;
                let mut choice = Move::Up;
                if let Some(cost) = self.substitution(ra.start + i - 1, rb.start + j - 1) {
                    best = prev[j - 1] + cost;
                    choice = Move::Diagonal;
                }
                let left = curr[j - 1] + gap;
                if left < best {
                    best = left;
                    choice = Move::Left;
                }
                let up = prev[j] + gap;
                if up < best {
                    best = up;
                    choice = Move::Up;
                }
                curr[j] = best;
                moves[i * width + j] = choice;
            }
            std::mem::swap(&mut prev, &mut curr);
        }

        let start = out.len();
        let (mut i, mut j) = (n, m);
        while i > 0 || j > 0 {
            match moves[i * width + j] {
                Move::Diagonal => {
                    out.push(self.pair(ra.start + i - 1, rb.start + j - 1));
                    i -= 1;
                    j -= 1;
                }
                Move::Up => {
                    out.push(Step::Left(self.a_off + ra.start + i - 1));
                    i -= 1;
                }
                Move::Left => {
                    out.push(Step::Right(self.b_off + rb.start + j - 1));
                    j -= 1;
                }
            }
        }
        out[start..].reverse();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::KindClass;

    fn p(class: KindClass, chars: usize) -> BlockProfile {
        BlockProfile {
            class,
            heading_level: None,
            chars,
            numbers: Vec::new(),
            key: String::new(),
            image_hash: None,
        }
    }

    fn params() -> DpParams {
        DpParams {
            gap_penalty: 0.45,
            length_ratio: 1.0,
            weights: SimilarityWeights::default(),
            max_cells: MAX_TRACEBACK_CELLS,
        }
    }

    #[test]
    fn test_equal_sequences_pair_diagonally() {
        let a = vec![p(KindClass::Paragraph, 50); 3];
        let steps = align_dp(&a, &a.clone(), 0, 0, &params());
        assert_eq!(steps.len(), 3);
        assert!(steps
            .iter()
            .enumerate()
            .all(|(k, s)| matches!(s, Step::Pair { left, right, .. } if *left == k && *right == k)));
    }

    #[test]
    fn test_kind_mismatch_becomes_gaps() {
        let a = vec![p(KindClass::Heading, 10)];
        let b = vec![p(KindClass::Paragraph, 10)];
        let steps = align_dp(&a, &b, 0, 0, &params());
        assert_eq!(steps, vec![Step::Left(0), Step::Right(0)]);
    }

    #[test]
    fn test_offsets_applied() {
        let a = vec![p(KindClass::Paragraph, 10)];
        let steps = align_dp(&a, &a.clone(), 5, 7, &params());
        assert!(matches!(steps[0], Step::Pair { left: 5, right: 7, .. }));
    }

    #[test]
    fn test_empty_side() {
        let a = vec![p(KindClass::Paragraph, 10); 2];
        let steps = align_dp(&a, &[], 0, 0, &params());
        assert_eq!(steps, vec![Step::Left(0), Step::Left(1)]);
        let steps = align_dp(&[], &a, 0, 0, &params());
        assert_eq!(steps, vec![Step::Right(0), Step::Right(1)]);
    }

    fn total_cost(steps: &[Step], a: &[BlockProfile], b: &[BlockProfile], params: &DpParams) -> f32 {
        let grid = Grid {
            a,
            b,
            a_off: 0,
            b_off: 0,
            params,
        };
        steps
            .iter()
            .map(|step| match *step {
                Step::Pair { left, right, .. } => grid.substitution(left, right).unwrap(),
                _ => params.gap_penalty,
            })
            .sum()
    }

    #[test]
    fn test_split_grid_matches_full_matrix() {
        let classes = [KindClass::Heading, KindClass::Paragraph, KindClass::Paragraph];
        let a: Vec<_> = (0..40)
            .map(|i| p(classes[i % 3], 20 + (i * 7) % 30))
            .collect();
        let b: Vec<_> = (0..33)
            .filter(|i| i % 11 != 5)
            .map(|i| p(classes[i % 3], 22 + (i * 5) % 28))
            .collect();

        let full = align_dp(&a, &b, 0, 0, &params());
        let small = DpParams {
            max_cells: 64,
            ..params()
        };
        let split = align_dp(&a, &b, 0, 0, &small);

        let lefts: Vec<_> = split
            .iter()
            .filter_map(|s| match *s {
                Step::Pair { left, .. } | Step::Left(left) => Some(left),
                Step::Right(_) => None,
            })
            .collect();
        let rights: Vec<_> = split
            .iter()
            .filter_map(|s| match *s {
                Step::Pair { right, .. } | Step::Right(right) => Some(right),
                Step::Left(_) => None,
            })
            .collect();
        assert_eq!(lefts, (0..a.len()).collect::<Vec<_>>());
        assert_eq!(rights, (0..b.len()).collect::<Vec<_>>());

        let (c_full, c_split) = (
            total_cost(&full, &a, &b, &params()),
            total_cost(&split, &a, &b, &small),
        );
        assert!((c_full - c_split).abs() < 1e-3, "{} vs {}", c_full, c_split);
    }
}
