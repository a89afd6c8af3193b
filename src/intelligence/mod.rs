pub mod absence;
pub mod engine;
pub mod momentum;
pub mod pattern_mining;
pub mod transition;

pub use absence::AbsenceRecovery;
pub use engine::StrategyEngine;
pub use momentum::Momentum;
pub use pattern_mining::PatternMining;
pub use transition::TransitionMatrix;

use crate::models::{Color, Outcome, Prediction};

/// A pluggable analysis function.
///
/// `recent` and `history` are both ordered most-recent-first; `history` is
/// a superset of `recent`. Implementations must be deterministic for a
/// given input and must derive colours from rolls via [`Outcome::color`].
pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn analyze(&self, recent: &[Outcome], history: &[Outcome]) -> anyhow::Result<Vec<Prediction>>;
}

// ---------------------------------------------------------------------------
// Shared sequence helpers
// ---------------------------------------------------------------------------

/// Colours oldest → newest.
pub(crate) fn chronological_colors(outcomes: &[Outcome]) -> Vec<Color> {
    outcomes.iter().rev().map(Outcome::color).collect()
}

/// The last `depth` colours of a most-recent-first window, oldest → newest.
pub(crate) fn trailing_pattern(recent: &[Outcome], depth: usize) -> Option<Vec<Color>> {
    if recent.len() < depth {
        return None;
    }
    Some(recent[..depth].iter().rev().map(Outcome::color).collect())
}

/// Tally what followed every occurrence of `pattern` in `seq`.
pub(crate) fn follower_counts(seq: &[Color], pattern: &[Color]) -> [usize; 3] {
    let mut counts = [0usize; 3];
    let k = pattern.len();
    if k == 0 || seq.len() <= k {
        return counts;
    }

    for i in 0..seq.len() - k {
        if seq[i..i + k] == *pattern {
            counts[seq[i + k].index()] += 1;
        }
    }
    counts
}

/// Most frequent colour in a tally with its percentage and sample size.
/// Ties resolve to the earlier colour in [`Color::ALL`].
pub(crate) fn dominant(counts: [usize; 3]) -> Option<(Color, f64, usize)> {
    let total: usize = counts.iter().sum();
    if total == 0 {
        return None;
    }

    let mut best = Color::ALL[0];
    for color in Color::ALL {
        if counts[color.index()] > counts[best.index()] {
            best = color;
        }
    }
    Some((best, pct(counts[best.index()], total), total))
}

pub(crate) fn pct(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 * 100.0 / whole as f64
}

/// Share of each colour in a window, as percentages indexed by [`Color::index`].
pub(crate) fn distribution(colors: impl Iterator<Item = Color>) -> ([f64; 3], usize) {
    let mut counts = [0usize; 3];
    let mut n = 0;
    for c in colors {
        counts[c.index()] += 1;
        n += 1;
    }
    ([pct(counts[0], n), pct(counts[1], n), pct(counts[2], n)], n)
}

pub(crate) fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

pub(crate) fn color_seq(colors: &[Color]) -> String {
    colors
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join("-")
}
