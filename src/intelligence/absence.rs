use super::{chronological_colors, distribution, pct, round2, Strategy};
use crate::models::{Color, Outcome, Prediction};

const MIN_GAP: usize = 3;
const MIN_RATE: f64 = 52.0;
const MIN_SAMPLES: usize = 5;
const MAX_CONFIDENCE: f64 = 82.0;

// White is rare, so it gets a much longer gap and its own scaling.
const WHITE_MIN_GAP: usize = 31;
const WHITE_BASE_CONFIDENCE: f64 = 40.0;
const WHITE_CONFIDENCE_PER_ROUND: f64 = 1.5;
const WHITE_MAX_CONFIDENCE: f64 = 80.0;

/// Bets on a colour coming back after it has been missing for a while.
#[derive(Debug, Default, Clone, Copy)]
pub struct AbsenceRecovery;

impl Strategy for AbsenceRecovery {
    fn name(&self) -> &'static str {
        "absence_recovery"
    }

    fn analyze(&self, recent: &[Outcome], history: &[Outcome]) -> anyhow::Result<Vec<Prediction>> {
        let seq = chronological_colors(history);
        let mut predictions = Vec::new();

        for color in Color::PLAYABLE {
            let gap = rounds_since(recent, color);
            if gap < MIN_GAP {
                continue;
            }

            let (rate, samples) = reappearance_rate(&seq, color, gap);
            if samples < MIN_SAMPLES || rate <= MIN_RATE {
                continue;
            }

            predictions.push(Prediction {
                color,
                confidence: round2(rate.min(MAX_CONFIDENCE)),
                rationale: format!(
                    "{color} absent for {gap} rounds; returned next {rate:.1}% of the time after gaps this long ({samples} samples)"
                ),
                strategy_name: self.name().to_string(),
            });
        }

        if let Some(p) = self.white_prediction(history, &seq) {
            predictions.push(p);
        }

        Ok(predictions)
    }
}

impl AbsenceRecovery {
    /// The white gap spans the full history so it is not capped by the
    /// analysis window.
    fn white_prediction(&self, history: &[Outcome], seq: &[Color]) -> Option<Prediction> {
        let gap = rounds_since(history, Color::White);
        if gap < WHITE_MIN_GAP {
            return None;
        }

        let (rate, samples) = reappearance_rate(seq, Color::White, gap);
        let (baseline, _) = distribution(history.iter().map(Outcome::color));
        let base = baseline[Color::White.index()];
        if samples < MIN_SAMPLES || rate < base {
            return None;
        }

        let confidence = (WHITE_BASE_CONFIDENCE
            + (gap - (WHITE_MIN_GAP - 1)) as f64 * WHITE_CONFIDENCE_PER_ROUND)
            .min(WHITE_MAX_CONFIDENCE);

        Some(Prediction {
            color: Color::White,
            confidence: round2(confidence),
            rationale: format!(
                "white absent for {gap} rounds; after gaps this long it hit {rate:.1}% vs {base:.1}% baseline ({samples} samples)"
            ),
            strategy_name: self.name().to_string(),
        })
    }
}

/// Rounds since `color` last appeared in a most-recent-first window. A
/// colour missing from the whole window counts as the window length.
pub(crate) fn rounds_since(recent: &[Outcome], color: Color) -> usize {
    recent
        .iter()
        .position(|o| o.color() == color)
        .unwrap_or(recent.len())
}

/// Over a chronological sequence, how often `color` appeared on a round
/// preceded by at least `gap` rounds without it. Returns (percentage, samples).
pub(crate) fn reappearance_rate(seq: &[Color], color: Color, gap: usize) -> (f64, usize) {
    let mut run = 0usize;
    let mut seen = false;
    let mut samples = 0;
    let mut hits = 0;

    for c in seq {
        // Only measure runs that started after an actual appearance.
        if seen && run >= gap {
            samples += 1;
            if *c == color {
                hits += 1;
            }
        }

        if *c == color {
            seen = true;
            run = 0;
        } else {
            run += 1;
        }
    }

    (pct(hits, samples), samples)
}
