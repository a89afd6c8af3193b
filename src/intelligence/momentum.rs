use super::{chronological_colors, distribution, pct, round2, Strategy};
use crate::models::{Color, Outcome, Prediction};

const WINDOWS: [usize; 2] = [10, 20];
const MIN_BASELINE: usize = 50;

const HOT_DELTA: f64 = 15.0;
const HOT_MIN_COUNT: usize = 6;
const COLD_DELTA: f64 = -20.0;
const COLD_MAX_COUNT: usize = 2;
const MIN_RECOVERY_RATE: f64 = 50.0;
const MIN_RECOVERY_SAMPLES: usize = 5;
const MAX_CONFIDENCE: f64 = 78.0;

/// Scan window used to measure how often a cold colour came back.
const RECOVERY_WINDOW: usize = 10;

/// Recent-vs-baseline frequency drift, in both directions.
#[derive(Debug, Default, Clone, Copy)]
pub struct Momentum;

impl Strategy for Momentum {
    fn name(&self) -> &'static str {
        "momentum"
    }

    fn analyze(&self, recent: &[Outcome], history: &[Outcome]) -> anyhow::Result<Vec<Prediction>> {
        if history.len() < MIN_BASELINE {
            return Ok(Vec::new());
        }

        let (baseline, _) = distribution(history.iter().map(Outcome::color));
        let seq = chronological_colors(history);
        let mut predictions = Vec::new();

        for color in Color::PLAYABLE {
            let mut best: Option<Prediction> = None;

            for window in WINDOWS {
                if recent.len() < window {
                    continue;
                }

                let count = recent[..window].iter().filter(|o| o.color() == color).count();
                let share = pct(count, window);
                let base = baseline[color.index()];
                let delta = share - base;

                let candidate = if delta > HOT_DELTA && count >= HOT_MIN_COUNT {
                    Some(Prediction {
                        color,
                        confidence: round2((50.0 + delta).min(MAX_CONFIDENCE)),
                        rationale: format!(
                            "{color} is hot: {count}/{window} recent vs {base:.1}% baseline (+{delta:.1}pp)"
                        ),
                        strategy_name: self.name().to_string(),
                    })
                } else if delta < COLD_DELTA && count <= COLD_MAX_COUNT {
                    let (rate, samples) = recovery_rate(&seq, color);
                    (samples >= MIN_RECOVERY_SAMPLES && rate > MIN_RECOVERY_RATE).then(|| Prediction {
                        color,
                        confidence: round2(rate.min(MAX_CONFIDENCE)),
                        rationale: format!(
                            "{color} is cold: {count}/{window} recent vs {base:.1}% baseline, \
                             recovered next round {rate:.1}% of {samples} similar streaks"
                        ),
                        strategy_name: self.name().to_string(),
                    })
                } else {
                    None
                };

                if let Some(c) = candidate {
                    if best.as_ref().map_or(true, |b| c.confidence > b.confidence) {
                        best = Some(c);
                    }
                }
            }

            predictions.extend(best);
        }

        Ok(predictions)
    }
}

/// How often `color` appeared immediately after a window where it showed
/// up at most twice in ten rounds. Returns (percentage, samples).
pub(crate) fn recovery_rate(seq: &[Color], color: Color) -> (f64, usize) {
    if seq.len() <= RECOVERY_WINDOW {
        return (0.0, 0);
    }

    let mut in_window = seq[..RECOVERY_WINDOW].iter().filter(|c| **c == color).count();
    let mut samples = 0;
    let mut hits = 0;

    for i in 0..seq.len() - RECOVERY_WINDOW {
        if i > 0 {
            if seq[i - 1] == color {
                in_window -= 1;
            }
            if seq[i + RECOVERY_WINDOW - 1] == color {
                in_window += 1;
            }
        }

        if in_window <= COLD_MAX_COUNT {
            samples += 1;
            if seq[i + RECOVERY_WINDOW] == color {
                hits += 1;
            }
        }
    }

    (pct(hits, samples), samples)
}
