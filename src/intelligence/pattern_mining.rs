use chrono::Timelike;

use super::{chronological_colors, color_seq, distribution, dominant, follower_counts, round2, trailing_pattern, Strategy};
use crate::models::{Color, Outcome, Prediction};

/// Sliding sequence sizes tried in order; first qualifying one wins.
const SEQUENCE_DEPTHS: [(usize, usize); 3] = [(5, 3), (4, 4), (3, 5)];
const SEQUENCE_MIN_PROBABILITY: f64 = 55.0;
const SEQUENCE_MAX_CONFIDENCE: f64 = 85.0;

const ROLL_MIN_HISTORY: usize = 100;
const ROLL_MIN_SAMPLES: usize = 10;
const ROLL_MIN_PROBABILITY: f64 = 55.0;
const ROLL_MAX_CONFIDENCE: f64 = 80.0;

const HOUR_MIN_HISTORY: usize = 200;
const HOUR_MIN_SAMPLES: usize = 30;
const HOUR_MIN_EDGE: f64 = 8.0;
const HOUR_MAX_CONFIDENCE: f64 = 75.0;

/// Longer colour sequences, plus two secondary signals: what follows the
/// last exact roll, and hour-of-day bias when nothing else fires.
#[derive(Debug, Default, Clone, Copy)]
pub struct PatternMining;

impl Strategy for PatternMining {
    fn name(&self) -> &'static str {
        "pattern_mining"
    }

    fn analyze(&self, recent: &[Outcome], history: &[Outcome]) -> anyhow::Result<Vec<Prediction>> {
        let mut predictions = Vec::new();

        let seq = chronological_colors(history);
        predictions.extend(self.sequence_prediction(recent, &seq));
        predictions.extend(self.roll_prediction(recent, history));

        if predictions.is_empty() {
            predictions.extend(self.hour_prediction(recent, history));
        }

        Ok(predictions)
    }
}

impl PatternMining {
    fn sequence_prediction(&self, recent: &[Outcome], seq: &[Color]) -> Option<Prediction> {
        for (size, min_samples) in SEQUENCE_DEPTHS {
            let Some(pattern) = trailing_pattern(recent, size) else {
                continue;
            };
            let Some((color, probability, samples)) = dominant(follower_counts(seq, &pattern)) else {
                continue;
            };
            if samples < min_samples || probability < SEQUENCE_MIN_PROBABILITY {
                continue;
            }

            return Some(Prediction {
                color,
                confidence: round2(probability.min(SEQUENCE_MAX_CONFIDENCE)),
                rationale: format!(
                    "sequence {} was followed by {} {:.1}% of the time ({} samples)",
                    color_seq(&pattern),
                    color,
                    probability,
                    samples
                ),
                strategy_name: self.name().to_string(),
            });
        }
        None
    }

    fn roll_prediction(&self, recent: &[Outcome], history: &[Outcome]) -> Option<Prediction> {
        if history.len() < ROLL_MIN_HISTORY {
            return None;
        }
        let last_roll = recent.first()?.roll?;

        // history is newest-first, so history[i - 1] is what followed history[i]
        let mut counts = [0usize; 3];
        for i in 1..history.len() {
            if history[i].roll == Some(last_roll) {
                counts[history[i - 1].color().index()] += 1;
            }
        }

        let (color, probability, samples) = dominant(counts)?;
        if samples < ROLL_MIN_SAMPLES || probability < ROLL_MIN_PROBABILITY {
            return None;
        }

        Some(Prediction {
            color,
            confidence: round2(probability.min(ROLL_MAX_CONFIDENCE)),
            rationale: format!(
                "roll {last_roll} was followed by {color} {probability:.1}% of the time ({samples} samples)"
            ),
            strategy_name: self.name().to_string(),
        })
    }

    fn hour_prediction(&self, recent: &[Outcome], history: &[Outcome]) -> Option<Prediction> {
        if history.len() < HOUR_MIN_HISTORY {
            return None;
        }
        let hour = recent.first()?.occurred_at.hour();

        let (global, _) = distribution(history.iter().map(Outcome::color));
        let (in_hour, samples) = distribution(
            history
                .iter()
                .filter(|o| o.occurred_at.hour() == hour)
                .map(Outcome::color),
        );
        if samples < HOUR_MIN_SAMPLES {
            return None;
        }

        let mut best: Option<(Color, f64)> = None;
        for color in Color::PLAYABLE {
            let edge = in_hour[color.index()] - global[color.index()];
            if edge > HOUR_MIN_EDGE && best.map_or(true, |(_, e)| edge > e) {
                best = Some((color, edge));
            }
        }

        let (color, edge) = best?;
        Some(Prediction {
            color,
            confidence: round2((50.0 + edge).min(HOUR_MAX_CONFIDENCE)),
            rationale: format!(
                "{color} runs {edge:.1}pp above baseline at {hour:02}:00 UTC ({samples} samples)"
            ),
            strategy_name: self.name().to_string(),
        })
    }
}
