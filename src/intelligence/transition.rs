use super::{chronological_colors, color_seq, dominant, follower_counts, round2, trailing_pattern, Strategy};
use crate::models::{Outcome, Prediction};

/// Pattern depths tried in order, with the minimum number of historical
/// occurrences each depth needs before it is trusted.
const DEPTHS: [(usize, usize); 3] = [(4, 3), (3, 5), (2, 8)];

const MIN_PROBABILITY: f64 = 55.0;
const MAX_CONFIDENCE: f64 = 90.0;

/// First-order transition table keyed by the last k colours.
#[derive(Debug, Default, Clone, Copy)]
pub struct TransitionMatrix;

impl Strategy for TransitionMatrix {
    fn name(&self) -> &'static str {
        "transition_matrix"
    }

    fn analyze(&self, recent: &[Outcome], history: &[Outcome]) -> anyhow::Result<Vec<Prediction>> {
        let seq = chronological_colors(history);

        for (depth, min_samples) in DEPTHS {
            let Some(pattern) = trailing_pattern(recent, depth) else {
                continue;
            };

            let Some((color, probability, samples)) = dominant(follower_counts(&seq, &pattern)) else {
                continue;
            };

            if samples < min_samples || probability < MIN_PROBABILITY {
                continue;
            }

            return Ok(vec![Prediction {
                color,
                confidence: round2(probability.min(MAX_CONFIDENCE)),
                rationale: format!(
                    "after {} the next round was {} {:.1}% of the time ({} samples, depth {})",
                    color_seq(&pattern),
                    color,
                    probability,
                    samples,
                    depth
                ),
                strategy_name: self.name().to_string(),
            }]);
        }

        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intelligence::testutil::{alternating, history_from_colors};
    use crate::models::Color;

    #[test]
    fn test_alternating_history_predicts_opposite_of_last() {
        // oldest R ... newest B
        let history = history_from_colors(&alternating(20));
        assert_eq!(history[0].color(), Color::Black);

        let preds = TransitionMatrix.analyze(&history, &history).unwrap();
        assert_eq!(preds.len(), 1);
        assert_eq!(preds[0].color, Color::Red);
        assert!(preds[0].confidence >= 55.0);
        assert!(preds[0].confidence <= MAX_CONFIDENCE);
    }

    #[test]
    fn test_falls_back_to_shallower_depth() {
        use Color::{Black as B, Red as R, White as W};
        // Depth-4 and depth-3 keys [.., R, R] are too rare; depth 2 [R, R] → B many times
        let mut colors = Vec::new();
        for _ in 0..9 {
            colors.extend_from_slice(&[W, R, R, B, B]);
        }
        colors.extend_from_slice(&[B, R, R]);
        let history = history_from_colors(&colors);

        let preds = TransitionMatrix.analyze(&history, &history).unwrap();
        assert_eq!(preds.len(), 1);
        assert_eq!(preds[0].color, B);
        assert!(preds[0].rationale.contains("depth 2"));
    }

    #[test]
    fn test_no_prediction_without_enough_samples() {
        let history = history_from_colors(&alternating(8));
        let preds = TransitionMatrix.analyze(&history, &history).unwrap();
        assert!(preds.is_empty());
    }

    #[test]
    fn test_deterministic_for_fixed_input() {
        let history = history_from_colors(&alternating(40));
        let a = TransitionMatrix.analyze(&history[..20], &history).unwrap();
        let b = TransitionMatrix.analyze(&history[..20], &history).unwrap();
        assert_eq!(a, b);
    }
}
