use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::Color;

/// One completed round from the feed.
///
/// `roll` is the source of truth. `cached_color` is whatever colour was
/// stored or reported alongside it and is only consulted when the roll is
/// unknown; consumers should read [`Outcome::color`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "OutcomeView")]
pub struct Outcome {
    pub external_id: String,
    pub roll: Option<i16>,
    #[serde(rename = "color")]
    pub cached_color: Color,
    pub occurred_at: DateTime<Utc>,
}

impl Outcome {
    /// Build an outcome from a known roll. Returns `None` when the roll is
    /// outside the wheel.
    pub fn from_roll(external_id: impl Into<String>, roll: i16, occurred_at: DateTime<Utc>) -> Option<Self> {
        let color = Color::from_roll(roll)?;
        Some(Self {
            external_id: external_id.into(),
            roll: Some(roll),
            cached_color: color,
            occurred_at,
        })
    }

    /// Colour derived from the roll, falling back to the cached colour only
    /// when no valid roll is available.
    pub fn color(&self) -> Color {
        self.roll
            .and_then(Color::from_roll)
            .unwrap_or(self.cached_color)
    }
}

/// Serialized form of [`Outcome`]; `color` is always the derived colour.
#[derive(Serialize)]
struct OutcomeView {
    external_id: String,
    roll: Option<i16>,
    color: Color,
    occurred_at: DateTime<Utc>,
}

impl From<Outcome> for OutcomeView {
    fn from(o: Outcome) -> Self {
        Self {
            color: o.color(),
            external_id: o.external_id,
            roll: o.roll,
            occurred_at: o.occurred_at,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.roll {
            Some(roll) => write!(f, "Outcome: id={} roll={} color={}", self.external_id, roll, self.color()),
            None => write!(f, "Outcome: id={} color={}", self.external_id, self.color()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_is_derived_from_roll_not_cache() {
        let mut o = Outcome::from_roll("g1", 3, Utc::now()).unwrap();
        o.cached_color = Color::Black;
        assert_eq!(o.color(), Color::Red);
    }

    #[test]
    fn test_cached_color_used_without_roll() {
        let o = Outcome {
            external_id: "g2".into(),
            roll: None,
            cached_color: Color::White,
            occurred_at: Utc::now(),
        };
        assert_eq!(o.color(), Color::White);
    }

    #[test]
    fn test_serialized_color_follows_roll() {
        let mut o = Outcome::from_roll("g4", 11, Utc::now()).unwrap();
        o.cached_color = Color::White;
        let v = serde_json::to_value(&o).unwrap();
        assert_eq!(v["color"], "black");
        assert_eq!(v["roll"], 11);
        assert_eq!(v["external_id"], "g4");
    }

    #[test]
    fn test_out_of_range_roll_rejected() {
        assert!(Outcome::from_roll("g3", 99, Utc::now()).is_none());
    }
}
