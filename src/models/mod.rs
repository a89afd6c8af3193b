pub mod outcome;
pub mod signal;

pub use outcome::Outcome;
pub use signal::{Prediction, Signal, SignalCounts, SignalResult, SignalStats, StrategyStats};

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Color
// ---------------------------------------------------------------------------

/// Colour of a completed round. `White` is the rare neutral outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Red,
    Black,
}

impl Color {
    pub const ALL: [Color; 3] = [Color::White, Color::Red, Color::Black];
    pub const PLAYABLE: [Color; 2] = [Color::Red, Color::Black];

    /// Canonical roll → colour mapping: 0 is white, 1-7 red, 8-14 black.
    pub fn from_roll(roll: i16) -> Option<Self> {
        match roll {
            0 => Some(Color::White),
            1..=7 => Some(Color::Red),
            8..=14 => Some(Color::Black),
            _ => None,
        }
    }

    /// Parse the feed's colour field, which is either a numeric code
    /// (`0` white, `1` red, `2` black) or a name.
    pub fn from_api_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "0" | "white" => Some(Color::White),
            "1" | "red" => Some(Color::Red),
            "2" | "black" => Some(Color::Black),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Color::White => "white",
            Color::Red => "red",
            Color::Black => "black",
        }
    }

    /// Dense index for per-colour counting arrays.
    pub fn index(&self) -> usize {
        match self {
            Color::White => 0,
            Color::Red => 1,
            Color::Black => 2,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roll_mapping_boundaries() {
        assert_eq!(Color::from_roll(0), Some(Color::White));
        assert_eq!(Color::from_roll(1), Some(Color::Red));
        assert_eq!(Color::from_roll(7), Some(Color::Red));
        assert_eq!(Color::from_roll(8), Some(Color::Black));
        assert_eq!(Color::from_roll(14), Some(Color::Black));
        assert_eq!(Color::from_roll(15), None);
        assert_eq!(Color::from_roll(-1), None);
    }

    #[test]
    fn test_from_api_str_accepts_codes_and_names() {
        assert_eq!(Color::from_api_str("2"), Some(Color::Black));
        assert_eq!(Color::from_api_str("Red"), Some(Color::Red));
        assert_eq!(Color::from_api_str(" white "), Some(Color::White));
        assert_eq!(Color::from_api_str("green"), None);
    }
}
