//! # models::signal
//!
//! [`Direction`] and the [`MomentumSignal`] derived from the opening window.

use serde::{Deserialize, Serialize};

// ─── Direction ────────────────────────────────────────────────────────────────

/// Side of the market a trade (or a closing order) is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    /// The side that flattens a position opened on `self`.
    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            Direction::Buy  => Direction::Sell,
            Direction::Sell => Direction::Buy,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Buy  => "BUY",
            Direction::Sell => "SELL",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── MomentumSignal ───────────────────────────────────────────────────────────

/// Directional read of the opening window.
///
/// `strength` is `price_change / range_size`, or `0.0` for a flat window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MomentumSignal {
    pub direction:    Direction,
    /// Absolute distance between the window's first open and last close.
    pub price_change: f64,
    /// Window high minus window low.
    pub range_size:   f64,
    pub strength:     f64,
    /// Total tick volume divided by the window length in minutes.
    pub avg_volume:   f64,
}
