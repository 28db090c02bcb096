//! # models::plan
//!
//! [`TradePlan`]: concrete prices and size for the session's single trade.

use serde::{Deserialize, Serialize};

use crate::models::Direction;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradePlan {
    pub symbol:        String,
    pub direction:     Direction,
    pub entry_price:   f64,
    pub stop_loss:     f64,
    pub take_profit:   f64,
    /// Lots, always a whole multiple of the symbol's lot step.
    pub position_size: f64,
}

impl TradePlan {
    /// `SL < entry < TP` for a BUY, `TP < entry < SL` for a SELL.
    pub fn levels_are_ordered(&self) -> bool {
        match self.direction {
            Direction::Buy => {
                self.stop_loss < self.entry_price && self.entry_price < self.take_profit
            }
            Direction::Sell => {
                self.take_profit < self.entry_price && self.entry_price < self.stop_loss
            }
        }
    }

    /// Price distance between entry and stop.
    #[inline]
    pub fn stop_distance(&self) -> f64 {
        (self.entry_price - self.stop_loss).abs()
    }
}
