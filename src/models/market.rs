//! # models::market
//!
//! Raw market data as the MT5 terminal hands it out: one-minute rate bars,
//! the live quote and the per-symbol trading constraints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single OHLC bar, mirroring the MQL5 `MqlRates` record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub open:  f64,
    pub high:  f64,
    pub low:   f64,
    pub close: f64,
    /// Tick volume (number of quote updates inside the bar).
    #[serde(alias = "tick_volume")]
    pub volume: f64,
    /// Bar open time. MT5 reports this as epoch seconds.
    #[serde(rename = "time", with = "chrono::serde::ts_seconds")]
    pub timestamp: DateTime<Utc>,
}

/// Best bid / ask at the moment of the request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Price at which the market buys from us (SELL entries fill here).
    pub bid: f64,
    /// Price at which the market sells to us (BUY entries fill here).
    pub ask: f64,
}

impl Quote {
    #[inline]
    pub fn spread(&self) -> f64 {
        self.ask - self.bid
    }
}

/// Symbol constraints needed to turn a risk budget into a lot size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SymbolMeta {
    /// Minimum price increment (`SYMBOL_POINT`).
    #[serde(alias = "point")]
    pub point_size: f64,
    /// Minimum volume increment (`SYMBOL_VOLUME_STEP`).
    #[serde(alias = "volume_step")]
    pub lot_step: f64,
    #[serde(default)]
    pub volume_min: Option<f64>,
    #[serde(default)]
    pub volume_max: Option<f64>,
}
