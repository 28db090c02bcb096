//! # models::position
//!
//! [`OpenPosition`] is the gateway's view of a live position.  The controller
//! never caches it as truth: it holds the ticket and asks again on every poll.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Direction;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenPosition {
    /// MT5 ticket returned by the opening order.
    pub ticket:    u64,
    pub symbol:    String,
    pub volume:    f64,
    #[serde(alias = "type")]
    pub direction: Direction,
    #[serde(rename = "time", with = "chrono::serde::ts_seconds")]
    pub opened_at: DateTime<Utc>,
}
