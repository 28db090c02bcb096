//! # events
//!
//! Defines [`SessionEvent`], the in-memory transcript of one run.  It is
//! returned inside the session report and logged as JSON when the run ends;
//! nothing is persisted.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::engine::lifecycle::SessionState;
use crate::models::{Direction, MomentumSignal, TradePlan};

/// Why the controller sent a closing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitCause {
    /// Holding duration elapsed with the position still open.
    TimeExit,
    /// Operator interrupted the run while the position was live.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionEvent {
    StateChanged {
        from: SessionState,
        to:   SessionState,
        at:   DateTime<Utc>,
    },

    SignalComputed {
        signal: MomentumSignal,
    },

    PlanBuilt {
        plan: Box<TradePlan>,
    },

    /// Venue confirmed the opening order.
    OrderAccepted {
        ticket:  u64,
        comment: Option<String>,
    },

    /// Venue refused the opening order, or never received it.
    OrderRejected {
        reason: String,
    },

    /// Position disappeared between polls (broker-side SL/TP).
    PositionGone {
        ticket: u64,
        at:     DateTime<Utc>,
    },

    /// Opposing market order submitted for the full volume.
    CloseSent {
        ticket: u64,
        side:   Direction,
        volume: f64,
        cause:  ExitCause,
    },

    CloseFailed {
        ticket: u64,
        reason: String,
    },
}
