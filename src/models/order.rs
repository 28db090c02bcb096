//! # models::order
//!
//! Typed order payloads sent to the MT5 bridge.
//!
//! ## Bridge Contract (`POST /order/send`)
//! ```json
//! { "kind": "OPEN",  "symbol": "US500", "action": "BUY", "volume": 0.13,
//!   "price": 100.0, "sl": 92.5, "tp": 110.0, "deviation": 20,
//!   "magic": 930001, "comment": "OB-1a2b3c4d" }
//! { "kind": "CLOSE", "position": 123456, "symbol": "US500", "action": "SELL",
//!   "volume": 0.13, "deviation": 20, "magic": 930001, "comment": "OB-1a2b3c4d" }
//! ```
//! Response: `{ "retcode": 10009, "order": 123456, "comment": "Request completed" }`.
//! retcode 10009 = `TRADE_RETCODE_DONE`, the only value treated as success.

use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::models::{Direction, OpenPosition, TradePlan};

/// `TRADE_RETCODE_DONE`
pub const TRADE_RETCODE_DONE: u32 = 10009;

// ─── Order Tag ────────────────────────────────────────────────────────────────

/// Fields stamped on every order of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderTag {
    pub magic:     u64,
    pub comment:   String,
    /// Maximum accepted slippage, in points.
    pub deviation: u32,
}

impl OrderTag {
    pub fn for_session(session_id: uuid::Uuid, magic: u64, deviation: u32) -> Self {
        Self {
            magic,
            comment: format!("OB-{}", &session_id.simple().to_string()[..8]),
            deviation,
        }
    }
}

// ─── Order Request ────────────────────────────────────────────────────────────

/// A market order: either opening the session's trade or flattening it.
///
/// Build through [`OrderRequest::open`] / [`OrderRequest::close`]; both refuse
/// to produce a payload with a missing or nonsensical field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderRequest {
    Open {
        symbol:    String,
        action:    Direction,
        volume:    f64,
        price:     f64,
        sl:        f64,
        tp:        f64,
        deviation: u32,
        magic:     u64,
        comment:   String,
    },
    Close {
        /// Ticket of the position being closed.
        position:  u64,
        symbol:    String,
        action:    Direction,
        volume:    f64,
        deviation: u32,
        magic:     u64,
        comment:   String,
    },
}

impl OrderRequest {
    /// Market order carrying the plan's stop-loss and take-profit.
    pub fn open(plan: &TradePlan, tag: &OrderTag) -> Result<Self, SessionError> {
        require_symbol(&plan.symbol)?;
        require_volume(plan.position_size)?;
        for (name, value) in [
            ("price", plan.entry_price),
            ("sl", plan.stop_loss),
            ("tp", plan.take_profit),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(SessionError::InvalidOrder(format!("{name} must be positive, got {value}")));
            }
        }
        if !plan.levels_are_ordered() {
            return Err(SessionError::InvalidOrder(format!(
                "{} levels out of order: sl={} entry={} tp={}",
                plan.direction, plan.stop_loss, plan.entry_price, plan.take_profit
            )));
        }

        Ok(OrderRequest::Open {
            symbol:    plan.symbol.clone(),
            action:    plan.direction,
            volume:    plan.position_size,
            price:     plan.entry_price,
            sl:        plan.stop_loss,
            tp:        plan.take_profit,
            deviation: tag.deviation,
            magic:     tag.magic,
            comment:   tag.comment.clone(),
        })
    }

    /// Opposing market order for the position's full volume.
    pub fn close(position: &OpenPosition, tag: &OrderTag) -> Result<Self, SessionError> {
        require_symbol(&position.symbol)?;
        require_volume(position.volume)?;
        if position.ticket == 0 {
            return Err(SessionError::InvalidOrder("position ticket missing".into()));
        }

        Ok(OrderRequest::Close {
            position:  position.ticket,
            symbol:    position.symbol.clone(),
            action:    position.direction.opposite(),
            volume:    position.volume,
            deviation: tag.deviation,
            magic:     tag.magic,
            comment:   tag.comment.clone(),
        })
    }

    pub fn symbol(&self) -> &str {
        match self {
            OrderRequest::Open { symbol, .. } | OrderRequest::Close { symbol, .. } => symbol,
        }
    }

    pub fn action(&self) -> Direction {
        match self {
            OrderRequest::Open { action, .. } | OrderRequest::Close { action, .. } => *action,
        }
    }

    pub fn volume(&self) -> f64 {
        match self {
            OrderRequest::Open { volume, .. } | OrderRequest::Close { volume, .. } => *volume,
        }
    }

    pub fn is_close(&self) -> bool {
        matches!(self, OrderRequest::Close { .. })
    }
}

fn require_symbol(symbol: &str) -> Result<(), SessionError> {
    if symbol.trim().is_empty() {
        return Err(SessionError::InvalidOrder("symbol is empty".into()));
    }
    Ok(())
}

fn require_volume(volume: f64) -> Result<(), SessionError> {
    if !volume.is_finite() || volume <= 0.0 {
        return Err(SessionError::InvalidOrder(format!("volume must be positive, got {volume}")));
    }
    Ok(())
}

// ─── Order Receipt ────────────────────────────────────────────────────────────

/// Response from the MT5 bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderReceipt {
    /// MT5 Return Code: 10009 = SUCCESS
    pub retcode: u32,
    /// Ticket (present when retcode = 10009)
    #[serde(default)]
    pub order:   Option<u64>,
    #[serde(default)]
    pub comment: Option<String>,
}

impl OrderReceipt {
    #[inline]
    pub fn is_done(&self) -> bool {
        self.retcode == TRADE_RETCODE_DONE
    }

    /// Human-readable reason for the log / report.
    pub fn describe(&self) -> String {
        format!(
            "retcode={} comment={}",
            self.retcode,
            self.comment.as_deref().unwrap_or("unknown")
        )
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
