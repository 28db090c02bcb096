//! # gateway
//!
//! **ExecutionGateway**: everything the session needs from the venue.
//!
//! ```text
//!   connect ─▶ bars / quote / symbol_meta / account_equity
//!           ─▶ send_order(Open)  ─▶ position(ticket) … ─▶ send_order(Close)
//!           ─▶ disconnect
//! ```
//!
//! Implementations:
//! - [`mt5::Mt5Bridge`]: HTTP client for the MT5 EA bridge
//! - [`paper::PaperGateway`]: in-memory venue (`MT5_BASE_URL=mock`, tests)

pub mod mt5;
pub mod paper;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{GatewayError, SessionError};
use crate::models::{
    OpenPosition, OrderReceipt, OrderRequest, OrderTag, PriceBar, Quote, SymbolMeta, TradePlan,
};

/// Login details for the trading account.
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub login:    u64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub password: String,
    pub server:   String,
}

/// Venue operations consumed by the lifecycle controller.
///
/// `connect` must succeed before any other call.  Every call is a single
/// request: implementations never retry.
pub trait ExecutionGateway {
    async fn connect(&mut self, credentials: &Credentials) -> Result<(), GatewayError>;

    async fn disconnect(&mut self);

    /// Up to `count` bars of `timeframe_minutes` starting at `start`.
    /// May return fewer bars, or none.
    async fn bars(
        &self,
        symbol: &str,
        timeframe_minutes: u32,
        start: DateTime<Utc>,
        count: u32,
    ) -> Result<Vec<PriceBar>, GatewayError>;

    async fn quote(&self, symbol: &str) -> Result<Quote, GatewayError>;

    /// `None` when the venue does not know the symbol.
    async fn symbol_meta(&self, symbol: &str) -> Result<Option<SymbolMeta>, GatewayError>;

    async fn account_equity(&self) -> Result<f64, GatewayError>;

    async fn send_order(&self, request: &OrderRequest) -> Result<OrderReceipt, GatewayError>;

    /// `None` once the position no longer exists (closed by SL/TP or otherwise).
    async fn position(&self, ticket: u64) -> Result<Option<OpenPosition>, GatewayError>;

    /// Submit the plan as a market order with embedded SL/TP.
    ///
    /// Anything short of `TRADE_RETCODE_DONE` (including an unreachable
    /// bridge) is `OrderRejected`.
    async fn place_order(&self, plan: &TradePlan, tag: &OrderTag) -> Result<OrderReceipt, SessionError> {
        let request = OrderRequest::open(plan, tag)?;
        let receipt = self
            .send_order(&request)
            .await
            .map_err(|e| SessionError::OrderRejected(e.to_string()))?;
        if !receipt.is_done() {
            return Err(SessionError::OrderRejected(receipt.describe()));
        }
        Ok(receipt)
    }

    /// Flatten `position` with an opposing market order for its full volume.
    async fn close_position(&self, position: &OpenPosition, tag: &OrderTag) -> Result<OrderReceipt, SessionError> {
        let request = OrderRequest::close(position, tag)?;
        let receipt = self
            .send_order(&request)
            .await
            .map_err(|e| SessionError::CloseFailed { ticket: position.ticket, reason: e.to_string() })?;
        if !receipt.is_done() {
            return Err(SessionError::CloseFailed {
                ticket: position.ticket,
                reason: receipt.describe(),
            });
        }
        Ok(receipt)
    }
}
