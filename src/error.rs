//! # error
//!
//! Centralised error types.
//!
//! `GatewayError` describes what went wrong talking to the venue;
//! `SessionError` is what the lifecycle controller reports for a run.  Every
//! failure is terminal for the session: nothing here is retried.

use thiserror::Error;

// ─── Gateway ──────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum GatewayError {
    /// The bridge could not be reached (DNS, refused, timeout).
    #[error("MT5 unreachable: {0}")]
    Transport(String),

    /// The bridge answered with a non-2xx status.
    #[error("MT5 HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The bridge answered 2xx but the body did not match the contract.
    #[error("MT5 response parse error: {0}")]
    Decode(String),

    /// A call was made before `connect` succeeded (or after `disconnect`).
    #[error("gateway not connected")]
    NotConnected,

    /// The terminal refused the login.
    #[error("login rejected for account {login}: {reason}")]
    LoginRejected { login: u64, reason: String },
}

// ─── Session ──────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SessionError {
    /// Authentication / initialisation failed; the state machine never started.
    #[error("connection error: {0}")]
    Connection(#[source] GatewayError),

    /// No bars came back for the opening window.
    #[error("no price data for {symbol} window starting {window_start}")]
    DataUnavailable {
        symbol:       String,
        window_start: chrono::DateTime<chrono::Utc>,
    },

    /// The planner could not produce a tradable plan.
    #[error("insufficient data to plan trade: {0}")]
    InsufficientData(String),

    /// An order request failed validation before it reached the gateway.
    #[error("invalid order request: {0}")]
    InvalidOrder(String),

    /// The venue refused (or never received) the opening order.
    #[error("order rejected: {0}")]
    OrderRejected(String),

    /// The time-exit close did not go through; the position is still open.
    #[error("close failed for ticket {ticket}: {reason}")]
    CloseFailed { ticket: u64, reason: String },
}
