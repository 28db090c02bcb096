//! # gateway::paper
//!
//! In-memory venue.  Selected with `MT5_BASE_URL=mock` so the whole session
//! can be exercised without a terminal, and used by the test-suite to script
//! broker behaviour (rejections, SL/TP fills, flaky polls).

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use crate::error::GatewayError;
use crate::gateway::{Credentials, ExecutionGateway};
use crate::models::order::TRADE_RETCODE_DONE;
use crate::models::{OpenPosition, OrderReceipt, OrderRequest, PriceBar, Quote, SymbolMeta};

#[derive(Debug)]
struct PaperState {
    connected:       bool,
    reject_login:    bool,
    /// Generate a gently rising series for whatever window is requested.
    synthetic_bars:  bool,
    bars:            Vec<PriceBar>,
    fail_bars:       bool,
    quote:           Quote,
    meta:            Option<SymbolMeta>,
    equity:          f64,
    open_retcode:    u32,
    close_retcode:   u32,
    /// Position vanishes on this poll, as if SL/TP had been hit.
    fill_after_polls: Option<u32>,
    /// Number of leading polls that fail with a transport error.
    poll_errors:     u32,
    polls:           u32,
    next_ticket:     u64,
    positions:       Vec<OpenPosition>,
    sent:            Vec<OrderRequest>,
}

// ─── PaperGateway ─────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct PaperGateway {
    state: Mutex<PaperState>,
}

impl Default for PaperGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl PaperGateway {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PaperState {
                connected:        false,
                reject_login:     false,
                synthetic_bars:   false,
                bars:             Vec::new(),
                fail_bars:        false,
                quote:            Quote { bid: 99.98, ask: 100.0 },
                meta:             Some(SymbolMeta {
                    point_size: 0.01,
                    lot_step:   0.01,
                    volume_min: None,
                    volume_max: None,
                }),
                equity:           10_000.0,
                open_retcode:     TRADE_RETCODE_DONE,
                close_retcode:    TRADE_RETCODE_DONE,
                fill_after_polls: None,
                poll_errors:      0,
                polls:            0,
                next_ticket:      500_001,
                positions:        Vec::new(),
                sent:             Vec::new(),
            }),
        }
    }

    /// Paper venue with synthetic opening bars; used by `MT5_BASE_URL=mock`.
    pub fn demo() -> Self {
        let gateway = Self::new();
        gateway.lock().synthetic_bars = true;
        gateway
    }

    fn lock(&self) -> MutexGuard<'_, PaperState> {
        // A poisoned lock only means a test panicked mid-update; the data is still usable.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
impl PaperGateway {
    // ── Scripting ─────────────────────────────────────────────────────────────

    pub fn with_bars(self, bars: Vec<PriceBar>) -> Self {
        self.lock().bars = bars;
        self
    }

    pub fn with_quote(self, bid: f64, ask: f64) -> Self {
        self.lock().quote = Quote { bid, ask };
        self
    }

    pub fn with_symbol_meta(self, meta: Option<SymbolMeta>) -> Self {
        self.lock().meta = meta;
        self
    }

    pub fn with_equity(self, equity: f64) -> Self {
        self.lock().equity = equity;
        self
    }

    pub fn reject_login(self) -> Self {
        self.lock().reject_login = true;
        self
    }

    pub fn fail_bars(self) -> Self {
        self.lock().fail_bars = true;
        self
    }

    pub fn reject_orders(self, retcode: u32) -> Self {
        self.lock().open_retcode = retcode;
        self
    }

    pub fn reject_closes(self, retcode: u32) -> Self {
        self.lock().close_retcode = retcode;
        self
    }

    pub fn fill_after_polls(self, polls: u32) -> Self {
        self.lock().fill_after_polls = Some(polls);
        self
    }

    pub fn failing_polls(self, polls: u32) -> Self {
        self.lock().poll_errors = polls;
        self
    }

    // ── Inspection ────────────────────────────────────────────────────────────

    pub fn sent_orders(&self) -> Vec<OrderRequest> {
        self.lock().sent.clone()
    }

    pub fn open_positions(&self) -> Vec<OpenPosition> {
        self.lock().positions.clone()
    }

    pub fn poll_count(&self) -> u32 {
        self.lock().polls
    }

    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }
}

fn synthetic_window(start: DateTime<Utc>, count: u32) -> Vec<PriceBar> {
    (0..count)
        .map(|i| {
            let open = 100.0 + f64::from(i) * 0.6;
            PriceBar {
                open,
                high:      open + 0.8,
                low:       open - 0.2,
                close:     open + 0.6,
                volume:    120.0 + f64::from(i) * 10.0,
                timestamp: start + Duration::minutes(i64::from(i)),
            }
        })
        .collect()
}

impl ExecutionGateway for PaperGateway {
    async fn connect(&mut self, credentials: &Credentials) -> Result<(), GatewayError> {
        let mut state = self.lock();
        if state.reject_login {
            return Err(GatewayError::LoginRejected {
                login:  credentials.login,
                reason: "paper login rejected".to_string(),
            });
        }
        state.connected = true;
        info!(login = credentials.login, "🎭 Paper gateway connected");
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.lock().connected = false;
    }

    async fn bars(
        &self,
        _symbol: &str,
        timeframe_minutes: u32,
        start: DateTime<Utc>,
        count: u32,
    ) -> Result<Vec<PriceBar>, GatewayError> {
        let state = self.lock();
        if !state.connected {
            return Err(GatewayError::NotConnected);
        }
        if state.fail_bars {
            return Err(GatewayError::Transport("paper rates unavailable".to_string()));
        }
        if state.synthetic_bars {
            return Ok(synthetic_window(start, count));
        }

        let end = start + Duration::minutes(i64::from(timeframe_minutes) * i64::from(count));
        Ok(state
            .bars
            .iter()
            .filter(|b| b.timestamp >= start && b.timestamp < end)
            .take(count as usize)
            .copied()
            .collect())
    }

    async fn quote(&self, _symbol: &str) -> Result<Quote, GatewayError> {
        let state = self.lock();
        if !state.connected {
            return Err(GatewayError::NotConnected);
        }
        Ok(state.quote)
    }

    async fn symbol_meta(&self, _symbol: &str) -> Result<Option<SymbolMeta>, GatewayError> {
        let state = self.lock();
        if !state.connected {
            return Err(GatewayError::NotConnected);
        }
        Ok(state.meta)
    }

    async fn account_equity(&self) -> Result<f64, GatewayError> {
        let state = self.lock();
        if !state.connected {
            return Err(GatewayError::NotConnected);
        }
        Ok(state.equity)
    }

    async fn send_order(&self, request: &OrderRequest) -> Result<OrderReceipt, GatewayError> {
        let mut state = self.lock();
        if !state.connected {
            return Err(GatewayError::NotConnected);
        }
        state.sent.push(request.clone());

        match request {
            OrderRequest::Open { symbol, action, volume, .. } => {
                if state.open_retcode != TRADE_RETCODE_DONE {
                    return Ok(OrderReceipt {
                        retcode: state.open_retcode,
                        order:   None,
                        comment: Some("paper rejection".to_string()),
                    });
                }
                let ticket = state.next_ticket;
                state.next_ticket += 1;
                state.positions.push(OpenPosition {
                    ticket,
                    symbol:    symbol.clone(),
                    volume:    *volume,
                    direction: *action,
                    opened_at: Utc::now(),
                });
                Ok(OrderReceipt {
                    retcode: TRADE_RETCODE_DONE,
                    order:   Some(ticket),
                    comment: Some("Request completed".to_string()),
                })
            }
            OrderRequest::Close { position, .. } => {
                if state.close_retcode != TRADE_RETCODE_DONE {
                    return Ok(OrderReceipt {
                        retcode: state.close_retcode,
                        order:   None,
                        comment: Some("paper close rejection".to_string()),
                    });
                }
                state.positions.retain(|p| p.ticket != *position);
                Ok(OrderReceipt {
                    retcode: TRADE_RETCODE_DONE,
                    order:   Some(*position),
                    comment: Some("Request completed".to_string()),
                })
            }
        }
    }

    async fn position(&self, ticket: u64) -> Result<Option<OpenPosition>, GatewayError> {
        let mut state = self.lock();
        if !state.connected {
            return Err(GatewayError::NotConnected);
        }
        state.polls += 1;

        if state.poll_errors > 0 {
            state.poll_errors -= 1;
            return Err(GatewayError::Transport("paper poll timeout".to_string()));
        }
        if state.fill_after_polls.is_some_and(|n| state.polls >= n) {
            state.positions.retain(|p| p.ticket != ticket);
        }
        Ok(state.positions.iter().find(|p| p.ticket == ticket).cloned())
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
