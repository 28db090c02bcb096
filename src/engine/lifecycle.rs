//! # engine::lifecycle
//!
//! **Trade Lifecycle Controller**, the one state machine of the session.
//!
//! ```text
//! WAITING_FOR_OPEN ─▶ COLLECTING_WINDOW ─▶ EVALUATING_SIGNAL ─┬─▶ NO_TRADE
//!        │                    │                               └─▶ PLACING_ORDER ─┬─▶ ORDER_REJECTED
//!        └──── CANCELLED ◀────┘                                                  └─▶ MONITORING
//!                                                                                     │
//!                             CLOSED_BY_MARKET ◀── position gone ─────────────────────┤
//!                                                                                     ▼
//!                                         TIME_EXIT ─▶ CLOSING ─┬─▶ CLOSED
//!                                                               └─▶ CLOSE_FAILED
//! ```
//!
//! ## Suspensions
//! - **Timed**: market open, end of window via `Clock::sleep_until`, no venue calls.
//! - **Polling**: monitoring, one `position(ticket)` call per `poll_interval`,
//!   bounded by the exit deadline.
//!
//! Both race against the [`CancelSignal`].  Cancelling before an order is
//! placed ends the run as `CANCELLED`; cancelling while a position is live
//! takes the `TIME_EXIT` path so the position is flattened, not abandoned.

use std::time::Duration;

use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::engine::cancel::CancelSignal;
use crate::engine::clock::Clock;
use crate::engine::planner::{self, RiskParams};
use crate::engine::momentum;
use crate::error::SessionError;
use crate::events::{ExitCause, SessionEvent};
use crate::gateway::{Credentials, ExecutionGateway};
use crate::models::{MomentumSignal, OpenPosition, OrderTag, TradePlan};

// ─── State ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    WaitingForOpen,
    CollectingWindow,
    EvaluatingSignal,
    NoTrade,
    PlacingOrder,
    OrderRejected,
    Monitoring,
    ClosedByMarket,
    TimeExit,
    Closing,
    Closed,
    CloseFailed,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::NoTrade
                | SessionState::OrderRejected
                | SessionState::ClosedByMarket
                | SessionState::Closed
                | SessionState::CloseFailed
                | SessionState::Cancelled
        )
    }

    /// Edges of the state machine.
    pub fn allows(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (WaitingForOpen, CollectingWindow)
                | (WaitingForOpen, Cancelled)
                | (CollectingWindow, EvaluatingSignal)
                | (CollectingWindow, Cancelled)
                | (EvaluatingSignal, NoTrade)
                | (EvaluatingSignal, PlacingOrder)
                | (EvaluatingSignal, Cancelled)
                | (PlacingOrder, OrderRejected)
                | (PlacingOrder, Monitoring)
                | (Monitoring, ClosedByMarket)
                | (Monitoring, TimeExit)
                | (TimeExit, Closing)
                | (Closing, Closed)
                | (Closing, CloseFailed)
        )
    }
}

// ─── Config ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub symbol:         String,
    pub risk:           RiskParams,
    /// Signal strength must be strictly greater than this to trade.
    pub threshold:      f64,
    pub holding:        chrono::Duration,
    pub window_minutes: u32,
    /// Venue-local time of day the market opens.
    pub market_open:    NaiveTime,
    pub market_tz:      Tz,
    pub poll_interval:  Duration,
    pub deviation:      u32,
    pub magic:          u64,
}

impl SessionConfig {
    /// The market-open instant on the venue-local date of `now`, daylight
    /// saving included.
    ///
    /// An open time that falls in a DST gap resolves to the first valid local
    /// time after it; an ambiguous one resolves to the earlier instant.
    pub fn market_open_on(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let local_date = now.with_timezone(&self.market_tz).date_naive();
        let local_open = local_date.and_time(self.market_open);

        (0..=2)
            .find_map(|hours| {
                self.market_tz
                    .from_local_datetime(&(local_open + chrono::Duration::hours(hours)))
                    .earliest()
            })
            .map(|open| open.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&local_open))
    }

    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.window_minutes))
    }
}

// ─── Session / Report ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub symbol:        String,
    pub market_open:   Option<DateTime<Utc>>,
    /// Fixed once the opening order is accepted; `None` if no trade opened.
    pub exit_deadline: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub session_id:  Uuid,
    pub session:     Session,
    pub final_state: SessionState,
    pub signal:      Option<MomentumSignal>,
    pub plan:        Option<TradePlan>,
    pub ticket:      Option<u64>,
    pub failure:     Option<String>,
    pub events:      Vec<SessionEvent>,
}

impl SessionReport {
    /// States an operator has to act on.
    pub fn is_failure(&self) -> bool {
        matches!(self.final_state, SessionState::OrderRejected | SessionState::CloseFailed)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"error":"SERIALIZATION_ERROR"}"#.to_string())
    }
}

enum MonitorExit {
    Gone,
    Deadline(Option<OpenPosition>),
    Cancelled(Option<OpenPosition>),
}

// ─── Controller ───────────────────────────────────────────────────────────────

pub struct TradeLifecycleController<G, C> {
    gateway: G,
    clock:   C,
    config:  SessionConfig,
    tag:     OrderTag,
    report:  SessionReport,
}

impl<G: ExecutionGateway, C: Clock> TradeLifecycleController<G, C> {
    pub fn new(gateway: G, clock: C, config: SessionConfig) -> Self {
        let session_id = Uuid::new_v4();
        let tag = OrderTag::for_session(session_id, config.magic, config.deviation);
        let report = SessionReport {
            session_id,
            session: Session {
                symbol:        config.symbol.clone(),
                market_open:   None,
                exit_deadline: None,
            },
            final_state: SessionState::WaitingForOpen,
            signal:      None,
            plan:        None,
            ticket:      None,
            failure:     None,
            events:      Vec::new(),
        };
        Self { gateway, clock, config, tag, report }
    }

    #[cfg(test)]
    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    #[cfg(test)]
    pub fn clock(&self) -> &C {
        &self.clock
    }

    #[cfg(test)]
    pub fn state(&self) -> SessionState {
        self.report.final_state
    }

    /// Run the whole session: connect, trade at most once, disconnect.
    ///
    /// Only a failed connect is returned as `Err`; every other outcome is a
    /// terminal state in the report.
    pub async fn run(
        &mut self,
        credentials: &Credentials,
        mut cancel: CancelSignal,
    ) -> Result<SessionReport, SessionError> {
        info!(
            session_id = %self.report.session_id,
            symbol     = %self.config.symbol,
            threshold  = self.config.threshold,
            window_min = self.config.window_minutes,
            holding    = %self.config.holding,
            "🔔 Session starting"
        );

        if let Err(e) = self.gateway.connect(credentials).await {
            error!(error = %e, "❌ Gateway connection failed — session aborted");
            return Err(SessionError::Connection(e));
        }

        self.drive(&mut cancel).await;
        self.gateway.disconnect().await;

        info!(
            session_id  = %self.report.session_id,
            final_state = ?self.report.final_state,
            failure     = ?self.report.failure,
            "🏁 Session finished"
        );
        Ok(self.report.clone())
    }

    async fn drive(&mut self, cancel: &mut CancelSignal) {
        let symbol = self.config.symbol.clone();

        // ── 1. Wait for the open ─────────────────────────────────────────────
        let now = self.clock.now();
        let market_open = self.config.market_open_on(now);
        self.report.session.market_open = Some(market_open);

        if now < market_open {
            info!(%market_open, "⏳ Waiting for market open");
        }
        if self.suspend_until(market_open, cancel).await {
            return self.terminate(SessionState::Cancelled, Some("cancelled before market open".into()));
        }
        self.transition(SessionState::CollectingWindow);

        // ── 2. Let the opening window complete ───────────────────────────────
        let window_end = market_open + self.config.window();
        debug!(%window_end, "Collecting opening window");
        if self.suspend_until(window_end, cancel).await {
            return self.terminate(SessionState::Cancelled, Some("cancelled during opening window".into()));
        }
        self.transition(SessionState::EvaluatingSignal);

        // ── 3. Signal ────────────────────────────────────────────────────────
        let signal =
            match momentum::analyze(&self.gateway, &symbol, market_open, self.config.window_minutes).await {
                Ok(signal) => signal,
                Err(e) => {
                    warn!(error = %e, "No signal — standing aside");
                    return self.terminate(SessionState::NoTrade, Some(e.to_string()));
                }
            };
        self.report.signal = Some(signal);
        self.report.events.push(SessionEvent::SignalComputed { signal });

        if !(signal.strength > self.config.threshold) {
            info!(
                strength  = signal.strength,
                threshold = self.config.threshold,
                "😴 Momentum too weak — no trade"
            );
            return self.terminate(
                SessionState::NoTrade,
                Some(format!(
                    "strength {:.4} does not exceed threshold {}",
                    signal.strength, self.config.threshold
                )),
            );
        }

        // ── 4. Plan ──────────────────────────────────────────────────────────
        let plan = match planner::plan(&self.gateway, &symbol, &signal, &self.config.risk).await {
            Ok(plan) => plan,
            Err(e) => {
                warn!(error = %e, "Cannot size trade — standing aside");
                return self.terminate(SessionState::NoTrade, Some(e.to_string()));
            }
        };
        self.report.plan = Some(plan.clone());
        self.report.events.push(SessionEvent::PlanBuilt { plan: Box::new(plan.clone()) });

        if cancel.is_cancelled() {
            return self.terminate(SessionState::Cancelled, Some("cancelled before order placement".into()));
        }

        // ── 5. Place ─────────────────────────────────────────────────────────
        self.transition(SessionState::PlacingOrder);
        let receipt = match self.gateway.place_order(&plan, &self.tag).await {
            Ok(receipt) => receipt,
            Err(e) => {
                error!(error = %e, "❌ Opening order rejected");
                self.report.events.push(SessionEvent::OrderRejected { reason: e.to_string() });
                return self.terminate(SessionState::OrderRejected, Some(e.to_string()));
            }
        };

        let Some(ticket) = receipt.order else {
            // Accepted but unidentifiable: nothing to supervise
            error!("🚨 MT5 accepted the order without a ticket — check the terminal manually");
            let reason = "order accepted without ticket".to_string();
            self.report.events.push(SessionEvent::OrderRejected { reason: reason.clone() });
            return self.terminate(SessionState::OrderRejected, Some(reason));
        };

        let placed_at = self.clock.now();
        let deadline = placed_at + self.config.holding;
        self.report.ticket = Some(ticket);
        self.report.session.exit_deadline = Some(deadline);
        self.report.events.push(SessionEvent::OrderAccepted { ticket, comment: receipt.comment });
        self.transition(SessionState::Monitoring);
        info!(ticket, %deadline, "👀 Position open — monitoring until exit deadline");

        // ── 6. Monitor ───────────────────────────────────────────────────────
        let (last_seen, cause) = match self.monitor(ticket, deadline, cancel).await {
            MonitorExit::Gone => {
                info!(ticket, "🎯 Position closed by broker (SL/TP)");
                self.report.events.push(SessionEvent::PositionGone { ticket, at: self.clock.now() });
                return self.terminate(SessionState::ClosedByMarket, None);
            }
            MonitorExit::Deadline(last_seen) => (last_seen, ExitCause::TimeExit),
            MonitorExit::Cancelled(last_seen) => {
                warn!(ticket, "⚠️ Cancelled with a live position — flattening");
                (last_seen, ExitCause::Cancelled)
            }
        };

        // ── 7. Timed exit ────────────────────────────────────────────────────
        self.transition(SessionState::TimeExit);
        let position = last_seen.unwrap_or_else(|| OpenPosition {
            ticket,
            symbol:    plan.symbol.clone(),
            volume:    plan.position_size,
            direction: plan.direction,
            opened_at: placed_at,
        });
        self.close(position, cause).await;
    }

    /// Poll until the position disappears, the deadline passes, or the run is
    /// cancelled.  A failed poll counts as "still open".
    async fn monitor(&self, ticket: u64, deadline: DateTime<Utc>, cancel: &mut CancelSignal) -> MonitorExit {
        let mut last_seen = None;

        loop {
            match self.gateway.position(ticket).await {
                Ok(None) => return MonitorExit::Gone,
                Ok(Some(position)) => last_seen = Some(position),
                Err(e) => warn!(ticket, error = %e, "Position poll failed — assuming still open"),
            }

            let now = self.clock.now();
            if now >= deadline {
                return MonitorExit::Deadline(last_seen);
            }
            if cancel.is_cancelled() {
                return MonitorExit::Cancelled(last_seen);
            }

            let remaining = (deadline - now).to_std().unwrap_or_default();
            if self.suspend(self.config.poll_interval.min(remaining), cancel).await {
                return MonitorExit::Cancelled(last_seen);
            }
        }
    }

    async fn close(&mut self, position: OpenPosition, cause: ExitCause) {
        let ticket = position.ticket;
        self.transition(SessionState::Closing);
        self.report.events.push(SessionEvent::CloseSent {
            ticket,
            side:   position.direction.opposite(),
            volume: position.volume,
            cause,
        });
        info!(ticket, volume = position.volume, ?cause, "⏰ Closing position");

        match self.gateway.close_position(&position, &self.tag).await {
            Ok(_) => {
                info!(ticket, "✅ Position closed");
                self.terminate(SessionState::Closed, None);
            }
            Err(e) => {
                error!(
                    ticket,
                    error = %e,
                    "🚨 CLOSE FAILED — position is still open and no longer managed"
                );
                self.report.events.push(SessionEvent::CloseFailed { ticket, reason: e.to_string() });
                self.terminate(SessionState::CloseFailed, Some(e.to_string()));
            }
        }
    }

    // ── Suspension ────────────────────────────────────────────────────────────

    /// `true` when the wait was cut short by cancellation.
    async fn suspend_until(&self, deadline: DateTime<Utc>, cancel: &mut CancelSignal) -> bool {
        if cancel.is_cancelled() {
            return true;
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => true,
            _ = self.clock.sleep_until(deadline) => false,
        }
    }

    async fn suspend(&self, interval: Duration, cancel: &mut CancelSignal) -> bool {
        if cancel.is_cancelled() {
            return true;
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => true,
            _ = self.clock.sleep(interval) => false,
        }
    }

    // ── Transitions ───────────────────────────────────────────────────────────

    fn transition(&mut self, next: SessionState) {
        let from = self.report.final_state;
        debug_assert!(from.allows(next), "illegal transition {from:?} -> {next:?}");
        if !from.allows(next) {
            error!(?from, to = ?next, "Illegal session transition");
        }

        info!(?from, to = ?next, "State transition");
        self.report.final_state = next;
        self.report.events.push(SessionEvent::StateChanged { from, to: next, at: self.clock.now() });
    }

    fn terminate(&mut self, state: SessionState, failure: Option<String>) {
        debug_assert!(state.is_terminal(), "{state:?} is not terminal");
        self.transition(state);
        self.report.failure = failure;
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
