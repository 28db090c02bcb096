//! # Opening Bell: Opening-Range Momentum Session
//!
//! One symbol, one session, at most one trade.
//!
//! ```text
//!  ┌──────────────┐  wait for open   ┌──────────────────┐  bars / tick / info   ┌──────────────┐
//!  │   Clock      │ ────────────────▶│  Lifecycle       │ ─────────────────────▶│  MetaTrader  │
//!  │ (tokio time) │                  │  Controller      │ ◀─────────────────────│  5 (EA)      │
//!  └──────────────┘                  │                  │   order / positions   └──────────────┘
//!                                    │  momentum ▶ plan │
//!  ┌──────────────┐  Ctrl+C          │  ▶ place ▶ poll  │
//!  │   Operator   │ ────────────────▶│  ▶ time exit     │──▶ SessionReport (JSON log)
//!  └──────────────┘                  └──────────────────┘
//! ```
//!
//! ## Environment Variables
//!
//! See [`config`] for the full table.  The short version:
//!
//! | Variable        | Default                 | Description                         |
//! |-----------------|-------------------------|-------------------------------------|
//! | `MT5_BASE_URL`  | `http://localhost:8081` | MT5 EA bridge, or `mock`            |
//! | `SYMBOL`        | `US500`                 | Symbol traded this session          |
//! | `RUST_LOG`      | `opening_bell=debug`    | Tracing filter                      |

use anyhow::{bail, Context};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod engine;
mod error;
mod events;
mod gateway;
mod models;

use config::{Config, GatewayTarget};
use engine::cancel::CancelSignal;
use engine::clock::SystemClock;
use engine::lifecycle::{SessionReport, SessionState, TradeLifecycleController};
use gateway::mt5::Mt5Bridge;
use gateway::paper::PaperGateway;
use gateway::{Credentials, ExecutionGateway};

// ─── Entry Point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Load .env (optional, real env vars win) ───────────────────────────
    dotenvy::dotenv().ok();

    // ── 2. Initialise structured logging ─────────────────────────────────────
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env()
            .add_directive("opening_bell=debug".parse()?)
            .add_directive("reqwest=warn".parse()?))
        .init();

    info!(
        r#"

  ╔═══════════════════════════════════════════════╗
  ║        OPENING BELL — Momentum Session        ║
  ║        Rust + MT5  ·  one shot at the open    ║
  ╚═══════════════════════════════════════════════╝"#
    );

    // ── 3. Configuration ─────────────────────────────────────────────────────
    let config = Config::from_env().context("Failed to load config")?;

    info!(
        symbol      = %config.session.symbol,
        gateway     = ?config.gateway,
        market_open = %config.session.market_open,
        market_tz   = %config.session.market_tz,
        risk_pct    = config.session.risk.risk_percent,
        "Configuration loaded"
    );

    // ── 4. Ctrl+C → cancellation ─────────────────────────────────────────────
    let (handle, cancel) = CancelSignal::new();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("🛑 Ctrl+C received — cancelling session");
            handle.cancel();
        }
    });

    // ── 5. Run against the selected venue ────────────────────────────────────
    let report = match &config.gateway {
        GatewayTarget::Bridge(url) => {
            let bridge = Mt5Bridge::new(reqwest::Client::new(), url.clone());
            run_session(bridge, &config, cancel).await?
        }
        GatewayTarget::Mock => {
            warn!("⚠️ MT5_BASE_URL=mock — trading against the in-memory paper venue");
            run_session(PaperGateway::demo(), &config, cancel).await?
        }
    };

    // ── 6. Report ────────────────────────────────────────────────────────────
    info!(report = %report.to_json(), "📋 Session report");

    if report.is_failure() {
        if report.final_state == SessionState::CloseFailed {
            error!(ticket = ?report.ticket, "🚨 Position left open — manual intervention required");
        }
        bail!(
            "session ended in {:?}: {}",
            report.final_state,
            report.failure.unwrap_or_default()
        );
    }

    info!(state = ?report.final_state, "Session complete");
    Ok(())
}

async fn run_session<G: ExecutionGateway>(
    gateway: G,
    config: &Config,
    cancel: CancelSignal,
) -> anyhow::Result<SessionReport> {
    let credentials: &Credentials = &config.credentials;
    let mut controller = TradeLifecycleController::new(gateway, SystemClock, config.session.clone());

    controller
        .run(credentials, cancel)
        .await
        .context("Session could not start")
}
