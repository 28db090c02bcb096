//! # gateway::mt5
//!
//! **MT5 Bridge**: talks to the MetaTrader 5 EA adapter over HTTP.
//!
//! ## Bridge API Contract (EA side)
//! | Method | Path              | Body / Query                          | Returns                     |
//! |--------|-------------------|---------------------------------------|-----------------------------|
//! | POST   | `/account/login`  | `{login, password, server}`           | `{ok, error?}`              |
//! | POST   | `/account/logout` | none                                  | anything                    |
//! | GET    | `/rates`          | `symbol, timeframe=M1, from, count`   | `[MqlRates]`                |
//! | GET    | `/symbol/tick`    | `symbol`                              | `{bid, ask}`                |
//! | GET    | `/symbol/info`    | `symbol`                              | `{point, volume_step, …}` / 404 |
//! | GET    | `/account/info`   | none                                  | `{equity, …}`               |
//! | POST   | `/order/send`     | [`OrderRequest`]                      | [`OrderReceipt`]            |
//! | GET    | `/positions`      | `ticket`                              | `[position]` (empty = gone) |

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize};
use tracing::{debug, error, info, warn};

use crate::error::GatewayError;
use crate::gateway::{Credentials, ExecutionGateway};
use crate::models::{OpenPosition, OrderReceipt, OrderRequest, PriceBar, Quote, SymbolMeta};

/// Never wait longer than this on a single bridge call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct LoginResponse {
    ok:    bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AccountInfo {
    equity: f64,
}

// ─── Mt5Bridge ────────────────────────────────────────────────────────────────

pub struct Mt5Bridge {
    client:    reqwest::Client,
    base_url:  String,
    connected: bool,
}

impl Mt5Bridge {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            connected: false,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn ensure_connected(&self) -> Result<(), GatewayError> {
        if self.connected { Ok(()) } else { Err(GatewayError::NotConnected) }
    }

    async fn execute(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, GatewayError> {
        builder
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "MT5 unreachable");
                GatewayError::Transport(e.to_string())
            })
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, GatewayError> {
        // ── HTTP Status ───────────────────────────────────────────────────────
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(http_status = %status, body = %body, "MT5 returned HTTP error");
            return Err(GatewayError::Http { status: status.as_u16(), body });
        }

        // ── Parse ─────────────────────────────────────────────────────────────
        response.json::<T>().await.map_err(|e| {
            error!(error = %e, "MT5 response parse failed");
            GatewayError::Decode(e.to_string())
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T, GatewayError> {
        self.ensure_connected()?;
        let response = self.execute(self.client.get(self.url(path)).query(query)).await?;
        Self::decode(response).await
    }
}

impl ExecutionGateway for Mt5Bridge {
    async fn connect(&mut self, credentials: &Credentials) -> Result<(), GatewayError> {
        info!(login = credentials.login, server = %credentials.server, url = %self.base_url, "🔌 Logging in to MT5");

        let response = self
            .execute(self.client.post(self.url("/account/login")).json(credentials))
            .await?;
        let login: LoginResponse = Self::decode(response).await?;

        if !login.ok {
            return Err(GatewayError::LoginRejected {
                login:  credentials.login,
                reason: login.error.unwrap_or_else(|| "unknown".to_string()),
            });
        }

        self.connected = true;
        info!(login = credentials.login, "✅ MT5 session established");
        Ok(())
    }

    async fn disconnect(&mut self) {
        if !self.connected {
            return;
        }
        self.connected = false;

        match self.execute(self.client.post(self.url("/account/logout"))).await {
            Ok(resp) if resp.status().is_success() => info!("MT5 session closed"),
            Ok(resp) => warn!(http_status = %resp.status(), "MT5 logout returned error status"),
            Err(e) => warn!(error = %e, "MT5 logout failed"),
        }
    }

    async fn bars(
        &self,
        symbol: &str,
        timeframe_minutes: u32,
        start: DateTime<Utc>,
        count: u32,
    ) -> Result<Vec<PriceBar>, GatewayError> {
        let bars: Vec<PriceBar> = self
            .get(
                "/rates",
                &[
                    ("symbol", symbol.to_string()),
                    ("timeframe", format!("M{timeframe_minutes}")),
                    ("from", start.timestamp().to_string()),
                    ("count", count.to_string()),
                ],
            )
            .await?;
        debug!(symbol, requested = count, received = bars.len(), "Rates fetched");
        Ok(bars)
    }

    async fn quote(&self, symbol: &str) -> Result<Quote, GatewayError> {
        self.get("/symbol/tick", &[("symbol", symbol.to_string())]).await
    }

    async fn symbol_meta(&self, symbol: &str) -> Result<Option<SymbolMeta>, GatewayError> {
        self.ensure_connected()?;
        let response = self
            .execute(self.client.get(self.url("/symbol/info")).query(&[("symbol", symbol)]))
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            warn!(symbol, "Symbol unknown to MT5");
            return Ok(None);
        }
        Self::decode(response).await.map(Some)
    }

    async fn account_equity(&self) -> Result<f64, GatewayError> {
        let info: AccountInfo = self.get("/account/info", &[]).await?;
        Ok(info.equity)
    }

    async fn send_order(&self, request: &OrderRequest) -> Result<OrderReceipt, GatewayError> {
        self.ensure_connected()?;

        info!(
            symbol  = %request.symbol(),
            action  = %request.action(),
            volume  = request.volume(),
            close   = request.is_close(),
            "🚀 Sending order to MT5"
        );

        let response = self
            .execute(self.client.post(self.url("/order/send")).json(request))
            .await?;
        let receipt: OrderReceipt = Self::decode(response).await?;

        if receipt.is_done() {
            info!(ticket = ?receipt.order, "✅ MT5 accepted order");
        } else {
            warn!("MT5 rejected: {}", receipt.describe());
        }
        Ok(receipt)
    }

    async fn position(&self, ticket: u64) -> Result<Option<OpenPosition>, GatewayError> {
        let positions: Vec<OpenPosition> = self
            .get("/positions", &[("ticket", ticket.to_string())])
            .await?;
        Ok(positions.into_iter().find(|p| p.ticket == ticket))
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
