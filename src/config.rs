//! # config: Session configuration from environment variables
//!
//! | Variable             | Default                 | Description                            |
//! |----------------------|-------------------------|----------------------------------------|
//! | `SYMBOL`             | `US500`                 | Symbol traded this session             |
//! | `MT5_BASE_URL`       | `http://localhost:8081` | MT5 EA bridge, or `mock` for paper     |
//! | `MT5_LOGIN`          | required (not in mock)  | Account number                         |
//! | `MT5_PASSWORD`       | required (not in mock)  | Account password                       |
//! | `MT5_SERVER`         | required (not in mock)  | Broker server name                     |
//! | `RISK_PERCENT`       | `1.0`                   | Equity % lost if the stop is hit       |
//! | `MOMENTUM_THRESHOLD` | `0.3`                   | Strength must exceed this to trade     |
//! | `SL_MULTIPLIER`      | `1.5`                   | Stop distance in opening ranges        |
//! | `TP_MULTIPLIER`      | `2.0`                   | Target distance in opening ranges      |
//! | `HOLDING_MINUTES`    | `60`                    | Forced exit after this long            |
//! | `WINDOW_MINUTES`     | `5`                     | Opening window length                  |
//! | `MARKET_OPEN`        | `09:30`                 | Venue-local open time                  |
//! | `MARKET_TZ`          | `America/New_York`      | Venue time zone (IANA name)            |
//! | `POLL_INTERVAL_MS`   | `1000`                  | Position poll interval                 |
//! | `ORDER_DEVIATION`    | `20`                    | Accepted slippage in points            |
//! | `MAGIC_NUMBER`       | `930001`                | Tag on every order of the session      |

use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context};
use chrono::NaiveTime;
use chrono_tz::Tz;

use crate::engine::lifecycle::SessionConfig;
use crate::engine::planner::RiskParams;
use crate::gateway::Credentials;

/// Where orders go.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayTarget {
    /// MT5 EA bridge at this base URL.
    Bridge(String),
    /// In-memory paper venue.
    Mock,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub gateway:     GatewayTarget,
    pub credentials: Credentials,
    pub session:     SessionConfig,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::from_env`] but reading from an arbitrary source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let gateway = match var("MT5_BASE_URL") {
            Some(url) if url.eq_ignore_ascii_case("mock") => GatewayTarget::Mock,
            Some(url) => GatewayTarget::Bridge(url),
            None => GatewayTarget::Bridge("http://localhost:8081".to_string()),
        };

        let credentials = match gateway {
            GatewayTarget::Mock => Credentials {
                login:    parse_or(&var, "MT5_LOGIN", 0)?,
                password: var("MT5_PASSWORD").unwrap_or_default(),
                server:   var("MT5_SERVER").unwrap_or_else(|| "paper".to_string()),
            },
            GatewayTarget::Bridge(_) => Credentials {
                login: var("MT5_LOGIN")
                    .context("MT5_LOGIN environment variable is required")?
                    .parse()
                    .context("MT5_LOGIN must be an account number")?,
                password: var("MT5_PASSWORD").context("MT5_PASSWORD environment variable is required")?,
                server:   var("MT5_SERVER").context("MT5_SERVER environment variable is required")?,
            },
        };

        let market_open = match var("MARKET_OPEN") {
            Some(raw) => NaiveTime::parse_from_str(&raw, "%H:%M")
                .with_context(|| format!("MARKET_OPEN must be HH:MM, got '{raw}'"))?,
            None => NaiveTime::from_hms_opt(9, 30, 0).context("invalid default market open")?,
        };

        let market_tz = match var("MARKET_TZ") {
            Some(raw) => raw.parse::<Tz>().map_err(|e| {
                anyhow::anyhow!("MARKET_TZ must be an IANA zone like America/New_York, got '{raw}': {e}")
            })?,
            None => chrono_tz::America::New_York,
        };

        let risk = RiskParams {
            risk_percent:  parse_or(&var, "RISK_PERCENT", 1.0)?,
            sl_multiplier: parse_or(&var, "SL_MULTIPLIER", 1.5)?,
            tp_multiplier: parse_or(&var, "TP_MULTIPLIER", 2.0)?,
        };

        let session = SessionConfig {
            symbol:        var("SYMBOL").unwrap_or_else(|| "US500".to_string()),
            risk,
            threshold:     parse_or(&var, "MOMENTUM_THRESHOLD", 0.3)?,
            holding:       chrono::Duration::try_minutes(parse_or(&var, "HOLDING_MINUTES", 60)?)
                .context("HOLDING_MINUTES out of range")?,
            window_minutes: parse_or(&var, "WINDOW_MINUTES", 5)?,
            market_open,
            market_tz,
            poll_interval: Duration::from_millis(parse_or(&var, "POLL_INTERVAL_MS", 1000)?),
            deviation:     parse_or(&var, "ORDER_DEVIATION", 20)?,
            magic:         parse_or(&var, "MAGIC_NUMBER", 930_001)?,
        };

        validate(&session)?;

        Ok(Self { gateway, credentials, session })
    }
}

fn parse_or<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("{key} must be a number, got '{raw}'")),
        None => Ok(default),
    }
}

fn validate(session: &SessionConfig) -> anyhow::Result<()> {
    if !(session.risk.risk_percent > 0.0 && session.risk.risk_percent <= 100.0) {
        bail!("RISK_PERCENT must be in (0, 100], got {}", session.risk.risk_percent);
    }
    if !(session.risk.sl_multiplier > 0.0) || !(session.risk.tp_multiplier > 0.0) {
        bail!("SL_MULTIPLIER and TP_MULTIPLIER must be positive");
    }
    if !(session.threshold >= 0.0) {
        bail!("MOMENTUM_THRESHOLD must be non-negative, got {}", session.threshold);
    }
    if session.window_minutes == 0 {
        bail!("WINDOW_MINUTES must be at least 1");
    }
    if session.holding <= chrono::Duration::zero() {
        bail!("HOLDING_MINUTES must be at least 1");
    }
    if session.poll_interval.is_zero() {
        bail!("POLL_INTERVAL_MS must be at least 1");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let env: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_mock_defaults() {
        let config = load(&[("MT5_BASE_URL", "mock")]).unwrap();
        assert_eq!(config.gateway, GatewayTarget::Mock);

        let s = &config.session;
        assert_eq!(s.symbol, "US500");
        assert_eq!(s.risk, RiskParams::default());
        assert_eq!(s.threshold, 0.3);
        assert_eq!(s.holding, chrono::Duration::hours(1));
        assert_eq!(s.window_minutes, 5);
        assert_eq!(s.market_open, NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert_eq!(s.market_tz, chrono_tz::America::New_York);
        assert_eq!(s.poll_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_bridge_requires_credentials() {
        let err = load(&[]).unwrap_err();
        assert!(err.to_string().contains("MT5_LOGIN"));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("MT5_BASE_URL", "http://bridge:9000"),
            ("MT5_LOGIN", "5550001"),
            ("MT5_PASSWORD", "pw"),
            ("MT5_SERVER", "Broker-Live"),
            ("SYMBOL", "GER40"),
            ("MARKET_OPEN", "09:00"),
            ("MARKET_TZ", "Europe/Berlin"),
            ("RISK_PERCENT", "0.5"),
            ("HOLDING_MINUTES", "30"),
        ])
        .unwrap();

        assert_eq!(config.gateway, GatewayTarget::Bridge("http://bridge:9000".into()));
        assert_eq!(config.credentials.login, 5_550_001);
        assert_eq!(config.session.symbol, "GER40");
        assert_eq!(config.session.market_tz, chrono_tz::Europe::Berlin);
        assert_eq!(config.session.risk.risk_percent, 0.5);
        assert_eq!(config.session.holding, chrono::Duration::minutes(30));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(load(&[("MT5_BASE_URL", "mock"), ("RISK_PERCENT", "abc")]).is_err());
        assert!(load(&[("MT5_BASE_URL", "mock"), ("RISK_PERCENT", "0")]).is_err());
        assert!(load(&[("MT5_BASE_URL", "mock"), ("WINDOW_MINUTES", "0")]).is_err());
        assert!(load(&[("MT5_BASE_URL", "mock"), ("MARKET_OPEN", "9h30")]).is_err());
        assert!(load(&[("MT5_BASE_URL", "mock"), ("MARKET_TZ", "Nowhere/Atlantis")]).is_err());
    }
}
