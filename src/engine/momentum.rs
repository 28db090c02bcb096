//! # engine::momentum
//!
//! **Momentum Analyzer**: turns the opening window into a [`MomentumSignal`].
//!
//! ```text
//! open  = first bar open          high = max(high)      volume = Σ tick volume
//! close = last bar close          low  = min(low)
//!
//! range_size   = high − low
//! price_change = |close − open|
//! strength     = price_change / range_size      (0 when range_size = 0)
//! direction    = BUY if close > open, else SELL (a flat window is SELL)
//! ```

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::error::SessionError;
use crate::gateway::ExecutionGateway;
use crate::models::{Direction, MomentumSignal, PriceBar};

/// Bar size requested from the venue.
const WINDOW_TIMEFRAME_MINUTES: u32 = 1;

/// Fetch the opening window and derive its signal.
///
/// `DataUnavailable` when the venue returns no bars (holiday, pre-market
/// symbol, outage) or the request itself fails.
pub async fn analyze<G: ExecutionGateway>(
    gateway: &G,
    symbol: &str,
    window_start: DateTime<Utc>,
    window_minutes: u32,
) -> Result<MomentumSignal, SessionError> {
    let unavailable = || SessionError::DataUnavailable {
        symbol:       symbol.to_string(),
        window_start,
    };

    let bars = gateway
        .bars(symbol, WINDOW_TIMEFRAME_MINUTES, window_start, window_minutes)
        .await
        .map_err(|e| {
            warn!(error = %e, symbol, "Opening window request failed");
            unavailable()
        })?;

    if bars.len() < window_minutes as usize {
        debug!(symbol, expected = window_minutes, received = bars.len(), "Short opening window");
    }

    let signal = signal_from_bars(&bars, window_minutes).ok_or_else(unavailable)?;

    info!(
        symbol,
        direction    = %signal.direction,
        price_change = signal.price_change,
        range_size   = signal.range_size,
        strength     = signal.strength,
        avg_volume   = signal.avg_volume,
        "📈 Opening momentum computed"
    );
    Ok(signal)
}

/// Pure aggregation over a window; `None` for an empty slice.
pub fn signal_from_bars(bars: &[PriceBar], window_minutes: u32) -> Option<MomentumSignal> {
    let mut ordered = bars.to_vec();
    ordered.sort_by_key(|b| b.timestamp);

    let first = ordered.first()?;
    let last = ordered.last()?;

    let open = first.open;
    let close = last.close;
    let high = ordered.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    let low = ordered.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    let volume: f64 = ordered.iter().map(|b| b.volume).sum();

    let range_size = (high - low).max(0.0);
    let price_change = (close - open).abs();
    let strength = if range_size > 0.0 { price_change / range_size } else { 0.0 };

    let direction = if close > open { Direction::Buy } else { Direction::Sell };

    Some(MomentumSignal {
        direction,
        price_change,
        range_size,
        strength,
        avg_volume: volume / f64::from(window_minutes.max(1)),
    })
}

// ─── Tests ────────────────────────────────────────────────────────────────────
