//! # engine::planner
//!
//! **Risk-Sized Order Planner**: signal + account + symbol → [`TradePlan`].
//!
//! ```text
//! entry        = ask (BUY) | bid (SELL)            market order, crosses the spread
//! stop_loss    = entry ∓ sl_multiplier × range     (ATR-style dynamic stop)
//! take_profit  = entry ± tp_multiplier × range
//!
//! risk_amount  = equity × risk_percent / 100
//! sl_points    = |entry − stop_loss| / point
//! size         = round(risk_amount / sl_points / lot_step) × lot_step
//! ```

use tracing::{info, warn};

use crate::error::SessionError;
use crate::gateway::ExecutionGateway;
use crate::models::{Direction, MomentumSignal, Quote, SymbolMeta, TradePlan};

// ─── Config ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskParams {
    /// Percent of equity lost if the stop is hit.
    pub risk_percent:  f64,
    pub sl_multiplier: f64,
    pub tp_multiplier: f64,
}

impl Default for RiskParams {
    fn default() -> Self {
        Self { risk_percent: 1.0, sl_multiplier: 1.5, tp_multiplier: 2.0 }
    }
}

// ─── Plan ─────────────────────────────────────────────────────────────────────

/// Read quote, symbol constraints and equity from the venue, then size the trade.
pub async fn plan<G: ExecutionGateway>(
    gateway: &G,
    symbol: &str,
    signal: &MomentumSignal,
    params: &RiskParams,
) -> Result<TradePlan, SessionError> {
    let insufficient = |what: &str, e: crate::error::GatewayError| {
        warn!(error = %e, symbol, "{what} unavailable");
        SessionError::InsufficientData(format!("{what} unavailable: {e}"))
    };

    let quote = gateway.quote(symbol).await.map_err(|e| insufficient("quote", e))?;
    let meta = gateway
        .symbol_meta(symbol)
        .await
        .map_err(|e| insufficient("symbol info", e))?
        .ok_or_else(|| SessionError::InsufficientData(format!("no symbol info for {symbol}")))?;
    let equity = gateway
        .account_equity()
        .await
        .map_err(|e| insufficient("account equity", e))?;

    let plan = build_plan(symbol, signal, quote, meta, equity, params)?;

    info!(
        symbol,
        direction = %plan.direction,
        entry     = plan.entry_price,
        sl        = plan.stop_loss,
        tp        = plan.take_profit,
        volume    = plan.position_size,
        equity,
        spread    = quote.spread(),
        "📐 Trade plan built"
    );
    Ok(plan)
}

/// Deterministic part of [`plan`]: no I/O, no state.
pub fn build_plan(
    symbol: &str,
    signal: &MomentumSignal,
    quote: Quote,
    meta: SymbolMeta,
    equity: f64,
    params: &RiskParams,
) -> Result<TradePlan, SessionError> {
    if !(meta.point_size > 0.0) || !(meta.lot_step > 0.0) {
        return Err(SessionError::InsufficientData(format!(
            "invalid symbol constraints: point={} lot_step={}",
            meta.point_size, meta.lot_step
        )));
    }
    if !equity.is_finite() || equity <= 0.0 {
        return Err(SessionError::InsufficientData(format!("non-positive equity {equity}")));
    }

    // ── 1. Entry / exits ──────────────────────────────────────────────────────
    let sl_offset = params.sl_multiplier * signal.range_size;
    let tp_offset = params.tp_multiplier * signal.range_size;

    let (entry, sl, tp) = match signal.direction {
        Direction::Buy  => (quote.ask, quote.ask - sl_offset, quote.ask + tp_offset),
        Direction::Sell => (quote.bid, quote.bid + sl_offset, quote.bid - tp_offset),
    };

    let mut plan = TradePlan {
        symbol:        symbol.to_string(),
        direction:     signal.direction,
        entry_price:   normalize(entry, meta.point_size),
        stop_loss:     normalize(sl, meta.point_size),
        take_profit:   normalize(tp, meta.point_size),
        position_size: 0.0,
    };

    // Sub-point ranges collapse onto the entry once normalised
    if !plan.levels_are_ordered() {
        return Err(SessionError::InsufficientData(format!(
            "stop/target collapse onto entry: sl={} entry={} tp={}",
            plan.stop_loss, plan.entry_price, plan.take_profit
        )));
    }

    // ── 2. Size ───────────────────────────────────────────────────────────────
    let mut size = position_size(
        equity,
        params.risk_percent,
        plan.stop_distance(),
        meta.point_size,
        meta.lot_step,
    );

    if let Some(max) = meta.volume_max.filter(|m| *m > 0.0) {
        if size > max {
            let capped = normalize((max / meta.lot_step).floor() * meta.lot_step, meta.lot_step);
            warn!(size, max, capped, "Position size capped at symbol maximum");
            size = capped;
        }
    }

    if size <= 0.0 {
        return Err(SessionError::InsufficientData(format!(
            "risk budget too small for stop distance {} at lot step {}",
            plan.stop_distance(),
            meta.lot_step
        )));
    }
    if let Some(min) = meta.volume_min {
        if size < min {
            return Err(SessionError::InsufficientData(format!(
                "position size {size} below symbol minimum {min}"
            )));
        }
    }

    plan.position_size = size;
    Ok(plan)
}

/// Risk-based lot size rounded to the nearest `lot_step`; never negative.
pub fn position_size(
    equity: f64,
    risk_percent: f64,
    stop_distance: f64,
    point_size: f64,
    lot_step: f64,
) -> f64 {
    let risk_amount = equity * risk_percent / 100.0;
    let sl_points = stop_distance / point_size;
    if !(sl_points > 0.0) || !(lot_step > 0.0) {
        return 0.0;
    }

    let raw = risk_amount / sl_points;
    let steps = (raw / lot_step).round().max(0.0);
    normalize(steps * lot_step, lot_step)
}

/// Snap `value` to a multiple of `step`, trimming float noise at the step's
/// decimal precision.
fn normalize(value: f64, step: f64) -> f64 {
    let steps = (value / step).round();
    let scale = 10f64.powi(step_decimals(step));
    (steps * step * scale).round() / scale
}

/// Fractional digits in the shortest decimal form of `step` (0.25 → 2,
/// 0.125 → 3), capped at 12.
fn step_decimals(step: f64) -> i32 {
    let repr = step.to_string();
    let digits = repr.split_once('.').map_or(0, |(_, frac)| frac.len());
    digits.min(12) as i32
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::paper::PaperGateway;
    use crate::gateway::Credentials;

    fn meta() -> SymbolMeta {
        SymbolMeta { point_size: 0.01, lot_step: 0.01, volume_min: None, volume_max: None }
    }

    fn signal(direction: Direction, range_size: f64) -> MomentumSignal {
        MomentumSignal {
            direction,
            price_change: range_size * 0.6,
            range_size,
            strength: 0.6,
            avg_volume: 100.0,
        }
    }

    fn is_lot_multiple(size: f64, step: f64) -> bool {
        let steps = size / step;
        (steps - steps.round()).abs() < 1e-6
    }

    #[test]
    fn test_reference_sizing() {
        // equity 10000, 1 %, entry 100, SL 92.5 → 100 / 750 points = 0.1333 → 0.13
        let size = position_size(10_000.0, 1.0, 7.5, 0.01, 0.01);
        assert!((size - 0.13).abs() < 1e-9);
    }

    #[test]
    fn test_buy_plan_levels() {
        let quote = Quote { bid: 99.98, ask: 100.0 };
        let plan = build_plan("US500", &signal(Direction::Buy, 5.0), quote, meta(), 10_000.0, &RiskParams::default())
            .unwrap();

        assert_eq!(plan.entry_price, 100.0);
        assert!((plan.stop_loss - 92.5).abs() < 1e-9);
        assert!((plan.take_profit - 110.0).abs() < 1e-9);
        assert!(plan.stop_loss < plan.entry_price && plan.entry_price < plan.take_profit);
        assert!((plan.position_size - 0.13).abs() < 1e-9);
    }

    #[test]
    fn test_sell_plan_uses_bid_and_inverts_levels() {
        let quote = Quote { bid: 99.98, ask: 100.0 };
        let plan = build_plan("US500", &signal(Direction::Sell, 5.0), quote, meta(), 10_000.0, &RiskParams::default())
            .unwrap();

        assert_eq!(plan.entry_price, 99.98);
        assert!(plan.take_profit < plan.entry_price && plan.entry_price < plan.stop_loss);
        assert!((plan.stop_loss - 107.48).abs() < 1e-9);
        assert!((plan.take_profit - 89.98).abs() < 1e-9);
    }

    #[test]
    fn test_sizes_are_lot_multiples() {
        for (equity, risk, range, step) in [
            (10_000.0, 1.0, 5.0, 0.01),
            (25_000.0, 0.5, 3.3, 0.1),
            (7_777.0, 2.0, 12.4, 0.01),
            (1_000_000.0, 1.0, 0.9, 1.0),
            (100_000.0, 1.0, 5.0, 0.25),
            (40_000.0, 1.5, 7.3, 0.05),
            (2_000_000.0, 0.8, 2.2, 0.5),
            (60_000.0, 1.0, 4.1, 0.125),
        ] {
            let m = SymbolMeta { lot_step: step, ..meta() };
            let plan = build_plan(
                "US500",
                &signal(Direction::Buy, range),
                Quote { bid: 4999.5, ask: 5000.0 },
                m,
                equity,
                &RiskParams { risk_percent: risk, ..RiskParams::default() },
            )
            .unwrap();
            assert!(plan.position_size > 0.0);
            assert!(is_lot_multiple(plan.position_size, step), "{} not a multiple of {step}", plan.position_size);
        }
    }

    #[test]
    fn test_prices_stay_on_point_grid() {
        for (point, bid, ask, range) in [
            (0.01, 4999.98, 5000.0, 5.0),
            (0.25, 5000.0, 5000.25, 5.0),
            (0.25, 4999.75, 5000.0, 3.3),
            (0.05, 101.35, 101.4, 0.87),
            (0.5, 18_250.0, 18_250.5, 41.3),
        ] {
            let m = SymbolMeta { point_size: point, ..meta() };
            for direction in [Direction::Buy, Direction::Sell] {
                let plan = build_plan(
                    "US500",
                    &signal(direction, range),
                    Quote { bid, ask },
                    m,
                    1_000_000.0,
                    &RiskParams::default(),
                )
                .unwrap();
                for price in [plan.entry_price, plan.stop_loss, plan.take_profit] {
                    assert!(is_lot_multiple(price, point), "{price} off the {point} grid");
                }
            }
        }
    }

    #[test]
    fn test_quarter_point_instrument() {
        let m = SymbolMeta { point_size: 0.25, lot_step: 0.25, volume_min: None, volume_max: None };
        let quote = Quote { bid: 5000.0, ask: 5000.25 };
        let plan = build_plan("ES", &signal(Direction::Buy, 5.0), quote, m, 100_000.0, &RiskParams::default())
            .unwrap();

        assert_eq!(plan.entry_price, 5000.25);
        assert_eq!(plan.stop_loss, 4992.75);
        assert_eq!(plan.take_profit, 5010.25);
        // 1000 / 30 points = 33.3 → 33.25
        assert_eq!(plan.position_size, 33.25);

        // 1000 / 750 points = 1.33 → 1.25
        assert_eq!(position_size(100_000.0, 1.0, 7.5, 0.01, 0.25), 1.25);
    }

    #[test]
    fn test_step_decimals() {
        assert_eq!(step_decimals(1.0), 0);
        assert_eq!(step_decimals(0.01), 2);
        assert_eq!(step_decimals(0.25), 2);
        assert_eq!(step_decimals(0.125), 3);
        assert_eq!(step_decimals(0.00001), 5);
    }

    #[test]
    fn test_tiny_budget_is_insufficient() {
        let err = build_plan(
            "US500",
            &signal(Direction::Buy, 5.0),
            Quote { bid: 99.98, ask: 100.0 },
            SymbolMeta { lot_step: 1.0, ..meta() },
            100.0,
            &RiskParams::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SessionError::InsufficientData(_)));
    }

    #[test]
    fn test_missing_constraints_are_insufficient() {
        let err = build_plan(
            "US500",
            &signal(Direction::Buy, 5.0),
            Quote { bid: 99.98, ask: 100.0 },
            SymbolMeta { point_size: 0.0, ..meta() },
            10_000.0,
            &RiskParams::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SessionError::InsufficientData(_)));
    }

    #[test]
    fn test_sub_point_range_collapses() {
        let err = build_plan(
            "US500",
            &signal(Direction::Buy, 0.001),
            Quote { bid: 99.98, ask: 100.0 },
            meta(),
            10_000.0,
            &RiskParams::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SessionError::InsufficientData(_)));
    }

    #[test]
    fn test_volume_bounds() {
        let capped = build_plan(
            "US500",
            &signal(Direction::Buy, 5.0),
            Quote { bid: 99.98, ask: 100.0 },
            SymbolMeta { volume_max: Some(0.05), ..meta() },
            10_000.0,
            &RiskParams::default(),
        )
        .unwrap();
        assert!((capped.position_size - 0.05).abs() < 1e-9);

        let below_min = build_plan(
            "US500",
            &signal(Direction::Buy, 5.0),
            Quote { bid: 99.98, ask: 100.0 },
            SymbolMeta { volume_min: Some(0.5), ..meta() },
            10_000.0,
            &RiskParams::default(),
        );
        assert!(below_min.is_err());
    }

    #[tokio::test]
    async fn test_plan_without_symbol_info() {
        let mut gateway = PaperGateway::new().with_symbol_meta(None);
        gateway
            .connect(&Credentials { login: 1, password: String::new(), server: "paper".into() })
            .await
            .unwrap();

        let err = plan(&gateway, "US500", &signal(Direction::Buy, 5.0), &RiskParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::InsufficientData(_)));
    }

    #[tokio::test]
    async fn test_plan_reads_venue() {
        let mut gateway = PaperGateway::new().with_quote(99.98, 100.0).with_equity(10_000.0);
        gateway
            .connect(&Credentials { login: 1, password: String::new(), server: "paper".into() })
            .await
            .unwrap();

        let plan = plan(&gateway, "US500", &signal(Direction::Buy, 5.0), &RiskParams::default())
            .await
            .unwrap();
        assert!((plan.position_size - 0.13).abs() < 1e-9);
    }
}
