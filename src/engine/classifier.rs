//! Signal classification: maps one symbol's indicator snapshot and holding
//! state into a single discrete signal.
//!
//! Three buy tiers when flat, three sell tiers when holding, strict
//! priority within each branch, first match wins. A snapshot missing any
//! indicator is indeterminate and always classifies as Hold.

use crate::domain::{Decimal, IndicatorSnapshot, RiskParameters};
use rust_decimal::Decimal as RustDecimal;
use serde::{Deserialize, Serialize};

/// The mutually exclusive signal taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalClass {
    /// Aligned rising MAs with price above MA5 and positive MACD, or an
    /// oversold RSI rebound. The strongest buy tier.
    BreakoutBuy,
    /// Price stabilizing at MA10 within an intact MA stack.
    PullbackBuy,
    /// Price near MA10 with neutral RSI and MA5 holding above MA10.
    ContinuationBuy,
    /// Price lost MA20 with negative MACD.
    TrendBreakSell,
    /// Overheated RSI with price already below MA5.
    OverheatSell,
    /// Price at or below the hard stop from entry.
    StopLossSell,
    Hold,
}

impl SignalClass {
    pub fn is_buy(&self) -> bool {
        matches!(
            self,
            SignalClass::BreakoutBuy | SignalClass::PullbackBuy | SignalClass::ContinuationBuy
        )
    }

    pub fn is_sell(&self) -> bool {
        matches!(
            self,
            SignalClass::TrendBreakSell | SignalClass::OverheatSell | SignalClass::StopLossSell
        )
    }

    /// Advisory take-profit multiplier for buy classes: highest for
    /// breakouts, lowest for continuations.
    pub fn take_profit_multiplier(&self, params: &RiskParameters) -> Option<Decimal> {
        match self {
            SignalClass::BreakoutBuy => Some(params.take_profit_breakout),
            SignalClass::PullbackBuy => Some(params.take_profit_pullback),
            SignalClass::ContinuationBuy => Some(params.take_profit_continuation),
            _ => None,
        }
    }

    /// Advisory stop fraction for buy classes. Weaker setups get tighter
    /// stops: 1.0x / 0.8x / 0.6x of the hard stop-loss fraction.
    pub fn advisory_stop_pct(&self, params: &RiskParameters) -> Option<Decimal> {
        let factor = match self {
            SignalClass::BreakoutBuy => Decimal::one(),
            SignalClass::PullbackBuy => Decimal::new(RustDecimal::new(8, 1)),
            SignalClass::ContinuationBuy => Decimal::new(RustDecimal::new(6, 1)),
            _ => return None,
        };
        Some(params.stop_loss_pct * factor)
    }
}

/// Classify one symbol's market state.
///
/// `entry_price` is the average cost of the currently held position, or
/// None when flat. Pure function of its arguments.
pub fn classify(
    snapshot: &IndicatorSnapshot,
    entry_price: Option<Decimal>,
    params: &RiskParameters,
) -> SignalClass {
    // Indeterminate policy: never guess on partial data.
    let (price, ma5, ma10, ma20, rsi, macd) = match (
        snapshot.price,
        snapshot.ma5,
        snapshot.ma10,
        snapshot.ma20,
        snapshot.rsi14,
        snapshot.macd,
    ) {
        (Some(p), Some(a), Some(b), Some(c), Some(r), Some(m)) => (p, a, b, c, r, m),
        _ => return SignalClass::Hold,
    };

    match entry_price {
        None => classify_flat(price, ma5, ma10, ma20, rsi, macd, params),
        Some(entry) => classify_holding(price, ma5, ma10, ma20, rsi, macd, entry, params),
    }
}

#[allow(clippy::too_many_arguments)]
fn classify_flat(
    price: Decimal,
    ma5: Decimal,
    ma10: Decimal,
    ma20: Decimal,
    rsi: Decimal,
    macd: Decimal,
    params: &RiskParameters,
) -> SignalClass {
    let trend_breakout = ma5 > ma10 && ma10 > ma20 && price > ma5 && macd.is_positive();
    let oversold_rebound = rsi <= params.rsi_buy_low && !macd.is_negative();
    if trend_breakout || oversold_rebound {
        return SignalClass::BreakoutBuy;
    }

    let near_ma10 = ma10.is_positive() && ((price - ma10).abs() / ma10) < params.pullback_tolerance;

    if ma5 >= ma10 && ma10 >= ma20 && near_ma10 {
        return SignalClass::PullbackBuy;
    }

    if near_ma10 && rsi >= params.rsi_neutral_low && rsi <= params.rsi_neutral_high && ma5 >= ma10 {
        return SignalClass::ContinuationBuy;
    }

    SignalClass::Hold
}

#[allow(clippy::too_many_arguments)]
fn classify_holding(
    price: Decimal,
    ma5: Decimal,
    _ma10: Decimal,
    ma20: Decimal,
    rsi: Decimal,
    macd: Decimal,
    entry: Decimal,
    params: &RiskParameters,
) -> SignalClass {
    if price < ma20 && macd.is_negative() {
        return SignalClass::TrendBreakSell;
    }

    if rsi > params.rsi_sell_high && price < ma5 {
        return SignalClass::OverheatSell;
    }

    if price <= entry * (Decimal::one() - params.stop_loss_pct) {
        return SignalClass::StopLossSell;
    }

    SignalClass::Hold
}
