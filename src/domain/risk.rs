//! Risk parameters and the exchange fee schedule.

use crate::domain::Decimal;
use rust_decimal::Decimal as RustDecimal;
use serde::{Deserialize, Serialize};

/// Tunable thresholds for the signal classifier and position sizer.
///
/// Immutable for the duration of a cycle; built once from config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskParameters {
    /// Max relative distance from MA10 to count as a pullback touch.
    pub pullback_tolerance: Decimal,
    /// RSI at or below this is oversold (rebound buy condition).
    pub rsi_buy_low: Decimal,
    /// Lower bound of the neutral RSI band for continuation buys.
    pub rsi_neutral_low: Decimal,
    /// Upper bound of the neutral RSI band for continuation buys.
    pub rsi_neutral_high: Decimal,
    /// RSI above this is overheated (momentum-cooling sell condition).
    pub rsi_sell_high: Decimal,
    /// Per-symbol capital allocation cap as a fraction of starting capital.
    pub position_limit_pct: Decimal,
    /// Hard stop: sell when price drops this fraction below entry.
    pub stop_loss_pct: Decimal,
    /// Advisory take-profit multiplier for trend-breakout buys.
    pub take_profit_breakout: Decimal,
    /// Advisory take-profit multiplier for pullback-stabilization buys.
    pub take_profit_pullback: Decimal,
    /// Advisory take-profit multiplier for continuation buys.
    pub take_profit_continuation: Decimal,
}

impl Default for RiskParameters {
    fn default() -> Self {
        RiskParameters {
            pullback_tolerance: Decimal::new(RustDecimal::new(1, 2)),
            rsi_buy_low: Decimal::from_i64(30),
            rsi_neutral_low: Decimal::from_i64(45),
            rsi_neutral_high: Decimal::from_i64(60),
            rsi_sell_high: Decimal::from_i64(70),
            position_limit_pct: Decimal::new(RustDecimal::new(30, 2)),
            stop_loss_pct: Decimal::new(RustDecimal::new(5, 2)),
            take_profit_breakout: Decimal::new(RustDecimal::new(110, 2)),
            take_profit_pullback: Decimal::new(RustDecimal::new(108, 2)),
            take_profit_continuation: Decimal::new(RustDecimal::new(106, 2)),
        }
    }
}

/// A-share fee schedule and exchange trading limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    /// Broker commission rate, charged on both sides.
    pub commission_rate: Decimal,
    /// Minimum commission per trade in yuan.
    pub commission_floor: Decimal,
    /// Transfer levy rate, charged on sells only.
    pub levy_rate: Decimal,
    /// Minimum buy increment in shares (one board lot).
    pub lot_size: i64,
    /// Daily price limit for ordinary symbols.
    pub normal_limit_pct: Decimal,
    /// Daily price limit for restricted-tier (ST) symbols.
    pub restricted_limit_pct: Decimal,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        FeeSchedule {
            commission_rate: Decimal::new(RustDecimal::new(3, 4)),
            commission_floor: Decimal::from_i64(5),
            levy_rate: Decimal::new(RustDecimal::new(1, 3)),
            lot_size: 100,
            normal_limit_pct: Decimal::new(RustDecimal::new(10, 2)),
            restricted_limit_pct: Decimal::new(RustDecimal::new(5, 2)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_defaults() {
        let params = RiskParameters::default();
        assert_eq!(params.pullback_tolerance.to_canonical_string(), "0.01");
        assert_eq!(params.rsi_buy_low.to_canonical_string(), "30");
        assert_eq!(params.rsi_neutral_low.to_canonical_string(), "45");
        assert_eq!(params.rsi_neutral_high.to_canonical_string(), "60");
        assert_eq!(params.rsi_sell_high.to_canonical_string(), "70");
        assert_eq!(params.position_limit_pct.to_canonical_string(), "0.3");
        assert_eq!(params.stop_loss_pct.to_canonical_string(), "0.05");
        assert_eq!(params.take_profit_breakout.to_canonical_string(), "1.1");
        assert_eq!(params.take_profit_pullback.to_canonical_string(), "1.08");
        assert_eq!(params.take_profit_continuation.to_canonical_string(), "1.06");
    }

    #[test]
    fn test_fee_defaults() {
        let fees = FeeSchedule::default();
        assert_eq!(fees.commission_rate.to_canonical_string(), "0.0003");
        assert_eq!(fees.commission_floor.to_canonical_string(), "5");
        assert_eq!(fees.levy_rate.to_canonical_string(), "0.001");
        assert_eq!(fees.lot_size, 100);
        assert_eq!(fees.normal_limit_pct.to_canonical_string(), "0.1");
        assert_eq!(fees.restricted_limit_pct.to_canonical_string(), "0.05");
    }
}
