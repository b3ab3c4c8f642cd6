//! Fee and settlement math: commission with floor, sell-side transfer
//! levy, PnL netting, and the daily price-limit guard.

use super::TradeError;
use crate::domain::{Decimal, FeeSchedule, Symbol};

/// Cost of a buy at the given price/quantity: notional plus commission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuyCost {
    pub notional: Decimal,
    pub commission: Decimal,
    pub total: Decimal,
}

/// Proceeds breakdown of a sell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SellBreakdown {
    pub notional: Decimal,
    pub commission: Decimal,
    pub levy: Decimal,
    pub gross_pnl: Decimal,
    pub net_pnl: Decimal,
}

fn commission(notional: Decimal, fees: &FeeSchedule) -> Decimal {
    let raw = notional * fees.commission_rate;
    if raw < fees.commission_floor {
        fees.commission_floor
    } else {
        raw
    }
}

/// Compute the full cost of a buy and check it against available cash.
///
/// # Errors
/// `InsufficientFunds` when notional + commission exceeds `cash_available`.
pub fn buy_cost(
    quantity: i64,
    price: Decimal,
    cash_available: Decimal,
    fees: &FeeSchedule,
) -> Result<BuyCost, TradeError> {
    let notional = price * Decimal::from_i64(quantity);
    let commission = commission(notional, fees);
    let total = notional + commission;

    if total > cash_available {
        return Err(TradeError::InsufficientFunds {
            needed: total.to_canonical_string(),
            available: cash_available.to_canonical_string(),
        });
    }

    Ok(BuyCost {
        notional,
        commission,
        total,
    })
}

/// Compute sell proceeds: commission plus transfer levy, and gross/net PnL
/// against the position's average cost.
pub fn sell_proceeds(
    quantity: i64,
    price: Decimal,
    avg_cost: Decimal,
    fees: &FeeSchedule,
) -> SellBreakdown {
    let qty = Decimal::from_i64(quantity);
    let notional = price * qty;
    let commission = commission(notional, fees);
    let levy = notional * fees.levy_rate;
    let gross_pnl = (price - avg_cost) * qty;
    let net_pnl = gross_pnl - commission - levy;

    SellBreakdown {
        notional,
        commission,
        levy,
        gross_pnl,
        net_pnl,
    }
}

/// Reject orders in symbols that have already moved to their daily limit:
/// at the limit no fill is assumed possible. Never resizes, only rejects.
///
/// # Errors
/// `PriceLimitReached` when |price - prev_close| / prev_close >= the
/// applicable limit (restricted-tier symbols use the tighter limit).
pub fn check_price_limit(
    symbol: &Symbol,
    price: Decimal,
    prev_close: Decimal,
    restricted: bool,
    fees: &FeeSchedule,
) -> Result<(), TradeError> {
    if !prev_close.is_positive() {
        // No reference close, nothing to measure against.
        return Ok(());
    }

    let move_pct = ((price - prev_close).abs()) / prev_close;
    let limit = if restricted {
        fees.restricted_limit_pct
    } else {
        fees.normal_limit_pct
    };

    if move_pct >= limit {
        return Err(TradeError::PriceLimitReached(symbol.clone()));
    }
    Ok(())
}
