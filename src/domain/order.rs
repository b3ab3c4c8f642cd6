//! Order and trade-record value types.

use crate::domain::{Decimal, Side, Symbol};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An order the engine intends to execute this cycle.
///
/// Ephemeral: built, executed against the ledger, and dropped. Buy
/// quantities are positive lot multiples; sell quantities never exceed the
/// held quantity and may be a sub-lot remainder only on full liquidation.
/// `take_profit`/`stop_loss` are advisory targets attached for the record;
/// only the hard stop-loss sell rule is enforced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub symbol: Symbol,
    pub side: Side,
    pub quantity: i64,
    pub price: Decimal,
    pub take_profit: Option<Decimal>,
    pub stop_loss: Option<Decimal>,
}

/// A settled trade as appended to the ledger. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub model_id: i64,
    pub symbol: Symbol,
    pub side: Side,
    pub quantity: i64,
    pub price: Decimal,
    pub commission: Decimal,
    /// Transfer levy, charged on sells only.
    pub levy: Decimal,
    /// Net realized PnL after fees; zero for buys.
    pub realized_pnl: Decimal,
    pub executed_at: DateTime<Utc>,
}

impl TradeRecord {
    pub fn buy(
        model_id: i64,
        symbol: Symbol,
        quantity: i64,
        price: Decimal,
        commission: Decimal,
        executed_at: DateTime<Utc>,
    ) -> Self {
        TradeRecord {
            model_id,
            symbol,
            side: Side::Buy,
            quantity,
            price,
            commission,
            levy: Decimal::zero(),
            realized_pnl: Decimal::zero(),
            executed_at,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn sell(
        model_id: i64,
        symbol: Symbol,
        quantity: i64,
        price: Decimal,
        commission: Decimal,
        levy: Decimal,
        realized_pnl: Decimal,
        executed_at: DateTime<Utc>,
    ) -> Self {
        TradeRecord {
            model_id,
            symbol,
            side: Side::Sell,
            quantity,
            price,
            commission,
            levy,
            realized_pnl,
            executed_at,
        }
    }
}
