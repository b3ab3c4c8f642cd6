//! Pure decision-engine components: signal classification, position
//! sizing, fee/settlement math, and portfolio valuation.
//!
//! Everything in this module is a deterministic function of its inputs;
//! ledger and network effects live in `db` and `quotes`.

use crate::domain::Symbol;
use thiserror::Error;

pub mod classifier;
pub mod fees;
pub mod sizer;
pub mod valuation;

pub use classifier::{classify, SignalClass};
pub use fees::{buy_cost, check_price_limit, sell_proceeds, BuyCost, SellBreakdown};
pub use sizer::{size_buy, size_sell};
pub use valuation::{value_portfolio, PortfolioValuation, ValuedPosition};

/// Order-execution failures. Indeterminate snapshots are not errors: the
/// classifier holds instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TradeError {
    #[error("invalid price: {0}")]
    InvalidPrice(String),
    #[error("invalid quantity: {0}")]
    InvalidQuantity(i64),
    #[error("insufficient funds: need {needed}, available {available}")]
    InsufficientFunds { needed: String, available: String },
    #[error("no position held in {0}")]
    NoPosition(Symbol),
    #[error("settlement locked: {0} was bought this trading day")]
    SettlementLocked(Symbol),
    #[error("price limit reached for {0}, no fill assumed")]
    PriceLimitReached(Symbol),
}
