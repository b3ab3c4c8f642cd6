//! Held position state, owned by the ledger.

use crate::domain::{Decimal, Symbol};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A held long position. A position with zero quantity is never stored;
/// the ledger deletes the row instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: Symbol,
    pub quantity: i64,
    pub avg_cost: Decimal,
    /// Trading date of the most recent buy; drives the T+1 sell lock.
    pub acquired_on: NaiveDate,
}

impl Position {
    /// Capital committed to this position at entry cost.
    pub fn cost_basis(&self) -> Decimal {
        self.avg_cost * Decimal::from_i64(self.quantity)
    }
}
