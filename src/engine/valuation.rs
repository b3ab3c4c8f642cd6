//! Portfolio valuation: derived every cycle from ledger state and current
//! prices, never stored except as a time-series snapshot.
//!
//! Reconciliation identity: cash = starting_capital + realized_pnl -
//! capital_committed; total = starting_capital + realized_pnl +
//! unrealized_pnl.

use crate::domain::{Decimal, Position, Symbol};
use serde::Serialize;
use std::collections::HashMap;

/// A position annotated with its current market price and open PnL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValuedPosition {
    pub symbol: Symbol,
    pub quantity: i64,
    pub avg_cost: Decimal,
    pub current_price: Option<Decimal>,
    pub unrealized_pnl: Decimal,
}

/// Full account valuation for one model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortfolioValuation {
    pub cash: Decimal,
    /// Committed capital at entry cost, not market value.
    pub positions_value: Decimal,
    pub total_value: Decimal,
    pub realized_pnl: Decimal,
    pub unrealized_pnl: Decimal,
    pub positions: Vec<ValuedPosition>,
}

/// Value a portfolio against current prices. Positions without a price
/// carry zero unrealized PnL rather than blocking the valuation.
pub fn value_portfolio(
    starting_capital: Decimal,
    realized_pnl: Decimal,
    positions: &[Position],
    prices: &HashMap<Symbol, Decimal>,
) -> PortfolioValuation {
    let mut valued = Vec::with_capacity(positions.len());
    let mut unrealized_pnl = Decimal::zero();
    let mut committed = Decimal::zero();

    for pos in positions {
        committed = committed + pos.cost_basis();
        let current_price = prices.get(&pos.symbol).copied();
        let open_pnl = match current_price {
            Some(px) => (px - pos.avg_cost) * Decimal::from_i64(pos.quantity),
            None => Decimal::zero(),
        };
        unrealized_pnl = unrealized_pnl + open_pnl;
        valued.push(ValuedPosition {
            symbol: pos.symbol.clone(),
            quantity: pos.quantity,
            avg_cost: pos.avg_cost,
            current_price,
            unrealized_pnl: open_pnl,
        });
    }

    PortfolioValuation {
        cash: starting_capital + realized_pnl - committed,
        positions_value: committed,
        total_value: starting_capital + realized_pnl + unrealized_pnl,
        realized_pnl,
        unrealized_pnl,
        positions: valued,
    }
}
