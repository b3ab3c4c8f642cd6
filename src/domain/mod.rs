//! Domain types for the A-share paper-trading engine.
//!
//! This module provides:
//! - Lossless numeric handling via the Decimal wrapper
//! - Domain primitives: Symbol, Side
//! - Market observations: Spot, IndicatorSnapshot
//! - Order/TradeRecord value types and risk/fee configuration

pub mod decimal;
pub mod order;
pub mod position;
pub mod primitives;
pub mod risk;
pub mod snapshot;

pub use decimal::Decimal;
pub use order::{Order, TradeRecord};
pub use position::Position;
pub use primitives::{Side, Symbol};
pub use risk::{FeeSchedule, RiskParameters};
pub use snapshot::{IndicatorSnapshot, Spot};
