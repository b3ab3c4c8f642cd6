//! Decision sources: implementations of the classify-all-symbols
//! capability, selected per model by configuration.
//!
//! The rule engine is the canonical implementation; the LLM source is a
//! swappable peer behind the same trait, never a fallback chain inside
//! the classifier.

use crate::domain::{Decimal, IndicatorSnapshot, Position, Symbol};
use crate::engine::PortfolioValuation;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub mod llm;
pub mod rules;

pub use llm::LlmDecisions;
pub use rules::RuleDecisions;

/// What a decision source sees for one cycle: market snapshots plus the
/// model's current book.
#[derive(Debug, Clone)]
pub struct DecisionContext {
    pub snapshots: Vec<IndicatorSnapshot>,
    pub positions: Vec<Position>,
    pub valuation: PortfolioValuation,
    pub starting_capital: Decimal,
}

impl DecisionContext {
    pub fn position_for(&self, symbol: &Symbol) -> Option<&Position> {
        self.positions.iter().find(|p| &p.symbol == symbol)
    }
}

/// Intended action for one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl Action {
    pub fn parse(s: &str) -> Option<Action> {
        match s.to_ascii_lowercase().as_str() {
            "buy" => Some(Action::Buy),
            "sell" => Some(Action::Sell),
            "hold" => Some(Action::Hold),
            _ => None,
        }
    }
}

/// One symbol's decision for this cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub symbol: Symbol,
    pub action: Action,
    /// Shares to trade; meaningful for Buy/Sell only.
    pub quantity: i64,
    pub take_profit: Option<Decimal>,
    pub stop_loss: Option<Decimal>,
    pub confidence: Option<Decimal>,
    pub rationale: String,
}

impl Decision {
    pub fn hold(symbol: Symbol, rationale: impl Into<String>) -> Self {
        Decision {
            symbol,
            action: Action::Hold,
            quantity: 0,
            take_profit: None,
            stop_loss: None,
            confidence: None,
            rationale: rationale.into(),
        }
    }
}

/// Prompt/response pair from an external decision provider, kept for the
/// audit log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub prompt: String,
    pub response: String,
}

/// The full output of one decide() call.
#[derive(Debug, Clone)]
pub struct DecisionSet {
    pub decisions: Vec<Decision>,
    pub transcript: Option<Transcript>,
}

impl DecisionSet {
    pub fn from_decisions(decisions: Vec<Decision>) -> Self {
        DecisionSet {
            decisions,
            transcript: None,
        }
    }
}

/// A strategy that maps one cycle's context to per-symbol decisions.
#[async_trait]
pub trait DecisionSource: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    /// Produce decisions for every symbol in the context. Unparseable
    /// provider output degrades to an empty set inside the source; only
    /// transport-level failures surface as errors.
    async fn decide(&self, ctx: &DecisionContext) -> Result<DecisionSet, DecisionError>;
}

#[derive(Debug, Error)]
pub enum DecisionError {
    #[error("decision provider error: {0}")]
    Provider(String),
}
