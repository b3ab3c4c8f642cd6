pub mod api;
pub mod config;
pub mod db;
pub mod decision;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestration;
pub mod quotes;

pub use config::Config;
pub use db::{init_db, ModelRow, ProviderRow, Repository};
pub use decision::{DecisionSource, LlmDecisions, RuleDecisions};
pub use domain::{
    Decimal, FeeSchedule, IndicatorSnapshot, Order, Position, RiskParameters, Side, Spot, Symbol,
    TradeRecord,
};
pub use error::AppError;
pub use orchestration::{EngineRegistry, TradingEngine};
pub use quotes::{FailoverQuotes, MarketData, MockQuoteSource, QuoteCache, QuoteSource};
