//! Per-model trading cycle: fetch snapshots, decide, execute against the
//! ledger, record a valuation snapshot.
//!
//! One cycle walks the whole symbol universe. Symbols fail independently
//! (an error becomes a Hold outcome with a reason); only ledger-level
//! faults fail the cycle itself. Cycles for the same model serialize on an
//! internal lock so cash can never be double-spent.

use crate::config::Config;
use crate::db::{ModelRow, ProviderRow, Repository};
use crate::decision::{
    Action, Decision, DecisionContext, DecisionSource, LlmDecisions, RuleDecisions,
};
use crate::domain::{Decimal, Order, Position, Side, Symbol, TradeRecord};
use crate::engine::{
    buy_cost, check_price_limit, sell_proceeds, size_sell, value_portfolio, PortfolioValuation,
    TradeError,
};
use crate::quotes::MarketData;
use chrono::{Local, NaiveDate, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

/// Steps of one cycle, in order. `Faulted` is reachable from any step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleState {
    Idle,
    FetchingSnapshots,
    Classifying,
    Sizing,
    Executing,
    Recording,
    Faulted,
}

/// What happened to one symbol this cycle.
#[derive(Debug, Clone, Serialize)]
pub struct SymbolOutcome {
    pub symbol: Symbol,
    /// The enforced action: a blocked sell reports as Hold.
    pub action: Action,
    pub quantity: i64,
    pub detail: String,
}

/// Result of one cycle for one model.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub model_id: i64,
    /// Final state: Idle after a completed cycle, Faulted otherwise.
    pub state: CycleState,
    /// True when no usable snapshot arrived: no orders, no valuation row.
    pub skipped: bool,
    pub outcomes: Vec<SymbolOutcome>,
    pub valuation: Option<PortfolioValuation>,
    pub error: Option<String>,
}

impl CycleReport {
    fn skipped(cycle_id: Uuid, model_id: i64, reason: String) -> Self {
        CycleReport {
            cycle_id,
            model_id,
            state: CycleState::Idle,
            skipped: true,
            outcomes: Vec::new(),
            valuation: None,
            error: Some(reason),
        }
    }

    fn faulted(cycle_id: Uuid, model_id: i64, reason: String) -> Self {
        CycleReport {
            cycle_id,
            model_id,
            state: CycleState::Faulted,
            skipped: false,
            outcomes: Vec::new(),
            valuation: None,
            error: Some(reason),
        }
    }
}

/// One model's trading engine.
pub struct TradingEngine {
    model: ModelRow,
    repo: Arc<Repository>,
    market: MarketData,
    decisions: Arc<dyn DecisionSource>,
    config: Config,
    cycle_lock: Mutex<()>,
}

impl TradingEngine {
    pub fn new(
        model: ModelRow,
        repo: Arc<Repository>,
        market: MarketData,
        decisions: Arc<dyn DecisionSource>,
        config: Config,
    ) -> Self {
        Self {
            model,
            repo,
            market,
            decisions,
            config,
            cycle_lock: Mutex::new(()),
        }
    }

    /// Build an engine for a model row, picking the decision source from
    /// its `decision_mode`. An llm model without usable provider
    /// credentials falls back to rules with a warning.
    pub fn from_model(
        model: ModelRow,
        provider: Option<ProviderRow>,
        repo: Arc<Repository>,
        market: MarketData,
        config: Config,
    ) -> Self {
        let decisions: Arc<dyn DecisionSource> = match (model.decision_mode.as_str(), provider) {
            ("llm", Some(provider)) => Arc::new(LlmDecisions::new(
                provider.api_url,
                provider.api_key,
                model.model_name.clone().unwrap_or_default(),
            )),
            ("llm", None) => {
                warn!(model_id = model.id, "llm model has no provider, using rules");
                Arc::new(RuleDecisions::new(config.risk.clone(), config.fees.clone()))
            }
            _ => Arc::new(RuleDecisions::new(config.risk.clone(), config.fees.clone())),
        };
        Self::new(model, repo, market, decisions, config)
    }

    pub fn model_id(&self) -> i64 {
        self.model.id
    }

    /// Run one cycle dated today (local trading date).
    pub async fn execute_cycle(&self) -> CycleReport {
        self.execute_cycle_on(Local::now().date_naive()).await
    }

    /// Run one cycle with an explicit trading date (test seam for the T+1
    /// boundary).
    pub async fn execute_cycle_on(&self, today: NaiveDate) -> CycleReport {
        let _serialize = self.cycle_lock.lock().await;
        let cycle_id = Uuid::new_v4();

        match self.run(cycle_id, today).await {
            Ok(report) => report,
            Err(e) => {
                warn!(model_id = self.model.id, %cycle_id, error = %e, "cycle faulted");
                CycleReport::faulted(cycle_id, self.model.id, e.to_string())
            }
        }
    }

    async fn run(&self, cycle_id: Uuid, today: NaiveDate) -> Result<CycleReport, sqlx::Error> {
        let mut state = CycleState::FetchingSnapshots;
        info!(model_id = self.model.id, %cycle_id, ?state, "cycle started");

        let snapshots = match self.market.snapshots(&self.config.symbols).await {
            Ok(snapshots) => snapshots,
            Err(e) => {
                info!(model_id = self.model.id, %cycle_id, error = %e, "no snapshots, cycle skipped");
                return Ok(CycleReport::skipped(cycle_id, self.model.id, e.to_string()));
            }
        };
        if snapshots.values().all(|s| s.price.is_none()) {
            return Ok(CycleReport::skipped(
                cycle_id,
                self.model.id,
                "no symbol returned a price".to_string(),
            ));
        }

        let prices: HashMap<Symbol, Decimal> = snapshots
            .iter()
            .filter_map(|(symbol, snap)| snap.price.map(|p| (symbol.clone(), p)))
            .collect();

        state = CycleState::Classifying;
        tracing::debug!(model_id = self.model.id, %cycle_id, ?state, "cycle step");
        let positions = self.repo.get_positions(self.model.id).await?;
        let realized_pnl = self.repo.sum_realized_pnl(self.model.id).await?;
        let valuation = value_portfolio(
            self.model.initial_capital,
            realized_pnl,
            &positions,
            &prices,
        );

        let ordered_snapshots: Vec<_> = self
            .config
            .symbols
            .iter()
            .filter_map(|s| snapshots.get(s).cloned())
            .collect();
        let ctx = DecisionContext {
            snapshots: ordered_snapshots,
            positions,
            valuation,
            starting_capital: self.model.initial_capital,
        };

        let decision_set = match self.decisions.decide(&ctx).await {
            Ok(set) => set,
            Err(e) => {
                warn!(model_id = self.model.id, %cycle_id, error = %e, "decision source failed");
                return Ok(CycleReport::faulted(cycle_id, self.model.id, e.to_string()));
            }
        };

        if let Some(transcript) = &decision_set.transcript {
            self.repo
                .insert_conversation(
                    self.model.id,
                    &transcript.prompt,
                    &transcript.response,
                    &Utc::now().to_rfc3339(),
                )
                .await?;
        }

        state = CycleState::Sizing;
        tracing::debug!(model_id = self.model.id, %cycle_id, ?state, "cycle step");
        let mut executor = CycleExecutor {
            engine: self,
            today,
            cash: ctx.valuation.cash,
            bought_this_cycle: HashSet::new(),
        };

        state = CycleState::Executing;
        tracing::debug!(model_id = self.model.id, %cycle_id, ?state, "cycle step");
        let mut outcomes = Vec::with_capacity(decision_set.decisions.len());
        for decision in &decision_set.decisions {
            if !self.config.symbols.contains(&decision.symbol) {
                continue;
            }
            let outcome = executor.apply(decision, &ctx).await?;
            if outcome.action != Action::Hold {
                info!(
                    model_id = self.model.id,
                    %cycle_id,
                    symbol = %outcome.symbol,
                    action = ?outcome.action,
                    quantity = outcome.quantity,
                    detail = %outcome.detail,
                    "order executed"
                );
            }
            outcomes.push(outcome);
        }

        state = CycleState::Recording;
        tracing::debug!(model_id = self.model.id, %cycle_id, ?state, "cycle step");
        let positions = self.repo.get_positions(self.model.id).await?;
        let realized_pnl = self.repo.sum_realized_pnl(self.model.id).await?;
        let valuation = value_portfolio(
            self.model.initial_capital,
            realized_pnl,
            &positions,
            &prices,
        );
        self.repo
            .record_account_value(
                self.model.id,
                valuation.total_value,
                valuation.cash,
                valuation.positions_value,
                &Utc::now().to_rfc3339(),
            )
            .await?;

        state = CycleState::Idle;
        info!(model_id = self.model.id, %cycle_id, ?state, "cycle completed");
        Ok(CycleReport {
            cycle_id,
            model_id: self.model.id,
            state,
            skipped: false,
            outcomes,
            valuation: Some(valuation),
            error: None,
        })
    }
}

impl std::fmt::Debug for TradingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradingEngine")
            .field("model_id", &self.model.id)
            .field("decisions", &self.decisions.name())
            .finish()
    }
}

/// Execution state threaded through one cycle: running cash and the
/// same-cycle buy set backing the T+1 lock.
struct CycleExecutor<'a> {
    engine: &'a TradingEngine,
    today: NaiveDate,
    cash: Decimal,
    bought_this_cycle: HashSet<Symbol>,
}

impl CycleExecutor<'_> {
    /// Apply one decision. Trade-rule violations map to Hold outcomes with
    /// the reason; only ledger errors propagate.
    async fn apply(
        &mut self,
        decision: &Decision,
        ctx: &DecisionContext,
    ) -> Result<SymbolOutcome, sqlx::Error> {
        match decision.action {
            Action::Hold => Ok(hold(decision.symbol.clone(), decision.rationale.clone())),
            Action::Buy => match self.execute_buy(decision, ctx).await? {
                Ok(outcome) => Ok(outcome),
                Err(e) => Ok(hold(decision.symbol.clone(), e.to_string())),
            },
            Action::Sell => match self.execute_sell(decision, ctx).await? {
                Ok(outcome) => Ok(outcome),
                Err(e) => Ok(hold(decision.symbol.clone(), e.to_string())),
            },
        }
    }

    async fn execute_buy(
        &mut self,
        decision: &Decision,
        ctx: &DecisionContext,
    ) -> Result<Result<SymbolOutcome, TradeError>, sqlx::Error> {
        let symbol = &decision.symbol;
        let snapshot = ctx.snapshots.iter().find(|s| &s.symbol == symbol);
        let price = match snapshot.and_then(|s| s.price) {
            Some(price) if price.is_positive() => price,
            _ => {
                return Ok(Err(TradeError::InvalidPrice(
                    "no quote for symbol".to_string(),
                )))
            }
        };

        let fees = &self.engine.config.fees;
        let prev_close = snapshot
            .and_then(|s| s.prev_close)
            .unwrap_or_else(Decimal::zero);
        if let Err(e) = check_price_limit(
            symbol,
            price,
            prev_close,
            self.engine.config.is_restricted(symbol),
            fees,
        ) {
            return Ok(Err(e));
        }

        // Lot alignment is a hard exchange rule; decision sources that
        // request odd quantities get floored, never rounded up.
        let quantity = (decision.quantity / fees.lot_size) * fees.lot_size;
        if quantity < fees.lot_size {
            return Ok(Err(TradeError::InvalidQuantity(decision.quantity)));
        }

        let order = Order {
            symbol: symbol.clone(),
            side: Side::Buy,
            quantity,
            price,
            take_profit: decision.take_profit,
            stop_loss: decision.stop_loss,
        };

        let cost = match buy_cost(order.quantity, order.price, self.cash, fees) {
            Ok(cost) => cost,
            Err(e) => return Ok(Err(e)),
        };

        let model_id = self.engine.model.id;
        let position = match self.engine.repo.get_position(model_id, symbol).await? {
            Some(held) => {
                let old_qty = Decimal::from_i64(held.quantity);
                let new_qty = Decimal::from_i64(held.quantity + order.quantity);
                let avg_cost =
                    (held.avg_cost * old_qty + cost.notional) / new_qty;
                Position {
                    symbol: symbol.clone(),
                    quantity: held.quantity + order.quantity,
                    avg_cost,
                    acquired_on: self.today,
                }
            }
            None => Position {
                symbol: symbol.clone(),
                quantity: order.quantity,
                avg_cost: order.price,
                acquired_on: self.today,
            },
        };
        self.engine.repo.upsert_position(model_id, &position).await?;

        let trade = TradeRecord::buy(
            model_id,
            symbol.clone(),
            order.quantity,
            order.price,
            cost.commission,
            Utc::now(),
        );
        self.engine.repo.insert_trade(&trade).await?;

        self.cash = self.cash - cost.notional;
        self.bought_this_cycle.insert(symbol.clone());

        Ok(Ok(SymbolOutcome {
            symbol: symbol.clone(),
            action: Action::Buy,
            quantity: order.quantity,
            detail: format!(
                "bought {} @ {} (commission {})",
                order.quantity, order.price, cost.commission
            ),
        }))
    }

    async fn execute_sell(
        &mut self,
        decision: &Decision,
        ctx: &DecisionContext,
    ) -> Result<Result<SymbolOutcome, TradeError>, sqlx::Error> {
        let symbol = &decision.symbol;
        let model_id = self.engine.model.id;

        let position = match self.engine.repo.get_position(model_id, symbol).await? {
            Some(position) => position,
            None => return Ok(Err(TradeError::NoPosition(symbol.clone()))),
        };

        // T+1: anything acquired today is locked until the next trading
        // day, regardless of what the decision source wants.
        if position.acquired_on >= self.today || self.bought_this_cycle.contains(symbol) {
            return Ok(Err(TradeError::SettlementLocked(symbol.clone())));
        }

        let snapshot = ctx.snapshots.iter().find(|s| &s.symbol == symbol);
        let price = match snapshot.and_then(|s| s.price) {
            Some(price) if price.is_positive() => price,
            _ => {
                return Ok(Err(TradeError::InvalidPrice(
                    "no quote for symbol".to_string(),
                )))
            }
        };

        let fees = &self.engine.config.fees;
        let prev_close = snapshot
            .and_then(|s| s.prev_close)
            .unwrap_or_else(Decimal::zero);
        if let Err(e) = check_price_limit(
            symbol,
            price,
            prev_close,
            self.engine.config.is_restricted(symbol),
            fees,
        ) {
            return Ok(Err(e));
        }

        // A sell request without a usable quantity liquidates everything.
        let requested = if decision.quantity > 0 {
            decision.quantity
        } else {
            position.quantity
        };
        let quantity = match size_sell(requested, position.quantity) {
            Ok(quantity) => quantity,
            Err(e) => return Ok(Err(e)),
        };
        let order = Order {
            symbol: symbol.clone(),
            side: Side::Sell,
            quantity,
            price,
            take_profit: None,
            stop_loss: None,
        };

        let breakdown = sell_proceeds(order.quantity, order.price, position.avg_cost, fees);

        if order.quantity >= position.quantity {
            self.engine.repo.close_position(model_id, symbol).await?;
        } else {
            let remaining = Position {
                symbol: symbol.clone(),
                quantity: position.quantity - order.quantity,
                avg_cost: position.avg_cost,
                acquired_on: position.acquired_on,
            };
            self.engine.repo.upsert_position(model_id, &remaining).await?;
        }

        let trade = TradeRecord::sell(
            model_id,
            symbol.clone(),
            order.quantity,
            order.price,
            breakdown.commission,
            breakdown.levy,
            breakdown.net_pnl,
            Utc::now(),
        );
        self.engine.repo.insert_trade(&trade).await?;

        // Freed cost basis plus netted PnL returns to cash.
        self.cash = self.cash
            + position.avg_cost * Decimal::from_i64(order.quantity)
            + breakdown.net_pnl;

        Ok(Ok(SymbolOutcome {
            symbol: symbol.clone(),
            action: Action::Sell,
            quantity: order.quantity,
            detail: format!(
                "sold {} @ {} (commission {}, levy {}, net pnl {})",
                order.quantity, order.price, breakdown.commission, breakdown.levy,
                breakdown.net_pnl
            ),
        }))
    }
}

fn hold(symbol: Symbol, detail: String) -> SymbolOutcome {
    SymbolOutcome {
        symbol,
        action: Action::Hold,
        quantity: 0,
        detail,
    }
}
