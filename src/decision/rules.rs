//! Canonical rule-based decision source: signal classifier + position
//! sizer applied to every symbol in the universe.

use super::{Action, Decision, DecisionContext, DecisionError, DecisionSet, DecisionSource};
use crate::domain::{Decimal, FeeSchedule, RiskParameters};
use crate::engine::{classify, size_buy, size_sell, SignalClass};
use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct RuleDecisions {
    params: RiskParameters,
    fees: FeeSchedule,
}

impl RuleDecisions {
    pub fn new(params: RiskParameters, fees: FeeSchedule) -> Self {
        Self { params, fees }
    }
}

fn rationale(class: SignalClass) -> &'static str {
    match class {
        SignalClass::BreakoutBuy => "trend breakout or oversold rebound",
        SignalClass::PullbackBuy => "pullback stabilized at ma10",
        SignalClass::ContinuationBuy => "failed pullback continuation",
        SignalClass::TrendBreakSell => "price lost ma20 with negative macd",
        SignalClass::OverheatSell => "rsi overheated below ma5",
        SignalClass::StopLossSell => "hard stop loss hit",
        SignalClass::Hold => "no signal",
    }
}

#[async_trait]
impl DecisionSource for RuleDecisions {
    fn name(&self) -> &'static str {
        "rules"
    }

    async fn decide(&self, ctx: &DecisionContext) -> Result<DecisionSet, DecisionError> {
        let mut decisions = Vec::with_capacity(ctx.snapshots.len());

        for snapshot in &ctx.snapshots {
            let position = ctx.position_for(&snapshot.symbol);
            let entry_price = position.map(|p| p.avg_cost);
            let class = classify(snapshot, entry_price, &self.params);

            let decision = match class {
                SignalClass::Hold => {
                    let reason = if snapshot.is_complete() {
                        rationale(class)
                    } else {
                        "indicators unavailable"
                    };
                    Decision::hold(snapshot.symbol.clone(), reason)
                }
                class if class.is_buy() => {
                    // classify() only signals on complete snapshots.
                    let price = snapshot.price.unwrap_or_else(Decimal::zero);
                    match size_buy(
                        price,
                        ctx.valuation.cash,
                        ctx.starting_capital,
                        self.params.position_limit_pct,
                        self.fees.lot_size,
                    ) {
                        Ok(0) => Decision::hold(
                            snapshot.symbol.clone(),
                            "insufficient capital for one lot",
                        ),
                        Ok(quantity) => Decision {
                            symbol: snapshot.symbol.clone(),
                            action: Action::Buy,
                            quantity,
                            take_profit: class
                                .take_profit_multiplier(&self.params)
                                .map(|m| price * m),
                            stop_loss: class
                                .advisory_stop_pct(&self.params)
                                .map(|s| price * (Decimal::one() - s)),
                            confidence: None,
                            rationale: rationale(class).to_string(),
                        },
                        Err(e) => Decision::hold(snapshot.symbol.clone(), e.to_string()),
                    }
                }
                class => {
                    let held = position.map(|p| p.quantity).unwrap_or(0);
                    match size_sell(held, held) {
                        Ok(quantity) => Decision {
                            symbol: snapshot.symbol.clone(),
                            action: Action::Sell,
                            quantity,
                            take_profit: None,
                            stop_loss: None,
                            confidence: None,
                            rationale: rationale(class).to_string(),
                        },
                        Err(e) => Decision::hold(snapshot.symbol.clone(), e.to_string()),
                    }
                }
            };
            decisions.push(decision);
        }

        Ok(DecisionSet::from_decisions(decisions))
    }
}
