use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::AppState;
use crate::domain::{Decimal, Symbol};
use crate::engine::{value_portfolio, PortfolioValuation};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioQuery {
    pub history_limit: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioResponse {
    pub model_id: i64,
    pub initial_capital: Decimal,
    pub portfolio: PortfolioValuation,
    pub history: Vec<AccountValueDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountValueDto {
    pub total_value: Decimal,
    pub cash: Decimal,
    pub positions_value: Decimal,
    pub recorded_at: String,
}

pub async fn get_portfolio(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<PortfolioQuery>,
) -> Result<Json<PortfolioResponse>, AppError> {
    let model = state
        .repo
        .get_model(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("model {}", id)))?;

    let positions = state.repo.get_positions(id).await?;
    let realized_pnl = state.repo.sum_realized_pnl(id).await?;

    // Valuation degrades gracefully when quotes are unavailable: open PnL
    // is simply zero for unquoted symbols.
    let prices: HashMap<Symbol, Decimal> = match state.market.spots(&state.config.symbols).await {
        Ok(spots) => spots
            .into_iter()
            .filter_map(|(symbol, spot)| spot.price.map(|p| (symbol, p)))
            .collect(),
        Err(e) => {
            tracing::warn!(error = %e, "quotes unavailable for portfolio valuation");
            HashMap::new()
        }
    };

    let portfolio = value_portfolio(model.initial_capital, realized_pnl, &positions, &prices);
    let limit = params.history_limit.unwrap_or(100).clamp(1, 1000);
    let history = state
        .repo
        .account_value_history(id, limit)
        .await?
        .into_iter()
        .map(|row| AccountValueDto {
            total_value: row.total_value,
            cash: row.cash,
            positions_value: row.positions_value,
            recorded_at: row.recorded_at,
        })
        .collect();

    Ok(Json(PortfolioResponse {
        model_id: id,
        initial_capital: model.initial_capital,
        portfolio,
        history,
    }))
}
