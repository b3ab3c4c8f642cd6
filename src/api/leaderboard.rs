use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::collections::HashMap;

use super::AppState;
use crate::domain::{Decimal, Symbol};
use crate::engine::value_portfolio;
use crate::error::AppError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub model_id: i64,
    pub model_name: String,
    pub initial_capital: Decimal,
    pub total_value: Decimal,
    /// Total return as a percentage of initial capital.
    pub return_pct: Decimal,
}

pub async fn get_leaderboard(
    State(state): State<AppState>,
) -> Result<Json<Vec<LeaderboardEntry>>, AppError> {
    let models = state.repo.list_models().await?;

    let prices: HashMap<Symbol, Decimal> = match state.market.spots(&state.config.symbols).await {
        Ok(spots) => spots
            .into_iter()
            .filter_map(|(symbol, spot)| spot.price.map(|p| (symbol, p)))
            .collect(),
        Err(e) => {
            tracing::warn!(error = %e, "quotes unavailable for leaderboard");
            HashMap::new()
        }
    };

    let mut entries = Vec::with_capacity(models.len());
    for model in models {
        let positions = state.repo.get_positions(model.id).await?;
        let realized_pnl = state.repo.sum_realized_pnl(model.id).await?;
        let valuation = value_portfolio(model.initial_capital, realized_pnl, &positions, &prices);

        let return_pct = (valuation.total_value - model.initial_capital)
            / model.initial_capital
            * Decimal::hundred();
        entries.push(LeaderboardEntry {
            model_id: model.id,
            model_name: model.name,
            initial_capital: model.initial_capital,
            total_value: valuation.total_value,
            return_pct,
        });
    }

    entries.sort_by(|a, b| b.return_pct.cmp(&a.return_pct));
    Ok(Json(entries))
}
