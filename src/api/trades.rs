use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::domain::Decimal;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeDto {
    pub symbol: String,
    pub side: String,
    pub quantity: i64,
    pub price: Decimal,
    pub commission: Decimal,
    pub levy: Decimal,
    pub realized_pnl: Decimal,
    pub executed_at: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDto {
    pub prompt: String,
    pub response: String,
    pub recorded_at: String,
}

pub async fn get_trades(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<LimitQuery>,
) -> Result<Json<Vec<TradeDto>>, AppError> {
    ensure_model_exists(&state, id).await?;

    let limit = params.limit.unwrap_or(50).clamp(1, 1000);
    let trades = state.repo.list_trades(id, limit).await?;
    Ok(Json(
        trades
            .into_iter()
            .map(|t| TradeDto {
                symbol: t.symbol.as_str().to_string(),
                side: t.side.to_string(),
                quantity: t.quantity,
                price: t.price,
                commission: t.commission,
                levy: t.levy,
                realized_pnl: t.realized_pnl,
                executed_at: t.executed_at.to_rfc3339(),
            })
            .collect(),
    ))
}

pub async fn get_conversations(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<LimitQuery>,
) -> Result<Json<Vec<ConversationDto>>, AppError> {
    ensure_model_exists(&state, id).await?;

    let limit = params.limit.unwrap_or(20).clamp(1, 200);
    let conversations = state.repo.list_conversations(id, limit).await?;
    Ok(Json(
        conversations
            .into_iter()
            .map(|c| ConversationDto {
                prompt: c.prompt,
                response: c.response,
                recorded_at: c.recorded_at,
            })
            .collect(),
    ))
}

async fn ensure_model_exists(state: &AppState, id: i64) -> Result<(), AppError> {
    if state.repo.get_model(id).await?.is_none() {
        return Err(AppError::NotFound(format!("model {}", id)));
    }
    Ok(())
}
