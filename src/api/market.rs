use axum::extract::State;
use axum::Json;
use serde::Serialize;

use super::AppState;
use crate::domain::Decimal;
use crate::error::AppError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotDto {
    pub symbol: String,
    pub name: String,
    pub price: Option<Decimal>,
    pub prev_close: Option<Decimal>,
    pub change_pct: Option<Decimal>,
}

pub async fn get_prices(
    State(state): State<AppState>,
) -> Result<Json<Vec<SpotDto>>, AppError> {
    let spots = state.market.spots(&state.config.symbols).await?;

    let mut dtos: Vec<SpotDto> = state
        .config
        .symbols
        .iter()
        .filter_map(|symbol| spots.get(symbol))
        .map(|spot| SpotDto {
            symbol: spot.symbol.as_str().to_string(),
            name: spot.name.clone(),
            price: spot.price,
            prev_close: spot.prev_close,
            change_pct: spot.change_pct,
        })
        .collect();
    dtos.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    Ok(Json(dtos))
}
