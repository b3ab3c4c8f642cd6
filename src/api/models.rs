use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::AppState;
use crate::domain::Decimal;
use crate::error::AppError;
use crate::orchestration::{CycleReport, TradingEngine};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDto {
    pub id: i64,
    pub name: String,
    pub decision_mode: String,
    pub provider_id: Option<i64>,
    pub model_name: Option<String>,
    pub initial_capital: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateModelRequest {
    pub name: String,
    #[serde(default = "default_decision_mode")]
    pub decision_mode: String,
    pub provider_id: Option<i64>,
    pub model_name: Option<String>,
    /// Defaults to 100000 when omitted.
    pub initial_capital: Option<Decimal>,
}

fn default_decision_mode() -> String {
    "rules".to_string()
}

pub async fn list_models(
    State(state): State<AppState>,
) -> Result<Json<Vec<ModelDto>>, AppError> {
    let models = state.repo.list_models().await?;
    Ok(Json(
        models
            .into_iter()
            .map(|m| ModelDto {
                id: m.id,
                name: m.name,
                decision_mode: m.decision_mode,
                provider_id: m.provider_id,
                model_name: m.model_name,
                initial_capital: m.initial_capital,
            })
            .collect(),
    ))
}

pub async fn create_model(
    State(state): State<AppState>,
    Json(request): Json<CreateModelRequest>,
) -> Result<Json<ModelDto>, AppError> {
    if request.name.trim().is_empty() {
        return Err(AppError::BadRequest("model name must not be empty".into()));
    }
    match request.decision_mode.as_str() {
        "rules" | "llm" => {}
        other => {
            return Err(AppError::BadRequest(format!(
                "decision mode must be rules or llm, got {}",
                other
            )))
        }
    }

    let provider = match request.provider_id {
        Some(provider_id) => {
            let provider = state.repo.get_provider(provider_id).await?;
            if provider.is_none() {
                return Err(AppError::NotFound(format!("provider {}", provider_id)));
            }
            provider
        }
        None => None,
    };
    if request.decision_mode == "llm" && provider.is_none() {
        return Err(AppError::BadRequest(
            "llm models require a providerId".into(),
        ));
    }

    let initial_capital = request
        .initial_capital
        .unwrap_or_else(|| Decimal::from_i64(100_000));
    if !initial_capital.is_positive() {
        return Err(AppError::BadRequest(
            "initial capital must be positive".into(),
        ));
    }

    let id = state
        .repo
        .add_model(
            &request.name,
            &request.decision_mode,
            request.provider_id,
            request.model_name.as_deref(),
            initial_capital,
        )
        .await?;

    let model = state
        .repo
        .get_model(id)
        .await?
        .ok_or_else(|| AppError::Internal("model vanished after insert".into()))?;

    let engine = TradingEngine::from_model(
        model.clone(),
        provider,
        state.repo.clone(),
        state.market.clone(),
        state.config.clone(),
    );
    state.registry.insert(Arc::new(engine)).await;
    tracing::info!(model_id = id, name = %model.name, "model registered");

    Ok(Json(ModelDto {
        id: model.id,
        name: model.name,
        decision_mode: model.decision_mode,
        provider_id: model.provider_id,
        model_name: model.model_name,
        initial_capital: model.initial_capital,
    }))
}

pub async fn delete_model(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    if state.repo.get_model(id).await?.is_none() {
        return Err(AppError::NotFound(format!("model {}", id)));
    }
    state.repo.delete_model(id).await?;
    state.registry.remove(id).await;
    tracing::info!(model_id = id, "model deleted");
    Ok(Json(serde_json::json!({"deleted": id})))
}

/// Run one trading cycle for a model right now.
pub async fn execute_model(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<CycleReport>, AppError> {
    let engine = match state.registry.get(id).await {
        Some(engine) => engine,
        None => {
            // Registry can lag the ledger after a restart; rebuild lazily.
            let model = state
                .repo
                .get_model(id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("model {}", id)))?;
            let provider = match model.provider_id {
                Some(provider_id) => state.repo.get_provider(provider_id).await?,
                None => None,
            };
            let engine = Arc::new(TradingEngine::from_model(
                model,
                provider,
                state.repo.clone(),
                state.market.clone(),
                state.config.clone(),
            ));
            state.registry.insert(engine.clone()).await;
            engine
        }
    };

    let report = engine.execute_cycle().await;
    Ok(Json(report))
}
