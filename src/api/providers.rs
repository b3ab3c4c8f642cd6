use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::error::AppError;

/// Provider without its API key; credentials never leave the ledger.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderDto {
    pub id: i64,
    pub name: String,
    pub api_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProviderRequest {
    pub name: String,
    pub api_url: String,
    pub api_key: String,
}

pub async fn list_providers(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProviderDto>>, AppError> {
    let providers = state.repo.list_providers().await?;
    Ok(Json(
        providers
            .into_iter()
            .map(|p| ProviderDto {
                id: p.id,
                name: p.name,
                api_url: p.api_url,
            })
            .collect(),
    ))
}

pub async fn create_provider(
    State(state): State<AppState>,
    Json(request): Json<CreateProviderRequest>,
) -> Result<Json<ProviderDto>, AppError> {
    if request.name.trim().is_empty() || request.api_url.trim().is_empty() {
        return Err(AppError::BadRequest(
            "provider name and apiUrl must not be empty".into(),
        ));
    }

    let id = state
        .repo
        .add_provider(&request.name, &request.api_url, &request.api_key)
        .await?;
    Ok(Json(ProviderDto {
        id,
        name: request.name,
        api_url: request.api_url,
    }))
}

pub async fn delete_provider(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    if state.repo.get_provider(id).await?.is_none() {
        return Err(AppError::NotFound(format!("provider {}", id)));
    }
    state.repo.delete_provider(id).await?;
    Ok(Json(serde_json::json!({"deleted": id})))
}
