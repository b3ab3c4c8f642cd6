pub mod health;
pub mod leaderboard;
pub mod market;
pub mod models;
pub mod portfolio;
pub mod providers;
pub mod trades;

use crate::config::Config;
use crate::db::Repository;
use crate::orchestration::EngineRegistry;
use crate::quotes::MarketData;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub registry: Arc<EngineRegistry>,
    pub market: MarketData,
    pub config: Config,
}

impl AppState {
    pub fn new(
        repo: Arc<Repository>,
        registry: Arc<EngineRegistry>,
        market: MarketData,
        config: Config,
    ) -> Self {
        Self {
            repo,
            registry,
            market,
            config,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/models", get(models::list_models).post(models::create_model))
        .route("/v1/models/:id", axum::routing::delete(models::delete_model))
        .route("/v1/models/:id/execute", post(models::execute_model))
        .route("/v1/models/:id/portfolio", get(portfolio::get_portfolio))
        .route("/v1/models/:id/trades", get(trades::get_trades))
        .route(
            "/v1/models/:id/conversations",
            get(trades::get_conversations),
        )
        .route(
            "/v1/providers",
            get(providers::list_providers).post(providers::create_provider),
        )
        .route(
            "/v1/providers/:id",
            axum::routing::delete(providers::delete_provider),
        )
        .route("/v1/market/prices", get(market::get_prices))
        .route("/v1/leaderboard", get(leaderboard::get_leaderboard))
        .layer(cors)
        .with_state(state)
}
