//! Endpoint tests driving the axum router directly.

use axum::http::StatusCode;
use sharesim::api;
use sharesim::config::Config;
use sharesim::db::init_db;
use sharesim::domain::{Decimal, Symbol};
use sharesim::orchestration::EngineRegistry;
use sharesim::quotes::{MarketData, MockQuoteSource};
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

struct TestApp {
    app: axum::Router,
    repo: Arc<sharesim::Repository>,
    _temp: TempDir,
}

fn d(s: &str) -> Decimal {
    Decimal::from_str_canonical(s).unwrap()
}

fn test_config() -> Config {
    let mut env = HashMap::new();
    env.insert("DATABASE_PATH".to_string(), ":memory:".to_string());
    env.insert("SYMBOLS".to_string(), "600519,000858".to_string());
    Config::from_env_map(env).unwrap()
}

async fn setup_test_app(mock: MockQuoteSource) -> TestApp {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(sharesim::Repository::new(pool));

    let market = MarketData::new(Arc::new(mock));
    let registry = Arc::new(EngineRegistry::new());
    let state = api::AppState::new(repo.clone(), registry, market, test_config());
    let app = api::create_router(state);

    TestApp {
        app,
        repo,
        _temp: temp_dir,
    }
}

fn quoted_market() -> MockQuoteSource {
    let closes: Vec<Decimal> = (1..=30).map(Decimal::from_i64).collect();
    MockQuoteSource::new()
        .with_price(Symbol::new("600519"), d("31"), d("30"))
        .with_closes(Symbol::new("600519"), closes)
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let req = axum::http::Request::builder()
        .method("GET")
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();

    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

async fn post(app: axum::Router, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
    let req = axum::http::Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(body.to_string()))
        .unwrap();

    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

#[tokio::test]
async fn test_health_endpoint() {
    let test_app = setup_test_app(MockQuoteSource::new()).await;
    let (status, body) = get(test_app.app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_create_and_list_models() {
    let test_app = setup_test_app(MockQuoteSource::new()).await;

    let (status, created) = post(
        test_app.app.clone(),
        "/v1/models",
        serde_json::json!({"name": "momentum", "initialCapital": 100000}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["name"], "momentum");
    assert_eq!(created["decisionMode"], "rules");

    let (status, listed) = get(test_app.app, "/v1/models").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["name"], "momentum");
}

#[tokio::test]
async fn test_create_llm_model_requires_provider() {
    let test_app = setup_test_app(MockQuoteSource::new()).await;

    let (status, body) = post(
        test_app.app,
        "/v1/models",
        serde_json::json!({"name": "brain", "decisionMode": "llm"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("provider"));
}

#[tokio::test]
async fn test_portfolio_endpoint_for_fresh_model() {
    let test_app = setup_test_app(MockQuoteSource::new()).await;
    let model_id = test_app
        .repo
        .add_model("fresh", "rules", None, None, d("100000"))
        .await
        .unwrap();

    let (status, body) = get(
        test_app.app,
        &format!("/v1/models/{}/portfolio", model_id),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["portfolio"]["cash"], serde_json::json!(100000.0));
    assert_eq!(body["portfolio"]["positions"], serde_json::json!([]));
    assert_eq!(body["history"], serde_json::json!([]));
}

#[tokio::test]
async fn test_portfolio_endpoint_unknown_model_is_404() {
    let test_app = setup_test_app(MockQuoteSource::new()).await;
    let (status, _) = get(test_app.app, "/v1/models/999/portfolio").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_execute_endpoint_runs_a_cycle() {
    let test_app = setup_test_app(quoted_market()).await;
    let model_id = test_app
        .repo
        .add_model("executor", "rules", None, None, d("100000"))
        .await
        .unwrap();

    let (status, report) = post(
        test_app.app.clone(),
        &format!("/v1/models/{}/execute", model_id),
        serde_json::json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["modelId"], serde_json::json!(model_id));
    assert_eq!(report["skipped"], serde_json::json!(false));

    // The rising market buys 600519; the ledger now has a position and a
    // valuation snapshot.
    let positions = test_app.repo.get_positions(model_id).await.unwrap();
    assert_eq!(positions.len(), 1);
    let history = test_app
        .repo
        .account_value_history(model_id, 10)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn test_market_prices_endpoint() {
    let test_app = setup_test_app(quoted_market()).await;
    let (status, body) = get(test_app.app, "/v1/market/prices").await;
    assert_eq!(status, StatusCode::OK);

    let spots = body.as_array().unwrap();
    assert_eq!(spots.len(), 2);
    // Sorted by symbol: 000858 has no quote, 600519 does.
    assert_eq!(spots[0]["symbol"], "000858");
    assert!(spots[0]["price"].is_null());
    assert_eq!(spots[1]["symbol"], "600519");
    assert_eq!(spots[1]["price"], serde_json::json!(31.0));
}

#[tokio::test]
async fn test_leaderboard_ranks_by_return() {
    let test_app = setup_test_app(quoted_market()).await;
    let ahead = test_app
        .repo
        .add_model("ahead", "rules", None, None, d("100000"))
        .await
        .unwrap();
    let behind = test_app
        .repo
        .add_model("behind", "rules", None, None, d("100000"))
        .await
        .unwrap();

    // Give "ahead" a realized gain and "behind" a realized loss.
    let win = sharesim::TradeRecord::sell(
        ahead,
        Symbol::new("600519"),
        100,
        d("1848"),
        d("55.44"),
        d("184.8"),
        d("16559.76"),
        chrono::Utc::now(),
    );
    test_app.repo.insert_trade(&win).await.unwrap();
    let loss = sharesim::TradeRecord::sell(
        behind,
        Symbol::new("600519"),
        100,
        d("1600"),
        d("48"),
        d("160"),
        d("-8208"),
        chrono::Utc::now(),
    );
    test_app.repo.insert_trade(&loss).await.unwrap();

    let (status, body) = get(test_app.app, "/v1/leaderboard").await;
    assert_eq!(status, StatusCode::OK);

    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["modelName"], "ahead");
    assert_eq!(entries[1]["modelName"], "behind");
    assert!(entries[0]["returnPct"].as_f64().unwrap() > 0.0);
    assert!(entries[1]["returnPct"].as_f64().unwrap() < 0.0);
}

#[tokio::test]
async fn test_provider_crud() {
    let test_app = setup_test_app(MockQuoteSource::new()).await;

    let (status, created) = post(
        test_app.app.clone(),
        "/v1/providers",
        serde_json::json!({
            "name": "deepseek",
            "apiUrl": "https://api.deepseek.com",
            "apiKey": "sk-test"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["name"], "deepseek");
    // Credentials never come back out.
    assert!(created.get("apiKey").is_none());

    let (status, listed) = get(test_app.app, "/v1/providers").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert!(listed[0].get("apiKey").is_none());
}
