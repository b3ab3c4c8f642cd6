use sharesim::api;
use sharesim::config::Config;
use sharesim::db::init_db;
use sharesim::orchestration::{run_trading_loop, EngineRegistry, TradingEngine};
use sharesim::quotes::{
    FailoverQuotes, MarketData, QuoteCache, QuoteSource, SinaQuotes, TencentQuotes,
};
use sharesim::Repository;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let port = config.port;

    // Initialize database and dependencies
    let pool = match init_db(&config.database_path).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };
    let repo = Arc::new(Repository::new(pool));

    // Quote supplier chain: Sina first, Tencent as failover and history
    // provider, all behind a short-lived cache.
    let chain = FailoverQuotes::new(
        vec![
            Arc::new(SinaQuotes::default_url()) as Arc<dyn QuoteSource>,
            Arc::new(TencentQuotes::default_url()),
        ],
        Duration::from_secs(config.quote_timeout_secs),
    );
    let cached: Arc<dyn QuoteSource> = Arc::new(QuoteCache::new(
        chain,
        Duration::from_secs(config.quote_cache_ttl_secs),
    ));
    let market = MarketData::new(cached);

    // Rebuild the engine registry from the ledger.
    let registry = Arc::new(EngineRegistry::new());
    match repo.list_models().await {
        Ok(models) => {
            for model in models {
                let provider = match model.provider_id {
                    Some(provider_id) => repo.get_provider(provider_id).await.ok().flatten(),
                    None => None,
                };
                let engine = TradingEngine::from_model(
                    model,
                    provider,
                    repo.clone(),
                    market.clone(),
                    config.clone(),
                );
                registry.insert(Arc::new(engine)).await;
            }
            tracing::info!(engines = registry.len().await, "engine registry initialized");
        }
        Err(e) => {
            eprintln!("Failed to load models: {}", e);
            std::process::exit(1);
        }
    }

    // Background trading loop with graceful shutdown.
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let loop_handle = tokio::spawn(run_trading_loop(
        registry.clone(),
        Duration::from_secs(config.cycle_interval_secs),
        shutdown_rx,
    ));

    // Create router
    let app = api::create_router(api::AppState::new(
        repo,
        registry,
        market,
        config,
    ));

    // Bind to address
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!("Server listening on {}", addr);

    // Run server until Ctrl+C, then stop the trading loop between models.
    let server = axum::serve(listener, app).with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
    });

    if let Err(e) = server.await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }

    let _ = shutdown_tx.send(true);
    let _ = loop_handle.await;
}
