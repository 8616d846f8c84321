mod auth;
mod config;
mod controller;
mod db;
mod engines;
mod error;
mod ghost;
mod loss_model;
mod routes;
mod srs;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Extension, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;

use engines::maia::MaiaEngine;
use engines::stockfish::StockfishService;

#[tokio::main]
async fn main() {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = config::Config::from_env();

    // Connect to Postgres
    tracing::info!("Connecting to database...");
    let pool = db::pool::create_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Run schema migrations
    tracing::info!("Running migrations...");
    db::pool::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    // Process-wide engines: the model client initializes lazily behind a
    // one-shot latch, the evaluator owns a single serialized subprocess.
    let maia = Arc::new(MaiaEngine::new(&config.maia_api_url, config.maia_timeout_ms));
    let stockfish = Arc::new(StockfishService::new(
        &config.stockfish_path,
        config.stockfish_depth,
    ));

    if config.maia_warmup {
        let engine = maia.clone();
        tokio::spawn(async move {
            if let Err(e) = engine.warmup().await {
                tracing::warn!("model warmup failed: {e}");
            }
        });
    }

    // CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        // Health
        .route("/health", get(routes::health::health_check))
        // Game sessions + opponent move pipeline
        .route("/api/game/start", post(routes::game::start_game))
        .route("/api/game/end", post(routes::game::end_game))
        .route(
            "/api/game/next-opponent-move",
            post(routes::game::next_opponent_move),
        )
        // Blunder library
        .route(
            "/api/blunder",
            post(routes::blunder::record_blunder).get(routes::blunder::list_blunders),
        )
        .route(
            "/api/blunder/manual",
            post(routes::blunder::record_manual_blunder),
        )
        // Spaced repetition
        .route("/api/srs/review", post(routes::srs::review_blunder))
        // Session move log + history
        .route(
            "/api/session/{session_id}/moves",
            post(routes::session::upsert_session_moves),
        )
        .route("/api/history", get(routes::history::get_history))
        // Shared state
        .layer(Extension(pool))
        .layer(Extension(config.clone()))
        .layer(Extension(maia))
        .layer(Extension(stockfish))
        .layer(cors);

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");

    axum::serve(listener, app).await.expect("Server error");
}
