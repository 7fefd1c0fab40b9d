//! Settlement Service - Main Application Entry Point
//!
//! A payment settlement service: merchants initiate top-ups and payouts over
//! a REST API, and a background engine periodically resolves each pending
//! transaction, applies the matching balance change under row locks, and
//! notifies the merchant endpoint with bounded retries.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries)
//! - **Settlement**: periodic engine over store ports, spawned at startup
//! - **Authentication**: merchant Basic credentials with SHA-256 hashed secrets
//! - **Format**: JSON requests/responses
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Create database connection pool
//! 3. Run database migrations
//! 4. Spawn the settlement scheduler task
//! 5. Build HTTP router with routes and middleware
//! 6. Start server on configured port

use std::sync::Arc;
use std::time::Duration;

use settlement_service::{
    config, db, handlers, middleware,
    services::{
        resolver::RandomOutcomeResolver,
        settlement::{self, SettlementEngine},
        webhook::{RetryPolicy, WebhookNotifier},
    },
    store::postgres::PgStore,
};
use tracing_subscriber::EnvFilter;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with tracing subscriber. Reads RUST_LOG environment variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Load configuration
    let config = config::Config::from_env()?;
    tracing::info!("Configuration loaded");

    // Create database pool
    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool created");

    // Run migrations
    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    // Spawn the settlement engine on its own task. It shares the pool with
    // the HTTP handlers but is otherwise independent of the server below.
    let store = Arc::new(PgStore::new(pool.clone()));
    let notifier = WebhookNotifier::new(store.clone(), RetryPolicy::default());
    let engine = Arc::new(SettlementEngine::new(
        store,
        RandomOutcomeResolver,
        notifier,
        config.settle_max_in_flight,
    ));
    tokio::spawn(settlement::run(
        engine,
        Duration::from_secs(config.settle_initial_delay_secs),
        Duration::from_secs(config.settle_period_secs),
    ));

    // Create authenticated routes (API endpoints)
    let authenticated_routes = Router::new()
        // Payment initiation
        .route(
            "/api/v1/payments/topups",
            post(handlers::payments::create_top_up),
        )
        .route(
            "/api/v1/payments/payouts",
            post(handlers::payments::create_payout),
        )
        // Payment queries
        .route(
            "/api/v1/payments/topups",
            get(handlers::payments::list_top_ups),
        )
        .route(
            "/api/v1/payments/topups/{id}",
            get(handlers::payments::get_top_up),
        )
        .route(
            "/api/v1/payments/payouts",
            get(handlers::payments::list_payouts),
        )
        .route(
            "/api/v1/payments/payouts/{id}",
            get(handlers::payments::get_payout),
        )
        // Apply authentication middleware to all routes in this group
        .route_layer(axum_middleware::from_fn_with_state(
            pool.clone(),
            middleware::auth::auth_middleware,
        ));

    // Combine authenticated routes with public routes
    let app = Router::new()
        // Public routes (no authentication required)
        .route("/health", get(handlers::health::health_check))
        // Merge authenticated routes
        .merge(authenticated_routes)
        // Add distributed tracing middleware for observability
        .layer(TraceLayer::new_for_http())
        // Share database pool with all handlers via State extraction
        .with_state(pool);

    // Bind to network address and start server
    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Start serving HTTP requests
    // This blocks forever, handling requests concurrently with tokio
    axum::serve(listener, app).await?;

    Ok(())
}
