pub mod analytics;
pub mod cache;
pub mod conversion;
pub mod db;
pub mod error;
pub mod models;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use analytics::engine::AnalyticsEngine;
use analytics::handlers::{BagsResponse, PointsResponse, RollupRequest};
use analytics::models::{AnalyticsSnapshot, RollupTotals, TopDealer, TopReward};
use analytics::repository::PgRecordStore;
use cache::SnapshotCache;
use conversion::CementType;
use models::{Reward, Transaction, TransactionStatus, TransactionType, User, UserRole};

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    paths(
        analytics::handlers::points_to_bags,
        analytics::handlers::bags_to_points,
        analytics::handlers::compute_rollup,
        analytics::handlers::compute_analytics,
    ),
    components(
        schemas(
            Transaction, TransactionType, TransactionStatus, User, UserRole, Reward,
            CementType, AnalyticsSnapshot, RollupTotals, TopDealer, TopReward,
            RollupRequest, BagsResponse, PointsResponse,
        )
    ),
    tags(
        (name = "conversion", description = "Points/bags unit conversion endpoints"),
        (name = "analytics", description = "Roll-up and analytics snapshot endpoints")
    ),
    info(
        title = "Loyalty Points API",
        version = "1.0.0",
        description = "Cement-bag loyalty program analytics and conversion API"
    )
)]
struct ApiDoc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: AnalyticsEngine<PgRecordStore>,
    pub snapshot_cache: Arc<SnapshotCache>,
}

/// Creates and configures the application router
/// Maps all API endpoints to their handlers and adds CORS middleware
fn create_router(db: PgPool, fetch_timeout: Duration, cache_ttl: Duration) -> Router {
    use tower_http::cors::{Any, CorsLayer};

    let state = AppState {
        engine: AnalyticsEngine::new(PgRecordStore::new(db)).with_fetch_timeout(fetch_timeout),
        snapshot_cache: Arc::new(SnapshotCache::with_ttl(cache_ttl)),
    };

    // Configure CORS to allow all origins, methods, and headers
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // API routes
        .route("/api/convert/points-to-bags", get(analytics::handlers::points_to_bags))
        .route("/api/convert/bags-to-points", get(analytics::handlers::bags_to_points))
        .route("/api/analytics/rollup", post(analytics::handlers::compute_rollup))
        .route("/api/analytics", get(analytics::handlers::compute_analytics))
        .layer(cors)
        .with_state(state)
}

/// Read a duration (in the given unit) from the environment, falling
/// back to a default when unset or unparseable
fn env_duration(var: &str, default: Duration, from_unit: fn(u64) -> Duration) -> Duration {
    std::env::var(var)
        .ok()
        .and_then(|raw| raw.parse::<u64>().ok())
        .map(from_unit)
        .unwrap_or(default)
}

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    tracing::info!("Loyalty Points API - Starting...");

    // Get configuration from environment variables
    let database_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set in environment");
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = std::env::var("PORT").unwrap_or_else(|_| "8080".to_string());
    let fetch_timeout = env_duration(
        "ANALYTICS_FETCH_TIMEOUT_MS",
        Duration::from_secs(10),
        Duration::from_millis,
    );
    let cache_ttl = env_duration(
        "SNAPSHOT_CACHE_TTL_SECS",
        Duration::from_secs(30),
        Duration::from_secs,
    );

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = db::create_pool(&database_url)
        .await
        .expect("Failed to create database pool");

    // Run SQLx migrations on startup
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Migrations completed successfully");

    // Create the application router
    let app = create_router(db_pool, fetch_timeout, cache_ttl);

    // Start the Axum server
    let addr = format!("{}:{}", host, port);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Loyalty Points API is running on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui", addr);

    axum::serve(listener, app)
        .await
        .expect("Server error");
}

#[cfg(test)]
mod tests;
