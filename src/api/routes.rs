use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::api::{handlers, state::AppState};

pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Prediction endpoints
        .route("/api/predictions/:player_id", get(handlers::get_prediction))
        .route("/api/rankings", get(handlers::get_rankings))
        // Feature endpoints
        .route("/api/features/:player_id", get(handlers::get_feature_row))
        // ETL endpoints
        .route("/api/etl/run", post(handlers::trigger_etl))
        // System endpoints
        .route("/api/health", get(handlers::get_health))
        // Add state and CORS
        .with_state(state)
        .layer(cors)
}
