use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use std::sync::atomic::Ordering;

use crate::api::{state::AppState, types::HealthResponse};

/// GET /api/health
pub async fn get_health(
    State(state): State<AppState>,
) -> std::result::Result<Json<HealthResponse>, (StatusCode, String)> {
    let database_connected = sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(state.store.pool())
        .await
        .is_ok();

    let last_run_state = if database_connected {
        state
            .store
            .last_run()
            .await
            .ok()
            .flatten()
            .map(|(_, run_state, _)| run_state)
    } else {
        None
    };

    let snapshot = state.current_snapshot().await;
    let status = if database_connected || !snapshot.is_empty() {
        "ok"
    } else {
        "degraded"
    };

    Ok(Json(HealthResponse {
        status,
        timestamp: Utc::now(),
        uptime_seconds: (Utc::now() - state.start_time).num_seconds(),
        database_connected,
        snapshot_loaded_at: snapshot.loaded_at,
        snapshot_last_week: snapshot.last_stat_week(),
        modeled_positions: state
            .models
            .loaded_positions()
            .iter()
            .map(|p| p.as_str().to_string())
            .collect(),
        etl_running: state.etl_running.load(Ordering::SeqCst),
        last_run_state,
    }))
}
