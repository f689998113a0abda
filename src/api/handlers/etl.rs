use axum::{extract::State, http::StatusCode, Json};
use std::sync::atomic::Ordering;
use tracing::{error, info};

use crate::api::{state::AppState, types::EtlTriggerResponse};
use crate::error::GridironError;
use crate::etl::EtlMode;
use crate::services;

/// POST /api/etl/run
///
/// Dispatches a background run and returns immediately; 409 when a run
/// is already in flight in this process. Failures are logged, never
/// propagated to the serving path.
pub async fn trigger_etl(
    State(state): State<AppState>,
) -> std::result::Result<(StatusCode, Json<EtlTriggerResponse>), (StatusCode, String)> {
    if state
        .etl_running
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Err((StatusCode::CONFLICT, GridironError::EtlInProgress.to_string()));
    }

    let task_state = state.clone();
    tokio::spawn(async move {
        info!("API-triggered ETL run starting");
        if let Err(e) = services::run_etl_and_refresh(&task_state, EtlMode::Full).await {
            error!(error = %e, "API-triggered ETL run failed");
        }
        task_state.etl_running.store(false, Ordering::SeqCst);
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(EtlTriggerResponse { status: "started" }),
    ))
}
