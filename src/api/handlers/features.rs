use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::api::{state::AppState, types::FeatureQuery};
use crate::features::FeatureRow;

/// GET /api/features/:player_id?week=N
pub async fn get_feature_row(
    State(state): State<AppState>,
    Path(player_id): Path<String>,
    Query(query): Query<FeatureQuery>,
) -> std::result::Result<Json<FeatureRow>, (StatusCode, String)> {
    let snapshot = state.current_snapshot().await;
    let week = query.week.unwrap_or_else(|| snapshot.last_stat_week() + 1);

    snapshot
        .feature_row(&player_id, week)
        .cloned()
        .map(Json)
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                format!("no feature row for {} week {}", player_id, week),
            )
        })
}
