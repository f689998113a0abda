use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::api::{state::AppState, types::*};
use crate::error::GridironError;
use crate::predict::{Prediction, PredictionEngine};

/// GET /api/predictions/:player_id?week=N
///
/// A player with no computable projection gets an explicit 404, never a
/// fabricated zero.
pub async fn get_prediction(
    State(state): State<AppState>,
    Path(player_id): Path<String>,
    Query(query): Query<PredictionQuery>,
) -> std::result::Result<Json<Prediction>, (StatusCode, String)> {
    let snapshot = state.current_snapshot().await;
    let week = query.week.unwrap_or_else(|| snapshot.last_stat_week() + 1);

    let engine = PredictionEngine::new(&snapshot, &state.models, &state.config.prediction);
    match engine.predict(&player_id, week) {
        Ok(prediction) => Ok(Json(prediction)),
        Err(e @ GridironError::PlayerNotFound(_)) => Err((StatusCode::NOT_FOUND, e.to_string())),
        Err(e @ GridironError::PredictionUnavailable { .. }) => {
            Err((StatusCode::NOT_FOUND, e.to_string()))
        }
        Err(e) => Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

/// GET /api/rankings?week=N&position=RB&limit=K
pub async fn get_rankings(
    State(state): State<AppState>,
    Query(query): Query<RankingsQuery>,
) -> std::result::Result<Json<Vec<RankedPrediction>>, (StatusCode, String)> {
    let snapshot = state.current_snapshot().await;
    let week = query.week.unwrap_or_else(|| snapshot.last_stat_week() + 1);
    let limit = query.limit.unwrap_or(50).min(200);

    if let Some(pos) = &query.position {
        let valid = ["QB", "RB", "WR", "TE"];
        if !valid.contains(&pos.to_uppercase().as_str()) {
            return Err((
                StatusCode::BAD_REQUEST,
                format!("unknown position '{}'", pos),
            ));
        }
    }
    let position = query.position.as_ref().map(|p| p.to_uppercase());

    let engine = PredictionEngine::new(&snapshot, &state.models, &state.config.prediction);
    let ranked = engine
        .rankings(week, position.as_deref())
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, prediction)| RankedPrediction {
            rank: i + 1,
            prediction,
        })
        .collect();

    Ok(Json(ranked))
}
