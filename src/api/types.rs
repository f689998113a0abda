use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// GET /api/predictions/:player_id query
#[derive(Debug, Deserialize)]
pub struct PredictionQuery {
    /// Target week; defaults to the first upcoming week
    pub week: Option<i32>,
}

/// GET /api/features/:player_id query
#[derive(Debug, Deserialize)]
pub struct FeatureQuery {
    pub week: Option<i32>,
}

/// GET /api/rankings query
#[derive(Debug, Deserialize)]
pub struct RankingsQuery {
    pub week: Option<i32>,
    pub position: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct RankedPrediction {
    pub rank: usize,
    #[serde(flatten)]
    pub prediction: crate::predict::Prediction,
}

#[derive(Debug, Serialize)]
pub struct EtlTriggerResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: i64,
    pub database_connected: bool,
    pub snapshot_loaded_at: DateTime<Utc>,
    pub snapshot_last_week: i32,
    pub modeled_positions: Vec<String>,
    pub etl_running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run_state: Option<String>,
}
