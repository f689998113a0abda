//! The fixed ingestion pipeline.
//!
//! Steps run in dependency order because later steps read earlier tables
//! (feature generation reads everything loaded before it). Each step
//! declares its source file(s), target table(s), load mode and primary
//! key; a step may also carry a prepare hook that normalizes the dataset
//! before it touches the database (derived columns, dedup, status
//! decoding).

use crate::domain::{ppr_points, InjuryStatus};
use crate::error::Result;
use crate::etl::strategy::LoadMode;
use crate::ingest::{ColumnType, Dataset, Value};

/// Dataset normalization applied after parse, before load.
pub type PrepareFn = fn(&mut Dataset) -> Result<()>;

/// One physical table load within a step.
pub struct TableLoad {
    pub file: String,
    pub table: String,
    pub mode: LoadMode,
    pub key: Vec<&'static str>,
    pub prepare: Option<PrepareFn>,
}

/// What a step does.
pub enum StepKind {
    /// Load one or more CSV sources into their tables
    Load(Vec<TableLoad>),
    /// Recompute the derived feature table from the fact tables
    BuildFeatures,
}

pub struct StepSpec {
    pub name: &'static str,
    pub kind: StepKind,
}

/// The full pipeline for a season, in execution order.
pub fn pipeline(season: i32) -> Vec<StepSpec> {
    vec![
        StepSpec {
            name: "player_profiles",
            kind: StepKind::Load(vec![TableLoad {
                file: "player_profiles.csv".to_string(),
                table: "player_profiles".to_string(),
                mode: LoadMode::Replace,
                key: vec!["player_id"],
                prepare: None,
            }]),
        },
        StepSpec {
            name: "schedule",
            kind: StepKind::Load(vec![TableLoad {
                file: format!("schedule_{}.csv", season),
                table: format!("schedule_{}", season),
                mode: LoadMode::Replace,
                key: vec!["game_id"],
                prepare: None,
            }]),
        },
        StepSpec {
            name: "weekly_stats",
            kind: StepKind::Load(vec![TableLoad {
                file: format!("weekly_player_stats_{}.csv", season),
                table: format!("weekly_player_stats_{}", season),
                mode: LoadMode::SmartAppend,
                key: vec!["player_id", "season", "week"],
                prepare: Some(derive_fantasy_points),
            }]),
        },
        StepSpec {
            name: "snap_counts",
            kind: StepKind::Load(vec![TableLoad {
                file: format!("weekly_snap_counts_{}.csv", season),
                table: format!("weekly_snap_counts_{}", season),
                mode: LoadMode::SmartAppend,
                key: vec!["player_id", "season", "week"],
                prepare: None,
            }]),
        },
        StepSpec {
            name: "injuries",
            kind: StepKind::Load(vec![TableLoad {
                file: format!("weekly_injuries_{}.csv", season),
                table: format!("weekly_injuries_{}", season),
                mode: LoadMode::SmartAppend,
                key: vec!["player_id", "season", "week"],
                prepare: Some(prepare_injuries),
            }]),
        },
        StepSpec {
            name: "features",
            kind: StepKind::BuildFeatures,
        },
        StepSpec {
            name: "betting_lines",
            kind: StepKind::Load(vec![
                TableLoad {
                    file: format!("game_lines_{}.csv", season),
                    table: format!("game_lines_{}", season),
                    mode: LoadMode::Replace,
                    key: vec!["game_id"],
                    prepare: None,
                },
                TableLoad {
                    file: format!("player_props_{}.csv", season),
                    table: format!("player_props_{}", season),
                    mode: LoadMode::Replace,
                    key: vec!["player_id", "season", "week", "prop_type"],
                    prepare: None,
                },
            ]),
        },
    ]
}

/// Name of the derived feature table.
pub fn feature_table(season: i32) -> String {
    format!("weekly_feature_set_{}", season)
}

/// Derive PPR fantasy points when the feed doesn't carry them.
fn derive_fantasy_points(ds: &mut Dataset) -> Result<()> {
    if ds.has_column("fantasy_points_ppr") {
        return Ok(());
    }

    let get = |ds: &Dataset, row: usize, col: &str| -> f64 {
        ds.value(row, col).and_then(Value::as_f64).unwrap_or(0.0)
    };

    let mut points = Vec::with_capacity(ds.len());
    for row in 0..ds.len() {
        points.push(Value::Float(ppr_points(
            get(ds, row, "passing_yards"),
            get(ds, row, "passing_tds"),
            get(ds, row, "rushing_yards"),
            get(ds, row, "rushing_tds"),
            get(ds, row, "receiving_yards"),
            get(ds, row, "receiving_tds"),
            get(ds, row, "receptions"),
            get(ds, row, "interceptions"),
            get(ds, row, "fumbles_lost"),
        )));
    }
    ds.push_column("fantasy_points_ppr", ColumnType::Float, points)
}

/// Collapse duplicate reports (latest `report_time` wins) and decode the
/// free-text status into the closed enum, stored alongside the raw text.
fn prepare_injuries(ds: &mut Dataset) -> Result<()> {
    ds.dedup_by_key_keeping_max(&["player_id", "season", "week"], "report_time")?;

    let mut decoded = Vec::with_capacity(ds.len());
    for row in 0..ds.len() {
        let status = ds
            .value(row, "raw_status")
            .map(|v| InjuryStatus::decode(&v.render()))
            .unwrap_or(InjuryStatus::Unknown);
        decoded.push(Value::Text(status.as_str().to_string()));
    }
    ds.push_column("status", ColumnType::Text, decoded)
}
