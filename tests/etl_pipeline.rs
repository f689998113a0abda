//! End-to-end pipeline pieces over flat files: CSV parsing, schema
//! planning, the flat-file snapshot, feature computation and the
//! prediction engine: everything up to the database boundary.

use std::fs;
use std::path::Path;

use gridiron::config::PredictionConfig;
use gridiron::domain::InjuryStatus;
use gridiron::etl::reconciler::{self, TableSchema};
use gridiron::etl::{LoadAction, LoadMode, TableState};
use gridiron::ingest::{ColumnType, Dataset};
use gridiron::model::ModelBundle;
use gridiron::predict::PredictionEngine;
use gridiron::store::DataSnapshot;
use gridiron::GridironError;

fn write(dir: &Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).unwrap();
}

/// A two-week season for one team: p1 is the RB under test, rb2 the
/// teammate whose absence drives the boost, wr1 exists for the
/// missing-manifest case.
fn seed_sources(dir: &Path) {
    write(
        dir,
        "player_profiles.csv",
        "player_id,player_name,position,team,status\n\
         p1,Alvin Example,RB,NO,ACT\n\
         rb2,Backup Back,RB,NO,ACT\n\
         wr1,Wide Out,WR,NO,ACT\n",
    );
    write(
        dir,
        "schedule_2025.csv",
        "game_id,season,week,home_team,away_team,home_score,away_score\n\
         2025_01_ATL_NO,2025,1,NO,ATL,27,13\n\
         2025_02_NO_TB,2025,2,TB,NO,17,20\n\
         2025_03_CAR_NO,2025,3,NO,CAR,,\n",
    );
    write(
        dir,
        "weekly_player_stats_2025.csv",
        "player_id,season,week,team,opponent_team,passing_yards,passing_tds,interceptions,\
         pass_attempts,rushing_yards,rushing_tds,rush_attempts,receiving_yards,receiving_tds,\
         receptions,targets,fumbles_lost,fantasy_points_ppr\n\
         p1,2025,1,NO,ATL,0,0,0,0,80,0,14,20,0,2,3,0,12\n\
         p1,2025,2,NO,TB,0,0,0,0,110,1,18,10,0,1,1,0,16\n\
         rb2,2025,1,NO,ATL,0,0,0,0,40,0,8,5,0,1,1,0,5.5\n\
         rb2,2025,2,NO,TB,0,0,0,0,35,0,7,0,0,0,0,0,3.5\n\
         wr1,2025,1,NO,ATL,0,0,0,0,0,0,0,90,1,6,9,0,21\n",
    );
    write(
        dir,
        "weekly_snap_counts_2025.csv",
        "player_id,season,week,snap_count,snap_share,team_total_snaps\n\
         p1,2025,1,45,0.68,66\n\
         p1,2025,2,48,0.72,67\n\
         rb2,2025,1,20,0.30,66\n\
         rb2,2025,2,18,0.27,67\n\
         wr1,2025,1,60,0.91,66\n",
    );
    write(
        dir,
        "weekly_injuries_2025.csv",
        "player_id,season,week,raw_status,report_time\n\
         rb2,2025,3,Out,2025-09-19T18:00:00Z\n",
    );
    write(
        dir,
        "game_lines_2025.csv",
        "game_id,season,week,home_team,away_team,total,home_spread,home_moneyline,away_moneyline\n\
         2025_03_CAR_NO,2025,3,NO,CAR,44,-3,,\n",
    );
}

fn seed_models(dir: &Path) {
    fs::write(
        dir.join("deviation_RB.json"),
        r#"{
            "feature_names": ["rolling_4wk_fantasy_avg"],
            "weights": [0.0],
            "bias": 3.2,
            "residual_low_quantile": -4.0
        }"#,
    )
    .unwrap();
    // WR scorer demands a feature the pipeline never computes
    fs::write(
        dir.join("deviation_WR.json"),
        r#"{
            "feature_names": ["route_participation_rate"],
            "weights": [1.0],
            "bias": 0.0,
            "residual_low_quantile": -2.0
        }"#,
    )
    .unwrap();
}

fn prediction_config(models: &Path) -> PredictionConfig {
    PredictionConfig {
        model_dir: models.to_path_buf(),
        rolling_window: 4,
        boost_min_snap_share: 0.20,
        boost_lift_primary: 2.5,
        boost_lift_secondary: 1.5,
        boost_max_fraction: 0.15,
    }
}

#[test]
fn flat_file_snapshot_to_boosted_prediction() {
    let sources = tempfile::tempdir().unwrap();
    let models_dir = tempfile::tempdir().unwrap();
    seed_sources(sources.path());
    seed_models(models_dir.path());

    let snapshot = DataSnapshot::from_csv_dir(sources.path(), 2025, 4).unwrap();
    assert_eq!(snapshot.last_stat_week(), 2);

    let models = ModelBundle::load_dir(models_dir.path()).unwrap();
    let config = prediction_config(models_dir.path());
    let engine = PredictionEngine::new(&snapshot, &models, &config);

    let pred = engine.predict("p1", 3).unwrap();
    // rolling baseline (12 + 16) / 2 = 14, deviation 3.2, boost +2.5
    // (rb2 is Out at 28.5% trailing snap share)
    assert!((pred.baseline - 14.0).abs() < 1e-9);
    assert!((pred.deviation - 3.2).abs() < 1e-9);
    assert!(pred.is_injury_boosted);
    assert!((pred.predicted_points - 19.7).abs() < 1e-9);
    assert!(pred.floor <= pred.predicted_points);
    assert!((pred.floor - 13.2).abs() < 1e-9);
    assert_eq!(pred.opponent, "CAR");
    assert_eq!(pred.injury_status, InjuryStatus::Active);
    assert!(pred.boost_reason.unwrap().contains("Backup Back"));
}

#[test]
fn ruled_out_player_never_shows_boost() {
    let sources = tempfile::tempdir().unwrap();
    let models_dir = tempfile::tempdir().unwrap();
    seed_sources(sources.path());
    seed_models(models_dir.path());

    // p1 also goes down this week; rb2 still qualifies as an absence
    fs::write(
        sources.path().join("weekly_injuries_2025.csv"),
        "player_id,season,week,raw_status,report_time\n\
         rb2,2025,3,Out,2025-09-19T18:00:00Z\n\
         p1,2025,3,Doubtful,2025-09-19T19:00:00Z\n",
    )
    .unwrap();

    let snapshot = DataSnapshot::from_csv_dir(sources.path(), 2025, 4).unwrap();
    let models = ModelBundle::load_dir(models_dir.path()).unwrap();
    let config = prediction_config(models_dir.path());
    let engine = PredictionEngine::new(&snapshot, &models, &config);

    let pred = engine.predict("p1", 3).unwrap();
    assert!(!pred.is_injury_boosted);
    assert!(pred.boost_reason.is_none());
    assert_eq!(pred.injury_status, InjuryStatus::Doubtful);
    // No lift: baseline + deviation only
    assert!((pred.predicted_points - 17.2).abs() < 1e-9);
}

#[test]
fn missing_manifest_feature_fails_closed_end_to_end() {
    let sources = tempfile::tempdir().unwrap();
    let models_dir = tempfile::tempdir().unwrap();
    seed_sources(sources.path());
    seed_models(models_dir.path());

    let snapshot = DataSnapshot::from_csv_dir(sources.path(), 2025, 4).unwrap();
    let models = ModelBundle::load_dir(models_dir.path()).unwrap();
    let config = prediction_config(models_dir.path());
    let engine = PredictionEngine::new(&snapshot, &models, &config);

    match engine.predict("wr1", 3) {
        Err(GridironError::PredictionUnavailable { reason, .. }) => {
            assert!(reason.contains("route_participation_rate"));
        }
        other => panic!("expected fail-closed, got {:?}", other.map(|p| p.predicted_points)),
    }
}

#[test]
fn feature_recomputation_is_idempotent() {
    let sources = tempfile::tempdir().unwrap();
    seed_sources(sources.path());

    let first = DataSnapshot::from_csv_dir(sources.path(), 2025, 4).unwrap();
    let second = DataSnapshot::from_csv_dir(sources.path(), 2025, 4).unwrap();

    assert_eq!(first.features.len(), second.features.len());
    for (key, row) in &first.features {
        assert_eq!(row.values, second.features[key].values, "key {:?}", key);
    }
}

#[test]
fn vegas_implied_total_flows_into_features() {
    let sources = tempfile::tempdir().unwrap();
    seed_sources(sources.path());

    let snapshot = DataSnapshot::from_csv_dir(sources.path(), 2025, 4).unwrap();
    let row = snapshot.feature_row("p1", 3).unwrap();
    // 44 total, NO favored by 3 at home: 22 + 1.5
    assert!((row.get("vegas_implied_total").unwrap() - 23.5).abs() < 1e-9);
}

#[test]
fn evolving_source_only_ever_adds_columns() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "v1.csv", "a,b\n1,2\n");
    write(dir.path(), "v2.csv", "a,b,c\n1,2,3.5\n");

    let v1 = Dataset::from_csv_path(dir.path().join("v1.csv")).unwrap();
    let v2 = Dataset::from_csv_path(dir.path().join("v2.csv")).unwrap();

    // The live table as created from v1
    let live = TableSchema {
        table: "t".to_string(),
        columns: v1
            .columns
            .iter()
            .map(|c| reconciler::LiveColumn {
                name: c.name.clone(),
                col_type: c.col_type,
            })
            .collect(),
    };

    // v2 arrives: exactly one ADD COLUMN, nothing dropped or retyped
    let changes = reconciler::plan(&live, &v2.columns).unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].name, "c");
    assert_eq!(changes[0].col_type, ColumnType::Float);

    // v1 arriving again against the evolved table plans nothing
    let mut evolved = live.clone();
    evolved.columns.push(reconciler::LiveColumn {
        name: "c".to_string(),
        col_type: ColumnType::Float,
    });
    assert!(reconciler::plan(&evolved, &v1.columns).unwrap().is_empty());
}

#[test]
fn strategy_decisions_match_declared_modes() {
    let seeded = TableState {
        exists: true,
        row_count: 500,
    };
    let empty = TableState {
        exists: true,
        row_count: 0,
    };

    // if_missing on a seeded table performs zero writes
    assert_eq!(
        gridiron::etl::strategy::decide(LoadMode::IfMissing, seeded),
        LoadAction::Skip
    );
    // smart_append re-runs go through the upsert path
    assert_eq!(
        gridiron::etl::strategy::decide(LoadMode::SmartAppend, seeded),
        LoadAction::ReconcileUpsert
    );
    // replace reconciles before it truncates
    assert_eq!(
        gridiron::etl::strategy::decide(LoadMode::Replace, empty),
        LoadAction::ReconcileReplace
    );
}
