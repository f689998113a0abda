//! Immutable in-memory snapshot of the fact tables.
//!
//! Constructed once after each successful ETL run (or at startup) and
//! handed to request handlers behind an `Arc`; a refresh builds a new
//! snapshot and swaps the reference atomically. Readers therefore always
//! see one consistent load, never a half-refreshed mix.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::domain::{
    GameLine, InjuryReport, InjuryStatus, PlayerProfile, Position, ScheduleGame, SnapCount,
    WeeklyStat,
};
use crate::error::Result;
use crate::features::{self, FactTables, FeatureRow};
use crate::ingest::{Dataset, Value};
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct DataSnapshot {
    pub season: i32,
    pub profiles: Vec<PlayerProfile>,
    pub stats: Vec<WeeklyStat>,
    pub snaps: Vec<SnapCount>,
    pub injuries: Vec<InjuryReport>,
    pub schedule: Vec<ScheduleGame>,
    pub game_lines: Vec<GameLine>,
    /// (player_id, week) -> feature row
    pub features: HashMap<(String, i32), FeatureRow>,
    pub loaded_at: DateTime<Utc>,
}

impl DataSnapshot {
    /// Build from the relational store. Tables that don't exist yet load
    /// as empty; a store mid-bootstrap serves what it has.
    pub async fn build(store: &Store, season: i32) -> Result<Self> {
        let profiles = if store.table_state("player_profiles").await?.exists {
            store.load_profiles().await?
        } else {
            Vec::new()
        };
        let schedule = if store
            .table_state(&format!("schedule_{}", season))
            .await?
            .exists
        {
            store.load_schedule(season).await?
        } else {
            Vec::new()
        };
        let stats = if store
            .table_state(&format!("weekly_player_stats_{}", season))
            .await?
            .exists
        {
            store.load_weekly_stats(season).await?
        } else {
            Vec::new()
        };
        let snaps = if store
            .table_state(&format!("weekly_snap_counts_{}", season))
            .await?
            .exists
        {
            store.load_snap_counts(season).await?
        } else {
            Vec::new()
        };
        let injuries = if store
            .table_state(&format!("weekly_injuries_{}", season))
            .await?
            .exists
        {
            store.load_injuries(season).await?
        } else {
            Vec::new()
        };
        let game_lines = if store
            .table_state(&format!("game_lines_{}", season))
            .await?
            .exists
        {
            store.load_game_lines(season).await?
        } else {
            Vec::new()
        };
        let feature_rows = if store
            .table_state(&format!("weekly_feature_set_{}", season))
            .await?
            .exists
        {
            store.load_feature_rows(season).await?
        } else {
            Vec::new()
        };

        let features = feature_rows
            .into_iter()
            .map(|r| ((r.player_id.clone(), r.week), r))
            .collect();

        let snapshot = Self {
            season,
            profiles,
            stats,
            snaps,
            injuries,
            schedule,
            game_lines,
            features,
            loaded_at: Utc::now(),
        };
        info!(
            season,
            profiles = snapshot.profiles.len(),
            stats = snapshot.stats.len(),
            features = snapshot.features.len(),
            "Snapshot built from store"
        );
        Ok(snapshot)
    }

    /// Flat-file fallback: rebuild the snapshot straight from the CSV
    /// drop directory when the relational store is unreachable. Features
    /// are recomputed on the fly since the derived table can't be read.
    pub fn from_csv_dir<P: AsRef<Path>>(dir: P, season: i32, window: usize) -> Result<Self> {
        let dir = dir.as_ref();

        let profiles = read_or_empty(dir.join("player_profiles.csv"), profiles_from_dataset);
        let schedule = read_or_empty(dir.join(format!("schedule_{}.csv", season)), |ds| {
            schedule_from_dataset(ds, season)
        });
        let stats = read_or_empty(
            dir.join(format!("weekly_player_stats_{}.csv", season)),
            |ds| stats_from_dataset(ds, season),
        );
        let snaps = read_or_empty(
            dir.join(format!("weekly_snap_counts_{}.csv", season)),
            |ds| snaps_from_dataset(ds, season),
        );
        let injuries = read_or_empty(
            dir.join(format!("weekly_injuries_{}.csv", season)),
            |ds| injuries_from_dataset(ds, season),
        );
        let game_lines = read_or_empty(dir.join(format!("game_lines_{}.csv", season)), |ds| {
            lines_from_dataset(ds, season)
        });

        let mut snapshot = Self {
            season,
            profiles,
            stats,
            snaps,
            injuries,
            schedule,
            game_lines,
            features: HashMap::new(),
            loaded_at: Utc::now(),
        };

        let rows = features::store::compute_all(&snapshot.facts(), season, window);
        snapshot.features = rows
            .into_iter()
            .map(|r| ((r.player_id.clone(), r.week), r))
            .collect();

        info!(
            season,
            profiles = snapshot.profiles.len(),
            "Snapshot built from flat files"
        );
        Ok(snapshot)
    }

    pub fn facts(&self) -> FactTables<'_> {
        FactTables {
            profiles: &self.profiles,
            stats: &self.stats,
            snaps: &self.snaps,
            schedule: &self.schedule,
            game_lines: &self.game_lines,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty() && self.profiles.is_empty()
    }

    /// Last week with recorded stats; the upcoming week is this + 1.
    pub fn last_stat_week(&self) -> i32 {
        self.facts().last_stat_week()
    }

    pub fn profile(&self, player_id: &str) -> Option<&PlayerProfile> {
        self.profiles.iter().find(|p| p.player_id == player_id)
    }

    pub fn feature_row(&self, player_id: &str, week: i32) -> Option<&FeatureRow> {
        self.features.get(&(player_id.to_string(), week))
    }

    /// Teammates sharing the player's usage group.
    pub fn usage_group_teammates<'a>(
        &'a self,
        player: &'a PlayerProfile,
    ) -> impl Iterator<Item = &'a PlayerProfile> {
        self.profiles.iter().filter(move |p| {
            p.player_id != player.player_id
                && p.team == player.team
                && p.position.usage_group() == player.position.usage_group()
        })
    }

    /// Injury status for a player in a given week.
    ///
    /// Reports for a future week fall back to the latest known week; a
    /// week inside the covered range with no report for this player means
    /// no designation, i.e. Active.
    pub fn injury_status(&self, player_id: &str, week: i32) -> InjuryStatus {
        if self.injuries.is_empty() {
            return InjuryStatus::Active;
        }
        let max_week = self.injuries.iter().map(|i| i.week).max().unwrap_or(0);
        let week_covered = self.injuries.iter().any(|i| i.week == week);

        let target = if week_covered {
            week
        } else if week > max_week {
            max_week
        } else {
            return InjuryStatus::Active;
        };

        self.injuries
            .iter()
            .find(|i| i.week == target && i.player_id == player_id)
            .map(|i| i.status)
            .unwrap_or(InjuryStatus::Active)
    }

    /// Trailing snap share for the boost materiality check.
    pub fn trailing_snap_share(&self, player_id: &str, week: i32, window: usize) -> f64 {
        let history: Vec<&SnapCount> = self
            .snaps
            .iter()
            .filter(|s| s.player_id == player_id)
            .collect();
        features::store::rolling_snap_share(&history, week, window)
    }
}

fn read_or_empty<T, F: Fn(&Dataset) -> Vec<T>>(path: std::path::PathBuf, convert: F) -> Vec<T> {
    match Dataset::from_csv_path(&path) {
        Ok(ds) => convert(&ds),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Flat-file source unavailable");
            Vec::new()
        }
    }
}

fn f64_at(ds: &Dataset, row: usize, col: &str) -> f64 {
    ds.value(row, col).and_then(Value::as_f64).unwrap_or(0.0)
}

fn opt_f64_at(ds: &Dataset, row: usize, col: &str) -> Option<f64> {
    ds.value(row, col).and_then(Value::as_f64)
}

fn text_at(ds: &Dataset, row: usize, col: &str) -> String {
    ds.value(row, col).map(Value::render).unwrap_or_default()
}

fn profiles_from_dataset(ds: &Dataset) -> Vec<PlayerProfile> {
    let mut out = Vec::with_capacity(ds.len());
    for row in 0..ds.len() {
        let position = match Position::try_from(text_at(ds, row, "position").as_str()) {
            Ok(p) => p,
            Err(_) => continue,
        };
        out.push(PlayerProfile {
            player_id: text_at(ds, row, "player_id"),
            name: text_at(ds, row, "player_name"),
            position,
            team: text_at(ds, row, "team"),
            status: InjuryStatus::decode(&text_at(ds, row, "status")),
            age: opt_f64_at(ds, row, "age").map(|v| v as i32),
            years_exp: opt_f64_at(ds, row, "years_exp").map(|v| v as i32),
            draft_year: opt_f64_at(ds, row, "draft_year").map(|v| v as i32),
            draft_number: opt_f64_at(ds, row, "draft_number").map(|v| v as i32),
            headshot_url: match text_at(ds, row, "headshot_url") {
                s if s.is_empty() => None,
                s => Some(s),
            },
        });
    }
    out
}

fn schedule_from_dataset(ds: &Dataset, season: i32) -> Vec<ScheduleGame> {
    (0..ds.len())
        .map(|row| ScheduleGame {
            game_id: text_at(ds, row, "game_id"),
            season,
            week: f64_at(ds, row, "week") as i32,
            home_team: text_at(ds, row, "home_team"),
            away_team: text_at(ds, row, "away_team"),
            home_score: opt_f64_at(ds, row, "home_score"),
            away_score: opt_f64_at(ds, row, "away_score"),
            home_moneyline: opt_f64_at(ds, row, "home_moneyline"),
            spread_line: opt_f64_at(ds, row, "spread_line"),
            total_line: opt_f64_at(ds, row, "total_line"),
        })
        .collect()
}

fn stats_from_dataset(ds: &Dataset, season: i32) -> Vec<WeeklyStat> {
    (0..ds.len())
        .map(|row| {
            let mut stat = WeeklyStat {
                player_id: text_at(ds, row, "player_id"),
                season,
                week: f64_at(ds, row, "week") as i32,
                team: text_at(ds, row, "team"),
                opponent_team: text_at(ds, row, "opponent_team"),
                passing_yards: f64_at(ds, row, "passing_yards"),
                passing_tds: f64_at(ds, row, "passing_tds"),
                interceptions: f64_at(ds, row, "interceptions"),
                pass_attempts: f64_at(ds, row, "pass_attempts"),
                rushing_yards: f64_at(ds, row, "rushing_yards"),
                rushing_tds: f64_at(ds, row, "rushing_tds"),
                rush_attempts: f64_at(ds, row, "rush_attempts"),
                receiving_yards: f64_at(ds, row, "receiving_yards"),
                receiving_tds: f64_at(ds, row, "receiving_tds"),
                receptions: f64_at(ds, row, "receptions"),
                targets: f64_at(ds, row, "targets"),
                fumbles_lost: f64_at(ds, row, "fumbles_lost"),
                fantasy_points_ppr: f64_at(ds, row, "fantasy_points_ppr"),
            };
            if stat.fantasy_points_ppr == 0.0 {
                stat.fantasy_points_ppr = crate::domain::ppr_points(
                    stat.passing_yards,
                    stat.passing_tds,
                    stat.rushing_yards,
                    stat.rushing_tds,
                    stat.receiving_yards,
                    stat.receiving_tds,
                    stat.receptions,
                    stat.interceptions,
                    stat.fumbles_lost,
                );
            }
            stat
        })
        .collect()
}

fn snaps_from_dataset(ds: &Dataset, season: i32) -> Vec<SnapCount> {
    (0..ds.len())
        .map(|row| SnapCount {
            player_id: text_at(ds, row, "player_id"),
            season,
            week: f64_at(ds, row, "week") as i32,
            snap_count: f64_at(ds, row, "snap_count"),
            snap_share: f64_at(ds, row, "snap_share"),
            team_total_snaps: f64_at(ds, row, "team_total_snaps"),
        })
        .collect()
}

fn injuries_from_dataset(ds: &Dataset, season: i32) -> Vec<InjuryReport> {
    (0..ds.len())
        .map(|row| {
            let raw = text_at(ds, row, "raw_status");
            InjuryReport {
                player_id: text_at(ds, row, "player_id"),
                season,
                week: f64_at(ds, row, "week") as i32,
                status: InjuryStatus::decode(&raw),
                raw_status: raw,
                report_time: text_at(ds, row, "report_time")
                    .parse::<DateTime<Utc>>()
                    .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
            }
        })
        .collect()
}

fn lines_from_dataset(ds: &Dataset, season: i32) -> Vec<GameLine> {
    (0..ds.len())
        .map(|row| GameLine {
            game_id: text_at(ds, row, "game_id"),
            season,
            week: f64_at(ds, row, "week") as i32,
            home_team: text_at(ds, row, "home_team"),
            away_team: text_at(ds, row, "away_team"),
            total: opt_f64_at(ds, row, "total"),
            home_spread: opt_f64_at(ds, row, "home_spread"),
            home_moneyline: opt_f64_at(ds, row, "home_moneyline"),
            away_moneyline: opt_f64_at(ds, row, "away_moneyline"),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_with_injuries(reports: Vec<InjuryReport>) -> DataSnapshot {
        DataSnapshot {
            season: 2025,
            profiles: Vec::new(),
            stats: Vec::new(),
            snaps: Vec::new(),
            injuries: reports,
            schedule: Vec::new(),
            game_lines: Vec::new(),
            features: HashMap::new(),
            loaded_at: Utc::now(),
        }
    }

    fn report(player_id: &str, week: i32, status: InjuryStatus) -> InjuryReport {
        InjuryReport {
            player_id: player_id.to_string(),
            season: 2025,
            week,
            status,
            raw_status: status.as_str().to_string(),
            report_time: Utc::now(),
        }
    }

    #[test]
    fn future_week_falls_back_to_latest_report() {
        let snap = snapshot_with_injuries(vec![report("p1", 8, InjuryStatus::Out)]);
        assert_eq!(snap.injury_status("p1", 10), InjuryStatus::Out);
    }

    #[test]
    fn covered_week_without_report_means_active() {
        let snap = snapshot_with_injuries(vec![
            report("p1", 5, InjuryStatus::Out),
            report("p2", 6, InjuryStatus::Questionable),
        ]);
        // Week 5 is covered; p2 has no report there
        assert_eq!(snap.injury_status("p2", 5), InjuryStatus::Active);
    }

    #[test]
    fn uncovered_past_week_means_active() {
        let snap = snapshot_with_injuries(vec![report("p1", 8, InjuryStatus::Out)]);
        // Week 3 is before coverage began; future data must not leak back
        assert_eq!(snap.injury_status("p1", 3), InjuryStatus::Active);
    }

    #[test]
    fn no_reports_at_all_means_active() {
        let snap = snapshot_with_injuries(Vec::new());
        assert_eq!(snap.injury_status("anyone", 4), InjuryStatus::Active);
    }
}
