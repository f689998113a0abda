//! Per-player-week feature computation.
//!
//! A pure function of the fact tables: re-running for the same key over
//! the same rows always yields the same output, which is what lets the
//! orchestrator regenerate the feature table after any upstream
//! correction. Nothing here writes anywhere.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::domain::{GameLine, PlayerProfile, Position, ScheduleGame, SnapCount, WeeklyStat};
use crate::ingest::{ColumnType, Dataset, Value};

pub const FEAT_ROLLING_FANTASY_AVG: &str = "rolling_4wk_fantasy_avg";
pub const FEAT_SEASON_AVG: &str = "season_avg_points";
pub const FEAT_ROLLING_SNAP_SHARE: &str = "rolling_4wk_snap_share";
pub const FEAT_ROLLING_TARGETS: &str = "rolling_4wk_targets";
pub const FEAT_ROLLING_RUSH_ATTEMPTS: &str = "rolling_4wk_rush_attempts";
pub const FEAT_OPP_DEF_POINTS_RANK: &str = "opp_defense_points_rank";
pub const FEAT_OPP_DEF_YARDS_RANK: &str = "opp_defense_yards_rank";
pub const FEAT_VEGAS_IMPLIED_TOTAL: &str = "vegas_implied_total";

/// All feature columns, in table order.
pub fn feature_names() -> &'static [&'static str] {
    &[
        FEAT_ROLLING_FANTASY_AVG,
        FEAT_SEASON_AVG,
        FEAT_ROLLING_SNAP_SHARE,
        FEAT_ROLLING_TARGETS,
        FEAT_ROLLING_RUSH_ATTEMPTS,
        FEAT_OPP_DEF_POINTS_RANK,
        FEAT_OPP_DEF_YARDS_RANK,
        FEAT_VEGAS_IMPLIED_TOTAL,
    ]
}

/// Computed features for one (player, season, week).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureRow {
    pub player_id: String,
    pub season: i32,
    pub week: i32,
    pub team: String,
    pub opponent: String,
    pub position: Position,
    pub values: BTreeMap<String, f64>,
}

impl FeatureRow {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }
}

/// Borrowed view over the loaded fact tables.
#[derive(Debug, Clone, Copy)]
pub struct FactTables<'a> {
    pub profiles: &'a [PlayerProfile],
    pub stats: &'a [WeeklyStat],
    pub snaps: &'a [SnapCount],
    pub schedule: &'a [ScheduleGame],
    pub game_lines: &'a [GameLine],
}

impl<'a> FactTables<'a> {
    /// Last week with any recorded stats, 0 when the store is fresh.
    pub fn last_stat_week(&self) -> i32 {
        self.stats.iter().map(|s| s.week).max().unwrap_or(0)
    }
}

/// Compute features for every fantasy-relevant player, weeks 1 through
/// the first upcoming week (last stat week + 1).
pub fn compute_all(facts: &FactTables, season: i32, window: usize) -> Vec<FeatureRow> {
    let through_week = facts.last_stat_week() + 1;
    let stats_by_player = index_stats(facts.stats);
    let snaps_by_player = index_snaps(facts.snaps);
    let ranks = DefenseRanks::build(facts, through_week);

    let mut rows = Vec::new();
    for profile in facts.profiles {
        if !profile.position.is_fantasy_relevant() {
            continue;
        }
        let history = stats_by_player
            .get(profile.player_id.as_str())
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let snap_history = snaps_by_player
            .get(profile.player_id.as_str())
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        for week in 1..=through_week {
            if let Some(row) =
                compute_row(facts, profile, history, snap_history, &ranks, season, week, window)
            {
                rows.push(row);
            }
        }
    }
    rows
}

/// Compute one feature row; `None` on a bye week (no scheduled game).
#[allow(clippy::too_many_arguments)]
fn compute_row(
    facts: &FactTables,
    profile: &PlayerProfile,
    history: &[&WeeklyStat],
    snap_history: &[&SnapCount],
    ranks: &DefenseRanks,
    season: i32,
    week: i32,
    window: usize,
) -> Option<FeatureRow> {
    let game = facts
        .schedule
        .iter()
        .find(|g| g.week == week && g.involves(&profile.team))?;
    let opponent = game.opponent_of(&profile.team)?.to_string();

    let prior: Vec<&WeeklyStat> = history.iter().filter(|s| s.week < week).copied().collect();

    let mut values = BTreeMap::new();
    values.insert(
        FEAT_ROLLING_FANTASY_AVG.to_string(),
        rolling_fantasy_avg(&prior, window),
    );
    values.insert(FEAT_SEASON_AVG.to_string(), season_avg(&prior));
    values.insert(
        FEAT_ROLLING_SNAP_SHARE.to_string(),
        rolling_snap_share(snap_history, week, window),
    );
    values.insert(
        FEAT_ROLLING_TARGETS.to_string(),
        rolling_mean(&prior, window, |s| s.targets),
    );
    values.insert(
        FEAT_ROLLING_RUSH_ATTEMPTS.to_string(),
        rolling_mean(&prior, window, |s| s.rush_attempts),
    );

    let (points_rank, yards_rank) = ranks.for_team(week, &opponent);
    values.insert(FEAT_OPP_DEF_POINTS_RANK.to_string(), points_rank);
    values.insert(FEAT_OPP_DEF_YARDS_RANK.to_string(), yards_rank);

    let implied = facts
        .game_lines
        .iter()
        .find(|l| l.week == week && (l.home_team == profile.team || l.away_team == profile.team))
        .and_then(|l| l.implied_total_for(&profile.team))
        .unwrap_or(0.0);
    values.insert(FEAT_VEGAS_IMPLIED_TOTAL.to_string(), implied);

    Some(FeatureRow {
        player_id: profile.player_id.clone(),
        season,
        week,
        team: profile.team.clone(),
        opponent,
        position: profile.position,
        values,
    })
}

/// Mean of the last `window` non-zero fantasy scores before the target
/// week; falls back to the plain season average when no non-zero game
/// exists. The non-zero filter keeps DNP weeks from dragging a healthy
/// player's baseline to the floor.
fn rolling_fantasy_avg(prior: &[&WeeklyStat], window: usize) -> f64 {
    let mut recent: Vec<f64> = Vec::with_capacity(window);
    let mut sorted: Vec<&WeeklyStat> = prior.to_vec();
    sorted.sort_by_key(|s| std::cmp::Reverse(s.week));
    for stat in sorted {
        if stat.fantasy_points_ppr > 0.0 {
            recent.push(stat.fantasy_points_ppr);
            if recent.len() >= window {
                break;
            }
        }
    }
    if recent.is_empty() {
        season_avg(prior)
    } else {
        recent.iter().sum::<f64>() / recent.len() as f64
    }
}

fn season_avg(prior: &[&WeeklyStat]) -> f64 {
    if prior.is_empty() {
        return 0.0;
    }
    prior.iter().map(|s| s.fantasy_points_ppr).sum::<f64>() / prior.len() as f64
}

/// Trailing snap share over the last `window` weeks with actual snaps.
/// Zero-snap and absent weeks are excluded so a single missed game
/// doesn't crater a starter's usage signal. Also consulted by the
/// usage-boost heuristic for teammate materiality.
pub fn rolling_snap_share(snap_history: &[&SnapCount], week: i32, window: usize) -> f64 {
    let mut shares: Vec<f64> = Vec::with_capacity(window);
    let mut sorted: Vec<&SnapCount> = snap_history
        .iter()
        .filter(|s| s.week < week && s.snap_share > 0.0)
        .copied()
        .collect();
    sorted.sort_by_key(|s| std::cmp::Reverse(s.week));
    for snap in sorted.into_iter().take(window) {
        shares.push(snap.snap_share);
    }
    if shares.is_empty() {
        0.0
    } else {
        shares.iter().sum::<f64>() / shares.len() as f64
    }
}

fn rolling_mean<F: Fn(&WeeklyStat) -> f64>(prior: &[&WeeklyStat], window: usize, f: F) -> f64 {
    let mut sorted: Vec<&WeeklyStat> = prior.to_vec();
    sorted.sort_by_key(|s| std::cmp::Reverse(s.week));
    let taken: Vec<f64> = sorted.into_iter().take(window).map(f).collect();
    if taken.is_empty() {
        0.0
    } else {
        taken.iter().sum::<f64>() / taken.len() as f64
    }
}

/// Defense strength ranks per week, 1..32 ascending by points/yards
/// allowed (1 = stingiest). Aggregated from schedule scores and the
/// opposing offenses' yardage. Teams without a played game rank 0,
/// mirroring the unavailable-context imputation the feature set has
/// always used.
struct DefenseRanks {
    // week -> team -> (points_rank, yards_rank)
    by_week: HashMap<i32, HashMap<String, (f64, f64)>>,
}

impl DefenseRanks {
    fn build(facts: &FactTables, through_week: i32) -> Self {
        let mut by_week = HashMap::new();

        for week in 1..=through_week {
            // Cumulative per-team allowances over games strictly before `week`
            let mut points: HashMap<String, Vec<f64>> = HashMap::new();
            let mut yards: HashMap<String, Vec<f64>> = HashMap::new();

            for game in facts.schedule.iter().filter(|g| g.week < week) {
                for team in [game.home_team.as_str(), game.away_team.as_str()] {
                    if let Some(pa) = game.points_allowed_by(team) {
                        points.entry(team.to_string()).or_default().push(pa);
                    }
                }
            }

            let mut yards_per_team_week: HashMap<(String, i32), f64> = HashMap::new();
            for stat in facts.stats.iter().filter(|s| s.week < week) {
                // Yardage gained against `opponent_team` counts as allowed.
                // Receiving duplicates passing, so only pass + rush sum.
                *yards_per_team_week
                    .entry((stat.opponent_team.clone(), stat.week))
                    .or_default() += stat.passing_yards + stat.rushing_yards;
            }
            for ((team, _), total) in yards_per_team_week {
                yards.entry(team).or_default().push(total);
            }

            let points_ranked = rank_ascending(&points);
            let yards_ranked = rank_ascending(&yards);

            let mut combined: HashMap<String, (f64, f64)> = HashMap::new();
            for (team, rank) in points_ranked {
                combined.entry(team).or_insert((0.0, 0.0)).0 = rank;
            }
            for (team, rank) in yards_ranked {
                combined.entry(team).or_insert((0.0, 0.0)).1 = rank;
            }
            by_week.insert(week, combined);
        }

        Self { by_week }
    }

    fn for_team(&self, week: i32, team: &str) -> (f64, f64) {
        self.by_week
            .get(&week)
            .and_then(|m| m.get(team))
            .copied()
            .unwrap_or((0.0, 0.0))
    }
}

/// Rank teams 1..N ascending by mean allowed value; ties break on team
/// name for determinism.
fn rank_ascending(per_team: &HashMap<String, Vec<f64>>) -> Vec<(String, f64)> {
    let mut means: Vec<(String, f64)> = per_team
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(team, v)| (team.clone(), v.iter().sum::<f64>() / v.len() as f64))
        .collect();
    means.sort_by(|a, b| {
        a.1.partial_cmp(&b.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    means
        .into_iter()
        .enumerate()
        .map(|(i, (team, _))| (team, (i + 1) as f64))
        .collect()
}

fn index_stats(stats: &[WeeklyStat]) -> HashMap<&str, Vec<&WeeklyStat>> {
    let mut map: HashMap<&str, Vec<&WeeklyStat>> = HashMap::new();
    for s in stats {
        map.entry(s.player_id.as_str()).or_default().push(s);
    }
    map
}

fn index_snaps(snaps: &[SnapCount]) -> HashMap<&str, Vec<&SnapCount>> {
    let mut map: HashMap<&str, Vec<&SnapCount>> = HashMap::new();
    for s in snaps {
        map.entry(s.player_id.as_str()).or_default().push(s);
    }
    map
}

/// Render computed rows as a loadable dataset for the feature table.
pub fn to_dataset(rows: &[FeatureRow]) -> Dataset {
    let mut columns = vec![
        ("player_id", ColumnType::Text),
        ("season", ColumnType::Integer),
        ("week", ColumnType::Integer),
        ("team", ColumnType::Text),
        ("opponent", ColumnType::Text),
        ("position", ColumnType::Text),
    ];
    for name in feature_names() {
        columns.push((name, ColumnType::Float));
    }

    let mut data = Vec::with_capacity(rows.len());
    for row in rows {
        let mut record = vec![
            Value::Text(row.player_id.clone()),
            Value::Integer(row.season as i64),
            Value::Integer(row.week as i64),
            Value::Text(row.team.clone()),
            Value::Text(row.opponent.clone()),
            Value::Text(row.position.as_str().to_string()),
        ];
        for name in feature_names() {
            record.push(Value::Float(row.get(name).unwrap_or(0.0)));
        }
        data.push(record);
    }

    Dataset {
        columns: columns
            .into_iter()
            .map(|(name, col_type)| crate::ingest::Column {
                name: name.to_string(),
                col_type,
            })
            .collect(),
        rows: data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::InjuryStatus;

    fn profile(id: &str, pos: Position, team: &str) -> PlayerProfile {
        PlayerProfile {
            player_id: id.to_string(),
            name: format!("Player {}", id),
            position: pos,
            team: team.to_string(),
            status: InjuryStatus::Active,
            age: None,
            years_exp: None,
            draft_year: None,
            draft_number: None,
            headshot_url: None,
        }
    }

    fn stat(id: &str, week: i32, team: &str, opp: &str, pts: f64) -> WeeklyStat {
        WeeklyStat {
            player_id: id.to_string(),
            season: 2025,
            week,
            team: team.to_string(),
            opponent_team: opp.to_string(),
            fantasy_points_ppr: pts,
            ..Default::default()
        }
    }

    fn game(week: i32, home: &str, away: &str, hs: f64, as_: f64) -> ScheduleGame {
        ScheduleGame {
            game_id: format!("2025_{:02}_{}_{}", week, away, home),
            season: 2025,
            week,
            home_team: home.to_string(),
            away_team: away.to_string(),
            home_score: Some(hs),
            away_score: Some(as_),
            home_moneyline: None,
            spread_line: None,
            total_line: None,
        }
    }

    fn snap(id: &str, week: i32, share: f64) -> SnapCount {
        SnapCount {
            player_id: id.to_string(),
            season: 2025,
            week,
            snap_count: share * 65.0,
            snap_share: share,
            team_total_snaps: 65.0,
        }
    }

    #[test]
    fn rolling_avg_skips_zero_games() {
        let stats = [
            stat("p1", 1, "NO", "ATL", 10.0),
            stat("p1", 2, "NO", "CAR", 0.0), // DNP
            stat("p1", 3, "NO", "TB", 14.0),
            stat("p1", 4, "NO", "ATL", 18.0),
            stat("p1", 5, "NO", "LA", 6.0),
        ];
        let prior: Vec<&WeeklyStat> = stats.iter().collect();
        // last 4 non-zero: 6, 18, 14, 10 -> 12.0
        let avg = rolling_fantasy_avg(&prior, 4);
        assert!((avg - 12.0).abs() < 1e-9);
    }

    #[test]
    fn rolling_avg_falls_back_to_season_avg() {
        let stats = [stat("p1", 1, "NO", "ATL", 0.0)];
        let prior: Vec<&WeeklyStat> = stats.iter().collect();
        assert_eq!(rolling_fantasy_avg(&prior, 4), 0.0);
    }

    #[test]
    fn snap_share_fallback_ignores_zero_weeks() {
        let snaps = [snap("p1", 1, 0.8), snap("p1", 2, 0.0), snap("p1", 3, 0.6)];
        let history: Vec<&SnapCount> = snaps.iter().collect();
        // week 4: zero-snap week 2 excluded -> (0.8 + 0.6) / 2
        let share = rolling_snap_share(&history, 4, 4);
        assert!((share - 0.7).abs() < 1e-9);
    }

    #[test]
    fn defense_ranks_ascend_by_points_allowed() {
        let schedule = vec![
            game(1, "NO", "ATL", 27.0, 13.0), // NO allowed 13, ATL allowed 27
            game(1, "TB", "CAR", 20.0, 17.0), // TB allowed 17, CAR allowed 20
        ];
        let facts = FactTables {
            profiles: &[],
            stats: &[],
            snaps: &[],
            schedule: &schedule,
            game_lines: &[],
        };
        let ranks = DefenseRanks::build(&facts, 2);
        assert_eq!(ranks.for_team(2, "NO").0, 1.0);
        assert_eq!(ranks.for_team(2, "TB").0, 2.0);
        assert_eq!(ranks.for_team(2, "CAR").0, 3.0);
        assert_eq!(ranks.for_team(2, "ATL").0, 4.0);
        // Unknown team imputes 0
        assert_eq!(ranks.for_team(2, "DAL"), (0.0, 0.0));
    }

    #[test]
    fn recomputation_is_deterministic() {
        let profiles = vec![profile("p1", Position::RB, "NO")];
        let stats = vec![
            stat("p1", 1, "NO", "ATL", 12.0),
            stat("p1", 2, "NO", "TB", 16.0),
        ];
        let schedule = vec![
            game(1, "NO", "ATL", 27.0, 13.0),
            game(2, "TB", "NO", 17.0, 20.0),
            ScheduleGame {
                game_id: "2025_03_CAR_NO".into(),
                season: 2025,
                week: 3,
                home_team: "NO".into(),
                away_team: "CAR".into(),
                home_score: None,
                away_score: None,
                home_moneyline: None,
                spread_line: None,
                total_line: None,
            },
        ];
        let facts = FactTables {
            profiles: &profiles,
            stats: &stats,
            snaps: &[],
            schedule: &schedule,
            game_lines: &[],
        };
        let a = compute_all(&facts, 2025, 4);
        let b = compute_all(&facts, 2025, 4);
        assert_eq!(a.len(), b.len());
        assert_eq!(a.len(), 3); // weeks 1..=3
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.values, y.values);
        }
        // Week 3 rolling average sees weeks 1-2
        let wk3 = a.iter().find(|r| r.week == 3).unwrap();
        assert!((wk3.get(FEAT_ROLLING_FANTASY_AVG).unwrap() - 14.0).abs() < 1e-9);
        assert_eq!(wk3.opponent, "CAR");
    }

    #[test]
    fn feature_dataset_has_key_and_feature_columns() {
        let profiles = vec![profile("p1", Position::WR, "NO")];
        let stats = vec![stat("p1", 1, "NO", "ATL", 9.0)];
        let schedule = vec![game(1, "NO", "ATL", 27.0, 13.0), game(2, "ATL", "NO", 0.0, 0.0)];
        let facts = FactTables {
            profiles: &profiles,
            stats: &stats,
            snaps: &[],
            schedule: &schedule,
            game_lines: &[],
        };
        let rows = compute_all(&facts, 2025, 4);
        let ds = to_dataset(&rows);
        assert!(ds.has_column("player_id"));
        assert!(ds.has_column(FEAT_ROLLING_FANTASY_AVG));
        assert!(ds.has_column(FEAT_VEGAS_IMPLIED_TOTAL));
        assert_eq!(ds.len(), rows.len());
    }
}
