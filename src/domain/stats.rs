use serde::{Deserialize, Serialize};

/// One player's offensive line for a single week.
///
/// Keyed by (player_id, season, week). Re-writable intra-week as stat
/// corrections arrive; final once the week closes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeeklyStat {
    pub player_id: String,
    pub season: i32,
    pub week: i32,
    pub team: String,
    pub opponent_team: String,
    pub passing_yards: f64,
    pub passing_tds: f64,
    pub interceptions: f64,
    pub pass_attempts: f64,
    pub rushing_yards: f64,
    pub rushing_tds: f64,
    pub rush_attempts: f64,
    pub receiving_yards: f64,
    pub receiving_tds: f64,
    pub receptions: f64,
    pub targets: f64,
    pub fumbles_lost: f64,
    /// Raw PPR points from the feed when present, otherwise derived
    pub fantasy_points_ppr: f64,
}

impl WeeklyStat {
    pub fn touches(&self) -> f64 {
        self.rush_attempts + self.receptions
    }

    pub fn total_yards(&self) -> f64 {
        self.passing_yards + self.rushing_yards + self.receiving_yards
    }
}

/// Standard PPR scoring.
pub fn ppr_points(
    passing_yards: f64,
    passing_tds: f64,
    rushing_yards: f64,
    rushing_tds: f64,
    receiving_yards: f64,
    receiving_tds: f64,
    receptions: f64,
    interceptions: f64,
    fumbles_lost: f64,
) -> f64 {
    passing_yards * 0.04
        + passing_tds * 4.0
        + rushing_yards * 0.1
        + rushing_tds * 6.0
        + receiving_yards * 0.1
        + receiving_tds * 6.0
        + receptions * 1.0
        - interceptions * 2.0
        - fumbles_lost * 2.0
}

/// Weekly snap participation for one player.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapCount {
    pub player_id: String,
    pub season: i32,
    pub week: i32,
    pub snap_count: f64,
    /// Share of the team's offensive snaps, 0..1
    pub snap_share: f64,
    pub team_total_snaps: f64,
}
