use serde::{Deserialize, Serialize};

/// One scheduled (or played) game.
///
/// Scores and lines stay null until the game resolves / lines release.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleGame {
    pub game_id: String,
    pub season: i32,
    pub week: i32,
    pub home_team: String,
    pub away_team: String,
    pub home_score: Option<f64>,
    pub away_score: Option<f64>,
    pub home_moneyline: Option<f64>,
    pub spread_line: Option<f64>,
    pub total_line: Option<f64>,
}

impl ScheduleGame {
    pub fn involves(&self, team: &str) -> bool {
        self.home_team == team || self.away_team == team
    }

    pub fn opponent_of(&self, team: &str) -> Option<&str> {
        if self.home_team == team {
            Some(&self.away_team)
        } else if self.away_team == team {
            Some(&self.home_team)
        } else {
            None
        }
    }

    pub fn is_played(&self) -> bool {
        self.home_score.is_some() && self.away_score.is_some()
    }

    /// Points the given team allowed, if the game is played.
    pub fn points_allowed_by(&self, team: &str) -> Option<f64> {
        if self.home_team == team {
            self.away_score
        } else if self.away_team == team {
            self.home_score
        } else {
            None
        }
    }
}

/// Game-level betting snapshot. Latest snapshot replaces prior within a week.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameLine {
    pub game_id: String,
    pub season: i32,
    pub week: i32,
    pub home_team: String,
    pub away_team: String,
    /// Over/under total for the game
    pub total: Option<f64>,
    /// Spread from the home team's perspective (negative = home favored)
    pub home_spread: Option<f64>,
    pub home_moneyline: Option<f64>,
    pub away_moneyline: Option<f64>,
}

impl GameLine {
    /// Spread from `team`'s perspective, when the line is out.
    pub fn spread_for(&self, team: &str) -> Option<f64> {
        let s = self.home_spread?;
        if self.home_team == team {
            Some(s)
        } else if self.away_team == team {
            Some(-s)
        } else {
            None
        }
    }

    /// Vegas implied team total: (game total / 2) - (team spread / 2).
    pub fn implied_total_for(&self, team: &str) -> Option<f64> {
        let total = self.total?;
        let spread = self.spread_for(team)?;
        Some(total / 2.0 - spread / 2.0)
    }
}

/// Player prop snapshot (line + implied probability).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerProp {
    pub player_id: String,
    pub season: i32,
    pub week: i32,
    pub prop_type: String,
    pub line: f64,
    pub odds: Option<f64>,
    pub implied_prob: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line() -> GameLine {
        GameLine {
            game_id: "2025_10_NO_ATL".into(),
            season: 2025,
            week: 10,
            home_team: "NO".into(),
            away_team: "ATL".into(),
            total: Some(44.0),
            home_spread: Some(-3.0),
            home_moneyline: None,
            away_moneyline: None,
        }
    }

    #[test]
    fn spread_flips_for_away_team() {
        let l = line();
        assert_eq!(l.spread_for("NO"), Some(-3.0));
        assert_eq!(l.spread_for("ATL"), Some(3.0));
        assert_eq!(l.spread_for("DAL"), None);
    }

    #[test]
    fn implied_total_favors_the_favorite() {
        let l = line();
        // home favored by 3 on a 44 total: 22 + 1.5 = 23.5
        assert_eq!(l.implied_total_for("NO"), Some(23.5));
        assert_eq!(l.implied_total_for("ATL"), Some(20.5));
    }

    #[test]
    fn points_allowed_by_side() {
        let game = ScheduleGame {
            game_id: "2025_03_NO_ATL".into(),
            season: 2025,
            week: 3,
            home_team: "NO".into(),
            away_team: "ATL".into(),
            home_score: Some(27.0),
            away_score: Some(13.0),
            home_moneyline: None,
            spread_line: None,
            total_line: None,
        };
        assert_eq!(game.points_allowed_by("NO"), Some(13.0));
        assert_eq!(game.points_allowed_by("ATL"), Some(27.0));
        assert_eq!(game.opponent_of("NO"), Some("ATL"));
    }
}
