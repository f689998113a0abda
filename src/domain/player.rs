use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::InjuryStatus;

/// Offensive positions tracked by the stat feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Position {
    QB,
    RB,
    WR,
    TE,
    FB,
}

impl Position {
    pub fn as_str(&self) -> &'static str {
        match self {
            Position::QB => "QB",
            Position::RB => "RB",
            Position::WR => "WR",
            Position::TE => "TE",
            Position::FB => "FB",
        }
    }

    /// Positions the prediction models cover
    pub fn is_fantasy_relevant(&self) -> bool {
        matches!(
            self,
            Position::QB | Position::RB | Position::WR | Position::TE
        )
    }

    /// Role bucket whose snaps/targets a teammate absence redistributes within
    pub fn usage_group(&self) -> UsageGroup {
        match self {
            Position::QB => UsageGroup::Passer,
            Position::RB | Position::FB => UsageGroup::Backfield,
            Position::WR | Position::TE => UsageGroup::Receiver,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for Position {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.trim().to_uppercase().as_str() {
            "QB" => Ok(Position::QB),
            "RB" | "HB" => Ok(Position::RB),
            "WR" => Ok(Position::WR),
            "TE" => Ok(Position::TE),
            "FB" => Ok(Position::FB),
            other => Err(format!("Unknown position: {}", other)),
        }
    }
}

/// Usage-overlapping position groups for the boost heuristic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UsageGroup {
    Passer,
    Backfield,
    Receiver,
}

impl UsageGroup {
    /// Lifts differ by how concentrated the vacated workload is:
    /// a missing QB/RB vacates a larger, less divisible share than a
    /// missing receiver.
    pub fn is_primary(&self) -> bool {
        matches!(self, UsageGroup::Passer | UsageGroup::Backfield)
    }
}

/// Player identity and roster attributes.
///
/// `player_id` is the stable external key (gsis id); team and status
/// attributes are refreshed on every profile load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub player_id: String,
    pub name: String,
    pub position: Position,
    pub team: String,
    pub status: InjuryStatus,
    pub age: Option<i32>,
    pub years_exp: Option<i32>,
    pub draft_year: Option<i32>,
    pub draft_number: Option<i32>,
    pub headshot_url: Option<String>,
}

impl PlayerProfile {
    pub fn draft_label(&self) -> String {
        match (self.draft_year, self.draft_number) {
            (Some(year), Some(number)) => format!("Pick {} ({})", number, year),
            _ => "Undrafted".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_from_str() {
        assert_eq!(Position::try_from("qb").unwrap(), Position::QB);
        assert_eq!(Position::try_from(" TE ").unwrap(), Position::TE);
        assert_eq!(Position::try_from("HB").unwrap(), Position::RB);
        assert!(Position::try_from("K").is_err());
    }

    #[test]
    fn usage_groups_overlap_wr_te() {
        assert_eq!(Position::WR.usage_group(), Position::TE.usage_group());
        assert_ne!(Position::RB.usage_group(), Position::WR.usage_group());
        assert_eq!(Position::FB.usage_group(), Position::RB.usage_group());
    }

    #[test]
    fn draft_label_formats() {
        let mut p = PlayerProfile {
            player_id: "00-0030000".into(),
            name: "Test Player".into(),
            position: Position::RB,
            team: "NO".into(),
            status: InjuryStatus::Active,
            age: Some(27),
            years_exp: Some(5),
            draft_year: Some(2020),
            draft_number: Some(12),
            headshot_url: None,
        };
        assert_eq!(p.draft_label(), "Pick 12 (2020)");
        p.draft_number = None;
        assert_eq!(p.draft_label(), "Undrafted");
    }
}
