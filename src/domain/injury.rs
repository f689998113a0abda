use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Injury designation, decoded once at ingestion from the raw report text.
///
/// Every downstream consumer (boost heuristic, serving badges) matches on
/// this enum; nothing re-interprets the free-text status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InjuryStatus {
    Active,
    Questionable,
    Doubtful,
    Out,
    InjuredReserve,
    Pup,
    Suspended,
    Unknown,
}

impl InjuryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InjuryStatus::Active => "Active",
            InjuryStatus::Questionable => "Questionable",
            InjuryStatus::Doubtful => "Doubtful",
            InjuryStatus::Out => "Out",
            InjuryStatus::InjuredReserve => "IR",
            InjuryStatus::Pup => "PUP",
            InjuryStatus::Suspended => "Suspended",
            InjuryStatus::Unknown => "Unknown",
        }
    }

    /// Statuses that take the player off the field for the week.
    pub fn rules_out(&self) -> bool {
        matches!(
            self,
            InjuryStatus::Out
                | InjuryStatus::Doubtful
                | InjuryStatus::InjuredReserve
                | InjuryStatus::Pup
        )
    }

    /// Decode a raw report or roster status string.
    ///
    /// Accepts both injury-report wording ("Out", "Doubtful") and roster
    /// transaction codes ("RES", "NON", "SUS", "ACT").
    pub fn decode(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "active" | "act" | "healthy" | "" => InjuryStatus::Active,
            "questionable" | "q" => InjuryStatus::Questionable,
            "doubtful" | "d" => InjuryStatus::Doubtful,
            "out" | "o" | "inactive" | "non" => InjuryStatus::Out,
            "ir" | "injured reserve" | "res" | "reserve" => InjuryStatus::InjuredReserve,
            "pup" | "physically unable to perform" => InjuryStatus::Pup,
            "suspended" | "sus" => InjuryStatus::Suspended,
            _ => InjuryStatus::Unknown,
        }
    }
}

impl fmt::Display for InjuryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single weekly injury report row.
///
/// Duplicates for the same (player, week) are collapsed at ingestion:
/// the most recent `report_time` wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InjuryReport {
    pub player_id: String,
    pub season: i32,
    pub week: i32,
    pub status: InjuryStatus,
    pub raw_status: String,
    pub report_time: DateTime<Utc>,
}
