//! Load strategy selection.
//!
//! Each step declares a mode; the effective action also depends on the
//! target table's current existence and row count. The decision itself is
//! pure so it can be tested without a database.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared per-step load mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadMode {
    /// Treat an existing non-empty table as already seeded; otherwise create+load
    IfMissing,
    /// Reconcile schema, then upsert rows by primary key (idempotent re-runs)
    SmartAppend,
    /// Truncate and reload; for reference tables where the source is authoritative
    Replace,
}

impl LoadMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadMode::IfMissing => "if_missing",
            LoadMode::SmartAppend => "smart_append",
            LoadMode::Replace => "replace",
        }
    }
}

impl fmt::Display for LoadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Current state of a target table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableState {
    pub exists: bool,
    pub row_count: i64,
}

impl TableState {
    pub fn missing() -> Self {
        Self {
            exists: false,
            row_count: 0,
        }
    }

    pub fn seeded(&self) -> bool {
        self.exists && self.row_count > 0
    }
}

/// Effective action for one table load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadAction {
    /// No writes at all
    Skip,
    /// Create the table from the dataset's schema and bulk insert
    CreateLoad,
    /// Reconcile schema, then upsert by primary key
    ReconcileUpsert,
    /// Reconcile schema, then truncate and reload in one transaction.
    /// Reconciliation runs BEFORE truncation: a structural conflict must
    /// abort while the existing rows are still intact.
    ReconcileReplace,
}

/// Decide the effective action for a table.
pub fn decide(mode: LoadMode, state: TableState) -> LoadAction {
    match mode {
        LoadMode::IfMissing => {
            if state.seeded() {
                LoadAction::Skip
            } else {
                LoadAction::CreateLoad
            }
        }
        LoadMode::SmartAppend => {
            if state.exists {
                LoadAction::ReconcileUpsert
            } else {
                LoadAction::CreateLoad
            }
        }
        LoadMode::Replace => {
            if state.exists {
                LoadAction::ReconcileReplace
            } else {
                LoadAction::CreateLoad
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn if_missing_skips_seeded_table() {
        let state = TableState {
            exists: true,
            row_count: 120,
        };
        assert_eq!(decide(LoadMode::IfMissing, state), LoadAction::Skip);
    }

    #[test]
    fn if_missing_loads_empty_or_absent_table() {
        let empty = TableState {
            exists: true,
            row_count: 0,
        };
        assert_eq!(decide(LoadMode::IfMissing, empty), LoadAction::CreateLoad);
        assert_eq!(
            decide(LoadMode::IfMissing, TableState::missing()),
            LoadAction::CreateLoad
        );
    }

    #[test]
    fn smart_append_upserts_existing() {
        let state = TableState {
            exists: true,
            row_count: 0,
        };
        assert_eq!(
            decide(LoadMode::SmartAppend, state),
            LoadAction::ReconcileUpsert
        );
        assert_eq!(
            decide(LoadMode::SmartAppend, TableState::missing()),
            LoadAction::CreateLoad
        );
    }

    #[test]
    fn replace_reconciles_before_truncating() {
        let state = TableState {
            exists: true,
            row_count: 53,
        };
        assert_eq!(
            decide(LoadMode::Replace, state),
            LoadAction::ReconcileReplace
        );
        assert_eq!(
            decide(LoadMode::Replace, TableState::missing()),
            LoadAction::CreateLoad
        );
    }

    #[test]
    fn mode_round_trips_as_str() {
        assert_eq!(LoadMode::SmartAppend.as_str(), "smart_append");
        assert_eq!(LoadMode::IfMissing.as_str(), "if_missing");
        assert_eq!(LoadMode::Replace.as_str(), "replace");
    }
}
