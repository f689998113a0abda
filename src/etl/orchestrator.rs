//! ETL run sequencing.
//!
//! One run walks the fixed step order, applying reconciliation and the
//! declared load strategy per table. A step failure halts the remaining
//! sequence but leaves committed steps committed; re-running later only
//! has to redo the failed step onward, which the idempotent load modes
//! make safe. An advisory lock guarantees a single run at a time; a run
//! that finds the lock held skips instead of interleaving writes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::EtlConfig;
use crate::domain::{EtlRunState, StepStatus};
use crate::error::{GridironError, Result};
use crate::etl::steps::{self, StepKind, TableLoad};
use crate::etl::{loader, reconciler, strategy};
use crate::features;
use crate::ingest::Dataset;
use crate::store::{DataSnapshot, Store};

/// How a run was invoked.
#[derive(Debug, Clone)]
pub enum EtlMode {
    /// Load from the configured source directory
    Full,
    /// Load the same CSV shapes from a caller-supplied directory
    Import(PathBuf),
}

/// Effective per-step action, for the run report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepAction {
    Created,
    Upserted,
    Replaced,
    SkippedExisting,
    SourceMissing,
    SourceEmpty,
    FeaturesRebuilt,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReport {
    pub name: String,
    pub action: StepAction,
    pub rows_affected: u64,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepReport {
    fn halted(name: &str) -> Self {
        Self {
            name: name.to_string(),
            action: StepAction::SourceMissing,
            rows_affected: 0,
            status: StepStatus::Skipped,
            error: Some("halted by earlier step failure".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EtlReport {
    pub run_id: Uuid,
    pub state: EtlRunState,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub steps: Vec<StepReport>,
}

impl EtlReport {
    pub fn succeeded(&self) -> bool {
        self.state == EtlRunState::Completed
    }
}

pub struct EtlOrchestrator {
    store: Arc<Store>,
    config: EtlConfig,
    /// Rolling window used when rebuilding the feature table
    feature_window: usize,
}

impl EtlOrchestrator {
    pub fn new(store: Arc<Store>, config: EtlConfig, feature_window: usize) -> Self {
        Self {
            store,
            config,
            feature_window,
        }
    }

    /// Execute a full run. Returns `Skipped` (not an error) when another
    /// run holds the lock.
    pub async fn run(&self, mode: EtlMode) -> Result<EtlReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let source_dir = match &mode {
            EtlMode::Full => self.config.source_dir.clone(),
            EtlMode::Import(path) => path.clone(),
        };

        if !self.store.try_acquire_etl_lock().await? {
            warn!(%run_id, "Another ETL run is in progress; skipping");
            return Ok(EtlReport {
                run_id,
                state: EtlRunState::Skipped,
                started_at,
                finished_at: Some(Utc::now()),
                steps: Vec::new(),
            });
        }

        info!(%run_id, source = %source_dir.display(), "ETL run started");
        let outcome = self.run_locked(run_id, started_at, &source_dir).await;
        if let Err(e) = self.store.release_etl_lock().await {
            warn!(%run_id, error = %e, "Failed to release ETL lock");
        }

        let report = outcome?;
        if let Err(e) = self.store.record_run(&report).await {
            warn!(%run_id, error = %e, "Failed to record ETL run");
        }
        info!(%run_id, state = %report.state, "ETL run finished");
        Ok(report)
    }

    async fn run_locked(
        &self,
        run_id: Uuid,
        started_at: DateTime<Utc>,
        source_dir: &Path,
    ) -> Result<EtlReport> {
        let pipeline = steps::pipeline(self.config.season);
        let mut state = EtlRunState::Pending;
        let mut reports = Vec::with_capacity(pipeline.len());
        let mut halted = false;

        for (idx, step) in pipeline.iter().enumerate() {
            if halted {
                reports.push(StepReport::halted(step.name));
                continue;
            }

            let next = EtlRunState::Running(idx);
            debug_assert!(state.can_transition_to(next));
            state = next;

            let report = match &step.kind {
                StepKind::Load(loads) => self.run_load_step(step.name, loads, source_dir).await,
                StepKind::BuildFeatures => self.run_feature_step(step.name).await,
            };

            if report.status == StepStatus::Failed {
                error!(step = step.name, error = ?report.error, "ETL step failed; halting sequence");
                halted = true;
            } else {
                info!(
                    step = step.name,
                    action = ?report.action,
                    rows = report.rows_affected,
                    "ETL step done"
                );
            }
            reports.push(report);
        }

        let final_state = if halted {
            EtlRunState::Failed
        } else {
            EtlRunState::Completed
        };
        debug_assert!(state.can_transition_to(final_state));

        Ok(EtlReport {
            run_id,
            state: final_state,
            started_at,
            finished_at: Some(Utc::now()),
            steps: reports,
        })
    }

    /// Load every table of a step. Table errors are isolated from each
    /// other (one bad source never corrupts a sibling table), but any
    /// table failure fails the step as a whole.
    async fn run_load_step(
        &self,
        name: &str,
        loads: &[TableLoad],
        source_dir: &Path,
    ) -> StepReport {
        let mut rows_affected = 0;
        let mut action = StepAction::SourceMissing;
        let mut loaded_any = false;
        let mut errors: Vec<String> = Vec::new();

        for load in loads {
            let path = source_dir.join(&load.file);
            if !path.exists() {
                warn!(table = %load.table, file = %load.file, "Source file missing; skipping table");
                continue;
            }

            match self.load_table(load, &path).await {
                Ok((table_action, rows)) => {
                    rows_affected += rows;
                    action = table_action;
                    loaded_any = true;
                }
                Err(e) => {
                    error!(table = %load.table, error = %e, "Table load failed");
                    errors.push(format!("{}: {}", load.table, e));
                }
            }
        }

        let status = if !errors.is_empty() {
            StepStatus::Failed
        } else if loaded_any {
            StepStatus::Ok
        } else {
            StepStatus::Skipped
        };

        StepReport {
            name: name.to_string(),
            action,
            rows_affected,
            status,
            error: if errors.is_empty() {
                None
            } else {
                Some(errors.join("; "))
            },
        }
    }

    async fn load_table(&self, load: &TableLoad, path: &Path) -> Result<(StepAction, u64)> {
        let mut dataset = Dataset::from_csv_path(path)?;
        if let Some(prepare) = load.prepare {
            prepare(&mut dataset)?;
        }
        if dataset.is_empty() {
            warn!(table = %load.table, "Source parsed to zero rows; nothing loaded");
            return Ok((StepAction::SourceEmpty, 0));
        }
        self.load_dataset(&load.table, load.mode, &load.key, &dataset)
            .await
    }

    /// Apply strategy + reconciliation + the physical load for one table.
    async fn load_dataset(
        &self,
        table: &str,
        mode: strategy::LoadMode,
        key: &[&str],
        dataset: &Dataset,
    ) -> Result<(StepAction, u64)> {
        let pool = self.store.pool();
        let state = self.store.table_state(table).await?;

        match strategy::decide(mode, state) {
            strategy::LoadAction::Skip => Ok((StepAction::SkippedExisting, 0)),

            strategy::LoadAction::CreateLoad => {
                // The table may exist empty (a prior run created it and
                // failed before loading); reconcile instead of recreating.
                let types = match reconciler::load_live_schema(pool, table).await? {
                    Some(live) => {
                        let changes = reconciler::plan(&live, &dataset.columns)?;
                        reconciler::apply(pool, table, &changes).await?;
                        reconciler::effective_types(&live, &dataset.columns)
                    }
                    None => {
                        loader::create_table(pool, table, dataset, key).await?;
                        dataset
                            .columns
                            .iter()
                            .map(|c| (c.name.clone(), c.col_type))
                            .collect()
                    }
                };
                let rows = loader::insert_all(pool, table, dataset, &types).await?;
                Ok((StepAction::Created, rows))
            }

            strategy::LoadAction::ReconcileUpsert => {
                let live = reconciler::load_live_schema(pool, table)
                    .await?
                    .ok_or_else(|| {
                        GridironError::Internal(format!("table {} vanished mid-load", table))
                    })?;
                let changes = reconciler::plan(&live, &dataset.columns)?;
                reconciler::apply(pool, table, &changes).await?;
                let types = reconciler::effective_types(&live, &dataset.columns);
                let rows = loader::upsert_all(pool, table, dataset, &types, key).await?;
                Ok((StepAction::Upserted, rows))
            }

            strategy::LoadAction::ReconcileReplace => {
                let live = reconciler::load_live_schema(pool, table)
                    .await?
                    .ok_or_else(|| {
                        GridironError::Internal(format!("table {} vanished mid-load", table))
                    })?;
                // Conflict check runs while the existing rows are intact:
                // never destroy data that can't be reloaded.
                let changes = match reconciler::plan(&live, &dataset.columns) {
                    Ok(changes) => changes,
                    Err(GridironError::SchemaConflict { column, .. }) => {
                        return Err(GridironError::LoadStrategyAbort {
                            table: table.to_string(),
                            reason: format!(
                                "replace blocked: column '{}' is structurally incompatible",
                                column
                            ),
                        });
                    }
                    Err(e) => return Err(e),
                };
                reconciler::apply(pool, table, &changes).await?;
                let types = reconciler::effective_types(&live, &dataset.columns);
                let rows = loader::replace_all(pool, table, dataset, &types).await?;
                Ok((StepAction::Replaced, rows))
            }
        }
    }

    /// Rebuild the derived feature table from what the earlier steps
    /// loaded. Fully recomputable, so it always replaces.
    async fn run_feature_step(&self, name: &str) -> StepReport {
        let season = self.config.season;
        let result: Result<(StepAction, u64)> = async {
            let snapshot = DataSnapshot::build(&self.store, season).await?;
            let rows = features::store::compute_all(&snapshot.facts(), season, self.feature_window);
            let dataset = features::store::to_dataset(&rows);
            if dataset.is_empty() {
                return Ok((StepAction::SourceEmpty, 0));
            }
            self.load_dataset(
                &steps::feature_table(season),
                strategy::LoadMode::Replace,
                &["player_id", "season", "week"],
                &dataset,
            )
            .await
            .map(|(_, rows)| (StepAction::FeaturesRebuilt, rows))
        }
        .await;

        match result {
            Ok((action, rows)) => StepReport {
                name: name.to_string(),
                action,
                rows_affected: rows,
                status: StepStatus::Ok,
                error: None,
            },
            Err(e) => StepReport {
                name: name.to_string(),
                action: StepAction::FeaturesRebuilt,
                rows_affected: 0,
                status: StepStatus::Failed,
                error: Some(e.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn halted_steps_report_skipped() {
        let r = StepReport::halted("betting_lines");
        assert_eq!(r.status, StepStatus::Skipped);
        assert_eq!(r.rows_affected, 0);
        assert!(r.error.as_deref().unwrap().contains("halted"));
    }

    #[test]
    fn report_success_requires_completed_state() {
        let report = EtlReport {
            run_id: Uuid::new_v4(),
            state: EtlRunState::Failed,
            started_at: Utc::now(),
            finished_at: Some(Utc::now()),
            steps: Vec::new(),
        };
        assert!(!report.succeeded());
    }

    #[test]
    fn step_reports_serialize_for_audit() {
        let report = StepReport {
            name: "weekly_stats".to_string(),
            action: StepAction::Upserted,
            rows_affected: 412,
            status: StepStatus::Ok,
            error: None,
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"Upserted\""));
        assert!(!json.contains("error"));
    }
}
