pub mod scheduler;

pub use scheduler::spawn_daily_etl;

use std::sync::Arc;

use crate::api::AppState;
use crate::error::Result;
use crate::etl::{EtlMode, EtlOrchestrator, EtlReport};

/// Run one ETL pass and, when it committed anything, swap in a fresh
/// snapshot. Shared by the scheduler, the trigger endpoint and startup.
pub async fn run_etl_and_refresh(state: &AppState, mode: EtlMode) -> Result<EtlReport> {
    let orchestrator = EtlOrchestrator::new(
        Arc::clone(&state.store),
        state.config.etl.clone(),
        state.config.prediction.rolling_window,
    );

    let report = orchestrator.run(mode).await?;

    // Even a halted run may have committed earlier steps; refresh unless
    // nothing ran at all. A failed refresh keeps the previous snapshot.
    if report.state != crate::domain::EtlRunState::Skipped {
        let _ = state.refresh_snapshot().await;
    }

    Ok(report)
}
