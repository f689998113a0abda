use chrono::{DateTime, Utc};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::config::AppConfig;
use crate::error::Result;
use crate::model::ModelBundle;
use crate::store::{DataSnapshot, Store};

/// Shared application state for API handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub store: Arc<Store>,

    /// Current data snapshot. Refreshes build a new snapshot and swap
    /// the inner Arc; in-flight requests keep reading the one they
    /// cloned, so no reader ever observes a half-refreshed mix.
    pub snapshot: Arc<RwLock<Arc<DataSnapshot>>>,

    /// Trained scorers, loaded once at startup and immutable after
    pub models: Arc<ModelBundle>,

    /// Application configuration
    pub config: Arc<AppConfig>,

    /// In-process guard so the trigger endpoint can answer 409 without
    /// waiting on the database advisory lock
    pub etl_running: Arc<AtomicBool>,

    /// Application start time
    pub start_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        store: Arc<Store>,
        snapshot: DataSnapshot,
        models: Arc<ModelBundle>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            store,
            snapshot: Arc::new(RwLock::new(Arc::new(snapshot))),
            models,
            config,
            etl_running: Arc::new(AtomicBool::new(false)),
            start_time: Utc::now(),
        }
    }

    /// Cheap clone of the current snapshot.
    pub async fn current_snapshot(&self) -> Arc<DataSnapshot> {
        self.snapshot.read().await.clone()
    }

    /// Build a fresh snapshot and swap it in. On failure the previous
    /// snapshot keeps serving; a failed refresh must never take down
    /// the read path.
    pub async fn refresh_snapshot(&self) -> Result<()> {
        match self.load_snapshot().await {
            Ok(fresh) => {
                *self.snapshot.write().await = Arc::new(fresh);
                info!("Snapshot refreshed");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Snapshot refresh failed; serving previous data");
                Err(e)
            }
        }
    }

    /// Load from the store, falling back to flat files when the store is
    /// unreachable and the fallback toggle is set.
    pub async fn load_snapshot(&self) -> Result<DataSnapshot> {
        let season = self.config.etl.season;
        match DataSnapshot::build(&self.store, season).await {
            Ok(snapshot) => Ok(snapshot),
            Err(e) if self.config.etl.allow_csv_fallback => {
                error!(error = %e, "Store unreachable; falling back to flat files");
                DataSnapshot::from_csv_dir(
                    &self.config.etl.source_dir,
                    season,
                    self.config.prediction.rolling_window,
                )
            }
            Err(e) => Err(e),
        }
    }
}
