use thiserror::Error;

/// Main error type for the prediction service
#[derive(Error, Debug)]
pub enum GridironError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    // Schema evolution errors
    #[error("Schema conflict on {table}.{column}: incoming {incoming} is incompatible with existing {existing}")]
    SchemaConflict {
        table: String,
        column: String,
        incoming: String,
        existing: String,
    },

    #[error("Load strategy abort on {table}: {reason}")]
    LoadStrategyAbort { table: String, reason: String },

    // ETL errors
    #[error("ETL step '{step}' failed: {reason}")]
    StepFailed { step: String, reason: String },

    #[error("ETL run already in progress")]
    EtlInProgress,

    // Prediction errors
    #[error("Prediction unavailable for {player_id}: {reason}")]
    PredictionUnavailable { player_id: String, reason: String },

    #[error("Player not found: {0}")]
    PlayerNotFound(String),

    #[error("Feature row not found for {player_id} week {week}")]
    FeatureRowNotFound { player_id: String, week: i32 },

    // Model artifact errors
    #[error("Model artifact error: {0}")]
    ModelArtifact(String),

    // Ingestion errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid source data: {0}")]
    InvalidSource(String),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for GridironError
pub type Result<T> = std::result::Result<T, GridironError>;

impl GridironError {
    /// Errors that fail a single table/step without poisoning the rest of the run.
    pub fn is_step_scoped(&self) -> bool {
        matches!(
            self,
            GridironError::SchemaConflict { .. }
                | GridironError::LoadStrategyAbort { .. }
                | GridironError::InvalidSource(_)
                | GridironError::Csv(_)
        )
    }

    /// Errors scoped to a single player's prediction, non-fatal to a batch.
    pub fn is_player_scoped(&self) -> bool {
        matches!(
            self,
            GridironError::PredictionUnavailable { .. }
                | GridironError::PlayerNotFound(_)
                | GridironError::FeatureRowNotFound { .. }
        )
    }
}
