pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod etl;
pub mod features;
pub mod ingest;
pub mod model;
pub mod predict;
pub mod services;
pub mod store;

pub use config::AppConfig;
pub use error::{GridironError, Result};
pub use etl::{EtlMode, EtlOrchestrator, EtlReport};
pub use features::{FactTables, FeatureRow};
pub use model::ModelBundle;
pub use predict::{Prediction, PredictionEngine};
pub use store::{DataSnapshot, Store};
