pub mod loader;
pub mod orchestrator;
pub mod reconciler;
pub mod steps;
pub mod strategy;

pub use orchestrator::{EtlMode, EtlOrchestrator, EtlReport, StepReport};
pub use reconciler::{ColumnChange, LiveColumn, TableSchema};
pub use strategy::{LoadAction, LoadMode, TableState};
