pub mod boost;
pub mod engine;

pub use boost::{BoostOutcome, BoostParams};
pub use engine::{Prediction, PredictionEngine};
