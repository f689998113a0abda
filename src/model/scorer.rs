//! Trained scorer artifacts (CPU-only inference).
//!
//! The training job is an external supplier; what it ships is a JSON
//! artifact per position carrying the feature manifest, the weights of a
//! small linear-or-one-hidden-layer regressor trained on the *signed
//! deviation* from the rolling baseline, and the low quantile of its
//! training residuals (used for the floor estimate).
//!
//! Design goals:
//! - Stable, deterministic, dependency-light.
//! - Explicit shape validation (fail fast, caller can fail closed).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::domain::Position;
use crate::error::{GridironError, Result};

/// Optional single hidden layer (tanh).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HiddenLayer {
    /// Weights shape: [hidden_dim][input_dim]
    pub weights: Vec<Vec<f64>>,
    /// Bias shape: [hidden_dim]
    pub bias: Vec<f64>,
    /// Output weights shape: [hidden_dim]
    pub output_weights: Vec<f64>,
}

/// One deserialized scorer artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScorerArtifact {
    /// Feature manifest: the named features this scorer requires, in
    /// input order. Prediction fails closed when any is unavailable.
    pub feature_names: Vec<String>,
    /// Linear weights, one per manifest feature (input layer when a
    /// hidden layer is present).
    pub weights: Vec<f64>,
    pub bias: f64,
    #[serde(default)]
    pub hidden: Option<HiddenLayer>,
    /// Low quantile of train-time residuals; negative by construction.
    #[serde(default)]
    pub residual_low_quantile: f64,
    /// Optional free-form metadata (versioning, training info, etc).
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl ScorerArtifact {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        let artifact: Self = serde_json::from_str(&content)?;
        artifact.validate().map_err(GridironError::ModelArtifact)?;
        Ok(artifact)
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.feature_names.is_empty() {
            return Err("feature_names must not be empty".to_string());
        }

        match &self.hidden {
            None => {
                if self.weights.len() != self.feature_names.len() {
                    return Err(format!(
                        "weights len {} != manifest len {}",
                        self.weights.len(),
                        self.feature_names.len()
                    ));
                }
            }
            Some(h) => {
                if h.weights.is_empty() {
                    return Err("hidden.weights must not be empty".to_string());
                }
                if h.bias.len() != h.weights.len() {
                    return Err(format!(
                        "hidden.bias len {} != hidden_dim {}",
                        h.bias.len(),
                        h.weights.len()
                    ));
                }
                if h.output_weights.len() != h.weights.len() {
                    return Err(format!(
                        "hidden.output_weights len {} != hidden_dim {}",
                        h.output_weights.len(),
                        h.weights.len()
                    ));
                }
                for (i, row) in h.weights.iter().enumerate() {
                    if row.len() != self.feature_names.len() {
                        return Err(format!(
                            "hidden.weights row {} len {} != manifest len {}",
                            i,
                            row.len(),
                            self.feature_names.len()
                        ));
                    }
                }
            }
        }

        if self.residual_low_quantile > 0.0 {
            return Err("residual_low_quantile must be <= 0".to_string());
        }

        let all_weights = self.weights.iter().chain(
            self.hidden
                .iter()
                .flat_map(|h| h.weights.iter().flatten().chain(&h.bias).chain(&h.output_weights)),
        );
        for w in all_weights {
            if !w.is_finite() {
                return Err("weights contain non-finite values".to_string());
            }
        }

        Ok(())
    }

    /// Predict the signed deviation for one ordered input vector.
    pub fn predict(&self, input: &[f64]) -> Result<f64> {
        if input.len() != self.feature_names.len() {
            return Err(GridironError::Validation(format!(
                "scorer input dim mismatch: got {}, expected {}",
                input.len(),
                self.feature_names.len()
            )));
        }

        match &self.hidden {
            None => {
                let mut sum = self.bias;
                for (w, x) in self.weights.iter().zip(input) {
                    sum += w * x;
                }
                Ok(sum)
            }
            Some(h) => {
                let mut sum = self.bias;
                for ((row, b), out_w) in h.weights.iter().zip(&h.bias).zip(&h.output_weights) {
                    let mut pre = *b;
                    for (w, x) in row.iter().zip(input) {
                        pre += w * x;
                    }
                    sum += out_w * pre.tanh();
                }
                Ok(sum)
            }
        }
    }
}

/// All scorers loaded at startup, immutable for the process lifetime.
/// A reload means building a new bundle and restarting.
#[derive(Debug, Clone, Default)]
pub struct ModelBundle {
    scorers: HashMap<Position, ScorerArtifact>,
    meta: Option<ScorerArtifact>,
}

impl ModelBundle {
    /// Load `deviation_<POS>.json` for each modeled position plus an
    /// optional `meta.json` from the artifact directory. A missing
    /// position artifact is tolerated; players at that position are
    /// simply unpredictable; a missing meta-model is the normal case.
    pub fn load_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let mut scorers = HashMap::new();

        for pos in [Position::QB, Position::RB, Position::WR, Position::TE] {
            let path = dir.join(format!("deviation_{}.json", pos.as_str()));
            if path.exists() {
                let artifact = ScorerArtifact::from_file(&path)?;
                tracing::info!(position = %pos, path = %path.display(), "Loaded scorer");
                scorers.insert(pos, artifact);
            } else {
                tracing::warn!(position = %pos, "No scorer artifact; position unpredictable");
            }
        }

        let meta_path = dir.join("meta.json");
        let meta = if meta_path.exists() {
            let artifact = ScorerArtifact::from_file(&meta_path)?;
            tracing::info!("Loaded meta-model");
            Some(artifact)
        } else {
            None
        };

        Ok(Self { scorers, meta })
    }

    pub fn for_position(&self, position: Position) -> Option<&ScorerArtifact> {
        self.scorers.get(&position)
    }

    pub fn meta(&self) -> Option<&ScorerArtifact> {
        self.meta.as_ref()
    }

    pub fn loaded_positions(&self) -> Vec<Position> {
        let mut positions: Vec<Position> = self.scorers.keys().copied().collect();
        positions.sort_by_key(|p| p.as_str());
        positions
    }

    #[cfg(test)]
    pub fn for_tests(scorers: HashMap<Position, ScorerArtifact>, meta: Option<ScorerArtifact>) -> Self {
        Self { scorers, meta }
    }
}
