//! Deviation prediction engine.
//!
//! The scorer predicts the *signed deviation* from the player's rolling
//! baseline, not the raw total. The decomposition is deliberate: one
//! scorer generalizes across players of very different baseline usage,
//! and an uncertain model degrades toward the rolling average instead of
//! producing wild absolute outliers.

use serde::Serialize;

use crate::config::PredictionConfig;
use crate::domain::InjuryStatus;
use crate::error::{GridironError, Result};
use crate::features::{FeatureRow, FEAT_ROLLING_FANTASY_AVG};
use crate::model::{ModelBundle, ScorerArtifact};
use crate::predict::boost::{self, BoostParams};
use crate::store::DataSnapshot;

/// One served projection.
#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    pub player_id: String,
    pub player_name: String,
    pub position: String,
    pub team: String,
    pub opponent: String,
    pub week: i32,
    pub predicted_points: f64,
    /// Conservative lower estimate, always <= predicted_points
    pub floor: f64,
    pub baseline: f64,
    pub deviation: f64,
    pub meta_adjusted: bool,
    pub is_injury_boosted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boost_reason: Option<String>,
    pub injury_status: InjuryStatus,
}

pub struct PredictionEngine<'a> {
    snapshot: &'a DataSnapshot,
    models: &'a ModelBundle,
    config: &'a PredictionConfig,
}

impl<'a> PredictionEngine<'a> {
    pub fn new(
        snapshot: &'a DataSnapshot,
        models: &'a ModelBundle,
        config: &'a PredictionConfig,
    ) -> Self {
        Self {
            snapshot,
            models,
            config,
        }
    }

    /// Produce the projection for one player/week.
    ///
    /// Fails closed: a missing manifest feature yields
    /// `PredictionUnavailable`, never an imputed zero; callers must
    /// treat it as "no projection".
    pub fn predict(&self, player_id: &str, week: i32) -> Result<Prediction> {
        let profile = self
            .snapshot
            .profile(player_id)
            .ok_or_else(|| GridironError::PlayerNotFound(player_id.to_string()))?;

        let scorer = self
            .models
            .for_position(profile.position)
            .ok_or_else(|| GridironError::PredictionUnavailable {
                player_id: player_id.to_string(),
                reason: format!("no trained scorer for position {}", profile.position),
            })?;

        let row = self.snapshot.feature_row(player_id, week).ok_or_else(|| {
            GridironError::PredictionUnavailable {
                player_id: player_id.to_string(),
                reason: format!("no feature row for week {}", week),
            }
        })?;

        let inputs = self.manifest_inputs(scorer, row, player_id)?;
        let baseline = row.get(FEAT_ROLLING_FANTASY_AVG).ok_or_else(|| {
            GridironError::PredictionUnavailable {
                player_id: player_id.to_string(),
                reason: format!("missing required feature '{}'", FEAT_ROLLING_FANTASY_AVG),
            }
        })?;

        let deviation = scorer.predict(&inputs)?;
        let base_estimate = (baseline + deviation).max(0.0);

        // Ecosystem-aware re-score when the meta-model shipped. Its
        // absence (or a missing context signal) leaves the base
        // prediction standing, by design.
        let (estimate, meta_adjusted) = match self.meta_estimate(base_estimate, row) {
            Some(adjusted) => (adjusted, true),
            None => (base_estimate, false),
        };

        let floor = (estimate + scorer.residual_low_quantile)
            .max(0.0)
            .min(estimate);

        let params = BoostParams::from_config(self.config);
        let outcome = boost::evaluate(self.snapshot, profile, week, estimate, &params);
        let predicted_points = estimate + outcome.lift;

        Ok(Prediction {
            player_id: player_id.to_string(),
            player_name: profile.name.clone(),
            position: profile.position.as_str().to_string(),
            team: profile.team.clone(),
            opponent: row.opponent.clone(),
            week,
            predicted_points: round2(predicted_points),
            floor: round2(floor),
            baseline: round2(baseline),
            deviation: round2(deviation),
            meta_adjusted,
            is_injury_boosted: outcome.boosted,
            boost_reason: outcome.reason,
            injury_status: self.snapshot.injury_status(player_id, week),
        })
    }

    /// Projections for every eligible player in a week, worst-first
    /// errors dropped: per-player failures are non-fatal to the batch.
    pub fn rankings(&self, week: i32, position: Option<&str>) -> Vec<Prediction> {
        let mut predictions: Vec<Prediction> = self
            .snapshot
            .profiles
            .iter()
            .filter(|p| p.position.is_fantasy_relevant())
            .filter(|p| position.map_or(true, |pos| p.position.as_str() == pos))
            .filter_map(|p| self.predict(&p.player_id, week).ok())
            .collect();
        predictions.sort_by(|a, b| {
            b.predicted_points
                .partial_cmp(&a.predicted_points)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        predictions
    }

    fn manifest_inputs(
        &self,
        scorer: &ScorerArtifact,
        row: &FeatureRow,
        player_id: &str,
    ) -> Result<Vec<f64>> {
        scorer
            .feature_names
            .iter()
            .map(|name| {
                row.get(name)
                    .ok_or_else(|| GridironError::PredictionUnavailable {
                        player_id: player_id.to_string(),
                        reason: format!("missing required feature '{}'", name),
                    })
            })
            .collect()
    }

    fn meta_estimate(&self, base_estimate: f64, row: &FeatureRow) -> Option<f64> {
        let meta = self.models.meta()?;
        let inputs: Option<Vec<f64>> = meta
            .feature_names
            .iter()
            .map(|name| {
                if name == "base_prediction" {
                    Some(base_estimate)
                } else {
                    row.get(name)
                }
            })
            .collect();
        let estimate = meta.predict(&inputs?).ok()?;
        Some(estimate.max(0.0))
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
