//! Usage-boost heuristic.
//!
//! A serving-time adjustment: when a usage-overlapping teammate is ruled
//! out for the week and was a material part of the offense, the player's
//! projection understates their opportunity. The lift is additive and
//! capped so the heuristic can nudge the model's output, never dominate
//! it. Nothing here is persisted.

use crate::config::PredictionConfig;
use crate::domain::PlayerProfile;
use crate::store::DataSnapshot;

#[derive(Debug, Clone)]
pub struct BoostParams {
    /// Trailing snap share below which an absent teammate is immaterial
    pub min_snap_share: f64,
    /// Additive lift when the vacated role is QB/RB
    pub lift_primary: f64,
    /// Additive lift when the vacated role is WR/TE
    pub lift_secondary: f64,
    /// Lift is clamped to this fraction of the unboosted estimate
    pub max_fraction: f64,
    /// Trailing window (weeks) for the snap-share average
    pub window: usize,
}

impl BoostParams {
    pub fn from_config(config: &PredictionConfig) -> Self {
        Self {
            min_snap_share: config.boost_min_snap_share,
            lift_primary: config.boost_lift_primary,
            lift_secondary: config.boost_lift_secondary,
            max_fraction: config.boost_max_fraction,
            window: config.rolling_window,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BoostOutcome {
    pub boosted: bool,
    pub lift: f64,
    pub reason: Option<String>,
}

impl BoostOutcome {
    fn none() -> Self {
        Self::default()
    }
}

/// Evaluate the boost for one player/week against an unboosted estimate.
///
/// Self-status strictly overrides: a player who is themselves ruled out
/// never shows a boost, no matter how many teammates qualify.
pub fn evaluate(
    snapshot: &DataSnapshot,
    player: &PlayerProfile,
    week: i32,
    base_estimate: f64,
    params: &BoostParams,
) -> BoostOutcome {
    if snapshot.injury_status(&player.player_id, week).rules_out() {
        return BoostOutcome::none();
    }
    if base_estimate <= 0.0 {
        return BoostOutcome::none();
    }

    // The most material qualifying absence wins; ties break on player id
    // so repeated evaluations agree.
    let mut best: Option<(&PlayerProfile, f64)> = None;
    for mate in snapshot.usage_group_teammates(player) {
        let status = snapshot.injury_status(&mate.player_id, week);
        if !status.rules_out() {
            continue;
        }
        let share = snapshot.trailing_snap_share(&mate.player_id, week, params.window);
        if share < params.min_snap_share {
            continue;
        }
        let better = match best {
            None => true,
            Some((incumbent, best_share)) => {
                share > best_share || (share == best_share && mate.player_id < incumbent.player_id)
            }
        };
        if better {
            best = Some((mate, share));
        }
    }

    let (mate, share) = match best {
        Some(found) => found,
        None => return BoostOutcome::none(),
    };

    let raw_lift = if player.position.usage_group().is_primary() {
        params.lift_primary
    } else {
        params.lift_secondary
    };
    let lift = raw_lift.min(params.max_fraction * base_estimate);

    BoostOutcome {
        boosted: true,
        lift,
        reason: Some(format!(
            "{} ({}) {} at {:.0}% trailing snap share",
            mate.name,
            mate.position,
            snapshot.injury_status(&mate.player_id, week),
            share * 100.0
        )),
    }
}
