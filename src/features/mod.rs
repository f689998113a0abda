pub mod store;

pub use store::{
    feature_names, FactTables, FeatureRow, FEAT_OPP_DEF_POINTS_RANK, FEAT_OPP_DEF_YARDS_RANK,
    FEAT_ROLLING_FANTASY_AVG, FEAT_ROLLING_RUSH_ATTEMPTS, FEAT_ROLLING_SNAP_SHARE,
    FEAT_ROLLING_TARGETS, FEAT_SEASON_AVG, FEAT_VEGAS_IMPLIED_TOTAL,
};
