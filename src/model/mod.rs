pub mod scorer;

pub use scorer::{ModelBundle, ScorerArtifact};
