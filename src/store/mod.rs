pub mod postgres;
pub mod snapshot;

pub use postgres::{Store, ETL_LOCK_KEY};
pub use snapshot::DataSnapshot;
