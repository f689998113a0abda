pub mod injury;
pub mod player;
pub mod schedule;
pub mod state;
pub mod stats;

pub use injury::{InjuryReport, InjuryStatus};
pub use player::{PlayerProfile, Position, UsageGroup};
pub use schedule::{GameLine, PlayerProp, ScheduleGame};
pub use state::{BootstrapDecision, EtlRunState, StepStatus};
pub use stats::{ppr_points, SnapCount, WeeklyStat};
