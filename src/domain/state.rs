use serde::{Deserialize, Serialize};
use std::fmt;

/// ETL run state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EtlRunState {
    /// Run created, no step started yet
    Pending,
    /// Executing the step at this index
    Running(usize),
    /// All steps finished without a fatal step failure
    Completed,
    /// A step failed and the remaining sequence was halted
    Failed,
    /// Another run held the lock; nothing was executed
    Skipped,
}

impl EtlRunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EtlRunState::Pending => "PENDING",
            EtlRunState::Running(_) => "RUNNING",
            EtlRunState::Completed => "COMPLETED",
            EtlRunState::Failed => "FAILED",
            EtlRunState::Skipped => "SKIPPED",
        }
    }

    /// Check if this state can transition to another state
    pub fn can_transition_to(&self, target: EtlRunState) -> bool {
        use EtlRunState::*;

        match (self, target) {
            (Pending, Running(0)) => true,
            (Pending, Skipped) => true,
            // Steps advance strictly forward
            (Running(i), Running(j)) => j == i + 1,
            (Running(_), Completed) => true,
            (Running(_), Failed) => true,
            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EtlRunState::Completed | EtlRunState::Failed | EtlRunState::Skipped
        )
    }
}

impl fmt::Display for EtlRunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EtlRunState::Running(i) => write!(f, "RUNNING(step {})", i),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

/// Per-step outcome within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    Ok,
    Failed,
    /// Not executed: either halted by an earlier failure or its source was absent
    Skipped,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Ok => "OK",
            StepStatus::Failed => "FAILED",
            StepStatus::Skipped => "SKIPPED",
        }
    }
}

/// Startup decision, resolved exactly once at process start.
///
/// `Bootstrap` blocks serving until the first ETL run finishes so requests
/// never hit a half-populated store; `Refresh` dispatches ETL in the
/// background and serves the existing data immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapDecision {
    Bootstrap,
    Refresh,
}

impl BootstrapDecision {
    /// Resolve from a probe of the weekly stats table.
    pub fn resolve(store_populated: bool, sync_allowed: bool) -> Self {
        if !store_populated && sync_allowed {
            BootstrapDecision::Bootstrap
        } else {
            BootstrapDecision::Refresh
        }
    }

    pub fn blocks_serving(&self) -> bool {
        matches!(self, BootstrapDecision::Bootstrap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        use EtlRunState::*;

        assert!(Pending.can_transition_to(Running(0)));
        assert!(Pending.can_transition_to(Skipped));
        assert!(Running(0).can_transition_to(Running(1)));
        assert!(Running(3).can_transition_to(Running(4)));
        assert!(Running(6).can_transition_to(Completed));
        assert!(Running(2).can_transition_to(Failed));

        // Steps never skip ahead or rewind
        assert!(!Running(0).can_transition_to(Running(2)));
        assert!(!Running(3).can_transition_to(Running(3)));
        assert!(!Running(3).can_transition_to(Running(2)));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Running(0)));
        assert!(!Failed.can_transition_to(Running(0)));
    }

    #[test]
    fn test_terminal_states() {
        assert!(EtlRunState::Completed.is_terminal());
        assert!(EtlRunState::Failed.is_terminal());
        assert!(EtlRunState::Skipped.is_terminal());
        assert!(!EtlRunState::Pending.is_terminal());
        assert!(!EtlRunState::Running(1).is_terminal());
    }

    #[test]
    fn bootstrap_only_when_empty_and_allowed() {
        assert_eq!(
            BootstrapDecision::resolve(false, true),
            BootstrapDecision::Bootstrap
        );
        assert_eq!(
            BootstrapDecision::resolve(true, true),
            BootstrapDecision::Refresh
        );
        // Config flag disables the synchronous path even on an empty store
        assert_eq!(
            BootstrapDecision::resolve(false, false),
            BootstrapDecision::Refresh
        );
        assert!(BootstrapDecision::Bootstrap.blocks_serving());
        assert!(!BootstrapDecision::Refresh.blocks_serving());
    }
}
