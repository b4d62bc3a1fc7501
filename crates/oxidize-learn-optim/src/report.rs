use oxidize_learn_core::Float;
use serde::{Deserialize, Serialize};

/// Lifecycle of an optimization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Initial,
    Iterating,
    Converged,
    IterationLimitReached,
    Cancelled,
}

impl RunState {
    /// Whether the run has stopped, for any reason.
    pub fn is_terminal(self) -> bool {
        !matches!(self, RunState::Initial | RunState::Iterating)
    }
}

/// Outcome of [`OptimizationAlgorithm::run`](crate::OptimizationAlgorithm::run).
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport<T: Float> {
    pub state: RunState,
    /// Completed outer iterations.
    pub iterations: usize,
    /// Regularized cost seen at the start of the last iteration, if any
    /// cost was evaluated.
    pub final_cost: Option<T>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!RunState::Initial.is_terminal());
        assert!(!RunState::Iterating.is_terminal());
        for state in [RunState::Converged, RunState::IterationLimitReached, RunState::Cancelled] {
            assert!(state.is_terminal());
        }
    }

    #[test]
    fn test_state_serde() {
        let json = serde_json::to_string(&RunState::IterationLimitReached).unwrap();
        assert_eq!(json, r#""iteration_limit_reached""#);
    }
}
