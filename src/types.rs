use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Signal returned by a command.
///
/// In a [`LinearChain`](crate::LinearChain), `Continue` delegates to the next
/// command and `Finished` stops the chain. The graph scheduler records the
/// outcome per node but always runs every node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Outcome {
    #[default]
    Continue,
    Finished,
}

impl Outcome {
    /// Map the boolean "processing complete" signal onto an outcome
    /// (`true` stops the chain).
    pub fn from_stop(stop: bool) -> Self {
        if stop { Outcome::Finished } else { Outcome::Continue }
    }

    /// Whether this outcome stops a linear chain.
    pub fn stops(self) -> bool {
        matches!(self, Outcome::Finished)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Continue => f.write_str("continue"),
            Outcome::Finished => f.write_str("finished"),
        }
    }
}

/// State of a single node within one graph run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRunState {
    /// Waiting for predecessors.
    Pending,
    /// Submitted to the worker pool.
    Running,
    Succeeded,
    Failed,
    /// Not executed because an upstream node failed under
    /// [`FailurePolicy::SkipDependents`].
    Skipped,
    /// Not executed because the run was cancelled or the scheduler shut down.
    Cancelled,
}

impl NodeRunState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, NodeRunState::Pending | NodeRunState::Running)
    }
}

/// What happens to the dependents of a node whose command failed.
///
/// - `Continue`: the failed node still counts as complete for its dependents,
///   which run as usual (default).
/// - `SkipDependents`: every transitive dependent that has not started yet is
///   marked skipped and never executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    #[default]
    Continue,
    SkipDependents,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "continue" => Ok(FailurePolicy::Continue),
            "skip_dependents" | "skip-dependents" => Ok(FailurePolicy::SkipDependents),
            other => Err(format!(
                "invalid failure_policy: {other} (expected \"continue\" or \"skip_dependents\")"
            )),
        }
    }
}
