// src/dag/report.rs

//! Inspectable result of a graph run.

use std::time::{Duration, Instant};

use crate::errors::{EngineError, ExecutionError, Result};
use crate::types::{NodeRunState, Outcome};

/// What happened to one node during a run.
#[derive(Debug, Clone)]
pub struct NodeReport {
    pub name: String,
    pub state: NodeRunState,
    /// Outcome returned by the command, if it succeeded.
    pub outcome: Option<Outcome>,
    /// When the command started executing (after a worker became free).
    pub started_at: Option<Instant>,
    pub finished_at: Option<Instant>,
    /// Rendered error for failed nodes.
    pub error: Option<String>,
}

impl NodeReport {
    pub(crate) fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: NodeRunState::Pending,
            outcome: None,
            started_at: None,
            finished_at: None,
            error: None,
        }
    }

    pub fn duration(&self) -> Option<Duration> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some(end.saturating_duration_since(start)),
            _ => None,
        }
    }
}

/// Per-node record of a whole graph run, returned once every node has
/// reached a terminal state.
#[derive(Debug)]
pub struct RunReport {
    nodes: Vec<NodeReport>,
    failures: Vec<ExecutionError>,
    cancelled: bool,
    started_at: Instant,
    finished_at: Instant,
}

impl RunReport {
    pub(crate) fn new(
        nodes: Vec<NodeReport>,
        failures: Vec<ExecutionError>,
        cancelled: bool,
        started_at: Instant,
    ) -> Self {
        Self {
            nodes,
            failures,
            cancelled,
            started_at,
            finished_at: Instant::now(),
        }
    }

    pub fn nodes(&self) -> &[NodeReport] {
        &self.nodes
    }

    /// First node called `name`.
    pub fn node(&self, name: &str) -> Option<&NodeReport> {
        self.nodes.iter().find(|node| node.name == name)
    }

    pub fn state_of(&self, name: &str) -> Option<NodeRunState> {
        self.node(name).map(|node| node.state)
    }

    /// Names of the nodes that actually executed, ordered by start time.
    pub fn executed_in_order(&self) -> Vec<&str> {
        let mut started: Vec<&NodeReport> = self
            .nodes
            .iter()
            .filter(|node| node.started_at.is_some())
            .collect();
        started.sort_by_key(|node| node.started_at);
        started.into_iter().map(|node| node.name.as_str()).collect()
    }

    pub fn count_in(&self, state: NodeRunState) -> usize {
        self.nodes.iter().filter(|node| node.state == state).count()
    }

    pub fn failures(&self) -> &[ExecutionError] {
        &self.failures
    }

    pub fn was_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Every node succeeded and the run was not cancelled.
    pub fn is_success(&self) -> bool {
        !self.cancelled && self.nodes.iter().all(|n| n.state == NodeRunState::Succeeded)
    }

    pub fn elapsed(&self) -> Duration {
        self.finished_at.saturating_duration_since(self.started_at)
    }

    /// Turn the report into the result of
    /// [`GraphScheduler::execute`](super::GraphScheduler::execute).
    ///
    /// Cancellation takes precedence over node failures.
    pub fn into_outcome(mut self) -> Result<Outcome> {
        if self.cancelled {
            return Err(EngineError::Cancelled {
                report: Box::new(self),
            });
        }

        if !self.failures.is_empty() {
            let failures = std::mem::take(&mut self.failures);
            return Err(EngineError::GraphFailed {
                failures,
                report: Box::new(self),
            });
        }

        Ok(Outcome::Finished)
    }
}
