// src/dag/run_state.rs

//! Per-run state machine for a graph run.
//!
//! This is the synchronous core of the scheduler: it owns the live
//! pending-predecessor counters and node states, and answers "which nodes
//! became ready?" whenever a node reaches a terminal state. It performs no
//! IO and knows nothing about Tokio, so every decrement-and-maybe-submit
//! happens in exactly one place.

use tracing::{debug, warn};

use crate::context::Context;
use crate::dag::graph::ValidatedGraph;
use crate::types::{FailurePolicy, NodeRunState};

/// Result of settling one node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SettleStep {
    /// Nodes whose last predecessor just settled; they should be submitted.
    pub newly_ready: Vec<usize>,
    /// Nodes newly marked skipped because of an upstream failure.
    pub newly_skipped: Vec<usize>,
}

#[derive(Debug)]
pub(crate) struct RunState {
    pending: Vec<usize>,
    states: Vec<NodeRunState>,
    dependents: Vec<Vec<usize>>,
    policy: FailurePolicy,
}

impl RunState {
    pub(crate) fn new<C: Context>(graph: &ValidatedGraph<C>, policy: FailurePolicy) -> Self {
        let dependents = (0..graph.len())
            .map(|idx| graph.dependents(idx).collect())
            .collect();

        Self::from_parts(graph.in_degrees().to_vec(), dependents, policy)
    }

    /// `pending[i]` is the in-degree of node `i`, `dependents[i]` its
    /// outgoing edges.
    pub(crate) fn from_parts(
        pending: Vec<usize>,
        dependents: Vec<Vec<usize>>,
        policy: FailurePolicy,
    ) -> Self {
        Self {
            states: vec![NodeRunState::Pending; pending.len()],
            pending,
            dependents,
            policy,
        }
    }

    pub(crate) fn states(&self) -> &[NodeRunState] {
        &self.states
    }

    pub(crate) fn mark_running(&mut self, node: usize) {
        self.states[node] = NodeRunState::Running;
    }

    /// Record that `node` finished executing and propagate completion.
    ///
    /// A failed node still settles its outgoing edges, so its dependents can
    /// never wait forever. Under `SkipDependents` they are skipped instead of
    /// becoming ready.
    ///
    /// Settling a node that is already terminal is a no-op.
    pub(crate) fn complete(&mut self, node: usize, succeeded: bool) -> SettleStep {
        if self.states[node].is_terminal() {
            warn!(node, state = ?self.states[node], "node settled twice; ignoring");
            return SettleStep::default();
        }

        self.states[node] = if succeeded {
            NodeRunState::Succeeded
        } else {
            NodeRunState::Failed
        };

        let skip = !succeeded && self.policy == FailurePolicy::SkipDependents;
        let mut step = SettleStep::default();
        let mut work = vec![node];

        while let Some(settled) = work.pop() {
            for i in 0..self.dependents[settled].len() {
                let dep = self.dependents[settled][i];

                if self.pending[dep] == 0 {
                    warn!(node = dep, "pending predecessor count already zero");
                    continue;
                }
                self.pending[dep] -= 1;

                if self.states[dep] != NodeRunState::Pending {
                    continue;
                }

                if skip {
                    debug!(node = dep, upstream = settled, "skipping dependent of failed node");
                    self.states[dep] = NodeRunState::Skipped;
                    step.newly_skipped.push(dep);
                    work.push(dep);
                } else if self.pending[dep] == 0 {
                    step.newly_ready.push(dep);
                }
            }
        }

        step
    }

    /// Mark a node that was never started as cancelled.
    pub(crate) fn cancel(&mut self, node: usize) {
        if !self.states[node].is_terminal() {
            self.states[node] = NodeRunState::Cancelled;
        }
    }

    /// Mark every node that is still pending as cancelled.
    pub(crate) fn cancel_pending(&mut self) -> Vec<usize> {
        let mut cancelled = Vec::new();
        for (node, state) in self.states.iter_mut().enumerate() {
            if *state == NodeRunState::Pending {
                *state = NodeRunState::Cancelled;
                cancelled.push(node);
            }
        }
        cancelled
    }

    /// Nodes that have not reached a terminal state.
    pub(crate) fn unsettled(&self) -> Vec<usize> {
        self.states
            .iter()
            .enumerate()
            .filter(|(_, state)| !state.is_terminal())
            .map(|(node, _)| node)
            .collect()
    }

    /// Force a node into the failed state without propagating completion.
    pub(crate) fn mark_failed(&mut self, node: usize) {
        self.states[node] = NodeRunState::Failed;
    }
}
