// src/dag/scheduler.rs

//! Concurrent execution of a validated dependency graph.
//!
//! The scheduler is an async shell around [`RunState`]: a single driver loop
//! owns the per-run state, spawns one Tokio task per ready node and reacts to
//! each task's completion by asking `RunState` which dependents became
//! ready. A shared semaphore bounds how many commands execute at once across
//! every run of the same scheduler.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::anyhow;
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;
use tracing::{debug, error, info, warn};

use crate::command::SharedCommand;
use crate::config::SchedulerConfig;
use crate::context::Context;
use crate::dag::graph::ValidatedGraph;
use crate::dag::report::{NodeReport, RunReport};
use crate::dag::run_state::RunState;
use crate::errors::{EngineError, ExecutionError, Result};
use crate::types::{FailurePolicy, NodeRunState, Outcome};

/// Number of workers used when none is configured.
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Message from a node task back to the driver loop.
#[derive(Debug)]
enum NodeEvent {
    /// The command ran to completion (successfully or not).
    Finished {
        node: usize,
        started_at: Instant,
        finished_at: Instant,
        result: anyhow::Result<Outcome>,
    },
    /// The run was cancelled before the command started.
    NotStarted { node: usize },
    /// The scheduler was shut down before the command started.
    Rejected { node: usize },
}

/// Reusable executor for [`ValidatedGraph`]s.
///
/// Construct once, run any number of graphs, then call [`shutdown`]. Clones
/// share the same worker bound.
///
/// [`shutdown`]: GraphScheduler::shutdown
#[derive(Debug, Clone)]
pub struct GraphScheduler {
    permits: Arc<Semaphore>,
    concurrency: usize,
    failure_policy: FailurePolicy,
}

impl GraphScheduler {
    /// Scheduler running at most `concurrency` commands at a time.
    pub fn new(concurrency: usize) -> Result<Self> {
        if concurrency == 0 {
            return Err(EngineError::InvalidArgument(
                "scheduler concurrency must be >= 1 (got 0)".to_string(),
            ));
        }

        Ok(Self {
            permits: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            failure_policy: FailurePolicy::default(),
        })
    }

    /// Scheduler sized to the number of available processing units.
    pub fn with_default_concurrency() -> Self {
        let concurrency = default_concurrency().max(1);
        Self {
            permits: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            failure_policy: FailurePolicy::default(),
        }
    }

    pub fn from_config(cfg: &SchedulerConfig) -> Result<Self> {
        Ok(Self::new(cfg.effective_concurrency())?.with_failure_policy(cfg.failure_policy))
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    /// Stop accepting work. Commands already executing finish; nodes not yet
    /// started are cancelled and later runs fail with
    /// [`EngineError::SchedulerShutdown`].
    pub fn shutdown(&self) {
        info!("graph scheduler shutting down");
        self.permits.close();
    }

    pub fn is_shut_down(&self) -> bool {
        self.permits.is_closed()
    }

    /// Run every node of `graph` once and return [`Outcome::Finished`].
    ///
    /// Node failures do not abort the run; they are collected and returned
    /// as [`EngineError::GraphFailed`] once every node is terminal.
    pub async fn execute<C>(&self, graph: &ValidatedGraph<C>, ctx: Arc<C>) -> Result<Outcome>
    where
        C: Context + 'static,
    {
        self.execute_with_cancel(graph, ctx, CancellationToken::new())
            .await
    }

    /// Like [`execute`](Self::execute), but stops submitting nodes once
    /// `cancel` fires and then returns [`EngineError::Cancelled`].
    pub async fn execute_with_cancel<C>(
        &self,
        graph: &ValidatedGraph<C>,
        ctx: Arc<C>,
        cancel: CancellationToken,
    ) -> Result<Outcome>
    where
        C: Context + 'static,
    {
        self.run(graph, ctx, cancel).await?.into_outcome()
    }

    /// Run `graph` and return the full report, whatever happened to the
    /// individual nodes.
    ///
    /// Only fails when the scheduler was already shut down. Dropping the
    /// returned future aborts every command of this run that is still
    /// executing.
    pub async fn run<C>(
        &self,
        graph: &ValidatedGraph<C>,
        ctx: Arc<C>,
        cancel: CancellationToken,
    ) -> Result<RunReport>
    where
        C: Context + 'static,
    {
        if self.permits.is_closed() {
            return Err(EngineError::SchedulerShutdown);
        }

        info!(
            nodes = graph.len(),
            concurrency = self.concurrency,
            policy = ?self.failure_policy,
            "starting graph run"
        );

        // Shutdown mid-run cancels this token without touching the caller's.
        let mut driver = RunDriver::new(graph, ctx, cancel.child_token(), self);

        let start: Vec<usize> = graph.start_indices().collect();
        driver.submit(start);

        while let Some(joined) = driver.tasks.join_next_with_id().await {
            match joined {
                Ok((id, event)) => {
                    driver.in_flight.remove(&id);
                    driver.handle(event);
                }
                Err(err) => {
                    let Some(node) = driver.in_flight.remove(&err.id()) else {
                        error!(error = %err, "unknown node task ended without reporting");
                        continue;
                    };
                    driver.task_lost(node, err);
                }
            }
        }

        Ok(driver.finish())
    }
}

impl Default for GraphScheduler {
    fn default() -> Self {
        Self::with_default_concurrency()
    }
}

/// State of one graph run, owned by the driver loop in [`GraphScheduler::run`].
///
/// Every decrement of a pending counter and every submission happens through
/// `&mut self`, so no two completions are ever settled concurrently.
struct RunDriver<'g, C: Context> {
    graph: &'g ValidatedGraph<C>,
    ctx: Arc<C>,
    cancel: CancellationToken,
    permits: Arc<Semaphore>,
    state: RunState,
    nodes: Vec<NodeReport>,
    failures: Vec<ExecutionError>,
    tasks: JoinSet<NodeEvent>,
    in_flight: HashMap<Id, usize>,
    started_at: Instant,
}

impl<'g, C> RunDriver<'g, C>
where
    C: Context + 'static,
{
    fn new(
        graph: &'g ValidatedGraph<C>,
        ctx: Arc<C>,
        cancel: CancellationToken,
        scheduler: &GraphScheduler,
    ) -> Self {
        // Names are read once; node tasks never call back into `name()`.
        let nodes = (0..graph.len())
            .map(|node| NodeReport::pending(graph.node(node).name()))
            .collect();

        Self {
            graph,
            ctx,
            cancel,
            permits: Arc::clone(&scheduler.permits),
            state: RunState::new(graph, scheduler.failure_policy),
            nodes,
            failures: Vec::new(),
            tasks: JoinSet::new(),
            in_flight: HashMap::new(),
            started_at: Instant::now(),
        }
    }

    /// Spawn a task for each ready node, unless the run is cancelled.
    fn submit(&mut self, ready: Vec<usize>) {
        for node in ready {
            let name = self.nodes[node].name.clone();

            if self.cancel.is_cancelled() {
                debug!(node = %name, "run cancelled; not submitting node");
                self.state.cancel(node);
                continue;
            }

            debug!(node = %name, "submitting node");
            self.state.mark_running(node);
            let handle = self.tasks.spawn(run_node(
                node,
                name,
                Arc::clone(self.graph.node(node).command()),
                Arc::clone(&self.ctx),
                Arc::clone(&self.permits),
                self.cancel.clone(),
            ));
            self.in_flight.insert(handle.id(), node);
        }
    }

    fn handle(&mut self, event: NodeEvent) {
        match event {
            NodeEvent::Finished {
                node,
                started_at,
                finished_at,
                result,
            } => {
                let report = &mut self.nodes[node];
                report.started_at = Some(started_at);
                report.finished_at = Some(finished_at);

                let succeeded = match result {
                    Ok(outcome) => {
                        debug!(node = %report.name, %outcome, "node completed");
                        report.outcome = Some(outcome);
                        true
                    }
                    Err(err) => {
                        self.record_failure(node, err);
                        false
                    }
                };
                self.settle(node, succeeded);
            }
            NodeEvent::NotStarted { node } => {
                debug!(node = %self.nodes[node].name, "run cancelled before node started");
                self.state.cancel(node);
            }
            NodeEvent::Rejected { node } => {
                warn!(
                    node = %self.nodes[node].name,
                    "scheduler shut down; cancelling remaining nodes"
                );
                self.cancel.cancel();
                self.state.cancel(node);
            }
        }
    }

    /// The task driving `node` ended without reporting back. The node counts
    /// as failed and still settles its dependents.
    fn task_lost(&mut self, node: usize, err: JoinError) {
        let name = &self.nodes[node].name;
        error!(node = %name, error = %err, "node task ended without reporting");
        let cause = if err.is_panic() {
            anyhow!("task running '{name}' panicked")
        } else {
            anyhow!("task running '{name}' was aborted: {err}")
        };
        self.nodes[node].finished_at = Some(Instant::now());
        self.record_failure(node, cause);
        self.settle(node, false);
    }

    fn record_failure(&mut self, node: usize, err: anyhow::Error) {
        let report = &mut self.nodes[node];
        let ctx = &self.ctx;
        let failure = ExecutionError::from_command_error(&report.name, || ctx.keys(), err);
        warn!(node = %report.name, error = %failure, "node failed");
        report.error = Some(failure.to_string());
        self.failures.push(failure);
    }

    fn settle(&mut self, node: usize, succeeded: bool) {
        let step = self.state.complete(node, succeeded);
        for &skipped in &step.newly_skipped {
            info!(node = %self.nodes[skipped].name, "skipping node after upstream failure");
        }
        self.submit(step.newly_ready);
    }

    /// Mark every node that never reached a terminal state as failed.
    ///
    /// Only called once nothing is running; a node still unsettled here was
    /// never made ready and would otherwise be silently lost.
    fn fail_unsettled(&mut self) {
        for node in self.state.unsettled() {
            let name = self.nodes[node].name.clone();
            error!(node = %name, "node never became ready; marking failed");
            self.state.mark_failed(node);
            let failure = ExecutionError::new(
                name.clone(),
                self.ctx.keys(),
                EngineError::Stalled(name).into(),
            );
            self.nodes[node].error = Some(failure.to_string());
            self.failures.push(failure);
        }
    }

    fn finish(mut self) -> RunReport {
        if self.cancel.is_cancelled() {
            let never_submitted = self.state.cancel_pending();
            if !never_submitted.is_empty() {
                info!(
                    count = never_submitted.len(),
                    "cancelled nodes that were never submitted"
                );
            }
        }

        self.fail_unsettled();

        for (report, node_state) in self.nodes.iter_mut().zip(self.state.states()) {
            report.state = *node_state;
        }

        let cancelled = self.state.states().contains(&NodeRunState::Cancelled);
        let report = RunReport::new(self.nodes, self.failures, cancelled, self.started_at);

        info!(
            succeeded = report.count_in(NodeRunState::Succeeded),
            failed = report.count_in(NodeRunState::Failed),
            skipped = report.count_in(NodeRunState::Skipped),
            cancelled = report.count_in(NodeRunState::Cancelled),
            elapsed_ms = report.elapsed().as_millis() as u64,
            "graph run finished"
        );

        report
    }
}

/// Wait for a worker slot, then execute one node's command.
///
/// The command runs in its own task so that a panic is reported as a node
/// failure instead of tearing down the driver. That task is aborted when this
/// one is, so dropping a run leaves no command executing unobserved.
async fn run_node<C>(
    node: usize,
    name: String,
    command: SharedCommand<C>,
    ctx: Arc<C>,
    permits: Arc<Semaphore>,
    cancel: CancellationToken,
) -> NodeEvent
where
    C: Context + 'static,
{
    let _permit = tokio::select! {
        permit = permits.acquire_owned() => match permit {
            Ok(permit) => permit,
            Err(_) => return NodeEvent::Rejected { node },
        },
        _ = cancel.cancelled() => return NodeEvent::NotStarted { node },
    };

    if cancel.is_cancelled() {
        return NodeEvent::NotStarted { node };
    }

    let started_at = Instant::now();
    debug!(node = %name, "node started");

    let worker = AbortOnDropHandle::new(tokio::spawn(async move {
        command.execute(ctx.as_ref()).await
    }));
    let result = match worker.await {
        Ok(result) => result,
        Err(err) if err.is_panic() => Err(anyhow!("command '{name}' panicked")),
        Err(err) => Err(anyhow!("command '{name}' was aborted: {err}")),
    };

    NodeEvent::Finished {
        node,
        started_at,
        finished_at: Instant::now(),
        result,
    }
}
