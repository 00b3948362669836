//! Builders for dependency graphs made of [`RecordingCommand`]s.

use std::collections::HashMap;
use std::sync::Arc;

use cmdflow::{Context, DependencyGraph, SharedCommand};

use crate::commands::{EventLog, RecordingCommand};

/// Builds graphs from `(upstream, downstream)` name pairs.
///
/// Every name maps to exactly one `Arc`, so repeated names in the edge list
/// resolve to the same graph node.
#[derive(Debug, Default)]
pub struct GraphFixture {
    log: EventLog,
    commands: HashMap<String, Arc<RecordingCommand>>,
}

impl GraphFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    /// Register a customised command; it must share [`GraphFixture::log`]
    /// for its events to be visible.
    pub fn with_command(
        mut self,
        name: &str,
        build: impl FnOnce(RecordingCommand) -> RecordingCommand,
    ) -> Self {
        let command = build(RecordingCommand::new(name, &self.log));
        self.commands.insert(name.to_string(), Arc::new(command));
        self
    }

    /// The command registered under `name`, created on first use.
    pub fn command<C: Context>(&mut self, name: &str) -> SharedCommand<C> {
        let log = self.log.clone();
        let command = self
            .commands
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(RecordingCommand::new(name, &log)));
        Arc::clone(command) as SharedCommand<C>
    }

    pub fn graph<C: Context>(&mut self, edges: &[(&str, &str)]) -> DependencyGraph<C> {
        let mut graph = DependencyGraph::new();
        for &(upstream, downstream) in edges {
            let up = self.command(upstream);
            let down = self.command(downstream);
            graph.add_edge(up, down);
        }
        graph
    }
}
