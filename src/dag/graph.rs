// src/dag/graph.rs

use std::collections::HashMap;
use std::fmt;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::{debug, info};

use crate::command::SharedCommand;
use crate::context::Context;
use crate::dag::node::{CommandKey, CommandNode};
use crate::dag::validate::check_acyclic;
use crate::errors::Result;

/// Builder for a dependency graph of commands.
///
/// Edge direction: `upstream -> downstream`, i.e. for
/// `add_edge(a, b)` the command `b` starts only after `a` has completed.
///
/// Commands are identified by reference: every edge that mentions the same
/// `Arc` resolves to one node, while two separate `Arc`s are two nodes even
/// if their names are equal.
pub struct DependencyGraph<C: Context> {
    graph: DiGraph<CommandNode<C>, ()>,
    index: HashMap<CommandKey, NodeIndex>,
}

impl<C: Context> DependencyGraph<C> {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            index: HashMap::new(),
        }
    }

    /// Build a graph from a list of `(upstream, downstream)` pairs.
    pub fn from_edges(
        edges: impl IntoIterator<Item = (SharedCommand<C>, SharedCommand<C>)>,
    ) -> Self {
        let mut graph = Self::new();
        for (upstream, downstream) in edges {
            graph.add_edge(upstream, downstream);
        }
        graph
    }

    /// Register a command that may have no edges at all.
    pub fn add_command(&mut self, command: SharedCommand<C>) {
        self.resolve(command);
    }

    /// Declare that `downstream` must not start before `upstream` completed.
    ///
    /// Repeating an edge has no effect.
    pub fn add_edge(&mut self, upstream: SharedCommand<C>, downstream: SharedCommand<C>) {
        let up = self.resolve(upstream);
        let down = self.resolve(downstream);
        self.graph.update_edge(up, down, ());
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Reject cycles and freeze the graph.
    pub fn validate(self) -> Result<ValidatedGraph<C>> {
        let order = check_acyclic(&self.graph)?;

        let in_degree: Vec<usize> = self
            .graph
            .node_indices()
            .map(|idx| self.graph.neighbors_directed(idx, Direction::Incoming).count())
            .collect();

        let start_nodes: Vec<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|idx| in_degree[idx.index()] == 0)
            .collect();

        info!(
            nodes = self.graph.node_count(),
            edges = self.graph.edge_count(),
            start_nodes = start_nodes.len(),
            "dependency graph validated"
        );

        Ok(ValidatedGraph {
            graph: self.graph,
            in_degree,
            start_nodes,
            order,
        })
    }

    /// Canonical node for `command`, created on first sight.
    fn resolve(&mut self, command: SharedCommand<C>) -> NodeIndex {
        let key = CommandKey::of(&command);
        if let Some(&idx) = self.index.get(&key) {
            return idx;
        }

        debug!(command = %command.name(), "adding graph node");
        let idx = self.graph.add_node(CommandNode::new(command));
        self.index.insert(key, idx);
        idx
    }
}

impl<C: Context> Default for DependencyGraph<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Context> fmt::Debug for DependencyGraph<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyGraph")
            .field("nodes", &self.graph.node_count())
            .field("edges", &self.graph.edge_count())
            .finish()
    }
}

/// An acyclic dependency graph. Nodes and edges can no longer change.
///
/// Name-based queries return the first node with that name.
pub struct ValidatedGraph<C: Context> {
    graph: DiGraph<CommandNode<C>, ()>,
    in_degree: Vec<usize>,
    start_nodes: Vec<NodeIndex>,
    order: Vec<NodeIndex>,
}

impl<C: Context> ValidatedGraph<C> {
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Names of nodes without predecessors.
    pub fn start_nodes(&self) -> Vec<&str> {
        self.start_nodes
            .iter()
            .map(|&idx| self.graph[idx].name())
            .collect()
    }

    pub fn node_names(&self) -> Vec<&str> {
        self.graph
            .node_indices()
            .map(|idx| self.graph[idx].name())
            .collect()
    }

    pub fn in_degree_of(&self, name: &str) -> Option<usize> {
        self.find(name).map(|idx| self.in_degree[idx.index()])
    }

    pub fn dependents_of(&self, name: &str) -> Vec<&str> {
        match self.find(name) {
            Some(idx) => self
                .dependents(idx.index())
                .map(|dep| self.graph[NodeIndex::new(dep)].name())
                .collect(),
            None => Vec::new(),
        }
    }

    /// One valid topological order of the node names.
    pub fn topological_order(&self) -> Vec<&str> {
        self.order.iter().map(|&idx| self.graph[idx].name()).collect()
    }

    fn find(&self, name: &str) -> Option<NodeIndex> {
        self.graph
            .node_indices()
            .find(|&idx| self.graph[idx].name() == name)
    }

    pub(crate) fn node(&self, index: usize) -> &CommandNode<C> {
        &self.graph[NodeIndex::new(index)]
    }

    pub(crate) fn in_degrees(&self) -> &[usize] {
        &self.in_degree
    }

    pub(crate) fn start_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.start_nodes.iter().map(|idx| idx.index())
    }

    pub(crate) fn dependents(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.graph
            .neighbors_directed(NodeIndex::new(index), Direction::Outgoing)
            .map(|idx| idx.index())
    }
}

impl<C: Context> fmt::Debug for ValidatedGraph<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatedGraph")
            .field("nodes", &self.node_names())
            .field("edges", &self.graph.edge_count())
            .field("start_nodes", &self.start_nodes())
            .finish()
    }
}
