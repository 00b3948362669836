// src/dag/mod.rs

//! Dependency-graph execution.
//!
//! - [`graph`] builds a graph from `(upstream, downstream)` command pairs and
//!   validates it into an immutable [`ValidatedGraph`].
//! - [`validate`] holds the cycle check used by validation.
//! - [`node`] defines the node stored for each distinct command.
//! - [`run_state`] is the per-run state machine that decides which nodes
//!   become ready when a node completes.
//! - [`scheduler`] drives a validated graph on a bounded worker pool.
//! - [`report`] describes what happened to every node of a run.

pub mod graph;
pub mod node;
pub mod report;
pub mod run_state;
pub mod scheduler;
pub mod validate;

pub use graph::{DependencyGraph, ValidatedGraph};
pub use node::CommandNode;
pub use report::{NodeReport, RunReport};
pub use scheduler::GraphScheduler;
