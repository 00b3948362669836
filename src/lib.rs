// src/lib.rs

//! Command-execution engine.
//!
//! Small units of work ([`Command`]s) are composed into one of two execution
//! plans over a shared [`Context`]:
//!
//! - [`LinearChain`]: runs commands in order until one stops the chain or
//!   fails, then lets every [`Filter`] clean up in reverse order.
//! - [`DependencyGraph`]: `(upstream, downstream)` command pairs validated
//!   into an acyclic [`ValidatedGraph`] and executed by a [`GraphScheduler`],
//!   which runs independent commands concurrently on a bounded worker pool.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use cmdflow::{DependencyGraph, GraphScheduler, MapContext, SharedCommand};
//!
//! # async fn demo(a: SharedCommand<MapContext>, b: SharedCommand<MapContext>) -> cmdflow::Result<()> {
//! let mut graph = DependencyGraph::new();
//! graph.add_edge(a, b);
//! let graph = graph.validate()?;
//!
//! let scheduler = GraphScheduler::new(4)?;
//! scheduler.execute(&graph, Arc::new(MapContext::new())).await?;
//! scheduler.shutdown();
//! # Ok(())
//! # }
//! ```

pub mod chain;
pub mod command;
pub mod config;
pub mod context;
pub mod dag;
pub mod errors;
pub mod generic;
pub mod logging;
pub mod types;

pub use chain::LinearChain;
pub use command::{Command, CommandFuture, Filter, PostprocessFuture, SharedCommand};
pub use context::{Context, MapContext};
pub use dag::{DependencyGraph, GraphScheduler, NodeReport, RunReport, ValidatedGraph};
pub use errors::{EngineError, ExecutionError, Result};
pub use types::{FailurePolicy, NodeRunState, Outcome};

pub use tokio_util::sync::CancellationToken;
