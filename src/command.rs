// src/command.rs

//! The two capabilities executed by the engine.
//!
//! Commands return boxed futures so that they can be stored as trait objects
//! and driven both sequentially (by a [`LinearChain`](crate::LinearChain))
//! and in parallel (by the [`GraphScheduler`](crate::GraphScheduler)).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::Context;
use crate::types::Outcome;

/// Future returned by [`Command::execute`].
pub type CommandFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<Outcome>> + Send + 'a>>;

/// Future returned by [`Filter::postprocess`]; resolves to `true` when the
/// filter handled the error.
pub type PostprocessFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<bool>> + Send + 'a>>;

/// Shared handle to a command. Graph identity is the identity of the `Arc`.
pub type SharedCommand<C> = Arc<dyn Command<C>>;

/// A unit of work executed against a context.
pub trait Command<C: Context>: Send + Sync {
    fn execute<'a>(&'a self, ctx: &'a C) -> CommandFuture<'a>;

    /// Name used in logs, errors and run reports.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Filters override this to return `Some(self)`.
    fn as_filter(&self) -> Option<&dyn Filter<C>> {
        None
    }
}

/// A command that gets a chance to clean up after the chain it belongs to
/// has run, whether it succeeded, failed or stopped early.
pub trait Filter<C: Context>: Command<C> {
    /// `error` is the error raised during the forward pass, if any.
    ///
    /// Errors returned from here are discarded.
    fn postprocess<'a>(
        &'a self,
        ctx: &'a C,
        error: Option<&'a anyhow::Error>,
    ) -> PostprocessFuture<'a>;
}
