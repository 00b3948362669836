// src/dag/node.rs

use std::fmt;
use std::sync::Arc;

use crate::command::SharedCommand;
use crate::context::Context;

/// Identity of a command inside a graph: the address of its `Arc` allocation.
///
/// The graph keeps every `Arc` alive, so an address cannot be reused by
/// another command while the graph exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct CommandKey(usize);

impl CommandKey {
    pub(crate) fn of<C: Context>(command: &SharedCommand<C>) -> Self {
        CommandKey(Arc::as_ptr(command).cast::<()>() as usize)
    }
}

/// The single canonical node for one distinct command.
///
/// Dependents are the outgoing edges of the graph that owns the node;
/// predecessor counters and completion flags are per run and live in
/// [`RunState`](super::run_state::RunState).
pub struct CommandNode<C: Context> {
    command: SharedCommand<C>,
}

impl<C: Context> CommandNode<C> {
    pub(crate) fn new(command: SharedCommand<C>) -> Self {
        Self { command }
    }

    pub fn command(&self) -> &SharedCommand<C> {
        &self.command
    }

    pub fn name(&self) -> &str {
        self.command.name()
    }
}

impl<C: Context> fmt::Debug for CommandNode<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandNode")
            .field("name", &self.name())
            .finish()
    }
}
