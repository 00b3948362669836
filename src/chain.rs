// src/chain.rs

//! Sequential command execution with reverse-order cleanup.
//!
//! A [`LinearChain`] runs its commands in insertion order until one of them
//! returns [`Outcome::Finished`] or fails. It then walks back from the last
//! command it reached to the first one and calls `postprocess` on every
//! [`Filter`](crate::Filter) it finds. A failure is re-raised to the caller
//! unless at least one filter reports that it handled it.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::command::{Command, CommandFuture, SharedCommand};
use crate::context::Context;
use crate::errors::{EngineError, ExecutionError, Result};
use crate::types::Outcome;

/// Ordered list of commands, frozen on first execution.
pub struct LinearChain<C: Context> {
    name: String,
    commands: Mutex<Vec<SharedCommand<C>>>,
    frozen: AtomicBool,
}

impl<C: Context> LinearChain<C> {
    pub fn new() -> Self {
        Self::named("chain")
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            commands: Mutex::new(Vec::new()),
            frozen: AtomicBool::new(false),
        }
    }

    pub fn with_commands(commands: impl IntoIterator<Item = SharedCommand<C>>) -> Self {
        let chain = Self::new();
        chain.lock_commands().extend(commands);
        chain
    }

    /// Append a command.
    ///
    /// Fails with [`EngineError::InvalidState`] once the chain has started
    /// executing, including when called from one of its own commands.
    pub fn add_command(&self, command: SharedCommand<C>) -> Result<()> {
        let mut commands = self.lock_commands();
        if self.frozen.load(Ordering::Acquire) {
            return Err(EngineError::InvalidState(format!(
                "chain '{}' is frozen; cannot add command '{}'",
                self.name,
                command.name()
            )));
        }
        commands.push(command);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.lock_commands().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_commands().is_empty()
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    /// Run the chain against `ctx`.
    ///
    /// Returns the outcome of the last command that ran, or the wrapped error
    /// of the command that failed when no filter handled it.
    pub async fn execute(&self, ctx: &C) -> Result<Outcome> {
        let commands = self.freeze();

        if commands.is_empty() {
            debug!(chain = %self.name, "empty chain; nothing to execute");
            return Ok(Outcome::Continue);
        }

        let mut outcome = Outcome::Continue;
        let mut failure: Option<anyhow::Error> = None;
        let mut reached = 0;

        for (index, command) in commands.iter().enumerate() {
            reached = index;
            debug!(chain = %self.name, command = %command.name(), index, "executing command");

            match command.execute(ctx).await {
                Ok(next) => {
                    outcome = next;
                    if next.stops() {
                        debug!(
                            chain = %self.name,
                            command = %command.name(),
                            index,
                            "command finished processing; stopping chain"
                        );
                        break;
                    }
                }
                Err(err) => {
                    warn!(
                        chain = %self.name,
                        command = %command.name(),
                        index,
                        error = %err,
                        "command failed; unwinding chain"
                    );
                    failure = Some(err);
                    break;
                }
            }
        }

        let handled = self
            .unwind(&commands[..=reached], ctx, failure.as_ref())
            .await;

        match failure {
            Some(err) if !handled => {
                let failed = &commands[reached];
                Err(ExecutionError::from_command_error(failed.name(), || ctx.keys(), err).into())
            }
            Some(err) => {
                info!(
                    chain = %self.name,
                    command = %commands[reached].name(),
                    error = %err,
                    "failure handled by a filter"
                );
                Ok(outcome)
            }
            None => Ok(outcome),
        }
    }

    /// Call `postprocess` on every filter in `reached`, last one first.
    ///
    /// Returns whether any filter handled the failure.
    async fn unwind(
        &self,
        reached: &[SharedCommand<C>],
        ctx: &C,
        failure: Option<&anyhow::Error>,
    ) -> bool {
        let mut handled = false;

        for command in reached.iter().rev() {
            let Some(filter) = command.as_filter() else {
                continue;
            };

            match filter.postprocess(ctx, failure).await {
                Ok(true) => {
                    debug!(chain = %self.name, filter = %command.name(), "filter handled failure");
                    handled = true;
                }
                Ok(false) => {}
                Err(err) => {
                    debug!(
                        chain = %self.name,
                        filter = %command.name(),
                        error = %err,
                        "postprocess failed; ignoring"
                    );
                }
            }
        }

        handled
    }

    fn freeze(&self) -> Vec<SharedCommand<C>> {
        let commands = self.lock_commands();
        self.frozen.store(true, Ordering::Release);
        commands.clone()
    }

    fn lock_commands(&self) -> MutexGuard<'_, Vec<SharedCommand<C>>> {
        self.commands.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C: Context> Default for LinearChain<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Context> fmt::Debug for LinearChain<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self
            .lock_commands()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        f.debug_struct("LinearChain")
            .field("name", &self.name)
            .field("commands", &names)
            .field("frozen", &self.is_frozen())
            .finish()
    }
}

/// Chains nest: a chain can be a command of another chain or a graph node.
impl<C: Context> Command<C> for LinearChain<C> {
    fn execute<'a>(&'a self, ctx: &'a C) -> CommandFuture<'a> {
        Box::pin(async move { Ok(LinearChain::execute(self, ctx).await?) })
    }

    fn name(&self) -> &str {
        &self.name
    }
}
