// src/generic.rs

//! Small reusable commands that only manipulate the context.

use tracing::debug;

use crate::command::{Command, CommandFuture};
use crate::context::Context;
use crate::types::Outcome;

/// Copy a value into `to_key`.
///
/// The value is either a literal given at construction or the current value
/// of `from_key`. When neither yields a value, `to_key` is removed.
#[derive(Debug, Clone)]
pub struct CopyCommand<V> {
    from_key: Option<String>,
    to_key: String,
    value: Option<V>,
}

impl<V> CopyCommand<V> {
    pub fn from_key(from_key: impl Into<String>, to_key: impl Into<String>) -> Self {
        Self {
            from_key: Some(from_key.into()),
            to_key: to_key.into(),
            value: None,
        }
    }

    pub fn literal(to_key: impl Into<String>, value: V) -> Self {
        Self {
            from_key: None,
            to_key: to_key.into(),
            value: Some(value),
        }
    }
}

impl<C, V> Command<C> for CopyCommand<V>
where
    C: Context<Value = V>,
    V: Clone + Send + Sync,
{
    fn execute<'a>(&'a self, ctx: &'a C) -> CommandFuture<'a> {
        Box::pin(async move {
            let value = match (&self.value, &self.from_key) {
                (Some(value), _) => Some(value.clone()),
                (None, Some(from)) => ctx.get(from),
                (None, None) => None,
            };

            match value {
                Some(value) => {
                    ctx.set(&self.to_key, value);
                }
                None => {
                    debug!(to = %self.to_key, "no value to copy; removing target key");
                    ctx.remove(&self.to_key);
                }
            }

            Ok(Outcome::Continue)
        })
    }

    fn name(&self) -> &str {
        "copy"
    }
}

/// Remove `key` from the context.
#[derive(Debug, Clone)]
pub struct RemoveCommand {
    key: String,
}

impl RemoveCommand {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl<C: Context> Command<C> for RemoveCommand {
    fn execute<'a>(&'a self, ctx: &'a C) -> CommandFuture<'a> {
        Box::pin(async move {
            ctx.remove(&self.key);
            Ok(Outcome::Continue)
        })
    }

    fn name(&self) -> &str {
        "remove"
    }
}
