#![allow(dead_code)]

use std::sync::Arc;

use cmdflow::{Command, CommandFuture, Context, LinearChain, MapContext, Outcome};

pub use cmdflow_test_utils::init_tracing;

/// Run a future with a 5-second timeout.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

pub fn new_context() -> Arc<MapContext> {
    Arc::new(MapContext::new())
}

/// Command that writes `value` under `key` and continues.
pub struct SetValue {
    pub key: &'static str,
    pub value: &'static str,
}

impl Command<MapContext> for SetValue {
    fn execute<'a>(&'a self, ctx: &'a MapContext) -> CommandFuture<'a> {
        Box::pin(async move {
            ctx.set(self.key, self.value.to_string());
            Ok(Outcome::Continue)
        })
    }

    fn name(&self) -> &str {
        self.key
    }
}

/// Command that tries to append to a chain while that chain is executing
/// and records the result of the attempt.
pub struct AppendDuringExecution {
    pub chain: Arc<std::sync::OnceLock<Arc<LinearChain<MapContext>>>>,
    pub attempt: Arc<std::sync::Mutex<Option<cmdflow::Result<()>>>>,
}

impl Command<MapContext> for AppendDuringExecution {
    fn execute<'a>(&'a self, _ctx: &'a MapContext) -> CommandFuture<'a> {
        Box::pin(async move {
            if let Some(chain) = self.chain.get() {
                let late = Arc::new(SetValue {
                    key: "late",
                    value: "added",
                });
                let result = chain.add_command(late);
                *self.attempt.lock().unwrap() = Some(result);
            }
            Ok(Outcome::Continue)
        })
    }

    fn name(&self) -> &str {
        "append-during-execution"
    }
}
