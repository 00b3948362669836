//! Instrumented commands that record what the engine does with them.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::anyhow;
use cmdflow::{Command, CommandFuture, Context, Filter, Outcome, PostprocessFuture};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Started,
    Finished,
    Postprocessed,
}

#[derive(Debug, Clone)]
pub struct Event {
    pub name: String,
    pub kind: EventKind,
    pub at: Instant,
}

/// Shared, thread-safe log of command events.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<Event>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, name: &str, kind: EventKind) {
        self.events.lock().unwrap().push(Event {
            name: name.to_string(),
            kind,
            at: Instant::now(),
        });
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    /// Names of the commands that produced `kind`, in recording order.
    pub fn names(&self, kind: EventKind) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|e| e.kind == kind)
            .map(|e| e.name)
            .collect()
    }

    pub fn count(&self, name: &str, kind: EventKind) -> usize {
        self.events()
            .iter()
            .filter(|e| e.name == name && e.kind == kind)
            .count()
    }

    pub fn first(&self, name: &str, kind: EventKind) -> Option<Instant> {
        self.events()
            .into_iter()
            .find(|e| e.name == name && e.kind == kind)
            .map(|e| e.at)
    }
}

/// Tracks how many commands are inside `execute` at the same time.
#[derive(Debug, Clone, Default)]
pub struct ConcurrencyProbe {
    current: Arc<AtomicUsize>,
    max: Arc<AtomicUsize>,
}

impl ConcurrencyProbe {
    pub fn new() -> Self {
        Self::default()
    }

    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn max_observed(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }
}

/// A command that logs `Started`/`Finished`, optionally sleeps, and then
/// returns its configured outcome, fails, or panics.
#[derive(Debug, Clone)]
pub struct RecordingCommand {
    name: String,
    log: EventLog,
    outcome: Outcome,
    delay: Option<Duration>,
    failure: Option<String>,
    panics: bool,
    probe: Option<ConcurrencyProbe>,
}

impl RecordingCommand {
    pub fn new(name: &str, log: &EventLog) -> Self {
        Self {
            name: name.to_string(),
            log: log.clone(),
            outcome: Outcome::Continue,
            delay: None,
            failure: None,
            panics: false,
            probe: None,
        }
    }

    /// Return `Outcome::Finished` instead of `Continue`.
    pub fn finishing(mut self) -> Self {
        self.outcome = Outcome::Finished;
        self
    }

    pub fn sleeping(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    pub fn panicking(mut self) -> Self {
        self.panics = true;
        self
    }

    pub fn with_probe(mut self, probe: &ConcurrencyProbe) -> Self {
        self.probe = Some(probe.clone());
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    async fn run(&self) -> anyhow::Result<Outcome> {
        self.log.record(&self.name, EventKind::Started);
        if let Some(probe) = &self.probe {
            probe.enter();
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(probe) = &self.probe {
            probe.exit();
        }
        self.log.record(&self.name, EventKind::Finished);

        if self.panics {
            panic!("command '{}' panicked on purpose", self.name);
        }

        match &self.failure {
            Some(message) => Err(anyhow!("{message}")),
            None => Ok(self.outcome),
        }
    }
}

impl<C: Context> Command<C> for RecordingCommand {
    fn execute<'a>(&'a self, _ctx: &'a C) -> CommandFuture<'a> {
        Box::pin(self.run())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A filter wrapping a [`RecordingCommand`].
///
/// `postprocess` logs `Postprocessed`, remembers the error it was given, and
/// then reports `handles` or fails if configured to.
#[derive(Debug, Clone)]
pub struct RecordingFilter {
    command: RecordingCommand,
    handles: bool,
    fails_cleanup: bool,
    seen_errors: Arc<Mutex<Vec<Option<String>>>>,
}

impl RecordingFilter {
    pub fn new(command: RecordingCommand) -> Self {
        Self {
            command,
            handles: false,
            fails_cleanup: false,
            seen_errors: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Report failures as handled from `postprocess`.
    pub fn handling(mut self) -> Self {
        self.handles = true;
        self
    }

    /// Return an error from `postprocess`.
    pub fn failing_cleanup(mut self) -> Self {
        self.fails_cleanup = true;
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Rendered errors passed to each `postprocess` call.
    pub fn seen_errors(&self) -> Vec<Option<String>> {
        self.seen_errors.lock().unwrap().clone()
    }
}

impl<C: Context> Command<C> for RecordingFilter {
    fn execute<'a>(&'a self, _ctx: &'a C) -> CommandFuture<'a> {
        Box::pin(self.command.run())
    }

    fn name(&self) -> &str {
        &self.command.name
    }

    fn as_filter(&self) -> Option<&dyn Filter<C>> {
        Some(self)
    }
}

impl<C: Context> Filter<C> for RecordingFilter {
    fn postprocess<'a>(
        &'a self,
        _ctx: &'a C,
        error: Option<&'a anyhow::Error>,
    ) -> PostprocessFuture<'a> {
        Box::pin(async move {
            self.command
                .log
                .record(&self.command.name, EventKind::Postprocessed);
            self.seen_errors
                .lock()
                .unwrap()
                .push(error.map(|e| e.to_string()));

            if self.fails_cleanup {
                return Err(anyhow!("cleanup of '{}' failed", self.command.name));
            }
            Ok(self.handles)
        })
    }
}
