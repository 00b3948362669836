// tests/linear_chain.rs

mod common;
use crate::common::{AppendDuringExecution, SetValue, init_tracing};

use std::sync::{Arc, Mutex, OnceLock};

use cmdflow::{Context, EngineError, LinearChain, MapContext, Outcome, SharedCommand};
use cmdflow_test_utils::commands::{EventKind, EventLog, RecordingCommand, RecordingFilter};

type Chain = LinearChain<MapContext>;

fn filter(name: &str, log: &EventLog) -> RecordingFilter {
    RecordingFilter::new(RecordingCommand::new(name, log))
}

#[tokio::test]
async fn empty_chain_continues() {
    init_tracing();

    let chain = Chain::new();
    let outcome = chain.execute(&MapContext::new()).await.unwrap();

    assert_eq!(outcome, Outcome::Continue);
    assert!(chain.is_frozen());
}

#[tokio::test]
async fn runs_all_commands_in_order_when_every_command_delegates() {
    init_tracing();
    let log = EventLog::new();

    let chain = Chain::with_commands([
        RecordingCommand::new("1", &log).shared() as SharedCommand<MapContext>,
        RecordingCommand::new("2", &log).shared(),
        RecordingCommand::new("3", &log).shared(),
    ]);

    let outcome = chain.execute(&MapContext::new()).await.unwrap();

    assert_eq!(outcome, Outcome::Continue);
    assert_eq!(log.names(EventKind::Started), vec!["1", "2", "3"]);
}

#[tokio::test]
async fn stop_signal_ends_forward_pass_and_unwinds_from_stopping_command() {
    init_tracing();
    let log = EventLog::new();

    let chain = Chain::new();
    chain.add_command(filter("1", &log).shared()).unwrap();
    chain.add_command(RecordingCommand::new("2", &log).shared()).unwrap();
    chain
        .add_command(RecordingFilter::new(RecordingCommand::new("3", &log).finishing()).shared())
        .unwrap();
    chain.add_command(filter("4", &log).shared()).unwrap();

    let outcome = chain.execute(&MapContext::new()).await.unwrap();

    assert_eq!(outcome, Outcome::Finished);
    assert_eq!(log.names(EventKind::Started), vec!["1", "2", "3"]);
    assert_eq!(log.names(EventKind::Postprocessed), vec!["3", "1"]);
}

#[tokio::test]
async fn failure_unwinds_filters_in_reverse_order_and_is_wrapped() {
    init_tracing();
    let log = EventLog::new();

    let f1 = filter("F1", &log).shared();
    let f2 = filter("F2", &log).shared();
    let f3 = RecordingFilter::new(RecordingCommand::new("F3", &log).failing("boom")).shared();

    let chain = Chain::with_commands([
        f1.clone() as SharedCommand<MapContext>,
        f2.clone(),
        f3.clone(),
    ]);

    let err = chain.execute(&MapContext::new()).await.unwrap_err();

    assert_eq!(log.names(EventKind::Postprocessed), vec!["F3", "F2", "F1"]);
    for f in [&f1, &f2, &f3] {
        assert_eq!(f.seen_errors(), vec![Some("boom".to_string())]);
    }

    match err {
        EngineError::Execution(failure) => {
            assert_eq!(failure.command(), "F3");
            assert_eq!(failure.inner().to_string(), "boom");
        }
        other => panic!("expected Execution error, got {other:?}"),
    }
}

#[tokio::test]
async fn any_filter_reporting_handled_suppresses_the_failure() {
    init_tracing();
    let log = EventLog::new();

    let chain = Chain::with_commands([
        RecordingFilter::new(RecordingCommand::new("F1", &log))
            .handling()
            .shared() as SharedCommand<MapContext>,
        filter("F2", &log).shared(),
        RecordingFilter::new(RecordingCommand::new("F3", &log).failing("boom")).shared(),
    ]);

    let outcome = chain.execute(&MapContext::new()).await.unwrap();

    assert_eq!(outcome, Outcome::Continue);
    assert_eq!(log.names(EventKind::Postprocessed), vec!["F3", "F2", "F1"]);
}

#[tokio::test]
async fn cleanup_errors_are_discarded_and_unwind_continues() {
    init_tracing();
    let log = EventLog::new();

    let chain = Chain::with_commands([
        filter("F1", &log).shared() as SharedCommand<MapContext>,
        filter("F2", &log).failing_cleanup().shared(),
        RecordingFilter::new(RecordingCommand::new("F3", &log).failing("boom")).shared(),
    ]);

    let err = chain.execute(&MapContext::new()).await.unwrap_err();

    assert_eq!(log.names(EventKind::Postprocessed), vec!["F3", "F2", "F1"]);
    let EngineError::Execution(failure) = err else {
        panic!("expected Execution error");
    };
    assert_eq!(failure.inner().to_string(), "boom");
}

#[tokio::test]
async fn cleanup_error_on_successful_chain_is_not_raised() {
    init_tracing();
    let log = EventLog::new();

    let f1 = filter("F1", &log).failing_cleanup().shared();
    let chain = Chain::with_commands([f1.clone() as SharedCommand<MapContext>]);

    let outcome = chain.execute(&MapContext::new()).await.unwrap();

    assert_eq!(outcome, Outcome::Continue);
    assert_eq!(f1.seen_errors(), vec![None]);
}

#[tokio::test]
async fn failure_carries_context_keys() {
    init_tracing();
    let log = EventLog::new();

    let chain = Chain::with_commands([
        Arc::new(SetValue {
            key: "user",
            value: "alice",
        }) as SharedCommand<MapContext>,
        RecordingCommand::new("fails", &log).failing("nope").shared(),
    ]);

    let err = chain.execute(&MapContext::new()).await.unwrap_err();

    let EngineError::Execution(failure) = err else {
        panic!("expected Execution error");
    };
    assert_eq!(failure.command(), "fails");
    assert_eq!(failure.context_keys(), ["user".to_string()]);
    assert!(failure.to_string().contains("fails"));
}

#[tokio::test]
async fn adding_after_execute_fails_whatever_the_outcome() {
    init_tracing();
    let log = EventLog::new();

    let ok_chain = Chain::with_commands([
        RecordingCommand::new("a", &log).shared() as SharedCommand<MapContext>
    ]);
    ok_chain.execute(&MapContext::new()).await.unwrap();
    let err = ok_chain
        .add_command(RecordingCommand::new("b", &log).shared())
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));

    let failing_chain = Chain::with_commands([
        RecordingCommand::new("c", &log).failing("x").shared() as SharedCommand<MapContext>
    ]);
    assert!(failing_chain.execute(&MapContext::new()).await.is_err());
    let err = failing_chain
        .add_command(RecordingCommand::new("d", &log).shared())
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));
    assert_eq!(failing_chain.len(), 1);
}

#[tokio::test]
async fn adding_from_an_executing_command_fails() {
    init_tracing();

    let slot = Arc::new(OnceLock::new());
    let attempt = Arc::new(Mutex::new(None));

    let chain = Arc::new(Chain::new());
    chain
        .add_command(Arc::new(AppendDuringExecution {
            chain: Arc::clone(&slot),
            attempt: Arc::clone(&attempt),
        }))
        .unwrap();
    slot.set(Arc::clone(&chain)).ok();

    let ctx = MapContext::new();
    chain.execute(&ctx).await.unwrap();

    let attempt = attempt.lock().unwrap().take().expect("command did not run");
    assert!(matches!(attempt, Err(EngineError::InvalidState(_))));
    assert_eq!(chain.len(), 1);
    assert!(ctx.get("late").is_none());
}

#[tokio::test]
async fn nested_chain_failure_is_not_wrapped_twice() {
    init_tracing();
    let log = EventLog::new();

    let inner: Arc<Chain> = Arc::new(LinearChain::named("inner"));
    inner
        .add_command(RecordingCommand::new("inner-fail", &log).failing("deep").shared())
        .unwrap();
    let outer_filter = filter("outer", &log).shared();

    let outer = Chain::with_commands([outer_filter.clone() as SharedCommand<MapContext>, inner]);

    let err = outer.execute(&MapContext::new()).await.unwrap_err();

    let EngineError::Execution(failure) = err else {
        panic!("expected Execution error");
    };
    assert_eq!(failure.command(), "inner-fail");
    assert_eq!(failure.inner().to_string(), "deep");
    assert_eq!(log.names(EventKind::Postprocessed), vec!["outer"]);
}
