//! End-to-end propagation tests for the handler chain.
//!
//! Chains are built as A -> B -> C with A at the head (transport end):
//! inbound events travel A to C, outbound operations travel C to A.

use kedja::testing::{block_on_completion, Journal, ManualEventLoop, PromiseBin, RecordingHandler};
use kedja::{BoxError, Context, Handler, Payload, Pipeline, Promise};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

fn recorded_chain(journal: &Journal) -> Pipeline {
    let pipeline = Pipeline::new();
    pipeline
        .add_last("a", RecordingHandler::forwarding("a", journal.clone()))
        .unwrap();
    pipeline
        .add_last("b", RecordingHandler::forwarding("b", journal.clone()))
        .unwrap();
    pipeline
        .add_last("c", RecordingHandler::new("c", journal.clone()))
        .unwrap();
    journal.clear(); // drop the handler_added entries
    pipeline
}

#[test]
fn inbound_events_run_head_to_tail() {
    let journal = Journal::new();
    let pipeline = recorded_chain(&journal);

    pipeline.fire_channel_read(Payload::new("ping"));
    assert_eq!(
        journal.entries(),
        ["a:channel_read", "b:channel_read", "c:channel_read"]
    );
}

#[test]
fn firing_from_a_node_starts_at_its_next_neighbor() {
    let journal = Journal::new();
    let pipeline = recorded_chain(&journal);

    // fire never touches the firing node's own handler
    pipeline.context("a").unwrap().fire_channel_read(Payload::new(1u8));
    assert_eq!(journal.entries(), ["b:channel_read", "c:channel_read"]);

    journal.clear();
    pipeline.context("b").unwrap().fire_channel_read(Payload::new(2u8));
    assert_eq!(journal.entries(), ["c:channel_read"]);
}

#[test]
fn outbound_operations_run_tail_to_head() {
    let journal = Journal::new();
    let pipeline = Pipeline::new();
    let bin = PromiseBin::new();
    pipeline
        .add_last(
            "a",
            RecordingHandler::new("a", journal.clone()).with_promise_bin(bin.clone()),
        )
        .unwrap();
    pipeline
        .add_last("b", RecordingHandler::forwarding("b", journal.clone()))
        .unwrap();
    pipeline
        .add_last("c", RecordingHandler::forwarding("c", journal.clone()))
        .unwrap();
    journal.clear();

    // Originating at C's node skips C itself and walks B then A.
    pipeline
        .context("c")
        .unwrap()
        .write(Payload::new(vec![1u8]), Promise::new());
    assert_eq!(journal.entries(), ["b:write", "a:write"]);
    assert_eq!(bin.len(), 1);
}

#[test]
fn outbound_write_on_the_head_node_is_a_contract_violation() {
    let journal = Journal::new();
    let pipeline = recorded_chain(&journal);
    let head = pipeline.context("a").unwrap();

    let panic = catch_unwind(AssertUnwindSafe(|| {
        head.write(Payload::new(0u8), Promise::new());
    }))
    .unwrap_err();
    let message = panic.downcast_ref::<String>().unwrap();
    assert!(message.contains("no handler before"), "got: {message}");
}

#[test]
fn other_lifecycle_events_propagate_in_chain_order() {
    let journal = Journal::new();
    let pipeline = recorded_chain(&journal);

    pipeline.fire_channel_active();
    pipeline.fire_channel_writability_changed(false);
    pipeline.fire_user_event_triggered(Payload::new("idle"));
    assert_eq!(
        journal.entries(),
        [
            "a:channel_active",
            "b:channel_active",
            "c:channel_active",
            "a:channel_writability_changed",
            "b:channel_writability_changed",
            "c:channel_writability_changed",
            "a:user_event_triggered",
            "b:user_event_triggered",
            "c:user_event_triggered",
        ]
    );
}

/// Fails every read; records what reaches its own error handler.
struct FailingRead {
    journal: Journal,
}

impl Handler for FailingRead {
    fn channel_read(&mut self, _ctx: &Context, _data: Payload) -> Result<(), BoxError> {
        Err("boom".into())
    }

    fn error_caught(&mut self, _ctx: &Context, err: BoxError) -> Result<(), BoxError> {
        self.journal.record(format!("b:error_caught:{err}"));
        Ok(())
    }
}

#[test]
fn handler_failure_is_redirected_to_its_own_error_caught() {
    let journal = Journal::new();
    let pipeline = Pipeline::new();
    pipeline
        .add_last("a", RecordingHandler::forwarding("a", journal.clone()))
        .unwrap();
    pipeline
        .add_last("b", FailingRead { journal: journal.clone() })
        .unwrap();
    pipeline
        .add_last("c", RecordingHandler::new("c", journal.clone()))
        .unwrap();
    journal.clear();

    pipeline.fire_channel_read(Payload::new("ping"));

    // B's failure surfaces only at B; neither neighbor observes anything.
    assert_eq!(journal.entries(), ["a:channel_read", "b:error_caught:boom"]);
}

/// Fails every read, then fails again inside its own error handler.
struct DoubleFail;

impl Handler for DoubleFail {
    fn channel_read(&mut self, _ctx: &Context, _data: Payload) -> Result<(), BoxError> {
        Err("primary".into())
    }

    fn error_caught(&mut self, _ctx: &Context, _err: BoxError) -> Result<(), BoxError> {
        Err("secondary".into())
    }
}

#[test]
fn secondary_error_is_discarded_without_escalation() {
    let journal = Journal::new();
    let pipeline = Pipeline::new();
    pipeline
        .add_last("a", RecordingHandler::forwarding("a", journal.clone()))
        .unwrap();
    pipeline.add_last("b", DoubleFail).unwrap();
    pipeline
        .add_last("c", RecordingHandler::new("c", journal.clone()))
        .unwrap();
    journal.clear();

    // Must complete without panicking, and nothing may reach C.
    pipeline.fire_channel_read(Payload::new("ping"));
    assert_eq!(journal.entries(), ["a:channel_read"]);
}

#[test]
fn errors_travel_only_when_fired_onward() {
    let journal = Journal::new();
    let pipeline = Pipeline::new();
    pipeline
        .add_last("a", RecordingHandler::forwarding("a", journal.clone()))
        .unwrap();
    pipeline
        .add_last("b", RecordingHandler::forwarding("b", journal.clone()))
        .unwrap();
    pipeline
        .add_last("c", RecordingHandler::new("c", journal.clone()))
        .unwrap();
    journal.clear();

    // A forwarding error handler makes the error chain-wide visible.
    pipeline.fire_error_caught("reset by peer".into());
    assert_eq!(
        journal.entries(),
        [
            "a:error_caught:reset by peer",
            "b:error_caught:reset by peer",
            "c:error_caught:reset by peer",
        ]
    );
}

#[test]
fn dispatch_off_the_event_loop_thread_is_fatal() {
    let loop_handle = Rc::new(ManualEventLoop::new());
    let journal = Journal::new();
    let pipeline = Pipeline::with_event_loop(loop_handle.clone());
    pipeline
        .add_last("a", RecordingHandler::new("a", journal.clone()))
        .unwrap();
    pipeline
        .add_last("b", RecordingHandler::new("b", journal.clone()))
        .unwrap();
    journal.clear();
    let head = pipeline.context("a").unwrap();

    loop_handle.set_in_loop(false);

    // Pipeline entry points assert before touching the chain.
    let panic = catch_unwind(AssertUnwindSafe(|| {
        pipeline.fire_channel_read(Payload::new(0u8));
    }))
    .unwrap_err();
    let message = panic.downcast_ref::<String>().unwrap();
    assert!(message.contains("outside the pipeline's event loop"), "got: {message}");

    // So does the receiving node's invoke when fired from a context.
    let panic = catch_unwind(AssertUnwindSafe(|| {
        head.fire_channel_read(Payload::new(0u8));
    }))
    .unwrap_err();
    let message = panic.downcast_ref::<String>().unwrap();
    assert!(message.contains("outside its pipeline's event loop"), "got: {message}");

    // Nothing was delivered on either violating call.
    loop_handle.set_in_loop(true);
    assert!(journal.entries().is_empty());
}

#[test]
fn off_loop_dispatch_on_an_empty_chain_is_still_fatal() {
    let loop_handle = Rc::new(ManualEventLoop::new());
    let pipeline = Pipeline::with_event_loop(loop_handle.clone());
    loop_handle.set_in_loop(false);

    // An empty chain must not downgrade the affinity violation to the
    // silent event-dropped path.
    let panic = catch_unwind(AssertUnwindSafe(|| {
        pipeline.fire_channel_read(Payload::new(0u8));
    }))
    .unwrap_err();
    let message = panic.downcast_ref::<String>().unwrap();
    assert!(message.contains("outside the pipeline's event loop"), "got: {message}");

    let panic = catch_unwind(AssertUnwindSafe(|| {
        pipeline.write(Payload::new(0u8), Promise::new());
    }))
    .unwrap_err();
    let message = panic.downcast_ref::<String>().unwrap();
    assert!(message.contains("outside the pipeline's event loop"), "got: {message}");
}

/// Fails the write promise immediately; flush must still follow.
struct FailWrite {
    journal: Journal,
}

impl Handler for FailWrite {
    fn write(&mut self, _ctx: &Context, _data: Payload, promise: Promise) {
        self.journal.record("fw:write");
        promise.fail("buffer full".into());
    }

    fn flush(&mut self, _ctx: &Context) {
        self.journal.record("fw:flush");
    }
}

#[test]
fn write_and_flush_always_flushes_after_write() {
    let journal = Journal::new();
    let pipeline = Pipeline::new();
    pipeline
        .add_last("fw", FailWrite { journal: journal.clone() })
        .unwrap();

    let completion = pipeline.write_and_flush(Payload::new(vec![0u8; 4]), Promise::new());

    // Order is write-then-flush even though the write already failed its
    // promise.
    assert_eq!(journal.entries(), ["fw:write", "fw:flush"]);
    assert!(completion.result().unwrap().is_err());
}

#[test]
fn forwarded_tokens_are_never_completed_by_the_chain() {
    let journal = Journal::new();
    let bin = PromiseBin::new();
    let pipeline = Pipeline::new();
    pipeline
        .add_last(
            "sink",
            RecordingHandler::new("sink", journal.clone()).with_promise_bin(bin.clone()),
        )
        .unwrap();
    pipeline
        .add_last("relay", RecordingHandler::forwarding("relay", journal.clone()))
        .unwrap();

    let completion = pipeline.write(Payload::new("payload"), Promise::new());

    // The token walked the whole chain without being completed.
    assert!(completion.result().is_none());
    assert_eq!(bin.len(), 1);

    // Only the handler that actually performs the write completes it.
    for promise in bin.take_all() {
        promise.fulfill();
    }
    assert!(block_on_completion(completion).is_ok());
}

#[test]
fn close_propagates_and_resolves_through_its_token() {
    let journal = Journal::new();
    let bin = PromiseBin::new();
    let pipeline = Pipeline::new();
    pipeline
        .add_last(
            "transport",
            RecordingHandler::new("transport", journal.clone()).with_promise_bin(bin.clone()),
        )
        .unwrap();
    pipeline
        .add_last("app", RecordingHandler::forwarding("app", journal.clone()))
        .unwrap();
    journal.clear();

    let completion = pipeline.close(Promise::new());
    assert_eq!(journal.entries(), ["app:close", "transport:close"]);
    assert!(!completion.is_done());

    for promise in bin.take_all() {
        promise.fail("close refused".into());
    }
    let err = block_on_completion(completion).unwrap_err();
    assert_eq!(err.get_ref().to_string(), "close refused");
}
