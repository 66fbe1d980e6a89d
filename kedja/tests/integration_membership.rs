//! Chain membership tests: lifecycle hooks and link maintenance.

use kedja::testing::{Journal, RecordingHandler};
use kedja::{BoxError, Context, Handler, Payload, Pipeline, PipelineError};
use std::panic::{catch_unwind, AssertUnwindSafe};

#[test]
fn lifecycle_hooks_run_exactly_once() {
    let journal = Journal::new();
    let pipeline = Pipeline::new();
    pipeline
        .add_last("x", RecordingHandler::new("x", journal.clone()))
        .unwrap();
    assert_eq!(journal.entries(), ["x:handler_added"]);

    pipeline.remove("x").unwrap();
    assert_eq!(journal.entries(), ["x:handler_added", "x:handler_removed"]);
    assert!(pipeline.is_empty());
}

/// Refuses to join any pipeline.
struct RejectAdd;

impl Handler for RejectAdd {
    fn handler_added(&mut self, _ctx: &Context) -> Result<(), BoxError> {
        Err("not ready".into())
    }
}

#[test]
fn failed_handler_added_rolls_the_add_back() {
    let pipeline = Pipeline::new();
    let err = pipeline.add_last("reject", RejectAdd).unwrap_err();
    assert!(matches!(err, PipelineError::HandlerAdded { .. }));
    assert!(pipeline.is_empty());
    assert!(pipeline.context("reject").is_none());
}

/// Refuses to leave its pipeline.
struct RefuseRemove;

impl Handler for RefuseRemove {
    fn handler_removed(&mut self, _ctx: &Context) -> Result<(), BoxError> {
        Err("still draining".into())
    }
}

#[test]
fn failed_handler_removed_aborts_the_removal() {
    let pipeline = Pipeline::new();
    pipeline.add_last("stubborn", RefuseRemove).unwrap();

    let err = pipeline.remove("stubborn").unwrap_err();
    assert!(matches!(err, PipelineError::HandlerRemoved { .. }));
    // The handler is still linked and reachable.
    assert_eq!(pipeline.names(), ["stubborn"]);
    assert!(pipeline.context("stubborn").is_some());
}

#[test]
fn removal_rewires_the_dispatch_path() {
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

    pipeline.remove("b").unwrap();
    journal.clear();

    pipeline.fire_channel_read(Payload::new("ping"));
    assert_eq!(journal.entries(), ["a:channel_read", "c:channel_read"]);
}

#[test]
fn contexts_for_removed_handlers_are_stale() {
    let journal = Journal::new();
    let pipeline = Pipeline::new();
    pipeline
        .add_last("x", RecordingHandler::new("x", journal.clone()))
        .unwrap();
    let ctx = pipeline.context("x").unwrap();
    pipeline.remove("x").unwrap();

    let panic = catch_unwind(AssertUnwindSafe(|| ctx.name())).unwrap_err();
    let message = panic
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| panic.downcast_ref::<&str>().map(|s| s.to_string()))
        .unwrap();
    assert!(message.contains("stale node handle"), "got: {message}");
}

#[test]
fn add_first_puts_the_handler_at_the_transport_end() {
    let journal = Journal::new();
    let pipeline = Pipeline::new();
    pipeline
        .add_last("app", RecordingHandler::new("app", journal.clone()))
        .unwrap();
    pipeline
        .add_first("decoder", RecordingHandler::forwarding("decoder", journal.clone()))
        .unwrap();
    journal.clear();

    pipeline.fire_channel_read(Payload::new("ping"));
    assert_eq!(journal.entries(), ["decoder:channel_read", "app:channel_read"]);
}
