//! Testing utilities for Kedja.
//!
//! This module provides utilities to make testing pipelines and handlers easier.
//!
//! # Features
//!
//! - [`Journal`]: a shared record of handler callbacks, for order assertions
//! - [`RecordingHandler`]: a handler that records every callback and can
//!   optionally forward events onward
//! - [`PromiseBin`]: a shared holder for promises a terminal handler
//!   received but has not completed yet
//! - [`ManualEventLoop`]: a switchable affinity capability for exercising
//!   the thread-affinity violation path deterministically
//! - [`block_on_completion`]: drive a [`Completion`] to its result on the
//!   current thread

use crate::context::Context;
use crate::handler::Handler;
use kedja_core::{BoxError, Completion, CompletionError, EventLoop, Payload, Promise};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// A shared, append-only record of handler callbacks.
///
/// Clones share the same underlying record, so a test can hand one clone
/// to each handler and read the combined order afterwards.
#[derive(Clone, Default)]
pub struct Journal {
    entries: Rc<RefCell<Vec<String>>>,
}

impl Journal {
    /// Create an empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one entry.
    pub fn record(&self, entry: impl Into<String>) {
        self.entries.borrow_mut().push(entry.into());
    }

    /// Snapshot of all entries in record order.
    pub fn entries(&self) -> Vec<String> {
        self.entries.borrow().clone()
    }

    /// Discard all entries.
    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

/// A shared holder for promises a handler received but did not complete.
///
/// The non-forwarding [`RecordingHandler`] parks every promise it is
/// handed in its bin, so tests can verify that the dispatcher never
/// completes a token on a handler's behalf — and complete them manually.
#[derive(Clone, Default)]
pub struct PromiseBin {
    promises: Rc<RefCell<Vec<Promise>>>,
}

impl PromiseBin {
    /// Create an empty bin.
    pub fn new() -> Self {
        Self::default()
    }

    /// Park a promise.
    pub fn park(&self, promise: Promise) {
        self.promises.borrow_mut().push(promise);
    }

    /// Number of parked promises.
    pub fn len(&self) -> usize {
        self.promises.borrow().len()
    }

    /// Returns `true` if no promises are parked.
    pub fn is_empty(&self) -> bool {
        self.promises.borrow().is_empty()
    }

    /// Take every parked promise out of the bin.
    pub fn take_all(&self) -> Vec<Promise> {
        std::mem::take(&mut *self.promises.borrow_mut())
    }
}

/// A handler that records every callback it receives into a [`Journal`].
///
/// Entries have the form `"{tag}:{event}"`, e.g. `"b:channel_read"`.
/// A *forwarding* recorder propagates each event to its neighbor after
/// recording it (inbound via `fire_*`, outbound via the context's
/// outbound methods); a plain recorder is a terminal observer — outbound
/// promises it receives are parked in its [`PromiseBin`].
pub struct RecordingHandler {
    tag: String,
    journal: Journal,
    bin: PromiseBin,
    forward: bool,
}

impl RecordingHandler {
    /// A terminal recorder: records and does not propagate.
    pub fn new(tag: impl Into<String>, journal: Journal) -> Self {
        Self {
            tag: tag.into(),
            journal,
            bin: PromiseBin::new(),
            forward: false,
        }
    }

    /// A forwarding recorder: records, then propagates every event.
    pub fn forwarding(tag: impl Into<String>, journal: Journal) -> Self {
        Self {
            tag: tag.into(),
            journal,
            bin: PromiseBin::new(),
            forward: true,
        }
    }

    /// Park outbound promises in the given bin instead of a private one.
    pub fn with_promise_bin(mut self, bin: PromiseBin) -> Self {
        self.bin = bin;
        self
    }

    fn record(&self, event: &str) {
        self.journal.record(format!("{}:{event}", self.tag));
    }
}

impl Handler for RecordingHandler {
    fn handler_added(&mut self, _ctx: &Context) -> Result<(), BoxError> {
        self.record("handler_added");
        Ok(())
    }

    fn handler_removed(&mut self, _ctx: &Context) -> Result<(), BoxError> {
        self.record("handler_removed");
        Ok(())
    }

    fn channel_registered(&mut self, ctx: &Context) -> Result<(), BoxError> {
        self.record("channel_registered");
        if self.forward {
            ctx.fire_channel_registered();
        }
        Ok(())
    }

    fn channel_unregistered(&mut self, ctx: &Context) -> Result<(), BoxError> {
        self.record("channel_unregistered");
        if self.forward {
            ctx.fire_channel_unregistered();
        }
        Ok(())
    }

    fn channel_active(&mut self, ctx: &Context) -> Result<(), BoxError> {
        self.record("channel_active");
        if self.forward {
            ctx.fire_channel_active();
        }
        Ok(())
    }

    fn channel_inactive(&mut self, ctx: &Context) -> Result<(), BoxError> {
        self.record("channel_inactive");
        if self.forward {
            ctx.fire_channel_inactive();
        }
        Ok(())
    }

    fn channel_read(&mut self, ctx: &Context, data: Payload) -> Result<(), BoxError> {
        self.record("channel_read");
        if self.forward {
            ctx.fire_channel_read(data);
        }
        Ok(())
    }

    fn channel_read_complete(&mut self, ctx: &Context) -> Result<(), BoxError> {
        self.record("channel_read_complete");
        if self.forward {
            ctx.fire_channel_read_complete();
        }
        Ok(())
    }

    fn channel_writability_changed(
        &mut self,
        ctx: &Context,
        writable: bool,
    ) -> Result<(), BoxError> {
        self.record("channel_writability_changed");
        if self.forward {
            ctx.fire_channel_writability_changed(writable);
        }
        Ok(())
    }

    fn user_event_triggered(&mut self, ctx: &Context, event: Payload) -> Result<(), BoxError> {
        self.record("user_event_triggered");
        if self.forward {
            ctx.fire_user_event_triggered(event);
        }
        Ok(())
    }

    fn error_caught(&mut self, ctx: &Context, err: BoxError) -> Result<(), BoxError> {
        self.journal.record(format!("{}:error_caught:{err}", self.tag));
        if self.forward {
            ctx.fire_error_caught(err);
        }
        Ok(())
    }

    fn write(&mut self, ctx: &Context, data: Payload, promise: Promise) {
        self.record("write");
        if self.forward {
            ctx.write(data, promise);
        } else {
            self.bin.park(promise);
        }
    }

    fn flush(&mut self, ctx: &Context) {
        self.record("flush");
        if self.forward {
            ctx.flush();
        }
    }

    fn read(&mut self, ctx: &Context) {
        self.record("read");
        if self.forward {
            ctx.read();
        }
    }

    fn close(&mut self, ctx: &Context, promise: Promise) {
        self.record("close");
        if self.forward {
            ctx.close(promise);
        } else {
            self.bin.park(promise);
        }
    }
}

/// A deterministic [`EventLoop`] whose answer tests flip at will.
///
/// Starts inside the loop. Flipping it to "outside" lets a test exercise
/// the affinity assertion without a second thread.
#[derive(Default)]
pub struct ManualEventLoop {
    outside: Cell<bool>,
}

impl ManualEventLoop {
    /// Create a loop that currently considers the caller inside it.
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip whether the caller counts as being on the loop thread.
    pub fn set_in_loop(&self, in_loop: bool) {
        self.outside.set(!in_loop);
    }
}

impl EventLoop for ManualEventLoop {
    fn in_event_loop(&self) -> bool {
        !self.outside.get()
    }
}

/// Block the current thread until the completion resolves.
///
/// Intended for tests; the dispatcher itself never awaits a token.
pub fn block_on_completion(completion: Completion) -> Result<(), CompletionError> {
    futures::executor::block_on(completion)
}
