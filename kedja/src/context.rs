//! The handler-chain node: invocation and propagation for one handler.
//!
//! A [`Context`] is a handle onto one node of a pipeline's chain. It is
//! what a [`Handler`] sees of the outside world: the `fire_*` methods
//! forward an inbound event to the *next* node, the outbound methods
//! (`write`, `flush`, `read`, `close`) delegate to the *previous* node,
//! and the accessors expose the pipeline's shared state.
//!
//! The crate-internal `invoke_*` methods are the receiving half of the
//! protocol: each asserts event-loop affinity, runs the owning handler's
//! method, and — for inbound events — catches a handler-raised error and
//! redirects it to the *same* node's `error_caught` instead of letting it
//! travel down the chain.
//!
//! # Contract violations
//!
//! Two preconditions are enforced by panic rather than by error value,
//! because breaking them means the pipeline was assembled or driven
//! incorrectly:
//!
//! - every `invoke_*` must run on the pipeline's event-loop thread;
//! - `fire_*` requires a next node, outbound operations require a
//!   previous one.

use crate::config::{Allocator, Config};
use crate::pipeline::{NodeId, Pipeline, PipelineInner};
use kedja_core::{BoxError, Completion, EventLoop, Payload, Promise};
use std::cell::RefCell;
use std::rc::Rc;

/// A handle onto one handler-chain node.
///
/// Cheap to clone; a handler may keep a clone of its own context for
/// later use on the event-loop thread. A context for a removed handler
/// is stale, and dispatching through it is a contract violation.
#[derive(Clone)]
pub struct Context {
    inner: Rc<RefCell<PipelineInner>>,
    node: NodeId,
}

impl Context {
    pub(crate) fn new(inner: Rc<RefCell<PipelineInner>>, node: NodeId) -> Self {
        Self { inner, node }
    }

    /// The name this node's handler was registered under.
    pub fn name(&self) -> Rc<str> {
        Rc::clone(&self.inner.borrow().node(self.node).name)
    }

    /// The pipeline this node belongs to.
    pub fn pipeline(&self) -> Pipeline {
        Pipeline::from_inner(Rc::clone(&self.inner))
    }

    /// The pipeline's current configuration. Read through the pipeline at
    /// call time, never cached on the node.
    pub fn config(&self) -> Config {
        self.inner.borrow().config.clone()
    }

    /// The event loop this node's pipeline is bound to.
    pub fn event_loop(&self) -> Rc<dyn EventLoop> {
        Rc::clone(&self.inner.borrow().event_loop)
    }

    /// The pipeline's buffer allocator.
    pub fn alloc(&self) -> Rc<dyn Allocator> {
        Rc::clone(&self.inner.borrow().allocator)
    }

    // ------------------------------------------------------------------
    // Inbound: fire toward the next node
    // ------------------------------------------------------------------

    /// Forward a channel-registered event to the next node.
    pub fn fire_channel_registered(&self) {
        self.next_ctx("fire_channel_registered").invoke_channel_registered();
    }

    /// Forward a channel-unregistered event to the next node.
    pub fn fire_channel_unregistered(&self) {
        self.next_ctx("fire_channel_unregistered").invoke_channel_unregistered();
    }

    /// Forward a channel-active event to the next node.
    pub fn fire_channel_active(&self) {
        self.next_ctx("fire_channel_active").invoke_channel_active();
    }

    /// Forward a channel-inactive event to the next node.
    pub fn fire_channel_inactive(&self) {
        self.next_ctx("fire_channel_inactive").invoke_channel_inactive();
    }

    /// Forward inbound data to the next node.
    pub fn fire_channel_read(&self, data: Payload) {
        self.next_ctx("fire_channel_read").invoke_channel_read(data);
    }

    /// Forward a read-complete event to the next node.
    pub fn fire_channel_read_complete(&self) {
        self.next_ctx("fire_channel_read_complete").invoke_channel_read_complete();
    }

    /// Forward a writability change to the next node.
    pub fn fire_channel_writability_changed(&self, writable: bool) {
        self.next_ctx("fire_channel_writability_changed")
            .invoke_channel_writability_changed(writable);
    }

    /// Forward a user event to the next node.
    pub fn fire_user_event_triggered(&self, event: Payload) {
        self.next_ctx("fire_user_event_triggered").invoke_user_event_triggered(event);
    }

    /// Forward an error to the next node's `error_caught`.
    ///
    /// This is the only way an error travels along the chain; the
    /// dispatcher never forwards one on its own.
    pub fn fire_error_caught(&self, err: BoxError) {
        self.next_ctx("fire_error_caught").invoke_error_caught(err);
    }

    // ------------------------------------------------------------------
    // Outbound: delegate toward the previous node
    // ------------------------------------------------------------------

    /// Send a write toward the transport end of the chain.
    ///
    /// Returns the consumer half of `promise` immediately; the token is
    /// completed later by whichever handler performs the write.
    pub fn write(&self, data: Payload, promise: Promise) -> Completion {
        let completion = promise.completion();
        self.prev_ctx("write").invoke_write(data, promise);
        completion
    }

    /// Send a write toward the transport end and flush right after it.
    pub fn write_and_flush(&self, data: Payload, promise: Promise) -> Completion {
        let completion = promise.completion();
        self.prev_ctx("write_and_flush").invoke_write_and_flush(data, promise);
        completion
    }

    /// Ask the transport end to flush pending writes.
    pub fn flush(&self) {
        self.prev_ctx("flush").invoke_flush();
    }

    /// Ask the transport end for more inbound data.
    pub fn read(&self) {
        self.prev_ctx("read").invoke_read();
    }

    /// Send a close request toward the transport end of the chain.
    pub fn close(&self, promise: Promise) -> Completion {
        let completion = promise.completion();
        self.prev_ctx("close").invoke_close(promise);
        completion
    }

    // ------------------------------------------------------------------
    // Invocation: run this node's own handler
    // ------------------------------------------------------------------

    pub(crate) fn invoke_channel_registered(&self) {
        self.assert_in_event_loop();
        let handler = self.handler();
        let outcome = handler.borrow_mut().channel_registered(self);
        self.catch_inbound(outcome);
    }

    pub(crate) fn invoke_channel_unregistered(&self) {
        self.assert_in_event_loop();
        let handler = self.handler();
        let outcome = handler.borrow_mut().channel_unregistered(self);
        self.catch_inbound(outcome);
    }

    pub(crate) fn invoke_channel_active(&self) {
        self.assert_in_event_loop();
        let handler = self.handler();
        let outcome = handler.borrow_mut().channel_active(self);
        self.catch_inbound(outcome);
    }

    pub(crate) fn invoke_channel_inactive(&self) {
        self.assert_in_event_loop();
        let handler = self.handler();
        let outcome = handler.borrow_mut().channel_inactive(self);
        self.catch_inbound(outcome);
    }

    pub(crate) fn invoke_channel_read(&self, data: Payload) {
        self.assert_in_event_loop();
        let handler = self.handler();
        let outcome = handler.borrow_mut().channel_read(self, data);
        self.catch_inbound(outcome);
    }

    pub(crate) fn invoke_channel_read_complete(&self) {
        self.assert_in_event_loop();
        let handler = self.handler();
        let outcome = handler.borrow_mut().channel_read_complete(self);
        self.catch_inbound(outcome);
    }

    pub(crate) fn invoke_channel_writability_changed(&self, writable: bool) {
        self.assert_in_event_loop();
        let handler = self.handler();
        let outcome = handler.borrow_mut().channel_writability_changed(self, writable);
        self.catch_inbound(outcome);
    }

    pub(crate) fn invoke_user_event_triggered(&self, event: Payload) {
        self.assert_in_event_loop();
        let handler = self.handler();
        let outcome = handler.borrow_mut().user_event_triggered(self, event);
        self.catch_inbound(outcome);
    }

    /// Run this node's `error_caught`.
    ///
    /// Doubles as the local redirection target for a failure raised by
    /// any other inbound method of this node's handler. An error raised
    /// *here* has nowhere left to go and is discarded after a warning;
    /// this terminal sink is what keeps a failing error handler from
    /// looping forever.
    pub(crate) fn invoke_error_caught(&self, err: BoxError) {
        self.assert_in_event_loop();
        let handler = self.handler();
        if let Err(secondary) = handler.borrow_mut().error_caught(self, err) {
            tracing::warn!(
                handler = %self.name(),
                error = %secondary,
                "error_caught raised an error; discarding it"
            );
        }
    }

    pub(crate) fn invoke_write(&self, data: Payload, promise: Promise) {
        self.assert_in_event_loop();
        let handler = self.handler();
        handler.borrow_mut().write(self, data, promise);
    }

    /// Write then flush on the same handler, in that order, always.
    ///
    /// No atomicity between the two steps: the flush runs even if the
    /// write step has already failed its promise.
    pub(crate) fn invoke_write_and_flush(&self, data: Payload, promise: Promise) {
        self.assert_in_event_loop();
        let handler = self.handler();
        let mut handler = handler.borrow_mut();
        handler.write(self, data, promise);
        handler.flush(self);
    }

    pub(crate) fn invoke_flush(&self) {
        self.assert_in_event_loop();
        let handler = self.handler();
        handler.borrow_mut().flush(self);
    }

    pub(crate) fn invoke_read(&self) {
        self.assert_in_event_loop();
        let handler = self.handler();
        handler.borrow_mut().read(self);
    }

    pub(crate) fn invoke_close(&self, promise: Promise) {
        self.assert_in_event_loop();
        let handler = self.handler();
        handler.borrow_mut().close(self, promise);
    }

    /// Run the `handler_added` hook; failures go back to the pipeline.
    pub(crate) fn invoke_handler_added(&self) -> Result<(), BoxError> {
        self.assert_in_event_loop();
        let handler = self.handler();
        handler.borrow_mut().handler_added(self)
    }

    /// Run the `handler_removed` hook; failures go back to the pipeline.
    pub(crate) fn invoke_handler_removed(&self) -> Result<(), BoxError> {
        self.assert_in_event_loop();
        let handler = self.handler();
        handler.borrow_mut().handler_removed(self)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Redirect a handler-raised inbound failure to this same node's
    /// `error_caught`. The error never advances along the chain unless
    /// the error handler fires it onward itself.
    fn catch_inbound(&self, outcome: Result<(), BoxError>) {
        if let Err(err) = outcome {
            self.invoke_error_caught(err);
        }
    }

    /// Clone out the handler so the chain borrow is released before user
    /// code runs; a handler may re-enter the chain through its context.
    fn handler(&self) -> Rc<RefCell<dyn crate::Handler>> {
        Rc::clone(&self.inner.borrow().node(self.node).handler)
    }

    fn assert_in_event_loop(&self) {
        let inner = self.inner.borrow();
        assert!(
            inner.event_loop.in_event_loop(),
            "handler '{}' dispatched outside its pipeline's event loop",
            inner.node(self.node).name
        );
    }

    fn next_ctx(&self, op: &str) -> Context {
        let inner = self.inner.borrow();
        let node = inner.node(self.node);
        match node.next {
            Some(next) => Context::new(Rc::clone(&self.inner), next),
            None => panic!("{op} on '{}': no handler after it in the chain", node.name),
        }
    }

    fn prev_ctx(&self, op: &str) -> Context {
        let inner = self.inner.borrow();
        let node = inner.node(self.node);
        match node.prev {
            Some(prev) => Context::new(Rc::clone(&self.inner), prev),
            None => panic!("{op} on '{}': no handler before it in the chain", node.name),
        }
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context").field("handler", &self.name()).finish()
    }
}
