//! The pipeline: owner of the handler chain.
//!
//! The chain is a slotted arena (`Vec<Option<Node>>`) addressed by
//! [`NodeId`]; `prev`/`next` are optional handles, rewritten only here.
//! Slots are never reused, so an id stays valid for the pipeline's
//! lifetime and a removed node leaves a tombstone behind.
//!
//! Chain mutation and dispatch are serialized by running both on the
//! pipeline's event-loop thread; that single-writer discipline is why no
//! locking exists anywhere in the chain.

use crate::config::{Allocator, Config, VecAllocator};
use crate::context::Context;
use crate::handler::Handler;
use kedja_core::{BoxError, Completion, EventLoop, Payload, PipelineError, Promise, ThreadBound};
use std::cell::RefCell;
use std::rc::Rc;

/// Stable handle of one chain node inside its pipeline's arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct NodeId(usize);

/// One chain node: a named handler plus its neighbor links.
pub(crate) struct Node {
    pub(crate) name: Rc<str>,
    pub(crate) handler: Rc<RefCell<dyn Handler>>,
    pub(crate) prev: Option<NodeId>,
    pub(crate) next: Option<NodeId>,
}

pub(crate) struct PipelineInner {
    slots: Vec<Option<Node>>,
    head: Option<NodeId>,
    tail: Option<NodeId>,
    len: usize,
    pub(crate) config: Config,
    pub(crate) event_loop: Rc<dyn EventLoop>,
    pub(crate) allocator: Rc<dyn Allocator>,
}

impl PipelineInner {
    pub(crate) fn node(&self, id: NodeId) -> &Node {
        self.slots[id.0].as_ref().expect("stale node handle: handler was removed")
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.slots[id.0].as_mut().expect("stale node handle: handler was removed")
    }

    fn find(&self, name: &str) -> Option<NodeId> {
        let mut cursor = self.head;
        while let Some(id) = cursor {
            let node = self.node(id);
            if &*node.name == name {
                return Some(id);
            }
            cursor = node.next;
        }
        None
    }

    /// Link a fresh node at the chosen end of the chain.
    fn link(&mut self, name: Rc<str>, handler: Rc<RefCell<dyn Handler>>, first: bool) -> NodeId {
        let id = NodeId(self.slots.len());
        let (prev, next) = if first { (None, self.head) } else { (self.tail, None) };
        self.slots.push(Some(Node { name, handler, prev, next }));
        match (first, prev, next) {
            (true, _, Some(old_head)) => self.node_mut(old_head).prev = Some(id),
            (false, Some(old_tail), _) => self.node_mut(old_tail).next = Some(id),
            _ => {}
        }
        if first || self.head.is_none() {
            self.head = Some(id);
        }
        if !first || self.tail.is_none() {
            self.tail = Some(id);
        }
        self.len += 1;
        id
    }

    /// Unlink a node, repairing its neighbors' links, and take it out of
    /// its slot.
    fn unlink(&mut self, id: NodeId) -> Node {
        let node = self.slots[id.0].take().expect("stale node handle: handler was removed");
        match node.prev {
            Some(prev) => self.node_mut(prev).next = node.next,
            None => self.head = node.next,
        }
        match node.next {
            Some(next) => self.node_mut(next).prev = node.prev,
            None => self.tail = node.prev,
        }
        self.len -= 1;
        node
    }
}

/// A channel's handler pipeline.
///
/// Owns the chain of handler nodes, wires their `prev`/`next` links on
/// insertion and removal, and exposes the shared state (configuration,
/// event loop, allocator) every node reads through it. Cloning a
/// `Pipeline` clones the handle, not the chain.
///
/// A pipeline is bound to one event-loop thread; every membership or
/// dispatch operation asserts it is running there. The type is
/// deliberately not `Send` — moving a pipeline between threads would
/// defeat the single-writer design.
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = Pipeline::new();
/// pipeline.add_last("decoder", Decoder::default())?;
/// pipeline.add_last("app", AppHandler::default())?;
/// pipeline.fire_channel_active();
/// pipeline.fire_channel_read(Payload::new(bytes));
/// ```
#[derive(Clone)]
pub struct Pipeline {
    inner: Rc<RefCell<PipelineInner>>,
}

impl Pipeline {
    /// Create a pipeline bound to the current thread.
    pub fn new() -> Self {
        Self::with_event_loop(Rc::new(ThreadBound::current()))
    }

    /// Create a pipeline bound to the given event loop.
    pub fn with_event_loop(event_loop: Rc<dyn EventLoop>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(PipelineInner {
                slots: Vec::new(),
                head: None,
                tail: None,
                len: 0,
                config: Config::default(),
                event_loop,
                allocator: Rc::new(VecAllocator),
            })),
        }
    }

    pub(crate) fn from_inner(inner: Rc<RefCell<PipelineInner>>) -> Self {
        Self { inner }
    }

    /// The pipeline's current configuration.
    pub fn config(&self) -> Config {
        self.inner.borrow().config.clone()
    }

    /// Replace the pipeline's configuration.
    pub fn set_config(&self, config: Config) {
        self.assert_in_event_loop("set_config");
        self.inner.borrow_mut().config = config;
    }

    /// The pipeline's buffer allocator.
    pub fn allocator(&self) -> Rc<dyn Allocator> {
        Rc::clone(&self.inner.borrow().allocator)
    }

    /// Replace the pipeline's buffer allocator.
    pub fn set_allocator(&self, allocator: Rc<dyn Allocator>) {
        self.assert_in_event_loop("set_allocator");
        self.inner.borrow_mut().allocator = allocator;
    }

    // ------------------------------------------------------------------
    // Membership
    // ------------------------------------------------------------------

    /// Append a handler at the tail of the chain (the application end).
    pub fn add_last(
        &self,
        name: impl Into<String>,
        handler: impl Handler,
    ) -> Result<(), PipelineError> {
        self.add(name.into(), Rc::new(RefCell::new(handler)), false)
    }

    /// Insert a handler at the head of the chain (the transport end).
    pub fn add_first(
        &self,
        name: impl Into<String>,
        handler: impl Handler,
    ) -> Result<(), PipelineError> {
        self.add(name.into(), Rc::new(RefCell::new(handler)), true)
    }

    fn add(
        &self,
        name: String,
        handler: Rc<RefCell<dyn Handler>>,
        first: bool,
    ) -> Result<(), PipelineError> {
        self.assert_in_event_loop("add handler");
        let id = {
            let mut inner = self.inner.borrow_mut();
            if inner.find(&name).is_some() {
                return Err(PipelineError::DuplicateName(name));
            }
            inner.link(Rc::from(name.as_str()), handler, first)
        };
        let ctx = Context::new(Rc::clone(&self.inner), id);
        if let Err(source) = ctx.invoke_handler_added() {
            self.inner.borrow_mut().unlink(id);
            return Err(PipelineError::HandlerAdded { name, source });
        }
        tracing::debug!(handler = %name, first, "handler added to pipeline");
        Ok(())
    }

    /// Remove the named handler, returning it.
    ///
    /// The handler's `handler_removed` hook runs before it is unlinked;
    /// if the hook fails, the removal is aborted and the handler stays
    /// in the chain.
    pub fn remove(&self, name: &str) -> Result<Rc<RefCell<dyn Handler>>, PipelineError> {
        self.assert_in_event_loop("remove handler");
        let id = self
            .inner
            .borrow()
            .find(name)
            .ok_or_else(|| PipelineError::NotFound(name.to_owned()))?;
        let ctx = Context::new(Rc::clone(&self.inner), id);
        ctx.invoke_handler_removed()
            .map_err(|source| PipelineError::HandlerRemoved { name: name.to_owned(), source })?;
        let node = self.inner.borrow_mut().unlink(id);
        tracing::debug!(handler = name, "handler removed from pipeline");
        Ok(node.handler)
    }

    /// The context of the named handler, if it is in the chain.
    pub fn context(&self, name: &str) -> Option<Context> {
        let id = self.inner.borrow().find(name)?;
        Some(Context::new(Rc::clone(&self.inner), id))
    }

    /// The context of the head (transport-end) handler.
    pub fn first_context(&self) -> Option<Context> {
        let head = self.inner.borrow().head?;
        Some(Context::new(Rc::clone(&self.inner), head))
    }

    /// The context of the tail (application-end) handler.
    pub fn last_context(&self) -> Option<Context> {
        let tail = self.inner.borrow().tail?;
        Some(Context::new(Rc::clone(&self.inner), tail))
    }

    /// Handler names in chain order, head to tail.
    pub fn names(&self) -> Vec<String> {
        let inner = self.inner.borrow();
        let mut names = Vec::with_capacity(inner.len);
        let mut cursor = inner.head;
        while let Some(id) = cursor {
            let node = inner.node(id);
            names.push(node.name.to_string());
            cursor = node.next;
        }
        names
    }

    /// Number of handlers in the chain.
    pub fn len(&self) -> usize {
        self.inner.borrow().len
    }

    /// Returns `true` if the chain has no handlers.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ------------------------------------------------------------------
    // Inbound entry points: originate an event at the chain head
    // ------------------------------------------------------------------

    /// Originate a channel-registered event at the head of the chain.
    pub fn fire_channel_registered(&self) {
        self.assert_in_event_loop("fire_channel_registered");
        match self.first_context() {
            Some(ctx) => ctx.invoke_channel_registered(),
            None => self.dropped("channel_registered"),
        }
    }

    /// Originate a channel-unregistered event at the head of the chain.
    pub fn fire_channel_unregistered(&self) {
        self.assert_in_event_loop("fire_channel_unregistered");
        match self.first_context() {
            Some(ctx) => ctx.invoke_channel_unregistered(),
            None => self.dropped("channel_unregistered"),
        }
    }

    /// Originate a channel-active event at the head of the chain.
    pub fn fire_channel_active(&self) {
        self.assert_in_event_loop("fire_channel_active");
        match self.first_context() {
            Some(ctx) => ctx.invoke_channel_active(),
            None => self.dropped("channel_active"),
        }
    }

    /// Originate a channel-inactive event at the head of the chain.
    pub fn fire_channel_inactive(&self) {
        self.assert_in_event_loop("fire_channel_inactive");
        match self.first_context() {
            Some(ctx) => ctx.invoke_channel_inactive(),
            None => self.dropped("channel_inactive"),
        }
    }

    /// Originate inbound data at the head of the chain.
    pub fn fire_channel_read(&self, data: Payload) {
        self.assert_in_event_loop("fire_channel_read");
        match self.first_context() {
            Some(ctx) => ctx.invoke_channel_read(data),
            None => self.dropped("channel_read"),
        }
    }

    /// Originate a read-complete event at the head of the chain.
    pub fn fire_channel_read_complete(&self) {
        self.assert_in_event_loop("fire_channel_read_complete");
        match self.first_context() {
            Some(ctx) => ctx.invoke_channel_read_complete(),
            None => self.dropped("channel_read_complete"),
        }
    }

    /// Originate a writability change at the head of the chain.
    pub fn fire_channel_writability_changed(&self, writable: bool) {
        self.assert_in_event_loop("fire_channel_writability_changed");
        match self.first_context() {
            Some(ctx) => ctx.invoke_channel_writability_changed(writable),
            None => self.dropped("channel_writability_changed"),
        }
    }

    /// Originate a user event at the head of the chain.
    pub fn fire_user_event_triggered(&self, event: Payload) {
        self.assert_in_event_loop("fire_user_event_triggered");
        match self.first_context() {
            Some(ctx) => ctx.invoke_user_event_triggered(event),
            None => self.dropped("user_event_triggered"),
        }
    }

    /// Originate an error at the head of the chain.
    pub fn fire_error_caught(&self, err: BoxError) {
        self.assert_in_event_loop("fire_error_caught");
        match self.first_context() {
            Some(ctx) => ctx.invoke_error_caught(err),
            None => tracing::warn!(error = %err, "error dropped: pipeline has no handlers"),
        }
    }

    // ------------------------------------------------------------------
    // Outbound entry points: originate an operation at the chain tail
    // ------------------------------------------------------------------

    /// Originate a write at the tail of the chain.
    ///
    /// # Panics
    ///
    /// Panics if the chain is empty — an outbound operation with no
    /// handler to perform it is a pipeline-assembly bug.
    pub fn write(&self, data: Payload, promise: Promise) -> Completion {
        let completion = promise.completion();
        self.outbound_entry("write").invoke_write(data, promise);
        completion
    }

    /// Originate a write-and-flush at the tail of the chain.
    pub fn write_and_flush(&self, data: Payload, promise: Promise) -> Completion {
        let completion = promise.completion();
        self.outbound_entry("write_and_flush").invoke_write_and_flush(data, promise);
        completion
    }

    /// Originate a flush at the tail of the chain.
    pub fn flush(&self) {
        self.outbound_entry("flush").invoke_flush();
    }

    /// Originate a read request at the tail of the chain.
    pub fn read(&self) {
        self.outbound_entry("read").invoke_read();
    }

    /// Originate a close request at the tail of the chain.
    pub fn close(&self, promise: Promise) -> Completion {
        let completion = promise.completion();
        self.outbound_entry("close").invoke_close(promise);
        completion
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn outbound_entry(&self, op: &str) -> Context {
        self.assert_in_event_loop(op);
        match self.last_context() {
            Some(ctx) => ctx,
            None => panic!("{op} on empty pipeline: no handler to perform outbound operations"),
        }
    }

    /// An inbound event with no handlers simply falls off the chain end.
    fn dropped(&self, event: &str) {
        tracing::debug!(event, "inbound event dropped: pipeline has no handlers");
    }

    fn assert_in_event_loop(&self, op: &str) {
        assert!(
            self.inner.borrow().event_loop.in_event_loop(),
            "{op} outside the pipeline's event loop"
        );
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline").field("handlers", &self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::Pipeline;
    use crate::handler::Handler;

    struct Noop;
    impl Handler for Noop {}

    #[test]
    fn add_last_appends_in_order() {
        let pipeline = Pipeline::new();
        pipeline.add_last("a", Noop).unwrap();
        pipeline.add_last("b", Noop).unwrap();
        pipeline.add_last("c", Noop).unwrap();
        assert_eq!(pipeline.names(), ["a", "b", "c"]);
        assert_eq!(pipeline.len(), 3);
    }

    #[test]
    fn add_first_prepends() {
        let pipeline = Pipeline::new();
        pipeline.add_last("b", Noop).unwrap();
        pipeline.add_first("a", Noop).unwrap();
        assert_eq!(pipeline.names(), ["a", "b"]);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let pipeline = Pipeline::new();
        pipeline.add_last("dup", Noop).unwrap();
        let err = pipeline.add_last("dup", Noop).unwrap_err();
        assert!(matches!(err, kedja_core::PipelineError::DuplicateName(_)));
        assert_eq!(pipeline.len(), 1);
    }

    #[test]
    fn remove_relinks_neighbors() {
        let pipeline = Pipeline::new();
        pipeline.add_last("a", Noop).unwrap();
        pipeline.add_last("b", Noop).unwrap();
        pipeline.add_last("c", Noop).unwrap();
        pipeline.remove("b").unwrap();
        assert_eq!(pipeline.names(), ["a", "c"]);

        pipeline.remove("a").unwrap();
        pipeline.remove("c").unwrap();
        assert!(pipeline.is_empty());
        assert!(pipeline.first_context().is_none());
        assert!(pipeline.last_context().is_none());
    }

    #[test]
    fn remove_unknown_name_errors() {
        let pipeline = Pipeline::new();
        let err = pipeline.remove("ghost").unwrap_err();
        assert!(matches!(err, kedja_core::PipelineError::NotFound(_)));
    }

    #[test]
    fn context_lookup_by_name() {
        let pipeline = Pipeline::new();
        pipeline.add_last("a", Noop).unwrap();
        assert_eq!(&*pipeline.context("a").unwrap().name(), "a");
        assert!(pipeline.context("missing").is_none());
    }

    #[test]
    fn empty_pipeline_drops_inbound_events() {
        let pipeline = Pipeline::new();
        // Falls off the chain end without panicking.
        pipeline.fire_channel_active();
        pipeline.fire_channel_read(kedja_core::Payload::new(1u8));
    }

    #[test]
    #[should_panic(expected = "empty pipeline")]
    fn empty_pipeline_panics_on_outbound_write() {
        let pipeline = Pipeline::new();
        pipeline.write(kedja_core::Payload::new(1u8), kedja_core::Promise::new());
    }
}
