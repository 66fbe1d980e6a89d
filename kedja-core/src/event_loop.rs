//! Event-loop thread-affinity capability.

use std::thread::{self, ThreadId};

/// Identifies the logical event-loop thread a pipeline is bound to.
///
/// Every dispatch on a pipeline's chain asserts `in_event_loop()` before
/// touching chain state; this assertion is the only concurrency control
/// the dispatcher has, which is what makes the lock-free single-writer
/// design sound. Callers on other threads must marshal onto the loop
/// thread before firing — how they do that belongs to the surrounding
/// runtime, not to this crate.
///
/// Production pipelines use [`ThreadBound`]; tests substitute a
/// deterministic implementation to exercise the violation path.
pub trait EventLoop {
    /// Returns `true` when the calling thread is the event-loop thread.
    fn in_event_loop(&self) -> bool;
}

/// An [`EventLoop`] pinned to the OS thread it was created on.
#[derive(Debug)]
pub struct ThreadBound {
    thread: ThreadId,
}

impl ThreadBound {
    /// Bind to the current thread.
    pub fn current() -> Self {
        Self {
            thread: thread::current().id(),
        }
    }
}

impl EventLoop for ThreadBound {
    fn in_event_loop(&self) -> bool {
        thread::current().id() == self.thread
    }
}
