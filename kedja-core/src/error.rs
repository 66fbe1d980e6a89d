//! Error types for Kedja.
//!
//! Only recoverable failures are modeled as error values:
//!
//! - [`PipelineError`] - chain membership operations (add/remove)
//! - [`CompletionError`] - the shared failure value of a completion token
//! - [`BoxError`] - the error type handlers report from their methods
//!
//! Contract violations — dispatching off the event-loop thread, or firing
//! toward a neighbor that does not exist — indicate a programming bug in
//! the pipeline assembly or its caller and are surfaced as panics instead.

use std::rc::Rc;
use thiserror::Error;

/// A boxed error type for handler-raised failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors from pipeline membership operations.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A handler with this name is already registered in the pipeline.
    #[error("duplicate handler name: {0}")]
    DuplicateName(String),

    /// No handler with this name is registered in the pipeline.
    #[error("no handler named: {0}")]
    NotFound(String),

    /// The handler's `handler_added` hook failed; the add was rolled back.
    #[error("handler_added failed for {name}")]
    HandlerAdded {
        /// Name the handler was being registered under.
        name: String,
        /// The error the hook reported.
        #[source]
        source: BoxError,
    },

    /// The handler's `handler_removed` hook failed; the handler stays in
    /// the chain.
    #[error("handler_removed failed for {name}")]
    HandlerRemoved {
        /// Name of the handler that refused removal.
        name: String,
        /// The error the hook reported.
        #[source]
        source: BoxError,
    },
}

/// The failure value of a completed [`Completion`].
///
/// A completion token may be observed by any number of consumers, so the
/// underlying error is reference-counted and every observer receives a
/// clone of the same shared value.
///
/// [`Completion`]: crate::Completion
#[derive(Clone, Debug)]
pub struct CompletionError(Rc<BoxError>);

impl CompletionError {
    pub(crate) fn new(err: BoxError) -> Self {
        Self(Rc::new(err))
    }

    /// Borrow the underlying error.
    pub fn get_ref(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.0.as_ref().as_ref()
    }
}

impl std::fmt::Display for CompletionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "operation failed: {}", self.0)
    }
}

impl std::error::Error for CompletionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.get_ref())
    }
}
