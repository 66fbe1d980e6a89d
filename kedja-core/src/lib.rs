//! # kedja-core
//!
//! Core primitives for the Kedja channel pipeline framework.
//!
//! This crate has minimal dependencies and is designed to be imported by
//! handler implementations and extensions that don't need the full `kedja`
//! dispatch machinery.
//!
//! # What lives here
//!
//! - [`Payload`] — the opaque value that flows through a pipeline. The
//!   dispatcher never looks inside it; handlers downcast it to the types
//!   their protocol layer understands.
//! - [`Promise`] / [`Completion`] — the completion token for outbound
//!   operations. The producer half is consumed on completion, so a token
//!   can only ever be fulfilled once; the consumer half is cheaply
//!   cloneable and can be observed by any number of parties.
//! - [`EventLoop`] — the thread-affinity capability. A pipeline is bound to
//!   exactly one logical event-loop thread, and every dispatch asserts that
//!   it is running there.
//! - [`PipelineError`] / [`BoxError`] — structured error types for the
//!   operations that *can* fail recoverably. Contract violations (dispatch
//!   off the loop thread, firing past the end of a chain) are panics, not
//!   errors.

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

mod error;
mod event_loop;
mod payload;
mod promise;

// Re-exports
pub use error::{BoxError, CompletionError, PipelineError};
pub use event_loop::{EventLoop, ThreadBound};
pub use payload::Payload;
pub use promise::{Completion, Promise};
