//! # kedja
//!
//! Channel pipeline event dispatch for Kedja: handler chains with
//! forward/backward propagation.
//!
//! A channel's traffic flows through a [`Pipeline`] — an ordered chain of
//! named [`Handler`]s. Inbound events (data arriving, lifecycle
//! transitions) travel head-to-tail; outbound operations (writes, flushes,
//! close requests) travel tail-to-head. Each handler observes an event
//! through its [`Context`] and decides whether it continues: propagation
//! is always explicit, the dispatcher only supplies the forwarding
//! primitive.
//!
//! ```text
//!                inbound (fire_*)
//!   transport ──▶ [decoder] ──▶ [codec] ──▶ [app]
//!   transport ◀── [decoder] ◀── [codec] ◀── [app]
//!                outbound (write/flush/close)
//! ```
//!
//! # The three layers
//!
//! ## Layer 1: Primitives ([`kedja_core`])
//!
//! The opaque [`Payload`], the [`Promise`]/[`Completion`] token pair for
//! outbound operations, and the [`EventLoop`] affinity capability. These
//! live in `kedja-core` so handler crates can depend on them without the
//! dispatch machinery.
//!
//! ## Layer 2: Dispatch ([`Context`])
//!
//! One context per chain node. `fire_*` forwards an inbound event to the
//! next node; `write`/`flush`/`read`/`close` delegate to the previous one.
//! A failure raised by a node's own handler is caught at that node and
//! redirected to the same node's `error_caught` — never forwarded
//! automatically.
//!
//! ## Layer 3: Assembly ([`Pipeline`])
//!
//! Owns the chain, wires neighbor links on add/remove, runs the
//! `handler_added`/`handler_removed` hooks, and exposes entry points that
//! originate events at the chain ends.
//!
//! # Threading
//!
//! A pipeline belongs to exactly one logical event-loop thread. There are
//! no locks anywhere in the chain; instead, every dispatch asserts
//! [`EventLoop::in_event_loop`] and panics on violation. Callers on other
//! threads must marshal onto the loop thread first. Multiple pipelines on
//! different threads are fine — the affinity is per pipeline, not global.
//!
//! # Error handling
//!
//! - Handler-raised errors (inbound/lifecycle methods): caught locally,
//!   redirected to the owning node's `error_caught`.
//! - Secondary errors (raised *by* `error_caught`): discarded after a
//!   `tracing` warning — the terminal sink.
//! - Outbound failures: reported through the operation's [`Promise`],
//!   never raised.
//! - Contract violations (wrong thread, missing neighbor): panics.

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

mod config;
mod context;
mod handler;
mod pipeline;
pub mod testing;

// Re-exports
pub use config::{Allocator, Config, VecAllocator};
pub use context::Context;
pub use handler::Handler;
pub use kedja_core::{
    BoxError, Completion, CompletionError, EventLoop, Payload, PipelineError, Promise, ThreadBound,
};
pub use pipeline::Pipeline;
