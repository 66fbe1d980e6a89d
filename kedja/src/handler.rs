//! The handler capability: the unit of protocol logic owned by a chain node.

use crate::context::Context;
use kedja_core::{BoxError, Payload, Promise};

/// A unit of protocol logic installed in a pipeline.
///
/// Every method has a no-op default, so a handler implements only the
/// events it cares about. Propagation is always explicit: the dispatcher
/// delivers an event to *one* handler, and that handler decides whether
/// the event continues down the chain by calling the matching `fire_*`
/// (inbound) or outbound method on its [`Context`].
///
/// # Failure signaling
///
/// Inbound and lifecycle methods return `Result`; an `Err` is caught at
/// the owning node and redirected to that same node's
/// [`error_caught`](Handler::error_caught) — it is never forwarded along
/// the chain automatically. Outbound methods return `()`: an outbound
/// operation reports failure by failing the [`Promise`] it was handed,
/// never by raising.
///
/// # Example
///
/// ```rust,ignore
/// struct Framer;
///
/// impl Handler for Framer {
///     fn channel_read(&mut self, ctx: &Context, data: Payload) -> Result<(), BoxError> {
///         let bytes: Vec<u8> = data.downcast().map_err(|_| "expected bytes")?;
///         for frame in split_frames(bytes) {
///             ctx.fire_channel_read(Payload::new(frame));
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Handler: 'static {
    /// Called once, right after this handler's node is linked into a chain.
    fn handler_added(&mut self, ctx: &Context) -> Result<(), BoxError> {
        let _ = ctx;
        Ok(())
    }

    /// Called once, right before this handler's node is unlinked from its
    /// chain.
    fn handler_removed(&mut self, ctx: &Context) -> Result<(), BoxError> {
        let _ = ctx;
        Ok(())
    }

    /// The channel was registered with its event loop.
    fn channel_registered(&mut self, ctx: &Context) -> Result<(), BoxError> {
        let _ = ctx;
        Ok(())
    }

    /// The channel was unregistered from its event loop.
    fn channel_unregistered(&mut self, ctx: &Context) -> Result<(), BoxError> {
        let _ = ctx;
        Ok(())
    }

    /// The channel became active (connected, ready for traffic).
    fn channel_active(&mut self, ctx: &Context) -> Result<(), BoxError> {
        let _ = ctx;
        Ok(())
    }

    /// The channel became inactive.
    fn channel_inactive(&mut self, ctx: &Context) -> Result<(), BoxError> {
        let _ = ctx;
        Ok(())
    }

    /// Data arrived from the previous node (or the transport, at the head).
    fn channel_read(&mut self, ctx: &Context, data: Payload) -> Result<(), BoxError> {
        let _ = (ctx, data);
        Ok(())
    }

    /// The current read batch is complete.
    fn channel_read_complete(&mut self, ctx: &Context) -> Result<(), BoxError> {
        let _ = ctx;
        Ok(())
    }

    /// The channel's writability flipped.
    fn channel_writability_changed(
        &mut self,
        ctx: &Context,
        writable: bool,
    ) -> Result<(), BoxError> {
        let _ = (ctx, writable);
        Ok(())
    }

    /// A user-defined event is passing through the chain.
    fn user_event_triggered(&mut self, ctx: &Context, event: Payload) -> Result<(), BoxError> {
        let _ = (ctx, event);
        Ok(())
    }

    /// An error was raised by this node's own handler, or fired here by the
    /// previous node.
    ///
    /// An `Err` from this method is discarded: this is the terminal sink
    /// for failures that themselves fail.
    fn error_caught(&mut self, ctx: &Context, err: BoxError) -> Result<(), BoxError> {
        let _ = (ctx, err);
        Ok(())
    }

    /// An outbound write is passing through. Perform it or forward it with
    /// `ctx.write`; either way the `promise` must eventually be completed
    /// by whoever performs the operation.
    fn write(&mut self, ctx: &Context, data: Payload, promise: Promise) {
        let _ = (ctx, data, promise);
    }

    /// Flush previously written data toward the transport.
    fn flush(&mut self, ctx: &Context) {
        let _ = ctx;
    }

    /// Request more inbound data from the transport.
    fn read(&mut self, ctx: &Context) {
        let _ = ctx;
    }

    /// An outbound close request is passing through.
    fn close(&mut self, ctx: &Context, promise: Promise) {
        let _ = (ctx, promise);
    }
}

impl core::fmt::Debug for dyn Handler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("dyn Handler")
    }
}
