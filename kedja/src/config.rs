//! Channel configuration and buffer allocation.

/// Shared channel configuration, read by every node through its pipeline.
///
/// The dispatcher never interprets these values; they exist for the
/// transport and protocol handlers built on top of it.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether the transport should keep requesting inbound data on its
    /// own, without an explicit `read()` from the chain.
    pub auto_read: bool,
    /// Pending outbound bytes above which the channel reports itself
    /// unwritable.
    pub write_buffer_high_water_mark: usize,
    /// Pending outbound bytes below which writability is restored.
    pub write_buffer_low_water_mark: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auto_read: true,
            write_buffer_high_water_mark: 64 * 1024,
            write_buffer_low_water_mark: 32 * 1024,
        }
    }
}

/// Buffer allocation capability exposed to handlers via `ctx.alloc()`.
pub trait Allocator {
    /// Allocate a buffer with at least the given capacity.
    fn buffer(&self, capacity: usize) -> Vec<u8>;
}

/// The default allocator: plain `Vec` allocation.
#[derive(Debug, Default)]
pub struct VecAllocator;

impl Allocator for VecAllocator {
    fn buffer(&self, capacity: usize) -> Vec<u8> {
        Vec::with_capacity(capacity)
    }
}
