//! DMA buffer management for the report transfer

pub mod buffer;

pub use buffer::{BufferSlot, DmaBuffer};

/// DMA buffer alignment requirement (32-byte cache line)
pub const DMA_ALIGNMENT: u64 = 32;
