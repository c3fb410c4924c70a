//! DMA-capable packet buffer
//!
//! Allocated by the host controller at attach. The completion worker owns it
//! while the transfer is armed and hands it back on quiesce, so it is never
//! released while a completion is still being handled.

use spin::Mutex;

use crate::dma::DMA_ALIGNMENT;
use crate::error::{DriverError, Result};

/// DMA buffer with bus address
pub struct DmaBuffer {
    /// Buffer data
    data: Box<[u8]>,
    /// Bus address the controller writes to
    dma_addr: u64,
    /// Bytes written by the last completed transfer
    filled: usize,
}

impl DmaBuffer {
    /// Create new DMA buffer of `len` zeroed bytes
    ///
    /// `dma_addr` must be aligned to [`DMA_ALIGNMENT`].
    pub fn new(len: usize, dma_addr: u64) -> Result<Self> {
        if len == 0 {
            return Err(DriverError::InvalidParameter);
        }
        if dma_addr % DMA_ALIGNMENT != 0 {
            return Err(DriverError::InvalidParameter);
        }

        Ok(Self {
            data: vec![0u8; len].into_boxed_slice(),
            dma_addr,
            filled: 0,
        })
    }

    /// Get bus address for DMA
    pub fn dma_addr(&self) -> u64 {
        self.dma_addr
    }

    /// Get buffer size
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if buffer has zero capacity
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Land a completed transfer's bytes in the buffer
    ///
    /// Bytes past the buffer length are dropped (babble). Returns the number
    /// of bytes now valid.
    pub fn fill_from(&mut self, bytes: &[u8]) -> usize {
        let len = bytes.len().min(self.data.len());
        self.data[..len].copy_from_slice(&bytes[..len]);
        self.filled = len;
        len
    }

    /// Bytes written by the last completed transfer
    pub fn filled(&self) -> &[u8] {
        &self.data[..self.filled]
    }

    /// Whole buffer
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

impl core::fmt::Debug for DmaBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DmaBuffer")
            .field("len", &self.data.len())
            .field("dma_addr", &format_args!("{:#x}", self.dma_addr))
            .field("filled", &self.filled)
            .finish()
    }
}

/// Parking place for the packet buffer while it changes hands
///
/// Holds the buffer between allocation and worker start, and again after
/// the worker has been joined and before the buffer is released.
pub struct BufferSlot(Mutex<Option<DmaBuffer>>);

impl BufferSlot {
    /// Create empty slot
    pub fn new() -> Self {
        Self(Mutex::new(None))
    }

    /// Park a buffer, returning any buffer already parked
    pub fn put(&self, buffer: DmaBuffer) -> Option<DmaBuffer> {
        self.0.lock().replace(buffer)
    }

    /// Take the parked buffer
    pub fn take(&self) -> Option<DmaBuffer> {
        self.0.lock().take()
    }

    /// Check if a buffer is parked
    pub fn is_occupied(&self) -> bool {
        self.0.lock().is_some()
    }
}

impl Default for BufferSlot {
    fn default() -> Self {
        Self::new()
    }
}
