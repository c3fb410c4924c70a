//! Interrupt transfer plumbing
//!
//! Status codes, endpoint parameters and completion records exchanged with
//! the host controller, plus the completion handler in [`interrupt`].

pub mod interrupt;

pub use interrupt::{InterruptState, InterruptTransfer, InterruptTransferStats};

use core::fmt;
use core::sync::atomic::{AtomicU8, Ordering};

use heapless::Vec;

/// Largest interrupt packet a full-speed endpoint can deliver
pub const MAX_PACKET_SIZE: usize = 64;

/// Endpoint direction bit in `bEndpointAddress`
pub const ENDPOINT_DIR_IN: u8 = 0x80;

/// Completion status reported by the host controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferStatus {
    /// Data received
    Success,
    /// Endpoint halted
    Stall,
    /// CRC error on the bus
    Crc,
    /// Device did not respond
    Timeout,
    /// Device sent more than max packet size
    Babble,
    /// Host buffer overrun
    Overflow,
    /// Device went away
    Disconnected,
    /// Transfer was killed by the host
    Cancelled,
}

impl TransferStatus {
    /// Check if this status carries valid data
    pub fn is_success(&self) -> bool {
        *self == Self::Success
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Stall => write!(f, "stall"),
            Self::Crc => write!(f, "crc error"),
            Self::Timeout => write!(f, "timeout"),
            Self::Babble => write!(f, "babble"),
            Self::Overflow => write!(f, "overflow"),
            Self::Disconnected => write!(f, "disconnected"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Interrupt IN endpoint parameters discovered at attach
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EndpointDescriptor {
    /// `bEndpointAddress`, direction bit included
    pub address: u8,
    /// `wMaxPacketSize`; 0 when the device does not report one
    pub max_packet_size: u16,
    /// `bInterval` polling interval
    pub interval: u8,
}

impl EndpointDescriptor {
    /// Create descriptor for an interrupt IN endpoint
    pub const fn new(address: u8, max_packet_size: u16, interval: u8) -> Self {
        Self {
            address,
            max_packet_size,
            interval,
        }
    }

    /// Endpoint number without direction bit
    pub fn number(&self) -> u8 {
        self.address & 0x0F
    }

    /// Check if this is an IN endpoint
    pub fn is_in(&self) -> bool {
        self.address & ENDPOINT_DIR_IN != 0
    }
}

/// One finished transfer as delivered by the host controller
///
/// The payload is held inline so delivering a completion never allocates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Completion status
    pub status: TransferStatus,
    /// Bytes the device wrote, truncated to [`MAX_PACKET_SIZE`]
    pub data: Vec<u8, MAX_PACKET_SIZE>,
}

impl Completion {
    /// Build a completion, truncating `data` to [`MAX_PACKET_SIZE`]
    pub fn new(status: TransferStatus, data: &[u8]) -> Self {
        let len = data.len().min(MAX_PACKET_SIZE);
        let mut payload = Vec::new();
        // Cannot fail: len is bounded by capacity
        let _ = payload.extend_from_slice(&data[..len]);
        Self {
            status,
            data: payload,
        }
    }

    /// Successful completion carrying a report
    pub fn success(data: &[u8]) -> Self {
        Self::new(TransferStatus::Success, data)
    }

    /// Failed completion with no data
    pub fn error(status: TransferStatus) -> Self {
        Self::new(status, &[])
    }
}

/// State machine stored in an atomic byte
pub trait TransferState: Copy {
    /// Decode from the stored byte
    fn from_u8(val: u8) -> Self;

    /// Encode to the stored byte
    fn to_u8(self) -> u8;

    /// Load current state
    fn load_from(cell: &AtomicU8) -> Self {
        Self::from_u8(cell.load(Ordering::Acquire))
    }

    /// Store new state
    fn store_into(self, cell: &AtomicU8) {
        cell.store(self.to_u8(), Ordering::Release);
    }
}
