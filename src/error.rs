//! Driver error types

use core::fmt;

use crate::transfer::TransferStatus;

/// Driver operation result type
pub type Result<T> = core::result::Result<T, DriverError>;

/// Driver error types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriverError {
    /// Transfer completed with a non-success status
    Transport(TransferStatus),
    /// Allocation of session, buffer or descriptor memory failed
    NoMemory,
    /// No transfer descriptors or device numbers left
    NoResources,
    /// A session is already attached
    Busy,
    /// Endpoint descriptor unusable for a relative-motion mouse
    InvalidDescriptor,
    /// Invalid parameter
    InvalidParameter,
    /// Client input rejected (oversized write)
    InvalidInput,
    /// Operation not valid in the current transfer or session state
    InvalidState,
    /// Device went away
    DeviceDisconnected,
}

/// Error taxonomy used to decide how a failure propagates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorCategory {
    /// Non-fatal, logged, transfer resubmitted
    Transport,
    /// Attach step failed; prior steps are unwound
    ResourceExhaustion,
    /// Malformed client input; reported to the caller only
    Protocol,
    /// Operation issued against the wrong state
    State,
}

impl DriverError {
    /// Classify the error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Transport(_) | Self::DeviceDisconnected => ErrorCategory::Transport,
            Self::NoMemory | Self::NoResources | Self::Busy | Self::InvalidDescriptor => {
                ErrorCategory::ResourceExhaustion
            }
            Self::InvalidInput | Self::InvalidParameter => ErrorCategory::Protocol,
            Self::InvalidState => ErrorCategory::State,
        }
    }

    /// Whether the transfer stream survives this error
    pub fn is_recoverable(&self) -> bool {
        self.category() == ErrorCategory::Transport
    }
}

impl From<TransferStatus> for DriverError {
    fn from(status: TransferStatus) -> Self {
        match status {
            TransferStatus::Disconnected => Self::DeviceDisconnected,
            other => Self::Transport(other),
        }
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(status) => write!(f, "Transfer error: {}", status),
            Self::NoMemory => write!(f, "Out of memory"),
            Self::NoResources => write!(f, "No resources available"),
            Self::Busy => write!(f, "Device busy"),
            Self::InvalidDescriptor => write!(f, "Invalid endpoint descriptor"),
            Self::InvalidParameter => write!(f, "Invalid parameter"),
            Self::InvalidInput => write!(f, "Invalid input"),
            Self::InvalidState => write!(f, "Invalid state"),
            Self::DeviceDisconnected => write!(f, "Device disconnected"),
        }
    }
}

impl std::error::Error for DriverError {}
