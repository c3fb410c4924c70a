//! Host-side collaborators
//!
//! The driver consumes these; it does not implement them. A
//! [`HostController`] allocates DMA memory and transfer descriptors and runs
//! interrupt transfers. A [`NodeRegistry`] hands out device numbers and
//! exposes registered endpoints to clients.

use std::sync::mpsc::Sender;
use std::sync::Arc;

use crate::dma::DmaBuffer;
use crate::endpoint::EndpointOps;
use crate::error::Result;
use crate::transfer::{Completion, EndpointDescriptor, TransferStatus};

/// Opaque transfer descriptor handle issued by the host controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransferHandle(pub u32);

/// Device number assigned to a logical endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceNumber {
    /// Major number
    pub major: u32,
    /// Minor number
    pub minor: u32,
}

impl DeviceNumber {
    /// Create device number
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

/// Where the host controller delivers completions for one transfer
///
/// Delivery never blocks. Once the transfer has been quiesced, deliveries
/// are dropped.
#[derive(Clone)]
pub struct CompletionSink {
    tx: Sender<Completion>,
}

impl CompletionSink {
    pub(crate) fn new(tx: Sender<Completion>) -> Self {
        Self { tx }
    }

    /// Deliver a completion
    ///
    /// Returns `false` if nobody is listening any more.
    pub fn complete(&self, completion: Completion) -> bool {
        self.tx.send(completion).is_ok()
    }

    /// Wake the completion worker so it can observe shutdown
    pub(crate) fn wake(&self) {
        let _ = self.tx.send(Completion::error(TransferStatus::Cancelled));
    }
}

/// USB host controller operations used by the driver
pub trait HostController: Send + Sync {
    /// Allocate a DMA-capable buffer of `len` bytes
    fn alloc_buffer(&self, len: usize) -> Result<DmaBuffer>;

    /// Return a buffer obtained from [`alloc_buffer`](Self::alloc_buffer)
    fn free_buffer(&self, buffer: DmaBuffer);

    /// Allocate a transfer descriptor for an interrupt IN endpoint
    fn alloc_transfer(&self, endpoint: &EndpointDescriptor, len: usize) -> Result<TransferHandle>;

    /// Release a transfer descriptor; never called while it is armed
    fn free_transfer(&self, handle: TransferHandle);

    /// Arm the transfer; the next completion goes to `sink`
    fn submit(&self, handle: TransferHandle, sink: &CompletionSink) -> Result<()>;

    /// Cancel the armed transfer, if any
    fn kill(&self, handle: TransferHandle);
}

/// Device number and node registration used by the driver
pub trait NodeRegistry: Send + Sync {
    /// Reserve a device number for `name`
    fn alloc_number(&self, name: &str) -> Result<DeviceNumber>;

    /// Release a reserved device number
    fn release_number(&self, number: DeviceNumber);

    /// Route client reads and writes on `number` to `ops`
    fn bind(&self, number: DeviceNumber, ops: Arc<dyn EndpointOps>) -> Result<()>;

    /// Stop routing client I/O for `number`
    fn unbind(&self, number: DeviceNumber);

    /// Create the client-visible node
    fn create_node(&self, number: DeviceNumber, name: &str) -> Result<()>;

    /// Remove the client-visible node
    fn destroy_node(&self, number: DeviceNumber);
}
