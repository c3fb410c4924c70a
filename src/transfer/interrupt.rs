//! Interrupt transfer completion handling
//!
//! The mouse report stream is a single periodic interrupt IN transfer. Each
//! completion is handled on a dedicated worker thread bound to the
//! transfer's completion channel; the worker feeds the report into
//! [`MouseState`] and immediately re-arms the transfer. Consumers never talk
//! to the worker, only to the shared state.
//!
//! Quiescing sets the shutdown flag and kills the transfer under the same
//! lock that guards resubmission, then joins the worker. After that no
//! completion can be running and none will be re-armed.

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use spin::Mutex;

use crate::dma::{BufferSlot, DmaBuffer};
use crate::error::{DriverError, Result};
use crate::host::{CompletionSink, HostController, TransferHandle};
use crate::state::{CompletionOutcome, MouseState};
use crate::transfer::{Completion, EndpointDescriptor, TransferState};

/// Interrupt transfer states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum InterruptState {
    /// No transfer outstanding
    Idle = 0,
    /// Submitted, waiting for the device
    Armed = 1,
    /// Completion being handled
    Completing = 2,
    /// Cancelled for teardown; never re-armed
    Killed = 3,
}

impl From<u8> for InterruptState {
    fn from(val: u8) -> Self {
        Self::from_u8(val)
    }
}

impl TransferState for InterruptState {
    fn from_u8(val: u8) -> Self {
        match val {
            0 => Self::Idle,
            1 => Self::Armed,
            2 => Self::Completing,
            _ => Self::Killed,
        }
    }

    fn to_u8(self) -> u8 {
        self as u8
    }
}

/// Control block for the report transfer
///
/// Shared between the lifecycle code and the completion worker.
pub struct InterruptTransfer {
    /// Current state
    state: AtomicU8,
    /// Set once teardown has started
    shutdown: AtomicBool,
    /// Serializes resubmission against kill
    submit_lock: Mutex<()>,
    /// Host controller descriptor
    handle: TransferHandle,
    /// Endpoint being polled
    endpoint: EndpointDescriptor,
    /// Negotiated packet length
    packet_len: usize,
    /// Transfer statistics
    stats: InterruptTransferStats,
}

impl InterruptTransfer {
    /// Create idle transfer
    pub fn new(handle: TransferHandle, endpoint: EndpointDescriptor, packet_len: usize) -> Self {
        Self {
            state: AtomicU8::new(InterruptState::Idle as u8),
            shutdown: AtomicBool::new(false),
            submit_lock: Mutex::new(()),
            handle,
            endpoint,
            packet_len,
            stats: InterruptTransferStats::new(),
        }
    }

    /// Get current state
    pub fn state(&self) -> InterruptState {
        InterruptState::load_from(&self.state)
    }

    fn transition_state(&self, new_state: InterruptState) {
        new_state.store_into(&self.state);
    }

    /// Check if teardown has started
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Arm the transfer
    ///
    /// Fails with [`DriverError::InvalidState`] once the transfer has been
    /// killed.
    pub fn submit<H: HostController + ?Sized>(&self, host: &H, sink: &CompletionSink) -> Result<()> {
        let _guard = self.submit_lock.lock();
        if self.is_shutting_down() {
            return Err(DriverError::InvalidState);
        }

        host.submit(self.handle, sink)?;
        self.transition_state(InterruptState::Armed);
        self.stats.record_submission();
        Ok(())
    }

    /// Stop further submissions and cancel the armed transfer
    pub fn kill<H: HostController + ?Sized>(&self, host: &H) {
        let _guard = self.submit_lock.lock();
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        host.kill(self.handle);
        log::debug!(
            "Interrupt transfer killed: ep={:#04x}, state={:?}",
            self.endpoint.address,
            self.state()
        );
    }

    /// Handle one completion
    ///
    /// Lands the payload in `buffer`, feeds it to `state` and records the
    /// outcome. Returns whether the transfer should be re-armed, which is
    /// always the case unless teardown has started.
    pub fn handle_completion(
        &self,
        completion: &Completion,
        buffer: &mut DmaBuffer,
        state: &MouseState,
    ) -> bool {
        if self.is_shutting_down() {
            return false;
        }
        self.transition_state(InterruptState::Completing);
        self.stats.record_completion();

        let outcome = if completion.status.is_success() {
            let len = buffer.fill_from(&completion.data);
            self.stats.record_bytes(len as u32);
            state.apply_completion(buffer.filled(), completion.status)
        } else {
            state.apply_completion(&[], completion.status)
        };

        match outcome {
            CompletionOutcome::Applied { clicked } => {
                if clicked {
                    log::debug!("Left click on ep={:#04x}", self.endpoint.address);
                }
            }
            CompletionOutcome::Disabled => {}
            CompletionOutcome::TransportError(status) => {
                self.stats.record_transport_error();
                log::warn!(
                    "Interrupt transfer error on ep={:#04x}: {}",
                    self.endpoint.address,
                    status
                );
            }
            CompletionOutcome::Uninterpretable => {
                self.stats.record_ignored();
                log::warn!(
                    "Ignoring {}-byte report on ep={:#04x}",
                    buffer.filled().len(),
                    self.endpoint.address
                );
            }
        }

        !self.is_shutting_down()
    }

    /// Host controller descriptor handle
    pub fn handle(&self) -> TransferHandle {
        self.handle
    }

    /// Endpoint being polled
    pub fn endpoint(&self) -> &EndpointDescriptor {
        &self.endpoint
    }

    /// Negotiated packet length
    pub fn packet_len(&self) -> usize {
        self.packet_len
    }

    /// Polling interval
    pub fn interval(&self) -> u8 {
        self.endpoint.interval
    }

    /// Get transfer statistics
    pub fn statistics(&self) -> &InterruptTransferStats {
        &self.stats
    }
}

/// Worker thread bound to the transfer's completion channel
pub struct CompletionWorker {
    transfer: Arc<InterruptTransfer>,
    sink: CompletionSink,
    thread: Option<JoinHandle<()>>,
}

impl CompletionWorker {
    /// Spawn the worker
    ///
    /// The worker takes the packet buffer out of `buffer` when it starts and
    /// parks it there again when it exits.
    pub fn spawn<H>(
        name: &str,
        transfer: Arc<InterruptTransfer>,
        host: Arc<H>,
        state: Arc<MouseState>,
        buffer: Arc<BufferSlot>,
    ) -> Result<Self>
    where
        H: HostController + ?Sized + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let sink = CompletionSink::new(tx);

        let worker_transfer = transfer.clone();
        let worker_sink = sink.clone();
        let thread = thread::Builder::new()
            .name(name.into())
            .spawn(move || {
                run_worker(&worker_transfer, &*host, &state, &buffer, &rx, &worker_sink)
            })
            .map_err(|e| {
                log::error!("Failed to spawn completion worker: {}", e);
                DriverError::NoResources
            })?;

        Ok(Self {
            transfer,
            sink,
            thread: Some(thread),
        })
    }

    /// Completion sink handed to the host controller
    pub fn sink(&self) -> &CompletionSink {
        &self.sink
    }

    /// Check if the worker thread has not been joined yet
    pub fn is_running(&self) -> bool {
        self.thread.is_some()
    }

    /// Stop completions and wait for the one in flight, if any
    ///
    /// Idempotent. On return the packet buffer is parked in its slot again.
    pub fn quiesce<H: HostController + ?Sized>(&mut self, host: &H) {
        self.transfer.kill(host);
        self.sink.wake();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Completion worker panicked");
            }
        }
    }
}

fn run_worker<H: HostController + ?Sized>(
    transfer: &InterruptTransfer,
    host: &H,
    state: &MouseState,
    slot: &BufferSlot,
    rx: &Receiver<Completion>,
    sink: &CompletionSink,
) {
    let mut buffer = match slot.take() {
        Some(buffer) => buffer,
        None => {
            log::error!("Completion worker started without a packet buffer");
            return;
        }
    };

    while let Ok(completion) = rx.recv() {
        if !transfer.handle_completion(&completion, &mut buffer, state) {
            break;
        }
        if let Err(e) = transfer.submit(host, sink) {
            if !transfer.is_shutting_down() {
                transfer.stats.record_resubmit_failure();
                log::error!("Failed to resubmit interrupt transfer: {}", e);
            }
            break;
        }
    }

    if transfer.is_shutting_down() {
        transfer.transition_state(InterruptState::Killed);
    } else {
        transfer.transition_state(InterruptState::Idle);
    }
    slot.put(buffer);
}

/// Interrupt transfer statistics
pub struct InterruptTransferStats {
    submissions: AtomicU32,
    completions: AtomicU32,
    transport_errors: AtomicU32,
    ignored: AtomicU32,
    resubmit_failures: AtomicU32,
    total_bytes: AtomicU32,
}

impl InterruptTransferStats {
    const fn new() -> Self {
        Self {
            submissions: AtomicU32::new(0),
            completions: AtomicU32::new(0),
            transport_errors: AtomicU32::new(0),
            ignored: AtomicU32::new(0),
            resubmit_failures: AtomicU32::new(0),
            total_bytes: AtomicU32::new(0),
        }
    }

    fn record_submission(&self) {
        self.submissions.fetch_add(1, Ordering::Relaxed);
    }

    fn record_completion(&self) {
        self.completions.fetch_add(1, Ordering::Relaxed);
    }

    fn record_transport_error(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
    }

    fn record_ignored(&self) {
        self.ignored.fetch_add(1, Ordering::Relaxed);
    }

    fn record_resubmit_failure(&self) {
        self.resubmit_failures.fetch_add(1, Ordering::Relaxed);
    }

    fn record_bytes(&self, bytes: u32) {
        self.total_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Get total submissions (initial and resubmissions)
    pub fn submissions(&self) -> u32 {
        self.submissions.load(Ordering::Relaxed)
    }

    /// Get total completions handled
    pub fn completions(&self) -> u32 {
        self.completions.load(Ordering::Relaxed)
    }

    /// Get completions with non-success status
    pub fn transport_errors(&self) -> u32 {
        self.transport_errors.load(Ordering::Relaxed)
    }

    /// Get reports too short to interpret
    pub fn ignored(&self) -> u32 {
        self.ignored.load(Ordering::Relaxed)
    }

    /// Get failed resubmissions
    pub fn resubmit_failures(&self) -> u32 {
        self.resubmit_failures.load(Ordering::Relaxed)
    }

    /// Get total bytes received
    pub fn total_bytes(&self) -> u32 {
        self.total_bytes.load(Ordering::Relaxed)
    }
}
