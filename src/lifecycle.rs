//! Device attach and detach
//!
//! Attach acquires, in order: the session, its state lock, the packet
//! buffer, the transfer descriptor (with its completion worker), the first
//! submission, then the click and movement endpoints (device number, I/O
//! binding, node). Every acquired step pushes its release onto a
//! [`ReleaseStack`]. If a step fails, exactly the steps already taken are
//! released in reverse and nothing of the session stays reachable.
//!
//! Detach first quiesces the transfer and frees the descriptor and buffer,
//! then retires the movement endpoint, then the click endpoint, and frees
//! the session last.

use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use spin::Mutex;

use crate::config::DriverConfig;
use crate::dma::BufferSlot;
use crate::endpoint::{ClickEndpoint, EndpointOps, MovementEndpoint};
use crate::error::{DriverError, Result};
use crate::host::{DeviceNumber, HostController, NodeRegistry};
use crate::state::MouseState;
use crate::transfer::interrupt::CompletionWorker;
use crate::transfer::{EndpointDescriptor, InterruptState, InterruptTransfer, InterruptTransferStats};

/// One acquisition step of the attach protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AttachStep {
    /// Session record
    Session,
    /// Lock guarding the shared state
    StateLock,
    /// DMA-capable packet buffer
    PacketBuffer,
    /// Transfer descriptor and its completion worker
    TransferDescriptor,
    /// Transfer armed
    Submission,
    /// Click endpoint device number
    ClickNumber,
    /// Click endpoint I/O binding
    ClickBinding,
    /// Click endpoint node
    ClickNode,
    /// Movement endpoint device number
    MovementNumber,
    /// Movement endpoint I/O binding
    MovementBinding,
    /// Movement endpoint node
    MovementNode,
}

const CLICK_STEPS: [AttachStep; 3] = [
    AttachStep::ClickNumber,
    AttachStep::ClickBinding,
    AttachStep::ClickNode,
];

const MOVEMENT_STEPS: [AttachStep; 3] = [
    AttachStep::MovementNumber,
    AttachStep::MovementBinding,
    AttachStep::MovementNode,
];

type Release = Box<dyn FnOnce() + Send>;

/// Completed acquisition steps with their release actions
///
/// Unwinds last-in first-out. Dropping a non-empty stack unwinds it.
#[derive(Default)]
pub struct ReleaseStack {
    entries: Vec<(AttachStep, Release)>,
}

impl ReleaseStack {
    /// Create empty stack
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Record a completed step and how to release it
    pub fn push<F>(&mut self, step: AttachStep, release: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.entries.push((step, Box::new(release)));
    }

    /// Steps currently held, oldest first
    pub fn steps(&self) -> Vec<AttachStep> {
        self.entries.iter().map(|(step, _)| *step).collect()
    }

    /// Number of held steps
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is held
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Release every held step, newest first
    ///
    /// Returns the released steps in the order they ran.
    pub fn unwind(&mut self) -> Vec<AttachStep> {
        let mut released = Vec::with_capacity(self.entries.len());
        while let Some((step, release)) = self.entries.pop() {
            log::debug!("Releasing {:?}", step);
            release();
            released.push(step);
        }
        released
    }
}

impl Drop for ReleaseStack {
    fn drop(&mut self) {
        self.unwind();
    }
}

/// Everything a session holds, grouped by release phase
#[derive(Default)]
struct Resources {
    /// Session record and state lock
    core: ReleaseStack,
    /// Buffer, descriptor, submission
    hardware: ReleaseStack,
    /// Click then movement registrations
    endpoints: ReleaseStack,
}

impl Resources {
    /// Strict reverse of acquisition
    fn unwind_attach(&mut self) -> Vec<AttachStep> {
        let mut released = self.endpoints.unwind();
        released.extend(self.hardware.unwind());
        released.extend(self.core.unwind());
        released
    }

    /// Hardware quiesced first, then endpoints, then the session
    fn unwind_detach(&mut self) -> Vec<AttachStep> {
        let mut released = self.hardware.unwind();
        released.extend(self.endpoints.unwind());
        released.extend(self.core.unwind());
        released
    }

    fn is_empty(&self) -> bool {
        self.core.is_empty() && self.hardware.is_empty() && self.endpoints.is_empty()
    }
}

impl Drop for Resources {
    fn drop(&mut self) {
        self.unwind_detach();
    }
}

/// What the host reports when a mouse interface is attached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachInfo {
    /// USB vendor id
    pub vendor_id: u16,
    /// USB product id
    pub product_id: u16,
    /// Interrupt IN endpoint carrying reports
    pub endpoint: EndpointDescriptor,
}

/// Lifecycle manager for one mouse attachment
///
/// Owns the collaborator handles and configuration. At most one
/// [`DeviceSession`] exists per driver at a time.
pub struct MouseDriver<H: ?Sized, R: ?Sized> {
    host: Arc<H>,
    registry: Arc<R>,
    config: DriverConfig,
    attached: Arc<AtomicBool>,
}

type StepResult<T> = core::result::Result<T, (AttachStep, DriverError)>;

impl<H, R> MouseDriver<H, R>
where
    H: HostController + ?Sized + 'static,
    R: NodeRegistry + ?Sized + 'static,
{
    /// Create driver after validating `config`
    pub fn new(host: Arc<H>, registry: Arc<R>, config: DriverConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            host,
            registry,
            config,
            attached: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Driver configuration
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Check if a session is currently alive
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    /// Run the attach protocol
    ///
    /// On failure every step already taken has been released before this
    /// returns.
    pub fn attach(&self, info: AttachInfo) -> Result<DeviceSession> {
        if !info.endpoint.is_in() {
            log::error!("Endpoint {:#04x} is not an IN endpoint", info.endpoint.address);
            return Err(DriverError::InvalidDescriptor);
        }
        let packet_len = self.config.packet_len_for(&info.endpoint)?;

        if self.attached.swap(true, Ordering::AcqRel) {
            log::warn!(
                "Mouse {:04x}:{:04x} ignored, a session is already attached",
                info.vendor_id,
                info.product_id
            );
            return Err(DriverError::Busy);
        }

        let mut resources = Resources::default();
        match self.acquire(&info, packet_len, &mut resources) {
            Ok(parts) => {
                log::info!(
                    "USB mouse {:04x}:{:04x} connected: ep={:#04x}, {} byte packets, interval {}",
                    info.vendor_id,
                    info.product_id,
                    info.endpoint.address,
                    packet_len,
                    info.endpoint.interval
                );
                Ok(DeviceSession {
                    info,
                    state: parts.state,
                    transfer: parts.transfer,
                    click: parts.click,
                    movement: parts.movement,
                    click_number: parts.click_number,
                    movement_number: parts.movement_number,
                    resources,
                })
            }
            Err((step, err)) => {
                log::error!(
                    "Attach of {:04x}:{:04x} failed at {:?}: {}",
                    info.vendor_id,
                    info.product_id,
                    step,
                    err
                );
                let released = resources.unwind_attach();
                log::debug!("Unwound {:?}", released);
                Err(err)
            }
        }
    }

    fn acquire(
        &self,
        info: &AttachInfo,
        packet_len: usize,
        res: &mut Resources,
    ) -> StepResult<SessionParts> {
        let attached = self.attached.clone();
        res.core.push(AttachStep::Session, move || {
            attached.store(false, Ordering::Release)
        });

        let state = Arc::new(MouseState::new(self.config.raw_prefix_len));
        res.core.push(AttachStep::StateLock, || {});

        let slot = Arc::new(BufferSlot::new());
        let buffer = self
            .host
            .alloc_buffer(packet_len)
            .map_err(|e| (AttachStep::PacketBuffer, e))?;
        slot.put(buffer);
        {
            let host = self.host.clone();
            let slot = slot.clone();
            res.hardware.push(AttachStep::PacketBuffer, move || match slot.take() {
                Some(buffer) => host.free_buffer(buffer),
                None => log::error!("Packet buffer not parked at release"),
            });
        }

        let handle = self
            .host
            .alloc_transfer(&info.endpoint, packet_len)
            .map_err(|e| (AttachStep::TransferDescriptor, e))?;
        let worker_cell: Arc<Mutex<Option<CompletionWorker>>> = Arc::new(Mutex::new(None));
        {
            let host = self.host.clone();
            let cell = worker_cell.clone();
            res.hardware.push(AttachStep::TransferDescriptor, move || {
                quiesce_worker(&cell, &*host);
                host.free_transfer(handle);
            });
        }

        let transfer = Arc::new(InterruptTransfer::new(handle, info.endpoint, packet_len));
        let worker = CompletionWorker::spawn(
            &self.config.worker_name,
            transfer.clone(),
            self.host.clone(),
            state.clone(),
            slot,
        )
        .map_err(|e| (AttachStep::TransferDescriptor, e))?;
        let sink = worker.sink().clone();
        *worker_cell.lock() = Some(worker);

        transfer
            .submit(&*self.host, &sink)
            .map_err(|e| (AttachStep::Submission, e))?;
        {
            let host = self.host.clone();
            let cell = worker_cell;
            res.hardware.push(AttachStep::Submission, move || {
                quiesce_worker(&cell, &*host)
            });
        }

        let click = ClickEndpoint::new(state.clone(), self.config.command_buffer_len);
        let click_number = self.register(
            &mut res.endpoints,
            CLICK_STEPS,
            &self.config.click_node_name,
            Arc::new(click.clone()),
        )?;

        let movement = MovementEndpoint::new(state.clone(), self.config.command_buffer_len);
        let movement_number = self.register(
            &mut res.endpoints,
            MOVEMENT_STEPS,
            &self.config.movement_node_name,
            Arc::new(movement.clone()),
        )?;

        Ok(SessionParts {
            state,
            transfer,
            click,
            movement,
            click_number,
            movement_number,
        })
    }

    fn register(
        &self,
        stack: &mut ReleaseStack,
        steps: [AttachStep; 3],
        name: &str,
        ops: Arc<dyn EndpointOps>,
    ) -> StepResult<DeviceNumber> {
        let [number_step, binding_step, node_step] = steps;

        let number = self
            .registry
            .alloc_number(name)
            .map_err(|e| (number_step, e))?;
        let registry = self.registry.clone();
        stack.push(number_step, move || registry.release_number(number));

        self.registry
            .bind(number, ops)
            .map_err(|e| (binding_step, e))?;
        let registry = self.registry.clone();
        stack.push(binding_step, move || registry.unbind(number));

        self.registry
            .create_node(number, name)
            .map_err(|e| (node_step, e))?;
        let registry = self.registry.clone();
        stack.push(node_step, move || registry.destroy_node(number));

        log::debug!("Registered {} as {}:{}", name, number.major, number.minor);
        Ok(number)
    }
}

fn quiesce_worker<H: HostController + ?Sized>(cell: &Mutex<Option<CompletionWorker>>, host: &H) {
    let worker = cell.lock().take();
    if let Some(mut worker) = worker {
        worker.quiesce(host);
    }
}

struct SessionParts {
    state: Arc<MouseState>,
    transfer: Arc<InterruptTransfer>,
    click: ClickEndpoint,
    movement: MovementEndpoint,
    click_number: DeviceNumber,
    movement_number: DeviceNumber,
}

/// One attached mouse
///
/// Dropping the session runs the detach protocol.
pub struct DeviceSession {
    info: AttachInfo,
    state: Arc<MouseState>,
    transfer: Arc<InterruptTransfer>,
    click: ClickEndpoint,
    movement: MovementEndpoint,
    click_number: DeviceNumber,
    movement_number: DeviceNumber,
    resources: Resources,
}

impl DeviceSession {
    /// Click counter endpoint
    pub fn click(&self) -> &ClickEndpoint {
        &self.click
    }

    /// Movement tracker endpoint
    pub fn movement(&self) -> &MovementEndpoint {
        &self.movement
    }

    /// Device number of the click endpoint
    pub fn click_number(&self) -> DeviceNumber {
        self.click_number
    }

    /// Device number of the movement endpoint
    pub fn movement_number(&self) -> DeviceNumber {
        self.movement_number
    }

    /// Attach information
    pub fn info(&self) -> &AttachInfo {
        &self.info
    }

    /// Shared state behind both endpoints
    pub fn state(&self) -> &MouseState {
        &self.state
    }

    /// Negotiated packet length
    pub fn packet_len(&self) -> usize {
        self.transfer.packet_len()
    }

    /// Current report transfer state
    pub fn transfer_state(&self) -> InterruptState {
        self.transfer.state()
    }

    /// Report transfer statistics
    pub fn statistics(&self) -> &InterruptTransferStats {
        self.transfer.statistics()
    }

    /// Run the detach protocol
    ///
    /// Returns the released steps in the order they ran.
    pub fn detach(mut self) -> Vec<AttachStep> {
        self.release()
    }

    fn release(&mut self) -> Vec<AttachStep> {
        if self.resources.is_empty() {
            return Vec::new();
        }
        let released = self.resources.unwind_detach();
        log::info!(
            "USB mouse {:04x}:{:04x} disconnected",
            self.info.vendor_id,
            self.info.product_id
        );
        released
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<AttachStep>>>, impl Fn(AttachStep) -> Release) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log2 = log.clone();
        let make = move |step: AttachStep| -> Release {
            let log = log2.clone();
            Box::new(move || log.lock().push(step))
        };
        (log, make)
    }

    #[test]
    fn test_release_stack_lifo() {
        let (log, make) = recorder();
        let mut stack = ReleaseStack::new();
        for step in [AttachStep::Session, AttachStep::StateLock, AttachStep::PacketBuffer] {
            stack.push(step, make(step));
        }
        assert_eq!(stack.len(), 3);
        assert_eq!(
            stack.steps(),
            vec![AttachStep::Session, AttachStep::StateLock, AttachStep::PacketBuffer]
        );

        let released = stack.unwind();
        assert_eq!(
            released,
            vec![AttachStep::PacketBuffer, AttachStep::StateLock, AttachStep::Session]
        );
        assert_eq!(*log.lock(), released);
        assert!(stack.is_empty());
        assert!(stack.unwind().is_empty());
    }

    #[test]
    fn test_release_stack_unwinds_on_drop() {
        let (log, make) = recorder();
        {
            let mut stack = ReleaseStack::new();
            stack.push(AttachStep::ClickNumber, make(AttachStep::ClickNumber));
            stack.push(AttachStep::ClickBinding, make(AttachStep::ClickBinding));
        }
        assert_eq!(
            *log.lock(),
            vec![AttachStep::ClickBinding, AttachStep::ClickNumber]
        );
    }

    #[test]
    fn test_resource_phase_ordering() {
        let (log, make) = recorder();
        let fill = |res: &mut Resources| {
            res.core.push(AttachStep::Session, make(AttachStep::Session));
            res.hardware.push(AttachStep::PacketBuffer, make(AttachStep::PacketBuffer));
            res.hardware.push(AttachStep::Submission, make(AttachStep::Submission));
            res.endpoints.push(AttachStep::ClickNode, make(AttachStep::ClickNode));
            res.endpoints.push(AttachStep::MovementNode, make(AttachStep::MovementNode));
        };

        let mut res = Resources::default();
        fill(&mut res);
        assert_eq!(
            res.unwind_attach(),
            vec![
                AttachStep::MovementNode,
                AttachStep::ClickNode,
                AttachStep::Submission,
                AttachStep::PacketBuffer,
                AttachStep::Session,
            ]
        );
        assert!(res.is_empty());

        fill(&mut res);
        assert_eq!(
            res.unwind_detach(),
            vec![
                AttachStep::Submission,
                AttachStep::PacketBuffer,
                AttachStep::MovementNode,
                AttachStep::ClickNode,
                AttachStep::Session,
            ]
        );
        assert_eq!(log.lock().len(), 10);
    }
}
