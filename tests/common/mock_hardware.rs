//! Mock host controller and node registry
//!
//! Both mocks write to one shared [`EventLog`] so tests can check the
//! global order of acquisitions and releases. Any operation can be made to
//! fail by name.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use usbmouse::{
    Completion, CompletionSink, DeviceNumber, DmaBuffer, DriverError, EndpointDescriptor,
    EndpointOps, HostController, NodeRegistry, Result, TransferHandle, TransferStatus,
};

/// Ordered record of collaborator calls
#[derive(Default)]
pub struct EventLog {
    events: Mutex<Vec<String>>,
}

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    pub fn count(&self, event: &str) -> usize {
        self.events.lock().unwrap().iter().filter(|e| *e == event).count()
    }
}

/// Operation names that fail until cleared
#[derive(Default)]
pub struct Faults {
    ops: Mutex<HashSet<String>>,
}

impl Faults {
    pub fn fail(&self, op: &str) {
        self.ops.lock().unwrap().insert(op.into());
    }

    pub fn clear(&self) {
        self.ops.lock().unwrap().clear();
    }

    fn check(&self, op: &str) -> Result<()> {
        if self.ops.lock().unwrap().contains(op) {
            Err(DriverError::NoMemory)
        } else {
            Ok(())
        }
    }
}

pub fn wait_until(cond: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(1));
    }
}

/// Host controller that hands completions to the driver on request
pub struct MockHost {
    pub log: Arc<EventLog>,
    pub faults: Faults,
    sink: Mutex<Option<CompletionSink>>,
    armed: AtomicBool,
    submits: AtomicU32,
    next_addr: AtomicU64,
}

impl MockHost {
    pub fn new(log: Arc<EventLog>) -> Self {
        Self {
            log,
            faults: Faults::default(),
            sink: Mutex::new(None),
            armed: AtomicBool::new(false),
            submits: AtomicU32::new(0),
            next_addr: AtomicU64::new(0x2000_0000),
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    pub fn submits(&self) -> u32 {
        self.submits.load(Ordering::SeqCst)
    }

    /// Complete the armed transfer
    ///
    /// Returns `false` if nothing was armed within the timeout.
    pub fn complete(&self, completion: Completion) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !self.armed.swap(false, Ordering::SeqCst) {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
        let sink = self.sink.lock().unwrap().clone();
        sink.map(|s| s.complete(completion)).unwrap_or(false)
    }

    /// Complete and wait for the driver to consume the completion
    ///
    /// Consumption is observed as the next submission.
    pub fn deliver(&self, completion: Completion) {
        let before = self.submits();
        assert!(self.complete(completion), "transfer was not armed");
        wait_until(|| self.submits() > before);
    }

    pub fn deliver_report(&self, report: &[u8]) {
        self.deliver(Completion::success(report));
    }
}

impl HostController for MockHost {
    fn alloc_buffer(&self, len: usize) -> Result<DmaBuffer> {
        self.faults.check("alloc_buffer")?;
        let addr = self.next_addr.fetch_add(0x100, Ordering::SeqCst);
        self.log.push("alloc_buffer");
        DmaBuffer::new(len, addr)
    }

    fn free_buffer(&self, _buffer: DmaBuffer) {
        self.log.push("free_buffer");
    }

    fn alloc_transfer(&self, _endpoint: &EndpointDescriptor, _len: usize) -> Result<TransferHandle> {
        self.faults.check("alloc_transfer")?;
        self.log.push("alloc_transfer");
        Ok(TransferHandle(7))
    }

    fn free_transfer(&self, _handle: TransferHandle) {
        self.log.push("free_transfer");
    }

    fn submit(&self, _handle: TransferHandle, sink: &CompletionSink) -> Result<()> {
        self.faults.check("submit")?;
        *self.sink.lock().unwrap() = Some(sink.clone());
        self.armed.store(true, Ordering::SeqCst);
        self.submits.fetch_add(1, Ordering::SeqCst);
        self.log.push("submit");
        Ok(())
    }

    fn kill(&self, _handle: TransferHandle) {
        self.log.push("kill");
        if self.armed.swap(false, Ordering::SeqCst) {
            if let Some(sink) = self.sink.lock().unwrap().as_ref() {
                sink.complete(Completion::error(TransferStatus::Cancelled));
            }
        }
    }
}

/// Node registry that routes client I/O to bound endpoints
pub struct MockRegistry {
    pub log: Arc<EventLog>,
    pub faults: Faults,
    names: Mutex<HashMap<String, DeviceNumber>>,
    bound: Mutex<HashMap<DeviceNumber, Arc<dyn EndpointOps>>>,
    nodes: Mutex<HashSet<DeviceNumber>>,
    next_minor: AtomicU32,
}

impl MockRegistry {
    pub fn new(log: Arc<EventLog>) -> Self {
        Self {
            log,
            faults: Faults::default(),
            names: Mutex::new(HashMap::new()),
            bound: Mutex::new(HashMap::new()),
            nodes: Mutex::new(HashSet::new()),
            next_minor: AtomicU32::new(0),
        }
    }

    fn lookup(&self, name: &str) -> Option<Arc<dyn EndpointOps>> {
        let number = *self.names.lock().unwrap().get(name)?;
        if !self.nodes.lock().unwrap().contains(&number) {
            return None;
        }
        self.bound.lock().unwrap().get(&number).cloned()
    }

    fn name_of(&self, number: DeviceNumber) -> String {
        self.names
            .lock()
            .unwrap()
            .iter()
            .find(|(_, n)| **n == number)
            .map(|(name, _)| name.clone())
            .unwrap_or_default()
    }

    pub fn has_node(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    pub fn bound_count(&self) -> usize {
        self.bound.lock().unwrap().len()
    }

    /// Client read on a node, as text
    pub fn read(&self, name: &str) -> Option<String> {
        let ops = self.lookup(name)?;
        let mut buf = [0u8; 512];
        let n = ops.read(&mut buf).ok()?;
        Some(String::from_utf8_lossy(&buf[..n]).into_owned())
    }

    /// Client write on a node
    pub fn write(&self, name: &str, input: &[u8]) -> Option<Result<usize>> {
        let ops = self.lookup(name)?;
        Some(ops.write(input))
    }
}

impl NodeRegistry for MockRegistry {
    fn alloc_number(&self, name: &str) -> Result<DeviceNumber> {
        self.faults.check(&format!("alloc_number:{}", name))?;
        let number = DeviceNumber::new(240, self.next_minor.fetch_add(1, Ordering::SeqCst));
        self.names.lock().unwrap().insert(name.into(), number);
        self.log.push(format!("alloc_number:{}", name));
        Ok(number)
    }

    fn release_number(&self, number: DeviceNumber) {
        let name = self.name_of(number);
        self.names.lock().unwrap().retain(|_, n| *n != number);
        self.log.push(format!("release_number:{}", name));
    }

    fn bind(&self, number: DeviceNumber, ops: Arc<dyn EndpointOps>) -> Result<()> {
        let name = self.name_of(number);
        self.faults.check(&format!("bind:{}", name))?;
        self.bound.lock().unwrap().insert(number, ops);
        self.log.push(format!("bind:{}", name));
        Ok(())
    }

    fn unbind(&self, number: DeviceNumber) {
        self.bound.lock().unwrap().remove(&number);
        self.log.push(format!("unbind:{}", self.name_of(number)));
    }

    fn create_node(&self, number: DeviceNumber, name: &str) -> Result<()> {
        self.faults.check(&format!("create_node:{}", name))?;
        self.nodes.lock().unwrap().insert(number);
        self.log.push(format!("create_node:{}", name));
        Ok(())
    }

    fn destroy_node(&self, number: DeviceNumber) {
        self.nodes.lock().unwrap().remove(&number);
        self.log.push(format!("destroy_node:{}", self.name_of(number)));
    }
}
