//! Shared test utilities
//!
//! Wires a [`MouseDriver`] to the mock host and registry.

#![allow(dead_code)]

pub mod mock_hardware;

use std::sync::Arc;

use usbmouse::{AttachInfo, DriverConfig, EndpointDescriptor, MouseDriver};

pub use mock_hardware::{wait_until, EventLog, MockHost, MockRegistry};

pub const CLICK: &str = "usbmouse_click";
pub const MOVEMENT: &str = "usbmouse_movement";

/// Report from the reference scenario: left held, dx = 5, dy = -5
pub const LEFT_RIGHT_UP: [u8; 8] = [0x01, 0x00, 0x05, 0x00, 0xFB, 0xFF, 0x00, 0x00];

pub struct Rig {
    pub log: Arc<EventLog>,
    pub host: Arc<MockHost>,
    pub registry: Arc<MockRegistry>,
    pub driver: MouseDriver<MockHost, MockRegistry>,
}

pub fn rig() -> Rig {
    rig_with(DriverConfig::default())
}

pub fn rig_with(config: DriverConfig) -> Rig {
    let log = Arc::new(EventLog::default());
    let host = Arc::new(MockHost::new(log.clone()));
    let registry = Arc::new(MockRegistry::new(log.clone()));
    let driver = MouseDriver::new(host.clone(), registry.clone(), config).unwrap();
    Rig {
        log,
        host,
        registry,
        driver,
    }
}

pub fn mouse() -> AttachInfo {
    AttachInfo {
        vendor_id: 0x046d,
        product_id: 0xc077,
        endpoint: EndpointDescriptor::new(0x81, 8, 10),
    }
}

pub fn report(buttons: u8, dx: i16, dy: i16) -> [u8; 8] {
    let dx = dx.to_le_bytes();
    let dy = dy.to_le_bytes();
    [buttons, 0, dx[0], dx[1], dy[0], dy[1], 0, 0]
}
