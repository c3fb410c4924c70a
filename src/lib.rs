#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

//! USB HID mouse driver core
//!
//! Interprets boot-protocol mouse reports arriving on an interrupt IN
//! endpoint and exposes two client endpoints over the shared state: a
//! left-click counter and a cumulative movement tracker.
//!
//! # Core Components
//!
//! - [`hid`] - mouse report layout and parsing
//! - [`state`] - shared click and movement state
//! - [`transfer`] - interrupt transfer state machine and completion worker
//! - [`command`] - `start` / `stop` / `reset` command parsing
//! - [`endpoint`] - client read and write dispatch
//! - [`lifecycle`] - ordered attach and detach
//! - [`host`] - host controller and node registry traits
//! - [`dma`] - packet buffer ownership
//! - [`config`] - driver configuration
//! - [`error`] - error types
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use usbmouse::{AttachInfo, DriverConfig, EndpointDescriptor, HostController, MouseDriver, NodeRegistry};
//!
//! fn run<H: HostController + 'static, R: NodeRegistry + 'static>(host: Arc<H>, registry: Arc<R>) -> usbmouse::Result<()> {
//!     let driver = MouseDriver::new(host, registry, DriverConfig::default())?;
//!     let session = driver.attach(AttachInfo {
//!         vendor_id: 0x046d,
//!         product_id: 0xc077,
//!         endpoint: EndpointDescriptor::new(0x81, 8, 10),
//!     })?;
//!     let text = session.click().render()?;
//!     assert!(text.starts_with("Click count: "));
//!     session.detach();
//!     Ok(())
//! }
//! ```

#[cfg(feature = "defmt")]
use defmt as _;

pub mod command;
pub mod config;
pub mod dma;
pub mod endpoint;
pub mod error;
pub mod hid;
pub mod host;
pub mod lifecycle;
pub mod state;
pub mod transfer;

pub use command::Command;
pub use config::DriverConfig;
pub use dma::{BufferSlot, DmaBuffer};
pub use endpoint::{ClickEndpoint, EndpointOps, MovementEndpoint};
pub use error::{DriverError, ErrorCategory, Result};
pub use hid::{MouseButtons, MouseReport};
pub use host::{CompletionSink, DeviceNumber, HostController, NodeRegistry, TransferHandle};
pub use lifecycle::{AttachInfo, AttachStep, DeviceSession, MouseDriver, ReleaseStack};
pub use state::{CompletionOutcome, Feed, MouseState, MovementSnapshot};
pub use transfer::{
    Completion, EndpointDescriptor, InterruptState, InterruptTransfer, InterruptTransferStats,
    TransferStatus,
};
