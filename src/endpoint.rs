//! Click and movement endpoints
//!
//! Each endpoint is a thin dispatcher over [`MouseState`]: reads render a
//! text snapshot, writes are matched against the command prefixes.
//!
//! Reads never wait for the device. The movement endpoint returns zero bytes
//! until the first packet has arrived, so clients poll.

use core::fmt::Write;
use std::sync::Arc;

use heapless::String;

use crate::command::Command;
use crate::error::{DriverError, Result};
use crate::state::{Feed, MouseState};

/// Capacity of the rendered read text
const RENDER_CAPACITY: usize = 400;

/// Operations a registered device node forwards to the driver
pub trait EndpointOps: Send + Sync {
    /// Feed served by this endpoint
    fn feed(&self) -> Feed;

    /// Copy the current rendering into `buf`, returning bytes written
    fn read(&self, buf: &mut [u8]) -> Result<usize>;

    /// Consume a command write, returning bytes consumed
    fn write(&self, input: &[u8]) -> Result<usize>;
}

/// Shared write path for both feeds
fn dispatch_write(state: &MouseState, feed: Feed, limit: usize, input: &[u8]) -> Result<usize> {
    if input.len() > limit {
        log::debug!("{:?} write of {} bytes exceeds {}", feed, input.len(), limit);
        return Err(DriverError::InvalidInput);
    }

    match Command::parse(input) {
        Some(cmd) => {
            state.apply_command(feed, cmd);
            log::info!("{:?} feed: {}", feed, cmd.as_str());
        }
        None => {
            log::warn!(
                "{:?} feed: unrecognized command {:?}",
                feed,
                core::str::from_utf8(input).unwrap_or("<non-utf8>")
            );
        }
    }

    Ok(input.len())
}

fn copy_out(text: &str, buf: &mut [u8]) -> usize {
    let len = text.len().min(buf.len());
    buf[..len].copy_from_slice(&text.as_bytes()[..len]);
    len
}

/// Left-click counter endpoint
#[derive(Clone)]
pub struct ClickEndpoint {
    state: Arc<MouseState>,
    write_limit: usize,
}

impl ClickEndpoint {
    /// Create endpoint over shared state
    pub fn new(state: Arc<MouseState>, write_limit: usize) -> Self {
        Self { state, write_limit }
    }

    /// Render `"Click count: N\n"`
    pub fn render(&self) -> Result<String<RENDER_CAPACITY>> {
        let mut text = String::new();
        writeln!(text, "Click count: {}", self.state.read_click_count())
            .map_err(|_| DriverError::NoMemory)?;
        Ok(text)
    }
}

impl EndpointOps for ClickEndpoint {
    fn feed(&self) -> Feed {
        Feed::Click
    }

    fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let text = self.render()?;
        Ok(copy_out(&text, buf))
    }

    fn write(&self, input: &[u8]) -> Result<usize> {
        dispatch_write(&self.state, Feed::Click, self.write_limit, input)
    }
}

/// Cursor position endpoint
#[derive(Clone)]
pub struct MovementEndpoint {
    state: Arc<MouseState>,
    write_limit: usize,
}

impl MovementEndpoint {
    /// Create endpoint over shared state
    pub fn new(state: Arc<MouseState>, write_limit: usize) -> Self {
        Self { state, write_limit }
    }

    /// Render `"Position: (X, Y)\nRaw packet: 0x.. 0x.. 0x..\n"`
    ///
    /// Returns `None` if no packet has arrived yet.
    pub fn render(&self) -> Result<Option<String<RENDER_CAPACITY>>> {
        let snap = match self.state.read_movement() {
            Some(snap) => snap,
            None => return Ok(None),
        };

        let mut text = String::new();
        let overflow = |_| DriverError::NoMemory;
        writeln!(text, "Position: ({}, {})", snap.x, snap.y).map_err(overflow)?;
        text.push_str("Raw packet:").map_err(|_| DriverError::NoMemory)?;
        for byte in snap.raw_prefix.iter() {
            write!(text, " {:#04x}", byte).map_err(overflow)?;
        }
        text.push('\n').map_err(|_| DriverError::NoMemory)?;
        Ok(Some(text))
    }
}

impl EndpointOps for MovementEndpoint {
    fn feed(&self) -> Feed {
        Feed::Movement
    }

    fn read(&self, buf: &mut [u8]) -> Result<usize> {
        match self.render()? {
            Some(text) => Ok(copy_out(&text, buf)),
            None => Ok(0),
        }
    }

    fn write(&self, input: &[u8]) -> Result<usize> {
        dispatch_write(&self.state, Feed::Movement, self.write_limit, input)
    }
}
