//! Shared mouse state
//!
//! The completion worker is the only writer of click and motion data;
//! endpoint reads and commands run on consumer threads. All of them go
//! through one spin lock and only copy a handful of fields while holding it,
//! so the completion path never waits for long.

use heapless::Vec;
use spin::Mutex;

use crate::command::Command;
use crate::hid::MouseReport;
use crate::transfer::{TransferStatus, MAX_PACKET_SIZE};

/// Which logical endpoint a command came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Feed {
    /// Left-click counter
    Click,
    /// Cursor position tracker
    Movement,
}

/// Result of feeding one completion into the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// Report applied; `clicked` is set on a left-button rising edge
    Applied {
        /// A click was counted
        clicked: bool,
    },
    /// Feeds are stopped, report dropped
    Disabled,
    /// Non-success status, nothing touched
    TransportError(TransferStatus),
    /// Too short to interpret, nothing touched
    Uninterpretable,
}

/// Consistent view of the movement feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementSnapshot {
    /// Cumulative X position
    pub x: i64,
    /// Cumulative Y position (up-positive)
    pub y: i64,
    /// Leading bytes of the most recent raw packet
    pub raw_prefix: Vec<u8, MAX_PACKET_SIZE>,
}

struct Inner {
    enabled: bool,
    click_count: u64,
    left_was_pressed: bool,
    x: i64,
    y: i64,
    last_packet: Vec<u8, MAX_PACKET_SIZE>,
    packet_available: bool,
}

/// Click count, position and last packet behind a single lock
pub struct MouseState {
    inner: Mutex<Inner>,
    raw_prefix_len: usize,
}

impl MouseState {
    /// Create enabled state with nothing recorded yet
    pub fn new(raw_prefix_len: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                enabled: true,
                click_count: 0,
                left_was_pressed: false,
                x: 0,
                y: 0,
                last_packet: Vec::new(),
                packet_available: false,
            }),
            raw_prefix_len: raw_prefix_len.min(MAX_PACKET_SIZE),
        }
    }

    /// Apply one transfer completion
    ///
    /// Parsing happens before the lock is taken; the critical section only
    /// stores the results.
    pub fn apply_completion(&self, raw: &[u8], status: TransferStatus) -> CompletionOutcome {
        if !status.is_success() {
            return CompletionOutcome::TransportError(status);
        }

        let report = match MouseReport::try_parse(raw) {
            Some(report) => report,
            None => return CompletionOutcome::Uninterpretable,
        };
        let len = raw.len().min(MAX_PACKET_SIZE);
        let pressed = report.left_pressed();

        let mut inner = self.inner.lock();
        if !inner.enabled {
            return CompletionOutcome::Disabled;
        }

        let clicked = pressed && !inner.left_was_pressed;
        if clicked {
            inner.click_count = inner.click_count.wrapping_add(1);
        }
        inner.left_was_pressed = pressed;

        // Raw dy is down-positive
        inner.x = inner.x.wrapping_add(i64::from(report.dx));
        inner.y = inner.y.wrapping_sub(i64::from(report.dy));

        inner.last_packet.clear();
        // Cannot fail: len is bounded by capacity
        let _ = inner.last_packet.extend_from_slice(&raw[..len]);
        inner.packet_available = true;

        CompletionOutcome::Applied { clicked }
    }

    /// Snapshot of the click counter
    pub fn read_click_count(&self) -> u64 {
        self.inner.lock().click_count
    }

    /// Snapshot of position and raw packet prefix
    ///
    /// Returns `None` until the first packet has been recorded.
    pub fn read_movement(&self) -> Option<MovementSnapshot> {
        let inner = self.inner.lock();
        if !inner.packet_available {
            return None;
        }

        let len = self.raw_prefix_len.min(inner.last_packet.len());
        let mut raw_prefix = Vec::new();
        let _ = raw_prefix.extend_from_slice(&inner.last_packet[..len]);

        Some(MovementSnapshot {
            x: inner.x,
            y: inner.y,
            raw_prefix,
        })
    }

    /// Apply a command issued on `feed`
    ///
    /// `start`/`stop` toggle the one enable flag shared by both feeds;
    /// `reset` only clears the issuing feed.
    pub fn apply_command(&self, feed: Feed, cmd: Command) {
        let mut inner = self.inner.lock();
        match (cmd, feed) {
            (Command::Start, _) => inner.enabled = true,
            (Command::Stop, _) => inner.enabled = false,
            (Command::Reset, Feed::Click) => inner.click_count = 0,
            (Command::Reset, Feed::Movement) => {
                inner.x = 0;
                inner.y = 0;
            }
        }
    }

    /// Check if feeds are currently recording
    pub fn is_enabled(&self) -> bool {
        self.inner.lock().enabled
    }
}
