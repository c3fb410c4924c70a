//! HID mouse report interpretation
//!
//! Decodes the fixed-layout relative-motion report delivered on the
//! mouse's interrupt IN endpoint.

use bitflags::bitflags;

/// Minimum number of bytes [`MouseReport::parse`] reads
pub const MIN_REPORT_LEN: usize = 6;

/// Offset of the little-endian signed X displacement
const DX_OFFSET: usize = 2;

/// Offset of the little-endian signed Y displacement
const DY_OFFSET: usize = 4;

/// Decoded mouse report
///
/// Raw layout (8 bytes on the wire, only the first 6 are read):
/// - Byte 0: button states (bit 0 = left)
/// - Byte 1: unused
/// - Bytes 2-3: X displacement, `i16` little-endian
/// - Bytes 4-5: Y displacement, `i16` little-endian (device down-positive)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseReport {
    /// Button states
    pub buttons: MouseButtons,
    /// X displacement (relative movement)
    pub dx: i16,
    /// Y displacement (relative movement)
    pub dy: i16,
}

impl MouseReport {
    /// Parse report from raw data
    ///
    /// `data` must hold at least [`MIN_REPORT_LEN`] bytes; shorter input is a
    /// caller bug.
    ///
    /// # Example
    ///
    /// ```
    /// use usbmouse::hid::MouseReport;
    ///
    /// let report = MouseReport::parse(&[0x01, 0x00, 0x05, 0x00, 0xFB, 0xFF, 0x00, 0x00]);
    /// assert!(report.left_pressed());
    /// assert_eq!((report.dx, report.dy), (5, -5));
    /// ```
    pub fn parse(data: &[u8]) -> Self {
        assert!(
            data.len() >= MIN_REPORT_LEN,
            "Mouse report must be at least 6 bytes"
        );

        Self {
            buttons: MouseButtons::from_bits_truncate(data[0]),
            dx: i16::from_le_bytes([data[DX_OFFSET], data[DX_OFFSET + 1]]),
            dy: i16::from_le_bytes([data[DY_OFFSET], data[DY_OFFSET + 1]]),
        }
    }

    /// Parse report, returning `None` when `data` is too short to interpret
    pub fn try_parse(data: &[u8]) -> Option<Self> {
        if data.len() < MIN_REPORT_LEN {
            return None;
        }
        Some(Self::parse(data))
    }

    /// Left button state
    pub fn left_pressed(&self) -> bool {
        self.buttons.left()
    }

    /// Check if mouse moved
    pub fn has_movement(&self) -> bool {
        self.dx != 0 || self.dy != 0
    }
}

bitflags! {
    /// Mouse button states
    ///
    /// Two- and three-button mice only; higher bits are dropped.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MouseButtons: u8 {
        /// Button 1 (left button)
        const LEFT   = 0b00000001;
        /// Button 2 (right button)
        const RIGHT  = 0b00000010;
        /// Button 3 (middle button / wheel click)
        const MIDDLE = 0b00000100;
    }
}

impl MouseButtons {
    /// Check if left button is pressed
    pub fn left(&self) -> bool {
        self.contains(Self::LEFT)
    }

    /// Check if right button is pressed
    pub fn right(&self) -> bool {
        self.contains(Self::RIGHT)
    }

    /// Check if middle button is pressed
    pub fn middle(&self) -> bool {
        self.contains(Self::MIDDLE)
    }
}
