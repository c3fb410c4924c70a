//! HID report support
//!
//! Only the relative-motion mouse report is understood; there is no
//! report descriptor parsing.
//!
//! # Example
//!
//! ```
//! use usbmouse::hid::MouseReport;
//!
//! let report = MouseReport::parse(&[0x00, 0x00, 0x03, 0x00, 0x02, 0x00, 0x00, 0x00]);
//! assert!(!report.buttons.left());
//! assert_eq!(report.dx, 3);
//! ```

pub mod mouse;

pub use mouse::{MouseButtons, MouseReport, MIN_REPORT_LEN};
