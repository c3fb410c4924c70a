//! Driver configuration

use crate::error::{DriverError, Result};
use crate::transfer::{EndpointDescriptor, MAX_PACKET_SIZE};

/// Smallest packet the report layout needs
pub const MIN_PACKET_SIZE: usize = 8;

/// Driver configuration
///
/// Defaults match a boot-class mouse on a full-speed port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    /// Packet length used when the endpoint reports none
    pub default_packet_size: usize,
    /// Longest write accepted on either endpoint
    pub command_buffer_len: usize,
    /// Bytes of the last packet shown on the movement feed
    pub raw_prefix_len: usize,
    /// Node name of the click counter
    pub click_node_name: String,
    /// Node name of the movement tracker
    pub movement_node_name: String,
    /// Completion worker thread name
    pub worker_name: String,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            default_packet_size: MIN_PACKET_SIZE,
            command_buffer_len: 16,
            raw_prefix_len: 3,
            click_node_name: "usbmouse_click".into(),
            movement_node_name: "usbmouse_movement".into(),
            worker_name: "usbmouse-urb".into(),
        }
    }
}

impl DriverConfig {
    /// Create default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set write limit
    pub fn with_command_buffer_len(mut self, len: usize) -> Self {
        self.command_buffer_len = len;
        self
    }

    /// Set raw packet prefix length
    pub fn with_raw_prefix_len(mut self, len: usize) -> Self {
        self.raw_prefix_len = len;
        self
    }

    /// Set node names
    pub fn with_node_names(mut self, click: &str, movement: &str) -> Self {
        self.click_node_name = click.into();
        self.movement_node_name = movement.into();
        self
    }

    /// Set fallback packet size
    pub fn with_default_packet_size(mut self, size: usize) -> Self {
        self.default_packet_size = size;
        self
    }

    /// Packet length to allocate for `endpoint`
    ///
    /// Unreported sizes fall back to the default, anything below
    /// [`MIN_PACKET_SIZE`] is raised to it, and sizes past a full-speed
    /// interrupt packet are rejected.
    pub fn packet_len_for(&self, endpoint: &EndpointDescriptor) -> Result<usize> {
        let reported = match endpoint.max_packet_size as usize {
            0 => self.default_packet_size,
            size => size,
        };
        if reported > MAX_PACKET_SIZE {
            return Err(DriverError::InvalidDescriptor);
        }
        Ok(reported.max(MIN_PACKET_SIZE))
    }

    /// Check the configuration before attaching
    pub fn validate(&self) -> Result<()> {
        if self.default_packet_size > MAX_PACKET_SIZE
            || self.command_buffer_len == 0
            || self.raw_prefix_len > MAX_PACKET_SIZE
            || self.click_node_name.is_empty()
            || self.movement_node_name.is_empty()
            || self.click_node_name == self.movement_node_name
        {
            return Err(DriverError::InvalidParameter);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DriverConfig::default();
        assert_eq!(config.command_buffer_len, 16);
        assert_eq!(config.raw_prefix_len, 3);
        assert_eq!(config.default_packet_size, 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_packet_len_negotiation() {
        let config = DriverConfig::default();
        assert_eq!(config.packet_len_for(&EndpointDescriptor::new(0x81, 0, 10)), Ok(8));
        assert_eq!(config.packet_len_for(&EndpointDescriptor::new(0x81, 4, 10)), Ok(8));
        assert_eq!(config.packet_len_for(&EndpointDescriptor::new(0x81, 16, 10)), Ok(16));
        assert_eq!(
            config.packet_len_for(&EndpointDescriptor::new(0x81, 512, 10)),
            Err(DriverError::InvalidDescriptor)
        );

        let config = config.with_default_packet_size(12);
        assert_eq!(config.packet_len_for(&EndpointDescriptor::new(0x81, 0, 10)), Ok(12));
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        assert!(DriverConfig::new().with_command_buffer_len(0).validate().is_err());
        assert!(DriverConfig::new().with_raw_prefix_len(65).validate().is_err());
        assert!(DriverConfig::new().with_node_names("a", "a").validate().is_err());
        assert!(DriverConfig::new().with_node_names("", "b").validate().is_err());
    }
}
