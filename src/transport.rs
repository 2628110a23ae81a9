//! Non-blocking view of the interrupt endpoints the report cycle runs on.
//!
//! The firmware drives the async embassy-usb endpoints directly and only uses
//! [`crate::cycle::ReportCycle::handle_out`] and
//! [`crate::cycle::ReportCycle::next_in_packet`]; these traits let anything
//! that can be polled (a test double, a different USB stack) run the whole
//! cycle through [`crate::cycle::ReportCycle::poll`].

use core::fmt;

use crate::descriptor::PACKET_LEN;

/// Reasons an IN transfer didn't go out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EndpointError {
    /// The packet is larger than the endpoint's max packet size.
    BufferOverflow,
    /// The endpoint is disabled, e.g. the device is not configured.
    Disabled,
}

impl fmt::Display for EndpointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BufferOverflow => f.write_str("buffer overflow"),
            Self::Disabled => f.write_str("endpoint disabled"),
        }
    }
}

/// Host to device.
pub trait OutEndpoint {
    /// Copies one pending packet into `buf` and returns its length, or `None`
    /// if nothing arrived. Bytes that don't fit into `buf` are lost.
    fn try_read(&mut self, buf: &mut [u8]) -> Option<usize>;
}

/// Device to host.
pub trait InEndpoint {
    /// Whether the host is ready to take another packet.
    fn is_ready(&self) -> bool;

    fn try_write(&mut self, packet: &[u8; PACKET_LEN]) -> Result<(), EndpointError>;
}
