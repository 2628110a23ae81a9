//! Pro Controller protocol emulation: input reports, subcommands, the USB
//! command channel and the emulated SPI flash.

use core::fmt;

use packed_struct::PackingError;

use crate::descriptor::PACKET_LEN;

pub mod report;
pub mod response;
pub mod spi;
pub mod subcommand;
pub mod usb_command;

/// Report IDs the host sends on the OUT endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProconRequestId {
    /// Rumble data plus a subcommand.
    Command = 0x01,
    /// Rumble data only.
    Rumble = 0x10,
    /// USB-only commands (status, handshake, baud rate, HID-only mode).
    UsbCommand = 0x80,
    /// Raw command without rumble.
    RawCommand = 0x82,
}

impl TryFrom<u8> for ProconRequestId {
    type Error = RequestError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Self::Command),
            0x10 => Ok(Self::Rumble),
            0x80 => Ok(Self::UsbCommand),
            0x82 => Ok(Self::RawCommand),
            other => Err(RequestError::UnsupportedReportId(other)),
        }
    }
}

/// Report IDs the controller sends on the IN endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProconResponseId {
    /// Subcommand reply with the standard state.
    Command = 0x21,
    /// Standard full-mode state with IMU frames.
    GetState = 0x30,
    /// Standard state with NFC/IR MCU data.
    GetStateNfcIr = 0x31,
    /// Reply to a USB command.
    GetInfo = 0x81,
}

/// Failure to handle one OUT packet. The packet is dropped and nothing is
/// sent in reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RequestError {
    /// Too short to carry the command ID.
    ShortPacket { len: usize },
    /// Report ID this device doesn't answer to.
    UnsupportedReportId(u8),
    /// An argument or reply block couldn't be (un)packed.
    Packing,
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShortPacket { len } => write!(f, "packet too short ({} bytes)", len),
            Self::UnsupportedReportId(id) => write!(f, "unsupported report id {:#04x}", id),
            Self::Packing => f.write_str("failed to pack or unpack a data block"),
        }
    }
}

impl From<PackingError> for RequestError {
    fn from(_: PackingError) -> Self {
        Self::Packing
    }
}

/// One OUT packet, copied into a zero-filled buffer so that missing trailing
/// arguments read as zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OutPacket {
    raw: [u8; PACKET_LEN],
    len: usize,
}

impl OutPacket {
    /// Anything beyond [`PACKET_LEN`] bytes is discarded.
    pub fn from_slice(data: &[u8]) -> Self {
        let mut raw = [0u8; PACKET_LEN];
        let len = raw.len().min(data.len());
        raw[..len].copy_from_slice(&data[..len]);

        Self { raw, len }
    }

    pub fn raw(&self) -> &[u8; PACKET_LEN] {
        &self.raw
    }

    /// Number of bytes actually received.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn report_id(&self) -> Result<ProconRequestId, RequestError> {
        if self.is_empty() {
            return Err(RequestError::ShortPacket { len: 0 });
        }

        ProconRequestId::try_from(self.raw[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_packet_is_truncated() {
        let data = [0xAAu8; 80];
        let packet = OutPacket::from_slice(&data);

        assert_eq!(packet.len(), PACKET_LEN);
        assert!(packet.raw().iter().all(|b| *b == 0xAA));
    }

    #[test]
    fn short_packet_is_zero_padded() {
        let packet = OutPacket::from_slice(&[0x01, 0x05]);

        assert_eq!(packet.len(), 2);
        assert_eq!(packet.raw()[..2], [0x01, 0x05]);
        assert!(packet.raw()[2..].iter().all(|b| *b == 0));
    }

    #[test]
    fn report_ids() {
        assert_eq!(
            OutPacket::from_slice(&[0x01]).report_id(),
            Ok(ProconRequestId::Command)
        );
        assert_eq!(
            OutPacket::from_slice(&[0x80, 0x02]).report_id(),
            Ok(ProconRequestId::UsbCommand)
        );
        assert_eq!(
            OutPacket::from_slice(&[0x42]).report_id(),
            Err(RequestError::UnsupportedReportId(0x42))
        );
        assert_eq!(
            OutPacket::from_slice(&[]).report_id(),
            Err(RequestError::ShortPacket { len: 0 })
        );
    }
}
