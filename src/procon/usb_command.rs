//! Report 0x80: commands a host only sends to a wired controller, mostly
//! before the first subcommand. Replies go out as report 0x81.

use packed_struct::{derive::PackedStruct, PackedStruct};

use super::{subcommand::DeviceSettings, OutPacket, RequestError};
use crate::config::ControllerConfig;

pub const USB_CMD_STATUS: u8 = 0x01;
pub const USB_CMD_HANDSHAKE: u8 = 0x02;
pub const USB_CMD_SET_BAUD_RATE: u8 = 0x03;
pub const USB_CMD_HID_ONLY: u8 = 0x04;
pub const USB_CMD_ALLOW_TIMEOUT: u8 = 0x05;

const COMMAND_OFFSET: usize = 1;

/// Largest reply payload after the command byte.
pub const USB_REPLY_DATA_LEN: usize = 8;

/// Payload of the status reply.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PackedStruct)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[packed_struct(bit_numbering = "msb0", size_bytes = "8")]
pub struct UsbStatus {
    #[packed_field(bytes = "0")]
    pub unknown: u8,
    #[packed_field(bytes = "1")]
    pub controller_type: u8,
    /// Least significant byte first.
    #[packed_field(bytes = "2..=7")]
    pub mac_address_reversed: [u8; 6],
}

impl From<&ControllerConfig> for UsbStatus {
    fn from(value: &ControllerConfig) -> Self {
        let mut mac_address_reversed = value.mac_address;
        mac_address_reversed.reverse();

        Self {
            unknown: 0x00,
            controller_type: 0x03,
            mac_address_reversed,
        }
    }
}

/// Reply to a USB command, sent as report 0x81.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UsbReply {
    pub command: u8,
    data: [u8; USB_REPLY_DATA_LEN],
    len: usize,
}

impl UsbReply {
    fn ack(command: u8) -> Self {
        Self {
            command,
            data: [0u8; USB_REPLY_DATA_LEN],
            len: 0,
        }
    }

    fn with_data(command: u8, data: [u8; USB_REPLY_DATA_LEN]) -> Self {
        Self {
            command,
            data,
            len: USB_REPLY_DATA_LEN,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data[..self.len]
    }
}

#[derive(Clone, Copy, Debug)]
pub struct UsbCommandHandler {
    status: UsbStatus,
}

impl UsbCommandHandler {
    pub fn new(config: &ControllerConfig) -> Self {
        Self {
            status: UsbStatus::from(config),
        }
    }

    /// Handles one 0x80 packet. Commands that don't expect an answer, and
    /// unknown ones, yield `Ok(None)`.
    pub fn process(
        &self,
        packet: &OutPacket,
        settings: &mut DeviceSettings,
    ) -> Result<Option<UsbReply>, RequestError> {
        if packet.len() <= COMMAND_OFFSET {
            return Err(RequestError::ShortPacket { len: packet.len() });
        }

        let command = packet.raw()[COMMAND_OFFSET];

        let reply = match command {
            USB_CMD_STATUS => Some(UsbReply::with_data(command, self.status.pack()?)),
            USB_CMD_HANDSHAKE | USB_CMD_SET_BAUD_RATE => Some(UsbReply::ack(command)),
            USB_CMD_HID_ONLY => {
                info!("Switching to USB HID only");
                settings.usb_hid_only = true;
                None
            }
            USB_CMD_ALLOW_TIMEOUT => {
                settings.usb_hid_only = false;
                None
            }
            other => {
                debug!("Ignoring USB command {:#x}", other);
                None
            }
        };

        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usb_command(command: u8) -> OutPacket {
        OutPacket::from_slice(&[0x80, command])
    }

    #[test]
    fn status_carries_reversed_mac() {
        let config = ControllerConfig {
            mac_address: [0x11, 0x22, 0x33, 0x44, 0x55, 0x66],
            ..ControllerConfig::default()
        };
        let handler = UsbCommandHandler::new(&config);
        let mut settings = DeviceSettings::default();

        let reply = handler
            .process(&usb_command(USB_CMD_STATUS), &mut settings)
            .unwrap()
            .unwrap();

        assert_eq!(reply.command, USB_CMD_STATUS);
        assert_eq!(
            reply.data(),
            &[0x00, 0x03, 0x66, 0x55, 0x44, 0x33, 0x22, 0x11]
        );
    }

    #[test]
    fn handshake_and_baud_rate_are_bare_acks() {
        let handler = UsbCommandHandler::new(&ControllerConfig::default());
        let mut settings = DeviceSettings::default();

        for command in [USB_CMD_HANDSHAKE, USB_CMD_SET_BAUD_RATE] {
            let reply = handler
                .process(&usb_command(command), &mut settings)
                .unwrap()
                .unwrap();
            assert_eq!(reply.command, command);
            assert!(reply.data().is_empty());
        }
    }

    #[test]
    fn hid_only_mode_is_recorded_without_reply() {
        let handler = UsbCommandHandler::new(&ControllerConfig::default());
        let mut settings = DeviceSettings::default();

        assert_eq!(
            handler.process(&usb_command(USB_CMD_HID_ONLY), &mut settings),
            Ok(None)
        );
        assert!(settings.usb_hid_only);

        assert_eq!(
            handler.process(&usb_command(USB_CMD_ALLOW_TIMEOUT), &mut settings),
            Ok(None)
        );
        assert!(!settings.usb_hid_only);
    }

    #[test]
    fn unknown_and_truncated_commands() {
        let handler = UsbCommandHandler::new(&ControllerConfig::default());
        let mut settings = DeviceSettings::default();

        assert_eq!(handler.process(&usb_command(0x91), &mut settings), Ok(None));
        assert_eq!(
            handler.process(&OutPacket::from_slice(&[0x80]), &mut settings),
            Err(RequestError::ShortPacket { len: 1 })
        );
        assert_eq!(settings, DeviceSettings::default());
    }
}
