//! Subcommands multiplexed inside report 0x01.
//!
//! Layout of a subcommand packet as sent by the host:
//!
//! | byte   | contents                 |
//! |--------|--------------------------|
//! | 0      | report ID (0x01)         |
//! | 1      | packet counter           |
//! | 2..=9  | rumble data (ignored)    |
//! | 10     | subcommand ID            |
//! | 11..   | subcommand arguments     |

use packed_struct::{derive::PackedStruct, PackedStruct};

use super::{
    spi::{SpiFlash, MAX_READ_LEN},
    OutPacket, RequestError,
};
use crate::config::ControllerConfig;

pub const SW_CMD_STATE_ONLY: u8 = 0x00;
pub const SW_CMD_SET_PAIRING: u8 = 0x01;
pub const SW_CMD_GET_DEVINFO: u8 = 0x02;
pub const SW_CMD_SET_INPUT_MODE: u8 = 0x03;
pub const SW_CMD_GET_TRIGGERET: u8 = 0x04;
pub const SW_CMD_GET_PAGE_LIST_STATE: u8 = 0x05;
pub const SW_CMD_SET_HCI_STATE: u8 = 0x06;
pub const SW_CMD_RESET_PAIRING: u8 = 0x07;
pub const SW_CMD_SET_SHIPMODE: u8 = 0x08;
pub const SW_CMD_GET_SPI: u8 = 0x10;
pub const SW_CMD_SET_SPI: u8 = 0x11;
pub const SW_CMD_ERASE_SPI: u8 = 0x12;
pub const SW_CMD_RESET_NFC_IR_MCU: u8 = 0x20;
pub const SW_CMD_SET_NFC_IR_CONFIG: u8 = 0x21;
pub const SW_CMD_SET_NFC_IR_STATE: u8 = 0x22;
pub const SW_CMD_SET_PLAYER_LIGHTS: u8 = 0x30;
pub const SW_CMD_GET_PLAYER_LIGHTS: u8 = 0x31;
pub const SW_CMD_SET_HOME_LIGHT: u8 = 0x38;
pub const SW_CMD_ENABLE_IMU: u8 = 0x40;
pub const SW_CMD_SET_IMU_SENSITIVITY: u8 = 0x41;
pub const SW_CMD_WRITE_IMU_REGISTERS: u8 = 0x42;
pub const SW_CMD_READ_IMU_REGISTERS: u8 = 0x43;
pub const SW_CMD_ENABLE_VIBRATION: u8 = 0x48;
pub const SW_CMD_GET_VOLTAGE: u8 = 0x50;

pub const ACK_GENERIC: u8 = 0x80;
pub const ACK_SET_PAIRING: u8 = 0x81;
pub const ACK_GET_DEVINFO: u8 = 0x82;
pub const ACK_GET_TRIGGERET: u8 = 0x83;
pub const ACK_GET_SPI: u8 = 0x90;
pub const ACK_SET_NFC_IR_CONFIG: u8 = 0xA0;
pub const ACK_GET_PLAYER_LIGHTS: u8 = 0xB0;
pub const ACK_GET_VOLTAGE: u8 = 0xD0;

/// Offset of the subcommand ID within an 0x01 packet.
pub const SUBCOMMAND_OFFSET: usize = 10;
/// Shortest 0x01 packet that still carries a subcommand ID.
pub const MIN_SUBCOMMAND_PACKET_LEN: usize = SUBCOMMAND_OFFSET + 1;

/// Room for reply data in a 64-byte 0x21 packet.
pub const REPLY_DATA_LEN: usize = 49;

/// Status byte of an accepted SPI write or erase.
const SPI_WRITE_SUCCESS: u8 = 0x00;

/// Elapsed time reported for each trigger, in 10ms units.
const TRIGGER_ELAPSED_10MS: u16 = 100;

/// Regulated voltage in millivolts, a freshly charged battery.
const REGULATED_VOLTAGE_MV: u16 = 0x0683;

/// NFC/IR MCU status as reported by an idle MCU in standby.
const NFC_IR_MCU_STATUS: [u8; 8] = [0x01, 0x00, 0xFF, 0x00, 0x03, 0x00, 0x05, 0x01];

/// Input report mode requested by subcommand 0x03.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InputReportMode {
    /// Push the standard 0x30 report with IMU data at a fixed rate.
    Standard,
    /// Standard report followed by NFC/IR MCU data (0x31).
    NfcIr,
    /// Plain HID report, only sent on state change. This is the power-on mode.
    #[default]
    SimpleHid,
    /// Any other mode byte; tracked but not emulated.
    Other(u8),
}

impl From<u8> for InputReportMode {
    fn from(value: u8) -> Self {
        match value {
            0x30 => Self::Standard,
            0x31 => Self::NfcIr,
            0x3F => Self::SimpleHid,
            other => Self::Other(other),
        }
    }
}

impl From<InputReportMode> for u8 {
    fn from(value: InputReportMode) -> Self {
        match value {
            InputReportMode::Standard => 0x30,
            InputReportMode::NfcIr => 0x31,
            InputReportMode::SimpleHid => 0x3F,
            InputReportMode::Other(other) => other,
        }
    }
}

/// Arguments of subcommand 0x41.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PackedStruct)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[packed_struct(bit_numbering = "msb0", size_bytes = "4")]
pub struct ImuSensitivity {
    #[packed_field(bytes = "0")]
    pub gyro_sensitivity: u8,
    #[packed_field(bytes = "1")]
    pub accel_sensitivity: u8,
    #[packed_field(bytes = "2")]
    pub gyro_performance: u8,
    #[packed_field(bytes = "3")]
    pub accel_bandwidth: u8,
}

impl Default for ImuSensitivity {
    /// ±2000dps, ±8G, 208Hz, 100Hz.
    fn default() -> Self {
        Self {
            gyro_sensitivity: 0x03,
            accel_sensitivity: 0x00,
            gyro_performance: 0x01,
            accel_bandwidth: 0x01,
        }
    }
}

/// Arguments of subcommand 0x10.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PackedStruct)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[packed_struct(bit_numbering = "msb0", endian = "lsb", size_bytes = "5")]
pub struct SpiReadRequest {
    #[packed_field(bytes = "0..=3")]
    pub address: u32,
    #[packed_field(bytes = "4")]
    pub length: u8,
}

/// Reply data of subcommand 0x02.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PackedStruct)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[packed_struct(bit_numbering = "msb0", size_bytes = "12")]
pub struct DeviceInfo {
    #[packed_field(bytes = "0..=1")]
    pub firmware_version: [u8; 2],
    #[packed_field(bytes = "2")]
    pub controller_type: u8,
    #[packed_field(bytes = "3")]
    pub unknown_1: u8,
    #[packed_field(bytes = "4..=9")]
    pub mac_address: [u8; 6],
    #[packed_field(bytes = "10")]
    pub unknown_2: u8,
    #[packed_field(bytes = "11")]
    pub colors_in_spi: u8,
}

impl From<&ControllerConfig> for DeviceInfo {
    fn from(value: &ControllerConfig) -> Self {
        Self {
            firmware_version: value.firmware_version,
            // Pro Controller
            controller_type: 0x03,
            unknown_1: 0x02,
            mac_address: value.mac_address,
            unknown_2: 0x01,
            colors_in_spi: 0x02,
        }
    }
}

/// Everything the host can configure through subcommands. Lives as long as
/// the USB configuration does.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceSettings {
    pub input_report_mode: InputReportMode,
    pub player_lights: u8,
    pub imu_enabled: bool,
    pub imu_sensitivity: ImuSensitivity,
    pub vibration_enabled: bool,
    pub hci_state: u8,
    pub low_power: bool,
    pub nfc_ir_mcu_state: u8,
    /// Set by USB command 0x04, cleared by 0x05.
    pub usb_hid_only: bool,
}

/// Reply to one subcommand, sent as report 0x21.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SubcommandReply {
    pub ack: u8,
    pub subcommand: u8,
    /// False when the subcommand was not recognized and only got a generic ack.
    pub handled: bool,
    data: [u8; REPLY_DATA_LEN],
    len: usize,
}

impl SubcommandReply {
    fn new(ack: u8, subcommand: u8) -> Self {
        Self {
            ack,
            subcommand,
            handled: true,
            data: [0u8; REPLY_DATA_LEN],
            len: 0,
        }
    }

    fn unhandled(subcommand: u8) -> Self {
        Self {
            handled: false,
            ..Self::new(ACK_GENERIC, subcommand)
        }
    }

    /// Appends to the reply data, dropping whatever doesn't fit.
    fn push(&mut self, bytes: &[u8]) -> &mut Self {
        let room = REPLY_DATA_LEN - self.len;
        let n = bytes.len().min(room);
        self.data[self.len..self.len + n].copy_from_slice(&bytes[..n]);
        self.len += n;
        self
    }

    pub fn data(&self) -> &[u8] {
        &self.data[..self.len]
    }
}

/// Decodes 0x01 packets and keeps track of the emulated device settings.
#[derive(Clone, Debug)]
pub struct SubcommandProcessor {
    settings: DeviceSettings,
    device_info: DeviceInfo,
    flash: SpiFlash,
}

impl Default for SubcommandProcessor {
    fn default() -> Self {
        Self::new(&ControllerConfig::default())
    }
}

impl SubcommandProcessor {
    pub fn new(config: &ControllerConfig) -> Self {
        Self {
            settings: DeviceSettings::default(),
            device_info: DeviceInfo::from(config),
            flash: SpiFlash::new(config),
        }
    }

    pub fn settings(&self) -> &DeviceSettings {
        &self.settings
    }

    pub(crate) fn settings_mut(&mut self) -> &mut DeviceSettings {
        &mut self.settings
    }

    pub fn flash(&self) -> &SpiFlash {
        &self.flash
    }

    /// Back to power-on settings, as after a fresh USB configuration.
    pub fn reset(&mut self) {
        self.settings = DeviceSettings::default();
    }

    /// Handles one 0x01 packet and returns the reply to send.
    ///
    /// Fails without touching the settings if the packet is too short to
    /// carry a subcommand ID, or if an argument block can't be decoded.
    pub fn process(&mut self, packet: &OutPacket) -> Result<SubcommandReply, RequestError> {
        if packet.len() < MIN_SUBCOMMAND_PACKET_LEN {
            return Err(RequestError::ShortPacket { len: packet.len() });
        }

        let command_id = packet.raw()[SUBCOMMAND_OFFSET];
        let args = &packet.raw()[MIN_SUBCOMMAND_PACKET_LEN..];

        trace!("Subcommand {:#x} with args {:x}", command_id, args);

        let reply = match command_id {
            SW_CMD_STATE_ONLY | SW_CMD_SET_HOME_LIGHT | SW_CMD_RESET_PAIRING => {
                SubcommandReply::new(ACK_GENERIC, command_id)
            }
            // Sent routinely by hosts, nothing behind them to emulate.
            SW_CMD_GET_PAGE_LIST_STATE
            | SW_CMD_RESET_NFC_IR_MCU
            | SW_CMD_WRITE_IMU_REGISTERS
            | SW_CMD_READ_IMU_REGISTERS => {
                debug!("Acknowledging subcommand {:#x} without effect", command_id);
                SubcommandReply::new(ACK_GENERIC, command_id)
            }
            SW_CMD_SET_PAIRING => {
                // No Bluetooth here, the USB host never completes pairing.
                SubcommandReply::new(ACK_SET_PAIRING, command_id)
            }
            SW_CMD_GET_DEVINFO => {
                let info = self.device_info.pack()?;
                *SubcommandReply::new(ACK_GET_DEVINFO, command_id).push(&info)
            }
            SW_CMD_SET_INPUT_MODE => {
                self.settings.input_report_mode = InputReportMode::from(args[0]);
                info!(
                    "Switch reporting mode is now {:x}",
                    u8::from(self.settings.input_report_mode)
                );
                SubcommandReply::new(ACK_GENERIC, command_id)
            }
            SW_CMD_GET_TRIGGERET => {
                let mut reply = SubcommandReply::new(ACK_GET_TRIGGERET, command_id);
                for _ in 0..7 {
                    reply.push(&TRIGGER_ELAPSED_10MS.to_le_bytes());
                }
                reply
            }
            SW_CMD_SET_HCI_STATE => {
                self.settings.hci_state = args[0];
                SubcommandReply::new(ACK_GENERIC, command_id)
            }
            SW_CMD_SET_SHIPMODE => {
                self.settings.low_power = args[0] != 0;
                SubcommandReply::new(ACK_GENERIC, command_id)
            }
            SW_CMD_GET_SPI => self.read_spi(command_id, args)?,
            SW_CMD_SET_SPI | SW_CMD_ERASE_SPI => {
                // The emulated flash is read-only; pretend the write went through.
                debug!("Ignoring SPI write/erase {:#x}", command_id);
                *SubcommandReply::new(ACK_GENERIC, command_id).push(&[SPI_WRITE_SUCCESS])
            }
            SW_CMD_SET_NFC_IR_CONFIG => {
                *SubcommandReply::new(ACK_SET_NFC_IR_CONFIG, command_id).push(&NFC_IR_MCU_STATUS)
            }
            SW_CMD_SET_NFC_IR_STATE => {
                self.settings.nfc_ir_mcu_state = args[0];
                SubcommandReply::new(ACK_GENERIC, command_id)
            }
            SW_CMD_SET_PLAYER_LIGHTS => {
                self.settings.player_lights = args[0];
                info!("Player lights set to {:b}", args[0]);
                SubcommandReply::new(ACK_GENERIC, command_id)
            }
            SW_CMD_GET_PLAYER_LIGHTS => *SubcommandReply::new(ACK_GET_PLAYER_LIGHTS, command_id)
                .push(&[self.settings.player_lights]),
            SW_CMD_ENABLE_IMU => {
                self.settings.imu_enabled = args[0] != 0;
                info!("IMU enabled: {}", self.settings.imu_enabled);
                SubcommandReply::new(ACK_GENERIC, command_id)
            }
            SW_CMD_SET_IMU_SENSITIVITY => {
                let mut raw = [0u8; 4];
                raw.copy_from_slice(&args[..4]);
                self.settings.imu_sensitivity = ImuSensitivity::unpack(&raw)?;
                SubcommandReply::new(ACK_GENERIC, command_id)
            }
            SW_CMD_ENABLE_VIBRATION => {
                self.settings.vibration_enabled = args[0] != 0;
                info!("Vibration enabled: {}", self.settings.vibration_enabled);
                SubcommandReply::new(ACK_GENERIC, command_id)
            }
            SW_CMD_GET_VOLTAGE => *SubcommandReply::new(ACK_GET_VOLTAGE, command_id)
                .push(&REGULATED_VOLTAGE_MV.to_le_bytes()),
            _ => {
                warn!("Unhandled subcommand {:#x}, acknowledging anyway", command_id);
                SubcommandReply::unhandled(command_id)
            }
        };

        Ok(reply)
    }

    fn read_spi(&self, command_id: u8, args: &[u8]) -> Result<SubcommandReply, RequestError> {
        let mut raw = [0u8; 5];
        raw.copy_from_slice(&args[..5]);
        let request = SpiReadRequest::unpack(&raw)?;

        let chunk = self.flash.read(request.address, request.length);

        let mut reply = SubcommandReply::new(ACK_GET_SPI, command_id);
        reply
            .push(&request.address.to_le_bytes())
            .push(&[request.length.min(MAX_READ_LEN)])
            .push(&chunk);

        Ok(reply)
    }
}
