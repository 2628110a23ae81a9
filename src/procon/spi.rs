//! Emulated SPI flash of a Pro Controller.
//!
//! The host reads factory data (serial number, colors, calibration) through
//! subcommand 0x10. There is no flash behind this: each readable region is a
//! fixed payload, and anything outside the regions reads as erased flash.

use core::ops::Deref;

use crate::config::ControllerConfig;

pub const ADDRESS_SERIAL_NUMBER: u32 = 0x6000;
pub const ADDRESS_DEVICE_TYPE: u32 = 0x6012;
pub const ADDRESS_FACTORY_CALIBRATION_1: u32 = 0x6020;
pub const ADDRESS_FACTORY_CALIBRATION_2: u32 = 0x603D;
pub const ADDRESS_CONTROLLER_COLOR: u32 = 0x6050;
pub const ADDRESS_FACTORY_PARAMETERS_1: u32 = 0x6080;
pub const ADDRESS_FACTORY_PARAMETERS_2: u32 = 0x6098;
pub const ADDRESS_STICKS_CALIBRATION: u32 = 0x8010;
pub const ADDRESS_IMU_CALIBRATION: u32 = 0x8028;

/// Largest read that fits into a subcommand reply.
pub const MAX_READ_LEN: u8 = 0x1D;

/// Returned for unmapped addresses, same as erased flash.
pub const UNMAPPED_FILL: u8 = 0xFF;

/// Pro Controller type, followed by the "colors are stored in SPI" flag at 0x601B.
const DEVICE_TYPE: [u8; 10] = [0x03, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01];

/// Six-axis factory calibration: accelerometer origin and sensitivity, then
/// gyroscope origin and sensitivity, three little-endian `i16` each.
const FACTORY_IMU_CALIBRATION: [u8; 24] = [
    0x23, 0x00, 0xB9, 0xFF, 0x1A, 0x01, 0x00, 0x40, 0x00, 0x40, 0x00, 0x40, 0x01, 0x00, 0x01, 0x00,
    0x01, 0x00, 0x3B, 0x34, 0x3B, 0x34, 0x3B, 0x34,
];

/// Six-axis horizontal offsets followed by the left stick parameters.
const FACTORY_PARAMETERS_1: [u8; 24] = [
    0x50, 0xFD, 0x00, 0x00, 0xC6, 0x0F, 0x0F, 0x30, 0x61, 0xAE, 0x90, 0xD9, 0xD4, 0x14, 0x54, 0x41,
    0x15, 0x54, 0xC7, 0x79, 0x9C, 0x33, 0x36, 0x63,
];

/// Right stick parameters (dead zone, range ratio).
const FACTORY_PARAMETERS_2: [u8; 18] = [
    0x0F, 0x30, 0x61, 0xAE, 0x90, 0xD9, 0xD4, 0x14, 0x54, 0x41, 0x15, 0x54, 0xC7, 0x79, 0x9C, 0x33,
    0x36, 0x63,
];

/// No user calibration present: both magic words and all data stay erased.
const USER_STICK_CALIBRATION: [u8; 24] = [UNMAPPED_FILL; 24];
const USER_IMU_CALIBRATION: [u8; 24] = [UNMAPPED_FILL; 24];

/// Result of a flash read, at most [`MAX_READ_LEN`] bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpiChunk {
    buf: [u8; MAX_READ_LEN as usize],
    len: u8,
}

impl SpiChunk {
    fn filled(len: u8) -> Self {
        Self {
            buf: [UNMAPPED_FILL; MAX_READ_LEN as usize],
            len,
        }
    }

    fn copied(data: &[u8]) -> Self {
        let mut chunk = Self::filled(data.len() as u8);
        chunk.buf[..data.len()].copy_from_slice(data);
        chunk
    }
}

impl Deref for SpiChunk {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.buf[..self.len as usize]
    }
}

/// One readable address range.
#[derive(Clone, Copy, Debug)]
struct SpiRegion<'a> {
    start: u32,
    data: &'a [u8],
}

impl SpiRegion<'_> {
    /// The requested bytes, if they lie entirely within this region.
    fn slice(&self, address: u32, len: usize) -> Option<&[u8]> {
        let offset = address.checked_sub(self.start)? as usize;
        self.data.get(offset..offset.checked_add(len)?)
    }
}

/// Read-only flash image built once from the controller identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpiFlash {
    serial_number: [u8; 16],
    stick_calibration: [u8; 18],
    colors: [u8; 13],
}

impl Default for SpiFlash {
    fn default() -> Self {
        Self::new(&ControllerConfig::default())
    }
}

impl SpiFlash {
    pub fn new(config: &ControllerConfig) -> Self {
        let mut colors = [0u8; 13];
        colors[..12].copy_from_slice(&config.colors.to_bytes());
        // Use the grip colors as well
        colors[12] = 0x01;

        Self {
            serial_number: config.serial_number,
            stick_calibration: config.stick_calibration.to_factory_bytes(),
            colors,
        }
    }

    /// All mapped regions, ordered by address. None of them overlap.
    fn regions(&self) -> [SpiRegion<'_>; 9] {
        [
            SpiRegion {
                start: ADDRESS_SERIAL_NUMBER,
                data: &self.serial_number,
            },
            SpiRegion {
                start: ADDRESS_DEVICE_TYPE,
                data: &DEVICE_TYPE,
            },
            SpiRegion {
                start: ADDRESS_FACTORY_CALIBRATION_1,
                data: &FACTORY_IMU_CALIBRATION,
            },
            SpiRegion {
                start: ADDRESS_FACTORY_CALIBRATION_2,
                data: &self.stick_calibration,
            },
            SpiRegion {
                start: ADDRESS_CONTROLLER_COLOR,
                data: &self.colors,
            },
            SpiRegion {
                start: ADDRESS_FACTORY_PARAMETERS_1,
                data: &FACTORY_PARAMETERS_1,
            },
            SpiRegion {
                start: ADDRESS_FACTORY_PARAMETERS_2,
                data: &FACTORY_PARAMETERS_2,
            },
            SpiRegion {
                start: ADDRESS_STICKS_CALIBRATION,
                data: &USER_STICK_CALIBRATION,
            },
            SpiRegion {
                start: ADDRESS_IMU_CALIBRATION,
                data: &USER_IMU_CALIBRATION,
            },
        ]
    }

    /// Reads `length` bytes starting at `address`.
    ///
    /// `length` is clamped to [`MAX_READ_LEN`]. A read that is not fully
    /// covered by a single region returns [`UNMAPPED_FILL`] bytes instead, so
    /// the result always has the clamped length.
    pub fn read(&self, address: u32, length: u8) -> SpiChunk {
        let length = length.min(MAX_READ_LEN);

        let chunk = self
            .regions()
            .iter()
            .find_map(|region| region.slice(address, length as usize))
            .map(SpiChunk::copied);

        match chunk {
            Some(chunk) => chunk,
            None => {
                debug!(
                    "SPI read of {} bytes at {:x} is unmapped, filling",
                    length,
                    address
                );
                SpiChunk::filled(length)
            }
        }
    }
}
