/**
 *  Identity of the emulated controller, including sane defaults.
 *  Everything the host can learn about "this particular" Pro Controller through
 *  device info, the USB status command and the emulated SPI flash comes from here.
 */
use rand::RngCore;

use crate::procon::report::{BatteryStatus, StandardReport, Stick, CONNECTION_USB_PRO};

/// Reported as firmware 4.33, the version shipped on most Pro Controllers.
pub const DEFAULT_FIRMWARE_VERSION: [u8; 2] = [0x04, 0x33];

const DEFAULT_MAC_ADDRESS: [u8; 6] = [0x98, 0xB6, 0xE9, 0x46, 0x50, 0x9B];

/// Distance between stick center and either end of travel, per axis.
const DEFAULT_STICK_RANGE: u16 = 0x600;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControllerColors {
    pub body: [u8; 3],
    pub buttons: [u8; 3],
    pub left_grip: [u8; 3],
    pub right_grip: [u8; 3],
}

impl Default for ControllerColors {
    fn default() -> Self {
        Self {
            body: [0x32, 0x32, 0x32],
            buttons: [0xFF, 0xFF, 0xFF],
            left_grip: [0x32, 0x32, 0x32],
            right_grip: [0x32, 0x32, 0x32],
        }
    }
}

impl ControllerColors {
    /// Body, buttons, left grip, right grip, as stored in SPI flash.
    pub fn to_bytes(&self) -> [u8; 12] {
        let mut out = [0u8; 12];

        [self.body, self.buttons, self.left_grip, self.right_grip]
            .iter()
            .zip(out.chunks_exact_mut(3))
            .for_each(|(color, dst)| dst.copy_from_slice(color));

        out
    }
}

/// Stick center and travel advertised in the factory calibration block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StickCalibration {
    pub center: Stick,
    pub range: u16,
}

impl Default for StickCalibration {
    fn default() -> Self {
        Self {
            center: Stick::CENTERED,
            range: DEFAULT_STICK_RANGE,
        }
    }
}

impl StickCalibration {
    /// Factory calibration for both sticks (SPI 0x603D).
    ///
    /// The left stick stores "max above center, center, min below center",
    /// the right stick "center, min below center, max above center".
    pub fn to_factory_bytes(&self) -> [u8; 18] {
        let range = Stick::new(self.range, self.range).pack();
        let center = self.center.pack();

        let mut out = [0u8; 18];
        out[0..3].copy_from_slice(&range);
        out[3..6].copy_from_slice(&center);
        out[6..9].copy_from_slice(&range);

        out[9..12].copy_from_slice(&center);
        out[12..15].copy_from_slice(&range);
        out[15..18].copy_from_slice(&range);

        out
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControllerConfig {
    pub firmware_version: [u8; 2],
    /// Big-endian, as shown by the console.
    pub mac_address: [u8; 6],
    /// 0xFF everywhere means "no serial number".
    pub serial_number: [u8; 16],
    pub colors: ControllerColors,
    pub connection_info: u8,
    pub battery: BatteryStatus,
    pub stick_calibration: StickCalibration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            firmware_version: DEFAULT_FIRMWARE_VERSION,
            mac_address: DEFAULT_MAC_ADDRESS,
            serial_number: [0xFF; 16],
            colors: ControllerColors::default(),
            connection_info: CONNECTION_USB_PRO,
            battery: BatteryStatus::default(),
            stick_calibration: StickCalibration::default(),
        }
    }
}

impl ControllerConfig {
    /// Default identity with a freshly generated MAC address, so that two
    /// emulated controllers on the same console don't collide.
    pub fn with_random_mac<R: RngCore>(rng: &mut R) -> Self {
        Self {
            mac_address: gen_mac_address(rng),
            ..Self::default()
        }
    }

    /// Idle state carrying this controller's connection and battery info.
    pub fn idle_report(&self) -> StandardReport {
        StandardReport {
            connection_info: self.connection_info,
            battery: self.battery,
            ..StandardReport::idle()
        }
    }
}

fn gen_mac_address<R: RngCore>(rng: &mut R) -> [u8; 6] {
    let mut mac_addr = [0u8; 6];

    mac_addr.iter_mut().for_each(|e| {
        *e = rng.next_u64() as u8;
    });

    mac_addr[0] &= 0xfe;
    mac_addr[5] = 0x9b;

    mac_addr
}

#[cfg(test)]
mod tests {
    use rand::rngs::mock::StepRng;

    use super::*;

    #[test]
    fn random_mac_is_unicast_with_fixed_tail() {
        let config = ControllerConfig::with_random_mac(&mut StepRng::new(0x11, 1));

        assert_eq!(config.mac_address, [0x10, 0x12, 0x13, 0x14, 0x15, 0x9b]);
        assert_eq!(config.serial_number, ControllerConfig::default().serial_number);
    }

    #[test]
    fn colors_in_flash_order() {
        let colors = ControllerColors {
            body: [1, 2, 3],
            buttons: [4, 5, 6],
            left_grip: [7, 8, 9],
            right_grip: [10, 11, 12],
        };

        assert_eq!(colors.to_bytes(), [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
    }

    #[test]
    fn factory_stick_calibration_layout() {
        let bytes = StickCalibration::default().to_factory_bytes();

        // 0x600 / 0x600
        assert_eq!(bytes[0..3], [0x00, 0x06, 0x60]);
        // 0x800 / 0x800
        assert_eq!(bytes[3..6], [0x00, 0x08, 0x80]);
        assert_eq!(bytes[9..12], [0x00, 0x08, 0x80]);
    }
}
