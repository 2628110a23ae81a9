//! Wire layout of the Pro Controller input state.
//!
//! Every field is encoded with explicit shifts and masks. The layout is the one
//! a genuine controller puts right after the report ID and timer bytes of a
//! 0x21 or 0x30 report:
//!
//! | byte  | contents                                              |
//! |-------|-------------------------------------------------------|
//! | 0     | connection info (low nibble), battery (high nibble)   |
//! | 1     | right-hand buttons                                    |
//! | 2     | shared buttons, charging grip                         |
//! | 3     | left-hand buttons, d-pad                              |
//! | 4..=6 | left stick, 12 bit X / 12 bit Y                       |
//! | 7..=9 | right stick                                           |
//! | 10    | vibrator input report                                 |
//!
//! The extended report appends three IMU frames of six little-endian `i16`s.

pub const STICK_MIN: u16 = 0x000;
pub const STICK_CENTER: u16 = 0x800;
pub const STICK_MAX: u16 = 0xFFF;

pub const BATTERY_FULL: u8 = 0x08;
pub const BATTERY_MEDIUM: u8 = 0x06;
pub const BATTERY_LOW: u8 = 0x04;
pub const BATTERY_CRITICAL: u8 = 0x02;
pub const BATTERY_EMPTY: u8 = 0x00;

/// Pro Controller, powered over USB.
pub const CONNECTION_USB_PRO: u8 = 0x01;

/// Value a controller without an active rumble actuator reports.
pub const VIBRATOR_IDLE: u8 = 0x0C;

pub const STANDARD_REPORT_LEN: usize = 11;
pub const IMU_FRAME_COUNT: usize = 3;
pub const IMU_FRAME_LEN: usize = 12;
pub const EXTENDED_REPORT_LEN: usize = STANDARD_REPORT_LEN + IMU_FRAME_COUNT * IMU_FRAME_LEN;

/// Declares a byte of eight button flags, bit 0 first.
macro_rules! button_byte {
    ($(#[$meta:meta])* $name:ident { $($bit:literal => $field:ident),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        pub struct $name {
            $(pub $field: bool,)*
        }

        impl $name {
            pub const fn to_byte(self) -> u8 {
                0 $(| ((self.$field as u8) << $bit))*
            }

            pub const fn from_byte(byte: u8) -> Self {
                Self {
                    $($field: byte & (1 << $bit) != 0,)*
                }
            }
        }
    };
}

button_byte!(
    /// Byte 1 of the input state.
    ButtonsRight {
        0 => button_y,
        1 => button_x,
        2 => button_b,
        3 => button_a,
        4 => trigger_r_sr,
        5 => trigger_r_sl,
        6 => trigger_r,
        7 => trigger_zr,
    }
);

button_byte!(
    /// Byte 2 of the input state. `reserved` is always zero on real hardware
    /// but is carried through untouched.
    ButtonsShared {
        0 => button_minus,
        1 => button_plus,
        2 => button_thumb_r,
        3 => button_thumb_l,
        4 => button_home,
        5 => button_capture,
        6 => reserved,
        7 => charging_grip,
    }
);

button_byte!(
    /// Byte 3 of the input state.
    ButtonsLeft {
        0 => dpad_down,
        1 => dpad_up,
        2 => dpad_right,
        3 => dpad_left,
        4 => trigger_l_sr,
        5 => trigger_l_sl,
        6 => trigger_l,
        7 => trigger_zl,
    }
);

/// High nibble of byte 0. `level` uses the even values 0..=8.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BatteryStatus {
    pub level: u8,
    pub charging: bool,
}

impl Default for BatteryStatus {
    fn default() -> Self {
        Self {
            level: BATTERY_FULL,
            charging: true,
        }
    }
}

impl BatteryStatus {
    pub const fn to_nibble(self) -> u8 {
        (self.level & 0x0E) | self.charging as u8
    }

    pub const fn from_nibble(nibble: u8) -> Self {
        Self {
            level: nibble & 0x0E,
            charging: nibble & 0x01 != 0,
        }
    }
}

/// One analog stick. Both axes are 12 bit wide; anything above
/// [`STICK_MAX`] is cut to the field width when packed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Stick {
    pub x: u16,
    pub y: u16,
}

impl Default for Stick {
    fn default() -> Self {
        Self::CENTERED
    }
}

impl Stick {
    pub const CENTERED: Self = Self::new(STICK_CENTER, STICK_CENTER);

    pub const fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }

    pub const fn pack(self) -> [u8; 3] {
        [
            (self.x & 0xFF) as u8,
            (((self.y & 0x0F) << 4) | ((self.x >> 8) & 0x0F)) as u8,
            ((self.y >> 4) & 0xFF) as u8,
        ]
    }

    pub const fn unpack(bytes: [u8; 3]) -> Self {
        Self {
            x: (bytes[0] as u16) | (((bytes[1] as u16) & 0x0F) << 8),
            y: ((bytes[1] as u16) >> 4) | ((bytes[2] as u16) << 4),
        }
    }
}

/// The controller state shared by the standard (0x30) input report and every
/// subcommand reply (0x21).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StandardReport {
    /// Low nibble of byte 0.
    pub connection_info: u8,
    pub battery: BatteryStatus,
    pub buttons_right: ButtonsRight,
    pub buttons_shared: ButtonsShared,
    pub buttons_left: ButtonsLeft,
    pub left_stick: Stick,
    pub right_stick: Stick,
    pub vibrator_input_report: u8,
}

impl Default for StandardReport {
    fn default() -> Self {
        Self::idle()
    }
}

impl StandardReport {
    /// A controller sitting in its charging grip with nothing pressed and both
    /// sticks at rest. Served until the input producer delivers real state.
    pub const fn idle() -> Self {
        Self {
            connection_info: CONNECTION_USB_PRO,
            battery: BatteryStatus {
                level: BATTERY_FULL,
                charging: true,
            },
            buttons_right: ButtonsRight::from_byte(0),
            buttons_shared: ButtonsShared {
                charging_grip: true,
                ..ButtonsShared::from_byte(0)
            },
            buttons_left: ButtonsLeft::from_byte(0),
            left_stick: Stick::CENTERED,
            right_stick: Stick::CENTERED,
            vibrator_input_report: VIBRATOR_IDLE,
        }
    }

    pub fn encode(&self) -> [u8; STANDARD_REPORT_LEN] {
        let mut out = [0u8; STANDARD_REPORT_LEN];

        out[0] = (self.connection_info & 0x0F) | (self.battery.to_nibble() << 4);
        out[1] = self.buttons_right.to_byte();
        out[2] = self.buttons_shared.to_byte();
        out[3] = self.buttons_left.to_byte();
        out[4..7].copy_from_slice(&self.left_stick.pack());
        out[7..10].copy_from_slice(&self.right_stick.pack());
        out[10] = self.vibrator_input_report;

        out
    }

    pub fn decode(bytes: &[u8; STANDARD_REPORT_LEN]) -> Self {
        Self {
            connection_info: bytes[0] & 0x0F,
            battery: BatteryStatus::from_nibble(bytes[0] >> 4),
            buttons_right: ButtonsRight::from_byte(bytes[1]),
            buttons_shared: ButtonsShared::from_byte(bytes[2]),
            buttons_left: ButtonsLeft::from_byte(bytes[3]),
            left_stick: Stick::unpack([bytes[4], bytes[5], bytes[6]]),
            right_stick: Stick::unpack([bytes[7], bytes[8], bytes[9]]),
            vibrator_input_report: bytes[10],
        }
    }
}

/// One IMU sample, accelerometer then gyroscope, X/Y/Z each.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ImuFrame {
    pub accel: [i16; 3],
    pub gyro: [i16; 3],
}

impl ImuFrame {
    pub fn encode(&self) -> [u8; IMU_FRAME_LEN] {
        let mut out = [0u8; IMU_FRAME_LEN];

        self.accel
            .iter()
            .chain(self.gyro.iter())
            .zip(out.chunks_exact_mut(2))
            .for_each(|(axis, dst)| dst.copy_from_slice(&axis.to_le_bytes()));

        out
    }

    pub fn decode(bytes: &[u8; IMU_FRAME_LEN]) -> Self {
        let axis = |i: usize| i16::from_le_bytes([bytes[2 * i], bytes[2 * i + 1]]);

        Self {
            accel: [axis(0), axis(1), axis(2)],
            gyro: [axis(3), axis(4), axis(5)],
        }
    }
}

/// Standard state plus three IMU frames, as sent in full (0x30) mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ExtendedReport {
    pub standard: StandardReport,
    pub imu: [ImuFrame; IMU_FRAME_COUNT],
}

impl From<StandardReport> for ExtendedReport {
    fn from(standard: StandardReport) -> Self {
        Self {
            standard,
            imu: [ImuFrame::default(); IMU_FRAME_COUNT],
        }
    }
}

impl ExtendedReport {
    pub const fn idle() -> Self {
        Self {
            standard: StandardReport::idle(),
            imu: [ImuFrame {
                accel: [0; 3],
                gyro: [0; 3],
            }; IMU_FRAME_COUNT],
        }
    }

    pub fn encode(&self) -> [u8; EXTENDED_REPORT_LEN] {
        let mut out = [0u8; EXTENDED_REPORT_LEN];

        out[..STANDARD_REPORT_LEN].copy_from_slice(&self.standard.encode());
        out[STANDARD_REPORT_LEN..]
            .chunks_exact_mut(IMU_FRAME_LEN)
            .zip(self.imu.iter())
            .for_each(|(dst, frame)| dst.copy_from_slice(&frame.encode()));

        out
    }

    pub fn decode(bytes: &[u8; EXTENDED_REPORT_LEN]) -> Self {
        let mut standard = [0u8; STANDARD_REPORT_LEN];
        standard.copy_from_slice(&bytes[..STANDARD_REPORT_LEN]);

        let mut imu = [ImuFrame::default(); IMU_FRAME_COUNT];
        bytes[STANDARD_REPORT_LEN..]
            .chunks_exact(IMU_FRAME_LEN)
            .zip(imu.iter_mut())
            .for_each(|(src, frame)| {
                let mut raw = [0u8; IMU_FRAME_LEN];
                raw.copy_from_slice(src);
                *frame = ImuFrame::decode(&raw);
            });

        Self {
            standard: StandardReport::decode(&standard),
            imu,
        }
    }
}
