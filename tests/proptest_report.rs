//! Property-based tests for the input report wire layout.
//!
//! - every representable report survives encode/decode unchanged
//! - decoding is total, and re-encoding any byte pattern gives it back
//! - the SPI read is clamped and always returns the requested length

use proptest::prelude::*;

use procon_emu::{
    config::ControllerConfig,
    procon::{
        report::{
            BatteryStatus, ButtonsLeft, ButtonsRight, ButtonsShared, ExtendedReport, ImuFrame,
            StandardReport, Stick, EXTENDED_REPORT_LEN, STANDARD_REPORT_LEN, STICK_MAX,
        },
        spi::{SpiFlash, MAX_READ_LEN, UNMAPPED_FILL},
    },
};

fn stick() -> impl Strategy<Value = Stick> {
    (0..=STICK_MAX, 0..=STICK_MAX).prop_map(|(x, y)| Stick::new(x, y))
}

fn battery() -> impl Strategy<Value = BatteryStatus> {
    (0u8..=4, any::<bool>()).prop_map(|(level, charging)| BatteryStatus {
        level: level * 2,
        charging,
    })
}

fn standard_report() -> impl Strategy<Value = StandardReport> {
    (
        0u8..=0x0F,
        battery(),
        any::<[u8; 3]>(),
        stick(),
        stick(),
        any::<u8>(),
    )
        .prop_map(
            |(connection_info, battery, buttons, left_stick, right_stick, vibrator)| {
                StandardReport {
                    connection_info,
                    battery,
                    buttons_right: ButtonsRight::from_byte(buttons[0]),
                    buttons_shared: ButtonsShared::from_byte(buttons[1]),
                    buttons_left: ButtonsLeft::from_byte(buttons[2]),
                    left_stick,
                    right_stick,
                    vibrator_input_report: vibrator,
                }
            },
        )
}

fn imu_frame() -> impl Strategy<Value = ImuFrame> {
    (any::<[i16; 3]>(), any::<[i16; 3]>()).prop_map(|(accel, gyro)| ImuFrame { accel, gyro })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn prop_standard_report_round_trips(report in standard_report()) {
        prop_assert_eq!(StandardReport::decode(&report.encode()), report);
    }

    #[test]
    fn prop_extended_report_round_trips(
        standard in standard_report(),
        imu in prop::array::uniform3(imu_frame()),
    ) {
        let report = ExtendedReport { standard, imu };
        prop_assert_eq!(ExtendedReport::decode(&report.encode()), report);
    }

    #[test]
    fn prop_any_standard_bytes_reencode(bytes in any::<[u8; STANDARD_REPORT_LEN]>()) {
        prop_assert_eq!(StandardReport::decode(&bytes).encode(), bytes);
    }

    #[test]
    fn prop_any_extended_bytes_reencode(bytes in prop::collection::vec(any::<u8>(), EXTENDED_REPORT_LEN)) {
        let mut raw = [0u8; EXTENDED_REPORT_LEN];
        raw.copy_from_slice(&bytes);
        prop_assert_eq!(ExtendedReport::decode(&raw).encode(), raw);
    }

    #[test]
    fn prop_spi_read_has_clamped_length(address: u32, length: u8) {
        let flash = SpiFlash::new(&ControllerConfig::default());
        let chunk = flash.read(address, length);

        prop_assert_eq!(chunk.len(), length.min(MAX_READ_LEN) as usize);
    }

    #[test]
    fn prop_spi_read_far_outside_flash_is_fill(address in 0x9000u32.., length: u8) {
        let flash = SpiFlash::new(&ControllerConfig::default());
        let chunk = flash.read(address, length);

        prop_assert!(chunk.iter().all(|b| *b == UNMAPPED_FILL));
    }
}
