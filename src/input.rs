use defmt::{info, warn};
use embassy_rp::{
    adc::{Adc, Async, Channel},
    gpio::{AnyPin, Input},
};
use embassy_time::{Duration, Ticker};

use procon_emu::{
    procon::report::{Stick, STICK_CENTER, STICK_MAX},
    ControllerConfig, ExtendedReport, LiveFeed,
};

/// Latest complete input state, picked up by the report cycle.
pub static LIVE_FEED: LiveFeed = LiveFeed::new();

const SAMPLE_RATE_HZ: u64 = 1000;

macro_rules! pin_inputs {
    ($x:ident {$($f:ident),* $(,)?}) => {
        pub struct $x {
            $(
                pub $f: Input<'static, AnyPin>,
            )*
        }
    };
}

/// Buttons are active low.
macro_rules! assign_pins {
    ($report:expr, $inputs:expr, {$($p:ident.$c:ident),* $(,)?}) => {
        $(
            $report.$p.$c = $inputs.$c.is_low();
        )*
    };
}

pin_inputs!(ButtonInputs {
    button_a,
    button_b,
    button_x,
    button_y,
    trigger_r,
    trigger_zr,
    button_minus,
    button_plus,
    button_thumb_r,
    button_thumb_l,
    button_home,
    button_capture,
    dpad_down,
    dpad_up,
    dpad_right,
    dpad_left,
    trigger_l,
    trigger_zl,
});

pub struct StickInputs {
    pub adc: Adc<'static, Async>,
    pub left_x: Channel<'static>,
    pub left_y: Channel<'static>,
    pub right_x: Channel<'static>,
    pub right_y: Channel<'static>,
}

impl StickInputs {
    async fn read_axis(adc: &mut Adc<'static, Async>, channel: &mut Channel<'static>) -> u16 {
        match adc.read(channel).await {
            Ok(value) => value.min(STICK_MAX),
            Err(_) => {
                warn!("ADC read failed, reporting stick center");
                STICK_CENTER
            }
        }
    }

    async fn read(&mut self) -> (Stick, Stick) {
        let left = Stick::new(
            Self::read_axis(&mut self.adc, &mut self.left_x).await,
            Self::read_axis(&mut self.adc, &mut self.left_y).await,
        );
        let right = Stick::new(
            Self::read_axis(&mut self.adc, &mut self.right_x).await,
            Self::read_axis(&mut self.adc, &mut self.right_y).await,
        );

        (left, right)
    }
}

/// Samples buttons and sticks at a fixed rate and publishes every sample as a
/// complete report. The IMU frames stay zeroed, there is no IMU on the board.
#[embassy_executor::task]
pub async fn update_input_state_task(
    config: ControllerConfig,
    buttons: ButtonInputs,
    mut sticks: StickInputs,
) {
    info!("Input task started.");

    let mut report = ExtendedReport::from(config.idle_report());
    let mut ticker = Ticker::every(Duration::from_hz(SAMPLE_RATE_HZ));

    loop {
        assign_pins!(report.standard, buttons, {
            buttons_right.button_a,
            buttons_right.button_b,
            buttons_right.button_x,
            buttons_right.button_y,
            buttons_right.trigger_r,
            buttons_right.trigger_zr,
            buttons_shared.button_minus,
            buttons_shared.button_plus,
            buttons_shared.button_thumb_r,
            buttons_shared.button_thumb_l,
            buttons_shared.button_home,
            buttons_shared.button_capture,
            buttons_left.dpad_down,
            buttons_left.dpad_up,
            buttons_left.dpad_right,
            buttons_left.dpad_left,
            buttons_left.trigger_l,
            buttons_left.trigger_zl,
        });

        let (left, right) = sticks.read().await;
        report.standard.left_stick = left;
        report.standard.right_stick = right;

        LIVE_FEED.signal(report);

        ticker.next().await;
    }
}
