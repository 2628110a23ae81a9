#![no_std]
#![no_main]
mod input;
mod usb_comms;

use defmt::{info, warn};
use embassy_executor::Executor;
use embassy_rp::{
    adc::{self, Adc, Channel},
    bind_interrupts,
    clocks::RoscRng,
    flash::{Async, Flash},
    gpio::{AnyPin, Input, Pull},
    peripherals::USB,
    usb::{Driver, InterruptHandler},
};
use static_cell::StaticCell;

use input::{update_input_state_task, ButtonInputs, StickInputs};
use procon_emu::ControllerConfig;
use usb_comms::{format_serial, usb_transfer_task};

use {defmt_rtt as _, panic_probe as _};

static EXECUTOR0: StaticCell<Executor> = StaticCell::new();

const FLASH_SIZE: usize = 2 * 1024 * 1024;

bind_interrupts!(struct Irqs {
    USBCTRL_IRQ => InterruptHandler<USB>;
    ADC_IRQ_FIFO => adc::InterruptHandler;
});

#[cortex_m_rt::entry]
fn main() -> ! {
    info!("Initializing");

    let p = embassy_rp::init(Default::default());

    let driver = Driver::new(p.USB, Irqs);

    let mut flash = Flash::<_, Async, FLASH_SIZE>::new(p.FLASH, p.DMA_CH0);
    let mut uid = [0u8; 8];
    if flash.blocking_unique_id(&mut uid).is_err() {
        warn!("Failed to read flash unique id");
    }

    let mut config = ControllerConfig::with_random_mac(&mut RoscRng);

    let mut serial_buffer = [0u8; 16];
    match format_serial(&uid, &mut serial_buffer) {
        Some(serial) => {
            info!("Detected flash with unique serial number {}", serial);
            config.serial_number.copy_from_slice(serial.as_bytes());
        }
        None => warn!("Failed to format serial number"),
    }

    info!("Controller MAC address: {:x}", config.mac_address);

    let buttons = ButtonInputs {
        button_a: Input::new(AnyPin::from(p.PIN_0), Pull::Up),
        button_b: Input::new(AnyPin::from(p.PIN_1), Pull::Up),
        button_x: Input::new(AnyPin::from(p.PIN_2), Pull::Up),
        button_y: Input::new(AnyPin::from(p.PIN_3), Pull::Up),
        trigger_r: Input::new(AnyPin::from(p.PIN_4), Pull::Up),
        trigger_zr: Input::new(AnyPin::from(p.PIN_5), Pull::Up),
        button_minus: Input::new(AnyPin::from(p.PIN_6), Pull::Up),
        button_plus: Input::new(AnyPin::from(p.PIN_7), Pull::Up),
        button_thumb_r: Input::new(AnyPin::from(p.PIN_8), Pull::Up),
        button_thumb_l: Input::new(AnyPin::from(p.PIN_9), Pull::Up),
        button_home: Input::new(AnyPin::from(p.PIN_10), Pull::Up),
        button_capture: Input::new(AnyPin::from(p.PIN_11), Pull::Up),
        dpad_down: Input::new(AnyPin::from(p.PIN_12), Pull::Up),
        dpad_up: Input::new(AnyPin::from(p.PIN_13), Pull::Up),
        dpad_right: Input::new(AnyPin::from(p.PIN_14), Pull::Up),
        dpad_left: Input::new(AnyPin::from(p.PIN_15), Pull::Up),
        trigger_l: Input::new(AnyPin::from(p.PIN_16), Pull::Up),
        trigger_zl: Input::new(AnyPin::from(p.PIN_17), Pull::Up),
    };

    let sticks = StickInputs {
        adc: Adc::new(p.ADC, Irqs, adc::Config::default()),
        left_x: Channel::new_pin(p.PIN_26, Pull::None),
        left_y: Channel::new_pin(p.PIN_27, Pull::None),
        right_x: Channel::new_pin(p.PIN_28, Pull::None),
        right_y: Channel::new_pin(p.PIN_29, Pull::None),
    };

    let executor0 = EXECUTOR0.init(Executor::new());
    info!("Initialized.");

    executor0.run(|spawner| {
        spawner.must_spawn(usb_transfer_task(config, driver));
        spawner.must_spawn(update_input_state_task(config, buttons, sticks));
    });
}
