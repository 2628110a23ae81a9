/**
 * Communication with the console / PC over USB HID.
 * Advertises a wired Pro Controller and runs the report cycle on its
 * interrupt endpoints.
 */
use defmt::{debug, info, trace, warn};
use embassy_futures::join::join;
use embassy_rp::{peripherals::USB, usb::Driver as EmbassyDriver};
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, mutex::Mutex};
use embassy_usb::{
    class::hid::{HidReaderWriter, ReadError, State},
    Builder, Handler,
};
use portable_atomic::{AtomicU32, Ordering};

use procon_emu::{
    descriptor::{
        MANUFACTURER, PACKET_LEN, POLL_MS, PROCON_PID, PROCON_REPORT_DESCRIPTOR, PROCON_VID,
        PRODUCT,
    },
    ControllerConfig, ReportCycle,
};

use crate::input::LIVE_FEED;

/// Bumped every time the host configures the device.
static CONFIGURATION_EPOCH: AtomicU32 = AtomicU32::new(0);

/// Only tracks configuration changes; the report cycle picks them up through
/// [`CONFIGURATION_EPOCH`].
struct ConfigurationTracker;

impl Handler for ConfigurationTracker {
    fn reset(&mut self) {
        debug!("USB bus reset");
    }

    fn configured(&mut self, configured: bool) {
        if configured {
            let epoch = CONFIGURATION_EPOCH.fetch_add(1, Ordering::Relaxed) + 1;
            info!("Configured by host, configuration epoch {}", epoch);
        } else {
            info!("No longer configured");
        }
    }
}

/// Hex representation of the flash unique ID, also used as the controller's
/// serial number.
pub fn format_serial<'b>(raw_serial: &[u8; 8], buf: &'b mut [u8]) -> Option<&'b str> {
    format_no_std::show(
        buf,
        format_args!(
            "{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}",
            raw_serial[0],
            raw_serial[1],
            raw_serial[2],
            raw_serial[3],
            raw_serial[4],
            raw_serial[5],
            raw_serial[6],
            raw_serial[7]
        ),
    )
    .ok()
}

#[embassy_executor::task]
pub async fn usb_transfer_task(config: ControllerConfig, driver: EmbassyDriver<'static, USB>) {
    let serial = core::str::from_utf8(&config.serial_number).ok();

    trace!("Start of config");
    let mut usb_config = embassy_usb::Config::new(PROCON_VID, PROCON_PID);
    usb_config.manufacturer = Some(MANUFACTURER);
    usb_config.product = Some(PRODUCT);
    usb_config.serial_number = serial;
    usb_config.max_power = 500;
    usb_config.max_packet_size_0 = 64;
    usb_config.device_class = 0;
    usb_config.device_protocol = 0;
    usb_config.self_powered = false;
    usb_config.device_sub_class = 0;
    usb_config.supports_remote_wakeup = true;

    let mut device_descriptor = [0; 256];
    let mut config_descriptor = [0; 256];
    let mut bos_descriptor = [0; 256];
    let mut msos_descriptor = [0; 256];
    let mut control_buf = [0; 64];

    let mut device_handler = ConfigurationTracker;

    let mut state = State::new();

    let mut builder = Builder::new(
        driver,
        usb_config,
        &mut device_descriptor,
        &mut config_descriptor,
        &mut bos_descriptor,
        &mut msos_descriptor,
        &mut control_buf,
    );

    builder.handler(&mut device_handler);

    let hid_config = embassy_usb::class::hid::Config {
        report_descriptor: PROCON_REPORT_DESCRIPTOR,
        request_handler: None,
        poll_ms: POLL_MS,
        max_packet_size: PACKET_LEN as u16,
    };

    let hid = HidReaderWriter::<_, PACKET_LEN, PACKET_LEN>::new(&mut builder, &mut state, hid_config);

    let mut usb = builder.build();

    let (mut reader, mut writer) = hid.split();

    let cycle: Mutex<CriticalSectionRawMutex, ReportCycle<'static>> =
        Mutex::new(ReportCycle::new(&config, &LIVE_FEED));
    let cycle = &cycle;

    let usb_fut = async {
        loop {
            usb.run_until_suspend().await;
            debug!("Suspended");
            usb.wait_resume().await;
            debug!("RESUMED!");
        }
    };

    let in_fut = async move {
        loop {
            writer.ready().await;

            let packet = {
                let mut cycle = cycle.lock().await;
                cycle.sync_configuration(CONFIGURATION_EPOCH.load(Ordering::Relaxed));
                cycle.next_in_packet()
            };

            trace!("Writing report: {:x}", packet);

            if let Err(e) = writer.write(&packet).await {
                warn!("Failed to send report: {:?}", e);
            }
        }
    };

    let out_fut = async move {
        let mut buf = [0u8; PACKET_LEN];

        loop {
            let len = match reader.read(&mut buf).await {
                Ok(len) => len,
                Err(ReadError::BufferOverflow) => {
                    // Packet was longer than one transfer, keep what we got.
                    PACKET_LEN
                }
                Err(e) => {
                    debug!("Failed to read OUT packet: {:?}", e);
                    continue;
                }
            };

            let mut cycle = cycle.lock().await;
            cycle.sync_configuration(CONFIGURATION_EPOCH.load(Ordering::Relaxed));
            if let Err(e) = cycle.handle_out(&buf[..len]) {
                debug!("Dropping OUT packet: {}", e);
            }
        }
    };

    join(usb_fut, join(in_fut, out_fut)).await;
}
