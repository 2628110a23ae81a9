//! The report cycle: host requests in, one report out per IN transfer.

use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, signal::Signal};

use crate::{
    config::ControllerConfig,
    descriptor::PACKET_LEN,
    procon::{
        report::ExtendedReport,
        response::{OutgoingReport, ResponseManager},
        subcommand::{DeviceSettings, SubcommandProcessor},
        usb_command::UsbCommandHandler,
        OutPacket, ProconRequestId, RequestError,
    },
    transport::{InEndpoint, OutEndpoint},
};

/// Hands complete input states from the producer to the report cycle. Only
/// the latest state is kept.
pub type LiveFeed = Signal<CriticalSectionRawMutex, ExtendedReport>;

pub struct ReportCycle<'a> {
    feed: &'a LiveFeed,
    processor: SubcommandProcessor,
    usb_commands: UsbCommandHandler,
    responses: ResponseManager,
    timer: u8,
    configuration: u32,
}

impl<'a> ReportCycle<'a> {
    pub fn new(config: &ControllerConfig, feed: &'a LiveFeed) -> Self {
        Self {
            feed,
            processor: SubcommandProcessor::new(config),
            usb_commands: UsbCommandHandler::new(config),
            responses: ResponseManager::new(config),
            timer: 0,
            configuration: 0,
        }
    }

    /// Resets the cycle once per new USB configuration. Must run before both
    /// [`Self::handle_out`] and [`Self::next_in_packet`], whichever comes
    /// first after the host configures the device.
    pub fn sync_configuration(&mut self, configuration: u32) {
        if configuration != self.configuration {
            self.configuration = configuration;
            self.reset();
        }
    }

    pub fn settings(&self) -> &DeviceSettings {
        self.processor.settings()
    }

    /// Handles one packet from the OUT endpoint, queueing a reply if the
    /// request asks for one.
    pub fn handle_out(&mut self, data: &[u8]) -> Result<(), RequestError> {
        let packet = OutPacket::from_slice(data);

        trace!("OUT packet: {:x}", data);

        match packet.report_id()? {
            ProconRequestId::Command => {
                let reply = self.processor.process(&packet)?;
                self.responses.submit_reply(reply);
            }
            ProconRequestId::UsbCommand => {
                let settings = self.processor.settings_mut();
                if let Some(reply) = self.usb_commands.process(&packet, settings)? {
                    self.responses.submit_reply(reply);
                }
            }
            ProconRequestId::Rumble | ProconRequestId::RawCommand => {
                trace!("Discarding rumble/raw packet");
            }
        }

        Ok(())
    }

    /// Builds the packet for the next IN transfer from the latest input
    /// state, or the pending reply if there is one.
    pub fn next_in_packet(&mut self) -> [u8; PACKET_LEN] {
        if let Some(report) = self.feed.try_take() {
            self.responses.update_live(report);
        }

        let outgoing: OutgoingReport = self.responses.next_outgoing();
        let packet = outgoing.to_packet(self.timer);
        self.timer = self.timer.wrapping_add(1);

        packet
    }

    /// One non-blocking iteration over both endpoints. Nothing in here is
    /// fatal: bad requests and failed transfers are logged and dropped.
    pub fn poll<R: OutEndpoint, W: InEndpoint>(&mut self, reader: &mut R, writer: &mut W) {
        let mut buf = [0u8; PACKET_LEN];

        if let Some(len) = reader.try_read(&mut buf) {
            if let Err(e) = self.handle_out(&buf[..len.min(PACKET_LEN)]) {
                debug!("Dropping OUT packet: {}", e);
            }
        }

        if writer.is_ready() {
            let packet = self.next_in_packet();
            if let Err(e) = writer.try_write(&packet) {
                warn!("Failed to send report: {:?}", e);
            }
        }
    }

    /// Back to power-on state after the host (re)configured the device. The
    /// live input state survives, a pending reply doesn't.
    pub fn reset(&mut self) {
        info!("Resetting emulated controller state");
        self.processor.reset();
        self.responses.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procon::report::Stick;

    #[test]
    fn timer_advances_per_packet_and_wraps() {
        let feed = LiveFeed::new();
        let mut cycle = ReportCycle::new(&ControllerConfig::default(), &feed);

        for expected in 0..=u8::MAX {
            assert_eq!(cycle.next_in_packet()[1], expected);
        }
        assert_eq!(cycle.next_in_packet()[1], 0);
    }

    #[test]
    fn latest_feed_value_wins() {
        let feed = LiveFeed::new();
        let mut cycle = ReportCycle::new(&ControllerConfig::default(), &feed);

        let mut first = ExtendedReport::idle();
        first.standard.left_stick = Stick::new(0x100, 0x100);
        let mut second = ExtendedReport::idle();
        second.standard.left_stick = Stick::new(0x200, 0x200);

        feed.signal(first);
        feed.signal(second);

        let packet = cycle.next_in_packet();
        assert_eq!(packet[2..49], second.encode());

        // No new value: the last one is repeated.
        let packet = cycle.next_in_packet();
        assert_eq!(packet[2..49], second.encode());
    }

    #[test]
    fn reset_restores_settings_and_drops_reply() {
        let feed = LiveFeed::new();
        let mut cycle = ReportCycle::new(&ControllerConfig::default(), &feed);

        let mut packet = [0u8; 12];
        packet[0] = 0x01;
        packet[10] = 0x40;
        packet[11] = 0x01;
        cycle.handle_out(&packet).unwrap();
        assert!(cycle.settings().imu_enabled);

        cycle.reset();

        assert_eq!(*cycle.settings(), DeviceSettings::default());
        assert_eq!(cycle.next_in_packet()[0], 0x30);
    }

    #[test]
    fn request_before_first_in_of_new_configuration_is_answered() {
        let feed = LiveFeed::new();
        let mut cycle = ReportCycle::new(&ControllerConfig::default(), &feed);

        // Host sends a status request right after SET_CONFIGURATION.
        cycle.sync_configuration(1);
        cycle.handle_out(&[0x80, 0x01]).unwrap();

        cycle.sync_configuration(1);
        let packet = cycle.next_in_packet();
        assert_eq!(packet[..2], [0x81, 0x01]);
        assert_eq!(cycle.next_in_packet()[0], 0x30);
    }

    #[test]
    fn new_configuration_resets_once() {
        let feed = LiveFeed::new();
        let mut cycle = ReportCycle::new(&ControllerConfig::default(), &feed);

        cycle.sync_configuration(1);
        let mut packet = [0u8; 12];
        packet[0] = 0x01;
        packet[10] = 0x30;
        packet[11] = 0x05;
        cycle.handle_out(&packet).unwrap();

        cycle.sync_configuration(1);
        assert_eq!(cycle.settings().player_lights, 0x05);
        assert_eq!(cycle.next_in_packet()[0], 0x21);

        cycle.handle_out(&packet).unwrap();
        cycle.sync_configuration(2);
        assert_eq!(*cycle.settings(), DeviceSettings::default());
        assert_eq!(cycle.next_in_packet()[0], 0x30);
    }

    #[test]
    fn unsupported_report_id_is_an_error() {
        let feed = LiveFeed::new();
        let mut cycle = ReportCycle::new(&ControllerConfig::default(), &feed);

        assert_eq!(
            cycle.handle_out(&[0x42, 0x00]),
            Err(RequestError::UnsupportedReportId(0x42))
        );
        assert_eq!(cycle.handle_out(&[0x10, 0x00, 0x01]), Ok(()));
        assert_eq!(cycle.next_in_packet()[0], 0x30);
    }
}
