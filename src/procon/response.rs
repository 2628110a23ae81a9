//! Chooses what goes out on the next IN transfer.
//!
//! A reply to a host request always wins over the input state, but only for
//! one transfer. Afterwards the latest live state (or the idle state, if no
//! input was ever provided) takes over again.

use super::{
    report::{ExtendedReport, StandardReport, EXTENDED_REPORT_LEN, STANDARD_REPORT_LEN},
    subcommand::SubcommandReply,
    usb_command::UsbReply,
    ProconResponseId,
};
use crate::{config::ControllerConfig, descriptor::PACKET_LEN};

const ACK_OFFSET: usize = 2 + STANDARD_REPORT_LEN;
const SUBCOMMAND_OFFSET: usize = ACK_OFFSET + 1;
const REPLY_DATA_OFFSET: usize = SUBCOMMAND_OFFSET + 1;

/// A reply waiting for the next IN transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Reply {
    Subcommand(SubcommandReply),
    Usb(UsbReply),
}

impl From<SubcommandReply> for Reply {
    fn from(value: SubcommandReply) -> Self {
        Self::Subcommand(value)
    }
}

impl From<UsbReply> for Reply {
    fn from(value: UsbReply) -> Self {
        Self::Usb(value)
    }
}

/// What [`ResponseManager::next_outgoing`] picked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutgoingReport {
    /// Plain input state.
    Input(ExtendedReport),
    /// A reply, together with the input state to embed in it.
    Reply(Reply, StandardReport),
}

impl OutgoingReport {
    /// Serializes into one IN packet. `timer` only ends up in reports that
    /// carry input state.
    pub fn to_packet(&self, timer: u8) -> [u8; PACKET_LEN] {
        let mut packet = [0u8; PACKET_LEN];

        match self {
            Self::Input(report) => {
                packet[0] = ProconResponseId::GetState as u8;
                packet[1] = timer;
                packet[2..2 + EXTENDED_REPORT_LEN].copy_from_slice(&report.encode());
            }
            Self::Reply(Reply::Subcommand(reply), state) => {
                packet[0] = ProconResponseId::Command as u8;
                packet[1] = timer;
                packet[2..ACK_OFFSET].copy_from_slice(&state.encode());
                packet[ACK_OFFSET] = reply.ack;
                packet[SUBCOMMAND_OFFSET] = reply.subcommand;

                let data = reply.data();
                packet[REPLY_DATA_OFFSET..REPLY_DATA_OFFSET + data.len()].copy_from_slice(data);
            }
            Self::Reply(Reply::Usb(reply), _) => {
                packet[0] = ProconResponseId::GetInfo as u8;
                packet[1] = reply.command;

                let data = reply.data();
                packet[2..2 + data.len()].copy_from_slice(data);
            }
        }

        packet
    }

    /// Whether this carries a reply rather than plain input.
    pub fn is_reply(&self) -> bool {
        matches!(self, Self::Reply(..))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum Selection {
    Idle,
    Live(ExtendedReport),
    PendingReply {
        reply: Reply,
        /// Live state to fall back to once the reply is out.
        resume: Option<ExtendedReport>,
    },
}

#[derive(Clone, Copy, Debug)]
pub struct ResponseManager {
    idle: ExtendedReport,
    selection: Selection,
}

impl Default for ResponseManager {
    fn default() -> Self {
        Self::new(&ControllerConfig::default())
    }
}

impl ResponseManager {
    pub fn new(config: &ControllerConfig) -> Self {
        Self {
            idle: ExtendedReport::from(config.idle_report()),
            selection: Selection::Idle,
        }
    }

    /// Replaces the live state. A pending reply stays pending.
    pub fn update_live(&mut self, report: ExtendedReport) {
        match &mut self.selection {
            Selection::PendingReply { resume, .. } => *resume = Some(report),
            selection => *selection = Selection::Live(report),
        }
    }

    /// Queues a reply for the next transfer. An older reply that was not sent
    /// yet is dropped.
    pub fn submit_reply(&mut self, reply: impl Into<Reply>) {
        let reply = reply.into();

        let resume = match self.selection {
            Selection::Idle => None,
            Selection::Live(report) => Some(report),
            Selection::PendingReply { reply: dropped, resume } => {
                debug!("Dropping unsent reply {:?}", dropped);
                resume
            }
        };

        self.selection = Selection::PendingReply { reply, resume };
    }

    /// Picks the next report. A pending reply is returned exactly once.
    pub fn next_outgoing(&mut self) -> OutgoingReport {
        match self.selection {
            Selection::Idle => OutgoingReport::Input(self.idle),
            Selection::Live(report) => OutgoingReport::Input(report),
            Selection::PendingReply { reply, resume } => {
                let state = match resume {
                    Some(report) => {
                        self.selection = Selection::Live(report);
                        report.standard
                    }
                    None => {
                        self.selection = Selection::Idle;
                        self.idle.standard
                    }
                };

                OutgoingReport::Reply(reply, state)
            }
        }
    }

    pub fn has_pending_reply(&self) -> bool {
        matches!(self.selection, Selection::PendingReply { .. })
    }

    /// Drops a pending reply, keeping the live state.
    pub fn reset(&mut self) {
        if let Selection::PendingReply { resume, .. } = self.selection {
            self.selection = match resume {
                Some(report) => Selection::Live(report),
                None => Selection::Idle,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procon::{
        report::{ImuFrame, Stick},
        subcommand::{SubcommandProcessor, SW_CMD_GET_PLAYER_LIGHTS},
        OutPacket,
    };

    fn live_report(x: u16) -> ExtendedReport {
        let mut report = ExtendedReport::idle();
        report.standard.left_stick = Stick::new(x, 0x800);
        report.standard.buttons_right.button_a = true;
        report.imu[2] = ImuFrame {
            accel: [1, 2, 3],
            gyro: [-1, -2, -3],
        };
        report
    }

    fn some_reply() -> SubcommandReply {
        let mut packet = [0u8; 11];
        packet[0] = 0x01;
        packet[10] = SW_CMD_GET_PLAYER_LIGHTS;

        SubcommandProcessor::default()
            .process(&OutPacket::from_slice(&packet))
            .unwrap()
    }

    #[test]
    fn idle_before_any_input() {
        let mut manager = ResponseManager::default();

        assert_eq!(
            manager.next_outgoing(),
            OutgoingReport::Input(ExtendedReport::idle())
        );
    }

    #[test]
    fn live_state_is_repeated() {
        let mut manager = ResponseManager::default();
        manager.update_live(live_report(0x123));

        for _ in 0..3 {
            assert_eq!(
                manager.next_outgoing(),
                OutgoingReport::Input(live_report(0x123))
            );
        }
    }

    #[test]
    fn reply_is_sent_exactly_once() {
        let mut manager = ResponseManager::default();
        manager.update_live(live_report(0x123));
        manager.submit_reply(some_reply());

        assert_eq!(
            manager.next_outgoing(),
            OutgoingReport::Reply(Reply::Subcommand(some_reply()), live_report(0x123).standard)
        );
        assert_eq!(
            manager.next_outgoing(),
            OutgoingReport::Input(live_report(0x123))
        );
        assert!(!manager.has_pending_reply());
    }

    #[test]
    fn reply_from_idle_goes_back_to_idle() {
        let mut manager = ResponseManager::default();
        manager.submit_reply(some_reply());

        assert!(manager.next_outgoing().is_reply());
        assert_eq!(
            manager.next_outgoing(),
            OutgoingReport::Input(ExtendedReport::idle())
        );
    }

    #[test]
    fn live_update_does_not_override_pending_reply() {
        let mut manager = ResponseManager::default();
        manager.update_live(live_report(0x100));
        manager.submit_reply(some_reply());
        manager.update_live(live_report(0x200));

        assert_eq!(
            manager.next_outgoing(),
            OutgoingReport::Reply(Reply::Subcommand(some_reply()), live_report(0x200).standard)
        );
        assert_eq!(
            manager.next_outgoing(),
            OutgoingReport::Input(live_report(0x200))
        );
    }

    #[test]
    fn newer_reply_replaces_older_one() {
        let mut manager = ResponseManager::default();
        let older = some_reply();
        let mut newer = some_reply();
        newer.ack = 0x90;

        manager.submit_reply(older);
        manager.submit_reply(newer);

        assert!(matches!(
            manager.next_outgoing(),
            OutgoingReport::Reply(Reply::Subcommand(reply), _) if reply.ack == 0x90
        ));
        assert!(!manager.next_outgoing().is_reply());
    }

    #[test]
    fn reset_drops_pending_reply_only() {
        let mut manager = ResponseManager::default();
        manager.update_live(live_report(0x300));
        manager.submit_reply(some_reply());

        manager.reset();

        assert_eq!(
            manager.next_outgoing(),
            OutgoingReport::Input(live_report(0x300))
        );
    }

    #[test]
    fn input_packet_layout() {
        let packet = OutgoingReport::Input(live_report(0x123)).to_packet(0x42);

        assert_eq!(packet[0], 0x30);
        assert_eq!(packet[1], 0x42);
        assert_eq!(packet[2..49], live_report(0x123).encode());
        assert!(packet[49..].iter().all(|b| *b == 0));
    }

    #[test]
    fn subcommand_reply_packet_layout() {
        let state = live_report(0x123).standard;
        let packet = OutgoingReport::Reply(some_reply().into(), state).to_packet(7);

        assert_eq!(packet[0], 0x21);
        assert_eq!(packet[1], 7);
        assert_eq!(packet[2..13], state.encode());
        assert_eq!(packet[13], 0xB0);
        assert_eq!(packet[14], SW_CMD_GET_PLAYER_LIGHTS);
        assert_eq!(packet[15], 0x00);
    }
}
