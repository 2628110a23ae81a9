//! Emulation core of a wired Nintendo Switch Pro Controller.
//!
//! The host talks to the controller through 64-byte interrupt packets. The
//! [`cycle::ReportCycle`] decodes what comes in on the OUT endpoint, keeps the
//! emulated device settings, and picks what goes out on the IN endpoint:
//! either a one-shot reply or the latest input state fed through a
//! [`cycle::LiveFeed`].
#![cfg_attr(not(test), no_std)]

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod config;
pub mod cycle;
pub mod descriptor;
pub mod procon;
pub mod transport;

pub use config::ControllerConfig;
pub use cycle::{LiveFeed, ReportCycle};
pub use procon::report::{ExtendedReport, StandardReport};
