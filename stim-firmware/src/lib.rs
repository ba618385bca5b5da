#![cfg_attr(not(feature = "std"), no_std)]

//! Firmware binary glue for the two-channel stimulation box: the
//! foreground loop, the hardware-collaborator traits it's generic
//! over, and the serial address-map wiring that ties `stim-protocol`'s
//! framing to the live engine state owned by `mode-dispatch` and
//! `stim-persist`.
//!
//! This crate is a library, not a `[[bin]]`: the concrete board (clock
//! setup, timer/ADC/DAC/UART/EEPROM drivers, interrupt vector table)
//! is out of scope, the same way it is for the reference firmware's
//! `k5board` collaborators. A board crate would implement
//! [`hardware::PulseHardware`], [`hardware::DacWrite`], [`hardware::AdcRead`],
//! [`hardware::Watchdog`], and [`stim_persist::PersistentStore`], then
//! drive [`foreground::Foreground::run_pass`] from its main loop and
//! [`foreground::Foreground::handle_serial_byte`] from its UART RX
//! path.

mod address_map;
mod error;
mod foreground;
mod hardware;
mod session;

pub use address_map::AddressMap;
pub use error::{Error, Result};
pub use foreground::Foreground;
pub use hardware::{AdcRead, DacWrite, PulseHardware, Watchdog};
pub use session::{SerialSession, SessionEvent};
