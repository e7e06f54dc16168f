//! Core traits and types for cycle-stepped emulation.
//!
//! Everything ticks at the master crystal frequency. All component timing
//! derives from it, and every interaction between components goes through
//! the [`Bus`] and the control lines in [`Pins`].

mod bus;
mod clock;
mod cpu;
mod observable;
mod pins;
mod tickable;
mod ticks;
mod transaction;

pub use bus::{Bus, ReadResult, SimpleBus};
pub use clock::{Divider, MasterClock};
pub use cpu::Cpu;
pub use observable::{Observable, Value, parse_address};
pub use pins::Pins;
pub use tickable::Tickable;
pub use ticks::Ticks;
pub use transaction::{AccessKind, BusTransaction};
