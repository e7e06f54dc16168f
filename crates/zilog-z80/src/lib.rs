//! Cycle-stepped Zilog Z80 CPU.
//!
//! Each call to `tick()` advances exactly one T-state. The CPU talks to the
//! outside world only through an [`emu_core::Bus`] lent to it on every tick
//! and the control lines in [`emu_core::Pins`].
//!
//! ```
//! use emu_core::SimpleBus;
//! use zilog_z80::Z80;
//!
//! let mut bus = SimpleBus::new();
//! bus.load(0, &[0x3E, 0x2A, 0x76]); // LD A,42; HALT
//! let mut cpu = Z80::new();
//! while !cpu.is_halted() {
//!     cpu.step_instruction(&mut bus);
//! }
//! assert_eq!(cpu.a(), 42);
//! ```

mod alu;
mod cpu;
mod flags;
mod microcode;
mod options;
mod registers;

pub use cpu::{CpuState, Z80};
pub use flags::{CF, HF, NF, PF, SF, XF, YF, ZF};
pub use options::{Variant, Z80Options};
pub use registers::Registers;

#[cfg(feature = "test-utils")]
pub use microcode::{Addr, MicroOp, Slot};
