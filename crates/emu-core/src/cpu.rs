//! CPU core trait.

use crate::{Bus, Pins, Ticks};

/// A CPU core.
///
/// CPUs execute instructions and access memory through a bus. Unlike other
/// `Tickable` components, CPUs take a bus reference in their tick method
/// because they drive bus cycles on specific T-states.
///
/// Peripherals never touch CPU state directly: they drive the input lines
/// in [`Pins`] and the CPU samples them at the points the silicon does.
pub trait Cpu {
    /// The type used for register inspection.
    type Registers;

    /// Advance the CPU by one T-state.
    ///
    /// The bus is lent, not owned, so the system composition can keep
    /// ticking other components against the same address space.
    fn tick<B: Bus>(&mut self, bus: &mut B);

    /// Returns the current program counter, zero-extended.
    fn pc(&self) -> u32;

    /// Returns a snapshot of all registers for inspection.
    fn registers(&self) -> Self::Registers;

    /// Returns true if the CPU is halted.
    fn is_halted(&self) -> bool;

    /// Assert the maskable interrupt line.
    ///
    /// Returns true if the CPU would accept it at the next instruction
    /// boundary (interrupts enabled).
    fn interrupt(&mut self) -> bool;

    /// Pulse the non-maskable interrupt line.
    fn nmi(&mut self);

    /// Reset the CPU to its power-on state.
    fn reset(&mut self);

    /// Current state of the control lines.
    fn pins(&self) -> Pins;

    /// T-states elapsed since construction.
    fn total_ticks(&self) -> Ticks;
}
