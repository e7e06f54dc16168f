//! Control lines between a CPU and the rest of the machine.

/// Snapshot of the CPU's control lines.
///
/// All lines are modelled active-high regardless of the real pin polarity:
/// `wait == true` means the WAIT line is asserted.
///
/// Inputs are driven by the system composition from aggregated peripheral
/// signals. Outputs are driven by the CPU and only read by everyone else.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Pins {
    // Inputs
    /// Maskable interrupt request (level-sensitive).
    pub int: bool,
    /// Non-maskable interrupt (edge-triggered).
    pub nmi: bool,
    /// Memory or I/O device not ready; the CPU inserts wait states.
    pub wait: bool,
    /// Hold the CPU in reset.
    pub reset: bool,
    /// A DMA-capable device wants the bus.
    pub busreq: bool,

    // Outputs
    /// The CPU has released the bus in response to `busreq`.
    pub busack: bool,
    /// The CPU is executing HALT.
    pub halt: bool,
    /// The current machine cycle is an opcode fetch or interrupt acknowledge.
    pub m1: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pins_are_idle() {
        let pins = Pins::default();
        assert!(!pins.int && !pins.nmi && !pins.wait && !pins.reset && !pins.busreq);
        assert!(!pins.busack && !pins.halt && !pins.m1);
    }
}
