//! Expansion slot for chips the machine does not build in (PPI, CRTC, FDC,
//! sound). A peripheral sees only its own I/O cycles and the CPU clock; its
//! outputs are merged onto the CPU's control lines every T-state.

use crate::io::ChipSelect;
use crate::memory::Memory;

pub trait Peripheral {
    /// Name used in logs and configuration errors.
    fn name(&self) -> &str;

    /// I/O read from a selected port.
    fn io_read(&mut self, port: u16) -> u8;

    /// I/O write to a selected port.
    fn io_write(&mut self, port: u16, value: u8);

    /// One CPU T-state.
    fn tick(&mut self) {}

    /// INT request. Level sensitive: hold it until serviced.
    fn int(&self) -> bool {
        false
    }

    /// WAIT request.
    fn wait(&self) -> bool {
        false
    }

    /// BUSREQ request.
    fn busreq(&self) -> bool {
        false
    }

    /// One T-state of bus ownership, granted while `busreq()` holds.
    fn bus_cycle(&mut self, memory: &mut Memory) {
        let _ = memory;
    }

    /// Interrupt acknowledge seen on the bus.
    fn acknowledge(&mut self) {}
}

/// A peripheral and the ports it answers to.
pub struct Slot {
    pub select: ChipSelect,
    pub device: Box<dyn Peripheral>,
}

impl Slot {
    #[must_use]
    pub fn new(select: ChipSelect, device: Box<dyn Peripheral>) -> Self {
        Self { select, device }
    }
}
