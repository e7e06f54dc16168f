//! Memory and I/O bus interface.

/// Result of a bus read: the data byte plus any wait states the addressed
/// device inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadResult {
    pub data: u8,
    /// Extra T-states the CPU must burn before the next micro-cycle.
    pub wait: u8,
}

impl ReadResult {
    #[must_use]
    pub const fn new(data: u8) -> Self {
        Self { data, wait: 0 }
    }

    #[must_use]
    pub const fn with_wait(data: u8, wait: u8) -> Self {
        Self { data, wait }
    }
}

/// Memory and I/O bus interface.
///
/// Components access memory and peripherals through this trait. The bus
/// handles address decoding and routing to the appropriate device, and is
/// the only way one component can observe another.
///
/// Addresses are `u32` so the same trait serves 16-bit and wider CPUs.
/// Narrower CPUs zero-extend.
pub trait Bus {
    /// Read a byte from memory.
    fn read(&mut self, address: u32) -> ReadResult;

    /// Write a byte to memory. Returns the number of wait states inserted.
    fn write(&mut self, address: u32, value: u8) -> u8;

    /// Read a byte from an I/O port. Unconnected ports float high.
    fn io_read(&mut self, address: u32) -> ReadResult {
        let _ = address;
        ReadResult::new(0xFF)
    }

    /// Write a byte to an I/O port. Returns the number of wait states inserted.
    fn io_write(&mut self, address: u32, value: u8) -> u8 {
        let _ = (address, value);
        0
    }

    /// Interrupt acknowledge cycle (M1 with IORQ).
    ///
    /// Returns the byte the interrupting device places on the data bus. A
    /// bus with nothing driving it returns 0xFF, which is `RST 38h` in
    /// interrupt mode 0 and the low vector byte in mode 2.
    fn interrupt_ack(&mut self) -> u8 {
        0xFF
    }
}

/// Flat 64 KiB RAM bus with no wait states and unconnected I/O.
///
/// Used by CPU tests and tools that need nothing more than memory.
pub struct SimpleBus {
    ram: Box<[u8; 0x1_0000]>,
}

impl SimpleBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ram: Box::new([0; 0x1_0000]),
        }
    }

    /// Copy `data` into RAM starting at `address`, wrapping at 64 KiB.
    pub fn load(&mut self, address: u16, data: &[u8]) {
        let mut addr = address;
        for &byte in data {
            self.ram[addr as usize] = byte;
            addr = addr.wrapping_add(1);
        }
    }

    /// Read a byte without bus side effects.
    #[must_use]
    pub fn peek(&self, address: u16) -> u8 {
        self.ram[address as usize]
    }

    /// Write a byte without bus side effects.
    pub fn poke(&mut self, address: u16, value: u8) {
        self.ram[address as usize] = value;
    }
}

impl Default for SimpleBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus for SimpleBus {
    fn read(&mut self, address: u32) -> ReadResult {
        ReadResult::new(self.ram[(address & 0xFFFF) as usize])
    }

    fn write(&mut self, address: u32, value: u8) -> u8 {
        self.ram[(address & 0xFFFF) as usize] = value;
        0
    }
}
