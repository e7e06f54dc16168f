//! Bus transaction records.

use crate::Ticks;

/// What kind of cycle a bus transaction was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AccessKind {
    /// Opcode fetch (M1).
    Fetch,
    MemRead,
    MemWrite,
    IoRead,
    IoWrite,
    /// Interrupt acknowledge (M1 with IORQ): the data byte is the vector.
    IntAck,
}

impl AccessKind {
    /// True for cycles where the CPU drives the data bus.
    #[must_use]
    pub const fn is_write(self) -> bool {
        matches!(self, Self::MemWrite | Self::IoWrite)
    }
}

/// One completed bus transaction: address, direction, data, and the tick at
/// which the data was latched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BusTransaction {
    pub address: u16,
    pub kind: AccessKind,
    pub data: u8,
    pub tick: Ticks,
}

impl BusTransaction {
    #[must_use]
    pub const fn new(address: u16, kind: AccessKind, data: u8, tick: Ticks) -> Self {
        Self {
            address,
            kind,
            data,
            tick,
        }
    }
}

impl core::fmt::Display for BusTransaction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let arrow = if self.kind.is_write() { "<-" } else { "->" };
        write!(
            f,
            "@{} {:?} ${:04X} {arrow} ${:02X}",
            self.tick.get(),
            self.kind,
            self.address,
            self.data
        )
    }
}
