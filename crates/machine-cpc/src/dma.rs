//! Memory-to-memory DMA channel.
//!
//! Programmed through eight I/O registers selected by A2-A0:
//!
//! | reg | write | read |
//! |-----|-------|------|
//! | 0-1 | source (lo, hi) | current source |
//! | 2-3 | destination (lo, hi) | current destination |
//! | 4-5 | length (lo, hi) | bytes remaining |
//! | 6   | bit 0: start (1) / abort (0) | bit 0: busy |
//!
//! While busy the channel holds BUSREQ. Each CPU T-state with BUSACK
//! granted moves one byte.

use serde::{Deserialize, Serialize};
use tracing::debug;

use emu_core::{Observable, Value};

use crate::io::ChipSelect;
use crate::memory::Memory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DmaConfig {
    pub enabled: bool,
    pub select: ChipSelect,
}

impl Default for DmaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            select: ChipSelect {
                mask: 0xFF00,
                value: 0xF900,
            },
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Dma {
    source: u16,
    destination: u16,
    remaining: u16,
    active: bool,
}

impl Dma {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, port: u16, value: u8) {
        match port & 7 {
            0 => self.source = (self.source & 0xFF00) | u16::from(value),
            1 => self.source = (self.source & 0x00FF) | (u16::from(value) << 8),
            2 => self.destination = (self.destination & 0xFF00) | u16::from(value),
            3 => self.destination = (self.destination & 0x00FF) | (u16::from(value) << 8),
            4 => self.remaining = (self.remaining & 0xFF00) | u16::from(value),
            5 => self.remaining = (self.remaining & 0x00FF) | (u16::from(value) << 8),
            6 => {
                self.active = value & 1 != 0 && self.remaining != 0;
                if self.active {
                    debug!(
                        source = self.source,
                        destination = self.destination,
                        length = self.remaining,
                        "DMA started"
                    );
                }
            }
            _ => {}
        }
    }

    #[must_use]
    pub fn read(&self, port: u16) -> u8 {
        let [slo, shi] = self.source.to_le_bytes();
        let [dlo, dhi] = self.destination.to_le_bytes();
        let [llo, lhi] = self.remaining.to_le_bytes();
        match port & 7 {
            0 => slo,
            1 => shi,
            2 => dlo,
            3 => dhi,
            4 => llo,
            5 => lhi,
            6 => u8::from(self.active),
            _ => 0xFF,
        }
    }

    /// BUSREQ output.
    #[must_use]
    pub const fn busreq(&self) -> bool {
        self.active
    }

    /// Move one byte. Only called while the CPU has granted the bus.
    pub fn transfer(&mut self, memory: &mut Memory) {
        if !self.active {
            return;
        }
        let value = memory.read(self.source);
        memory.write(self.destination, value);
        self.source = self.source.wrapping_add(1);
        self.destination = self.destination.wrapping_add(1);
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.active = false;
            debug!(destination = self.destination, "DMA done, bus released");
        }
    }
}

impl Observable for Dma {
    fn query(&self, path: &str) -> Option<Value> {
        match path {
            "active" => Some(self.active.into()),
            "source" => Some(self.source.into()),
            "destination" => Some(self.destination.into()),
            "remaining" => Some(self.remaining.into()),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &["active", "source", "destination", "remaining"]
    }
}
