//! CPC memory: RAM pages, ROM images and the range table that maps the
//! 64K CPU address space onto them.
//!
//! The map is a sorted, gap-free list of ranges. Each range names a read
//! target and a write target separately, because enabled ROMs only shadow
//! reads: writes always land in the RAM underneath.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

pub const PAGE_SIZE: usize = 0x4000;
pub const ROM_SIZE: usize = 0x4000;

/// Where a mapped address reads from or writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Target {
    /// RAM, starting at the beginning of 16K `page`.
    Ram { page: u8 },
    /// The OS ROM.
    LowerRom,
    /// Whichever expansion ROM the ROM select latch names.
    UpperRom,
    /// Reads float high; writes vanish.
    Unmapped,
}

/// One inclusive address range of the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapEntry {
    pub start: u16,
    pub end: u16,
    pub read: Target,
    pub write: Target,
}

impl MapEntry {
    #[must_use]
    pub const fn new(start: u16, end: u16, read: Target, write: Target) -> Self {
        Self {
            start,
            end,
            read,
            write,
        }
    }

    const fn contains(&self, address: u16) -> bool {
        self.start <= address && address <= self.end
    }
}

/// Sorted range table covering 0x0000-0xFFFF exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryMap {
    entries: Vec<MapEntry>,
}

/// RAM page visible in each 16K quarter for the 6128 RAM configurations.
const RAM_CONFIGS: [[u8; 4]; 8] = [
    [0, 1, 2, 3],
    [0, 1, 2, 7],
    [4, 5, 6, 7],
    [0, 3, 2, 7],
    [0, 4, 2, 3],
    [0, 5, 2, 3],
    [0, 6, 2, 3],
    [0, 7, 2, 3],
];

impl MemoryMap {
    /// Sort and validate `entries`. `ram_pages` bounds RAM targets.
    pub fn new(mut entries: Vec<MapEntry>, ram_pages: u8) -> Result<Self, ConfigError> {
        if entries.is_empty() {
            return Err(ConfigError::EmptyMap);
        }
        entries.sort_by_key(|e| e.start);

        let mut next: u32 = 0;
        for entry in &entries {
            if entry.end < entry.start {
                return Err(ConfigError::EmptyRange {
                    start: entry.start,
                    end: entry.end,
                });
            }
            let start = u32::from(entry.start);
            if start < next {
                return Err(ConfigError::Overlap { at: entry.start });
            }
            if start > next {
                return Err(ConfigError::Gap { at: next as u16 });
            }
            next = u32::from(entry.end) + 1;
            Self::check_target(entry, entry.read, ram_pages)?;
            Self::check_target(entry, entry.write, ram_pages)?;
        }
        if next <= 0xFFFF {
            return Err(ConfigError::Gap { at: next as u16 });
        }
        Ok(Self { entries })
    }

    fn check_target(entry: &MapEntry, target: Target, ram_pages: u8) -> Result<(), ConfigError> {
        let len = usize::from(entry.end - entry.start) + 1;
        match target {
            Target::Ram { page } => {
                let ram_size = usize::from(ram_pages) * PAGE_SIZE;
                if usize::from(page) * PAGE_SIZE + len > ram_size {
                    return Err(ConfigError::RamOutOfRange {
                        start: entry.start,
                        page,
                    });
                }
            }
            Target::LowerRom | Target::UpperRom if len > ROM_SIZE => {
                return Err(ConfigError::RomOutOfRange { start: entry.start });
            }
            _ => {}
        }
        Ok(())
    }

    /// The layout the gate array produces for a RAM configuration and ROM
    /// enables. Always valid, so no checking.
    #[must_use]
    pub fn standard(ram_config: u8, lower_rom: bool, upper_rom: bool) -> Self {
        let pages = RAM_CONFIGS[usize::from(ram_config & 7)];
        let entries = pages
            .iter()
            .enumerate()
            .map(|(quarter, &page)| {
                let start = (quarter * PAGE_SIZE) as u16;
                let ram = Target::Ram { page };
                let read = match quarter {
                    0 if lower_rom => Target::LowerRom,
                    3 if upper_rom => Target::UpperRom,
                    _ => ram,
                };
                MapEntry::new(start, start + (PAGE_SIZE - 1) as u16, read, ram)
            })
            .collect();
        Self { entries }
    }

    /// The entry covering `address`, found by binary search.
    #[must_use]
    pub fn resolve(&self, address: u16) -> &MapEntry {
        let index = self.entries.partition_point(|e| e.end < address);
        debug_assert!(self.entries[index].contains(address));
        &self.entries[index]
    }

    #[must_use]
    pub fn entries(&self) -> &[MapEntry] {
        &self.entries
    }
}

/// Physical storage plus the live map.
pub struct Memory {
    ram: Vec<u8>,
    lower_rom: Option<Vec<u8>>,
    upper_roms: BTreeMap<u8, Vec<u8>>,
    /// Upper ROM select latch as last written.
    selected: u8,
    map: MemoryMap,
}

impl Memory {
    /// `ram_pages` of zeroed RAM with the given ROMs. ROM sizes are
    /// checked by the caller.
    #[must_use]
    pub fn new(
        ram_pages: u8,
        lower_rom: Option<Vec<u8>>,
        upper_roms: BTreeMap<u8, Vec<u8>>,
        map: MemoryMap,
    ) -> Self {
        Self {
            ram: vec![0; usize::from(ram_pages) * PAGE_SIZE],
            lower_rom,
            upper_roms,
            selected: 0,
            map,
        }
    }

    #[must_use]
    pub fn map(&self) -> &MemoryMap {
        &self.map
    }

    pub fn set_map(&mut self, map: MemoryMap) {
        debug!(entries = map.entries().len(), "memory map reprogrammed");
        self.map = map;
    }

    /// Latch an upper ROM number. Numbers with no ROM fall back to ROM 0.
    pub fn select_upper_rom(&mut self, number: u8) {
        if self.selected != number {
            debug!(
                rom = number,
                present = self.upper_roms.contains_key(&number),
                "upper ROM select"
            );
        }
        self.selected = number;
    }

    #[must_use]
    pub fn has_lower_rom(&self) -> bool {
        self.lower_rom.is_some()
    }

    #[must_use]
    pub fn has_upper_roms(&self) -> bool {
        !self.upper_roms.is_empty()
    }

    #[must_use]
    pub fn selected_upper_rom(&self) -> u8 {
        self.selected
    }

    fn upper_rom(&self) -> Option<&[u8]> {
        self.upper_roms
            .get(&self.selected)
            .or_else(|| self.upper_roms.get(&0))
            .map(Vec::as_slice)
    }

    /// Read through the map.
    #[must_use]
    pub fn read(&self, address: u16) -> u8 {
        let entry = self.map.resolve(address);
        let offset = usize::from(address - entry.start);
        match entry.read {
            Target::Ram { page } => self.ram[usize::from(page) * PAGE_SIZE + offset],
            Target::LowerRom => rom_byte(self.lower_rom.as_deref(), offset),
            Target::UpperRom => rom_byte(self.upper_rom(), offset),
            Target::Unmapped => 0xFF,
        }
    }

    /// Write through the map. ROM and unmapped targets drop the write.
    pub fn write(&mut self, address: u16, value: u8) {
        let entry = *self.map.resolve(address);
        if let Target::Ram { page } = entry.write {
            let offset = usize::from(address - entry.start);
            self.ram[usize::from(page) * PAGE_SIZE + offset] = value;
        }
    }

    /// Direct RAM access, bypassing the map.
    #[must_use]
    pub fn ram(&self) -> &[u8] {
        &self.ram
    }
}

fn rom_byte(rom: Option<&[u8]>, offset: usize) -> u8 {
    rom.and_then(|r| r.get(offset)).copied().unwrap_or(0xFF)
}
