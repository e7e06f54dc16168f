//! CPC bus: memory and I/O routing.
//!
//! Memory cycles go through the range table. I/O cycles are decoded by
//! chip select: the gate array and ROM select latch are write-only, the DMA
//! channel and slot peripherals answer reads. A port that selects several
//! devices writes to all of them and reads from the first that answers.
//!
//! # Wait stretch
//!
//! With stretching on, every bus cycle is padded with wait states so it
//! ends on a multiple of 4 T-states, the way the CPC gate array holds WAIT
//! to share the bus with video fetches. The system tells the bus which
//! T-state is executing before each CPU tick.

use emu_core::{Bus, ReadResult};

use crate::dma::Dma;
use crate::gate_array::{GateArray, Remap};
use crate::io::ChipSelect;
use crate::memory::{Memory, MemoryMap};
use crate::peripheral::Slot;

pub struct CpcBus {
    pub memory: Memory,
    pub gate_array: GateArray,
    /// DMA channel and its select, if fitted.
    pub dma: Option<(ChipSelect, Dma)>,
    pub slots: Vec<Slot>,
    wait_stretch: bool,
    /// CPU T-state being executed.
    now: u64,
    /// CPU M1 output during this tick.
    m1: bool,
}

impl CpcBus {
    #[must_use]
    pub fn new(
        memory: Memory,
        gate_array: GateArray,
        dma: Option<(ChipSelect, Dma)>,
        wait_stretch: bool,
    ) -> Self {
        Self {
            memory,
            gate_array,
            dma,
            slots: Vec::new(),
            wait_stretch,
            now: 0,
            m1: false,
        }
    }

    /// Record where the CPU is before it ticks.
    pub(crate) fn set_cycle(&mut self, now: u64, m1: bool) {
        self.now = now;
        self.m1 = m1;
    }

    /// Wait states that bring a cycle ending `remaining` ticks from now onto
    /// the 4 T-state grid.
    fn stretch(&self, remaining: u64) -> u8 {
        if !self.wait_stretch {
            return 0;
        }
        let end = self.now + remaining;
        ((4 - end % 4) % 4) as u8
    }

    /// Rebuild the standard layout from the gate array's registers. A ROM
    /// that is enabled but not fitted leaves the RAM underneath visible.
    fn remap(&mut self) {
        let ga = &self.gate_array;
        let map = MemoryMap::standard(
            ga.ram_config(),
            ga.lower_rom_enabled() && self.memory.has_lower_rom(),
            ga.upper_rom_enabled() && self.memory.has_upper_roms(),
        );
        self.memory.set_map(map);
    }

    /// INT as the slots and gate array drive it.
    pub(crate) fn int_line(&self) -> bool {
        self.gate_array.int_pending() || self.slots.iter().any(|s| s.device.int())
    }

    pub(crate) fn busreq_line(&self) -> bool {
        self.dma.as_ref().is_some_and(|(_, dma)| dma.busreq())
            || self.slots.iter().any(|s| s.device.busreq())
    }

    pub(crate) fn wait_line(&self) -> bool {
        self.slots.iter().any(|s| s.device.wait())
    }

    pub(crate) fn tick_peripherals(&mut self) {
        for slot in &mut self.slots {
            slot.device.tick();
        }
    }

    /// One T-state with the CPU off the bus: the DMA channel goes first,
    /// then the first slot asking for the bus.
    pub(crate) fn bus_granted(&mut self) {
        if let Some((_, dma)) = &mut self.dma
            && dma.busreq()
        {
            dma.transfer(&mut self.memory);
            return;
        }
        if let Some(slot) = self.slots.iter_mut().find(|s| s.device.busreq()) {
            slot.device.bus_cycle(&mut self.memory);
        }
    }
}

impl Bus for CpcBus {
    fn read(&mut self, address: u32) -> ReadResult {
        let data = self.memory.read(address as u16);
        // Opcode fetches transfer one T-state earlier in their cycle.
        let wait = self.stretch(if self.m1 { 2 } else { 1 });
        ReadResult::with_wait(data, wait)
    }

    fn write(&mut self, address: u32, value: u8) -> u8 {
        self.memory.write(address as u16, value);
        self.stretch(1)
    }

    fn io_read(&mut self, address: u32) -> ReadResult {
        let port = address as u16;
        let wait = self.stretch(1);
        if let Some((select, dma)) = &self.dma
            && select.matches(port)
        {
            return ReadResult::with_wait(dma.read(port), wait);
        }
        let data = self
            .slots
            .iter_mut()
            .find(|s| s.select.matches(port))
            .map_or(0xFF, |s| s.device.io_read(port));
        ReadResult::with_wait(data, wait)
    }

    fn io_write(&mut self, address: u32, value: u8) -> u8 {
        let port = address as u16;
        if ChipSelect::GATE_ARRAY.matches(port) && self.gate_array.write(value) == Remap::Rebuild {
            self.remap();
        }
        if ChipSelect::ROM_SELECT.matches(port) {
            self.memory.select_upper_rom(value);
        }
        if let Some((select, dma)) = &mut self.dma
            && select.matches(port)
        {
            dma.write(port, value);
        }
        for slot in self.slots.iter_mut().filter(|s| s.select.matches(port)) {
            slot.device.io_write(port, value);
        }
        self.stretch(1)
    }

    fn interrupt_ack(&mut self) -> u8 {
        self.gate_array.acknowledge();
        for slot in &mut self.slots {
            slot.device.acknowledge();
        }
        0xFF
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::ROM_SIZE;
    use crate::peripheral::Peripheral;
    use std::collections::BTreeMap;

    fn make_bus(banked: bool) -> CpcBus {
        let pages = if banked { 8 } else { 4 };
        let uppers = BTreeMap::from([(0, vec![0xB0; ROM_SIZE]), (7, vec![0xA7; ROM_SIZE])]);
        let memory = Memory::new(
            pages,
            Some(vec![0x05; ROM_SIZE]),
            uppers,
            MemoryMap::standard(0, true, true),
        );
        let dma = (
            ChipSelect {
                mask: 0xFF00,
                value: 0xF900,
            },
            Dma::new(),
        );
        CpcBus::new(memory, GateArray::new(banked), Some(dma), false)
    }

    #[test]
    fn gate_array_disables_roms() {
        let mut bus = make_bus(false);
        bus.write(0x0000, 0x11);
        assert_eq!(bus.read(0x0000).data, 0x05);
        bus.io_write(0x7F00, 0x8C);
        assert_eq!(bus.read(0x0000).data, 0x11);
        assert_eq!(bus.read(0xC000).data, 0x00);
    }

    #[test]
    fn rom_select_switches_upper_rom() {
        let mut bus = make_bus(false);
        bus.io_write(0xDF00, 7);
        assert_eq!(bus.read(0xC000).data, 0xA7);
        bus.io_write(0xDF00, 0x42);
        assert_eq!(bus.read(0xC000).data, 0xB0);
    }

    #[test]
    fn ram_banking() {
        let mut bus = make_bus(true);
        bus.io_write(0x7F00, 0x8C);
        bus.write(0x4000, 0x11);
        // Configuration 4 puts page 4 at 0x4000.
        bus.io_write(0x7F00, 0xC4);
        assert_eq!(bus.read(0x4000).data, 0x00);
        bus.write(0x4000, 0x44);
        bus.io_write(0x7F00, 0xC0);
        assert_eq!(bus.read(0x4000).data, 0x11);
        assert_eq!(bus.memory.ram()[4 * 0x4000], 0x44);
    }

    #[test]
    fn unclaimed_port_floats_high() {
        let mut bus = make_bus(false);
        assert_eq!(bus.io_read(0xFB00).data, 0xFF);
        // Gate array and ROM select are write-only.
        assert_eq!(bus.io_read(0x7F00).data, 0xFF);
        assert_eq!(bus.io_read(0xF906).data, 0x00);
    }

    #[test]
    fn acknowledge_reaches_the_gate_array() {
        let mut bus = make_bus(false);
        for _ in 0..52 {
            bus.gate_array.hsync();
        }
        assert!(bus.int_line());
        assert_eq!(bus.interrupt_ack(), 0xFF);
        assert!(!bus.int_line());
    }

    struct Latch {
        value: u8,
    }

    impl Peripheral for Latch {
        fn name(&self) -> &str {
            "latch"
        }

        fn io_read(&mut self, _port: u16) -> u8 {
            self.value
        }

        fn io_write(&mut self, _port: u16, value: u8) {
            self.value = value;
        }
    }

    #[test]
    fn writes_reach_every_selected_slot_reads_come_from_the_first() {
        let mut bus = make_bus(false);
        for value in [1, 2] {
            bus.slots.push(Slot::new(
                ChipSelect {
                    mask: 0x0800,
                    value: 0x0000,
                },
                Box::new(Latch { value }),
            ));
        }
        assert_eq!(bus.io_read(0xF400).data, 1);
        bus.io_write(0xF400, 9);
        assert_eq!(bus.io_read(0xF400).data, 9);
        assert_eq!(bus.slots[1].device.io_read(0xF400), 9);
    }

    #[test]
    fn stretch_aligns_to_four() {
        let mut bus = make_bus(false);
        bus.wait_stretch = true;
        // Fetch transfer on T2 of a cycle starting at 0: already aligned.
        bus.set_cycle(2, true);
        assert_eq!(bus.read(0).wait, 0);
        // Memory read starting at 4, transfer on its T2 (tick 6).
        bus.set_cycle(6, false);
        assert_eq!(bus.read(0).wait, 1);
        // Fetch starting at 6 after a 2 T-state internal cycle.
        bus.set_cycle(8, true);
        assert_eq!(bus.read(0).wait, 2);
        // I/O transfer on T3 of a cycle starting at 8.
        bus.set_cycle(11, false);
        assert_eq!(bus.io_write(0xFB00, 0), 0);
    }
}
