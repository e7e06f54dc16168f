//! Top-level CPC system.
//!
//! The master crystal runs at 16 MHz and the Z80 ticks every 4 crystal
//! ticks (4 MHz). Everything else counts CPU T-states: on each CPU edge the
//! raster timer advances first, its sync pulses feed the gate array, the
//! peripherals tick, and then the control lines are settled before the CPU
//! runs its T-state. Nobody runs ahead of anybody else.
//!
//! # Frame loop
//!
//! `run_frame()` ticks the master clock until the raster timer wraps.
//! One frame = 312 lines x 256 T-states = 79,872 T-states.

use serde::Serialize;
use tracing::{debug, info};

use emu_core::{Divider, MasterClock, Observable, Tickable, Value, parse_address};
use zilog_z80::Z80;

use crate::bus::CpcBus;
use crate::config::{CpcConfig, CpcModel, RomSet};
use crate::dma::Dma;
use crate::error::{ConfigError, RunError};
use crate::gate_array::GateArray;
use crate::io::ChipSelect;
use crate::memory::{Memory, MemoryMap};
use crate::peripheral::{Peripheral, Slot};
use crate::raster::Raster;

/// Crystal frequency.
pub const MASTER_CLOCK_HZ: u64 = 16_000_000;

/// Crystal ticks per CPU T-state.
const CPU_DIVIDER: u64 = 4;

/// How a run to HALT ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// CPU T-states spent in this run.
    pub tstates: u64,
    pub master_ticks: u64,
    /// Frames completed during this run.
    pub frames: u64,
    /// PC after the HALT opcode.
    pub pc: u16,
}

pub struct Cpc {
    cpu: Z80,
    bus: CpcBus,
    raster: Raster,
    clock: MasterClock,
    cpu_clock: Divider,
    master_clock: u64,
    frame_count: u64,
    frame_complete: bool,
}

impl Cpc {
    /// Build a machine. Every configuration problem is reported here; once
    /// this returns the machine cannot fail.
    pub fn new(config: &CpcConfig, roms: RomSet) -> Result<Self, ConfigError> {
        roms.validate()?;
        let raster = config.raster.validate()?;
        let pages = config.model.ram_pages();

        let map = match &config.memory_map {
            Some(entries) => MemoryMap::new(entries.clone(), pages)?,
            None => MemoryMap::standard(0, roms.lower.is_some(), !roms.upper.is_empty()),
        };
        let dma = if config.dma.enabled {
            Some((config.dma.select.validate("dma")?, Dma::new()))
        } else {
            None
        };

        info!(
            model = ?config.model,
            lower_rom = roms.lower.is_some(),
            upper_roms = roms.upper.len(),
            wait_stretch = config.wait_stretch,
            "machine built"
        );
        let memory = Memory::new(pages, roms.lower, roms.upper, map);
        let gate_array = GateArray::new(config.model == CpcModel::Cpc6128);
        let bus = CpcBus::new(memory, gate_array, dma, config.wait_stretch);

        Ok(Self {
            cpu: Z80::with_options(config.cpu),
            bus,
            raster: Raster::new(raster),
            clock: MasterClock::new(MASTER_CLOCK_HZ),
            cpu_clock: Divider::new(CPU_DIVIDER),
            master_clock: 0,
            frame_count: 0,
            frame_complete: false,
        })
    }

    /// Plug a peripheral into the I/O space.
    pub fn attach(
        &mut self,
        select: ChipSelect,
        device: Box<dyn Peripheral>,
    ) -> Result<(), ConfigError> {
        let select = select.validate(device.name())?;
        let shared = [ChipSelect::GATE_ARRAY, ChipSelect::ROM_SELECT]
            .into_iter()
            .chain(self.bus.slots.iter().map(|s| s.select))
            .filter(|other| select.overlaps(*other))
            .count();
        debug!(
            device = device.name(),
            mask = select.mask,
            value = select.value,
            shared,
            "peripheral attached"
        );
        self.bus.slots.push(Slot::new(select, device));
        Ok(())
    }

    /// Copy `data` into RAM at `address`, through the write side of the map.
    pub fn load(&mut self, address: u16, data: &[u8]) {
        let mut addr = address;
        for &byte in data {
            self.bus.memory.write(addr, byte);
            addr = addr.wrapping_add(1);
        }
    }

    /// Read through the map without a bus cycle.
    #[must_use]
    pub fn peek(&self, address: u16) -> u8 {
        self.bus.memory.read(address)
    }

    /// One CPU T-state worth of system activity.
    fn cpu_edge(&mut self) {
        self.raster.tick();
        if self.raster.hsync() {
            self.bus.gate_array.hsync();
        }
        if self.raster.vsync() {
            self.bus.gate_array.vsync();
        }
        if self.raster.take_frame_complete() {
            self.frame_count += 1;
            self.frame_complete = true;
        }

        self.bus.tick_peripherals();
        self.cpu.set_int(self.bus.int_line());
        self.cpu.set_busreq(self.bus.busreq_line());
        self.cpu.set_wait(self.bus.wait_line());

        self.bus.set_cycle(self.cpu.total_ticks().get(), self.cpu.m1());
        self.cpu.tick(&mut self.bus);
        if self.cpu.busack() {
            self.bus.bus_granted();
        }
    }

    /// Run one complete frame. Returns the CPU T-states executed.
    pub fn run_frame(&mut self) -> u64 {
        let start = self.cpu.total_ticks();
        self.frame_complete = false;
        while !self.frame_complete {
            self.tick();
        }
        (self.cpu.total_ticks() - start).get()
    }

    /// Run until the CPU halts, giving up after `budget` CPU T-states.
    pub fn run_until_halt(&mut self, budget: u64) -> Result<RunSummary, RunError> {
        let start_ticks = self.cpu.total_ticks();
        let start_master = self.master_clock;
        let start_frames = self.frame_count;
        while !self.cpu.is_halted() {
            if (self.cpu.total_ticks() - start_ticks).get() >= budget {
                return Err(RunError::TickBudgetExhausted {
                    budget,
                    pc: self.cpu.pc(),
                });
            }
            self.tick();
        }
        let summary = RunSummary {
            tstates: (self.cpu.total_ticks() - start_ticks).get(),
            master_ticks: self.master_clock - start_master,
            frames: self.frame_count - start_frames,
            pc: self.cpu.pc(),
        };
        info!(tstates = summary.tstates, pc = summary.pc, "halted");
        Ok(summary)
    }

    /// Run to the next instruction boundary. Returns the CPU T-states taken.
    pub fn step_instruction(&mut self) -> u64 {
        let start = self.cpu.total_ticks();
        let boundaries = self.cpu.boundaries();
        while self.cpu.boundaries() == boundaries {
            self.tick();
        }
        (self.cpu.total_ticks() - start).get()
    }

    #[must_use]
    pub fn cpu(&self) -> &Z80 {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Z80 {
        &mut self.cpu
    }

    #[must_use]
    pub fn bus(&self) -> &CpcBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut CpcBus {
        &mut self.bus
    }

    #[must_use]
    pub fn raster(&self) -> &Raster {
        &self.raster
    }

    /// Crystal ticks since power-on.
    #[must_use]
    pub fn master_clock(&self) -> u64 {
        self.master_clock
    }

    /// Frames completed since power-on.
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// CPU clock in Hz.
    #[must_use]
    pub fn cpu_hz(&self) -> u64 {
        self.clock.divided_hz(self.cpu_clock.ratio())
    }
}

impl Tickable for Cpc {
    fn tick(&mut self) {
        self.master_clock += 1;
        if self.cpu_clock.tick() {
            self.cpu_edge();
        }
    }
}

impl Observable for Cpc {
    fn query(&self, path: &str) -> Option<Value> {
        if let Some(rest) = path.strip_prefix("cpu.") {
            self.cpu.query(rest)
        } else if let Some(rest) = path.strip_prefix("gate_array.") {
            self.bus.gate_array.query(rest)
        } else if let Some(rest) = path.strip_prefix("dma.") {
            self.bus.dma.as_ref().and_then(|(_, dma)| dma.query(rest))
        } else if let Some(rest) = path.strip_prefix("memory.") {
            parse_address(rest).map(|a| Value::U8(self.bus.memory.read(a)))
        } else {
            match path {
                "raster.line" => Some(self.raster.line().into()),
                "raster.tstate" => Some(self.raster.tstate().into()),
                "rom_select" => Some(self.bus.memory.selected_upper_rom().into()),
                "master_clock" => Some(self.master_clock.into()),
                "frame_count" => Some(self.frame_count.into()),
                _ => None,
            }
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "cpu.<z80_paths>",
            "gate_array.<path>",
            "dma.<path>",
            "memory.<address>",
            "raster.line",
            "raster.tstate",
            "rom_select",
            "master_clock",
            "frame_count",
        ]
    }
}
