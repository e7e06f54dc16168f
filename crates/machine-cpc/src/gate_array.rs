//! Gate array: the bus-visible half.
//!
//! Pixel output is not modelled. What remains is the register file (pen,
//! palette, screen mode, ROM enables, RAM configuration) and the scanline
//! counter that produces the 300 Hz interrupt.
//!
//! # Interrupt counter
//!
//! The counter advances on every HSYNC. At 52 it wraps to 0 and raises INT.
//! Two HSYNCs after the start of VSYNC it is cleared, and INT is raised at
//! that point if it had reached 32, so the interrupt stays in step with the
//! frame. Acknowledging the interrupt clears bit 5 of the counter.

use tracing::debug;

use emu_core::{Observable, Value};

const INT_LINES: u8 = 52;
const VSYNC_DELAY: u8 = 2;

/// What a register write did to the memory layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remap {
    None,
    /// ROM enables or RAM configuration changed: rebuild the map.
    Rebuild,
}

#[derive(Debug, Clone)]
pub struct GateArray {
    pen: u8,
    /// 16 inks plus the border.
    palette: [u8; 17],
    mode: u8,
    lower_rom: bool,
    upper_rom: bool,
    ram_config: u8,
    /// RAM configuration writes only take effect with 128K fitted.
    banked_ram: bool,
    counter: u8,
    /// HSYNCs still to see before the VSYNC reset, if one is pending.
    vsync_countdown: Option<u8>,
    int_pending: bool,
}

impl GateArray {
    #[must_use]
    pub fn new(banked_ram: bool) -> Self {
        Self {
            pen: 0,
            palette: [0; 17],
            mode: 1,
            lower_rom: true,
            upper_rom: true,
            ram_config: 0,
            banked_ram,
            counter: 0,
            vsync_countdown: None,
            int_pending: false,
        }
    }

    /// Register write. Bits 7-6 pick the function.
    pub fn write(&mut self, value: u8) -> Remap {
        match value >> 6 {
            0 => {
                self.pen = if value & 0x10 != 0 { 16 } else { value & 0x0F };
                Remap::None
            }
            1 => {
                self.palette[usize::from(self.pen)] = value & 0x1F;
                Remap::None
            }
            2 => {
                self.mode = value & 0x03;
                let lower = value & 0x04 == 0;
                let upper = value & 0x08 == 0;
                if value & 0x10 != 0 {
                    self.counter = 0;
                    self.int_pending = false;
                }
                let changed = lower != self.lower_rom || upper != self.upper_rom;
                self.lower_rom = lower;
                self.upper_rom = upper;
                if changed {
                    debug!(lower, upper, "ROM enables");
                    Remap::Rebuild
                } else {
                    Remap::None
                }
            }
            _ => {
                if !self.banked_ram {
                    debug!(value, "RAM configuration ignored without 128K");
                    return Remap::None;
                }
                let config = value & 0x07;
                if config == self.ram_config {
                    return Remap::None;
                }
                debug!(config, "RAM configuration");
                self.ram_config = config;
                Remap::Rebuild
            }
        }
    }

    /// One HSYNC from the raster timer.
    pub fn hsync(&mut self) {
        self.counter += 1;
        if let Some(remaining) = self.vsync_countdown {
            if remaining <= 1 {
                self.vsync_countdown = None;
                if self.counter >= 32 {
                    self.raise();
                }
                self.counter = 0;
                return;
            }
            self.vsync_countdown = Some(remaining - 1);
        }
        if self.counter >= INT_LINES {
            self.counter = 0;
            self.raise();
        }
    }

    /// Start of VSYNC.
    pub fn vsync(&mut self) {
        self.vsync_countdown = Some(VSYNC_DELAY);
    }

    fn raise(&mut self) {
        if !self.int_pending {
            debug!("gate array interrupt");
        }
        self.int_pending = true;
    }

    /// Interrupt acknowledge cycle seen on the bus.
    pub fn acknowledge(&mut self) {
        if self.int_pending {
            debug!(counter = self.counter, "gate array interrupt acknowledged");
        }
        self.int_pending = false;
        self.counter &= !0x20;
    }

    #[must_use]
    pub const fn int_pending(&self) -> bool {
        self.int_pending
    }

    #[must_use]
    pub const fn lower_rom_enabled(&self) -> bool {
        self.lower_rom
    }

    #[must_use]
    pub const fn upper_rom_enabled(&self) -> bool {
        self.upper_rom
    }

    #[must_use]
    pub const fn ram_config(&self) -> u8 {
        self.ram_config
    }

    #[must_use]
    pub const fn mode(&self) -> u8 {
        self.mode
    }

    #[must_use]
    pub const fn counter(&self) -> u8 {
        self.counter
    }

    #[must_use]
    pub const fn pen(&self) -> u8 {
        self.pen
    }

    #[must_use]
    pub fn ink(&self, pen: u8) -> Option<u8> {
        self.palette.get(usize::from(pen)).copied()
    }
}

impl Observable for GateArray {
    fn query(&self, path: &str) -> Option<Value> {
        match path {
            "pen" => Some(self.pen.into()),
            "mode" => Some(self.mode.into()),
            "lower_rom" => Some(self.lower_rom.into()),
            "upper_rom" => Some(self.upper_rom.into()),
            "ram_config" => Some(self.ram_config.into()),
            "counter" => Some(self.counter.into()),
            "int" => Some(self.int_pending.into()),
            "border" => Some(self.palette[16].into()),
            _ => path
                .strip_prefix("ink.")
                .and_then(|n| n.parse::<u8>().ok())
                .and_then(|n| self.ink(n))
                .map(Value::U8),
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "pen",
            "mode",
            "lower_rom",
            "upper_rom",
            "ram_config",
            "counter",
            "int",
            "border",
            "ink.<pen>",
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interrupt_every_52_lines() {
        let mut ga = GateArray::new(false);
        for _ in 0..51 {
            ga.hsync();
        }
        assert!(!ga.int_pending());
        ga.hsync();
        assert!(ga.int_pending());
        assert_eq!(ga.counter(), 0);
    }

    #[test]
    fn acknowledge_clears_bit_5() {
        let mut ga = GateArray::new(false);
        for _ in 0..52 + 40 {
            ga.hsync();
        }
        assert_eq!(ga.counter(), 40);
        ga.acknowledge();
        assert!(!ga.int_pending());
        assert_eq!(ga.counter(), 8);
    }

    #[test]
    fn vsync_resyncs_the_counter() {
        let mut ga = GateArray::new(false);
        for _ in 0..40 {
            ga.hsync();
        }
        ga.vsync();
        ga.hsync();
        assert!(!ga.int_pending());
        ga.hsync();
        // Counter had passed 32: interrupt now, counter restarted.
        assert!(ga.int_pending());
        assert_eq!(ga.counter(), 0);

        let mut ga = GateArray::new(false);
        for _ in 0..10 {
            ga.hsync();
        }
        ga.vsync();
        ga.hsync();
        ga.hsync();
        assert!(!ga.int_pending());
        assert_eq!(ga.counter(), 0);
    }

    #[test]
    fn mode_register_controls_roms_and_counter() {
        let mut ga = GateArray::new(false);
        for _ in 0..20 {
            ga.hsync();
        }
        // Mode 2, both ROMs off, reset the counter.
        assert_eq!(ga.write(0b1001_1110), Remap::Rebuild);
        assert_eq!(ga.mode(), 2);
        assert!(!ga.lower_rom_enabled());
        assert!(!ga.upper_rom_enabled());
        assert_eq!(ga.counter(), 0);
        // Same enables again: nothing to rebuild.
        assert_eq!(ga.write(0b1000_1100), Remap::None);
    }

    #[test]
    fn pen_and_ink() {
        let mut ga = GateArray::new(false);
        ga.write(0x03);
        ga.write(0x40 | 0x14);
        assert_eq!(ga.ink(3), Some(0x14));
        ga.write(0x10);
        ga.write(0x40 | 0x0B);
        assert_eq!(ga.query("border"), Some(Value::U8(0x0B)));
        assert_eq!(ga.query("ink.3"), Some(Value::U8(0x14)));
        assert_eq!(ga.query("ink.99"), None);
    }

    #[test]
    fn ram_config_needs_banked_ram() {
        let mut plain = GateArray::new(false);
        assert_eq!(plain.write(0xC2), Remap::None);
        assert_eq!(plain.ram_config(), 0);

        let mut banked = GateArray::new(true);
        assert_eq!(banked.write(0xC2), Remap::Rebuild);
        assert_eq!(banked.ram_config(), 2);
        assert_eq!(banked.write(0xC2), Remap::None);
    }
}
