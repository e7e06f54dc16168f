//! Raster timer: the HSYNC/VSYNC pulses the CRTC would produce.
//!
//! Only the timing survives. A line is 64 µs (256 CPU T-states at 4 MHz)
//! and a frame is 312 lines, with VSYNC at the top of the frame.

use emu_core::Tickable;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterConfig {
    pub tstates_per_line: u32,
    pub lines_per_frame: u32,
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            tstates_per_line: 256,
            lines_per_frame: 312,
        }
    }
}

impl RasterConfig {
    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.tstates_per_line == 0 || self.lines_per_frame == 0 {
            return Err(ConfigError::Raster {
                tstates_per_line: self.tstates_per_line,
                lines_per_frame: self.lines_per_frame,
            });
        }
        Ok(self)
    }

    #[must_use]
    pub const fn tstates_per_frame(&self) -> u64 {
        self.tstates_per_line as u64 * self.lines_per_frame as u64
    }
}

/// Counts CPU T-states into lines and frames.
#[derive(Debug, Clone)]
pub struct Raster {
    config: RasterConfig,
    line: u32,
    tstate: u32,
    hsync: bool,
    vsync: bool,
    frame_complete: bool,
}

impl Raster {
    #[must_use]
    pub fn new(config: RasterConfig) -> Self {
        Self {
            config,
            line: 0,
            tstate: 0,
            hsync: false,
            vsync: false,
            frame_complete: false,
        }
    }

    /// HSYNC began on the last tick.
    #[must_use]
    pub const fn hsync(&self) -> bool {
        self.hsync
    }

    /// VSYNC began on the last tick.
    #[must_use]
    pub const fn vsync(&self) -> bool {
        self.vsync
    }

    /// True once per frame, cleared by reading.
    pub fn take_frame_complete(&mut self) -> bool {
        std::mem::take(&mut self.frame_complete)
    }

    #[must_use]
    pub const fn line(&self) -> u32 {
        self.line
    }

    #[must_use]
    pub const fn tstate(&self) -> u32 {
        self.tstate
    }

    #[must_use]
    pub const fn config(&self) -> RasterConfig {
        self.config
    }
}

impl Tickable for Raster {
    /// One CPU T-state.
    fn tick(&mut self) {
        self.hsync = false;
        self.vsync = false;
        self.tstate += 1;
        if self.tstate < self.config.tstates_per_line {
            return;
        }
        self.tstate = 0;
        self.hsync = true;
        self.line += 1;
        if self.line >= self.config.lines_per_frame {
            self.line = 0;
            self.vsync = true;
            self.frame_complete = true;
        }
    }
}
