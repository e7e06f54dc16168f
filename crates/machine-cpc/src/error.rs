//! Startup and run errors.
//!
//! Everything that can go wrong while building a machine is caught once,
//! before the first tick. The tick path itself has no error type.

use std::path::PathBuf;

use thiserror::Error;

/// A configuration that cannot produce a working machine.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} ROM must be 16384 bytes, got {len}")]
    RomSize { name: String, len: usize },

    #[error("memory map is empty")]
    EmptyMap,

    #[error("memory map entry ${start:04X}-${end:04X} ends before it starts")]
    EmptyRange { start: u16, end: u16 },

    #[error("memory map entries overlap at ${at:04X}")]
    Overlap { at: u16 },

    #[error("memory map leaves ${at:04X} unmapped")]
    Gap { at: u16 },

    #[error("memory map entry at ${start:04X} reaches past the end of RAM page {page}")]
    RamOutOfRange { start: u16, page: u8 },

    #[error("memory map entry at ${start:04X} is larger than a 16K ROM")]
    RomOutOfRange { start: u16 },

    #[error("chip select for {name} is malformed (mask ${mask:04X}, value ${value:04X})")]
    ChipSelect { name: String, mask: u16, value: u16 },

    #[error("raster timing must be non-zero (got {tstates_per_line} T-states x {lines_per_frame} lines)")]
    Raster { tstates_per_line: u32, lines_per_frame: u32 },

    #[error("invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A run that did not finish the way the caller asked.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("no HALT within {budget} T-states (PC=${pc:04X})")]
    TickBudgetExhausted { budget: u64, pc: u16 },
}
