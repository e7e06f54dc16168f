//! Amstrad CPC-style system around the Z80 core.
//!
//! The machine owns the memory map and the bus-visible chips, decodes every
//! CPU cycle to the device responsible for it, and merges the peripherals'
//! INT, WAIT and BUSREQ outputs onto the CPU's pins once per T-state. Video
//! and sound generation are not modelled; their timing signals are.
//!
//! ```
//! use machine_cpc::{Cpc, CpcConfig, RomSet};
//!
//! let mut cpc = Cpc::new(&CpcConfig::default(), RomSet::default()).expect("valid config");
//! cpc.load(0, &[0x3E, 0x2A, 0x76]); // LD A,42; HALT
//! let summary = cpc.run_until_halt(1_000).expect("halts");
//! assert_eq!(cpc.cpu().a(), 42);
//! assert_eq!(summary.tstates, 11);
//! ```

mod bus;
mod config;
mod cpc;
mod dma;
mod error;
mod gate_array;
mod io;
mod memory;
mod peripheral;
mod raster;

pub use bus::CpcBus;
pub use config::{CpcConfig, CpcModel, RomSet};
pub use cpc::{Cpc, MASTER_CLOCK_HZ, RunSummary};
pub use dma::{Dma, DmaConfig};
pub use error::{ConfigError, RunError};
pub use gate_array::{GateArray, Remap};
pub use io::ChipSelect;
pub use memory::{MapEntry, Memory, MemoryMap, PAGE_SIZE, ROM_SIZE, Target};
pub use peripheral::{Peripheral, Slot};
pub use raster::{Raster, RasterConfig};
