//! Machine configuration, loadable from JSON.
//!
//! ```json
//! {
//!   "model": "cpc6128",
//!   "cpu": { "variant": "nmos" },
//!   "lower_rom": "os.rom",
//!   "upper_roms": { "0": "basic.rom", "7": "amsdos.rom" },
//!   "wait_stretch": true
//! }
//! ```
//!
//! Every field is optional. The default is a 64K machine with no ROMs, so
//! the whole address space reads and writes RAM.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;
use zilog_z80::Z80Options;

use crate::dma::DmaConfig;
use crate::error::ConfigError;
use crate::memory::{MapEntry, ROM_SIZE};
use crate::raster::RasterConfig;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CpcModel {
    /// 64K RAM.
    #[default]
    Cpc464,
    /// 128K RAM, banked through the gate array.
    Cpc6128,
}

impl CpcModel {
    /// RAM size in 16K pages.
    #[must_use]
    pub const fn ram_pages(self) -> u8 {
        match self {
            Self::Cpc464 => 4,
            Self::Cpc6128 => 8,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CpcConfig {
    pub model: CpcModel,
    pub cpu: Z80Options,
    /// OS ROM image, mapped at 0x0000 while enabled.
    pub lower_rom: Option<PathBuf>,
    /// Expansion ROM images by select number, mapped at 0xC000.
    pub upper_roms: BTreeMap<u8, PathBuf>,
    /// Replaces the power-on map. The gate array still rebuilds the
    /// standard layout when software reprograms it.
    pub memory_map: Option<Vec<MapEntry>>,
    /// Stretch memory and I/O cycles onto the 4 T-state grid.
    pub wait_stretch: bool,
    pub raster: RasterConfig,
    pub dma: DmaConfig,
}

impl CpcConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read and parse a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&text)?;
        info!(path = %path.display(), model = ?config.model, "configuration loaded");
        Ok(config)
    }
}

/// ROM images, already read into memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RomSet {
    pub lower: Option<Vec<u8>>,
    pub upper: BTreeMap<u8, Vec<u8>>,
}

impl RomSet {
    /// Read every ROM named in `config`. Relative paths resolve against
    /// `base`, normally the directory holding the configuration file.
    pub fn load(config: &CpcConfig, base: &Path) -> Result<Self, ConfigError> {
        let read = |path: &Path| {
            let full = base.join(path);
            std::fs::read(&full).map_err(|source| ConfigError::Io { path: full, source })
        };
        let lower = config.lower_rom.as_deref().map(&read).transpose()?;
        let upper = config
            .upper_roms
            .iter()
            .map(|(&number, path)| Ok((number, read(path.as_path())?)))
            .collect::<Result<BTreeMap<_, _>, ConfigError>>()?;
        let roms = Self { lower, upper };
        roms.validate()?;
        Ok(roms)
    }

    /// Every image must be exactly 16K.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(lower) = &self.lower {
            check_rom_size("lower", lower)?;
        }
        for (number, image) in &self.upper {
            check_rom_size(&format!("upper {number}"), image)?;
        }
        Ok(())
    }
}

fn check_rom_size(name: &str, image: &[u8]) -> Result<(), ConfigError> {
    if image.len() == ROM_SIZE {
        Ok(())
    } else {
        Err(ConfigError::RomSize {
            name: name.to_string(),
            len: image.len(),
        })
    }
}
