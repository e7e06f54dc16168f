//! I/O chip-select decoding.
//!
//! The CPC decodes ports partially: each device looks at a few address lines
//! and ignores the rest, so one port number can select several devices at
//! once. Writes reach every selected device; reads are answered by the first.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A device is selected when `port & mask == value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChipSelect {
    pub mask: u16,
    pub value: u16,
}

impl ChipSelect {
    /// Gate array: A15 low, A14 high.
    pub const GATE_ARRAY: Self = Self {
        mask: 0xC000,
        value: 0x4000,
    };

    /// Upper ROM select: A13 low.
    pub const ROM_SELECT: Self = Self {
        mask: 0x2000,
        value: 0x0000,
    };

    /// Validate a select for the device called `name`.
    pub fn new(name: &str, mask: u16, value: u16) -> Result<Self, ConfigError> {
        if value & !mask != 0 {
            return Err(ConfigError::ChipSelect {
                name: name.to_string(),
                mask,
                value,
            });
        }
        Ok(Self { mask, value })
    }

    #[must_use]
    pub const fn matches(self, port: u16) -> bool {
        port & self.mask == self.value
    }

    /// True if some port selects both `self` and `other`.
    #[must_use]
    pub const fn overlaps(self, other: Self) -> bool {
        let common = self.mask & other.mask;
        self.value & common == other.value & common
    }

    /// Check a select loaded from configuration. A zero mask would claim
    /// every port and is rejected along with bits outside the mask.
    pub fn validate(self, name: &str) -> Result<Self, ConfigError> {
        if self.mask == 0 {
            return Err(ConfigError::ChipSelect {
                name: name.to_string(),
                mask: self.mask,
                value: self.value,
            });
        }
        Self::new(name, self.mask, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_selects() {
        assert!(ChipSelect::GATE_ARRAY.matches(0x7F00));
        assert!(!ChipSelect::GATE_ARRAY.matches(0xBC00));
        assert!(ChipSelect::ROM_SELECT.matches(0xDF00));
        assert!(!ChipSelect::ROM_SELECT.matches(0xFF00));
        // 0x5F00 selects both: A15=0, A14=1, A13=0.
        assert!(ChipSelect::GATE_ARRAY.matches(0x5F00));
        assert!(ChipSelect::ROM_SELECT.matches(0x5F00));
    }

    #[test]
    fn value_outside_mask_is_rejected() {
        assert!(matches!(
            ChipSelect::new("probe", 0xFF00, 0x00F9),
            Err(ConfigError::ChipSelect { .. })
        ));
    }

    #[test]
    fn partial_decode_overlaps() {
        let ppi = ChipSelect {
            mask: 0x0800,
            value: 0x0000,
        };
        assert!(ppi.overlaps(ChipSelect::GATE_ARRAY));
        let dma = ChipSelect {
            mask: 0xFF00,
            value: 0xF900,
        };
        assert!(!dma.overlaps(ChipSelect::GATE_ARRAY));
        assert!(!dma.overlaps(ChipSelect::ROM_SELECT));
    }

    #[test]
    fn zero_mask_is_rejected() {
        let all = ChipSelect { mask: 0, value: 0 };
        assert!(all.validate("probe").is_err());
        let ppi = ChipSelect {
            mask: 0x0800,
            value: 0x0000,
        };
        assert_eq!(ppi.validate("ppi").ok(), Some(ppi));
    }
}
