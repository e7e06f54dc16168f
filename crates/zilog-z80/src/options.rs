//! Construction options.

/// Silicon variant. Only the behaviours software is known to detect differ.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum Variant {
    /// Original NMOS part: `OUT (C),0` drives 0x00, and an interrupt accepted
    /// straight after `LD A,I` / `LD A,R` clears P/V.
    #[default]
    Nmos,
    /// CMOS part: `OUT (C),0` drives 0xFF, no P/V glitch.
    Cmos,
}

/// Options fixed at construction and preserved across `reset()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct Z80Options {
    pub variant: Variant,
    /// Power-on value of BC, DE, HL, IX, IY and the alternate bank.
    pub register_fill: u16,
}

impl Default for Z80Options {
    fn default() -> Self {
        Self {
            variant: Variant::Nmos,
            register_fill: 0xFFFF,
        }
    }
}
