//! Master clock and clock dividers.

/// Master clock configuration for a system.
///
/// Each system has a master crystal that drives all timing. Components may
/// run at divided rates, but everything derives from this frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MasterClock {
    /// Crystal frequency in Hz (e.g. `16_000_000` for the CPC).
    pub frequency_hz: u64,
}

impl MasterClock {
    #[must_use]
    pub const fn new(frequency_hz: u64) -> Self {
        Self { frequency_hz }
    }

    /// Frequency of a component clocked through `divider`.
    #[must_use]
    pub const fn divided_hz(&self, divider: u64) -> u64 {
        self.frequency_hz / divider
    }
}

/// Derives a slower clock from the master clock.
///
/// `tick()` is called once per master tick and returns true on the master
/// ticks where the divided clock has an edge. The phase is explicit so two
/// components on the same divider stay in lockstep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Divider {
    ratio: u64,
    phase: u64,
}

impl Divider {
    /// Create a divider. A ratio of 0 is treated as 1.
    #[must_use]
    pub const fn new(ratio: u64) -> Self {
        Self {
            ratio: if ratio == 0 { 1 } else { ratio },
            phase: 0,
        }
    }

    /// Advance one master tick. Returns true when the divided clock fires.
    pub fn tick(&mut self) -> bool {
        self.phase += 1;
        if self.phase >= self.ratio {
            self.phase = 0;
            true
        } else {
            false
        }
    }

    #[must_use]
    pub const fn ratio(&self) -> u64 {
        self.ratio
    }
}
