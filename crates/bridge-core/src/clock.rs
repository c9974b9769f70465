//! Local clock configuration.

use crate::Ticks;

/// Local clock configuration for a bridge instance.
///
/// The bridge samples its pins once per local clock tick. The serial
/// clock must be slow enough that each half period spans several local
/// ticks, or the two-stage synchronizers will swallow edges.
#[derive(Debug, Clone, Copy)]
pub struct MasterClock {
    /// Local clock frequency in Hz (e.g. `48_000_000`).
    pub frequency_hz: u64,
}

impl MasterClock {
    #[must_use]
    pub const fn new(frequency_hz: u64) -> Self {
        Self { frequency_hz }
    }

    /// Local ticks per half period of a serial clock at the given bit
    /// rate (integer division, minimum 1). Degenerate rates, zero
    /// included, clamp to the minimum instead of panicking.
    #[must_use]
    pub const fn ticks_per_half_bit(&self, bit_rate_hz: u64) -> Ticks {
        let half_periods = bit_rate_hz.saturating_mul(2);
        if half_periods == 0 {
            return Ticks::new(1);
        }
        let ticks = self.frequency_hz / half_periods;
        if ticks == 0 { Ticks::new(1) } else { Ticks::new(ticks) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_bit_period_divides_local_clock() {
        let clock = MasterClock::new(48_000_000);
        assert_eq!(clock.ticks_per_half_bit(1_000_000), Ticks::new(24));
    }

    #[test]
    fn half_bit_period_never_zero() {
        let clock = MasterClock::new(1_000_000);
        assert_eq!(clock.ticks_per_half_bit(4_000_000), Ticks::new(1));
    }

    #[test]
    fn zero_bit_rate_clamps_instead_of_panicking() {
        let clock = MasterClock::new(48_000_000);
        assert_eq!(clock.ticks_per_half_bit(0), Ticks::new(1));
    }
}
