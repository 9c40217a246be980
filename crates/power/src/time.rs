//! Wrap-safe timestamp newtypes.
//!
//! Two counters with different widths flow through the standby logic, and
//! both wrap well within a device's time-on-battery:
//!
//! - the 32-bit kernel millisecond tick (wraps after ~49 days),
//! - the 28-bit free-running RC counter (wraps after ~3 days, and it is the
//!   only clock that keeps counting through S2/S3).
//!
//! Naive `a - b` comparisons against either counter go wrong at the wrap
//! boundary. The subtraction is defined once, here, and reused everywhere a
//! "time since" is needed.

/// Sentinel for "never" / "disabled" timeouts.
pub const FOREVER_MS: u32 = u32::MAX;

/// Width of the free-running RC counter.
pub const RC_COUNTER_BITS: u32 = 28;
/// Modulus mask of the RC counter.
pub const RC_COUNTER_MASK: u32 = (1 << RC_COUNTER_BITS) - 1;

/// A point on the 32-bit kernel millisecond tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Uptime(pub u32);

impl Uptime {
    /// Milliseconds from `earlier` to `self`, modulo 2³².
    ///
    /// Correct as long as the real gap is under ~49 days, which the standby
    /// thresholds guarantee.
    #[must_use]
    pub fn elapsed_since(self, earlier: Uptime) -> u32 {
        self.0.wrapping_sub(earlier.0)
    }
}

/// A point on the 28-bit free-running RC counter, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RcStamp(u32);

impl RcStamp {
    /// Wrap a raw counter read into the 28-bit domain.
    #[must_use]
    pub fn new(raw_ms: u32) -> Self {
        Self(raw_ms & RC_COUNTER_MASK)
    }

    /// Raw 28-bit value.
    #[must_use]
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Milliseconds from `earlier` to `self`, modulo 2²⁸.
    #[must_use]
    pub fn elapsed_since(self, earlier: RcStamp) -> u32 {
        self.0.wrapping_sub(earlier.0) & RC_COUNTER_MASK
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uptime_elapsed_across_u32_wrap() {
        let before = Uptime(u32::MAX - 99);
        let after = Uptime(400);
        assert_eq!(after.elapsed_since(before), 500);
    }

    #[test]
    fn rc_elapsed_plain() {
        let a = RcStamp::new(1_000);
        let b = RcStamp::new(11_000);
        assert_eq!(b.elapsed_since(a), 10_000);
    }

    #[test]
    fn rc_elapsed_across_28bit_wrap() {
        let before = RcStamp::new(RC_COUNTER_MASK - 4);
        let after = RcStamp::new(5);
        assert_eq!(after.elapsed_since(before), 10);
    }

    #[test]
    fn rc_new_discards_high_bits() {
        assert_eq!(RcStamp::new(0xF000_0001).raw(), 0x0000_0001);
    }
}
