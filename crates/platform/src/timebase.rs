//! Time sources used by the power subsystem.
//!
//! Three distinct clocks exist and must not be conflated:
//!
//! ```text
//! uptime_ms()        32-bit kernel tick, stops during S2/S3
//! cycles()           24 MHz cycle counter, bounded-poll timeouts only
//! rc_timestamp_ms()  28-bit free-running 3.2 kHz RC counter; the only one
//!                    that keeps counting across clock-domain changes
//! ```
//!
//! The trait is the injection seam for host tests: the mock advances these
//! counters deterministically instead of burning wall-clock time.

/// Cycle-counter rate of the 24 MHz HOSC reference.
pub const CYCLES_PER_US: u32 = 24;

/// Injected clock + delay provider.
pub trait Timebase {
    /// Kernel uptime in milliseconds (32-bit, wraps).
    fn uptime_ms(&self) -> u32;

    /// Free-running cycle counter at [`CYCLES_PER_US`] per microsecond.
    fn cycles(&self) -> u32;

    /// Free-running RC counter converted to milliseconds, 28 bits wide.
    fn rc_timestamp_ms(&self) -> u32;

    /// Spin for `us` microseconds. Safe to call with interrupts masked.
    fn busy_wait_us(&mut self, us: u32);

    /// Brief cooperative pause with interrupts unmasked, giving the BT
    /// controller firmware (same die, own scheduler) a chance to run.
    fn relax_us(&mut self, us: u32);

    /// Credit `ms` of slept time to the kernel tick count after a deep
    /// sleep, so uptime-based timers do not silently lose the gap.
    fn compensate_ms(&mut self, ms: u32);
}

impl<T: Timebase + ?Sized> Timebase for &mut T {
    fn uptime_ms(&self) -> u32 {
        (**self).uptime_ms()
    }

    fn cycles(&self) -> u32 {
        (**self).cycles()
    }

    fn rc_timestamp_ms(&self) -> u32 {
        (**self).rc_timestamp_ms()
    }

    fn busy_wait_us(&mut self, us: u32) {
        (**self).busy_wait_us(us);
    }

    fn relax_us(&mut self, us: u32) {
        (**self).relax_us(us);
    }

    fn compensate_ms(&mut self, ms: u32) {
        (**self).compensate_ms(ms);
    }
}

/// Elapsed cycles between two counter reads, wrap-safe.
#[must_use]
pub fn cycles_since(now: u32, start: u32) -> u32 {
    now.wrapping_sub(start)
}

/// Bounded-poll helper: true once `timeout_ms` has elapsed since `start`.
#[must_use]
pub fn poll_expired(tb: &impl Timebase, start_cycles: u32, timeout_ms: u32) -> bool {
    let budget = timeout_ms
        .saturating_mul(1000)
        .saturating_mul(CYCLES_PER_US);
    cycles_since(tb.cycles(), start_cycles) > budget
}
