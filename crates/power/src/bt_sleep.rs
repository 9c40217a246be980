//! Deep-sleep timing negotiation with the Bluetooth controller.
//!
//! The controller runs on its own scheduler on the same die and keeps its
//! clocks through CPU deep sleep. It periodically declares "I intend to be
//! idle for N ms starting now"; the host may only drop into S3 while enough
//! of that window remains, or it risks being unresponsive when the radio
//! next needs attention.
//!
//! Window arithmetic runs over the shared 28-bit free-running RC counter —
//! the only clock both sides can see across S2/S3 clock-domain changes.

use crate::time::RcStamp;

/// Minimum remaining controller-sleep window worth an S3 entry.
pub const BT_MIN_SLEEP_MARGIN_MS: u32 = 10;

/// Tracks the controller's declared sleep window and the host-side wake
/// veto.
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BtSleepCoordinator {
    sleep_pending: bool,
    sleep_duration_ms: u32,
    sleep_declared_at: RcStamp,
    host_wake_pending: bool,
}

impl BtSleepCoordinator {
    /// No window declared, no veto pending.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Controller driver callback: the radio declares (or withdraws) an
    /// idle window of `duration_ms` starting at `now`.
    pub fn notify_controller_sleep(&mut self, pending: bool, duration_ms: u32, now: RcStamp) {
        self.sleep_pending = pending;
        self.sleep_duration_ms = duration_ms;
        self.sleep_declared_at = now;
    }

    /// Host stack callback: veto the next sleep decision (a host-initiated
    /// BT transaction is about to start).
    pub fn notify_host_wake_pending(&mut self) {
        self.host_wake_pending = true;
    }

    /// Consume the one-shot veto. True at most once per notification.
    pub fn take_host_wake_pending(&mut self) -> bool {
        let pending = self.host_wake_pending;
        self.host_wake_pending = false;
        pending
    }

    /// True while a declared controller window has at least
    /// [`BT_MIN_SLEEP_MARGIN_MS`] remaining at `now`.
    #[must_use]
    pub fn should_enter_deep_sleep(&self, now: RcStamp) -> bool {
        if !self.sleep_pending {
            return false;
        }
        let elapsed = now.elapsed_since(self.sleep_declared_at);
        self.sleep_duration_ms > elapsed.saturating_add(BT_MIN_SLEEP_MARGIN_MS)
    }
}

#[cfg(test)]
mod tests {
    use crate::time::RC_COUNTER_MASK;

    use super::*;

    #[test]
    fn no_window_declared_means_no_deep_sleep() {
        let coord = BtSleepCoordinator::new();
        assert!(!coord.should_enter_deep_sleep(RcStamp::new(0)));
    }

    #[test]
    fn window_with_margin_allows_entry() {
        let mut coord = BtSleepCoordinator::new();
        coord.notify_controller_sleep(true, 100, RcStamp::new(1_000));
        assert!(coord.should_enter_deep_sleep(RcStamp::new(1_050)));
        // 11 ms left: margin just satisfied is not enough, need strictly more.
        assert!(!coord.should_enter_deep_sleep(RcStamp::new(1_090)));
        assert!(coord.should_enter_deep_sleep(RcStamp::new(1_089)));
    }

    #[test]
    fn withdrawn_window_blocks_entry() {
        let mut coord = BtSleepCoordinator::new();
        coord.notify_controller_sleep(true, 500, RcStamp::new(0));
        coord.notify_controller_sleep(false, 0, RcStamp::new(10));
        assert!(!coord.should_enter_deep_sleep(RcStamp::new(20)));
    }

    #[test]
    fn expired_window_blocks_entry() {
        let mut coord = BtSleepCoordinator::new();
        coord.notify_controller_sleep(true, 50, RcStamp::new(2_000));
        assert!(!coord.should_enter_deep_sleep(RcStamp::new(2_060)));
    }

    #[test]
    fn window_straddling_counter_wrap() {
        let mut coord = BtSleepCoordinator::new();
        // Declared 5 ms before the 28-bit counter wraps; 100 ms window.
        coord.notify_controller_sleep(true, 100, RcStamp::new(RC_COUNTER_MASK - 4));
        // 25 ms into the window (20 ms past the wrap): 75 ms remain.
        assert!(coord.should_enter_deep_sleep(RcStamp::new(20)));
        // 95 ms in: below the 10 ms margin.
        assert!(!coord.should_enter_deep_sleep(RcStamp::new(90)));
    }

    #[test]
    fn host_wake_veto_is_one_shot() {
        let mut coord = BtSleepCoordinator::new();
        assert!(!coord.take_host_wake_pending());
        coord.notify_host_wake_pending();
        assert!(coord.take_host_wake_pending());
        assert!(!coord.take_host_wake_pending());
    }
}
