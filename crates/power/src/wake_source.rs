//! Wakeup-source arbitration.
//!
//! The PMU exposes wake sources through two registers with *different* bit
//! layouts: `PMU_WKEN_CTL` (which sources may wake the chip) and
//! `PMU_WAKE_PD` (which sources have fired, write-1-to-clear). All bit math
//! lives here, at the hardware boundary; the rest of the subsystem deals in
//! [`WakeSourceSet`] values only.

use platform::bus::RegisterBus;
use platform::regs::{
    ONOFF_KEY_TIME_MASK, ONOFF_KEY_TIME_SHIFT, PMU_ONOFF_KEY, PMU_WAKE_PD, PMU_WKEN_CTL,
    WAKE_PD_ALARM, WAKE_PD_BAT, WAKE_PD_BT, WAKE_PD_FIELD_MASK, WAKE_PD_ONOFF_LONG,
    WAKE_PD_ONOFF_SHORT, WAKE_PD_REMOTE, WAKE_PD_RESET, WAKE_PD_SIRQ0, WAKE_PD_SIRQ1,
    WAKE_PD_WIO0, WAKE_PD_WRITABLE_MASK, WIO_CTL_WKTRIG_MASK, WIO_CTL_WKTRIG_SHIFT, WIO_WKTRIG_HIGH,
    WIO_WKTRIG_LOW, WKEN_ALARM, WKEN_ALL_MASK, WKEN_BAT, WKEN_BT, WKEN_ONOFF_LONG,
    WKEN_ONOFF_SHORT, WKEN_REMOTE0, WKEN_RESET, WKEN_SIRQ0, WKEN_SIRQ1, WKEN_WIO0,
};
use platform::supply::Dc5vWio;
use platform::timebase::{poll_expired, Timebase};

/// One wakeup source, hardware-layout-free.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum WakeSource {
    /// Short press of the on/off key.
    OnOffShort = 0,
    /// Long press of the on/off key.
    OnOffLong = 1,
    /// Reset pin.
    Reset = 2,
    /// Battery insertion.
    Battery = 3,
    /// IR remote control.
    RemoteControl = 4,
    /// Special IRQ line 0.
    Sirq0 = 5,
    /// Special IRQ line 1.
    Sirq1 = 6,
    /// Bluetooth controller requesting host attention.
    BluetoothWake = 7,
    /// Watchdog-initiated restart.
    Watchdog = 8,
    /// RTC alarm.
    Alarm = 9,
    /// 5 V charge cable plug-in (board-specific WIO pad).
    Dc5vPlug = 10,
}

impl WakeSource {
    const fn mask(self) -> u16 {
        1u16.wrapping_shl(self as u32)
    }
}

/// Typed set over [`WakeSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WakeSourceSet(u16);

impl WakeSourceSet {
    /// The empty set.
    pub const EMPTY: WakeSourceSet = WakeSourceSet(0);

    /// Sources that must always abort a sleep attempt: everything except
    /// the DC5V plug event (which is mode-dependent).
    pub const ESSENTIAL: WakeSourceSet = WakeSourceSet(
        WakeSource::OnOffShort.mask()
            | WakeSource::OnOffLong.mask()
            | WakeSource::Reset.mask()
            | WakeSource::Battery.mask()
            | WakeSource::RemoteControl.mask()
            | WakeSource::Sirq0.mask()
            | WakeSource::Sirq1.mask()
            | WakeSource::BluetoothWake.mask()
            | WakeSource::Watchdog.mask()
            | WakeSource::Alarm.mask(),
    );

    /// True if no source is in the set.
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True if `source` is in the set.
    #[must_use]
    pub fn contains(self, source: WakeSource) -> bool {
        self.0 & source.mask() != 0
    }

    /// Insert `source`.
    #[must_use]
    pub fn with(self, source: WakeSource) -> Self {
        Self(self.0 | source.mask())
    }

    /// Remove `source`.
    #[must_use]
    pub fn without(self, source: WakeSource) -> Self {
        Self(self.0 & !source.mask())
    }

    /// Set intersection.
    #[must_use]
    pub fn intersect(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    /// Raw bits for diagnostics/logging.
    #[must_use]
    pub fn bits(self) -> u16 {
        self.0
    }

    /// Encode into the `PMU_WKEN_CTL` layout. `Watchdog` has no enable bit
    /// (it is inferred from the boot reason) and encodes to nothing.
    #[must_use]
    pub fn to_wken(self, dc5v: Dc5vWio) -> u32 {
        let mut raw = 0;
        if self.contains(WakeSource::OnOffLong) {
            raw |= WKEN_ONOFF_LONG;
        }
        if self.contains(WakeSource::OnOffShort) {
            raw |= WKEN_ONOFF_SHORT;
        }
        if self.contains(WakeSource::Reset) {
            raw |= WKEN_RESET;
        }
        if self.contains(WakeSource::Battery) {
            raw |= WKEN_BAT;
        }
        if self.contains(WakeSource::Alarm) {
            raw |= WKEN_ALARM;
        }
        if self.contains(WakeSource::RemoteControl) {
            raw |= WKEN_REMOTE0;
        }
        if self.contains(WakeSource::BluetoothWake) {
            raw |= WKEN_BT;
        }
        if self.contains(WakeSource::Sirq0) {
            raw |= WKEN_SIRQ0;
        }
        if self.contains(WakeSource::Sirq1) {
            raw |= WKEN_SIRQ1;
        }
        if self.contains(WakeSource::Dc5vPlug) {
            raw |= WKEN_WIO0.wrapping_shl(u32::from(dc5v.wio));
        }
        raw & WKEN_ALL_MASK
    }

    /// Decode from the `PMU_WAKE_PD` layout. Only the configured DC5V pad
    /// maps to `Dc5vPlug`; other WIO pendings are not part of the domain.
    #[must_use]
    pub fn from_wake_pd(raw: u32, dc5v: Dc5vWio) -> Self {
        let mut set = Self::EMPTY;
        if raw & WAKE_PD_ONOFF_SHORT != 0 {
            set = set.with(WakeSource::OnOffShort);
        }
        if raw & WAKE_PD_ONOFF_LONG != 0 {
            set = set.with(WakeSource::OnOffLong);
        }
        if raw & WAKE_PD_RESET != 0 {
            set = set.with(WakeSource::Reset);
        }
        if raw & WAKE_PD_BAT != 0 {
            set = set.with(WakeSource::Battery);
        }
        if raw & WAKE_PD_ALARM != 0 {
            set = set.with(WakeSource::Alarm);
        }
        if raw & WAKE_PD_REMOTE != 0 {
            set = set.with(WakeSource::RemoteControl);
        }
        if raw & WAKE_PD_BT != 0 {
            set = set.with(WakeSource::BluetoothWake);
        }
        if raw & WAKE_PD_SIRQ0 != 0 {
            set = set.with(WakeSource::Sirq0);
        }
        if raw & WAKE_PD_SIRQ1 != 0 {
            set = set.with(WakeSource::Sirq1);
        }
        let dc5v_pd = WAKE_PD_WIO0.wrapping_shl(u32::from(dc5v.wio));
        if raw & dc5v_pd != 0 {
            set = set.with(WakeSource::Dc5vPlug);
        }
        set
    }
}

/// Coarse operating mode the wake-source set is computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WakeupMode {
    /// Arming for full power-off (S4): only the always-on sources.
    PowerOff,
    /// Arming for standby (S2/S3BT): adds remote, short press and BT wake.
    Standby,
    /// Power-off triggered *by* a DC5V event: the plug wake is suppressed
    /// to avoid an immediate re-wake loop.
    PowerOffNoDc5v,
}

/// Long-press threshold of the on/off key, in milliseconds. Quantized to
/// the PMU's eight hardware buckets when programmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OnOffPressTime(pub u32);

impl OnOffPressTime {
    /// Nearest `PMU_ONOFF_KEY` time-select value (bits 10:8).
    #[must_use]
    pub fn bucket(self) -> u32 {
        match self.0 {
            0..=186 => 0,
            187..=374 => 1,
            375..=749 => 2,
            750..=1249 => 3,
            1250..=1749 => 4,
            1750..=2499 => 5,
            2500..=3499 => 6,
            _ => 7,
        }
    }
}

/// Bounded-poll budget for the pending-clear confirmation.
const CLEAR_PENDING_TIMEOUT_MS: u32 = 500;

/// Wakeup-source manager: the only writer of `PMU_WKEN_CTL`, the on/off key
/// threshold and the DC5V pad trigger level, and the sole authority on the
/// pending set.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WakeupSources {
    /// Board wiring of the DC5V detect pad.
    pub dc5v: Dc5vWio,
    /// Long-press wake threshold for the on/off key.
    pub onoff_press: OnOffPressTime,
}

impl WakeupSources {
    /// Enable set for `mode`, before hardware encoding.
    #[must_use]
    pub fn enable_set(self, mode: WakeupMode) -> WakeSourceSet {
        let mut set = WakeSourceSet::EMPTY
            .with(WakeSource::Reset)
            .with(WakeSource::Battery)
            .with(WakeSource::OnOffLong)
            .with(WakeSource::Alarm)
            .with(WakeSource::Dc5vPlug);
        match mode {
            WakeupMode::PowerOff => {}
            WakeupMode::PowerOffNoDc5v => {
                set = set.without(WakeSource::Dc5vPlug);
            }
            WakeupMode::Standby => {
                set = set
                    .with(WakeSource::RemoteControl)
                    .with(WakeSource::OnOffShort)
                    .with(WakeSource::BluetoothWake);
            }
        }
        set
    }

    /// Arm the wake sources for `mode`.
    ///
    /// Runs under a critical section: an asynchronous wake edge arriving
    /// mid-reprogramming could otherwise latch against a half-written
    /// enable set. Each PMU write is followed by a 200 µs settle (writes
    /// into the always-on domain synchronize across a slow clock boundary).
    pub fn configure<B, T>(self, bus: &mut B, tb: &mut T, mode: WakeupMode)
    where
        B: RegisterBus,
        T: Timebase,
    {
        critical_section::with(|_| {
            // Ack whatever is already latched.
            let pd = bus.read32(PMU_WAKE_PD);
            bus.write32(PMU_WAKE_PD, pd & WAKE_PD_WRITABLE_MASK);
            tb.busy_wait_us(200);

            let wken = self.enable_set(mode).to_wken(self.dc5v);
            bus.modify32(PMU_WKEN_CTL, WKEN_ALL_MASK, wken);
            tb.busy_wait_us(200);

            // DC5V pad: wake on the configured "plugged" level.
            let trig = if self.dc5v.active_high {
                WIO_WKTRIG_HIGH
            } else {
                WIO_WKTRIG_LOW
            };
            bus.modify32(
                self.dc5v.ctl_addr(),
                WIO_CTL_WKTRIG_MASK,
                trig.wrapping_shl(WIO_CTL_WKTRIG_SHIFT),
            );
            tb.busy_wait_us(200);

            bus.modify32(
                PMU_ONOFF_KEY,
                ONOFF_KEY_TIME_MASK,
                self.onoff_press.bucket().wrapping_shl(ONOFF_KEY_TIME_SHIFT),
            );
            tb.busy_wait_us(200);

            debug!("wake sources armed: {:#x}", wken);
        });
    }

    /// Drain the pending latch.
    ///
    /// Acknowledges every writable pending bit, then polls for the
    /// hardware to confirm the clear. Edge-triggered latches re-assert
    /// until their trigger condition subsides, so the poll is bounded at
    /// 500 ms; on timeout the stale bits are logged and left in place
    /// rather than hanging the device.
    pub fn clear_pending<B, T>(self, bus: &mut B, tb: &mut T)
    where
        B: RegisterBus,
        T: Timebase,
    {
        let pd = bus.read32(PMU_WAKE_PD);
        bus.write32(PMU_WAKE_PD, pd | WAKE_PD_WRITABLE_MASK);
        tb.busy_wait_us(200);

        let start = tb.cycles();
        loop {
            let remaining = bus.read32(PMU_WAKE_PD) & WAKE_PD_FIELD_MASK;
            if remaining == 0 {
                break;
            }
            if poll_expired(tb, start, CLEAR_PENDING_TIMEOUT_MS) {
                warn!("wake pending clear timed out, still latched: {:#x}", remaining);
                break;
            }
            tb.busy_wait_us(10);
        }
    }

    /// Currently latched sources (non-blocking).
    #[must_use]
    pub fn pending<B: RegisterBus>(self, bus: &B) -> WakeSourceSet {
        WakeSourceSet::from_wake_pd(bus.read32(PMU_WAKE_PD), self.dc5v)
    }

    /// True if any source in the always-abort policy set is pending.
    #[must_use]
    pub fn essential_wake<B: RegisterBus>(self, bus: &B) -> bool {
        !self
            .pending(bus)
            .intersect(WakeSourceSet::ESSENTIAL)
            .is_empty()
    }
}

#[cfg(test)]
mod tests {
    use platform::mocks::MockSoc;
    use platform::regs::WAKE_PD_WIO1;

    use super::*;

    fn sources() -> WakeupSources {
        WakeupSources {
            dc5v: Dc5vWio {
                wio: 1,
                active_high: true,
            },
            onoff_press: OnOffPressTime(1_500),
        }
    }

    #[test]
    fn wken_and_wake_pd_layouts_differ_for_onoff() {
        // Enable view: long=bit0, short=bit1. Pending view: short=bit0,
        // long=bit1. The conversion pair must not conflate them.
        let dc5v = sources().dc5v;
        let long_only = WakeSourceSet::EMPTY.with(WakeSource::OnOffLong);
        assert_eq!(long_only.to_wken(dc5v), WKEN_ONOFF_LONG);

        let pd = WakeSourceSet::from_wake_pd(WAKE_PD_ONOFF_LONG, dc5v);
        assert!(pd.contains(WakeSource::OnOffLong));
        assert!(!pd.contains(WakeSource::OnOffShort));
    }

    #[test]
    fn dc5v_maps_to_configured_pad_only() {
        let dc5v = sources().dc5v;
        let set = WakeSourceSet::EMPTY.with(WakeSource::Dc5vPlug);
        assert_eq!(set.to_wken(dc5v), WKEN_WIO0 << 1);

        assert!(WakeSourceSet::from_wake_pd(WAKE_PD_WIO1, dc5v)
            .contains(WakeSource::Dc5vPlug));
        // WIO2 pending is not this board's DC5V pad.
        assert!(WakeSourceSet::from_wake_pd(1 << 7, dc5v).is_empty());
    }

    #[test]
    fn essential_excludes_dc5v() {
        assert!(!WakeSourceSet::ESSENTIAL.contains(WakeSource::Dc5vPlug));
        assert!(WakeSourceSet::ESSENTIAL.contains(WakeSource::Watchdog));
        assert!(WakeSourceSet::ESSENTIAL.contains(WakeSource::BluetoothWake));
    }

    #[test]
    fn standby_mode_adds_remote_short_press_and_bt() {
        let set = sources().enable_set(WakeupMode::Standby);
        assert!(set.contains(WakeSource::RemoteControl));
        assert!(set.contains(WakeSource::OnOffShort));
        assert!(set.contains(WakeSource::BluetoothWake));
        assert!(set.contains(WakeSource::Dc5vPlug));
    }

    #[test]
    fn poweroff_by_dc5v_suppresses_plug_wake() {
        let set = sources().enable_set(WakeupMode::PowerOffNoDc5v);
        assert!(!set.contains(WakeSource::Dc5vPlug));
        assert!(set.contains(WakeSource::OnOffLong));
    }

    #[test]
    fn onoff_press_time_buckets() {
        let cases = [
            (0, 0),
            (186, 0),
            (187, 1),
            (374, 1),
            (375, 2),
            (1_000, 3),
            (1_500, 4),
            (2_000, 5),
            (3_000, 6),
            (3_500, 7),
            (60_000, 7),
        ];
        for (ms, bucket) in cases {
            assert_eq!(OnOffPressTime(ms).bucket(), bucket, "{ms} ms");
        }
    }

    #[test]
    fn configure_programs_wken_trigger_and_press_time() {
        let mut soc = MockSoc::new();
        let mut tb = soc.clone();
        let srcs = sources();

        srcs.configure(&mut soc, &mut tb, WakeupMode::Standby);

        let wken = soc.read32(PMU_WKEN_CTL);
        assert_eq!(wken, srcs.enable_set(WakeupMode::Standby).to_wken(srcs.dc5v));

        let wio = soc.read32(srcs.dc5v.ctl_addr());
        assert_eq!(
            (wio & WIO_CTL_WKTRIG_MASK) >> WIO_CTL_WKTRIG_SHIFT,
            WIO_WKTRIG_HIGH
        );

        let onoff = soc.read32(PMU_ONOFF_KEY);
        assert_eq!((onoff & ONOFF_KEY_TIME_MASK) >> ONOFF_KEY_TIME_SHIFT, 4);
    }

    #[test]
    fn clear_pending_drains_the_latch() {
        let mut soc = MockSoc::new();
        let mut tb = soc.clone();
        soc.latch_wake_after_polls(0, WAKE_PD_ONOFF_SHORT | WAKE_PD_BT);

        sources().clear_pending(&mut soc, &mut tb);
        assert!(sources().pending(&soc).is_empty());
    }

    #[test]
    fn clear_pending_gives_up_on_stuck_latch() {
        let mut soc = MockSoc::new();
        let mut tb = soc.clone();
        soc.set_stuck_pending(WAKE_PD_BAT);

        // Must return despite the latch never clearing.
        sources().clear_pending(&mut soc, &mut tb);
        assert!(sources().pending(&soc).contains(WakeSource::Battery));
    }

    #[test]
    fn essential_wake_ignores_dc5v_pending() {
        let mut soc = MockSoc::new();
        let srcs = sources();

        soc.latch_wake_after_polls(0, WAKE_PD_WIO1);
        assert!(srcs.pending(&soc).contains(WakeSource::Dc5vPlug));
        assert!(!srcs.essential_wake(&soc));

        soc.latch_wake_after_polls(0, WAKE_PD_ONOFF_LONG);
        assert!(srcs.essential_wake(&soc));
    }
}
