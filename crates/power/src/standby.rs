//! The power-state orchestrator.
//!
//! A periodic monitor tick drives a polled state machine over
//! NORMAL → S1 → S2 → S3. NORMAL and S1 transitions are cheap and return
//! immediately; the S2 handler is an intentionally blocking busy-wait that
//! only returns once an exit condition fires, dropping into S3 whenever the
//! radio controller's declared sleep window allows it.
//!
//! ```text
//! NORMAL ──idle──▶ S1 ──idle──▶ S2 ◀──window──▶ S3
//!    ▲              │            │
//!    └──wakelock────┴────exit────┘
//! ```

use platform::bus::RegisterBus;
use platform::persisted;
use platform::regs::{ONOFF_KEY_PRESSED, PMU_ONOFF_KEY, WD_CTL, WD_CTL_RESET_NOW};
use platform::supply::PowerSupply;
use platform::timebase::Timebase;
use platform::watchdog::Watchdog;

use crate::bt_sleep::BtSleepCoordinator;
use crate::dvfs::{Dvfs, DvfsLevel};
use crate::pm::{run_poweroff, RebootReason};
use crate::sleep::SleepSequencer;
use crate::time::{RcStamp, Uptime, FOREVER_MS};
use crate::wake_source::{WakeSource, WakeSourceSet, WakeupMode, WakeupSources};
use crate::wakelock::{WakelockHolder, Wakelocks};

/// Floor for the auto-standby threshold.
pub const STANDBY_MIN_TIME_SEC: u32 = 10;

/// Current orchestrator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerState {
    /// Fully active.
    Normal,
    /// Non-essential peripherals quiesced.
    S1,
    /// Light sleep: CPU slowed, audio PLLs off.
    S2,
    /// Deep sleep: CPU power domain off, radio alive.
    S3,
}

/// Idle-time thresholds. `u32::MAX` disables a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SleepBudget {
    /// Idle milliseconds before leaving NORMAL.
    pub auto_standby_ms: u32,
    /// Idle milliseconds before requesting full power-off.
    pub auto_powerdown_ms: u32,
}

impl SleepBudget {
    /// Budget from configured values in seconds. Zero disables a timer;
    /// a too-small standby time is clamped to [`STANDBY_MIN_TIME_SEC`].
    #[must_use]
    pub fn from_secs(auto_standby_sec: u32, auto_powerdown_sec: u32) -> Self {
        let auto_standby_ms = match auto_standby_sec {
            0 => FOREVER_MS,
            s if s < STANDBY_MIN_TIME_SEC => {
                warn!("auto standby time too small, clamped");
                STANDBY_MIN_TIME_SEC.saturating_mul(1_000)
            }
            s => s.saturating_mul(1_000),
        };
        let auto_powerdown_ms = match auto_powerdown_sec {
            0 => FOREVER_MS,
            s => s.saturating_mul(1_000),
        };
        Self {
            auto_standby_ms,
            auto_powerdown_ms,
        }
    }
}

/// TWS (true wireless stereo) role of this earbud/speaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TwsRole {
    /// Not in a TWS pair.
    None,
    /// Link master.
    Master,
    /// Link slave: must never auto-power-down on its own.
    Slave,
}

/// Bluetooth stack facts the orchestrator consults.
pub trait BtManager {
    /// Connected remote devices.
    fn connected_count(&self) -> u8;

    /// Current TWS role.
    fn tws_role(&self) -> TwsRole;

    /// False while the TWS link is still settling; standby entry would
    /// drop it.
    fn tws_link_stable(&self) -> bool;
}

/// System-side callbacks: peripheral quiesce set and the power-off request
/// channel.
pub trait SystemHooks {
    /// S1 entry: stop key scanning, battery ADC, the speaker PA, USB phy
    /// and segment LED.
    fn suspend_peripherals(&mut self);

    /// S1 exit: undo [`Self::suspend_peripherals`].
    fn resume_peripherals(&mut self);

    /// Ask the application layer to shut the system down.
    fn request_poweroff(&mut self);
}

/// What a single S2 loop iteration decided.
enum S2Verdict {
    Stay,
    Exit,
}

/// The orchestrator. One instance per system, created at init, never torn
/// down.
pub struct Standby<'a> {
    state: PowerState,
    budget: SleepBudget,
    wakelocks: &'a Wakelocks,
    sources: WakeupSources,
    sequencer: SleepSequencer,
    bt_sleep: BtSleepCoordinator,
    saved_dvfs: DvfsLevel,
    wakeup_timestamp: Option<Uptime>,
}

impl<'a> Standby<'a> {
    /// Orchestrator in NORMAL with no wake recorded yet.
    #[must_use]
    pub fn new(budget: SleepBudget, sources: WakeupSources, wakelocks: &'a Wakelocks) -> Self {
        info!("standby time: {} ms", budget.auto_standby_ms);
        Self {
            state: PowerState::Normal,
            budget,
            wakelocks,
            sources,
            sequencer: SleepSequencer::new(sources),
            bt_sleep: BtSleepCoordinator::new(),
            saved_dvfs: DvfsLevel::Normal,
            wakeup_timestamp: None,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> PowerState {
        self.state
    }

    /// Radio controller driver callback: declare or withdraw a controller
    /// idle window.
    pub fn notify_controller_sleep(&mut self, pending: bool, duration_ms: u32, now: RcStamp) {
        critical_section::with(|_| {
            self.bt_sleep
                .notify_controller_sleep(pending, duration_ms, now);
        });
    }

    /// Host stack callback: veto the next standby decision for one cycle.
    pub fn notify_host_wake_pending(&mut self) {
        critical_section::with(|_| {
            self.bt_sleep.notify_host_wake_pending();
        });
    }

    /// Milliseconds since the last S1 exit, or `u32::MAX` if the device
    /// has not slept yet.
    #[must_use]
    pub fn wakeup_time(&self, now: Uptime) -> u32 {
        self.wakeup_timestamp
            .map_or(FOREVER_MS, |ts| now.elapsed_since(ts))
    }

    /// Cumulative deep-sleep milliseconds.
    #[must_use]
    pub fn deep_sleep_time_ms(&self) -> u32 {
        self.sequencer.deep_sleep_time_ms()
    }

    /// Cumulative light-sleep milliseconds.
    #[must_use]
    pub fn light_sleep_time_ms(&self) -> u32 {
        self.sequencer.light_sleep_time_ms()
    }

    /// One monitor tick. Cheap in NORMAL/S1; blocks in S2 until an exit
    /// condition fires.
    #[allow(clippy::too_many_arguments)]
    pub fn tick<B, T, W, P, D, M, H>(
        &mut self,
        bus: &mut B,
        tb: &mut T,
        wd: &mut W,
        supply: &P,
        dvfs: &mut D,
        bt: &M,
        hooks: &mut H,
    ) -> PowerState
    where
        B: RegisterBus,
        T: Timebase,
        W: Watchdog,
        P: PowerSupply,
        D: Dvfs,
        M: BtManager,
        H: SystemHooks,
    {
        if self.check_auto_powerdown(tb, bt, hooks) {
            return self.state;
        }

        match self.state {
            PowerState::Normal => self.process_normal(tb, supply, bt, hooks),
            PowerState::S1 => self.process_s1(bus, tb, dvfs, hooks),
            PowerState::S2 => self.process_s2(bus, tb, wd, supply, dvfs, bt, hooks),
            // The machine never rests in S3: it is entered and left inside
            // the S2 busy-wait.
            PowerState::S3 => {}
        }

        self.state
    }

    /// Auto-powerdown applies only with no remote connected and not as a
    /// TWS slave (the master decides for the pair).
    fn check_auto_powerdown<T, M, H>(&self, tb: &T, bt: &M, hooks: &mut H) -> bool
    where
        T: Timebase,
        M: BtManager,
        H: SystemHooks,
    {
        if bt.connected_count() != 0 || bt.tws_role() == TwsRole::Slave {
            return false;
        }
        let free = self.wakelocks.free_time(Uptime(tb.uptime_ms()));
        if free >= self.budget.auto_powerdown_ms {
            info!("idle {} ms, requesting powerdown", free);
            hooks.request_poweroff();
            return true;
        }
        false
    }

    fn process_normal<T, P, M, H>(&mut self, tb: &T, supply: &P, bt: &M, hooks: &mut H)
    where
        T: Timebase,
        P: PowerSupply,
        M: BtManager,
        H: SystemHooks,
    {
        let held = self.wakelocks.held();
        if !held.is_empty() {
            debug!("wakelocks held: {:#x}", held.0);
            return;
        }

        if supply.dc5v_present() {
            debug!("DC5V present, staying in NORMAL");
            return;
        }

        if self.bt_sleep.take_host_wake_pending() {
            return;
        }

        if !bt.tws_link_stable() {
            debug!("TWS link not stable, staying in NORMAL");
            return;
        }

        if self.wakelocks.free_time(Uptime(tb.uptime_ms())) > self.budget.auto_standby_ms {
            self.enter_s1(hooks);
        }
    }

    fn process_s1<B, T, D, H>(&mut self, bus: &mut B, tb: &mut T, dvfs: &mut D, hooks: &mut H)
    where
        B: RegisterBus,
        T: Timebase,
        D: Dvfs,
        H: SystemHooks,
    {
        if !self.wakelocks.held().is_empty() {
            self.exit_s1(tb, hooks);
            return;
        }

        if self.wakelocks.free_time(Uptime(tb.uptime_ms())) > self.budget.auto_standby_ms {
            self.enter_s2(bus, tb, dvfs);
        } else {
            self.exit_s1(tb, hooks);
        }
    }

    fn enter_s1<H: SystemHooks>(&mut self, hooks: &mut H) {
        self.state = PowerState::S1;
        hooks.suspend_peripherals();
        info!("enter S1");
    }

    fn exit_s1<T: Timebase, H: SystemHooks>(&mut self, tb: &T, hooks: &mut H) {
        self.state = PowerState::Normal;
        self.wakeup_timestamp = Some(Uptime(tb.uptime_ms()));
        hooks.resume_peripherals();
        info!("exit S1");
    }

    fn enter_s2<B, T, D>(&mut self, bus: &mut B, tb: &mut T, dvfs: &mut D)
    where
        B: RegisterBus,
        T: Timebase,
        D: Dvfs,
    {
        self.state = PowerState::S2;

        self.saved_dvfs = dvfs.current_level();
        dvfs.unset_level(self.saved_dvfs, "S2");
        dvfs.set_level(DvfsLevel::S2, "S2");

        self.sources.configure(bus, tb, WakeupMode::Standby);
        self.sources.clear_pending(bus, tb);

        self.sequencer.enter_light_sleep(bus, tb);
        info!("enter S2");
    }

    fn exit_s2<B, T, D>(&mut self, bus: &mut B, tb: &mut T, dvfs: &mut D)
    where
        B: RegisterBus,
        T: Timebase,
        D: Dvfs,
    {
        self.state = PowerState::S1;

        self.sequencer.exit_light_sleep(bus, tb);

        dvfs.unset_level(DvfsLevel::S2, "S2");
        dvfs.set_level(self.saved_dvfs, "S2");
        info!("exit S2");
    }

    /// The blocking S2 handler: busy-wait until an exit condition, taking
    /// S3 naps whenever the radio's sleep window allows. Interrupts run
    /// only across the 300 µs relax between iterations.
    #[allow(clippy::too_many_arguments)]
    fn process_s2<B, T, W, P, D, M, H>(
        &mut self,
        bus: &mut B,
        tb: &mut T,
        wd: &mut W,
        supply: &P,
        dvfs: &mut D,
        bt: &M,
        hooks: &mut H,
    ) where
        B: RegisterBus,
        T: Timebase,
        W: Watchdog,
        P: PowerSupply,
        D: Dvfs,
        M: BtManager,
        H: SystemHooks,
    {
        loop {
            wd.feed();

            match self.s2_iteration(bus, tb, wd, supply, bt, hooks) {
                S2Verdict::Exit => break,
                S2Verdict::Stay => {}
            }

            let now = RcStamp::new(tb.rc_timestamp_ms());
            if self.bt_sleep.should_enter_deep_sleep(now) {
                self.state = PowerState::S3;
                info!("enter S3BT");
                let woke = self.sequencer.enter_deep_sleep(bus, tb, wd);
                info!("woke from S3BT, pending {:#x}", woke.bits());
                self.state = PowerState::S2;
            }

            // Same die, separate scheduler: the radio firmware needs CPU
            // time between iterations.
            tb.relax_us(300);
        }

        self.exit_s2(bus, tb, dvfs);

        // Keep the registry non-idle across the S1 unwind so a fresh tick
        // cannot immediately re-enter standby mid-resume.
        self.wakelocks.acquire(WakelockHolder::WakeUp);
        self.exit_s1(tb, hooks);
        self.wakelocks
            .release(WakelockHolder::WakeUp, Uptime(tb.uptime_ms()));
    }

    fn s2_iteration<B, T, W, P, M, H>(
        &mut self,
        bus: &mut B,
        tb: &mut T,
        wd: &mut W,
        supply: &P,
        bt: &M,
        hooks: &mut H,
    ) -> S2Verdict
    where
        B: RegisterBus,
        T: Timebase,
        W: Watchdog,
        P: PowerSupply,
        M: BtManager,
        H: SystemHooks,
    {
        if self.check_auto_powerdown(tb, bt, hooks) {
            return S2Verdict::Exit;
        }

        let abort_set = WakeSourceSet::ESSENTIAL.with(WakeSource::Dc5vPlug);
        let pending = self.sources.pending(bus);
        if !pending.intersect(abort_set).is_empty() {
            self.sources.clear_pending(bus, tb);
            debug!("wakeup from S2, pending {:#x}", pending.bits());
            return S2Verdict::Exit;
        }

        if supply.dc5v_present() {
            debug!("wakeup from S2: DC5V");
            return S2Verdict::Exit;
        }

        if !self.wakelocks.held().is_empty()
            || self.wakelocks.free_time(Uptime(tb.uptime_ms())) < self.budget.auto_standby_ms
        {
            return S2Verdict::Exit;
        }

        if supply.no_power() {
            self.fatal_poweroff(bus, tb, wd);
            return S2Verdict::Exit;
        }

        // Hardware quirk: an on/off key press during the S3BT stage latches
        // no wake pending (it does in S1/S2), so the raw key state has to
        // be polled as well.
        if bus.read32(PMU_ONOFF_KEY) & ONOFF_KEY_PRESSED != 0 {
            while bus.read32(PMU_ONOFF_KEY) & ONOFF_KEY_PRESSED != 0 {
                tb.busy_wait_us(1_000);
            }
            info!("wakeup from on/off key");
            return S2Verdict::Exit;
        }

        S2Verdict::Stay
    }

    /// Battery exhausted: power off immediately, bypassing the rest of the
    /// machine. If a wake pending keeps the chip alive, persist a reboot
    /// reason and fire the watchdog reset.
    fn fatal_poweroff<B, T, W>(&mut self, bus: &mut B, tb: &mut T, wd: &mut W)
    where
        B: RegisterBus,
        T: Timebase,
        W: Watchdog,
    {
        warn!("no power, forcing poweroff");
        let wake_pd = run_poweroff(bus, tb, wd, self.sources, WakeupMode::PowerOff);
        warn!("poweroff blocked by wake pending {:#x}, rebooting", wake_pd);
        persisted::set_reboot_reason(bus, tb, RebootReason::Normal as u16);
        bus.write32(WD_CTL, WD_CTL_RESET_NOW);
    }
}

#[cfg(test)]
mod tests {
    use platform::mocks::{MockSoc, MockSupply};
    use platform::supply::Dc5vWio;

    use crate::mocks::{MockBt, MockDvfs, MockHooks};
    use crate::wake_source::OnOffPressTime;

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
    fn budget_clamps_and_disables() {
        let b = SleepBudget::from_secs(3, 0);
        assert_eq!(b.auto_standby_ms, STANDBY_MIN_TIME_SEC * 1_000);
        assert_eq!(b.auto_powerdown_ms, FOREVER_MS);

        let b = SleepBudget::from_secs(0, 600);
        assert_eq!(b.auto_standby_ms, FOREVER_MS);
        assert_eq!(b.auto_powerdown_ms, 600_000);
    }

    #[test]
    fn dc5v_keeps_normal() {
        let mut soc = MockSoc::new();
        let mut tb = soc.clone();
        let mut wd = soc.clone();
        let supply = MockSupply::new();
        supply.set_dc5v(true);
        let mut dvfs = MockDvfs::new();
        let bt = MockBt::new();
        let mut hooks = MockHooks::new();

        let locks = Wakelocks::new(Uptime(0));
        let mut standby = Standby::new(SleepBudget::from_secs(10, 0), sources(), &locks);

        soc.advance_ms(60_000);
        let state = standby.tick(&mut soc, &mut tb, &mut wd, &supply, &mut dvfs, &bt, &mut hooks);
        assert_eq!(state, PowerState::Normal);
    }

    #[test]
    fn host_wake_veto_lasts_one_tick() {
        let mut soc = MockSoc::new();
        let mut tb = soc.clone();
        let mut wd = soc.clone();
        let supply = MockSupply::new();
        let mut dvfs = MockDvfs::new();
        let bt = MockBt::new();
        let mut hooks = MockHooks::new();

        let locks = Wakelocks::new(Uptime(0));
        let mut standby = Standby::new(SleepBudget::from_secs(10, 0), sources(), &locks);
        standby.notify_host_wake_pending();

        soc.advance_ms(20_000);
        let state = standby.tick(&mut soc, &mut tb, &mut wd, &supply, &mut dvfs, &bt, &mut hooks);
        assert_eq!(state, PowerState::Normal, "vetoed");

        let state = standby.tick(&mut soc, &mut tb, &mut wd, &supply, &mut dvfs, &bt, &mut hooks);
        assert_eq!(state, PowerState::S1, "veto consumed");
    }

    #[test]
    fn unstable_tws_link_keeps_normal() {
        let mut soc = MockSoc::new();
        let mut tb = soc.clone();
        let mut wd = soc.clone();
        let supply = MockSupply::new();
        let mut dvfs = MockDvfs::new();
        let bt = MockBt::new();
        bt.set_tws_link_stable(false);
        let mut hooks = MockHooks::new();

        let locks = Wakelocks::new(Uptime(0));
        let mut standby = Standby::new(SleepBudget::from_secs(10, 0), sources(), &locks);

        soc.advance_ms(20_000);
        let state = standby.tick(&mut soc, &mut tb, &mut wd, &supply, &mut dvfs, &bt, &mut hooks);
        assert_eq!(state, PowerState::Normal);
    }

    #[test]
    fn auto_powerdown_requires_no_connections_and_non_slave() {
        let mut soc = MockSoc::new();
        let mut tb = soc.clone();
        let mut wd = soc.clone();
        let supply = MockSupply::new();
        let mut dvfs = MockDvfs::new();
        let bt = MockBt::new();
        let mut hooks = MockHooks::new();

        let locks = Wakelocks::new(Uptime(0));
        let mut standby = Standby::new(SleepBudget::from_secs(0, 60), sources(), &locks);

        soc.advance_ms(120_000);

        bt.set_connected_count(1);
        let _ = standby.tick(&mut soc, &mut tb, &mut wd, &supply, &mut dvfs, &bt, &mut hooks);
        assert_eq!(hooks.poweroff_requests(), 0);

        bt.set_connected_count(0);
        bt.set_tws_role(TwsRole::Slave);
        let _ = standby.tick(&mut soc, &mut tb, &mut wd, &supply, &mut dvfs, &bt, &mut hooks);
        assert_eq!(hooks.poweroff_requests(), 0);

        bt.set_tws_role(TwsRole::None);
        let _ = standby.tick(&mut soc, &mut tb, &mut wd, &supply, &mut dvfs, &bt, &mut hooks);
        assert_eq!(hooks.poweroff_requests(), 1);
    }

    #[test]
    fn s1_quiesces_and_wakelock_resumes() {
        let mut soc = MockSoc::new();
        let mut tb = soc.clone();
        let mut wd = soc.clone();
        let supply = MockSupply::new();
        let mut dvfs = MockDvfs::new();
        let bt = MockBt::new();
        let mut hooks = MockHooks::new();

        let locks = Wakelocks::new(Uptime(0));
        let mut standby = Standby::new(SleepBudget::from_secs(10, 0), sources(), &locks);

        soc.advance_ms(10_001);
        let state = standby.tick(&mut soc, &mut tb, &mut wd, &supply, &mut dvfs, &bt, &mut hooks);
        assert_eq!(state, PowerState::S1);
        assert_eq!(hooks.suspend_count(), 1);

        locks.acquire(WakelockHolder::Input);
        let state = standby.tick(&mut soc, &mut tb, &mut wd, &supply, &mut dvfs, &bt, &mut hooks);
        assert_eq!(state, PowerState::Normal);
        assert_eq!(hooks.resume_count(), 1);

        // Idle accounting restarted by the release.
        locks.release(WakelockHolder::Input, Uptime(tb.uptime_ms()));
        assert_eq!(locks.free_time(Uptime(tb.uptime_ms())), 0);
    }

    #[test]
    fn wakeup_time_tracks_last_s1_exit() {
        let mut soc = MockSoc::new();
        let mut tb = soc.clone();
        let mut wd = soc.clone();
        let supply = MockSupply::new();
        let mut dvfs = MockDvfs::new();
        let bt = MockBt::new();
        let mut hooks = MockHooks::new();

        let locks = Wakelocks::new(Uptime(0));
        let mut standby = Standby::new(SleepBudget::from_secs(10, 0), sources(), &locks);
        assert_eq!(standby.wakeup_time(Uptime(5_000)), FOREVER_MS);

        soc.advance_ms(10_001);
        let _ = standby.tick(&mut soc, &mut tb, &mut wd, &supply, &mut dvfs, &bt, &mut hooks);
        locks.acquire(WakelockHolder::Input);
        let _ = standby.tick(&mut soc, &mut tb, &mut wd, &supply, &mut dvfs, &bt, &mut hooks);

        let woke_at = tb.uptime_ms();
        soc.advance_ms(2_500);
        assert_eq!(
            standby.wakeup_time(Uptime(woke_at.wrapping_add(2_500))),
            2_500
        );
    }
}
