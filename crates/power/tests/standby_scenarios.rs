//! End-to-end standby scenarios against the mock SoC.

use platform::bus::RegisterBus;
use platform::mocks::{MockSoc, MockSupply};
use platform::regs::{
    PMU_POWER_CTL, POWER_CTL_S3BT_EN, POWER_CTL_WORK_EN, RTC_BAK3, WAKE_PD_BT,
    WAKE_PD_ONOFF_LONG, WD_CTL, WD_CTL_RESET_NOW,
};
use platform::supply::Dc5vWio;
use platform::timebase::Timebase;

use power::dvfs::Dvfs;
use power::mocks::{MockBt, MockDvfs, MockHooks};
use power::standby::{PowerState, SleepBudget, Standby};
use power::time::{RcStamp, Uptime};
use power::wake_source::{OnOffPressTime, WakeupSources};
use power::wakelock::{WakelockHolder, Wakelocks};

struct Rig {
    soc: MockSoc,
    tb: MockSoc,
    wd: MockSoc,
    supply: MockSupply,
    dvfs: MockDvfs,
    bt: MockBt,
    hooks: MockHooks,
}

impl Rig {
    fn new() -> Self {
        let soc = MockSoc::new();
        Self {
            tb: soc.clone(),
            wd: soc.clone(),
            soc,
            supply: MockSupply::new(),
            dvfs: MockDvfs::new(),
            bt: MockBt::new(),
            hooks: MockHooks::new(),
        }
    }

    fn tick(&mut self, standby: &mut Standby<'_>) -> PowerState {
        standby.tick(
            &mut self.soc,
            &mut self.tb,
            &mut self.wd,
            &self.supply,
            &mut self.dvfs,
            &self.bt,
            &mut self.hooks,
        )
    }
}

fn sources() -> WakeupSources {
    WakeupSources {
        dc5v: Dc5vWio {
            wio: 1,
            active_high: true,
        },
        onoff_press: OnOffPressTime(1_500),
    }
}

fn budget() -> SleepBudget {
    SleepBudget::from_secs(10, 0)
}

#[test]
fn idle_past_threshold_enters_s1_and_wakelock_brings_it_back() {
    let mut rig = Rig::new();
    let locks = Wakelocks::new(Uptime(0));
    let mut standby = Standby::new(budget(), sources(), &locks);

    rig.soc.advance_ms(10_001);
    assert_eq!(rig.tick(&mut standby), PowerState::S1);
    assert_eq!(rig.hooks.suspend_count(), 1);

    locks.acquire(WakelockHolder::Media);
    assert_eq!(rig.tick(&mut standby), PowerState::Normal);
    assert_eq!(rig.hooks.resume_count(), 1);

    // Releasing restarts idle accounting from the release instant.
    locks.release(WakelockHolder::Media, Uptime(rig.tb.uptime_ms()));
    assert_eq!(locks.free_time(Uptime(rig.tb.uptime_ms())), 0);
}

#[test]
fn held_wakelock_pins_the_machine_to_normal() {
    let mut rig = Rig::new();
    let locks = Wakelocks::new(Uptime(0));
    let mut standby = Standby::new(budget(), sources(), &locks);

    locks.acquire(WakelockHolder::Ota);
    for _ in 0..50 {
        rig.soc.advance_ms(60_000);
        assert_eq!(rig.tick(&mut standby), PowerState::Normal);
    }
    assert_eq!(rig.hooks.suspend_count(), 0, "never quiesced");
}

#[test]
fn dc5v_mid_s2_exits_within_one_iteration_without_s3() {
    let mut rig = Rig::new();
    let locks = Wakelocks::new(Uptime(0));
    let mut standby = Standby::new(budget(), sources(), &locks);

    // A valid controller sleep window is open the whole time: only the
    // DC5V abort ordering keeps S3 from being attempted.
    standby.notify_controller_sleep(true, 600_000, RcStamp::new(rig.tb.rc_timestamp_ms()));

    // One dc5v poll happens in NORMAL; the cable "arrives" at the first
    // S2 loop iteration.
    rig.supply.plug_dc5v_after_polls(1);

    rig.soc.advance_ms(10_001);
    assert_eq!(rig.tick(&mut standby), PowerState::S1);
    assert_eq!(rig.tick(&mut standby), PowerState::S2);
    assert_eq!(rig.tick(&mut standby), PowerState::Normal);

    // Exit happened on the first iteration, before any relax pause, and
    // the S3 power-domain bit was never touched.
    assert_eq!(rig.soc.relax_count(), 0);
    assert!(!rig
        .soc
        .write_history()
        .iter()
        .any(|&(addr, value)| addr == PMU_POWER_CTL && value == POWER_CTL_S3BT_EN));
}

#[test]
fn s3_wait_terminates_on_latched_bt_wake() {
    let mut rig = Rig::new();
    let locks = Wakelocks::new(Uptime(0));
    let mut standby = Standby::new(budget(), sources(), &locks);

    standby.notify_controller_sleep(true, 600_000, RcStamp::new(rig.tb.rc_timestamp_ms()));

    rig.soc.advance_ms(10_001);
    assert_eq!(rig.tick(&mut standby), PowerState::S1);
    assert_eq!(rig.tick(&mut standby), PowerState::S2);

    // BT wake latches deep inside the S3 busy-wait.
    rig.soc.latch_wake_after_polls(60, WAKE_PD_BT);
    assert_eq!(rig.tick(&mut standby), PowerState::Normal);

    assert!(standby.deep_sleep_time_ms() > 0, "S3 was actually entered");
    assert!(rig
        .soc
        .write_history()
        .contains(&(PMU_POWER_CTL, POWER_CTL_S3BT_EN)));
    // The wake pending that ended the nap was drained on the way out.
    assert_eq!(rig.soc.read32(platform::regs::PMU_WAKE_PD), 0);
    // Watchdog stayed serviced throughout.
    assert!(rig.soc.feed_count() > 0);
}

#[test]
fn no_power_in_s2_runs_the_hardware_poweroff() {
    let mut rig = Rig::new();
    let locks = Wakelocks::new(Uptime(0));
    let mut standby = Standby::new(budget(), sources(), &locks);

    rig.soc.advance_ms(10_001);
    assert_eq!(rig.tick(&mut standby), PowerState::S1);
    assert_eq!(rig.tick(&mut standby), PowerState::S2);

    rig.supply.set_no_power(true);
    // An on/off press keeps the chip alive, forcing the reboot fallback.
    rig.soc.latch_wake_after_polls(6, WAKE_PD_ONOFF_LONG);
    rig.tick(&mut standby);

    assert!(rig.soc.watchdog_disabled());
    let writes = rig.soc.write_history();
    assert!(writes
        .iter()
        .any(|&(addr, value)| addr == PMU_POWER_CTL && value & POWER_CTL_WORK_EN == 0));
    // Reboot reason persisted, watchdog reset fired.
    assert_eq!(rig.soc.read32(RTC_BAK3) >> 16, 0x4252);
    assert!(writes.contains(&(WD_CTL, WD_CTL_RESET_NOW)));
}

#[test]
fn s2_exit_restores_dvfs_tier() {
    let mut rig = Rig::new();
    let locks = Wakelocks::new(Uptime(0));
    let mut standby = Standby::new(budget(), sources(), &locks);

    rig.supply.plug_dc5v_after_polls(1);
    rig.soc.advance_ms(10_001);
    let _ = rig.tick(&mut standby);
    let _ = rig.tick(&mut standby);
    let _ = rig.tick(&mut standby);

    use power::dvfs::DvfsLevel;
    let changes = rig.dvfs.changes();
    // Down to the S2 tier on entry, back to the saved tier on exit.
    assert!(changes.contains(&(DvfsLevel::S2, true)));
    assert!(changes.contains(&(DvfsLevel::S2, false)));
    assert_eq!(changes.last(), Some(&(DvfsLevel::Normal, true)));
    assert_eq!(rig.dvfs.current_level(), DvfsLevel::Normal);
}
