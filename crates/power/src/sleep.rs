//! Sleep sequencing: the register-level protocols for S2 (light sleep) and
//! S3 (deep sleep).
//!
//! Both paths follow the same shape: snapshot the registers that will be
//! clobbered, reconfigure clocks (and for S3, voltage rails) downward,
//! sleep, then undo everything in the exact reverse order. The snapshot is
//! a single ordered list of (address, value) records; restoring in reverse
//! guarantees that a register written early in the capture order (clock
//! source selects) is back in place before the registers that depend on it
//! (dividers, peripheral enables).
//!
//! The S3 wait is intentionally unbounded: the wakeup-source pending latch
//! is the sole exit authority, and the loop cannot terminate without a
//! latched source.

use heapless::Vec;
use platform::bus::RegisterBus;
use platform::flash::norflash_power_ctrl;
use platform::regs::{
    AUDIO_PLL0_CTL, AUDIO_PLL1_CTL, BDG_CTL, CMU_COREPLL_CTL, CMU_DEVCLKEN0, CMU_DEVCLKEN1,
    CMU_MEMCLKEN, CMU_SPI0CLK, CMU_SYSCLK, COREPLL_CTL_EN, DCDC_CTL1, DCDC_CTL2,
    DEEP_SLEEP_CLOCK_ALLOWLIST, MEMCLKEN_NONESSENTIAL_MASK, PMUADC_CTL, PMU_POWER_CTL,
    PMU_WAKE_PD, POWER_CTL_S3BT_EN, RMU_MRCR0, RMU_MRCR1, SPD_CTL, SPI0CLK_FIELD_MASK,
    SPI0CLK_SEL_CK48M, SPI0CLK_SEL_HOSC, SPLL_CTL, SYSCLK_CLKSEL_64M, SYSCLK_CLKSEL_HOSC,
    SYSCLK_CPUDIV_MASK, SYSCLK_CPUDIV_SHIFT, SYSTEM_SET, VOUT_CTL0, VOUT_CTL1,
    WAKE_PD_FIELD_MASK, WIO0_CTL,
};
use platform::timebase::Timebase;
use platform::watchdog::Watchdog;

use crate::time::RcStamp;
use crate::wake_source::{WakeSourceSet, WakeupMode, WakeupSources};

/// Registers saved around a sleep cycle, in capture order. Restoration
/// walks this list backwards: MEMCLKEN, reset and clock-enable groups come
/// back first, the SPI0/system clock selects last.
pub const BACKUP_REGS: [u32; 12] = [
    CMU_SPI0CLK,
    CMU_SYSCLK,
    PMUADC_CTL,
    WIO0_CTL,
    SPD_CTL,
    AUDIO_PLL1_CTL,
    AUDIO_PLL0_CTL,
    CMU_DEVCLKEN1,
    CMU_DEVCLKEN0,
    RMU_MRCR1,
    RMU_MRCR0,
    CMU_MEMCLKEN,
];

/// One captured register value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegisterRecord {
    /// Register address.
    pub addr: u32,
    /// Value at capture time.
    pub value: u32,
}

/// Ordered register snapshot, alive for exactly one sleep cycle.
pub type RegisterSnapshot = Vec<RegisterRecord, 16>;

/// Capture [`BACKUP_REGS`] in list order.
fn capture<B: RegisterBus>(bus: &B) -> RegisterSnapshot {
    let mut snap = RegisterSnapshot::new();
    for addr in BACKUP_REGS {
        // Capacity 16 > 12 entries, push cannot fail.
        let _ = snap.push(RegisterRecord {
            addr,
            value: bus.read32(addr),
        });
    }
    snap
}

/// Write a snapshot back in reverse capture order.
fn restore<B: RegisterBus>(bus: &mut B, snap: &RegisterSnapshot) {
    for rec in snap.iter().rev() {
        bus.write32(rec.addr, rec.value);
    }
}

/// Voltage rails saved separately from the general snapshot and restored
/// unconditionally on deep wake.
#[derive(Debug, Clone, Copy, Default)]
struct RailBackup {
    vout_ctl0: u32,
    vout_ctl1: u32,
    system_set: u32,
    dcdc_ctl1: u32,
    dcdc_ctl2: u32,
}

/// S2/S3 sleep sequencer. Owns the in-flight snapshot state; the
/// orchestrator guarantees at most one sleep cycle is in flight.
pub struct SleepSequencer {
    sources: WakeupSources,
    s2_snapshot: RegisterSnapshot,
    corepll_backup: u32,
    light_started: Option<RcStamp>,
    light_total_ms: u32,
    deep_total_ms: u32,
}

impl SleepSequencer {
    /// Sequencer with no sleep cycle in flight.
    #[must_use]
    pub fn new(sources: WakeupSources) -> Self {
        Self {
            sources,
            s2_snapshot: RegisterSnapshot::new(),
            corepll_backup: 0,
            light_started: None,
            light_total_ms: 0,
            deep_total_ms: 0,
        }
    }

    /// Enter light sleep: ADC and DC5V pad sensing off, audio PLLs off,
    /// SPI0 onto the fixed CK48M tap, CPU onto 48 MHz, core PLL disabled.
    ///
    /// The core-PLL control word is the one order-sensitive value; it is
    /// saved before the PLL is torn down and is the first thing restored on
    /// exit.
    pub fn enter_light_sleep<B, T>(&mut self, bus: &mut B, tb: &mut T)
    where
        B: RegisterBus,
        T: Timebase,
    {
        critical_section::with(|_| {
            self.s2_snapshot = capture(bus);

            bus.write32(PMUADC_CTL, 0);
            bus.write32(WIO0_CTL, 0);

            bus.write32(AUDIO_PLL0_CTL, 0);
            bus.write32(AUDIO_PLL1_CTL, 0);

            bus.modify32(CMU_SPI0CLK, SPI0CLK_FIELD_MASK, SPI0CLK_SEL_CK48M);

            bus.modify32(CMU_SYSCLK, 0x3, SYSCLK_CLKSEL_64M);
            bus.modify32(
                CMU_SYSCLK,
                SYSCLK_CPUDIV_MASK,
                0xB_u32.wrapping_shl(SYSCLK_CPUDIV_SHIFT),
            );

            self.corepll_backup = bus.read32(CMU_COREPLL_CTL);
            bus.modify32(CMU_COREPLL_CTL, COREPLL_CTL_EN, 0);
            bus.write32(CMU_COREPLL_CTL, 0);
        });

        self.light_started = Some(RcStamp::new(tb.rc_timestamp_ms()));
        info!("enter light sleep");
    }

    /// Exit light sleep: core PLL back with a 100 µs lock settle, then the
    /// full snapshot in reverse order.
    pub fn exit_light_sleep<B, T>(&mut self, bus: &mut B, tb: &mut T)
    where
        B: RegisterBus,
        T: Timebase,
    {
        bus.write32(CMU_COREPLL_CTL, self.corepll_backup);
        tb.busy_wait_us(100);

        restore(bus, &self.s2_snapshot);
        self.s2_snapshot.clear();

        if let Some(started) = self.light_started.take() {
            let slept = RcStamp::new(tb.rc_timestamp_ms()).elapsed_since(started);
            self.light_total_ms = self.light_total_ms.wrapping_add(slept);
        }
        info!("exit light sleep");
    }

    /// Enter deep sleep and block until a wake source fires. Returns the
    /// pending set that ended the sleep.
    ///
    /// Runs entirely under a critical section: the register state is
    /// invalid for interrupt handlers from the first clock gate until the
    /// last restore, and once the power-domain bit is asserted the sequence
    /// cannot be aborted anyway.
    pub fn enter_deep_sleep<B, T, W>(&mut self, bus: &mut B, tb: &mut T, wd: &mut W) -> WakeSourceSet
    where
        B: RegisterBus,
        T: Timebase,
        W: Watchdog,
    {
        critical_section::with(|_| {
            self.sources.configure(bus, tb, WakeupMode::Standby);
            self.sources.clear_pending(bus, tb);

            let snapshot = capture(bus);
            let spll_backup = bus.read32(SPLL_CTL);

            self.gate_clocks_to_allowlist(bus);

            bus.modify32(CMU_SPI0CLK, SPI0CLK_FIELD_MASK, SPI0CLK_SEL_HOSC);

            // Max out the divider before touching the source select.
            bus.modify32(CMU_SYSCLK, SYSCLK_CPUDIV_MASK, SYSCLK_CPUDIV_MASK);
            bus.modify32(CMU_SYSCLK, 0x3, SYSCLK_CLKSEL_HOSC);

            // RAM0..RAM6 and ROM banks stay clocked; everything above is
            // gated.
            bus.modify32(CMU_MEMCLKEN, MEMCLKEN_NONESSENTIAL_MASK, 0);

            bus.write32(SPLL_CTL, 0);

            let rails = Self::rails_down(bus);
            tb.busy_wait_us(300);

            let started = RcStamp::new(tb.rc_timestamp_ms());
            if let Some(light_started) = self.light_started {
                // Time since light-sleep entry was spent in S2 proper.
                self.light_total_ms = self
                    .light_total_ms
                    .wrapping_add(started.elapsed_since(light_started));
            }

            norflash_power_ctrl(bus, tb, true);

            // S1 -> S3BT power-domain transition. Committed: from here the
            // only way out is a latched wake source.
            bus.write32(PMU_POWER_CTL, POWER_CTL_S3BT_EN);

            loop {
                wd.feed();
                if bus.read32(PMU_WAKE_PD) & WAKE_PD_FIELD_MASK != 0 {
                    break;
                }
                tb.busy_wait_us(100);
            }

            norflash_power_ctrl(bus, tb, false);

            let woke = RcStamp::new(tb.rc_timestamp_ms());
            let slept = woke.elapsed_since(started);
            self.deep_total_ms = self.deep_total_ms.wrapping_add(slept);
            if self.light_started.is_some() {
                self.light_started = Some(woke);
            }

            bus.write32(SPLL_CTL, spll_backup);
            tb.busy_wait_us(200);

            Self::rails_up(bus, &rails);

            restore(bus, &snapshot);

            // Uptime-based timers must not silently lose the slept gap.
            tb.compensate_ms(slept);

            let pending = self.sources.pending(bus);
            info!("woke from deep sleep after {} ms", slept);
            pending
        })
    }

    /// Cumulative milliseconds spent in S3 deep sleep.
    #[must_use]
    pub fn deep_sleep_time_ms(&self) -> u32 {
        self.deep_total_ms
    }

    /// Cumulative milliseconds spent light-sleeping in S2 (excluding S3).
    #[must_use]
    pub fn light_sleep_time_ms(&self) -> u32 {
        self.light_total_ms
    }

    /// Gate `DEVCLKEN0/1` down to [`DEEP_SLEEP_CLOCK_ALLOWLIST`].
    fn gate_clocks_to_allowlist<B: RegisterBus>(&self, bus: &mut B) {
        let mut lo = 0u32;
        let mut hi = 0u32;
        for id in DEEP_SLEEP_CLOCK_ALLOWLIST {
            let bit = u32::from(id.bit());
            if bit < 32 {
                lo |= 1u32.wrapping_shl(bit);
            } else {
                hi |= 1u32.wrapping_shl(bit.wrapping_sub(32));
            }
        }
        bus.write32(CMU_DEVCLKEN0, lo);
        bus.write32(CMU_DEVCLKEN1, hi);
    }

    /// Program the always-on rails for S3BT and return their prior values.
    fn rails_down<B: RegisterBus>(bus: &mut B) -> RailBackup {
        let rails = RailBackup {
            vout_ctl0: bus.read32(VOUT_CTL0),
            vout_ctl1: bus.read32(VOUT_CTL1),
            system_set: bus.read32(SYSTEM_SET),
            dcdc_ctl1: bus.read32(DCDC_CTL1),
            dcdc_ctl2: bus.read32(DCDC_CTL2),
        };

        // SEG_LED rail off.
        bus.modify32(VOUT_CTL0, 1 << 23, 0);
        // AVDD off.
        bus.modify32(VOUT_CTL0, 1 << 19, 0);
        // VDD pull-down off, VDD held at the 0.9 V S3BT point.
        bus.modify32(VOUT_CTL0, 0x3 << 14, 0);
        bus.modify32(VOUT_CTL0, 0x7 << 4, 0x2 << 4);

        // SPLL_AVDD off; VD15 in DCDC mode at the 1.2 V S3BT point.
        bus.modify32(VOUT_CTL1, 1 << 15, 0);
        bus.modify32(VOUT_CTL1, 0, 1 << 8);
        bus.modify32(VOUT_CTL1, 0xF << 4, 0x4 << 4);

        bus.modify32(BDG_CTL, 1 << 5, 0);
        bus.write32(SPD_CTL, 0);
        // OSCVDD pull-down disabled.
        bus.write32(SYSTEM_SET, 0x4DC);

        bus.write32(DCDC_CTL1, 0x13DE_224A);
        bus.write32(DCDC_CTL2, 0x100D_A992);
        bus.write32(PMUADC_CTL, 0);

        rails
    }

    /// Undo [`Self::rails_down`], unconditionally.
    fn rails_up<B: RegisterBus>(bus: &mut B, rails: &RailBackup) {
        bus.write32(VOUT_CTL0, rails.vout_ctl0);
        bus.write32(VOUT_CTL1, rails.vout_ctl1);
        bus.write32(SYSTEM_SET, rails.system_set);
        bus.write32(DCDC_CTL1, rails.dcdc_ctl1);
        bus.write32(DCDC_CTL2, rails.dcdc_ctl2);
    }
}
