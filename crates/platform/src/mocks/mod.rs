//! Mock implementations for testing.
//!
//! [`MockSoc`] is a scriptable register file + clock standing in for the
//! real SoC. It reproduces the handful of hardware behaviors the power
//! subsystem depends on: write-1-to-clear semantics on the wake pending
//! latch, wake sources that fire after a number of polls, the RTC-domain
//! commit handshake, and time that only moves when the code waits.
//!
//! Cloning a `MockSoc` clones a *handle*: all clones share one register
//! file, so a test can hand the same device to code that wants separate
//! `RegisterBus` and `Timebase` parameters.

#![cfg(any(test, feature = "std"))]
#![allow(clippy::arithmetic_side_effects)]

use core::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::vec::Vec;

use crate::bus::RegisterBus;
use crate::flash::SPI0_TXDAT;
use crate::persisted::{UPDATE_MAGIC, UPDATE_OK};
use crate::regs::{PMU_WAKE_PD, RTC_REGUPDATE, WAKE_PD_WRITABLE_MASK};
use crate::supply::PowerSupply;
use crate::timebase::{Timebase, CYCLES_PER_US};
use crate::watchdog::Watchdog;

#[derive(Default)]
struct MockState {
    regs: HashMap<u32, u32>,
    writes: Vec<(u32, u32)>,
    spi_commands: Vec<u32>,

    cycles: u32,
    uptime_us: u64,
    rc_us: u64,
    compensated_ms: u32,
    relax_count: u32,

    // Wake latch scripting.
    wake_after_polls: Option<(u32, u32)>,
    stuck_pending: u32,

    // RTC commit handshake scripting.
    regupdate_responsive: bool,
    regupdate_delay_reads: u32,
    regupdate_pending: bool,

    feed_count: u32,
    watchdog_disabled: bool,
}

/// Shared-handle mock SoC implementing [`RegisterBus`], [`Timebase`] and
/// [`Watchdog`].
#[derive(Clone)]
pub struct MockSoc {
    state: Rc<RefCell<MockState>>,
}

impl Default for MockSoc {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSoc {
    /// Fresh mock with all registers zero and time at zero.
    #[must_use]
    pub fn new() -> Self {
        let state = MockState {
            regupdate_responsive: true,
            ..MockState::default()
        };
        Self {
            state: Rc::new(RefCell::new(state)),
        }
    }

    /// Latch `bits` into `PMU_WAKE_PD` after the register has been polled
    /// `polls` more times.
    pub fn latch_wake_after_polls(&self, polls: u32, bits: u32) {
        self.state.borrow_mut().wake_after_polls = Some((polls, bits));
    }

    /// Mark pending bits that ignore W1C acknowledges (edge latch whose
    /// trigger condition has not subsided).
    pub fn set_stuck_pending(&self, bits: u32) {
        let mut st = self.state.borrow_mut();
        st.stuck_pending = bits;
        let r = st.regs.entry(PMU_WAKE_PD).or_insert(0);
        *r |= bits;
    }

    /// Whether the RTC domain answers the commit handshake at all.
    pub fn set_regupdate_responsive(&self, responsive: bool) {
        self.state.borrow_mut().regupdate_responsive = responsive;
    }

    /// Delay the handshake OK code by `reads` polls of `RTC_REGUPDATE`.
    pub fn set_regupdate_delay_reads(&self, reads: u32) {
        self.state.borrow_mut().regupdate_delay_reads = reads;
    }

    /// Command bytes written to the SPI0 TX register, in order.
    #[must_use]
    pub fn spi_commands(&self) -> Vec<u32> {
        self.state.borrow().spi_commands.clone()
    }

    /// Every `write32` performed, in order.
    #[must_use]
    pub fn write_history(&self) -> Vec<(u32, u32)> {
        self.state.borrow().writes.clone()
    }

    /// Advance uptime, RC counter and cycle counter together (idle time
    /// passing with the system awake).
    pub fn advance_ms(&self, ms: u32) {
        let mut st = self.state.borrow_mut();
        let us = u64::from(ms) * 1000;
        st.uptime_us += us;
        st.rc_us += us;
        st.cycles = st.cycles.wrapping_add(ms.wrapping_mul(1000 * CYCLES_PER_US));
    }

    /// Number of cooperative `relax_us` pauses taken so far (one per S2
    /// busy-wait iteration).
    #[must_use]
    pub fn relax_count(&self) -> u32 {
        self.state.borrow().relax_count
    }

    /// Watchdog feeds observed.
    #[must_use]
    pub fn feed_count(&self) -> u32 {
        self.state.borrow().feed_count
    }

    /// True once the watchdog has been disabled.
    #[must_use]
    pub fn watchdog_disabled(&self) -> bool {
        self.state.borrow().watchdog_disabled
    }

    /// Total milliseconds credited back to the tick count after deep sleep.
    #[must_use]
    pub fn compensated_ms(&self) -> u32 {
        self.state.borrow().compensated_ms
    }

    fn advance_wait(&self, us: u32, tick_runs: bool) {
        let mut st = self.state.borrow_mut();
        st.cycles = st.cycles.wrapping_add(us.wrapping_mul(CYCLES_PER_US));
        st.rc_us += u64::from(us);
        if tick_runs {
            st.uptime_us += u64::from(us);
        }
    }
}

impl RegisterBus for MockSoc {
    fn read32(&self, addr: u32) -> u32 {
        let mut st = self.state.borrow_mut();

        if addr == PMU_WAKE_PD {
            if let Some((polls, bits)) = st.wake_after_polls {
                if polls == 0 {
                    let r = st.regs.entry(PMU_WAKE_PD).or_insert(0);
                    *r |= bits;
                    st.wake_after_polls = None;
                } else {
                    st.wake_after_polls = Some((polls - 1, bits));
                }
            }
        }

        if addr == RTC_REGUPDATE && st.regupdate_pending {
            if !st.regupdate_responsive {
                return UPDATE_MAGIC;
            }
            if st.regupdate_delay_reads > 0 {
                st.regupdate_delay_reads -= 1;
                return UPDATE_MAGIC;
            }
            st.regupdate_pending = false;
            st.regs.insert(RTC_REGUPDATE, UPDATE_OK);
        }

        st.regs.get(&addr).copied().unwrap_or(0)
    }

    fn write32(&mut self, addr: u32, value: u32) {
        let mut st = self.state.borrow_mut();
        st.writes.push((addr, value));

        match addr {
            // W1C pending latch; stuck bits ignore the acknowledge.
            PMU_WAKE_PD => {
                let stuck = st.stuck_pending;
                let r = st.regs.entry(PMU_WAKE_PD).or_insert(0);
                *r &= !(value & WAKE_PD_WRITABLE_MASK & !stuck);
            }
            RTC_REGUPDATE if value == UPDATE_MAGIC => {
                st.regupdate_pending = true;
                st.regs.insert(RTC_REGUPDATE, UPDATE_MAGIC);
            }
            SPI0_TXDAT => {
                st.spi_commands.push(value);
                st.regs.insert(addr, value);
            }
            _ => {
                st.regs.insert(addr, value);
            }
        }
    }
}

impl Timebase for MockSoc {
    fn uptime_ms(&self) -> u32 {
        #[allow(clippy::cast_possible_truncation)]
        ((self.state.borrow().uptime_us / 1000) as u32)
    }

    fn cycles(&self) -> u32 {
        self.state.borrow().cycles
    }

    fn rc_timestamp_ms(&self) -> u32 {
        #[allow(clippy::cast_possible_truncation)]
        let ms = (self.state.borrow().rc_us / 1000) as u32;
        ms & 0x0FFF_FFFF
    }

    fn busy_wait_us(&mut self, us: u32) {
        // Interrupts masked: the kernel tick does not run.
        self.advance_wait(us, false);
    }

    fn relax_us(&mut self, us: u32) {
        self.state.borrow_mut().relax_count += 1;
        self.advance_wait(us, true);
    }

    fn compensate_ms(&mut self, ms: u32) {
        let mut st = self.state.borrow_mut();
        st.compensated_ms = st.compensated_ms.wrapping_add(ms);
        st.uptime_us += u64::from(ms) * 1000;
    }
}

impl Watchdog for MockSoc {
    fn feed(&mut self) {
        self.state.borrow_mut().feed_count += 1;
    }

    fn disable(&mut self) {
        self.state.borrow_mut().watchdog_disabled = true;
    }
}

/// Scriptable [`PowerSupply`] double.
#[derive(Clone, Default)]
pub struct MockSupply {
    inner: Rc<RefCell<MockSupplyState>>,
}

#[derive(Default)]
struct MockSupplyState {
    dc5v: bool,
    no_power: bool,
    dc5v_after_polls: Option<u32>,
}

impl MockSupply {
    /// Supply on battery, DC5V unplugged.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the DC5V presence immediately.
    pub fn set_dc5v(&self, present: bool) {
        self.inner.borrow_mut().dc5v = present;
    }

    /// Report DC5V as plugged after `polls` further `dc5v_present()` calls
    /// (simulates the cable arriving mid-busy-wait).
    pub fn plug_dc5v_after_polls(&self, polls: u32) {
        self.inner.borrow_mut().dc5v_after_polls = Some(polls);
    }

    /// Set the battery-exhausted condition.
    pub fn set_no_power(&self, no_power: bool) {
        self.inner.borrow_mut().no_power = no_power;
    }
}

impl PowerSupply for MockSupply {
    fn dc5v_present(&self) -> bool {
        let mut st = self.inner.borrow_mut();
        if let Some(polls) = st.dc5v_after_polls {
            if polls == 0 {
                st.dc5v = true;
                st.dc5v_after_polls = None;
            } else {
                st.dc5v_after_polls = Some(polls - 1);
            }
        }
        st.dc5v
    }

    fn no_power(&self) -> bool {
        self.inner.borrow().no_power
    }
}
