//! Battery-backed (RTC-domain) persisted state.
//!
//! Three 32-bit registers survive reboot (but not battery removal):
//!
//! - `RTC_BAK3`: reboot reason — magic `0x4252` ("RB") in bits 31:16,
//!   reason code in bits 15:0, consumed by the boot loader.
//! - `RTC_BAK2`: product flag — magic `0x5250` ("PR") in bits 31:16,
//!   payload in bits 15:0; read-once, cleared after a successful read.
//! - `RTC_REGUPDATE`: write handshake. RTC-domain registers are clocked from
//!   the slow always-on oscillator; a write is not durable until the
//!   handshake register reads back the OK code.

use crate::bus::RegisterBus;
use crate::regs::{RTC_BAK2, RTC_BAK3, RTC_REGUPDATE};
use crate::timebase::{poll_expired, Timebase};

/// Value written to `RTC_REGUPDATE` to start committing RTC-domain writes.
pub const UPDATE_MAGIC: u32 = 0xA596;
/// Value read back once the RTC domain has latched the writes.
pub const UPDATE_OK: u32 = 0x5A69;
/// Upper bound on the commit handshake; the RTC domain normally answers in
/// a few 32 kHz periods.
pub const UPDATE_TIMEOUT_MS: u32 = 500;

/// Reboot-reason tag magic, "RB".
pub const REBOOT_REASON_MAGIC: u32 = 0x4252;
/// Product-flag tag magic, "PR".
pub const PRODUCT_FLAG_MAGIC: u32 = 0x5250;

/// Commit outstanding RTC-domain register writes.
///
/// Bounded poll: on timeout the write is assumed to land eventually and
/// execution proceeds (logged, non-fatal) — a battery-powered device must
/// never hang on a diagnostic register.
pub fn commit<B: RegisterBus, T: Timebase>(bus: &mut B, tb: &mut T) {
    bus.write32(RTC_REGUPDATE, UPDATE_MAGIC);

    let start = tb.cycles();
    while bus.read32(RTC_REGUPDATE) != UPDATE_OK {
        tb.busy_wait_us(10);
        if poll_expired(tb, start, UPDATE_TIMEOUT_MS) {
            warn!("rtc regupdate handshake timed out");
            break;
        }
    }
}

/// Persist the reboot reason for the boot loader.
pub fn set_reboot_reason<B: RegisterBus, T: Timebase>(bus: &mut B, tb: &mut T, reason: u16) {
    bus.write32(RTC_BAK3, (REBOOT_REASON_MAGIC << 16) | u32::from(reason));
    commit(bus, tb);
}

/// Reboot reason left by the previous session, if the tag is valid.
#[must_use]
pub fn reboot_reason<B: RegisterBus>(bus: &B) -> Option<u16> {
    let raw = bus.read32(RTC_BAK3);
    if (raw >> 16) == REBOOT_REASON_MAGIC {
        #[allow(clippy::cast_possible_truncation)]
        Some(raw as u16)
    } else {
        None
    }
}

/// Persist the product flag (factory/ATT tooling channel).
pub fn set_product_flag<B: RegisterBus, T: Timebase>(bus: &mut B, tb: &mut T, flag: u16) {
    info!("set product flag {:#x}", flag);
    bus.write32(RTC_BAK2, (PRODUCT_FLAG_MAGIC << 16) | u32::from(flag));
    commit(bus, tb);
}

/// Read-and-clear the product flag. Returns `None` when the tag is absent;
/// a valid flag is cleared so it is observed exactly once.
pub fn take_product_flag<B: RegisterBus, T: Timebase>(bus: &mut B, tb: &mut T) -> Option<u16> {
    let raw = bus.read32(RTC_BAK2);
    if (raw >> 16) != PRODUCT_FLAG_MAGIC {
        return None;
    }

    bus.write32(RTC_BAK2, 0);
    commit(bus, tb);

    #[allow(clippy::cast_possible_truncation)]
    Some(raw as u16)
}

#[cfg(test)]
mod tests {
    use crate::mocks::MockSoc;

    use super::*;

    #[test]
    fn reboot_reason_round_trip() {
        let mut soc = MockSoc::new();
        let mut tb = soc.clone();
        set_reboot_reason(&mut soc, &mut tb, 0x0107);
        assert_eq!(reboot_reason(&soc), Some(0x0107));
    }

    #[test]
    fn reboot_reason_rejects_bad_magic() {
        let mut soc = MockSoc::new();
        soc.write32(RTC_BAK3, 0xDEAD_0001);
        assert_eq!(reboot_reason(&soc), None);
    }

    #[test]
    fn product_flag_is_read_once() {
        let mut soc = MockSoc::new();
        let mut tb = soc.clone();
        set_product_flag(&mut soc, &mut tb, 0x5A);
        assert_eq!(take_product_flag(&mut soc, &mut tb), Some(0x5A));
        assert_eq!(take_product_flag(&mut soc, &mut tb), None);
    }

    #[test]
    fn commit_survives_unresponsive_rtc_domain() {
        let mut soc = MockSoc::new();
        soc.set_regupdate_responsive(false);
        let mut tb = soc.clone();
        // Must return (bounded poll), not hang.
        commit(&mut soc, &mut tb);
    }

    #[test]
    fn commit_waits_for_ok_code() {
        let mut soc = MockSoc::new();
        soc.set_regupdate_delay_reads(3);
        let mut tb = soc.clone();
        commit(&mut soc, &mut tb);
        assert_eq!(soc.read32(RTC_REGUPDATE), UPDATE_OK);
    }
}
