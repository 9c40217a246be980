//! Final power-off and reboot sequencing.
//!
//! Power-off walks the PMU into S4: discharge pull-downs on, S3BT disabled,
//! S3 enabled, then the work-domain enable bit is cleared repeatedly until
//! the rails actually collapse. If an on/off key wake latches while the
//! chip refuses to die (key still bouncing, charger holding a rail up), the
//! device reboots instead of sitting in a half-off state.

use platform::bus::RegisterBus;
use platform::persisted;
use platform::regs::{
    ONOFF_KEY_PRESSED, PMU_ONOFF_KEY, PMU_POWER_CTL, PMU_WAKE_PD, POWER_CTL_S3BT_EN,
    POWER_CTL_S3_EN, POWER_CTL_WORK_EN, SPD_CTL, SPD_CTL_VCC_PD, SPD_CTL_VD15_PD,
    WAKE_PD_ONOFF_LONG, WAKE_PD_ONOFF_SHORT,
};
use platform::timebase::Timebase;
use platform::watchdog::{force_reboot, Watchdog};

use crate::wake_source::{WakeupMode, WakeupSources};

/// Reboot reason persisted for the boot loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum RebootReason {
    /// Plain restart.
    Normal = 0x0000,
    /// Restart into the USB firmware-update loader.
    Adfu = 0x1000,
    /// Restart into the Bluetooth system image.
    BtSys = 0x1100,
    /// Restart into the main system image.
    System = 0x1200,
    /// Restart into the recovery image.
    Recovery = 0x1300,
}

/// Persist `reason` and force a watchdog reset.
pub fn reboot<B, T>(bus: &mut B, tb: &mut T, reason: RebootReason) -> !
where
    B: RegisterBus,
    T: Timebase,
{
    info!("system reboot, reason {:#x}", reason as u16);
    critical_section::with(|_| {
        persisted::set_reboot_reason(bus, tb, reason as u16);
        tb.busy_wait_us(500);
    });
    force_reboot(bus)
}

/// The power-down register walk, separated from [`poweroff`] so it can run
/// to completion on a mock. Returns the on/off wake pending bits that
/// prevented S4 entry; on real hardware the rails collapse inside the loop
/// and the function never returns.
pub fn run_poweroff<B, T, W>(
    bus: &mut B,
    tb: &mut T,
    wd: &mut W,
    sources: WakeupSources,
    mode: WakeupMode,
) -> u32
where
    B: RegisterBus,
    T: Timebase,
    W: Watchdog,
{
    // Wait out the key press, then debounce: a still-bouncing on/off key
    // would latch a wake pending and immediately restart the chip.
    while bus.read32(PMU_ONOFF_KEY) & ONOFF_KEY_PRESSED != 0 {
        tb.busy_wait_us(1_000);
    }
    tb.busy_wait_us(10_000);

    info!("system power down");

    sources.configure(bus, tb, mode);

    critical_section::with(|_| {
        wd.disable();

        // VD15 and VCC pull-downs for rapid rail discharge.
        bus.modify32(SPD_CTL, 0, SPD_CTL_VD15_PD | SPD_CTL_VCC_PD);

        bus.modify32(PMU_POWER_CTL, POWER_CTL_S3BT_EN, 0);
        tb.busy_wait_us(500);

        bus.modify32(PMU_POWER_CTL, 0, POWER_CTL_S3_EN);
        tb.busy_wait_us(500);

        loop {
            bus.modify32(PMU_POWER_CTL, POWER_CTL_WORK_EN, 0);
            tb.busy_wait_us(10_000);

            let wake_pd =
                bus.read32(PMU_WAKE_PD) & (WAKE_PD_ONOFF_LONG | WAKE_PD_ONOFF_SHORT);
            if wake_pd != 0 {
                break wake_pd;
            }
        }
    })
}

/// Power the device off. Diverges: either the rails collapse, or a wake
/// pending forces a reboot.
pub fn poweroff<B, T, W>(bus: &mut B, tb: &mut T, wd: &mut W, sources: WakeupSources) -> !
where
    B: RegisterBus,
    T: Timebase,
    W: Watchdog,
{
    let wake_pd = run_poweroff(bus, tb, wd, sources, WakeupMode::PowerOff);
    warn!("poweroff blocked by wake pending {:#x}, rebooting", wake_pd);
    reboot(bus, tb, RebootReason::Normal)
}

/// Power off after a DC5V-initiated shutdown: the plug wake source is left
/// disarmed so the cable that caused the shutdown cannot immediately
/// restart the device.
pub fn poweroff_from_dc5v<B, T, W>(
    bus: &mut B,
    tb: &mut T,
    wd: &mut W,
    sources: WakeupSources,
) -> !
where
    B: RegisterBus,
    T: Timebase,
    W: Watchdog,
{
    let wake_pd = run_poweroff(bus, tb, wd, sources, WakeupMode::PowerOffNoDc5v);
    warn!("poweroff blocked by wake pending {:#x}, rebooting", wake_pd);
    reboot(bus, tb, RebootReason::Normal)
}
