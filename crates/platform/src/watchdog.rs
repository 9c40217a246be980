//! Watchdog servicing and the forced-reset escape hatch.

use crate::bus::RegisterBus;
use crate::regs::{WD_CTL, WD_CTL_RESET_NOW};

/// Hardware watchdog. The S2 busy-wait loop feeds it every iteration; the
/// power-off path disables it so the final rail shutdown cannot be
/// interrupted by a reset.
pub trait Watchdog {
    /// Reload the watchdog counter.
    fn feed(&mut self);

    /// Stop the watchdog entirely.
    fn disable(&mut self);
}

impl<W: Watchdog + ?Sized> Watchdog for &mut W {
    fn feed(&mut self) {
        (**self).feed();
    }

    fn disable(&mut self) {
        (**self).disable();
    }
}

/// Trigger an immediate watchdog reset and spin until it takes effect.
///
/// Used after the reboot reason has been persisted, and as the fallback when
/// the power-off sequence detects a wake pending that prevents S3/S4 entry.
pub fn force_reboot<B: RegisterBus>(bus: &mut B) -> ! {
    bus.write32(WD_CTL, WD_CTL_RESET_NOW);
    #[allow(clippy::empty_loop)]
    loop {}
}
