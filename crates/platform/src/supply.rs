//! External power / battery status.
//!
//! The charger and fuel-gauge drivers are collaborators outside this
//! subsystem; the orchestrator only needs two yes/no answers from them.

use crate::bus::RegisterBus;
use crate::regs::{WIO0_CTL, WIO_CTL_DAT};

/// Power-source status consumed by the standby state machine.
pub trait PowerSupply {
    /// True while the 5 V charge input is plugged.
    fn dc5v_present(&self) -> bool;

    /// True when the battery can no longer sustain operation — forces the
    /// unconditional power-off path.
    fn no_power(&self) -> bool;
}

impl<P: PowerSupply + ?Sized> PowerSupply for &P {
    fn dc5v_present(&self) -> bool {
        (**self).dc5v_present()
    }

    fn no_power(&self) -> bool {
        (**self).no_power()
    }
}

/// Board wiring of the DC5V detect pin: which WIO pad carries it and which
/// level means "plugged".
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Dc5vWio {
    /// WIO pad index (0..=2).
    pub wio: u8,
    /// Pad level when DC5V is present.
    pub active_high: bool,
}

impl Dc5vWio {
    /// Control-register address for this pad.
    #[must_use]
    pub fn ctl_addr(self) -> u32 {
        WIO0_CTL.wrapping_add(u32::from(self.wio).wrapping_mul(0x04))
    }

    /// Sample the pad and compare against the configured active level.
    #[must_use]
    pub fn is_plugged<B: RegisterBus>(self, bus: &B) -> bool {
        let level_high = bus.read32(self.ctl_addr()) & (1 << WIO_CTL_DAT) != 0;
        level_high == self.active_high
    }
}

#[cfg(test)]
mod tests {
    use crate::mocks::MockSoc;

    use super::*;
    use crate::bus::RegisterBus;

    #[test]
    fn wio_pad_addresses_step_by_four() {
        assert_eq!(Dc5vWio { wio: 0, active_high: true }.ctl_addr(), WIO0_CTL);
        assert_eq!(
            Dc5vWio { wio: 1, active_high: true }.ctl_addr(),
            WIO0_CTL + 4
        );
        assert_eq!(
            Dc5vWio { wio: 2, active_high: true }.ctl_addr(),
            WIO0_CTL + 8
        );
    }

    #[test]
    fn plug_detect_respects_active_level() {
        let mut soc = MockSoc::new();
        let pin = Dc5vWio { wio: 1, active_high: true };
        assert!(!pin.is_plugged(&soc));
        soc.write32(pin.ctl_addr(), 1 << WIO_CTL_DAT);
        assert!(pin.is_plugged(&soc));

        let inverted = Dc5vWio { wio: 1, active_high: false };
        assert!(!inverted.is_plugged(&soc));
    }
}
