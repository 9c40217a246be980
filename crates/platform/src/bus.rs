//! Register-bus abstraction.
//!
//! Every hardware touch in the power subsystem goes through [`RegisterBus`]
//! so the sequencing logic can run against the mock SoC in host tests. The
//! volatile MMIO implementation is only compiled for the physical target.

/// 32-bit memory-mapped register access.
pub trait RegisterBus {
    /// Read a 32-bit register.
    fn read32(&self, addr: u32) -> u32;

    /// Write a 32-bit register.
    fn write32(&mut self, addr: u32, value: u32);

    /// Read-modify-write: clear `clear` bits, then set `set` bits.
    fn modify32(&mut self, addr: u32, clear: u32, set: u32) {
        let value = (self.read32(addr) & !clear) | set;
        self.write32(addr, value);
    }
}

impl<B: RegisterBus + ?Sized> RegisterBus for &mut B {
    fn read32(&self, addr: u32) -> u32 {
        (**self).read32(addr)
    }

    fn write32(&mut self, addr: u32, value: u32) {
        (**self).write32(addr, value);
    }
}

/// Direct volatile MMIO access on the physical SoC.
#[cfg(feature = "hardware")]
#[derive(Debug, Default, Clone, Copy)]
pub struct Mmio;

#[cfg(feature = "hardware")]
impl RegisterBus for Mmio {
    fn read32(&self, addr: u32) -> u32 {
        // SAFETY: `addr` is a device register inside the SoC's fixed MMIO
        // aperture; reads have no memory-model side effects beyond the device.
        unsafe { core::ptr::read_volatile(addr as *const u32) }
    }

    fn write32(&mut self, addr: u32, value: u32) {
        // SAFETY: as above; the register map in `regs` only names device
        // registers, never RAM.
        unsafe { core::ptr::write_volatile(addr as *mut u32, value) }
    }
}

#[cfg(test)]
mod tests {
    use crate::mocks::MockSoc;

    use super::RegisterBus;

    #[test]
    fn modify32_clears_then_sets() {
        let mut soc = MockSoc::new();
        soc.write32(0x1000, 0b1111_0000);
        soc.modify32(0x1000, 0b0011_0000, 0b0000_0001);
        assert_eq!(soc.read32(0x1000), 0b1100_0001);
    }

    #[test]
    fn modify32_set_wins_over_clear() {
        let mut soc = MockSoc::new();
        soc.write32(0x1000, 0);
        soc.modify32(0x1000, 0b1, 0b1);
        assert_eq!(soc.read32(0x1000), 0b1);
    }
}
