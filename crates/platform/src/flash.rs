//! Boot NOR-flash deep power-down control.
//!
//! During S3 the flash draws the single largest static current on the 3.3 V
//! rail, so the sequencer puts it into vendor deep power-down (command
//! `0xB9`) before asserting the power-domain transition and releases it
//! (`0xAB`) first thing on wake. The code that runs between those two points
//! must execute from RAM — the flash cannot serve instruction fetches while
//! powered down.

use crate::bus::RegisterBus;
use crate::regs::SPI0_REG_BASE;
use crate::timebase::Timebase;

/// SPI0 control register (mode field in bits 1:0, IO width in bits 11:10).
pub const SPI0_CTL: u32 = SPI0_REG_BASE;
/// SPI0 transmit data register for direct command bytes.
pub const SPI0_TXDAT: u32 = SPI0_REG_BASE + 0x08;

/// Control word that opens the AHB write path for raw command bytes.
pub const SPI0_CTL_AHB_CMD_MODE: u32 = 0x0008_013A;
/// Mode field mask; `00` = disabled, `10` = write-only.
pub const SPI0_CTL_MODE_MASK: u32 = 0x3;
/// IO-width field; non-zero means the flash may sit in 4x continuous mode.
pub const SPI0_CTL_IO4X_MASK: u32 = 0x3 << 10;

/// JEDEC deep power-down.
pub const CMD_DEEP_POWER_DOWN: u8 = 0xB9;
/// JEDEC release from deep power-down.
pub const CMD_RELEASE_POWER_DOWN: u8 = 0xAB;
/// Exit continuous-read mode (required before any command in 4x IO mode).
pub const CMD_EXIT_CONTINUOUS: u8 = 0xFF;

fn send_command<B: RegisterBus, T: Timebase>(bus: &mut B, tb: &mut T, cmd: u8) {
    bus.write32(SPI0_TXDAT, u32::from(cmd));
    tb.busy_wait_us(2);
}

/// Power the boot flash down (`powerdown = true`) or wake it back up.
///
/// Mirrors the controller sequencing the boot ROM uses: quiesce the
/// controller mode field, switch to the AHB command path, issue the vendor
/// command, then restore the original control word.
pub fn norflash_power_ctrl<B: RegisterBus, T: Timebase>(bus: &mut B, tb: &mut T, powerdown: bool) {
    let ctl_orig = bus.read32(SPI0_CTL);

    // Controller must pass through disabled mode unless already disabled
    // or write-only.
    let mode = ctl_orig & SPI0_CTL_MODE_MASK;
    if mode != 0 && mode != 2 {
        bus.modify32(SPI0_CTL, SPI0_CTL_MODE_MASK, 0);
        tb.busy_wait_us(1);
    }

    bus.write32(SPI0_CTL, SPI0_CTL_AHB_CMD_MODE);
    tb.busy_wait_us(1);

    if powerdown {
        // A flash left in 4x continuous-read mode ignores command bytes.
        if ctl_orig & SPI0_CTL_IO4X_MASK != 0 {
            send_command(bus, tb, CMD_EXIT_CONTINUOUS);
        }
        send_command(bus, tb, CMD_DEEP_POWER_DOWN);
    } else {
        send_command(bus, tb, CMD_RELEASE_POWER_DOWN);
    }
    tb.busy_wait_us(40);

    bus.modify32(SPI0_CTL, SPI0_CTL_MODE_MASK, 0);
    tb.busy_wait_us(1);

    bus.write32(SPI0_CTL, ctl_orig);
}

#[cfg(test)]
mod tests {
    use crate::mocks::MockSoc;

    use super::*;
    use crate::bus::RegisterBus;

    #[test]
    fn powerdown_restores_original_control_word() {
        let mut soc = MockSoc::new();
        let mut tb = soc.clone();
        soc.write32(SPI0_CTL, 0x0000_0401);
        norflash_power_ctrl(&mut soc, &mut tb, true);
        assert_eq!(soc.read32(SPI0_CTL), 0x0000_0401);
    }

    #[test]
    fn powerdown_sends_b9() {
        let mut soc = MockSoc::new();
        let mut tb = soc.clone();
        norflash_power_ctrl(&mut soc, &mut tb, true);
        assert_eq!(
            soc.spi_commands(),
            &[u32::from(CMD_DEEP_POWER_DOWN)],
            "plain 1x IO mode needs no continuous-mode exit"
        );
    }

    #[test]
    fn powerdown_exits_continuous_mode_first_in_4x_io() {
        let mut soc = MockSoc::new();
        let mut tb = soc.clone();
        soc.write32(SPI0_CTL, SPI0_CTL_IO4X_MASK);
        norflash_power_ctrl(&mut soc, &mut tb, true);
        assert_eq!(
            soc.spi_commands(),
            &[
                u32::from(CMD_EXIT_CONTINUOUS),
                u32::from(CMD_DEEP_POWER_DOWN)
            ]
        );
    }

    #[test]
    fn wake_sends_ab() {
        let mut soc = MockSoc::new();
        let mut tb = soc.clone();
        norflash_power_ctrl(&mut soc, &mut tb, false);
        assert_eq!(soc.spi_commands(), &[u32::from(CMD_RELEASE_POWER_DOWN)]);
    }
}
