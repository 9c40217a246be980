//! ATS2859 ("Woodpecker") power-management register map.
//!
//! Addresses and bit layouts follow the SoC datasheet register listing.
//! Only the registers touched by the standby/sleep subsystem are defined
//! here; peripheral drivers carry their own blocks.

// ── Block bases ──────────────────────────────────────────────────────────────

/// Reset/module-clock unit.
pub const RMU_REG_BASE: u32 = 0xC000_0000;
/// Clock-management unit, analog section (oscillators, PLLs).
pub const CMU_ANALOG_REG_BASE: u32 = 0xC000_0100;
/// Clock-management unit, digital section (muxes, dividers, gates).
pub const CMU_DIGITAL_REG_BASE: u32 = 0xC000_1000;
/// Power-management unit (always-on domain).
pub const PMU_REG_BASE: u32 = 0xC002_0000;
/// SPI0 controller (boot NOR flash).
pub const SPI0_REG_BASE: u32 = 0xC011_0000;
/// RTC block (battery-backed register file lives here).
pub const RTC_REG_BASE: u32 = 0xC012_0000;

// ── PMU registers ────────────────────────────────────────────────────────────

/// Voltage output control 0 (AVDD, VDD, SEG_LED rails).
pub const VOUT_CTL0: u32 = PMU_REG_BASE;
/// Voltage output control 1 (SPLL_AVDD, VD15 DCDC/voltage select).
pub const VOUT_CTL1: u32 = PMU_REG_BASE + 0x04;
/// Bandgap reference control.
pub const BDG_CTL: u32 = PMU_REG_BASE + 0x08;
/// Miscellaneous system settings (OSCVDD pull-down among them).
pub const SYSTEM_SET: u32 = PMU_REG_BASE + 0x0C;
/// Power-domain control: bit0 = work enable, bit1 = S3BT, bit2 = S3.
pub const PMU_POWER_CTL: u32 = PMU_REG_BASE + 0x10;
/// Wakeup-source enable register.
pub const PMU_WKEN_CTL: u32 = PMU_REG_BASE + 0x14;
/// Wakeup-source pending latch (write-1-to-clear).
pub const PMU_WAKE_PD: u32 = PMU_REG_BASE + 0x18;
/// On/off key status + long-press time select (bits 10:8).
pub const PMU_ONOFF_KEY: u32 = PMU_REG_BASE + 0x1C;
/// Rail discharge (pull-down) control for fast power-off.
pub const SPD_CTL: u32 = PMU_REG_BASE + 0x20;
/// DC-DC converter control 1.
pub const DCDC_CTL1: u32 = PMU_REG_BASE + 0x24;
/// DC-DC converter control 2.
pub const DCDC_CTL2: u32 = PMU_REG_BASE + 0x28;
/// PMU ADC control (battery / temperature sensing channels).
pub const PMUADC_CTL: u32 = PMU_REG_BASE + 0x2C;

/// `PMU_POWER_CTL` bit0: work-domain enable. Cleared to drop into S3/S4.
pub const POWER_CTL_WORK_EN: u32 = 1 << 0;
/// `PMU_POWER_CTL` bit1: S3BT power-domain transition (CPU off, BT alive).
pub const POWER_CTL_S3BT_EN: u32 = 1 << 1;
/// `PMU_POWER_CTL` bit2: full S3 power-domain transition.
pub const POWER_CTL_S3_EN: u32 = 1 << 2;

/// `PMU_ONOFF_KEY` bit0: key currently pressed (raw, unlatched).
pub const ONOFF_KEY_PRESSED: u32 = 1 << 0;
/// `PMU_ONOFF_KEY` long-press time select field shift (bits 10:8).
pub const ONOFF_KEY_TIME_SHIFT: u32 = 8;
/// `PMU_ONOFF_KEY` long-press time select field mask.
pub const ONOFF_KEY_TIME_MASK: u32 = 0x7 << ONOFF_KEY_TIME_SHIFT;

/// `SPD_CTL`: VCC pull-down enable for rapid discharge.
pub const SPD_CTL_VCC_PD: u32 = 1 << 0;
/// `SPD_CTL`: VD15 pull-down enable for rapid discharge.
pub const SPD_CTL_VD15_PD: u32 = 1 << 2;

// ── PMU_WKEN_CTL bits (enable view) ──────────────────────────────────────────

/// Long on/off key press wake enable.
pub const WKEN_ONOFF_LONG: u32 = 1 << 0;
/// Short on/off key press wake enable.
pub const WKEN_ONOFF_SHORT: u32 = 1 << 1;
/// Reset-pin wake enable.
pub const WKEN_RESET: u32 = 1 << 2;
/// Battery-insertion wake enable.
pub const WKEN_BAT: u32 = 1 << 3;
/// RTC alarm wake enable.
pub const WKEN_ALARM: u32 = 1 << 4;
/// WIO0 pad wake enable.
pub const WKEN_WIO0: u32 = 1 << 5;
/// WIO1 pad wake enable.
pub const WKEN_WIO1: u32 = 1 << 6;
/// WIO2 pad wake enable.
pub const WKEN_WIO2: u32 = 1 << 7;
/// Bluetooth controller wake enable.
pub const WKEN_BT: u32 = 1 << 8;
/// Remote-control (IR) channel 0 wake enable.
pub const WKEN_REMOTE0: u32 = 1 << 9;
/// Remote-control (IR) channel 1 wake enable.
pub const WKEN_REMOTE1: u32 = 1 << 10;
/// Special IRQ line 0 wake enable.
pub const WKEN_SIRQ0: u32 = 1 << 11;
/// Special IRQ line 1 wake enable.
pub const WKEN_SIRQ1: u32 = 1 << 12;
/// All programmable wake-enable bits.
pub const WKEN_ALL_MASK: u32 = 0x1FFF;

// ── PMU_WAKE_PD bits (pending view — layout differs from the enable view) ────

/// Short on/off press pending.
pub const WAKE_PD_ONOFF_SHORT: u32 = 1 << 0;
/// Long on/off press pending.
pub const WAKE_PD_ONOFF_LONG: u32 = 1 << 1;
/// Reset-pin pending.
pub const WAKE_PD_RESET: u32 = 1 << 2;
/// Battery-insertion pending.
pub const WAKE_PD_BAT: u32 = 1 << 3;
/// RTC alarm pending.
pub const WAKE_PD_ALARM: u32 = 1 << 4;
/// WIO0 pad pending (DC5V plug detect on this board).
pub const WAKE_PD_WIO0: u32 = 1 << 5;
/// WIO1 pad pending.
pub const WAKE_PD_WIO1: u32 = 1 << 6;
/// WIO2 pad pending.
pub const WAKE_PD_WIO2: u32 = 1 << 7;
/// Bluetooth controller wake pending.
pub const WAKE_PD_BT: u32 = 1 << 8;
/// Remote-control (IR) pending.
pub const WAKE_PD_REMOTE: u32 = 1 << 9;
/// Special IRQ line 0 pending.
pub const WAKE_PD_SIRQ0: u32 = 1 << 11;
/// Special IRQ line 1 pending.
pub const WAKE_PD_SIRQ1: u32 = 1 << 12;

/// Full pending field width.
pub const WAKE_PD_FIELD_MASK: u32 = 0x003F_FFFF;
/// Bits 10 and 15:13 are reserved and must never be written as 1.
pub const WAKE_PD_RESERVED_MASK: u32 = (1 << 10) | (0x7 << 13);
/// Pending bits that may legally be written back for W1C acknowledge.
pub const WAKE_PD_WRITABLE_MASK: u32 = WAKE_PD_FIELD_MASK & !WAKE_PD_RESERVED_MASK;

// ── CMU / RMU registers ──────────────────────────────────────────────────────

/// System PLL control (high-speed PLL feeding SPI/peripheral clocks).
pub const SPLL_CTL: u32 = CMU_ANALOG_REG_BASE + 0x10;
/// Core PLL analog control.
pub const CORE_PLL_CTL: u32 = CMU_ANALOG_REG_BASE + 0x14;
/// Core PLL digital control word (enable bit 7 + frequency select).
pub const CMU_COREPLL_CTL: u32 = CORE_PLL_CTL;
/// Audio PLL0 control.
pub const AUDIO_PLL0_CTL: u32 = CMU_ANALOG_REG_BASE + 0x18;
/// Audio PLL1 control.
pub const AUDIO_PLL1_CTL: u32 = CMU_ANALOG_REG_BASE + 0x1C;

/// System clock select (bits 1:0) and core clock divider (bits 7:4).
pub const CMU_SYSCLK: u32 = CMU_DIGITAL_REG_BASE;
/// Peripheral device clock enables, group 0.
pub const CMU_DEVCLKEN0: u32 = CMU_DIGITAL_REG_BASE + 0x08;
/// Peripheral device clock enables, group 1.
pub const CMU_DEVCLKEN1: u32 = CMU_DIGITAL_REG_BASE + 0x0C;
/// SPI0 clock source/divider select.
pub const CMU_SPI0CLK: u32 = CMU_DIGITAL_REG_BASE + 0x20;
/// `CMU_SPI0CLK` source + divider field (bits 9:0).
pub const SPI0CLK_FIELD_MASK: u32 = 0x3FF;
/// `CMU_SPI0CLK` field value: HOSC (24 MHz), divider 1.
pub const SPI0CLK_SEL_HOSC: u32 = 0x1 << 8;
/// `CMU_SPI0CLK` field value: fixed CK48M tap, divider 1.
pub const SPI0CLK_SEL_CK48M: u32 = 0x3 << 8;
/// Memory-bank clock enables.
pub const CMU_MEMCLKEN: u32 = CMU_DIGITAL_REG_BASE + 0xB0;

/// Module reset control, group 0.
pub const RMU_MRCR0: u32 = RMU_REG_BASE;
/// Module reset control, group 1.
pub const RMU_MRCR1: u32 = RMU_REG_BASE + 0x04;

/// `CMU_SYSCLK` clock-select values (bits 1:0).
pub const SYSCLK_CLKSEL_32K: u32 = 0x0;
/// HOSC: the fixed 24 MHz reference crystal.
pub const SYSCLK_CLKSEL_HOSC: u32 = 0x1;
/// Core PLL output.
pub const SYSCLK_CLKSEL_COREPLL: u32 = 0x2;
/// Fixed 64 MHz tap.
pub const SYSCLK_CLKSEL_64M: u32 = 0x3;
/// Core clock divider field shift within `CMU_SYSCLK`.
pub const SYSCLK_CPUDIV_SHIFT: u32 = 4;
/// Core clock divider field mask.
pub const SYSCLK_CPUDIV_MASK: u32 = 0xF << SYSCLK_CPUDIV_SHIFT;

/// `CMU_COREPLL_CTL` enable bit.
pub const COREPLL_CTL_EN: u32 = 1 << 7;

/// `CMU_MEMCLKEN` bits 31:11 gate DSP/FFT/cache banks; RAM0..RAM6 and the
/// ROM banks (bits 10:0) must stay clocked through deep sleep.
pub const MEMCLKEN_NONESSENTIAL_MASK: u32 = 0xFFFF_F800;

// ── WIO pads (shared with GPIO block) ────────────────────────────────────────

/// WIO0 pad control/status; WIO1/WIO2 follow at +0x04 steps.
pub const WIO0_CTL: u32 = 0xC009_0200;
/// WIO data (input level) bit within `WIOx_CTL`.
pub const WIO_CTL_DAT: u32 = 16;
/// WIO wake-trigger voltage select field shift (bits 23:21).
pub const WIO_CTL_WKTRIG_SHIFT: u32 = 21;
/// WIO wake-trigger voltage select field mask.
pub const WIO_CTL_WKTRIG_MASK: u32 = 0x7 << WIO_CTL_WKTRIG_SHIFT;
/// Trigger select value: wake on high level.
pub const WIO_WKTRIG_HIGH: u32 = 0x3;
/// Trigger select value: wake on low level.
pub const WIO_WKTRIG_LOW: u32 = 0x4;

// ── Watchdog / RTC backup ────────────────────────────────────────────────────

/// Watchdog control; writing [`WD_CTL_RESET_NOW`] forces an immediate reset.
pub const WD_CTL: u32 = 0xC012_001C;
/// `WD_CTL` value that fires the watchdog reset immediately.
pub const WD_CTL_RESET_NOW: u32 = 0x10;

/// RTC-domain register-update handshake (see `persisted`).
pub const RTC_REGUPDATE: u32 = RTC_REG_BASE + 0x04;
/// Battery-backed scratch register: product flag.
pub const RTC_BAK2: u32 = RTC_REG_BASE + 0x38;
/// Battery-backed scratch register: reboot reason.
pub const RTC_BAK3: u32 = RTC_REG_BASE + 0x3C;

/// Free-running 3.2 kHz RC counter, read as milliseconds, 28 bits wide.
/// The only timestamp source that survives S2/S3 clock-domain changes.
pub const RC_TIMER_CNT: u32 = 0xC017_601C;

// ── Peripheral clock identities (DEVCLKEN0/1 bit indices) ────────────────────

/// One peripheral clock-enable line. The numeric value is the bit index
/// across the `CMU_DEVCLKEN0`/`CMU_DEVCLKEN1` pair (0..63).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ClockId {
    /// DMA engine.
    Dma = 1,
    /// Boot-flash SPI controller.
    Spi0 = 4,
    /// SPI0 instruction/data cache.
    Spi0Cache = 6,
    /// Console UART.
    Uart0 = 10,
    /// Timer0 (system tick while sleeping).
    Timer0 = 19,
    /// BT baseband 3.2 kHz domain.
    BtBb3k2 = 32,
    /// BT baseband digital domain.
    BtBbDig = 33,
    /// BT baseband AHB interface.
    BtBbAhb = 34,
    /// BT modem AHB interface.
    BtModemAhb = 35,
    /// BT modem digital domain.
    BtModemDig = 36,
    /// BT modem RF interface.
    BtModemIntf = 37,
    /// BT radio front-end.
    BtRf = 38,
}

impl ClockId {
    /// Bit index across the 64-bit DEVCLKEN0/1 pair.
    #[must_use]
    pub const fn bit(self) -> u8 {
        self as u8
    }
}

/// Clocks that must survive S3: console UART, DMA, the sleep tick timer,
/// the boot flash controller + cache, and the whole BT clock tree — the
/// radio keeps running through CPU deep sleep.
pub const DEEP_SLEEP_CLOCK_ALLOWLIST: [ClockId; 12] = [
    ClockId::Uart0,
    ClockId::Dma,
    ClockId::Timer0,
    ClockId::Spi0Cache,
    ClockId::Spi0,
    ClockId::BtBb3k2,
    ClockId::BtBbDig,
    ClockId::BtBbAhb,
    ClockId::BtModemAhb,
    ClockId::BtModemDig,
    ClockId::BtModemIntf,
    ClockId::BtRf,
];
