//! Wakelock registry.
//!
//! Subsystems that need the device to stay fully awake (audio streaming, an
//! in-flight OTA, a pressed key) hold a wakelock. The standby state machine
//! reads two aggregates: which holders are active, and how long the registry
//! has been completely free.
//!
//! Holders acquire and release from thread and interrupt context alike, so
//! the registry state sits behind a critical-section blocking mutex rather
//! than any schedulable lock.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

use crate::time::Uptime;

/// The fixed set of subsystems allowed to hold the device awake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum WakelockHolder {
    /// Key scan / touch input activity.
    Input = 0,
    /// Un-drained inter-module message queue.
    Message = 1,
    /// Active audio stream.
    Media = 2,
    /// Bluetooth event being serviced.
    BtEvent = 3,
    /// USB device session.
    UsbDevice = 4,
    /// Display/LED animation in progress.
    Display = 5,
    /// Firmware update in flight.
    Ota = 6,
    /// Held by the standby machine itself across the S2 exit path.
    WakeUp = 7,
}

impl WakelockHolder {
    const fn mask(self) -> u8 {
        1u8.wrapping_shl(self as u32)
    }
}

/// Bitmask over [`WakelockHolder`], for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WakelockMask(pub u8);

impl WakelockMask {
    /// No holder active.
    pub const NONE: WakelockMask = WakelockMask(0);

    /// True if no holder is active.
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True if `holder` is in the mask.
    #[must_use]
    pub fn contains(self, holder: WakelockHolder) -> bool {
        self.0 & holder.mask() != 0
    }
}

#[derive(Default)]
struct Inner {
    held: u8,
    /// Tick at which the held set last became empty. Meaningless while any
    /// lock is held.
    free_since: Uptime,
}

/// Registry of outstanding wakelocks plus free-time accounting.
pub struct Wakelocks {
    inner: Mutex<CriticalSectionRawMutex, RefCell<Inner>>,
}

impl Wakelocks {
    /// Fresh registry: nothing held, free-time baseline at `now`.
    #[must_use]
    pub fn new(now: Uptime) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Inner {
                held: 0,
                free_since: now,
            })),
        }
    }

    /// Mark `holder` active. Idempotent per holder.
    pub fn acquire(&self, holder: WakelockHolder) {
        self.inner.lock(|inner| {
            inner.borrow_mut().held |= holder.mask();
        });
    }

    /// Mark `holder` inactive. The free-time baseline resets exactly when
    /// the last active holder releases.
    pub fn release(&self, holder: WakelockHolder, now: Uptime) {
        self.inner.lock(|inner| {
            let mut inner = inner.borrow_mut();
            let was_held = inner.held != 0;
            inner.held &= !holder.mask();
            if was_held && inner.held == 0 {
                inner.free_since = now;
            }
        });
    }

    /// Currently active holders.
    #[must_use]
    pub fn held(&self) -> WakelockMask {
        self.inner.lock(|inner| WakelockMask(inner.borrow().held))
    }

    /// Milliseconds the registry has been completely free; 0 while any
    /// holder is active. Wrap-safe across the 32-bit tick.
    #[must_use]
    pub fn free_time(&self, now: Uptime) -> u32 {
        self.inner.lock(|inner| {
            let inner = inner.borrow();
            if inner.held != 0 {
                0
            } else {
                now.elapsed_since(inner.free_since)
            }
        })
    }
}
