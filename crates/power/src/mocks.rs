//! Mock collaborators for testing the orchestrator.
//!
//! The hardware-side doubles (`MockSoc`, `MockSupply`) live in the
//! platform crate; these cover the in-process collaborator traits defined
//! here: DVFS, the Bluetooth stack facts and the system hooks.

#![cfg(any(test, feature = "std"))]

use core::cell::Cell;

use crate::dvfs::{Dvfs, DvfsLevel};
use crate::standby::{BtManager, SystemHooks, TwsRole};

/// Scriptable [`Dvfs`] double recording every level change.
pub struct MockDvfs {
    current: DvfsLevel,
    changes: std::vec::Vec<(DvfsLevel, bool)>,
}

impl Default for MockDvfs {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDvfs {
    /// Starts at the normal tier.
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: DvfsLevel::Normal,
            changes: std::vec::Vec::new(),
        }
    }

    /// Every `(level, set)` request in order; `set` is false for unsets.
    #[must_use]
    pub fn changes(&self) -> &[(DvfsLevel, bool)] {
        &self.changes
    }
}

impl Dvfs for MockDvfs {
    fn set_level(&mut self, level: DvfsLevel, _reason: &str) {
        self.current = level;
        self.changes.push((level, true));
    }

    fn unset_level(&mut self, level: DvfsLevel, _reason: &str) {
        self.changes.push((level, false));
    }

    fn current_level(&self) -> DvfsLevel {
        self.current
    }
}

/// Scriptable [`BtManager`] double.
pub struct MockBt {
    connected: Cell<u8>,
    role: Cell<TwsRole>,
    link_stable: Cell<bool>,
}

impl Default for MockBt {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBt {
    /// No connections, no TWS pair, link stable.
    #[must_use]
    pub fn new() -> Self {
        Self {
            connected: Cell::new(0),
            role: Cell::new(TwsRole::None),
            link_stable: Cell::new(true),
        }
    }

    /// Set the connected-device count.
    pub fn set_connected_count(&self, count: u8) {
        self.connected.set(count);
    }

    /// Set the TWS role.
    pub fn set_tws_role(&self, role: TwsRole) {
        self.role.set(role);
    }

    /// Set link stability.
    pub fn set_tws_link_stable(&self, stable: bool) {
        self.link_stable.set(stable);
    }
}

impl BtManager for MockBt {
    fn connected_count(&self) -> u8 {
        self.connected.get()
    }

    fn tws_role(&self) -> TwsRole {
        self.role.get()
    }

    fn tws_link_stable(&self) -> bool {
        self.link_stable.get()
    }
}

/// Counting [`SystemHooks`] double.
#[derive(Default)]
pub struct MockHooks {
    suspends: u32,
    resumes: u32,
    poweroffs: u32,
}

impl MockHooks {
    /// All counters zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `suspend_peripherals` calls so far.
    #[must_use]
    pub fn suspend_count(&self) -> u32 {
        self.suspends
    }

    /// `resume_peripherals` calls so far.
    #[must_use]
    pub fn resume_count(&self) -> u32 {
        self.resumes
    }

    /// `request_poweroff` calls so far.
    #[must_use]
    pub fn poweroff_requests(&self) -> u32 {
        self.poweroffs
    }
}

impl SystemHooks for MockHooks {
    fn suspend_peripherals(&mut self) {
        self.suspends = self.suspends.wrapping_add(1);
    }

    fn resume_peripherals(&mut self) {
        self.resumes = self.resumes.wrapping_add(1);
    }

    fn request_poweroff(&mut self) {
        self.poweroffs = self.poweroffs.wrapping_add(1);
    }
}
