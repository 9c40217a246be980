//! System power-state orchestration for the ATS2859.
//!
//! Decides when the device may leave its active state, walks it down
//! through S1 (peripheral quiesce), S2 (light sleep) and S3 (deep sleep,
//! radio alive), and back up again. Built from five pieces:
//!
//! - [`wakelock`]: "stay awake" holds + idle-time accounting
//! - [`wake_source`]: which physical events may (and did) wake the chip
//! - [`sleep`]: the register-level S2/S3 enter/exit protocols
//! - [`bt_sleep`]: deep-sleep timing negotiation with the radio controller
//! - [`standby`]: the polled state machine tying them together
//!
//! plus [`pm`] for the terminal power-off/reboot paths. All hardware access
//! goes through the `platform` crate's traits; everything here runs
//! unmodified against the mock SoC on a host.

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(unused_must_use)]
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_op_in_unsafe_fn)]
#![allow(clippy::doc_markdown)] // hex addresses and register names in doc comments
#![allow(clippy::must_use_candidate)]

mod fmt;

pub mod bt_sleep;
pub mod dvfs;
pub mod mocks;
pub mod pm;
pub mod sleep;
pub mod standby;
pub mod time;
pub mod wake_source;
pub mod wakelock;

pub use bt_sleep::BtSleepCoordinator;
pub use dvfs::{Dvfs, DvfsLevel};
pub use sleep::SleepSequencer;
pub use standby::{BtManager, PowerState, SleepBudget, Standby, SystemHooks, TwsRole};
pub use time::{RcStamp, Uptime, FOREVER_MS};
pub use wake_source::{WakeSource, WakeSourceSet, WakeupMode, WakeupSources};
pub use wakelock::{WakelockHolder, WakelockMask, Wakelocks};
