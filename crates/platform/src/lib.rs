//! Hardware boundary for the ATS2859 power-management subsystem.
//!
//! This crate owns everything that touches a physical register: the
//! register map, the bus/clock/watchdog traits the sequencing logic is
//! written against, the battery-backed persisted state, the boot-flash
//! power commands, and a scriptable mock SoC for host tests.
//!
//! # Architecture Layers
//!
//! ```text
//! Orchestrator (power crate - state machine, sequencing)
//!         ↓
//! Hardware boundary (this crate - traits + register map)
//!         ↓
//! Physical SoC (volatile MMIO, feature "hardware")
//! ```
//!
//! # Features
//!
//! - `std`: expose the mock SoC to downstream test suites
//! - `hardware`: volatile MMIO register bus for the physical target
//! - `defmt` / `log`: logging backends (hardware / host respectively)

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
#![allow(clippy::must_use_candidate)] // hardware accessors — callers decide

mod fmt;

pub mod bus;
pub mod flash;
pub mod mocks;
pub mod persisted;
pub mod regs;
pub mod supply;
pub mod timebase;
pub mod watchdog;

pub use bus::RegisterBus;
pub use supply::PowerSupply;
pub use timebase::Timebase;
pub use watchdog::Watchdog;
