//! # uscope-core
//!
//! Core library for `uscope_driver`: a user-space HIL (Hardware-In-the-Loop)
//! driver that mediates between a JSON-commanding control application over
//! TCP and an FPGA fabric of fCore soft-core processors.
//!
//! ## Architecture
//!
//! A [`dispatch::Dispatcher`] owns the live hardware state — the register
//! bus ([`bus::BusAccessor`], reached through an [`bridge::FpgaBridge`]),
//! the scope's DMA/acquisition configuration ([`scope::ScopeManager`]),
//! the HIL deployment state ([`hil::Deployer`]), the PS↔PL clock tree
//! ([`timing::TimingManager`]), and the emulation engine
//! ([`emulator::EmulationEngine`]) — and routes `{cmd, args}` command
//! envelopes to the endpoint family that owns them (spec.md §4.6).
//!
//! Wire framing and the TCP accept loop live in the `uscope-server` crate;
//! this crate is transport-agnostic.

pub mod bridge;
pub mod bus;
pub mod config;
pub mod dispatch;
pub mod emulator;
pub mod error;
pub mod hil;
pub mod scope;
pub mod timing;

pub use bridge::FpgaBridge;
pub use config::Config;
pub use dispatch::{CommandEnvelope, Dispatcher, ResponseEnvelope};
pub use error::{DriverError, DriverResult, ResponseCode};
pub use scope::ScopeManager;
pub use timing::TimingManager;

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
