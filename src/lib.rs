//! PulsePump firmware library.
//!
//! Exposes the pure-logic modules for integration testing and host-side
//! simulation.  All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod control;
pub mod drivers;
pub mod error;
pub mod params;
pub mod pins;
pub mod runtime;
pub mod safety;
pub mod scheduler;
pub mod sensors;
pub mod sim;
