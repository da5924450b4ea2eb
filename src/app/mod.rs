//! Application core: control loop orchestration, parameter and mode
//! management.
//!
//! Hardware and storage are reached only through the **port traits** in
//! [`ports`], so everything here runs unchanged against mock adapters on
//! the host.

pub mod commands;
pub mod controller;
pub mod events;
pub mod modes;
pub mod ports;
pub mod service;
pub mod shared;
pub mod storage_worker;
