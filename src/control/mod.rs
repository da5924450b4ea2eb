//! Setpoint synthesis and the cascaded pressure controller.

pub mod cascade;
pub mod pid;
pub mod waveform;
