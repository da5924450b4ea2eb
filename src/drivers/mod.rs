//! Actuator and converter drivers, hardware initialisation, and task helpers.

pub mod ads1115;
pub mod hw_init;
pub mod pump;
pub mod sdcard;
pub mod task_pin;
pub mod watchdog;
