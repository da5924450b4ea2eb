//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements   | Connects to                          |
//! |------------|--------------|--------------------------------------|
//! | `console`  | -            | Serial console lines → PumpService   |
//! | `hardware` | SensorPort   | ADS1115 over I²C                     |
//! | `log_sink` | EventSink    | Serial log output                    |
//! | `storage`  | StoragePort  | SD card (VFS files) / in-memory map  |
//! | `time`     | ClockPort    | ESP32 system timer / `Instant`       |

pub mod console;
pub mod hardware;
pub mod log_sink;
pub mod storage;
pub mod time;
