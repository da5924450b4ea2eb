//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ControlCore / PumpService / ModeStore
//! ```
//!
//! Driven adapters (ADC, storage, event sinks) implement these traits.
//! The domain consumes them via generics, so it never touches hardware
//! directly.  The pump actuator port is `embedded_hal::pwm::SetDutyCycle`.

use crate::error::{SensorError, StorageError};

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port for the pressure transducer.
pub trait SensorPort {
    /// Voltage at the ADC pin for the latest conversion.  Must not block
    /// longer than one bus transaction.
    fn read_transducer_volts(&mut self) -> Result<f32, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ SD card / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage for the mode store and system config.
///
/// - Keys are namespaced to prevent collisions between subsystems.
/// - Write operations MUST replace the old value in one step; a reader
///   never sees a half-written blob.
pub trait StoragePort {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key.  Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    /// Check whether a key exists without reading it.
    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic millisecond clock.  Wraps at `u32::MAX`; consumers use
/// wrapping arithmetic.
pub trait ClockPort {
    fn now_ms(&self) -> u32;
}

// ───────────────────────────────────────────────────────────────
// Scheduler delegate (decouples the cadence engine from the tasks)
// ───────────────────────────────────────────────────────────────

/// Callback trait the [`Cadence`](crate::scheduler::Cadence) invokes when
/// a periodic slot comes due.
pub trait SchedulerDelegate {
    /// Called once per due slot, in slot order.
    fn on_slot_due(&mut self, slot: SlotKind, now_ms: u32);
}

/// Discriminant passed to [`SchedulerDelegate::on_slot_due`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    /// Acquisition + safety + outer loop (sampling period).
    Sample,
    /// Inner loop + pump write (inner period).
    Inner,
}
