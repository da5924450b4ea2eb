//! Outbound application events.
//!
//! The control task, the service and the storage worker emit these through
//! the [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them (log to serial, notify a transport).

use serde::Serialize;

use super::commands::StorageCommandKind;
use crate::error::Error;
use crate::params::PumpParameters;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// Periodic telemetry snapshot.
    Telemetry(TelemetrySnapshot),

    /// The start flag went high and a fresh cycle began.
    PumpStarted,

    /// The start flag went low; pump idled, PID state cleared.
    PumpStopped,

    /// A new parameter block became active.
    ParamsApplied(PumpParameters),

    /// One or more safety faults were raised (bitmask of newly set bits).
    FaultDetected(u8),

    /// All safety faults have been cleared.
    FaultCleared,

    /// A persistence command finished.
    StorageResult {
        kind: StorageCommandKind,
        ok: Result<(), Error>,
    },
}

/// Point-in-time state for the transport, serialised as JSON.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    /// Filtered pressure (mmHg).
    pub pressure: f32,
    /// Smoothed flow.
    pub flow: f32,
    /// Duty last written to the pump.
    pub pwm: u16,
    /// Setpoint the outer loop tracked this period (mmHg).
    pub setpoint: f32,
    /// Active safety faults.
    pub faults: u8,
    pub params: PumpParameters,
}

impl TelemetrySnapshot {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
