//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing application events to the logger
//! (UART / USB-CDC in production).  Telemetry goes out as one JSON line
//! at debug level so it can be scraped without flooding the console.

use log::{debug, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Telemetry(t) => match t.to_json() {
                Ok(line) => debug!("TELEM | {}", line),
                Err(e) => warn!("TELEM | encode failed: {}", e),
            },
            AppEvent::PumpStarted => info!("PUMP  | started"),
            AppEvent::PumpStopped => info!("PUMP  | stopped"),
            AppEvent::ParamsApplied(p) => {
                info!(
                    "PARAM | {:?} {} bpm {}/{} notch {} base {}",
                    p.pump_mode,
                    p.heart_rate_bpm,
                    p.systolic_pressure,
                    p.diastolic_pressure,
                    p.notch_pressure,
                    p.base_pressure,
                );
            }
            AppEvent::FaultDetected(flags) => {
                warn!("FAULT | detected, flags=0b{:08b}", flags);
            }
            AppEvent::FaultCleared => {
                info!("FAULT | all cleared");
            }
            AppEvent::StorageResult { kind, ok } => match ok {
                Ok(()) => info!("STORE | {:?} ok", kind),
                Err(e) => warn!("STORE | {:?} failed: {}", kind, e),
            },
        }
    }
}
