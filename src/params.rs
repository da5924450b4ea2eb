//! Pump operating parameters, the unit of configuration exchange.
//!
//! Exactly one [`PumpParameters`] block is active at a time.  It is written
//! by the command path (transport, console, mode loads) and read by the
//! waveform generator once per cardiac cycle.  Every write goes through
//! [`PumpParameters::validate`]; a rejected block leaves the active one
//! untouched.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Operating mode tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PumpMode {
    /// Track the synthesized cardiac waveform.
    #[default]
    Automatic,
    /// Hold the setpoint at `base_pressure`.
    Manual,
}

/// Clinical-style pump configuration.  Pressures in mmHg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PumpParameters {
    /// Beats per minute; sets the cycle period.
    pub heart_rate_bpm: u16,
    pub systolic_pressure: u16,
    pub diastolic_pressure: u16,
    /// Share of the cycle spent in systole (percent).
    pub systolic_period_pct: u8,
    /// Share of the cycle spent in diastole (percent).
    pub diastolic_period_pct: u8,
    /// Pressure at the end of systole (dicrotic notch).
    pub notch_pressure: u16,
    /// Offset of the systolic peak from cycle start (ms).
    pub systolic_peak_time_ms: u16,
    /// Offset of the diastolic peak from the end of systole (ms).
    pub diastolic_peak_time_ms: u16,
    /// Target flow, reported with telemetry.
    pub flow_rate: u16,
    pub pump_mode: PumpMode,
    pub start_pump: bool,
    /// Setpoint used in manual mode and before the first cycle.
    pub base_pressure: u16,
}

impl Default for PumpParameters {
    fn default() -> Self {
        Self {
            heart_rate_bpm: 80,
            systolic_pressure: 120,
            diastolic_pressure: 80,
            systolic_period_pct: 60,
            diastolic_period_pct: 40,
            notch_pressure: 60,
            systolic_peak_time_ms: 150,
            diastolic_peak_time_ms: 100,
            flow_rate: 80,
            pump_mode: PumpMode::Automatic,
            start_pump: false,
            base_pressure: 80,
        }
    }
}

/// Upper bound for every pressure field (mmHg).
pub const MAX_PRESSURE_MMHG: u16 = 300;

impl PumpParameters {
    /// Cycle period in milliseconds (`60 / heart rate`).
    pub fn cycle_ms(&self) -> f32 {
        60_000.0 / f32::from(self.heart_rate_bpm.max(1))
    }

    /// Systolic phase duration in milliseconds.
    pub fn systolic_ms(&self) -> f32 {
        self.cycle_ms() * f32::from(self.systolic_period_pct) / 100.0
    }

    /// Diastolic phase duration in milliseconds.
    pub fn diastolic_ms(&self) -> f32 {
        self.cycle_ms() * f32::from(self.diastolic_period_pct) / 100.0
    }

    /// Range-check every field.  Called at each write boundary.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(20..=200).contains(&self.heart_rate_bpm) {
            return Err(ConfigError::ValidationFailed(
                "heart_rate_bpm must be 20–200",
            ));
        }
        for p in [
            self.systolic_pressure,
            self.diastolic_pressure,
            self.notch_pressure,
            self.base_pressure,
        ] {
            if p > MAX_PRESSURE_MMHG {
                return Err(ConfigError::ValidationFailed(
                    "pressures must be 0–300 mmHg",
                ));
            }
        }
        if self.systolic_pressure <= self.diastolic_pressure {
            return Err(ConfigError::ValidationFailed(
                "systolic_pressure must exceed diastolic_pressure",
            ));
        }
        if self.notch_pressure >= self.systolic_pressure {
            return Err(ConfigError::ValidationFailed(
                "notch_pressure must be below systolic_pressure",
            ));
        }
        if !(10..=90).contains(&self.systolic_period_pct)
            || !(10..=90).contains(&self.diastolic_period_pct)
        {
            return Err(ConfigError::ValidationFailed(
                "phase percentages must be 10–90",
            ));
        }
        if u16::from(self.systolic_period_pct) + u16::from(self.diastolic_period_pct) != 100 {
            return Err(ConfigError::ValidationFailed(
                "systolic + diastolic percentages must total 100",
            ));
        }
        let peak = f32::from(self.systolic_peak_time_ms);
        if self.systolic_peak_time_ms == 0 || peak >= self.systolic_ms() {
            return Err(ConfigError::ValidationFailed(
                "systolic_peak_time_ms must fall inside systole",
            ));
        }
        let dia_peak = f32::from(self.diastolic_peak_time_ms);
        if self.diastolic_peak_time_ms == 0 || dia_peak >= self.diastolic_ms() {
            return Err(ConfigError::ValidationFailed(
                "diastolic_peak_time_ms must fall inside diastole",
            ));
        }
        if self.flow_rate > 1000 {
            return Err(ConfigError::ValidationFailed("flow_rate must be 0–1000"));
        }
        Ok(())
    }
}

/// Partial update received from a collaborator.  Absent fields keep the
/// current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct ParamUpdate {
    pub heart_rate_bpm: Option<u16>,
    pub systolic_pressure: Option<u16>,
    pub diastolic_pressure: Option<u16>,
    pub systolic_period_pct: Option<u8>,
    pub diastolic_period_pct: Option<u8>,
    pub notch_pressure: Option<u16>,
    pub systolic_peak_time_ms: Option<u16>,
    pub diastolic_peak_time_ms: Option<u16>,
    pub flow_rate: Option<u16>,
    pub pump_mode: Option<PumpMode>,
    pub start_pump: Option<bool>,
    pub base_pressure: Option<u16>,
}

impl ParamUpdate {
    /// Overlay the present fields onto `base`.
    pub fn apply_to(&self, base: PumpParameters) -> PumpParameters {
        PumpParameters {
            heart_rate_bpm: self.heart_rate_bpm.unwrap_or(base.heart_rate_bpm),
            systolic_pressure: self.systolic_pressure.unwrap_or(base.systolic_pressure),
            diastolic_pressure: self.diastolic_pressure.unwrap_or(base.diastolic_pressure),
            systolic_period_pct: self.systolic_period_pct.unwrap_or(base.systolic_period_pct),
            diastolic_period_pct: self.diastolic_period_pct.unwrap_or(base.diastolic_period_pct),
            notch_pressure: self.notch_pressure.unwrap_or(base.notch_pressure),
            systolic_peak_time_ms: self
                .systolic_peak_time_ms
                .unwrap_or(base.systolic_peak_time_ms),
            diastolic_peak_time_ms: self
                .diastolic_peak_time_ms
                .unwrap_or(base.diastolic_peak_time_ms),
            flow_rate: self.flow_rate.unwrap_or(base.flow_rate),
            pump_mode: self.pump_mode.unwrap_or(base.pump_mode),
            start_pump: self.start_pump.unwrap_or(base.start_pump),
            base_pressure: self.base_pressure.unwrap_or(base.base_pressure),
        }
    }
}
