//! Pressure transducer channel: calibration, plausibility gate and Kalman
//! smoothing.
//!
//! The transducer sits behind a resistive divider into the ADS1115:
//!
//! ```text
//! Transducer out ──[R1]──┬── ADS1115 A0
//!                        │
//!                       [R2]      ratio = R2 / (R1 + R2)
//!                        │
//!                       GND
//! ```
//!
//! Samples that are NaN, infinite, or whose transducer voltage lies more than
//! `fault_margin_volts` outside the observed span are rejected.  A rejected
//! sample never reaches the Kalman filter; the last good estimate is held
//! and the reject streak grows until the safety supervisor calls it stale.

use serde::{Deserialize, Serialize};

use super::kalman::KalmanFilter;
use crate::error::{ConfigError, SensorError};

/// Linear transducer voltage → mmHg mapping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationModel {
    /// Divider ratio between transducer output and ADC pin.
    pub divider_ratio: f32,
    /// Transducer voltage at zero pressure.
    pub vout_min: f32,
    /// Highest transducer voltage seen during calibration.
    pub vout_max: f32,
    /// Clamp floor (mmHg).
    pub p_min: f32,
    /// Clamp ceiling (mmHg).
    pub p_max: f32,
    /// mmHg per volt above `vout_min`.
    pub scale_per_volt: f32,
    /// Tolerance outside `[vout_min, vout_max]` before a sample is rejected.
    pub fault_margin_volts: f32,
}

impl Default for CalibrationModel {
    fn default() -> Self {
        Self {
            divider_ratio: 0.6687,
            vout_min: 0.992,
            vout_max: 2.8481,
            p_min: 0.0,
            p_max: 750.062,
            scale_per_volt: 200.0,
            fault_margin_volts: 0.25,
        }
    }
}

impl CalibrationModel {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.divider_ratio > 0.0 && self.divider_ratio <= 1.0) {
            return Err(ConfigError::ValidationFailed("divider_ratio must be in (0, 1]"));
        }
        if !(self.vout_max > self.vout_min) {
            return Err(ConfigError::ValidationFailed("vout_max must exceed vout_min"));
        }
        if !(self.p_max > self.p_min) {
            return Err(ConfigError::ValidationFailed("p_max must exceed p_min"));
        }
        if !(self.scale_per_volt > 0.0) {
            return Err(ConfigError::ValidationFailed("scale_per_volt must be positive"));
        }
        if !(self.fault_margin_volts >= 0.0) {
            return Err(ConfigError::ValidationFailed(
                "fault_margin_volts must be non-negative",
            ));
        }
        Ok(())
    }

    /// Convert the voltage at the ADC pin to pressure, clamped to
    /// `[p_min, p_max]`.
    pub fn to_pressure(&self, adc_volts: f32) -> Result<f32, SensorError> {
        if !adc_volts.is_finite() {
            return Err(SensorError::NotFinite);
        }
        let transducer_volts = adc_volts / self.divider_ratio;
        if transducer_volts < self.vout_min - self.fault_margin_volts
            || transducer_volts > self.vout_max + self.fault_margin_volts
        {
            return Err(SensorError::OutOfRange);
        }
        let mmhg = (transducer_volts - self.vout_min) * self.scale_per_volt;
        Ok(mmhg.clamp(self.p_min, self.p_max))
    }
}

/// Outcome of one pressure sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PressureReading {
    /// Calibrated, unfiltered pressure; `None` when the sample was rejected.
    pub raw_mmhg: Option<f32>,
    /// Kalman estimate (held at the last good value on rejection).
    pub filtered_mmhg: f32,
    /// Rejections in a row, including this sample.
    pub reject_streak: u16,
    /// At least one sample has been accepted since boot.  Until then
    /// `filtered_mmhg` is the filter's seed, not a measurement.
    pub primed: bool,
}

/// Pressure path of the acquisition task.  Owns the Kalman state.
pub struct PressureChannel {
    cal: CalibrationModel,
    kalman: KalmanFilter,
    initial_covariance: f32,
    reject_streak: u16,
    primed: bool,
}

impl PressureChannel {
    pub fn new(cal: CalibrationModel, kalman: KalmanFilter) -> Self {
        Self {
            cal,
            initial_covariance: kalman.error_covariance(),
            kalman,
            reject_streak: 0,
            primed: false,
        }
    }

    /// Process one ADC read.
    pub fn process(&mut self, adc: Result<f32, SensorError>) -> PressureReading {
        match adc.and_then(|v| self.cal.to_pressure(v)) {
            Ok(mmhg) => {
                self.reject_streak = 0;
                self.primed = true;
                let filtered = self.kalman.update(mmhg);
                PressureReading {
                    raw_mmhg: Some(mmhg),
                    filtered_mmhg: filtered,
                    reject_streak: 0,
                    primed: true,
                }
            }
            Err(_) => {
                self.reject_streak = self.reject_streak.saturating_add(1);
                PressureReading {
                    raw_mmhg: None,
                    filtered_mmhg: self.kalman.estimate(),
                    reject_streak: self.reject_streak,
                    primed: self.primed,
                }
            }
        }
    }

    /// Swap in a new calibration and restart the filter at `estimate`.
    pub fn recalibrate(&mut self, cal: CalibrationModel, estimate: f32) {
        self.cal = cal;
        self.kalman.reset(estimate, self.initial_covariance);
        self.reject_streak = 0;
    }

    pub fn filtered(&self) -> f32 {
        self.kalman.estimate()
    }

    pub fn reject_streak(&self) -> u16 {
        self.reject_streak
    }

    pub fn is_primed(&self) -> bool {
        self.primed
    }
}
