//! System configuration parameters
//!
//! All tunable parameters for the controller core: sensor calibration,
//! filter noise terms, PID gains and task periods.  Loaded from storage at
//! boot (namespace `pulsepump`, key `syscfg`), defaults otherwise.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::StoragePort;
use crate::control::cascade;
use crate::control::pid::PidTuning;
use crate::error::ConfigError;
use crate::sensors::pressure::CalibrationModel;

pub const CONFIG_NAMESPACE: &str = "pumpcfg";
pub const CONFIG_KEY: &str = "syscfg";

/// Stored config blobs are small; anything larger is treated as corrupt.
const MAX_CONFIG_BLOB: usize = 512;

/// Core system configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Pressure channel ---
    /// Transducer voltage → mmHg mapping.
    pub calibration: CalibrationModel,
    /// Kalman process noise `Q`.
    pub kalman_process_noise: f32,
    /// Kalman measurement noise `R`.
    pub kalman_measurement_noise: f32,
    /// Initial error covariance `P`.
    pub kalman_initial_covariance: f32,

    // --- Flow channel ---
    /// Multiplier from pulses/second to flow units.
    pub flow_calibration_factor: f32,
    /// Minimum spacing between accepted flow pulses (µs).
    pub flow_debounce_us: u32,

    // --- Control ---
    /// Outer loop: pressure error → PWM setpoint.
    pub outer: PidTuning,
    /// Inner loop: PWM error → drive increment.
    pub inner: PidTuning,
    /// Full-scale duty value (8-bit LEDC → 255).
    pub pwm_max: u16,

    // --- Safety ---
    /// Filtered pressure above this forces the pump idle (mmHg).
    pub over_pressure_mmhg: f32,
    /// Consecutive rejected pressure samples before the channel is stale.
    pub max_stale_samples: u16,

    // --- Timing ---
    /// Acquisition + outer loop period (ms).
    pub sample_interval_ms: u32,
    /// Inner loop period (ms).
    pub inner_interval_ms: u32,
    /// Telemetry snapshot period (ms).
    pub telemetry_interval_ms: u32,
    /// Storage worker queue poll interval (ms).
    pub storage_poll_ms: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            calibration: CalibrationModel::default(),
            kalman_process_noise: 0.002,
            kalman_measurement_noise: 1.0,
            kalman_initial_covariance: 1.0,

            flow_calibration_factor: 13.5,
            flow_debounce_us: 1_000,

            outer: PidTuning {
                kp: 10.0,
                ki: 10.0,
                kd: 1.0,
                derivative_filter_n: 100.0,
                dead_zone: 0.5,
            },
            inner: PidTuning {
                kp: 1.0,
                ki: 0.0,
                kd: 0.0,
                derivative_filter_n: 100.0,
                dead_zone: 0.0,
            },
            pwm_max: 255,

            over_pressure_mmhg: 320.0,
            max_stale_samples: 10,

            sample_interval_ms: 10,
            inner_interval_ms: 1,
            telemetry_interval_ms: 50,
            storage_poll_ms: 20,
        }
    }
}

impl SystemConfig {
    /// Range-check every field before the config is used or persisted.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.calibration.validate()?;
        if !(self.kalman_process_noise > 0.0 && self.kalman_measurement_noise > 0.0) {
            return Err(ConfigError::ValidationFailed(
                "kalman noise terms must be positive",
            ));
        }
        if !(self.kalman_initial_covariance > 0.0) {
            return Err(ConfigError::ValidationFailed(
                "kalman_initial_covariance must be positive",
            ));
        }
        if !(self.flow_calibration_factor > 0.0) {
            return Err(ConfigError::ValidationFailed(
                "flow_calibration_factor must be positive",
            ));
        }
        self.outer.validate()?;
        cascade::validate_inner(&self.inner)?;
        if self.pwm_max == 0 {
            return Err(ConfigError::ValidationFailed("pwm_max must be non-zero"));
        }
        if !(self.over_pressure_mmhg > 0.0) {
            return Err(ConfigError::ValidationFailed(
                "over_pressure_mmhg must be positive",
            ));
        }
        if self.max_stale_samples == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_stale_samples must be non-zero",
            ));
        }
        if self.inner_interval_ms == 0 || self.sample_interval_ms < self.inner_interval_ms {
            return Err(ConfigError::ValidationFailed(
                "inner_interval_ms must be 1..=sample_interval_ms",
            ));
        }
        if self.telemetry_interval_ms < self.sample_interval_ms {
            return Err(ConfigError::ValidationFailed(
                "telemetry_interval_ms must be >= sample_interval_ms",
            ));
        }
        if self.storage_poll_ms == 0 {
            return Err(ConfigError::ValidationFailed("storage_poll_ms must be non-zero"));
        }
        Ok(())
    }

    /// Sample period in seconds, the `dt` of the outer loop.
    pub fn sample_dt(&self) -> f32 {
        self.sample_interval_ms as f32 / 1000.0
    }

    /// Inner loop period in seconds.
    pub fn inner_dt(&self) -> f32 {
        self.inner_interval_ms as f32 / 1000.0
    }
}

/// Load the stored config, falling back to defaults when absent, corrupt
/// or out of range.
pub fn load_or_default(storage: &impl StoragePort) -> SystemConfig {
    let mut buf = [0u8; MAX_CONFIG_BLOB];
    let len = match storage.read(CONFIG_NAMESPACE, CONFIG_KEY, &mut buf) {
        Ok(n) => n,
        Err(e) => {
            info!("config: no stored config ({}), using defaults", e);
            return SystemConfig::default();
        }
    };
    match postcard::from_bytes::<SystemConfig>(&buf[..len]) {
        Ok(cfg) => match cfg.validate() {
            Ok(()) => {
                info!("config: loaded from storage");
                cfg
            }
            Err(e) => {
                warn!("config: stored config invalid ({}), using defaults", e);
                SystemConfig::default()
            }
        },
        Err(_) => {
            warn!("config: stored config corrupted, using defaults");
            SystemConfig::default()
        }
    }
}

/// Validate and persist `cfg`.
pub fn save(storage: &mut impl StoragePort, cfg: &SystemConfig) -> crate::error::Result<()> {
    cfg.validate()?;
    let bytes = postcard::to_allocvec(cfg).map_err(|_| ConfigError::Corrupted)?;
    storage.write(CONFIG_NAMESPACE, CONFIG_KEY, &bytes)?;
    info!("config: saved ({} bytes)", bytes.len());
    Ok(())
}
