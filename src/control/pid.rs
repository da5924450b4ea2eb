//! PID loop with filtered derivative and dead-zone integral gating.
//!
//! One instance per loop of the cascade.  Per step:
//!
//! 1. `|e| < dead_zone` freezes the integral, otherwise `I += e·dt`.
//! 2. Raw rate `(e − e_prev) / dt` passes a first-order low-pass,
//!    `ė_f += (ė − ė_f) · dt·N / (1 + dt·N)`.  `N = 0` disables filtering.
//! 3. `u = Kp·e + Ki·I + Kd·ė_f`, clamped to the output limits.
//!
//! The first step after construction or [`reset`](PidLoop::reset) has no
//! previous error and contributes no derivative.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Gains and shaping for one loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidTuning {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
    /// Derivative filter coefficient (rad/s).  `0` = unfiltered.
    pub derivative_filter_n: f32,
    /// Error band inside which the integral is frozen.
    pub dead_zone: f32,
}

impl PidTuning {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [self.kp, self.ki, self.kd, self.derivative_filter_n, self.dead_zone];
        if fields.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(ConfigError::ValidationFailed(
                "PID gains, filter N and dead zone must be finite and non-negative",
            ));
        }
        Ok(())
    }
}

/// PID loop state.  Owned by the control task.
pub struct PidLoop {
    tuning: PidTuning,
    integral: f32,
    prev_error: f32,
    filtered_rate: f32,
    primed: bool,
    output_min: f32,
    output_max: f32,
    last_output: f32,
}

impl PidLoop {
    pub fn new(tuning: PidTuning, output_min: f32, output_max: f32) -> Self {
        Self {
            tuning,
            integral: 0.0,
            prev_error: 0.0,
            filtered_rate: 0.0,
            primed: false,
            output_min,
            output_max,
            last_output: 0.0,
        }
    }

    /// Set output limits
    pub fn set_limits(&mut self, min: f32, max: f32) {
        self.output_min = min;
        self.output_max = max;
    }

    /// Swap gains without disturbing accumulated state.
    pub fn set_tuning(&mut self, tuning: PidTuning) {
        self.tuning = tuning;
    }

    /// Advance the loop by `dt` seconds with the given error.
    ///
    /// A non-positive `dt` or non-finite error leaves the state untouched
    /// and repeats the previous output.
    pub fn step(&mut self, error: f32, dt: f32) -> f32 {
        if !(dt > 0.0) || !error.is_finite() {
            return self.last_output;
        }

        // Integral, frozen inside the dead zone.
        if error.abs() >= self.tuning.dead_zone {
            self.integral += error * dt;
        }

        // Filtered derivative.
        if self.primed {
            let raw_rate = (error - self.prev_error) / dt;
            let n = self.tuning.derivative_filter_n;
            let alpha = if n > 0.0 { dt * n / (1.0 + dt * n) } else { 1.0 };
            self.filtered_rate += (raw_rate - self.filtered_rate) * alpha;
        }
        self.prev_error = error;
        self.primed = true;

        let output = self.tuning.kp * error
            + self.tuning.ki * self.integral
            + self.tuning.kd * self.filtered_rate;

        self.last_output = output.clamp(self.output_min, self.output_max);
        self.last_output
    }

    /// Reset controller state
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_error = 0.0;
        self.filtered_rate = 0.0;
        self.primed = false;
        self.last_output = 0.0;
    }

    pub fn integral(&self) -> f32 {
        self.integral
    }

    pub fn filtered_rate(&self) -> f32 {
        self.filtered_rate
    }

    pub fn last_output(&self) -> f32 {
        self.last_output
    }

    pub fn tuning(&self) -> PidTuning {
        self.tuning
    }
}
