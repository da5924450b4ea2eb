//! Two-loop cascade: pressure → PWM setpoint → motor drive.
//!
//! ```text
//!  setpoint ─▶(+)─▶ outer PID ─▶ setpoint_pwm ─▶(+)─▶ inner PID ─▶ Σ ─▶ drive
//!  pressure ──┘(−)                      drive ──┘(−)               ▲      │
//!                                                                  └──────┘
//! ```
//!
//! The outer loop runs once per sampling period.  The inner loop runs every
//! inner period and integrates its output into the drive value, so a
//! proportional-only inner loop with `0 < Kp < 2` converges on the
//! setpoint (`Kp = 1` follows it in one step).

use super::pid::{PidLoop, PidTuning};
use crate::error::ConfigError;

/// The incremental inner loop is `drive += Kp·(sp − drive)`, a first-order
/// recurrence with pole `1 − Kp`.  It only settles for `0 < Kp < 2`, and
/// integral or derivative terms would act on the increment, not the drive.
pub fn validate_inner(tuning: &PidTuning) -> Result<(), ConfigError> {
    tuning.validate()?;
    if !(tuning.kp > 0.0 && tuning.kp < 2.0) {
        return Err(ConfigError::ValidationFailed("inner kp must be in (0, 2)"));
    }
    if tuning.ki != 0.0 || tuning.kd != 0.0 {
        return Err(ConfigError::ValidationFailed(
            "inner loop is proportional-only: ki and kd must be 0",
        ));
    }
    Ok(())
}

pub struct CascadedController {
    outer: PidLoop,
    inner: PidLoop,
    setpoint_pwm: f32,
    drive: f32,
    pwm_max: f32,
}

impl CascadedController {
    pub fn new(outer: PidTuning, inner: PidTuning, pwm_max: u16) -> Self {
        let pwm_max = f32::from(pwm_max);
        Self {
            outer: PidLoop::new(outer, 0.0, pwm_max),
            inner: PidLoop::new(inner, -pwm_max, pwm_max),
            setpoint_pwm: 0.0,
            drive: 0.0,
            pwm_max,
        }
    }

    /// Outer loop: pressure error → PWM setpoint.
    pub fn outer_step(&mut self, setpoint_mmhg: f32, measured_mmhg: f32, dt: f32) -> f32 {
        self.setpoint_pwm = self.outer.step(setpoint_mmhg - measured_mmhg, dt);
        self.setpoint_pwm
    }

    /// Inner loop: track the PWM setpoint with the drive value.
    pub fn inner_step(&mut self, dt: f32) -> f32 {
        let delta = self.inner.step(self.setpoint_pwm - self.drive, dt);
        self.drive = (self.drive + delta).clamp(0.0, self.pwm_max);
        self.drive
    }

    /// Drop both loops to rest: integrals cleared, drive zero.
    pub fn reset(&mut self) {
        self.outer.reset();
        self.inner.reset();
        self.setpoint_pwm = 0.0;
        self.drive = 0.0;
    }

    pub fn setpoint_pwm(&self) -> f32 {
        self.setpoint_pwm
    }

    pub fn drive(&self) -> f32 {
        self.drive
    }

    pub fn outer(&self) -> &PidLoop {
        &self.outer
    }

    pub fn inner(&self) -> &PidLoop {
        &self.inner
    }
}
