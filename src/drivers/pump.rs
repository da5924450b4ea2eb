//! Pump motor PWM driver.
//!
//! Dumb actuator behind [`embedded_hal::pwm::SetDutyCycle`]: the control
//! task hands it a drive value in `0..=pwm_max` and the run flag.
//!
//! ## Safety contract
//!
//! - Duty is clamped to `0..=pwm_max` before it reaches the hardware.
//! - With the run flag clear the driver writes zero, whatever the drive.
//! - A failed write is reported once and never retried; the safety
//!   supervisor turns it into an actuator fault.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: [`LedcPwm`] writes the LEDC pump channel via hw_init.
//! On host/test: any `SetDutyCycle` (the plant model or a mock).

use embedded_hal::pwm::{Error as PwmError, ErrorKind, ErrorType, SetDutyCycle};
use log::warn;

use crate::drivers::hw_init;
use crate::error::ActuatorError;

pub struct PumpDriver<P: SetDutyCycle> {
    pwm: P,
    pwm_max: u16,
    duty: u16,
    running: bool,
    last_write_ok: bool,
}

impl<P: SetDutyCycle> PumpDriver<P> {
    pub fn new(pwm: P, pwm_max: u16) -> Self {
        Self {
            pwm,
            pwm_max: pwm_max.max(1),
            duty: 0,
            running: false,
            last_write_ok: true,
        }
    }

    /// Write `drive` (controller units, `0..=pwm_max`) if `run` is set,
    /// zero otherwise.  Returns the duty actually commanded.
    pub fn apply(&mut self, drive: f32, run: bool) -> Result<u16, ActuatorError> {
        let duty = if run && drive.is_finite() {
            drive.round().clamp(0.0, f32::from(self.pwm_max)) as u16
        } else {
            0
        };
        self.write(duty)?;
        self.running = duty > 0;
        Ok(duty)
    }

    /// Force zero duty.
    pub fn idle(&mut self) -> Result<(), ActuatorError> {
        self.running = false;
        self.write(0)
    }

    fn write(&mut self, duty: u16) -> Result<(), ActuatorError> {
        match self.pwm.set_duty_cycle_fraction(duty, self.pwm_max) {
            Ok(()) => {
                self.duty = duty;
                self.last_write_ok = true;
                Ok(())
            }
            Err(e) => {
                if self.last_write_ok {
                    warn!("pump: PWM write failed ({:?})", e.kind());
                }
                self.last_write_ok = false;
                Err(ActuatorError::PwmWriteFailed)
            }
        }
    }

    /// Last duty successfully written.
    pub fn duty(&self) -> u16 {
        self.duty
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Outcome of the most recent write.
    pub fn last_write_ok(&self) -> bool {
        self.last_write_ok
    }

    pub fn pwm(&self) -> &P {
        &self.pwm
    }
}

// ── LEDC channel as SetDutyCycle ──────────────────────────────

/// ESP-IDF error code from an LEDC register write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedcError(pub i32);

impl PwmError for LedcError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// 8-bit LEDC channel configured by [`hw_init::init_peripherals`].
pub struct LedcPwm {
    channel: u32,
}

impl LedcPwm {
    pub fn pump() -> Self {
        Self {
            channel: hw_init::LEDC_CH_PUMP,
        }
    }
}

impl ErrorType for LedcPwm {
    type Error = LedcError;
}

impl SetDutyCycle for LedcPwm {
    fn max_duty_cycle(&self) -> u16 {
        u16::from(u8::MAX)
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        let duty = duty.min(u16::from(u8::MAX)) as u8;
        hw_init::ledc_set(self.channel, duty).map_err(LedcError)
    }
}
