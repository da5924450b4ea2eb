//! First-order pump/pressure plant for host-side closed-loop runs.
//!
//! [`SimPwm`] is the pump's `SetDutyCycle`; [`SimPlant`] is the matching
//! [`SensorPort`].  They share the commanded duty through an atomic, so the
//! plant can live in the control core while a test holds the other half.
//!
//! Each ADC read advances the model by one sampling period:
//!
//! ```text
//!  dp/dt = (gain · duty/max − p) / τ
//! ```
//!
//! and feeds flow pulses proportional to duty into a [`PulseCounter`].

use core::convert::Infallible;
use core::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

use embedded_hal::pwm::{ErrorType, SetDutyCycle};

use crate::app::ports::SensorPort;
use crate::error::SensorError;
use crate::sensors::pressure::CalibrationModel;
use crate::sensors::pulse::PulseCounter;

/// PWM half of the simulation.
#[derive(Clone)]
pub struct SimPwm {
    duty: Arc<AtomicU16>,
    max: u16,
}

impl SimPwm {
    pub fn duty(&self) -> u16 {
        self.duty.load(Ordering::Relaxed)
    }
}

impl ErrorType for SimPwm {
    type Error = Infallible;
}

impl SetDutyCycle for SimPwm {
    fn max_duty_cycle(&self) -> u16 {
        self.max
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Infallible> {
        self.duty.store(duty.min(self.max), Ordering::Relaxed);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PlantModel {
    /// Pressure reached at full duty (mmHg).
    pub gain_mmhg: f32,
    /// Time constant (s).
    pub tau_s: f32,
    /// Flow pulses per second at full duty.
    pub pulses_per_s: f32,
    /// Model step per ADC read (s).
    pub step_s: f32,
}

impl Default for PlantModel {
    fn default() -> Self {
        Self {
            gain_mmhg: 250.0,
            tau_s: 0.05,
            pulses_per_s: 200.0,
            step_s: 0.010,
        }
    }
}

/// Sensor half of the simulation.
pub struct SimPlant {
    model: PlantModel,
    cal: CalibrationModel,
    duty: Arc<AtomicU16>,
    max: u16,
    pressure_mmhg: f32,
    pulses: Option<&'static PulseCounter>,
    pulse_debt: f32,
    clock_us: u32,
}

/// Build a connected PWM/plant pair.
pub fn plant(model: PlantModel, cal: CalibrationModel, pwm_max: u16) -> (SimPwm, SimPlant) {
    let duty = Arc::new(AtomicU16::new(0));
    let max = pwm_max.max(1);
    (
        SimPwm {
            duty: duty.clone(),
            max,
        },
        SimPlant {
            model,
            cal,
            duty,
            max,
            pressure_mmhg: 0.0,
            pulses: None,
            pulse_debt: 0.0,
            clock_us: 0,
        },
    )
}

impl SimPlant {
    /// Route simulated flow edges into `counter`.
    pub fn with_flow(mut self, counter: &'static PulseCounter) -> Self {
        self.pulses = Some(counter);
        self
    }

    pub fn pressure_mmhg(&self) -> f32 {
        self.pressure_mmhg
    }

    pub fn set_pressure(&mut self, mmhg: f32) {
        self.pressure_mmhg = mmhg;
    }

    fn duty_fraction(&self) -> f32 {
        f32::from(self.duty.load(Ordering::Relaxed)) / f32::from(self.max)
    }

    fn advance(&mut self) {
        let frac = self.duty_fraction();
        let target = self.model.gain_mmhg * frac;
        let k = (self.model.step_s / self.model.tau_s).min(1.0);
        self.pressure_mmhg += (target - self.pressure_mmhg) * k;

        let step_us = (self.model.step_s * 1e6) as u32;
        if let Some(counter) = self.pulses {
            self.pulse_debt += self.model.pulses_per_s * frac * self.model.step_s;
            let n = self.pulse_debt.floor() as u32;
            self.pulse_debt -= n as f32;
            if n > 0 {
                let spacing = step_us / (n + 1);
                for i in 1..=n {
                    counter.on_edge(self.clock_us.wrapping_add(i * spacing));
                }
            }
        }
        self.clock_us = self.clock_us.wrapping_add(step_us);
    }

    /// Voltage the transducer would put on the ADC pin.
    fn volts(&self) -> f32 {
        let v_out = self.pressure_mmhg / self.cal.scale_per_volt + self.cal.vout_min;
        v_out * self.cal.divider_ratio
    }
}

impl SensorPort for SimPlant {
    fn read_transducer_volts(&mut self) -> Result<f32, SensorError> {
        self.advance();
        Ok(self.volts())
    }
}
