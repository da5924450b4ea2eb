//! Safety supervisor.
//!
//! Runs every sampling period **after acquisition and before the outer
//! loop** and accumulates a fault bitmask.  While any bit is set the
//! controller forces the pump idle and holds both PID loops in reset.
//!
//! ## Fault lifecycle
//!
//! 1. A condition triggers a fault (e.g. ten rejected pressure samples in a row).
//! 2. The supervisor sets the corresponding [`SafetyFault`] bit.
//! 3. The controller drives zero duty and resets the cascade.
//! 4. Each period the supervisor re-evaluates and unsets bits whose
//!    condition has cleared.
//! 5. With the mask back at zero, control resumes from a fresh state.
//!
//! Multiple faults may be active at once; control stays idle until every
//! one is resolved.

use crate::config::SystemConfig;
use crate::error::SafetyFault;
use crate::sensors::AcquisitionSample;
use log::{error, info};

/// Safety supervisor.
pub struct SafetySupervisor {
    over_pressure_mmhg: f32,
    max_stale_samples: u16,
    /// Latched fault bitmask.
    faults: u8,
}

impl SafetySupervisor {
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            over_pressure_mmhg: config.over_pressure_mmhg,
            max_stale_samples: config.max_stale_samples,
            faults: 0,
        }
    }

    /// Evaluate all safety conditions against the latest acquisition pass
    /// and the outcome of the last PWM write.  Returns the updated mask.
    pub fn evaluate(&mut self, sample: &AcquisitionSample, actuator_ok: bool) -> u8 {
        self.eval_fault(
            SafetyFault::SensorStale,
            sample.pressure_reject_streak >= self.max_stale_samples,
        );
        self.eval_fault(
            SafetyFault::OverPressure,
            sample.pressure_mmhg > self.over_pressure_mmhg,
        );
        self.eval_fault(SafetyFault::ActuatorFault, !actuator_ok);
        self.faults
    }

    /// Current fault bitmask.
    pub fn faults(&self) -> u8 {
        self.faults
    }

    /// True if **any** fault is active.
    pub fn has_faults(&self) -> bool {
        self.faults != 0
    }

    /// Check if a specific fault is active.
    pub fn has_fault(&self, fault: SafetyFault) -> bool {
        self.faults & fault.mask() != 0
    }

    /// Set or clear a fault bit based on a boolean condition.
    fn eval_fault(&mut self, fault: SafetyFault, condition: bool) {
        if condition {
            if self.faults & fault.mask() == 0 {
                error!("safety: FAULT SET: {fault}");
            }
            self.faults |= fault.mask();
        } else {
            if self.faults & fault.mask() != 0 {
                info!("safety: FAULT CLEARED: {fault}");
            }
            self.faults &= !fault.mask();
        }
    }
}
