//! Mock adapters for integration tests.
//!
//! Records every PWM write and every emitted event so tests can assert on
//! the full history without touching real LEDC or I²C registers.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use embedded_hal::pwm::{ErrorKind, ErrorType, SetDutyCycle};
use pulsepump::app::events::AppEvent;
use pulsepump::app::ports::{EventSink, SensorPort};
use pulsepump::error::SensorError;
use pulsepump::sensors::pressure::CalibrationModel;

// ── Sensor ────────────────────────────────────────────────────

/// Replays scripted readings; repeats the last one when the script runs
/// out.
pub struct ScriptedSensor {
    script: VecDeque<Result<f32, SensorError>>,
    last: Result<f32, SensorError>,
    pub reads: usize,
}

impl ScriptedSensor {
    pub fn constant_mmhg(mmhg: f32) -> Self {
        Self {
            script: VecDeque::new(),
            last: Ok(volts_for(mmhg)),
            reads: 0,
        }
    }

    pub fn then(mut self, reading: Result<f32, SensorError>) -> Self {
        self.script.push_back(reading);
        self
    }

    pub fn then_mmhg(self, mmhg: f32, times: usize) -> Self {
        (0..times).fold(self, |s, _| s.then(Ok(volts_for(mmhg))))
    }

    pub fn then_failures(self, times: usize) -> Self {
        (0..times).fold(self, |s, _| s.then(Err(SensorError::AdcReadFailed)))
    }
}

impl SensorPort for ScriptedSensor {
    fn read_transducer_volts(&mut self) -> Result<f32, SensorError> {
        self.reads += 1;
        if let Some(next) = self.script.pop_front() {
            self.last = next;
        }
        self.last
    }
}

/// ADC-pin voltage the default calibration maps to `mmhg`.
pub fn volts_for(mmhg: f32) -> f32 {
    let cal = CalibrationModel::default();
    (mmhg / cal.scale_per_volt + cal.vout_min) * cal.divider_ratio
}

// ── PWM ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockPwmError;

impl embedded_hal::pwm::Error for MockPwmError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// Shared write log so the test keeps a handle after the PWM is moved
/// into the control core.
#[derive(Debug, Default)]
pub struct PwmLog {
    pub writes: Vec<u16>,
    pub fail: bool,
}

#[derive(Clone)]
pub struct MockPwm {
    pub log: Rc<RefCell<PwmLog>>,
}

impl MockPwm {
    pub fn new() -> Self {
        Self {
            log: Rc::new(RefCell::new(PwmLog::default())),
        }
    }

    pub fn last(&self) -> Option<u16> {
        self.log.borrow().writes.last().copied()
    }

    pub fn set_failing(&self, fail: bool) {
        self.log.borrow_mut().fail = fail;
    }
}

impl ErrorType for MockPwm {
    type Error = MockPwmError;
}

impl SetDutyCycle for MockPwm {
    fn max_duty_cycle(&self) -> u16 {
        255
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), MockPwmError> {
        let mut log = self.log.borrow_mut();
        if log.fail {
            return Err(MockPwmError);
        }
        log.writes.push(duty);
        Ok(())
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}
