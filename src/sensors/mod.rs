//! Signal acquisition: pressure and flow channels and the aggregating
//! [`SignalAcquisition`] that runs once per sampling period.
//!
//! Acquisition is owned by the control task.  It never blocks and never
//! allocates: the ADC read is a single register fetch and every buffer is
//! fixed-size.

pub mod flow;
pub mod kalman;
pub mod pressure;
pub mod pulse;
pub mod ring;

use crate::config::SystemConfig;
use crate::error::SensorError;
use flow::FlowMeter;
use kalman::KalmanFilter;
use pressure::PressureChannel;
use pulse::PulseCounter;

/// One acquisition pass, consumed by the controller in the same period.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AcquisitionSample {
    /// Kalman-filtered pressure (mmHg), held on rejected samples.
    pub pressure_mmhg: f32,
    /// Calibrated pressure before filtering; `None` when rejected.
    pub raw_pressure_mmhg: Option<f32>,
    /// Consecutive rejected pressure samples.
    pub pressure_reject_streak: u16,
    /// A real pressure reading has been accepted since boot.
    pub pressure_primed: bool,
    /// Smoothed flow.
    pub flow: f32,
    /// Pulses counted in this window.
    pub flow_pulses: u32,
}

/// Pressure + flow acquisition for the sampling task.
pub struct SignalAcquisition {
    pressure: PressureChannel,
    flow: FlowMeter,
    pulses: &'static PulseCounter,
    last: AcquisitionSample,
}

impl SignalAcquisition {
    /// Build from config.  `now_ms` opens the first flow window.
    pub fn new(config: &SystemConfig, pulses: &'static PulseCounter, now_ms: u32) -> Self {
        let kalman = KalmanFilter::new(
            0.0,
            config.kalman_initial_covariance,
            config.kalman_process_noise,
            config.kalman_measurement_noise,
        );
        pulses.set_debounce_us(config.flow_debounce_us);
        Self {
            pressure: PressureChannel::new(config.calibration, kalman),
            flow: FlowMeter::new(config.flow_calibration_factor, now_ms),
            pulses,
            last: AcquisitionSample::default(),
        }
    }

    /// Run one acquisition pass with the ADC result read this period.
    pub fn sample(&mut self, now_ms: u32, adc_volts: Result<f32, SensorError>) -> AcquisitionSample {
        let p = self.pressure.process(adc_volts);
        let f = self.flow.sample(self.pulses, now_ms);

        self.last = AcquisitionSample {
            pressure_mmhg: p.filtered_mmhg,
            raw_pressure_mmhg: p.raw_mmhg,
            pressure_reject_streak: p.reject_streak,
            pressure_primed: p.primed,
            flow: f.smoothed,
            flow_pulses: f.pulse_count,
        };
        self.last
    }

    /// Most recent pass.
    pub fn last(&self) -> AcquisitionSample {
        self.last
    }

    /// Explicit recalibration of the pressure channel.
    pub fn recalibrate(&mut self, cal: pressure::CalibrationModel) {
        let estimate = self.pressure.filtered();
        self.pressure.recalibrate(cal, estimate);
    }
}
