//! Hall-effect flow sensor rate computation.
//!
//! The GPIO ISR feeds a [`PulseCounter`]; once per sampling period the
//! acquisition task swaps the counter to zero, divides by the elapsed
//! window and smooths the result over the last [`FLOW_WINDOW`] samples.

use super::pulse::PulseCounter;
use super::ring::RingAverage;

/// Moving-average depth for the flow channel.
pub const FLOW_WINDOW: usize = 5;

/// Result of a flow measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowReading {
    /// Pulses counted in the measurement window.
    pub pulse_count: u32,
    /// `pulses / elapsed_secs * calibration_factor` for this window.
    pub instantaneous: f32,
    /// Mean over the smoothing window.
    pub smoothed: f32,
}

pub struct FlowMeter {
    calibration_factor: f32,
    smoothing: RingAverage<FLOW_WINDOW>,
    last_window_ms: u32,
}

impl FlowMeter {
    /// `start_ms` opens the first measurement window.
    pub fn new(calibration_factor: f32, start_ms: u32) -> Self {
        Self {
            calibration_factor,
            smoothing: RingAverage::new(),
            last_window_ms: start_ms,
        }
    }

    /// Close the window ending at `now_ms`: snapshot-and-reset the counter
    /// and fold the rate into the moving average.
    pub fn sample(&mut self, counter: &PulseCounter, now_ms: u32) -> FlowReading {
        let pulses = counter.take();
        let elapsed_ms = now_ms.wrapping_sub(self.last_window_ms);
        self.last_window_ms = now_ms;
        self.fold(pulses, elapsed_ms as f32 / 1000.0)
    }

    /// Fold an already-snapshotted pulse count over `elapsed_secs`.
    ///
    /// A zero-length window carries no rate information; the average is
    /// returned unchanged.
    pub fn fold(&mut self, pulses: u32, elapsed_secs: f32) -> FlowReading {
        if elapsed_secs <= 0.0 {
            return FlowReading {
                pulse_count: pulses,
                instantaneous: 0.0,
                smoothed: self.smoothing.mean(),
            };
        }
        let instantaneous = pulses as f32 / elapsed_secs * self.calibration_factor;
        self.smoothing.push(instantaneous);
        FlowReading {
            pulse_count: pulses,
            instantaneous,
            smoothed: self.smoothing.mean(),
        }
    }

    pub fn smoothed(&self) -> f32 {
        self.smoothing.mean()
    }
}
