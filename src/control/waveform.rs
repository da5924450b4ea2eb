//! Cardiac-like pressure setpoint synthesis.
//!
//! One cycle (`60 000 / heart_rate` ms) is a piecewise curve through four
//! knots, each segment a half-cosine ease so the curve is continuous and
//! flat at every knot:
//!
//! ```text
//!  systolic ┤      ╭─╮
//!           │     ╱   ╲
//! diastolic ┤────╯     ╲      ╭──────────
//!           │           ╲    ╱
//!     notch ┤            ╰──╯
//!           └─┬────┬────────┬──┬────────┬─▶ t
//!             0   peak     sys  sys+dpk  cycle
//! ```
//!
//! The active [`PumpParameters`] are adopted only when a cycle wraps, so a
//! parameter write never tears a cycle in half.

use core::f32::consts::PI;

use crate::params::{PumpMode, PumpParameters};

/// Segment of the cycle the setpoint currently lies in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveformPhase {
    /// Pump stopped; setpoint held at base pressure.
    Idle,
    /// Manual mode; setpoint held at base pressure while the cycle clock runs.
    Hold,
    /// Diastolic → systolic.
    SystolicRise,
    /// Systolic peak → dicrotic notch.
    SystolicFall,
    /// Notch → diastolic.
    NotchRecovery,
    /// Flat diastole until the cycle wraps.
    Diastole,
}

/// Geometry of one cycle, derived from a parameter snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleShape {
    pub cycle_ms: f32,
    pub systolic_ms: f32,
    pub systolic_peak_ms: f32,
    /// Absolute time of the diastolic knot.
    pub diastolic_knot_ms: f32,
    pub systolic: f32,
    pub diastolic: f32,
    pub notch: f32,
    pub base: f32,
    pub mode: PumpMode,
}

impl CycleShape {
    pub fn from_params(p: &PumpParameters) -> Self {
        let cycle_ms = p.cycle_ms();
        let systolic_ms = p.systolic_ms().min(cycle_ms);
        let systolic_peak_ms = f32::from(p.systolic_peak_time_ms).min(systolic_ms);
        let diastolic_knot_ms =
            (systolic_ms + f32::from(p.diastolic_peak_time_ms)).min(cycle_ms);
        Self {
            cycle_ms,
            systolic_ms,
            systolic_peak_ms,
            diastolic_knot_ms,
            systolic: f32::from(p.systolic_pressure),
            diastolic: f32::from(p.diastolic_pressure),
            notch: f32::from(p.notch_pressure),
            base: f32::from(p.base_pressure),
            mode: p.pump_mode,
        }
    }

    /// Setpoint at `t_ms` into the cycle.  `t_ms` is folded into
    /// `[0, cycle_ms)`.
    pub fn pressure_at(&self, t_ms: f32) -> (f32, WaveformPhase) {
        if self.mode == PumpMode::Manual {
            return (self.base, WaveformPhase::Hold);
        }
        let t = t_ms.rem_euclid(self.cycle_ms);

        if t < self.systolic_peak_ms {
            let u = t / self.systolic_peak_ms;
            (ease(self.diastolic, self.systolic, u), WaveformPhase::SystolicRise)
        } else if t < self.systolic_ms {
            let u = (t - self.systolic_peak_ms) / (self.systolic_ms - self.systolic_peak_ms);
            (ease(self.systolic, self.notch, u), WaveformPhase::SystolicFall)
        } else if t < self.diastolic_knot_ms {
            let u = (t - self.systolic_ms) / (self.diastolic_knot_ms - self.systolic_ms);
            (ease(self.notch, self.diastolic, u), WaveformPhase::NotchRecovery)
        } else {
            (self.diastolic, WaveformPhase::Diastole)
        }
    }
}

/// Half-cosine interpolation from `a` (u = 0) to `b` (u = 1).
fn ease(a: f32, b: f32, u: f32) -> f32 {
    a + (b - a) * (1.0 - (PI * u).cos()) * 0.5
}

/// Output of one generator tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveformSample {
    pub setpoint_mmhg: f32,
    pub phase: WaveformPhase,
    /// Completed cycles since the last start.
    pub cycle_index: u32,
    /// True on the tick that adopted a fresh parameter snapshot.
    pub new_cycle: bool,
}

/// Cycle clock plus the shape of the cycle in progress.
pub struct WaveformGenerator {
    shape: Option<CycleShape>,
    phase_ms: f32,
    last_ms: u32,
    cycle_index: u32,
}

impl Default for WaveformGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl WaveformGenerator {
    pub const fn new() -> Self {
        Self {
            shape: None,
            phase_ms: 0.0,
            last_ms: 0,
            cycle_index: 0,
        }
    }

    /// True while a cycle is in progress.
    pub fn is_running(&self) -> bool {
        self.shape.is_some()
    }

    /// Current cycle geometry, if running.
    pub fn shape(&self) -> Option<&CycleShape> {
        self.shape.as_ref()
    }

    /// Begin a fresh cycle at `now_ms` with `params`.
    pub fn start(&mut self, now_ms: u32, params: &PumpParameters) {
        self.shape = Some(CycleShape::from_params(params));
        self.phase_ms = 0.0;
        self.last_ms = now_ms;
        self.cycle_index = 0;
    }

    /// Stop the clock.  The next tick with `start_pump` set starts over.
    pub fn stop(&mut self) {
        self.shape = None;
        self.phase_ms = 0.0;
        self.cycle_index = 0;
    }

    /// Advance to `now_ms`.
    ///
    /// `latest` is the currently active parameter block.  Its start flag is
    /// honoured immediately; its shape is adopted only at the next cycle
    /// wrap.
    pub fn tick(&mut self, now_ms: u32, latest: &PumpParameters) -> WaveformSample {
        if !latest.start_pump {
            self.stop();
            return WaveformSample {
                setpoint_mmhg: f32::from(latest.base_pressure),
                phase: WaveformPhase::Idle,
                cycle_index: 0,
                new_cycle: false,
            };
        }

        let mut new_cycle = false;
        let shape = match self.shape {
            Some(shape) => {
                let elapsed = now_ms.wrapping_sub(self.last_ms) as f32;
                self.last_ms = now_ms;
                self.phase_ms += elapsed;
                if self.phase_ms >= shape.cycle_ms {
                    self.phase_ms = self.phase_ms.rem_euclid(shape.cycle_ms);
                    self.cycle_index = self.cycle_index.wrapping_add(1);
                    let next = CycleShape::from_params(latest);
                    // A shorter cycle may leave the phase past its end.
                    self.phase_ms = self.phase_ms.rem_euclid(next.cycle_ms);
                    self.shape = Some(next);
                    new_cycle = true;
                    next
                } else {
                    shape
                }
            }
            None => {
                self.start(now_ms, latest);
                new_cycle = true;
                CycleShape::from_params(latest)
            }
        };

        let (setpoint_mmhg, phase) = shape.pressure_at(self.phase_ms);
        WaveformSample {
            setpoint_mmhg,
            phase,
            cycle_index: self.cycle_index,
            new_cycle,
        }
    }
}
