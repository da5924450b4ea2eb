//! The control task's state: acquisition, safety, waveform, cascade, pump.
//!
//! ```text
//!  SensorPort ──▶ ┌──────────────────────────────────────────┐ ──▶ PumpDriver
//!                 │ Sample slot (10 ms)                      │
//!                 │   acquire → safety → waveform → outer    │
//!  SharedParams ─▶│ Inner slot (1 ms)                        │ ──▶ SharedStatus
//!                 │   inner → pump write                     │
//!                 └──────────────────────────────────────────┘ ──▶ EventSink
//! ```
//!
//! [`ControlCore::tick`] is called every millisecond.  The [`Cadence`]
//! decides which slots run.  Everything here is owned by the control task;
//! the only shared touch points are one parameter snapshot and one status
//! publish per sampling period.
//!
//! The pump idles whenever the start flag is clear or any safety fault is
//! set, and both PID loops are reset so control resumes from rest.

use std::sync::Arc;

use embedded_hal::pwm::SetDutyCycle;
use log::{debug, info, warn};

use super::events::AppEvent;
use super::ports::{EventSink, SchedulerDelegate, SensorPort, SlotKind};
use super::shared::{ControlStatus, Fabric};
use crate::config::SystemConfig;
use crate::control::cascade::CascadedController;
use crate::control::waveform::{WaveformGenerator, WaveformPhase, WaveformSample};
use crate::drivers::pump::PumpDriver;
use crate::params::PumpParameters;
use crate::safety::SafetySupervisor;
use crate::scheduler::Cadence;
use crate::sensors::pulse::PulseCounter;
use crate::sensors::pressure::CalibrationModel;
use crate::sensors::{AcquisitionSample, SignalAcquisition};

/// Everything the slots operate on.
struct Loops<S, P: SetDutyCycle> {
    sensor: S,
    pump: PumpDriver<P>,
    acquisition: SignalAcquisition,
    waveform: WaveformGenerator,
    cascade: CascadedController,
    safety: SafetySupervisor,
    fabric: Arc<Fabric>,
    sample_dt: f32,
    inner_dt: f32,

    last_sample: AcquisitionSample,
    last_wave: WaveformSample,
    adopted: Option<PumpParameters>,
    faults: u8,
    running: bool,
    active: bool,
}

pub struct ControlCore<S, P: SetDutyCycle> {
    cadence: Cadence,
    loops: Loops<S, P>,
}

impl<S: SensorPort, P: SetDutyCycle> ControlCore<S, P> {
    pub fn new(
        config: &SystemConfig,
        sensor: S,
        pwm: P,
        pulses: &'static PulseCounter,
        fabric: Arc<Fabric>,
        now_ms: u32,
    ) -> Self {
        info!(
            "control: sample {} ms, inner {} ms, pwm_max {}",
            config.sample_interval_ms, config.inner_interval_ms, config.pwm_max
        );
        Self {
            cadence: Cadence::new(config.sample_interval_ms, config.inner_interval_ms),
            loops: Loops {
                sensor,
                pump: PumpDriver::new(pwm, config.pwm_max),
                acquisition: SignalAcquisition::new(config, pulses, now_ms),
                waveform: WaveformGenerator::new(),
                cascade: CascadedController::new(config.outer, config.inner, config.pwm_max),
                safety: SafetySupervisor::new(config),
                fabric,
                sample_dt: config.sample_dt(),
                inner_dt: config.inner_dt(),
                last_sample: AcquisitionSample::default(),
                last_wave: WaveformSample {
                    setpoint_mmhg: 0.0,
                    phase: WaveformPhase::Idle,
                    cycle_index: 0,
                    new_cycle: false,
                },
                adopted: None,
                faults: 0,
                running: false,
                active: false,
            },
        }
    }

    /// Run whatever slots are due at `now_ms`.
    pub fn tick(&mut self, now_ms: u32, sink: &mut impl EventSink) -> usize {
        let mut ctx = TickContext {
            loops: &mut self.loops,
            sink,
        };
        self.cadence.poll(now_ms, &mut ctx)
    }

    /// Force the pump off, e.g. on shutdown.
    pub fn shutdown(&mut self) {
        self.loops.cascade.reset();
        self.loops.waveform.stop();
        if self.loops.pump.idle().is_err() {
            warn!("control: idle write failed on shutdown");
        }
        self.loops.running = false;
        self.loops.active = false;
    }

    /// Swap the pressure calibration and restart the Kalman filter.
    pub fn recalibrate(&mut self, cal: CalibrationModel) {
        self.loops.acquisition.recalibrate(cal);
        info!("control: pressure channel recalibrated");
    }

    pub fn last_sample(&self) -> AcquisitionSample {
        self.loops.last_sample
    }

    pub fn last_wave(&self) -> WaveformSample {
        self.loops.last_wave
    }

    pub fn faults(&self) -> u8 {
        self.loops.faults
    }

    pub fn pump(&self) -> &PumpDriver<P> {
        &self.loops.pump
    }

    pub fn cascade(&self) -> &CascadedController {
        &self.loops.cascade
    }

    pub fn overruns(&self) -> u32 {
        self.cadence.overruns()
    }
}

struct TickContext<'a, S, P: SetDutyCycle, E> {
    loops: &'a mut Loops<S, P>,
    sink: &'a mut E,
}

impl<S: SensorPort, P: SetDutyCycle, E: EventSink> SchedulerDelegate for TickContext<'_, S, P, E> {
    fn on_slot_due(&mut self, slot: SlotKind, now_ms: u32) {
        match slot {
            SlotKind::Sample => self.loops.sample_slot(now_ms, self.sink),
            SlotKind::Inner => self.loops.inner_slot(),
        }
    }
}

impl<S: SensorPort, P: SetDutyCycle> Loops<S, P> {
    fn sample_slot(&mut self, now_ms: u32, sink: &mut impl EventSink) {
        // 1. Acquire
        let adc = self.sensor.read_transducer_volts();
        let sample = self.acquisition.sample(now_ms, adc);
        self.last_sample = sample;

        // 2. Safety
        let before = self.faults;
        self.faults = self.safety.evaluate(&sample, self.pump.last_write_ok());
        let raised = self.faults & !before;
        if raised != 0 {
            warn!("control: fault 0b{:08b}, pump idled", self.faults);
            sink.emit(&AppEvent::FaultDetected(raised));
        } else if before != 0 && self.faults == 0 {
            info!("control: faults cleared");
            sink.emit(&AppEvent::FaultCleared);
        }

        // 3. Start/stop edge.  The snapshot is taken every period so the
        // start flag acts at once; its shape fields are only adopted by the
        // waveform generator at the next cycle wrap.
        let params = self.fabric.params.snapshot();
        if params.start_pump != self.running {
            self.running = params.start_pump;
            if self.running {
                info!("control: pump started");
                sink.emit(&AppEvent::PumpStarted);
            } else {
                info!("control: pump stopped");
                self.cascade.reset();
                sink.emit(&AppEvent::PumpStopped);
            }
        }

        // 4. Setpoint; a new block only takes effect at a cycle boundary
        let wave = self.waveform.tick(now_ms, &params);
        self.last_wave = wave;
        if wave.new_cycle && self.adopted != Some(params) {
            debug!("control: cycle {} adopts new parameters", wave.cycle_index);
            self.adopted = Some(params);
            sink.emit(&AppEvent::ParamsApplied(params));
        }

        // 5. Outer loop, or fail-safe idle.  Before the first accepted
        // pressure reading there is nothing to close the loop on.
        self.active = self.running && self.faults == 0 && sample.pressure_primed;
        if self.active {
            self.cascade
                .outer_step(wave.setpoint_mmhg, sample.pressure_mmhg, self.sample_dt);
        } else {
            self.cascade.reset();
            // A failed idle write shows up as an actuator fault next period.
            let _ = self.pump.idle();
        }

        self.fabric.status.publish(ControlStatus {
            pressure_mmhg: sample.pressure_mmhg,
            flow: sample.flow,
            pwm: self.pump.duty(),
            setpoint_mmhg: wave.setpoint_mmhg,
            faults: self.faults,
            running: self.running,
            cycle_index: wave.cycle_index,
        });
    }

    fn inner_slot(&mut self) {
        if !self.active {
            return;
        }
        let drive = self.cascade.inner_step(self.inner_dt);
        // Errors are latched in the driver and read by the safety check.
        let _ = self.pump.apply(drive, self.running);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SensorError;
    use core::convert::Infallible;
    use embedded_hal::pwm::ErrorType;

    struct FixedSensor(Result<f32, SensorError>);

    impl SensorPort for FixedSensor {
        fn read_transducer_volts(&mut self) -> Result<f32, SensorError> {
            self.0
        }
    }

    #[derive(Default)]
    struct Duty(u16);

    impl ErrorType for Duty {
        type Error = Infallible;
    }

    impl SetDutyCycle for Duty {
        fn max_duty_cycle(&self) -> u16 {
            255
        }
        fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Infallible> {
            self.0 = duty;
            Ok(())
        }
    }

    struct Events(Vec<AppEvent>);

    impl EventSink for Events {
        fn emit(&mut self, event: &AppEvent) {
            self.0.push(event.clone());
        }
    }

    static PULSES: PulseCounter = PulseCounter::new(0);

    fn volts_for(mmhg: f32) -> f32 {
        let cal = CalibrationModel::default();
        (mmhg / cal.scale_per_volt + cal.vout_min) * cal.divider_ratio
    }

    fn core(sensor: FixedSensor, start: bool) -> (ControlCore<FixedSensor, Duty>, Arc<Fabric>) {
        let fabric = Arc::new(Fabric::new(PumpParameters {
            start_pump: start,
            ..PumpParameters::default()
        }));
        let c = ControlCore::new(
            &SystemConfig::default(),
            sensor,
            Duty::default(),
            &PULSES,
            fabric.clone(),
            0,
        );
        (c, fabric)
    }

    #[test]
    fn stopped_pump_stays_at_zero() {
        let (mut c, _) = core(FixedSensor(Ok(volts_for(20.0))), false);
        let mut ev = Events(Vec::new());
        for t in 0..50 {
            c.tick(t, &mut ev);
        }
        assert_eq!(c.pump().pwm().0, 0);
        assert!(!c.pump().is_running());
    }

    #[test]
    fn low_pressure_drives_pump_when_started() {
        let (mut c, _) = core(FixedSensor(Ok(volts_for(0.0))), true);
        let mut ev = Events(Vec::new());
        for t in 0..50 {
            c.tick(t, &mut ev);
        }
        assert!(c.pump().duty() > 0);
        assert!(ev.0.contains(&AppEvent::PumpStarted));
    }

    #[test]
    fn sensor_failure_forces_idle() {
        let (mut c, fabric) = core(FixedSensor(Err(SensorError::AdcReadFailed)), true);
        let mut ev = Events(Vec::new());
        for t in 0..200 {
            c.tick(t, &mut ev);
        }
        assert_eq!(c.pump().duty(), 0);
        assert_ne!(c.faults(), 0);
        assert!(matches!(ev.0.iter().find(|e| matches!(e, AppEvent::FaultDetected(_))), Some(_)));
        assert_eq!(fabric.status.latest().pwm, 0);
    }
}
