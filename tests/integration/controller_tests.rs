//! Control core against scripted sensors and a recording PWM.

use std::sync::Arc;
use std::thread;

use crate::mock_hw::{MockPwm, RecordingSink, ScriptedSensor};

use pulsepump::app::controller::ControlCore;
use pulsepump::app::events::AppEvent;
use pulsepump::app::service::PumpService;
use pulsepump::app::shared::Fabric;
use pulsepump::config::SystemConfig;
use pulsepump::error::{SafetyFault, SensorError};
use pulsepump::params::PumpParameters;
use pulsepump::sensors::pulse::PulseCounter;

fn params(start: bool) -> PumpParameters {
    PumpParameters {
        heart_rate_bpm: 60,
        start_pump: start,
        ..PumpParameters::default()
    }
}

fn build(
    sensor: ScriptedSensor,
    start: bool,
    pulses: &'static PulseCounter,
) -> (ControlCore<ScriptedSensor, MockPwm>, MockPwm, Arc<Fabric>) {
    let fabric = Arc::new(Fabric::new(params(start)));
    let pwm = MockPwm::new();
    let core = ControlCore::new(
        &SystemConfig::default(),
        sensor,
        pwm.clone(),
        pulses,
        fabric.clone(),
        0,
    );
    (core, pwm, fabric)
}

fn run(core: &mut ControlCore<ScriptedSensor, MockPwm>, sink: &mut RecordingSink, from: u32, to: u32) {
    for t in from..to {
        core.tick(t, sink);
    }
}

#[test]
fn fail_safe_idle_when_start_flag_clear() {
    static PULSES: PulseCounter = PulseCounter::new(0);
    let (mut core, pwm, fabric) = build(ScriptedSensor::constant_mmhg(0.0), false, &PULSES);
    let mut sink = RecordingSink::new();

    run(&mut core, &mut sink, 0, 500);

    // Large pressure error, yet every write is zero.
    assert!(!pwm.log.borrow().writes.is_empty());
    assert!(pwm.log.borrow().writes.iter().all(|&d| d == 0));
    assert_eq!(core.cascade().drive(), 0.0);
    assert_eq!(fabric.status.latest().pwm, 0);
    assert!(!fabric.status.latest().running);
}

#[test]
fn stop_mid_run_zeroes_output_and_resets_loops() {
    static PULSES: PulseCounter = PulseCounter::new(0);
    let (mut core, pwm, fabric) = build(ScriptedSensor::constant_mmhg(0.0), true, &PULSES);
    let service = PumpService::new(fabric.clone());
    let mut sink = RecordingSink::new();

    run(&mut core, &mut sink, 0, 200);
    assert!(pwm.last().unwrap() > 0);
    assert!(core.cascade().outer().integral() > 0.0);

    service.stop().unwrap();
    run(&mut core, &mut sink, 200, 220);

    assert_eq!(pwm.last(), Some(0));
    assert_eq!(core.cascade().drive(), 0.0);
    assert_eq!(core.cascade().outer().integral(), 0.0);
    assert_eq!(sink.count(|e| *e == AppEvent::PumpStopped), 1);

    // Restart begins a fresh cycle.
    service.start().unwrap();
    run(&mut core, &mut sink, 220, 240);
    assert_eq!(core.last_wave().cycle_index, 0);
    assert_eq!(sink.count(|e| *e == AppEvent::PumpStarted), 2);
}

#[test]
fn stale_sensor_fault_latches_while_reads_fail() {
    static PULSES: PulseCounter = PulseCounter::new(0);
    let sensor = ScriptedSensor::constant_mmhg(90.0)
        .then_mmhg(50.0, 20)
        .then_failures(15);
    let (mut core, pwm, _) = build(sensor, true, &PULSES);
    let mut sink = RecordingSink::new();

    // 20 good samples, then 10 failures trips the stale limit.
    run(&mut core, &mut sink, 0, 300);
    let stale = SafetyFault::SensorStale.mask();
    assert_ne!(core.faults() & stale, 0);
    assert_eq!(pwm.last(), Some(0));
    assert_eq!(sink.count(|e| *e == AppEvent::FaultDetected(stale)), 1);
    // Held at the last good estimate, not dropped to zero.
    assert!(core.last_sample().pressure_mmhg > 10.0);

    // The script ends on a failure, so the fault stays latched.
    run(&mut core, &mut sink, 300, 360);
    assert_ne!(core.faults(), 0);
}

#[test]
fn stale_fault_clears_when_readings_resume() {
    static PULSES: PulseCounter = PulseCounter::new(0);
    let sensor = ScriptedSensor::constant_mmhg(80.0)
        .then_failures(12)
        .then_mmhg(80.0, 1);
    let mut recovered = build(sensor, true, &PULSES);
    let mut sink2 = RecordingSink::new();
    run(&mut recovered.0, &mut sink2, 0, 300);
    assert_eq!(recovered.0.faults(), 0);
    assert_eq!(sink2.count(|e| *e == AppEvent::FaultCleared), 1);
    assert!(recovered.1.last().unwrap() > 0);
}

#[test]
fn over_pressure_idles_pump() {
    static PULSES: PulseCounter = PulseCounter::new(0);
    let (mut core, pwm, fabric) = build(ScriptedSensor::constant_mmhg(335.0), true, &PULSES);
    let mut sink = RecordingSink::new();

    run(&mut core, &mut sink, 0, 1_000);

    let over = SafetyFault::OverPressure.mask();
    assert_ne!(core.faults() & over, 0);
    assert_eq!(pwm.last(), Some(0));
    assert_eq!(fabric.status.latest().faults & over, over);
}

#[test]
fn failed_pwm_write_raises_actuator_fault() {
    static PULSES: PulseCounter = PulseCounter::new(0);
    let (mut core, pwm, _) = build(ScriptedSensor::constant_mmhg(0.0), true, &PULSES);
    let mut sink = RecordingSink::new();

    run(&mut core, &mut sink, 0, 50);
    pwm.set_failing(true);
    run(&mut core, &mut sink, 50, 80);

    let act = SafetyFault::ActuatorFault.mask();
    assert_ne!(core.faults() & act, 0);
    assert_eq!(sink.count(|e| *e == AppEvent::FaultDetected(act)), 1);

    pwm.set_failing(false);
    run(&mut core, &mut sink, 80, 120);
    assert_eq!(core.faults(), 0);
}

#[test]
fn new_parameters_adopted_at_cycle_boundary() {
    static PULSES: PulseCounter = PulseCounter::new(0);
    let (mut core, _, fabric) = build(ScriptedSensor::constant_mmhg(80.0), true, &PULSES);
    let service = PumpService::new(fabric);
    let mut sink = RecordingSink::new();
    let applied = |s: &RecordingSink| s.count(|e| matches!(e, AppEvent::ParamsApplied(_)));

    run(&mut core, &mut sink, 0, 300);
    assert_eq!(applied(&sink), 1);

    service
        .apply_parameter_update(PumpParameters {
            systolic_pressure: 140,
            ..params(true)
        })
        .unwrap();

    // Mid-cycle: the 120 mmHg shape stays in force.
    run(&mut core, &mut sink, 300, 990);
    assert_eq!(applied(&sink), 1);
    assert_eq!(core.last_wave().cycle_index, 0);

    run(&mut core, &mut sink, 990, 1_110);
    assert_eq!(applied(&sink), 2);
    assert_eq!(core.last_wave().cycle_index, 1);
    // 100 ms into the new cycle is just short of the 150 ms peak.
    assert!(core.last_wave().setpoint_mmhg > 120.0);
}

#[test]
fn rejected_update_keeps_running_shape() {
    static PULSES: PulseCounter = PulseCounter::new(0);
    let (mut core, _, fabric) = build(ScriptedSensor::constant_mmhg(80.0), true, &PULSES);
    let service = PumpService::new(fabric.clone());
    let mut sink = RecordingSink::new();

    run(&mut core, &mut sink, 0, 100);
    let bad = PumpParameters {
        systolic_pressure: 40,
        ..params(true)
    };
    assert!(service.apply_parameter_update(bad).is_err());
    assert_eq!(fabric.params.snapshot(), params(true));

    run(&mut core, &mut sink, 100, 1_200);
    assert_eq!(sink.count(|e| matches!(e, AppEvent::ParamsApplied(_))), 1);
}

#[test]
fn sensor_failure_on_first_sample_is_held_at_zero() {
    static PULSES: PulseCounter = PulseCounter::new(0);
    let sensor = ScriptedSensor::constant_mmhg(80.0).then(Err(SensorError::NotFinite));
    let (mut core, _, _) = build(sensor, false, &PULSES);
    let mut sink = RecordingSink::new();
    run(&mut core, &mut sink, 0, 1);
    assert_eq!(core.last_sample().pressure_mmhg, 0.0);
    assert_eq!(core.last_sample().raw_pressure_mmhg, None);
}

#[test]
fn started_pump_stays_idle_until_first_good_reading() {
    static PULSES: PulseCounter = PulseCounter::new(0);
    let sensor = ScriptedSensor::constant_mmhg(80.0)
        .then_failures(5)
        .then_mmhg(40.0, 1);
    let (mut core, pwm, _) = build(sensor, true, &PULSES);
    let mut sink = RecordingSink::new();

    // Five failed samples, still short of the stale limit.
    run(&mut core, &mut sink, 0, 50);
    assert_eq!(core.faults(), 0);
    assert!(!core.last_sample().pressure_primed);
    assert!(pwm.log.borrow().writes.iter().all(|&d| d == 0));
    assert_eq!(core.cascade().drive(), 0.0);

    // First accepted reading closes the loop.
    run(&mut core, &mut sink, 50, 120);
    assert!(core.last_sample().pressure_primed);
    assert!(pwm.last().unwrap() > 0);
}

#[test]
fn sensor_dead_from_boot_never_drives_pump() {
    static PULSES: PulseCounter = PulseCounter::new(0);
    let sensor = ScriptedSensor::constant_mmhg(80.0).then_failures(1_000);
    let (mut core, pwm, _) = build(sensor, true, &PULSES);
    let mut sink = RecordingSink::new();

    run(&mut core, &mut sink, 0, 120);

    assert!(pwm.log.borrow().writes.iter().all(|&d| d == 0));
    assert_ne!(core.faults() & SafetyFault::SensorStale.mask(), 0);
}

#[test]
fn flow_counter_concurrent_edges_and_snapshots() {
    static COUNTER: PulseCounter = PulseCounter::new(0);
    const EDGES_PER_THREAD: u32 = 25;

    let producers: Vec<_> = (0..4u32)
        .map(|id| {
            thread::spawn(move || {
                for i in 0..EDGES_PER_THREAD {
                    // Unique, non-zero timestamps per edge.
                    assert!(COUNTER.on_edge(1 + id * 1_000 + i * 10));
                    thread::yield_now();
                }
            })
        })
        .collect();

    let mut seen = 0u32;
    while producers.iter().any(|h| !h.is_finished()) {
        seen += COUNTER.take();
        thread::yield_now();
    }
    for h in producers {
        h.join().unwrap();
    }
    seen += COUNTER.take();

    assert_eq!(seen, 100);
}
