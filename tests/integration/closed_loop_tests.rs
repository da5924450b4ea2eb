//! Control core closed around the first-order plant model.

use std::sync::Arc;
use std::time::Duration;

use crate::mock_hw::RecordingSink;

use pulsepump::adapters::log_sink::LogEventSink;
use pulsepump::adapters::storage::MemoryStorage;
use pulsepump::app::controller::ControlCore;
use pulsepump::app::events::AppEvent;
use pulsepump::app::service::PumpService;
use pulsepump::app::shared::Fabric;
use pulsepump::config::SystemConfig;
use pulsepump::control::pid::PidTuning;
use pulsepump::control::waveform::WaveformSample;
use pulsepump::params::PumpParameters;
use pulsepump::runtime::Runtime;
use pulsepump::sensors::pulse::PulseCounter;
use pulsepump::sim::{self, PlantModel, SimPlant, SimPwm};

fn tracking_config() -> SystemConfig {
    SystemConfig {
        // Near pass-through filter so the loop sees the plant directly.
        kalman_process_noise: 10.0,
        outer: PidTuning {
            kp: 3.0,
            ki: 20.0,
            kd: 0.0,
            derivative_filter_n: 0.0,
            dead_zone: 0.0,
        },
        ..SystemConfig::default()
    }
}

fn scenario() -> PumpParameters {
    PumpParameters {
        heart_rate_bpm: 60,
        systolic_pressure: 120,
        diastolic_pressure: 80,
        notch_pressure: 60,
        systolic_period_pct: 60,
        diastolic_period_pct: 40,
        // One tenth of the 1 s cycle.
        systolic_peak_time_ms: 100,
        diastolic_peak_time_ms: 100,
        start_pump: true,
        ..PumpParameters::default()
    }
}

struct Rig {
    core: ControlCore<SimPlant, SimPwm>,
    pwm: SimPwm,
    fabric: Arc<Fabric>,
    sink: RecordingSink,
}

fn rig(config: &SystemConfig, params: PumpParameters, pulses: &'static PulseCounter) -> Rig {
    let (pwm, plant) = sim::plant(PlantModel::default(), config.calibration, config.pwm_max);
    let fabric = Arc::new(Fabric::new(params));
    let core = ControlCore::new(
        config,
        plant.with_flow(pulses),
        pwm.clone(),
        pulses,
        fabric.clone(),
        0,
    );
    Rig {
        core,
        pwm,
        fabric,
        sink: RecordingSink::new(),
    }
}

/// Filtered pressure at every sampling instant in `[from, to)`.
fn run(rig: &mut Rig, from: u32, to: u32) -> Vec<(u32, f32)> {
    let mut trace = Vec::new();
    for t in from..to {
        rig.core.tick(t, &mut rig.sink);
        if t % 10 == 0 {
            trace.push((t, rig.core.last_sample().pressure_mmhg));
        }
    }
    trace
}

fn at(trace: &[(u32, f32)], t: u32) -> f32 {
    trace
        .iter()
        .find(|(ts, _)| *ts == t)
        .map(|(_, p)| *p)
        .unwrap()
}

#[test]
fn three_cycle_cardiac_scenario() {
    static PULSES: PulseCounter = PulseCounter::new(0);
    let mut rig = rig(&tracking_config(), scenario(), &PULSES);

    let trace = run(&mut rig, 0, 3_000);
    assert_eq!(rig.core.faults(), 0);
    assert_eq!(rig.core.last_wave().cycle_index, 2);

    // Third cycle, once the integrator has settled.
    let third: Vec<f32> = trace
        .iter()
        .filter(|(t, _)| *t >= 2_000)
        .map(|(_, p)| *p)
        .collect();
    let max = third.iter().copied().fold(f32::MIN, f32::max);
    let min = third.iter().copied().fold(f32::MAX, f32::min);

    assert!(max > 100.0 && max < 135.0, "systolic peak {max}");
    assert!(min < 78.0 && min > 40.0, "notch trough {min}");
    // Diastolic plateau before the next beat.
    let late = at(&trace, 2_990);
    assert!((late - 80.0).abs() < 8.0, "diastolic {late}");

    // Peak arrives in systole, trough near the notch.
    let peak_t = trace
        .iter()
        .filter(|(t, _)| *t >= 2_000)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(t, _)| *t - 2_000)
        .unwrap();
    assert!((50..350).contains(&peak_t), "peak at {peak_t} ms");

    // Only the initial block was ever applied.
    assert_eq!(
        rig.sink.count(|e| matches!(e, AppEvent::ParamsApplied(_))),
        1
    );
    assert!(rig.fabric.status.latest().flow > 0.0);
}

/// Tick once at `t` and return the generator output.
fn wave_at(rig: &mut Rig, t: u32) -> WaveformSample {
    run(rig, t, t + 1);
    rig.core.last_wave()
}

#[test]
fn setpoint_trace_hits_knots_every_cycle() {
    static PULSES: PulseCounter = PulseCounter::new(0);
    let mut rig = rig(&tracking_config(), scenario(), &PULSES);

    for cycle in 0..3u32 {
        let base = cycle * 1_000;
        let start = wave_at(&mut rig, base);
        assert_eq!(start.cycle_index, cycle);
        assert!((start.setpoint_mmhg - 80.0).abs() < 1e-3, "cycle {cycle} start");

        run(&mut rig, base + 1, base + 100);
        let peak = wave_at(&mut rig, base + 100);
        assert!((peak.setpoint_mmhg - 120.0).abs() < 1e-3, "cycle {cycle} peak");

        run(&mut rig, base + 101, base + 990);
        let end = wave_at(&mut rig, base + 990);
        assert!((end.setpoint_mmhg - 80.0).abs() < 1e-3, "cycle {cycle} end");
        run(&mut rig, base + 991, base + 1_000);
    }
}

#[test]
fn cycles_repeat() {
    static PULSES: PulseCounter = PulseCounter::new(0);
    let mut rig = rig(&tracking_config(), scenario(), &PULSES);
    let trace = run(&mut rig, 0, 4_000);

    for offset in [0u32, 100, 300, 650, 900] {
        let a = at(&trace, 2_000 + offset);
        let b = at(&trace, 3_000 + offset);
        assert!((a - b).abs() < 3.0, "offset {offset}: {a} vs {b}");
    }
}

#[test]
fn manual_mode_holds_base_pressure() {
    static PULSES: PulseCounter = PulseCounter::new(0);
    let params = PumpParameters {
        pump_mode: pulsepump::params::PumpMode::Manual,
        base_pressure: 90,
        ..scenario()
    };
    let mut rig = rig(&tracking_config(), params, &PULSES);
    let trace = run(&mut rig, 0, 2_000);

    for t in [1_500, 1_700, 1_990] {
        let p = at(&trace, t);
        assert!((p - 90.0).abs() < 3.0, "t={t}: {p}");
    }
}

#[test]
fn stop_lets_plant_relax() {
    static PULSES: PulseCounter = PulseCounter::new(0);
    let mut rig = rig(&tracking_config(), scenario(), &PULSES);
    let service = PumpService::new(rig.fabric.clone());

    run(&mut rig, 0, 1_000);
    service.stop().unwrap();
    let trace = run(&mut rig, 1_000, 1_500);

    assert_eq!(rig.pwm.duty(), 0);
    assert!(at(&trace, 1_490) < 5.0);
}

#[test]
fn runtime_spawns_and_idles_on_shutdown() {
    let config = SystemConfig::default();
    let (pwm, plant) = sim::plant(PlantModel::default(), config.calibration, config.pwm_max);
    let duty_view = pwm.clone();
    let fabric = Arc::new(Fabric::new(scenario()));

    let mut rt = Runtime::spawn(
        config,
        plant,
        pwm,
        MemoryStorage::new(),
        LogEventSink::new(),
        fabric.clone(),
    )
    .unwrap();

    let service = PumpService::new(fabric.clone());
    service.enumerate_modes().unwrap();
    std::thread::sleep(Duration::from_millis(300));
    assert!(fabric.status.latest().running);

    rt.shutdown();
    assert_eq!(duty_view.duty(), 0);
    assert!(fabric.shutdown_requested());
}
