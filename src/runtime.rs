//! Task layout.
//!
//! | task      | spec                    | period              | owns                         |
//! |-----------|-------------------------|---------------------|------------------------------|
//! | `control` | `TaskSpec::CONTROL`     | 1 ms                | ControlCore, Watchdog        |
//! | `telem`   | `TaskSpec::TELEMETRY`   | telemetry interval  | PumpService, EventSink       |
//! | `storage` | `TaskSpec::STORAGE`     | storage poll        | StorageWorker, StoragePort   |
//!
//! Each task receives its state by value at spawn time; the only thing
//! they share is the [`Fabric`].

use std::io;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use embedded_hal::pwm::SetDutyCycle;
use log::{info, warn};

use crate::adapters::time::MonotonicClock;
use crate::app::controller::ControlCore;
use crate::app::modes::ModeStore;
use crate::app::ports::{ClockPort, EventSink, SensorPort, StoragePort};
use crate::app::service::PumpService;
use crate::app::shared::Fabric;
use crate::app::storage_worker::StorageWorker;
use crate::config::SystemConfig;
use crate::drivers::task_pin::TaskSpec;
use crate::drivers::watchdog::Watchdog;
use crate::sensors::pulse::FLOW_PULSES;

pub struct Runtime {
    fabric: Arc<Fabric>,
    handles: Vec<JoinHandle<()>>,
}

impl Runtime {
    /// Spawn all three tasks.  A spawn failure stops the tasks already
    /// started before returning the error.
    pub fn spawn<S, P, St, E>(
        config: SystemConfig,
        sensor: S,
        pwm: P,
        storage: St,
        sink: E,
        fabric: Arc<Fabric>,
    ) -> io::Result<Self>
    where
        S: SensorPort + Send + 'static,
        P: SetDutyCycle + Send + 'static,
        St: StoragePort + Send + 'static,
        E: EventSink + Clone + Send + 'static,
    {
        let mut rt = Self {
            fabric: fabric.clone(),
            handles: Vec::with_capacity(3),
        };

        FLOW_PULSES.set_debounce_us(config.flow_debounce_us);

        let control_fabric = fabric.clone();
        let control_sink = sink.clone();
        let spawned = TaskSpec::CONTROL.spawn(move || {
            control_task(&config, sensor, pwm, control_fabric, control_sink);
        })
        .and_then(|h| {
            rt.handles.push(h);
            let service = PumpService::new(fabric.clone());
            let period = Duration::from_millis(u64::from(config.telemetry_interval_ms.max(1)));
            TaskSpec::TELEMETRY.spawn(move || {
                telemetry_task(&service, sink, period);
            })
        })
        .and_then(|h| {
            rt.handles.push(h);
            let worker = StorageWorker::new(ModeStore::new(storage), fabric.clone(), config.storage_poll_ms);
            TaskSpec::STORAGE.spawn(move || {
                worker.run();
            })
        });

        match spawned {
            Ok(h) => {
                rt.handles.push(h);
                info!("runtime: {} tasks running", rt.handles.len());
                Ok(rt)
            }
            Err(e) => {
                warn!("runtime: spawn failed ({}), stopping", e);
                rt.shutdown();
                Err(e)
            }
        }
    }

    pub fn fabric(&self) -> &Arc<Fabric> {
        &self.fabric
    }

    /// Raise the shutdown flag and wait for every task.  The control task
    /// idles the pump on its way out.
    pub fn shutdown(&mut self) {
        self.fabric.request_shutdown();
        for h in self.handles.drain(..) {
            if h.join().is_err() {
                warn!("runtime: a task panicked");
            }
        }
        info!("runtime: stopped");
    }
}

fn control_task<S: SensorPort, P: SetDutyCycle>(
    config: &SystemConfig,
    sensor: S,
    pwm: P,
    fabric: Arc<Fabric>,
    mut sink: impl EventSink,
) {
    let clock = MonotonicClock::new();
    let mut watchdog = Watchdog::new();
    let mut core = ControlCore::new(config, sensor, pwm, &FLOW_PULSES, fabric.clone(), clock.now_ms());
    let tick = Duration::from_millis(u64::from(config.inner_interval_ms.max(1)));

    while !fabric.shutdown_requested() {
        core.tick(clock.now_ms(), &mut sink);
        watchdog.feed();
        std::thread::sleep(tick);
    }

    core.shutdown();
    info!("control: stopped, {} overrun period(s)", core.overruns());
}

fn telemetry_task(service: &PumpService, mut sink: impl EventSink, period: Duration) {
    while !service.fabric().shutdown_requested() {
        service.emit_telemetry(&mut sink);
        service.drain_replies(&mut sink);
        std::thread::sleep(period);
    }
}
