//! PulsePump firmware: main entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  TransducerAdapter  LedcPwm        FileStorage    LogEventSink │
//! │  (SensorPort)       (SetDutyCycle) (StoragePort)  (EventSink)  │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌──────────────┐   ┌─────────────┐   ┌────────────────────┐   │
//! │  │ ControlCore  │   │ PumpService │   │ StorageWorker      │   │
//! │  │ 1 ms, core 1 │   │ telemetry   │   │ mode store         │   │
//! │  └──────────────┘   └─────────────┘   └────────────────────┘   │
//! │              └──────────── Fabric ───────────┘                 │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The main thread stays behind as the serial console: every line it
//! reads is handed to [`PumpService::handle_message`].
#![deny(unused_must_use)]

use std::sync::Arc;

use anyhow::Result;
use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::units::Hertz;
use log::{error, info, warn};

use pulsepump::adapters::console::{self, Backoff};
use pulsepump::adapters::hardware::TransducerAdapter;
use pulsepump::adapters::log_sink::LogEventSink;
use pulsepump::adapters::storage::{FileStorage, MemoryStorage};
use pulsepump::app::ports::StoragePort;
use pulsepump::app::service::PumpService;
use pulsepump::app::shared::Fabric;
use pulsepump::config::{self, SystemConfig};
use pulsepump::drivers::ads1115::{Ads1115, DEFAULT_ADDRESS};
use pulsepump::drivers::pump::LedcPwm;
use pulsepump::drivers::{hw_init, sdcard};
use pulsepump::params::PumpParameters;
use pulsepump::pins;
use pulsepump::runtime::Runtime;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("PulsePump v{}", env!("CARGO_PKG_VERSION"));

    // ── 2. Peripherals ────────────────────────────────────────
    if let Err(e) = hw_init::init_peripherals() {
        // Without the pump channel nothing below is safe to run.
        error!("HAL init failed: {} - halting", e);
        #[allow(clippy::empty_loop)]
        loop {}
    }
    if let Err(e) = hw_init::init_isr_service() {
        error!("ISR service init failed: {} - flow will read zero", e);
    }

    let p = Peripherals::take()?;
    let i2c = I2cDriver::new(
        p.i2c0,
        p.pins.gpio21,
        p.pins.gpio22,
        &I2cConfig::new().baudrate(Hertz(pins::I2C_FREQ_HZ)),
    )?;
    let adc = Ads1115::new(i2c, DEFAULT_ADDRESS)
        .map_err(|e| anyhow::anyhow!("ADS1115 init: {}", e))?;
    let sensor = TransducerAdapter::new(adc);

    // ── 3. Storage + config ───────────────────────────────────
    let storage = match sdcard::mount().map_err(|e| e.to_string()).and_then(|()| {
        FileStorage::new(pins::SD_MOUNT_POINT).map_err(|e| e.to_string())
    }) {
        Ok(fs) => Some(fs),
        Err(e) => {
            warn!("SD card unavailable ({}), modes will not persist", e);
            None
        }
    };

    let config = storage
        .as_ref()
        .map_or_else(SystemConfig::default, config::load_or_default);
    let fabric = Arc::new(Fabric::new(PumpParameters::default()));

    // ── 4. Tasks ──────────────────────────────────────────────
    let _runtime = match storage {
        Some(fs) => start(config, sensor, fs, fabric.clone())?,
        None => start(config, sensor, MemoryStorage::new(), fabric.clone())?,
    };

    // ── 5. Console ────────────────────────────────────────────
    info!("System ready. Console accepts one JSON message per line.");
    let service = PumpService::new(fabric);
    let errors = console::serve(std::io::stdin().lock(), &service, Backoff::default());
    warn!("console: input closed after {} read error(s)", errors);

    // stdin closed: keep the tasks alive.
    loop {
        std::thread::park();
    }
}

fn start<S: StoragePort + Send + 'static>(
    config: SystemConfig,
    sensor: TransducerAdapter<I2cDriver<'static>>,
    storage: S,
    fabric: Arc<Fabric>,
) -> Result<Runtime> {
    Ok(Runtime::spawn(
        config,
        sensor,
        LedcPwm::pump(),
        storage,
        LogEventSink::new(),
        fabric,
    )?)
}
