//! Hardware adapter: bridges the transducer ADC to [`SensorPort`].
//!
//! Any `embedded_hal::i2c::I2c` bus works; on target it is the ESP-IDF
//! I²C master driver, in tests a fake bus.

use embedded_hal::i2c::I2c;
use log::warn;

use crate::app::ports::SensorPort;
use crate::drivers::ads1115::Ads1115;
use crate::error::SensorError;

/// ADS1115 on channel A0 behind the pressure divider.
pub struct TransducerAdapter<I2C: I2c> {
    adc: Ads1115<I2C>,
    failures: u32,
}

impl<I2C: I2c> TransducerAdapter<I2C> {
    pub fn new(adc: Ads1115<I2C>) -> Self {
        Self { adc, failures: 0 }
    }

    /// Bus errors since boot.
    pub fn failures(&self) -> u32 {
        self.failures
    }
}

impl<I2C: I2c> SensorPort for TransducerAdapter<I2C> {
    fn read_transducer_volts(&mut self) -> Result<f32, SensorError> {
        self.adc.read_volts().inspect_err(|_| {
            if self.failures == 0 {
                warn!("hw: first ADC read failure");
            }
            self.failures = self.failures.saturating_add(1);
        })
    }
}
