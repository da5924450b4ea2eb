//! ADS1115 16-bit ADC over I²C, reading the pressure transducer on AIN0.
//!
//! The converter is put in continuous mode once at init; every read is a
//! single conversion-register fetch, so the sampling task never waits for
//! a conversion.
//!
//! Config word `0x42E3`:
//!
//! | bits  | field    | value                     |
//! |-------|----------|---------------------------|
//! | 14:12 | MUX      | `100` AIN0 vs GND         |
//! | 11:9  | PGA      | `001` ±4.096 V            |
//! | 8     | MODE     | `0` continuous            |
//! | 7:5   | DR       | `111` 860 SPS             |
//! | 1:0   | COMP_QUE | `11` comparator disabled  |

use embedded_hal::i2c::I2c;

use crate::error::SensorError;

pub const DEFAULT_ADDRESS: u8 = 0x48;

const REG_CONVERSION: u8 = 0x00;
const REG_CONFIG: u8 = 0x01;

const CONFIG_AIN0_4V096_860SPS_CONTINUOUS: u16 = 0x42E3;

/// Volts per LSB at ±4.096 V full scale.
pub const VOLTS_PER_LSB: f32 = 4.096 / 32_768.0;

pub struct Ads1115<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C: I2c> Ads1115<I2C> {
    /// Write the continuous-conversion config.
    pub fn new(i2c: I2C, address: u8) -> Result<Self, SensorError> {
        let mut adc = Self { i2c, address };
        let [hi, lo] = CONFIG_AIN0_4V096_860SPS_CONTINUOUS.to_be_bytes();
        adc.i2c
            .write(adc.address, &[REG_CONFIG, hi, lo])
            .map_err(|_| SensorError::AdcReadFailed)?;
        log::info!(
            "ads1115: continuous AIN0 @ 860 SPS on 0x{:02X}",
            adc.address
        );
        Ok(adc)
    }

    /// Latest conversion as a signed count.
    pub fn read_raw(&mut self) -> Result<i16, SensorError> {
        let mut buf = [0u8; 2];
        self.i2c
            .write_read(self.address, &[REG_CONVERSION], &mut buf)
            .map_err(|_| SensorError::AdcReadFailed)?;
        Ok(i16::from_be_bytes(buf))
    }

    /// Latest conversion in volts at the AIN0 pin.
    pub fn read_volts(&mut self) -> Result<f32, SensorError> {
        self.read_raw().map(|raw| f32::from(raw) * VOLTS_PER_LSB)
    }

    pub fn release(self) -> I2C {
        self.i2c
    }
}
