//! GPIO / peripheral pin assignments for the pump controller board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Pump motor
// ---------------------------------------------------------------------------

/// LEDC PWM output to the pump motor driver.
pub const PUMP_PWM_GPIO: i32 = 2;

// ---------------------------------------------------------------------------
// Sensors
// ---------------------------------------------------------------------------

/// Hall-effect flow sensor pulse output, rising-edge interrupt.
pub const FLOW_PULSE_GPIO: i32 = 4;

/// I²C bus to the ADS1115 pressure ADC.
pub const I2C_SDA_GPIO: i32 = 21;
pub const I2C_SCL_GPIO: i32 = 22;
/// I²C bus clock (Hz).
pub const I2C_FREQ_HZ: u32 = 400_000;

// ---------------------------------------------------------------------------
// SD card (SPI) holding the mode store
// ---------------------------------------------------------------------------

pub const SD_CS_GPIO: i32 = 5;
pub const SD_MOSI_GPIO: i32 = 25;
pub const SD_MISO_GPIO: i32 = 19;
pub const SD_CLK_GPIO: i32 = 18;
/// VFS mount point of the SD card.
pub const SD_MOUNT_POINT: &str = "/sdcard";

// ---------------------------------------------------------------------------
// PWM configuration
// ---------------------------------------------------------------------------

/// LEDC timer resolution (bits).  8-bit gives 0 – 255 duty levels.
pub const PWM_RESOLUTION_BITS: u32 = 8;
/// LEDC base frequency for the pump motor (30 kHz, inaudible).
pub const PUMP_PWM_FREQ_HZ: u32 = 30_000;
