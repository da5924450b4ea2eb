//! SD card over SPI, mounted as FAT on the VFS.
//!
//! After [`mount`] succeeds, ordinary `std::fs` calls under
//! [`pins::SD_MOUNT_POINT`] reach the card, which is all
//! [`FileStorage`](crate::adapters::storage::FileStorage) needs.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdError {
    BusInitFailed(i32),
    MountFailed(i32),
}

impl fmt::Display for SdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BusInitFailed(rc) => write!(f, "SPI bus init failed (rc={})", rc),
            Self::MountFailed(rc) => write!(f, "FAT mount failed (rc={})", rc),
        }
    }
}

impl std::error::Error for SdError {}

/// Bring up SPI2 and mount the card.  Call once, before the storage
/// worker is spawned.
#[cfg(target_os = "espidf")]
pub fn mount() -> Result<(), SdError> {
    use crate::pins;

    const MOUNT_POINT: &core::ffi::CStr = c"/sdcard";
    debug_assert_eq!(MOUNT_POINT.to_str().ok(), Some(pins::SD_MOUNT_POINT));

    let host_id = spi_host_device_t_SPI2_HOST;

    // SAFETY: one-shot init from main() before any task touches the card.
    unsafe {
        let bus = spi_bus_config_t {
            __bindgen_anon_1: spi_bus_config_t__bindgen_ty_1 {
                mosi_io_num: pins::SD_MOSI_GPIO,
            },
            __bindgen_anon_2: spi_bus_config_t__bindgen_ty_2 {
                miso_io_num: pins::SD_MISO_GPIO,
            },
            sclk_io_num: pins::SD_CLK_GPIO,
            __bindgen_anon_3: spi_bus_config_t__bindgen_ty_3 { quadwp_io_num: -1 },
            __bindgen_anon_4: spi_bus_config_t__bindgen_ty_4 { quadhd_io_num: -1 },
            max_transfer_sz: 4000,
            ..Default::default()
        };
        let ret = spi_bus_initialize(host_id, &bus, spi_common_dma_t_SPI_DMA_CH_AUTO);
        if ret != ESP_OK {
            return Err(SdError::BusInitFailed(ret));
        }

        // Field-for-field SDSPI_HOST_DEFAULT().
        let host = sdmmc_host_t {
            flags: SDMMC_HOST_FLAG_SPI | SDMMC_HOST_FLAG_DEINIT_ARG,
            slot: host_id as i32,
            max_freq_khz: SDMMC_FREQ_DEFAULT as i32,
            io_voltage: 3.3,
            init: Some(sdspi_host_init),
            set_card_clk: Some(sdspi_host_set_card_clk),
            do_transaction: Some(sdspi_host_do_transaction),
            __bindgen_anon_1: sdmmc_host_t__bindgen_ty_1 {
                deinit_p: Some(sdspi_host_remove_device),
            },
            io_int_enable: Some(sdspi_host_io_int_enable),
            io_int_wait: Some(sdspi_host_io_int_wait),
            get_real_freq: Some(sdspi_host_get_real_freq),
            ..Default::default()
        };

        let slot = sdspi_device_config_t {
            host_id,
            gpio_cs: pins::SD_CS_GPIO,
            gpio_cd: -1,
            gpio_wp: -1,
            gpio_int: -1,
            ..Default::default()
        };

        let mount_cfg = esp_vfs_fat_mount_config_t {
            format_if_mount_failed: false,
            max_files: 4,
            allocation_unit_size: 16 * 1024,
            ..Default::default()
        };

        let mut card: *mut sdmmc_card_t = core::ptr::null_mut();
        let ret = esp_vfs_fat_sdspi_mount(MOUNT_POINT.as_ptr(), &host, &slot, &mount_cfg, &mut card);
        if ret != ESP_OK {
            spi_bus_free(host_id);
            return Err(SdError::MountFailed(ret));
        }
    }

    log::info!("sdcard: mounted at {}", pins::SD_MOUNT_POINT);
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn mount() -> Result<(), SdError> {
    log::info!("sdcard(sim): mount skipped");
    Ok(())
}
