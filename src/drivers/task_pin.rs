//! Pinned FreeRTOS tasks for the controller.
//!
//! Each task is described by a [`TaskSpec`]: which core, which priority,
//! how much stack.  On ESP-IDF the placement is pushed through
//! `esp_pthread_set_cfg()` right before `std::thread::Builder::spawn`, which
//! consumes it for that one `pthread_create`.  Nothing else on the calling
//! thread may spawn in between.  On the host it only names the thread
//! and sizes its stack.

use std::io;
use std::thread::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Core {
    /// PRO_CPU: telemetry and storage.
    Pro = 0,
    /// APP_CPU: the control task runs here alone.
    App = 1,
}

/// Placement of one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskSpec {
    /// NUL-terminated; FreeRTOS keeps the pointer.
    pub name: &'static str,
    pub core: Core,
    pub priority: u8,
    pub stack_kb: usize,
}

impl TaskSpec {
    /// 1 ms control loop: `configMAX_PRIORITIES - 1`.
    pub const CONTROL: Self = Self {
        name: "control\0",
        core: Core::App,
        priority: 24,
        stack_kb: 8,
    };
    pub const TELEMETRY: Self = Self {
        name: "telem\0",
        core: Core::Pro,
        priority: 5,
        stack_kb: 6,
    };
    /// Blocks on file I/O, hence the lowest priority.
    pub const STORAGE: Self = Self {
        name: "storage\0",
        core: Core::Pro,
        priority: 3,
        stack_kb: 8,
    };

    pub fn label(&self) -> &'static str {
        self.name.trim_end_matches('\0')
    }

    pub fn spawn(self, f: impl FnOnce() + Send + 'static) -> io::Result<JoinHandle<()>> {
        self.apply()?;
        log::info!(
            "task '{}': core {:?}, priority {}, {} KB stack",
            self.label(),
            self.core,
            self.priority,
            self.stack_kb
        );
        std::thread::Builder::new()
            .name(self.label().into())
            .stack_size(self.stack_kb * 1024)
            .spawn(f)
    }

    #[cfg(target_os = "espidf")]
    fn apply(&self) -> io::Result<()> {
        if !self.name.ends_with('\0') {
            return Err(io::Error::other("task name must be NUL-terminated"));
        }
        // SAFETY: `name` is 'static and NUL-terminated; the config is read
        // by the pthread_create inside the spawn that follows.
        let ret = unsafe {
            let mut cfg = esp_idf_sys::esp_create_default_pthread_config();
            cfg.pin_to_core = self.core as i32;
            cfg.prio = i32::from(self.priority);
            cfg.stack_size = (self.stack_kb * 1024) as i32;
            cfg.thread_name = self.name.as_ptr().cast();
            esp_idf_sys::esp_pthread_set_cfg(&cfg)
        };
        if ret != esp_idf_sys::ESP_OK as i32 {
            return Err(io::Error::other(format!(
                "esp_pthread_set_cfg({}) failed: {ret}",
                self.label()
            )));
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn apply(&self) -> io::Result<()> {
        Ok(())
    }
}
