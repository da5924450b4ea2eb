//! State shared between tasks.
//!
//! | item              | writer(s)                     | reader(s)             | discipline              |
//! |-------------------|-------------------------------|-----------------------|-------------------------|
//! | active parameters | service, storage worker       | control task          | critical-section mutex  |
//! | control status    | control task                  | telemetry, service    | critical-section mutex  |
//! | storage queue     | service                       | storage worker        | bounded channel, FIFO   |
//! | reply queue       | storage worker                | service               | bounded channel, FIFO   |
//! | shutdown flag     | runtime                       | every task            | atomic                  |
//!
//! Every lock holds a `Copy` value for the duration of one load or store,
//! so no task waits on another for longer than a struct copy.

use core::cell::Cell;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, TrySendError};

use super::commands::{StorageCommand, StorageReply};
use crate::error::{ConfigError, SyncError};
use crate::params::PumpParameters;

pub const STORAGE_QUEUE_DEPTH: usize = 4;
pub const REPLY_QUEUE_DEPTH: usize = 4;

/// The single active parameter block.
pub struct SharedParams {
    inner: Mutex<CriticalSectionRawMutex, Cell<PumpParameters>>,
    generation: AtomicU32,
}

impl SharedParams {
    pub fn new(initial: PumpParameters) -> Self {
        Self {
            inner: Mutex::new(Cell::new(initial)),
            generation: AtomicU32::new(0),
        }
    }

    /// Copy of the active block.
    pub fn snapshot(&self) -> PumpParameters {
        self.inner.lock(Cell::get)
    }

    /// Validate and install `next`.  A rejected block leaves the active
    /// one untouched.
    pub fn apply(&self, next: PumpParameters) -> Result<(), ConfigError> {
        self.update(|_| next).map(|_| ())
    }

    /// Read-modify-write in one critical section.
    pub fn update(
        &self,
        f: impl FnOnce(PumpParameters) -> PumpParameters,
    ) -> Result<PumpParameters, ConfigError> {
        let next = self.inner.lock(|cell| {
            let next = f(cell.get());
            next.validate()?;
            cell.set(next);
            Ok::<_, ConfigError>(next)
        })?;
        self.generation.fetch_add(1, Ordering::Release);
        Ok(next)
    }

    /// Bumped on every successful write.
    pub fn generation(&self) -> u32 {
        self.generation.load(Ordering::Acquire)
    }
}

/// Latest control-task output, published once per sampling period.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControlStatus {
    pub pressure_mmhg: f32,
    pub flow: f32,
    pub pwm: u16,
    pub setpoint_mmhg: f32,
    pub faults: u8,
    pub running: bool,
    pub cycle_index: u32,
}

pub struct SharedStatus {
    inner: Mutex<CriticalSectionRawMutex, Cell<ControlStatus>>,
}

impl Default for SharedStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedStatus {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(Cell::new(ControlStatus {
                pressure_mmhg: 0.0,
                flow: 0.0,
                pwm: 0,
                setpoint_mmhg: 0.0,
                faults: 0,
                running: false,
                cycle_index: 0,
            })),
        }
    }

    pub fn publish(&self, status: ControlStatus) {
        self.inner.lock(|cell| cell.set(status));
    }

    pub fn latest(&self) -> ControlStatus {
        self.inner.lock(Cell::get)
    }
}

pub type StorageQueue = Channel<CriticalSectionRawMutex, StorageCommand, STORAGE_QUEUE_DEPTH>;
pub type ReplyQueue = Channel<CriticalSectionRawMutex, StorageReply, REPLY_QUEUE_DEPTH>;

/// Everything the tasks share, created once at boot and handed to each
/// task at spawn time.
pub struct Fabric {
    pub params: SharedParams,
    pub status: SharedStatus,
    pub storage_queue: StorageQueue,
    pub reply_queue: ReplyQueue,
    shutdown: AtomicBool,
}

impl Fabric {
    pub fn new(initial: PumpParameters) -> Self {
        Self {
            params: SharedParams::new(initial),
            status: SharedStatus::new(),
            storage_queue: Channel::new(),
            reply_queue: Channel::new(),
            shutdown: AtomicBool::new(false),
        }
    }

    /// Queue a persistence request without waiting.
    pub fn enqueue_storage(&self, cmd: StorageCommand) -> Result<(), SyncError> {
        self.storage_queue
            .try_send(cmd)
            .map_err(|TrySendError::Full(_)| SyncError::QueueFull)
    }

    /// Next pending reply, if any.
    pub fn take_reply(&self) -> Option<StorageReply> {
        self.reply_queue.try_receive().ok()
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}
