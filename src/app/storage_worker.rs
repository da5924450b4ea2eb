//! Persistence worker: drains the storage queue one command at a time.
//!
//! Runs on a low-priority task.  Each command is processed to completion
//! before the next is dequeued, and its result is posted to the reply
//! queue.  Failures are reported, never retried.

use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};

use super::commands::{StorageCommand, StorageCommandKind, StorageOutcome, StorageReply};
use super::modes::ModeStore;
use super::ports::StoragePort;
use super::shared::Fabric;
use crate::error::Error;
use crate::params::PumpParameters;

pub struct StorageWorker<S: StoragePort> {
    store: ModeStore<S>,
    fabric: Arc<Fabric>,
    poll: Duration,
}

impl<S: StoragePort> StorageWorker<S> {
    pub fn new(store: ModeStore<S>, fabric: Arc<Fabric>, poll_ms: u32) -> Self {
        Self {
            store,
            fabric,
            poll: Duration::from_millis(u64::from(poll_ms.max(1))),
        }
    }

    /// Execute one command against the store and the active parameters.
    pub fn process(&mut self, command: StorageCommand) -> StorageReply {
        let result = self.execute(&command);
        match &result {
            Ok(_) => info!("storage: {:?} '{}' ok", command.kind, command.mode),
            Err(e) => warn!("storage: {:?} '{}' failed: {}", command.kind, command.mode, e),
        }
        StorageReply { command, result }
    }

    fn execute(&mut self, command: &StorageCommand) -> Result<StorageOutcome, Error> {
        let name = command.mode.as_str();
        match command.kind {
            StorageCommandKind::Load => {
                let stored = self.store.load(name)?;
                // A preset carries a shape, not a run state.
                let applied = self.fabric.params.update(|cur| PumpParameters {
                    start_pump: cur.start_pump,
                    ..stored
                })?;
                Ok(StorageOutcome::Loaded(applied))
            }
            StorageCommandKind::Save | StorageCommandKind::Add => {
                let params = command
                    .payload
                    .unwrap_or_else(|| self.fabric.params.snapshot());
                params.validate()?;
                if command.kind == StorageCommandKind::Add {
                    self.store.add(name, &params)?;
                } else {
                    self.store.save(name, &params)?;
                }
                Ok(StorageOutcome::Done)
            }
            StorageCommandKind::Delete => {
                self.store.delete(name)?;
                Ok(StorageOutcome::Done)
            }
            StorageCommandKind::List => Ok(StorageOutcome::Modes(self.store.list()?)),
        }
    }

    /// Handle at most one queued command.  Returns `true` if one was handled.
    pub fn run_once(&mut self) -> bool {
        let Ok(command) = self.fabric.storage_queue.try_receive() else {
            return false;
        };
        let reply = self.process(command);
        if self.fabric.reply_queue.try_send(reply).is_err() {
            warn!("storage: reply queue full, reply dropped");
        }
        true
    }

    /// Worker loop.  Sleeps `poll` between empty checks and exits once
    /// shutdown is requested.
    pub fn run(mut self) {
        info!("storage: worker started");
        while !self.fabric.shutdown_requested() {
            if !self.run_once() {
                std::thread::sleep(self.poll);
            }
        }
        info!("storage: worker stopped");
    }

    pub fn store(&self) -> &ModeStore<S> {
        &self.store
    }
}
