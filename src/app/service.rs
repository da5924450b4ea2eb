//! Application service: the surface transports and the console talk to.
//!
//! [`PumpService`] never touches hardware.  Parameter writes go through
//! [`SharedParams`](super::shared::SharedParams) (validated, atomic) and
//! persistence requests go onto the storage queue.  The service never
//! blocks on either.
//!
//! ```text
//!  transport ──JSON──▶ ┌──────────────┐ ──▶ SharedParams ──▶ control task
//!                      │  PumpService │ ──▶ storage queue ─▶ storage worker
//!  transport ◀─JSON─── └──────────────┘ ◀── reply queue  ◀──┘
//! ```

use std::sync::Arc;

use log::{info, warn};

use super::commands::{
    ControlMessage, InboundMessage, StorageCommand, StorageCommandKind, StorageOutcome,
    StorageReply,
};
use super::events::{AppEvent, TelemetrySnapshot};
use super::ports::EventSink;
use super::shared::Fabric;
use crate::error::{ConfigError, Result};
use crate::params::{ParamUpdate, PumpParameters};

pub struct PumpService {
    fabric: Arc<Fabric>,
}

impl PumpService {
    pub fn new(fabric: Arc<Fabric>) -> Self {
        Self { fabric }
    }

    pub fn fabric(&self) -> &Arc<Fabric> {
        &self.fabric
    }

    // ── Transport operations ──────────────────────────────────

    /// Latest measurements plus the active parameter block.
    pub fn get_telemetry_snapshot(&self) -> TelemetrySnapshot {
        let status = self.fabric.status.latest();
        TelemetrySnapshot {
            pressure: status.pressure_mmhg,
            flow: status.flow,
            pwm: status.pwm,
            setpoint: status.setpoint_mmhg,
            faults: status.faults,
            params: self.fabric.params.snapshot(),
        }
    }

    /// Replace the whole parameter block.  Rejected blocks leave the
    /// active one unchanged.
    pub fn apply_parameter_update(&self, params: PumpParameters) -> core::result::Result<(), ConfigError> {
        self.fabric.params.apply(params).inspect_err(|e| {
            warn!("service: parameter block rejected: {}", e);
        })
    }

    /// Overlay the fields present in `update` onto the active block.
    pub fn apply_partial(&self, update: &ParamUpdate) -> core::result::Result<PumpParameters, ConfigError> {
        self.fabric
            .params
            .update(|current| update.apply_to(current))
            .inspect_err(|e| warn!("service: parameter update rejected: {}", e))
    }

    pub fn start(&self) -> core::result::Result<(), ConfigError> {
        self.set_running(true)
    }

    pub fn stop(&self) -> core::result::Result<(), ConfigError> {
        self.set_running(false)
    }

    fn set_running(&self, run: bool) -> core::result::Result<(), ConfigError> {
        self.fabric
            .params
            .update(|p| PumpParameters { start_pump: run, ..p })
            .map(|_| info!("service: start_pump = {}", run))
    }

    // ── Persistence operations (queued) ───────────────────────

    pub fn enumerate_modes(&self) -> Result<()> {
        self.queue(StorageCommand::list())
    }

    pub fn load_mode(&self, name: &str) -> Result<()> {
        self.queue(StorageCommand::new(StorageCommandKind::Load, name, None)?)
    }

    /// Store `params`, or the active block as of now when `None`.
    pub fn save_mode(&self, name: &str, params: Option<PumpParameters>) -> Result<()> {
        let params = params.unwrap_or_else(|| self.fabric.params.snapshot());
        self.queue(StorageCommand::new(StorageCommandKind::Save, name, Some(params))?)
    }

    pub fn add_mode(&self, name: &str, params: Option<PumpParameters>) -> Result<()> {
        let params = params.unwrap_or_else(|| self.fabric.params.snapshot());
        self.queue(StorageCommand::new(StorageCommandKind::Add, name, Some(params))?)
    }

    pub fn delete_mode(&self, name: &str) -> Result<()> {
        self.queue(StorageCommand::new(StorageCommandKind::Delete, name, None)?)
    }

    fn queue(&self, command: StorageCommand) -> Result<()> {
        let kind = command.kind;
        self.fabric.enqueue_storage(command).inspect_err(|_| {
            warn!("service: storage queue full, {:?} dropped", kind);
        })?;
        Ok(())
    }

    // ── Inbound messages ──────────────────────────────────────

    /// Parse and act on one inbound JSON message.  Nothing is applied
    /// when the message is malformed.
    pub fn handle_message(&self, bytes: &[u8]) -> Result<()> {
        let message = InboundMessage::parse(bytes).inspect_err(|_| {
            warn!("service: malformed message ({} bytes) ignored", bytes.len());
        })?;
        match message {
            InboundMessage::Update(update) => {
                self.apply_partial(&update)?;
            }
            InboundMessage::Control(control) => self.handle_control(control)?,
        }
        Ok(())
    }

    fn handle_control(&self, control: ControlMessage) -> Result<()> {
        match control {
            ControlMessage::Start => self.start()?,
            ControlMessage::Stop => self.stop()?,
            ControlMessage::Load { mode } => self.load_mode(&mode)?,
            ControlMessage::Save { mode, params } => self.save_mode(&mode, params)?,
            ControlMessage::Add { mode, params } => self.add_mode(&mode, params)?,
            ControlMessage::Delete { mode } => self.delete_mode(&mode)?,
            ControlMessage::List => self.enumerate_modes()?,
        }
        Ok(())
    }

    // ── Outbound ──────────────────────────────────────────────

    pub fn emit_telemetry(&self, sink: &mut impl EventSink) {
        sink.emit(&AppEvent::Telemetry(self.get_telemetry_snapshot()));
    }

    /// Forward every finished storage command to `sink`.  Returns the
    /// replies so callers can inspect loaded data or listings.
    pub fn drain_replies(&self, sink: &mut impl EventSink) -> Vec<StorageReply> {
        let mut replies = Vec::new();
        while let Some(reply) = self.fabric.take_reply() {
            let ok = reply.result.as_ref().map(|_| ()).map_err(|e| *e);
            sink.emit(&AppEvent::StorageResult {
                kind: reply.command.kind,
                ok,
            });
            if let Ok(StorageOutcome::Modes(list)) = &reply.result {
                info!("service: {} stored mode(s)", list.len());
            }
            replies.push(reply);
        }
        replies
    }
}
