//! Inbound commands to the application core.
//!
//! Two kinds of traffic arrive from the transport and the console:
//!
//! - [`InboundMessage`]: JSON parsed on the transport task.  Either a
//!   partial parameter update or a `{"cmd": ...}` control message.
//! - [`StorageCommand`]: the owned, bounded record queued to the storage
//!   worker.  Enqueued once, consumed exactly once.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Error, StorageError};
use crate::params::{ParamUpdate, PumpParameters};

/// Longest mode name in bytes.
pub const MODE_NAME_LEN: usize = 16;
/// Most modes the store will index.
pub const MAX_MODES: usize = 16;

pub type ModeName = heapless::String<MODE_NAME_LEN>;
pub type ModeList = heapless::Vec<ModeName, MAX_MODES>;

/// Persistence operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StorageCommandKind {
    /// Read a mode and make it the active parameter block.
    Load,
    /// Create or overwrite a mode.
    Save,
    /// Create a mode; fails if it exists.
    Add,
    /// Remove a mode.
    #[serde(alias = "DEL")]
    Delete,
    /// Enumerate stored mode names.
    List,
}

/// One queued persistence request.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageCommand {
    pub kind: StorageCommandKind,
    /// Empty for [`StorageCommandKind::List`].
    pub mode: ModeName,
    /// Parameters to store for SAVE / ADD.
    pub payload: Option<PumpParameters>,
}

impl StorageCommand {
    /// Build a command, rejecting names that do not fit the bounded type.
    pub fn new(
        kind: StorageCommandKind,
        mode: &str,
        payload: Option<PumpParameters>,
    ) -> Result<Self, StorageError> {
        let name = mode_name(mode)
            .or_else(|e| {
                if kind == StorageCommandKind::List {
                    Ok(ModeName::new())
                } else {
                    Err(e)
                }
            })?;
        Ok(Self {
            kind,
            mode: name,
            payload,
        })
    }

    pub fn list() -> Self {
        Self {
            kind: StorageCommandKind::List,
            mode: ModeName::new(),
            payload: None,
        }
    }
}

/// Characters allowed in mode names and in storage namespaces and keys.
pub fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Validate a mode name: 1..=16 of `[A-Za-z0-9_-]`.
pub fn mode_name(name: &str) -> Result<ModeName, StorageError> {
    if name.is_empty() || !name.chars().all(is_name_char) {
        return Err(StorageError::InvalidName);
    }
    ModeName::try_from(name).map_err(|_| StorageError::InvalidName)
}

/// Result payload of a completed persistence request.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageOutcome {
    Done,
    Loaded(PumpParameters),
    Modes(ModeList),
}

/// Worker → requester reply: the command echoed with its result.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageReply {
    pub command: StorageCommand,
    pub result: Result<StorageOutcome, Error>,
}

// ───────────────────────────────────────────────────────────────
// Transport / console messages
// ───────────────────────────────────────────────────────────────

/// `{"cmd": ...}` control message.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "cmd", rename_all = "UPPERCASE")]
pub enum ControlMessage {
    Start,
    Stop,
    Load {
        mode: String,
    },
    Save {
        mode: String,
        #[serde(default)]
        params: Option<PumpParameters>,
    },
    Add {
        mode: String,
        #[serde(default)]
        params: Option<PumpParameters>,
    },
    #[serde(alias = "DEL")]
    Delete {
        mode: String,
    },
    List,
}

/// Any message a collaborator may send.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum InboundMessage {
    Control(ControlMessage),
    Update(ParamUpdate),
}

impl InboundMessage {
    /// Parse one framed JSON message.  Anything unparseable, including
    /// unknown fields or commands, is rejected whole.
    pub fn parse(bytes: &[u8]) -> Result<Self, ConfigError> {
        serde_json::from_slice(bytes).map_err(|_| ConfigError::Malformed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mode_command() {
        let m = InboundMessage::parse(br#"{"cmd":"LOAD","mode":"rest"}"#).unwrap();
        assert_eq!(
            m,
            InboundMessage::Control(ControlMessage::Load {
                mode: "rest".into()
            })
        );
    }

    #[test]
    fn del_alias_accepted() {
        let m = InboundMessage::parse(br#"{"cmd":"DEL","mode":"rest"}"#).unwrap();
        assert!(matches!(
            m,
            InboundMessage::Control(ControlMessage::Delete { .. })
        ));
    }

    #[test]
    fn parses_partial_update() {
        let m = InboundMessage::parse(br#"{"heartRateBpm":72}"#).unwrap();
        match m {
            InboundMessage::Update(u) => {
                assert_eq!(u.heart_rate_bpm, Some(72));
                assert_eq!(u.systolic_pressure, None);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_command_and_fields() {
        assert_eq!(
            InboundMessage::parse(br#"{"cmd":"REBOOT"}"#),
            Err(ConfigError::Malformed)
        );
        assert_eq!(
            InboundMessage::parse(br#"{"heartRate":72}"#),
            Err(ConfigError::Malformed)
        );
        assert_eq!(InboundMessage::parse(b"{not json"), Err(ConfigError::Malformed));
    }

    #[test]
    fn mode_names_bounded() {
        assert!(mode_name("rest").is_ok());
        assert_eq!(mode_name(""), Err(StorageError::InvalidName));
        assert_eq!(
            mode_name("seventeen_chars__"),
            Err(StorageError::InvalidName)
        );
        assert_eq!(mode_name("../etc"), Err(StorageError::InvalidName));
        assert_eq!(mode_name("has space"), Err(StorageError::InvalidName));
        assert_eq!(mode_name("a+b"), Err(StorageError::InvalidName));
        assert_eq!(mode_name("r\u{e9}st"), Err(StorageError::InvalidName));
        assert!(mode_name("Rest_2-b").is_ok());
    }

    #[test]
    fn list_command_needs_no_name() {
        let c = StorageCommand::new(StorageCommandKind::List, "", None).unwrap();
        assert!(c.mode.is_empty());
        assert!(StorageCommand::new(StorageCommandKind::Load, "", None).is_err());
    }
}
