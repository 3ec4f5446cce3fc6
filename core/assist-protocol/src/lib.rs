//! UI bridge protocol for the assist activation coordinator.
//!
//! This crate is shared by the core and its UI clients to prevent schema drift.
//! The core remains the authority on validation, but clients can reuse the
//! same types to decode events and construct valid commands.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_COMMAND_BYTES: usize = 64 * 1024;
pub const MAX_OWNER_ID_LEN: usize = 128;
pub const MAX_QUERY_LEN: usize = 4096;

/// OS entry point that produced an activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    ForegroundShow,
    KeyguardLaunch,
    DirectHandoff,
}

impl TriggerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerSource::ForegroundShow => "foreground_show",
            TriggerSource::KeyguardLaunch => "keyguard_launch",
            TriggerSource::DirectHandoff => "direct_handoff",
        }
    }
}

/// The two independently granted capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionKind {
    AssistantRole,
    DrawOverlay,
}

impl PermissionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionKind::AssistantRole => "assistant_role",
            PermissionKind::DrawOverlay => "draw_overlay",
        }
    }
}

/// Failure taxonomy surfaced to the UI in `activation.failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NoActivity,
    IntentUnresolved,
    RoleUnavailable,
    PermissionDenied,
    ConcurrentActivationConflict,
    NotOwner,
    ProtocolViolation,
}

impl FailureKind {
    /// Stable snake_case code; also used as the FFI error code.
    pub fn code(&self) -> &'static str {
        match self {
            FailureKind::NoActivity => "no_activity",
            FailureKind::IntentUnresolved => "intent_unresolved",
            FailureKind::RoleUnavailable => "role_unavailable",
            FailureKind::PermissionDenied => "permission_denied",
            FailureKind::ConcurrentActivationConflict => "concurrent_activation_conflict",
            FailureKind::NotOwner => "not_owner",
            FailureKind::ProtocolViolation => "protocol_violation",
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Events (core → UI)
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum BridgeEvent {
    #[serde(rename = "activation.requested")]
    Requested {
        source: TriggerSource,
        owner_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<String>,
    },
    #[serde(rename = "activation.shown")]
    Shown { owner_id: String },
    #[serde(rename = "activation.failed")]
    Failed {
        kind: FailureKind,
        owner_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        missing: Option<PermissionKind>,
    },
    #[serde(rename = "activation.hidden")]
    Hidden { owner_id: String },
    #[serde(rename = "activation.query")]
    Query { owner_id: String, text: String },
}

impl BridgeEvent {
    pub fn name(&self) -> &'static str {
        match self {
            BridgeEvent::Requested { .. } => "activation.requested",
            BridgeEvent::Shown { .. } => "activation.shown",
            BridgeEvent::Failed { .. } => "activation.failed",
            BridgeEvent::Hidden { .. } => "activation.hidden",
            BridgeEvent::Query { .. } => "activation.query",
        }
    }

    pub fn owner_id(&self) -> &str {
        match self {
            BridgeEvent::Requested { owner_id, .. }
            | BridgeEvent::Shown { owner_id }
            | BridgeEvent::Failed { owner_id, .. }
            | BridgeEvent::Hidden { owner_id }
            | BridgeEvent::Query { owner_id, .. } => owner_id,
        }
    }
}

/// Versioned, timestamped wrapper for a single event on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub protocol_version: u32,
    pub at: String,
    #[serde(flatten)]
    pub event: BridgeEvent,
}

impl EventEnvelope {
    pub fn new(event: BridgeEvent, at: DateTime<Utc>) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            at: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            event,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Commands (UI → core)
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum BridgeCommand {
    RequestPermission { kind: PermissionKind },
    Hide { owner_id: String },
    Finish { owner_id: String },
    SubmitQuery { owner_id: String, text: String },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandRequest {
    pub protocol_version: u32,
    pub command: BridgeCommand,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl BridgeCommand {
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        match self {
            BridgeCommand::RequestPermission { .. } => Ok(()),
            BridgeCommand::Hide { owner_id } | BridgeCommand::Finish { owner_id } => {
                require_owner(owner_id)
            }
            BridgeCommand::SubmitQuery { owner_id, text } => {
                require_owner(owner_id)?;
                if text.len() > MAX_QUERY_LEN {
                    return Err(ErrorInfo::new(
                        "invalid_text",
                        format!("text must be {} bytes or fewer", MAX_QUERY_LEN),
                    ));
                }
                Ok(())
            }
        }
    }
}

pub fn parse_command(raw: &str) -> Result<BridgeCommand, ErrorInfo> {
    if raw.len() > MAX_COMMAND_BYTES {
        return Err(ErrorInfo::new(
            "command_too_large",
            format!("command exceeds {} bytes", MAX_COMMAND_BYTES),
        ));
    }

    let request: CommandRequest = serde_json::from_str(raw).map_err(|err| {
        ErrorInfo::new("invalid_command", format!("command is invalid JSON: {}", err))
    })?;

    if request.protocol_version != PROTOCOL_VERSION {
        return Err(ErrorInfo::new(
            "protocol_mismatch",
            format!(
                "expected protocol_version {}, got {}",
                PROTOCOL_VERSION, request.protocol_version
            ),
        ));
    }

    request.command.validate()?;
    Ok(request.command)
}

fn require_owner(owner_id: &str) -> Result<(), ErrorInfo> {
    if owner_id.trim().is_empty() {
        return Err(ErrorInfo::new("missing_field", "owner_id is required"));
    }
    if owner_id.len() > MAX_OWNER_ID_LEN {
        return Err(ErrorInfo::new(
            "invalid_owner_id",
            format!("owner_id must be {} characters or fewer", MAX_OWNER_ID_LEN),
        ));
    }
    Ok(())
}
