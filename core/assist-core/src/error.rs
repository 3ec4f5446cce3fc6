//! Error types for assist-core operations.
//! Keep AssistFfiError minimal and stable to avoid breaking the Kotlin host.

use std::path::PathBuf;

use assist_protocol::{ErrorInfo, FailureKind, PermissionKind};

use crate::platform::ConsentIntent;

// ═══════════════════════════════════════════════════════════════════════════════
// FFI-Compatible Error (for Kotlin/Swift)
// ═══════════════════════════════════════════════════════════════════════════════

/// FFI-safe error type for use across language boundaries.
///
/// `Rejected` carries the stable failure code from the activation taxonomy so
/// the host can branch on it; everything else collapses into `General`.
#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum AssistFfiError {
    #[error("{code}: {message}")]
    Rejected { code: String, message: String },

    #[error("{message}")]
    General { message: String },
}

impl From<String> for AssistFfiError {
    fn from(message: String) -> Self {
        AssistFfiError::General { message }
    }
}

impl From<AssistError> for AssistFfiError {
    fn from(err: AssistError) -> Self {
        match err.failure_kind() {
            Some(kind) => AssistFfiError::Rejected {
                code: kind.code().to_string(),
                message: err.to_string(),
            },
            None => AssistFfiError::General {
                message: err.to_string(),
            },
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Internal Error (for Rust-only use)
// ═══════════════════════════════════════════════════════════════════════════════

/// All errors that can occur while coordinating an activation.
///
/// None of these are fatal to the host application. The coordinator turns the
/// taxonomy variants into `activation.failed` events; `ProtocolViolation` is
/// only ever logged.
#[derive(Debug, thiserror::Error)]
pub enum AssistError {
    // ─────────────────────────────────────────────────────────────────────
    // Consent Flow Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("No foreground activity to host the consent flow")]
    NoActivity,

    #[error("No OS component can handle {intent:?}")]
    IntentUnresolved { intent: ConsentIntent },

    #[error("Assistant role is not available on this platform")]
    RoleUnavailable,

    // ─────────────────────────────────────────────────────────────────────
    // Activation Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Permission missing at show time: {}", missing.as_str())]
    PermissionDenied { missing: PermissionKind },

    #[error("Activation {rejected} dropped: {active} is already in flight")]
    ConcurrentActivationConflict { active: String, rejected: String },

    #[error("{caller} does not own the overlay")]
    NotOwner { caller: String },

    #[error("{event} delivered to finished session {session}")]
    ProtocolViolation { session: String, event: String },

    // ─────────────────────────────────────────────────────────────────────
    // Configuration / Bridge Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid bridge command: {0}")]
    InvalidCommand(ErrorInfo),
}

impl AssistError {
    /// Maps the error to the wire taxonomy, if it belongs to it.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            AssistError::NoActivity => Some(FailureKind::NoActivity),
            AssistError::IntentUnresolved { .. } => Some(FailureKind::IntentUnresolved),
            AssistError::RoleUnavailable => Some(FailureKind::RoleUnavailable),
            AssistError::PermissionDenied { .. } => Some(FailureKind::PermissionDenied),
            AssistError::ConcurrentActivationConflict { .. } => {
                Some(FailureKind::ConcurrentActivationConflict)
            }
            AssistError::NotOwner { .. } => Some(FailureKind::NotOwner),
            AssistError::ProtocolViolation { .. } => Some(FailureKind::ProtocolViolation),
            AssistError::ConfigMalformed { .. }
            | AssistError::Io { .. }
            | AssistError::InvalidCommand(_) => None,
        }
    }

    /// The grant named by a `PermissionDenied` failure.
    pub fn missing_permission(&self) -> Option<PermissionKind> {
        match self {
            AssistError::PermissionDenied { missing } => Some(*missing),
            _ => None,
        }
    }
}

/// Convenience type alias for Results using AssistError.
pub type Result<T> = std::result::Result<T, AssistError>;
