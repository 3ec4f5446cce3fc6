//! Shared value types for the activation pipeline.

use chrono::{DateTime, Utc};

pub use assist_protocol::{FailureKind, PermissionKind, TriggerSource};

/// One normalized OS trigger. Immutable; consumed once by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationRequest {
    pub source: TriggerSource,
    /// OS session handle. Absent for keyguard launches, which have no session object.
    pub session: Option<String>,
    pub requested_at: DateTime<Utc>,
    /// Opaque assist content; never interpreted by the core.
    pub payload: Option<String>,
}

/// Point-in-time view of both grants. Never cached across activations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, uniffi::Record)]
pub struct PermissionState {
    pub role_granted: bool,
    pub overlay_granted: bool,
}

impl PermissionState {
    /// First missing grant, overlay first since it gates `show`.
    pub fn missing(&self) -> Option<PermissionKind> {
        if !self.overlay_granted {
            Some(PermissionKind::DrawOverlay)
        } else if !self.role_granted {
            Some(PermissionKind::AssistantRole)
        } else {
            None
        }
    }
}

/// FFI mirror of [`PermissionKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum PermissionGrant {
    AssistantRole,
    DrawOverlay,
}

impl From<PermissionGrant> for PermissionKind {
    fn from(grant: PermissionGrant) -> Self {
        match grant {
            PermissionGrant::AssistantRole => PermissionKind::AssistantRole,
            PermissionGrant::DrawOverlay => PermissionKind::DrawOverlay,
        }
    }
}

/// Diagnostic snapshot returned by `AssistEngine::status`.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct EngineStatus {
    pub in_flight_owner: Option<String>,
    pub overlay_visible: bool,
    pub overlay_owner: Option<String>,
    pub live_sessions: u32,
    pub pending_events: u32,
}
