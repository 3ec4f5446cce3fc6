//! Permission gatekeeper for the two independent grants.
//!
//! Grants can be revoked from OS settings at any time, so nothing here is
//! cached: every check goes back to the platform.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{AssistError, Result};
use crate::platform::{AssistPlatform, ConsentIntent, LaunchResult, RoleSupport};
use crate::types::PermissionState;

pub struct PermissionGatekeeper {
    platform: Arc<dyn AssistPlatform>,
    package_name: String,
}

impl PermissionGatekeeper {
    pub fn new(platform: Arc<dyn AssistPlatform>, package_name: impl Into<String>) -> Self {
        Self {
            platform,
            package_name: package_name.into(),
        }
    }

    /// True iff this application currently holds the assistant role.
    ///
    /// Legacy platforms fall back to the voice-interaction service setting;
    /// anything else unknown resolves to `false`.
    pub fn check_role(&self) -> bool {
        match self.platform.role_support() {
            RoleSupport::Available => self.platform.is_role_held(),
            RoleSupport::Legacy => legacy_role_held(
                self.platform.voice_interaction_service().as_deref(),
                &self.package_name,
            ),
            RoleSupport::Unavailable | RoleSupport::Unknown => false,
        }
    }

    pub fn check_overlay(&self) -> bool {
        self.platform.can_draw_overlays()
    }

    pub fn snapshot(&self) -> PermissionState {
        PermissionState {
            role_granted: self.check_role(),
            overlay_granted: self.check_overlay(),
        }
    }

    /// Launches the platform's consent flow for the assistant role.
    ///
    /// Needs a foreground activity to host the flow. Already holding the role
    /// is a no-op success.
    pub fn request_role(&self) -> Result<()> {
        let support = self.platform.role_support();
        let intent = match support {
            RoleSupport::Available => ConsentIntent::RequestAssistantRole,
            RoleSupport::Legacy => ConsentIntent::VoiceInputSettings,
            RoleSupport::Unavailable | RoleSupport::Unknown => {
                return Err(AssistError::RoleUnavailable)
            }
        };

        if self.check_role() {
            debug!(?support, "Assistant role already held");
            return Ok(());
        }

        if !self.platform.has_foreground_activity() {
            return Err(AssistError::NoActivity);
        }

        self.launch(intent)
    }

    /// Opens the overlay-grant settings screen unless already granted.
    pub fn request_overlay(&self) -> Result<()> {
        if self.check_overlay() {
            debug!("Overlay permission already granted");
            return Ok(());
        }
        self.launch(ConsentIntent::ManageOverlayPermission)
    }

    fn launch(&self, intent: ConsentIntent) -> Result<()> {
        match self.platform.launch(intent) {
            LaunchResult::Launched => {
                info!(?intent, "Consent flow launched");
                Ok(())
            }
            LaunchResult::Unresolved => Err(AssistError::IntentUnresolved { intent }),
        }
    }
}

/// Legacy heuristic: the configured service component belongs to `package_name`.
///
/// Components look like `com.example.app/.AssistService` or
/// `com.example.app/com.example.app.AssistService`; only the package part counts.
fn legacy_role_held(service: Option<&str>, package_name: &str) -> bool {
    if package_name.is_empty() {
        return false;
    }
    let Some(component) = service.map(str::trim).filter(|s| !s.is_empty()) else {
        return false;
    };
    let package = component
        .split_once('/')
        .map(|(package, _)| package)
        .unwrap_or(component);
    package == package_name
}
