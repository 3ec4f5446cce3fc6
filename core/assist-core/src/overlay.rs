//! The single overlay surface and its owner.
//!
//! Owner tracking is the only mutual exclusion: a second owner can never show
//! while the first is Showing, and only the owner can hide.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{AssistError, Result};
use crate::gatekeeper::PermissionGatekeeper;
use crate::platform::PresentationHost;
use crate::types::PermissionKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlayVisibility {
    #[default]
    Hidden,
    Showing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowOutcome {
    Shown,
    /// Same owner was already showing; nothing was presented.
    AlreadyShowing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HideOutcome {
    Hidden,
    AlreadyHidden,
}

pub struct OverlayController {
    visibility: OverlayVisibility,
    owner: Option<String>,
    host: Arc<dyn PresentationHost>,
}

impl OverlayController {
    pub fn new(host: Arc<dyn PresentationHost>) -> Self {
        Self {
            visibility: OverlayVisibility::Hidden,
            owner: None,
            host,
        }
    }

    pub fn visibility(&self) -> OverlayVisibility {
        self.visibility
    }

    pub fn is_showing(&self) -> bool {
        self.visibility == OverlayVisibility::Showing
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    /// Shows the overlay for `owner`.
    ///
    /// The draw-overlay grant is re-checked on every call. A missing grant
    /// fails without touching state and without asking for the grant.
    pub fn show(
        &mut self,
        owner: &str,
        payload: Option<String>,
        gatekeeper: &PermissionGatekeeper,
    ) -> Result<ShowOutcome> {
        if let Some(current) = self.owner.as_deref().filter(|_| self.is_showing()) {
            if current == owner {
                debug!(owner, "Overlay already showing for owner");
                return Ok(ShowOutcome::AlreadyShowing);
            }
            warn!(active = current, rejected = owner, "Overlay owned by another activation");
            return Err(AssistError::ConcurrentActivationConflict {
                active: current.to_string(),
                rejected: owner.to_string(),
            });
        }

        Self::ensure_permission(gatekeeper)?;

        self.visibility = OverlayVisibility::Showing;
        self.owner = Some(owner.to_string());
        self.host.present_overlay(owner.to_string(), payload);
        info!(owner, "Overlay shown");
        Ok(ShowOutcome::Shown)
    }

    /// Hides the overlay if `caller` owns it. Hiding a hidden overlay succeeds.
    pub fn hide(&mut self, caller: &str) -> Result<HideOutcome> {
        if !self.is_showing() {
            debug!(caller, "Overlay already hidden");
            return Ok(HideOutcome::AlreadyHidden);
        }
        if self.owner.as_deref() != Some(caller) {
            warn!(caller, owner = ?self.owner, "Hide from non-owner");
            return Err(AssistError::NotOwner {
                caller: caller.to_string(),
            });
        }

        self.visibility = OverlayVisibility::Hidden;
        self.owner = None;
        self.host.dismiss_overlay(caller.to_string());
        info!(owner = caller, "Overlay hidden");
        Ok(HideOutcome::Hidden)
    }

    fn ensure_permission(gatekeeper: &PermissionGatekeeper) -> Result<()> {
        if gatekeeper.check_overlay() {
            Ok(())
        } else {
            Err(AssistError::PermissionDenied {
                missing: PermissionKind::DrawOverlay,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{HostCall, RecordingHost, RecordingPlatform};

    fn setup() -> (
        Arc<RecordingPlatform>,
        Arc<RecordingHost>,
        PermissionGatekeeper,
        OverlayController,
    ) {
        let platform = Arc::new(RecordingPlatform::granted());
        let host = Arc::new(RecordingHost::new());
        let gatekeeper = PermissionGatekeeper::new(platform.clone(), "com.example.assist");
        let overlay = OverlayController::new(host.clone());
        (platform, host, gatekeeper, overlay)
    }

    #[test]
    fn show_presents_once_per_owner() {
        let (_, host, gatekeeper, mut overlay) = setup();

        assert_eq!(
            overlay.show("a", Some("p".into()), &gatekeeper).unwrap(),
            ShowOutcome::Shown
        );
        assert_eq!(
            overlay.show("a", Some("p".into()), &gatekeeper).unwrap(),
            ShowOutcome::AlreadyShowing
        );
        assert_eq!(host.present_count(), 1);
        assert_eq!(overlay.owner(), Some("a"));
    }

    #[test]
    fn show_for_other_owner_conflicts() {
        let (_, host, gatekeeper, mut overlay) = setup();
        overlay.show("a", None, &gatekeeper).unwrap();

        let err = overlay.show("b", None, &gatekeeper).unwrap_err();
        assert!(matches!(
            err,
            AssistError::ConcurrentActivationConflict { ref active, ref rejected }
                if active == "a" && rejected == "b"
        ));
        assert_eq!(overlay.owner(), Some("a"));
        assert_eq!(host.present_count(), 1);
    }

    #[test]
    fn show_without_overlay_grant_leaves_state_untouched() {
        let (platform, host, gatekeeper, mut overlay) = setup();
        platform.set_overlay(false);

        let err = overlay.show("a", None, &gatekeeper).unwrap_err();
        assert_eq!(err.missing_permission(), Some(PermissionKind::DrawOverlay));
        assert_eq!(overlay.visibility(), OverlayVisibility::Hidden);
        assert_eq!(overlay.owner(), None);
        assert!(host.calls().is_empty());
        // Never silently asks for the grant.
        assert!(platform.launched().is_empty());
    }

    #[test]
    fn hide_is_idempotent() {
        let (_, host, gatekeeper, mut overlay) = setup();
        overlay.show("a", None, &gatekeeper).unwrap();

        assert_eq!(overlay.hide("a").unwrap(), HideOutcome::Hidden);
        assert_eq!(overlay.hide("a").unwrap(), HideOutcome::AlreadyHidden);
        let dismisses = host
            .calls()
            .into_iter()
            .filter(|c| matches!(c, HostCall::Dismiss { .. }))
            .count();
        assert_eq!(dismisses, 1);
    }

    #[test]
    fn hide_by_non_owner_fails() {
        let (_, _, gatekeeper, mut overlay) = setup();
        overlay.show("a", None, &gatekeeper).unwrap();

        let err = overlay.hide("b").unwrap_err();
        assert!(matches!(err, AssistError::NotOwner { ref caller } if caller == "b"));
        assert!(overlay.is_showing());
        assert_eq!(overlay.owner(), Some("a"));
    }

    #[test]
    fn new_owner_can_show_after_hide() {
        let (_, host, gatekeeper, mut overlay) = setup();
        overlay.show("a", None, &gatekeeper).unwrap();
        overlay.hide("a").unwrap();

        assert_eq!(
            overlay.show("b", None, &gatekeeper).unwrap(),
            ShowOutcome::Shown
        );
        assert_eq!(host.present_count(), 2);
    }
}
