//! Assist activation coordinator.
//!
//! Consumes routed triggers and enforces a single in-flight activation. It
//! drives the session and overlay controllers so every activation ends with
//! its session Finished and the overlay shown at most once. Every gatekeeper
//! or overlay failure is converted into an `activation.failed` event here;
//! protocol violations are logged and swallowed.
//!
//! Events are queued in an [`EventOutbox`]; callers drain them with
//! [`Coordinator::take_events`] and deliver them outside any lock.

use std::sync::Arc;

use assist_protocol::{BridgeEvent, EventEnvelope};
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::config::{AssistConfig, UiSuppression};
use crate::error::{AssistError, Result};
use crate::gatekeeper::PermissionGatekeeper;
use crate::outbox::EventOutbox;
use crate::overlay::{HideOutcome, OverlayController, ShowOutcome};
use crate::platform::{AssistPlatform, Clock, PresentationHost, TimerScheduler};
use crate::router::ActivationSink;
use crate::session::{SessionController, SessionEvent, SessionOrigin, SessionState};
use crate::types::{ActivationRequest, EngineStatus, PermissionKind, PermissionState};

const KEYGUARD_OWNER_PREFIX: &str = "keyguard-";

pub struct Coordinator {
    gatekeeper: PermissionGatekeeper,
    sessions: SessionController,
    overlay: OverlayController,
    outbox: EventOutbox,
    clock: Arc<dyn Clock>,
    in_flight: Option<String>,
}

impl Coordinator {
    pub fn new(
        config: &AssistConfig,
        platform: Arc<dyn AssistPlatform>,
        host: Arc<dyn PresentationHost>,
        scheduler: Arc<dyn TimerScheduler>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            gatekeeper: PermissionGatekeeper::new(platform, config.package_name.clone()),
            sessions: SessionController::new(config, host.clone(), scheduler),
            overlay: OverlayController::new(host),
            outbox: EventOutbox::new(config.pending_event_limit),
            clock,
            in_flight: None,
        }
    }

    pub fn gatekeeper(&self) -> &PermissionGatekeeper {
        &self.gatekeeper
    }

    pub fn in_flight(&self) -> Option<&str> {
        self.in_flight.as_deref()
    }

    pub fn overlay_owner(&self) -> Option<&str> {
        self.overlay.owner()
    }

    pub fn session_state(&self, session: &str) -> Option<SessionState> {
        self.sessions.state(session)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Activation
    // ─────────────────────────────────────────────────────────────────────────

    /// Runs one activation request to hand-off.
    ///
    /// Returns the error that was surfaced as `activation.failed`, if any.
    pub fn handle_activation(&mut self, request: ActivationRequest) -> Result<()> {
        let (owner, origin) = match request.session.as_deref() {
            Some(session) => (session.to_string(), SessionOrigin::Os),
            None => (
                format!("{}{}", KEYGUARD_OWNER_PREFIX, Ulid::new()),
                SessionOrigin::Synthetic,
            ),
        };

        if let Some(active) = self.in_flight.clone().filter(|active| *active != owner) {
            return Err(self.reject_concurrent(active, owner, origin, &request));
        }

        self.sessions
            .acquire(&owner, origin, request.requested_at)?;

        if self.in_flight.is_none() {
            info!(owner = %owner, source = request.source.as_str(), "Activation accepted");
            self.set_in_flight(Some(owner.clone()));
            self.emit(BridgeEvent::Requested {
                source: request.source,
                owner_id: owner.clone(),
                payload: request.payload.clone(),
            });
        } else {
            debug!(owner = %owner, source = request.source.as_str(), "Duplicate trigger for in-flight activation");
        }

        self.sessions.on_trigger(&owner, request.source)?;
        self.sessions
            .suppress_default_ui(&owner, UiSuppression::BeforeLaunch);

        let shown = self
            .overlay
            .show(&owner, request.payload, &self.gatekeeper);
        match &shown {
            Ok(ShowOutcome::Shown) => self.emit(BridgeEvent::Shown {
                owner_id: owner.clone(),
            }),
            Ok(ShowOutcome::AlreadyShowing) => {}
            Err(err) => {
                warn!(owner = %owner, error = %err, "Overlay hand-off failed");
                self.surface_failure(err, &owner);
                if self.overlay.owner() != Some(owner.as_str()) {
                    self.set_in_flight(None);
                }
            }
        }

        self.sessions
            .suppress_default_ui(&owner, UiSuppression::AfterLaunch);
        // The session terminates whether or not the overlay could render.
        if let Err(err) = self.sessions.begin_finish(&owner) {
            debug!(owner = %owner, error = %err, "Session already finished");
        }

        shown.map(|_| ())
    }

    fn reject_concurrent(
        &mut self,
        active: String,
        rejected: String,
        origin: SessionOrigin,
        request: &ActivationRequest,
    ) -> AssistError {
        warn!(
            active = %active,
            rejected = %rejected,
            source = request.source.as_str(),
            "Activation rejected: another activation is in flight"
        );

        // A rejected OS session must still terminate.
        if origin == SessionOrigin::Os
            && self
                .sessions
                .acquire(&rejected, origin, request.requested_at)
                .is_ok()
        {
            if let Err(err) = self.sessions.finish_now(&rejected) {
                debug!(session = %rejected, error = %err, "Rejected session already finished");
            }
        }

        let err = AssistError::ConcurrentActivationConflict {
            active,
            rejected: rejected.clone(),
        };
        self.surface_failure(&err, &rejected);
        err
    }

    // ─────────────────────────────────────────────────────────────────────────
    // UI commands
    // ─────────────────────────────────────────────────────────────────────────

    /// Hides the overlay for `owner` and finishes its session.
    ///
    /// Idempotent: hiding an already hidden overlay succeeds and leaves
    /// sessions alone unless `owner` is still the in-flight activation.
    pub fn hide(&mut self, owner: &str) -> Result<()> {
        match self.overlay.hide(owner) {
            Ok(HideOutcome::Hidden) => {
                self.emit(BridgeEvent::Hidden {
                    owner_id: owner.to_string(),
                });
            }
            Ok(HideOutcome::AlreadyHidden) if self.in_flight.as_deref() != Some(owner) => {
                debug!(owner, "Hide on hidden overlay ignored");
                return Ok(());
            }
            Ok(HideOutcome::AlreadyHidden) => {}
            Err(err) => {
                self.surface_failure(&err, owner);
                return Err(err);
            }
        }

        if let Err(err) = self.sessions.finish_now(owner) {
            debug!(owner, error = %err, "Session already finished");
        }
        if self.in_flight.as_deref() == Some(owner) {
            info!(owner, "Activation complete");
            self.set_in_flight(None);
        }
        Ok(())
    }

    /// Same as [`Coordinator::hide`]; kept separate on the bridge.
    pub fn finish(&mut self, owner: &str) -> Result<()> {
        self.hide(owner)
    }

    /// Hands the user's query to the app and closes the overlay.
    pub fn submit_query(&mut self, owner: &str, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            debug!(owner, "Empty query ignored");
            return Ok(());
        }
        if self.overlay.owner() != Some(owner) {
            let err = AssistError::NotOwner {
                caller: owner.to_string(),
            };
            warn!(owner, "Query from non-owner");
            self.surface_failure(&err, owner);
            return Err(err);
        }

        self.emit(BridgeEvent::Query {
            owner_id: owner.to_string(),
            text: text.to_string(),
        });
        self.hide(owner)
    }

    /// Launches the consent flow for `kind`. Never triggered from activation.
    pub fn request_permission(&mut self, kind: PermissionKind) -> Result<()> {
        let result = match kind {
            PermissionKind::AssistantRole => self.gatekeeper.request_role(),
            PermissionKind::DrawOverlay => self.gatekeeper.request_overlay(),
        };
        if let Err(err) = &result {
            warn!(kind = kind.as_str(), error = %err, "Permission request failed");
            let owner = self.in_flight.clone().unwrap_or_default();
            self.surface_failure(err, &owner);
        }
        result
    }

    pub fn permission_state(&self) -> PermissionState {
        let state = self.gatekeeper.snapshot();
        if let Some(missing) = state.missing() {
            debug!(missing = missing.as_str(), "Permission not granted");
        }
        state
    }

    // ─────────────────────────────────────────────────────────────────────────
    // OS session callbacks
    // ─────────────────────────────────────────────────────────────────────────

    pub fn on_session_created(&mut self, session: &str) {
        let now = self.clock.now();
        if let Err(err) = self.sessions.acquire(session, SessionOrigin::Os, now) {
            debug!(session, error = %err, "Session creation ignored");
        }
    }

    /// OS teardown. Finishes the session only; the app-owned overlay stays.
    pub fn on_session_hidden(&mut self, session: &str) {
        self.sessions.teardown(session, SessionEvent::OsHide);
    }

    pub fn on_session_destroyed(&mut self, session: &str) {
        self.sessions.teardown(session, SessionEvent::OsDestroy);
    }

    pub fn on_timer_fired(&mut self, timer_id: u64) {
        if let Some(session) = self.sessions.on_timer_fired(timer_id) {
            debug!(session = %session, timer_id, "Grace delay elapsed");
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Bridge delivery
    // ─────────────────────────────────────────────────────────────────────────

    pub fn set_ui_ready(&mut self, ready: bool) {
        self.outbox.set_ready(ready);
    }

    /// Events ready for the UI bridge, in emission order.
    pub fn take_events(&mut self) -> Vec<EventEnvelope> {
        self.outbox.drain()
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            in_flight_owner: self.in_flight.clone(),
            overlay_visible: self.overlay.is_showing(),
            overlay_owner: self.overlay.owner().map(str::to_string),
            live_sessions: self.sessions.live_count() as u32,
            pending_events: self.outbox.len() as u32,
        }
    }

    /// The in-flight owner's session is pinned so a late OS callback for it
    /// still hits a Finished session instead of creating a new one.
    fn set_in_flight(&mut self, owner: Option<String>) {
        self.sessions.pin(owner.as_deref());
        self.in_flight = owner;
    }

    fn surface_failure(&mut self, err: &AssistError, owner: &str) {
        let Some(kind) = err.failure_kind() else {
            return;
        };
        self.emit(BridgeEvent::Failed {
            kind,
            owner_id: owner.to_string(),
            missing: err.missing_permission(),
        });
    }

    fn emit(&mut self, event: BridgeEvent) {
        self.outbox
            .push(EventEnvelope::new(event, self.clock.now()));
    }
}

impl ActivationSink for Coordinator {
    fn submit(&mut self, request: ActivationRequest) {
        if let Err(err) = self.handle_activation(request) {
            debug!(error = %err, "Activation did not complete");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FixedClock, ManualScheduler, RecordingHost, RecordingPlatform};
    use crate::types::TriggerSource;

    fn coordinator() -> (Arc<RecordingPlatform>, Coordinator) {
        let platform = Arc::new(RecordingPlatform::granted());
        let mut coordinator = Coordinator::new(
            &AssistConfig::default(),
            platform.clone(),
            Arc::new(RecordingHost::new()),
            Arc::new(ManualScheduler::new()),
            Arc::new(FixedClock::epoch()),
        );
        coordinator.set_ui_ready(true);
        (platform, coordinator)
    }

    fn request(source: TriggerSource, session: Option<&str>) -> ActivationRequest {
        ActivationRequest {
            source,
            session: session.map(str::to_string),
            requested_at: FixedClock::epoch().now(),
            payload: None,
        }
    }

    fn names(coordinator: &mut Coordinator) -> Vec<&'static str> {
        coordinator
            .take_events()
            .iter()
            .map(|e| e.event.name())
            .collect()
    }

    #[test]
    fn activation_emits_requested_then_shown() {
        let (_, mut c) = coordinator();
        c.handle_activation(request(TriggerSource::ForegroundShow, Some("a")))
            .unwrap();

        assert_eq!(names(&mut c), vec!["activation.requested", "activation.shown"]);
        assert_eq!(c.in_flight(), Some("a"));
        assert_eq!(c.session_state("a"), Some(SessionState::Finishing));
    }

    #[test]
    fn keyguard_owner_is_synthetic() {
        let (_, mut c) = coordinator();
        c.handle_activation(request(TriggerSource::KeyguardLaunch, None))
            .unwrap();

        let owner = c.in_flight().unwrap().to_string();
        assert!(owner.starts_with(KEYGUARD_OWNER_PREFIX));
        assert_eq!(c.overlay_owner(), Some(owner.as_str()));
    }

    #[test]
    fn hide_clears_in_flight() {
        let (_, mut c) = coordinator();
        c.handle_activation(request(TriggerSource::ForegroundShow, Some("a")))
            .unwrap();
        c.take_events();

        c.hide("a").unwrap();
        assert_eq!(c.in_flight(), None);
        assert_eq!(c.session_state("a"), Some(SessionState::Finished));
        assert_eq!(names(&mut c), vec!["activation.hidden"]);

        // Second hide is a silent no-op.
        c.hide("a").unwrap();
        assert!(c.take_events().is_empty());
    }

    #[test]
    fn hide_on_hidden_overlay_leaves_sessions_alone() {
        let (_, mut c) = coordinator();
        c.on_session_created("s2");

        c.hide("s2").unwrap();
        assert_eq!(c.session_state("s2"), Some(SessionState::Created));
        assert!(c.take_events().is_empty());

        c.handle_activation(request(TriggerSource::ForegroundShow, Some("s2")))
            .unwrap();
        assert_eq!(c.overlay_owner(), Some("s2"));
    }

    #[test]
    fn submit_query_emits_query_then_hidden() {
        let (_, mut c) = coordinator();
        c.handle_activation(request(TriggerSource::DirectHandoff, Some("a")))
            .unwrap();
        c.take_events();

        c.submit_query("a", "  weather tomorrow ").unwrap();
        let events = c.take_events();
        assert_eq!(
            events[0].event,
            BridgeEvent::Query {
                owner_id: "a".into(),
                text: "weather tomorrow".into()
            }
        );
        assert_eq!(events[1].event.name(), "activation.hidden");
    }

    #[test]
    fn blank_query_is_ignored() {
        let (_, mut c) = coordinator();
        c.handle_activation(request(TriggerSource::ForegroundShow, Some("a")))
            .unwrap();
        c.take_events();

        c.submit_query("a", "   ").unwrap();
        assert!(c.take_events().is_empty());
        assert_eq!(c.overlay_owner(), Some("a"));
    }

    #[test]
    fn request_permission_failure_is_surfaced() {
        let (platform, mut c) = coordinator();
        platform.set_role_held(false);
        platform.set_foreground_activity(false);

        let err = c.request_permission(PermissionKind::AssistantRole).unwrap_err();
        assert!(matches!(err, AssistError::NoActivity));
        let events = c.take_events();
        assert_eq!(
            events[0].event,
            BridgeEvent::Failed {
                kind: assist_protocol::FailureKind::NoActivity,
                owner_id: String::new(),
                missing: None,
            }
        );
    }

    #[test]
    fn status_reflects_activation() {
        let (_, mut c) = coordinator();
        c.handle_activation(request(TriggerSource::ForegroundShow, Some("a")))
            .unwrap();

        let status = c.status();
        assert_eq!(status.in_flight_owner.as_deref(), Some("a"));
        assert!(status.overlay_visible);
        assert_eq!(status.live_sessions, 1);
        assert_eq!(status.pending_events, 2);
    }
}
