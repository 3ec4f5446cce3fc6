//! Owns every live session, its grace timer, and its OS teardown.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::transition::{next_state, Transition};
use super::{Session, SessionEvent, SessionOrigin, SessionState};
use crate::config::{AssistConfig, UiSuppression};
use crate::error::{AssistError, Result};
use crate::platform::{PresentationHost, TimerScheduler};
use crate::types::TriggerSource;

pub struct SessionController {
    sessions: HashMap<String, Session>,
    /// Finished session ids, oldest first, kept for violation diagnostics.
    finished: VecDeque<String>,
    retention: usize,
    /// Finished id that must outlive retention while its activation is in flight.
    pinned: Option<String>,
    grace_delay_ms: u64,
    ui_suppression: UiSuppression,
    next_timer_id: u64,
    host: Arc<dyn PresentationHost>,
    scheduler: Arc<dyn TimerScheduler>,
}

impl SessionController {
    pub fn new(
        config: &AssistConfig,
        host: Arc<dyn PresentationHost>,
        scheduler: Arc<dyn TimerScheduler>,
    ) -> Self {
        Self {
            sessions: HashMap::new(),
            finished: VecDeque::new(),
            retention: config.finished_session_retention as usize,
            pinned: None,
            grace_delay_ms: config.grace_delay_ms,
            ui_suppression: config.ui_suppression,
            next_timer_id: 1,
            host,
            scheduler,
        }
    }

    pub fn state(&self, id: &str) -> Option<SessionState> {
        self.sessions.get(id).map(|session| session.state)
    }

    /// Keeps `id` out of retention eviction until unpinned.
    pub fn pin(&mut self, id: Option<&str>) {
        self.pinned = id.map(str::to_string);
        self.evict_finished();
    }

    pub fn live_count(&self) -> usize {
        self.sessions
            .values()
            .filter(|session| !session.state.is_finished())
            .count()
    }

    /// Creates the session if unseen. A Finished id cannot be reused.
    pub fn acquire(&mut self, id: &str, origin: SessionOrigin, now: DateTime<Utc>) -> Result<()> {
        match self.sessions.get(id) {
            Some(session) if session.state.is_finished() => {
                warn!(session = id, "Late callback for finished session");
                Err(violation(id, "acquire"))
            }
            Some(_) => Ok(()),
            None => {
                debug!(session = id, ?origin, "Session created");
                self.sessions
                    .insert(id.to_string(), Session::new(id, origin, now));
                Ok(())
            }
        }
    }

    /// Applies the trigger's entry event (`Show` or `HandleAssist`).
    pub fn on_trigger(&mut self, id: &str, source: TriggerSource) -> Result<SessionState> {
        if let Some(session) = self.sessions.get_mut(id) {
            session.source.get_or_insert(source);
        }
        self.apply(id, SessionEvent::for_trigger(source))
    }

    /// Moves the session to Finishing and arms the grace delay.
    ///
    /// With a zero delay the session finishes before this returns.
    pub fn begin_finish(&mut self, id: &str) -> Result<SessionState> {
        let before = self.state(id);
        let after = self.apply(id, SessionEvent::BeginFinish)?;
        if before == Some(SessionState::Finishing) || after != SessionState::Finishing {
            return Ok(after);
        }

        if self.grace_delay_ms == 0 {
            return self.apply(id, SessionEvent::Complete);
        }

        let timer_id = self.next_timer_id;
        self.next_timer_id += 1;
        if let Some(session) = self.sessions.get_mut(id) {
            session.grace_timer = Some(timer_id);
        }
        self.scheduler.schedule(timer_id, self.grace_delay_ms);
        debug!(
            session = id,
            timer_id,
            delay_ms = self.grace_delay_ms,
            "Grace timer armed"
        );
        Ok(after)
    }

    /// Completes the session owning `timer_id`. Stale or cancelled ids are ignored.
    pub fn on_timer_fired(&mut self, timer_id: u64) -> Option<String> {
        let id = self
            .sessions
            .values_mut()
            .find(|session| session.grace_timer == Some(timer_id))
            .map(|session| {
                session.grace_timer = None;
                session.id.clone()
            });

        let Some(id) = id else {
            debug!(timer_id, "Stale grace timer ignored");
            return None;
        };

        match self.apply(&id, SessionEvent::Complete) {
            Ok(_) => Some(id),
            Err(_) => None,
        }
    }

    /// Finishes the session right away, cancelling any pending grace timer.
    /// Unknown and already finished sessions are a no-op.
    pub fn finish_now(&mut self, id: &str) -> Result<()> {
        match self.state(id) {
            None | Some(SessionState::Finished) => Ok(()),
            Some(SessionState::Finishing) => self.apply(id, SessionEvent::Complete).map(|_| ()),
            Some(_) => {
                self.apply(id, SessionEvent::BeginFinish)?;
                self.apply(id, SessionEvent::Complete).map(|_| ())
            }
        }
    }

    /// OS-initiated `onHide`/`onDestroy`; forces Finished from any live state.
    pub fn teardown(&mut self, id: &str, event: SessionEvent) {
        debug_assert!(matches!(
            event,
            SessionEvent::OsHide | SessionEvent::OsDestroy
        ));
        if self.sessions.contains_key(id) {
            if let Err(err) = self.apply(id, event) {
                debug!(session = id, ?event, error = %err, "Teardown rejected");
            }
        } else {
            debug!(session = id, ?event, "Teardown for unknown session");
        }
    }

    /// Disables the default OS session UI if configured for this phase.
    pub fn suppress_default_ui(&self, id: &str, phase: UiSuppression) {
        if self.ui_suppression != phase || phase == UiSuppression::Never {
            return;
        }
        let eligible = self.sessions.get(id).is_some_and(|session| {
            session.origin == SessionOrigin::Os && !session.state.is_finished()
        });
        if eligible {
            self.host.set_session_ui_enabled(id.to_string(), false);
        }
    }

    fn apply(&mut self, id: &str, event: SessionEvent) -> Result<SessionState> {
        let Some(session) = self.sessions.get_mut(id) else {
            return Err(violation(id, &format!("{:?}", event)));
        };

        let from = session.state;
        match next_state(from, event) {
            Transition::Move(to) => {
                session.state = to;
                debug!(session = id, ?from, ?to, ?event, "Session transition");
                if to.is_finished() {
                    self.on_finished(id, event);
                }
                Ok(to)
            }
            Transition::Stay => {
                debug!(session = id, state = ?from, ?event, "Session event ignored");
                Ok(from)
            }
            Transition::Violation => {
                warn!(session = id, ?event, "Event delivered to finished session");
                Err(violation(id, &format!("{:?}", event)))
            }
        }
    }

    fn on_finished(&mut self, id: &str, event: SessionEvent) {
        let Some(session) = self.sessions.get_mut(id) else {
            return;
        };
        let origin = session.origin;
        let source = session.source.map(|source| source.as_str());
        let created_at = session.created_at;
        if let Some(timer_id) = session.grace_timer.take() {
            self.scheduler.cancel(timer_id);
            debug!(session = id, timer_id, "Grace timer cancelled");
        }

        // OS teardown means the OS already ended the session object.
        if event == SessionEvent::Complete && origin == SessionOrigin::Os {
            self.host.finish_session(id.to_string());
        }
        info!(session = id, ?event, source, %created_at, "Session finished");

        self.finished.push_back(id.to_string());
        self.evict_finished();
    }

    /// Drops the oldest finished sessions beyond retention, skipping the pinned one.
    fn evict_finished(&mut self) {
        while self.finished.len() > self.retention {
            let pinned = self.pinned.as_deref();
            let Some(index) = self
                .finished
                .iter()
                .position(|id| Some(id.as_str()) != pinned)
            else {
                break;
            };
            if let Some(evicted) = self.finished.remove(index) {
                debug!(session = %evicted, "Finished session evicted");
                self.sessions.remove(&evicted);
            }
        }
    }
}

fn violation(session: &str, event: &str) -> AssistError {
    AssistError::ProtocolViolation {
        session: session.to_string(),
        event: event.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{HostCall, ManualScheduler, RecordingHost};

    struct Fixture {
        host: Arc<RecordingHost>,
        scheduler: Arc<ManualScheduler>,
        controller: SessionController,
    }

    fn fixture(config: AssistConfig) -> Fixture {
        let host = Arc::new(RecordingHost::new());
        let scheduler = Arc::new(ManualScheduler::new());
        let controller = SessionController::new(&config, host.clone(), scheduler.clone());
        Fixture {
            host,
            scheduler,
            controller,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn begin_finish_arms_grace_timer() {
        let mut f = fixture(AssistConfig::default());
        f.controller.acquire("s1", SessionOrigin::Os, now()).unwrap();
        f.controller
            .on_trigger("s1", TriggerSource::ForegroundShow)
            .unwrap();

        assert_eq!(
            f.controller.begin_finish("s1").unwrap(),
            SessionState::Finishing
        );
        let pending = f.scheduler.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].delay_ms, 50);
        assert!(f.host.finished_sessions().is_empty());

        assert_eq!(
            f.controller.on_timer_fired(pending[0].timer_id),
            Some("s1".to_string())
        );
        assert_eq!(f.controller.state("s1"), Some(SessionState::Finished));
        assert_eq!(f.host.finished_sessions(), vec!["s1".to_string()]);
    }

    #[test]
    fn zero_delay_finishes_immediately() {
        let mut f = fixture(AssistConfig {
            grace_delay_ms: 0,
            ..AssistConfig::default()
        });
        f.controller.acquire("s1", SessionOrigin::Os, now()).unwrap();
        f.controller
            .on_trigger("s1", TriggerSource::DirectHandoff)
            .unwrap();

        assert_eq!(
            f.controller.begin_finish("s1").unwrap(),
            SessionState::Finished
        );
        assert!(f.scheduler.pending().is_empty());
        assert_eq!(f.host.finished_sessions(), vec!["s1".to_string()]);
    }

    #[test]
    fn os_destroy_cancels_pending_timer() {
        let mut f = fixture(AssistConfig::default());
        f.controller.acquire("s1", SessionOrigin::Os, now()).unwrap();
        f.controller
            .on_trigger("s1", TriggerSource::ForegroundShow)
            .unwrap();
        f.controller.begin_finish("s1").unwrap();
        let timer_id = f.scheduler.pending()[0].timer_id;

        f.controller.teardown("s1", SessionEvent::OsDestroy);

        assert_eq!(f.controller.state("s1"), Some(SessionState::Finished));
        assert_eq!(f.scheduler.cancelled(), vec![timer_id]);
        assert!(f.host.finished_sessions().is_empty());
        // A late firing of the cancelled timer must not touch anything.
        assert_eq!(f.controller.on_timer_fired(timer_id), None);
    }

    #[test]
    fn stale_timer_does_not_finish_newer_session() {
        let mut f = fixture(AssistConfig::default());
        f.controller.acquire("s1", SessionOrigin::Os, now()).unwrap();
        f.controller
            .on_trigger("s1", TriggerSource::ForegroundShow)
            .unwrap();
        f.controller.begin_finish("s1").unwrap();
        let first_timer = f.scheduler.pending()[0].timer_id;
        f.controller.finish_now("s1").unwrap();

        f.controller.acquire("s2", SessionOrigin::Os, now()).unwrap();
        f.controller
            .on_trigger("s2", TriggerSource::ForegroundShow)
            .unwrap();
        f.controller.begin_finish("s2").unwrap();

        assert_eq!(f.controller.on_timer_fired(first_timer), None);
        assert_eq!(f.controller.state("s2"), Some(SessionState::Finishing));
    }

    #[test]
    fn finish_now_skips_grace_delay() {
        let mut f = fixture(AssistConfig::default());
        f.controller.acquire("s1", SessionOrigin::Os, now()).unwrap();
        f.controller
            .on_trigger("s1", TriggerSource::ForegroundShow)
            .unwrap();
        f.controller.begin_finish("s1").unwrap();

        f.controller.finish_now("s1").unwrap();
        assert_eq!(f.controller.state("s1"), Some(SessionState::Finished));
        assert_eq!(f.scheduler.cancelled().len(), 1);
        assert_eq!(f.host.finished_sessions(), vec!["s1".to_string()]);

        // Idempotent
        f.controller.finish_now("s1").unwrap();
        assert_eq!(f.host.finished_sessions().len(), 1);
    }

    #[test]
    fn finished_session_rejects_late_trigger() {
        let mut f = fixture(AssistConfig {
            grace_delay_ms: 0,
            ..AssistConfig::default()
        });
        f.controller.acquire("s1", SessionOrigin::Os, now()).unwrap();
        f.controller
            .on_trigger("s1", TriggerSource::ForegroundShow)
            .unwrap();
        f.controller.begin_finish("s1").unwrap();

        let err = f
            .controller
            .on_trigger("s1", TriggerSource::DirectHandoff)
            .unwrap_err();
        assert!(matches!(err, AssistError::ProtocolViolation { .. }));
        assert!(f
            .controller
            .acquire("s1", SessionOrigin::Os, now())
            .is_err());
    }

    #[test]
    fn synthetic_session_never_finishes_through_host() {
        let mut f = fixture(AssistConfig {
            grace_delay_ms: 0,
            ..AssistConfig::default()
        });
        f.controller
            .acquire("keyguard-1", SessionOrigin::Synthetic, now())
            .unwrap();
        f.controller
            .on_trigger("keyguard-1", TriggerSource::KeyguardLaunch)
            .unwrap();
        f.controller
            .suppress_default_ui("keyguard-1", UiSuppression::BeforeLaunch);
        f.controller.begin_finish("keyguard-1").unwrap();

        assert_eq!(
            f.controller.state("keyguard-1"),
            Some(SessionState::Finished)
        );
        assert!(f.host.calls().is_empty());
    }

    #[test]
    fn suppresses_default_ui_in_configured_phase_only() {
        let mut f = fixture(AssistConfig {
            ui_suppression: UiSuppression::AfterLaunch,
            ..AssistConfig::default()
        });
        f.controller.acquire("s1", SessionOrigin::Os, now()).unwrap();

        f.controller
            .suppress_default_ui("s1", UiSuppression::BeforeLaunch);
        assert!(f.host.calls().is_empty());

        f.controller
            .suppress_default_ui("s1", UiSuppression::AfterLaunch);
        assert_eq!(
            f.host.calls(),
            vec![HostCall::SetUiEnabled {
                session: "s1".to_string(),
                enabled: false
            }]
        );
    }

    #[test]
    fn evicts_oldest_finished_sessions() {
        let mut f = fixture(AssistConfig {
            grace_delay_ms: 0,
            finished_session_retention: 1,
            ..AssistConfig::default()
        });
        for id in ["s1", "s2"] {
            f.controller.acquire(id, SessionOrigin::Os, now()).unwrap();
            f.controller.finish_now(id).unwrap();
        }

        assert_eq!(f.controller.state("s1"), None);
        assert_eq!(f.controller.state("s2"), Some(SessionState::Finished));
    }

    #[test]
    fn pinned_session_survives_eviction() {
        let mut f = fixture(AssistConfig {
            grace_delay_ms: 0,
            finished_session_retention: 2,
            ..AssistConfig::default()
        });
        f.controller.acquire("a", SessionOrigin::Os, now()).unwrap();
        f.controller.pin(Some("a"));
        for id in ["a", "b", "c"] {
            f.controller.acquire(id, SessionOrigin::Os, now()).unwrap();
            f.controller.finish_now(id).unwrap();
        }

        assert_eq!(f.controller.state("a"), Some(SessionState::Finished));
        assert_eq!(f.controller.state("b"), None);
        assert!(f.controller.acquire("a", SessionOrigin::Os, now()).is_err());

        // Once unpinned, the owner ages out like any other session.
        f.controller.pin(None);
        f.controller.acquire("d", SessionOrigin::Os, now()).unwrap();
        f.controller.finish_now("d").unwrap();
        assert_eq!(f.controller.state("a"), None);
        assert_eq!(f.controller.state("c"), Some(SessionState::Finished));
        assert_eq!(f.controller.state("d"), Some(SessionState::Finished));
    }

    #[test]
    fn teardown_of_finished_session_is_ignored() {
        let mut f = fixture(AssistConfig {
            grace_delay_ms: 0,
            ..AssistConfig::default()
        });
        f.controller.acquire("s1", SessionOrigin::Os, now()).unwrap();
        f.controller.finish_now("s1").unwrap();

        f.controller.teardown("s1", SessionEvent::OsDestroy);
        assert_eq!(f.controller.state("s1"), Some(SessionState::Finished));
        assert_eq!(f.host.finished_sessions().len(), 1);
    }
}
