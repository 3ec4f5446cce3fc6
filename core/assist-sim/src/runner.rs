//! Drives an [`AssistEngine`] through a scenario on virtual time.

use std::sync::{Arc, Mutex};

use assist_core::testing::{FixedClock, HostCall, RecordingBridge, RecordingHost, RecordingPlatform};
use assist_core::{AssistConfig, AssistEngine, AssistFfiError, PermissionGrant, TimerScheduler};
use assist_protocol::PermissionKind;
use tracing::{debug, info};

use crate::scenario::{DeviceProfile, Step};

// ─────────────────────────────────────────────────────────────────────────────
// Virtual timers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct TimerQueue {
    now_ms: u64,
    /// (due_ms, timer_id)
    timers: Vec<(u64, u64)>,
}

/// Timer scheduler on a virtual millisecond clock. Nothing fires until the
/// runner advances time.
#[derive(Default)]
pub struct VirtualScheduler {
    queue: Mutex<TimerQueue>,
}

impl VirtualScheduler {
    fn with_queue<T>(&self, f: impl FnOnce(&mut TimerQueue) -> T) -> T {
        let mut queue = self.queue.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut queue)
    }

    pub fn now_ms(&self) -> u64 {
        self.with_queue(|q| q.now_ms)
    }

    pub fn pending(&self) -> usize {
        self.with_queue(|q| q.timers.len())
    }

    /// Removes the earliest timer due at or before `until` and moves time to it.
    pub fn pop_due(&self, until: u64) -> Option<(u64, u64)> {
        self.with_queue(|q| {
            let index = q
                .timers
                .iter()
                .enumerate()
                .filter(|(_, (due, _))| *due <= until)
                .min_by_key(|(_, timer)| **timer)
                .map(|(index, _)| index)?;
            let timer = q.timers.remove(index);
            q.now_ms = q.now_ms.max(timer.0);
            Some(timer)
        })
    }

    pub fn advance_to(&self, until: u64) {
        self.with_queue(|q| q.now_ms = q.now_ms.max(until));
    }
}

impl TimerScheduler for VirtualScheduler {
    fn schedule(&self, timer_id: u64, delay_ms: u64) {
        self.with_queue(|q| {
            let due = q.now_ms + delay_ms;
            q.timers.push((due, timer_id));
        });
    }

    fn cancel(&self, timer_id: u64) {
        self.with_queue(|q| q.timers.retain(|(_, id)| *id != timer_id));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Simulation
// ─────────────────────────────────────────────────────────────────────────────

pub struct Simulation {
    platform: Arc<RecordingPlatform>,
    host: Arc<RecordingHost>,
    bridge: Arc<RecordingBridge>,
    scheduler: Arc<VirtualScheduler>,
    clock: Arc<FixedClock>,
    engine: AssistEngine,
    transcript: Vec<String>,
    host_seen: usize,
    events_seen: usize,
}

impl Simulation {
    pub fn new(config: AssistConfig, device: &DeviceProfile) -> Self {
        let platform = Arc::new(RecordingPlatform::granted());
        platform.set_role_support(device.role_support.into());
        platform.set_role_held(device.role_held);
        platform.set_voice_service(device.voice_service.as_deref());
        platform.set_overlay(device.overlay);
        platform.set_foreground_activity(device.foreground_activity);

        let host = Arc::new(RecordingHost::new());
        let bridge = Arc::new(RecordingBridge::new());
        let scheduler = Arc::new(VirtualScheduler::default());
        let clock = Arc::new(FixedClock::epoch());
        let engine = AssistEngine::with_clock(
            config,
            platform.clone(),
            host.clone(),
            scheduler.clone(),
            bridge.clone(),
            clock.clone(),
        );

        Self {
            platform,
            host,
            bridge,
            scheduler,
            clock,
            engine,
            transcript: Vec::new(),
            host_seen: 0,
            events_seen: 0,
        }
    }

    /// Runs every step and returns the transcript.
    pub fn run(mut self, steps: &[Step]) -> Vec<String> {
        for (index, step) in steps.iter().enumerate() {
            debug!(index, ?step, "Running step");
            self.step(step);
            self.collect();
        }
        let status = self.engine.status();
        self.record(format!(
            "final   in_flight={:?} overlay_visible={} overlay_owner={:?} live_sessions={} pending_timers={}",
            status.in_flight_owner,
            status.overlay_visible,
            status.overlay_owner,
            status.live_sessions,
            self.scheduler.pending()
        ));
        self.transcript
    }

    fn step(&mut self, step: &Step) {
        match step {
            Step::UiReady { ready } => self.engine.set_ui_ready(*ready),
            Step::SessionCreated { session } => self.engine.on_session_created(session.clone()),
            Step::ForegroundShow { session, payload } => self
                .engine
                .on_foreground_show(session.clone(), payload.clone()),
            Step::KeyguardLaunch => self.engine.on_keyguard_launch(),
            Step::DirectHandoff { session, content } => {
                self.engine
                    .on_direct_handoff(session.clone(), None, None, content.clone())
            }
            Step::SessionHidden { session } => self.engine.on_session_hidden(session.clone()),
            Step::SessionDestroyed { session } => {
                self.engine.on_session_destroyed(session.clone())
            }
            Step::Wait { ms } => self.wait(*ms),
            Step::Hide { owner } => {
                let owner = self.owner(owner);
                let result = self.engine.hide(owner);
                self.record_result("hide", result);
            }
            Step::Finish { owner } => {
                let owner = self.owner(owner);
                let result = self.engine.finish(owner);
                self.record_result("finish", result);
            }
            Step::SubmitQuery { owner, text } => {
                let owner = self.owner(owner);
                let result = self.engine.submit_query(owner, text.clone());
                self.record_result("submit_query", result);
            }
            Step::RequestPermission { kind } => {
                let grant = match kind {
                    PermissionKind::AssistantRole => PermissionGrant::AssistantRole,
                    PermissionKind::DrawOverlay => PermissionGrant::DrawOverlay,
                };
                let result = self.engine.request_permission(grant);
                self.record_result("request_permission", result);
            }
            Step::Command { json } => {
                let result = self.engine.dispatch_command_json(json.clone());
                self.record_result("command", result);
            }
            Step::SetOverlay { granted } => self.platform.set_overlay(*granted),
            Step::SetRoleHeld { held } => self.platform.set_role_held(*held),
            Step::Status => {
                let status = self.engine.status();
                let permissions = self.engine.permission_state();
                self.record(format!(
                    "status  {:?} role_granted={} overlay_granted={}",
                    status, permissions.role_granted, permissions.overlay_granted
                ));
            }
        }
    }

    fn wait(&mut self, ms: u64) {
        let start = self.scheduler.now_ms();
        let until = start + ms;
        let mut last = start;
        while let Some((due, timer_id)) = self.scheduler.pop_due(until) {
            self.clock.advance_ms(due - last);
            last = due;
            info!(timer_id, at_ms = due, "Timer fired");
            self.engine.on_timer_fired(timer_id);
            self.collect();
        }
        self.clock.advance_ms(until - last);
        self.scheduler.advance_to(until);
    }

    /// Explicit owner, else the in-flight one.
    fn owner(&self, owner: &Option<String>) -> String {
        owner
            .clone()
            .or_else(|| self.engine.status().in_flight_owner)
            .unwrap_or_default()
    }

    fn record_result(&mut self, what: &str, result: Result<(), AssistFfiError>) {
        if let Err(err) = result {
            self.record(format!("error   {}: {}", what, err));
        }
    }

    /// Appends host calls and bridge events produced since the last call.
    fn collect(&mut self) {
        let calls = self.host.calls();
        for call in calls.iter().skip(self.host_seen) {
            let line = match call {
                HostCall::Present { owner, payload } => {
                    format!("host    present_overlay {} payload={:?}", owner, payload)
                }
                HostCall::Dismiss { owner } => format!("host    dismiss_overlay {}", owner),
                HostCall::SetUiEnabled { session, enabled } => {
                    format!("host    set_session_ui_enabled {} {}", session, enabled)
                }
                HostCall::FinishSession { session } => {
                    format!("host    finish_session {}", session)
                }
            };
            self.record(line);
        }
        self.host_seen = calls.len();

        let events = self.bridge.events();
        for (_, json) in events.iter().skip(self.events_seen) {
            self.record(format!("event   {}", json));
        }
        self.events_seen = events.len();
    }

    fn record(&mut self, line: String) {
        let line = format!("[{:>5}ms] {}", self.scheduler.now_ms(), line);
        self.transcript.push(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(config: AssistConfig, steps: Vec<Step>) -> Vec<String> {
        Simulation::new(config, &DeviceProfile::default()).run(&steps)
    }

    #[test]
    fn virtual_scheduler_orders_and_cancels() {
        let scheduler = VirtualScheduler::default();
        scheduler.schedule(1, 50);
        scheduler.schedule(2, 10);
        scheduler.schedule(3, 30);
        scheduler.cancel(3);

        assert_eq!(scheduler.pop_due(100), Some((10, 2)));
        assert_eq!(scheduler.pop_due(40), None);
        assert_eq!(scheduler.pop_due(100), Some((50, 1)));
        assert_eq!(scheduler.now_ms(), 50);
    }

    #[test]
    fn grace_timer_fires_after_wait() {
        let transcript = run(
            AssistConfig::default(),
            vec![
                Step::UiReady { ready: true },
                Step::ForegroundShow {
                    session: "s1".into(),
                    payload: None,
                },
                Step::Wait { ms: 100 },
                Step::Hide { owner: None },
            ],
        );

        let finish = transcript
            .iter()
            .find(|line| line.contains("finish_session s1"))
            .unwrap();
        assert!(finish.starts_with("[   50ms]"), "{}", finish);
        assert!(transcript
            .iter()
            .any(|line| line.contains("activation.hidden")));
        assert!(transcript.last().unwrap().contains("in_flight=None"));
    }

    #[test]
    fn rejected_command_is_recorded() {
        let transcript = run(
            AssistConfig::default(),
            vec![
                Step::ForegroundShow {
                    session: "a".into(),
                    payload: None,
                },
                Step::Hide {
                    owner: Some("b".into()),
                },
            ],
        );
        assert!(transcript
            .iter()
            .any(|line| line.contains("error   hide: not_owner")));
    }
}
