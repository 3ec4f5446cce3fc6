//! Recording test doubles for the collaborator seams.
//!
//! Compiled for unit tests and behind the `test-helpers` feature so the
//! simulator can drive the engine without a device.

use std::sync::Mutex;

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::platform::{
    AssistPlatform, Clock, ConsentIntent, LaunchResult, PresentationHost, RoleSupport,
    TimerScheduler, UiBridge,
};

// ─────────────────────────────────────────────────────────────────────────────
// Platform
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct PlatformState {
    role_support: RoleSupport,
    role_held: bool,
    voice_service: Option<String>,
    overlay: bool,
    foreground_activity: bool,
    launch_result: LaunchResult,
    launched: Vec<ConsentIntent>,
}

/// Settable platform that records launched consent intents.
pub struct RecordingPlatform {
    state: Mutex<PlatformState>,
}

impl RecordingPlatform {
    /// Modern platform with both grants held and a foreground activity.
    pub fn granted() -> Self {
        Self {
            state: Mutex::new(PlatformState {
                role_support: RoleSupport::Available,
                role_held: true,
                voice_service: None,
                overlay: true,
                foreground_activity: true,
                launch_result: LaunchResult::Launched,
                launched: Vec::new(),
            }),
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut PlatformState) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut state)
    }

    pub fn set_role_support(&self, support: RoleSupport) {
        self.with_state(|s| s.role_support = support);
    }

    pub fn set_role_held(&self, held: bool) {
        self.with_state(|s| s.role_held = held);
    }

    pub fn set_voice_service(&self, service: Option<&str>) {
        self.with_state(|s| s.voice_service = service.map(str::to_string));
    }

    pub fn set_overlay(&self, granted: bool) {
        self.with_state(|s| s.overlay = granted);
    }

    pub fn set_foreground_activity(&self, present: bool) {
        self.with_state(|s| s.foreground_activity = present);
    }

    pub fn set_launch_result(&self, result: LaunchResult) {
        self.with_state(|s| s.launch_result = result);
    }

    pub fn launched(&self) -> Vec<ConsentIntent> {
        self.with_state(|s| s.launched.clone())
    }
}

impl AssistPlatform for RecordingPlatform {
    fn role_support(&self) -> RoleSupport {
        self.with_state(|s| s.role_support)
    }

    fn is_role_held(&self) -> bool {
        self.with_state(|s| s.role_held)
    }

    fn voice_interaction_service(&self) -> Option<String> {
        self.with_state(|s| s.voice_service.clone())
    }

    fn can_draw_overlays(&self) -> bool {
        self.with_state(|s| s.overlay)
    }

    fn has_foreground_activity(&self) -> bool {
        self.with_state(|s| s.foreground_activity)
    }

    fn launch(&self, intent: ConsentIntent) -> LaunchResult {
        self.with_state(|s| {
            if s.launch_result == LaunchResult::Launched {
                s.launched.push(intent);
            }
            s.launch_result
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Presentation host
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    Present {
        owner: String,
        payload: Option<String>,
    },
    Dismiss {
        owner: String,
    },
    SetUiEnabled {
        session: String,
        enabled: bool,
    },
    FinishSession {
        session: String,
    },
}

#[derive(Default)]
pub struct RecordingHost {
    calls: Mutex<Vec<HostCall>>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn finished_sessions(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                HostCall::FinishSession { session } => Some(session),
                _ => None,
            })
            .collect()
    }

    pub fn present_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, HostCall::Present { .. }))
            .count()
    }

    fn record(&self, call: HostCall) {
        self.calls
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(call);
    }
}

impl PresentationHost for RecordingHost {
    fn present_overlay(&self, owner: String, payload: Option<String>) {
        self.record(HostCall::Present { owner, payload });
    }

    fn dismiss_overlay(&self, owner: String) {
        self.record(HostCall::Dismiss { owner });
    }

    fn set_session_ui_enabled(&self, session: String, enabled: bool) {
        self.record(HostCall::SetUiEnabled { session, enabled });
    }

    fn finish_session(&self, session: String) {
        self.record(HostCall::FinishSession { session });
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Scheduler
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledTimer {
    pub timer_id: u64,
    pub delay_ms: u64,
}

/// Records timers; tests fire them by calling back into the coordinator.
#[derive(Default)]
pub struct ManualScheduler {
    scheduled: Mutex<Vec<ScheduledTimer>>,
    cancelled: Mutex<Vec<u64>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scheduled timers that were not cancelled.
    pub fn pending(&self) -> Vec<ScheduledTimer> {
        let cancelled = self.cancelled();
        self.scheduled
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .filter(|timer| !cancelled.contains(&timer.timer_id))
            .copied()
            .collect()
    }

    pub fn cancelled(&self) -> Vec<u64> {
        self.cancelled
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}

impl TimerScheduler for ManualScheduler {
    fn schedule(&self, timer_id: u64, delay_ms: u64) {
        self.scheduled
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(ScheduledTimer { timer_id, delay_ms });
    }

    fn cancel(&self, timer_id: u64) {
        self.cancelled
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(timer_id);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// UI bridge and clock
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingBridge {
    events: Mutex<Vec<(String, String)>>,
}

impl RecordingBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn names(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .map(|(name, _)| name)
            .collect()
    }

    pub fn events(&self) -> Vec<(String, String)> {
        self.events
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}

impl UiBridge for RecordingBridge {
    fn emit(&self, name: String, payload_json: String) {
        self.events
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push((name, payload_json));
    }
}

pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// 2026-01-30T12:00:00Z
    pub fn epoch() -> Self {
        Self::new(
            Utc.with_ymd_and_hms(2026, 1, 30, 12, 0, 0)
                .single()
                .unwrap_or_else(Utc::now),
        )
    }

    pub fn advance_ms(&self, ms: u64) {
        let mut now = self.now.lock().unwrap_or_else(|p| p.into_inner());
        *now += Duration::milliseconds(ms as i64);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|p| p.into_inner())
    }
}
