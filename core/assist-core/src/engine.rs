//! AssistEngine - the FFI entry point the Android host talks to.
//!
//! The host forwards every OS callback (session triggers, teardown, timer
//! expiry) and every UI command to one engine instance. Calls are expected on
//! the main thread; the internal mutex only makes the object `Sync` for UniFFI.
//!
//! Bridge events are emitted after the lock is released, so a `UiBridge`
//! implementation may call back into the engine from `emit`.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use assist_core::{AssistConfig, AssistEngine};
//!
//! let engine = AssistEngine::new(AssistConfig::default(), platform, host, scheduler, bridge);
//! engine.set_ui_ready(true);
//! engine.on_foreground_show("session-1".into(), None);
//! ```

use std::sync::{Arc, Mutex, MutexGuard};

use assist_protocol::{parse_command, BridgeCommand};
use tracing::{debug, warn};

use crate::config::AssistConfig;
use crate::coordinator::Coordinator;
use crate::error::{AssistError, AssistFfiError};
use crate::platform::{AssistPlatform, Clock, PresentationHost, SystemClock, TimerScheduler, UiBridge};
use crate::router::TriggerRouter;
use crate::types::{EngineStatus, PermissionGrant, PermissionState};

#[derive(uniffi::Object)]
pub struct AssistEngine {
    router: TriggerRouter,
    coordinator: Mutex<Coordinator>,
    bridge: Arc<dyn UiBridge>,
}

impl AssistEngine {
    /// Creates an engine with an injected clock.
    ///
    /// Used by tests and the simulator. Not exposed to FFI - use `new()`.
    pub fn with_clock(
        config: AssistConfig,
        platform: Arc<dyn AssistPlatform>,
        host: Arc<dyn PresentationHost>,
        scheduler: Arc<dyn TimerScheduler>,
        bridge: Arc<dyn UiBridge>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let config = config.validated();
        let coordinator = Coordinator::new(&config, platform, host, scheduler, clock.clone());
        Self {
            router: TriggerRouter::new(clock),
            coordinator: Mutex::new(coordinator),
            bridge,
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Coordinator> {
        self.coordinator.lock().unwrap_or_else(|p| {
            warn!("Coordinator lock poisoned, recovering");
            p.into_inner()
        })
    }

    /// Runs `f` under the lock, then delivers whatever events it produced.
    fn with_coordinator<T>(&self, f: impl FnOnce(&mut Coordinator) -> T) -> T {
        let (result, events) = {
            let mut coordinator = self.lock();
            let result = f(&mut coordinator);
            (result, coordinator.take_events())
        };

        for envelope in events {
            match envelope.to_json() {
                Ok(json) => self
                    .bridge
                    .emit(envelope.event.name().to_string(), json),
                Err(err) => warn!(event = envelope.event.name(), error = %err, "Failed to encode bridge event"),
            }
        }
        result
    }

    fn run_command(&self, command: BridgeCommand) -> Result<(), AssistFfiError> {
        debug!(?command, "Bridge command");
        let result = self.with_coordinator(|c| match &command {
            BridgeCommand::RequestPermission { kind } => c.request_permission(*kind),
            BridgeCommand::Hide { owner_id } => c.hide(owner_id),
            BridgeCommand::Finish { owner_id } => c.finish(owner_id),
            BridgeCommand::SubmitQuery { owner_id, text } => c.submit_query(owner_id, text),
        });
        result.map_err(AssistFfiError::from)
    }
}

#[uniffi::export]
impl AssistEngine {
    #[uniffi::constructor]
    pub fn new(
        config: AssistConfig,
        platform: Arc<dyn AssistPlatform>,
        host: Arc<dyn PresentationHost>,
        scheduler: Arc<dyn TimerScheduler>,
        bridge: Arc<dyn UiBridge>,
    ) -> Self {
        Self::with_clock(
            config,
            platform,
            host,
            scheduler,
            bridge,
            Arc::new(SystemClock),
        )
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // OS triggers
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn on_foreground_show(&self, session: String, payload: Option<String>) {
        self.with_coordinator(|c| self.router.on_foreground_show(c, &session, payload));
    }

    pub fn on_keyguard_launch(&self) {
        self.with_coordinator(|c| self.router.on_keyguard_launch(c));
    }

    pub fn on_direct_handoff(
        &self,
        session: String,
        data: Option<String>,
        structure: Option<String>,
        content: Option<String>,
    ) {
        self.with_coordinator(|c| {
            self.router
                .on_direct_handoff(c, &session, data, structure, content)
        });
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // OS session lifecycle
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn on_session_created(&self, session: String) {
        self.with_coordinator(|c| c.on_session_created(&session));
    }

    pub fn on_session_hidden(&self, session: String) {
        self.with_coordinator(|c| c.on_session_hidden(&session));
    }

    pub fn on_session_destroyed(&self, session: String) {
        self.with_coordinator(|c| c.on_session_destroyed(&session));
    }

    /// Called by the host when a timer scheduled through `TimerScheduler` elapses.
    pub fn on_timer_fired(&self, timer_id: u64) {
        self.with_coordinator(|c| c.on_timer_fired(timer_id));
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // UI bridge
    // ─────────────────────────────────────────────────────────────────────────────

    /// Flushes buffered events once the UI runtime can receive them.
    pub fn set_ui_ready(&self, ready: bool) {
        self.with_coordinator(|c| c.set_ui_ready(ready));
    }

    pub fn request_permission(&self, kind: PermissionGrant) -> Result<(), AssistFfiError> {
        self.run_command(BridgeCommand::RequestPermission { kind: kind.into() })
    }

    pub fn hide(&self, owner_id: String) -> Result<(), AssistFfiError> {
        self.run_command(BridgeCommand::Hide { owner_id })
    }

    pub fn finish(&self, owner_id: String) -> Result<(), AssistFfiError> {
        self.run_command(BridgeCommand::Finish { owner_id })
    }

    pub fn submit_query(&self, owner_id: String, text: String) -> Result<(), AssistFfiError> {
        self.run_command(BridgeCommand::SubmitQuery { owner_id, text })
    }

    /// Parses and runs a JSON-encoded `CommandRequest`.
    pub fn dispatch_command_json(&self, json: String) -> Result<(), AssistFfiError> {
        let command = parse_command(&json).map_err(|info| {
            warn!(code = %info.code, "Rejected bridge command");
            AssistFfiError::from(AssistError::InvalidCommand(info))
        })?;
        self.run_command(command)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn check_role(&self) -> bool {
        self.lock().gatekeeper().check_role()
    }

    pub fn check_overlay(&self) -> bool {
        self.lock().gatekeeper().check_overlay()
    }

    pub fn permission_state(&self) -> PermissionState {
        self.lock().permission_state()
    }

    pub fn status(&self) -> EngineStatus {
        self.lock().status()
    }
}
