//! Collaborator seams implemented by the host (Kotlin via UniFFI, or test doubles).
//!
//! Every method here is a one-shot call into the OS or the UI runtime. The core
//! never blocks on them and never interprets anything beyond the returned
//! boolean or enum.
//!
//! Implementors must not call back into [`crate::AssistEngine`] synchronously
//! from inside these methods; timers and UI commands arrive later on the main
//! thread as separate engine calls.

use chrono::{DateTime, Utc};

/// Whether the platform exposes an assistant role, and how to reach it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum RoleSupport {
    /// Role manager present and the assistant role is offered.
    Available,
    /// Role manager present but the assistant role is not offered.
    Unavailable,
    /// Platform predates the role concept; the voice-interaction setting applies.
    Legacy,
    /// Role manager could not be queried.
    Unknown,
}

/// Consent or settings flow the core asks the host to launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum ConsentIntent {
    RequestAssistantRole,
    VoiceInputSettings,
    ManageOverlayPermission,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum LaunchResult {
    Launched,
    /// No OS component resolved the intent.
    Unresolved,
}

/// Permission queries and consent-flow navigation.
#[uniffi::export(with_foreign)]
pub trait AssistPlatform: Send + Sync {
    fn role_support(&self) -> RoleSupport;

    /// Only meaningful when `role_support()` is `Available`.
    fn is_role_held(&self) -> bool;

    /// The configured voice-interaction service component, e.g.
    /// `com.example.app/.AssistService`. Used on legacy platforms.
    fn voice_interaction_service(&self) -> Option<String>;

    fn can_draw_overlays(&self) -> bool;

    fn has_foreground_activity(&self) -> bool;

    fn launch(&self, intent: ConsentIntent) -> LaunchResult;
}

/// The overlay surface and the OS session object it replaces.
#[uniffi::export(with_foreign)]
pub trait PresentationHost: Send + Sync {
    /// Start the backing foreground presentation service for `owner`.
    fn present_overlay(&self, owner: String, payload: Option<String>);

    /// Remove the surface and stop the backing service.
    fn dismiss_overlay(&self, owner: String);

    /// Toggle the OS-provided default session UI.
    fn set_session_ui_enabled(&self, session: String, enabled: bool);

    /// Terminate the OS session object.
    fn finish_session(&self, session: String);
}

/// One-shot cancellable timers posted on the host's main loop.
///
/// The core allocates the ids. When a timer elapses the host calls
/// `AssistEngine::on_timer_fired(timer_id)`.
#[uniffi::export(with_foreign)]
pub trait TimerScheduler: Send + Sync {
    fn schedule(&self, timer_id: u64, delay_ms: u64);

    fn cancel(&self, timer_id: u64);
}

/// Named-event sink consumed by the application UI layer.
#[uniffi::export(with_foreign)]
pub trait UiBridge: Send + Sync {
    fn emit(&self, name: String, payload_json: String);
}

/// Time source; injected so tests and the simulator control it.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
