//! Session lifecycle for OS-issued voice-interaction sessions.
//!
//! ```text
//! Created --Show--> Showing
//! Created --HandleAssist--> HandlingAssist
//! Showing --HandleAssist--> HandlingAssist
//! HandlingAssist --BeginFinish--> Finishing
//! Showing --BeginFinish--> Finishing
//! Finishing --(grace timer or immediate)--> Finished
//! any live state --OsHide/OsDestroy--> Finished
//! ```

mod controller;
mod transition;

pub use controller::SessionController;
pub use transition::{next_state, Transition};

use chrono::{DateTime, Utc};

use crate::types::TriggerSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Created,
    Showing,
    HandlingAssist,
    Finishing,
    Finished,
}

impl SessionState {
    pub fn is_finished(self) -> bool {
        self == SessionState::Finished
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Show,
    HandleAssist,
    BeginFinish,
    /// Grace timer fired, or the delay is zero.
    Complete,
    OsHide,
    OsDestroy,
}

impl SessionEvent {
    pub fn for_trigger(source: TriggerSource) -> Self {
        match source {
            TriggerSource::DirectHandoff => SessionEvent::HandleAssist,
            TriggerSource::ForegroundShow | TriggerSource::KeyguardLaunch => SessionEvent::Show,
        }
    }
}

/// Where the session object came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOrigin {
    /// Issued by the OS; must be finished through the host.
    Os,
    /// Stands in for a keyguard launch, which has no OS session object.
    Synthetic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub state: SessionState,
    pub origin: SessionOrigin,
    pub created_at: DateTime<Utc>,
    pub source: Option<TriggerSource>,
    pub(crate) grace_timer: Option<u64>,
}

impl Session {
    pub fn new(id: impl Into<String>, origin: SessionOrigin, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            state: SessionState::Created,
            origin,
            created_at,
            source: None,
            grace_timer: None,
        }
    }
}
