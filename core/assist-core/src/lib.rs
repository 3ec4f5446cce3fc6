//! # assist-core
//!
//! Activation coordinator for running an application as the device's digital
//! assistant. The Android host forwards OS callbacks here; the core decides
//! when and whether the overlay appears and when the OS session must end.
//!
//! ## Design Principles
//!
//! - **Single-threaded**: All transitions run on the thread that delivers OS
//!   callbacks. The only asynchronous element is the grace timer, which the
//!   host schedules and reports back.
//! - **Never fatal**: Every failure becomes an `activation.failed` event or a
//!   log line. Late OS callbacks are diagnosed, never escalated.
//! - **No cached grants**: Permissions are re-checked on every gated operation.
//! - **FFI-ready**: UniFFI annotations generate the Kotlin bindings. The host
//!   implements the collaborator traits in [`platform`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use assist_core::{load_config, AssistEngine};
//!
//! let config = load_config(None)?;
//! let engine = AssistEngine::new(config, platform, host, scheduler, bridge);
//! engine.on_direct_handoff("session-1".into(), None, None, Some(content));
//! ```

// UniFFI scaffolding for Kotlin bindings
uniffi::setup_scaffolding!();

pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod gatekeeper;
pub mod outbox;
pub mod overlay;
pub mod platform;
pub mod router;
pub mod session;
pub mod types;

#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;


pub use config::*;
pub use coordinator::Coordinator;
pub use engine::AssistEngine;
pub use error::{AssistError, AssistFfiError, Result};
pub use gatekeeper::PermissionGatekeeper;
pub use overlay::{HideOutcome, OverlayController, OverlayVisibility, ShowOutcome};
pub use platform::*;
pub use router::{ActivationSink, TriggerRouter};
pub use session::{Session, SessionController, SessionEvent, SessionOrigin, SessionState};
pub use types::*;
