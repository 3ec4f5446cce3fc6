//! Runtime configuration for the coordinator.
//!
//! The host normally builds an [`AssistConfig`] directly and passes it across
//! FFI. The simulator and desktop tooling load it from an optional TOML file:
//! a missing file yields defaults, a malformed one is an error.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{AssistError, Result};

pub const DEFAULT_GRACE_DELAY_MS: u64 = 50;
/// Upper bound for the session grace delay; larger values are clamped.
pub const MAX_GRACE_DELAY_MS: u64 = 90;
pub const DEFAULT_PENDING_EVENT_LIMIT: u32 = 32;
pub const DEFAULT_FINISHED_SESSION_RETENTION: u32 = 16;

const CONFIG_RELATIVE_PATH: &str = "assist/config.toml";

/// When the OS default session UI is disabled relative to the overlay hand-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, uniffi::Enum)]
#[serde(rename_all = "snake_case")]
pub enum UiSuppression {
    #[default]
    BeforeLaunch,
    AfterLaunch,
    Never,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, uniffi::Record)]
#[serde(default, deny_unknown_fields)]
pub struct AssistConfig {
    /// Application id, matched against the voice-interaction service on legacy platforms.
    pub package_name: String,
    /// Delay between overlay hand-off and finishing the OS session; 0 finishes immediately.
    pub grace_delay_ms: u64,
    pub ui_suppression: UiSuppression,
    /// Bridge events buffered while the UI runtime is not ready.
    pub pending_event_limit: u32,
    /// Finished sessions remembered so late OS callbacks are recognised.
    pub finished_session_retention: u32,
}

impl Default for AssistConfig {
    fn default() -> Self {
        Self {
            package_name: String::new(),
            grace_delay_ms: DEFAULT_GRACE_DELAY_MS,
            ui_suppression: UiSuppression::default(),
            pending_event_limit: DEFAULT_PENDING_EVENT_LIMIT,
            finished_session_retention: DEFAULT_FINISHED_SESSION_RETENTION,
        }
    }
}

impl AssistConfig {
    /// Clamps out-of-range values, logging each adjustment.
    pub fn validated(mut self) -> Self {
        if self.grace_delay_ms > MAX_GRACE_DELAY_MS {
            warn!(
                requested = self.grace_delay_ms,
                max = MAX_GRACE_DELAY_MS,
                "Grace delay clamped"
            );
            self.grace_delay_ms = MAX_GRACE_DELAY_MS;
        }
        if self.pending_event_limit == 0 {
            warn!("pending_event_limit must be at least 1");
            self.pending_event_limit = 1;
        }
        self
    }
}

/// Returns `<config_dir>/assist/config.toml`, if a config dir exists.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_RELATIVE_PATH))
}

/// Loads and validates the config at `path` (or the default path).
pub fn load_config(path: Option<&Path>) -> Result<AssistConfig> {
    let config_path = match path {
        Some(path) => path.to_path_buf(),
        None => match default_config_path() {
            Some(path) => path,
            None => return Ok(AssistConfig::default()),
        },
    };

    if !config_path.exists() {
        return Ok(AssistConfig::default());
    }

    let content = fs_err::read_to_string(&config_path).map_err(|source| AssistError::Io {
        context: format!("reading {}", config_path.display()),
        source,
    })?;
    parse_config(&content, &config_path)
}

pub fn parse_config(content: &str, path: &Path) -> Result<AssistConfig> {
    toml::from_str::<AssistConfig>(content)
        .map(AssistConfig::validated)
        .map_err(|err| AssistError::ConfigMalformed {
            path: path.to_path_buf(),
            details: err.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Result<AssistConfig> {
        parse_config(content, Path::new("config.toml"))
    }

    #[test]
    fn empty_file_yields_defaults() {
        assert_eq!(parse("").unwrap(), AssistConfig::default());
    }

    #[test]
    fn reads_all_keys() {
        let config = parse(
            r#"
            package_name = "com.example.assist"
            grace_delay_ms = 0
            ui_suppression = "after_launch"
            pending_event_limit = 4
            finished_session_retention = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.package_name, "com.example.assist");
        assert_eq!(config.grace_delay_ms, 0);
        assert_eq!(config.ui_suppression, UiSuppression::AfterLaunch);
        assert_eq!(config.pending_event_limit, 4);
        assert_eq!(config.finished_session_retention, 2);
    }

    #[test]
    fn clamps_grace_delay() {
        let config = parse("grace_delay_ms = 5000").unwrap();
        assert_eq!(config.grace_delay_ms, MAX_GRACE_DELAY_MS);
    }

    #[test]
    fn zero_pending_limit_raised_to_one() {
        let config = parse("pending_event_limit = 0").unwrap();
        assert_eq!(config.pending_event_limit, 1);
    }

    #[test]
    fn unknown_key_is_malformed() {
        let err = parse("grace_delay = 10").unwrap_err();
        assert!(matches!(err, AssistError::ConfigMalformed { .. }));
    }
}
