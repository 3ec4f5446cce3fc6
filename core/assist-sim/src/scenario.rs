//! Scenario files: a device profile plus an ordered list of OS callbacks and
//! UI commands.

use std::path::Path;

use assist_core::RoleSupport;
use assist_protocol::PermissionKind;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub device: DeviceProfile,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeviceProfile {
    pub role_support: RoleSupportName,
    pub role_held: bool,
    pub voice_service: Option<String>,
    pub overlay: bool,
    pub foreground_activity: bool,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            role_support: RoleSupportName::Available,
            role_held: true,
            voice_service: None,
            overlay: true,
            foreground_activity: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleSupportName {
    Available,
    Unavailable,
    Legacy,
    Unknown,
}

impl From<RoleSupportName> for RoleSupport {
    fn from(name: RoleSupportName) -> Self {
        match name {
            RoleSupportName::Available => RoleSupport::Available,
            RoleSupportName::Unavailable => RoleSupport::Unavailable,
            RoleSupportName::Legacy => RoleSupport::Legacy,
            RoleSupportName::Unknown => RoleSupport::Unknown,
        }
    }
}

/// One scripted input. Owner fields default to the in-flight owner, which is
/// how keyguard activations (with generated owners) are addressed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    UiReady {
        #[serde(default = "default_true")]
        ready: bool,
    },
    SessionCreated {
        session: String,
    },
    ForegroundShow {
        session: String,
        #[serde(default)]
        payload: Option<String>,
    },
    KeyguardLaunch,
    DirectHandoff {
        session: String,
        #[serde(default)]
        content: Option<String>,
    },
    SessionHidden {
        session: String,
    },
    SessionDestroyed {
        session: String,
    },
    /// Advances virtual time, firing due timers in order.
    Wait {
        ms: u64,
    },
    Hide {
        #[serde(default)]
        owner: Option<String>,
    },
    Finish {
        #[serde(default)]
        owner: Option<String>,
    },
    SubmitQuery {
        #[serde(default)]
        owner: Option<String>,
        text: String,
    },
    RequestPermission {
        kind: PermissionKind,
    },
    /// Raw JSON command, as a JSON-only bridge would send it.
    Command {
        json: String,
    },
    SetOverlay {
        granted: bool,
    },
    SetRoleHeld {
        held: bool,
    },
    Status,
}

fn default_true() -> bool {
    true
}

pub fn load(path: &Path) -> Result<Scenario, String> {
    let content = fs_err::read_to_string(path).map_err(|err| err.to_string())?;
    parse(&content).map_err(|err| format!("{}: {}", path.display(), err))
}

pub fn parse(content: &str) -> Result<Scenario, serde_json::Error> {
    serde_json::from_str(content)
}
