//! Command payloads for the router's JSON CGI endpoint.
//!
//! Three fixed commands are used: 133 (status), 100 (login), 6 (reboot).
//! Payloads are built fresh for every call.

use std::fmt;

use serde::Serialize;

use cellguard_core::Credentials;

use crate::executor::RequestKind;

pub const CMD_MONITOR: u32 = 133;
pub const CMD_LOGIN: u32 = 100;
pub const CMD_REBOOT: u32 = 6;

const LANGUAGE: &str = "EN";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorPayload {
    pub cmd: u32,
    pub method: &'static str,
    pub language: &'static str,
    pub session_id: String,
}

#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginPayload {
    pub cmd: u32,
    pub method: &'static str,
    pub language: &'static str,
    pub session_id: String,
    pub username: String,
    pub passwd: String,
    pub is_auto_upgrade: &'static str,
}

impl fmt::Debug for LoginPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginPayload")
            .field("cmd", &self.cmd)
            .field("session_id", &self.session_id)
            .field("username", &self.username)
            .field("passwd", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RebootPayload {
    pub cmd: u32,
    pub reboot_type: u32,
    pub method: &'static str,
    pub language: &'static str,
    pub session_id: String,
}

/// Any command the watchdog can send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CommandPayload {
    Monitor(MonitorPayload),
    Login(LoginPayload),
    Reboot(RebootPayload),
}

impl CommandPayload {
    /// How the executor should interpret the response to this command.
    pub fn kind(&self) -> RequestKind {
        match self {
            Self::Monitor(_) => RequestKind::Monitor,
            Self::Login(_) => RequestKind::Login,
            Self::Reboot(_) => RequestKind::Reboot,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// Status poll: radios, counters, uptime.
pub fn build_monitor_payload() -> CommandPayload {
    CommandPayload::Monitor(MonitorPayload {
        cmd: CMD_MONITOR,
        method: "GET",
        language: LANGUAGE,
        session_id: String::new(),
    })
}

/// Admin login. `session_id` is normally empty.
pub fn build_login_payload(credentials: &Credentials, session_id: &str) -> CommandPayload {
    CommandPayload::Login(LoginPayload {
        cmd: CMD_LOGIN,
        method: "POST",
        language: LANGUAGE,
        session_id: session_id.to_string(),
        username: credentials.username.clone(),
        passwd: credentials.password_hash.clone(),
        is_auto_upgrade: "0",
    })
}

/// Full device reboot, authorized by a login session.
pub fn build_reboot_payload(session_id: &str) -> CommandPayload {
    CommandPayload::Reboot(RebootPayload {
        cmd: CMD_REBOOT,
        reboot_type: 1,
        method: "POST",
        language: LANGUAGE,
        session_id: session_id.to_string(),
    })
}
