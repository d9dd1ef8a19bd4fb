//! Domain types shared between the watchdog and the dashboard.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Phase of the recovery state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControllerState {
    /// Polling normally.
    #[default]
    Monitoring,
    /// Secondary radio absent, still inside the grace window.
    Degraded,
    /// Logging in to obtain a session for the reboot.
    Authenticating,
    /// Reboot command in flight.
    Rebooting,
    /// Quiet period after a reboot.
    Cooldown,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Monitoring => "monitoring",
            Self::Degraded => "degraded",
            Self::Authenticating => "authenticating",
            Self::Rebooting => "rebooting",
            Self::Cooldown => "cooldown",
        };
        f.write_str(label)
    }
}
