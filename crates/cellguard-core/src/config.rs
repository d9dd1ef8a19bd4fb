//! cellguard.toml configuration.
//!
//! Every section is optional; missing keys fall back to the defaults below.
//! Environment overrides (`IP`, `UNICOM_USER`, `PASSWORD_HASH`, `DEBUG`) are
//! applied on top of the file by [`WatchdogConfig::apply_env`].

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::duration::human;
use crate::error::{ConfigError, ConfigResult};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WatchdogConfig {
    pub device: DeviceConfig,
    pub retry: RetryConfig,
    pub recovery: RecoveryConfig,
    pub dashboard: DashboardConfig,
}

/// Router address and login material.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DeviceConfig {
    /// Router host, optionally with a port (`192.168.0.1`, `10.0.0.1:8080`).
    pub host: String,
    /// CGI endpoint path on the router.
    pub path: String,
    #[serde(with = "human")]
    pub connect_timeout: Duration,
    #[serde(skip_serializing)]
    pub username: String,
    /// Password as the router expects it on the wire (already hashed).
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub verbose: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            host: "192.168.0.1".to_string(),
            path: "/cgi-bin/http.cgi".to_string(),
            connect_timeout: Duration::from_secs(10),
            username: String::new(),
            password_hash: String::new(),
            verbose: false,
        }
    }
}

impl fmt::Debug for DeviceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceConfig")
            .field("host", &self.host)
            .field("path", &self.path)
            .field("connect_timeout", &self.connect_timeout)
            .field("username", &self.username)
            .field("password_hash", &"<redacted>")
            .field("verbose", &self.verbose)
            .finish()
    }
}

impl DeviceConfig {
    /// Full URL of the command endpoint.
    pub fn endpoint(&self) -> String {
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        format!("http://{}{}", self.host.trim_end_matches('/'), path)
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            username: self.username.clone(),
            password_hash: self.password_hash.clone(),
        }
    }
}

/// Login material for the router's admin session.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password_hash: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password_hash", &"<redacted>")
            .finish()
    }
}

/// Per-request retry budget and exponential backoff.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    #[serde(with = "human")]
    pub base_delay: Duration,
    #[serde(with = "human")]
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(32),
        }
    }
}

impl RetryConfig {
    /// Delay after the failed attempt number `attempt` (0-based):
    /// `min(base * 2^attempt, max)`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        1u32.checked_shl(attempt)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }
}

/// How the grace-period thresholds combine before recovery fires.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TriggerMode {
    /// Recover once the outage exceeds the time OR the byte tolerance.
    #[default]
    Either,
    /// Recover only once both tolerances are exceeded.
    Both,
}

/// Thresholds and delays for the recovery state machine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Sleep between polls while nothing is wrong.
    #[serde(with = "human")]
    pub poll_interval: Duration,
    /// Sleep after a poll that was missing uptime or traffic counters.
    #[serde(with = "human")]
    pub unusable_poll_delay: Duration,
    /// Tolerated secondary-radio outage, measured in device uptime.
    #[serde(with = "human")]
    pub grace_period: Duration,
    /// Tolerated traffic on the primary radio during an outage.
    pub byte_tolerance: u64,
    pub trigger: TriggerMode,
    #[serde(with = "human")]
    pub login_failure_delay: Duration,
    #[serde(with = "human")]
    pub reboot_failure_delay: Duration,
    /// Quiet period after a reboot before polling resumes.
    #[serde(with = "human")]
    pub cooldown: Duration,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            unusable_poll_delay: Duration::from_secs(1),
            grace_period: Duration::from_secs(5),
            byte_tolerance: 10_000_000,
            trigger: TriggerMode::Either,
            login_failure_delay: Duration::from_secs(180),
            reboot_failure_delay: Duration::from_secs(120),
            cooldown: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DashboardConfig {
    pub max_log_lines: usize,
    /// Uptime below this is highlighted as "recently restarted".
    #[serde(with = "human")]
    pub settling_uptime: Duration,
    /// Capacity of the event channel between the watchdog and the dashboard.
    pub event_buffer: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            max_log_lines: 15,
            settling_uptime: Duration::from_secs(240),
            event_buffer: 256,
        }
    }
}

impl WatchdogConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Serialize back to TOML. Credentials are never written out.
    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Apply environment overrides through `lookup` (normally `std::env::var`).
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("IP").filter(|v| !v.trim().is_empty()) {
            self.device.host = host.trim().to_string();
        }
        if let Some(user) = lookup("UNICOM_USER") {
            self.device.username = user;
        }
        if let Some(hash) = lookup("PASSWORD_HASH") {
            self.device.password_hash = hash;
        }
        if let Some(debug) = lookup("DEBUG") {
            self.device.verbose = debug.trim().eq_ignore_ascii_case("yes");
        }
    }

    /// Reject settings that would make the watchdog misbehave.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.device.host.trim().is_empty() {
            return Err(ConfigError::Invalid("device.host must not be empty".into()));
        }
        if self.device.connect_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "device.connect_timeout must be positive".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        if self.retry.base_delay.is_zero() {
            return Err(ConfigError::Invalid("retry.base_delay must be positive".into()));
        }
        if self.retry.max_delay < self.retry.base_delay {
            return Err(ConfigError::Invalid(format!(
                "retry.max_delay ({:?}) is smaller than retry.base_delay ({:?})",
                self.retry.max_delay, self.retry.base_delay
            )));
        }
        // Uptime is reported in whole seconds; a cold-start outage of
        // (0s, 0 bytes) must stay within tolerance.
        let grace = self.recovery.grace_period;
        if grace < Duration::from_secs(1) || grace.subsec_nanos() != 0 {
            return Err(ConfigError::Invalid(format!(
                "recovery.grace_period ({grace:?}) must be a whole number of seconds, at least 1s"
            )));
        }
        if self.recovery.byte_tolerance == 0 {
            return Err(ConfigError::Invalid(
                "recovery.byte_tolerance must be at least 1".into(),
            ));
        }
        if self.dashboard.event_buffer == 0 {
            return Err(ConfigError::Invalid(
                "dashboard.event_buffer must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_match_router_firmware() {
        let cfg = WatchdogConfig::default();
        assert_eq!(cfg.device.endpoint(), "http://192.168.0.1/cgi-bin/http.cgi");
        assert_eq!(cfg.retry.max_attempts, 5);
        assert_eq!(cfg.recovery.grace_period, Duration::from_secs(5));
        assert_eq!(cfg.recovery.byte_tolerance, 10_000_000);
        assert_eq!(cfg.recovery.trigger, TriggerMode::Either);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn parse_partial_file() {
        let cfg = WatchdogConfig::from_toml_str(
            r#"
[device]
host = "10.0.0.1:8080"

[recovery]
grace_period = "5m"
trigger = "both"
"#,
        )
        .unwrap();
        assert_eq!(cfg.device.host, "10.0.0.1:8080");
        assert_eq!(cfg.device.path, "/cgi-bin/http.cgi");
        assert_eq!(cfg.recovery.grace_period, Duration::from_secs(300));
        assert_eq!(cfg.recovery.trigger, TriggerMode::Both);
        assert_eq!(cfg.recovery.cooldown, Duration::from_secs(60));
    }

    #[test]
    fn invalid_duration_is_a_parse_error() {
        let err = WatchdogConfig::from_toml_str("[retry]\nbase_delay = \"soon\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn from_file_reads_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[retry]\nmax_attempts = 3\nmax_delay = \"8s\"").unwrap();

        let cfg = WatchdogConfig::from_file(file.path()).unwrap();
        assert_eq!(cfg.retry.max_attempts, 3);
        assert_eq!(cfg.retry.max_delay, Duration::from_secs(8));
    }

    #[test]
    fn from_file_missing_path() {
        let err = WatchdogConfig::from_file(Path::new("/nonexistent/cellguard.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn credentials_are_not_serialized() {
        let mut cfg = WatchdogConfig::default();
        cfg.device.username = "admin".into();
        cfg.device.password_hash = "deadbeef".into();

        let toml_str = cfg.to_toml_string().unwrap();
        assert!(!toml_str.contains("deadbeef"));
        assert!(!toml_str.contains("admin"));
        assert!(!format!("{:?}", cfg.device).contains("deadbeef"));
        assert!(!format!("{:?}", cfg.device.credentials()).contains("deadbeef"));
    }

    #[test]
    fn env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("IP", "192.168.8.1"),
            ("UNICOM_USER", "admin"),
            ("PASSWORD_HASH", "abc123"),
            ("DEBUG", "Yes"),
        ]);
        let mut cfg = WatchdogConfig::default();
        cfg.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(cfg.device.host, "192.168.8.1");
        assert_eq!(cfg.device.credentials().username, "admin");
        assert_eq!(cfg.device.credentials().password_hash, "abc123");
        assert!(cfg.device.verbose);
    }

    #[test]
    fn blank_ip_keeps_configured_host() {
        let mut cfg = WatchdogConfig::default();
        cfg.apply_env(|key| (key == "IP").then(|| "  ".to_string()));
        assert_eq!(cfg.device.host, "192.168.0.1");
    }

    #[test]
    fn validate_rejects_bad_retry_budget() {
        let mut cfg = WatchdogConfig::default();
        cfg.retry.max_attempts = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = WatchdogConfig::default();
        cfg.retry.max_delay = Duration::from_millis(10);
        assert!(cfg.validate().is_err());

        let mut cfg = WatchdogConfig::default();
        cfg.device.host = String::new();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_sub_second_grace() {
        for grace in ["500ms", "0s", "1500ms"] {
            let cfg = WatchdogConfig::from_toml_str(&format!(
                "[recovery]\ngrace_period = \"{grace}\"\n"
            ))
            .unwrap();
            let err = cfg.validate().unwrap_err();
            assert!(err.to_string().contains("recovery.grace_period"), "{grace}: {err}");
        }

        let cfg = WatchdogConfig::from_toml_str("[recovery]\ngrace_period = \"1s\"\n").unwrap();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_byte_tolerance() {
        let cfg = WatchdogConfig::from_toml_str("[recovery]\nbyte_tolerance = 0\n").unwrap();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("recovery.byte_tolerance"));

        let mut cfg = WatchdogConfig::default();
        cfg.recovery.byte_tolerance = 1;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn backoff_doubles_until_cap() {
        let retry = RetryConfig::default();
        let delays: Vec<u64> = (0..8).map(|a| retry.backoff(a).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 32, 32, 32]);
    }

    #[test]
    fn backoff_never_overflows() {
        let retry = RetryConfig::default();
        assert_eq!(retry.backoff(31), Duration::from_secs(32));
        assert_eq!(retry.backoff(64), Duration::from_secs(32));
        assert_eq!(retry.backoff(u32::MAX), Duration::from_secs(32));
    }

    #[test]
    fn endpoint_normalizes_slashes() {
        let device = DeviceConfig {
            host: "10.0.0.1/".into(),
            path: "cgi-bin/http.cgi".into(),
            ..Default::default()
        };
        assert_eq!(device.endpoint(), "http://10.0.0.1/cgi-bin/http.cgi");
    }
}
