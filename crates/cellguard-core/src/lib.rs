//! cellguard-core — configuration and status events shared by the watchdog crates.
//!
//! # Components
//!
//! - **`config`** — `cellguard.toml` parsing, defaults, env overrides, validation
//! - **`duration`** — human-readable durations (`"5s"`, `"3m"`)
//! - **`event`** — status events and the non-blocking sinks that carry them
//! - **`types`** — the recovery controller's phase

pub mod config;
pub mod duration;
pub mod error;
pub mod event;
pub mod types;

pub use config::{
    Credentials, DashboardConfig, DeviceConfig, RecoveryConfig, RetryConfig, TriggerMode,
    WatchdogConfig,
};
pub use error::{ConfigError, ConfigResult};
pub use event::{ChannelSink, EventSink, LogLevel, LogLine, MemorySink, NullSink, StatusEvent};
pub use types::ControllerState;
