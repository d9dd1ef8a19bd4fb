//! cellguard-dashboard — operator view of the watchdog.
//!
//! Consumes the status event channel. [`run_dashboard`] draws a full-screen
//! board with crossterm; [`run_headless`] forwards log lines to tracing
//! for service deployments without a terminal.

pub mod headless;
pub mod render;
pub mod state;
pub mod terminal;

pub use headless::run_headless;
pub use render::{SignalTier, format_megabytes, format_uptime, render};
pub use state::{DashboardState, LogPane};
pub use terminal::run_dashboard;
