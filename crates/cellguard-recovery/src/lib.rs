//! cellguard-recovery — secondary-radio outage detection and device recovery.
//!
//! # Architecture
//!
//! ```text
//! Watchdog::run
//!   ├── monitor poll (RequestExecutor) → evaluate() → SignalState
//!   ├── RecoveryController::observe() → Decision
//!   │   ├── Hold      → sleep
//!   │   ├── PollNow   → poll again immediately (transient flap)
//!   │   └── Recover   → login → reboot → cooldown
//!   └── StatusEvent stream → EventSink
//! ```

pub mod controller;
pub mod watchdog;

pub use controller::{Decision, DeviceBaseline, HoldReason, Outage, RecoveryController};
pub use watchdog::Watchdog;
