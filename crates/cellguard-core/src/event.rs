//! Status events flowing from the watchdog to the presentation task.
//!
//! The watchdog never waits on its consumer: [`ChannelSink`] uses
//! `try_send` on a bounded channel. When the dashboard falls behind, log
//! lines and telemetry are dropped, while the latest controller state and
//! reboot time are held back and delivered once the channel has room.
//! Consecutive identical log lines are collapsed.

use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Local};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::trace;

use crate::types::ControllerState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Debug => "DEBU",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERRO",
        })
    }
}

/// One operator-facing log line.
#[derive(Debug, Clone, PartialEq)]
pub struct LogLine {
    pub at: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
}

impl LogLine {
    pub fn now(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            at: Local::now(),
            level,
            message: message.into(),
        }
    }
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.at.format("%H:%M:%S"), self.level, self.message)
    }
}

/// Everything the dashboard can be told about the device.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusEvent {
    Uptime(u64),
    RxBytes(u64),
    TxBytes(u64),
    /// Primary radio frequency, `None` while absent.
    PrimaryRadio(Option<i64>),
    /// Secondary radio frequency, `None` while absent.
    SecondaryRadio(Option<i64>),
    SignalQuality {
        primary: Option<i64>,
        secondary: Option<i64>,
    },
    LastReboot(DateTime<Local>),
    State(ControllerState),
    Log(LogLine),
}

/// Destination for status events. Implementations must not block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: StatusEvent);

    fn log(&self, level: LogLevel, message: String) {
        self.emit(StatusEvent::Log(LogLine::now(level, message)));
    }
}

impl<T: EventSink + ?Sized> EventSink for Arc<T> {
    fn emit(&self, event: StatusEvent) {
        (**self).emit(event);
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: StatusEvent) {}
}

/// Keeps every event in memory, in order.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<StatusEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far.
    pub fn events(&self) -> Vec<StatusEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Messages of the log events emitted so far.
    pub fn log_messages(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                StatusEvent::Log(line) => Some(line.message),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: StatusEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}

/// Latest state and reboot events that did not fit in the channel.
#[derive(Debug, Default)]
struct Held {
    last_reboot: Option<DateTime<Local>>,
    state: Option<ControllerState>,
}

impl Held {
    fn is_empty(&self) -> bool {
        self.last_reboot.is_none() && self.state.is_none()
    }
}

/// Fire-and-forget sender half of the dashboard channel.
pub struct ChannelSink {
    tx: mpsc::Sender<StatusEvent>,
    min_level: LogLevel,
    last_log: Mutex<Option<(LogLevel, String)>>,
    held: Mutex<Held>,
}

impl ChannelSink {
    /// Create a bounded channel. Debug log lines are only forwarded when
    /// `verbose` is set.
    pub fn channel(capacity: usize, verbose: bool) -> (Self, mpsc::Receiver<StatusEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let min_level = if verbose {
            LogLevel::Debug
        } else {
            LogLevel::Info
        };
        let sink = Self {
            tx,
            min_level,
            last_log: Mutex::new(None),
            held: Mutex::new(Held::default()),
        };
        (sink, rx)
    }

    /// True when this line repeats the previous one and should be dropped.
    fn is_duplicate(&self, line: &LogLine) -> bool {
        let mut last = self
            .last_log
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let duplicate = matches!(
            last.as_ref(),
            Some((level, message)) if *level == line.level && *message == line.message
        );
        if !duplicate {
            *last = Some((line.level, line.message.clone()));
        }
        duplicate
    }

    /// Send held events, reboot first. Stops at the first one that does
    /// not fit.
    fn flush(&self, held: &mut Held) {
        if let Some(at) = held.last_reboot {
            if self.tx.try_send(StatusEvent::LastReboot(at)).is_err() {
                return;
            }
            held.last_reboot = None;
        }
        if let Some(state) = held.state {
            if self.tx.try_send(StatusEvent::State(state)).is_err() {
                return;
            }
            held.state = None;
        }
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: StatusEvent) {
        if let StatusEvent::Log(line) = &event {
            if line.level < self.min_level || self.is_duplicate(line) {
                return;
            }
        }

        let mut held = self
            .held
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        self.flush(&mut held);

        // Held events go out first, so newer ones queue behind them.
        let backlog = !held.is_empty();
        match event {
            StatusEvent::LastReboot(at) if backlog => held.last_reboot = Some(at),
            StatusEvent::State(state) if backlog => held.state = Some(state),
            event => match self.tx.try_send(event) {
                Ok(()) => {}
                Err(TrySendError::Full(StatusEvent::LastReboot(at))) => {
                    held.last_reboot = Some(at);
                }
                Err(TrySendError::Full(StatusEvent::State(state))) => held.state = Some(state),
                Err(e) => trace!(error = %e, "status event dropped"),
            },
        }
    }
}
