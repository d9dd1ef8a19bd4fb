//! Everything the dashboard shows, folded from the event stream.

use std::collections::VecDeque;

use chrono::{DateTime, Local};

use cellguard_core::{ControllerState, LogLine, StatusEvent};

/// The most recent `capacity` log lines, oldest first.
#[derive(Debug, Clone)]
pub struct LogPane {
    lines: VecDeque<LogLine>,
    capacity: usize,
}

impl LogPane {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, line: LogLine) {
        if self.capacity == 0 {
            return;
        }
        while self.lines.len() >= self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogLine> {
        self.lines.iter()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct DashboardState {
    pub uptime_secs: u64,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub primary_freq: Option<i64>,
    pub secondary_freq: Option<i64>,
    pub primary_rsrq: Option<i64>,
    pub secondary_rsrq: Option<i64>,
    pub last_reboot: Option<DateTime<Local>>,
    pub controller: ControllerState,
    pub logs: LogPane,
}

impl DashboardState {
    pub fn new(max_log_lines: usize) -> Self {
        Self {
            uptime_secs: 0,
            rx_bytes: 0,
            tx_bytes: 0,
            primary_freq: None,
            secondary_freq: None,
            primary_rsrq: None,
            secondary_rsrq: None,
            last_reboot: None,
            controller: ControllerState::default(),
            logs: LogPane::new(max_log_lines),
        }
    }

    pub fn apply(&mut self, event: StatusEvent) {
        match event {
            StatusEvent::Uptime(secs) => self.uptime_secs = secs,
            StatusEvent::RxBytes(bytes) => self.rx_bytes = bytes,
            StatusEvent::TxBytes(bytes) => self.tx_bytes = bytes,
            StatusEvent::PrimaryRadio(freq) => self.primary_freq = freq,
            StatusEvent::SecondaryRadio(freq) => self.secondary_freq = freq,
            StatusEvent::SignalQuality { primary, secondary } => {
                self.primary_rsrq = primary;
                self.secondary_rsrq = secondary;
            }
            StatusEvent::LastReboot(at) => self.last_reboot = Some(at),
            StatusEvent::State(state) => self.controller = state,
            StatusEvent::Log(line) => self.logs.push(line),
        }
    }
}

#[cfg(test)]
mod tests {
    use cellguard_core::LogLevel;

    use super::*;

    #[test]
    fn folds_latest_values() {
        let mut s = DashboardState::new(15);
        s.apply(StatusEvent::Uptime(10));
        s.apply(StatusEvent::Uptime(11));
        s.apply(StatusEvent::RxBytes(2_000_000));
        s.apply(StatusEvent::SecondaryRadio(Some(3500)));
        s.apply(StatusEvent::SecondaryRadio(None));
        s.apply(StatusEvent::SignalQuality {
            primary: Some(-12),
            secondary: None,
        });
        s.apply(StatusEvent::State(ControllerState::Cooldown));

        assert_eq!(s.uptime_secs, 11);
        assert_eq!(s.rx_bytes, 2_000_000);
        assert_eq!(s.secondary_freq, None);
        assert_eq!(s.primary_rsrq, Some(-12));
        assert_eq!(s.controller, ControllerState::Cooldown);
        assert!(s.last_reboot.is_none());
    }

    #[test]
    fn log_pane_drops_oldest() {
        let mut s = DashboardState::new(3);
        for i in 0..5 {
            s.apply(StatusEvent::Log(LogLine::now(LogLevel::Info, format!("line {i}"))));
        }
        let shown: Vec<&str> = s.logs.iter().map(|l| l.message.as_str()).collect();
        assert_eq!(shown, vec!["line 2", "line 3", "line 4"]);
    }

    #[test]
    fn zero_capacity_pane_stays_empty() {
        let mut pane = LogPane::new(0);
        pane.push(LogLine::now(LogLevel::Error, "dropped"));
        assert!(pane.is_empty());
    }
}
