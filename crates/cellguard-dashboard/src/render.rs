//! Layout of the status board as styled text lines.
//!
//! Pure: no terminal access. The terminal module maps each [`Tone`] to
//! colors and writes the lines out.

use std::time::Duration;

use cellguard_core::{ControllerState, LogLevel};

use crate::state::DashboardState;

/// Semantic style of a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Plain,
    Title,
    /// Value is healthy.
    Ok,
    /// Value is missing or recently reset.
    Alert,
    Tier(SignalTier),
    Level(LogLevel),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub tone: Tone,
}

impl Span {
    fn new(text: impl Into<String>, tone: Tone) -> Self {
        Self {
            text: text.into(),
            tone,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Line {
    pub spans: Vec<Span>,
}

impl Line {
    fn push(mut self, text: impl Into<String>, tone: Tone) -> Self {
        self.spans.push(Span::new(text, tone));
        self
    }

    /// The line without styling.
    pub fn text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }
}

/// Signal quality bucket derived from RSRQ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SignalTier {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl SignalTier {
    /// Primary (LTE) radio thresholds.
    pub fn primary(rsrq: i64) -> Self {
        if rsrq < -15 {
            Self::Poor
        } else if rsrq <= -10 {
            Self::Fair
        } else if rsrq <= -5 {
            Self::Good
        } else {
            Self::Excellent
        }
    }

    /// Secondary (5G) radio thresholds.
    pub fn secondary(rsrq: i64) -> Self {
        if rsrq <= -15 {
            Self::Poor
        } else if rsrq <= -9 {
            Self::Fair
        } else if rsrq <= -5 {
            Self::Good
        } else {
            Self::Excellent
        }
    }

    pub fn bars(self) -> &'static str {
        match self {
            Self::Poor => "■□□□",
            Self::Fair => "■■□□",
            Self::Good => "■■■□",
            Self::Excellent => "■■■■",
        }
    }
}

/// `h:mm:ss`, hours unbounded.
pub fn format_uptime(secs: u64) -> String {
    format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Decimal megabytes, two places.
pub fn format_megabytes(bytes: u64) -> String {
    format!("{:8.2}MB", bytes as f64 * 1e-6)
}

const WIDTH: usize = 32;

fn centered(text: &str) -> String {
    format!("{text:^width$}", width = WIDTH)
}

fn frequency(freq: Option<i64>) -> (String, Tone) {
    match freq {
        Some(f) => (format!("{f:>7}"), Tone::Ok),
        None => ("     NA".to_string(), Tone::Alert),
    }
}

fn quality(rsrq: Option<i64>, tier: fn(i64) -> SignalTier) -> (String, Tone) {
    match rsrq {
        Some(v) => {
            let t = tier(v);
            (format!("{v:>3} {}", t.bars()), Tone::Tier(t))
        }
        None => (" NA □□□□".to_string(), Tone::Alert),
    }
}

/// Build every line of the board.
pub fn render(state: &DashboardState, settling_uptime: Duration) -> Vec<Line> {
    let mut lines = Vec::new();

    lines.push(Line::default().push(centered("cellguard"), Tone::Title));
    lines.push(Line::default().push(centered("---------"), Tone::Title));
    lines.push(Line::default());

    let (p_freq, p_tone) = frequency(state.primary_freq);
    let (s_freq, s_tone) = frequency(state.secondary_freq);
    lines.push(
        Line::default()
            .push("4G ", Tone::Title)
            .push(p_freq, p_tone)
            .push("    5G ", Tone::Title)
            .push(s_freq, s_tone),
    );

    let (p_q, p_q_tone) = quality(state.primary_rsrq, SignalTier::primary);
    let (s_q, s_q_tone) = quality(state.secondary_rsrq, SignalTier::secondary);
    lines.push(
        Line::default()
            .push("ᯤ: ", Tone::Title)
            .push(p_q, p_q_tone)
            .push("   ᯤ: ", Tone::Title)
            .push(s_q, s_q_tone),
    );

    lines.push(
        Line::default()
            .push("↑U", Tone::Title)
            .push(format_megabytes(state.tx_bytes), Tone::Plain)
            .push("  ↓D", Tone::Title)
            .push(format_megabytes(state.rx_bytes), Tone::Plain),
    );

    let uptime_tone = if state.uptime_secs < settling_uptime.as_secs() {
        Tone::Alert
    } else {
        Tone::Ok
    };
    lines.push(
        Line::default()
            .push("UPtime: ", Tone::Title)
            .push(format_uptime(state.uptime_secs), uptime_tone),
    );

    let reboot = match state.last_reboot {
        Some(at) => Line::default()
            .push("REboot: ", Tone::Title)
            .push(at.format("%Y-%m-%d %H:%M:%S").to_string(), Tone::Alert),
        None => Line::default()
            .push("REboot: ", Tone::Title)
            .push("NONE", Tone::Ok),
    };
    lines.push(reboot);

    let state_tone = match state.controller {
        ControllerState::Monitoring => Tone::Ok,
        _ => Tone::Alert,
    };
    lines.push(
        Line::default()
            .push("State:  ", Tone::Title)
            .push(state.controller.to_string(), state_tone),
    );
    lines.push(Line::default());

    for log in state.logs.iter() {
        lines.push(
            Line::default()
                .push(format!("  {} ", log.at.format("%H:%M:%S")), Tone::Plain)
                .push(log.level.to_string(), Tone::Level(log.level))
                .push(format!(" {}", log.message), Tone::Plain),
        );
    }

    lines.push(Line::default());
    lines.push(Line::default().push(centered("press 'q' to stop."), Tone::Title));
    lines
}
