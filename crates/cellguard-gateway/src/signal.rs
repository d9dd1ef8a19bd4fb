//! Health evaluation — one status reply in, one typed signal snapshot out.

use serde::Serialize;
use thiserror::Error;

use crate::envelope::ResponseEnvelope;

/// Why a status reply can't be evaluated. The poll should be skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UnusablePoll {
    #[error("uptime not found")]
    MissingUptime,
    #[error("wan_rx_bytes not found")]
    MissingRxBytes,
    #[error("wan_tx_bytes not found")]
    MissingTxBytes,
}

/// Device telemetry from a single usable poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SignalState {
    pub uptime_secs: u64,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    /// Primary radio frequency, `None` when the radio is absent.
    pub primary_freq: Option<i64>,
    /// Secondary radio frequency, `None` when the radio is absent.
    pub secondary_freq: Option<i64>,
    /// Signal quality (RSRQ, dB) per radio; informational only.
    pub primary_rsrq: Option<i64>,
    pub secondary_rsrq: Option<i64>,
}

impl SignalState {
    pub fn primary_present(&self) -> bool {
        self.primary_freq.is_some()
    }

    pub fn secondary_present(&self) -> bool {
        self.secondary_freq.is_some()
    }

    /// Cumulative WAN traffic in both directions.
    pub fn total_bytes(&self) -> u64 {
        self.rx_bytes.saturating_add(self.tx_bytes)
    }
}

/// Evaluate a status reply.
///
/// Uptime and both traffic counters are mandatory; a radio counts as
/// present only when its frequency parses as a number.
pub fn evaluate(envelope: &ResponseEnvelope) -> Result<SignalState, UnusablePoll> {
    let uptime_secs = envelope
        .uptime
        .unsigned()
        .ok_or(UnusablePoll::MissingUptime)?;
    let rx_bytes = envelope
        .wan_rx_bytes
        .unsigned()
        .ok_or(UnusablePoll::MissingRxBytes)?;
    let tx_bytes = envelope
        .wan_tx_bytes
        .unsigned()
        .ok_or(UnusablePoll::MissingTxBytes)?;

    Ok(SignalState {
        uptime_secs,
        rx_bytes,
        tx_bytes,
        primary_freq: envelope.freq.value(),
        secondary_freq: envelope.freq_5g.value(),
        primary_rsrq: envelope.rsrq.value(),
        secondary_rsrq: envelope.rsrq_5g.value(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::parse_envelope;

    fn envelope(json: &str) -> ResponseEnvelope {
        parse_envelope(json.as_bytes()).unwrap()
    }

    #[test]
    fn evaluates_both_radios_present() {
        let state = evaluate(&envelope(
            r#"{"success":true,"uptime":"120","wan_rx_bytes":"1000","wan_tx_bytes":"500",
                "FREQ":"1850","FREQ_5G":"3500","RSRQ":"-12","RSRQ_5G":"-8"}"#,
        ))
        .unwrap();
        assert_eq!(state.uptime_secs, 120);
        assert_eq!(state.total_bytes(), 1500);
        assert!(state.primary_present());
        assert!(state.secondary_present());
        assert_eq!(state.primary_rsrq, Some(-12));
        assert_eq!(state.secondary_rsrq, Some(-8));
    }

    #[test]
    fn non_numeric_frequency_means_absent() {
        let state = evaluate(&envelope(
            r#"{"uptime":"1","wan_rx_bytes":"0","wan_tx_bytes":"0","FREQ":"1850","FREQ_5G":"-"}"#,
        ))
        .unwrap();
        assert!(state.primary_present());
        assert!(!state.secondary_present());

        let state = evaluate(&envelope(
            r#"{"uptime":"1","wan_rx_bytes":"0","wan_tx_bytes":"0","FREQ":null}"#,
        ))
        .unwrap();
        assert!(!state.primary_present());
        assert!(!state.secondary_present());
    }

    #[test]
    fn signal_quality_is_independent_of_presence() {
        let state = evaluate(&envelope(
            r#"{"uptime":"1","wan_rx_bytes":"0","wan_tx_bytes":"0","RSRQ_5G":"-20"}"#,
        ))
        .unwrap();
        assert!(!state.secondary_present());
        assert_eq!(state.secondary_rsrq, Some(-20));
    }

    #[test]
    fn missing_counters_make_the_poll_unusable() {
        assert_eq!(
            evaluate(&envelope(r#"{"wan_rx_bytes":"0","wan_tx_bytes":"0"}"#)),
            Err(UnusablePoll::MissingUptime)
        );
        assert_eq!(
            evaluate(&envelope(r#"{"uptime":"5","wan_tx_bytes":"0"}"#)),
            Err(UnusablePoll::MissingRxBytes)
        );
        assert_eq!(
            evaluate(&envelope(r#"{"uptime":"5","wan_rx_bytes":"x","wan_tx_bytes":"0"}"#)),
            Err(UnusablePoll::MissingRxBytes)
        );
        assert_eq!(
            evaluate(&envelope(r#"{"uptime":"5","wan_rx_bytes":"0"}"#)),
            Err(UnusablePoll::MissingTxBytes)
        );
    }

    #[test]
    fn reboot_ack_is_not_a_usable_poll() {
        assert_eq!(
            evaluate(&ResponseEnvelope::reboot_ack()),
            Err(UnusablePoll::MissingRxBytes)
        );
    }
}
