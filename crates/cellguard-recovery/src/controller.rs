//! Recovery controller — decides what the watchdog does after each poll.
//!
//! The controller owns the device baseline: uptime and cumulative traffic
//! at the last poll that showed the secondary radio. When the radio goes
//! missing, the uptime and traffic accrued since that baseline are compared
//! against the grace period and byte tolerance. Short flaps are re-polled
//! immediately; longer outages start a login + reboot recovery.
//!
//! The controller does no I/O. The watchdog reports poll and recovery
//! outcomes and gets back a [`Decision`] or a delay.

use std::time::Duration;

use chrono::{DateTime, Local};
use tracing::{debug, info, warn};

use cellguard_core::{ControllerState, RecoveryConfig, TriggerMode};
use cellguard_gateway::SignalState;

/// Last known-good (uptime, cumulative bytes) snapshot. Zero means unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceBaseline {
    pub uptime_secs: u64,
    pub bytes: u64,
}

/// How far the device has drifted from its baseline while degraded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outage {
    pub downtime_secs: u64,
    pub bytes_used: u64,
}

/// Why the watchdog should wait before the next poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldReason {
    /// Secondary radio up; baseline refreshed.
    SecondaryPresent,
    /// Neither radio is up; a reboot would not help.
    NoDataConnection,
    /// The status reply lacked uptime or traffic counters.
    UnusablePoll,
    /// The status request itself failed after all retries.
    PollFailed,
}

/// What to do after a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Hold { delay: Duration, reason: HoldReason },
    /// Transient flap: poll again without sleeping.
    PollNow(Outage),
    /// Tolerance exceeded: log in and reboot.
    Recover(Outage),
}

impl Decision {
    /// Time to wait before the next poll, if no recovery is started.
    pub fn delay(&self) -> Duration {
        match self {
            Self::Hold { delay, .. } => *delay,
            Self::PollNow(_) | Self::Recover(_) => Duration::ZERO,
        }
    }
}

/// The monitoring and recovery state machine.
#[derive(Debug, Clone)]
pub struct RecoveryController {
    config: RecoveryConfig,
    state: ControllerState,
    baseline: DeviceBaseline,
    last_reboot: Option<DateTime<Local>>,
}

impl RecoveryController {
    pub fn new(config: RecoveryConfig) -> Self {
        Self {
            config,
            state: ControllerState::Monitoring,
            baseline: DeviceBaseline::default(),
            last_reboot: None,
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn baseline(&self) -> DeviceBaseline {
        self.baseline
    }

    pub fn last_reboot(&self) -> Option<DateTime<Local>> {
        self.last_reboot
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    /// Feed one usable poll into the state machine.
    pub fn observe(&mut self, signal: &SignalState) -> Decision {
        let total = signal.total_bytes();

        if signal.secondary_present() {
            self.baseline = DeviceBaseline {
                uptime_secs: signal.uptime_secs,
                bytes: total,
            };
            self.state = ControllerState::Monitoring;
            return Decision::Hold {
                delay: self.config.poll_interval,
                reason: HoldReason::SecondaryPresent,
            };
        }

        if !signal.primary_present() {
            self.state = ControllerState::Monitoring;
            warn!("no data connection on either radio");
            return Decision::Hold {
                delay: self.config.poll_interval,
                reason: HoldReason::NoDataConnection,
            };
        }

        if signal.uptime_secs < self.baseline.uptime_secs || total < self.baseline.bytes {
            info!(
                uptime = signal.uptime_secs,
                bytes = total,
                baseline_uptime = self.baseline.uptime_secs,
                baseline_bytes = self.baseline.bytes,
                "device counters went backwards, reseeding baseline"
            );
            self.baseline = DeviceBaseline {
                uptime_secs: signal.uptime_secs,
                bytes: total,
            };
        }
        if self.baseline.uptime_secs == 0 {
            self.baseline.uptime_secs = signal.uptime_secs;
        }
        if self.baseline.bytes == 0 {
            self.baseline.bytes = total;
        }

        let outage = Outage {
            downtime_secs: signal.uptime_secs - self.baseline.uptime_secs,
            bytes_used: total - self.baseline.bytes,
        };
        if self.tolerance_exceeded(&outage) {
            self.state = ControllerState::Authenticating;
            warn!(
                downtime_secs = outage.downtime_secs,
                bytes_used = outage.bytes_used,
                "secondary radio outage exceeded tolerance, starting recovery"
            );
            Decision::Recover(outage)
        } else {
            self.state = ControllerState::Degraded;
            debug!(
                downtime_secs = outage.downtime_secs,
                bytes_used = outage.bytes_used,
                "secondary radio absent, within grace"
            );
            Decision::PollNow(outage)
        }
    }

    fn tolerance_exceeded(&self, outage: &Outage) -> bool {
        let time = outage.downtime_secs >= self.config.grace_period.as_secs();
        let bytes = outage.bytes_used >= self.config.byte_tolerance;
        match self.config.trigger {
            TriggerMode::Either => time || bytes,
            TriggerMode::Both => time && bytes,
        }
    }

    /// The status reply was missing mandatory fields.
    pub fn poll_unusable(&mut self) -> Decision {
        self.state = ControllerState::Monitoring;
        Decision::Hold {
            delay: self.config.unusable_poll_delay,
            reason: HoldReason::UnusablePoll,
        }
    }

    /// The status request exhausted its retries.
    pub fn poll_failed(&mut self) -> Decision {
        self.state = ControllerState::Monitoring;
        Decision::Hold {
            delay: self.config.poll_interval,
            reason: HoldReason::PollFailed,
        }
    }

    /// Login failed or returned no session. Returns the delay before the
    /// next poll.
    pub fn login_failed(&mut self) -> Duration {
        self.state = ControllerState::Monitoring;
        self.config.login_failure_delay
    }

    pub fn login_succeeded(&mut self) {
        self.state = ControllerState::Rebooting;
    }

    /// Returns the delay before the next poll.
    pub fn reboot_failed(&mut self) -> Duration {
        self.state = ControllerState::Monitoring;
        self.config.reboot_failure_delay
    }

    /// Record the reboot, clear the baseline, enter cooldown. Returns the
    /// cooldown length.
    pub fn reboot_succeeded(&mut self, at: DateTime<Local>) -> Duration {
        self.state = ControllerState::Cooldown;
        self.baseline = DeviceBaseline::default();
        self.last_reboot = Some(at);
        info!(at = %at.format("%Y-%m-%d %H:%M:%S"), "device rebooted, cooling down");
        self.config.cooldown
    }

    /// Leave cooldown. Returns true when the state changed.
    pub fn cooldown_elapsed(&mut self) -> bool {
        if self.state == ControllerState::Cooldown {
            self.state = ControllerState::Monitoring;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RecoveryConfig {
        RecoveryConfig {
            grace_period: Duration::from_secs(5),
            byte_tolerance: 10_000_000,
            ..RecoveryConfig::default()
        }
    }

    fn signal(uptime: u64, bytes: u64, primary: bool, secondary: bool) -> SignalState {
        SignalState {
            uptime_secs: uptime,
            rx_bytes: bytes,
            tx_bytes: 0,
            primary_freq: primary.then_some(1850),
            secondary_freq: secondary.then_some(3500),
            primary_rsrq: None,
            secondary_rsrq: None,
        }
    }

    fn up(uptime: u64, bytes: u64) -> SignalState {
        signal(uptime, bytes, true, true)
    }

    fn down(uptime: u64, bytes: u64) -> SignalState {
        signal(uptime, bytes, true, false)
    }

    #[test]
    fn starts_in_monitoring_with_empty_baseline() {
        let c = RecoveryController::new(config());
        assert_eq!(c.state(), ControllerState::Monitoring);
        assert_eq!(c.baseline(), DeviceBaseline::default());
        assert!(c.last_reboot().is_none());
    }

    #[test]
    fn secondary_present_tracks_latest_poll() {
        let mut c = RecoveryController::new(config());
        for (uptime, bytes) in [(10, 100), (11, 5_000), (12, 99_999_999)] {
            let d = c.observe(&up(uptime, bytes));
            assert_eq!(
                d,
                Decision::Hold {
                    delay: Duration::from_secs(1),
                    reason: HoldReason::SecondaryPresent
                }
            );
            assert_eq!(c.state(), ControllerState::Monitoring);
            assert_eq!(
                c.baseline(),
                DeviceBaseline {
                    uptime_secs: uptime,
                    bytes
                }
            );
        }
    }

    #[test]
    fn transient_flap_then_recovery() {
        let mut c = RecoveryController::new(config());
        c.observe(&up(100, 5_000_000));

        let d = c.observe(&down(104, 6_000_000));
        assert_eq!(
            d,
            Decision::PollNow(Outage {
                downtime_secs: 4,
                bytes_used: 1_000_000
            })
        );
        assert_eq!(d.delay(), Duration::ZERO);
        assert_eq!(c.state(), ControllerState::Degraded);
        assert_eq!(c.baseline().uptime_secs, 100);

        let d = c.observe(&down(106, 16_000_001));
        assert_eq!(
            d,
            Decision::Recover(Outage {
                downtime_secs: 6,
                bytes_used: 11_000_001
            })
        );
        assert_eq!(c.state(), ControllerState::Authenticating);
    }

    #[test]
    fn either_trigger_fires_on_bytes_alone() {
        let mut c = RecoveryController::new(config());
        c.observe(&up(100, 5_000_000));
        assert!(matches!(
            c.observe(&down(101, 15_000_000)),
            Decision::Recover(_)
        ));
    }

    #[test]
    fn either_trigger_fires_on_time_alone() {
        let mut c = RecoveryController::new(config());
        c.observe(&up(100, 5_000_000));
        assert!(matches!(c.observe(&down(105, 5_000_000)), Decision::Recover(_)));
    }

    #[test]
    fn both_trigger_requires_time_and_bytes() {
        let mut c = RecoveryController::new(RecoveryConfig {
            trigger: TriggerMode::Both,
            ..config()
        });
        c.observe(&up(100, 5_000_000));
        assert!(matches!(c.observe(&down(200, 5_000_000)), Decision::PollNow(_)));
        assert!(matches!(c.observe(&down(101, 50_000_000)), Decision::PollNow(_)));
        assert!(matches!(c.observe(&down(200, 50_000_000)), Decision::Recover(_)));
    }

    #[test]
    fn cold_start_seeds_baseline_from_first_absent_poll() {
        let mut c = RecoveryController::new(config());
        let d = c.observe(&down(5_000, 80_000_000));
        assert_eq!(
            d,
            Decision::PollNow(Outage {
                downtime_secs: 0,
                bytes_used: 0
            })
        );
        assert_eq!(
            c.baseline(),
            DeviceBaseline {
                uptime_secs: 5_000,
                bytes: 80_000_000
            }
        );
    }

    #[test]
    fn degraded_polls_never_move_the_baseline() {
        let mut c = RecoveryController::new(config());
        c.observe(&up(100, 5_000_000));
        c.observe(&down(101, 5_000_100));
        c.observe(&down(102, 5_000_200));
        assert_eq!(
            c.baseline(),
            DeviceBaseline {
                uptime_secs: 100,
                bytes: 5_000_000
            }
        );
    }

    #[test]
    fn flap_stays_degraded_until_secondary_returns() {
        let mut c = RecoveryController::new(config());
        c.observe(&up(100, 0));

        let d = c.observe(&down(102, 1));
        assert_eq!(
            d,
            Decision::PollNow(Outage {
                downtime_secs: 2,
                bytes_used: 1
            })
        );
        assert_eq!(c.state(), ControllerState::Degraded);
        c.observe(&down(103, 2));
        assert_eq!(c.state(), ControllerState::Degraded);

        c.observe(&up(104, 3));
        assert_eq!(c.state(), ControllerState::Monitoring);
    }

    #[test]
    fn degraded_falls_back_to_monitoring_on_hold_paths() {
        let mut c = RecoveryController::new(config());
        c.observe(&up(100, 0));

        c.observe(&down(101, 0));
        c.poll_unusable();
        assert_eq!(c.state(), ControllerState::Monitoring);

        c.observe(&down(102, 0));
        c.poll_failed();
        assert_eq!(c.state(), ControllerState::Monitoring);

        c.observe(&down(103, 0));
        c.observe(&signal(104, 0, false, false));
        assert_eq!(c.state(), ControllerState::Monitoring);
    }

    #[test]
    fn no_data_connection_holds_without_touching_baseline() {
        let mut c = RecoveryController::new(config());
        c.observe(&up(100, 5_000_000));
        let d = c.observe(&signal(500, 90_000_000, false, false));
        assert_eq!(
            d,
            Decision::Hold {
                delay: Duration::from_secs(1),
                reason: HoldReason::NoDataConnection
            }
        );
        assert_eq!(c.state(), ControllerState::Monitoring);
        assert_eq!(c.baseline().uptime_secs, 100);
    }

    #[test]
    fn counter_regression_reseeds_baseline() {
        let mut c = RecoveryController::new(config());
        c.observe(&up(5_000, 80_000_000));
        // Device restarted by itself: uptime and counters reset.
        let d = c.observe(&down(30, 1_000));
        assert!(matches!(d, Decision::PollNow(_)));
        assert_eq!(
            c.baseline(),
            DeviceBaseline {
                uptime_secs: 30,
                bytes: 1_000
            }
        );
    }

    #[test]
    fn login_failure_returns_to_monitoring_with_long_delay() {
        let mut c = RecoveryController::new(config());
        c.observe(&up(100, 0));
        c.observe(&down(200, 0));
        assert_eq!(c.state(), ControllerState::Authenticating);

        assert_eq!(c.login_failed(), Duration::from_secs(180));
        assert_eq!(c.state(), ControllerState::Monitoring);
        assert_eq!(c.baseline().uptime_secs, 100);
    }

    #[test]
    fn reboot_failure_returns_to_monitoring() {
        let mut c = RecoveryController::new(config());
        c.observe(&up(100, 1));
        c.observe(&down(200, 1));
        c.login_succeeded();
        assert_eq!(c.state(), ControllerState::Rebooting);

        assert_eq!(c.reboot_failed(), Duration::from_secs(120));
        assert_eq!(c.state(), ControllerState::Monitoring);
        assert_eq!(c.baseline().uptime_secs, 100);
        assert!(c.last_reboot().is_none());
    }

    #[test]
    fn successful_reboot_resets_baseline_and_cools_down() {
        let mut c = RecoveryController::new(config());
        c.observe(&up(100, 1));
        c.observe(&down(200, 1));
        c.login_succeeded();

        let at = Local::now();
        assert_eq!(c.reboot_succeeded(at), Duration::from_secs(60));
        assert_eq!(c.state(), ControllerState::Cooldown);
        assert_eq!(c.baseline(), DeviceBaseline::default());
        assert_eq!(c.last_reboot(), Some(at));

        assert!(c.cooldown_elapsed());
        assert_eq!(c.state(), ControllerState::Monitoring);
        assert!(!c.cooldown_elapsed());
    }

    #[test]
    fn unusable_and_failed_polls_hold() {
        let mut c = RecoveryController::new(config());
        assert_eq!(
            c.poll_unusable(),
            Decision::Hold {
                delay: Duration::from_secs(1),
                reason: HoldReason::UnusablePoll
            }
        );
        assert_eq!(c.poll_failed().delay(), Duration::from_secs(1));
        assert_eq!(c.state(), ControllerState::Monitoring);
    }
}
