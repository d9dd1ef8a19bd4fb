//! The monitor loop: poll, evaluate, decide, recover, sleep.
//!
//! Strictly sequential. Every await point also watches the shutdown flag,
//! so the loop ends promptly mid-request or mid-sleep.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use cellguard_core::duration::format_duration;
use cellguard_core::{Credentials, EventSink, LogLevel, RecoveryConfig, StatusEvent};
use cellguard_gateway::{
    RequestExecutor, ResponseEnvelope, SignalState, build_login_payload, build_monitor_payload,
    build_reboot_payload, evaluate,
};

use crate::controller::{Decision, HoldReason, Outage, RecoveryController};

pub struct Watchdog {
    executor: RequestExecutor,
    controller: RecoveryController,
    credentials: Credentials,
    sink: Arc<dyn EventSink>,
}

impl Watchdog {
    pub fn new(
        executor: RequestExecutor,
        config: RecoveryConfig,
        credentials: Credentials,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            executor,
            controller: RecoveryController::new(config),
            credentials,
            sink,
        }
    }

    pub fn controller(&self) -> &RecoveryController {
        &self.controller
    }

    /// Run until `shutdown` flips to true or its sender is dropped.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("watchdog started");
        self.emit_state();

        loop {
            if *shutdown.borrow() {
                break;
            }

            let delay = tokio::select! {
                delay = self.run_cycle() => delay,
                _ = shutdown.changed() => break,
            };

            if !delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown.changed() => break,
                }
            }

            if self.controller.cooldown_elapsed() {
                debug!("cooldown over, resuming monitoring");
                self.emit_state();
            }
        }

        info!("watchdog stopped");
    }

    /// One control-loop iteration. Returns how long to sleep afterwards.
    pub async fn run_cycle(&mut self) -> Duration {
        let envelope = match self.executor.execute(&build_monitor_payload()).await {
            Ok(envelope) => envelope,
            Err(e) => {
                let cause = e.display_chain();
                error!(error = %cause, "status poll failed");
                self.sink
                    .log(LogLevel::Error, format!("status poll failed: {cause}"));
                let decision = self.controller.poll_failed();
                self.emit_state();
                return decision.delay();
            }
        };

        let signal = match evaluate(&envelope) {
            Ok(signal) => signal,
            Err(reason) => {
                warn!(%reason, "skipping unusable status poll");
                self.sink.log(LogLevel::Warn, reason.to_string());
                let decision = self.controller.poll_unusable();
                self.emit_state();
                return decision.delay();
            }
        };

        self.publish(&signal);
        let decision = self.controller.observe(&signal);
        self.emit_state();

        match decision {
            Decision::Hold { delay, reason } => {
                if reason == HoldReason::NoDataConnection {
                    self.sink.log(
                        LogLevel::Warn,
                        "no data connection: primary and secondary radios absent".into(),
                    );
                }
                delay
            }
            Decision::PollNow(outage) => {
                self.sink.log(
                    LogLevel::Debug,
                    format!(
                        "5G absent for {}s, {} bytes since baseline",
                        outage.downtime_secs, outage.bytes_used
                    ),
                );
                Duration::ZERO
            }
            Decision::Recover(outage) => self.recover(outage).await,
        }
    }

    /// Log in, then reboot. Returns the delay before the next poll.
    async fn recover(&mut self, outage: Outage) -> Duration {
        self.sink.log(
            LogLevel::Warn,
            format!(
                "5G recovery: absent for {}s, {} bytes since baseline",
                outage.downtime_secs, outage.bytes_used
            ),
        );

        let login = self
            .executor
            .execute(&build_login_payload(&self.credentials, ""))
            .await;
        let session_id = match login {
            Ok(ResponseEnvelope {
                success: true,
                session_id: Some(session_id),
                ..
            }) => session_id,
            Ok(_) => return self.login_failed("login rejected, no session issued"),
            Err(e) => return self.login_failed(&format!("login failed: {}", e.display_chain())),
        };

        self.controller.login_succeeded();
        self.emit_state();
        info!("authenticated, sending reboot");
        self.sink
            .log(LogLevel::Info, "authenticated, sending reboot".into());

        match self.executor.execute(&build_reboot_payload(&session_id)).await {
            Ok(envelope) if envelope.success => {
                let at = Local::now();
                let cooldown = self.controller.reboot_succeeded(at);
                self.sink.emit(StatusEvent::LastReboot(at));
                self.emit_state();
                self.sink.log(
                    LogLevel::Info,
                    format!(
                        "reboot sequence completed, cooling down for {}",
                        format_duration(cooldown)
                    ),
                );
                cooldown
            }
            Ok(_) => self.reboot_failed("reboot rejected"),
            Err(e) => self.reboot_failed(&format!("reboot failed: {}", e.display_chain())),
        }
    }

    fn login_failed(&mut self, message: &str) -> Duration {
        let delay = self.controller.login_failed();
        error!(retry_in = ?delay, "{message}");
        self.sink.log(
            LogLevel::Error,
            format!("{message}, next poll in {}", format_duration(delay)),
        );
        self.emit_state();
        delay
    }

    fn reboot_failed(&mut self, message: &str) -> Duration {
        let delay = self.controller.reboot_failed();
        error!(retry_in = ?delay, "{message}");
        self.sink.log(
            LogLevel::Error,
            format!("{message}, next poll in {}", format_duration(delay)),
        );
        self.emit_state();
        delay
    }

    fn publish(&self, signal: &SignalState) {
        self.sink.emit(StatusEvent::Uptime(signal.uptime_secs));
        self.sink.emit(StatusEvent::RxBytes(signal.rx_bytes));
        self.sink.emit(StatusEvent::TxBytes(signal.tx_bytes));
        self.sink.emit(StatusEvent::PrimaryRadio(signal.primary_freq));
        self.sink
            .emit(StatusEvent::SecondaryRadio(signal.secondary_freq));
        self.sink.emit(StatusEvent::SignalQuality {
            primary: signal.primary_rsrq,
            secondary: signal.secondary_rsrq,
        });
    }

    fn emit_state(&self) {
        self.sink.emit(StatusEvent::State(self.controller.state()));
    }
}
