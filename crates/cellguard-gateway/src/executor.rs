//! Request executor — sends one command with retries and backoff.
//!
//! Every attempt is classified as success, retryable failure, or a
//! deterministic outcome that ends the call early:
//!
//! - transport, body-read, malformed-body and `success=false` failures are
//!   retried with `min(base * 2^attempt, cap)` between attempts;
//! - a reboot answered with HTTP 200 is a success whatever the body says,
//!   because the router drops the connection while it goes down;
//! - a login reply without a session id is a rejected login and is
//!   returned immediately with `success=false`.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, error};

use cellguard_core::{EventSink, LogLevel, RetryConfig};

use crate::envelope::{ResponseEnvelope, parse_envelope};
use crate::error::{GatewayError, GatewayResult};
use crate::transport::Transport;
use crate::wire::CommandPayload;

/// Which command is being executed; changes how replies are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RequestKind {
    Monitor,
    Login,
    Reboot,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Monitor => "monitor",
            Self::Login => "login",
            Self::Reboot => "reboot",
        })
    }
}

/// Executes commands against the router over a [`Transport`].
#[derive(Clone)]
pub struct RequestExecutor {
    transport: Arc<dyn Transport>,
    policy: RetryConfig,
    sink: Arc<dyn EventSink>,
}

impl RequestExecutor {
    pub fn new(transport: Arc<dyn Transport>, policy: RetryConfig, sink: Arc<dyn EventSink>) -> Self {
        Self {
            transport,
            policy,
            sink,
        }
    }

    pub fn policy(&self) -> &RetryConfig {
        &self.policy
    }

    /// Send `payload` until it succeeds or the attempt budget runs out.
    ///
    /// A login rejected for lack of a session returns `Ok` with
    /// `success=false`. Exhaustion returns [`GatewayError::Exhausted`]
    /// carrying the last failure; callers should not retry it themselves.
    pub async fn execute(&self, payload: &CommandPayload) -> GatewayResult<ResponseEnvelope> {
        let kind = payload.kind();
        let body = Bytes::from(payload.to_json()?);
        let max_attempts = self.policy.max_attempts.max(1);
        let started = Instant::now();
        let mut last_error = None;

        for attempt in 0..max_attempts {
            let number = attempt + 1;
            match self.attempt(kind, body.clone()).await {
                Ok(envelope) => {
                    let elapsed = started.elapsed();
                    if envelope.success {
                        debug!(%kind, attempt = number, ?elapsed, "request successful");
                        self.sink.log(
                            LogLevel::Debug,
                            format!("request successful type={kind} attempt={number} elapsed={elapsed:?}"),
                        );
                    } else {
                        debug!(%kind, attempt = number, ?elapsed, "authentication failed");
                        self.sink.log(
                            LogLevel::Warn,
                            format!("authentication failed type={kind} attempt={number} elapsed={elapsed:?}"),
                        );
                    }
                    return Ok(envelope);
                }
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    let elapsed = started.elapsed();
                    error!(%kind, attempt = number, ?elapsed, error = %e, "request failed");
                    self.sink.log(
                        LogLevel::Error,
                        format!("request failed type={kind} attempt={number} elapsed={elapsed:?} error={e}"),
                    );
                    last_error = Some(e);
                    if number < max_attempts {
                        tokio::time::sleep(self.policy.backoff(attempt)).await;
                    }
                }
            }
        }

        Err(GatewayError::Exhausted {
            kind,
            attempts: max_attempts,
            source: Box::new(
                last_error.unwrap_or_else(|| GatewayError::Transport("no attempt made".into())),
            ),
        })
    }

    /// One round trip, classified.
    async fn attempt(&self, kind: RequestKind, body: Bytes) -> GatewayResult<ResponseEnvelope> {
        let reply = self.transport.post_json(body).await?;

        if kind == RequestKind::Reboot && reply.status == 200 {
            return Ok(ResponseEnvelope::reboot_ack());
        }

        let bytes = reply.body.map_err(GatewayError::Body)?;
        let mut envelope = parse_envelope(&bytes)?;

        if kind == RequestKind::Login && envelope.session_id.is_none() {
            envelope.success = false;
            return Ok(envelope);
        }

        if envelope.success {
            Ok(envelope)
        } else {
            Err(GatewayError::Rejected(kind))
        }
    }
}
