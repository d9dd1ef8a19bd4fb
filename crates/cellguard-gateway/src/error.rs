//! Gateway error types.

use std::error::Error as _;

use thiserror::Error;

use crate::executor::RequestKind;

/// Result type alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors from a single router command or from a whole retried call.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Connection, handshake, or request failure (including timeouts).
    #[error("transport error: {0}")]
    Transport(String),

    /// Response headers arrived but the body could not be read.
    #[error("failed to read response body: {0}")]
    Body(String),

    /// The body was not a JSON object we understand.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The router answered with `success=false`.
    #[error("router rejected the {0} command")]
    Rejected(RequestKind),

    /// Every attempt failed; carries the last cause.
    #[error("{kind} failed after {attempts} attempts")]
    Exhausted {
        kind: RequestKind,
        attempts: u32,
        #[source]
        source: Box<GatewayError>,
    },

    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("invalid endpoint {0:?}")]
    InvalidEndpoint(String),
}

impl GatewayError {
    /// Whether another attempt within the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::Transport(_)
                | GatewayError::Body(_)
                | GatewayError::Malformed(_)
                | GatewayError::Rejected(_)
        )
    }

    /// This error followed by its causes, joined with `": "`.
    pub fn display_chain(&self) -> String {
        let mut out = self.to_string();
        let mut cause = self.source();
        while let Some(err) = cause {
            out.push_str(": ");
            out.push_str(&err.to_string());
            cause = err.source();
        }
        out
    }
}
