//! cellguard-gateway — talking to the router's JSON CGI endpoint.
//!
//! # Architecture
//!
//! ```text
//! RequestExecutor::execute(CommandPayload)
//!   ├── Transport::post_json() → RawReply (status + body)
//!   ├── parse_envelope() → ResponseEnvelope
//!   └── retry with exponential backoff (1s → 32s, 5 attempts)
//!
//! evaluate(ResponseEnvelope) → SignalState | UnusablePoll
//! ```
//!
//! The reboot command is acknowledged by an HTTP 200 alone, since the
//! router tears the connection down while restarting. A login reply
//! without a session id is a rejected login and is never retried.

pub mod envelope;
pub mod error;
pub mod executor;
pub mod signal;
pub mod transport;
pub mod wire;

pub use envelope::{ResponseEnvelope, WireNumber, parse_envelope};
pub use error::{GatewayError, GatewayResult};
pub use executor::{RequestExecutor, RequestKind};
pub use signal::{SignalState, UnusablePoll, evaluate};
pub use transport::{BoxFuture, HyperTransport, RawReply, Transport};
pub use wire::{CommandPayload, build_login_payload, build_monitor_payload, build_reboot_payload};
