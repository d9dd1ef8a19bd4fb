//! HTTP transport for router commands.
//!
//! The executor only sees the [`Transport`] trait. [`HyperTransport`]
//! opens one HTTP/1 connection per command, which matches how the router's
//! CGI endpoint behaves (it closes the socket after every reply).

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use http::Uri;
use http_body_util::{BodyExt, Full};
use tracing::debug;

use crate::error::{GatewayError, GatewayResult};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Raw reply: the status line always, the body only if it could be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReply {
    pub status: u16,
    pub body: Result<Bytes, String>,
}

impl RawReply {
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self {
            status: 200,
            body: Ok(body.into()),
        }
    }
}

/// Sends one JSON document to the router and returns its reply.
///
/// `Err` means no response head was received at all.
pub trait Transport: Send + Sync {
    fn post_json(&self, body: Bytes) -> BoxFuture<'_, GatewayResult<RawReply>>;
}

/// Connection-per-request HTTP/1 client built on hyper.
#[derive(Debug, Clone)]
pub struct HyperTransport {
    uri: Uri,
    /// `host:port` to connect to.
    address: String,
    /// Value of the `Host` header.
    host_header: String,
    timeout: Duration,
}

impl HyperTransport {
    /// `endpoint` is a full `http://host[:port]/path` URL.
    pub fn new(endpoint: &str, timeout: Duration) -> GatewayResult<Self> {
        let uri: Uri = endpoint
            .parse()
            .map_err(|_| GatewayError::InvalidEndpoint(endpoint.to_string()))?;
        if uri.scheme_str() != Some("http") {
            return Err(GatewayError::InvalidEndpoint(endpoint.to_string()));
        }
        let authority = uri
            .authority()
            .ok_or_else(|| GatewayError::InvalidEndpoint(endpoint.to_string()))?;
        let address = format!("{}:{}", authority.host(), authority.port_u16().unwrap_or(80));
        let host_header = authority.as_str().to_string();

        Ok(Self {
            uri,
            address,
            host_header,
            timeout,
        })
    }

    pub fn endpoint(&self) -> &Uri {
        &self.uri
    }

    /// Connect and send; resolves once the response head has arrived.
    async fn send(&self, body: Bytes) -> GatewayResult<http::Response<hyper::body::Incoming>> {
        let stream = tokio::net::TcpStream::connect(&self.address)
            .await
            .map_err(|e| GatewayError::Transport(format!("connect {}: {e}", self.address)))?;

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| GatewayError::Transport(format!("handshake: {e}")))?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!(error = %e, "router connection closed with error");
            }
        });

        let path = self
            .uri
            .path_and_query()
            .map_or("/", |pq| pq.as_str())
            .to_string();
        let req = http::Request::builder()
            .method(http::Method::POST)
            .uri(path)
            .header(http::header::HOST, &self.host_header)
            .header(http::header::CONTENT_TYPE, "application/json")
            .header(http::header::USER_AGENT, "cellguard/0.1")
            .body(Full::new(body))
            .map_err(|e| GatewayError::Transport(format!("build request: {e}")))?;

        sender
            .send_request(req)
            .await
            .map_err(|e| GatewayError::Transport(format!("send request: {e}")))
    }
}

impl Transport for HyperTransport {
    fn post_json(&self, body: Bytes) -> BoxFuture<'_, GatewayResult<RawReply>> {
        Box::pin(async move {
            let resp = match tokio::time::timeout(self.timeout, self.send(body)).await {
                Ok(resp) => resp?,
                Err(_) => {
                    return Err(GatewayError::Transport(format!(
                        "no response from {} within {:?}",
                        self.address, self.timeout
                    )));
                }
            };
            let status = resp.status().as_u16();

            // A body failure still reports the status: the reboot command
            // is acknowledged by the status line alone.
            let body = match tokio::time::timeout(self.timeout, resp.into_body().collect()).await {
                Ok(Ok(collected)) => Ok(collected.to_bytes()),
                Ok(Err(e)) => Err(e.to_string()),
                Err(_) => Err(format!("body not received within {:?}", self.timeout)),
            };

            Ok(RawReply { status, body })
        })
    }
}
