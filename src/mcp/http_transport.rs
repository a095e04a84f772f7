//! MCP HTTP Transport Layer
//!
//! Sends JSON-RPC messages as HTTP POST requests to `{base}/mcp`.
//!
//! # Request shape
//!
//! - `Authorization: Bearer {credential}` when a credential is present
//! - `Accept: application/json, text/event-stream` (streamable HTTP servers
//!   reject requests that do not accept both)
//! - `Origin: {page origin}` when configured, so the server applies the same
//!   cross-origin policy it would apply to a browser page
//! - `mcp-session-id` once the server has issued one
//!
//! Each call is bounded by the transport timeout (10 seconds by default).
//!
//! # Example
//!
//! ```ignore
//! use opscenter_client::mcp::{HttpTransport, McpClient, RpcTarget};
//!
//! let transport = HttpTransport::new()?;
//! let mut client = McpClient::new(transport, RpcTarget::new("https://ops.example.com", "dev-token"));
//! client.initialize().await?;
//! ```

use crate::mcp::protocol::{McpRequest, McpResponse, JSONRPC_VERSION};
use crate::mcp::transport::{RpcReply, RpcTarget, Transport, TransportError, RPC_PATH};
use reqwest::header::{HeaderMap, ACCEPT, CONTENT_TYPE, ORIGIN};
use serde_json::{json, Value};
use std::time::Duration;

/// Header carrying the protocol session identifier
pub const SESSION_HEADER: &str = "mcp-session-id";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP transport for the management server
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,

    /// Per-request bound
    timeout: Duration,

    /// Page origin presented to the server
    origin: Option<String>,
}

/// Outcome of a CORS preflight against the protocol endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreflightOutcome {
    pub status: u16,
    pub allow_origin: Option<String>,
    pub allow_headers: Option<String>,
}

impl PreflightOutcome {
    /// The server answered the preflight and allows `origin`
    pub fn allows(&self, origin: &str) -> bool {
        (200..400).contains(&self.status)
            && self
                .allow_origin
                .as_deref()
                .map(|allowed| allowed == "*" || allowed == origin)
                .unwrap_or(false)
    }
}

impl HttpTransport {
    /// Create a transport with the default 10 second timeout
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| TransportError::Setup(e.to_string()))?;

        Ok(Self {
            client,
            timeout: DEFAULT_TIMEOUT,
            origin: None,
        })
    }

    /// Set the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Present `origin` in the `Origin` header of every request
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    fn post(&self, target: &RpcTarget, body: &Value) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .post(target.endpoint())
            .timeout(self.timeout)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json, text/event-stream")
            .json(body);

        if !target.credential.is_empty() {
            builder = builder.bearer_auth(&target.credential);
        }
        if let Some(origin) = &self.origin {
            builder = builder.header(ORIGIN, origin);
        }
        if let Some(session_id) = &target.session_id {
            builder = builder.header(SESSION_HEADER, session_id);
        }
        builder
    }

    fn classify(&self, error: reqwest::Error) -> TransportError {
        if error.is_timeout() {
            TransportError::Timeout(self.timeout)
        } else {
            TransportError::Network(error.to_string())
        }
    }

    /// Send a CORS preflight for a POST with bearer auth
    pub async fn preflight(
        &self,
        base_address: &str,
        origin: &str,
    ) -> Result<PreflightOutcome, TransportError> {
        let endpoint = format!("{}{}", base_address.trim_end_matches('/'), RPC_PATH);
        let response = self
            .client
            .request(reqwest::Method::OPTIONS, &endpoint)
            .timeout(self.timeout)
            .header(ORIGIN, origin)
            .header("Access-Control-Request-Method", "POST")
            .header(
                "Access-Control-Request-Headers",
                "Content-Type,Authorization",
            )
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let headers = response.headers();
        Ok(PreflightOutcome {
            status: response.status().as_u16(),
            allow_origin: header_value(headers, "access-control-allow-origin"),
            allow_headers: header_value(headers, "access-control-allow-headers"),
        })
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Decode a response body that is either plain JSON or a server-sent event
/// stream whose last `data:` line carries the JSON-RPC response.
fn decode_body(content_type: Option<&str>, body: &str) -> Result<McpResponse, TransportError> {
    let is_event_stream = content_type
        .map(|ct| ct.starts_with("text/event-stream"))
        .unwrap_or(false);

    let payload = if is_event_stream {
        body.lines()
            .filter_map(|line| line.strip_prefix("data:"))
            .map(str::trim)
            .filter(|data| !data.is_empty())
            .last()
            .ok_or_else(|| {
                TransportError::InvalidResponse("event stream carried no data".to_string())
            })?
    } else {
        body
    };

    serde_json::from_str(payload).map_err(|e| {
        let preview: String = payload.chars().take(200).collect();
        TransportError::InvalidResponse(format!("{e}: {preview}"))
    })
}

impl Transport for HttpTransport {
    async fn send(
        &self,
        target: &RpcTarget,
        request: &McpRequest,
    ) -> Result<RpcReply, TransportError> {
        let endpoint = target.endpoint();
        let body = serde_json::to_value(request)
            .map_err(|e| TransportError::InvalidResponse(e.to_string()))?;

        tracing::debug!(
            "POST {} method={} id={}",
            endpoint,
            request.method,
            request.id
        );

        let response = self
            .post(target, &body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status().as_u16();
        if let Some(error) = TransportError::from_status(status, &endpoint) {
            tracing::debug!("{} answered HTTP {}", endpoint, status);
            return Err(error);
        }

        let session_id = header_value(response.headers(), SESSION_HEADER);
        let content_type = header_value(response.headers(), CONTENT_TYPE.as_str());
        let text = response.text().await.map_err(|e| self.classify(e))?;

        tracing::debug!("Received HTTP response: {}", text);

        let response = decode_body(content_type.as_deref(), &text)?;
        Ok(RpcReply {
            response,
            session_id,
        })
    }

    async fn notify(
        &self,
        target: &RpcTarget,
        method: &str,
        params: Option<Value>,
    ) -> Result<(), TransportError> {
        let body = match params {
            Some(params) => json!({ "jsonrpc": JSONRPC_VERSION, "method": method, "params": params }),
            None => json!({ "jsonrpc": JSONRPC_VERSION, "method": method }),
        };

        let response = self
            .post(target, &body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        match TransportError::from_status(response.status().as_u16(), &target.endpoint()) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
