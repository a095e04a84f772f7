//! MCP Transport Layer
//!
//! The transport abstraction sends one JSON-RPC request to a server and
//! returns its response, classifying every failure into a
//! [`TransportError`]. It does not retry; that is the client's job (see
//! [`crate::mcp::retry`]).
//!
//! # Architecture
//!
//! Transports are stateless with respect to the server address: every call
//! names its [`RpcTarget`] explicitly, so one transport value can be shared
//! by discovery, diagnostics and the session manager.

use crate::mcp::protocol::{McpRequest, McpResponse};
use serde_json::Value;
use std::time::Duration;

/// Mount path of the protocol endpoint. Fixed for this client even when a
/// server advertises a different `mcp_endpoint`.
pub const RPC_PATH: &str = "/mcp";

/// Where (and as whom) a request is sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcTarget {
    /// Server root, no trailing slash
    pub base_address: String,

    /// Bearer credential; empty means "send no Authorization header"
    pub credential: String,

    /// Protocol session issued by the server on `initialize`, if any
    pub session_id: Option<String>,
}

impl RpcTarget {
    pub fn new(base_address: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            base_address: normalize_base_address(&base_address.into()),
            credential: credential.into(),
            session_id: None,
        }
    }

    /// Full URL of the protocol endpoint
    pub fn endpoint(&self) -> String {
        format!("{}{}", self.base_address, RPC_PATH)
    }
}

/// Trim whitespace and trailing separators from a base address
pub fn normalize_base_address(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

/// A response together with transport-level metadata
#[derive(Debug, Clone, PartialEq)]
pub struct RpcReply {
    pub response: McpResponse,

    /// Value of the `mcp-session-id` response header
    pub session_id: Option<String>,
}

impl RpcReply {
    pub fn new(response: McpResponse) -> Self {
        Self {
            response,
            session_id: None,
        }
    }
}

/// Classified transport failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// HTTP 401
    #[error("Unauthorized (HTTP 401)")]
    Unauthorized,

    /// HTTP 403
    #[error("Forbidden (HTTP 403)")]
    Forbidden,

    /// HTTP 404 on the protocol endpoint
    #[error("Endpoint not found (HTTP 404): {0}")]
    NotFound(String),

    /// HTTP 5xx
    #[error("Server error (HTTP {0})")]
    ServerError(u16),

    /// Any other non-success status
    #[error("Unexpected HTTP status {0}")]
    UnexpectedStatus(u16),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection refused, DNS failure, TLS failure, reset...
    #[error("Network error: {0}")]
    Network(String),

    /// 2xx status but the body is not a JSON-RPC response
    #[error("Invalid response body: {0}")]
    InvalidResponse(String),

    /// The HTTP client could not be constructed
    #[error("HTTP client setup failed: {0}")]
    Setup(String),
}

impl TransportError {
    /// 5xx, timeouts and network failures may succeed on a later attempt
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ServerError(_) | Self::Timeout(_) | Self::Network(_)
        )
    }

    /// Map an HTTP status to an error, or `None` for success statuses
    pub fn from_status(status: u16, endpoint: &str) -> Option<Self> {
        match status {
            200..=299 => None,
            401 => Some(Self::Unauthorized),
            403 => Some(Self::Forbidden),
            404 => Some(Self::NotFound(endpoint.to_string())),
            500..=599 => Some(Self::ServerError(status)),
            _ => Some(Self::UnexpectedStatus(status)),
        }
    }
}

/// Transport trait for MCP communication
///
/// Implementations perform exactly one attempt per call.
#[allow(async_fn_in_trait)]
pub trait Transport: Send + Sync {
    /// Send a request and wait (bounded) for its response
    async fn send(&self, target: &RpcTarget, request: &McpRequest)
        -> Result<RpcReply, TransportError>;

    /// Fire a JSON-RPC notification (no id, no response body expected)
    async fn notify(
        &self,
        _target: &RpcTarget,
        _method: &str,
        _params: Option<Value>,
    ) -> Result<(), TransportError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_endpoint_strips_trailing_slash() {
        let target = RpcTarget::new("https://ops.example.com/", "dev-token");
        assert_eq!(target.base_address, "https://ops.example.com");
        assert_eq!(target.endpoint(), "https://ops.example.com/mcp");
        assert!(target.session_id.is_none());
    }

    #[test]
    fn test_status_classification() {
        assert_eq!(TransportError::from_status(200, "e"), None);
        assert_eq!(TransportError::from_status(202, "e"), None);
        assert_eq!(
            TransportError::from_status(401, "e"),
            Some(TransportError::Unauthorized)
        );
        assert_eq!(
            TransportError::from_status(404, "http://x/mcp"),
            Some(TransportError::NotFound("http://x/mcp".to_string()))
        );
        assert_eq!(
            TransportError::from_status(503, "e"),
            Some(TransportError::ServerError(503))
        );
        assert_eq!(
            TransportError::from_status(400, "e"),
            Some(TransportError::UnexpectedStatus(400))
        );
    }

    #[test]
    fn test_transient_errors() {
        assert!(TransportError::ServerError(500).is_transient());
        assert!(TransportError::Timeout(Duration::from_secs(10)).is_transient());
        assert!(TransportError::Network("connection refused".into()).is_transient());

        assert!(!TransportError::Unauthorized.is_transient());
        assert!(!TransportError::NotFound("x".into()).is_transient());
        assert!(!TransportError::InvalidResponse("not json".into()).is_transient());
    }
}
