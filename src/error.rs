//! User-facing connection failures
//!
//! Every transport or client failure that reaches a person is first mapped
//! into one of these categories. `user_message` gives the text to show; raw
//! transport errors are never shown on their own.

use crate::mcp::client::ClientError;
use crate::mcp::transport::TransportError;

/// JSON-RPC "invalid request", used when the client refused to send
const INVALID_REQUEST: i64 = -32600;

/// JSON-RPC "internal error", used for results the client could not use
const INTERNAL_ERROR: i64 = -32603;

/// JSON-RPC "parse error"
const PARSE_ERROR: i64 = -32700;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    /// Nothing answered at the address
    #[error("Server unreachable: {0}")]
    Unreachable(String),

    /// Something answered but its discovery data was unusable
    #[error("Malformed server descriptor: {0}")]
    MalformedDescriptor(String),

    /// HTTP 401/403 on an authenticated call
    #[error("Authentication failed")]
    AuthenticationFailure,

    /// Well-formed error from the server, or a response the client cannot use
    #[error("{method} rejected (code {code}): {message}")]
    ProtocolRejection {
        method: String,
        code: i64,
        message: String,
    },

    /// Network error, timeout or 5xx that outlasted the retries
    #[error("Connection failed: {detail}")]
    Transient { detail: String },

    /// HTTP 404 on the protocol endpoint
    #[error("Protocol endpoint not found: {endpoint}")]
    NotFound { endpoint: String },

    /// Manually entered address could not be used at all
    #[error("Invalid server address '{0}'")]
    InvalidAddress(String),
}

impl ConnectionError {
    /// Stable category name, used in logs and reports
    pub fn category(&self) -> &'static str {
        match self {
            Self::Unreachable(_) => "unreachable",
            Self::MalformedDescriptor(_) => "malformed_descriptor",
            Self::AuthenticationFailure => "authentication_failure",
            Self::ProtocolRejection { .. } => "protocol_rejection",
            Self::Transient { .. } => "transient",
            Self::NotFound { .. } => "not_found",
            Self::InvalidAddress(_) => "invalid_address",
        }
    }

    /// Actionable text for the person at the keyboard
    pub fn user_message(&self) -> String {
        match self {
            Self::Unreachable(detail) => format!(
                "Could not reach the server ({detail}). Check the address and that the server is running."
            ),
            Self::MalformedDescriptor(reason) => format!(
                "The address answered, but not like an OpsCenter server ({reason})."
            ),
            Self::AuthenticationFailure => {
                "The server rejected the bearer token. Check the token and try again.".to_string()
            }
            Self::ProtocolRejection {
                method,
                code,
                message,
            } => format!("The server refused {method}: {message} (code {code})."),
            Self::Transient { detail } => format!(
                "Connection failed after retrying ({detail}). The server may be starting up; try again shortly."
            ),
            Self::NotFound { endpoint } => format!(
                "No protocol endpoint at {endpoint}. The base address is probably wrong."
            ),
            Self::InvalidAddress(address) => format!(
                "'{address}' is not a usable server address. Use the form https://host[:port]."
            ),
        }
    }
}

impl From<TransportError> for ConnectionError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Unauthorized | TransportError::Forbidden => Self::AuthenticationFailure,
            TransportError::NotFound(endpoint) => Self::NotFound { endpoint },
            TransportError::ServerError(_)
            | TransportError::Timeout(_)
            | TransportError::Network(_)
            | TransportError::Setup(_) => Self::Transient {
                detail: error.to_string(),
            },
            TransportError::UnexpectedStatus(status) => Self::ProtocolRejection {
                method: "request".to_string(),
                code: i64::from(status),
                message: format!("unexpected HTTP status {status}"),
            },
            TransportError::InvalidResponse(message) => Self::ProtocolRejection {
                method: "request".to_string(),
                code: PARSE_ERROR,
                message,
            },
        }
    }
}

impl From<ClientError> for ConnectionError {
    fn from(error: ClientError) -> Self {
        match error {
            ClientError::Transport(e) => e.into(),
            ClientError::Rejected { method, error } => Self::ProtocolRejection {
                method,
                code: error.code,
                message: error.message,
            },
            ClientError::NotReady(state) => Self::ProtocolRejection {
                method: "request".to_string(),
                code: INVALID_REQUEST,
                message: format!("client is not connected (state {state:?})"),
            },
            ClientError::InvalidResult { method, reason } => Self::ProtocolRejection {
                method,
                code: INTERNAL_ERROR,
                message: reason,
            },
            ClientError::ToolFailed { tool, message } => Self::ProtocolRejection {
                method: format!("tools/call {tool}"),
                code: INTERNAL_ERROR,
                message,
            },
        }
    }
}
