//! MCP (Model Context Protocol) Client Implementation
//!
//! JSON-RPC 2.0 over HTTP against the management server's `/mcp` endpoint,
//! built directly on Tokio and reqwest.
//!
//! # Architecture
//!
//! 1. **Protocol Layer** (`protocol`): JSON-RPC 2.0 message types
//! 2. **Transport Layer** (`transport`, `http_transport`): one request, one
//!    classified response
//! 3. **Retry** (`retry`): bounded linear backoff for transient failures
//! 4. **Client Layer** (`client`): handshake-first client API

pub mod protocol;

pub mod transport;

pub mod http_transport;

pub mod client;

pub mod retry;

pub use protocol::{
    ClientCapabilities, ClientInfo, InitializeParams, McpError, McpMethod, McpRequest, McpResponse,
    Prompt, Resource, ResourceContents, ServerCapabilities, ServerInfo, Tool,
};

pub use http_transport::HttpTransport;
pub use transport::{RpcReply, RpcTarget, Transport, TransportError, RPC_PATH};

pub use client::{ClientError, ClientState, McpClient};
pub use retry::RetryConfig;
