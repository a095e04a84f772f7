//! MCP Client Layer
//!
//! High-level client for one management server. The client owns its
//! [`RpcTarget`] (address, bearer credential, protocol session) and enforces
//! the protocol's ordering rule: `initialize` first, everything else only
//! once the handshake has succeeded.
//!
//! # Lifecycle
//!
//! 1. `McpClient::new(transport, target)`
//! 2. `client.initialize().await?`
//! 3. resource / tool / prompt calls
//! 4. `client.disconnect()` (or drop)
//!
//! # Usage
//!
//! ```ignore
//! let mut client = McpClient::new(HttpTransport::new()?, RpcTarget::new(base, token));
//! client.initialize().await?;
//! let resources = client.list_resources().await?;
//! let health = client.call_tool("compute_health", json!({"createdAt": "...", "threshold_seconds": 60})).await?;
//! ```

use crate::mcp::protocol::{
    InitializeParams, McpError, McpMethod, McpRequest, Prompt, Resource, ResourceContents,
    ServerCapabilities, Tool,
};
use crate::mcp::retry::{retry_with_backoff, RetryConfig};
use crate::mcp::transport::{RpcReply, RpcTarget, Transport, TransportError};
use crate::metrics;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};

/// Client name sent in the handshake
pub const CLIENT_NAME: &str = "opscenter-client";

/// Client state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Created, handshake not attempted
    Created,

    /// `initialize` in flight
    Initializing,

    /// Handshake succeeded
    Ready,

    /// Handshake failed or the client was closed
    Disconnected,
}

/// Errors surfaced by [`McpClient`]
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Well-formed error object from the server
    #[error("{method} rejected by server: {error}")]
    Rejected { method: String, error: McpError },

    /// Call attempted outside the `Ready` state
    #[error("Client not ready (state: {0:?})")]
    NotReady(ClientState),

    /// Result payload did not have the expected shape
    #[error("Unexpected {method} result: {reason}")]
    InvalidResult { method: String, reason: String },

    /// `tools/call` returned `isError: true`
    #[error("Tool '{tool}' failed: {message}")]
    ToolFailed { tool: String, message: String },
}

/// High-level MCP client
pub struct McpClient<T>
where
    T: Transport,
{
    transport: T,

    target: RpcTarget,

    /// Next request ID (monotonically increasing, never reused)
    next_id: AtomicU64,

    server_capabilities: Option<ServerCapabilities>,

    /// Cached after `list_tools`
    tools: Vec<Tool>,

    state: ClientState,

    retry_config: RetryConfig,
}

impl<T> McpClient<T>
where
    T: Transport,
{
    /// Create a client using the default retry policy (3 attempts, linear backoff)
    pub fn new(transport: T, target: RpcTarget) -> Self {
        Self {
            transport,
            target,
            next_id: AtomicU64::new(1),
            server_capabilities: None,
            tools: Vec::new(),
            state: ClientState::Created,
            retry_config: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Send `request` with retry; every attempt gets a fresh identifier.
    async fn send_request(&self, request: &McpRequest) -> Result<RpcReply, TransportError> {
        let result = retry_with_backoff(&self.retry_config, |attempt| {
            let attempt_request = if attempt == 0 {
                request.clone()
            } else {
                request.with_id(self.next_id())
            };
            async move { self.transport.send(&self.target, &attempt_request).await }
        })
        .await;

        let outcome = match &result {
            Ok(reply) if reply.response.error.is_some() => "rejected",
            Ok(_) => "ok",
            Err(_) => "failed",
        };
        metrics::RPC_REQUESTS_TOTAL
            .with_label_values(&[request.method.as_str(), outcome])
            .inc();

        result
    }

    /// Issue `method` and return its `result` payload
    async fn request(&self, method: McpMethod, params: Option<Value>) -> Result<Value, ClientError> {
        let request = McpRequest::new(self.next_id(), method.as_str(), params);
        let reply = self.send_request(&request).await?;

        reply
            .response
            .into_result()
            .map_err(|error| ClientError::Rejected {
                method: method.as_str().to_string(),
                error,
            })
    }

    /// Perform the `initialize` handshake
    ///
    /// On success the server's capabilities are stored, the protocol session
    /// id (if any) is attached to later requests, and the
    /// `notifications/initialized` notification is sent.
    pub async fn initialize(&mut self) -> Result<&ServerCapabilities, ClientError> {
        if self.state != ClientState::Created {
            return Err(ClientError::NotReady(self.state));
        }

        self.state = ClientState::Initializing;
        tracing::info!("Initializing MCP connection to {}", self.target.base_address);

        let params = InitializeParams::for_client(CLIENT_NAME, env!("CARGO_PKG_VERSION"));
        let request = McpRequest::new(
            self.next_id(),
            McpMethod::Initialize.as_str(),
            Some(json!(params)),
        );

        let outcome = self.complete_handshake(&request).await;
        match outcome {
            Ok(capabilities) => {
                tracing::info!(
                    "MCP connection initialized: {} v{} (protocol {})",
                    capabilities.server_info.name,
                    capabilities.server_info.version,
                    capabilities.protocol_version
                );
                self.state = ClientState::Ready;
                Ok(self.server_capabilities.insert(capabilities))
            }
            Err(e) => {
                self.state = ClientState::Disconnected;
                Err(e)
            }
        }
    }

    async fn complete_handshake(
        &mut self,
        request: &McpRequest,
    ) -> Result<ServerCapabilities, ClientError> {
        let reply = self.send_request(request).await?;
        if reply.session_id.is_some() {
            self.target.session_id = reply.session_id;
        }

        let result = reply
            .response
            .into_result()
            .map_err(|error| ClientError::Rejected {
                method: McpMethod::Initialize.as_str().to_string(),
                error,
            })?;

        let capabilities: ServerCapabilities =
            serde_json::from_value(result).map_err(|e| ClientError::InvalidResult {
                method: McpMethod::Initialize.as_str().to_string(),
                reason: e.to_string(),
            })?;

        if let Err(e) = self
            .transport
            .notify(&self.target, "notifications/initialized", None)
            .await
        {
            tracing::warn!("Failed to send initialized notification: {}", e);
        }

        Ok(capabilities)
    }

    /// Invoke any non-handshake procedure with raw params
    pub async fn call(&self, method: McpMethod, params: Option<Value>) -> Result<Value, ClientError> {
        if method == McpMethod::Initialize {
            return Err(ClientError::NotReady(self.state));
        }
        self.ensure_ready()?;
        tracing::debug!("Calling {}", method);
        self.request(method, params).await
    }

    pub async fn list_resources(&self) -> Result<Vec<Resource>, ClientError> {
        let result = self.call(McpMethod::ResourcesList, None).await?;
        field(McpMethod::ResourcesList, result, "resources")
    }

    pub async fn read_resource(&self, uri: &str) -> Result<Vec<ResourceContents>, ClientError> {
        let result = self
            .call(McpMethod::ResourcesRead, Some(json!({ "uri": uri })))
            .await?;
        field(McpMethod::ResourcesRead, result, "contents")
    }

    /// List tools and cache them on the client
    pub async fn list_tools(&mut self) -> Result<Vec<Tool>, ClientError> {
        let result = self.call(McpMethod::ToolsList, None).await?;
        let tools: Vec<Tool> = field(McpMethod::ToolsList, result, "tools")?;

        tracing::info!("Listed {} tools from MCP server", tools.len());
        for tool in &tools {
            tracing::debug!("  - {}", tool.name);
        }

        self.tools = tools.clone();
        Ok(tools)
    }

    /// Call a tool; a result flagged `isError` becomes [`ClientError::ToolFailed`]
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, ClientError> {
        let result = self
            .call(
                McpMethod::ToolsCall,
                Some(json!({ "name": name, "arguments": arguments })),
            )
            .await?;

        if result.get("isError").and_then(Value::as_bool) == Some(true) {
            return Err(ClientError::ToolFailed {
                tool: name.to_string(),
                message: first_text(&result).unwrap_or_else(|| "no details".to_string()),
            });
        }
        Ok(result)
    }

    pub async fn list_prompts(&self) -> Result<Vec<Prompt>, ClientError> {
        let result = self.call(McpMethod::PromptsList, None).await?;
        field(McpMethod::PromptsList, result, "prompts")
    }

    /// Render a prompt; prompt arguments travel as strings
    pub async fn get_prompt(&self, name: &str, arguments: Value) -> Result<Value, ClientError> {
        self.call(
            McpMethod::PromptsGet,
            Some(json!({ "name": name, "arguments": arguments })),
        )
        .await
    }

    /// Mark the client closed. HTTP has no connection to tear down.
    pub fn disconnect(&mut self) {
        self.state = ClientState::Disconnected;
    }

    fn ensure_ready(&self) -> Result<(), ClientError> {
        match self.state {
            ClientState::Ready => Ok(()),
            other => Err(ClientError::NotReady(other)),
        }
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    pub fn target(&self) -> &RpcTarget {
        &self.target
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// `None` until the handshake succeeds
    pub fn server_capabilities(&self) -> Option<&ServerCapabilities> {
        self.server_capabilities.as_ref()
    }

    /// Tools cached by the last `list_tools`
    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }
}

/// Decode `result[key]` into `R`
fn field<R: DeserializeOwned>(method: McpMethod, mut result: Value, key: &str) -> Result<R, ClientError> {
    let value = result
        .get_mut(key)
        .map(Value::take)
        .ok_or_else(|| ClientError::InvalidResult {
            method: method.as_str().to_string(),
            reason: format!("missing '{key}'"),
        })?;

    serde_json::from_value(value).map_err(|e| ClientError::InvalidResult {
        method: method.as_str().to_string(),
        reason: e.to_string(),
    })
}

/// First `{"type": "text", "text": ...}` block of a tool/prompt result
pub(crate) fn first_text(result: &Value) -> Option<String> {
    result
        .get("content")?
        .as_array()?
        .iter()
        .find_map(|block| block.get("text").and_then(Value::as_str))
        .map(str::to_string)
}
