//! MCP Protocol Types (JSON-RPC 2.0)
//!
//! Wire types for the management server's `/mcp` endpoint. Only the
//! envelopes and the handful of payloads this client actually consumes are
//! modelled; everything else stays as `serde_json::Value`.
//!
//! # Protocol Specification
//!
//! - JSON-RPC 2.0: <https://www.jsonrpc.org/specification>
//! - MCP Spec: <https://modelcontextprotocol.io/specification/2024-11-05>

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// JSON-RPC 2.0 version constant
pub const JSONRPC_VERSION: &str = "2.0";

/// Protocol revision sent in the `initialize` handshake
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// A JSON-RPC 2.0 request envelope
///
/// ```json
/// { "jsonrpc": "2.0", "id": 1, "method": "resources/list", "params": {} }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct McpRequest {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,

    /// Request identifier, unique per session
    pub id: u64,

    /// Procedure name
    pub method: String,

    /// Procedure parameters; the server always receives an object
    pub params: Value,
}

impl McpRequest {
    /// Create a new request. Missing params are sent as `{}`.
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.into(),
            params: params.unwrap_or_else(|| json!({})),
        }
    }

    /// Same request, re-addressed with a fresh identifier (used on retry)
    pub fn with_id(&self, id: u64) -> Self {
        Self {
            id,
            ..self.clone()
        }
    }
}

/// A JSON-RPC 2.0 response envelope
///
/// Carries either a `result` or an `error` object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct McpResponse {
    #[serde(default = "default_jsonrpc")]
    pub jsonrpc: String,

    /// Identifier echoed from the request (null for parse errors)
    #[serde(default)]
    pub id: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<McpError>,
}

fn default_jsonrpc() -> String {
    JSONRPC_VERSION.to_string()
}

impl McpResponse {
    /// Create a successful response
    pub fn ok(id: u64, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response
    pub fn err(id: u64, error: McpError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id),
            result: None,
            error: Some(error),
        }
    }

    /// Split into the result payload or the protocol-level error.
    ///
    /// An error object always wins; a response with neither is treated as an
    /// internal error because the server broke the envelope contract.
    pub fn into_result(self) -> Result<Value, McpError> {
        match (self.result, self.error) {
            (_, Some(error)) => Err(error),
            (Some(result), None) => Ok(result),
            (None, None) => Err(McpError::internal_error(
                "Invalid response: neither result nor error present",
            )),
        }
    }
}

/// A JSON-RPC 2.0 error object
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct McpError {
    pub code: i64,

    /// Human-readable message, surfaced verbatim to the user
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl McpError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Method not found (-32601)
    pub fn method_not_found(method: impl Into<String>) -> Self {
        Self::new(-32601, format!("Method not found: {}", method.into()))
    }

    /// Internal error (-32603)
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(-32603, message)
    }
}

impl std::fmt::Display for McpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[Error {}] {}", self.code, self.message)
    }
}

impl std::error::Error for McpError {}

/// Procedures this client is allowed to invoke
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum McpMethod {
    /// Handshake; must be the first call of every session
    Initialize,
    ResourcesList,
    ResourcesRead,
    ToolsList,
    ToolsCall,
    PromptsList,
    PromptsGet,
}

impl McpMethod {
    pub const ALL: [McpMethod; 7] = [
        McpMethod::Initialize,
        McpMethod::ResourcesList,
        McpMethod::ResourcesRead,
        McpMethod::ToolsList,
        McpMethod::ToolsCall,
        McpMethod::PromptsList,
        McpMethod::PromptsGet,
    ];

    /// Wire name for the JSON-RPC `method` field
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::ResourcesList => "resources/list",
            Self::ResourcesRead => "resources/read",
            Self::ToolsList => "tools/list",
            Self::ToolsCall => "tools/call",
            Self::PromptsList => "prompts/list",
            Self::PromptsGet => "prompts/get",
        }
    }
}

impl std::str::FromStr for McpMethod {
    type Err = McpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| McpError::method_not_found(s))
    }
}

impl std::fmt::Display for McpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of the `initialize` handshake
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InitializeParams {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,

    pub capabilities: ClientCapabilities,

    #[serde(rename = "clientInfo")]
    pub client_info: ClientInfo,
}

impl InitializeParams {
    /// Handshake parameters advertising resources, tools and prompts support
    pub fn for_client(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ClientCapabilities {
                resources: Some(json!({ "subscribe": true })),
                tools: Some(json!({})),
                prompts: Some(json!({})),
            },
            client_info: ClientInfo {
                name: name.into(),
                version: version.into(),
            },
        }
    }
}

/// Client capabilities advertised during initialization
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompts: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

/// Result of a successful `initialize`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerCapabilities {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,

    #[serde(default)]
    pub capabilities: Value,

    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerInfo {
    pub name: String,

    #[serde(default)]
    pub version: String,
}

/// Entry of a `resources/list` result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Resource {
    pub uri: String,

    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(rename = "mimeType", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// One content block of a `resources/read` result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceContents {
    pub uri: String,

    #[serde(rename = "mimeType", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Tool definition from `tools/list`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tool {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(rename = "inputSchema", default)]
    pub input_schema: Value,
}

/// Prompt definition from `prompts/list`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prompt {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub arguments: Vec<PromptArgument>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptArgument {
    pub name: String,

    #[serde(default)]
    pub required: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_always_carries_params_object() {
        let req = McpRequest::new(7, McpMethod::ToolsList.as_str(), None);
        let json = serde_json::to_value(&req).unwrap();

        assert_eq!(json["jsonrpc"], "2.0");
        assert_eq!(json["id"], 7);
        assert_eq!(json["method"], "tools/list");
        assert_eq!(json["params"], json!({}));
    }

    #[test]
    fn test_with_id_keeps_method_and_params() {
        let req = McpRequest::new(1, "tools/call", Some(json!({"name": "compute_health"})));
        let retried = req.with_id(4);

        assert_eq!(retried.id, 4);
        assert_eq!(retried.method, req.method);
        assert_eq!(retried.params, req.params);
    }

    #[test]
    fn test_deserialize_error_response() {
        let json = r#"{"jsonrpc":"2.0","id":3,"error":{"code":-32602,"message":"bad task id"}}"#;
        let resp: McpResponse = serde_json::from_str(json).unwrap();

        let err = resp.into_result().unwrap_err();
        assert_eq!(err.code, -32602);
        assert_eq!(err.message, "bad task id");
    }

    #[test]
    fn test_error_wins_over_result() {
        let resp = McpResponse {
            jsonrpc: "2.0".to_string(),
            id: Some(1),
            result: Some(json!({})),
            error: Some(McpError::internal_error("boom")),
        };
        assert_eq!(resp.into_result().unwrap_err().code, -32603);
    }

    #[test]
    fn test_empty_envelope_is_internal_error() {
        let resp: McpResponse = serde_json::from_str(r#"{"jsonrpc":"2.0","id":1}"#).unwrap();
        let err = resp.into_result().unwrap_err();
        assert_eq!(err.code, -32603);
        assert!(err.message.contains("neither result nor error"));
    }

    #[test]
    fn test_null_id_parse_error_response() {
        let json = r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32700,"message":"Parse error"}}"#;
        let resp: McpResponse = serde_json::from_str(json).unwrap();
        assert!(resp.id.is_none());
        assert!(resp.error.is_some());
    }

    #[test]
    fn test_method_names() {
        for method in McpMethod::ALL {
            let parsed: McpMethod = method.as_str().parse().unwrap();
            assert_eq!(parsed, method);
        }
        let unknown = "sampling/createMessage".parse::<McpMethod>().unwrap_err();
        assert_eq!(unknown.code, -32601);
    }

    #[test]
    fn test_initialize_params_shape() {
        let params = InitializeParams::for_client("opscenter-client", "0.1.0");
        let json = serde_json::to_value(&params).unwrap();

        assert_eq!(json["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(json["capabilities"]["resources"]["subscribe"], true);
        assert_eq!(json["capabilities"]["tools"], json!({}));
        assert_eq!(json["clientInfo"]["name"], "opscenter-client");
    }

    #[test]
    fn test_server_capabilities_tolerates_missing_version() {
        let caps: ServerCapabilities = serde_json::from_value(json!({
            "protocolVersion": "2024-11-05",
            "serverInfo": {"name": "OpsCenterMCP"}
        }))
        .unwrap();
        assert_eq!(caps.server_info.name, "OpsCenterMCP");
        assert_eq!(caps.server_info.version, "");
        assert_eq!(caps.capabilities, Value::Null);
    }
}
