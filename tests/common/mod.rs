//! Shared wiremock fixtures for the integration tests

#![allow(dead_code)]

use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub fn descriptor_body(server: &MockServer) -> Value {
    json!({
        "server_url": server.uri(),
        "mcp_endpoint": "/mcp",
        "auth_required": true,
        "auth_type": "bearer",
        "server_info": {"name": "OpsCenterMCP", "version": "1.0.0"}
    })
}

pub fn initialize_result() -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "result": {
            "protocolVersion": "2024-11-05",
            "capabilities": {"resources": {}, "tools": {}},
            "serverInfo": {"name": "OpsCenterMCP", "version": "1.0.0"}
        }
    })
}

/// Root page plus a descriptor at `/api/discovery`
pub async fn mount_discoverable(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/discovery"))
        .respond_with(ResponseTemplate::new(200).set_body_json(descriptor_body(server)))
        .mount(server)
        .await;
}

/// `/mcp` accepts `token` and answers 401 to anything else
pub async fn mount_rpc(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path("/mcp"))
        .and(header("authorization", format!("Bearer {token}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(initialize_result()))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/mcp"))
        .respond_with(ResponseTemplate::new(401))
        .mount(server)
        .await;
}

/// Nothing listens here; connections are refused immediately
pub const DEAD_ADDRESS: &str = "http://127.0.0.1:1";
