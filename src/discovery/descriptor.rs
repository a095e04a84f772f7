//! Server descriptor validation
//!
//! A discovery endpoint answers with:
//!
//! ```json
//! {
//!   "server_url": "https://ops-server.onrender.com",
//!   "mcp_endpoint": "/mcp",
//!   "auth_required": true,
//!   "auth_type": "bearer",
//!   "server_info": { "name": "OpsCenterMCP", "version": "1.0.0", "description": "..." }
//! }
//! ```
//!
//! A body is accepted only when every required field is present with the
//! right type. Anything less is rejected as a whole.

use serde::Serialize;
use serde_json::{Map, Value};

/// Self-identification reported by a server
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerIdentity {
    pub name: String,
    pub version: String,
    pub description: String,
}

/// A validated discovery result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerDescriptor {
    /// The address that was probed and answered; this is what gets connected to
    pub base_address: String,

    /// `server_url` as reported by the server (may be an internal address)
    pub reported_url: String,

    /// `mcp_endpoint` as reported; informational, the client always uses `/mcp`
    pub rpc_path: String,

    pub auth_required: bool,

    pub auth_scheme: String,

    pub identity: ServerIdentity,
}

/// Why a discovery body was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DescriptorRejection {
    #[error("body is not valid JSON: {0}")]
    NotJson(String),

    #[error("body is not a JSON object")]
    NotAnObject,

    #[error("missing field '{0}'")]
    MissingField(&'static str),

    #[error("field '{field}' is not a {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },
}

/// Parse and validate a raw response body
pub fn parse_descriptor(base_address: &str, body: &str) -> Result<ServerDescriptor, DescriptorRejection> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| DescriptorRejection::NotJson(e.to_string()))?;
    validate_descriptor(base_address, &value)
}

/// Validate a decoded body fetched from `base_address`
pub fn validate_descriptor(
    base_address: &str,
    body: &Value,
) -> Result<ServerDescriptor, DescriptorRejection> {
    let object = body.as_object().ok_or(DescriptorRejection::NotAnObject)?;

    let reported_url = required_str(object, "server_url")?;
    let rpc_path = required_str(object, "mcp_endpoint")?;
    let auth_required = match object.get("auth_required") {
        None => return Err(DescriptorRejection::MissingField("auth_required")),
        Some(value) => value.as_bool().ok_or(DescriptorRejection::WrongType {
            field: "auth_required",
            expected: "boolean",
        })?,
    };
    let auth_scheme = required_str(object, "auth_type")?;

    let info = match object.get("server_info") {
        None => return Err(DescriptorRejection::MissingField("server_info")),
        Some(value) => value.as_object().ok_or(DescriptorRejection::WrongType {
            field: "server_info",
            expected: "object",
        })?,
    };
    let name = match info.get("name") {
        None => return Err(DescriptorRejection::MissingField("server_info.name")),
        Some(value) => value.as_str().ok_or(DescriptorRejection::WrongType {
            field: "server_info.name",
            expected: "string",
        })?,
    };

    Ok(ServerDescriptor {
        base_address: base_address.trim_end_matches('/').to_string(),
        reported_url: reported_url.trim_end_matches('/').to_string(),
        rpc_path: rpc_path.to_string(),
        auth_required,
        auth_scheme: auth_scheme.to_string(),
        identity: ServerIdentity {
            name: name.to_string(),
            version: optional_str(info, "version"),
            description: optional_str(info, "description"),
        },
    })
}

fn required_str<'a>(
    object: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a str, DescriptorRejection> {
    object
        .get(field)
        .ok_or(DescriptorRejection::MissingField(field))?
        .as_str()
        .ok_or(DescriptorRejection::WrongType {
            field,
            expected: "string",
        })
}

fn optional_str(object: &Map<String, Value>, field: &str) -> String {
    object
        .get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_body() -> Value {
        json!({
            "server_url": "http://0.0.0.0:8000/",
            "mcp_endpoint": "/mcp",
            "auth_required": true,
            "auth_type": "bearer",
            "server_info": {"name": "OpsCenterMCP", "version": "1.0.0", "description": "Ops center"}
        })
    }

    #[test]
    fn test_valid_descriptor() {
        let descriptor = validate_descriptor("http://localhost:8000/", &valid_body()).unwrap();

        assert_eq!(descriptor.base_address, "http://localhost:8000");
        assert_eq!(descriptor.reported_url, "http://0.0.0.0:8000");
        assert_eq!(descriptor.rpc_path, "/mcp");
        assert!(descriptor.auth_required);
        assert_eq!(descriptor.auth_scheme, "bearer");
        assert_eq!(descriptor.identity.name, "OpsCenterMCP");
        assert_eq!(descriptor.identity.version, "1.0.0");
    }

    #[test]
    fn test_identity_extras_are_optional() {
        let mut body = valid_body();
        body["server_info"] = json!({"name": "OpsCenterMCP"});

        let descriptor = validate_descriptor("http://localhost:8000", &body).unwrap();
        assert_eq!(descriptor.identity.version, "");
        assert_eq!(descriptor.identity.description, "");
    }

    #[test]
    fn test_missing_fields_rejected() {
        for field in ["server_url", "mcp_endpoint", "auth_required", "auth_type", "server_info"] {
            let mut body = valid_body();
            body.as_object_mut().unwrap().remove(field);
            assert_eq!(
                validate_descriptor("http://x", &body),
                Err(DescriptorRejection::MissingField(field)),
                "{field}"
            );
        }

        let mut body = valid_body();
        body["server_info"].as_object_mut().unwrap().remove("name");
        assert_eq!(
            validate_descriptor("http://x", &body),
            Err(DescriptorRejection::MissingField("server_info.name"))
        );
    }

    #[test]
    fn test_wrong_types_rejected() {
        let mut body = valid_body();
        body["auth_required"] = json!("yes");
        assert_eq!(
            validate_descriptor("http://x", &body),
            Err(DescriptorRejection::WrongType {
                field: "auth_required",
                expected: "boolean"
            })
        );

        let mut body = valid_body();
        body["server_url"] = json!(8000);
        assert!(matches!(
            validate_descriptor("http://x", &body),
            Err(DescriptorRejection::WrongType { field: "server_url", .. })
        ));
    }

    #[test]
    fn test_non_object_and_non_json() {
        assert_eq!(
            validate_descriptor("http://x", &json!([1, 2])),
            Err(DescriptorRejection::NotAnObject)
        );
        assert!(matches!(
            parse_descriptor("http://x", "MCP Server is live. Use /mcp for JSON-RPC."),
            Err(DescriptorRejection::NotJson(_))
        ));
    }
}
