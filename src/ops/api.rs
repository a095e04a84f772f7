//! Typed access to the management server's resources, tools and prompts

use crate::mcp::client::{first_text, ClientError, McpClient};
use crate::mcp::protocol::McpMethod;
use crate::mcp::transport::Transport;
use crate::ops::models::{
    Agent, HealthStatus, PaginatedResult, Queue, Role, ServiceRequest, Task, Tenant, Workbench,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::str::FromStr;

/// Tool computing SLA health for a creation timestamp
pub const HEALTH_TOOL: &str = "compute_health";

/// Prompt rendering a task summary request
pub const TASK_SUMMARY_PROMPT: &str = "prompt_task_summary";

/// Business resources served as `ops://<kind>/list`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Tenant,
    Workbench,
    Request,
    Task,
    Queue,
    Role,
    Agent,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 7] = [
        ResourceKind::Tenant,
        ResourceKind::Workbench,
        ResourceKind::Request,
        ResourceKind::Task,
        ResourceKind::Queue,
        ResourceKind::Role,
        ResourceKind::Agent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tenant => "tenant",
            Self::Workbench => "workbench",
            Self::Request => "request",
            Self::Task => "task",
            Self::Queue => "queue",
            Self::Role => "role",
            Self::Agent => "agent",
        }
    }

    pub fn list_uri(&self) -> String {
        format!("ops://{}/list", self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    /// Accepts singular or plural names, any case
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        let singular = name.strip_suffix('s').unwrap_or(&name);
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == singular || kind.as_str() == name)
            .ok_or_else(|| format!("unknown resource '{s}'"))
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A model listed through one [`ResourceKind`]
pub trait OpsResource: DeserializeOwned {
    const KIND: ResourceKind;
}

impl OpsResource for Tenant {
    const KIND: ResourceKind = ResourceKind::Tenant;
}
impl OpsResource for Workbench {
    const KIND: ResourceKind = ResourceKind::Workbench;
}
impl OpsResource for ServiceRequest {
    const KIND: ResourceKind = ResourceKind::Request;
}
impl OpsResource for Task {
    const KIND: ResourceKind = ResourceKind::Task;
}
impl OpsResource for Queue {
    const KIND: ResourceKind = ResourceKind::Queue;
}
impl OpsResource for Role {
    const KIND: ResourceKind = ResourceKind::Role;
}
impl OpsResource for Agent {
    const KIND: ResourceKind = ResourceKind::Agent;
}

/// One rendered prompt message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptMessage {
    pub role: String,
    pub text: String,
}

/// Typed calls over a connected client
pub struct OpsApi<'a, T: Transport> {
    client: &'a McpClient<T>,
}

impl<'a, T: Transport> OpsApi<'a, T> {
    pub fn new(client: &'a McpClient<T>) -> Self {
        Self { client }
    }

    /// Raw JSON of a list resource (array or paginated object)
    pub async fn list_raw(&self, kind: ResourceKind) -> Result<Value, ClientError> {
        let contents = self.client.read_resource(&kind.list_uri()).await?;
        let text = contents
            .into_iter()
            .find_map(|c| c.text)
            .ok_or_else(|| invalid(McpMethod::ResourcesRead, format!("{} has no text content", kind.list_uri())))?;

        serde_json::from_str(&text).map_err(|e| invalid(McpMethod::ResourcesRead, e.to_string()))
    }

    /// Read and decode the list resource for `R`
    pub async fn list<R: OpsResource>(&self) -> Result<PaginatedResult<R>, ClientError> {
        let raw = self.list_raw(R::KIND).await?;
        decode_list(raw)
    }

    /// Call `compute_health` for a creation timestamp (ISO 8601)
    pub async fn compute_health(
        &self,
        created_at: &str,
        threshold_seconds: f64,
    ) -> Result<HealthStatus, ClientError> {
        let result = self
            .client
            .call_tool(
                HEALTH_TOOL,
                json!({ "createdAt": created_at, "threshold_seconds": threshold_seconds }),
            )
            .await?;

        let payload = match result.get("structuredContent") {
            // Wrapped as {"result": ...} by some servers
            Some(structured) => structured.get("result").unwrap_or(structured).clone(),
            None => {
                let text = first_text(&result)
                    .ok_or_else(|| invalid(McpMethod::ToolsCall, "no content".to_string()))?;
                serde_json::from_str(&text).map_err(|e| invalid(McpMethod::ToolsCall, e.to_string()))?
            }
        };

        serde_json::from_value(payload).map_err(|e| invalid(McpMethod::ToolsCall, e.to_string()))
    }

    /// Render the task summary prompt for `task_id`
    pub async fn task_summary(&self, task_id: i64) -> Result<Vec<PromptMessage>, ClientError> {
        let result = self
            .client
            .get_prompt(TASK_SUMMARY_PROMPT, json!({ "task_id": task_id.to_string() }))
            .await?;

        let messages = result
            .get("messages")
            .and_then(Value::as_array)
            .ok_or_else(|| invalid(McpMethod::PromptsGet, "missing 'messages'".to_string()))?;

        Ok(messages
            .iter()
            .map(|message| PromptMessage {
                role: message
                    .get("role")
                    .and_then(Value::as_str)
                    .unwrap_or("user")
                    .to_string(),
                text: message
                    .pointer("/content/text")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            })
            .collect())
    }
}

fn decode_list<R: DeserializeOwned>(raw: Value) -> Result<PaginatedResult<R>, ClientError> {
    let page = if raw.is_array() {
        serde_json::from_value(raw).map(|items| PaginatedResult {
            items,
            next_cursor: None,
        })
    } else {
        serde_json::from_value(raw)
    };
    page.map_err(|e| invalid(McpMethod::ResourcesRead, e.to_string()))
}

fn invalid(method: McpMethod, reason: String) -> ClientError {
    ClientError::InvalidResult {
        method: method.as_str().to_string(),
        reason,
    }
}
