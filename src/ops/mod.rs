//! OpsCenter management resources
//!
//! Typed models for the business resources and an [`OpsApi`] wrapper that
//! reads them through a connected MCP client.

pub mod api;

pub mod models;

pub use api::{OpsApi, OpsResource, PromptMessage, ResourceKind, HEALTH_TOOL, TASK_SUMMARY_PROMPT};
pub use models::{
    Agent, HealthStatus, PaginatedResult, Performance, Queue, Role, ServiceRequest, Task, Tenant,
    Workbench,
};
