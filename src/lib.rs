//! OpsCenter Client Library
//!
//! This library provides the connection side of the OpsCenter management
//! client: server discovery from the page location, bearer-credential
//! sessions over the MCP JSON-RPC protocol, and connection diagnostics.
//! Typed business resources and a small conversational assistant sit on top.

pub mod assistant;
pub mod config;
pub mod diagnostics;
pub mod discovery;
pub mod error;
pub mod mcp;
pub mod metrics;
pub mod ops;
pub mod session;

pub use diagnostics::{DiagnosticReport, Diagnostics, QuickCheck};
pub use discovery::{DiscoveryOrchestrator, HttpProbe, PageContext, ServerDescriptor};
pub use error::ConnectionError;
pub use session::{Session, SessionManager, SessionStatus};
