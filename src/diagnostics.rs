//! Connection Diagnostics
//!
//! A fixed battery of checks against one address, for triage:
//!
//! 1. root reachability (a failure here ends the run)
//! 2. descriptor retrieval at every discovery path
//! 3. handshake without a credential, to see whether auth is enforced
//! 4. handshake with the supplied credential, exactly one attempt
//! 5. CORS preflight for the configured page origin
//!
//! Stages after reachability run regardless of each other's outcome. Every
//! stage appends to the report transcript in execution order.

use crate::discovery::orchestrator::AddressCheck;
use crate::discovery::probe::{HttpProbe, PathOutcome, Reachability};
use crate::discovery::ServerDescriptor;
use crate::error::ConnectionError;
use crate::mcp::client::{ClientError, McpClient};
use crate::mcp::http_transport::HttpTransport;
use crate::mcp::protocol::ServerInfo;
use crate::mcp::retry::RetryConfig;
use crate::mcp::transport::{normalize_base_address, RpcTarget, TransportError};
use serde::Serialize;

/// Origin presented when none is configured
pub const DEFAULT_ORIGIN: &str = "http://localhost:3000";

/// Result of one diagnostic run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticReport {
    pub base_address: String,
    pub reachable: bool,
    pub descriptor_retrieved: bool,
    pub handshake_ok: bool,
    pub auth_enforced: bool,
    /// `None` when the preflight was not attempted
    pub cors_preflight_ok: Option<bool>,
    pub descriptor: Option<ServerDescriptor>,
    pub server_info: Option<ServerInfo>,
    pub transcript: Vec<String>,
    pub error: Option<String>,
}

impl DiagnosticReport {
    fn new(base_address: String) -> Self {
        Self {
            base_address,
            reachable: false,
            descriptor_retrieved: false,
            handshake_ok: false,
            auth_enforced: false,
            cors_preflight_ok: None,
            descriptor: None,
            server_info: None,
            transcript: Vec::new(),
            error: None,
        }
    }

    fn note(&mut self, line: impl Into<String>) {
        let line = line.into();
        tracing::debug!("[diagnose {}] {}", self.base_address, line);
        self.transcript.push(line);
    }

    /// Human-readable rendering: verdict lines followed by the transcript
    pub fn render(&self) -> String {
        let mark = |ok: bool| if ok { "ok" } else { "FAILED" };
        let mut out = format!("Diagnostics for {}\n", self.base_address);
        out.push_str(&format!("  reachable:            {}\n", mark(self.reachable)));
        out.push_str(&format!(
            "  descriptor retrieved: {}\n",
            mark(self.descriptor_retrieved)
        ));
        out.push_str(&format!("  handshake:            {}\n", mark(self.handshake_ok)));
        out.push_str(&format!("  auth enforced:        {}\n", self.auth_enforced));
        let cors = match self.cors_preflight_ok {
            Some(ok) => mark(ok),
            None => "not run",
        };
        out.push_str(&format!("  cors preflight:       {cors}\n"));
        if let Some(error) = &self.error {
            out.push_str(&format!("  error: {error}\n"));
        }
        out.push_str("Transcript:\n");
        for line in &self.transcript {
            out.push_str(&format!("  {line}\n"));
        }
        out
    }
}

/// One-line verdict on an address
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuickCheck {
    pub success: bool,
    pub message: String,
}

/// Diagnostic runner over the same primitives discovery and sessions use
#[derive(Debug, Clone)]
pub struct Diagnostics {
    probe: HttpProbe,
    transport: HttpTransport,
    origin: String,
}

impl Diagnostics {
    pub fn new(probe: HttpProbe, transport: HttpTransport, origin: impl Into<String>) -> Self {
        Self {
            probe,
            transport,
            origin: origin.into(),
        }
    }

    /// Default probe and transport presenting `origin`
    pub fn with_origin(origin: impl Into<String>) -> Result<Self, TransportError> {
        let origin = origin.into();
        let transport = HttpTransport::new()?.with_origin(origin.clone());
        Ok(Self::new(HttpProbe::new()?, transport, origin))
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Run the full battery against `base_address`
    pub async fn diagnose(&self, base_address: &str, credential: Option<&str>) -> DiagnosticReport {
        let base = normalize_base_address(base_address);
        let mut report = DiagnosticReport::new(base.clone());
        tracing::info!("Running connection diagnostics for {}", base);

        // Reachability
        match self.probe.check_reachable(&base).await {
            Reachability::Reachable { status } => {
                report.reachable = true;
                report.note(format!("GET / answered HTTP {status}"));
            }
            Reachability::BadStatus(status) => {
                report.note(format!("GET / answered HTTP {status}"));
                report.error = Some(
                    ConnectionError::Unreachable(format!("root answered HTTP {status}"))
                        .user_message(),
                );
                return report;
            }
            Reachability::Unreachable(detail) => {
                report.note(format!("GET / failed: {detail}"));
                report.error = Some(ConnectionError::Unreachable(detail).user_message());
                return report;
            }
        }

        // Descriptor
        let outcome = self.probe.fetch_descriptor(&base).await;
        for attempt in &outcome.attempts {
            let line = match &attempt.outcome {
                PathOutcome::Found => format!("GET {} returned a valid descriptor", attempt.path),
                PathOutcome::Status(status) => format!("GET {} answered HTTP {status}", attempt.path),
                PathOutcome::Malformed(reason) => {
                    format!("GET {} returned a malformed descriptor: {reason}", attempt.path)
                }
                PathOutcome::Failed(detail) => format!("GET {} failed: {detail}", attempt.path),
            };
            report.note(line);
        }
        if let Some(descriptor) = outcome.descriptor {
            report.note(format!(
                "Server identifies as {} {} (auth {}: {})",
                descriptor.identity.name,
                descriptor.identity.version,
                descriptor.auth_scheme,
                descriptor.auth_required
            ));
            report.descriptor_retrieved = true;
            report.descriptor = Some(descriptor);
        } else {
            report.note("No discovery path returned a valid descriptor");
        }

        // Auth enforcement
        match self.handshake(&base, "").await {
            Err(ClientError::Transport(TransportError::Unauthorized | TransportError::Forbidden)) => {
                report.auth_enforced = true;
                report.note("Handshake without a credential was rejected (auth enforced)");
            }
            Ok(_) => report.note("Handshake without a credential was accepted (auth not enforced)"),
            Err(e) => report.note(format!("Handshake without a credential failed: {e}")),
        }

        // Authenticated handshake
        match credential.filter(|c| !c.is_empty()) {
            Some(credential) => match self.handshake(&base, credential).await {
                Ok(info) => {
                    report.note(format!(
                        "Handshake with credential succeeded: {} {}",
                        info.name, info.version
                    ));
                    report.handshake_ok = true;
                    report.server_info = Some(info);
                }
                Err(e) => {
                    let error = ConnectionError::from(e);
                    report.note(format!(
                        "Handshake with credential failed ({}): {}",
                        error.category(),
                        error
                    ));
                    report.error = Some(error.user_message());
                }
            },
            None => report.note("No credential supplied; authenticated handshake skipped"),
        }

        // CORS
        match self.transport.preflight(&base, &self.origin).await {
            Ok(preflight) => {
                let allowed = preflight.allows(&self.origin);
                report.note(format!(
                    "OPTIONS /mcp answered HTTP {} (allow-origin: {}, allow-headers: {})",
                    preflight.status,
                    preflight.allow_origin.as_deref().unwrap_or("none"),
                    preflight.allow_headers.as_deref().unwrap_or("none")
                ));
                report.cors_preflight_ok = Some(allowed);
            }
            Err(e) => {
                report.note(format!("OPTIONS /mcp failed: {e}"));
                report.cors_preflight_ok = Some(false);
            }
        }

        report
    }

    /// Reachability plus descriptor retrieval, summarized in one line
    pub async fn quick_check(&self, base_address: &str) -> QuickCheck {
        let base = normalize_base_address(base_address);

        match self.probe.check_reachable(&base).await {
            Reachability::Reachable { .. } => {}
            Reachability::BadStatus(status) => {
                return QuickCheck {
                    success: false,
                    message: format!("{base} answered HTTP {status}"),
                }
            }
            Reachability::Unreachable(detail) => {
                return QuickCheck {
                    success: false,
                    message: format!("{base} is unreachable: {detail}"),
                }
            }
        }

        match self.probe.fetch_descriptor(&base).await.descriptor {
            Some(descriptor) => QuickCheck {
                success: true,
                message: format!(
                    "{} {} is serving at {}",
                    descriptor.identity.name, descriptor.identity.version, base
                ),
            },
            None => QuickCheck {
                success: false,
                message: format!("{base} is reachable but serves no valid discovery descriptor"),
            },
        }
    }

    /// One real handshake attempt, no retries
    async fn handshake(&self, base: &str, credential: &str) -> Result<ServerInfo, ClientError> {
        let mut client = McpClient::new(self.transport.clone(), RpcTarget::new(base, credential))
            .with_retry(RetryConfig::none());
        let info = client.initialize().await?.server_info.clone();
        client.disconnect();
        Ok(info)
    }
}

impl AddressCheck for Diagnostics {
    async fn quick_check(&self, base_address: &str) -> QuickCheck {
        Diagnostics::quick_check(self, base_address).await
    }
}
