//! Probe
//!
//! Checks one candidate base address in two steps:
//!
//! 1. **Reachability**: unauthenticated `GET /`; any 2xx/3xx counts. A failure
//!    ends the probe without touching the discovery paths.
//! 2. **Descriptor retrieval**: `GET` each of [`DISCOVERY_PATHS`] in order,
//!    each with its own bound; the first valid descriptor wins.
//!
//! [`Probe::probe`] reduces every failure to `None`. Diagnostics reuses the two
//! steps individually through [`HttpProbe::check_reachable`] and
//! [`HttpProbe::fetch_descriptor`].

use crate::discovery::descriptor::{parse_descriptor, DescriptorRejection, ServerDescriptor};
use crate::mcp::transport::{normalize_base_address, TransportError};
use crate::metrics;
use reqwest::header::ACCEPT;
use std::time::Duration;

/// Well-known discovery sub-paths, in probe order
pub const DISCOVERY_PATHS: [&str; 3] = ["/api/discovery", "/discovery", "/mcp/discovery"];

const DEFAULT_REACHABILITY_TIMEOUT: Duration = Duration::from_secs(3);
const DEFAULT_DESCRIPTOR_TIMEOUT: Duration = Duration::from_secs(2);

/// Anything that can check a candidate address
#[allow(async_fn_in_trait)]
pub trait Probe: Send + Sync {
    /// `None` means "no server here", never an error
    async fn probe(&self, base_address: &str) -> Option<ServerDescriptor>;
}

/// Result of the root reachability check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reachability {
    Reachable { status: u16 },
    BadStatus(u16),
    Unreachable(String),
}

impl Reachability {
    pub fn is_reachable(&self) -> bool {
        matches!(self, Self::Reachable { .. })
    }
}

/// What happened at one discovery path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathOutcome {
    Found,
    Status(u16),
    Malformed(DescriptorRejection),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathAttempt {
    pub path: &'static str,
    pub outcome: PathOutcome,
}

/// Result of descriptor retrieval, with the per-path record diagnostics prints
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescriptorOutcome {
    pub descriptor: Option<ServerDescriptor>,
    pub attempts: Vec<PathAttempt>,
}

/// HTTP probe with separate reachability and per-path bounds
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    reachability_timeout: Duration,
    descriptor_timeout: Duration,
}

impl HttpProbe {
    pub fn new() -> Result<Self, TransportError> {
        // Redirects are not followed: a 3xx on the root already proves reachability
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| TransportError::Setup(e.to_string()))?;

        Ok(Self {
            client,
            reachability_timeout: DEFAULT_REACHABILITY_TIMEOUT,
            descriptor_timeout: DEFAULT_DESCRIPTOR_TIMEOUT,
        })
    }

    pub fn with_timeouts(mut self, reachability: Duration, descriptor: Duration) -> Self {
        self.reachability_timeout = reachability;
        self.descriptor_timeout = descriptor;
        self
    }

    pub fn reachability_timeout(&self) -> Duration {
        self.reachability_timeout
    }

    pub fn descriptor_timeout(&self) -> Duration {
        self.descriptor_timeout
    }

    /// Step 1: `GET {base}/`
    pub async fn check_reachable(&self, base_address: &str) -> Reachability {
        let url = format!("{}/", normalize_base_address(base_address));

        match self
            .client
            .get(&url)
            .timeout(self.reachability_timeout)
            .send()
            .await
        {
            Ok(response) => {
                let status = response.status();
                if status.is_success() || status.is_redirection() {
                    Reachability::Reachable {
                        status: status.as_u16(),
                    }
                } else {
                    Reachability::BadStatus(status.as_u16())
                }
            }
            Err(e) if e.is_timeout() => Reachability::Unreachable(format!(
                "timed out after {:?}",
                self.reachability_timeout
            )),
            Err(e) => Reachability::Unreachable(e.to_string()),
        }
    }

    /// Step 2: try every discovery path in order until one yields a valid descriptor
    pub async fn fetch_descriptor(&self, base_address: &str) -> DescriptorOutcome {
        let base = normalize_base_address(base_address);
        let mut outcome = DescriptorOutcome::default();

        for path in DISCOVERY_PATHS {
            let attempt = self.fetch_path(&base, path).await;
            match attempt {
                Ok(descriptor) => {
                    outcome.attempts.push(PathAttempt {
                        path,
                        outcome: PathOutcome::Found,
                    });
                    outcome.descriptor = Some(descriptor);
                    break;
                }
                Err(path_outcome) => {
                    if let PathOutcome::Malformed(reason) = &path_outcome {
                        tracing::debug!("Malformed descriptor at {}{}: {}", base, path, reason);
                    } else {
                        tracing::debug!("No descriptor at {}{}: {:?}", base, path, path_outcome);
                    }
                    outcome.attempts.push(PathAttempt {
                        path,
                        outcome: path_outcome,
                    });
                }
            }
        }

        outcome
    }

    async fn fetch_path(&self, base: &str, path: &'static str) -> Result<ServerDescriptor, PathOutcome> {
        let url = format!("{base}{path}");
        let response = self
            .client
            .get(&url)
            .timeout(self.descriptor_timeout)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| PathOutcome::Failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PathOutcome::Status(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| PathOutcome::Failed(e.to_string()))?;
        parse_descriptor(base, &body).map_err(PathOutcome::Malformed)
    }
}

impl Probe for HttpProbe {
    async fn probe(&self, base_address: &str) -> Option<ServerDescriptor> {
        let reachability = self.check_reachable(base_address).await;
        if !reachability.is_reachable() {
            tracing::debug!("Candidate {} unreachable: {:?}", base_address, reachability);
            metrics::DISCOVERY_PROBES_TOTAL
                .with_label_values(&["unreachable"])
                .inc();
            return None;
        }

        let outcome = self.fetch_descriptor(base_address).await;
        match outcome.descriptor {
            Some(descriptor) => {
                tracing::info!(
                    "Found server '{}' at {}",
                    descriptor.identity.name,
                    descriptor.base_address
                );
                metrics::DISCOVERY_PROBES_TOTAL
                    .with_label_values(&["found"])
                    .inc();
                Some(descriptor)
            }
            None => {
                metrics::DISCOVERY_PROBES_TOTAL
                    .with_label_values(&["no_descriptor"])
                    .inc();
                None
            }
        }
    }
}
