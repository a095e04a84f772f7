//! Discovery Orchestrator
//!
//! Probes candidates in fixed-size batches. Every member of a batch is probed
//! concurrently and the whole batch settles before anything is inspected;
//! the first success by candidate position ends discovery. Batches run
//! strictly one after another, so latency is bounded by
//! `batches × per-probe timeout` rather than by the candidate count.
//!
//! The overall timeout drops the in-flight batch; its late results are never
//! observed. Dropping cancels those probes mid-request, so the probe metrics
//! of a dropped batch are never recorded; only the run's `timeout` outcome is.

use crate::diagnostics::QuickCheck;
use crate::discovery::candidates::generate_candidates;
use crate::discovery::descriptor::ServerDescriptor;
use crate::discovery::page::PageContext;
use crate::discovery::probe::Probe;
use crate::discovery::settle::settle_all_then_pick_first;
use crate::metrics;
use std::time::Duration;

pub const DEFAULT_BATCH_SIZE: usize = 3;

const DEFAULT_OVERALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Something that can find a server
#[allow(async_fn_in_trait)]
pub trait Discover {
    async fn discover(&self) -> Option<ServerDescriptor>;
}

/// Lightweight validation of an address before it is trusted
#[allow(async_fn_in_trait)]
pub trait AddressCheck {
    async fn quick_check(&self, base_address: &str) -> QuickCheck;
}

/// Batched discovery over a fixed candidate list
pub struct DiscoveryOrchestrator<P: Probe> {
    probe: P,
    candidates: Vec<String>,
    batch_size: usize,
    overall_timeout: Duration,
}

impl<P: Probe> DiscoveryOrchestrator<P> {
    pub fn new(probe: P, candidates: Vec<String>) -> Self {
        Self {
            probe,
            candidates,
            batch_size: DEFAULT_BATCH_SIZE,
            overall_timeout: DEFAULT_OVERALL_TIMEOUT,
        }
    }

    /// Orchestrator over the generated candidates for `page`
    pub fn from_page(probe: P, page: &PageContext) -> Self {
        Self::new(probe, generate_candidates(page))
    }

    /// Batch size; zero is treated as one
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_overall_timeout(mut self, timeout: Duration) -> Self {
        self.overall_timeout = timeout;
        self
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    async fn run_batches(&self) -> Option<ServerDescriptor> {
        for (batch_index, batch) in self.candidates.chunks(self.batch_size).enumerate() {
            tracing::debug!("Probing batch {}: {:?}", batch_index, batch);

            let probes = batch.iter().map(|candidate| self.probe.probe(candidate));
            if let Some((index, descriptor)) = settle_all_then_pick_first(probes).await {
                tracing::debug!(
                    "Batch {} produced a server at {}",
                    batch_index,
                    batch[index]
                );
                return Some(descriptor);
            }
        }
        None
    }
}

impl<P: Probe> Discover for DiscoveryOrchestrator<P> {
    async fn discover(&self) -> Option<ServerDescriptor> {
        tracing::info!(
            "Discovering server across {} candidates (batch size {})",
            self.candidates.len(),
            self.batch_size
        );

        match tokio::time::timeout(self.overall_timeout, self.run_batches()).await {
            Ok(Some(descriptor)) => {
                metrics::DISCOVERY_RUNS_TOTAL
                    .with_label_values(&["found"])
                    .inc();
                Some(descriptor)
            }
            Ok(None) => {
                tracing::warn!("No server found among {} candidates", self.candidates.len());
                metrics::DISCOVERY_RUNS_TOTAL
                    .with_label_values(&["not_found"])
                    .inc();
                None
            }
            Err(_) => {
                tracing::warn!("Discovery timed out after {:?}", self.overall_timeout);
                metrics::DISCOVERY_RUNS_TOTAL
                    .with_label_values(&["timeout"])
                    .inc();
                None
            }
        }
    }
}

/// Discovery whose winner must also pass a quick check
pub struct ValidatedDiscovery<D, C> {
    inner: D,
    checker: C,
}

impl<D: Discover, C: AddressCheck> ValidatedDiscovery<D, C> {
    pub fn new(inner: D, checker: C) -> Self {
        Self { inner, checker }
    }
}

impl<D: Discover, C: AddressCheck> Discover for ValidatedDiscovery<D, C> {
    async fn discover(&self) -> Option<ServerDescriptor> {
        let descriptor = self.inner.discover().await?;
        let check = self.checker.quick_check(&descriptor.base_address).await;
        if check.success {
            Some(descriptor)
        } else {
            tracing::warn!(
                "Discovered address {} failed validation: {}",
                descriptor.base_address,
                check.message
            );
            None
        }
    }
}
