// Prometheus metrics for the OpsCenter client
//
// Process-local counters, rendered on demand (`opscenter --metrics`):
// - Discovery probe outcomes and discovery runs
// - JSON-RPC requests by method/outcome and retries
// - Session state transitions

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, Registry, TextEncoder};
use std::sync::Arc;

lazy_static! {
    pub static ref REGISTRY: Arc<Registry> = Arc::new(Registry::new());

    // Discovery metrics
    pub static ref DISCOVERY_PROBES_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("discovery_probes_total", "Candidate addresses probed, by outcome"),
        &["outcome"]
    ).expect("Failed to create discovery probes metric");

    pub static ref DISCOVERY_RUNS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("discovery_runs_total", "Discovery runs, by result"),
        &["result"]
    ).expect("Failed to create discovery runs metric");

    // RPC metrics
    pub static ref RPC_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("rpc_requests_total", "JSON-RPC requests, by method and outcome"),
        &["method", "outcome"]
    ).expect("Failed to create RPC requests metric");

    pub static ref RPC_RETRIES_TOTAL: IntCounter = IntCounter::new(
        "rpc_retries_total",
        "JSON-RPC attempts re-sent after a transient failure"
    ).expect("Failed to create RPC retries metric");

    // Session metrics
    pub static ref SESSION_TRANSITIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("session_transitions_total", "Session status transitions, by target status"),
        &["status"]
    ).expect("Failed to create session transitions metric");
}

/// Register all metrics with [`REGISTRY`]. Call once at startup.
pub fn init() -> prometheus::Result<()> {
    REGISTRY.register(Box::new(DISCOVERY_PROBES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(DISCOVERY_RUNS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RPC_REQUESTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RPC_RETRIES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SESSION_TRANSITIONS_TOTAL.clone()))?;
    Ok(())
}

/// Gather all metrics in Prometheus text format
pub fn gather_metrics() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {}", e))?;
    String::from_utf8(buffer).map_err(|e| anyhow::anyhow!("Invalid UTF-8 in metrics: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_counter_labels() {
        let before = DISCOVERY_PROBES_TOTAL.with_label_values(&["unreachable"]).get();
        DISCOVERY_PROBES_TOTAL.with_label_values(&["unreachable"]).inc();
        assert_eq!(
            DISCOVERY_PROBES_TOTAL.with_label_values(&["unreachable"]).get(),
            before + 1
        );
    }

    #[test]
    fn test_gather_after_init() {
        // A second registration (another test got there first) is harmless
        let _ = init();

        RPC_RETRIES_TOTAL.inc();
        let text = gather_metrics().unwrap();
        assert!(text.contains("rpc_retries_total"));
    }
}
