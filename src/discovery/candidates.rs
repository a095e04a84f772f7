//! Candidate Generator
//!
//! Derives an ordered list of base addresses worth probing from the page the
//! client is served from. Rules are additive and applied in priority order:
//!
//! 1. the page origin itself (client and server co-located)
//! 2. hosted-platform naming variants (`ops-client.onrender.com` →
//!    `ops-server.onrender.com`, ...)
//! 3. loopback development ports, for both loopback spellings
//! 4. generic hostname substitutions, secure scheme first
//!
//! The result never contains duplicates; the first occurrence wins.

use crate::discovery::page::{PageContext, LOOPBACK_HOSTS};
use std::collections::HashSet;

/// Ports commonly used by local development servers
pub const DEV_PORTS: [u16; 5] = [8000, 8001, 8080, 5000, 3001];

/// Service names this deployment family has historically used
pub const KNOWN_SERVICE_NAMES: [&str; 4] = [
    "opscenter-mcp",
    "opscenter-mcp-server",
    "ops-center-mcp",
    "mcp-server",
];

/// Substitutions applied to hosted-platform service names
const HOSTED_SUBSTITUTIONS: [(&str, &str); 4] = [
    ("client", "server"),
    ("ui", "api"),
    ("frontend", "backend"),
    ("app", "api"),
];

/// Substitutions applied to any hostname
const GENERIC_SUBSTITUTIONS: [(&str, &str); 3] =
    [("client", "server"), ("ui", "api"), ("frontend", "backend")];

/// Insertion-ordered set of addresses
#[derive(Debug, Default)]
struct CandidateList {
    ordered: Vec<String>,
    seen: HashSet<String>,
}

impl CandidateList {
    fn push(&mut self, address: String) {
        if self.seen.insert(address.clone()) {
            self.ordered.push(address);
        }
    }

    fn into_vec(self) -> Vec<String> {
        self.ordered
    }
}

/// Generate discovery candidates for `page`
pub fn generate_candidates(page: &PageContext) -> Vec<String> {
    let mut list = CandidateList::default();

    list.push(page.origin());

    if let Some(suffix) = page.hosted_platform_suffix() {
        for name in hosted_service_names(page.hostname(), suffix) {
            list.push(format!("https://{name}{suffix}"));
        }
    }

    if page.is_loopback() {
        for host in LOOPBACK_HOSTS {
            for port in DEV_PORTS {
                list.push(format!("http://{host}:{port}"));
            }
        }
    }

    let port_suffix = page.port_suffix();
    let mut substituted: Vec<String> = Vec::new();
    for (from, to) in GENERIC_SUBSTITUTIONS {
        let host = page.hostname().replacen(from, to, 1);
        if host != page.hostname() && !substituted.contains(&host) {
            substituted.push(host);
        }
    }
    for host in substituted {
        list.push(format!("https://{host}{port_suffix}"));
        list.push(format!("http://{host}{port_suffix}"));
    }

    let candidates = list.into_vec();
    tracing::debug!(
        "Generated {} discovery candidates for {}",
        candidates.len(),
        page.origin()
    );
    candidates
}

/// Service-name variants (without the platform suffix) for a hosted page
fn hosted_service_names(hostname: &str, suffix: &str) -> Vec<String> {
    let service = hostname.strip_suffix(suffix).unwrap_or(hostname);
    let mut names: Vec<String> = Vec::new();

    if let Some(stripped) = service.strip_suffix("-client") {
        names.push(stripped.to_string());
    }

    for (from, to) in HOSTED_SUBSTITUTIONS {
        if service.contains(from) {
            names.push(service.replacen(from, to, 1));
        }
    }

    names.push(format!("server-{service}"));
    names.push(format!("api-{service}"));
    names.push(format!("{service}-server"));
    names.push(format!("{service}-api"));

    names.extend(KNOWN_SERVICE_NAMES.iter().map(|name| name.to_string()));

    names
        .into_iter()
        .filter(|name| !name.is_empty())
        .filter(|name| {
            let full = format!("{name}{suffix}");
            full != hostname && full.len() > suffix.len()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates_for(url: &str) -> Vec<String> {
        generate_candidates(&PageContext::parse(url).unwrap())
    }

    #[test]
    fn test_origin_always_first() {
        let candidates = candidates_for("https://portal.example.com/tenants");
        assert_eq!(candidates[0], "https://portal.example.com");
    }

    #[test]
    fn test_loopback_ports_for_both_spellings() {
        let candidates = candidates_for("http://localhost:3000/");

        assert_eq!(candidates[0], "http://localhost:3000");
        for host in LOOPBACK_HOSTS {
            for port in DEV_PORTS {
                let expected = format!("http://{host}:{port}");
                assert!(candidates.contains(&expected), "missing {expected}");
            }
        }
        assert_eq!(candidates[1], "http://localhost:8000");
    }

    #[test]
    fn test_loopback_origin_on_dev_port_not_duplicated() {
        let candidates = candidates_for("http://127.0.0.1:8000");
        let count = candidates
            .iter()
            .filter(|c| c.as_str() == "http://127.0.0.1:8000")
            .count();
        assert_eq!(count, 1);
        assert_eq!(candidates[0], "http://127.0.0.1:8000");
    }

    #[test]
    fn test_hosted_platform_variants() {
        let candidates = candidates_for("https://opscenter-client.onrender.com");

        assert_eq!(candidates[0], "https://opscenter-client.onrender.com");
        assert_eq!(candidates[1], "https://opscenter.onrender.com");
        assert_eq!(candidates[2], "https://opscenter-server.onrender.com");
        assert!(candidates.contains(&"https://server-opscenter-client.onrender.com".to_string()));
        assert!(candidates.contains(&"https://opscenter-client-api.onrender.com".to_string()));
        for name in KNOWN_SERVICE_NAMES {
            assert!(candidates.contains(&format!("https://{name}.onrender.com")));
        }

        // Generic rule: https and http variants of the substituted host
        assert!(candidates.contains(&"http://opscenter-server.onrender.com".to_string()));
    }

    #[test]
    fn test_hosted_variants_exclude_original_host() {
        let candidates = candidates_for("https://mcp-server.onrender.com");
        let origin_count = candidates
            .iter()
            .filter(|c| c.as_str() == "https://mcp-server.onrender.com")
            .count();
        assert_eq!(origin_count, 1);
    }

    #[test]
    fn test_generic_substitutions_keep_port() {
        let candidates = candidates_for("http://ops-frontend.internal:8443");
        assert_eq!(
            candidates,
            vec![
                "http://ops-frontend.internal:8443".to_string(),
                "https://ops-backend.internal:8443".to_string(),
                "http://ops-backend.internal:8443".to_string(),
            ]
        );
    }

    #[test]
    fn test_no_substitution_gives_origin_only() {
        assert_eq!(
            candidates_for("https://portal.example.com"),
            vec!["https://portal.example.com".to_string()]
        );
    }
}
