//! Property-Based Tests for Candidate Generation
//!
//! Invariants that must hold for any page address:
//!
//! - **Uniqueness**: no candidate appears twice
//! - **Origin first**: the page origin is always the first candidate
//! - **Loopback coverage**: a loopback page yields every development port on
//!   both loopback spellings, over plain http
//!
//! # Running the Tests
//!
//! ```bash
//! cargo test --lib discovery::proptests
//! ```

use proptest::prelude::*;
use std::collections::HashSet;

use crate::discovery::candidates::{generate_candidates, DEV_PORTS};
use crate::discovery::page::{PageContext, LOOPBACK_HOSTS};

// Helper: hostnames mixing the substitution keywords with platform suffixes
fn arb_hostname() -> impl Strategy<Value = String> {
    let label = prop_oneof![
        Just("client".to_string()),
        Just("ui".to_string()),
        Just("frontend".to_string()),
        Just("app".to_string()),
        Just("ops".to_string()),
        "[a-z]{1,8}",
    ];
    let domain = prop_oneof![
        Just(".onrender.com".to_string()),
        Just(".example.com".to_string()),
        Just(".internal".to_string()),
    ];
    (prop::collection::vec(label, 1..4), domain)
        .prop_map(|(labels, domain)| format!("{}{}", labels.join("-"), domain))
}

fn arb_page() -> impl Strategy<Value = PageContext> {
    (
        prop_oneof![Just("http"), Just("https")],
        prop_oneof![
            arb_hostname(),
            Just("localhost".to_string()),
            Just("127.0.0.1".to_string()),
        ],
        prop::option::of(1024u16..65535),
    )
        .prop_map(|(scheme, host, port)| PageContext::new(scheme, host, port))
}

proptest! {
    #[test]
    fn prop_candidates_are_unique(page in arb_page()) {
        let candidates = generate_candidates(&page);
        let unique: HashSet<&String> = candidates.iter().collect();
        prop_assert_eq!(unique.len(), candidates.len());
    }

    #[test]
    fn prop_origin_is_first(page in arb_page()) {
        let candidates = generate_candidates(&page);
        prop_assert_eq!(&candidates[0], &page.origin());
    }

    #[test]
    fn prop_loopback_covers_dev_ports(
        host in prop_oneof![Just("localhost"), Just("127.0.0.1")],
        port in prop::option::of(1024u16..65535),
    ) {
        let candidates = generate_candidates(&PageContext::new("http", host, port));
        for loopback in LOOPBACK_HOSTS {
            for dev_port in DEV_PORTS {
                let expected = format!("http://{loopback}:{dev_port}");
                prop_assert!(candidates.contains(&expected), "missing {}", expected);
            }
        }
    }

    #[test]
    fn prop_candidates_parse_as_pages(page in arb_page()) {
        for candidate in generate_candidates(&page) {
            prop_assert!(PageContext::parse(&candidate).is_ok(), "unparseable {}", candidate);
        }
    }
}
