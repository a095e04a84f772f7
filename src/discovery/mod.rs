//! Server discovery
//!
//! Finds a management server without configuration by guessing addresses
//! from the page location and probing them.
//!
//! # Architecture
//!
//! 1. **Page context** (`page`): the explicit location value everything derives from
//! 2. **Candidates** (`candidates`): ordered, de-duplicated address guesses
//! 3. **Probe** (`probe`): reachability check, then descriptor retrieval
//! 4. **Descriptor** (`descriptor`): strict validation of discovery bodies
//! 5. **Orchestrator** (`orchestrator`): batched probing under an overall timeout

pub mod candidates;

pub mod descriptor;

pub mod orchestrator;

pub mod page;

pub mod probe;

pub mod settle;

#[cfg(test)]
mod proptests;

pub use candidates::generate_candidates;
pub use descriptor::{parse_descriptor, validate_descriptor, DescriptorRejection, ServerDescriptor, ServerIdentity};
pub use orchestrator::{AddressCheck, Discover, DiscoveryOrchestrator, ValidatedDiscovery};
pub use page::{PageContext, PageContextError};
pub use probe::{HttpProbe, Probe, Reachability, DISCOVERY_PATHS};
pub use settle::settle_all_then_pick_first;
