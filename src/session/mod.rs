//! Session establishment
//!
//! - `credentials`: the two-entry credential store and the credential resolver
//! - `manager`: the session state machine and its fallback chain

pub mod credentials;

pub mod manager;

pub use credentials::{
    resolve_credential, CredentialStore, FileStore, MemoryStore, StoreError, DEFAULT_DEV_TOKEN,
};
pub use manager::{Session, SessionManager, SessionOptions, SessionStatus};
