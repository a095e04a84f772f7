//! Session Manager
//!
//! Owns the single [`Session`] and is the only writer of the credential
//! store. `establish` walks the fallback chain:
//!
//! 1. discovery, raced against a hard ceiling
//! 2. handshake with the discovered address and the resolved credential
//! 3. handshake with the last persisted address and credential
//! 4. `Disconnected`: the caller asks for manual entry
//!
//! The ceiling drops a discovery still in flight, which cancels its probes:
//! late results are ignored and their probe metrics are never recorded.
//!
//! Failures inside the chain only drive state transitions. The manual path,
//! [`SessionManager::connect_manual`], surfaces its failure to the caller.
//!
//! # State machine
//!
//! ```text
//! Uninitialized → Discovering → Connecting → Connected
//!                      ↓             ↓
//!                 Disconnected ← ────┘
//! ```

use crate::discovery::orchestrator::Discover;
use crate::discovery::page::PageContext;
use crate::error::ConnectionError;
use crate::mcp::client::{ClientError, McpClient};
use crate::mcp::retry::RetryConfig;
use crate::mcp::transport::{normalize_base_address, RpcTarget, Transport};
use crate::metrics;
use crate::session::credentials::{resolve_credential, CredentialStore, DEFAULT_DEV_TOKEN};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

const DEFAULT_DISCOVERY_CEILING: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionStatus {
    Uninitialized,
    Discovering,
    Connecting,
    Connected,
    Disconnected,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Discovering => "discovering",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The client's current connection state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    /// Regenerated on every successful connect
    pub id: Uuid,
    pub base_address: String,
    #[serde(skip_serializing)]
    pub credential: String,
    pub status: SessionStatus,
    pub connected_at: Option<DateTime<Utc>>,
}

impl Session {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            base_address: String::new(),
            credential: String::new(),
            status: SessionStatus::Uninitialized,
            connected_at: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status == SessionStatus::Connected
    }
}

/// Tunables for [`SessionManager`]
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Hard ceiling on discovery; expiry counts as "nothing found"
    pub discovery_ceiling: Duration,

    /// Token used for development pages when nothing is persisted
    pub dev_token: String,

    /// Retry policy for handshakes and later calls
    pub retry: RetryConfig,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            discovery_ceiling: DEFAULT_DISCOVERY_CEILING,
            dev_token: DEFAULT_DEV_TOKEN.to_string(),
            retry: RetryConfig::default(),
        }
    }
}

pub struct SessionManager<D, T, S>
where
    D: Discover,
    T: Transport + Clone,
    S: CredentialStore,
{
    discovery: D,
    transport: T,
    store: S,
    page: PageContext,
    options: SessionOptions,
    session: Session,
    client: Option<McpClient<T>>,
}

impl<D, T, S> SessionManager<D, T, S>
where
    D: Discover,
    T: Transport + Clone,
    S: CredentialStore,
{
    pub fn new(discovery: D, transport: T, store: S, page: PageContext) -> Self {
        Self {
            discovery,
            transport,
            store,
            page,
            options: SessionOptions::default(),
            session: Session::new(),
            client: None,
        }
    }

    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// Read-only view of the current session
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The connected client, present only while `Connected`
    pub fn client(&self) -> Option<&McpClient<T>> {
        self.client.as_ref()
    }

    pub fn client_mut(&mut self) -> Option<&mut McpClient<T>> {
        self.client.as_mut()
    }

    pub fn page(&self) -> &PageContext {
        &self.page
    }

    /// The credential `establish` would try for this page
    pub fn resolved_credential(&self) -> String {
        resolve_credential(&self.page, &self.store, &self.options.dev_token)
    }

    /// Run the automatic connection chain; never fails
    pub async fn establish(&mut self) -> Session {
        self.drop_client();
        self.transition(SessionStatus::Discovering);

        let discovered =
            match tokio::time::timeout(self.options.discovery_ceiling, self.discovery.discover())
                .await
            {
                Ok(found) => found,
                Err(_) => {
                    tracing::warn!(
                        "Discovery ceiling of {:?} reached; falling back",
                        self.options.discovery_ceiling
                    );
                    None
                }
            };

        let mut attempted: Option<(String, String)> = None;

        if let Some(descriptor) = discovered {
            let credential = self.resolved_credential();
            if credential.is_empty() {
                tracing::info!(
                    "Found server at {} but no credential is available",
                    descriptor.base_address
                );
            } else {
                match self.try_connect(&descriptor.base_address, &credential).await {
                    Ok(()) => return self.session.clone(),
                    Err(e) => tracing::warn!(
                        "Handshake with discovered server {} failed: {}",
                        descriptor.base_address,
                        e
                    ),
                }
                attempted = Some((descriptor.base_address, credential));
            }
        }

        let saved = match self.store.saved_session() {
            Ok(saved) => saved,
            Err(e) => {
                tracing::warn!("Ignoring unreadable credential store: {}", e);
                None
            }
        };
        if let Some((address, credential)) = saved {
            if attempted.as_ref() == Some(&(address.clone(), credential.clone())) {
                tracing::debug!("Saved session matches the failed attempt; not retrying it");
            } else {
                match self.try_connect(&address, &credential).await {
                    Ok(()) => return self.session.clone(),
                    Err(e) => tracing::warn!("Handshake with saved server {} failed: {}", address, e),
                }
            }
        }

        tracing::info!("No server connected; manual address and token required");
        self.transition(SessionStatus::Disconnected);
        self.session.clone()
    }

    /// Handshake with a user-supplied address and credential
    ///
    /// Skips discovery. Failure is returned so it can be shown to the user.
    pub async fn connect_manual(
        &mut self,
        base_address: &str,
        credential: &str,
    ) -> Result<Session, ConnectionError> {
        let address = validate_manual_address(base_address)?;
        self.drop_client();

        match self.try_connect(&address, credential).await {
            Ok(()) => Ok(self.session.clone()),
            Err(e) => {
                let error = ConnectionError::from(e);
                tracing::error!(
                    "Manual connection to {} failed ({}): {}",
                    address,
                    error.category(),
                    error
                );
                self.transition(SessionStatus::Disconnected);
                Err(error)
            }
        }
    }

    /// Close the session and forget the persisted address and credential
    pub fn disconnect(&mut self) {
        self.drop_client();
        if let Err(e) = self.store.clear_session() {
            tracing::warn!("Failed to clear saved session: {}", e);
        }
        self.transition(SessionStatus::Disconnected);
    }

    async fn try_connect(&mut self, base_address: &str, credential: &str) -> Result<(), ClientError> {
        self.session.base_address = normalize_base_address(base_address);
        self.session.credential = credential.to_string();
        self.transition(SessionStatus::Connecting);

        let target = RpcTarget::new(base_address, credential);
        let mut client =
            McpClient::new(self.transport.clone(), target).with_retry(self.options.retry.clone());
        client.initialize().await?;

        self.session.id = Uuid::new_v4();
        self.session.connected_at = Some(Utc::now());
        self.client = Some(client);
        self.transition(SessionStatus::Connected);

        if let Err(e) = self
            .store
            .save_session(&self.session.base_address, &self.session.credential)
        {
            tracing::warn!("Connected, but failed to persist session: {}", e);
        }
        Ok(())
    }

    fn drop_client(&mut self) {
        if let Some(mut client) = self.client.take() {
            client.disconnect();
        }
    }

    fn transition(&mut self, status: SessionStatus) {
        if status == SessionStatus::Disconnected {
            self.session.base_address.clear();
            self.session.credential.clear();
            self.session.connected_at = None;
        }

        tracing::info!(
            "Session {} -> {}{}",
            self.session.status,
            status,
            if self.session.base_address.is_empty() {
                String::new()
            } else {
                format!(" ({})", self.session.base_address)
            }
        );
        metrics::SESSION_TRANSITIONS_TOTAL
            .with_label_values(&[status.as_str()])
            .inc();
        self.session.status = status;
    }
}

/// Accept `http(s)://host[:port]`, dropping any trailing separator
fn validate_manual_address(raw: &str) -> Result<String, ConnectionError> {
    let address = normalize_base_address(raw);
    let url = url::Url::parse(&address)
        .map_err(|_| ConnectionError::InvalidAddress(raw.trim().to_string()))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ConnectionError::InvalidAddress(raw.trim().to_string()));
    }
    Ok(address)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::descriptor::{ServerDescriptor, ServerIdentity};
    use crate::mcp::protocol::{McpRequest, McpResponse};
    use crate::mcp::transport::{RpcReply, TransportError};
    use crate::session::credentials::{MemoryStore, ADDRESS_KEY, CREDENTIAL_KEY};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn descriptor(base: &str) -> ServerDescriptor {
        ServerDescriptor {
            base_address: base.to_string(),
            reported_url: base.to_string(),
            rpc_path: "/mcp".to_string(),
            auth_required: true,
            auth_scheme: "bearer".to_string(),
            identity: ServerIdentity {
                name: "OpsCenterMCP".to_string(),
                version: "1.0.0".to_string(),
                description: String::new(),
            },
        }
    }

    struct FixedDiscovery(Option<ServerDescriptor>);

    impl Discover for FixedDiscovery {
        async fn discover(&self) -> Option<ServerDescriptor> {
            self.0.clone()
        }
    }

    /// Never finishes within any reasonable ceiling
    struct StalledDiscovery;

    impl Discover for StalledDiscovery {
        async fn discover(&self) -> Option<ServerDescriptor> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Some(descriptor("http://too-late:8000"))
        }
    }

    /// Accepts handshakes only for the listed (address, credential) pairs
    #[derive(Clone, Default)]
    struct GateTransport {
        accepted: Arc<Mutex<Vec<(String, String)>>>,
        attempts: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl GateTransport {
        fn accept(&self, address: &str, credential: &str) {
            self.accepted
                .lock()
                .unwrap()
                .push((address.to_string(), credential.to_string()));
        }

        fn attempts(&self) -> Vec<(String, String)> {
            self.attempts.lock().unwrap().clone()
        }
    }

    impl Transport for GateTransport {
        async fn send(
            &self,
            target: &RpcTarget,
            request: &McpRequest,
        ) -> Result<RpcReply, TransportError> {
            let pair = (target.base_address.clone(), target.credential.clone());
            self.attempts.lock().unwrap().push(pair.clone());
            if !self.accepted.lock().unwrap().contains(&pair) {
                return Err(TransportError::Unauthorized);
            }
            Ok(RpcReply::new(McpResponse::ok(
                request.id,
                json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": {},
                    "serverInfo": {"name": "OpsCenterMCP", "version": "1.0.0"}
                }),
            )))
        }
    }

    fn local_page() -> PageContext {
        PageContext::parse("http://localhost:3000").unwrap()
    }

    #[tokio::test]
    async fn test_establish_with_discovered_server() {
        let transport = GateTransport::default();
        transport.accept("http://localhost:8000", "dev-token");
        let store = MemoryStore::new();

        let mut manager = SessionManager::new(
            FixedDiscovery(Some(descriptor("http://localhost:8000"))),
            transport,
            store.clone(),
            local_page(),
        );
        assert_eq!(manager.session().status, SessionStatus::Uninitialized);

        let session = manager.establish().await;
        assert_eq!(session.status, SessionStatus::Connected);
        assert_eq!(session.base_address, "http://localhost:8000");
        assert!(session.connected_at.is_some());
        assert!(manager.client().is_some());
        assert_eq!(
            store.saved_session().unwrap(),
            Some(("http://localhost:8000".to_string(), "dev-token".to_string()))
        );
    }

    #[tokio::test]
    async fn test_nothing_found_and_nothing_saved() {
        let transport = GateTransport::default();
        let mut manager = SessionManager::new(
            FixedDiscovery(None),
            transport.clone(),
            MemoryStore::new(),
            local_page(),
        );

        let session = manager.establish().await;
        assert_eq!(session.status, SessionStatus::Disconnected);
        assert!(session.base_address.is_empty());
        assert!(manager.client().is_none());
        assert!(transport.attempts().is_empty());
    }

    #[tokio::test]
    async fn test_reconnects_with_saved_pair_when_discovery_fails() {
        let transport = GateTransport::default();
        transport.accept("http://localhost:8000", "dev-token");
        let store = MemoryStore::new();

        let mut first = SessionManager::new(
            FixedDiscovery(Some(descriptor("http://localhost:8000"))),
            transport.clone(),
            store.clone(),
            local_page(),
        );
        assert!(first.establish().await.is_connected());

        let mut second =
            SessionManager::new(FixedDiscovery(None), transport, store, local_page());
        let session = second.establish().await;
        assert_eq!(session.status, SessionStatus::Connected);
        assert_eq!(session.base_address, "http://localhost:8000");
    }

    #[tokio::test(start_paused = true)]
    async fn test_discovery_ceiling_falls_back_to_saved_pair() {
        let transport = GateTransport::default();
        transport.accept("https://ops.example.com", "saved-token");
        let store = MemoryStore::new();
        store.save_session("https://ops.example.com", "saved-token").unwrap();

        let mut manager = SessionManager::new(StalledDiscovery, transport, store, local_page());
        let started = tokio::time::Instant::now();
        let session = manager.establish().await;

        assert_eq!(started.elapsed(), DEFAULT_DISCOVERY_CEILING);
        assert_eq!(session.base_address, "https://ops.example.com");
        assert!(session.is_connected());
    }

    #[tokio::test]
    async fn test_rejected_discovered_server_falls_back() {
        let transport = GateTransport::default();
        transport.accept("https://saved.example.com", "saved-token");
        let store = MemoryStore::new();
        store.set(ADDRESS_KEY, "https://saved.example.com").unwrap();
        store.set(CREDENTIAL_KEY, "saved-token").unwrap();

        let mut manager = SessionManager::new(
            FixedDiscovery(Some(descriptor("http://localhost:8000"))),
            transport.clone(),
            store,
            local_page(),
        );
        let session = manager.establish().await;

        assert!(session.is_connected());
        assert_eq!(session.base_address, "https://saved.example.com");
        assert_eq!(
            transport.attempts(),
            vec![
                ("http://localhost:8000".to_string(), "saved-token".to_string()),
                ("https://saved.example.com".to_string(), "saved-token".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_no_credential_on_production_page_skips_handshake() {
        let transport = GateTransport::default();
        let mut manager = SessionManager::new(
            FixedDiscovery(Some(descriptor("https://ops-api.example.com"))),
            transport.clone(),
            MemoryStore::new(),
            PageContext::parse("https://ops-ui.example.com").unwrap(),
        );

        assert_eq!(manager.establish().await.status, SessionStatus::Disconnected);
        assert!(transport.attempts().is_empty());
    }

    #[tokio::test]
    async fn test_manual_connect_surfaces_failure() {
        let transport = GateTransport::default();
        let mut manager = SessionManager::new(
            FixedDiscovery(None),
            transport,
            MemoryStore::new(),
            local_page(),
        );

        let err = manager
            .connect_manual("https://ops.example.com/", "wrong")
            .await
            .unwrap_err();
        assert_eq!(err, ConnectionError::AuthenticationFailure);
        assert_eq!(manager.session().status, SessionStatus::Disconnected);

        let err = manager.connect_manual("ops.example.com", "x").await.unwrap_err();
        assert_eq!(err.category(), "invalid_address");
    }

    #[tokio::test]
    async fn test_manual_connect_then_disconnect_clears_store() {
        let transport = GateTransport::default();
        transport.accept("https://ops.example.com", "secret");
        let store = MemoryStore::new();
        let mut manager = SessionManager::new(
            FixedDiscovery(None),
            transport,
            store.clone(),
            local_page(),
        );

        let session = manager
            .connect_manual(" https://ops.example.com/ ", "secret")
            .await
            .unwrap();
        assert_eq!(session.base_address, "https://ops.example.com");
        assert!(store.saved_session().unwrap().is_some());

        manager.disconnect();
        assert_eq!(manager.session().status, SessionStatus::Disconnected);
        assert!(manager.client().is_none());
        assert_eq!(store.saved_session().unwrap(), None);
    }

    #[test]
    fn test_session_serialization_hides_credential() {
        let mut session = Session::new();
        session.credential = "secret".to_string();
        let value = serde_json::to_value(&session).unwrap();
        assert!(value.get("credential").is_none());
        assert_eq!(value["status"], "Uninitialized");
    }
}
