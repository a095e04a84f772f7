// Credential storage and resolution
//
// The persisted state is two string entries: the last server address that
// completed a handshake and the bearer credential used for it. Only the
// session manager writes them; everything else reads through
// `resolve_credential`.

use crate::discovery::page::PageContext;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Key holding the last connected base address
pub const ADDRESS_KEY: &str = "mcp_server_url";

/// Key holding the last working bearer credential
pub const CREDENTIAL_KEY: &str = "mcp_bearer_token";

/// Publicly documented token accepted by development deployments
pub const DEFAULT_DEV_TOKEN: &str = "dev-token";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Credential store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Credential store is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Credential store lock poisoned")]
    Poisoned,
}

/// Simple string key-value persistence
pub trait CredentialStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Saved `(address, credential)`; absence of either entry means no session
    fn saved_session(&self) -> Result<Option<(String, String)>, StoreError> {
        let address = self.get(ADDRESS_KEY)?.filter(|a| !a.is_empty());
        let credential = self.get(CREDENTIAL_KEY)?.filter(|c| !c.is_empty());
        Ok(address.zip(credential))
    }

    fn save_session(&self, address: &str, credential: &str) -> Result<(), StoreError> {
        self.set(ADDRESS_KEY, address)?;
        self.set(CREDENTIAL_KEY, credential)
    }

    fn clear_session(&self) -> Result<(), StoreError> {
        self.remove(ADDRESS_KEY)?;
        self.remove(CREDENTIAL_KEY)
    }
}

/// In-memory store; clones share the same entries
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

/// JSON object on disk, rewritten whole on every change
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<data dir>/session.json` for this user
    pub fn default_path() -> PathBuf {
        if let Some(proj_dirs) = directories::ProjectDirs::from("com", "opscenter", "OpsCenter") {
            proj_dirs.data_dir().join("session.json")
        } else {
            PathBuf::from(".opscenter-session.json")
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<HashMap<String, String>, StoreError> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(HashMap::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn write(&self, entries: &HashMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let staging = self.path.with_extension("json.tmp");
        // A leftover staging file would keep its old mode
        if let Err(e) = fs::remove_file(&staging) {
            if e.kind() != std::io::ErrorKind::NotFound {
                return Err(e.into());
            }
        }

        let mut options = fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            // Holds a bearer token: owner read/write only
            options.mode(0o600);
        }
        let mut file = options.open(&staging)?;
        file.write_all(serde_json::to_string_pretty(entries)?.as_bytes())?;
        file.sync_all()?;
        drop(file);

        fs::rename(&staging, &self.path)?;
        Ok(())
    }
}

impl CredentialStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.load()?;
        entries.insert(key.to_string(), value.to_string());
        self.write(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.load()?;
        if entries.remove(key).is_some() {
            self.write(&entries)?;
        }
        Ok(())
    }
}

/// Pick the bearer credential to try
///
/// 1. a persisted credential wins unconditionally
/// 2. development pages (loopback or hosted platform) get `dev_token`
/// 3. otherwise empty: the user has to supply one
///
/// Never fails; an unreadable store counts as empty.
pub fn resolve_credential<S: CredentialStore + ?Sized>(
    page: &PageContext,
    store: &S,
    dev_token: &str,
) -> String {
    match store.get(CREDENTIAL_KEY) {
        Ok(Some(saved)) if !saved.is_empty() => {
            tracing::debug!("Using persisted credential");
            return saved;
        }
        Ok(_) => {}
        Err(e) => tracing::warn!("Ignoring unreadable credential store: {}", e),
    }

    if page.is_development() {
        tracing::debug!("Using development credential for {}", page.hostname());
        dev_token.to_string()
    } else {
        String::new()
    }
}
