// Configuration File Support
//
// TOML configuration for the OpsCenter client with environment variable
// overrides. Files are loaded from the XDG config directory:
// ~/.config/opscenter/config.toml

use crate::diagnostics::DEFAULT_ORIGIN;
use crate::discovery::DISCOVERY_PATHS;
use crate::mcp::retry::RetryConfig;
use crate::session::credentials::{FileStore, DEFAULT_DEV_TOKEN};
use crate::session::manager::SessionOptions;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Discovery timing and batching
    pub discovery: DiscoveryConfig,

    /// Protocol transport and retry
    pub transport: TransportConfig,

    /// Credential persistence
    pub credentials: CredentialsConfig,

    /// Optional fixed server for manual connects
    pub server: ServerConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Candidates probed concurrently per batch
    pub batch_size: usize,

    /// Bound on the root reachability check
    pub reachability_timeout_ms: u64,

    /// Bound on each discovery path request
    pub descriptor_timeout_ms: u64,

    /// Bound on a whole discovery run
    pub overall_timeout_ms: u64,

    /// Ceiling the session manager races discovery against
    pub session_ceiling_ms: u64,

    /// Origin presented by diagnostics and the transport
    pub origin: String,
}

impl DiscoveryConfig {
    /// Worst case for one probe, and so for one batch: reachability plus
    /// every discovery path hitting its own bound
    pub fn batch_bound_ms(&self) -> u64 {
        self.reachability_timeout_ms
            .saturating_add((DISCOVERY_PATHS.len() as u64).saturating_mul(self.descriptor_timeout_ms))
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            batch_size: 3,
            reachability_timeout_ms: 3000,
            descriptor_timeout_ms: 2000,
            overall_timeout_ms: 30000,
            session_ceiling_ms: 10000,
            origin: DEFAULT_ORIGIN.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TransportConfig {
    /// Per-request bound
    pub timeout_ms: u64,

    /// Total attempts for transient failures
    pub max_attempts: usize,

    /// Delay before retry n is n × backoff_ms
    pub backoff_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10000,
            max_attempts: 3,
            backoff_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Session file; defaults to `<data dir>/session.json`
    pub store_path: Option<String>,

    /// Token tried on development pages
    pub dev_token: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            store_path: None,
            dev_token: DEFAULT_DEV_TOKEN.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ServerConfig {
    pub base_address: Option<String>,
    pub token: Option<String>,
}

impl Config {
    /// Load configuration from the default XDG config directory
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    /// If the config file does not exist, returns default configuration.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed or
    /// fails validation.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file from {:?}", path))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file from {:?}", path))?;
            tracing::info!("Loaded configuration from {:?}", path);
            config
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            Self::default()
        };

        let config = config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path
    ///
    /// Returns `~/.config/opscenter/config.toml` on Linux
    pub fn config_path() -> PathBuf {
        if let Some(proj_dirs) = directories::ProjectDirs::from("com", "opscenter", "OpsCenter") {
            proj_dirs.config_dir().join("config.toml")
        } else {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home)
                .join(".config")
                .join("opscenter")
                .join("config.toml")
        }
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Environment variables take precedence over config file values:
    /// - OPSCENTER_LOG_LEVEL
    /// - OPSCENTER_LOG_FORMAT
    /// - OPSCENTER_SERVER_URL
    /// - OPSCENTER_BEARER_TOKEN
    /// - OPSCENTER_TRANSPORT_TIMEOUT_MS
    /// - OPSCENTER_DISCOVERY_BATCH_SIZE
    fn apply_env_overrides(mut self) -> Self {
        if let Ok(level) = std::env::var("OPSCENTER_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("OPSCENTER_LOG_FORMAT") {
            self.logging.format = format;
        }

        if let Ok(url) = std::env::var("OPSCENTER_SERVER_URL") {
            if !url.trim().is_empty() {
                self.server.base_address = Some(url);
            }
        }
        if let Ok(token) = std::env::var("OPSCENTER_BEARER_TOKEN") {
            self.server.token = Some(token);
        }

        if let Ok(timeout) = std::env::var("OPSCENTER_TRANSPORT_TIMEOUT_MS") {
            if let Ok(timeout) = timeout.parse::<u64>() {
                if timeout > 0 {
                    self.transport.timeout_ms = timeout;
                }
            }
        }
        if let Ok(size) = std::env::var("OPSCENTER_DISCOVERY_BATCH_SIZE") {
            if let Ok(size) = size.parse::<usize>() {
                if size > 0 && size <= 32 {
                    self.discovery.batch_size = size;
                }
            }
        }

        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                self.logging.level
            ),
        }

        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" | "compact" => {}
            _ => anyhow::bail!(
                "Invalid log format: {}. Must be one of: json, pretty, compact",
                self.logging.format
            ),
        }

        let discovery = &self.discovery;
        if discovery.batch_size == 0 {
            anyhow::bail!("Discovery batch size must be > 0");
        }
        if discovery.reachability_timeout_ms == 0
            || discovery.descriptor_timeout_ms == 0
            || discovery.overall_timeout_ms == 0
            || discovery.session_ceiling_ms == 0
        {
            anyhow::bail!("Discovery timeouts must be > 0");
        }
        let batch_bound = discovery.batch_bound_ms();
        if discovery.overall_timeout_ms <= batch_bound {
            anyhow::bail!(
                "Discovery overall timeout ({}ms) must exceed one batch of probes ({}ms)",
                discovery.overall_timeout_ms,
                batch_bound
            );
        }
        if discovery.session_ceiling_ms <= batch_bound {
            anyhow::bail!(
                "Session discovery ceiling ({}ms) must exceed one batch of probes ({}ms)",
                discovery.session_ceiling_ms,
                batch_bound
            );
        }

        if self.transport.timeout_ms == 0 {
            anyhow::bail!("Transport timeout must be > 0");
        }
        if self.transport.max_attempts == 0 {
            anyhow::bail!("Transport max attempts must be > 0");
        }

        Ok(())
    }

    /// Convert log level string to tracing::Level
    pub fn log_level(&self) -> Result<tracing::Level> {
        self.logging
            .level
            .to_lowercase()
            .parse()
            .map_err(|e| anyhow::anyhow!("Failed to parse log level: {}", e))
    }

    pub fn retry(&self) -> RetryConfig {
        RetryConfig::default()
            .max_attempts(self.transport.max_attempts)
            .backoff(Duration::from_millis(self.transport.backoff_ms))
    }

    pub fn transport_timeout(&self) -> Duration {
        Duration::from_millis(self.transport.timeout_ms)
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            discovery_ceiling: Duration::from_millis(self.discovery.session_ceiling_ms),
            dev_token: self.credentials.dev_token.clone(),
            retry: self.retry(),
        }
    }

    pub fn credential_store(&self) -> FileStore {
        match &self.credentials.store_path {
            Some(path) => FileStore::new(path),
            None => FileStore::new(FileStore::default_path()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Environment overrides are process-wide; tests that read them take this lock
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ENV_VARS: [&str; 6] = [
        "OPSCENTER_LOG_LEVEL",
        "OPSCENTER_LOG_FORMAT",
        "OPSCENTER_SERVER_URL",
        "OPSCENTER_BEARER_TOKEN",
        "OPSCENTER_TRANSPORT_TIMEOUT_MS",
        "OPSCENTER_DISCOVERY_BATCH_SIZE",
    ];

    fn clear_env() {
        for var in ENV_VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "compact");
        assert_eq!(config.discovery.batch_size, 3);
        assert_eq!(config.discovery.session_ceiling_ms, 10000);
        assert_eq!(config.transport.max_attempts, 3);
        assert_eq!(config.credentials.dev_token, "dev-token");
        assert!(config.server.base_address.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_invalid_batch_size() {
        let mut config = Config::default();
        config.discovery.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_overall_timeout_too_short() {
        let mut config = Config::default();
        config.discovery.overall_timeout_ms = 6000;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("must exceed"));
    }

    #[test]
    fn test_config_validation_counts_every_discovery_path() {
        let mut config = Config::default();
        config.discovery.reachability_timeout_ms = 200;
        config.discovery.descriptor_timeout_ms = 200;
        config.discovery.overall_timeout_ms = 500;
        assert_eq!(config.discovery.batch_bound_ms(), 800);
        assert!(config.validate().is_err());

        config.discovery.overall_timeout_ms = 801;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_ceiling_covers_first_batch() {
        let mut config = Config::default();
        assert!(config.discovery.batch_bound_ms() < config.discovery.session_ceiling_ms);

        config.discovery.descriptor_timeout_ms = 3000;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ceiling"));
    }

    #[test]
    fn test_config_validation_zero_attempts() {
        let mut config = Config::default();
        config.transport.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_nonexistent_file() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();

        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().with_extension("nonexistent");
        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_valid_toml_config() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();

        let temp_file = NamedTempFile::new().unwrap();
        let toml_content = r#"
[logging]
level = "debug"
format = "json"

[discovery]
batch_size = 5
overall_timeout_ms = 20000

[transport]
timeout_ms = 4000
backoff_ms = 250

[credentials]
store_path = "/tmp/opscenter/session.json"

[server]
base_address = "https://ops.example.com"
"#;
        fs::write(temp_file.path(), toml_content).unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.discovery.batch_size, 5);
        assert_eq!(config.discovery.reachability_timeout_ms, 3000);
        assert_eq!(config.transport_timeout(), Duration::from_secs(4));
        assert_eq!(config.retry().backoff, Duration::from_millis(250));
        assert_eq!(
            config.credential_store().path(),
            Path::new("/tmp/opscenter/session.json")
        );
        assert_eq!(
            config.server.base_address.as_deref(),
            Some("https://ops.example.com")
        );
    }

    #[test]
    fn test_load_invalid_toml_config() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "[logging\nlevel = \"debug\"\n").unwrap();

        assert!(Config::load_from_path(temp_file.path()).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();

        std::env::set_var("OPSCENTER_LOG_LEVEL", "debug");
        std::env::set_var("OPSCENTER_LOG_FORMAT", "json");
        std::env::set_var("OPSCENTER_SERVER_URL", "http://localhost:8000");
        std::env::set_var("OPSCENTER_BEARER_TOKEN", "env-token");
        std::env::set_var("OPSCENTER_TRANSPORT_TIMEOUT_MS", "2500");
        std::env::set_var("OPSCENTER_DISCOVERY_BATCH_SIZE", "6");

        let config = Config::default().apply_env_overrides();
        clear_env();

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.server.base_address.as_deref(), Some("http://localhost:8000"));
        assert_eq!(config.server.token.as_deref(), Some("env-token"));
        assert_eq!(config.transport.timeout_ms, 2500);
        assert_eq!(config.discovery.batch_size, 6);
    }

    #[test]
    fn test_env_overrides_invalid_values() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();

        std::env::set_var("OPSCENTER_TRANSPORT_TIMEOUT_MS", "0");
        std::env::set_var("OPSCENTER_DISCOVERY_BATCH_SIZE", "many");

        let config = Config::default().apply_env_overrides();
        clear_env();

        assert_eq!(config.transport.timeout_ms, 10000);
        assert_eq!(config.discovery.batch_size, 3);
    }

    #[test]
    fn test_session_options_follow_config() {
        let mut config = Config::default();
        config.discovery.session_ceiling_ms = 2000;
        config.credentials.dev_token = "local".to_string();
        config.transport.max_attempts = 5;

        let options = config.session_options();
        assert_eq!(options.discovery_ceiling, Duration::from_secs(2));
        assert_eq!(options.dev_token, "local");
        assert_eq!(options.retry.max_attempts, 5);
    }

    #[test]
    fn test_config_path() {
        let path = Config::config_path();
        assert!(path.ends_with("config.toml"));
    }

    #[test]
    fn test_log_level_parsing() {
        let mut config = Config::default();
        config.logging.level = "DEBUG".to_string();
        assert_eq!(config.log_level().unwrap(), tracing::Level::DEBUG);
    }
}
