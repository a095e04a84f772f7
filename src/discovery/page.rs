//! Page location context
//!
//! The address the client is being served from. Candidate generation and
//! credential resolution take it as an explicit value instead of reading any
//! global location state.

use url::Url;

/// Loopback host spellings treated as local development
pub const LOOPBACK_HOSTS: [&str; 2] = ["localhost", "127.0.0.1"];

/// Hosted-platform domains whose services follow `<name>.<platform>` naming
pub const HOSTED_PLATFORM_SUFFIXES: [&str; 1] = [".onrender.com"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PageContextError {
    #[error("Invalid page address: {0}")]
    Invalid(#[from] url::ParseError),

    #[error("Unsupported page scheme '{0}' (expected http or https)")]
    UnsupportedScheme(String),

    #[error("Page address has no host")]
    MissingHost,
}

/// Scheme, host and port of the current page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContext {
    scheme: String,
    hostname: String,
    port: Option<u16>,
}

impl PageContext {
    /// Build a context from parts; `port` is omitted when it is the scheme default
    pub fn new(scheme: impl Into<String>, hostname: impl Into<String>, port: Option<u16>) -> Self {
        let scheme = scheme.into().to_ascii_lowercase();
        let port = port.filter(|p| Some(*p) != default_port(&scheme));
        Self {
            hostname: hostname.into().to_ascii_lowercase(),
            scheme,
            port,
        }
    }

    /// Parse a full page address such as `https://ops-client.onrender.com/tenants`
    pub fn parse(page_url: &str) -> Result<Self, PageContextError> {
        let url = Url::parse(page_url.trim())?;
        let scheme = url.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(PageContextError::UnsupportedScheme(scheme.to_string()));
        }
        let host = url.host_str().ok_or(PageContextError::MissingHost)?;
        Ok(Self::new(scheme, host, url.port()))
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// `scheme://host[:port]`, no trailing separator
    pub fn origin(&self) -> String {
        format!("{}://{}{}", self.scheme, self.hostname, self.port_suffix())
    }

    /// `:port` when a non-default port is in use, otherwise empty
    pub fn port_suffix(&self) -> String {
        self.port.map(|p| format!(":{p}")).unwrap_or_default()
    }

    pub fn is_loopback(&self) -> bool {
        LOOPBACK_HOSTS.contains(&self.hostname.as_str())
    }

    /// The hosted-platform suffix this hostname ends with, if any
    pub fn hosted_platform_suffix(&self) -> Option<&'static str> {
        HOSTED_PLATFORM_SUFFIXES
            .iter()
            .copied()
            .find(|suffix| self.hostname.ends_with(suffix))
    }

    /// Loopback or a known hosted platform
    pub fn is_development(&self) -> bool {
        self.is_loopback() || self.hosted_platform_suffix().is_some()
    }
}

fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "http" => Some(80),
        "https" => Some(443),
        _ => None,
    }
}
