//! Remote sync configuration shared by the CLI and embedding apps.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::util::{is_http_url, normalize_text_option};
use crate::{Error, Result};

pub const ENV_REMOTE_URL: &str = "AGROGEST_REMOTE_URL";
pub const ENV_REMOTE_TOKEN: &str = "AGROGEST_REMOTE_TOKEN";
pub const ENV_SYNC_INTERVAL_SECS: &str = "AGROGEST_SYNC_INTERVAL_SECS";

const DEFAULT_SYNC_INTERVAL_SECS: u64 = 300;
const DEFAULT_PROBE_INTERVAL_SECS: u64 = 30;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// How to reach the remote backend and how often to sync with it.
///
/// Without a remote URL the app runs local-only.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub remote_url: Option<String>,
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default = "default_sync_interval")]
    pub sync_interval_secs: u64,
    #[serde(default = "default_probe_interval")]
    pub probe_interval_secs: u64,
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
}

impl std::fmt::Debug for SyncConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SyncConfig")
            .field("remote_url", &self.remote_url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("sync_interval_secs", &self.sync_interval_secs)
            .field("probe_interval_secs", &self.probe_interval_secs)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .finish()
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote_url: None,
            auth_token: None,
            sync_interval_secs: DEFAULT_SYNC_INTERVAL_SECS,
            probe_interval_secs: DEFAULT_PROBE_INTERVAL_SECS,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

impl SyncConfig {
    /// Config pointing at a remote backend
    pub fn new(remote_url: impl Into<String>) -> Result<Self> {
        Self::default().with_remote_url(remote_url)
    }

    /// Read `AGROGEST_*` variables; unset ones keep their defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env`] over an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(url) = normalize_text_option(lookup(ENV_REMOTE_URL)) {
            config = config.with_remote_url(url)?;
        }
        config.auth_token = normalize_text_option(lookup(ENV_REMOTE_TOKEN));
        if let Some(raw) = normalize_text_option(lookup(ENV_SYNC_INTERVAL_SECS)) {
            let secs = raw.parse::<u64>().map_err(|_| {
                Error::InvalidInput(format!(
                    "{ENV_SYNC_INTERVAL_SECS} must be a whole number of seconds"
                ))
            })?;
            config = config.with_sync_interval(Duration::from_secs(secs))?;
        }
        Ok(config)
    }

    pub fn with_remote_url(mut self, remote_url: impl Into<String>) -> Result<Self> {
        self.remote_url = Some(normalize_remote_url(remote_url.into())?);
        Ok(self)
    }

    #[must_use]
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = normalize_text_option(Some(token.into()));
        self
    }

    pub fn with_sync_interval(mut self, interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(Error::InvalidInput("sync interval must be positive".into()));
        }
        self.sync_interval_secs = interval.as_secs().max(1);
        Ok(self)
    }

    /// Whether a remote backend is configured
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.remote_url.is_some()
    }

    #[must_use]
    pub const fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    #[must_use]
    pub const fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }

    #[must_use]
    pub const fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

/// Trim a remote base URL, require an http(s) scheme and drop trailing slashes.
pub fn normalize_remote_url(raw: String) -> Result<String> {
    let url = normalize_text_option(Some(raw))
        .ok_or_else(|| Error::InvalidInput("remote URL must not be empty".to_string()))?;
    if is_http_url(&url) {
        Ok(url.trim_end_matches('/').to_string())
    } else {
        Err(Error::InvalidInput(
            "remote URL must include http:// or https://".to_string(),
        ))
    }
}

const fn default_sync_interval() -> u64 {
    DEFAULT_SYNC_INTERVAL_SECS
}

const fn default_probe_interval() -> u64 {
    DEFAULT_PROBE_INTERVAL_SECS
}

const fn default_http_timeout() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}
