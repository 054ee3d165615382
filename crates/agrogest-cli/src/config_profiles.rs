//! Persistent CLI profile configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use agrogest_core::config::{
    normalize_remote_url, SyncConfig, ENV_REMOTE_TOKEN, ENV_REMOTE_URL, ENV_SYNC_INTERVAL_SECS,
};
use agrogest_core::util::normalize_text_option;
use serde::{Deserialize, Serialize};

use crate::error::CliError;

const CONFIG_FILE_NAME: &str = "cli-config.json";
const ENV_PROFILE: &str = "AGROGEST_PROFILE";
const DEFAULT_PROFILE: &str = "default";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliProfilesConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub active_profile: Option<String>,
    #[serde(default)]
    pub profiles: BTreeMap<String, CliProfile>,
}

#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliProfile {
    #[serde(default)]
    pub remote_url: Option<String>,
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default)]
    pub sync_interval_secs: Option<u64>,
}

impl std::fmt::Debug for CliProfile {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("CliProfile")
            .field("remote_url", &self.remote_url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("sync_interval_secs", &self.sync_interval_secs)
            .finish()
    }
}

const fn default_config_version() -> u32 {
    1
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("agrogest")
        .join(CONFIG_FILE_NAME)
}

pub fn normalize_profile_name(value: Option<&str>) -> Option<String> {
    normalize_text_option(value.map(str::to_string))
}

impl CliProfilesConfig {
    pub fn load() -> Result<Self, CliError> {
        Self::load_from_path(&default_config_path())
    }

    pub fn load_from_path(path: &Path) -> Result<Self, CliError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|error| {
            CliError::Config(format!("Failed to read config at {}: {error}", path.display()))
        })?;
        let mut config = serde_json::from_str::<Self>(&raw).map_err(|error| {
            CliError::Config(format!("Failed to parse config at {}: {error}", path.display()))
        })?;
        config.normalize();
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf, CliError> {
        let path = default_config_path();
        self.save_to_path(&path)?;
        Ok(path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), CliError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        std::fs::write(path, serde_json::to_string_pretty(&normalized)?)?;
        Ok(())
    }

    /// Explicit flag, then `AGROGEST_PROFILE`, then the active profile.
    pub fn resolve_profile_name(&self, explicit: Option<&str>) -> String {
        self.resolve_profile_name_with(explicit, std::env::var(ENV_PROFILE).ok())
    }

    fn resolve_profile_name_with(&self, explicit: Option<&str>, env: Option<String>) -> String {
        normalize_profile_name(explicit)
            .or_else(|| normalize_profile_name(env.as_deref()))
            .or_else(|| normalize_profile_name(self.active_profile.as_deref()))
            .unwrap_or_else(|| DEFAULT_PROFILE.to_string())
    }

    pub fn profile(&self, name: &str) -> Option<&CliProfile> {
        self.profiles.get(name)
    }

    pub fn upsert_profile(&mut self, name: String, profile: CliProfile, activate: bool) {
        if activate || self.active_profile.is_none() {
            self.active_profile = Some(name.clone());
        }
        self.profiles.insert(name, profile);
    }

    fn normalize(&mut self) {
        if self.version == 0 {
            self.version = default_config_version();
        }
        self.active_profile = normalize_profile_name(self.active_profile.as_deref());
        for profile in self.profiles.values_mut() {
            profile.normalize();
        }
    }
}

impl CliProfile {
    pub fn validate(&self) -> Result<(), CliError> {
        if let Some(url) = &self.remote_url {
            normalize_remote_url(url.clone())?;
        }
        if self.sync_interval_secs == Some(0) {
            return Err(CliError::Config("sync interval must be positive".into()));
        }
        Ok(())
    }

    /// Value this profile supplies for one of the `AGROGEST_*` variables
    fn value_for(&self, key: &str) -> Option<String> {
        match key {
            ENV_REMOTE_URL => self.remote_url.clone(),
            ENV_REMOTE_TOKEN => self.auth_token.clone(),
            ENV_SYNC_INTERVAL_SECS => self.sync_interval_secs.map(|secs| secs.to_string()),
            _ => None,
        }
    }

    fn normalize(&mut self) {
        self.remote_url = normalize_text_option(self.remote_url.take())
            .map(|url| url.trim_end_matches('/').to_string());
        self.auth_token = normalize_text_option(self.auth_token.take());
    }
}

/// Sync settings with environment variables taking precedence over `profile`.
pub fn resolve_sync_config(
    profile: Option<&CliProfile>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<SyncConfig, CliError> {
    let lookup = |key: &str| {
        normalize_text_option(env(key))
            .or_else(|| profile.and_then(|profile| profile.value_for(key)))
    };
    Ok(SyncConfig::from_lookup(lookup)?)
}
