//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! backend URL, request timeout, where the session credential is kept, the
//! default toast duration, and the last used username.
//!
//! Configuration is stored at `~/.config/mailroom/config.json`. Selected
//! fields can be overridden from the environment (`.env` is honored by the
//! binary).

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::client::{DEFAULT_API_BASE_URL, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::auth::{CredentialStore, EncryptedFileStore, KeyringStore, MemoryStore};
use crate::notify::DEFAULT_TTL;

/// Application name used for config/cache directory paths
pub const APP_NAME: &str = "mailroom";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const ENV_API_URL: &str = "MAILROOM_API_URL";
pub const ENV_CREDENTIAL_BACKEND: &str = "MAILROOM_CREDENTIAL_BACKEND";
pub const ENV_USERNAME: &str = "MAILROOM_USERNAME";
pub const ENV_PASSWORD: &str = "MAILROOM_PASSWORD";

/// Where the session credential is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialBackend {
    /// OS keychain
    #[default]
    Keyring,
    /// Encrypted file in the cache directory
    File,
    /// Not persisted; every launch starts logged out
    Memory,
}

impl FromStr for CredentialBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "keyring" | "keychain" => Ok(CredentialBackend::Keyring),
            "file" => Ok(CredentialBackend::File),
            "memory" | "none" => Ok(CredentialBackend::Memory),
            other => Err(anyhow::anyhow!("Unknown credential backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub credential_backend: CredentialBackend,
    pub notification_ttl_ms: u64,
    pub last_username: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            credential_backend: CredentialBackend::default(),
            notification_ttl_ms: DEFAULT_TTL.as_millis() as u64,
            last_username: None,
        }
    }
}

impl Config {
    /// Load from the default location, falling back to defaults when the file
    /// is missing, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::default_path()?)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply overrides looked up through `var` (the process environment in
    /// production). Invalid values are ignored with a warning.
    pub fn apply_overrides<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = var(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            self.api_base_url = url;
        }
        if let Some(raw) = var(ENV_CREDENTIAL_BACKEND) {
            match raw.parse() {
                Ok(backend) => self.credential_backend = backend,
                Err(e) => warn!(error = %e, "Ignoring {}", ENV_CREDENTIAL_BACKEND),
            }
        }
    }

    /// `~/.config/mailroom/config.json` on Linux; platform equivalent elsewhere.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn notification_ttl(&self) -> Duration {
        if self.notification_ttl_ms == 0 {
            DEFAULT_TTL
        } else {
            Duration::from_millis(self.notification_ttl_ms)
        }
    }

    /// Build the credential store this configuration selects.
    pub fn credential_store(&self, cache_dir: &Path) -> Arc<dyn CredentialStore> {
        match self.credential_backend {
            CredentialBackend::Keyring => Arc::new(KeyringStore::new()),
            CredentialBackend::File => Arc::new(EncryptedFileStore::in_cache_dir(cache_dir)),
            CredentialBackend::Memory => Arc::new(MemoryStore::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"api_base_url": "https://mail.example.com/api"}"#).unwrap();
        assert_eq!(config.api_base_url, "https://mail.example.com/api");
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
        assert_eq!(config.credential_backend, CredentialBackend::Keyring);
        assert_eq!(config.notification_ttl(), DEFAULT_TTL);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);

        let config = Config {
            credential_backend: CredentialBackend::File,
            last_username: Some("alice".to_string()),
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_API_URL, "http://10.0.0.5:8000/api"),
            (ENV_CREDENTIAL_BACKEND, "memory"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.api_base_url, "http://10.0.0.5:8000/api");
        assert_eq!(config.credential_backend, CredentialBackend::Memory);
    }

    #[test]
    fn test_invalid_backend_override_is_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|key| {
            (key == ENV_CREDENTIAL_BACKEND).then(|| "floppy".to_string())
        });
        assert_eq!(config.credential_backend, CredentialBackend::Keyring);
    }

    #[test]
    fn test_credential_backend_parsing() {
        assert_eq!("Keyring".parse::<CredentialBackend>().unwrap(), CredentialBackend::Keyring);
        assert_eq!(" file ".parse::<CredentialBackend>().unwrap(), CredentialBackend::File);
        assert_eq!("none".parse::<CredentialBackend>().unwrap(), CredentialBackend::Memory);
        assert!("".parse::<CredentialBackend>().is_err());
    }

    #[test]
    fn test_zero_durations_are_clamped() {
        let config = Config {
            request_timeout_secs: 0,
            notification_ttl_ms: 0,
            ..Config::default()
        };
        assert_eq!(config.request_timeout(), Duration::from_secs(1));
        assert_eq!(config.notification_ttl(), DEFAULT_TTL);
    }

    #[test]
    fn test_memory_backend_builds_empty_store() {
        let config = Config {
            credential_backend: CredentialBackend::Memory,
            ..Config::default()
        };
        let store = config.credential_store(Path::new("/nonexistent"));
        assert!(store.load().unwrap().is_none());
    }
}
