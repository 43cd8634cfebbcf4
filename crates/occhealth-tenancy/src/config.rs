//! Tenancy configuration.
//!
//! Holds the storage keys used to persist the active selection, where that
//! storage lives and how long backend loads may take. Configuration is
//! loaded from environment variables with defaults suitable for local
//! development.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::storage::{FileStorage, MemoryStorage, SelectionStorage};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid configuration value.
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue {
        /// Configuration key.
        key: String,
        /// Error message.
        message: String,
    },
}

/// Tenant context configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenancyConfig {
    /// Storage key for the selected organization ID.
    pub organization_key: String,

    /// Storage key for the selected client ID.
    pub client_key: String,

    /// JSON file backing the selection storage. In-memory when unset.
    pub selection_file: Option<PathBuf>,

    /// Upper bound for a single backend load, in milliseconds.
    pub load_timeout_ms: u64,
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self {
            organization_key: "currentOrganizationId".to_string(),
            client_key: "currentClientId".to_string(),
            selection_file: None,
            load_timeout_ms: 10_000,
        }
    }
}

impl TenancyConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `OCCHEALTH_ORG_KEY`: storage key for the organization (default: currentOrganizationId)
    /// - `OCCHEALTH_CLIENT_KEY`: storage key for the client (default: currentClientId)
    /// - `OCCHEALTH_SELECTION_FILE`: path of the selection file (default: in-memory)
    /// - `OCCHEALTH_LOAD_TIMEOUT_MS`: backend load timeout (default: 10000)
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if a value fails [`TenancyConfig::validate`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for an unparsable timeout or a
    /// configuration that fails [`TenancyConfig::validate`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let default = Self::default();

        let load_timeout_ms = match lookup("OCCHEALTH_LOAD_TIMEOUT_MS") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "OCCHEALTH_LOAD_TIMEOUT_MS".to_string(),
                message: format!("expected milliseconds, got {raw:?}"),
            })?,
            None => default.load_timeout_ms,
        };

        let config = Self {
            organization_key: lookup("OCCHEALTH_ORG_KEY").unwrap_or(default.organization_key),
            client_key: lookup("OCCHEALTH_CLIENT_KEY").unwrap_or(default.client_key),
            selection_file: lookup("OCCHEALTH_SELECTION_FILE").map(PathBuf::from),
            load_timeout_ms,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for empty or colliding storage
    /// keys and for a zero timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.organization_key.is_empty() {
            return Err(invalid("organization_key", "must not be empty"));
        }
        if self.client_key.is_empty() {
            return Err(invalid("client_key", "must not be empty"));
        }
        if self.organization_key == self.client_key {
            return Err(invalid("client_key", "must differ from organization_key"));
        }
        if self.load_timeout_ms == 0 {
            return Err(invalid("load_timeout_ms", "must be greater than zero"));
        }
        Ok(())
    }

    /// Get the load timeout as a Duration.
    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    /// Open the selection storage this configuration describes.
    pub fn open_storage(&self) -> Arc<dyn SelectionStorage> {
        match &self.selection_file {
            Some(path) => Arc::new(FileStorage::open(path)),
            None => Arc::new(MemoryStorage::new()),
        }
    }
}

fn invalid(key: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = TenancyConfig::default();
        assert_eq!(config.organization_key, "currentOrganizationId");
        assert_eq!(config.client_key, "currentClientId");
        assert_eq!(config.load_timeout(), Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = TenancyConfig::from_lookup(lookup(&[
            ("OCCHEALTH_ORG_KEY", "org"),
            ("OCCHEALTH_CLIENT_KEY", "client"),
            ("OCCHEALTH_SELECTION_FILE", "/tmp/selection.json"),
            ("OCCHEALTH_LOAD_TIMEOUT_MS", "250"),
        ]))
        .unwrap();

        assert_eq!(config.organization_key, "org");
        assert_eq!(config.client_key, "client");
        assert_eq!(config.selection_file, Some(PathBuf::from("/tmp/selection.json")));
        assert_eq!(config.load_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_bad_timeout_is_rejected() {
        let err = TenancyConfig::from_lookup(lookup(&[("OCCHEALTH_LOAD_TIMEOUT_MS", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("OCCHEALTH_LOAD_TIMEOUT_MS"));

        assert!(TenancyConfig::from_lookup(lookup(&[("OCCHEALTH_LOAD_TIMEOUT_MS", "0")])).is_err());
    }

    #[test]
    fn test_colliding_keys_are_rejected() {
        let result = TenancyConfig::from_lookup(lookup(&[
            ("OCCHEALTH_ORG_KEY", "selection"),
            ("OCCHEALTH_CLIENT_KEY", "selection"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_open_storage_defaults_to_memory() {
        let storage = TenancyConfig::default().open_storage();
        storage.set("k", "v").unwrap();
        assert_eq!(storage.get("k").as_deref(), Some("v"));
    }
}
