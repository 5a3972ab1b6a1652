//! Runtime configuration, read from the environment (and `.env`, loaded in `main`).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::api::auth::LoginContract;
use crate::api::client::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_TIMEOUT};
use crate::api::language::Language;
use crate::api::storage::{FileStore, KeychainStore, MemoryStore, SecureStore, DEFAULT_SERVICE_NAME};

pub const DEFAULT_API_HOST: &str = "https://lccrm.uz";

pub const ENV_API_HOST: &str = "LCCRM_API_HOST";
pub const ENV_LANGUAGE: &str = "LCCRM_LANGUAGE";
pub const ENV_TOKEN_STORE: &str = "LCCRM_TOKEN_STORE";
pub const ENV_TOKEN_FILE: &str = "LCCRM_TOKEN_FILE";
pub const ENV_KEYCHAIN_SERVICE: &str = "LCCRM_KEYCHAIN_SERVICE";
pub const ENV_LOGIN_CONTRACT: &str = "LCCRM_LOGIN_CONTRACT";
pub const ENV_HTTP_TIMEOUT: &str = "LCCRM_HTTP_TIMEOUT_SECS";
pub const ENV_CONNECT_TIMEOUT: &str = "LCCRM_CONNECT_TIMEOUT_SECS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}")]
    Language(#[from] crate::api::language::UnknownLanguage),
    #[error("{0}")]
    Contract(#[from] crate::api::auth::UnknownContract),
    #[error("Unknown token store: {0} (expected keychain, file or memory)")]
    TokenStore(String),
    #[error("Invalid value for {key}: {value}")]
    InvalidNumber { key: &'static str, value: String },
}

/// Where tokens and the session snapshot are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Keychain,
    File,
    Memory,
}

impl StoreBackend {
    /// Keychain where the OS offers one, plain file elsewhere.
    pub fn platform_default() -> Self {
        if cfg!(any(
            target_os = "macos",
            target_os = "ios",
            target_os = "windows",
            target_os = "linux"
        )) {
            StoreBackend::Keychain
        } else {
            StoreBackend::File
        }
    }

    fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "keychain" => Ok(StoreBackend::Keychain),
            "file" => Ok(StoreBackend::File),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(ConfigError::TokenStore(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortalConfig {
    pub api_host: String,
    pub language: Language,
    pub store: StoreBackend,
    pub token_file: PathBuf,
    pub keychain_service: String,
    pub login_contract: LoginContract,
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            api_host: DEFAULT_API_HOST.to_string(),
            language: Language::default(),
            store: StoreBackend::platform_default(),
            token_file: FileStore::default_path(),
            keychain_service: DEFAULT_SERVICE_NAME.to_string(),
            login_contract: LoginContract::default(),
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl PortalConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup; unset or empty keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(host) = get(ENV_API_HOST) {
            config.api_host = host.trim().trim_end_matches('/').to_string();
        }
        if let Some(lang) = get(ENV_LANGUAGE) {
            config.language = lang.parse()?;
        }
        if let Some(store) = get(ENV_TOKEN_STORE) {
            config.store = StoreBackend::parse(&store)?;
        }
        if let Some(path) = get(ENV_TOKEN_FILE) {
            config.token_file = PathBuf::from(path);
        }
        if let Some(service) = get(ENV_KEYCHAIN_SERVICE) {
            config.keychain_service = service;
        }
        if let Some(contract) = get(ENV_LOGIN_CONTRACT) {
            config.login_contract = contract.parse()?;
        }
        if let Some(secs) = get(ENV_HTTP_TIMEOUT) {
            config.timeout = parse_secs(ENV_HTTP_TIMEOUT, &secs)?;
        }
        if let Some(secs) = get(ENV_CONNECT_TIMEOUT) {
            config.connect_timeout = parse_secs(ENV_CONNECT_TIMEOUT, &secs)?;
        }

        Ok(config)
    }

    /// Open the configured token store backend.
    pub fn open_store(&self) -> Arc<dyn SecureStore> {
        match self.store {
            StoreBackend::Keychain => Arc::new(KeychainStore::new(&self.keychain_service)),
            StoreBackend::File => {
                log::warn!(
                    "Using unencrypted token file at {}",
                    self.token_file.display()
                );
                Arc::new(FileStore::new(self.token_file.clone()))
            }
            StoreBackend::Memory => Arc::new(MemoryStore::new()),
        }
    }
}

fn parse_secs(key: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .ok_or_else(|| ConfigError::InvalidNumber {
            key,
            value: raw.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<PortalConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        PortalConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config, PortalConfig::default());
        assert_eq!(config.api_host, "https://lccrm.uz");
        assert_eq!(config.language, Language::Uz);
        assert_eq!(config.login_contract, LoginContract::Standard);
        assert_eq!(config.timeout, Duration::from_secs(120));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            (ENV_API_HOST, "http://localhost:8000/"),
            (ENV_LANGUAGE, "ru"),
            (ENV_TOKEN_STORE, "file"),
            (ENV_TOKEN_FILE, "/tmp/tokens.json"),
            (ENV_KEYCHAIN_SERVICE, "test.service"),
            (ENV_LOGIN_CONTRACT, "lenient"),
            (ENV_HTTP_TIMEOUT, "30"),
            (ENV_CONNECT_TIMEOUT, "5"),
        ])
        .unwrap();
        assert_eq!(config.api_host, "http://localhost:8000");
        assert_eq!(config.language, Language::Ru);
        assert_eq!(config.store, StoreBackend::File);
        assert_eq!(config.token_file, PathBuf::from("/tmp/tokens.json"));
        assert_eq!(config.keychain_service, "test.service");
        assert_eq!(config.login_contract, LoginContract::Lenient);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_empty_values_keep_defaults() {
        let config = config_from(&[(ENV_LANGUAGE, "  "), (ENV_API_HOST, "")]).unwrap();
        assert_eq!(config.language, Language::Uz);
        assert_eq!(config.api_host, DEFAULT_API_HOST);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            config_from(&[(ENV_LANGUAGE, "fr")]),
            Err(ConfigError::Language(_))
        ));
        assert!(matches!(
            config_from(&[(ENV_TOKEN_STORE, "cloud")]),
            Err(ConfigError::TokenStore(_))
        ));
        assert!(matches!(
            config_from(&[(ENV_LOGIN_CONTRACT, "loose")]),
            Err(ConfigError::Contract(_))
        ));
        assert!(matches!(
            config_from(&[(ENV_HTTP_TIMEOUT, "0")]),
            Err(ConfigError::InvalidNumber { .. })
        ));
        assert!(matches!(
            config_from(&[(ENV_CONNECT_TIMEOUT, "soon")]),
            Err(ConfigError::InvalidNumber { .. })
        ));
    }

    #[tokio::test]
    async fn test_open_memory_store() {
        let config = PortalConfig {
            store: StoreBackend::Memory,
            ..PortalConfig::default()
        };
        let store = config.open_store();
        store.set("k", "v").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
    }
}
