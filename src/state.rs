//! Application state: one API client and the façades layered on it.

use std::sync::Arc;

use crate::api::{ApiClient, AuthApi, StudentApi, TokenStorage};
use crate::config::PortalConfig;

/// Shared by every command. The `ApiClient` is behind an `Arc` so both
/// façades, and any spawned task, use the same client and refresh gate.
pub struct AppState {
    /// HTTP client for the student API.
    pub api: Arc<ApiClient>,
    pub auth: AuthApi,
    pub student: StudentApi,
}

impl AppState {
    /// Build the state from configuration, opening the configured token store.
    pub fn new(config: &PortalConfig) -> Self {
        let tokens = TokenStorage::new(config.open_store());
        let api = Arc::new(ApiClient::with_timeouts(
            &config.api_host,
            config.language,
            tokens,
            config.timeout,
            config.connect_timeout,
        ));
        Self::from_client(api, config)
    }

    /// Build the state around an existing client.
    pub fn from_client(api: Arc<ApiClient>, config: &PortalConfig) -> Self {
        Self {
            auth: AuthApi::new(api.clone(), config.login_contract),
            student: StudentApi::new(api.clone()),
            api,
        }
    }
}
