//! Student portal client for the LC CRM backend.
//!
//! The core is `api::ApiClient`: a bearer-token HTTP client that refreshes the
//! session once on 401 and retries the request, with tokens kept in a
//! pluggable secure store. `api::AuthApi` and `api::StudentApi` map the
//! backend's endpoints onto it.

pub mod api;
pub mod commands;
pub mod config;
pub mod state;

pub use api::{ApiClient, ApiError, AuthApi, Language, StudentApi, TokenStorage};
pub use config::PortalConfig;
pub use state::AppState;
