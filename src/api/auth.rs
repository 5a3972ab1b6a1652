//! Login, logout and session restoration.
//!
//! The refresh endpoint answers with `{ "access", "refresh" }`, and the login
//! endpoint is taken to follow the same contract (`LoginContract::Standard`).
//! Deployments whose login payload uses other spellings (`access_token`,
//! `refresh_token`, a bare `token`) opt into `LoginContract::Lenient` through
//! configuration. A login payload without tokens is not an error.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use log::{info, warn};
use serde_json::Value;
use thiserror::Error;

use super::client::{ApiClient, ApiRequest};
use super::error::ApiError;
use super::session::{access_claims, SessionSnapshot};
use super::student::StudentApi;
use super::types::{LoginRequest, StudentProfile};

/// Payload keys that may carry the user's profile in a login response.
const PROFILE_FIELDS: [&str; 3] = ["user", "student", "profile"];

/// Which token field names the login response is read with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoginContract {
    /// `access` and `refresh`, as returned by the refresh endpoint.
    #[default]
    Standard,
    /// Also accepts `access_token`, `token` and `refresh_token`.
    Lenient,
}

#[derive(Debug, Error, PartialEq)]
#[error("Unknown login contract: {0} (expected standard or lenient)")]
pub struct UnknownContract(pub String);

impl LoginContract {
    fn access_fields(&self) -> &'static [&'static str] {
        match self {
            LoginContract::Standard => &["access"],
            LoginContract::Lenient => &["access", "access_token", "token"],
        }
    }

    fn refresh_fields(&self) -> &'static [&'static str] {
        match self {
            LoginContract::Standard => &["refresh"],
            LoginContract::Lenient => &["refresh", "refresh_token"],
        }
    }

    /// Pull whatever tokens the contract recognizes out of a login payload.
    pub fn extract_tokens(&self, payload: &Value) -> LoginTokens {
        LoginTokens {
            access: first_string(payload, self.access_fields()),
            refresh: first_string(payload, self.refresh_fields()),
        }
    }
}

impl fmt::Display for LoginContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoginContract::Standard => f.write_str("standard"),
            LoginContract::Lenient => f.write_str("lenient"),
        }
    }
}

impl FromStr for LoginContract {
    type Err = UnknownContract;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(LoginContract::Standard),
            "lenient" => Ok(LoginContract::Lenient),
            other => Err(UnknownContract(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoginTokens {
    pub access: Option<String>,
    pub refresh: Option<String>,
}

/// What the login stored locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoredTokens {
    Pair,
    AccessOnly,
    None,
}

impl StoredTokens {
    pub fn label(&self) -> &'static str {
        match self {
            StoredTokens::Pair => "access+refresh",
            StoredTokens::AccessOnly => "access only",
            StoredTokens::None => "none",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoginResult {
    pub username: String,
    pub profile: StudentProfile,
    pub stored: StoredTokens,
}

#[derive(Clone)]
pub struct AuthApi {
    client: Arc<ApiClient>,
    student: StudentApi,
    contract: LoginContract,
}

impl AuthApi {
    pub fn new(client: Arc<ApiClient>, contract: LoginContract) -> Self {
        Self {
            student: StudentApi::new(client.clone()),
            client,
            contract,
        }
    }

    pub fn contract(&self) -> LoginContract {
        self.contract
    }

    /// POST /login/, persist the returned tokens and the session snapshot.
    ///
    /// A successful response first clears any previously stored session. When
    /// the payload carries no profile, it is fetched from GET /profile/.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResult, ApiError> {
        info!("Logging in as {}", username);

        let req = ApiRequest::post("/login/").json(&LoginRequest { username, password })?;
        let payload = self.client.request(&req).await?;

        let tokens = self.contract.extract_tokens(&payload);
        let store = self.client.tokens();

        // A new login replaces whatever session was stored before it.
        store.clear_all().await?;

        let stored = match (tokens.access.as_deref(), tokens.refresh.as_deref()) {
            (Some(access), Some(refresh)) => {
                store.set_tokens(access, refresh).await?;
                StoredTokens::Pair
            }
            (Some(access), None) => {
                store.replace_with_access_token(access).await?;
                StoredTokens::AccessOnly
            }
            (None, _) => {
                warn!("Login response carried no access token ({} contract)", self.contract);
                StoredTokens::None
            }
        };

        let profile = match embedded_profile(&payload) {
            Some(profile) => profile,
            None => self.student.profile().await?,
        };

        let username = payload
            .get("username")
            .and_then(Value::as_str)
            .unwrap_or(username)
            .to_string();

        let snapshot = SessionSnapshot {
            username: username.clone(),
            user_id: tokens
                .access
                .as_deref()
                .and_then(access_claims)
                .and_then(|c| c.user_id)
                .or(Some(profile.id)),
            profile: Some(profile.clone()),
            language: self.client.language(),
        };
        store.save_session(&snapshot).await?;

        info!("Login complete for {}", username);
        Ok(LoginResult {
            username,
            profile,
            stored,
        })
    }

    /// POST /logout/ (best-effort), then clear tokens and the session snapshot.
    ///
    /// A failing remote call never fails the logout; only local storage errors do.
    pub async fn logout(&self) -> Result<(), ApiError> {
        info!("Logging out");

        if let Err(e) = self.client.request(&ApiRequest::post("/logout/")).await {
            warn!("Logout request failed (will continue local cleanup): {}", e);
        }

        self.client.tokens().clear_all().await?;
        info!("Logout complete");
        Ok(())
    }

    /// Run the refresh flow directly.
    pub async fn refresh_token(&self) -> bool {
        self.client.refresh().await
    }

    /// Last-known session, if any credentials are still stored.
    pub async fn restore_session(&self) -> Result<Option<SessionSnapshot>, ApiError> {
        let store = self.client.tokens();
        if store.refresh_token().await?.is_none() && store.access_token().await?.is_none() {
            return Ok(None);
        }
        Ok(store.session().await?)
    }
}

fn first_string(payload: &Value, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .filter_map(|f| payload.get(*f).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn embedded_profile(payload: &Value) -> Option<StudentProfile> {
    PROFILE_FIELDS
        .iter()
        .filter_map(|f| payload.get(*f))
        .find_map(|v| serde_json::from_value(v.clone()).ok())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_standard_contract_reads_access_refresh() {
        let payload = json!({"username": "ali", "access": "a1", "refresh": "r1"});
        let tokens = LoginContract::Standard.extract_tokens(&payload);
        assert_eq!(tokens.access.as_deref(), Some("a1"));
        assert_eq!(tokens.refresh.as_deref(), Some("r1"));
    }

    #[test]
    fn test_standard_contract_ignores_aliases() {
        let payload = json!({"access_token": "a1", "refresh_token": "r1", "token": "t"});
        assert_eq!(
            LoginContract::Standard.extract_tokens(&payload),
            LoginTokens::default()
        );
    }

    #[test]
    fn test_lenient_contract_accepts_aliases() {
        let payload = json!({"access_token": "a1", "refresh_token": "r1"});
        let tokens = LoginContract::Lenient.extract_tokens(&payload);
        assert_eq!(tokens.access.as_deref(), Some("a1"));
        assert_eq!(tokens.refresh.as_deref(), Some("r1"));

        let payload = json!({"token": "t1"});
        let tokens = LoginContract::Lenient.extract_tokens(&payload);
        assert_eq!(tokens.access.as_deref(), Some("t1"));
        assert_eq!(tokens.refresh, None);
    }

    #[test]
    fn test_lenient_prefers_canonical_names() {
        let payload = json!({"access": "a1", "access_token": "a2", "token": "t"});
        let tokens = LoginContract::Lenient.extract_tokens(&payload);
        assert_eq!(tokens.access.as_deref(), Some("a1"));
    }

    #[test]
    fn test_non_string_tokens_are_ignored() {
        let payload = json!({"access": 12, "refresh": null});
        assert_eq!(
            LoginContract::Lenient.extract_tokens(&payload),
            LoginTokens::default()
        );
    }

    #[test]
    fn test_embedded_profile() {
        let profile = json!({
            "id": 5, "username": "ali", "email": "ali@example.com",
            "first_name": "Ali", "last_name": "Valiyev", "picture": null, "phone": null
        });
        assert_eq!(embedded_profile(&json!({"user": profile})).map(|p| p.id), Some(5));
        assert_eq!(embedded_profile(&json!({"student": profile})).map(|p| p.id), Some(5));
        assert!(embedded_profile(&json!({"username": "ali"})).is_none());
        assert!(embedded_profile(&json!({"user": {"id": 5}})).is_none());
    }

    #[test]
    fn test_parse_contract() {
        assert_eq!("standard".parse::<LoginContract>(), Ok(LoginContract::Standard));
        assert_eq!("Lenient".parse::<LoginContract>(), Ok(LoginContract::Lenient));
        assert!("loose".parse::<LoginContract>().is_err());
        assert_eq!(LoginContract::default().to_string(), "standard");
    }
}
