//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use lccrm_student::api::{ApiClient, AuthApi, Language, LoginContract, StudentApi, TokenStorage};
use serde_json::{json, Value};

/// Path prefix of the student API for the default language.
pub const API_ROOT: &str = "/api/v1/students";

pub fn api_path(suffix: &str) -> String {
    format!("{}{}", API_ROOT, suffix)
}

pub fn client(server: &mockito::ServerGuard, tokens: TokenStorage) -> Arc<ApiClient> {
    Arc::new(ApiClient::new(&server.url(), Language::Uz, tokens))
}

/// Client pointed at a port nothing listens on.
pub fn offline_client(tokens: TokenStorage) -> Arc<ApiClient> {
    Arc::new(ApiClient::new("http://127.0.0.1:1", Language::Uz, tokens))
}

pub fn auth(client: &Arc<ApiClient>, contract: LoginContract) -> AuthApi {
    AuthApi::new(client.clone(), contract)
}

pub fn student(client: &Arc<ApiClient>) -> StudentApi {
    StudentApi::new(client.clone())
}

pub async fn tokens_with(access: &str, refresh: &str) -> TokenStorage {
    let tokens = TokenStorage::in_memory();
    tokens.set_tokens(access, refresh).await.unwrap();
    tokens
}

pub fn profile_json(id: i64, username: &str) -> Value {
    json!({
        "id": id,
        "username": username,
        "email": format!("{}@example.com", username),
        "first_name": "Aziz",
        "last_name": "Karimov",
        "picture": null,
        "phone": "+998901234567"
    })
}
