//! Authenticated HTTP client with transparent token refresh.
//!
//! Every request carries `Authorization: Bearer <access>` when an access token
//! is stored. A 401 answer triggers one refresh through POST /refresh-token/
//! and one retry of the same request with the new token; a second 401, or a
//! failed refresh, is final.
//!
//! Refreshes are single-flight per client: concurrent 401s queue on a gate, and
//! a waiter that finds the stored access token already replaced retries with it
//! instead of spending the refresh token again.

use std::sync::RwLock;
use std::time::Duration;

use log::{debug, error, info, warn};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use super::error::{ApiError, GENERIC_ERROR_MESSAGE};
use super::language::{resolve_base_url, Language};
use super::storage::TokenStorage;
use super::types::{RefreshRequest, RefreshResponse};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const JSON_MIME: &str = "application/json";
const REFRESH_PATH: &str = "/refresh-token/";

/// Body of an API request.
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    Multipart(MultipartBody),
}

/// Replayable multipart/form-data description.
///
/// `reqwest::multipart::Form` is consumed when sent, so the form is rebuilt
/// from this description for every attempt.
#[derive(Debug, Clone, Default)]
pub struct MultipartBody {
    fields: Vec<(String, String)>,
    files: Vec<FilePart>,
}

#[derive(Debug, Clone)]
pub struct FilePart {
    pub field: String,
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn file(mut self, part: FilePart) -> Self {
        self.files.push(part);
        self
    }

    fn to_form(&self) -> Result<Form, ApiError> {
        let mut form = Form::new();
        for (name, value) in &self.fields {
            form = form.text(name.clone(), value.clone());
        }
        for file in &self.files {
            let part = Part::bytes(file.bytes.clone())
                .file_name(file.file_name.clone())
                .mime_str(&file.mime)
                .map_err(|e| {
                    ApiError::InvalidRequest(format!("Invalid MIME type {}: {}", file.mime, e))
                })?;
            form = form.part(file.field.clone(), part);
        }
        Ok(form)
    }
}

/// A request against the student API, relative to the language-dependent base URL.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path suffix, e.g. `/profile/`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
    /// Extra headers, applied after the JSON defaults and before `Authorization`.
    pub headers: HeaderMap,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: RequestBody::Empty,
            headers: HeaderMap::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn query(mut self, pairs: Vec<(String, String)>) -> Self {
        self.query.extend(pairs);
        self
    }

    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, ApiError> {
        self.body = RequestBody::Json(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn multipart(mut self, body: MultipartBody) -> Self {
        self.body = RequestBody::Multipart(body);
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn is_multipart(&self) -> bool {
        matches!(self.body, RequestBody::Multipart(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    Initial,
    Retried,
}

/// HTTP client for the student API.
///
/// Holds the host, the active language and the token storage. Language is
/// per instance, so clients configured for different languages can coexist.
pub struct ApiClient {
    http: Client,
    host: String,
    language: RwLock<Language>,
    tokens: TokenStorage,
    refresh_gate: tokio::sync::Mutex<()>,
}

impl ApiClient {
    /// Create a client for `host` (scheme and authority, e.g. `https://lccrm.uz`).
    pub fn new(host: &str, language: Language, tokens: TokenStorage) -> Self {
        Self::with_timeouts(host, language, tokens, DEFAULT_TIMEOUT, DEFAULT_CONNECT_TIMEOUT)
    }

    pub fn with_timeouts(
        host: &str,
        language: Language,
        tokens: TokenStorage,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Self {
        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build HTTP client, using defaults without timeouts: {}", e);
                Client::new()
            });
        Self {
            http,
            host: host.trim_end_matches('/').to_string(),
            language: RwLock::new(language),
            tokens,
            refresh_gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn tokens(&self) -> &TokenStorage {
        &self.tokens
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn language(&self) -> Language {
        *self.language.read().unwrap_or_else(|p| p.into_inner())
    }

    /// Switch the language prefix for all subsequent requests from this client.
    pub fn set_language(&self, language: Language) {
        *self.language.write().unwrap_or_else(|p| p.into_inner()) = language;
        debug!("[api] language set to {}", language);
    }

    pub fn base_url(&self) -> String {
        resolve_base_url(&self.host, self.language())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    /// Execute `req`, refreshing the session once on 401.
    ///
    /// Returns the parsed JSON body; an empty 2xx body yields an empty object.
    pub async fn request(&self, req: &ApiRequest) -> Result<Value, ApiError> {
        let mut attempt = Attempt::Initial;
        loop {
            let token = self.tokens.access_token().await?;
            let response = self.send(req, token.as_deref()).await?;

            if response.status() == StatusCode::UNAUTHORIZED && attempt == Attempt::Initial {
                info!("[api] {} {} returned 401, refreshing session", req.method, req.path);
                if !self.refresh_after(token.as_deref()).await {
                    return Err(ApiError::unauthorized());
                }
                attempt = Attempt::Retried;
                continue;
            }

            return read_body(req, response).await;
        }
    }

    /// `request`, then deserialize the body into `T`.
    pub async fn request_json<T: DeserializeOwned>(&self, req: &ApiRequest) -> Result<T, ApiError> {
        let value = self.request(req).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Exchange the stored refresh token for a new pair and persist it.
    ///
    /// Never fails: any problem (no refresh token, network error, non-2xx,
    /// malformed body, storage error) is reported as `false`.
    pub async fn refresh(&self) -> bool {
        let _gate = self.refresh_gate.lock().await;
        self.refresh_locked().await
    }

    async fn refresh_after(&self, stale: Option<&str>) -> bool {
        let _gate = self.refresh_gate.lock().await;

        match self.tokens.access_token().await {
            Ok(Some(current)) if Some(current.as_str()) != stale => {
                debug!("[api] access token already refreshed by a concurrent request");
                return true;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Failed to read access token before refresh: {}", e);
                return false;
            }
        }

        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> bool {
        let refresh = match self.tokens.refresh_token().await {
            Ok(Some(token)) => token,
            Ok(None) => {
                debug!("[api] no refresh token stored, refresh skipped");
                return false;
            }
            Err(e) => {
                warn!("Failed to read refresh token: {}", e);
                return false;
            }
        };

        let resp = match self
            .http
            .post(self.url(REFRESH_PATH))
            .header(CONTENT_TYPE, JSON_MIME)
            .header(ACCEPT, JSON_MIME)
            .json(&RefreshRequest { refresh: &refresh })
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!("Refresh request failed (network error): {}", e);
                return false;
            }
        };

        if resp.status() == StatusCode::UNAUTHORIZED {
            info!("Refresh token rejected, clearing stored session");
            if let Err(e) = self.tokens.clear_all().await {
                warn!("Failed to clear rejected session: {}", e);
            }
            return false;
        }

        if !resp.status().is_success() {
            warn!("Refresh failed with status {}", resp.status());
            return false;
        }

        let pair: RefreshResponse = match resp.json().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!("Failed to parse refresh response: {}", e);
                return false;
            }
        };

        match self.tokens.set_tokens(&pair.access, &pair.refresh).await {
            Ok(()) => {
                info!("Session refreshed");
                true
            }
            Err(e) => {
                warn!("Failed to persist refreshed tokens: {}", e);
                false
            }
        }
    }

    async fn send(&self, req: &ApiRequest, token: Option<&str>) -> Result<Response, ApiError> {
        let url = self.url(&req.path);
        debug!("[api] {} {}", req.method, url);

        let mut builder = self.http.request(req.method.clone(), &url);
        if !req.query.is_empty() {
            builder = builder.query(&req.query);
        }

        builder = match req.body {
            RequestBody::Empty => builder
                .header(CONTENT_TYPE, JSON_MIME)
                .header(ACCEPT, JSON_MIME),
            RequestBody::Json(ref value) => builder
                .header(CONTENT_TYPE, JSON_MIME)
                .header(ACCEPT, JSON_MIME)
                .json(value),
            // Content-Type (with boundary) is set by reqwest.
            RequestBody::Multipart(ref body) => {
                builder.header(ACCEPT, JSON_MIME).multipart(body.to_form()?)
            }
        };

        if !req.headers.is_empty() {
            builder = builder.headers(req.headers.clone());
        }

        if let Some(t) = token {
            builder = builder.bearer_auth(t);
        }

        Ok(builder.send().await?)
    }
}

async fn read_body(req: &ApiRequest, response: Response) -> Result<Value, ApiError> {
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        error!("[api] {} {} failed ({}): {}", req.method, req.path, status, text);
        let message = if text.is_empty() {
            GENERIC_ERROR_MESSAGE.to_string()
        } else {
            text
        };
        return Err(ApiError::Status {
            status: status.as_u16(),
            message,
        });
    }

    debug!("[api] {} {} -> {}", req.method, req.path, status);
    if text.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    Ok(serde_json::from_str(&text)?)
}
