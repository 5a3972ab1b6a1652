//! API client module for the student portal.
//!
//! Provides the authenticated request executor with token refresh, token
//! storage backends, the auth and student endpoint façades, and the
//! request/response types of the backend.

pub mod auth;
pub mod client;
pub mod error;
pub mod language;
pub mod session;
pub mod storage;
pub mod student;
pub mod types;

pub use auth::{AuthApi, LoginContract, LoginResult, StoredTokens};
pub use client::{ApiClient, ApiRequest, MultipartBody, RequestBody};
pub use error::ApiError;
pub use language::{resolve_base_url, Language};
pub use session::SessionSnapshot;
pub use storage::{FileStore, KeychainStore, MemoryStore, SecureStore, StorageError, TokenStorage};
pub use student::StudentApi;
