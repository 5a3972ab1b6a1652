//! Last-known session snapshot, persisted next to the tokens so a restarted
//! app can show who is signed in before the first network round-trip.

use base64::Engine;
use serde::{Deserialize, Serialize};

use super::language::Language;
use super::types::StudentProfile;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub username: String,
    /// Backend user id, read from the access token's claims when available.
    pub user_id: Option<i64>,
    pub profile: Option<StudentProfile>,
    pub language: Language,
}

/// Claims the client cares about in a JWT access token.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AccessClaims {
    pub user_id: Option<i64>,
    /// Expiry as a UNIX timestamp (seconds).
    pub exp: Option<i64>,
}

/// Decode the payload of a JWT access token without verifying it.
///
/// The backend already verified the token; the client only reads a few claims.
/// Tokens are opaque by contract, so anything that is not a decodable JWT
/// yields `None` instead of an error.
pub fn access_claims(token: &str) -> Option<AccessClaims> {
    let mut parts = token.split('.');
    let (_header, payload, _signature) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    serde_json::from_slice(&decoded).ok()
}
