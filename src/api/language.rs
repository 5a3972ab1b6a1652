//! Interface language and base URL resolution.
//!
//! The backend serves localized content from language-prefixed routes:
//! `https://<host>/api/v1/students` for Uzbek (the default) and
//! `https://<host>/<lang>/api/v1/students` for the others.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Path of the student API relative to the host (or language prefix).
pub const API_ROOT: &str = "/api/v1/students";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Uz,
    Ru,
    En,
}

#[derive(Debug, Error, PartialEq)]
#[error("Unsupported language: {0} (expected uz, ru or en)")]
pub struct UnknownLanguage(pub String);

impl Language {
    pub const ALL: [Language; 3] = [Language::Uz, Language::Ru, Language::En];

    pub fn code(&self) -> &'static str {
        match self {
            Language::Uz => "uz",
            Language::Ru => "ru",
            Language::En => "en",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = UnknownLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "uz" => Ok(Language::Uz),
            "ru" => Ok(Language::Ru),
            "en" => Ok(Language::En),
            other => Err(UnknownLanguage(other.to_string())),
        }
    }
}

/// Build the student API base URL for `host` in the given language.
///
/// `host` is the scheme and authority (e.g. `https://lccrm.uz`); a trailing
/// slash is ignored.
pub fn resolve_base_url(host: &str, language: Language) -> String {
    let host = host.trim_end_matches('/');
    match language {
        Language::Uz => format!("{}{}", host, API_ROOT),
        other => format!("{}/{}{}", host, other.code(), API_ROOT),
    }
}
