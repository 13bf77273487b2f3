// src/error.rs

//! Unified error handling for the collection framework.

use std::fmt;

use thiserror::Error;

/// Result type alias for framework operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Errors raised while fetching content from an upstream source.
///
/// These stay separate from [`AppError`] so fetcher strategies can speak
/// a narrow, network-shaped vocabulary. The collector records them per
/// candidate; they never abort a run.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The request exceeded its configured timeout
    #[error("timeout after {timeout_secs}s fetching {url}")]
    Timeout { url: String, timeout_secs: u64 },

    /// The upstream returned a non-success HTTP status
    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    /// Connection-level failure (DNS, TLS, reset, malformed response)
    #[error("network error fetching {url}: {message}")]
    Network { url: String, message: String },
}

impl FetchError {
    /// Classify a reqwest error against the request it belongs to.
    pub fn from_reqwest(url: &str, timeout_secs: u64, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout {
                url: url.to_string(),
                timeout_secs,
            };
        }
        if let Some(status) = err.status() {
            return Self::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            };
        }
        Self::Network {
            url: url.to_string(),
            message: err.to_string(),
        }
    }

    /// HTTP status code, if this error carries one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Upstream fetch failed
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Object store write failed
    #[error("storage error at {location}: {message}")]
    Storage { location: String, message: String },

    /// Dedupe registry check or registration failed
    #[error("registry error: {0}")]
    Registry(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client construction or request failed outside a fetch
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a registry error.
    pub fn registry(message: impl fmt::Display) -> Self {
        Self::Registry(message.to_string())
    }

    /// Create a storage error with the object location as context.
    pub fn storage(location: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Storage {
            location: location.into(),
            message: message.to_string(),
        }
    }
}
