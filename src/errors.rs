//! Error types for the gateway
//!
//! Configuration problems are reported at startup through [`ConfigError`].
//! Request failures are expressed as [`ApiError`], the only place where HTTP
//! status codes are chosen.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::storage::StorageError;

/// Startup configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for [`crate::config::Config`]
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// An environment variable holds an unusable value
    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: String, value: String },
}

impl ConfigError {
    pub fn invalid(name: &str, value: &str) -> Self {
        ConfigError::Invalid {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

/// Request-level errors, rendered as plain-text HTTP responses
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("No such bucket")]
    NoSuchBucket,

    #[error("No such key")]
    NoSuchKey,

    /// Malformed client input; the message is returned to the caller as is
    #[error("{0}")]
    BadRequest(String),

    /// Anything else. Details stay in the logs.
    #[error("Internal Server Error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NoSuchBucket | ApiError::NoSuchKey => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NoSuchBucket { .. } => ApiError::NoSuchBucket,
            StorageError::NoSuchKey { .. } => ApiError::NoSuchKey,
            StorageError::Other { .. } => ApiError::Internal,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status(),
            [(header::CONTENT_TYPE, mime::TEXT_PLAIN_UTF_8.as_ref())],
            self.to_string(),
        )
            .into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, ApiError>;
