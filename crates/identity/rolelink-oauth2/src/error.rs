//! Linked-role flow error types.

use rolelink_core::StoreError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

pub type LinkResult<T> = Result<T, LinkError>;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Missing authorization code")]
    MissingCode,

    #[error("Authorization failed: {0}")]
    ProviderOAuth(String),

    #[error("State not found or expired")]
    InvalidState,

    #[error("Authorization code rejected: {0}")]
    InvalidGrant(String),

    #[error("Access token rejected by provider")]
    Unauthorized,

    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("Attribute store error: {0}")]
    AttributeStore(#[from] StoreError),
}

/// Fieldless discriminant of [`LinkError`], used for status mapping and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    MissingCode,
    ProviderOAuth,
    InvalidState,
    InvalidGrant,
    Unauthorized,
    ProviderUnavailable,
    MalformedResponse,
    AttributeStore,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::MissingCode => "missing_code",
            ErrorKind::ProviderOAuth => "provider_oauth",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::InvalidGrant => "invalid_grant",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::ProviderUnavailable => "provider_unavailable",
            ErrorKind::MalformedResponse => "malformed_response",
            ErrorKind::AttributeStore => "attribute_store",
        }
    }

    /// Failures caused by the inbound request rather than a downstream system.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ErrorKind::MissingCode | ErrorKind::ProviderOAuth | ErrorKind::InvalidState
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl LinkError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LinkError::Configuration(_) => ErrorKind::Configuration,
            LinkError::MissingCode => ErrorKind::MissingCode,
            LinkError::ProviderOAuth(_) => ErrorKind::ProviderOAuth,
            LinkError::InvalidState => ErrorKind::InvalidState,
            LinkError::InvalidGrant(_) => ErrorKind::InvalidGrant,
            LinkError::Unauthorized => ErrorKind::Unauthorized,
            LinkError::ProviderUnavailable(_) => ErrorKind::ProviderUnavailable,
            LinkError::MalformedResponse(_) => ErrorKind::MalformedResponse,
            LinkError::AttributeStore(_) => ErrorKind::AttributeStore,
        }
    }

    /// Classify a transport failure. The URL is stripped so nothing from the
    /// request line ends up in logs.
    pub(crate) fn transport(err: reqwest::Error, during: &str) -> Self {
        let reason = if err.is_timeout() {
            "timed out"
        } else if err.is_connect() {
            "connection failed"
        } else {
            "request failed"
        };
        LinkError::ProviderUnavailable(format!("{during} {reason}: {}", err.without_url()))
    }
}
