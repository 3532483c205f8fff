//! Error types shared by every ga4mcp crate.
//!
//! All fallible operations return a [`Ga4Error`] carrying a [`Ga4ErrorCode`]
//! that classifies the failure: configuration, authentication, credentials
//! storage, caller input validation, or a failed GA4 API call.

use std::fmt;
use thiserror::Error;

/// The category of a [`Ga4Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ga4ErrorCode {
    /// Missing or invalid environment configuration.
    Configuration,
    /// OAuth flow state missing/invalid, token exchange failure, or a call
    /// made without credentials.
    Authentication,
    /// Credentials file I/O or format failure.
    Credentials,
    /// Malformed caller input.
    Validation,
    /// A GA4 Data/Admin API call failed (network, quota, permission, decoding).
    Api,
}

impl Ga4ErrorCode {
    /// Returns the stable identifier for this code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "CONFIG_ERROR",
            Self::Authentication => "AUTH_ERROR",
            Self::Credentials => "CREDENTIALS_ERROR",
            Self::Validation => "VALIDATION_ERROR",
            Self::Api => "API_ERROR",
        }
    }

    /// Returns true for authentication failures, including credential storage
    /// failures which are a kind of authentication failure.
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication | Self::Credentials)
    }
}

impl fmt::Display for Ga4ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error raised by the ga4mcp core.
#[derive(Debug, Error)]
pub struct Ga4Error {
    code: Ga4ErrorCode,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Ga4Error {
    /// Creates a new error with the given code and message.
    pub fn new(code: Ga4ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(Ga4ErrorCode::Configuration, message)
    }

    /// Creates an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(Ga4ErrorCode::Authentication, message)
    }

    /// Creates a credentials storage error.
    pub fn credentials(message: impl Into<String>) -> Self {
        Self::new(Ga4ErrorCode::Credentials, message)
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(Ga4ErrorCode::Validation, message)
    }

    /// Creates an API error.
    pub fn api(message: impl Into<String>) -> Self {
        Self::new(Ga4ErrorCode::Api, message)
    }

    /// Sets the underlying cause.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Prefixes the message with context, keeping code and source.
    pub fn context(mut self, context: impl fmt::Display) -> Self {
        self.message = format!("{}: {}", context, self.message);
        self
    }

    /// Returns the error code.
    pub fn code(&self) -> Ga4ErrorCode {
        self.code
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns true for authentication and credentials errors.
    pub fn is_authentication(&self) -> bool {
        self.code.is_authentication()
    }
}

impl fmt::Display for Ga4Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// A specialized Result type for ga4mcp operations.
pub type Ga4Result<T> = Result<T, Ga4Error>;
