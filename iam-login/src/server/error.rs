use std::fmt;
use thiserror::Error;

use crate::common::{ArnError, LoginDataError};

/// Ways a signed request can fail to prove it was meant for this server
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeaderViolation {
    #[error("missing header {header}")]
    MissingServerId { header: &'static str },

    #[error("header {header} has value {provided:?}, expected {expected:?}")]
    ServerIdMismatch {
        header: &'static str,
        provided: String,
        expected: String,
    },

    #[error("missing Authorization header")]
    MissingAuthorization,

    #[error("Authorization header has no SignedHeaders component")]
    NoSignedHeaders,

    #[error("header {header} is present but not covered by the signature")]
    UnsignedServerId { header: &'static str },

    #[error("query-string signed requests are not accepted")]
    QuerySigned,

    #[error("unsupported replay request: {reason}")]
    DisallowedRequest { reason: String },
}

/// Audit category of a failed login
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    MalformedInput,
    SecurityValidation,
    Upstream,
    AuthorizationDenied,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MalformedInput => "malformed_input",
            Self::SecurityValidation => "security_validation_failed",
            Self::Upstream => "upstream_failure",
            Self::AuthorizationDenied => "authorization_denied",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while verifying a login
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Malformed input: {message}")]
    MalformedInput { message: String },

    #[error("Security validation failed: {violation}")]
    SecurityValidation { violation: HeaderViolation },

    #[error("Identity service failure: {message}")]
    Upstream { message: String },

    #[error("Authorization denied: {message}")]
    AuthorizationDenied { message: String },
}

impl AuthError {
    /// Message returned to callers regardless of the category
    pub const PUBLIC_MESSAGE: &'static str = "authentication failed";

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedInput {
            message: message.into(),
        }
    }

    pub fn security(violation: HeaderViolation) -> Self {
        Self::SecurityValidation { violation }
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            message: message.into(),
        }
    }

    pub fn denied(message: impl Into<String>) -> Self {
        Self::AuthorizationDenied {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MalformedInput { .. } => ErrorCategory::MalformedInput,
            Self::SecurityValidation { .. } => ErrorCategory::SecurityValidation,
            Self::Upstream { .. } => ErrorCategory::Upstream,
            Self::AuthorizationDenied { .. } => ErrorCategory::AuthorizationDenied,
        }
    }
}

impl From<HeaderViolation> for AuthError {
    fn from(violation: HeaderViolation) -> Self {
        Self::security(violation)
    }
}

impl From<ArnError> for AuthError {
    fn from(err: ArnError) -> Self {
        Self::malformed(err.to_string())
    }
}

impl From<LoginDataError> for AuthError {
    fn from(err: LoginDataError) -> Self {
        Self::malformed(err.to_string())
    }
}

pub type AuthResult<T> = Result<T, AuthError>;
