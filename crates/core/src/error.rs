//! Error types shared across the session crates

use thiserror::Error;

/// Result alias for session record operations
pub type SessionResult<T> = std::result::Result<T, SessionError>;

/// Errors raised while building or mutating a session record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// A required credential field was missing or empty
    #[error("Incomplete credentials: {field} is missing")]
    IncompleteCredentials { field: &'static str },

    /// The identity client reported success but had no usable token or claims
    #[error("Identity client returned no {what}")]
    MissingIdentity { what: &'static str },
}

impl SessionError {
    /// Create an incomplete credentials error for the named field
    pub fn incomplete(field: &'static str) -> Self {
        Self::IncompleteCredentials { field }
    }
}

/// Errors raised by a key/value storage medium
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// The medium is not available (private browsing, no window, ...)
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// A read or write was rejected by the medium
    #[error("Storage operation failed: {0}")]
    Operation(String),
}

/// Errors surfaced by an [`IdentityClient`](crate::identity::IdentityClient)
///
/// These never reach the presentation layer: the session controller turns
/// every variant into a state transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// Network unreachable or the request could not be sent
    #[error("Transport failure: {0}")]
    Transport(String),

    /// The provider answered with something the client could not accept
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The provider rejected the request with an OAuth error code
    #[error("Provider error {code}: {description}")]
    Provider { code: String, description: String },

    /// The client configuration is unusable
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// The provider-side session is gone; a new login is required
    #[error("Session expired")]
    SessionExpired,

    /// The operation requires an authenticated client
    #[error("Not authenticated")]
    NotAuthenticated,

    /// The operation is not valid in the client's current phase
    #[error("Invalid client state: {0}")]
    InvalidState(String),

    /// A token could not be decoded
    #[error("Malformed token: {0}")]
    MalformedToken(String),
}

impl IdentityError {
    /// Create a provider error from an OAuth error response
    pub fn provider(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self::Provider {
            code: code.into(),
            description: description.into(),
        }
    }

    /// Whether the provider-side session has ended for good
    pub fn is_session_expired(&self) -> bool {
        match self {
            Self::SessionExpired => true,
            Self::Provider { code, .. } => code == "invalid_grant",
            _ => false,
        }
    }
}

impl From<StorageError> for IdentityError {
    fn from(err: StorageError) -> Self {
        Self::InvalidState(err.to_string())
    }
}

impl From<serde_json::Error> for IdentityError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(err.to_string())
    }
}
