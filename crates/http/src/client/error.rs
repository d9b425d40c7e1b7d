//! Client error types

use serde::Deserialize;
use stride_core::{IdentityError, StorageError};
use thiserror::Error;

/// Client error types
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or request error
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider rejected the request with an OAuth error body
    #[error("OAuth error {status} {error}: {}", .description.as_deref().unwrap_or("no description"))]
    OAuth {
        status: u16,
        error: String,
        description: Option<String>,
    },

    /// Server returned an error status without an OAuth body
    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// The provider answered with a body we could not use
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// The browser could not be sent to, or read, a location
    #[error("Navigation failed: {0}")]
    Navigation(String),

    /// The callback does not belong to an authorization we started
    #[error("Invalid authorization state: {0}")]
    InvalidState(String),

    /// Transient storage for the pending authorization failed
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// No entropy source available
    #[error("Random generation failed: {0}")]
    Random(String),
}

#[derive(Deserialize)]
struct OAuthErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

impl ClientError {
    /// Create error from an HTTP status and response body
    pub fn from_response(status: reqwest::StatusCode, body: &str) -> Self {
        match serde_json::from_str::<OAuthErrorBody>(body) {
            Ok(oauth) => Self::OAuth {
                status: status.as_u16(),
                error: oauth.error,
                description: oauth.error_description,
            },
            Err(_) => Self::ServerError {
                status: status.as_u16(),
                message: if body.is_empty() {
                    status.to_string()
                } else {
                    body.to_string()
                },
            },
        }
    }
}

impl From<ClientError> for IdentityError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Request(e) => IdentityError::Transport(e.to_string()),
            ClientError::OAuth {
                error, description, ..
            } => IdentityError::provider(error, description.unwrap_or_default()),
            ClientError::ServerError { status, message } if status >= 500 => {
                IdentityError::Transport(format!("{status}: {message}"))
            }
            ClientError::ServerError { status, message } => {
                IdentityError::Protocol(format!("{status}: {message}"))
            }
            ClientError::InvalidResponse(message) => IdentityError::Protocol(message),
            ClientError::Configuration(message) => IdentityError::Configuration(message),
            ClientError::Navigation(message) => IdentityError::Transport(message),
            ClientError::InvalidState(message) => IdentityError::Protocol(message),
            ClientError::Storage(e) => e.into(),
            ClientError::Random(message) => IdentityError::InvalidState(message),
        }
    }
}
