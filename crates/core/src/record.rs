//! The session record: the single observable authentication outcome

use crate::claims::TokenClaims;
use crate::error::{SessionError, SessionResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of the signed-in user as shown to the application
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl UserProfile {
    pub fn new(
        email: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }

    /// Build a profile from provider claims; absent claims become empty strings
    pub fn from_claims(claims: &TokenClaims) -> Self {
        Self {
            email: claims.email.clone().unwrap_or_default(),
            first_name: claims.given_name.clone().unwrap_or_default(),
            last_name: claims.family_name.clone().unwrap_or_default(),
        }
    }
}

/// Opaque bearer credential. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Value for an `Authorization` header
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccessToken(<{} bytes>)", self.0.len())
    }
}

/// Everything held while authenticated.
///
/// Only constructible through [`Credentials::new`], which rejects empty
/// tokens and identifiers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credentials {
    user: UserProfile,
    access_token: AccessToken,
    user_id: String,
    provider_subject_id: String,
}

impl Credentials {
    pub fn new(
        user: UserProfile,
        access_token: AccessToken,
        user_id: impl Into<String>,
        provider_subject_id: impl Into<String>,
    ) -> SessionResult<Self> {
        let user_id = user_id.into();
        let provider_subject_id = provider_subject_id.into();

        if access_token.is_empty() {
            return Err(SessionError::incomplete("accessToken"));
        }
        if user_id.is_empty() {
            return Err(SessionError::incomplete("userId"));
        }
        if provider_subject_id.is_empty() {
            return Err(SessionError::incomplete("keycloakId"));
        }

        Ok(Self {
            user,
            access_token,
            user_id,
            provider_subject_id,
        })
    }

    pub fn user(&self) -> &UserProfile {
        &self.user
    }

    pub fn access_token(&self) -> &AccessToken {
        &self.access_token
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn provider_subject_id(&self) -> &str {
        &self.provider_subject_id
    }

    /// Same identity with a different token
    pub fn with_access_token(mut self, access_token: AccessToken) -> SessionResult<Self> {
        if access_token.is_empty() {
            return Err(SessionError::incomplete("accessToken"));
        }
        self.access_token = access_token;
        Ok(self)
    }
}

/// Current authentication outcome.
///
/// Anonymous records carry no fields at all, so a cleared session can never
/// leak a stale token or identity.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SessionRecord {
    #[default]
    Anonymous,
    Authenticated(Credentials),
}

impl SessionRecord {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        match self {
            Self::Authenticated(credentials) => Some(credentials),
            Self::Anonymous => None,
        }
    }

    pub fn user(&self) -> Option<&UserProfile> {
        self.credentials().map(Credentials::user)
    }

    pub fn access_token(&self) -> Option<&AccessToken> {
        self.credentials().map(Credentials::access_token)
    }

    pub fn user_id(&self) -> Option<&str> {
        self.credentials().map(Credentials::user_id)
    }

    pub fn provider_subject_id(&self) -> Option<&str> {
        self.credentials().map(Credentials::provider_subject_id)
    }

    /// Flat view in the shape the application consumes
    pub fn snapshot(&self) -> SessionSnapshot {
        match self {
            Self::Anonymous => SessionSnapshot::default(),
            Self::Authenticated(credentials) => SessionSnapshot {
                user: Some(credentials.user.clone()),
                token: Some(credentials.access_token.as_str().to_string()),
                user_id: Some(credentials.user_id.clone()),
                keycloak_id: Some(credentials.provider_subject_id.clone()),
                is_authenticated: true,
            },
        }
    }
}

/// Serializable projection of a [`SessionRecord`]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub user: Option<UserProfile>,
    pub token: Option<String>,
    pub user_id: Option<String>,
    pub keycloak_id: Option<String>,
    pub is_authenticated: bool,
}
