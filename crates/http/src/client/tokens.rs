//! Token endpoint responses and the tokens the client holds

use super::error::ClientError;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;
use std::time::Duration;
use stride_core::{AccessToken, TokenClaims};

/// Successful token endpoint response
#[derive(Clone, Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Access token lifetime in seconds
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Refresh token lifetime in seconds
    #[serde(default)]
    pub refresh_expires_in: Option<i64>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Tokens of the current session
#[derive(Clone, Debug)]
pub struct TokenSet {
    pub access_token: AccessToken,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
    pub claims: TokenClaims,
    pub expires_at: Option<DateTime<Utc>>,
    pub refresh_expires_at: Option<DateTime<Utc>>,
}

impl TokenSet {
    /// Build from a token response received at `now`.
    ///
    /// Claims come from the access token when it is a JWT, otherwise from
    /// the ID token.
    pub fn from_response(response: TokenResponse, now: DateTime<Utc>) -> Result<Self, ClientError> {
        if response.access_token.is_empty() {
            return Err(ClientError::InvalidResponse("empty access_token".into()));
        }
        if let Some(token_type) = &response.token_type {
            if !token_type.eq_ignore_ascii_case("bearer") {
                return Err(ClientError::InvalidResponse(format!(
                    "unsupported token_type {token_type}"
                )));
            }
        }

        let claims = TokenClaims::decode_unverified(&response.access_token)
            .or_else(|access_err| match &response.id_token {
                Some(id_token) => TokenClaims::decode_unverified(id_token),
                None => Err(access_err),
            })
            .map_err(|e| ClientError::InvalidResponse(format!("no readable claims: {e}")))?;

        let expires_at = match claims.expires_at() {
            Some(exp) => Some(exp),
            None => response
                .expires_in
                .map(|secs| lifetime_end(now, secs))
                .transpose()?,
        };
        let refresh_expires_at = response
            .refresh_expires_in
            .filter(|secs| *secs > 0)
            .map(|secs| lifetime_end(now, secs))
            .transpose()?;

        Ok(Self {
            access_token: AccessToken::new(response.access_token),
            refresh_token: response.refresh_token,
            id_token: response.id_token,
            claims,
            expires_at,
            refresh_expires_at,
        })
    }

    /// Merge a refresh response; tokens the provider did not rotate are kept
    pub fn refreshed(&self, response: TokenResponse, now: DateTime<Utc>) -> Result<Self, ClientError> {
        let mut next = Self::from_response(response, now)?;
        if next.refresh_token.is_none() {
            next.refresh_token = self.refresh_token.clone();
            next.refresh_expires_at = self.refresh_expires_at;
        }
        if next.id_token.is_none() {
            next.id_token = self.id_token.clone();
        }
        Ok(next)
    }

    /// Remaining validity of the access token; `None` when it carries no expiry
    pub fn valid_for(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.expires_at
            .map(|exp| (exp - now).to_std().unwrap_or(Duration::ZERO))
    }

    /// Whether the access token stays valid for at least `min`
    pub fn is_valid_for(&self, now: DateTime<Utc>, min: Duration) -> bool {
        self.valid_for(now).is_none_or(|left| left > min)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| now >= exp)
    }

    /// Whether the refresh token can still be used at `now`
    pub fn can_refresh(&self, now: DateTime<Utc>) -> bool {
        self.refresh_token.is_some() && self.refresh_expires_at.is_none_or(|exp| now < exp)
    }
}

/// `now` plus a lifetime in seconds as sent by the provider
fn lifetime_end(now: DateTime<Utc>, secs: i64) -> Result<DateTime<Utc>, ClientError> {
    TimeDelta::try_seconds(secs)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| ClientError::InvalidResponse(format!("token lifetime out of range: {secs}s")))
}
