//! Identity client contract and expiry notifications

use crate::claims::TokenClaims;
use crate::config::InitOptions;
use crate::error::IdentityError;
use crate::lifecycle::IdentityPhase;
use crate::record::AccessToken;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// Raised when the current token is about to become, or has become, invalid
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenExpiring {
    /// Expiry of the token the notice is about, if known
    pub expires_at: Option<DateTime<Utc>>,
}

/// Receiving end of an expiry subscription
pub type ExpiryReceiver = mpsc::UnboundedReceiver<TokenExpiring>;

/// Fan-out of [`TokenExpiring`] notices to subscribers
#[derive(Debug, Default)]
pub struct ExpiryNotifier {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<TokenExpiring>>>,
}

impl ExpiryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> ExpiryReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Deliver `notice` to every live subscriber; returns how many got it
    pub fn notify(&self, notice: TokenExpiring) -> usize {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(notice.clone()).is_ok());
        debug!("Expiry notice delivered to {} subscriber(s)", subscribers.len());
        subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|tx| !tx.is_closed())
            .count()
    }
}

/// Client side of the identity provider protocol.
///
/// Implementations own the raw tokens; the session controller only sees
/// outcomes and the token/claims they expose after a successful handshake
/// or renewal.
#[async_trait(?Send)]
pub trait IdentityClient {
    /// Run the startup handshake.
    ///
    /// `Ok(true)` means a session was found and [`access_token`](Self::access_token)
    /// and [`claims`](Self::claims) are populated; `Ok(false)` means there is no
    /// session. `Err` is reserved for transport or protocol failures.
    async fn initialize(&self, options: &InitOptions) -> Result<bool, IdentityError>;

    /// Renew the token unless it stays valid for at least `min_validity`.
    ///
    /// `Ok(true)` when a new token was obtained, `Ok(false)` when the current
    /// one is still good, `Err` when renewal is impossible.
    async fn renew(&self, min_validity: Duration) -> Result<bool, IdentityError>;

    /// Start an interactive login (explicit user action)
    async fn login(&self) -> Result<(), IdentityError>;

    /// Drop local tokens and end the provider session
    async fn logout(&self) -> Result<(), IdentityError>;

    /// Subscribe to expiry notices
    fn on_expiring(&self) -> ExpiryReceiver;

    /// Current token, `None` when absent or expired
    fn access_token(&self) -> Option<AccessToken>;

    /// Claims of the current token
    fn claims(&self) -> Option<TokenClaims>;

    fn phase(&self) -> IdentityPhase;
}
