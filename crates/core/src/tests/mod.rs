//! Test doubles shared by the session crates.
//!
//! Compiled for this crate's unit tests and, through the `tests` feature,
//! for the tests of the crates built on top of it.

use crate::claims::TokenClaims;
use crate::clock::Clock;
use crate::config::InitOptions;
use crate::error::{IdentityError, StorageError};
use crate::identity::{ExpiryNotifier, ExpiryReceiver, IdentityClient, TokenExpiring};
use crate::lifecycle::{IdentityPhase, PhaseTracker};
use crate::record::AccessToken;
use crate::storage::{KeyValueStorage, MemoryStorage};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Build an unsigned JWT (`alg: none`) carrying `claims`
pub fn unsigned_token(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.")
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn at_timestamp(secs: i64) -> Self {
        Self::new(DateTime::from_timestamp(secs, 0).unwrap_or_default())
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += chrono::Duration::from_std(by).unwrap_or_else(|_| chrono::Duration::zero());
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Memory storage that counts mutations
#[derive(Debug, Default)]
pub struct CountingStorage {
    inner: MemoryStorage,
    writes: AtomicUsize,
}

impl CountingStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `set_item`/`remove_item` calls so far
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl KeyValueStorage for CountingStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.remove_item(key)
    }
}

#[derive(Debug, Clone)]
enum InitScript {
    Session(AccessToken, TokenClaims),
    NoSession,
    Fail(IdentityError),
}

#[derive(Debug, Clone)]
enum RenewalScript {
    Refresh(AccessToken, TokenClaims),
    StillValid,
    Fail(IdentityError),
}

/// Identity client whose outcomes are scripted up front.
///
/// Follows the same phase rules as a real client and records every call.
#[derive(Debug)]
pub struct ScriptedIdentityClient {
    init: Mutex<InitScript>,
    renewals: Mutex<VecDeque<RenewalScript>>,
    current: Mutex<Option<(AccessToken, TokenClaims)>>,
    notifier: ExpiryNotifier,
    phase: PhaseTracker,
    initialize_calls: AtomicUsize,
    login_calls: AtomicUsize,
    logout_calls: AtomicUsize,
    subscriptions: AtomicUsize,
    renew_requests: Mutex<Vec<Duration>>,
}

impl Default for ScriptedIdentityClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedIdentityClient {
    /// A client whose handshake finds no session
    pub fn new() -> Self {
        Self {
            init: Mutex::new(InitScript::NoSession),
            renewals: Mutex::new(VecDeque::new()),
            current: Mutex::new(None),
            notifier: ExpiryNotifier::new(),
            phase: PhaseTracker::new(),
            initialize_calls: AtomicUsize::new(0),
            login_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
            subscriptions: AtomicUsize::new(0),
            renew_requests: Mutex::new(Vec::new()),
        }
    }

    /// Handshake succeeds with `token` and `claims`
    pub fn with_session(self, token: AccessToken, claims: TokenClaims) -> Self {
        *lock(&self.init) = InitScript::Session(token, claims);
        self
    }

    /// Handshake fails with `error`
    pub fn with_init_error(self, error: IdentityError) -> Self {
        *lock(&self.init) = InitScript::Fail(error);
        self
    }

    /// Next renewal obtains `token`
    pub fn queue_refresh(&self, token: AccessToken, claims: TokenClaims) {
        lock(&self.renewals).push_back(RenewalScript::Refresh(token, claims));
    }

    /// Next renewal finds the token still valid
    pub fn queue_still_valid(&self) {
        lock(&self.renewals).push_back(RenewalScript::StillValid);
    }

    /// Next renewal fails with `error`
    pub fn queue_renewal_error(&self, error: IdentityError) {
        lock(&self.renewals).push_back(RenewalScript::Fail(error));
    }

    /// Raise an expiry notice for the current token
    pub fn fire_expiring(&self) -> usize {
        let expires_at = lock(&self.current)
            .as_ref()
            .and_then(|(_, claims)| claims.expires_at());
        self.notifier.notify(TokenExpiring { expires_at })
    }

    pub fn initialize_calls(&self) -> usize {
        self.initialize_calls.load(Ordering::SeqCst)
    }

    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub fn logout_calls(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }

    pub fn expiry_subscriptions(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }

    /// `min_validity` of every renewal request, in order
    pub fn renew_requests(&self) -> Vec<Duration> {
        lock(&self.renew_requests).clone()
    }
}

#[async_trait(?Send)]
impl IdentityClient for ScriptedIdentityClient {
    async fn initialize(&self, _options: &InitOptions) -> Result<bool, IdentityError> {
        self.initialize_calls.fetch_add(1, Ordering::SeqCst);
        self.phase.transition(IdentityPhase::Initializing)?;

        let script = lock(&self.init).clone();
        match script {
            InitScript::Session(token, claims) => {
                *lock(&self.current) = Some((token, claims));
                self.phase.transition(IdentityPhase::Authenticated)?;
                Ok(true)
            }
            InitScript::NoSession => {
                self.phase.transition(IdentityPhase::Anonymous)?;
                Ok(false)
            }
            InitScript::Fail(error) => {
                self.phase.reset_to_anonymous();
                Err(error)
            }
        }
    }

    async fn renew(&self, min_validity: Duration) -> Result<bool, IdentityError> {
        lock(&self.renew_requests).push(min_validity);
        self.phase
            .transition_from(IdentityPhase::Authenticated, IdentityPhase::Renewing)
            .map_err(|_| IdentityError::NotAuthenticated)?;

        let script = lock(&self.renewals)
            .pop_front()
            .unwrap_or(RenewalScript::StillValid);
        match script {
            RenewalScript::Refresh(token, claims) => {
                *lock(&self.current) = Some((token, claims));
                self.phase.transition(IdentityPhase::Authenticated)?;
                Ok(true)
            }
            RenewalScript::StillValid => {
                self.phase.transition(IdentityPhase::Authenticated)?;
                Ok(false)
            }
            RenewalScript::Fail(error) => {
                *lock(&self.current) = None;
                self.phase.reset_to_anonymous();
                Err(error)
            }
        }
    }

    async fn login(&self) -> Result<(), IdentityError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn logout(&self) -> Result<(), IdentityError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.current) = None;
        self.phase.reset_to_anonymous();
        Ok(())
    }

    fn on_expiring(&self) -> ExpiryReceiver {
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        self.notifier.subscribe()
    }

    fn access_token(&self) -> Option<AccessToken> {
        lock(&self.current).as_ref().map(|(token, _)| token.clone())
    }

    fn claims(&self) -> Option<TokenClaims> {
        lock(&self.current).as_ref().map(|(_, claims)| claims.clone())
    }

    fn phase(&self) -> IdentityPhase {
        self.phase.get()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
