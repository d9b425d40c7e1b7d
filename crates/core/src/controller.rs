//! Session controller: turns identity client outcomes into session state

use crate::claims::TokenClaims;
use crate::clock::{Clock, SystemClock};
use crate::config::{InitOptions, RenewalPolicy};
use crate::error::{SessionError, SessionResult};
use crate::guard::AccessGuard;
use crate::identity::{ExpiryReceiver, IdentityClient, TokenExpiring};
use crate::record::{AccessToken, Credentials, UserProfile};
use crate::state::{SessionReader, SessionState};
use crate::storage::KeyValueStorage;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, warn};

/// Maps provider claims to the application's user identifier
pub trait UserIdMapping {
    fn user_id(&self, claims: &TokenClaims) -> Option<String>;
}

/// Uses the provider subject (`sub`) as the user id
#[derive(Debug, Clone, Copy, Default)]
pub struct SubjectAsUserId;

impl UserIdMapping for SubjectAsUserId {
    fn user_id(&self, claims: &TokenClaims) -> Option<String> {
        Some(claims.sub.clone()).filter(|sub| !sub.is_empty())
    }
}

impl<F> UserIdMapping for F
where
    F: Fn(&TokenClaims) -> Option<String>,
{
    fn user_id(&self, claims: &TokenClaims) -> Option<String> {
        self(claims)
    }
}

/// Startup progress of the controller
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartupPhase {
    Idle,
    /// Handshake in flight; further start requests are suppressed
    Starting,
    Started {
        authenticated: bool,
    },
}

/// Result of [`SessionController::start`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartOutcome {
    Authenticated,
    Anonymous,
    /// Startup already ran or is running; nothing was done
    AlreadyStarted,
}

/// Result of handling one expiry notice
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenewalOutcome {
    /// A new token was obtained and published
    Refreshed,
    /// The token was still valid; state untouched
    Unchanged,
    /// Renewal was impossible; the session was cleared
    LoggedOut,
}

#[derive(Debug)]
enum ExpiryRegistration {
    Unregistered,
    Armed(ExpiryReceiver),
    Consumed,
}

struct ControllerInner {
    phase: StartupPhase,
    expiry: ExpiryRegistration,
}

/// Orchestrates startup, renewal and logout.
///
/// The controller is the only writer of its [`SessionState`]; everything else
/// observes through [`SessionReader`] or [`AccessGuard`].
pub struct SessionController<C, S> {
    client: C,
    state: SessionState<S>,
    options: InitOptions,
    policy: RenewalPolicy,
    clock: Arc<dyn Clock>,
    user_ids: Box<dyn UserIdMapping>,
    inner: Mutex<ControllerInner>,
}

impl<C, S> SessionController<C, S>
where
    C: IdentityClient,
    S: KeyValueStorage,
{
    pub fn new(client: C, storage: S) -> Self {
        Self {
            client,
            state: SessionState::new(storage),
            options: InitOptions::default(),
            policy: RenewalPolicy::default(),
            clock: Arc::new(SystemClock),
            user_ids: Box::new(SubjectAsUserId),
            inner: Mutex::new(ControllerInner {
                phase: StartupPhase::Idle,
                expiry: ExpiryRegistration::Unregistered,
            }),
        }
    }

    pub fn with_options(mut self, options: InitOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_policy(mut self, policy: RenewalPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_user_id_mapping(mut self, mapping: impl UserIdMapping + 'static) -> Self {
        self.user_ids = Box::new(mapping);
        self
    }

    /// Restore the persisted session, then run the provider handshake.
    ///
    /// Runs at most once per controller: later calls, including ones made
    /// while the first is still pending, return [`StartOutcome::AlreadyStarted`].
    pub async fn start(&self) -> StartOutcome {
        {
            let mut inner = self.lock();
            if inner.phase != StartupPhase::Idle {
                debug!("Session startup already {:?}", inner.phase);
                return StartOutcome::AlreadyStarted;
            }
            inner.phase = StartupPhase::Starting;
        }

        if self.state.restore(self.clock.now()) {
            info!("Restored persisted session, verifying with identity provider");
        }

        let authenticated = match self.client.initialize(&self.options).await {
            Ok(true) => match self.credentials_from_client() {
                Ok(credentials) => {
                    info!("Authenticated as {}", credentials.user_id());
                    self.state.set_credentials(credentials);
                    self.arm_renewal();
                    true
                }
                Err(e) => {
                    error!("Identity provider session unusable: {}", e);
                    self.state.logout();
                    false
                }
            },
            Ok(false) => {
                info!("No identity provider session");
                self.state.logout();
                false
            }
            Err(e) => {
                error!("Identity provider initialization failed: {}", e);
                self.state.logout();
                false
            }
        };

        self.lock().phase = StartupPhase::Started { authenticated };
        if authenticated {
            StartOutcome::Authenticated
        } else {
            StartOutcome::Anonymous
        }
    }

    /// React to one expiry notice: renew, then publish or log out
    pub async fn handle_expiring(&self, notice: TokenExpiring) -> RenewalOutcome {
        debug!("Token expiring at {:?}, renewing", notice.expires_at);

        match self.client.renew(self.policy.min_validity()).await {
            Ok(true) => match self.credentials_from_client() {
                Ok(credentials) => {
                    debug!("Token renewed");
                    self.state.set_credentials(credentials);
                    RenewalOutcome::Refreshed
                }
                Err(e) => {
                    warn!("Renewed session unusable, logging out: {}", e);
                    self.state.logout();
                    RenewalOutcome::LoggedOut
                }
            },
            Ok(false) => {
                debug!("Token still valid, no renewal needed");
                RenewalOutcome::Unchanged
            }
            Err(e) => {
                warn!("Token renewal failed, logging out: {}", e);
                self.state.logout();
                RenewalOutcome::LoggedOut
            }
        }
    }

    /// Drive renewals from the expiry subscription until the session ends.
    ///
    /// Only the first caller after a successful start gets the subscription;
    /// any other call returns immediately.
    pub async fn run_renewals(&self) {
        let receiver = {
            let mut inner = self.lock();
            match std::mem::replace(&mut inner.expiry, ExpiryRegistration::Consumed) {
                ExpiryRegistration::Armed(rx) => Some(rx),
                other => {
                    inner.expiry = other;
                    None
                }
            }
        };

        let Some(mut receiver) = receiver else {
            debug!("No expiry subscription to drive");
            return;
        };

        while let Some(notice) = receiver.recv().await {
            if self.handle_expiring(notice).await == RenewalOutcome::LoggedOut {
                break;
            }
        }
        debug!("Renewal loop finished");
    }

    /// Begin an interactive login with the identity provider
    pub async fn login(&self) {
        if let Err(e) = self.client.login().await {
            error!("Failed to start login: {}", e);
        }
    }

    /// Clear the session, then end the provider session
    pub async fn logout(&self) {
        self.state.logout();
        if let Err(e) = self.client.logout().await {
            warn!("Identity provider logout failed: {}", e);
        }
    }

    /// Publish externally obtained credentials
    pub fn set_credentials(&self, credentials: Credentials) {
        self.state.set_credentials(credentials);
    }

    /// Replace the token of the current session
    pub fn update_token(&self, token: AccessToken) -> bool {
        self.state.update_token(token)
    }

    pub fn subscribe(&self) -> SessionReader {
        self.state.subscribe()
    }

    pub fn guard(&self) -> AccessGuard {
        AccessGuard::new(self.state.subscribe())
    }

    pub fn state(&self) -> &SessionState<S> {
        &self.state
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn policy(&self) -> &RenewalPolicy {
        &self.policy
    }

    pub fn phase(&self) -> StartupPhase {
        self.lock().phase
    }

    /// Whether the expiry subscription has been taken out
    pub fn renewal_armed(&self) -> bool {
        !matches!(self.lock().expiry, ExpiryRegistration::Unregistered)
    }

    fn arm_renewal(&self) {
        let mut inner = self.lock();
        if matches!(inner.expiry, ExpiryRegistration::Unregistered) {
            inner.expiry = ExpiryRegistration::Armed(self.client.on_expiring());
            debug!("Expiry notifications armed");
        }
    }

    fn credentials_from_client(&self) -> SessionResult<Credentials> {
        let token = self
            .client
            .access_token()
            .ok_or(SessionError::MissingIdentity { what: "access token" })?;
        let claims = self
            .client
            .claims()
            .ok_or(SessionError::MissingIdentity { what: "claims" })?;
        let user_id = self
            .user_ids
            .user_id(&claims)
            .ok_or(SessionError::incomplete("userId"))?;

        Credentials::new(
            UserProfile::from_claims(&claims),
            token,
            user_id,
            claims.sub.clone(),
        )
    }

    fn lock(&self) -> MutexGuard<'_, ControllerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IdentityError;
    use crate::record::SessionRecord;
    use crate::storage::{MemoryStorage, Slot};
    use crate::tests::{CountingStorage, ScriptedIdentityClient, unsigned_token};
    use serde_json::json;

    fn claims(sub: &str, email: &str) -> TokenClaims {
        TokenClaims {
            sub: sub.to_string(),
            email: Some(email.to_string()),
            given_name: Some("A".to_string()),
            family_name: Some("B".to_string()),
            ..Default::default()
        }
    }

    fn controller(
        client: ScriptedIdentityClient,
    ) -> (
        SessionController<ScriptedIdentityClient, Arc<CountingStorage>>,
        Arc<CountingStorage>,
    ) {
        let storage = Arc::new(CountingStorage::new());
        (SessionController::new(client, storage.clone()), storage)
    }

    #[tokio::test]
    async fn test_cold_start_without_session() {
        let (controller, storage) = controller(ScriptedIdentityClient::new());

        assert_eq!(controller.start().await, StartOutcome::Anonymous);
        assert!(!controller.guard().can_access());
        assert!(storage.is_empty());
        assert!(!controller.renewal_armed());
        assert_eq!(
            controller.phase(),
            StartupPhase::Started {
                authenticated: false
            }
        );
    }

    #[tokio::test]
    async fn test_stored_session_confirmed_by_handshake() {
        let client = ScriptedIdentityClient::new()
            .with_session(AccessToken::new("tok-1"), claims("uid-1", "a@b.com"));
        let (controller, storage) = controller(client);

        // Left behind by a previous page
        SessionState::new(storage.clone()).set_credentials(
            Credentials::new(
                UserProfile::new("old@b.com", "Old", "User"),
                AccessToken::new("stale"),
                "uid-1",
                "uid-1",
            )
            .unwrap(),
        );

        assert_eq!(controller.start().await, StartOutcome::Authenticated);

        let snapshot = serde_json::to_value(controller.state().current().snapshot()).unwrap();
        assert_eq!(
            snapshot,
            json!({
                "user": {"email": "a@b.com", "firstName": "A", "lastName": "B"},
                "token": "tok-1",
                "userId": "uid-1",
                "keycloakId": "uid-1",
                "isAuthenticated": true
            })
        );
        for slot in Slot::ALL {
            assert!(storage.get_item(slot.key()).unwrap().is_some());
        }
        assert_eq!(storage.get_item("token").unwrap().as_deref(), Some("tok-1"));
        assert!(controller.renewal_armed());
    }

    #[tokio::test]
    async fn test_handshake_failure_is_anonymous() {
        let client = ScriptedIdentityClient::new()
            .with_init_error(IdentityError::Transport("connection refused".into()));
        let (controller, storage) = controller(client);
        storage.set_item("token", "tok").unwrap();
        storage.set_item("isAuthenticated", "true").unwrap();

        assert_eq!(controller.start().await, StartOutcome::Anonymous);
        assert!(!controller.guard().can_access());
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_handshake_without_subject_is_anonymous() {
        let client = ScriptedIdentityClient::new()
            .with_session(AccessToken::new("tok"), claims("", "a@b.com"));
        let (controller, _) = controller(client);

        assert_eq!(controller.start().await, StartOutcome::Anonymous);
        assert!(!controller.renewal_armed());
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let client = ScriptedIdentityClient::new()
            .with_session(AccessToken::new("tok"), claims("uid-1", "a@b.com"));
        let (controller, _) = controller(client);

        let (first, second) = tokio::join!(controller.start(), controller.start());
        let third = controller.start().await;

        let outcomes = [first, second, third];
        assert_eq!(
            outcomes
                .iter()
                .filter(|o| **o == StartOutcome::Authenticated)
                .count(),
            1
        );
        assert_eq!(
            outcomes
                .iter()
                .filter(|o| **o == StartOutcome::AlreadyStarted)
                .count(),
            2
        );
        assert_eq!(controller.client().initialize_calls(), 1);
        assert_eq!(controller.client().expiry_subscriptions(), 1);
    }

    #[tokio::test]
    async fn test_renewal_replaces_token_and_user_together() {
        let client = ScriptedIdentityClient::new()
            .with_session(AccessToken::new("tok-1"), claims("uid-1", "a@b.com"));
        let (controller, storage) = controller(client);
        controller.start().await;

        let mut reader = controller.subscribe();
        controller.client().queue_refresh(
            AccessToken::new("tok-2"),
            claims("uid-1", "renamed@b.com"),
        );

        let outcome = controller
            .handle_expiring(TokenExpiring { expires_at: None })
            .await;
        assert_eq!(outcome, RenewalOutcome::Refreshed);
        assert_eq!(
            controller.client().renew_requests(),
            vec![std::time::Duration::from_secs(30)]
        );

        let seen = reader.changed().await.unwrap();
        assert_eq!(seen.access_token(), Some(&AccessToken::new("tok-2")));
        assert_eq!(seen.user().unwrap().email, "renamed@b.com");
        assert_eq!(storage.get_item("token").unwrap().as_deref(), Some("tok-2"));
    }

    #[tokio::test]
    async fn test_renewal_rejection_logs_out() {
        let client = ScriptedIdentityClient::new()
            .with_session(AccessToken::new("tok-1"), claims("uid-1", "a@b.com"));
        let (controller, storage) = controller(client);
        controller.start().await;
        assert!(controller.guard().can_access());

        controller
            .client()
            .queue_renewal_error(IdentityError::SessionExpired);
        let outcome = controller
            .handle_expiring(TokenExpiring { expires_at: None })
            .await;

        assert_eq!(outcome, RenewalOutcome::LoggedOut);
        assert_eq!(controller.state().current(), SessionRecord::Anonymous);
        assert!(!controller.guard().can_access());
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_still_valid_token_writes_nothing() {
        let client = ScriptedIdentityClient::new()
            .with_session(AccessToken::new("tok-1"), claims("uid-1", "a@b.com"));
        let (controller, storage) = controller(client);
        controller.start().await;

        let before = controller.state().current();
        let writes = storage.writes();
        let mut reader = controller.subscribe();

        controller.client().queue_still_valid();
        let outcome = controller
            .handle_expiring(TokenExpiring { expires_at: None })
            .await;

        assert_eq!(outcome, RenewalOutcome::Unchanged);
        assert_eq!(controller.state().current(), before);
        assert_eq!(storage.writes(), writes);
        assert!(futures::FutureExt::now_or_never(reader.changed()).is_none());
    }

    #[tokio::test]
    async fn test_renewal_loop_driven_by_notices() {
        let client = ScriptedIdentityClient::new()
            .with_session(AccessToken::new("tok-1"), claims("uid-1", "a@b.com"));
        let (controller, _) = controller(client);
        controller.start().await;

        controller.client().queue_still_valid();
        controller.client().queue_renewal_error(IdentityError::SessionExpired);
        controller.client().fire_expiring();
        controller.client().fire_expiring();

        // Ends on its own once the session is cleared
        controller.run_renewals().await;
        assert!(!controller.guard().can_access());
        assert_eq!(controller.client().renew_requests().len(), 2);

        // The subscription is handed out once
        controller.run_renewals().await;
        assert_eq!(controller.client().expiry_subscriptions(), 1);
    }

    #[tokio::test]
    async fn test_custom_user_id_mapping() {
        let client = ScriptedIdentityClient::new()
            .with_session(AccessToken::new("tok"), claims("kc-42", "a@b.com"));
        let storage = Arc::new(MemoryStorage::new());
        let controller = SessionController::new(client, storage.clone())
            .with_user_id_mapping(|claims: &TokenClaims| claims.email.clone());

        controller.start().await;
        let record = controller.state().current();
        assert_eq!(record.user_id(), Some("a@b.com"));
        assert_eq!(record.provider_subject_id(), Some("kc-42"));
        assert_eq!(storage.get_item("keycloakId").unwrap().as_deref(), Some("kc-42"));
    }

    #[tokio::test]
    async fn test_logout_clears_then_ends_provider_session() {
        let token = unsigned_token(&json!({"sub": "uid-1"}));
        let client = ScriptedIdentityClient::new()
            .with_session(AccessToken::new(token), claims("uid-1", "a@b.com"));
        let (controller, storage) = controller(client);
        controller.start().await;

        controller.logout().await;
        assert_eq!(controller.state().current(), SessionRecord::Anonymous);
        assert!(storage.is_empty());
        assert_eq!(controller.client().logout_calls(), 1);
    }

    #[tokio::test]
    async fn test_login_delegates_to_client() {
        let (controller, _) = controller(ScriptedIdentityClient::new());
        controller.start().await;
        controller.login().await;
        assert_eq!(controller.client().login_calls(), 1);
    }
}
