//! OpenID Connect authorization code + PKCE client

pub mod error;
pub mod tokens;

use crate::callback::{AuthCallback, strip_callback_params};
use crate::endpoints::ProviderEndpoints;
use crate::navigator::Navigator;
use crate::pending::{PendingAuthorization, SSO_CHECKED_KEY};
use crate::pkce::{PkcePair, generate_state};
use async_trait::async_trait;
use error::ClientError;
use reqwest::{Client, ClientBuilder};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use stride_core::{
    AccessToken, Clock, ExpiryNotifier, ExpiryReceiver, IdentityClient, IdentityConfig,
    IdentityError, IdentityPhase, InitOptions, KeyValueStorage, OnLoad, PhaseTracker,
    PkceMethod, SystemClock, TokenClaims, TokenExpiring,
};
use tokens::{TokenResponse, TokenSet};
use url::Url;

/// Errors a silent check returns when the provider has no usable session
const NO_SESSION_ERRORS: &[&str] = &[
    "login_required",
    "interaction_required",
    "consent_required",
    "account_selection_required",
];

/// Browser-side identity client for a Keycloak-style provider.
///
/// `S` is transient storage that survives the provider redirect (session
/// storage in the browser); `N` reads and drives the page location.
pub struct OidcClient<S, N> {
    http: Client,
    config: IdentityConfig,
    endpoints: ProviderEndpoints,
    transient: S,
    navigator: N,
    clock: Arc<dyn Clock>,
    leeway: Duration,
    pkce_method: Mutex<PkceMethod>,
    phase: PhaseTracker,
    notifier: ExpiryNotifier,
    tokens: Mutex<Option<TokenSet>>,
    notified_for: Mutex<Option<SentNotice>>,
}

/// Last expiry notice raised
struct SentNotice {
    token: AccessToken,
    expired: bool,
}

impl<S: KeyValueStorage, N: Navigator> OidcClient<S, N> {
    /// Create a client with default HTTP settings
    pub fn new(config: IdentityConfig, transient: S, navigator: N) -> Result<Self, ClientError> {
        let mut builder = ClientBuilder::new();

        #[cfg(not(target_arch = "wasm32"))]
        {
            builder = builder
                .timeout(Duration::from_secs(30))
                .user_agent(concat!("stride-http/", env!("CARGO_PKG_VERSION")));
        }

        let http = builder.build()?;
        Self::with_http_client(config, transient, navigator, http)
    }

    /// Create a client around an existing `reqwest::Client`
    pub fn with_http_client(
        config: IdentityConfig,
        transient: S,
        navigator: N,
        http: Client,
    ) -> Result<Self, ClientError> {
        let endpoints = ProviderEndpoints::from_config(&config)?;
        Ok(Self {
            http,
            config,
            endpoints,
            transient,
            navigator,
            clock: Arc::new(SystemClock),
            leeway: Duration::from_secs(5),
            pkce_method: Mutex::new(PkceMethod::S256),
            phase: PhaseTracker::new(),
            notifier: ExpiryNotifier::new(),
            tokens: Mutex::new(None),
            notified_for: Mutex::new(None),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// How long before expiry [`check_expiry`](Self::check_expiry) raises a notice
    pub fn with_expiry_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }

    pub fn endpoints(&self) -> &ProviderEndpoints {
        &self.endpoints
    }

    pub fn navigator(&self) -> &N {
        &self.navigator
    }

    pub fn transient_storage(&self) -> &S {
        &self.transient
    }

    /// Raise an expiry notice if the access token is inside the leeway.
    ///
    /// One notice is raised per access token while it nears expiry, and one
    /// more once it has expired. Returns whether a notice was sent.
    pub fn check_expiry(&self) -> bool {
        if self.phase.get() != IdentityPhase::Authenticated {
            return false;
        }

        let (token, expires_at) = match lock(&self.tokens).as_ref() {
            Some(set) => match set.expires_at {
                Some(expires_at) => (set.access_token.clone(), expires_at),
                None => return false,
            },
            None => return false,
        };

        let now = self.clock.now();
        let leeway = chrono::Duration::from_std(self.leeway).unwrap_or_else(|_| chrono::Duration::zero());
        if expires_at - now > leeway {
            return false;
        }

        let expired = now >= expires_at;
        {
            let mut notified = lock(&self.notified_for);
            if notified
                .as_ref()
                .is_some_and(|sent| sent.token == token && (sent.expired || !expired))
            {
                return false;
            }
            *notified = Some(SentNotice { token, expired });
        }

        debug!("Access token expires at {}, raising expiry notice", expires_at);
        self.notifier.notify(TokenExpiring {
            expires_at: Some(expires_at),
        });
        true
    }

    /// Redirect target registered with the provider, without callback noise
    fn redirect_uri(&self) -> Result<String, ClientError> {
        if let Some(uri) = &self.config.redirect_uri {
            return Ok(uri.clone());
        }
        let mut current = strip_callback_params(&self.navigator.current_url()?);
        current.set_fragment(None);
        Ok(current.to_string())
    }

    fn scope(&self) -> String {
        let mut scopes = self.config.scopes.clone();
        if !scopes.iter().any(|s| s == "openid") {
            scopes.insert(0, "openid".to_string());
        }
        scopes.join(" ")
    }

    /// Persist a fresh PKCE authorization and send the browser to the provider
    fn begin_authorization(&self, silent: bool) -> Result<(), ClientError> {
        let method = *lock(&self.pkce_method);
        let pkce = PkcePair::generate(method)?;
        let pending = PendingAuthorization {
            state: generate_state()?,
            code_verifier: pkce.verifier,
            redirect_uri: self.redirect_uri()?,
            nonce: generate_state()?,
            silent,
        };
        pending.save(&self.transient)?;

        let mut url = self.endpoints.authorization.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &self.config.client_id)
                .append_pair("redirect_uri", &pending.redirect_uri)
                .append_pair("state", &pending.state)
                .append_pair("response_mode", "fragment")
                .append_pair("response_type", "code")
                .append_pair("scope", &self.scope())
                .append_pair("nonce", &pending.nonce)
                .append_pair("code_challenge", &pkce.challenge)
                .append_pair("code_challenge_method", pkce.method.as_str());
            if silent {
                query.append_pair("prompt", "none");
            }
        }

        info!(
            "Redirecting to identity provider ({})",
            if silent { "silent check" } else { "login" }
        );
        self.navigator.redirect(&url)
    }

    /// Settle an authorization response found in the current URL
    async fn complete_authorization(&self, callback: AuthCallback) -> Result<bool, ClientError> {
        let pending = PendingAuthorization::take(&self.transient)?
            .ok_or_else(|| ClientError::InvalidState("no authorization in flight".into()))?;
        if callback.state() != Some(pending.state.as_str()) {
            return Err(ClientError::InvalidState("state does not match".into()));
        }

        match callback {
            AuthCallback::Error {
                error, description, ..
            } => {
                if pending.silent {
                    if NO_SESSION_ERRORS.contains(&error.as_str()) {
                        debug!("Silent check found no provider session: {}", error);
                        self.transient.set_item(SSO_CHECKED_KEY, "true")?;
                    } else {
                        warn!("Silent check failed: {}", error);
                    }
                    return Ok(false);
                }
                Err(ClientError::OAuth {
                    status: 0,
                    error,
                    description,
                })
            }
            AuthCallback::Code { code, .. } => {
                let set = self.exchange_code(&code, &pending).await?;
                if let Some(id_token) = &set.id_token {
                    let id_claims = TokenClaims::decode_unverified(id_token)
                        .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;
                    if id_claims.nonce.as_deref() != Some(pending.nonce.as_str()) {
                        return Err(ClientError::InvalidState("nonce does not match".into()));
                    }
                }

                self.transient.remove_item(SSO_CHECKED_KEY)?;
                *lock(&self.tokens) = Some(set);
                Ok(true)
            }
        }
    }

    async fn exchange_code(
        &self,
        code: &str,
        pending: &PendingAuthorization,
    ) -> Result<TokenSet, ClientError> {
        let response = self
            .token_request(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", &self.config.client_id),
                ("redirect_uri", &pending.redirect_uri),
                ("code_verifier", &pending.code_verifier),
            ])
            .await?;
        TokenSet::from_response(response, self.clock.now())
    }

    async fn refresh(&self, current: &TokenSet) -> Result<TokenSet, ClientError> {
        let refresh_token = current
            .refresh_token
            .as_deref()
            .ok_or_else(|| ClientError::InvalidState("no refresh token".into()))?;
        let response = self
            .token_request(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", &self.config.client_id),
            ])
            .await?;
        current.refreshed(response, self.clock.now())
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> Result<TokenResponse, ClientError> {
        let response = self
            .http
            .post(self.endpoints.token.clone())
            .form(params)
            .send()
            .await?;
        let status = response.status();

        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| ClientError::InvalidResponse(e.to_string()))
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ClientError::from_response(status, &body))
        }
    }

    fn end_session_url(&self, id_token: Option<&str>) -> Result<Url, ClientError> {
        let post_logout = match self
            .config
            .post_logout_redirect_uri
            .as_ref()
            .or(self.config.redirect_uri.as_ref())
        {
            Some(uri) => uri.clone(),
            None => self.redirect_uri()?,
        };

        let mut url = self.endpoints.end_session.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &self.config.client_id)
                .append_pair("post_logout_redirect_uri", &post_logout);
            if let Some(id_token) = id_token {
                query.append_pair("id_token_hint", id_token);
            }
        }
        Ok(url)
    }

    fn drop_session(&self) -> Option<TokenSet> {
        let previous = lock(&self.tokens).take();
        *lock(&self.notified_for) = None;
        self.phase.reset_to_anonymous();
        previous
    }

    fn fail_initialize(&self, err: ClientError) -> IdentityError {
        warn!("Identity handshake failed: {}", err);
        self.drop_session();
        err.into()
    }
}

#[async_trait(?Send)]
impl<S: KeyValueStorage, N: Navigator> IdentityClient for OidcClient<S, N> {
    async fn initialize(&self, options: &InitOptions) -> Result<bool, IdentityError> {
        self.phase.transition(IdentityPhase::Initializing)?;
        *lock(&self.pkce_method) = options.pkce_method;
        if options.check_login_iframe {
            warn!("Login status iframe is not supported; ignoring check_login_iframe");
        }

        let current = self
            .navigator
            .current_url()
            .map_err(|e| self.fail_initialize(e))?;

        if let Some(callback) = AuthCallback::from_url(&current) {
            self.navigator
                .replace_url(&strip_callback_params(&current))
                .map_err(|e| self.fail_initialize(e))?;

            let authenticated = self
                .complete_authorization(callback)
                .await
                .map_err(|e| self.fail_initialize(e))?;
            if authenticated {
                self.phase.transition(IdentityPhase::Authenticated)?;
                info!("Identity session established");
            } else {
                self.phase.transition(IdentityPhase::Anonymous)?;
            }
            return Ok(authenticated);
        }

        let silent = match options.on_load {
            OnLoad::CheckSso => {
                let checked = self
                    .transient
                    .get_item(SSO_CHECKED_KEY)
                    .map_err(|e| self.fail_initialize(e.into()))?;
                if checked.is_some() {
                    debug!("Provider session already checked in this tab");
                    self.phase.transition(IdentityPhase::Anonymous)?;
                    return Ok(false);
                }
                true
            }
            OnLoad::LoginRequired => false,
        };

        self.begin_authorization(silent)
            .map_err(|e| self.fail_initialize(e))?;

        // The page is being replaced; the callback is handled on the next load.
        std::future::pending().await
    }

    async fn renew(&self, min_validity: Duration) -> Result<bool, IdentityError> {
        if let Err(err) = self
            .phase
            .transition_from(IdentityPhase::Authenticated, IdentityPhase::Renewing)
        {
            return match self.phase.get() {
                IdentityPhase::Renewing => {
                    debug!("Renewal already in progress");
                    Ok(false)
                }
                IdentityPhase::Uninitialized | IdentityPhase::Anonymous => {
                    Err(IdentityError::NotAuthenticated)
                }
                _ => Err(err),
            };
        }

        let current = lock(&self.tokens).clone();
        let Some(current) = current else {
            self.drop_session();
            return Err(IdentityError::NotAuthenticated);
        };

        let now = self.clock.now();
        if current.is_valid_for(now, min_validity) {
            self.phase.transition(IdentityPhase::Authenticated)?;
            return Ok(false);
        }

        if !current.can_refresh(now) {
            info!("Refresh token missing or expired, session ends");
            self.drop_session();
            return Err(IdentityError::SessionExpired);
        }

        match self.refresh(&current).await {
            Ok(next) => {
                *lock(&self.tokens) = Some(next);
                *lock(&self.notified_for) = None;
                self.phase.transition(IdentityPhase::Authenticated)?;
                debug!("Access token refreshed");
                Ok(true)
            }
            Err(err) => {
                warn!("Token refresh failed: {}", err);
                self.drop_session();
                Err(err.into())
            }
        }
    }

    async fn login(&self) -> Result<(), IdentityError> {
        if self.phase.get().can_transition_to(IdentityPhase::Initializing) {
            self.phase.transition(IdentityPhase::Initializing)?;
        }
        self.transient.remove_item(SSO_CHECKED_KEY)?;
        self.begin_authorization(false).map_err(|e| {
            self.phase.reset_to_anonymous();
            IdentityError::from(e)
        })
    }

    async fn logout(&self) -> Result<(), IdentityError> {
        let previous = self.drop_session();
        let id_token = previous.and_then(|set| set.id_token);
        let url = self.end_session_url(id_token.as_deref())?;
        info!("Ending provider session");
        self.navigator.redirect(&url)?;
        Ok(())
    }

    fn on_expiring(&self) -> ExpiryReceiver {
        self.notifier.subscribe()
    }

    fn access_token(&self) -> Option<AccessToken> {
        let now = self.clock.now();
        lock(&self.tokens)
            .as_ref()
            .filter(|set| !set.is_expired(now))
            .map(|set| set.access_token.clone())
    }

    fn claims(&self) -> Option<TokenClaims> {
        lock(&self.tokens).as_ref().map(|set| set.claims.clone())
    }

    fn phase(&self) -> IdentityPhase {
        self.phase.get()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
