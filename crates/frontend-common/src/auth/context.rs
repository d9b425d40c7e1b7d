//! Global session context and provider

use crate::config::SessionConfig;
use crate::error::SetupError;
use crate::navigator::BrowserNavigator;
use crate::storage::BrowserStorage;
use gloo::timers::callback::Interval;
use std::fmt;
use std::rc::Rc;
use stride_core::{
    AccessDecision, AccessToken, Credentials, SessionController, SessionRecord, SessionSnapshot,
    StrideConfig, can_access,
};
use stride_http::OidcClient;
use tracing::{error, warn};
use wasm_bindgen_futures::spawn_local;
use yew::prelude::*;

/// Identity client wired to the browser
pub type BrowserIdentityClient = OidcClient<BrowserStorage, BrowserNavigator>;

/// Session controller wired to the browser
pub type BrowserSessionController = SessionController<BrowserIdentityClient, BrowserStorage>;

/// Assemble the page's session controller from `config`
pub fn build_controller(config: &StrideConfig) -> Result<BrowserSessionController, SetupError> {
    let client = OidcClient::new(
        config.identity.clone(),
        BrowserStorage::session()?,
        BrowserNavigator,
    )?
    .with_expiry_leeway(config.renewal.expiry_leeway());

    Ok(SessionController::new(client, BrowserStorage::local()?)
        .with_options(config.init.clone())
        .with_policy(config.renewal.clone()))
}

/// What components see of the session
#[derive(Clone, Default)]
pub struct SessionContext {
    /// Latest published record
    pub record: SessionRecord,
    /// Startup has settled
    pub ready: bool,
    controller: Option<Rc<BrowserSessionController>>,
}

impl PartialEq for SessionContext {
    fn eq(&self, other: &Self) -> bool {
        self.record == other.record
            && self.ready == other.ready
            && match (&self.controller, &other.controller) {
                (Some(a), Some(b)) => Rc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            }
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("record", &self.record)
            .field("ready", &self.ready)
            .finish_non_exhaustive()
    }
}

impl SessionContext {
    pub fn is_authenticated(&self) -> bool {
        self.record.is_authenticated()
    }

    pub fn decision(&self) -> AccessDecision {
        if can_access(&self.record) {
            AccessDecision::Allow
        } else {
            AccessDecision::RequireLogin
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.record.snapshot()
    }

    /// Send the user to the provider's login page
    pub fn login(&self) {
        let Some(controller) = self.controller.clone() else {
            warn!("Login requested without a session controller");
            return;
        };
        spawn_local(async move { controller.login().await });
    }

    /// Clear the session, then end the provider session
    pub fn logout(&self) {
        let Some(controller) = self.controller.clone() else {
            warn!("Logout requested without a session controller");
            return;
        };
        spawn_local(async move { controller.logout().await });
    }

    pub fn set_credentials(&self, credentials: Credentials) {
        if let Some(controller) = &self.controller {
            controller.set_credentials(credentials);
        }
    }

    /// Replace the token of the current session; false when anonymous
    pub fn update_token(&self, token: AccessToken) -> bool {
        self.controller
            .as_ref()
            .is_some_and(|controller| controller.update_token(token))
    }
}

/// Session provider props
#[derive(Properties, PartialEq)]
pub struct SessionProviderProps {
    pub children: Children,
    /// Read once when the provider mounts
    #[prop_or_else(SessionConfig::load)]
    pub config: StrideConfig,
}

/// Owns the page's session controller and publishes its record
#[function_component(SessionProvider)]
pub fn session_provider(props: &SessionProviderProps) -> Html {
    let controller = {
        let config = props.config.clone();
        use_memo((), move |_| match build_controller(&config) {
            Ok(controller) => Some(Rc::new(controller)),
            Err(e) => {
                error!("Session unavailable, staying anonymous: {}", e);
                None
            }
        })
    };
    let record = use_state(SessionRecord::default);
    let ready = use_state(|| false);

    {
        let controller = controller.clone();
        let record = record.clone();
        let ready = ready.clone();
        use_effect_with((), move |_| {
            let mut poller = None;

            if let Some(controller) = (*controller).clone() {
                let mut reader = controller.subscribe();
                spawn_local(async move {
                    while let Some(next) = reader.changed().await {
                        record.set(next);
                    }
                });

                let poll_every = controller.policy().poll_interval_ms;
                let polled = controller.clone();
                poller = Some(Interval::new(poll_every, move || {
                    polled.client().check_expiry();
                }));

                spawn_local(async move {
                    controller.start().await;
                    ready.set(true);
                    controller.run_renewals().await;
                });
            } else {
                ready.set(true);
            }

            move || drop(poller)
        });
    }

    let context = SessionContext {
        record: (*record).clone(),
        ready: *ready,
        controller: (*controller).clone(),
    };

    html! {
        <ContextProvider<SessionContext> context={context}>
            {props.children.clone()}
        </ContextProvider<SessionContext>>
    }
}

/// Hook to use the session context; anonymous outside a [`SessionProvider`]
#[hook]
pub fn use_session() -> SessionContext {
    use_context::<SessionContext>().unwrap_or_default()
}

/// Hook to check if authenticated
#[hook]
pub fn use_is_authenticated() -> bool {
    use_session().is_authenticated()
}

/// Hook to get the serializable session view
#[hook]
pub fn use_session_snapshot() -> SessionSnapshot {
    use_session().snapshot()
}

#[cfg(test)]
mod tests {
    use super::*;
    use stride_core::UserProfile;

    fn signed_in() -> SessionContext {
        let credentials = Credentials::new(
            UserProfile::new("ada@example.com", "Ada", "Lovelace"),
            AccessToken::new("tok"),
            "u-1",
            "u-1",
        )
        .unwrap();
        SessionContext {
            record: SessionRecord::Authenticated(credentials),
            ready: true,
            controller: None,
        }
    }

    #[test]
    fn test_default_context_denies_access() {
        let context = SessionContext::default();
        assert!(!context.is_authenticated());
        assert!(!context.ready);
        assert_eq!(context.decision(), AccessDecision::RequireLogin);
        assert!(!context.update_token(AccessToken::new("t")));
    }

    #[test]
    fn test_authenticated_context_allows_access() {
        let context = signed_in();
        assert_eq!(context.decision(), AccessDecision::Allow);
        assert_eq!(context.snapshot().user_id.as_deref(), Some("u-1"));
    }

    #[test]
    fn test_equality_follows_record_and_readiness() {
        assert_eq!(signed_in(), signed_in());
        assert_ne!(signed_in(), SessionContext::default());

        let mut loading = signed_in();
        loading.ready = false;
        assert_ne!(signed_in(), loading);
    }
}
