//! Stride HTTP identity client
//!
//! OpenID Connect authorization code flow with PKCE against a Keycloak-style
//! provider: silent session checks, callback handling, refresh-token renewal,
//! expiry notices and end-session logout.

#[macro_use]
extern crate tracing;

pub mod callback;
pub mod client;
pub mod endpoints;
pub mod navigator;
pub mod pending;
pub mod pkce;

pub use callback::{AuthCallback, strip_callback_params};
pub use client::OidcClient;
pub use client::error::ClientError;
pub use client::tokens::{TokenResponse, TokenSet};
pub use endpoints::ProviderEndpoints;
pub use navigator::{MemoryNavigator, Navigator};
pub use pending::PendingAuthorization;
pub use pkce::PkcePair;
