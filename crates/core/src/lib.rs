//! Stride session core: the client-side session and token lifecycle
//!
//! Platform-neutral pieces shared by the HTTP identity client and the
//! browser glue: the session record and its persisted mirror, the observable
//! state container, the identity client contract with its lifecycle state
//! machine, the session controller and the access guard.

pub mod claims;
pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod guard;
pub mod identity;
pub mod lifecycle;
pub mod record;
pub mod state;
pub mod storage;
pub mod store;

#[cfg(any(test, feature = "tests"))]
pub mod tests;

pub use claims::TokenClaims;
pub use clock::{Clock, SystemClock};
pub use config::{IdentityConfig, InitOptions, OnLoad, PkceMethod, RenewalPolicy, StrideConfig};
pub use controller::{
    RenewalOutcome, SessionController, StartOutcome, StartupPhase, SubjectAsUserId,
    UserIdMapping,
};
pub use error::{IdentityError, SessionError, SessionResult, StorageError};
pub use guard::{AccessDecision, AccessGuard, can_access};
pub use identity::{ExpiryNotifier, ExpiryReceiver, IdentityClient, TokenExpiring};
pub use lifecycle::{IdentityPhase, PhaseTracker};
pub use record::{AccessToken, Credentials, SessionRecord, SessionSnapshot, UserProfile};
pub use state::{SessionReader, SessionState};
pub use storage::{KeyValueStorage, MemoryStorage, Slot};
pub use store::{CredentialStore, PersistedSession};
