//! Credential store: the five-slot persisted mirror of the session record

use crate::claims::TokenClaims;
use crate::record::{AccessToken, Credentials, SessionRecord, UserProfile};
use crate::storage::{KeyValueStorage, Slot};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

/// Whatever subset of a persisted session could be read back.
///
/// Every field is independent; a missing or malformed slot is `None`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PersistedSession {
    pub user: Option<UserProfile>,
    pub token: Option<AccessToken>,
    pub user_id: Option<String>,
    pub is_authenticated: bool,
    pub keycloak_id: Option<String>,
}

impl PersistedSession {
    /// Whether nothing at all was stored
    pub fn is_empty(&self) -> bool {
        self.user.is_none()
            && self.token.is_none()
            && self.user_id.is_none()
            && !self.is_authenticated
            && self.keycloak_id.is_none()
    }

    /// Promote the stored fields to a record.
    ///
    /// Anything short of a complete, unexpired set collapses to
    /// [`SessionRecord::Anonymous`]. Tokens that are not JWTs are opaque and
    /// kept as-is.
    pub fn into_record(self, now: DateTime<Utc>) -> SessionRecord {
        if !self.is_authenticated {
            return SessionRecord::Anonymous;
        }

        let (Some(user), Some(token), Some(user_id), Some(subject)) =
            (self.user, self.token, self.user_id, self.keycloak_id)
        else {
            debug!("Persisted session is incomplete, treating as anonymous");
            return SessionRecord::Anonymous;
        };

        if let Ok(claims) = TokenClaims::decode_unverified(token.as_str()) {
            if claims.is_expired_at(now) {
                debug!("Persisted token expired at {:?}", claims.expires_at());
                return SessionRecord::Anonymous;
            }
        }

        match Credentials::new(user, token, user_id, subject) {
            Ok(credentials) => SessionRecord::Authenticated(credentials),
            Err(e) => {
                debug!("Persisted session rejected: {}", e);
                SessionRecord::Anonymous
            }
        }
    }
}

/// Persists session records into a [`KeyValueStorage`]
#[derive(Debug)]
pub struct CredentialStore<S> {
    storage: S,
}

impl<S: KeyValueStorage> CredentialStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Borrow the underlying medium
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Write all five slots for an authenticated record, or clear them for an
    /// anonymous one. Write failures are logged; the in-memory record stays
    /// authoritative.
    pub fn save(&self, record: &SessionRecord) {
        let Some(credentials) = record.credentials() else {
            self.clear();
            return;
        };

        match serde_json::to_string(credentials.user()) {
            Ok(user) => self.write(Slot::User, &user),
            Err(e) => warn!("Failed to serialize user profile: {}", e),
        }
        self.write(Slot::Token, credentials.access_token().as_str());
        self.write(Slot::UserId, credentials.user_id());
        self.write(Slot::KeycloakId, credentials.provider_subject_id());
        self.write(Slot::IsAuthenticated, "true");
    }

    /// Replace only the token slot
    pub fn save_token(&self, token: &AccessToken) {
        self.write(Slot::Token, token.as_str());
    }

    /// Read back whatever parses. Never fails.
    pub fn load(&self) -> PersistedSession {
        let user = self.read(Slot::User).and_then(|raw| {
            serde_json::from_str::<UserProfile>(&raw)
                .map_err(|e| debug!("Dropping malformed user slot: {}", e))
                .ok()
        });

        PersistedSession {
            user,
            token: self.read(Slot::Token).map(AccessToken::new),
            user_id: self.read(Slot::UserId),
            is_authenticated: self.read(Slot::IsAuthenticated).as_deref() == Some("true"),
            keycloak_id: self.read(Slot::KeycloakId),
        }
    }

    /// Remove all five slots
    pub fn clear(&self) {
        for slot in Slot::ALL {
            if let Err(e) = self.storage.remove_item(slot.key()) {
                warn!("Failed to clear {} slot: {}", slot.key(), e);
            }
        }
    }

    fn read(&self, slot: Slot) -> Option<String> {
        match self.storage.get_item(slot.key()) {
            Ok(Some(value)) if !value.is_empty() => Some(value),
            Ok(_) => None,
            Err(e) => {
                debug!("Unreadable {} slot: {}", slot.key(), e);
                None
            }
        }
    }

    fn write(&self, slot: Slot, value: &str) {
        if let Err(e) = self.storage.set_item(slot.key(), value) {
            warn!("Failed to persist {} slot: {}", slot.key(), e);
        }
    }
}
