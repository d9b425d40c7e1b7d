//! Observable session state container

use crate::record::{AccessToken, Credentials, SessionRecord};
use crate::storage::KeyValueStorage;
use crate::store::CredentialStore;
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, info};

/// Owner of the in-memory session record and its persisted mirror.
///
/// Every mutation writes the credential store first and then publishes the
/// whole record in one step, so readers never see a half-updated record and
/// the store never lags behind memory once a call returns. There is exactly
/// one `SessionState` per page; readers hold [`SessionReader`] handles.
#[derive(Debug)]
pub struct SessionState<S> {
    store: CredentialStore<S>,
    tx: watch::Sender<SessionRecord>,
}

impl<S: KeyValueStorage> SessionState<S> {
    /// Create an empty (anonymous) state backed by `storage`
    pub fn new(storage: S) -> Self {
        let (tx, _) = watch::channel(SessionRecord::Anonymous);
        Self {
            store: CredentialStore::new(storage),
            tx,
        }
    }

    /// Rehydrate from the credential store.
    ///
    /// Returns whether the restored record is authenticated. A partial or
    /// expired snapshot restores as anonymous and the leftovers are wiped.
    pub fn restore(&self, now: DateTime<Utc>) -> bool {
        let persisted = self.store.load();
        let had_data = !persisted.is_empty();
        let record = persisted.into_record(now);

        if !record.is_authenticated() && had_data {
            debug!("Discarding unusable persisted session");
            self.store.clear();
        }

        let authenticated = record.is_authenticated();
        self.tx.send_replace(record);
        authenticated
    }

    /// Promote to authenticated with `credentials`
    pub fn set_credentials(&self, credentials: Credentials) {
        let record = SessionRecord::Authenticated(credentials);
        self.store.save(&record);
        self.tx.send_replace(record);
    }

    /// Swap the token of an authenticated record. Ignored while anonymous.
    pub fn update_token(&self, token: AccessToken) -> bool {
        let Some(credentials) = self.tx.borrow().credentials().cloned() else {
            debug!("Ignoring token update while anonymous");
            return false;
        };

        match credentials.with_access_token(token) {
            Ok(credentials) => {
                self.store.save_token(credentials.access_token());
                self.tx.send_replace(SessionRecord::Authenticated(credentials));
                true
            }
            Err(e) => {
                debug!("Rejected token update: {}", e);
                false
            }
        }
    }

    /// Clear the record and wipe the store
    pub fn logout(&self) {
        self.store.clear();
        let previous = self.tx.send_replace(SessionRecord::Anonymous);
        if previous.is_authenticated() {
            info!("Session cleared");
        }
    }

    /// Copy of the current record
    pub fn current(&self) -> SessionRecord {
        self.tx.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.tx.borrow().is_authenticated()
    }

    /// Read-only handle for observers
    pub fn subscribe(&self) -> SessionReader {
        SessionReader {
            rx: self.tx.subscribe(),
        }
    }

    /// The persisted mirror
    pub fn store(&self) -> &CredentialStore<S> {
        &self.store
    }
}

/// Read-only view of the session record
#[derive(Debug, Clone)]
pub struct SessionReader {
    rx: watch::Receiver<SessionRecord>,
}

impl SessionReader {
    pub fn current(&self) -> SessionRecord {
        self.rx.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.rx.borrow().is_authenticated()
    }

    /// Wait for the next published record.
    ///
    /// Returns `None` once the owning state has been dropped.
    pub async fn changed(&mut self) -> Option<SessionRecord> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}
