//! Authorization requests in flight across the provider redirect

use crate::client::error::ClientError;
use serde::{Deserialize, Serialize};
use stride_core::KeyValueStorage;

/// Transient storage key for the pending authorization
pub const PENDING_KEY: &str = "stride.pkce";

/// Set after a silent check found no provider session
pub const SSO_CHECKED_KEY: &str = "stride.sso-checked";

/// What must survive the round trip to the provider
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingAuthorization {
    pub state: String,
    pub code_verifier: String,
    pub redirect_uri: String,
    pub nonce: String,
    /// Sent with `prompt=none`
    #[serde(default)]
    pub silent: bool,
}

impl PendingAuthorization {
    pub fn save<S: KeyValueStorage>(&self, storage: &S) -> Result<(), ClientError> {
        let json = serde_json::to_string(self)
            .map_err(|e| ClientError::InvalidState(format!("cannot encode pending authorization: {e}")))?;
        storage.set_item(PENDING_KEY, &json)?;
        Ok(())
    }

    /// Remove and return the pending authorization; unreadable entries are dropped
    pub fn take<S: KeyValueStorage>(storage: &S) -> Result<Option<Self>, ClientError> {
        let Some(json) = storage.get_item(PENDING_KEY)? else {
            return Ok(None);
        };
        storage.remove_item(PENDING_KEY)?;

        match serde_json::from_str(&json) {
            Ok(pending) => Ok(Some(pending)),
            Err(e) => {
                warn!("Discarding unreadable pending authorization: {}", e);
                Ok(None)
            }
        }
    }
}
