//! `localStorage` / `sessionStorage` as a [`KeyValueStorage`]

use stride_core::{KeyValueStorage, StorageError};
use wasm_bindgen::JsValue;
use web_sys::Storage;

/// One of the window's Web Storage areas
#[derive(Clone, Debug)]
pub struct BrowserStorage {
    storage: Storage,
}

impl BrowserStorage {
    /// Persistent storage; holds the session record slots
    pub fn local() -> Result<Self, StorageError> {
        let window = window()?;
        let storage = window.local_storage().map_err(unavailable)?;
        Self::from_area(storage, "localStorage")
    }

    /// Per-tab storage; holds the pending authorization across the provider redirect
    pub fn session() -> Result<Self, StorageError> {
        let window = window()?;
        let storage = window.session_storage().map_err(unavailable)?;
        Self::from_area(storage, "sessionStorage")
    }

    fn from_area(storage: Option<Storage>, name: &str) -> Result<Self, StorageError> {
        storage
            .map(|storage| Self { storage })
            .ok_or_else(|| StorageError::Unavailable(format!("{name} is disabled")))
    }
}

impl KeyValueStorage for BrowserStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.storage.get_item(key).map_err(operation)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.storage.set_item(key, value).map_err(operation)
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.storage.remove_item(key).map_err(operation)
    }
}

fn window() -> Result<web_sys::Window, StorageError> {
    web_sys::window().ok_or_else(|| StorageError::Unavailable("no window".into()))
}

fn describe(value: &JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{value:?}"))
}

fn unavailable(value: JsValue) -> StorageError {
    StorageError::Unavailable(describe(&value))
}

fn operation(value: JsValue) -> StorageError {
    StorageError::Operation(describe(&value))
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::*;
    use stride_core::{AccessToken, CredentialStore, Credentials, SessionRecord, Slot, UserProfile};
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_local_storage_round_trip() {
        let storage = BrowserStorage::local().unwrap();
        storage.set_item("stride.test", "value").unwrap();
        assert_eq!(storage.get_item("stride.test").unwrap().as_deref(), Some("value"));
        storage.remove_item("stride.test").unwrap();
        assert_eq!(storage.get_item("stride.test").unwrap(), None);
    }

    #[wasm_bindgen_test]
    fn test_credential_slots_land_in_local_storage() {
        let store = CredentialStore::new(BrowserStorage::local().unwrap());
        let credentials = Credentials::new(
            UserProfile::new("ada@example.com", "Ada", "Lovelace"),
            AccessToken::new("opaque-token"),
            "u-1",
            "u-1",
        )
        .unwrap();
        store.save(&SessionRecord::Authenticated(credentials));

        let raw = BrowserStorage::local().unwrap();
        assert_eq!(
            raw.get_item(Slot::IsAuthenticated.key()).unwrap().as_deref(),
            Some("true")
        );
        assert_eq!(raw.get_item(Slot::Token.key()).unwrap().as_deref(), Some("opaque-token"));

        store.clear();
        for slot in Slot::ALL {
            assert_eq!(raw.get_item(slot.key()).unwrap(), None);
        }
    }

    #[wasm_bindgen_test]
    fn test_session_storage_is_separate() {
        let local = BrowserStorage::local().unwrap();
        let session = BrowserStorage::session().unwrap();
        session.set_item("stride.only-here", "1").unwrap();
        assert_eq!(local.get_item("stride.only-here").unwrap(), None);
        session.remove_item("stride.only-here").unwrap();
    }
}
