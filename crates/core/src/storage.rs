//! Key/value storage media for persisted session data

use crate::error::StorageError;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// A string-keyed, string-valued storage medium (`localStorage`, `sessionStorage`, memory)
#[cfg_attr(test, mockall::automock)]
pub trait KeyValueStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

impl<T: KeyValueStorage + ?Sized> KeyValueStorage for std::sync::Arc<T> {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove_item(key)
    }
}

/// The five named slots of a persisted session
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Slot {
    /// JSON-serialized [`UserProfile`](crate::record::UserProfile)
    User,
    Token,
    UserId,
    /// `"true"` when authenticated, absent otherwise
    IsAuthenticated,
    /// Provider subject identifier
    KeycloakId,
}

impl Slot {
    pub const ALL: [Slot; 5] = [
        Slot::User,
        Slot::Token,
        Slot::UserId,
        Slot::IsAuthenticated,
        Slot::KeycloakId,
    ];

    /// Storage key for the slot
    pub fn key(self) -> &'static str {
        match self {
            Slot::User => "user",
            Slot::Token => "token",
            Slot::UserId => "userId",
            Slot::IsAuthenticated => "isAuthenticated",
            Slot::KeycloakId => "keycloakId",
        }
    }
}

/// In-process storage, used natively and in tests
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored items
    pub fn len(&self) -> usize {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        items.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_keys_match_persisted_layout() {
        let keys: Vec<_> = Slot::ALL.iter().map(|slot| slot.key()).collect();
        assert_eq!(
            keys,
            ["user", "token", "userId", "isAuthenticated", "keycloakId"]
        );
    }

    #[test]
    fn test_memory_storage_roundtrip() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get_item("token").unwrap(), None);

        storage.set_item("token", "abc").unwrap();
        assert_eq!(storage.get_item("token").unwrap().as_deref(), Some("abc"));
        assert_eq!(storage.len(), 1);

        storage.remove_item("token").unwrap();
        assert!(storage.is_empty());
        // Removing a missing key is not an error
        storage.remove_item("token").unwrap();
    }
}
