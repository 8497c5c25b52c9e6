//! In-memory credential store for tests and dev mode.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::backend::CredentialStore;
use crate::error::StoreError;
use crate::UserCredential;

/// Credential store backed by a map in process memory.
///
/// Nothing survives a restart; dev mode and tests only.
#[derive(Default)]
pub struct MemoryCredentialStore {
    by_username: RwLock<HashMap<String, UserCredential>>,
}

impl MemoryCredentialStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get_credential(&self, user_id: u64) -> Result<Option<UserCredential>, StoreError> {
        let users = self.by_username.read().await;
        Ok(users.values().find(|c| c.user_id == user_id).cloned())
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<UserCredential>, StoreError> {
        let users = self.by_username.read().await;
        Ok(users.get(username).cloned())
    }

    async fn put_credential(&self, credential: UserCredential) -> Result<(), StoreError> {
        let mut users = self.by_username.write().await;
        if users.contains_key(&credential.username) {
            return Err(StoreError::AlreadyExists(credential.username));
        }
        users.insert(credential.username.clone(), credential);
        Ok(())
    }
}
