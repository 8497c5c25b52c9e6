//! Credential store trait definition.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::UserCredential;

/// Narrow lookup/persist boundary over the external user store.
///
/// The core never talks to a storage engine directly; everything it needs
/// from user records flows through these three operations. Plaintext
/// passwords never cross this boundary — only [`HashRecord`]s do.
///
/// [`HashRecord`]: sentry_credential::HashRecord
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Looks up a credential by user id.
    async fn get_credential(&self, user_id: u64) -> Result<Option<UserCredential>, StoreError>;

    /// Looks up a credential by username.
    async fn get_by_username(&self, username: &str) -> Result<Option<UserCredential>, StoreError>;

    /// Persists a new credential.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyExists`] if the username is taken.
    async fn put_credential(&self, credential: UserCredential) -> Result<(), StoreError>;
}
