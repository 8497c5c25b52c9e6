//! # Sentry Store
//!
//! Storage boundary for user credentials.
//!
//! The relational schema and its migrations live outside the core; this
//! crate exposes only the narrow lookup/persist interface the core consumes
//! and the record shape that crosses it.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod error;
pub mod memory;

pub use backend::CredentialStore;
pub use error::StoreError;
pub use memory::MemoryCredentialStore;

use serde::{Deserialize, Serialize};

use sentry_credential::HashRecord;

/// A stored user credential.
///
/// The plaintext password is hashed before it ever reaches this type and
/// is never persisted or logged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCredential {
    /// Unique user id (64-bit identifier).
    pub user_id: u64,
    /// Login name, unique across the store.
    pub username: String,
    /// Argon2id hash record, cost parameters embedded.
    pub password_hash: HashRecord,
    /// Whether the account's contact details have been verified.
    pub verified: bool,
    /// Whether the account may authenticate at all.
    pub active: bool,
}
