//! Credential store error types.

use thiserror::Error;

/// Errors that can occur at the credential store boundary.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No credential exists for the given identifier.
    #[error("credential not found: {0}")]
    NotFound(String),

    /// A credential with this username already exists.
    #[error("username already taken: {0}")]
    AlreadyExists(String),

    /// Connection to the backing store failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// A query against the backing store failed.
    #[error("query error: {0}")]
    Query(String),

    /// Input rejected before reaching the backing store.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}
