//! Credential hashing error types.

use thiserror::Error;

/// Errors that can occur while hashing credentials.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Requested cost parameters are outside what the algorithm accepts.
    #[error("invalid hash parameters: {0}")]
    InvalidParams(String),

    /// The hashing operation itself failed.
    #[error("hashing failed: {0}")]
    Hash(String),
}
