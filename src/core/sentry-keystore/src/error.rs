//! Key store error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading or using the key store.
#[derive(Debug, Error)]
pub enum KeyStoreError {
    /// No private key is available for signing.
    ///
    /// Fatal misconfiguration on an issuing node: issuance must halt.
    /// Validation-only deployments that hold nothing but public keys see
    /// this from `signing_key()` and nowhere else.
    #[error("no signing key available")]
    NoSigningKey,

    /// The key repository directory cannot be read.
    #[error("key repository unreadable at {path}: {message}")]
    Repository {
        /// Directory that failed to load.
        path: PathBuf,
        /// Underlying I/O failure.
        message: String,
    },

    /// A key file exists but does not contain usable Ed25519 PEM material.
    #[error("invalid key material in {path}: {message}")]
    InvalidKey {
        /// File that failed to parse.
        path: PathBuf,
        /// Parse failure detail.
        message: String,
    },
}
