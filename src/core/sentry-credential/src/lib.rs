//! # Sentry Credential
//!
//! One-way password hashing for user credential storage.
//!
//! Passwords are hashed with Argon2id. Each record is a PHC-format string
//! carrying the algorithm, version, cost parameters, and salt alongside the
//! digest, so cost parameters can be raised for new records without
//! invalidating anything already stored. Verification parses the stored
//! record and runs with the parameters it names; digest comparison is
//! constant-time.
//!
//! There is no decrypt. Hash and verify are the only operations.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;

pub use error::CredentialError;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Cost parameters for hashing new credentials.
///
/// Stored alongside every hash, so these only govern records created after
/// a change; old records keep verifying with the parameters they embed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashParams {
    /// Memory cost in KiB.
    pub m_cost: u32,
    /// Number of iterations.
    pub t_cost: u32,
    /// Degree of parallelism.
    pub p_cost: u32,
}

impl Default for HashParams {
    fn default() -> Self {
        Self {
            m_cost: Params::DEFAULT_M_COST,
            t_cost: Params::DEFAULT_T_COST,
            p_cost: Params::DEFAULT_P_COST,
        }
    }
}

/// A stored password hash in PHC string format.
///
/// Example: `$argon2id$v=19$m=19456,t=2,p=1$<salt>$<digest>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HashRecord(String);

impl HashRecord {
    /// Wraps an already-encoded PHC string (e.g. loaded from the user store).
    pub fn from_phc_string(phc: impl Into<String>) -> Self {
        Self(phc.into())
    }

    /// Returns the PHC-encoded form for persistence.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Hashes a password with the default cost parameters.
///
/// A fresh random salt is drawn from the OS CSPRNG for every call.
///
/// # Errors
///
/// Returns an error if the underlying hash computation fails.
pub fn hash_password(password: &[u8]) -> Result<HashRecord, CredentialError> {
    hash_password_with(password, HashParams::default())
}

/// Hashes a password with explicit cost parameters.
///
/// # Errors
///
/// Returns [`CredentialError::InvalidParams`] if the parameters are outside
/// the accepted range, or [`CredentialError::Hash`] if hashing fails.
pub fn hash_password_with(
    password: &[u8],
    params: HashParams,
) -> Result<HashRecord, CredentialError> {
    let params = Params::new(params.m_cost, params.t_cost, params.p_cost, None)
        .map_err(|e| CredentialError::InvalidParams(e.to_string()))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let salt = SaltString::generate(&mut OsRng);
    let hash = argon2
        .hash_password(password, &salt)
        .map_err(|e| CredentialError::Hash(e.to_string()))?;

    Ok(HashRecord(hash.to_string()))
}

/// Verifies a plaintext candidate against a stored hash record.
///
/// Runs with whatever parameters the record embeds, so records hashed under
/// older cost settings keep working. The final digest comparison is
/// constant-time. A record that cannot be parsed counts as a mismatch:
/// an unverifiable credential is rejected, never accepted.
pub fn verify_password(password: &[u8], record: &HashRecord) -> bool {
    let parsed = match PasswordHash::new(record.as_str()) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(error = %e, "stored credential hash is unparseable, rejecting");
            return false;
        }
    };

    Argon2::default().verify_password(password, &parsed).is_ok()
}
