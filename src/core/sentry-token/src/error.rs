//! Token issuance errors and validation rejection reasons.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use sentry_idgen::IdError;

/// Why a presented token was rejected.
///
/// Every rejection is a terminal decision: retrying a cryptographic check
/// with the same inputs changes nothing, so none of these are retried
/// internally. Ambiguity always maps to a variant here rather than to an
/// "unknown" outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// The presented bytes do not parse as a token.
    #[error("malformed token")]
    Malformed,

    /// The key id names no key this store knows. Rejected outright; keys
    /// are never fetched from an untrusted source on a miss.
    #[error("unknown signing key")]
    UnknownKey,

    /// Signature does not verify against the named public key.
    #[error("signature mismatch")]
    BadSignature,

    /// The token's expiry has passed (beyond the skew tolerance).
    #[error("token expired")]
    Expired,

    /// The issuer is not in the trusted set.
    #[error("untrusted issuer")]
    UntrustedIssuer,
}

/// Errors that can occur while issuing a token.
#[derive(Debug, Error)]
pub enum IssueError {
    /// The requested subject was empty.
    #[error("subject must not be empty")]
    EmptySubject,

    /// The requested lifetime is outside the allowed range.
    #[error("ttl {requested_secs} s outside allowed range {min_secs}..={max_secs} s")]
    TtlOutOfRange {
        /// Lifetime the caller asked for, seconds.
        requested_secs: u64,
        /// Smallest allowed lifetime, seconds.
        min_secs: u64,
        /// Largest allowed lifetime, seconds.
        max_secs: u64,
    },

    /// The key store has no signing key. Fatal misconfiguration; issuance
    /// halts rather than degrading.
    #[error("no signing key available")]
    NoSigningKey,

    /// The identifier generator refused to emit (clock regression).
    /// Propagated untouched so issuance halts instead of risking a
    /// duplicate token id.
    #[error(transparent)]
    Id(#[from] IdError),

    /// Signing itself failed. Deterministic for given inputs, so never
    /// retried.
    #[error("token signing failed: {0}")]
    Signing(String),
}
