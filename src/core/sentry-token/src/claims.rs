//! Token claim set and issued-token types.

use serde::{Deserialize, Serialize};

/// The signed claim set of a token.
///
/// Serialized as the JWS payload; every field is covered by the signature.
/// The signing key id travels in the JWS `kid` header so a verifier can
/// resolve the public key without a separate lookup round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Unique token id (64-bit identifier, carried as a decimal string).
    pub jti: String,
    /// Identity of the issuing service.
    pub iss: String,
    /// Identity the token asserts.
    pub sub: String,
    /// Issued-at, Unix seconds.
    pub iat: u64,
    /// Expiry, Unix seconds. Always strictly greater than `iat`.
    pub exp: u64,
}

/// A freshly minted token together with its metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedToken {
    /// Compact JWS serialization: the wire form handed to callers.
    pub token: String,
    /// The token's unique id.
    pub token_id: u64,
    /// Expiry, Unix seconds.
    pub expires_at: u64,
}
