//! # Sentry Token
//!
//! Issuance and validation of the signed service-to-service identity
//! tokens at the heart of Sentry.
//!
//! A token is a compact JWS (EdDSA/Ed25519) whose claim set asserts an
//! issuer, a subject, a validity window, and a unique token id. The signing
//! key id travels in the `kid` header; verifiers resolve it through the
//! [`sentry_keystore::KeyStore`] and never accept a key they do not already
//! hold.
//!
//! Issuance lives in [`issuer`], the accept/reject decision in
//! [`validator`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod claims;
pub mod error;
pub mod issuer;
pub mod validator;

pub use claims::{Claims, IssuedToken};
pub use error::{IssueError, RejectReason};
pub use issuer::{TokenIssuer, TtlBounds};
pub use validator::{TokenValidator, Verdict, CLOCK_SKEW};
