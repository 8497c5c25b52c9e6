//! Request and response types for the `/v1` API.
//!
//! Identifier fields travel as decimal strings so consumers in languages
//! with 53-bit numerics never silently corrupt them.

use serde::{Deserialize, Serialize};

use sentry_token::{RejectReason, Verdict};

/// `POST /v1/token/issue` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueRequest {
    /// Identity the token should assert.
    pub subject: String,
    /// Requested lifetime in seconds.
    pub ttl_secs: u64,
}

/// `POST /v1/token/issue` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueResponse {
    /// The signed token in wire form.
    pub token: String,
    /// Unique token id.
    pub token_id: String,
    /// Expiry, Unix seconds.
    pub expires_at: u64,
}

/// `POST /v1/token/validate` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateRequest {
    /// The presented token.
    pub token: String,
}

/// `POST /v1/token/validate` response.
///
/// Always returned with status 200: a rejection is a successful decision,
/// not a transport failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateResponse {
    /// Whether the token was accepted.
    pub accepted: bool,
    /// Asserted subject, present on acceptance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Issuing service, present on acceptance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    /// Token id, present on acceptance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_id: Option<String>,
    /// Rejection reason, present on rejection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectReason>,
}

impl From<Verdict> for ValidateResponse {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Accepted {
                subject,
                issuer,
                token_id,
            } => Self {
                accepted: true,
                subject: Some(subject),
                issuer: Some(issuer),
                token_id: Some(token_id.to_string()),
                reason: None,
            },
            Verdict::Rejected { reason } => Self {
                accepted: false,
                subject: None,
                issuer: None,
                token_id: None,
                reason: Some(reason),
            },
        }
    }
}

/// `POST /v1/users` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    /// Desired login name.
    pub username: String,
    /// Plaintext password; hashed immediately, never stored or logged.
    pub password: String,
}

/// `POST /v1/users` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserResponse {
    /// Assigned user id.
    pub user_id: String,
    /// Login name as registered.
    pub username: String,
}

/// `POST /v1/users/login` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Login name.
    pub username: String,
    /// Plaintext password candidate.
    pub password: String,
}

/// `POST /v1/users/login` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Token asserting `user:<id>`.
    pub token: String,
    /// Unique token id.
    pub token_id: String,
    /// Expiry, Unix seconds.
    pub expires_at: u64,
    /// The authenticated user's id.
    pub user_id: String,
}

/// `GET /v1/sys/health` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always "ok" when the server answers.
    pub status: String,
    /// Server version.
    pub version: String,
    /// Number of key epochs currently retained.
    pub epochs: usize,
    /// Active signing key id, absent on validation-only deployments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signing_key_id: Option<String>,
}

/// Error body returned for non-2xx statuses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable failure description.
    pub error: String,
}
