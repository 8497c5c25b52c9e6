//! # Sentry API
//!
//! REST layer for the Sentry authentication backend.
//!
//! ## Endpoints
//!
//! - `POST /v1/token/issue` - mint a token asserting a service identity
//! - `POST /v1/token/validate` - decide accept/reject on a presented token
//! - `POST /v1/users` - register a user credential
//! - `POST /v1/users/login` - verify a credential and mint a user token
//! - `GET /v1/sys/health` - liveness and key-repository summary

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod handlers;
pub mod types;

pub use error::ApiError;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use sentry_idgen::IdGenerator;
use sentry_keystore::KeyStore;
use sentry_store::CredentialStore;
use sentry_token::{TokenIssuer, TokenValidator};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Token issuer for this service's identity.
    pub issuer: Arc<TokenIssuer>,
    /// Token validator over the loaded key set.
    pub validator: Arc<TokenValidator>,
    /// Identifier generator (token ids and user ids).
    pub ids: Arc<IdGenerator>,
    /// Key repository, exposed for health reporting.
    pub key_store: Arc<KeyStore>,
    /// User credential store boundary.
    pub credentials: Arc<dyn CredentialStore>,
}

/// Builds the `/v1` router over the given state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/token/issue", post(handlers::issue_token))
        .route("/v1/token/validate", post(handlers::validate_token))
        .route("/v1/users", post(handlers::create_user))
        .route("/v1/users/login", post(handlers::login))
        .route("/v1/sys/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
