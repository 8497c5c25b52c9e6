//! `/v1` endpoint handlers.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use tracing::{error, warn};

use sentry_credential::{hash_password, verify_password};
use sentry_store::UserCredential;
use sentry_token::IssueError;

use crate::error::ApiError;
use crate::types::{
    CreateUserRequest, CreateUserResponse, HealthResponse, IssueRequest, IssueResponse,
    LoginRequest, LoginResponse, ValidateRequest, ValidateResponse,
};
use crate::AppState;

/// Lifetime of tokens minted on user login, matching the issuance ceiling.
const LOGIN_TOKEN_TTL: Duration = Duration::from_secs(3600);

/// Password length bounds enforced before hashing.
const PASSWORD_MIN: usize = 6;
const PASSWORD_MAX: usize = 1024;

/// `POST /v1/token/issue`
pub async fn issue_token(
    State(state): State<AppState>,
    Json(request): Json<IssueRequest>,
) -> Result<(StatusCode, Json<IssueResponse>), ApiError> {
    let issued = state
        .issuer
        .issue(&request.subject, Duration::from_secs(request.ttl_secs))
        .map_err(issue_error)?;

    Ok((
        StatusCode::CREATED,
        Json(IssueResponse {
            token: issued.token,
            token_id: issued.token_id.to_string(),
            expires_at: issued.expires_at,
        }),
    ))
}

/// `POST /v1/token/validate`
///
/// Signature verification is CPU-bound, so the decision runs on the
/// blocking pool rather than the event loop.
pub async fn validate_token(
    State(state): State<AppState>,
    Json(request): Json<ValidateRequest>,
) -> Result<Json<ValidateResponse>, ApiError> {
    let validator = Arc::clone(&state.validator);
    let token = request.token;

    let verdict = tokio::task::spawn_blocking(move || validator.validate(&token))
        .await
        .map_err(|e| {
            error!(error = %e, "validation task failed");
            ApiError::Internal
        })?;

    Ok(Json(ValidateResponse::from(verdict)))
}

/// `POST /v1/users`
pub async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<CreateUserResponse>), ApiError> {
    if request.username.is_empty() || request.username.len() > 64 {
        return Err(ApiError::BadRequest(
            "username must be 1 to 64 characters".to_string(),
        ));
    }
    if request.password.len() < PASSWORD_MIN || request.password.len() > PASSWORD_MAX {
        return Err(ApiError::BadRequest(format!(
            "password must be {PASSWORD_MIN} to {PASSWORD_MAX} characters"
        )));
    }

    let password = request.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(password.as_bytes()))
        .await
        .map_err(|e| {
            error!(error = %e, "hashing task failed");
            ApiError::Internal
        })?
        .map_err(|e| {
            error!(error = %e, "credential hashing failed");
            ApiError::Internal
        })?;

    let user_id = state.ids.next_id().map_err(|e| {
        error!(error = %e, "user id generation refused");
        ApiError::Internal
    })?;

    let credential = UserCredential {
        user_id,
        username: request.username.clone(),
        password_hash,
        verified: false,
        active: true,
    };

    state
        .credentials
        .put_credential(credential)
        .await
        .map_err(|e| match e {
            sentry_store::StoreError::AlreadyExists(username) => {
                ApiError::Conflict(format!("username already taken: {username}"))
            }
            other => {
                error!(error = %other, "credential store write failed");
                ApiError::Internal
            }
        })?;

    Ok((
        StatusCode::CREATED,
        Json(CreateUserResponse {
            user_id: user_id.to_string(),
            username: request.username,
        }),
    ))
}

/// `POST /v1/users/login`
///
/// Every failure path answers an identical 401 so the endpoint cannot be
/// used to enumerate usernames.
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let credential = state
        .credentials
        .get_by_username(&request.username)
        .await
        .map_err(|e| {
            error!(error = %e, "credential store lookup failed");
            ApiError::Internal
        })?
        .ok_or(ApiError::Unauthorized)?;

    if !credential.active {
        warn!(user_id = credential.user_id, "login attempt on inactive account");
        return Err(ApiError::Unauthorized);
    }

    let password = request.password;
    let record = credential.password_hash.clone();
    let matches =
        tokio::task::spawn_blocking(move || verify_password(password.as_bytes(), &record))
            .await
            .map_err(|e| {
                error!(error = %e, "verification task failed");
                ApiError::Internal
            })?;

    if !matches {
        return Err(ApiError::Unauthorized);
    }

    let issued = state
        .issuer
        .issue(&format!("user:{}", credential.user_id), LOGIN_TOKEN_TTL)
        .map_err(issue_error)?;

    Ok(Json(LoginResponse {
        token: issued.token,
        token_id: issued.token_id.to_string(),
        expires_at: issued.expires_at,
        user_id: credential.user_id.to_string(),
    }))
}

/// `GET /v1/sys/health`
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        epochs: state.key_store.epochs().len(),
        signing_key_id: state.key_store.signing_key_id(),
    })
}

/// Maps issuance failures onto API responses.
///
/// Bad requests surface as such; process-level faults (missing signing key,
/// clock regression) are logged and answered generically.
fn issue_error(error: IssueError) -> ApiError {
    match error {
        IssueError::EmptySubject | IssueError::TtlOutOfRange { .. } => {
            ApiError::BadRequest(error.to_string())
        }
        IssueError::NoSigningKey => {
            error!("issuance halted: no signing key available");
            ApiError::Internal
        }
        IssueError::Id(e) => {
            error!(error = %e, "issuance halted: identifier generation refused");
            ApiError::Internal
        }
        IssueError::Signing(e) => {
            error!(error = %e, "issuance halted: signing failed");
            ApiError::Internal
        }
    }
}
