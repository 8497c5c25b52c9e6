//! Integration tests for the Sentry server.
//!
//! These tests boot the real router on an ephemeral port with a freshly
//! provisioned key repository and drive the complete workflows over HTTP:
//! token issue/validate, rotation survival, and user register/login.

// Allow unwrap() in tests - panics are acceptable for test assertions
#![allow(clippy::disallowed_methods)]

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use ed25519_dalek::pkcs8::spki::der::pem::LineEnding;
use ed25519_dalek::pkcs8::{EncodePrivateKey, EncodePublicKey};
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use tempfile::TempDir;
use tokio::task::JoinHandle;

use sentry_api::{router, AppState};
use sentry_idgen::IdGenerator;
use sentry_keystore::KeyStore;
use sentry_store::{CredentialStore, MemoryCredentialStore};
use sentry_token::{TokenIssuer, TokenValidator};

/// Issuer identity every test server runs under.
pub const TEST_ISSUER: &str = "sessions";

/// Writes an Ed25519 pair into `keys_dir/<epoch>/<stem>-{private,public}.pem`.
pub fn provision_key_pair(keys_dir: &Path, epoch: &str, stem: &str) -> Result<()> {
    let signing_key = SigningKey::generate(&mut OsRng);
    let epoch_dir = keys_dir.join(epoch);
    fs::create_dir_all(&epoch_dir)?;

    let public_pem = signing_key
        .verifying_key()
        .to_public_key_pem(LineEnding::LF)
        .context("failed to encode public key")?;
    fs::write(epoch_dir.join(format!("{stem}-public.pem")), public_pem)?;

    let private_pem = signing_key
        .to_pkcs8_pem(LineEnding::LF)
        .context("failed to encode private key")?;
    fs::write(
        epoch_dir.join(format!("{stem}-private.pem")),
        private_pem.as_bytes(),
    )?;

    Ok(())
}

/// A server instance bound to an ephemeral port, with its own key
/// repository and in-memory credential store.
pub struct TestServer {
    /// Base URL, e.g. `http://127.0.0.1:49152`.
    pub base_url: String,
    /// HTTP client for driving the API.
    pub client: reqwest::Client,
    /// Key store handle, for exercising rotation mid-test.
    pub key_store: Arc<KeyStore>,
    keys_dir: TempDir,
    server: JoinHandle<()>,
}

impl TestServer {
    /// Starts a server with one provisioned signing epoch.
    pub async fn start() -> Result<Self> {
        let keys_dir = TempDir::new().context("failed to create temp dir")?;
        provision_key_pair(keys_dir.path(), "sessions01", "1569901546")?;

        let key_store = Arc::new(KeyStore::load(keys_dir.path())?);
        let ids = Arc::new(IdGenerator::new(1)?);
        let issuer = Arc::new(TokenIssuer::new(
            TEST_ISSUER,
            Arc::clone(&key_store),
            Arc::clone(&ids),
        ));
        let validator = Arc::new(TokenValidator::new(
            Arc::clone(&key_store),
            [TEST_ISSUER.to_string()],
        ));
        let credentials: Arc<dyn CredentialStore> = Arc::new(MemoryCredentialStore::new());

        let app = router(AppState {
            issuer,
            validator,
            ids,
            key_store: Arc::clone(&key_store),
            credentials,
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .context("failed to bind ephemeral port")?;
        let addr = listener.local_addr()?;

        let server = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("test server exited: {e}");
            }
        });

        Ok(Self {
            base_url: format!("http://{addr}"),
            client: reqwest::Client::new(),
            key_store,
            keys_dir,
            server,
        })
    }

    /// Absolute URL for an API path.
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Path of this server's key repository.
    pub fn keys_path(&self) -> &Path {
        self.keys_dir.path()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.server.abort();
    }
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;
    use serde_json::json;

    use sentry_api::types::{
        CreateUserResponse, HealthResponse, IssueResponse, LoginResponse, ValidateResponse,
    };
    use sentry_token::RejectReason;

    use super::*;

    async fn issue(server: &TestServer, subject: &str, ttl_secs: u64) -> IssueResponse {
        let response = server
            .client
            .post(server.url("/v1/token/issue"))
            .json(&json!({ "subject": subject, "ttl_secs": ttl_secs }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        response.json().await.unwrap()
    }

    async fn validate(server: &TestServer, token: &str) -> ValidateResponse {
        let response = server
            .client
            .post(server.url("/v1/token/validate"))
            .json(&json!({ "token": token }))
            .send()
            .await
            .unwrap();
        // A rejection is still a successful decision.
        assert_eq!(response.status(), StatusCode::OK);
        response.json().await.unwrap()
    }

    #[tokio::test]
    async fn test_health_reports_signing_key() {
        let server = TestServer::start().await.unwrap();

        let response = server
            .client
            .get(server.url("/v1/sys/health"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let health: HealthResponse = response.json().await.unwrap();
        assert_eq!(health.status, "ok");
        assert_eq!(health.epochs, 1);
        assert_eq!(
            health.signing_key_id.as_deref(),
            Some("sessions01/1569901546")
        );
    }

    #[tokio::test]
    async fn test_issue_validate_round_trip() {
        let server = TestServer::start().await.unwrap();

        let issued = issue(&server, "billing-service", 60).await;
        let verdict = validate(&server, &issued.token).await;

        assert!(verdict.accepted);
        assert_eq!(verdict.subject.as_deref(), Some("billing-service"));
        assert_eq!(verdict.issuer.as_deref(), Some(TEST_ISSUER));
        assert_eq!(verdict.token_id.as_deref(), Some(issued.token_id.as_str()));
        assert!(verdict.reason.is_none());
    }

    #[tokio::test]
    async fn test_tampered_token_rejected() {
        let server = TestServer::start().await.unwrap();

        let issued = issue(&server, "billing-service", 60).await;

        // Flip the subject inside the signed payload.
        let mut parts: Vec<String> = issued.token.split('.').map(str::to_string).collect();
        use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
        let payload = URL_SAFE_NO_PAD.decode(&parts[1]).unwrap();
        let mut claims: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        claims["sub"] = serde_json::Value::String("payments-admin".to_string());
        parts[1] = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap());
        let forged = parts.join(".");

        let verdict = validate(&server, &forged).await;
        assert!(!verdict.accepted);
        assert_eq!(verdict.reason, Some(RejectReason::BadSignature));
        assert!(verdict.subject.is_none());
    }

    #[tokio::test]
    async fn test_garbage_token_is_malformed() {
        let server = TestServer::start().await.unwrap();

        let verdict = validate(&server, "not-a-token").await;
        assert!(!verdict.accepted);
        assert_eq!(verdict.reason, Some(RejectReason::Malformed));
    }

    #[tokio::test]
    async fn test_issue_rejects_bad_ttl() {
        let server = TestServer::start().await.unwrap();

        for ttl_secs in [0u64, 7200] {
            let response = server
                .client
                .post(server.url("/v1/token/issue"))
                .json(&json!({ "subject": "billing-service", "ttl_secs": ttl_secs }))
                .send()
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn test_token_survives_rotation() {
        let server = TestServer::start().await.unwrap();

        let issued = issue(&server, "billing-service", 60).await;

        provision_key_pair(server.keys_path(), "sessions02", "1572580321").unwrap();
        server.key_store.rotate().unwrap();

        // Old-epoch token still validates; new issuance signs with the new
        // epoch and validates too.
        let verdict = validate(&server, &issued.token).await;
        assert!(verdict.accepted);

        let reissued = issue(&server, "billing-service", 60).await;
        let verdict = validate(&server, &reissued.token).await;
        assert!(verdict.accepted);
    }

    #[tokio::test]
    async fn test_user_register_login_validate() {
        let server = TestServer::start().await.unwrap();

        let response = server
            .client
            .post(server.url("/v1/users"))
            .json(&json!({ "username": "alice", "password": "correct horse" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created: CreateUserResponse = response.json().await.unwrap();
        assert_eq!(created.username, "alice");

        let response = server
            .client
            .post(server.url("/v1/users/login"))
            .json(&json!({ "username": "alice", "password": "correct horse" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let login: LoginResponse = response.json().await.unwrap();
        assert_eq!(login.user_id, created.user_id);

        // The login token asserts the user and validates like any other.
        let verdict = validate(&server, &login.token).await;
        assert!(verdict.accepted);
        assert_eq!(
            verdict.subject.as_deref(),
            Some(format!("user:{}", created.user_id).as_str())
        );
    }

    #[tokio::test]
    async fn test_duplicate_username_conflicts() {
        let server = TestServer::start().await.unwrap();

        let response = server
            .client
            .post(server.url("/v1/users"))
            .json(&json!({ "username": "alice", "password": "correct horse" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = server
            .client
            .post(server.url("/v1/users"))
            .json(&json!({ "username": "alice", "password": "other password" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_login_failures_are_uniform() {
        let server = TestServer::start().await.unwrap();

        server
            .client
            .post(server.url("/v1/users"))
            .json(&json!({ "username": "alice", "password": "correct horse" }))
            .send()
            .await
            .unwrap();

        // Wrong password and unknown user answer identically.
        let mut bodies = Vec::new();
        for (username, password) in [("alice", "wrong password"), ("nobody", "whatever pw")] {
            let response = server
                .client
                .post(server.url("/v1/users/login"))
                .json(&json!({ "username": username, "password": password }))
                .send()
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            bodies.push(response.text().await.unwrap());
        }
        assert_eq!(bodies[0], bodies[1]);
    }

    #[tokio::test]
    async fn test_short_password_rejected() {
        let server = TestServer::start().await.unwrap();

        let response = server
            .client
            .post(server.url("/v1/users"))
            .json(&json!({ "username": "alice", "password": "tiny" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_concurrent_validations() {
        let server = Arc::new(TestServer::start().await.unwrap());

        let issued = issue(&server, "billing-service", 60).await;

        let mut handles = Vec::new();
        for _ in 0..32 {
            let server = Arc::clone(&server);
            let token = issued.token.clone();
            handles.push(tokio::spawn(async move {
                let response = server
                    .client
                    .post(server.url("/v1/token/validate"))
                    .json(&json!({ "token": token }))
                    .send()
                    .await
                    .unwrap();
                let verdict: ValidateResponse = response.json().await.unwrap();
                verdict.accepted
            }));
        }

        for handle in handles {
            assert!(handle.await.unwrap());
        }
    }
}
