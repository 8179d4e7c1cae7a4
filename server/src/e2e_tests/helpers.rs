//! Common helpers for end-to-end tests.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use ed25519_dalek::SigningKey;
use tower::ServiceExt;

use crate::api::LoginRequest;
use crate::auth::{AuthService, TokenIssuer, TokenIssuerConfig, create_challenge};
use crate::data::{DataRepository, ReloadReport, SnapshotStore};
use crate::http::{AppState, router};
use crate::time::FixedTimeSource;

pub const SECRET: &[u8] = b"e2e-secret";
pub const ISSUER: &str = "teams";
pub const AUDIENCE: &str = "teams-api";

/// The instant every test server believes it is.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

/// Deterministic key for `username`.
pub fn signing_key(username: &str) -> SigningKey {
    let seed = username.bytes().fold(1u8, |acc, b| acc.wrapping_mul(31).wrapping_add(b));
    SigningKey::from_bytes(&[seed; 32])
}

pub fn dataset(users: &[&str], teams: &[(&str, &[&str])]) -> String {
    let mut yaml = String::from("users:\n");
    for user in users {
        let key = general_purpose::STANDARD.encode(signing_key(user).verifying_key().as_bytes());
        yaml.push_str(&format!("  - name: {user}\n    key: {key}\n"));
    }
    yaml.push_str("teams:\n");
    for (team, members) in teams {
        yaml.push_str(&format!("  {team}: [{}]\n", members.join(", ")));
    }
    yaml
}

/// alice, bob and carol; `infra` = [bob, alice], `web` = [carol].
pub fn default_dataset() -> String {
    dataset(
        &["alice", "bob", "carol"],
        &[("infra", &["bob", "alice"]), ("web", &["carol"])],
    )
}

pub fn issuer() -> TokenIssuer {
    TokenIssuer::new(
        TokenIssuerConfig::new(ISSUER, AUDIENCE, Duration::ZERO, SECRET.to_vec())
            .expect("valid token config"),
    )
}

/// A running server: router plus the store and dataset file behind it.
pub struct TestServer {
    pub app: Router,
    pub store: Arc<SnapshotStore>,
    pub path: PathBuf,
    _dir: tempfile::TempDir,
}

impl TestServer {
    pub fn new(contents: &str) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("data.yaml");
        std::fs::write(&path, contents).expect("write dataset");

        let store = Arc::new(SnapshotStore::open(&path).expect("open store"));
        let auth = AuthService::new(
            Arc::clone(&store) as Arc<dyn DataRepository>,
            issuer(),
            Arc::new(FixedTimeSource(now())),
        );

        Self {
            app: router(AppState::new(auth)),
            store,
            path,
            _dir: dir,
        }
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        self.send(request).await
    }

    pub async fn get_text(&self, uri: &str) -> (StatusCode, String) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    pub async fn post_json(&self, uri: &str, body: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    pub async fn login(&self, request: &LoginRequest) -> (StatusCode, serde_json::Value) {
        self.post_json("/login", &serde_json::to_string(request).unwrap())
            .await
    }

    /// Log in with `username`'s own key and return the access token.
    pub async fn token_for(&self, username: &str) -> String {
        let (status, body) = self.login(&signed_login(username, now().fixed_offset())).await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["access_token"].as_str().unwrap().to_string()
    }

    /// Atomically replace the dataset and wait until the store has handled it.
    pub async fn replace_dataset(
        &self,
        contents: &str,
        done: impl FnMut(&ReloadReport) -> bool,
    ) -> ReloadReport {
        replace_file(&self.path, contents);
        self.store.request_reload();
        let mut reports = self.store.reload_reports();
        let report = tokio::time::timeout(Duration::from_secs(5), reports.wait_for(done))
            .await
            .expect("reload finished in time")
            .expect("reload worker alive")
            .clone();
        report
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
        (status, json)
    }
}

/// Login request for `username` signed with that user's key.
pub fn signed_login(username: &str, timestamp: DateTime<FixedOffset>) -> LoginRequest {
    signed_login_with(username, timestamp, &signing_key(username))
}

pub fn signed_login_with(
    username: &str,
    timestamp: DateTime<FixedOffset>,
    key: &SigningKey,
) -> LoginRequest {
    LoginRequest {
        username: username.to_string(),
        timestamp,
        challenge: create_challenge(username, &timestamp, key),
    }
}

fn replace_file(path: &Path, contents: &str) {
    let staging = path.with_extension("staging");
    std::fs::write(&staging, contents).expect("write staging file");
    std::fs::rename(&staging, path).expect("rename over dataset");
}
