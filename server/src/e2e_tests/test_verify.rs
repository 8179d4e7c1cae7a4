//! Test access token verification.

use axum::http::StatusCode;
use chrono::Duration;

use crate::e2e_tests::helpers::*;

#[tokio::test]
async fn test_verify_round_trip() {
    let server = TestServer::new(&default_dataset());
    let token = server.token_for("carol").await;

    let (status, body) = server.get(&format!("/verify?access_token={token}")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!({"username": "carol"}));
}

#[tokio::test]
async fn test_verify_missing_token() {
    let server = TestServer::new(&default_dataset());

    let (status, body) = server.get("/verify").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = server.get("/verify?access_token=").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_verify_garbage_token() {
    let server = TestServer::new(&default_dataset());

    let (status, body) = server.get("/verify?access_token=abc.def.ghi").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid access token");
}

#[tokio::test]
async fn test_verify_expired_token() {
    let server = TestServer::new(&default_dataset());
    let token = issuer()
        .create("alice", now() - Duration::minutes(61))
        .expect("token");

    let (status, body) = server.get(&format!("/verify?access_token={token}")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid access token");
}

#[tokio::test]
async fn test_verify_token_from_other_secret() {
    let server = TestServer::new(&default_dataset());
    let other = crate::auth::TokenIssuer::new(
        crate::auth::TokenIssuerConfig::new(
            ISSUER,
            AUDIENCE,
            std::time::Duration::ZERO,
            b"another-secret".to_vec(),
        )
        .expect("valid config"),
    );
    let token = other.create("alice", now()).expect("token");

    let (status, _) = server.get(&format!("/verify?access_token={token}")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_verify_user_removed_after_login() {
    let server = TestServer::new(&default_dataset());
    let token = server.token_for("alice").await;

    server
        .replace_dataset(&dataset(&["bob"], &[("infra", &["bob"])]), |r| {
            r.generation >= 1
        })
        .await;

    let (status, body) = server.get(&format!("/verify?access_token={token}")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("alice"));
}
