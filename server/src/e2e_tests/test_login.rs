//! Test the challenge-response login.

use axum::http::StatusCode;
use chrono::{Duration, FixedOffset};

use crate::e2e_tests::helpers::*;

#[tokio::test]
async fn test_login_issues_token_for_subject() {
    let server = TestServer::new(&default_dataset());

    let (status, body) = server.login(&signed_login("alice", now().fixed_offset())).await;

    assert_eq!(status, StatusCode::OK);
    let token = body["access_token"].as_str().expect("access_token field");
    let claims = issuer().validate_at(token, now()).expect("valid token");
    assert_eq!(claims.subject, "alice");
    assert_eq!(claims.issuer, ISSUER);
    assert_eq!(claims.audience, AUDIENCE);
    assert_eq!(claims.expires_at - claims.issued_at, Duration::hours(1));
}

#[tokio::test]
async fn test_login_accepts_any_offset() {
    let server = TestServer::new(&default_dataset());
    let offset = FixedOffset::west_opt(5 * 3600).unwrap();

    let (status, _) = server
        .login(&signed_login("bob", now().with_timezone(&offset)))
        .await;

    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_login_with_old_timestamp_is_accepted() {
    // There is no freshness window on the signed timestamp.
    let server = TestServer::new(&default_dataset());

    let (status, _) = server
        .login(&signed_login("alice", (now() - Duration::days(30)).fixed_offset()))
        .await;

    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_login_unknown_user() {
    let server = TestServer::new(&default_dataset());

    let (status, body) = server
        .login(&signed_login("mallory", now().fixed_offset()))
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("mallory"));
}

#[tokio::test]
async fn test_login_signed_by_other_user() {
    let server = TestServer::new(&default_dataset());
    let request = signed_login_with("alice", now().fixed_offset(), &signing_key("bob"));

    let (status, body) = server.login(&request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn test_login_timestamp_altered_after_signing() {
    let server = TestServer::new(&default_dataset());
    let mut request = signed_login("alice", now().fixed_offset());
    request.timestamp += Duration::seconds(1);

    let (status, _) = server.login(&request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_malformed_challenge_matches_mismatch() {
    let server = TestServer::new(&default_dataset());
    let mut request = signed_login("alice", now().fixed_offset());
    request.challenge = "%%%".to_string();

    let (status, body) = server.login(&request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn test_login_malformed_body() {
    let server = TestServer::new(&default_dataset());

    let (status, body) = server.post_json("/login", r#"{"username":"alice"}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = server
        .post_json(
            "/login",
            r#"{"username":"alice","timestamp":"yesterday","challenge":"x"}"#,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = server.post_json("/login", "not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
