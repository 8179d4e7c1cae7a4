//! Test that the API follows dataset changes on disk.

use axum::http::StatusCode;
use chrono::Utc;

use crate::e2e_tests::helpers::*;

#[tokio::test]
async fn test_new_user_can_log_in_after_reload() {
    let server = TestServer::new(&default_dataset());

    let (status, _) = server.login(&signed_login("dave", Utc::now().fixed_offset())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    server
        .replace_dataset(
            &dataset(&["alice", "dave"], &[("infra", &["dave", "alice"])]),
            |r| r.generation >= 1,
        )
        .await;

    let (status, _) = server.login(&signed_login("dave", Utc::now().fixed_offset())).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = server.get("/teams/infra").await;
    assert_eq!(body["members"], serde_json::json!(["dave", "alice"]));
}

#[tokio::test]
async fn test_invalid_dataset_keeps_serving_previous() {
    let server = TestServer::new(&default_dataset());

    let report = server
        .replace_dataset(
            &dataset(&["alice"], &[("infra", &["alice", "ghost"])]),
            |r| r.failures >= 1,
        )
        .await;
    assert_eq!(report.generation, 0);

    let (status, body) = server.get("/teams/infra").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["members"], serde_json::json!(["bob", "alice"]));

    let (status, _) = server.login(&signed_login("bob", now().fixed_offset())).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_unparseable_dataset_keeps_serving_previous() {
    let server = TestServer::new(&default_dataset());

    server
        .replace_dataset("users: [unterminated\n", |r| r.failures >= 1)
        .await;

    let (status, _) = server.get("/teams/web").await;
    assert_eq!(status, StatusCode::OK);
}
