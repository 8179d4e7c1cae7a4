//! Test team membership lookup.

use axum::http::StatusCode;

use crate::e2e_tests::helpers::*;

#[tokio::test]
async fn test_team_members_in_stored_order() {
    let server = TestServer::new(&default_dataset());

    let (status, body) = server.get("/teams/infra").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        serde_json::json!({"team_id": "infra", "members": ["bob", "alice"]})
    );
}

#[tokio::test]
async fn test_unknown_team() {
    let server = TestServer::new(&default_dataset());

    let (status, body) = server.get("/teams/payments").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("payments"));
}

#[tokio::test]
async fn test_empty_team() {
    let server = TestServer::new(&dataset(&["alice"], &[("empty", &[])]));

    let (status, body) = server.get("/teams/empty").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["members"], serde_json::json!([]));
}
