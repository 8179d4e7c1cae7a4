//! Test the liveness endpoint.

use axum::http::StatusCode;

use crate::e2e_tests::helpers::*;

#[tokio::test]
async fn test_health_returns_ok() {
    let server = TestServer::new(&default_dataset());

    let (status, body) = server.get_text("/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let server = TestServer::new(&default_dataset());

    let (status, _) = server.get_text("/nope").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}
