//! HTTP transport for the auth service.
//!
//! Maps requests onto [`AuthService`] calls and service errors onto status
//! codes with a `{"error": message}` body.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json, Router,
    extract::{Path, Query, Request, State, rejection::JsonRejection},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};

use crate::api::{
    ErrorResponse, LoginRequest, LoginResponse, TeamResponse, VerifyQuery, VerifyResponse,
};
use crate::auth::{AuthService, ServiceError};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
}

impl AppState {
    pub fn new(auth: AuthService) -> Self {
        Self {
            auth: Arc::new(auth),
        }
    }
}

/// Build the router serving the public API.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/login", post(login))
        .route("/verify", get(verify))
        .route("/teams/{team_id}", get(team))
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(message) => (StatusCode::NOT_FOUND, message),
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".to_string()),
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::Internal(message) => {
                tracing::error!(error = %message, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ServiceError> {
    let Json(request) = body.map_err(|e| ServiceError::BadRequest(e.body_text()))?;

    let access_token = state
        .auth
        .login(&request.username, request.timestamp, &request.challenge)?;

    Ok(Json(LoginResponse { access_token }))
}

async fn verify(
    State(state): State<AppState>,
    Query(query): Query<VerifyQuery>,
) -> Result<Json<VerifyResponse>, ServiceError> {
    let token = query
        .access_token
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ServiceError::BadRequest("missing access_token".to_string()))?;

    let username = state.auth.verify(&token)?;
    Ok(Json(VerifyResponse { username }))
}

async fn team(
    State(state): State<AppState>,
    Path(team_id): Path<String>,
) -> Result<Json<TeamResponse>, ServiceError> {
    let members = state.auth.resolve_team(&team_id)?;
    Ok(Json(TeamResponse { team_id, members }))
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started = Instant::now();

    let response = next.run(request).await;

    tracing::info!(
        %method,
        path,
        status = response.status().as_u16(),
        latency_ms = started.elapsed().as_millis(),
        "handled request"
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn error_response(err: ServiceError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        (status, json)
    }

    #[tokio::test]
    async fn test_internal_hides_details() {
        let (status, body) =
            error_response(ServiceError::Internal("hmac key rejected".to_string())).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "internal server error");
        assert!(!body["error"].as_str().unwrap().contains("hmac"));
    }

    #[tokio::test]
    async fn test_not_found() {
        let (status, body) =
            error_response(ServiceError::NotFound("team web not found".to_string())).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "team web not found");
    }

    #[tokio::test]
    async fn test_unauthorized() {
        let (status, body) = error_response(ServiceError::Unauthorized).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "unauthorized");
    }

    #[tokio::test]
    async fn test_bad_request() {
        let (status, body) =
            error_response(ServiceError::BadRequest("invalid access token".to_string())).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid access token");
    }
}
