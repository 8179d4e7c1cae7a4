//! Login, token verification and team lookup.
//!
//! # Pre-conditions
//! - The repository reflects the current dataset; it may change between calls.
//!
//! # Post-conditions
//! - A token is issued only for a known user whose challenge signature verifies
//!   against that user's registered public key.
//!
//! # Invariants
//! - Callers never learn why a challenge was rejected; malformed and
//!   mismatching signatures produce the same `Unauthorized`.
//! - Codec and issuer error details are logged, never returned.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset};

use super::challenge::verify_challenge;
use super::jwt::TokenIssuer;
use crate::data::DataRepository;
use crate::time::TimeSource;

/// Message returned for tokens that fail validation.
pub const INVALID_TOKEN_MESSAGE: &str = "invalid access token";

/// Error returned by [`AuthService`] operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// The user or team does not exist.
    NotFound(String),
    /// The login challenge was rejected.
    Unauthorized,
    /// The request is malformed or carries an invalid token.
    BadRequest(String),
    /// An unexpected server-side failure.
    Internal(String),
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(message) | Self::BadRequest(message) | Self::Internal(message) => {
                write!(f, "{message}")
            }
            Self::Unauthorized => write!(f, "unauthorized"),
        }
    }
}

impl std::error::Error for ServiceError {}

/// Authentication and team lookup over a data repository.
pub struct AuthService {
    repository: Arc<dyn DataRepository>,
    issuer: TokenIssuer,
    clock: Arc<dyn TimeSource>,
}

impl AuthService {
    /// Create a service reading from `repository`, issuing tokens with
    /// `issuer` and stamping them with `clock`.
    pub fn new(
        repository: Arc<dyn DataRepository>,
        issuer: TokenIssuer,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            repository,
            issuer,
            clock,
        }
    }

    /// Verify a signed login challenge and issue an access token.
    ///
    /// # Errors
    /// - `NotFound` if `username` is not a known user.
    /// - `Unauthorized` if the challenge is malformed or does not verify.
    /// - `Internal` if the token cannot be signed.
    pub fn login(
        &self,
        username: &str,
        timestamp: DateTime<FixedOffset>,
        challenge: &str,
    ) -> Result<String, ServiceError> {
        let Some(key) = self.repository.user_public_key(username) else {
            return Err(ServiceError::NotFound(format!("user {username} not found")));
        };

        match verify_challenge(challenge, username, &timestamp, &key) {
            Ok(true) => {}
            Ok(false) => {
                tracing::info!(username, "login rejected: signature mismatch");
                return Err(ServiceError::Unauthorized);
            }
            Err(e) => {
                tracing::info!(username, error = %e, "login rejected: malformed challenge");
                return Err(ServiceError::Unauthorized);
            }
        }

        let token = self.issuer.create(username, self.clock.now()).map_err(|e| {
            tracing::error!(username, error = %e, "failed to sign access token");
            ServiceError::Internal("failed to issue access token".to_string())
        })?;

        tracing::info!(username, "issued access token");
        Ok(token)
    }

    /// Validate an access token and return its subject.
    ///
    /// # Errors
    /// - `BadRequest` if the token fails validation.
    /// - `NotFound` if the subject is no longer a known user.
    pub fn verify(&self, token: &str) -> Result<String, ServiceError> {
        let claims = self
            .issuer
            .validate_at(token, self.clock.now())
            .map_err(|e| {
                tracing::debug!(error = %e, "access token rejected");
                ServiceError::BadRequest(INVALID_TOKEN_MESSAGE.to_string())
            })?;

        if !self.repository.user_exists(&claims.subject) {
            return Err(ServiceError::NotFound(format!(
                "user {} not found",
                claims.subject
            )));
        }

        Ok(claims.subject)
    }

    /// Members of `team_id` in stored order.
    ///
    /// # Errors
    /// Returns `NotFound` if the team does not exist.
    pub fn resolve_team(&self, team_id: &str) -> Result<Vec<String>, ServiceError> {
        self.repository
            .team_members(team_id)
            .ok_or_else(|| ServiceError::NotFound(format!("team {team_id} not found")))
    }
}
