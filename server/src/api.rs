//! JSON bodies exchanged between the server and its clients.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Body of `POST /login`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    /// The instant that was signed, with the offset the client used.
    pub timestamp: DateTime<FixedOffset>,
    /// Base64 ed25519 signature over `username + "__" + timestamp`.
    pub challenge: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
}

/// Query string of `GET /verify`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VerifyQuery {
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamResponse {
    pub team_id: String,
    pub members: Vec<String>,
}

/// Body of every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
