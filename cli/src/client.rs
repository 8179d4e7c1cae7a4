//! HTTP client for the teams server API.

use std::time::Duration;

use reqwest::{Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use teams_server::api::{
    ErrorResponse, LoginRequest, LoginResponse, TeamResponse, VerifyResponse,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors produced by [`ApiClient`].
#[derive(Debug)]
pub enum ClientError {
    /// The request could not be sent or the response could not be read.
    Http(reqwest::Error),
    /// The server answered with a non-success status.
    Status { status: StatusCode, message: String },
    /// The configured server address is not a usable base URL.
    InvalidUrl(String),
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http(e) => write!(f, "request failed: {e}"),
            Self::Status { status, message } => write!(f, "server returned {status}: {message}"),
            Self::InvalidUrl(reason) => write!(f, "invalid server URL: {reason}"),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Http(e) => Some(e),
            Self::Status { .. } | Self::InvalidUrl(_) => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e)
    }
}

/// Typed access to the server's JSON API.
pub struct ApiClient {
    base_url: Url,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let base_url =
            Url::parse(base_url).map_err(|e| ClientError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(format!("{base_url} cannot be a base")));
        }
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { base_url, http })
    }

    /// Append `segments` to the base URL, percent-encoding each one.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Exchange a signed challenge for an access token.
    pub async fn login(&self, request: &LoginRequest) -> Result<String, ClientError> {
        let response = self.http.post(self.url(&["login"])).json(request).send().await?;
        let body: LoginResponse = parse(response).await?;
        Ok(body.access_token)
    }

    /// Return the username an access token was issued to.
    pub async fn verify(&self, token: &str) -> Result<String, ClientError> {
        let response = self
            .http
            .get(self.url(&["verify"]))
            .query(&[("access_token", token)])
            .send()
            .await?;
        let body: VerifyResponse = parse(response).await?;
        Ok(body.username)
    }

    /// Members of `team_id` in stored order.
    pub async fn team(&self, team_id: &str) -> Result<Vec<String>, ClientError> {
        let response = self
            .http
            .get(self.url(&["teams", team_id]))
            .send()
            .await?;
        let body: TeamResponse = parse(response).await?;
        Ok(body.members)
    }

    pub async fn health(&self) -> Result<(), ClientError> {
        let response = self.http.get(self.url(&["health"])).send().await?;
        check_status(response).await.map(|_| ())
    }
}

async fn parse<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let response = check_status(response).await?;
    Ok(response.json().await?)
}

async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&text)
        .map(|body| body.error)
        .unwrap_or(text);
    Err(ClientError::Status { status, message })
}
