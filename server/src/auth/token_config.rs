//! Access token issuer configuration.
//!
//! # Pre-conditions
//! - `secret` must be non-empty.
//!
//! # Post-conditions
//! - `TokenIssuerConfig` instances are immutable once created.
//!
//! # Invariants
//! - The HS512 secret is never empty.
//! - The token lifetime is fixed at [`TOKEN_LIFETIME`] and is not configurable.

use std::time::Duration;

/// Lifetime of every issued access token.
pub const TOKEN_LIFETIME: Duration = Duration::from_secs(60 * 60);

/// Error returned when the issuer configuration is invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenConfigError {
    /// The HS512 secret is empty.
    EmptySecret,
}

impl std::fmt::Display for TokenConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptySecret => write!(f, "HS512 secret must not be empty"),
        }
    }
}

impl std::error::Error for TokenConfigError {}

/// Settings stamped into issued tokens and enforced on validation.
#[derive(Clone)]
pub struct TokenIssuerConfig {
    /// Value of the `iss` claim.
    pub issuer: String,
    /// Value of the `aud` claim.
    pub audience: String,
    /// Clock-skew tolerance applied to `exp`, `nbf` and `iat`.
    pub leeway: Duration,
    secret: Vec<u8>,
}

impl TokenIssuerConfig {
    /// Create a new issuer configuration.
    ///
    /// # Errors
    /// Returns `TokenConfigError::EmptySecret` if the secret is empty.
    pub fn new(
        issuer: impl Into<String>,
        audience: impl Into<String>,
        leeway: Duration,
        secret: Vec<u8>,
    ) -> Result<Self, TokenConfigError> {
        if secret.is_empty() {
            return Err(TokenConfigError::EmptySecret);
        }
        Ok(Self {
            issuer: issuer.into(),
            audience: audience.into(),
            leeway,
            secret,
        })
    }

    /// The shared HMAC secret.
    #[must_use]
    pub fn secret(&self) -> &[u8] {
        &self.secret
    }
}

// Keep the secret out of logs.
impl std::fmt::Debug for TokenIssuerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuerConfig")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("leeway", &self.leeway)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_valid() {
        let config = TokenIssuerConfig::new("teams", "teams-api", Duration::from_secs(5), b"s3cret".to_vec())
            .expect("valid secret");

        assert_eq!(config.issuer, "teams");
        assert_eq!(config.audience, "teams-api");
        assert_eq!(config.leeway, Duration::from_secs(5));
        assert_eq!(config.secret(), b"s3cret");
    }

    #[test]
    fn test_new_empty_secret() {
        let result = TokenIssuerConfig::new("teams", "teams-api", Duration::ZERO, Vec::new());
        assert!(matches!(result, Err(TokenConfigError::EmptySecret)));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config =
            TokenIssuerConfig::new("teams", "", Duration::ZERO, b"do-not-print".to_vec()).expect("valid secret");
        let rendered = format!("{config:?}");

        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("do-not-print"));
    }

    #[test]
    fn test_token_lifetime_is_one_hour() {
        assert_eq!(TOKEN_LIFETIME, Duration::from_secs(3600));
    }

    #[test]
    fn test_token_config_error_display() {
        assert_eq!(
            TokenConfigError::EmptySecret.to_string(),
            "HS512 secret must not be empty"
        );
    }
}
