//! Access token issuing and validation.
//!
//! Issues HS512-signed JSON Web Tokens carrying the authenticated username in
//! the `sub` claim and validates them against the same configuration.
//!
//! # Pre-conditions
//! - The issuer is constructed from a `TokenIssuerConfig` (non-empty secret).
//!
//! # Post-conditions
//! - Issued tokens expire exactly [`TOKEN_LIFETIME`] after issuance.
//! - On successful validation, returns the decoded claims.
//!
//! # Invariants
//! - Only HS512 is accepted; tokens signed with any other algorithm are rejected.
//! - Tokens without an `exp` claim are rejected, never treated as non-expiring.
//! - Validation is stateless; nothing about issued tokens is stored.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use super::token_config::{TOKEN_LIFETIME, TokenIssuerConfig};

/// The one signing algorithm used for access tokens.
pub const TOKEN_ALGORITHM: Algorithm = Algorithm::HS512;

/// Claims as they appear on the wire.
///
/// Every field is optional so a missing claim is reported as
/// `TokenError::MissingClaim` instead of a generic decoding failure.
#[derive(Debug, Serialize, Deserialize)]
struct RawClaims {
    #[serde(skip_serializing_if = "Option::is_none")]
    sub: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    iss: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    aud: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    iat: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    nbf: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exp: Option<i64>,
}

/// Claims of a validated access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    /// Authenticated username.
    pub subject: String,
    pub issuer: String,
    pub audience: String,
    pub issued_at: DateTime<Utc>,
    pub not_before: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Error returned when issuing or validating a token fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The token is malformed or cannot be parsed.
    MalformedToken,
    /// The token signature is invalid.
    InvalidSignature,
    /// The token was signed with an algorithm other than HS512.
    InvalidAlgorithm,
    /// The `iss` claim does not match the configured issuer.
    InvalidIssuer,
    /// The `aud` claim does not match the configured audience.
    InvalidAudience,
    /// A required claim is missing.
    MissingClaim(String),
    /// The token has expired.
    Expired,
    /// The `nbf` claim is in the future.
    NotYetValid,
    /// The `iat` claim is in the future.
    IssuedInFuture,
    /// The token could not be signed.
    Signing(String),
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedToken => write!(f, "malformed access token"),
            Self::InvalidSignature => write!(f, "invalid access token signature"),
            Self::InvalidAlgorithm => write!(f, "access token uses a disallowed algorithm"),
            Self::InvalidIssuer => write!(f, "access token has an unexpected issuer"),
            Self::InvalidAudience => write!(f, "access token has an unexpected audience"),
            Self::MissingClaim(claim) => write!(f, "missing '{claim}' claim in access token"),
            Self::Expired => write!(f, "access token has expired"),
            Self::NotYetValid => write!(f, "access token is not valid yet"),
            Self::IssuedInFuture => write!(f, "access token was issued in the future"),
            Self::Signing(reason) => write!(f, "access token creation: {reason}"),
        }
    }
}

impl std::error::Error for TokenError {}

/// Creates and validates access tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    config: TokenIssuerConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenIssuer {
    /// Create an issuer from a validated configuration.
    #[must_use]
    pub fn new(config: TokenIssuerConfig) -> Self {
        let mut validation = Validation::new(TOKEN_ALGORITHM);
        // Time-based claims are checked against the caller's clock in `validate_at`.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.set_required_spec_claims(&["exp", "nbf", "sub", "iss", "aud"]);
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_audience(&[config.audience.as_str()]);

        Self {
            encoding_key: EncodingKey::from_secret(config.secret()),
            decoding_key: DecodingKey::from_secret(config.secret()),
            validation,
            config,
        }
    }

    /// The configuration this issuer was built from.
    #[must_use]
    pub const fn config(&self) -> &TokenIssuerConfig {
        &self.config
    }

    /// Issue a token for `username`, valid from `now` for one hour.
    ///
    /// # Errors
    /// Returns `TokenError::Signing` if the token cannot be encoded.
    pub fn create(&self, username: &str, now: DateTime<Utc>) -> Result<String, TokenError> {
        let issued_at = now.timestamp();
        let lifetime = i64::try_from(TOKEN_LIFETIME.as_secs()).unwrap_or(i64::MAX);

        let claims = RawClaims {
            sub: Some(username.to_string()),
            iss: Some(self.config.issuer.clone()),
            aud: Some(self.config.audience.clone()),
            iat: Some(issued_at),
            nbf: Some(issued_at),
            exp: Some(issued_at.saturating_add(lifetime)),
        };

        encode(&Header::new(TOKEN_ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Validate a token against the system clock.
    ///
    /// # Errors
    /// Returns `TokenError` if validation fails for any reason.
    pub fn validate(&self, token: &str) -> Result<TokenClaims, TokenError> {
        self.validate_at(token, Utc::now())
    }

    /// Validate a token as of `now`.
    ///
    /// # Errors
    /// Returns `TokenError` if the signature, algorithm, issuer, audience or
    /// any time-based claim is invalid, or if a required claim is missing.
    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Result<TokenClaims, TokenError> {
        let token_data =
            decode::<RawClaims>(token, &self.decoding_key, &self.validation).map_err(map_jwt_error)?;
        let claims = token_data.claims;

        let subject = claims
            .sub
            .filter(|sub| !sub.is_empty())
            .ok_or_else(|| TokenError::MissingClaim("sub".to_string()))?;
        let issuer = claims.iss.ok_or_else(|| TokenError::MissingClaim("iss".to_string()))?;
        let audience = claims.aud.ok_or_else(|| TokenError::MissingClaim("aud".to_string()))?;
        let exp = claims.exp.ok_or_else(|| TokenError::MissingClaim("exp".to_string()))?;
        let nbf = claims.nbf.ok_or_else(|| TokenError::MissingClaim("nbf".to_string()))?;
        let iat = claims.iat.ok_or_else(|| TokenError::MissingClaim("iat".to_string()))?;

        let now = now.timestamp();
        let leeway = i64::try_from(self.config.leeway.as_secs()).unwrap_or(i64::MAX);

        if now >= exp.saturating_add(leeway) {
            return Err(TokenError::Expired);
        }
        if now < nbf.saturating_sub(leeway) {
            return Err(TokenError::NotYetValid);
        }
        if now < iat.saturating_sub(leeway) {
            return Err(TokenError::IssuedInFuture);
        }

        Ok(TokenClaims {
            subject,
            issuer,
            audience,
            issued_at: to_datetime(iat)?,
            not_before: to_datetime(nbf)?,
            expires_at: to_datetime(exp)?,
        })
    }
}

fn to_datetime(seconds: i64) -> Result<DateTime<Utc>, TokenError> {
    DateTime::from_timestamp(seconds, 0).ok_or(TokenError::MalformedToken)
}

/// Maps jsonwebtoken errors to our `TokenError` type.
fn map_jwt_error(error: jsonwebtoken::errors::Error) -> TokenError {
    use jsonwebtoken::errors::ErrorKind;

    match error.kind() {
        ErrorKind::InvalidSignature => TokenError::InvalidSignature,
        ErrorKind::InvalidAlgorithm => TokenError::InvalidAlgorithm,
        ErrorKind::InvalidIssuer => TokenError::InvalidIssuer,
        ErrorKind::InvalidAudience => TokenError::InvalidAudience,
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::ImmatureSignature => TokenError::NotYetValid,
        ErrorKind::MissingRequiredClaim(claim) => TokenError::MissingClaim(claim.clone()),
        _ => TokenError::MalformedToken,
    }
}
