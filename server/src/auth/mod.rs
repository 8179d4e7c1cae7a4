//! Authentication.
//!
//! Users prove possession of their ed25519 private key by signing a
//! timestamped challenge; a successful login yields a short-lived HS512 access
//! token that can later be verified without contacting the client again.
//!
//! # Pre-conditions
//! - The token issuer is configured with a non-empty secret.
//!
//! # Post-conditions
//! - Issued tokens expire exactly one hour after issuance.
//!
//! # Invariants
//! - Private keys never reach the server; only public keys are stored.

pub mod challenge;
pub mod jwt;
pub mod service;
pub mod token_config;

pub use challenge::{ChallengeError, create_challenge, format_timestamp, verify_challenge};
pub use jwt::{TokenClaims, TokenError, TokenIssuer};
pub use service::{AuthService, ServiceError};
pub use token_config::{TOKEN_LIFETIME, TokenConfigError, TokenIssuerConfig};
