//! Login challenge codec.
//!
//! A challenge is an ed25519 signature over `username + "__" + timestamp`,
//! where the timestamp is rendered as RFC 3339 with second precision. The
//! client signs with its private key; the server rebuilds the same message and
//! checks the signature against the public key from the dataset.
//!
//! # Invariants
//! - The signed message is byte-for-byte `username + MESSAGE_SEPARATOR + format_timestamp(ts)`.
//! - No normalization is applied to either the username or the timestamp.

use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, SecondsFormat, TimeZone};
use ed25519_dalek::{SIGNATURE_LENGTH, Signature, Signer, SigningKey, Verifier, VerifyingKey};

/// Separator between the username and the timestamp in the signed message.
pub const MESSAGE_SEPARATOR: &str = "__";

/// Error returned when a challenge cannot be interpreted as a signature.
///
/// A signature that is well-formed but does not match is not an error;
/// `verify_challenge` reports it as `Ok(false)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeError {
    /// The challenge is not valid base64.
    InvalidEncoding(String),
    /// The challenge decoded to the wrong number of bytes.
    InvalidLength(usize),
}

impl std::fmt::Display for ChallengeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidEncoding(reason) => write!(f, "challenge is not valid base64: {reason}"),
            Self::InvalidLength(len) => write!(
                f,
                "challenge has invalid length: expected {SIGNATURE_LENGTH} bytes, got {len}"
            ),
        }
    }
}

impl std::error::Error for ChallengeError {}

/// Render a timestamp the way it appears in the signed message.
///
/// RFC 3339, whole seconds, `Z` for UTC and `+HH:MM` for any other offset.
pub fn format_timestamp<Tz>(timestamp: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Sign a login challenge for `username` at `timestamp`.
///
/// Returns the base64-encoded signature.
pub fn create_challenge<Tz>(username: &str, timestamp: &DateTime<Tz>, key: &SigningKey) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let message = challenge_message(username, timestamp);
    let signature = key.sign(&message);
    general_purpose::STANDARD.encode(signature.to_bytes())
}

/// Verify a login challenge.
///
/// # Returns
/// * `Ok(true)` if the signature matches the rebuilt message
/// * `Ok(false)` if it is well-formed but does not match
///
/// # Errors
/// Returns `ChallengeError` if the challenge is not base64 or has the wrong length.
pub fn verify_challenge<Tz>(
    challenge: &str,
    username: &str,
    timestamp: &DateTime<Tz>,
    key: &VerifyingKey,
) -> Result<bool, ChallengeError>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let bytes = general_purpose::STANDARD
        .decode(challenge)
        .map_err(|e| ChallengeError::InvalidEncoding(e.to_string()))?;

    let signature_bytes: [u8; SIGNATURE_LENGTH] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| ChallengeError::InvalidLength(bytes.len()))?;
    let signature = Signature::from_bytes(&signature_bytes);

    let message = challenge_message(username, timestamp);

    // ed25519-dalek compares in constant time
    Ok(key.verify(&message, &signature).is_ok())
}

fn challenge_message<Tz>(username: &str, timestamp: &DateTime<Tz>) -> Vec<u8>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!("{username}{MESSAGE_SEPARATOR}{}", format_timestamp(timestamp)).into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, FixedOffset, Utc};

    fn test_signing_key(seed: u8) -> SigningKey {
        SigningKey::from_bytes(&[seed; 32])
    }

    fn april_first() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_create_and_verify_challenge() {
        let key = test_signing_key(1);
        let ts = april_first();

        let challenge = create_challenge("alice", &ts, &key);
        let result = verify_challenge(&challenge, "alice", &ts, &key.verifying_key());

        assert_eq!(result, Ok(true));
    }

    #[test]
    fn test_altered_username_fails() {
        let key = test_signing_key(1);
        let ts = april_first();

        let challenge = create_challenge("alice", &ts, &key);

        assert_eq!(
            verify_challenge(&challenge, "bob", &ts, &key.verifying_key()),
            Ok(false)
        );
        assert_eq!(
            verify_challenge(&challenge, "alicf", &ts, &key.verifying_key()),
            Ok(false)
        );
    }

    #[test]
    fn test_altered_timestamp_fails() {
        let key = test_signing_key(1);
        let ts = april_first();

        let challenge = create_challenge("alice", &ts, &key);

        let plus_minute = ts + Duration::minutes(1);
        let plus_second = ts + Duration::seconds(1);
        assert_eq!(
            verify_challenge(&challenge, "alice", &plus_minute, &key.verifying_key()),
            Ok(false)
        );
        assert_eq!(
            verify_challenge(&challenge, "alice", &plus_second, &key.verifying_key()),
            Ok(false)
        );
    }

    #[test]
    fn test_wrong_key_fails() {
        let key = test_signing_key(1);
        let other = test_signing_key(2);
        let ts = april_first();

        let challenge = create_challenge("alice", &ts, &key);

        assert_eq!(
            verify_challenge(&challenge, "alice", &ts, &other.verifying_key()),
            Ok(false)
        );
    }

    #[test]
    fn test_malformed_challenge_is_error() {
        let key = test_signing_key(1);
        let result = verify_challenge("not base64!", "alice", &april_first(), &key.verifying_key());

        assert!(matches!(result, Err(ChallengeError::InvalidEncoding(_))));
    }

    #[test]
    fn test_short_challenge_is_error() {
        let key = test_signing_key(1);
        let short = general_purpose::STANDARD.encode(b"too_short");
        let result = verify_challenge(&short, "alice", &april_first(), &key.verifying_key());

        assert_eq!(result, Err(ChallengeError::InvalidLength(9)));
    }

    #[test]
    fn test_format_timestamp_utc_uses_z() {
        assert_eq!(format_timestamp(&april_first()), "2024-04-01T12:00:00Z");
    }

    #[test]
    fn test_format_timestamp_keeps_offset_and_drops_fraction() {
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let ts = offset
            .with_ymd_and_hms(2024, 4, 1, 14, 0, 0)
            .unwrap()
            .checked_add_signed(Duration::milliseconds(250))
            .unwrap();

        assert_eq!(format_timestamp(&ts), "2024-04-01T14:00:00+02:00");
    }

    #[test]
    fn test_same_instant_different_offset_is_different_message() {
        let key = test_signing_key(1);
        let utc = april_first();
        let shifted = utc.with_timezone(&FixedOffset::east_opt(3600).unwrap());

        let challenge = create_challenge("alice", &utc, &key);

        assert_eq!(
            verify_challenge(&challenge, "alice", &shifted, &key.verifying_key()),
            Ok(false)
        );
    }

    #[test]
    fn test_challenge_error_display() {
        assert_eq!(
            ChallengeError::InvalidLength(3).to_string(),
            "challenge has invalid length: expected 64 bytes, got 3"
        );
        assert!(
            ChallengeError::InvalidEncoding("bad byte".to_string())
                .to_string()
                .contains("bad byte")
        );
    }
}
