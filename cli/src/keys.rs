//! Local ed25519 key store.
//!
//! Each user's key pair lives in two files in one directory:
//! `<username>.public` (32-byte public key) and `<username>.private` (64-byte
//! keypair: seed followed by public key), both base64 text.
//!
//! # Invariants
//! - `generate` never overwrites an existing key pair.
//! - Usernames map to file names in the store directory only.

use std::path::{Path, PathBuf};

use base64::{Engine as _, engine::general_purpose};
use ed25519_dalek::{KEYPAIR_LENGTH, SECRET_KEY_LENGTH, SigningKey};

const PUBLIC_SUFFIX: &str = "public";
const PRIVATE_SUFFIX: &str = "private";

/// Base64 key material for one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPair {
    pub public: String,
    pub private: String,
}

/// Errors produced by [`FsKeyStore`].
#[derive(Debug)]
pub enum KeyStoreError {
    /// No key pair exists for the user.
    NotFound(String),
    /// A stored key is not valid base64 or has the wrong length.
    InvalidKey(String),
    /// A key pair already exists for the user.
    AlreadyExists(String),
    /// The username cannot be used as a file name.
    InvalidUsername(String),
    /// A filesystem operation failed.
    Io { path: PathBuf, source: std::io::Error },
}

impl std::fmt::Display for KeyStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(user) => write!(f, "no keys found for {user}"),
            Self::InvalidKey(user) => write!(f, "stored key for {user} is invalid"),
            Self::AlreadyExists(user) => write!(f, "keys for {user} already exist"),
            Self::InvalidUsername(user) => write!(f, "invalid username: {user:?}"),
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
        }
    }
}

impl std::error::Error for KeyStoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Key pairs stored as files in one directory.
#[derive(Debug, Clone)]
pub struct FsKeyStore {
    dir: PathBuf,
}

impl FsKeyStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create and store a fresh key pair for `username`.
    ///
    /// Creates the store directory if needed.
    pub fn generate(&self, username: &str) -> Result<KeyPair, KeyStoreError> {
        validate_username(username)?;
        let public_path = self.key_path(username, PUBLIC_SUFFIX);
        let private_path = self.key_path(username, PRIVATE_SUFFIX);
        if public_path.exists() || private_path.exists() {
            return Err(KeyStoreError::AlreadyExists(username.to_string()));
        }

        std::fs::create_dir_all(&self.dir).map_err(|source| KeyStoreError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let mut seed = [0u8; SECRET_KEY_LENGTH];
        rand::fill(&mut seed);
        let key = SigningKey::from_bytes(&seed);

        let pair = KeyPair {
            public: general_purpose::STANDARD.encode(key.verifying_key().as_bytes()),
            private: general_purpose::STANDARD.encode(key.to_keypair_bytes()),
        };

        write_key(&private_path, &pair.private)?;
        write_key(&public_path, &pair.public)?;
        tracing::debug!(username, dir = %self.dir.display(), "generated key pair");

        Ok(pair)
    }

    /// Read the stored key pair for `username`.
    pub fn load(&self, username: &str) -> Result<KeyPair, KeyStoreError> {
        validate_username(username)?;
        Ok(KeyPair {
            public: self.read_key(username, PUBLIC_SUFFIX)?,
            private: self.read_key(username, PRIVATE_SUFFIX)?,
        })
    }

    /// Decode the private key for `username`.
    ///
    /// Accepts the 64-byte keypair form and a bare 32-byte seed.
    pub fn load_signing_key(&self, username: &str) -> Result<SigningKey, KeyStoreError> {
        validate_username(username)?;
        let encoded = self.read_key(username, PRIVATE_SUFFIX)?;
        let invalid = || KeyStoreError::InvalidKey(username.to_string());

        let bytes = general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(|_| invalid())?;

        match bytes.len() {
            KEYPAIR_LENGTH => {
                let keypair: [u8; KEYPAIR_LENGTH] = bytes.as_slice().try_into().map_err(|_| invalid())?;
                SigningKey::from_keypair_bytes(&keypair).map_err(|_| invalid())
            }
            SECRET_KEY_LENGTH => {
                let seed: [u8; SECRET_KEY_LENGTH] = bytes.as_slice().try_into().map_err(|_| invalid())?;
                Ok(SigningKey::from_bytes(&seed))
            }
            _ => Err(invalid()),
        }
    }

    /// Remove both key files for `username`.
    pub fn delete(&self, username: &str) -> Result<(), KeyStoreError> {
        validate_username(username)?;
        let mut removed = false;
        for suffix in [PUBLIC_SUFFIX, PRIVATE_SUFFIX] {
            let path = self.key_path(username, suffix);
            match std::fs::remove_file(&path) {
                Ok(()) => removed = true,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => return Err(KeyStoreError::Io { path, source }),
            }
        }
        if removed {
            Ok(())
        } else {
            Err(KeyStoreError::NotFound(username.to_string()))
        }
    }

    /// Users with a stored public key, sorted.
    ///
    /// A missing store directory holds no users.
    pub fn list_users(&self) -> Result<Vec<String>, KeyStoreError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(KeyStoreError::Io {
                    path: self.dir.clone(),
                    source,
                });
            }
        };

        let mut users = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| KeyStoreError::Io {
                path: self.dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(PUBLIC_SUFFIX) {
                continue;
            }
            if let Some(user) = path.file_stem().and_then(|stem| stem.to_str()) {
                users.push(user.to_string());
            }
        }
        users.sort();
        Ok(users)
    }

    fn key_path(&self, username: &str, suffix: &str) -> PathBuf {
        self.dir.join(format!("{username}.{suffix}"))
    }

    fn read_key(&self, username: &str, suffix: &str) -> Result<String, KeyStoreError> {
        let path = self.key_path(username, suffix);
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(contents.trim().to_string()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(KeyStoreError::NotFound(username.to_string()))
            }
            Err(source) => Err(KeyStoreError::Io { path, source }),
        }
    }
}

fn validate_username(username: &str) -> Result<(), KeyStoreError> {
    let invalid = username.is_empty()
        || username.starts_with('.')
        || username.contains(['/', '\\'])
        || username.contains('\0');
    if invalid {
        return Err(KeyStoreError::InvalidUsername(username.to_string()));
    }
    Ok(())
}

fn write_key(path: &Path, contents: &str) -> Result<(), KeyStoreError> {
    std::fs::write(path, format!("{contents}\n")).map_err(|source| KeyStoreError::Io {
        path: path.to_path_buf(),
        source,
    })
}
