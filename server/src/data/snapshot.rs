//! Immutable, cross-validated view of the user/team dataset.
//!
//! # Pre-conditions
//! - The dataset document lists users as `{name, key}` with base64 ed25519 public keys.
//!
//! # Post-conditions
//! - A `Snapshot` is never modified after construction.
//!
//! # Invariants
//! - Every member of every team is a known user.
//! - Every user has a valid ed25519 public key.
//! - Usernames are unique.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use base64::{Engine as _, engine::general_purpose};
use ed25519_dalek::{PUBLIC_KEY_LENGTH, VerifyingKey};
use serde::Deserialize;

/// Errors produced while loading or validating a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataError {
    /// The dataset file could not be read.
    Io { path: PathBuf, reason: String },
    /// The dataset document could not be parsed.
    Parse(String),
    /// The dataset document is empty.
    Empty,
    /// A user's public key is not a valid base64 ed25519 key.
    InvalidKey { user: String, reason: String },
    /// The same username is listed more than once.
    DuplicateUser(String),
    /// A team lists a member that is not a known user.
    UnknownMember { team: String, user: String },
    /// The file watcher could not be started.
    Watch(String),
}

impl std::fmt::Display for DataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, reason } => write!(f, "failed to read {}: {reason}", path.display()),
            Self::Parse(reason) => write!(f, "failed to parse dataset: {reason}"),
            Self::Empty => write!(f, "dataset is empty"),
            Self::InvalidKey { user, reason } => {
                write!(f, "invalid public key for user '{user}': {reason}")
            }
            Self::DuplicateUser(user) => write!(f, "user '{user}' is listed more than once"),
            Self::UnknownMember { team, user } => {
                write!(f, "team '{team}' lists unknown user '{user}'")
            }
            Self::Watch(reason) => write!(f, "failed to watch dataset: {reason}"),
        }
    }
}

impl std::error::Error for DataError {}

/// Dataset document as stored on disk.
#[derive(Debug, Deserialize)]
struct DatasetFile {
    #[serde(default)]
    users: Vec<UserEntry>,
    #[serde(default)]
    teams: HashMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct UserEntry {
    name: String,
    key: String,
}

/// Users and teams at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    users: HashMap<String, VerifyingKey>,
    teams: HashMap<String, Vec<String>>,
}

impl Snapshot {
    /// Build a snapshot, enforcing that every team member is a known user.
    ///
    /// # Errors
    /// Returns `DataError::UnknownMember` for the first dangling member found.
    pub fn new(
        users: HashMap<String, VerifyingKey>,
        teams: HashMap<String, Vec<String>>,
    ) -> Result<Self, DataError> {
        for (team, members) in &teams {
            if let Some(user) = members.iter().find(|m| !users.contains_key(*m)) {
                return Err(DataError::UnknownMember {
                    team: team.clone(),
                    user: user.clone(),
                });
            }
        }
        Ok(Self { users, teams })
    }

    /// Parse and validate a YAML dataset document.
    ///
    /// # Errors
    /// Returns `DataError` if the document is empty, malformed, or violates
    /// any snapshot invariant.
    pub fn from_yaml(content: &str) -> Result<Self, DataError> {
        if content.trim().is_empty() {
            return Err(DataError::Empty);
        }

        let file: DatasetFile =
            serde_yaml::from_str(content).map_err(|e| DataError::Parse(e.to_string()))?;

        let mut users = HashMap::with_capacity(file.users.len());
        for entry in file.users {
            let key = decode_public_key(&entry.name, &entry.key)?;
            if users.insert(entry.name.clone(), key).is_some() {
                return Err(DataError::DuplicateUser(entry.name));
            }
        }

        Self::new(users, file.teams)
    }

    /// Read and validate the dataset at `path`.
    ///
    /// # Errors
    /// Returns `DataError::Io` if the file cannot be read, otherwise any
    /// error from [`Snapshot::from_yaml`].
    pub fn load(path: &Path) -> Result<Self, DataError> {
        let content = std::fs::read_to_string(path).map_err(|e| DataError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_yaml(&content)
    }

    /// Async variant of [`Snapshot::load`].
    ///
    /// # Errors
    /// Same as [`Snapshot::load`].
    pub async fn load_async(path: &Path) -> Result<Self, DataError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| DataError::Io {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        Self::from_yaml(&content)
    }

    #[must_use]
    pub fn public_key(&self, username: &str) -> Option<&VerifyingKey> {
        self.users.get(username)
    }

    #[must_use]
    pub fn contains_user(&self, username: &str) -> bool {
        self.users.contains_key(username)
    }

    /// Members of `team_id` in the order they are listed in the dataset.
    #[must_use]
    pub fn team_members(&self, team_id: &str) -> Option<&[String]> {
        self.teams.get(team_id).map(Vec::as_slice)
    }

    /// All usernames, sorted.
    #[must_use]
    pub fn usernames(&self) -> Vec<String> {
        let mut names: Vec<String> = self.users.keys().cloned().collect();
        names.sort();
        names
    }

    /// All team identifiers, sorted.
    #[must_use]
    pub fn team_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.teams.keys().cloned().collect();
        ids.sort();
        ids
    }

    #[must_use]
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    #[must_use]
    pub fn team_count(&self) -> usize {
        self.teams.len()
    }
}

fn decode_public_key(user: &str, encoded: &str) -> Result<VerifyingKey, DataError> {
    let invalid = |reason: String| DataError::InvalidKey {
        user: user.to_string(),
        reason,
    };

    let bytes = general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| invalid(e.to_string()))?;
    let bytes: [u8; PUBLIC_KEY_LENGTH] = bytes.as_slice().try_into().map_err(|_| {
        invalid(format!(
            "expected {PUBLIC_KEY_LENGTH} bytes, got {}",
            bytes.len()
        ))
    })?;

    VerifyingKey::from_bytes(&bytes).map_err(|e| invalid(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::SigningKey;

    fn public_key(seed: u8) -> String {
        let key = SigningKey::from_bytes(&[seed; 32]);
        general_purpose::STANDARD.encode(key.verifying_key().as_bytes())
    }

    fn sample_yaml() -> String {
        format!(
            "users:\n  - name: alice\n    key: {}\n  - name: bob\n    key: {}\n  - name: carol\n    key: {}\nteams:\n  infra: [carol, alice]\n  web:\n    - bob\n",
            public_key(1),
            public_key(2),
            public_key(3)
        )
    }

    #[test]
    fn test_parse_valid_dataset() {
        let snapshot = Snapshot::from_yaml(&sample_yaml()).expect("valid dataset");

        assert_eq!(snapshot.user_count(), 3);
        assert_eq!(snapshot.team_count(), 2);
        assert_eq!(snapshot.usernames(), vec!["alice", "bob", "carol"]);
        assert_eq!(snapshot.team_ids(), vec!["infra", "web"]);
        assert!(snapshot.contains_user("alice"));
        assert!(!snapshot.contains_user("dave"));
    }

    #[test]
    fn test_team_members_keep_order() {
        let snapshot = Snapshot::from_yaml(&sample_yaml()).expect("valid dataset");

        assert_eq!(
            snapshot.team_members("infra"),
            Some(["carol".to_string(), "alice".to_string()].as_slice())
        );
        assert_eq!(snapshot.team_members("missing"), None);
    }

    #[test]
    fn test_public_key_matches_signing_key() {
        let snapshot = Snapshot::from_yaml(&sample_yaml()).expect("valid dataset");
        let expected = SigningKey::from_bytes(&[1; 32]).verifying_key();

        assert_eq!(snapshot.public_key("alice"), Some(&expected));
    }

    #[test]
    fn test_unknown_member_rejected() {
        let yaml = format!(
            "users:\n  - name: alice\n    key: {}\nteams:\n  infra: [alice, mallory]\n",
            public_key(1)
        );

        let result = Snapshot::from_yaml(&yaml);
        assert_eq!(
            result,
            Err(DataError::UnknownMember {
                team: "infra".to_string(),
                user: "mallory".to_string(),
            })
        );
    }

    #[test]
    fn test_invalid_base64_key_rejected() {
        let yaml = "users:\n  - name: alice\n    key: '!!not base64!!'\n";
        let result = Snapshot::from_yaml(yaml);
        assert!(matches!(result, Err(DataError::InvalidKey { user, .. }) if user == "alice"));
    }

    #[test]
    fn test_short_key_rejected() {
        let yaml = format!(
            "users:\n  - name: alice\n    key: {}\n",
            general_purpose::STANDARD.encode(b"short")
        );
        let result = Snapshot::from_yaml(&yaml);
        assert!(matches!(result, Err(DataError::InvalidKey { .. })));
    }

    #[test]
    fn test_duplicate_user_rejected() {
        let yaml = format!(
            "users:\n  - name: alice\n    key: {}\n  - name: alice\n    key: {}\n",
            public_key(1),
            public_key(2)
        );
        let result = Snapshot::from_yaml(&yaml);
        assert_eq!(result, Err(DataError::DuplicateUser("alice".to_string())));
    }

    #[test]
    fn test_empty_document_rejected() {
        assert_eq!(Snapshot::from_yaml(""), Err(DataError::Empty));
        assert_eq!(Snapshot::from_yaml("  \n\n"), Err(DataError::Empty));
    }

    #[test]
    fn test_malformed_document_rejected() {
        let result = Snapshot::from_yaml("users: {not: [a list");
        assert!(matches!(result, Err(DataError::Parse(_))));
    }

    #[test]
    fn test_missing_teams_defaults_to_empty() {
        let yaml = format!("users:\n  - name: alice\n    key: {}\n", public_key(1));
        let snapshot = Snapshot::from_yaml(&yaml).expect("valid dataset");

        assert_eq!(snapshot.user_count(), 1);
        assert_eq!(snapshot.team_count(), 0);
    }

    #[test]
    fn test_new_enforces_membership() {
        let mut users = HashMap::new();
        users.insert(
            "alice".to_string(),
            SigningKey::from_bytes(&[1; 32]).verifying_key(),
        );
        let mut teams = HashMap::new();
        teams.insert("infra".to_string(), vec!["alice".to_string()]);
        assert!(Snapshot::new(users.clone(), teams.clone()).is_ok());

        teams.insert("web".to_string(), vec!["bob".to_string()]);
        assert!(matches!(
            Snapshot::new(users, teams),
            Err(DataError::UnknownMember { .. })
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("missing.yaml");

        let result = Snapshot::load(&path);
        assert!(matches!(result, Err(DataError::Io { .. })));
    }

    #[tokio::test]
    async fn test_load_async_reads_file() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("data.yaml");
        std::fs::write(&path, sample_yaml()).expect("write dataset");

        let snapshot = Snapshot::load_async(&path).await.expect("valid dataset");
        assert_eq!(snapshot, Snapshot::load(&path).expect("valid dataset"));
    }

    #[test]
    fn test_data_error_display() {
        let err = DataError::UnknownMember {
            team: "infra".to_string(),
            user: "mallory".to_string(),
        };
        assert_eq!(err.to_string(), "team 'infra' lists unknown user 'mallory'");
        assert_eq!(DataError::Empty.to_string(), "dataset is empty");
    }
}
