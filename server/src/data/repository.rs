//! Lookup capability the auth service depends on.
//!
//! Implemented by [`Snapshot`] directly (useful as an in-memory fake) and by
//! the file-backed [`SnapshotStore`](super::SnapshotStore).

use ed25519_dalek::VerifyingKey;

use super::Snapshot;

/// Read-only access to users and team membership.
pub trait DataRepository: Send + Sync {
    /// Whether `username` is a known user.
    fn user_exists(&self, username: &str) -> bool;

    /// The public key registered for `username`.
    fn user_public_key(&self, username: &str) -> Option<VerifyingKey>;

    /// Members of `team_id`, in dataset order.
    fn team_members(&self, team_id: &str) -> Option<Vec<String>>;
}

impl DataRepository for Snapshot {
    fn user_exists(&self, username: &str) -> bool {
        self.contains_user(username)
    }

    fn user_public_key(&self, username: &str) -> Option<VerifyingKey> {
        self.public_key(username).copied()
    }

    fn team_members(&self, team_id: &str) -> Option<Vec<String>> {
        Snapshot::team_members(self, team_id).map(<[String]>::to_vec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use ed25519_dalek::SigningKey;

    fn snapshot() -> Snapshot {
        let mut users = HashMap::new();
        users.insert(
            "alice".to_string(),
            SigningKey::from_bytes(&[7; 32]).verifying_key(),
        );
        let mut teams = HashMap::new();
        teams.insert("infra".to_string(), vec!["alice".to_string()]);
        Snapshot::new(users, teams).expect("valid snapshot")
    }

    #[test]
    fn test_snapshot_as_repository() {
        let repository: &dyn DataRepository = &snapshot();

        assert!(repository.user_exists("alice"));
        assert!(!repository.user_exists("bob"));
        assert_eq!(
            repository.user_public_key("alice"),
            Some(SigningKey::from_bytes(&[7; 32]).verifying_key())
        );
        assert_eq!(repository.user_public_key("bob"), None);
        assert_eq!(
            repository.team_members("infra"),
            Some(vec!["alice".to_string()])
        );
        assert_eq!(repository.team_members("web"), None);
    }
}
