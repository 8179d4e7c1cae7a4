//! Client configuration.
//!
//! Read from `--config`, else `~/.teams.yaml`, else `./.teams.yaml`. A missing
//! default file is not an error.
//!
//! ```yaml
//! server: http://localhost:8080
//! keys_dir: /home/alice/.teams/keys
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::UserDirs;
use serde::Deserialize;

pub const CONFIG_FILE_NAME: &str = ".teams.yaml";
pub const DEFAULT_SERVER: &str = "http://localhost:8080";

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    server: Option<String>,
    keys_dir: Option<PathBuf>,
}

/// Resolved client settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the teams server.
    pub server: String,
    /// Directory holding `<user>.public` / `<user>.private`.
    pub keys_dir: PathBuf,
}

impl ClientConfig {
    /// Resolve the configuration for this invocation.
    ///
    /// `explicit` must exist when given; `server` overrides the file.
    pub fn load(explicit: Option<&Path>, server: Option<String>) -> Result<Self> {
        let home = UserDirs::new().map(|dirs| dirs.home_dir().to_path_buf());

        let file = match explicit {
            Some(path) => Some(read_file(path)?),
            None => {
                let candidates = home
                    .iter()
                    .map(|home| home.join(CONFIG_FILE_NAME))
                    .chain(std::iter::once(PathBuf::from(CONFIG_FILE_NAME)));
                let mut found = None;
                for candidate in candidates {
                    if candidate.is_file() {
                        found = Some(read_file(&candidate)?);
                        break;
                    }
                }
                found
            }
        };

        Self::resolve(file.unwrap_or_default(), server, home.as_deref())
    }

    fn resolve(file: ConfigFile, server: Option<String>, home: Option<&Path>) -> Result<Self> {
        let server = server
            .or(file.server)
            .unwrap_or_else(|| DEFAULT_SERVER.to_string());

        let keys_dir = match file.keys_dir {
            Some(dir) => dir,
            None => home
                .map(|home| home.join(".teams").join("keys"))
                .context("could not determine home directory; set keys_dir in the config file")?,
        };

        Ok(Self {
            server: server.trim_end_matches('/').to_string(),
            keys_dir,
        })
    }
}

fn read_file(path: &Path) -> Result<ConfigFile> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    if contents.trim().is_empty() {
        return Ok(ConfigFile::default());
    }
    serde_yaml::from_str(&contents)
        .with_context(|| format!("failed to parse config file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_home() {
        let config =
            ClientConfig::resolve(ConfigFile::default(), None, Some(Path::new("/home/alice")))
                .unwrap();

        assert_eq!(config.server, DEFAULT_SERVER);
        assert_eq!(config.keys_dir, PathBuf::from("/home/alice/.teams/keys"));
    }

    #[test]
    fn test_flag_overrides_file() {
        let file = ConfigFile {
            server: Some("http://teams.internal".to_string()),
            keys_dir: Some(PathBuf::from("/etc/teams/keys")),
        };

        let config = ClientConfig::resolve(file, Some("http://other:9000/".to_string()), None)
            .unwrap();

        assert_eq!(config.server, "http://other:9000");
        assert_eq!(config.keys_dir, PathBuf::from("/etc/teams/keys"));
    }

    #[test]
    fn test_no_home_requires_keys_dir() {
        assert!(ClientConfig::resolve(ConfigFile::default(), None, None).is_err());
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("teams.yaml");
        std::fs::write(&path, "server: http://teams.example:8080\nkeys_dir: /tmp/keys\n").unwrap();

        let config = ClientConfig::load(Some(&path), None).unwrap();

        assert_eq!(config.server, "http://teams.example:8080");
        assert_eq!(config.keys_dir, PathBuf::from("/tmp/keys"));
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();

        let result = ClientConfig::load(Some(&dir.path().join("absent.yaml")), None);

        assert!(result.is_err());
    }

    #[test]
    fn test_load_rejects_unknown_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("teams.yaml");
        std::fs::write(&path, "sever: http://typo\n").unwrap();

        assert!(ClientConfig::load(Some(&path), None).is_err());
    }
}
