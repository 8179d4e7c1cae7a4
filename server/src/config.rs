//! Server configuration module.
//!
//! Configuration comes from an optional YAML file overlaid with environment
//! variables.
//!
//! # Configuration File
//!
//! Read from the path in `TEAMS_CONFIG`, else from `./server.yaml` when it
//! exists:
//!
//! ```yaml
//! listen_addr: 0.0.0.0:8080
//! jwt:
//!   secret: change-me
//!   issuer: teams
//!   audience: teams-api
//!   leeway: 30s
//! data:
//!   path: ./data.yaml
//! ```
//!
//! # Environment Variables
//!
//! - `TEAMS_LISTEN_ADDR`: Address to listen on (default: `0.0.0.0:8080`)
//! - `TEAMS_JWT_SECRET` or `JWT_SECRET`: HS512 secret (required)
//! - `TEAMS_JWT_ISSUER`: `iss` claim (default: empty)
//! - `TEAMS_JWT_AUDIENCE`: `aud` claim (default: empty)
//! - `TEAMS_JWT_LEEWAY`: Clock-skew tolerance such as `30s` (default: `0s`)
//! - `TEAMS_DATA_PATH` or `DATA_PATH`: Dataset file (required)
//!
//! Environment variables take precedence over the file. Empty values are
//! treated as unset.
//!
//! # Invariants
//!
//! - `jwt_secret` and `data_path` are never empty.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_VAR: &str = "TEAMS_CONFIG";
/// Configuration file used when `TEAMS_CONFIG` is not set.
pub const DEFAULT_CONFIG_FILE: &str = "server.yaml";

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address the HTTP server binds to.
    pub listen_addr: SocketAddr,
    /// HS512 secret used to sign access tokens.
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub jwt_leeway: Duration,
    /// YAML dataset of users and teams.
    pub data_path: PathBuf,
}

/// Error returned when loading configuration fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required setting is missing from both the file and the environment.
    MissingValue(String),
    /// A setting has an invalid value.
    InvalidValue { name: String, message: String },
    /// The configuration file could not be read or parsed.
    File { path: PathBuf, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingValue(name) => write!(f, "missing required setting: {name}"),
            Self::InvalidValue { name, message } => {
                write!(f, "invalid value for {name}: {message}")
            }
            Self::File { path, message } => {
                write!(f, "failed to load {}: {message}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    listen_addr: Option<SocketAddr>,
    jwt: JwtSection,
    data: DataSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct JwtSection {
    secret: Option<String>,
    issuer: Option<String>,
    audience: Option<String>,
    #[serde(with = "humantime_serde")]
    leeway: Option<Duration>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct DataSection {
    path: Option<PathBuf>,
}

impl ServerConfig {
    /// Default listen address.
    pub const DEFAULT_LISTEN_ADDR: SocketAddr =
        SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8080);

    /// Load configuration from the process environment and the configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file named by `TEAMS_CONFIG` cannot be read, if
    /// any file cannot be parsed, if a required setting is missing or if a
    /// value is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let env = |name: &str| std::env::var(name).ok();

        let contents = match env(CONFIG_PATH_VAR).filter(|path| !path.is_empty()) {
            Some(path) => {
                let path = PathBuf::from(path);
                let contents = read_file(&path)?;
                Some((path, contents))
            }
            None => {
                let path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if path.is_file() {
                    let contents = read_file(&path)?;
                    Some((path, contents))
                } else {
                    None
                }
            }
        };

        Self::from_sources(
            contents
                .as_ref()
                .map(|(path, contents)| (path.as_path(), contents.as_str())),
            env,
        )
    }

    /// Build the configuration from file contents and an environment lookup.
    ///
    /// # Arguments
    /// * `file` - Path and contents of the configuration file, if any.
    /// * `env` - Lookup for environment variables.
    ///
    /// # Errors
    ///
    /// See [`ServerConfig::load`].
    pub fn from_sources<F>(file: Option<(&Path, &str)>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = match file {
            Some((path, contents)) => parse_file(path, contents)?,
            None => ConfigFile::default(),
        };
        let env = |name: &str| env(name).filter(|value| !value.is_empty());

        let listen_addr = match env("TEAMS_LISTEN_ADDR") {
            Some(value) => value.parse().map_err(|e| ConfigError::InvalidValue {
                name: "TEAMS_LISTEN_ADDR".to_string(),
                message: format!("'{value}' is not a socket address: {e}"),
            })?,
            None => file.listen_addr.unwrap_or(Self::DEFAULT_LISTEN_ADDR),
        };

        let jwt_secret = env("TEAMS_JWT_SECRET")
            .or_else(|| env("JWT_SECRET"))
            .or(file.jwt.secret)
            .filter(|secret| !secret.is_empty())
            .ok_or_else(|| ConfigError::MissingValue("jwt.secret".to_string()))?;

        let jwt_issuer = env("TEAMS_JWT_ISSUER")
            .or(file.jwt.issuer)
            .unwrap_or_default();
        let jwt_audience = env("TEAMS_JWT_AUDIENCE")
            .or(file.jwt.audience)
            .unwrap_or_default();

        let jwt_leeway = match env("TEAMS_JWT_LEEWAY") {
            Some(value) => {
                humantime::parse_duration(&value).map_err(|e| ConfigError::InvalidValue {
                    name: "TEAMS_JWT_LEEWAY".to_string(),
                    message: format!("'{value}' is not a duration: {e}"),
                })?
            }
            None => file.jwt.leeway.unwrap_or(Duration::ZERO),
        };

        let data_path = env("TEAMS_DATA_PATH")
            .or_else(|| env("DATA_PATH"))
            .map(PathBuf::from)
            .or(file.data.path)
            .filter(|path| !path.as_os_str().is_empty())
            .ok_or_else(|| ConfigError::MissingValue("data.path".to_string()))?;

        Ok(Self {
            listen_addr,
            jwt_secret,
            jwt_issuer,
            jwt_audience,
            jwt_leeway,
            data_path,
        })
    }
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|e| ConfigError::File {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn parse_file(path: &Path, contents: &str) -> Result<ConfigFile, ConfigError> {
    if contents.trim().is_empty() {
        return Ok(ConfigFile::default());
    }
    serde_yaml::from_str(contents).map_err(|e| ConfigError::File {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    const FILE: &str = "
listen_addr: 127.0.0.1:9000
jwt:
  secret: from-file
  issuer: teams
  audience: teams-api
  leeway: 30s
data:
  path: /srv/teams/data.yaml
";

    #[test]
    fn test_env_only() {
        let config = ServerConfig::from_sources(
            None,
            env_of(&[("JWT_SECRET", "s3cret"), ("DATA_PATH", "data.yaml")]),
        )
        .expect("valid config");

        assert_eq!(config.listen_addr, ServerConfig::DEFAULT_LISTEN_ADDR);
        assert_eq!(config.listen_addr.to_string(), "0.0.0.0:8080");
        assert_eq!(config.jwt_secret, "s3cret");
        assert_eq!(config.jwt_issuer, "");
        assert_eq!(config.jwt_audience, "");
        assert_eq!(config.jwt_leeway, Duration::ZERO);
        assert_eq!(config.data_path, PathBuf::from("data.yaml"));
    }

    #[test]
    fn test_file_only() {
        let config =
            ServerConfig::from_sources(Some((Path::new("server.yaml"), FILE)), env_of(&[]))
                .expect("valid config");

        assert_eq!(config.listen_addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.jwt_secret, "from-file");
        assert_eq!(config.jwt_issuer, "teams");
        assert_eq!(config.jwt_audience, "teams-api");
        assert_eq!(config.jwt_leeway, Duration::from_secs(30));
        assert_eq!(config.data_path, PathBuf::from("/srv/teams/data.yaml"));
    }

    #[test]
    fn test_env_overrides_file() {
        let config = ServerConfig::from_sources(
            Some((Path::new("server.yaml"), FILE)),
            env_of(&[
                ("TEAMS_LISTEN_ADDR", "[::1]:7000"),
                ("TEAMS_JWT_SECRET", "from-env"),
                ("JWT_SECRET", "ignored"),
                ("TEAMS_JWT_LEEWAY", "1m"),
                ("TEAMS_DATA_PATH", "override.yaml"),
                ("TEAMS_JWT_ISSUER", ""),
            ]),
        )
        .expect("valid config");

        assert_eq!(config.listen_addr, "[::1]:7000".parse().unwrap());
        assert_eq!(config.jwt_secret, "from-env");
        assert_eq!(config.jwt_leeway, Duration::from_secs(60));
        assert_eq!(config.data_path, PathBuf::from("override.yaml"));
        // An empty variable does not clear the file value.
        assert_eq!(config.jwt_issuer, "teams");
    }

    #[test]
    fn test_missing_secret() {
        let result = ServerConfig::from_sources(None, env_of(&[("DATA_PATH", "data.yaml")]));
        assert_eq!(
            result,
            Err(ConfigError::MissingValue("jwt.secret".to_string()))
        );
    }

    #[test]
    fn test_missing_data_path() {
        let result = ServerConfig::from_sources(None, env_of(&[("JWT_SECRET", "s3cret")]));
        assert_eq!(
            result,
            Err(ConfigError::MissingValue("data.path".to_string()))
        );
    }

    #[test]
    fn test_invalid_listen_addr() {
        let result = ServerConfig::from_sources(
            None,
            env_of(&[
                ("JWT_SECRET", "s3cret"),
                ("DATA_PATH", "data.yaml"),
                ("TEAMS_LISTEN_ADDR", "localhost"),
            ]),
        );
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { name, .. }) if name == "TEAMS_LISTEN_ADDR"
        ));
    }

    #[test]
    fn test_invalid_leeway() {
        let result = ServerConfig::from_sources(
            None,
            env_of(&[
                ("JWT_SECRET", "s3cret"),
                ("DATA_PATH", "data.yaml"),
                ("TEAMS_JWT_LEEWAY", "soon"),
            ]),
        );
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { name, .. }) if name == "TEAMS_JWT_LEEWAY"
        ));
    }

    #[test]
    fn test_unknown_file_key() {
        let result = ServerConfig::from_sources(
            Some((Path::new("server.yaml"), "listen_port: 80\n")),
            env_of(&[("JWT_SECRET", "s3cret"), ("DATA_PATH", "data.yaml")]),
        );
        assert!(matches!(result, Err(ConfigError::File { .. })));
    }

    #[test]
    fn test_empty_file_is_allowed() {
        let config = ServerConfig::from_sources(
            Some((Path::new("server.yaml"), "\n")),
            env_of(&[("JWT_SECRET", "s3cret"), ("DATA_PATH", "data.yaml")]),
        )
        .expect("valid config");
        assert_eq!(config.jwt_secret, "s3cret");
    }

    #[test]
    fn test_config_error_display() {
        assert_eq!(
            ConfigError::MissingValue("jwt.secret".to_string()).to_string(),
            "missing required setting: jwt.secret"
        );
        assert_eq!(
            ConfigError::InvalidValue {
                name: "TEST_VAR".to_string(),
                message: "bad value".to_string(),
            }
            .to_string(),
            "invalid value for TEST_VAR: bad value"
        );
        assert_eq!(
            ConfigError::File {
                path: PathBuf::from("server.yaml"),
                message: "oops".to_string(),
            }
            .to_string(),
            "failed to load server.yaml: oops"
        );
    }
}
