//! Configuration loader and validator for the cadence tracker.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub user: UserIdentity,
    #[serde(default)]
    pub storage: Storage,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
}

/// Identity the CLI acts as. Authentication happens upstream; this is only the
/// opaque id every read and write is scoped to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserIdentity {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Storage {
    /// Falls back to `sqlite://{data_dir}/cadence.db` when unset.
    #[serde(default)]
    pub database_url: Option<String>,
}

impl App {
    /// `data_dir` with a leading `~/` expanded to `$HOME`.
    pub fn resolved_data_dir(&self) -> String {
        match (self.data_dir.strip_prefix("~/"), std::env::var("HOME")) {
            (Some(rest), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
            _ => self.data_dir.clone(),
        }
    }
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(self.app.resolved_data_dir())
    }

    /// Database URL: `storage.database_url` if set, else a file under the data dir.
    pub fn database_url(&self) -> String {
        match self.storage.database_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url.to_string(),
            _ => format!("sqlite://{}/cadence.db", self.app.resolved_data_dir()),
        }
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    if cfg.user.id.trim().is_empty() {
        return Err(ConfigError::Invalid("user.id must be non-empty"));
    }
    if let Some(url) = &cfg.storage.database_url {
        if !url.trim().is_empty() && !url.trim_start().starts_with("sqlite:") {
            return Err(ConfigError::Invalid(
                "storage.database_url must be a sqlite: URL",
            ));
        }
    }
    Ok(())
}

pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"

user:
  id: "user_2abcDEF"
  email: "ann@example.com"

storage:
  # Defaults to sqlite://<data_dir>/cadence.db
  database_url: null
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parse_example_ok() {
        let cfg: Config = serde_yaml::from_str(example()).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.user.id, "user_2abcDEF");
        assert_eq!(cfg.database_url(), "sqlite://./data/cadence.db");
    }

    #[test]
    fn storage_section_is_optional() {
        let cfg: Config =
            serde_yaml::from_str("app:\n  data_dir: \"/tmp/x\"\nuser:\n  id: \"u\"\n").unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.storage, Storage::default());
        assert_eq!(cfg.user.email, None);
    }

    #[test]
    fn invalid_user_id() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.user.id = "  ".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("user.id")),
            _ => panic!("wrong error"),
        }
    }

    #[test]
    fn invalid_data_dir() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.data_dir = "".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn explicit_database_url_wins() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.storage.database_url = Some("sqlite::memory:".into());
        validate(&cfg).unwrap();
        assert_eq!(cfg.database_url(), "sqlite::memory:");

        cfg.storage.database_url = Some("postgres://localhost/db".into());
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn ensure_dirs_creates_data_dir() {
        let td = tempdir().unwrap();
        let data_path = td.path().join("data");
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.data_dir = data_path.to_string_lossy().to_string();
        cfg.ensure_dirs().unwrap();
        assert!(data_path.exists());
    }

    #[test]
    fn load_from_file_ok() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.yaml");
        fs::write(&p, example()).unwrap();
        let cfg = load(Some(&p)).unwrap();
        assert_eq!(cfg.user.email.as_deref(), Some("ann@example.com"));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let td = tempdir().unwrap();
        let err = load(Some(&td.path().join("nope.yaml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
