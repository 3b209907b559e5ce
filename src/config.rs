use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct NoeticConfig {
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
    pub session: SessionConfig,
    pub staleness: StalenessConfig,
    pub query: QueryConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
    pub session_file: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SessionConfig {
    pub default_ai_id: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StalenessConfig {
    /// When false, subject hashes are never compared and every file is
    /// treated as unchanged.
    pub check_file_changes: bool,
    pub git_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct QueryConfig {
    pub default_limit: usize,
    pub fuzzy_threshold: f64,
    pub context_findings: usize,
    pub context_unknowns: usize,
    pub context_dead_ends: usize,
    pub session_limit: usize,
}

impl Default for NoeticConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            storage: StorageConfig::default(),
            session: SessionConfig::default(),
            staleness: StalenessConfig::default(),
            query: QueryConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let base = default_noetic_dir();
        Self {
            db_path: base.join("sessions.db").to_string_lossy().into_owned(),
            session_file: base
                .join("active-session.json")
                .to_string_lossy()
                .into_owned(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_ai_id: "claude-code".into(),
        }
    }
}

impl Default for StalenessConfig {
    fn default() -> Self {
        Self {
            check_file_changes: true,
            git_timeout_ms: 2000,
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_limit: 50,
            fuzzy_threshold: 0.3,
            context_findings: 20,
            context_unknowns: 10,
            context_dead_ends: 10,
            session_limit: 100,
        }
    }
}

/// Name of the project-local state directory.
pub const LOCAL_DIR: &str = ".noetic";

/// Returns `./.noetic/` when it exists in the working directory, else `~/.noetic/`.
pub fn default_noetic_dir() -> PathBuf {
    let local = PathBuf::from(LOCAL_DIR);
    if local.is_dir() {
        return local;
    }
    match dirs::home_dir() {
        Some(home) => home.join(LOCAL_DIR),
        None => local,
    }
}

/// Returns the default config file path: `<noetic dir>/config.toml`
pub fn default_config_path() -> PathBuf {
    default_noetic_dir().join("config.toml")
}

impl NoeticConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            NoeticConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    /// (NOETIC_DB, NOETIC_SESSION_FILE, NOETIC_LOG_LEVEL, NOETIC_AI_ID).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("NOETIC_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("NOETIC_SESSION_FILE") {
            self.storage.session_file = val;
        }
        if let Ok(val) = std::env::var("NOETIC_LOG_LEVEL") {
            self.logging.log_level = val;
        }
        if let Ok(val) = std::env::var("NOETIC_AI_ID") {
            self.session.default_ai_id = val;
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    /// Resolve the active-session file path, expanding `~` if needed.
    pub fn resolved_session_file(&self) -> PathBuf {
        expand_tilde(&self.storage.session_file)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => PathBuf::from(path),
        }
    } else {
        PathBuf::from(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = NoeticConfig::default();
        assert_eq!(config.logging.log_level, "warn");
        assert_eq!(config.session.default_ai_id, "claude-code");
        assert_eq!(config.query.default_limit, 50);
        assert!((config.query.fuzzy_threshold - 0.3).abs() < 1e-9);
        assert!(config.storage.db_path.ends_with("sessions.db"));
        assert!(config.storage.session_file.ends_with("active-session.json"));
        assert!(config.staleness.check_file_changes);
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[logging]
log_level = "debug"

[storage]
db_path = "/tmp/test.db"

[query]
default_limit = 10
"#;
        let config: NoeticConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.logging.log_level, "debug");
        assert_eq!(config.storage.db_path, "/tmp/test.db");
        assert_eq!(config.query.default_limit, 10);
        // defaults still apply for unset fields
        assert_eq!(config.query.context_findings, 20);
        assert_eq!(config.staleness.git_timeout_ms, 2000);
        assert!(config.storage.session_file.ends_with("active-session.json"));
    }

    #[test]
    fn load_from_missing_file_uses_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = NoeticConfig::load_from(tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config.query.session_limit, 100);
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = NoeticConfig::default();
        std::env::set_var("NOETIC_DB", "/tmp/override.db");
        std::env::set_var("NOETIC_SESSION_FILE", "/tmp/active.json");
        std::env::set_var("NOETIC_LOG_LEVEL", "trace");
        std::env::set_var("NOETIC_AI_ID", "agent-7");

        config.apply_env_overrides();

        assert_eq!(config.storage.db_path, "/tmp/override.db");
        assert_eq!(config.storage.session_file, "/tmp/active.json");
        assert_eq!(config.logging.log_level, "trace");
        assert_eq!(config.session.default_ai_id, "agent-7");

        // Clean up
        std::env::remove_var("NOETIC_DB");
        std::env::remove_var("NOETIC_SESSION_FILE");
        std::env::remove_var("NOETIC_LOG_LEVEL");
        std::env::remove_var("NOETIC_AI_ID");
    }

    #[test]
    fn expand_tilde_leaves_absolute_paths() {
        assert_eq!(expand_tilde("/var/db.sqlite"), PathBuf::from("/var/db.sqlite"));
    }
}
