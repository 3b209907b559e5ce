//! The active-session file shared between CLI invocations.
//!
//! Every command that logs breadcrumbs reads this to learn which session and
//! project it belongs to. `start` writes it and `done` removes it.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveSession {
    pub session_id: String,
    pub ai_id: String,
    pub objective: String,
    pub started_at: DateTime<Utc>,
    pub project_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_goal_id: Option<String>,
}

impl ActiveSession {
    /// Session start as Unix seconds.
    pub fn started_timestamp(&self) -> f64 {
        self.started_at.timestamp_millis() as f64 / 1000.0
    }

    /// `None` when no session file exists.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read active session {}", path.display()))?;
        let session = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse active session {}", path.display()))?;
        Ok(Some(session))
    }

    /// Load the active session or fail with a hint to start one.
    pub fn require(path: &Path) -> Result<Self> {
        Self::load(path)?
            .context("no active session. Run `noetic start \"objective\"` first")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create directory {}", parent.display()))?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write active session {}", path.display()))?;
        debug!(session_id = %self.session_id, path = %path.display(), "active session saved");
        Ok(())
    }

    /// Remove the session file. A missing file is fine.
    pub fn clear(path: &Path) -> Result<()> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e)
                .with_context(|| format!("failed to remove active session {}", path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> ActiveSession {
        ActiveSession {
            session_id: "s1".into(),
            ai_id: "agent".into(),
            objective: "fix login".into(),
            started_at: Utc::now(),
            project_id: "p1".into(),
            current_goal_id: None,
        }
    }

    #[test]
    fn save_load_clear() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("active-session.json");

        assert!(ActiveSession::load(&path).unwrap().is_none());
        let s = sample();
        s.save(&path).unwrap();
        assert_eq!(ActiveSession::load(&path).unwrap(), Some(s));

        ActiveSession::clear(&path).unwrap();
        assert!(!path.exists());
        ActiveSession::clear(&path).unwrap();
    }

    #[test]
    fn require_points_at_start() {
        let dir = TempDir::new().unwrap();
        let err = ActiveSession::require(&dir.path().join("none.json")).unwrap_err();
        assert!(err.to_string().contains("noetic start"));
    }

    #[test]
    fn goal_id_is_optional_on_disk() {
        let json = r#"{"session_id":"s","ai_id":"a","objective":"o",
            "started_at":"2026-10-16T10:00:00Z","project_id":"p"}"#;
        let s: ActiveSession = serde_json::from_str(json).unwrap();
        assert!(s.current_goal_id.is_none());
        assert_eq!(s.started_timestamp(), 1_792_144_800.0);
    }
}
