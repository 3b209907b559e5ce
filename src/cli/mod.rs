//! Subcommand implementations.
//!
//! Every command takes an [`App`] and returns an [`Output`] carrying both the
//! JSON document agents consume and a rendered text form for `--text`.
//! `main` decides which one reaches stdout.

pub mod branch;
pub mod checkpoint;
pub mod doctor;
pub mod done;
pub mod goal;
pub mod log;
pub mod query;
pub mod start;
pub mod verify;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::{Connection, Transaction};
use serde::Serialize;
use serde_json::Value;

use crate::active::ActiveSession;
use crate::config::NoeticConfig;
use crate::db;
use crate::engine::ChangeSnapshot;
use crate::model::entities::{HandoffReport, Project};
use crate::model::types::{DeadEnd, Finding, Unknown};
use crate::store::{breadcrumbs, projects, sessions};

/// Project name used when the working directory has no usable basename.
const FALLBACK_PROJECT: &str = "default";

/// Shared state for one CLI invocation.
pub struct App {
    pub config: NoeticConfig,
    pub conn: Connection,
    /// Name of the project this invocation defaults to.
    pub project_name: String,
    pub session_file: PathBuf,
}

impl App {
    /// Open the configured database and resolve the working-directory project.
    pub fn open(config: NoeticConfig) -> Result<Self> {
        let conn = db::open_database(config.resolved_db_path())?;
        let session_file = config.resolved_session_file();
        Ok(Self {
            project_name: current_project_name(),
            conn,
            session_file,
            config,
        })
    }

    pub fn new(
        config: NoeticConfig,
        conn: Connection,
        project_name: &str,
        session_file: PathBuf,
    ) -> Self {
        Self {
            config,
            conn,
            project_name: project_name.to_string(),
            session_file,
        }
    }

    /// Open a transaction for a command whose writes must land together.
    /// Dropping it without `commit` rolls everything back.
    pub fn transaction(&self) -> Result<Transaction<'_>> {
        self.conn
            .unchecked_transaction()
            .context("failed to begin transaction")
    }

    pub fn active(&self) -> Result<Option<ActiveSession>> {
        ActiveSession::load(&self.session_file)
    }

    pub fn require_active(&self) -> Result<ActiveSession> {
        ActiveSession::require(&self.session_file)
    }

    /// The working-directory project, created on first use.
    pub fn default_project(&self) -> Result<Project> {
        projects::get_or_create_project_by_name(&self.conn, &self.project_name)
            .context("failed to get project")
    }

    pub fn git_timeout(&self) -> Duration {
        Duration::from_millis(self.config.staleness.git_timeout_ms)
    }

    /// Current hashes for every scoped finding, or an empty snapshot when
    /// file-change checks are disabled.
    pub async fn change_snapshot(&self, findings: &[Finding]) -> ChangeSnapshot {
        if !self.config.staleness.check_file_changes {
            return ChangeSnapshot::new();
        }
        crate::git::snapshot_changes(findings, self.git_timeout()).await
    }

    pub async fn hash_path(&self, path: &str) -> Option<String> {
        crate::git::hash_object(path, self.git_timeout()).await
    }
}

fn current_project_name() -> String {
    std::env::current_dir()
        .ok()
        .and_then(|dir| dir.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| FALLBACK_PROJECT.to_string())
}

/// Breadcrumb lists a state synthesis runs over.
#[derive(Debug, Default)]
pub struct Breadcrumbs {
    pub findings: Vec<Finding>,
    pub open_unknowns: Vec<Unknown>,
    pub resolved_unknowns: Vec<Unknown>,
    pub dead_ends: Vec<DeadEnd>,
}

/// Per-list row caps for [`Breadcrumbs::load`].
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub findings: usize,
    pub unknowns: usize,
    pub dead_ends: usize,
}

impl Limits {
    pub fn context(config: &NoeticConfig) -> Self {
        Self {
            findings: config.query.context_findings,
            unknowns: config.query.context_unknowns,
            dead_ends: config.query.context_dead_ends,
        }
    }

    pub fn uniform(limit: usize) -> Self {
        Self {
            findings: limit,
            unknowns: limit,
            dead_ends: limit,
        }
    }
}

impl Breadcrumbs {
    pub fn load(
        conn: &Connection,
        project_id: &str,
        session_id: Option<&str>,
        limits: Limits,
    ) -> Result<Self> {
        let project = Some(project_id);
        Ok(Self {
            findings: breadcrumbs::list_findings(conn, project, session_id, limits.findings)?,
            open_unknowns: breadcrumbs::list_unknowns(
                conn,
                project,
                session_id,
                Some(false),
                limits.unknowns,
            )?,
            resolved_unknowns: breadcrumbs::list_unknowns(
                conn,
                project,
                session_id,
                Some(true),
                limits.unknowns,
            )?,
            dead_ends: breadcrumbs::list_dead_ends(conn, project, session_id, limits.dead_ends)?,
        })
    }
}

/// The handoff from the previous session in `project_id`, if one exists.
pub fn last_handoff(conn: &Connection, project_id: &str) -> Result<Option<HandoffReport>> {
    Ok(sessions::latest_handoff_for_project(conn, project_id)?)
}

/// A command result in both output modes.
#[derive(Debug, Clone)]
pub struct Output {
    pub json: Value,
    pub text: String,
}

impl Output {
    pub fn new(body: &impl Serialize, text: impl Into<String>) -> Result<Self> {
        Ok(Self {
            json: serde_json::to_value(body).context("failed to encode output")?,
            text: text.into(),
        })
    }

    /// `status` field of the JSON body, if present.
    pub fn status(&self) -> Option<&str> {
        self.json.get("status").and_then(Value::as_str)
    }

    pub fn print(&self, text_mode: bool) {
        if text_mode {
            print!("{}", self.text);
            if !self.text.ends_with('\n') {
                println!();
            }
        } else {
            match serde_json::to_string_pretty(&self.json) {
                Ok(s) => println!("{s}"),
                Err(e) => eprintln!("failed to render output: {e}"),
            }
        }
    }
}

/// Report a failure on stderr in the selected output mode.
pub fn print_error(err: &anyhow::Error, text_mode: bool) {
    if text_mode {
        eprintln!("Error: {err:#}");
    } else {
        let body = serde_json::json!({ "status": "error", "error": format!("{err:#}") });
        eprintln!("{body}");
    }
}

/// Returned instead of acting when a text lookup is ambiguous.
#[derive(Debug, Serialize)]
pub(crate) struct MultipleMatches<T> {
    status: &'static str,
    message: &'static str,
    matches: Vec<T>,
}

impl<T> MultipleMatches<T> {
    pub(crate) fn new(message: &'static str, matches: Vec<T>) -> Self {
        Self {
            status: "multiple_matches",
            message,
            matches,
        }
    }
}

/// First eight characters of an id, for display.
pub(crate) fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

pub(crate) fn rule() -> String {
    "─".repeat(50)
}

/// Ten-cell bar for a value in `[0, 1]`.
pub(crate) fn vector_bar(value: f64) -> String {
    let filled = (value.clamp(0.0, 1.0) * 10.0) as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(10 - filled))
}

/// `1h5m0s`-style elapsed time.
pub(crate) fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{h}h{m}m{s}s")
    } else if m > 0 {
        format!("{m}m{s}s")
    } else {
        format!("{s}s")
    }
}
