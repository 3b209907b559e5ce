#![allow(dead_code)]

use noetic::cli::App;
use noetic::config::NoeticConfig;
use noetic::db;
use noetic::engine::decay::SECONDS_PER_DAY;
use noetic::model::now_timestamp;
use noetic::model::types::{DeadEnd, Finding, Unknown};
use noetic::store::breadcrumbs;
use rusqlite::Connection;
use tempfile::TempDir;

pub const PROJECT: &str = "test-project";

/// An app over a database and session file inside a temp dir. Keep the
/// returned `TempDir` alive for the duration of the test.
pub fn test_app() -> (TempDir, App) {
    test_app_for(PROJECT)
}

pub fn test_app_for(project: &str) -> (TempDir, App) {
    let tmp = TempDir::new().unwrap();
    let app = app_in(&tmp, project);
    (tmp, app)
}

/// A second app over the same files, as a later CLI invocation would see them.
pub fn app_in(tmp: &TempDir, project: &str) -> App {
    let mut config = NoeticConfig::default();
    config.storage.db_path = tmp.path().join("sessions.db").display().to_string();
    config.storage.session_file = tmp.path().join("active-session.json").display().to_string();
    // no git calls from tests
    config.staleness.check_file_changes = false;

    let conn = db::open_database(config.resolved_db_path()).unwrap();
    let session_file = config.resolved_session_file();
    App::new(config, conn, project, session_file)
}

/// Open a fresh in-memory database with schema and migrations applied.
pub fn test_db() -> Connection {
    db::open_memory_database().unwrap()
}

pub fn days_ago(days: f64) -> f64 {
    now_timestamp() - days * SECONDS_PER_DAY
}

/// Insert a finding created `age_days` ago. Returns its id.
pub fn seed_finding(
    conn: &Connection,
    project_id: &str,
    session_id: &str,
    text: &str,
    age_days: f64,
) -> String {
    let f = Finding::new(project_id, session_id, text, 0.5, days_ago(age_days));
    breadcrumbs::create_finding(conn, &f).unwrap();
    f.id
}

pub fn seed_unknown(conn: &Connection, project_id: &str, session_id: &str, text: &str) -> String {
    let u = Unknown::new(project_id, session_id, text, 0.5, now_timestamp());
    breadcrumbs::create_unknown(conn, &u).unwrap();
    u.id
}

pub fn seed_dead_end(
    conn: &Connection,
    project_id: &str,
    session_id: &str,
    approach: &str,
    why_failed: &str,
) -> String {
    let d = DeadEnd::new(project_id, session_id, approach, why_failed, 0.5, now_timestamp());
    breadcrumbs::create_dead_end(conn, &d).unwrap();
    d.id
}

/// Vectors JSON with every dimension at `v`.
pub fn uniform_vectors(v: f64) -> String {
    let fields = [
        "engagement", "know", "do", "context", "clarity", "coherence", "signal", "density",
        "state", "change", "completion", "impact", "uncertainty",
    ];
    let body: Vec<String> = fields.iter().map(|f| format!("\"{f}\": {v}")).collect();
    format!("{{{}}}", body.join(", "))
}
