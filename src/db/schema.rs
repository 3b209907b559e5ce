//! SQL DDL for all noetic tables.
//!
//! Breadcrumbs (`findings`, `unknowns`, `dead_ends`, `mistakes`), the
//! administrative entities (`projects`, `sessions`, `goals`, `subtasks`,
//! `cascades`, `reflexes`, `handoff_reports`, `investigation_branches`,
//! `merge_decisions`) and `schema_meta`. All DDL uses `IF NOT EXISTS` for
//! idempotent initialization. Columns added after v1 live in
//! [`super::migrations`].

use rusqlite::Connection;

/// Schema version written on first initialization.
pub const INITIAL_SCHEMA_VERSION: u32 = 1;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS projects (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    description TEXT,
    repos TEXT NOT NULL DEFAULT '[]',
    created_timestamp REAL NOT NULL,
    last_activity_timestamp REAL,
    status TEXT NOT NULL DEFAULT 'active' CHECK(status IN ('active','inactive','complete')),
    total_sessions INTEGER NOT NULL DEFAULT 0,
    total_goals INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS sessions (
    session_id TEXT PRIMARY KEY,
    ai_id TEXT NOT NULL,
    project_id TEXT,
    subject TEXT,
    start_time REAL NOT NULL,
    end_time REAL,
    avg_confidence REAL,
    notes TEXT
);

CREATE INDEX IF NOT EXISTS idx_sessions_ai_id ON sessions(ai_id);
CREATE INDEX IF NOT EXISTS idx_sessions_project_id ON sessions(project_id);

CREATE TABLE IF NOT EXISTS goals (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL,
    objective TEXT NOT NULL,
    scope TEXT NOT NULL,
    success_criteria TEXT NOT NULL DEFAULT '[]',
    estimated_complexity REAL,
    created_timestamp REAL NOT NULL,
    completed_timestamp REAL,
    status TEXT NOT NULL DEFAULT 'in_progress'
        CHECK(status IN ('in_progress','complete','blocked','cancelled'))
);

CREATE INDEX IF NOT EXISTS idx_goals_session_id ON goals(session_id);

CREATE TABLE IF NOT EXISTS subtasks (
    id TEXT PRIMARY KEY,
    goal_id TEXT NOT NULL REFERENCES goals(id) ON DELETE CASCADE,
    description TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending'
        CHECK(status IN ('pending','in_progress','completed','blocked','skipped')),
    importance TEXT NOT NULL DEFAULT 'medium'
        CHECK(importance IN ('critical','high','medium','low')),
    completion_evidence TEXT,
    created_timestamp REAL NOT NULL,
    completed_timestamp REAL
);

CREATE INDEX IF NOT EXISTS idx_subtasks_goal_id ON subtasks(goal_id);

CREATE TABLE IF NOT EXISTS cascades (
    cascade_id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL,
    task TEXT NOT NULL,
    goal_id TEXT,
    preflight_completed INTEGER NOT NULL DEFAULT 0,
    check_completed INTEGER NOT NULL DEFAULT 0,
    postflight_completed INTEGER NOT NULL DEFAULT 0,
    final_action TEXT,
    final_confidence REAL,
    engagement_gate_passed INTEGER,
    started_at REAL NOT NULL,
    completed_at REAL
);

CREATE INDEX IF NOT EXISTS idx_cascades_session_id ON cascades(session_id);

CREATE TABLE IF NOT EXISTS reflexes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    cascade_id TEXT,
    phase TEXT NOT NULL CHECK(phase IN ('PREFLIGHT','CHECK','POSTFLIGHT')),
    round INTEGER NOT NULL DEFAULT 1,
    timestamp REAL NOT NULL,
    engagement REAL NOT NULL,
    know REAL NOT NULL,
    do_vec REAL NOT NULL,
    context REAL NOT NULL,
    clarity REAL NOT NULL,
    coherence REAL NOT NULL,
    signal REAL NOT NULL,
    density REAL NOT NULL,
    state REAL NOT NULL,
    change REAL NOT NULL,
    completion REAL NOT NULL,
    impact REAL NOT NULL,
    uncertainty REAL NOT NULL,
    reasoning TEXT
);

CREATE INDEX IF NOT EXISTS idx_reflexes_session_phase ON reflexes(session_id, phase);

CREATE TABLE IF NOT EXISTS findings (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL,
    session_id TEXT NOT NULL,
    goal_id TEXT,
    subtask_id TEXT,
    finding TEXT NOT NULL,
    created_timestamp REAL NOT NULL,
    subject TEXT,
    impact REAL NOT NULL DEFAULT 0.5
);

CREATE INDEX IF NOT EXISTS idx_findings_project_id ON findings(project_id);
CREATE INDEX IF NOT EXISTS idx_findings_session_id ON findings(session_id);

CREATE TABLE IF NOT EXISTS unknowns (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL,
    session_id TEXT NOT NULL,
    goal_id TEXT,
    subtask_id TEXT,
    unknown TEXT NOT NULL,
    is_resolved INTEGER NOT NULL DEFAULT 0,
    resolved_by TEXT,
    created_timestamp REAL NOT NULL,
    resolved_timestamp REAL,
    subject TEXT,
    impact REAL NOT NULL DEFAULT 0.5
);

CREATE INDEX IF NOT EXISTS idx_unknowns_project_id ON unknowns(project_id);
CREATE INDEX IF NOT EXISTS idx_unknowns_resolved ON unknowns(is_resolved);

CREATE TABLE IF NOT EXISTS dead_ends (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL,
    session_id TEXT NOT NULL,
    goal_id TEXT,
    subtask_id TEXT,
    approach TEXT NOT NULL,
    why_failed TEXT NOT NULL,
    created_timestamp REAL NOT NULL,
    subject TEXT,
    impact REAL NOT NULL DEFAULT 0.5
);

CREATE INDEX IF NOT EXISTS idx_dead_ends_project_id ON dead_ends(project_id);

CREATE TABLE IF NOT EXISTS mistakes (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL,
    goal_id TEXT,
    project_id TEXT,
    mistake TEXT NOT NULL,
    why_wrong TEXT NOT NULL,
    cost_estimate TEXT,
    root_cause_vector TEXT,
    prevention TEXT,
    created_timestamp REAL NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_mistakes_session_id ON mistakes(session_id);

CREATE TABLE IF NOT EXISTS handoff_reports (
    session_id TEXT PRIMARY KEY,
    ai_id TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    task_summary TEXT,
    duration_seconds REAL,
    key_findings TEXT NOT NULL DEFAULT '[]',
    remaining_unknowns TEXT NOT NULL DEFAULT '[]',
    next_session_context TEXT,
    created_at REAL NOT NULL
);

CREATE TABLE IF NOT EXISTS investigation_branches (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL,
    branch_name TEXT NOT NULL,
    investigation_path TEXT NOT NULL,
    git_branch_name TEXT NOT NULL,
    preflight_vectors TEXT NOT NULL,
    postflight_vectors TEXT,
    tokens_spent INTEGER NOT NULL DEFAULT 0,
    time_spent_minutes INTEGER NOT NULL DEFAULT 0,
    merge_score REAL,
    epistemic_quality REAL,
    is_winner INTEGER NOT NULL DEFAULT 0,
    created_timestamp REAL NOT NULL,
    checkpoint_timestamp REAL,
    merged_timestamp REAL,
    status TEXT NOT NULL DEFAULT 'active' CHECK(status IN ('active','merged','abandoned'))
);

CREATE INDEX IF NOT EXISTS idx_branches_session_id ON investigation_branches(session_id);

CREATE TABLE IF NOT EXISTS merge_decisions (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL,
    investigation_round INTEGER NOT NULL,
    winning_branch_id TEXT NOT NULL,
    winning_branch_name TEXT,
    winning_score REAL NOT NULL,
    other_branches TEXT NOT NULL DEFAULT '[]',
    decision_rationale TEXT NOT NULL,
    created_timestamp REAL NOT NULL
);

-- Schema metadata
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    // Set initial schema version if not already present
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', ?1)",
        [INITIAL_SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}
