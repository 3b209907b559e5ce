//! Findings, unknowns, dead ends and mistakes.

use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use super::{collect_lenient, contains_pattern, parse_enum, Filter};
use crate::error::{StoreError, StoreResult};
use crate::model::now_timestamp;
use crate::model::types::{DeadEnd, Finding, Mistake, RootCauseVector, Unknown};

/// Maximum candidates returned by text lookups.
pub const TEXT_MATCH_LIMIT: usize = 10;

const FINDING_COLS: &str = "id, project_id, session_id, goal_id, subtask_id, finding, \
     created_timestamp, last_verified_timestamp, subject, subject_hash, impact";

const UNKNOWN_COLS: &str = "id, project_id, session_id, goal_id, subtask_id, unknown, \
     is_resolved, resolved_by, created_timestamp, resolved_timestamp, subject, impact";

const DEAD_END_COLS: &str = "id, project_id, session_id, goal_id, subtask_id, approach, \
     why_failed, created_timestamp, subject, impact";

const MISTAKE_COLS: &str = "id, session_id, goal_id, project_id, mistake, why_wrong, \
     cost_estimate, root_cause_vector, prevention, created_timestamp";

fn finding_from_row(row: &Row) -> rusqlite::Result<Finding> {
    Ok(Finding {
        id: row.get(0)?,
        project_id: row.get(1)?,
        session_id: row.get(2)?,
        goal_id: row.get(3)?,
        subtask_id: row.get(4)?,
        finding: row.get(5)?,
        created_timestamp: row.get(6)?,
        last_verified_timestamp: row.get(7)?,
        subject: row.get(8)?,
        subject_hash: row.get(9)?,
        impact: row.get(10)?,
    })
}

fn unknown_from_row(row: &Row) -> rusqlite::Result<Unknown> {
    Ok(Unknown {
        id: row.get(0)?,
        project_id: row.get(1)?,
        session_id: row.get(2)?,
        goal_id: row.get(3)?,
        subtask_id: row.get(4)?,
        unknown: row.get(5)?,
        is_resolved: row.get(6)?,
        resolved_by: row.get(7)?,
        created_timestamp: row.get(8)?,
        resolved_timestamp: row.get(9)?,
        subject: row.get(10)?,
        impact: row.get(11)?,
    })
}

fn dead_end_from_row(row: &Row) -> rusqlite::Result<DeadEnd> {
    Ok(DeadEnd {
        id: row.get(0)?,
        project_id: row.get(1)?,
        session_id: row.get(2)?,
        goal_id: row.get(3)?,
        subtask_id: row.get(4)?,
        approach: row.get(5)?,
        why_failed: row.get(6)?,
        created_timestamp: row.get(7)?,
        subject: row.get(8)?,
        impact: row.get(9)?,
    })
}

/// Root cause is stored as text and may not parse.
fn mistake_from_row(row: &Row) -> rusqlite::Result<StoreResult<Mistake>> {
    let id: String = row.get(0)?;
    let raw_cause: Option<String> = row.get(7)?;
    let root_cause_vector = match raw_cause {
        Some(raw) => match parse_enum::<RootCauseVector>("mistake", &id, &raw) {
            Ok(v) => Some(v),
            Err(e) => return Ok(Err(e)),
        },
        None => None,
    };
    Ok(Ok(Mistake {
        session_id: row.get(1)?,
        goal_id: row.get(2)?,
        project_id: row.get(3)?,
        mistake: row.get(4)?,
        why_wrong: row.get(5)?,
        cost_estimate: row.get(6)?,
        root_cause_vector,
        prevention: row.get(8)?,
        created_timestamp: row.get(9)?,
        id,
    }))
}

// --- Findings ---

pub fn create_finding(conn: &Connection, f: &Finding) -> StoreResult<()> {
    conn.execute(
        &format!("INSERT INTO findings ({FINDING_COLS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"),
        params![
            f.id,
            f.project_id,
            f.session_id,
            f.goal_id,
            f.subtask_id,
            f.finding,
            f.created_timestamp,
            f.last_verified_timestamp,
            f.subject,
            f.subject_hash,
            f.impact,
        ],
    )?;
    info!(id = %f.id, session_id = %f.session_id, scoped = f.subject.is_some(), "finding logged");
    Ok(())
}

pub fn get_finding(conn: &Connection, id: &str) -> StoreResult<Finding> {
    conn.query_row(
        &format!("SELECT {FINDING_COLS} FROM findings WHERE id = ?1"),
        params![id],
        finding_from_row,
    )
    .optional()?
    .ok_or_else(|| StoreError::not_found("finding", id))
}

/// Findings with staleness fields populated, newest first.
pub fn list_findings(
    conn: &Connection,
    project_id: Option<&str>,
    session_id: Option<&str>,
    limit: usize,
) -> StoreResult<Vec<Finding>> {
    let filter = Filter::new()
        .opt("project_id = ?", project_id.map(str::to_string))
        .opt("session_id = ?", session_id.map(str::to_string));
    let sql = format!(
        "SELECT {FINDING_COLS} FROM findings{} ORDER BY created_timestamp DESC LIMIT ?",
        filter.where_sql()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(filter.params_with_limit(limit)), finding_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Refresh a finding's verification timestamp, optionally replacing its
/// subject hash and text. Touches no other row.
pub fn verify_finding(
    conn: &Connection,
    id: &str,
    new_hash: Option<&str>,
    new_text: Option<&str>,
) -> StoreResult<()> {
    verify_finding_at(conn, id, new_hash, new_text, now_timestamp())
}

/// [`verify_finding`] with an explicit clock. The stored timestamp never
/// precedes the finding's creation.
pub fn verify_finding_at(
    conn: &Connection,
    id: &str,
    new_hash: Option<&str>,
    new_text: Option<&str>,
    now: f64,
) -> StoreResult<()> {
    let changed = conn.execute(
        "UPDATE findings SET
            last_verified_timestamp = MAX(created_timestamp, ?1),
            subject_hash = COALESCE(?2, subject_hash),
            finding = COALESCE(?3, finding)
         WHERE id = ?4",
        params![now, new_hash, new_text, id],
    )?;
    if changed == 0 {
        return Err(StoreError::not_found("finding", id));
    }
    info!(id, rehashed = new_hash.is_some(), updated_text = new_text.is_some(), "finding verified");
    Ok(())
}

/// Findings whose text contains `text` (case-insensitive), newest first.
pub fn find_findings_by_text(
    conn: &Connection,
    project_id: Option<&str>,
    text: &str,
) -> StoreResult<Vec<Finding>> {
    let filter = Filter::new()
        .with(r"finding LIKE ? ESCAPE '\'", contains_pattern(text))
        .opt("project_id = ?", project_id.map(str::to_string));
    let sql = format!(
        "SELECT {FINDING_COLS} FROM findings{} ORDER BY created_timestamp DESC LIMIT ?",
        filter.where_sql()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(
            params_from_iter(filter.params_with_limit(TEXT_MATCH_LIMIT)),
            finding_from_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Findings whose id starts with `prefix`.
pub fn find_findings_by_id_prefix(conn: &Connection, prefix: &str) -> StoreResult<Vec<Finding>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {FINDING_COLS} FROM findings WHERE substr(id, 1, length(?1)) = ?1
         ORDER BY created_timestamp DESC LIMIT ?2"
    ))?;
    let rows = stmt
        .query_map(params![prefix, TEXT_MATCH_LIMIT as i64], finding_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// --- Unknowns ---

pub fn create_unknown(conn: &Connection, u: &Unknown) -> StoreResult<()> {
    conn.execute(
        &format!("INSERT INTO unknowns ({UNKNOWN_COLS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"),
        params![
            u.id,
            u.project_id,
            u.session_id,
            u.goal_id,
            u.subtask_id,
            u.unknown,
            u.is_resolved,
            u.resolved_by,
            u.created_timestamp,
            u.resolved_timestamp,
            u.subject,
            u.impact,
        ],
    )?;
    info!(id = %u.id, session_id = %u.session_id, "unknown logged");
    Ok(())
}

pub fn get_unknown(conn: &Connection, id: &str) -> StoreResult<Unknown> {
    conn.query_row(
        &format!("SELECT {UNKNOWN_COLS} FROM unknowns WHERE id = ?1"),
        params![id],
        unknown_from_row,
    )
    .optional()?
    .ok_or_else(|| StoreError::not_found("unknown", id))
}

/// `resolved = None` returns both open and resolved unknowns.
pub fn list_unknowns(
    conn: &Connection,
    project_id: Option<&str>,
    session_id: Option<&str>,
    resolved: Option<bool>,
    limit: usize,
) -> StoreResult<Vec<Unknown>> {
    let filter = Filter::new()
        .opt("project_id = ?", project_id.map(str::to_string))
        .opt("session_id = ?", session_id.map(str::to_string))
        .opt("is_resolved = ?", resolved);
    let sql = format!(
        "SELECT {UNKNOWN_COLS} FROM unknowns{} ORDER BY created_timestamp DESC LIMIT ?",
        filter.where_sql()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(filter.params_with_limit(limit)), unknown_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Mark an unknown resolved. Resolution happens once; resolving an already
/// resolved unknown leaves the original resolver and timestamp in place.
pub fn resolve_unknown(conn: &Connection, id: &str, resolved_by: &str) -> StoreResult<()> {
    let changed = conn.execute(
        "UPDATE unknowns SET is_resolved = 1, resolved_by = ?1, resolved_timestamp = ?2
         WHERE id = ?3 AND is_resolved = 0",
        params![resolved_by, now_timestamp(), id],
    )?;
    if changed == 0 {
        // distinguish "missing" from "already resolved"
        get_unknown(conn, id)?;
        debug!(id, "unknown already resolved");
        return Ok(());
    }
    info!(id, "unknown resolved");
    Ok(())
}

/// Open unknowns whose text contains `text`, newest first.
pub fn find_unknowns_by_text(
    conn: &Connection,
    project_id: Option<&str>,
    text: &str,
) -> StoreResult<Vec<Unknown>> {
    let filter = Filter::new()
        .with(r"unknown LIKE ? ESCAPE '\'", contains_pattern(text))
        .with("is_resolved = ?", false)
        .opt("project_id = ?", project_id.map(str::to_string));
    let sql = format!(
        "SELECT {UNKNOWN_COLS} FROM unknowns{} ORDER BY created_timestamp DESC LIMIT ?",
        filter.where_sql()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(
            params_from_iter(filter.params_with_limit(TEXT_MATCH_LIMIT)),
            unknown_from_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// --- Dead ends ---

pub fn create_dead_end(conn: &Connection, d: &DeadEnd) -> StoreResult<()> {
    conn.execute(
        &format!("INSERT INTO dead_ends ({DEAD_END_COLS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"),
        params![
            d.id,
            d.project_id,
            d.session_id,
            d.goal_id,
            d.subtask_id,
            d.approach,
            d.why_failed,
            d.created_timestamp,
            d.subject,
            d.impact,
        ],
    )?;
    info!(id = %d.id, session_id = %d.session_id, "dead end logged");
    Ok(())
}

pub fn get_dead_end(conn: &Connection, id: &str) -> StoreResult<DeadEnd> {
    conn.query_row(
        &format!("SELECT {DEAD_END_COLS} FROM dead_ends WHERE id = ?1"),
        params![id],
        dead_end_from_row,
    )
    .optional()?
    .ok_or_else(|| StoreError::not_found("dead end", id))
}

pub fn list_dead_ends(
    conn: &Connection,
    project_id: Option<&str>,
    session_id: Option<&str>,
    limit: usize,
) -> StoreResult<Vec<DeadEnd>> {
    let filter = Filter::new()
        .opt("project_id = ?", project_id.map(str::to_string))
        .opt("session_id = ?", session_id.map(str::to_string));
    let sql = format!(
        "SELECT {DEAD_END_COLS} FROM dead_ends{} ORDER BY created_timestamp DESC LIMIT ?",
        filter.where_sql()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(filter.params_with_limit(limit)), dead_end_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Dead ends whose approach or failure reason contains `text`.
pub fn find_dead_ends_by_text(
    conn: &Connection,
    project_id: Option<&str>,
    text: &str,
    limit: usize,
) -> StoreResult<Vec<DeadEnd>> {
    let filter = Filter::new()
        .with(
            r"(approach LIKE ?1 ESCAPE '\' OR why_failed LIKE ?1 ESCAPE '\')",
            contains_pattern(text),
        )
        .opt("project_id = ?2", project_id.map(str::to_string));
    let sql = format!(
        "SELECT {DEAD_END_COLS} FROM dead_ends{} ORDER BY created_timestamp DESC LIMIT {limit}",
        filter.where_sql()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(filter.into_params()), dead_end_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// --- Mistakes ---

pub fn create_mistake(conn: &Connection, m: &Mistake) -> StoreResult<()> {
    conn.execute(
        &format!("INSERT INTO mistakes ({MISTAKE_COLS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"),
        params![
            m.id,
            m.session_id,
            m.goal_id,
            m.project_id,
            m.mistake,
            m.why_wrong,
            m.cost_estimate,
            m.root_cause_vector.map(|v| v.as_str()),
            m.prevention,
            m.created_timestamp,
        ],
    )?;
    info!(id = %m.id, root_cause = ?m.root_cause_vector, "mistake logged");
    Ok(())
}

pub fn get_mistake(conn: &Connection, id: &str) -> StoreResult<Mistake> {
    conn.query_row(
        &format!("SELECT {MISTAKE_COLS} FROM mistakes WHERE id = ?1"),
        params![id],
        mistake_from_row,
    )
    .optional()?
    .ok_or_else(|| StoreError::not_found("mistake", id))?
}

/// Mistakes for a session (optionally one goal), newest first.
pub fn list_mistakes(
    conn: &Connection,
    session_id: Option<&str>,
    goal_id: Option<&str>,
    limit: usize,
) -> StoreResult<Vec<Mistake>> {
    let filter = Filter::new()
        .opt("session_id = ?", session_id.map(str::to_string))
        .opt("goal_id = ?", goal_id.map(str::to_string));
    let sql = format!(
        "SELECT {MISTAKE_COLS} FROM mistakes{} ORDER BY created_timestamp DESC LIMIT ?",
        filter.where_sql()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(filter.params_with_limit(limit)), mistake_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    collect_lenient(rows)
}
