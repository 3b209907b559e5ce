//! Sessions, reflexes (checkpoint vectors), cascades and handoff reports.

use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use tracing::info;

use super::{collect_lenient, decode_json, encode_json, parse_enum, Filter};
use crate::error::{StoreError, StoreResult};
use crate::model::entities::{Cascade, HandoffReport, Reflex, ReflexPhase, Session};
use crate::model::now_timestamp;
use crate::model::vectors::EpistemicVectors;

// --- Sessions ---

const SESSION_COLS: &str =
    "session_id, ai_id, project_id, subject, start_time, end_time, avg_confidence, notes";

fn session_from_row(row: &Row) -> rusqlite::Result<Session> {
    Ok(Session {
        session_id: row.get(0)?,
        ai_id: row.get(1)?,
        project_id: row.get(2)?,
        subject: row.get(3)?,
        start_time: row.get(4)?,
        end_time: row.get(5)?,
        avg_confidence: row.get(6)?,
        notes: row.get(7)?,
    })
}

pub fn create_session(conn: &Connection, s: &Session) -> StoreResult<()> {
    conn.execute(
        &format!("INSERT INTO sessions ({SESSION_COLS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
        params![
            s.session_id,
            s.ai_id,
            s.project_id,
            s.subject,
            s.start_time,
            s.end_time,
            s.avg_confidence,
            s.notes,
        ],
    )?;
    info!(session_id = %s.session_id, ai_id = %s.ai_id, "session started");
    Ok(())
}

pub fn get_session(conn: &Connection, session_id: &str) -> StoreResult<Session> {
    conn.query_row(
        &format!("SELECT {SESSION_COLS} FROM sessions WHERE session_id = ?1"),
        params![session_id],
        session_from_row,
    )
    .optional()?
    .ok_or_else(|| StoreError::not_found("session", session_id))
}

pub fn list_sessions(
    conn: &Connection,
    ai_id: Option<&str>,
    limit: usize,
) -> StoreResult<Vec<Session>> {
    let filter = Filter::new().opt("ai_id = ?", ai_id.map(str::to_string));
    let sql = format!(
        "SELECT {SESSION_COLS} FROM sessions{} ORDER BY start_time DESC LIMIT ?",
        filter.where_sql()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(filter.params_with_limit(limit)), session_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Stamp `end_time` and, when given, the session's average confidence.
pub fn end_session(
    conn: &Connection,
    session_id: &str,
    avg_confidence: Option<f64>,
) -> StoreResult<()> {
    let changed = conn.execute(
        "UPDATE sessions SET end_time = ?1, avg_confidence = COALESCE(?2, avg_confidence)
         WHERE session_id = ?3",
        params![now_timestamp(), avg_confidence, session_id],
    )?;
    if changed == 0 {
        return Err(StoreError::not_found("session", session_id));
    }
    info!(session_id, ?avg_confidence, "session ended");
    Ok(())
}

// --- Reflexes ---

const REFLEX_COLS: &str = "id, session_id, cascade_id, phase, round, timestamp, engagement, know, \
     do_vec, context, clarity, coherence, signal, density, state, change, completion, impact, \
     uncertainty, reasoning";

fn reflex_from_row(row: &Row) -> rusqlite::Result<StoreResult<Reflex>> {
    let id: i64 = row.get(0)?;
    let raw_phase: String = row.get(3)?;
    let phase = match parse_enum::<ReflexPhase>("reflex", &id.to_string(), &raw_phase) {
        Ok(p) => p,
        Err(e) => return Ok(Err(e)),
    };
    let mut values = [0.0; 13];
    for (i, slot) in values.iter_mut().enumerate() {
        *slot = row.get(6 + i)?;
    }
    Ok(Ok(Reflex {
        id,
        session_id: row.get(1)?,
        cascade_id: row.get(2)?,
        phase,
        round: row.get(4)?,
        timestamp: row.get(5)?,
        vectors: EpistemicVectors::from_fields(values),
        reasoning: row.get(19)?,
    }))
}

/// Insert a reflex and return its database id.
pub fn create_reflex(conn: &Connection, r: &Reflex) -> StoreResult<i64> {
    let v = r.vectors.fields();
    conn.execute(
        "INSERT INTO reflexes (session_id, cascade_id, phase, round, timestamp, engagement, know,
             do_vec, context, clarity, coherence, signal, density, state, change, completion,
             impact, uncertainty, reasoning)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
        params![
            r.session_id,
            r.cascade_id,
            r.phase.as_str(),
            r.round,
            r.timestamp,
            v[0],
            v[1],
            v[2],
            v[3],
            v[4],
            v[5],
            v[6],
            v[7],
            v[8],
            v[9],
            v[10],
            v[11],
            v[12],
            r.reasoning,
        ],
    )?;
    let id = conn.last_insert_rowid();
    info!(id, session_id = %r.session_id, phase = %r.phase, "reflex recorded");
    Ok(id)
}

/// The most recent reflex of `phase` in a session, if any.
pub fn latest_reflex_by_phase(
    conn: &Connection,
    session_id: &str,
    phase: ReflexPhase,
) -> StoreResult<Option<Reflex>> {
    conn.query_row(
        &format!(
            "SELECT {REFLEX_COLS} FROM reflexes WHERE session_id = ?1 AND phase = ?2
             ORDER BY timestamp DESC, id DESC LIMIT 1"
        ),
        params![session_id, phase.as_str()],
        reflex_from_row,
    )
    .optional()?
    .transpose()
}

pub fn list_reflexes(conn: &Connection, session_id: &str, limit: usize) -> StoreResult<Vec<Reflex>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {REFLEX_COLS} FROM reflexes WHERE session_id = ?1
         ORDER BY timestamp DESC, id DESC LIMIT ?2"
    ))?;
    let rows = stmt
        .query_map(params![session_id, limit as i64], reflex_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    collect_lenient(rows)
}

/// Latest postflight minus latest preflight, when both exist.
pub fn reflex_delta(conn: &Connection, session_id: &str) -> StoreResult<Option<EpistemicVectors>> {
    let pre = latest_reflex_by_phase(conn, session_id, ReflexPhase::Preflight)?;
    let post = latest_reflex_by_phase(conn, session_id, ReflexPhase::Postflight)?;
    Ok(match (pre, post) {
        (Some(pre), Some(post)) => Some(post.vectors.delta(&pre.vectors)),
        _ => None,
    })
}

// --- Cascades ---

const CASCADE_COLS: &str = "cascade_id, session_id, task, goal_id, preflight_completed, \
     check_completed, postflight_completed, final_action, final_confidence, \
     engagement_gate_passed, started_at, completed_at";

fn cascade_from_row(row: &Row) -> rusqlite::Result<Cascade> {
    Ok(Cascade {
        cascade_id: row.get(0)?,
        session_id: row.get(1)?,
        task: row.get(2)?,
        goal_id: row.get(3)?,
        preflight_completed: row.get(4)?,
        check_completed: row.get(5)?,
        postflight_completed: row.get(6)?,
        final_action: row.get(7)?,
        final_confidence: row.get(8)?,
        engagement_gate_passed: row.get(9)?,
        started_at: row.get(10)?,
        completed_at: row.get(11)?,
    })
}

pub fn create_cascade(conn: &Connection, c: &Cascade) -> StoreResult<()> {
    conn.execute(
        &format!("INSERT INTO cascades ({CASCADE_COLS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"),
        params![
            c.cascade_id,
            c.session_id,
            c.task,
            c.goal_id,
            c.preflight_completed,
            c.check_completed,
            c.postflight_completed,
            c.final_action,
            c.final_confidence,
            c.engagement_gate_passed,
            c.started_at,
            c.completed_at,
        ],
    )?;
    info!(cascade_id = %c.cascade_id, session_id = %c.session_id, "cascade opened");
    Ok(())
}

pub fn get_cascade(conn: &Connection, cascade_id: &str) -> StoreResult<Cascade> {
    conn.query_row(
        &format!("SELECT {CASCADE_COLS} FROM cascades WHERE cascade_id = ?1"),
        params![cascade_id],
        cascade_from_row,
    )
    .optional()?
    .ok_or_else(|| StoreError::not_found("cascade", cascade_id))
}

/// The newest cascade in a session that has not been completed.
pub fn latest_open_cascade(conn: &Connection, session_id: &str) -> StoreResult<Option<Cascade>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {CASCADE_COLS} FROM cascades WHERE session_id = ?1 AND completed_at IS NULL
                 ORDER BY started_at DESC LIMIT 1"
            ),
            params![session_id],
            cascade_from_row,
        )
        .optional()?)
}

/// Mark one checkpoint phase of a cascade as done.
pub fn mark_cascade_phase(
    conn: &Connection,
    cascade_id: &str,
    phase: ReflexPhase,
) -> StoreResult<()> {
    let column = match phase {
        ReflexPhase::Preflight => "preflight_completed",
        ReflexPhase::Check => "check_completed",
        ReflexPhase::Postflight => "postflight_completed",
    };
    let changed = conn.execute(
        &format!("UPDATE cascades SET {column} = 1 WHERE cascade_id = ?1"),
        params![cascade_id],
    )?;
    if changed == 0 {
        return Err(StoreError::not_found("cascade", cascade_id));
    }
    Ok(())
}

/// Close a cascade with the final recommendation.
pub fn complete_cascade(
    conn: &Connection,
    cascade_id: &str,
    final_action: &str,
    final_confidence: f64,
    engagement_gate_passed: bool,
) -> StoreResult<()> {
    let changed = conn.execute(
        "UPDATE cascades SET postflight_completed = 1, final_action = ?1, final_confidence = ?2,
             engagement_gate_passed = ?3, completed_at = ?4
         WHERE cascade_id = ?5",
        params![
            final_action,
            final_confidence,
            engagement_gate_passed,
            now_timestamp(),
            cascade_id
        ],
    )?;
    if changed == 0 {
        return Err(StoreError::not_found("cascade", cascade_id));
    }
    info!(cascade_id, final_action, final_confidence, "cascade completed");
    Ok(())
}

// --- Handoffs ---

const HANDOFF_COLS: &str = "session_id, ai_id, project_id, timestamp, task_summary, \
     duration_seconds, key_findings, remaining_unknowns, next_session_context, created_at";

fn handoff_from_row(row: &Row) -> rusqlite::Result<StoreResult<HandoffReport>> {
    let session_id: String = row.get(0)?;
    let raw_findings: String = row.get(6)?;
    let raw_unknowns: String = row.get(7)?;
    let decoded = decode_json::<Vec<String>>("handoff", &session_id, &raw_findings).and_then(
        |findings| {
            decode_json::<Vec<String>>("handoff", &session_id, &raw_unknowns)
                .map(|unknowns| (findings, unknowns))
        },
    );
    let (key_findings, remaining_unknowns) = match decoded {
        Ok(pair) => pair,
        Err(e) => return Ok(Err(e)),
    };
    Ok(Ok(HandoffReport {
        ai_id: row.get(1)?,
        project_id: row.get(2)?,
        timestamp: row.get(3)?,
        task_summary: row.get(4)?,
        duration_seconds: row.get(5)?,
        key_findings,
        remaining_unknowns,
        next_session_context: row.get(8)?,
        created_at: row.get(9)?,
        session_id,
    }))
}

/// Insert or replace the handoff for a session.
pub fn create_handoff(conn: &Connection, h: &HandoffReport) -> StoreResult<()> {
    let key_findings = encode_json("handoff", &h.key_findings)?;
    let remaining_unknowns = encode_json("handoff", &h.remaining_unknowns)?;
    conn.execute(
        &format!(
            "INSERT OR REPLACE INTO handoff_reports ({HANDOFF_COLS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
        ),
        params![
            h.session_id,
            h.ai_id,
            h.project_id,
            h.timestamp,
            h.task_summary,
            h.duration_seconds,
            key_findings,
            remaining_unknowns,
            h.next_session_context,
            h.created_at,
        ],
    )?;
    info!(session_id = %h.session_id, findings = h.key_findings.len(), "handoff written");
    Ok(())
}

pub fn get_handoff(conn: &Connection, session_id: &str) -> StoreResult<HandoffReport> {
    conn.query_row(
        &format!("SELECT {HANDOFF_COLS} FROM handoff_reports WHERE session_id = ?1"),
        params![session_id],
        handoff_from_row,
    )
    .optional()?
    .ok_or_else(|| StoreError::not_found("handoff", session_id))?
}

/// Handoffs for a project (and optionally one agent), newest first.
pub fn list_handoffs(
    conn: &Connection,
    project_id: Option<&str>,
    ai_id: Option<&str>,
    limit: usize,
) -> StoreResult<Vec<HandoffReport>> {
    let filter = Filter::new()
        .opt("project_id = ?", project_id.map(str::to_string))
        .opt("ai_id = ?", ai_id.map(str::to_string));
    let sql = format!(
        "SELECT {HANDOFF_COLS} FROM handoff_reports{} ORDER BY created_at DESC LIMIT ?",
        filter.where_sql()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(filter.params_with_limit(limit)), handoff_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    collect_lenient(rows)
}

/// Handoffs scanned when looking for the latest well-formed one.
const HANDOFF_SCAN_LIMIT: usize = 10;

/// The most recent well-formed handoff for a project.
pub fn latest_handoff_for_project(
    conn: &Connection,
    project_id: &str,
) -> StoreResult<Option<HandoffReport>> {
    Ok(list_handoffs(conn, Some(project_id), None, HANDOFF_SCAN_LIMIT)?
        .into_iter()
        .next())
}
