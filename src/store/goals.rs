//! Goals and their subtasks.

use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use tracing::info;

use super::{collect_lenient, decode_json, encode_json, parse_enum, Filter};
use crate::error::{StoreError, StoreResult};
use crate::model::entities::{
    Goal, GoalStatus, Importance, ScopeVector, SubTask, SuccessCriterion, TaskStatus,
};
use crate::model::now_timestamp;

const GOAL_COLS: &str = "id, session_id, objective, scope, success_criteria, \
     estimated_complexity, created_timestamp, completed_timestamp, status";

fn goal_from_row(row: &Row) -> rusqlite::Result<StoreResult<Goal>> {
    let id: String = row.get(0)?;
    let raw_scope: String = row.get(3)?;
    let raw_criteria: String = row.get(4)?;
    let raw_status: String = row.get(8)?;

    let decoded = (|| -> StoreResult<_> {
        let scope: ScopeVector = decode_json("goal", &id, &raw_scope)?;
        let criteria: Vec<SuccessCriterion> = decode_json("goal", &id, &raw_criteria)?;
        let status: GoalStatus = parse_enum("goal", &id, &raw_status)?;
        Ok((scope, criteria, status))
    })();
    let (scope, success_criteria, status) = match decoded {
        Ok(parts) => parts,
        Err(e) => return Ok(Err(e)),
    };

    Ok(Ok(Goal {
        session_id: row.get(1)?,
        objective: row.get(2)?,
        scope,
        success_criteria,
        estimated_complexity: row.get(5)?,
        created_timestamp: row.get(6)?,
        completed_timestamp: row.get(7)?,
        status,
        id,
    }))
}

pub fn create_goal(conn: &Connection, g: &Goal) -> StoreResult<()> {
    let scope = encode_json("goal", &g.scope)?;
    let criteria = encode_json("goal", &g.success_criteria)?;
    conn.execute(
        &format!("INSERT INTO goals ({GOAL_COLS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"),
        params![
            g.id,
            g.session_id,
            g.objective,
            scope,
            criteria,
            g.estimated_complexity,
            g.created_timestamp,
            g.completed_timestamp,
            g.status.as_str(),
        ],
    )?;
    info!(id = %g.id, session_id = %g.session_id, criteria = g.success_criteria.len(), "goal created");
    Ok(())
}

pub fn get_goal(conn: &Connection, id: &str) -> StoreResult<Goal> {
    conn.query_row(
        &format!("SELECT {GOAL_COLS} FROM goals WHERE id = ?1"),
        params![id],
        goal_from_row,
    )
    .optional()?
    .ok_or_else(|| StoreError::not_found("goal", id))?
}

/// Goals of a session, newest first. `completed` filters on `status = 'complete'`.
pub fn list_goals(
    conn: &Connection,
    session_id: &str,
    completed: Option<bool>,
) -> StoreResult<Vec<Goal>> {
    let mut filter = Filter::new().with("session_id = ?", session_id.to_string());
    filter = match completed {
        Some(true) => filter.with("status = ?", GoalStatus::Complete.as_str().to_string()),
        Some(false) => filter.with("status != ?", GoalStatus::Complete.as_str().to_string()),
        None => filter,
    };
    let sql = format!(
        "SELECT {GOAL_COLS} FROM goals{} ORDER BY created_timestamp DESC",
        filter.where_sql()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(filter.into_params()), goal_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    collect_lenient(rows)
}

pub fn complete_goal(conn: &Connection, id: &str) -> StoreResult<()> {
    let changed = conn.execute(
        "UPDATE goals SET status = ?1, completed_timestamp = ?2 WHERE id = ?3",
        params![GoalStatus::Complete.as_str(), now_timestamp(), id],
    )?;
    if changed == 0 {
        return Err(StoreError::not_found("goal", id));
    }
    info!(id, "goal completed");
    Ok(())
}

pub fn update_goal_status(conn: &Connection, id: &str, status: GoalStatus) -> StoreResult<()> {
    let changed = conn.execute(
        "UPDATE goals SET status = ?1 WHERE id = ?2",
        params![status.as_str(), id],
    )?;
    if changed == 0 {
        return Err(StoreError::not_found("goal", id));
    }
    info!(id, status = %status, "goal status updated");
    Ok(())
}

// --- Subtasks ---

const SUBTASK_COLS: &str = "id, goal_id, description, status, importance, completion_evidence, \
     created_timestamp, completed_timestamp";

fn subtask_from_row(row: &Row) -> rusqlite::Result<StoreResult<SubTask>> {
    let id: String = row.get(0)?;
    let raw_status: String = row.get(3)?;
    let raw_importance: String = row.get(4)?;
    let decoded = parse_enum::<TaskStatus>("subtask", &id, &raw_status).and_then(|status| {
        parse_enum::<Importance>("subtask", &id, &raw_importance).map(|imp| (status, imp))
    });
    let (status, importance) = match decoded {
        Ok(pair) => pair,
        Err(e) => return Ok(Err(e)),
    };
    Ok(Ok(SubTask {
        goal_id: row.get(1)?,
        description: row.get(2)?,
        status,
        importance,
        completion_evidence: row.get(5)?,
        created_timestamp: row.get(6)?,
        completed_timestamp: row.get(7)?,
        id,
    }))
}

pub fn create_subtask(conn: &Connection, t: &SubTask) -> StoreResult<()> {
    conn.execute(
        &format!("INSERT INTO subtasks ({SUBTASK_COLS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
        params![
            t.id,
            t.goal_id,
            t.description,
            t.status.as_str(),
            t.importance.as_str(),
            t.completion_evidence,
            t.created_timestamp,
            t.completed_timestamp,
        ],
    )?;
    info!(id = %t.id, goal_id = %t.goal_id, importance = %t.importance, "subtask created");
    Ok(())
}

pub fn get_subtask(conn: &Connection, id: &str) -> StoreResult<SubTask> {
    conn.query_row(
        &format!("SELECT {SUBTASK_COLS} FROM subtasks WHERE id = ?1"),
        params![id],
        subtask_from_row,
    )
    .optional()?
    .ok_or_else(|| StoreError::not_found("subtask", id))?
}

/// Subtasks of a goal in creation order.
pub fn list_subtasks(conn: &Connection, goal_id: &str) -> StoreResult<Vec<SubTask>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SUBTASK_COLS} FROM subtasks WHERE goal_id = ?1 ORDER BY created_timestamp ASC"
    ))?;
    let rows = stmt
        .query_map(params![goal_id], subtask_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    collect_lenient(rows)
}

pub fn complete_subtask(conn: &Connection, id: &str, evidence: Option<&str>) -> StoreResult<()> {
    let changed = conn.execute(
        "UPDATE subtasks SET status = ?1, completion_evidence = COALESCE(?2, completion_evidence),
             completed_timestamp = ?3
         WHERE id = ?4",
        params![TaskStatus::Completed.as_str(), evidence, now_timestamp(), id],
    )?;
    if changed == 0 {
        return Err(StoreError::not_found("subtask", id));
    }
    info!(id, "subtask completed");
    Ok(())
}

pub fn update_subtask_status(conn: &Connection, id: &str, status: TaskStatus) -> StoreResult<()> {
    let changed = conn.execute(
        "UPDATE subtasks SET status = ?1 WHERE id = ?2",
        params![status.as_str(), id],
    )?;
    if changed == 0 {
        return Err(StoreError::not_found("subtask", id));
    }
    Ok(())
}
