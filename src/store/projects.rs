use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use tracing::info;

use super::{collect_lenient, decode_json, encode_json, parse_enum, Filter};
use crate::error::{StoreError, StoreResult};
use crate::model::entities::{Project, ProjectStatus};
use crate::model::now_timestamp;

const PROJECT_COLS: &str = "id, name, description, repos, created_timestamp, \
     last_activity_timestamp, status, total_sessions, total_goals";

fn project_from_row(row: &Row) -> rusqlite::Result<StoreResult<Project>> {
    let id: String = row.get(0)?;
    let raw_repos: String = row.get(3)?;
    let raw_status: String = row.get(6)?;
    let decoded = decode_json::<Vec<String>>("project", &id, &raw_repos).and_then(|repos| {
        parse_enum::<ProjectStatus>("project", &id, &raw_status).map(|status| (repos, status))
    });
    let (repos, status) = match decoded {
        Ok(pair) => pair,
        Err(e) => return Ok(Err(e)),
    };
    Ok(Ok(Project {
        name: row.get(1)?,
        description: row.get(2)?,
        repos,
        created_timestamp: row.get(4)?,
        last_activity_timestamp: row.get(5)?,
        status,
        total_sessions: row.get(7)?,
        total_goals: row.get(8)?,
        id,
    }))
}

pub fn create_project(conn: &Connection, p: &Project) -> StoreResult<()> {
    let repos = encode_json("project", &p.repos)?;
    conn.execute(
        &format!("INSERT INTO projects ({PROJECT_COLS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"),
        params![
            p.id,
            p.name,
            p.description,
            repos,
            p.created_timestamp,
            p.last_activity_timestamp,
            p.status.as_str(),
            p.total_sessions,
            p.total_goals,
        ],
    )?;
    info!(id = %p.id, name = %p.name, "project created");
    Ok(())
}

pub fn get_project(conn: &Connection, id: &str) -> StoreResult<Project> {
    conn.query_row(
        &format!("SELECT {PROJECT_COLS} FROM projects WHERE id = ?1"),
        params![id],
        project_from_row,
    )
    .optional()?
    .ok_or_else(|| StoreError::not_found("project", id))?
}

pub fn get_project_by_name(conn: &Connection, name: &str) -> StoreResult<Option<Project>> {
    conn.query_row(
        &format!("SELECT {PROJECT_COLS} FROM projects WHERE name = ?1"),
        params![name],
        project_from_row,
    )
    .optional()?
    .transpose()
}

/// Look up a project by name, creating it on first use.
pub fn get_or_create_project_by_name(conn: &Connection, name: &str) -> StoreResult<Project> {
    if let Some(existing) = get_project_by_name(conn, name)? {
        return Ok(existing);
    }
    let project = Project::new(name, None);
    create_project(conn, &project)?;
    Ok(project)
}

/// Projects ordered by most recent activity.
pub fn list_projects(
    conn: &Connection,
    status: Option<ProjectStatus>,
) -> StoreResult<Vec<Project>> {
    let filter = Filter::new().opt("status = ?", status.map(|s| s.as_str().to_string()));
    let sql = format!(
        "SELECT {PROJECT_COLS} FROM projects{}
         ORDER BY COALESCE(last_activity_timestamp, created_timestamp) DESC",
        filter.where_sql()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(filter.into_params()), project_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    collect_lenient(rows)
}

pub fn update_project_status(
    conn: &Connection,
    id: &str,
    status: ProjectStatus,
) -> StoreResult<()> {
    let changed = conn.execute(
        "UPDATE projects SET status = ?1 WHERE id = ?2",
        params![status.as_str(), id],
    )?;
    if changed == 0 {
        return Err(StoreError::not_found("project", id));
    }
    info!(id, status = %status, "project status updated");
    Ok(())
}

/// Bump the session counter and refresh `last_activity_timestamp`.
pub fn increment_project_sessions(conn: &Connection, id: &str) -> StoreResult<()> {
    bump(conn, id, "total_sessions")
}

pub fn increment_project_goals(conn: &Connection, id: &str) -> StoreResult<()> {
    bump(conn, id, "total_goals")
}

fn bump(conn: &Connection, id: &str, column: &'static str) -> StoreResult<()> {
    let changed = conn.execute(
        &format!(
            "UPDATE projects SET {column} = {column} + 1, last_activity_timestamp = ?1
             WHERE id = ?2"
        ),
        params![now_timestamp(), id],
    )?;
    if changed == 0 {
        return Err(StoreError::not_found("project", id));
    }
    Ok(())
}
