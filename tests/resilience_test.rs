mod helpers;

use helpers::{seed_finding, test_app, test_db, uniform_vectors};
use noetic::cli::{branch, checkpoint, done, start, App};
use noetic::db;
use noetic::model::entities::{BranchStatus, ReflexPhase};
use noetic::store::{branches, breadcrumbs, goals, sessions};
use tempfile::TempDir;

/// Make every statement of `event` (e.g. `INSERT ON reflexes`) fail.
fn fail_on(app: &App, name: &str, event: &str) {
    app.conn
        .execute_batch(&format!(
            "CREATE TRIGGER {name} BEFORE {event} BEGIN SELECT RAISE(ABORT, 'disk full'); END;"
        ))
        .unwrap();
}

fn count(app: &App, table: &str) -> i64 {
    app.conn
        .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
        .unwrap()
}

#[test]
fn open_creates_new_db_at_nonexistent_path() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("subdir").join("new.db");
    assert!(!db_path.exists());

    let conn = db::open_database(&db_path).unwrap();
    assert!(db_path.exists());

    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM findings", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 0);
}

#[test]
fn reopening_keeps_data() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("n.db");
    let id = {
        let conn = db::open_database(&db_path).unwrap();
        seed_finding(&conn, "p", "s", "survives reopen", 1.0)
    };
    let conn = db::open_database(&db_path).unwrap();
    assert_eq!(breadcrumbs::get_finding(&conn, &id).unwrap().finding, "survives reopen");
}

#[test]
fn busy_timeout_is_set() {
    let tmp = TempDir::new().unwrap();
    let conn = db::open_database(tmp.path().join("test.db")).unwrap();
    let timeout: i64 = conn
        .pragma_query_value(None, "busy_timeout", |row| row.get(0))
        .unwrap();
    assert_eq!(timeout, db::BUSY_TIMEOUT_MS as i64);
}

#[test]
fn corrupt_goal_rows_are_skipped_in_lists_but_fail_on_get() {
    let conn = test_db();
    conn.execute(
        "INSERT INTO goals (id, session_id, objective, scope, success_criteria,
             created_timestamp, status)
         VALUES ('bad', 's', 'broken', 'not json', '[]', 1.0, 'in_progress')",
        [],
    )
    .unwrap();

    assert!(goals::list_goals(&conn, "s", None).unwrap().is_empty());
    let err = goals::get_goal(&conn, "bad").unwrap_err();
    assert!(!err.is_not_found());
}

#[test]
fn missing_handoff_is_not_found() {
    let conn = test_db();
    assert!(sessions::get_handoff(&conn, "nope").unwrap_err().is_not_found());
    assert!(sessions::latest_handoff_for_project(&conn, "p").unwrap().is_none());
}

#[tokio::test]
async fn failed_start_leaves_no_session_row() {
    let (_tmp, app) = test_app();
    app.default_project().unwrap();
    fail_on(&app, "no_bump", "UPDATE ON projects");

    assert!(start::start(&app, "doomed", None).await.is_err());
    assert_eq!(count(&app, "sessions"), 0);
    assert!(app.active().unwrap().is_none());
}

#[tokio::test]
async fn failed_preflight_leaves_no_orphan_cascade() {
    let (_tmp, app) = test_app();
    start::start(&app, "checkpoint atomicity", None).await.unwrap();
    fail_on(&app, "no_reflex", "INSERT ON reflexes");

    let result = checkpoint::checkpoint(&app, ReflexPhase::Preflight, &uniform_vectors(0.6), None);
    assert!(result.is_err());
    assert_eq!(count(&app, "cascades"), 0);
}

#[tokio::test]
async fn failed_merge_decision_leaves_branch_unmerged() {
    let (_tmp, app) = test_app();
    start::start(&app, "winner atomicity", None).await.unwrap();
    branch::open(&app, "lru", "in-process LRU", None).unwrap();
    fail_on(&app, "no_decision", "INSERT ON merge_decisions");

    assert!(branch::winner(&app, "lru", "simplest").is_err());
    let session_id = app.require_active().unwrap().session_id;
    let lru = &branches::list_branches(&app.conn, &session_id).unwrap()[0];
    assert!(!lru.is_winner);
    assert_eq!(lru.status, BranchStatus::Active);
    assert_eq!(count(&app, "merge_decisions"), 0);
}

#[tokio::test]
async fn failed_session_end_discards_the_handoff() {
    let (_tmp, app) = test_app();
    start::start(&app, "done atomicity", None).await.unwrap();
    fail_on(&app, "no_end", "UPDATE ON sessions");

    assert!(done::done(&app, "wrapped up", None).await.is_err());
    assert_eq!(count(&app, "handoff_reports"), 0);
    assert!(app.active().unwrap().is_some());
}
