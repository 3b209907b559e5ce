mod helpers;

use helpers::{app_in, test_app, uniform_vectors, PROJECT};
use noetic::active::ActiveSession;
use noetic::cli::log::{self, LogOptions, MistakeOptions};
use noetic::cli::{checkpoint, done, goal, start};
use noetic::model::entities::{ReflexPhase, ScopeVector};
use noetic::model::types::RootCauseVector;
use noetic::store::{breadcrumbs, goals, projects, sessions};

#[tokio::test]
async fn commands_without_a_session_fail_with_a_hint() {
    let (_tmp, app) = test_app();

    let err = log::uncertain(&app, "is the cache shared?", LogOptions::default()).unwrap_err();
    assert!(format!("{err:#}").contains("noetic start"));

    let status = start::status(&app).await.unwrap();
    assert_eq!(status.status(), Some("no_session"));
}

#[tokio::test]
async fn start_log_status_done_round_trip() {
    let (tmp, app) = test_app();

    let started = start::start(&app, "fix auth refresh", Some("agent-1")).await.unwrap();
    assert_eq!(started.status(), Some("started"));
    let session_id = started.json["context"]["session_id"].as_str().unwrap().to_string();

    let active = ActiveSession::load(&app.session_file).unwrap().unwrap();
    assert_eq!(active.session_id, session_id);
    assert_eq!(active.ai_id, "agent-1");

    let project = projects::get_project_by_name(&app.conn, PROJECT).unwrap().unwrap();
    assert_eq!(project.total_sessions, 1);

    log::learned(&app, "tokens expire after 15 minutes", LogOptions::default())
        .await
        .unwrap();
    log::learned(&app, "refresh runs in middleware", LogOptions::default())
        .await
        .unwrap();
    log::uncertain(&app, "does mobile share the refresh path?", LogOptions::default()).unwrap();
    log::tried(
        &app,
        "extending the token lifetime",
        "security review rejected it",
        LogOptions::default(),
    )
    .unwrap();
    let mistake = log::mistake(
        &app,
        "patched the wrong middleware",
        "two stacks exist",
        MistakeOptions {
            root_cause: Some(RootCauseVector::Context),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(mistake.json["root_cause_vector"], "CONTEXT");

    // a later invocation sees the same session
    let later = app_in(&tmp, PROJECT);
    let status = start::status(&later).await.unwrap();
    assert_eq!(status.status(), Some("active"));
    assert_eq!(status.json["counts"]["findings"], 2);
    assert_eq!(status.json["counts"]["unknowns_open"], 1);
    assert_eq!(status.json["counts"]["dead_ends"], 1);

    let finished = done::done(&later, "refresh path mapped", Some("check the mobile client"))
        .await
        .unwrap();
    assert_eq!(finished.status(), Some("completed"));
    assert_eq!(finished.json["stats"]["findings"], 2);
    assert_eq!(finished.json["stats"]["unknowns_open"], 1);
    assert!(ActiveSession::load(&later.session_file).unwrap().is_none());

    let session = sessions::get_session(&later.conn, &session_id).unwrap();
    assert!(!session.is_active());
    assert!(session.avg_confidence.is_some());

    let handoff = sessions::get_handoff(&later.conn, &session_id).unwrap();
    assert_eq!(handoff.project_id.as_deref(), Some(project.id.as_str()));
    assert_eq!(handoff.key_findings.len(), 2);
    assert_eq!(
        handoff.remaining_unknowns,
        vec!["does mobile share the refresh path?".to_string()]
    );
}

#[tokio::test]
async fn next_session_sees_previous_handoff() {
    let (_tmp, app) = test_app();
    start::start(&app, "first pass", None).await.unwrap();
    log::learned(&app, "config lives in /etc/app", LogOptions::default())
        .await
        .unwrap();
    done::done(&app, "mapped the config", Some("wire the loader"))
        .await
        .unwrap();

    let second = start::start(&app, "second pass", None).await.unwrap();
    let continuity = &second.json["context"]["continuity"];
    assert_eq!(continuity["summary"], "mapped the config");
    assert_eq!(continuity["recommendations"], "wire the loader");
    assert_eq!(continuity["highlights"][0], "config lives in /etc/app");
    // findings are project-scoped, so the new session already knows them
    assert_eq!(second.json["context"]["knowledge"][0]["finding"], "config lives in /etc/app");
}

#[tokio::test]
async fn handoffs_do_not_leak_across_projects() {
    let (tmp, app) = test_app();
    start::start(&app, "project a work", None).await.unwrap();
    done::done(&app, "a is done", None).await.unwrap();

    let other = app_in(&tmp, "other-project");
    let started = start::start(&other, "project b work", None).await.unwrap();
    assert!(started.json["context"].get("continuity").is_none());
}

#[tokio::test]
async fn done_scopes_to_the_closing_session() {
    let (_tmp, app) = test_app();
    start::start(&app, "one", None).await.unwrap();
    log::learned(&app, "from session one", LogOptions::default())
        .await
        .unwrap();
    done::done(&app, "one done", None).await.unwrap();

    start::start(&app, "two", None).await.unwrap();
    let finished = done::done(&app, "nothing learned", None).await.unwrap();
    assert_eq!(finished.json["stats"]["findings"], 0);
}

#[tokio::test]
async fn scoped_finding_starts_verified() {
    let (_tmp, app) = test_app();
    start::start(&app, "scope", None).await.unwrap();
    let out = log::learned(
        &app,
        "parser handles CRLF",
        LogOptions {
            scope: Some("src/parser.rs".into()),
            impact: Some(0.9),
        },
    )
    .await
    .unwrap();
    assert_eq!(out.json["scope"], "src/parser.rs");

    let id = out.json["id"].as_str().unwrap();
    let f = breadcrumbs::get_finding(&app.conn, id).unwrap();
    assert_eq!(f.last_verified_timestamp, Some(f.created_timestamp));
    assert_eq!(f.impact, 0.9);
}

#[tokio::test]
async fn current_goal_is_attached_to_breadcrumbs() {
    let (_tmp, app) = test_app();
    start::start(&app, "goals", None).await.unwrap();

    let added = goal::add(
        &app,
        goal::NewGoal {
            objective: "ship the loader".into(),
            scope: ScopeVector {
                breadth: 0.3,
                duration: 0.4,
                coordination: 0.1,
            },
            criteria: vec!["loader reads TOML".into()],
            complexity: Some(0.6),
        },
    )
    .unwrap();
    let goal_id = added.json["goal"]["id"].as_str().unwrap().to_string();
    assert_eq!(added.json["goal"]["success_criteria"][0]["is_required"], true);

    let logged = log::learned(&app, "serde handles defaults", LogOptions::default())
        .await
        .unwrap();
    assert_eq!(logged.json["goal_id"], goal_id.as_str());

    goal::add_subtask(&app, "parse the file", None, "high".parse().unwrap()).unwrap();
    let tasks = goals::list_subtasks(&app.conn, &goal_id).unwrap();
    assert_eq!(tasks.len(), 1);

    goal::complete_subtask(&app, &tasks[0].id, Some("unit test passes")).unwrap();
    let listed = goal::list(&app, None).unwrap();
    assert_eq!(listed.json["goals"][0]["subtasks_completed"], 1);
    assert_eq!(listed.json["goals"][0]["current"], true);

    goal::complete(&app, None).unwrap();
    let active = app.require_active().unwrap();
    assert!(active.current_goal_id.is_none());
    assert!(goals::get_goal(&app.conn, &goal_id).unwrap().is_completed());

    let project = projects::get_project_by_name(&app.conn, PROJECT).unwrap().unwrap();
    assert_eq!(project.total_goals, 1);
}

#[tokio::test]
async fn subtask_without_goal_is_rejected() {
    let (_tmp, app) = test_app();
    start::start(&app, "no goal", None).await.unwrap();
    let err = goal::add_subtask(&app, "orphan", None, "low".parse().unwrap()).unwrap_err();
    assert!(err.to_string().contains("no current goal"));
}

#[tokio::test]
async fn checkpoints_run_a_cascade_and_report_delta() {
    let (_tmp, app) = test_app();
    start::start(&app, "cascade", None).await.unwrap();
    let session_id = app.require_active().unwrap().session_id;

    let pre = checkpoint::checkpoint(
        &app,
        ReflexPhase::Preflight,
        r#"{"engagement": 0.8, "know": 0.4, "coherence": 0.7, "density": 0.5, "uncertainty": 0.6}"#,
        Some("new codebase"),
    )
    .unwrap();
    assert_eq!(pre.json["phase"], "PREFLIGHT");
    assert_eq!(pre.json["assessment"]["action"], "investigate");
    let cascade_id = pre.json["cascade_id"].as_str().unwrap().to_string();

    checkpoint::checkpoint(&app, ReflexPhase::Check, &uniform_vectors(0.6), None).unwrap();
    let cascade = sessions::get_cascade(&app.conn, &cascade_id).unwrap();
    assert!(cascade.preflight_completed && cascade.check_completed);
    assert!(!cascade.postflight_completed);

    let post = checkpoint::checkpoint(
        &app,
        ReflexPhase::Postflight,
        r#"{"engagement": 0.8, "know": 0.8, "coherence": 0.7, "density": 0.5, "uncertainty": 0.2}"#,
        None,
    )
    .unwrap();
    assert_eq!(post.json["cascade_id"], cascade_id.as_str());
    let know_delta = post.json["delta"]["know"].as_f64().unwrap();
    let uncertainty_delta = post.json["delta"]["uncertainty"].as_f64().unwrap();
    assert!((know_delta - 0.4).abs() < 1e-9);
    assert!((uncertainty_delta + 0.4).abs() < 1e-9);

    let cascade = sessions::get_cascade(&app.conn, &cascade_id).unwrap();
    assert!(cascade.postflight_completed);
    assert_eq!(cascade.final_action.as_deref(), Some("proceed"));
    assert_eq!(cascade.engagement_gate_passed, Some(true));
    assert!(sessions::latest_open_cascade(&app.conn, &session_id).unwrap().is_none());
    assert_eq!(sessions::list_reflexes(&app.conn, &session_id, 10).unwrap().len(), 3);
}

#[tokio::test]
async fn checkpoint_rejects_bad_vectors() {
    let (_tmp, app) = test_app();
    start::start(&app, "bad input", None).await.unwrap();
    assert!(checkpoint::checkpoint(&app, ReflexPhase::Preflight, "{know:", None).is_err());
}
