mod helpers;

use helpers::{seed_finding, seed_unknown, test_app};
use noetic::cli::log::{self, LogOptions};
use noetic::cli::{start, verify};
use noetic::store::breadcrumbs;

async fn started(app: &noetic::cli::App) -> (String, String) {
    start::start(app, "verification", None).await.unwrap();
    let active = app.require_active().unwrap();
    (active.project_id, active.session_id)
}

#[tokio::test]
async fn verify_touches_only_the_target() {
    let (_tmp, app) = test_app();
    let (project, session) = started(&app).await;
    let target = seed_finding(&app.conn, &project, &session, "retry uses backoff", 40.0);
    let bystander = seed_finding(&app.conn, &project, &session, "pool size is 8", 40.0);

    let out = verify::verify(&app, None, Some(&target), None).await.unwrap();
    assert_eq!(out.status(), Some("verified"));
    assert_eq!(out.json["updated"], false);

    let target = breadcrumbs::get_finding(&app.conn, &target).unwrap();
    let bystander = breadcrumbs::get_finding(&app.conn, &bystander).unwrap();
    assert!(target.last_verified_timestamp.unwrap() > target.created_timestamp);
    assert!(bystander.last_verified_timestamp.is_none());
}

#[tokio::test]
async fn verify_resolves_short_id_prefix() {
    let (_tmp, app) = test_app();
    let (project, session) = started(&app).await;
    let id = seed_finding(&app.conn, &project, &session, "limits come from env", 30.0);

    // the 8-char prefix printed by the verify hint
    let out = verify::verify(&app, None, Some(&id[..8]), None).await.unwrap();
    assert_eq!(out.status(), Some("verified"));
    assert_eq!(out.json["id"], id.as_str());
}

#[tokio::test]
async fn verify_can_replace_text() {
    let (_tmp, app) = test_app();
    let (project, session) = started(&app).await;
    let id = seed_finding(&app.conn, &project, &session, "timeout is 30s", 20.0);

    let out = verify::verify(&app, Some("timeout"), None, Some("timeout is 45s"))
        .await
        .unwrap();
    assert_eq!(out.json["updated"], true);
    assert_eq!(breadcrumbs::get_finding(&app.conn, &id).unwrap().finding, "timeout is 45s");
}

#[tokio::test]
async fn ambiguous_verify_lists_candidates_and_changes_nothing() {
    let (_tmp, app) = test_app();
    let (project, session) = started(&app).await;
    let a = seed_finding(&app.conn, &project, &session, "cache key includes user", 30.0);
    let b = seed_finding(&app.conn, &project, &session, "cache ttl is one hour", 1.0);

    let out = verify::verify(&app, Some("cache"), None, None).await.unwrap();
    assert_eq!(out.status(), Some("multiple_matches"));
    let matches = out.json["matches"].as_array().unwrap();
    assert_eq!(matches.len(), 2);
    let stale = matches.iter().find(|m| m["id"] == a.as_str()).unwrap();
    assert_eq!(stale["status"], "stale");
    assert_eq!(stale["days_old"], 30);

    for id in [a, b] {
        assert!(breadcrumbs::get_finding(&app.conn, &id)
            .unwrap()
            .last_verified_timestamp
            .is_none());
    }
}

#[tokio::test]
async fn verify_reports_missing_findings() {
    let (_tmp, app) = test_app();
    started(&app).await;
    let err = verify::verify(&app, Some("nothing like this"), None, None)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("no findings found"));

    let err = verify::verify(&app, None, Some("zzzzzzzz"), None).await.unwrap_err();
    assert!(err.to_string().contains("not found"));
}

#[tokio::test]
async fn resolving_by_text_requires_a_unique_match() {
    let (_tmp, app) = test_app();
    let (project, session) = started(&app).await;
    seed_unknown(&app.conn, &project, &session, "who owns the auth service?");
    seed_unknown(&app.conn, &project, &session, "is auth rate limited?");

    let out = log::resolved(&app, Some("auth"), None, None).unwrap();
    assert_eq!(out.status(), Some("multiple_matches"));
    assert_eq!(out.json["matches"].as_array().unwrap().len(), 2);
    assert!(breadcrumbs::find_unknowns_by_text(&app.conn, Some(&project), "auth")
        .unwrap()
        .iter()
        .all(|u| !u.is_resolved));

    let out = log::resolved(&app, Some("rate limited"), None, Some("read the gateway config"))
        .unwrap();
    assert_eq!(out.status(), Some("resolved"));
    assert_eq!(out.json["resolved_by"], "read the gateway config");
}

#[tokio::test]
async fn resolving_twice_keeps_the_first_resolver() {
    let (_tmp, app) = test_app();
    let (project, session) = started(&app).await;
    let id = seed_unknown(&app.conn, &project, &session, "which queue?");

    let first = log::resolved(&app, None, Some(&id), None).unwrap();
    assert_eq!(first.json["resolved_by"], session.as_str());
    assert_eq!(first.json["already_resolved"], false);

    let again = log::resolved(&app, None, Some(&id), Some("someone else")).unwrap();
    assert_eq!(again.json["already_resolved"], true);
    assert_eq!(again.json["resolved_by"], session.as_str());
}

#[tokio::test]
async fn resolved_unknowns_leave_the_open_list() {
    let (_tmp, app) = test_app();
    let (project, _) = started(&app).await;
    let out = log::uncertain(&app, "is the index unique?", LogOptions::default()).unwrap();
    let id = out.json["id"].as_str().unwrap().to_string();

    log::resolved(&app, None, Some(&id), None).unwrap();
    let open = breadcrumbs::list_unknowns(&app.conn, Some(&project), None, Some(false), 10).unwrap();
    assert!(open.is_empty());
}

#[tokio::test]
async fn blank_id_is_rejected_without_verifying() {
    let (_tmp, app) = test_app();
    let (project, session) = started(&app).await;
    let only = seed_finding(&app.conn, &project, &session, "the only finding", 5.0);

    for blank in ["", "   "] {
        assert!(verify::verify(&app, None, Some(blank), None).await.is_err());
    }
    let f = breadcrumbs::get_finding(&app.conn, &only).unwrap();
    assert!(f.last_verified_timestamp.is_none());
}

#[tokio::test]
async fn underscore_in_text_is_not_a_wildcard() {
    let (_tmp, app) = test_app();
    let (project, session) = started(&app).await;
    let bystander = seed_finding(&app.conn, &project, &session, "axb flag is on", 5.0);

    assert!(verify::verify(&app, Some("a_b"), None, None).await.is_err());
    let f = breadcrumbs::get_finding(&app.conn, &bystander).unwrap();
    assert!(f.last_verified_timestamp.is_none());
}
