//! `start` and `status`: open a session and show where the agent stands.

use std::fmt::Write as _;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use tracing::warn;

use super::{format_duration, last_handoff, rule, vector_bar, App, Breadcrumbs, Limits, Output};
use crate::active::ActiveSession;
use crate::engine::{build_session_context, BreadcrumbCounts, ContextInputs, SessionContext};
use crate::model::entities::Session;
use crate::model::now_timestamp;
use crate::store::{projects, sessions};

#[derive(Serialize)]
struct StartResponse<'a> {
    status: &'static str,
    context: &'a SessionContext,
}

#[derive(Serialize)]
struct StatusResponse<'a> {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    counts: Option<BreadcrumbCounts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<&'a SessionContext>,
}

const NO_SESSION: &str = "No active session. Run `noetic start \"objective\"` to begin.";

/// Create a session in the working-directory project and return its context.
pub async fn start(app: &App, objective: &str, ai_id: Option<&str>) -> Result<Output> {
    let ai_id = ai_id.unwrap_or(&app.config.session.default_ai_id);
    let project = app.default_project()?;

    if let Some(previous) = app.active()? {
        warn!(session_id = %previous.session_id, "replacing active session that was never closed");
    }

    let session = Session::new(ai_id, Some(project.id.clone()), Some(objective.to_string()));
    let tx = app.transaction()?;
    sessions::create_session(&tx, &session).context("failed to create session")?;
    projects::increment_project_sessions(&tx, &project.id)?;
    tx.commit().context("failed to create session")?;

    let active = ActiveSession {
        session_id: session.session_id.clone(),
        ai_id: ai_id.to_string(),
        objective: objective.to_string(),
        started_at: Utc::now(),
        project_id: project.id.clone(),
        current_goal_id: None,
    };
    active.save(&app.session_file)?;

    let (ctx, _) = session_context(app, &active).await?;

    let mut text = String::new();
    writeln!(text, "Session started: {objective}")?;
    writeln!(text, "ID: {}", session.session_id)?;
    writeln!(text, "{}", rule())?;
    render_context(&ctx, &mut text)?;

    Output::new(
        &StartResponse {
            status: "started",
            context: &ctx,
        },
        text,
    )
}

/// Context for the active session, or `no_session`.
pub async fn status(app: &App) -> Result<Output> {
    let Some(active) = app.active()? else {
        return Output::new(
            &StatusResponse {
                status: "no_session",
                message: Some(NO_SESSION),
                duration: None,
                counts: None,
                context: None,
            },
            NO_SESSION,
        );
    };

    let (ctx, counts) = session_context(app, &active).await?;
    let duration = format_duration(now_timestamp() - active.started_timestamp());

    let mut text = String::new();
    writeln!(text, "Session: {} ({duration})", active.objective)?;
    writeln!(text, "{}", rule())?;
    render_vectors(&ctx, &mut text)?;
    render_context(&ctx, &mut text)?;
    writeln!(
        text,
        "\nCounts: {} findings ({} fresh, {} aging, {} stale), {} open questions, {} dead ends",
        counts.findings,
        counts.findings_fresh,
        counts.findings_aging,
        counts.findings_stale,
        counts.unknowns_open,
        counts.dead_ends
    )?;

    Output::new(
        &StatusResponse {
            status: "active",
            message: None,
            duration: Some(duration),
            counts: Some(counts),
            context: Some(&ctx),
        },
        text,
    )
}

/// Build the project-scoped context for `active`, plus breadcrumb counts.
pub(crate) async fn session_context(
    app: &App,
    active: &ActiveSession,
) -> Result<(SessionContext, BreadcrumbCounts)> {
    let crumbs = Breadcrumbs::load(
        &app.conn,
        &active.project_id,
        None,
        Limits::context(&app.config),
    )?;
    let handoff = last_handoff(&app.conn, &active.project_id)?;
    let snapshot = app.change_snapshot(&crumbs.findings).await;
    let now = now_timestamp();

    let ctx = build_session_context(
        &active.session_id,
        &active.project_id,
        &active.objective,
        ContextInputs {
            findings: &crumbs.findings,
            open_unknowns: &crumbs.open_unknowns,
            resolved_unknowns: &crumbs.resolved_unknowns,
            dead_ends: &crumbs.dead_ends,
            last_handoff: handoff.as_ref(),
            session_start: active.started_timestamp(),
            now,
        },
        &snapshot,
    );
    let counts = BreadcrumbCounts::tally(
        &crumbs.findings,
        &crumbs.open_unknowns,
        &crumbs.resolved_unknowns,
        &crumbs.dead_ends,
        now,
        &snapshot,
    );
    Ok((ctx, counts))
}

fn render_vectors(ctx: &SessionContext, out: &mut String) -> std::fmt::Result {
    let v = &ctx.vectors;
    writeln!(out, "\nVectors:")?;
    for (name, value) in [
        ("Know", v.know),
        ("Uncertainty", v.uncertainty),
        ("Clarity", v.clarity),
        ("Coherence", v.coherence),
        ("Completion", v.completion),
        ("Engagement", v.engagement),
    ] {
        writeln!(out, "  {:<12} {} {:.0}%", format!("{name}:"), vector_bar(value), value * 100.0)?;
    }
    Ok(())
}

pub(crate) fn render_context(ctx: &SessionContext, out: &mut String) -> std::fmt::Result {
    let d = &ctx.decision;
    writeln!(
        out,
        "\n{} {} ({:.0}% confidence)",
        d.confidence_phase,
        d.action.as_str().to_uppercase(),
        d.confidence * 100.0
    )?;
    writeln!(out, "  {}", d.reason)?;
    if !d.prerequisites.is_empty() {
        writeln!(out, "\n  Before proceeding:")?;
        for p in &d.prerequisites {
            writeln!(out, "    → {p}")?;
        }
    }

    if !ctx.requires_verification.is_empty() {
        writeln!(out, "\n⚠ VERIFY BEFORE USING ({}):", ctx.requires_verification.len())?;
        for v in &ctx.requires_verification {
            let changed = if v.file_changed { " [file changed]" } else { "" };
            writeln!(out, "  • {} ({}d old{changed})", v.finding, v.days_stale)?;
            writeln!(out, "    {}", v.verify_command)?;
        }
    }

    if !ctx.dead_ends.is_empty() {
        writeln!(out, "\n✗ DO NOT REPEAT ({}):", ctx.dead_ends.len())?;
        for dead in &ctx.dead_ends {
            writeln!(out, "  • {}", dead.approach)?;
            writeln!(out, "    Why: {}", dead.why_failed)?;
        }
    }

    if !ctx.knowledge.is_empty() {
        writeln!(out, "\n✓ KNOWN ({}):", ctx.knowledge.len())?;
        for k in &ctx.knowledge {
            writeln!(out, "  {} {}", k.status.marker(), k.finding)?;
        }
    }

    if !ctx.open_questions.is_empty() {
        writeln!(out, "\n? OPEN QUESTIONS ({}):", ctx.open_questions.len())?;
        for q in &ctx.open_questions {
            writeln!(out, "  • {q}")?;
        }
    }

    if let Some(c) = &ctx.continuity {
        writeln!(out, "\n─ Last Session ─")?;
        if let Some(t) = &c.time_since_last_session {
            writeln!(out, "  {t}")?;
        }
        if let Some(s) = &c.summary {
            writeln!(out, "  {s}")?;
        }
        for h in &c.highlights {
            writeln!(out, "  • {h}")?;
        }
        if let Some(r) = &c.recommendations {
            writeln!(out, "  Recommendations: {r}")?;
        }
    }
    Ok(())
}
