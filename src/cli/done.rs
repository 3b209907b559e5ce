//! `done`: close the session and leave a handoff for the next one.

use std::fmt::Write as _;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;

use super::{format_duration, rule, App, Breadcrumbs, Limits, Output};
use crate::active::ActiveSession;
use crate::engine::context::EpistemicSnapshot;
use crate::engine::synthesize_state;
use crate::model::entities::HandoffReport;
use crate::model::now_timestamp;
use crate::model::vectors::{ConfidenceSource, ConfidenceSummary};
use crate::store::sessions;

/// Baseline the session delta is measured from.
const BASELINE: f64 = 0.5;

#[derive(Serialize)]
struct SessionStats {
    findings: usize,
    unknowns_resolved: usize,
    unknowns_open: usize,
    dead_ends: usize,
}

#[derive(Serialize)]
struct Delta {
    know: f64,
    uncertainty: f64,
    clarity: f64,
}

#[derive(Serialize)]
struct DoneResponse<'a> {
    status: &'static str,
    session_id: &'a str,
    objective: &'a str,
    summary: &'a str,
    duration: String,
    epistemic_state: EpistemicSnapshot,
    assessment: ConfidenceSummary,
    stats: SessionStats,
    delta: Delta,
}

/// Synthesize the session's own breadcrumbs, write the handoff, end the
/// session and clear the active-session file.
pub async fn done(app: &App, summary: &str, next: Option<&str>) -> Result<Output> {
    let active = app.require_active()?;
    let crumbs = Breadcrumbs::load(
        &app.conn,
        &active.project_id,
        Some(&active.session_id),
        Limits::uniform(app.config.query.session_limit),
    )?;
    let snapshot = app.change_snapshot(&crumbs.findings).await;
    let now = now_timestamp();
    let state = synthesize_state(
        &crumbs.findings,
        &crumbs.open_unknowns,
        &crumbs.resolved_unknowns,
        &crumbs.dead_ends,
        active.started_timestamp(),
        now,
        &snapshot,
    );
    let elapsed = now - active.started_timestamp();

    let handoff = HandoffReport {
        session_id: active.session_id.clone(),
        ai_id: active.ai_id.clone(),
        project_id: Some(active.project_id.clone()),
        timestamp: Utc::now().to_rfc3339(),
        task_summary: Some(summary.to_string()),
        duration_seconds: Some(elapsed),
        key_findings: crumbs.findings.iter().map(|f| f.finding.clone()).collect(),
        remaining_unknowns: crumbs
            .open_unknowns
            .iter()
            .map(|u| u.unknown.clone())
            .collect(),
        next_session_context: next.map(str::to_string),
        created_at: now,
    };
    let tx = app.transaction()?;
    sessions::create_handoff(&tx, &handoff).context("failed to write handoff")?;
    sessions::end_session(&tx, &active.session_id, Some(state.confidence))
        .context("failed to end session")?;
    tx.commit().context("failed to end session")?;
    ActiveSession::clear(&app.session_file)?;

    let assessment = state.summary();
    let duration = format_duration(elapsed);
    let stats = SessionStats {
        findings: crumbs.findings.len(),
        unknowns_resolved: crumbs.resolved_unknowns.len(),
        unknowns_open: crumbs.open_unknowns.len(),
        dead_ends: crumbs.dead_ends.len(),
    };

    let mut text = String::new();
    writeln!(text, "Session completed: {}", active.objective)?;
    writeln!(text, "{}", rule())?;
    writeln!(text, "Duration: {duration}\n")?;
    writeln!(text, "Epistemic Delta:")?;
    for (name, value) in [
        ("Know", state.know),
        ("Uncertainty", state.uncertainty),
        ("Clarity", state.clarity),
    ] {
        writeln!(
            text,
            "  {:<12} {:+.2} ({BASELINE:.2} → {value:.2})",
            format!("{name}:"),
            value - BASELINE
        )?;
    }
    writeln!(
        text,
        "\nFinal: {} {} ({:.0}% confidence)",
        assessment.phase.marker(),
        assessment.phase.label(),
        assessment.confidence * 100.0
    )?;
    writeln!(
        text,
        "\nStats: {} findings, {} resolved, {} open, {} dead ends",
        stats.findings, stats.unknowns_resolved, stats.unknowns_open, stats.dead_ends
    )?;

    Output::new(
        &DoneResponse {
            status: "completed",
            session_id: &active.session_id,
            objective: &active.objective,
            summary,
            duration,
            epistemic_state: EpistemicSnapshot::from(&state),
            assessment,
            stats,
            delta: Delta {
                know: state.know - BASELINE,
                uncertainty: state.uncertainty - BASELINE,
                clarity: state.clarity - BASELINE,
            },
        },
        text,
    )
}
