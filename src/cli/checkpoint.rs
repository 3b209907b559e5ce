//! `checkpoint`: record an explicit 13-vector self-assessment.
//!
//! A preflight opens a cascade for the session objective, a check is attached
//! to the open cascade, and a postflight closes it with the vector model's
//! recommendation.

use std::fmt::Write as _;

use anyhow::{Context, Result};
use serde::Serialize;

use super::{App, Output};
use crate::model::entities::{Cascade, Reflex, ReflexPhase};
use crate::model::vectors::{ConfidenceSource, ConfidenceSummary, EpistemicVectors};
use crate::store::sessions;

#[derive(Serialize)]
struct CheckpointResponse<'a> {
    status: &'static str,
    phase: ReflexPhase,
    reflex_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    cascade_id: Option<&'a str>,
    assessment: ConfidenceSummary,
    engagement_gate_passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    delta: Option<EpistemicVectors>,
}

/// Parse a vectors document. Absent fields read as `0.0`.
pub fn parse_vectors(raw: &str) -> Result<EpistemicVectors> {
    serde_json::from_str(raw).context("invalid vectors JSON")
}

pub fn checkpoint(
    app: &App,
    phase: ReflexPhase,
    vectors_json: &str,
    reasoning: Option<&str>,
) -> Result<Output> {
    let active = app.require_active()?;
    let vectors = parse_vectors(vectors_json)?;

    let tx = app.transaction()?;
    let cascade_id = match phase {
        ReflexPhase::Preflight => {
            let cascade = Cascade::new(
                &active.session_id,
                &active.objective,
                active.current_goal_id.clone(),
            );
            sessions::create_cascade(&tx, &cascade)?;
            sessions::mark_cascade_phase(&tx, &cascade.cascade_id, phase)?;
            Some(cascade.cascade_id)
        }
        ReflexPhase::Check | ReflexPhase::Postflight => {
            sessions::latest_open_cascade(&tx, &active.session_id)?.map(|c| c.cascade_id)
        }
    };

    let mut reflex = Reflex::new(&active.session_id, phase, vectors);
    reflex.cascade_id = cascade_id.clone();
    reflex.reasoning = reasoning.map(str::to_string);
    let reflex_id = sessions::create_reflex(&tx, &reflex)?;

    let assessment = vectors.summary();
    let mut delta = None;
    if let Some(id) = &cascade_id {
        match phase {
            ReflexPhase::Check => sessions::mark_cascade_phase(&tx, id, phase)?,
            ReflexPhase::Postflight => sessions::complete_cascade(
                &tx,
                id,
                assessment.action.as_str(),
                assessment.confidence,
                vectors.passes_engagement_gate(),
            )?,
            ReflexPhase::Preflight => {}
        }
    }
    if phase == ReflexPhase::Postflight {
        delta = sessions::reflex_delta(&tx, &active.session_id)?;
    }
    tx.commit().context("failed to record checkpoint")?;

    let mut text = String::new();
    writeln!(
        text,
        "{} {} recorded: {} {} ({:.0}% confidence)",
        assessment.phase.marker(),
        phase,
        assessment.action.as_str().to_uppercase(),
        assessment.phase.label(),
        assessment.confidence * 100.0
    )?;
    if !vectors.passes_engagement_gate() {
        writeln!(text, "  Engagement gate not passed.")?;
    }
    if let Some(d) = &delta {
        writeln!(text, "\nDelta since preflight:")?;
        for (name, value) in d.named().filter(|(_, v)| v.abs() > f64::EPSILON) {
            writeln!(text, "  {name:<12} {value:+.2}")?;
        }
    }

    Output::new(
        &CheckpointResponse {
            status: "recorded",
            phase,
            reflex_id,
            cascade_id: cascade_id.as_deref(),
            assessment,
            engagement_gate_passed: vectors.passes_engagement_gate(),
            delta,
        },
        text,
    )
}
