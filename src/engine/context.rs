//! Session context assembled at `start` and `status`.
//!
//! Pure: the caller loads breadcrumbs and the last handoff, and resolves file
//! changes into an oracle, before calling [`build_session_context`].

use serde::Serialize;

use super::decay::assess;
use super::guidance::{build_guidance, partition_findings, Guidance, KnowledgeItem, VerificationNeeded};
use super::oracle::FileChangeOracle;
use super::state::{synthesize_state, EpistemicState};
use crate::model::entities::HandoffReport;
use crate::model::types::{DeadEnd, Finding, StalenessTier, Unknown};

/// Maximum handoff key findings carried into the next session.
pub const MAX_HIGHLIGHTS: usize = 3;

/// A failed approach that should not be repeated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeadEndWarning {
    pub approach: String,
    pub why_failed: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl From<&DeadEnd> for DeadEndWarning {
    fn from(d: &DeadEnd) -> Self {
        Self {
            approach: d.approach.clone(),
            why_failed: d.why_failed.clone(),
            scope: d.subject.clone(),
        }
    }
}

/// Handoff from the previous session in the same project.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContinuityContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub highlights: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_since_last_session: Option<String>,
}

impl ContinuityContext {
    /// `None` when the handoff carries nothing worth showing.
    pub fn from_handoff(handoff: &HandoffReport, now: f64) -> Option<Self> {
        let non_empty = |s: &Option<String>| s.as_ref().filter(|s| !s.is_empty()).cloned();
        let ctx = Self {
            summary: non_empty(&handoff.task_summary),
            recommendations: non_empty(&handoff.next_session_context),
            highlights: handoff
                .key_findings
                .iter()
                .take(MAX_HIGHLIGHTS)
                .cloned()
                .collect(),
            time_since_last_session: (handoff.created_at > 0.0)
                .then(|| format_time_since(now - handoff.created_at)),
        };
        let empty = ctx.summary.is_none()
            && ctx.recommendations.is_none()
            && ctx.highlights.is_empty()
            && ctx.time_since_last_session.is_none();
        (!empty).then_some(ctx)
    }
}

/// `"N minutes ago"` under an hour, `"X.Y hours ago"` under a day, else days.
pub fn format_time_since(elapsed_seconds: f64) -> String {
    let seconds = elapsed_seconds.max(0.0);
    let hours = seconds / 3600.0;
    if hours < 1.0 {
        format!("{} minutes ago", (seconds / 60.0) as i64)
    } else if hours < 24.0 {
        format!("{hours:.1} hours ago")
    } else {
        format!("{:.1} days ago", hours / 24.0)
    }
}

/// Synthesized fields plus the composite score, for agents that reason numerically.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EpistemicSnapshot {
    pub know: f64,
    pub uncertainty: f64,
    pub clarity: f64,
    pub coherence: f64,
    pub completion: f64,
    pub engagement: f64,
    pub overall: f64,
}

impl From<&EpistemicState> for EpistemicSnapshot {
    fn from(s: &EpistemicState) -> Self {
        Self {
            know: s.know,
            uncertainty: s.uncertainty,
            clarity: s.clarity,
            coherence: s.coherence,
            completion: s.completion,
            engagement: s.engagement,
            overall: s.confidence,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BreadcrumbCounts {
    pub findings: usize,
    pub findings_fresh: usize,
    pub findings_aging: usize,
    pub findings_stale: usize,
    pub unknowns_resolved: usize,
    pub unknowns_open: usize,
    pub dead_ends: usize,
}

impl BreadcrumbCounts {
    pub fn tally(
        findings: &[Finding],
        open_unknowns: &[Unknown],
        resolved_unknowns: &[Unknown],
        dead_ends: &[DeadEnd],
        now: f64,
        oracle: &dyn FileChangeOracle,
    ) -> Self {
        let mut counts = Self {
            findings: findings.len(),
            unknowns_open: open_unknowns.len(),
            unknowns_resolved: resolved_unknowns.len(),
            dead_ends: dead_ends.len(),
            ..Self::default()
        };
        for f in findings {
            match assess(f, now, oracle).tier {
                StalenessTier::Fresh => counts.findings_fresh += 1,
                StalenessTier::Aging => counts.findings_aging += 1,
                StalenessTier::Stale => counts.findings_stale += 1,
            }
        }
        counts
    }
}

/// Everything an agent needs at the top of a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionContext {
    pub session_id: String,
    pub project_id: String,
    pub objective: String,
    pub decision: Guidance,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub requires_verification: Vec<VerificationNeeded>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dead_ends: Vec<DeadEndWarning>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub knowledge: Vec<KnowledgeItem>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub open_questions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continuity: Option<ContinuityContext>,
    pub vectors: EpistemicSnapshot,
}

/// Breadcrumbs and timing a context is built from.
#[derive(Debug, Clone, Copy)]
pub struct ContextInputs<'a> {
    pub findings: &'a [Finding],
    pub open_unknowns: &'a [Unknown],
    pub resolved_unknowns: &'a [Unknown],
    pub dead_ends: &'a [DeadEnd],
    pub last_handoff: Option<&'a HandoffReport>,
    pub session_start: f64,
    pub now: f64,
}

pub fn build_session_context(
    session_id: &str,
    project_id: &str,
    objective: &str,
    inputs: ContextInputs<'_>,
    oracle: &dyn FileChangeOracle,
) -> SessionContext {
    let state = synthesize_state(
        inputs.findings,
        inputs.open_unknowns,
        inputs.resolved_unknowns,
        inputs.dead_ends,
        inputs.session_start,
        inputs.now,
        oracle,
    );
    let decision = build_guidance(
        &state,
        inputs.findings,
        inputs.open_unknowns,
        inputs.dead_ends,
        inputs.now,
        oracle,
    );
    let partition = partition_findings(inputs.findings, inputs.now, oracle);

    SessionContext {
        session_id: session_id.to_string(),
        project_id: project_id.to_string(),
        objective: objective.to_string(),
        decision,
        requires_verification: partition.requires_verification,
        dead_ends: inputs.dead_ends.iter().map(DeadEndWarning::from).collect(),
        knowledge: partition.knowledge,
        open_questions: inputs
            .open_unknowns
            .iter()
            .map(|u| u.unknown.clone())
            .collect(),
        continuity: inputs
            .last_handoff
            .and_then(|h| ContinuityContext::from_handoff(h, inputs.now)),
        vectors: EpistemicSnapshot::from(&state),
    }
}
