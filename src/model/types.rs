//! Breadcrumb type definitions.
//!
//! Defines [`Finding`] (a discovered fact that decays over time), [`Unknown`]
//! (an open question), [`DeadEnd`] (a failed approach), [`Mistake`] (an agent
//! error with an optional [`RootCauseVector`]), and [`StalenessTier`].

use serde::{Deserialize, Serialize};

/// The three breadcrumb kinds that participate in state synthesis and search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreadcrumbKind {
    Finding,
    Unknown,
    DeadEnd,
}

impl BreadcrumbKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Finding => "finding",
            Self::Unknown => "unknown",
            Self::DeadEnd => "dead_end",
        }
    }
}

impl std::fmt::Display for BreadcrumbKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How fresh a finding is, derived from its decayed confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StalenessTier {
    /// Confidence >= 0.70.
    Fresh,
    /// Confidence in [0.40, 0.70).
    Aging,
    /// Confidence < 0.40.
    Stale,
}

impl StalenessTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fresh => "fresh",
            Self::Aging => "aging",
            Self::Stale => "stale",
        }
    }

    /// Single-character marker used in text output.
    pub fn marker(&self) -> &'static str {
        match self {
            Self::Fresh => "✓",
            Self::Aging => "○",
            Self::Stale => "⚠",
        }
    }
}

impl std::fmt::Display for StalenessTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A discovered fact or insight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub id: String,
    pub project_id: String,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtask_id: Option<String>,
    pub finding: String,
    /// Unix seconds.
    pub created_timestamp: f64,
    /// Unix seconds; never earlier than `created_timestamp`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_verified_timestamp: Option<f64>,
    /// File path or topic this finding is about.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Content hash of `subject` when the finding was recorded or last verified.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_hash: Option<String>,
    /// In `[0.0, 1.0]`.
    pub impact: f64,
}

impl Finding {
    pub fn new(project_id: &str, session_id: &str, text: &str, impact: f64, now: f64) -> Self {
        Self {
            id: super::new_id(),
            project_id: project_id.to_string(),
            session_id: session_id.to_string(),
            goal_id: None,
            subtask_id: None,
            finding: text.to_string(),
            created_timestamp: now,
            last_verified_timestamp: None,
            subject: None,
            subject_hash: None,
            impact: impact.clamp(0.0, 1.0),
        }
    }

    /// The timestamp confidence decays from: last verification, else creation.
    pub fn base_timestamp(&self) -> f64 {
        self.last_verified_timestamp
            .unwrap_or(self.created_timestamp)
    }

    /// Fractional days since [`Self::base_timestamp`].
    pub fn days_since_verified(&self, now: f64) -> f64 {
        (now - self.base_timestamp()) / crate::engine::decay::SECONDS_PER_DAY
    }
}

/// An open question or knowledge gap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unknown {
    pub id: String,
    pub project_id: String,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtask_id: Option<String>,
    pub unknown: String,
    pub is_resolved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<String>,
    pub created_timestamp: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_timestamp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub impact: f64,
}

impl Unknown {
    pub fn new(project_id: &str, session_id: &str, text: &str, impact: f64, now: f64) -> Self {
        Self {
            id: super::new_id(),
            project_id: project_id.to_string(),
            session_id: session_id.to_string(),
            goal_id: None,
            subtask_id: None,
            unknown: text.to_string(),
            is_resolved: false,
            resolved_by: None,
            created_timestamp: now,
            resolved_timestamp: None,
            subject: None,
            impact: impact.clamp(0.0, 1.0),
        }
    }
}

/// A failed approach that should not be repeated. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadEnd {
    pub id: String,
    pub project_id: String,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtask_id: Option<String>,
    pub approach: String,
    pub why_failed: String,
    pub created_timestamp: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub impact: f64,
}

impl DeadEnd {
    pub fn new(
        project_id: &str,
        session_id: &str,
        approach: &str,
        why_failed: &str,
        impact: f64,
        now: f64,
    ) -> Self {
        Self {
            id: super::new_id(),
            project_id: project_id.to_string(),
            session_id: session_id.to_string(),
            goal_id: None,
            subtask_id: None,
            approach: approach.to_string(),
            why_failed: why_failed.to_string(),
            created_timestamp: now,
            subject: None,
            impact: impact.clamp(0.0, 1.0),
        }
    }
}

/// Which epistemic vector a mistake is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RootCauseVector {
    Know,
    Context,
    Clarity,
    Coherence,
    Uncertainty,
}

impl RootCauseVector {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Know => "KNOW",
            Self::Context => "CONTEXT",
            Self::Clarity => "CLARITY",
            Self::Coherence => "COHERENCE",
            Self::Uncertainty => "UNCERTAINTY",
        }
    }
}

impl std::fmt::Display for RootCauseVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RootCauseVector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "KNOW" => Ok(Self::Know),
            "CONTEXT" => Ok(Self::Context),
            "CLARITY" => Ok(Self::Clarity),
            "COHERENCE" => Ok(Self::Coherence),
            "UNCERTAINTY" => Ok(Self::Uncertainty),
            _ => Err(format!("unknown root cause vector: {s}")),
        }
    }
}

/// An error made by the agent. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mistake {
    pub id: String,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub mistake: String,
    pub why_wrong: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_estimate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_cause_vector: Option<RootCauseVector>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prevention: Option<String>,
    pub created_timestamp: f64,
}

impl Mistake {
    pub fn new(session_id: &str, mistake: &str, why_wrong: &str, now: f64) -> Self {
        Self {
            id: super::new_id(),
            session_id: session_id.to_string(),
            goal_id: None,
            project_id: None,
            mistake: mistake.to_string(),
            why_wrong: why_wrong.to_string(),
            cost_estimate: None,
            root_cause_vector: None,
            prevention: None,
            created_timestamp: now,
        }
    }
}
