//! Administrative entities: projects, sessions, goals, subtasks, cascades,
//! reflexes, handoff reports, investigation branches and merge decisions.
//!
//! These carry the scoping keys the engine consumes. Their lifecycle is plain
//! create / update / complete.

use serde::{Deserialize, Serialize};

use super::vectors::EpistemicVectors;
use super::{new_id, now_timestamp};

/// Declares a snake_case string enum with `as_str`, `Display` and `FromStr`.
macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident, $label:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(format!(concat!("unknown ", $label, ": {}"), s)),
                }
            }
        }
    };
}

string_enum!(ProjectStatus, "project status" {
    Active => "active",
    Inactive => "inactive",
    Complete => "complete",
});

string_enum!(GoalStatus, "goal status" {
    InProgress => "in_progress",
    Complete => "complete",
    Blocked => "blocked",
    Cancelled => "cancelled",
});

string_enum!(TaskStatus, "task status" {
    Pending => "pending",
    InProgress => "in_progress",
    Completed => "completed",
    Blocked => "blocked",
    Skipped => "skipped",
});

string_enum!(
    /// How much a subtask matters to the goal's epistemic outcome.
    Importance, "importance" {
    Critical => "critical",
    High => "high",
    Medium => "medium",
    Low => "low",
});

string_enum!(BranchStatus, "branch status" {
    Active => "active",
    Merged => "merged",
    Abandoned => "abandoned",
});

string_enum!(
    /// Checkpoint at which a reflex was recorded.
    ReflexPhase, "phase" {
    Preflight => "PREFLIGHT",
    Check => "CHECK",
    Postflight => "POSTFLIGHT",
});

impl ReflexPhase {
    /// Case-insensitive parse, for CLI input.
    pub fn parse_loose(s: &str) -> Result<Self, String> {
        s.to_ascii_uppercase().parse()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub repos: Vec<String>,
    pub created_timestamp: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_activity_timestamp: Option<f64>,
    pub status: ProjectStatus,
    pub total_sessions: u32,
    pub total_goals: u32,
}

impl Project {
    pub fn new(name: &str, description: Option<String>) -> Self {
        Self {
            id: new_id(),
            name: name.to_string(),
            description,
            repos: Vec::new(),
            created_timestamp: now_timestamp(),
            last_activity_timestamp: None,
            status: ProjectStatus::Active,
            total_sessions: 0,
            total_goals: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub ai_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// The session objective.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub start_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Session {
    pub fn new(ai_id: &str, project_id: Option<String>, subject: Option<String>) -> Self {
        Self {
            session_id: new_id(),
            ai_id: ai_id.to_string(),
            project_id,
            subject,
            start_time: now_timestamp(),
            end_time: None,
            avg_confidence: None,
            notes: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.end_time.is_none()
    }
}

/// Breadth, duration and coordination needs of a goal, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeVector {
    pub breadth: f64,
    pub duration: f64,
    pub coordination: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessCriterion {
    pub id: String,
    pub description: String,
    /// `completion`, `quality_gate` or `metric_threshold`.
    pub validation_method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub is_met: bool,
}

impl SuccessCriterion {
    pub fn required(description: &str) -> Self {
        Self {
            id: new_id(),
            description: description.to_string(),
            validation_method: "completion".into(),
            threshold: None,
            is_required: true,
            is_met: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    pub session_id: String,
    pub objective: String,
    pub scope: ScopeVector,
    pub success_criteria: Vec<SuccessCriterion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_complexity: Option<f64>,
    pub created_timestamp: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_timestamp: Option<f64>,
    pub status: GoalStatus,
}

impl Goal {
    pub fn new(session_id: &str, objective: &str, scope: ScopeVector) -> Self {
        Self {
            id: new_id(),
            session_id: session_id.to_string(),
            objective: objective.to_string(),
            scope,
            success_criteria: Vec::new(),
            estimated_complexity: None,
            created_timestamp: now_timestamp(),
            completed_timestamp: None,
            status: GoalStatus::InProgress,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == GoalStatus::Complete
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubTask {
    pub id: String,
    pub goal_id: String,
    pub description: String,
    pub status: TaskStatus,
    pub importance: Importance,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_evidence: Option<String>,
    pub created_timestamp: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_timestamp: Option<f64>,
}

impl SubTask {
    pub fn new(goal_id: &str, description: &str, importance: Importance) -> Self {
        Self {
            id: new_id(),
            goal_id: goal_id.to_string(),
            description: description.to_string(),
            status: TaskStatus::Pending,
            importance,
            completion_evidence: None,
            created_timestamp: now_timestamp(),
            completed_timestamp: None,
        }
    }
}

/// One preflight → check → postflight pass over a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cascade {
    pub cascade_id: String,
    pub session_id: String,
    pub task: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal_id: Option<String>,
    pub preflight_completed: bool,
    pub check_completed: bool,
    pub postflight_completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engagement_gate_passed: Option<bool>,
    pub started_at: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<f64>,
}

impl Cascade {
    pub fn new(session_id: &str, task: &str, goal_id: Option<String>) -> Self {
        Self {
            cascade_id: new_id(),
            session_id: session_id.to_string(),
            task: task.to_string(),
            goal_id,
            preflight_completed: false,
            check_completed: false,
            postflight_completed: false,
            final_action: None,
            final_confidence: None,
            engagement_gate_passed: None,
            started_at: now_timestamp(),
            completed_at: None,
        }
    }
}

/// A stored 13-vector self-assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reflex {
    /// Assigned by the database; `0` until inserted.
    pub id: i64,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cascade_id: Option<String>,
    pub phase: ReflexPhase,
    pub round: u32,
    pub timestamp: f64,
    pub vectors: EpistemicVectors,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl Reflex {
    pub fn new(session_id: &str, phase: ReflexPhase, vectors: EpistemicVectors) -> Self {
        Self {
            id: 0,
            session_id: session_id.to_string(),
            cascade_id: None,
            phase,
            round: 1,
            timestamp: now_timestamp(),
            vectors,
            reasoning: None,
        }
    }
}

/// End-of-session summary read back at the next session start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoffReport {
    pub session_id: String,
    pub ai_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// RFC 3339.
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    pub key_findings: Vec<String>,
    pub remaining_unknowns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_session_context: Option<String>,
    /// Unix seconds.
    pub created_at: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestigationBranch {
    /// `<session_id>-<branch_name>`.
    pub id: String,
    pub session_id: String,
    pub branch_name: String,
    pub investigation_path: String,
    pub git_branch_name: String,
    pub preflight_vectors: EpistemicVectors,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postflight_vectors: Option<EpistemicVectors>,
    pub tokens_spent: u64,
    pub time_spent_minutes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epistemic_quality: Option<f64>,
    pub is_winner: bool,
    pub created_timestamp: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint_timestamp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merged_timestamp: Option<f64>,
    pub status: BranchStatus,
}

impl InvestigationBranch {
    pub fn new(
        session_id: &str,
        branch_name: &str,
        investigation_path: &str,
        git_branch_name: &str,
        preflight_vectors: EpistemicVectors,
    ) -> Self {
        Self {
            id: format!("{session_id}-{branch_name}"),
            session_id: session_id.to_string(),
            branch_name: branch_name.to_string(),
            investigation_path: investigation_path.to_string(),
            git_branch_name: git_branch_name.to_string(),
            preflight_vectors,
            postflight_vectors: None,
            tokens_spent: 0,
            time_spent_minutes: 0,
            merge_score: None,
            epistemic_quality: None,
            is_winner: false,
            created_timestamp: now_timestamp(),
            checkpoint_timestamp: None,
            merged_timestamp: None,
            status: BranchStatus::Active,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeDecision {
    pub id: String,
    pub session_id: String,
    pub investigation_round: u32,
    pub winning_branch_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winning_branch_name: Option<String>,
    pub winning_score: f64,
    pub other_branches: Vec<String>,
    pub decision_rationale: String,
    pub created_timestamp: f64,
}
