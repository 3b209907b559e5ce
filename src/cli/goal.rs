//! `goal` and `subtask`: work structure inside the active session.

use std::fmt::Write as _;

use anyhow::{bail, Context, Result};
use serde::Serialize;

use super::{short_id, App, Output};
use crate::model::entities::{Goal, Importance, ScopeVector, SubTask, SuccessCriterion};
use crate::store::{goals, projects};

/// Inputs for `goal add`.
#[derive(Debug, Clone, Default)]
pub struct NewGoal {
    pub objective: String,
    pub scope: ScopeVector,
    pub criteria: Vec<String>,
    pub complexity: Option<f64>,
}

#[derive(Serialize)]
struct GoalCreated<'a> {
    status: &'static str,
    goal: &'a Goal,
    current: bool,
}

#[derive(Serialize)]
struct GoalEntry<'a> {
    #[serde(flatten)]
    goal: &'a Goal,
    current: bool,
    subtasks_total: usize,
    subtasks_completed: usize,
}

#[derive(Serialize)]
struct GoalList<'a> {
    session_id: &'a str,
    goals: Vec<GoalEntry<'a>>,
    count: usize,
}

#[derive(Serialize)]
struct Completed<'a> {
    status: &'static str,
    #[serde(rename = "type")]
    kind: &'static str,
    id: &'a str,
}

#[derive(Serialize)]
struct SubtaskCreated<'a> {
    status: &'static str,
    subtask: &'a SubTask,
}

#[derive(Serialize)]
struct SubtaskList<'a> {
    goal_id: &'a str,
    subtasks: &'a [SubTask],
    count: usize,
}

/// Create a goal in the active session and make it current.
pub fn add(app: &App, new: NewGoal) -> Result<Output> {
    let mut active = app.require_active()?;
    if new.objective.trim().is_empty() {
        bail!("goal objective must not be empty");
    }

    let mut goal = Goal::new(&active.session_id, &new.objective, new.scope);
    goal.success_criteria = new
        .criteria
        .iter()
        .map(|c| SuccessCriterion::required(c))
        .collect();
    goal.estimated_complexity = new.complexity;
    let tx = app.transaction()?;
    goals::create_goal(&tx, &goal).context("failed to create goal")?;
    projects::increment_project_goals(&tx, &active.project_id)?;
    tx.commit().context("failed to create goal")?;

    active.current_goal_id = Some(goal.id.clone());
    active.save(&app.session_file)?;

    let mut text = format!("◎ Goal: {} (id: {})\n", goal.objective, short_id(&goal.id));
    for c in &goal.success_criteria {
        writeln!(text, "  □ {}", c.description)?;
    }
    Output::new(
        &GoalCreated {
            status: "created",
            goal: &goal,
            current: true,
        },
        text,
    )
}

pub fn list(app: &App, completed: Option<bool>) -> Result<Output> {
    let active = app.require_active()?;
    let all = goals::list_goals(&app.conn, &active.session_id, completed)?;

    let mut text = format!("Goals ({}):\n", all.len());
    if all.is_empty() {
        text.push_str("  (none)\n");
    }
    let mut entries = Vec::with_capacity(all.len());
    for goal in &all {
        let subtasks = goals::list_subtasks(&app.conn, &goal.id)?;
        let done = subtasks.iter().filter(|t| t.completed_timestamp.is_some()).count();
        let current = active.current_goal_id.as_deref() == Some(goal.id.as_str());
        writeln!(
            text,
            "  {} {} [{}] {done}/{} subtasks{}",
            if goal.is_completed() { "✓" } else { "○" },
            goal.objective,
            short_id(&goal.id),
            subtasks.len(),
            if current { " (current)" } else { "" }
        )?;
        entries.push(GoalEntry {
            goal,
            current,
            subtasks_total: subtasks.len(),
            subtasks_completed: done,
        });
    }

    Output::new(
        &GoalList {
            session_id: &active.session_id,
            count: entries.len(),
            goals: entries,
        },
        text,
    )
}

/// Complete `id`, or the current goal when no id is given.
pub fn complete(app: &App, id: Option<&str>) -> Result<Output> {
    let mut active = app.require_active()?;
    let id = match id.or(active.current_goal_id.as_deref()) {
        Some(id) => id.to_string(),
        None => bail!("no goal id given and no current goal"),
    };
    goals::complete_goal(&app.conn, &id)?;

    if active.current_goal_id.as_deref() == Some(id.as_str()) {
        active.current_goal_id = None;
        active.save(&app.session_file)?;
    }

    let text = format!("✓ Goal completed: {}\n", short_id(&id));
    Output::new(
        &Completed {
            status: "completed",
            kind: "goal",
            id: &id,
        },
        text,
    )
}

/// The explicit goal if given, otherwise the current one. Either way it must exist.
fn target_goal(app: &App, goal_id: Option<&str>) -> Result<Goal> {
    let active = app.require_active()?;
    let Some(id) = goal_id.or(active.current_goal_id.as_deref()) else {
        bail!("no goal id given and no current goal. Run `noetic goal add` first");
    };
    Ok(goals::get_goal(&app.conn, id)?)
}

pub fn add_subtask(
    app: &App,
    description: &str,
    goal_id: Option<&str>,
    importance: Importance,
) -> Result<Output> {
    let goal = target_goal(app, goal_id)?;
    let task = SubTask::new(&goal.id, description, importance);
    goals::create_subtask(&app.conn, &task).context("failed to create subtask")?;

    let text = format!(
        "□ Subtask [{}]: {} (id: {})\n  goal: {}\n",
        importance,
        task.description,
        short_id(&task.id),
        goal.objective
    );
    Output::new(
        &SubtaskCreated {
            status: "created",
            subtask: &task,
        },
        text,
    )
}

pub fn list_subtasks(app: &App, goal_id: Option<&str>) -> Result<Output> {
    let goal = target_goal(app, goal_id)?;
    let tasks = goals::list_subtasks(&app.conn, &goal.id)?;

    let mut text = format!("Subtasks for: {}\n", goal.objective);
    if tasks.is_empty() {
        text.push_str("  (none)\n");
    }
    for t in &tasks {
        let mark = if t.completed_timestamp.is_some() { "■" } else { "□" };
        writeln!(text, "  {mark} [{}] {} ({})", t.importance, t.description, short_id(&t.id))?;
        if let Some(evidence) = &t.completion_evidence {
            writeln!(text, "    evidence: {evidence}")?;
        }
    }

    Output::new(
        &SubtaskList {
            goal_id: &goal.id,
            subtasks: &tasks,
            count: tasks.len(),
        },
        text,
    )
}

pub fn complete_subtask(app: &App, id: &str, evidence: Option<&str>) -> Result<Output> {
    app.require_active()?;
    goals::complete_subtask(&app.conn, id, evidence)?;
    Output::new(
        &Completed {
            status: "completed",
            kind: "subtask",
            id,
        },
        format!("■ Subtask completed: {}\n", short_id(id)),
    )
}
