//! `branch`: parallel investigation paths and the merge decision between them.

use std::fmt::Write as _;

use anyhow::{bail, Context, Result};
use serde::Serialize;

use super::checkpoint::parse_vectors;
use super::{App, Output};
use crate::model::entities::{InvestigationBranch, MergeDecision, ReflexPhase};
use crate::model::vectors::EpistemicVectors;
use crate::model::{new_id, now_timestamp};
use crate::store::{branches, sessions};

const GIT_BRANCH_PREFIX: &str = "investigate/";

#[derive(Serialize)]
struct BranchOpened<'a> {
    status: &'static str,
    branch: &'a InvestigationBranch,
}

#[derive(Serialize)]
struct BranchCheckpointed<'a> {
    status: &'static str,
    id: &'a str,
    epistemic_quality: f64,
    tokens_spent: u64,
    time_spent_minutes: u64,
}

#[derive(Serialize)]
struct BranchList<'a> {
    session_id: &'a str,
    branches: &'a [InvestigationBranch],
    count: usize,
}

#[derive(Serialize)]
struct WinnerChosen<'a> {
    status: &'static str,
    decision: &'a MergeDecision,
}

/// Open a branch. Without explicit vectors the session's latest preflight is
/// reused, falling back to neutral.
pub fn open(app: &App, name: &str, path: &str, preflight: Option<&str>) -> Result<Output> {
    let active = app.require_active()?;
    if name.trim().is_empty() {
        bail!("branch name must not be empty");
    }
    let vectors = match preflight {
        Some(raw) => parse_vectors(raw)?,
        None => sessions::latest_reflex_by_phase(&app.conn, &active.session_id, ReflexPhase::Preflight)?
            .map(|r| r.vectors)
            .unwrap_or_else(EpistemicVectors::neutral),
    };

    let branch = InvestigationBranch::new(
        &active.session_id,
        name,
        path,
        &format!("{GIT_BRANCH_PREFIX}{name}"),
        vectors,
    );
    branches::create_branch(&app.conn, &branch)
        .with_context(|| format!("failed to open branch {name}"))?;

    let text = format!(
        "⑂ Branch opened: {name}\n  path: {path}\n  git:  {}\n",
        branch.git_branch_name
    );
    Output::new(
        &BranchOpened {
            status: "opened",
            branch: &branch,
        },
        text,
    )
}

pub fn checkpoint(
    app: &App,
    name: &str,
    postflight: &str,
    tokens_spent: u64,
    time_spent_minutes: u64,
) -> Result<Output> {
    let active = app.require_active()?;
    let vectors = parse_vectors(postflight)?;
    let id = branch_id(&active.session_id, name);
    let quality =
        branches::checkpoint_branch(&app.conn, &id, &vectors, tokens_spent, time_spent_minutes)?;

    let text = format!(
        "⑂ {name} checkpointed: quality {quality:.2} ({tokens_spent} tokens, {time_spent_minutes} min)\n"
    );
    Output::new(
        &BranchCheckpointed {
            status: "checkpointed",
            id: &id,
            epistemic_quality: quality,
            tokens_spent,
            time_spent_minutes,
        },
        text,
    )
}

pub fn list(app: &App) -> Result<Output> {
    let active = app.require_active()?;
    let all = branches::list_branches(&app.conn, &active.session_id)?;

    let mut text = format!("Investigation branches ({}):\n", all.len());
    if all.is_empty() {
        text.push_str("  (none)\n");
    }
    for b in &all {
        let score = b
            .merge_score
            .map(|s| format!("{s:.2}"))
            .unwrap_or_else(|| "-".into());
        let winner = if b.is_winner { " ★" } else { "" };
        writeln!(text, "  {} [{}] score {score}{winner}", b.branch_name, b.status)?;
        writeln!(text, "    {}", b.investigation_path)?;
    }

    Output::new(
        &BranchList {
            session_id: &active.session_id,
            branches: &all,
            count: all.len(),
        },
        text,
    )
}

/// Merge `name` as the winner of the next investigation round.
pub fn winner(app: &App, name: &str, rationale: &str) -> Result<Output> {
    let active = app.require_active()?;
    let id = branch_id(&active.session_id, name);
    let chosen = branches::get_branch(&app.conn, &id)?;
    let others: Vec<String> = branches::list_branches(&app.conn, &active.session_id)?
        .into_iter()
        .filter(|b| b.id != chosen.id)
        .map(|b| b.id)
        .collect();

    let tx = app.transaction()?;
    branches::mark_branch_winner(&tx, &chosen.id)?;
    let round = branches::count_merge_decisions(&tx, &active.session_id)? + 1;
    let decision = MergeDecision {
        id: new_id(),
        session_id: active.session_id.clone(),
        investigation_round: round,
        winning_branch_id: chosen.id.clone(),
        winning_branch_name: Some(chosen.branch_name.clone()),
        winning_score: chosen.merge_score.unwrap_or(0.0),
        other_branches: others,
        decision_rationale: rationale.to_string(),
        created_timestamp: now_timestamp(),
    };
    branches::create_merge_decision(&tx, &decision)?;
    tx.commit().context("failed to record merge decision")?;

    let text = format!(
        "★ Winner (round {round}): {name} (score {:.2})\n  {rationale}\n",
        decision.winning_score
    );
    Output::new(
        &WinnerChosen {
            status: "merged",
            decision: &decision,
        },
        text,
    )
}

fn branch_id(session_id: &str, name: &str) -> String {
    format!("{session_id}-{name}")
}
