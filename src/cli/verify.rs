//! `verify`: confirm a finding still holds and reset its decay clock.

use anyhow::{bail, Result};
use serde::Serialize;

use super::{short_id, App, MultipleMatches, Output};
use crate::engine::decay::{assess, SECONDS_PER_DAY};
use crate::engine::FileChangeOracle;
use crate::model::now_timestamp;
use crate::model::types::{Finding, StalenessTier};
use crate::store::breadcrumbs;

#[derive(Serialize)]
struct Candidate<'a> {
    id: &'a str,
    finding: &'a str,
    status: StalenessTier,
    days_old: i64,
    file_changed: bool,
}

#[derive(Serialize)]
struct Verified<'a> {
    status: &'static str,
    id: &'a str,
    finding: &'a str,
    updated: bool,
    git_hash: Option<&'a str>,
}

/// Verify by full id, id prefix, or text.
///
/// Ambiguous lookups return the candidate list and touch nothing.
pub async fn verify(
    app: &App,
    text: Option<&str>,
    id: Option<&str>,
    update: Option<&str>,
) -> Result<Output> {
    if id.is_some_and(|id| id.trim().is_empty()) {
        bail!("--id must not be empty");
    }
    let project_id = app.active()?.map(|a| a.project_id);

    let mut candidates = match (id, text) {
        (Some(id), _) => match breadcrumbs::get_finding(&app.conn, id) {
            Ok(f) => vec![f],
            Err(e) if e.is_not_found() => {
                let by_prefix = breadcrumbs::find_findings_by_id_prefix(&app.conn, id)?;
                if by_prefix.is_empty() {
                    bail!("finding not found: {id}");
                }
                by_prefix
            }
            Err(e) => return Err(e.into()),
        },
        (None, Some(text)) => {
            let found = breadcrumbs::find_findings_by_text(&app.conn, project_id.as_deref(), text)?;
            if found.is_empty() {
                bail!("no findings found matching: {text}");
            }
            found
        }
        (None, None) => bail!("provide search text or --id"),
    };

    if candidates.len() > 1 {
        return multiple_matches(app, &candidates).await;
    }
    let target = candidates.remove(0);

    let new_hash = match &target.subject {
        Some(path) => app.hash_path(path).await,
        None => None,
    };
    breadcrumbs::verify_finding(&app.conn, &target.id, new_hash.as_deref(), update)?;

    let display = update.unwrap_or(&target.finding);
    let mut text = format!("✓ Verified: {display}\n");
    if update.is_some() {
        text.push_str(&format!("  (updated from: {})\n", target.finding));
    }
    Output::new(
        &Verified {
            status: "verified",
            id: &target.id,
            finding: display,
            updated: update.is_some(),
            git_hash: new_hash.as_deref(),
        },
        text,
    )
}

async fn multiple_matches(app: &App, findings: &[Finding]) -> Result<Output> {
    let snapshot = app.change_snapshot(findings).await;
    let oracle: &dyn FileChangeOracle = &snapshot;
    let now = now_timestamp();

    let mut text = String::from("Multiple matches found. Use --id to specify:\n");
    let matches: Vec<Candidate> = findings
        .iter()
        .map(|f| {
            let scored = assess(f, now, oracle);
            text.push_str(&format!(
                "  {} {} (id: {})\n",
                scored.tier.marker(),
                f.finding,
                short_id(&f.id)
            ));
            Candidate {
                id: &f.id,
                finding: &f.finding,
                status: scored.tier,
                days_old: ((now - f.base_timestamp()) / SECONDS_PER_DAY).floor() as i64,
                file_changed: scored.file_changed,
            }
        })
        .collect();

    Output::new(
        &MultipleMatches::new("Multiple findings match. Use --id to specify.", matches),
        text,
    )
}
