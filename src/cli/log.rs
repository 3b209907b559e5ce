//! Breadcrumb logging: `learned`, `uncertain`, `resolved`, `tried`, `mistake`.

use anyhow::{bail, Context, Result};
use serde::Serialize;

use super::{short_id, App, MultipleMatches, Output};
use crate::model::now_timestamp;
use crate::model::types::{DeadEnd, Finding, Mistake, RootCauseVector, Unknown};
use crate::store::breadcrumbs;

/// Impact recorded when the caller gives none.
pub const DEFAULT_IMPACT: f64 = 0.5;

/// Resolver recorded when neither `--by` nor an active session names one.
const MANUAL_RESOLVER: &str = "manual";

#[derive(Serialize)]
struct Logged<'a> {
    status: &'static str,
    #[serde(rename = "type")]
    kind: &'static str,
    id: &'a str,
    #[serde(flatten)]
    body: LoggedBody<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    goal_id: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum LoggedBody<'a> {
    Finding {
        finding: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        git_hash: Option<&'a str>,
    },
    Unknown {
        unknown: &'a str,
    },
    DeadEnd {
        approach: &'a str,
        why_failed: &'a str,
    },
    Mistake {
        mistake: &'a str,
        why_wrong: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        root_cause_vector: Option<RootCauseVector>,
    },
}

/// Optional fields shared by `learned`, `uncertain` and `tried`.
#[derive(Debug, Default, Clone)]
pub struct LogOptions {
    pub scope: Option<String>,
    pub impact: Option<f64>,
}

pub async fn learned(app: &App, text: &str, opts: LogOptions) -> Result<Output> {
    let active = app.require_active()?;
    let now = now_timestamp();
    let mut f = Finding::new(
        &active.project_id,
        &active.session_id,
        text,
        opts.impact.unwrap_or(DEFAULT_IMPACT),
        now,
    );
    f.goal_id = active.current_goal_id.clone();
    if let Some(scope) = &opts.scope {
        f.subject = Some(scope.clone());
        f.subject_hash = app.hash_path(scope).await;
        f.last_verified_timestamp = Some(f.created_timestamp);
    }
    breadcrumbs::create_finding(&app.conn, &f).context("failed to log finding")?;

    let mut out = format!("✓ Learned: {text}\n");
    if let Some(scope) = &f.subject {
        out.push_str(&format!("  (scoped to: {scope})\n"));
    }
    Output::new(
        &Logged {
            status: "logged",
            kind: "finding",
            id: &f.id,
            body: LoggedBody::Finding {
                finding: &f.finding,
                git_hash: f.subject_hash.as_deref(),
            },
            scope: f.subject.as_deref(),
            goal_id: f.goal_id.as_deref(),
        },
        out,
    )
}

pub fn uncertain(app: &App, text: &str, opts: LogOptions) -> Result<Output> {
    let active = app.require_active()?;
    let mut u = Unknown::new(
        &active.project_id,
        &active.session_id,
        text,
        opts.impact.unwrap_or(DEFAULT_IMPACT),
        now_timestamp(),
    );
    u.goal_id = active.current_goal_id.clone();
    u.subject = opts.scope;
    breadcrumbs::create_unknown(&app.conn, &u).context("failed to log unknown")?;

    Output::new(
        &Logged {
            status: "logged",
            kind: "unknown",
            id: &u.id,
            body: LoggedBody::Unknown { unknown: &u.unknown },
            scope: u.subject.as_deref(),
            goal_id: u.goal_id.as_deref(),
        },
        format!("? Uncertain: {text}"),
    )
}

pub fn tried(app: &App, approach: &str, why_failed: &str, opts: LogOptions) -> Result<Output> {
    let active = app.require_active()?;
    let mut d = DeadEnd::new(
        &active.project_id,
        &active.session_id,
        approach,
        why_failed,
        opts.impact.unwrap_or(DEFAULT_IMPACT),
        now_timestamp(),
    );
    d.goal_id = active.current_goal_id.clone();
    d.subject = opts.scope;
    breadcrumbs::create_dead_end(&app.conn, &d).context("failed to log dead end")?;

    Output::new(
        &Logged {
            status: "logged",
            kind: "dead_end",
            id: &d.id,
            body: LoggedBody::DeadEnd {
                approach: &d.approach,
                why_failed: &d.why_failed,
            },
            scope: d.subject.as_deref(),
            goal_id: d.goal_id.as_deref(),
        },
        format!("✗ Tried: {approach} → {why_failed}"),
    )
}

#[derive(Debug, Default, Clone)]
pub struct MistakeOptions {
    pub cost: Option<String>,
    pub root_cause: Option<RootCauseVector>,
    pub prevention: Option<String>,
}

pub fn mistake(app: &App, text: &str, why_wrong: &str, opts: MistakeOptions) -> Result<Output> {
    let active = app.require_active()?;
    let mut m = Mistake::new(&active.session_id, text, why_wrong, now_timestamp());
    m.project_id = Some(active.project_id.clone());
    m.goal_id = active.current_goal_id.clone();
    m.cost_estimate = opts.cost;
    m.root_cause_vector = opts.root_cause;
    m.prevention = opts.prevention;
    breadcrumbs::create_mistake(&app.conn, &m).context("failed to log mistake")?;

    let mut out = format!("! Mistake: {text}\n  Why: {why_wrong}\n");
    if let Some(p) = &m.prevention {
        out.push_str(&format!("  Prevention: {p}\n"));
    }
    Output::new(
        &Logged {
            status: "logged",
            kind: "mistake",
            id: &m.id,
            body: LoggedBody::Mistake {
                mistake: &m.mistake,
                why_wrong: &m.why_wrong,
                root_cause_vector: m.root_cause_vector,
            },
            scope: None,
            goal_id: m.goal_id.as_deref(),
        },
        out,
    )
}

#[derive(Serialize)]
struct Candidate<'a> {
    id: &'a str,
    unknown: &'a str,
}

#[derive(Serialize)]
struct Resolved<'a> {
    status: &'static str,
    id: &'a str,
    unknown: &'a str,
    resolved_by: &'a str,
    already_resolved: bool,
}

/// Resolve an open unknown by id or by a substring of its text.
///
/// A text that matches more than one open unknown resolves nothing and lists
/// the candidates instead.
pub fn resolved(
    app: &App,
    text: Option<&str>,
    id: Option<&str>,
    by: Option<&str>,
) -> Result<Output> {
    let active = app.active()?;
    let resolver = by
        .map(str::to_string)
        .or_else(|| active.as_ref().map(|a| a.session_id.clone()))
        .unwrap_or_else(|| MANUAL_RESOLVER.to_string());

    let target = match (id, text) {
        (Some(id), _) => breadcrumbs::get_unknown(&app.conn, id)?,
        (None, Some(text)) => {
            let project_id = match &active {
                Some(a) => a.project_id.clone(),
                None => app.default_project()?.id,
            };
            let mut found = breadcrumbs::find_unknowns_by_text(&app.conn, Some(&project_id), text)?;
            match found.len() {
                0 => bail!("no open unknowns match: {text}"),
                1 => found.remove(0),
                _ => {
                    let mut out = String::from("Multiple open unknowns match. Use --id to specify:\n");
                    for u in &found {
                        out.push_str(&format!("  ? {} (id: {})\n", u.unknown, short_id(&u.id)));
                    }
                    return Output::new(
                        &MultipleMatches::new(
                            "Multiple unknowns match. Use --id to specify.",
                            found
                                .iter()
                                .map(|u| Candidate {
                                    id: &u.id,
                                    unknown: &u.unknown,
                                })
                                .collect(),
                        ),
                        out,
                    );
                }
            }
        }
        (None, None) => bail!("provide the unknown's text or --id"),
    };

    let already_resolved = target.is_resolved;
    breadcrumbs::resolve_unknown(&app.conn, &target.id, &resolver)?;
    let resolved_by = if already_resolved {
        target.resolved_by.clone().unwrap_or_default()
    } else {
        resolver
    };

    Output::new(
        &Resolved {
            status: "resolved",
            id: &target.id,
            unknown: &target.unknown,
            resolved_by: &resolved_by,
            already_resolved,
        },
        format!("✓ Resolved: {}", target.unknown),
    )
}
