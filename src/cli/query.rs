//! `query`: browse or search the project's breadcrumbs without a session.

use std::fmt::Write as _;

use anyhow::Result;
use serde::Serialize;

use super::{rule, App, Output};
use crate::engine::decay::{assess, SECONDS_PER_DAY};
use crate::engine::{fuzzy_search, FileChangeOracle, RankedResult, SearchItem};
use crate::model::now_timestamp;
use crate::model::types::{BreadcrumbKind, StalenessTier};
use crate::store::breadcrumbs;

/// Rows per kind loaded as the fuzzy search pool.
const FUZZY_POOL: usize = 500;

/// Which breadcrumb kinds to show and how to filter them.
#[derive(Debug, Clone, Default)]
pub struct QueryArgs {
    pub text: Option<String>,
    pub unknowns: bool,
    pub dead_ends: bool,
    pub all: bool,
    pub fuzzy: bool,
    pub threshold: Option<f64>,
    pub limit: Option<usize>,
}

impl QueryArgs {
    fn show_findings(&self) -> bool {
        self.all || (!self.unknowns && !self.dead_ends)
    }

    fn show_unknowns(&self) -> bool {
        self.all || self.unknowns
    }

    fn show_dead_ends(&self) -> bool {
        self.all || self.dead_ends
    }
}

#[derive(Serialize)]
struct FindingRow {
    id: String,
    finding: String,
    status: StalenessTier,
    confidence: f64,
    days_old: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_changed: Option<bool>,
}

#[derive(Serialize)]
struct UnknownRow {
    id: String,
    unknown: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope: Option<String>,
}

#[derive(Serialize)]
struct DeadEndRow {
    id: String,
    approach: String,
    why_failed: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope: Option<String>,
}

#[derive(Serialize)]
struct QueryResponse {
    project_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    findings: Option<Vec<FindingRow>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    findings_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    unknowns: Option<Vec<UnknownRow>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    unknowns_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dead_ends: Option<Vec<DeadEndRow>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dead_ends_count: Option<usize>,
}

#[derive(Serialize)]
struct FuzzyResponse<'a> {
    query: &'a str,
    results: Vec<RankedResult>,
    count: usize,
}

pub async fn query(app: &App, args: &QueryArgs) -> Result<Output> {
    let project = app.default_project()?;
    let limit = args.limit.unwrap_or(app.config.query.default_limit);
    let text = args.text.as_deref().filter(|t| !t.is_empty());

    if let (true, Some(q)) = (args.fuzzy, text) {
        return fuzzy(app, &project.id, q, args, limit);
    }

    let mut out = String::new();
    writeln!(out, "Knowledge Base: {}", project.name)?;
    writeln!(out, "{}", rule())?;

    let mut response = QueryResponse {
        project_id: project.id.clone(),
        findings: None,
        findings_count: None,
        unknowns: None,
        unknowns_count: None,
        dead_ends: None,
        dead_ends_count: None,
    };

    if args.show_findings() {
        let findings = match text {
            Some(t) => breadcrumbs::find_findings_by_text(&app.conn, Some(&project.id), t)?,
            None => breadcrumbs::list_findings(&app.conn, Some(&project.id), None, limit)?,
        };
        let snapshot = app.change_snapshot(&findings).await;
        let oracle: &dyn FileChangeOracle = &snapshot;
        let now = now_timestamp();

        match text {
            Some(t) => writeln!(out, "\n✓ FINDINGS matching \"{t}\" ({}):", findings.len())?,
            None => writeln!(out, "\n✓ FINDINGS ({}):", findings.len())?,
        }
        if findings.is_empty() {
            writeln!(out, "  (none)")?;
        }

        let rows: Vec<FindingRow> = findings
            .iter()
            .map(|f| {
                let scored = assess(f, now, oracle);
                FindingRow {
                    id: f.id.clone(),
                    finding: f.finding.clone(),
                    status: scored.tier,
                    confidence: scored.confidence,
                    days_old: ((now - f.base_timestamp()) / SECONDS_PER_DAY).floor() as i64,
                    scope: f.subject.clone(),
                    file_changed: f.subject.as_ref().map(|_| scored.file_changed),
                }
            })
            .collect();
        for row in &rows {
            let extra = match row.status {
                StalenessTier::Fresh => String::new(),
                StalenessTier::Aging => format!(" [{}d]", row.days_old),
                StalenessTier::Stale if row.file_changed == Some(true) => {
                    format!(" [stale: {}d] [file changed]", row.days_old)
                }
                StalenessTier::Stale => format!(" [stale: {}d]", row.days_old),
            };
            writeln!(out, "  {} {}{extra}", row.status.marker(), row.finding)?;
            if let Some(scope) = &row.scope {
                writeln!(out, "    scope: {scope}")?;
            }
        }
        response.findings_count = Some(rows.len());
        response.findings = Some(rows);
    }

    if args.show_unknowns() {
        let unknowns = match text {
            Some(t) => breadcrumbs::find_unknowns_by_text(&app.conn, Some(&project.id), t)?,
            None => breadcrumbs::list_unknowns(&app.conn, Some(&project.id), None, Some(false), limit)?,
        };
        writeln!(out, "\n? OPEN QUESTIONS ({}):", unknowns.len())?;
        if unknowns.is_empty() {
            writeln!(out, "  (none)")?;
        }
        for u in &unknowns {
            writeln!(out, "  • {}", u.unknown)?;
            if let Some(scope) = &u.subject {
                writeln!(out, "    scope: {scope}")?;
            }
        }
        let rows: Vec<UnknownRow> = unknowns
            .into_iter()
            .map(|u| UnknownRow {
                id: u.id,
                unknown: u.unknown,
                scope: u.subject,
            })
            .collect();
        response.unknowns_count = Some(rows.len());
        response.unknowns = Some(rows);
    }

    if args.show_dead_ends() {
        let dead_ends = match text {
            Some(t) => breadcrumbs::find_dead_ends_by_text(&app.conn, Some(&project.id), t, limit)?,
            None => breadcrumbs::list_dead_ends(&app.conn, Some(&project.id), None, limit)?,
        };
        writeln!(out, "\n✗ DEAD ENDS ({}):", dead_ends.len())?;
        if dead_ends.is_empty() {
            writeln!(out, "  (none)")?;
        }
        for d in &dead_ends {
            writeln!(out, "  • {}", d.approach)?;
            writeln!(out, "    Why: {}", d.why_failed)?;
            if let Some(scope) = &d.subject {
                writeln!(out, "    scope: {scope}")?;
            }
        }
        let rows: Vec<DeadEndRow> = dead_ends
            .into_iter()
            .map(|d| DeadEndRow {
                id: d.id,
                approach: d.approach,
                why_failed: d.why_failed,
                scope: d.subject,
            })
            .collect();
        response.dead_ends_count = Some(rows.len());
        response.dead_ends = Some(rows);
    }

    Output::new(&response, out)
}

fn fuzzy(app: &App, project_id: &str, q: &str, args: &QueryArgs, limit: usize) -> Result<Output> {
    let project = Some(project_id);
    let mut items: Vec<SearchItem> = Vec::new();
    if args.show_findings() {
        let findings = breadcrumbs::list_findings(&app.conn, project, None, FUZZY_POOL)?;
        items.extend(findings.iter().map(SearchItem::from));
    }
    if args.show_unknowns() {
        let unknowns = breadcrumbs::list_unknowns(&app.conn, project, None, Some(false), FUZZY_POOL)?;
        items.extend(unknowns.iter().map(SearchItem::from));
    }
    if args.show_dead_ends() {
        let dead_ends = breadcrumbs::list_dead_ends(&app.conn, project, None, FUZZY_POOL)?;
        items.extend(dead_ends.iter().map(SearchItem::from));
    }

    let threshold = args.threshold.unwrap_or(app.config.query.fuzzy_threshold);
    let mut results = fuzzy_search(q, &items, threshold);
    results.truncate(limit);

    let mut out = String::new();
    writeln!(out, "Fuzzy Search: \"{q}\"")?;
    writeln!(out, "{}", rule())?;
    if results.is_empty() {
        writeln!(out, "No matches found.")?;
    } else {
        writeln!(out, "\nFound {} match(es):\n", results.len())?;
    }
    for r in &results {
        let (icon, label) = match r.item.kind {
            BreadcrumbKind::Finding => ("✓", "FINDING"),
            BreadcrumbKind::Unknown => ("?", "QUESTION"),
            BreadcrumbKind::DeadEnd => ("✗", "DEAD END"),
        };
        let stars = ((r.score * 5.0) as usize).clamp(1, 5);
        writeln!(out, "  {icon} [{label}] {}{}", "★".repeat(stars), "☆".repeat(5 - stars))?;
        writeln!(out, "    {}", r.item.text)?;
        if !r.item.secondary_text.is_empty() {
            writeln!(out, "    Why: {}", r.item.secondary_text)?;
        }
        if !r.item.scope.is_empty() {
            writeln!(out, "    scope: {}", r.item.scope)?;
        }
        writeln!(out)?;
    }

    Output::new(
        &FuzzyResponse {
            query: q,
            count: results.len(),
            results,
        },
        out,
    )
}
