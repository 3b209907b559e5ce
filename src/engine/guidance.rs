//! Decision guidance: what the agent should do right now, and which findings
//! it can rely on.

use serde::Serialize;

use super::decay::{assess, SECONDS_PER_DAY};
use super::oracle::FileChangeOracle;
use super::state::EpistemicState;
use crate::model::types::{DeadEnd, Finding, StalenessTier, Unknown};
use crate::model::vectors::{Action, ConfidencePhase, KNOW_MIN};

/// Structured guidance keyed by the recommended action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Guidance {
    pub ready_to_proceed: bool,
    pub action: Action,
    pub reason: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub prerequisites: Vec<String>,
    /// Display marker for [`Self::phase`].
    pub confidence_phase: String,
    pub phase: ConfidencePhase,
    pub confidence: f64,
}

/// A stale finding that should be re-checked before use.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationNeeded {
    pub finding: String,
    pub id: String,
    /// Whole days since last verification.
    pub days_stale: i64,
    pub confidence: f64,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub file_changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    pub verify_command: String,
}

/// A fresh or aging finding usable as-is.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnowledgeItem {
    pub finding: String,
    pub confidence: f64,
    pub status: StalenessTier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Findings split by staleness tier.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FindingPartition {
    pub requires_verification: Vec<VerificationNeeded>,
    pub knowledge: Vec<KnowledgeItem>,
}

/// Stale findings go to verification; fresh and aging ones to knowledge.
/// Input order is preserved within each list.
pub fn partition_findings(
    findings: &[Finding],
    now: f64,
    oracle: &dyn FileChangeOracle,
) -> FindingPartition {
    let mut out = FindingPartition::default();
    for f in findings {
        let scored = assess(f, now, oracle);
        match scored.tier {
            StalenessTier::Stale => out.requires_verification.push(VerificationNeeded {
                finding: f.finding.clone(),
                id: f.id.clone(),
                days_stale: ((now - f.base_timestamp()) / SECONDS_PER_DAY).floor() as i64,
                confidence: scored.confidence,
                file_changed: scored.file_changed,
                scope: f.subject.clone(),
                verify_command: verify_command(f),
            }),
            StalenessTier::Fresh | StalenessTier::Aging => out.knowledge.push(KnowledgeItem {
                finding: f.finding.clone(),
                confidence: scored.confidence,
                status: scored.tier,
                scope: f.subject.clone(),
            }),
        }
    }
    out
}

/// `noetic verify --id <prefix>`, or by quoted text when the id is too short.
pub fn verify_command(finding: &Finding) -> String {
    match finding.id.get(..8) {
        Some(prefix) => format!("noetic verify --id {prefix}"),
        None => format!("noetic verify \"{}\"", truncate_text(&finding.finding, 30)),
    }
}

/// Truncate to at most `max_chars` characters, ending in `...` when cut.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// Build guidance for `state`. Templates are chosen by the recommended
/// action; counts come from the breadcrumb lists.
pub fn build_guidance(
    state: &EpistemicState,
    findings: &[Finding],
    open_unknowns: &[Unknown],
    dead_ends: &[DeadEnd],
    now: f64,
    oracle: &dyn FileChangeOracle,
) -> Guidance {
    let action = state.recommended_action();
    let mut prerequisites = Vec::new();

    let reason = match action {
        Action::Investigate => {
            if !open_unknowns.is_empty() {
                prerequisites.push(format!(
                    "Resolve {} open question(s)",
                    open_unknowns.len()
                ));
            }
            if state.know < KNOW_MIN {
                prerequisites.push("Log discoveries with `noetic learned`".to_string());
            }
            "Uncertainty is high or knowledge is low. Gather more information before acting."
                .to_string()
        }
        Action::Verify => {
            let stale = findings
                .iter()
                .filter(|f| assess(f, now, oracle).tier == StalenessTier::Stale)
                .count();
            prerequisites.push("Verify stale findings with `noetic verify`".to_string());
            format!("{stale} finding(s) may be outdated. Verify before relying on them.")
        }
        Action::Reset => {
            if !dead_ends.is_empty() {
                prerequisites.push(format!(
                    "Review {} dead end(s) to avoid repeating mistakes",
                    dead_ends.len()
                ));
            }
            "Too many failed approaches have reduced coherence. Consider a fresh approach."
                .to_string()
        }
        Action::Stop => {
            "Session engagement is too low. Consider taking a break or starting fresh.".to_string()
        }
        Action::Clarify => {
            "Information density is too high. Narrow the scope before continuing.".to_string()
        }
        Action::Proceed => {
            "Knowledge is fresh and uncertainty is manageable. Safe to proceed with the task."
                .to_string()
        }
    };

    let phase = state.phase();
    Guidance {
        ready_to_proceed: state.is_ready_to_proceed(),
        action,
        reason,
        prerequisites,
        confidence_phase: phase.marker().to_string(),
        phase,
        confidence: state.confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::oracle::{ChangeSnapshot, NeverChanged};
    use crate::engine::state::synthesize_state;

    const NOW: f64 = 1_800_000_000.0;
    const DAY: f64 = SECONDS_PER_DAY;

    fn finding(text: &str, days_old: f64) -> Finding {
        Finding::new("p", "s", text, 0.5, NOW - days_old * DAY)
    }

    fn state(know: f64, uncertainty: f64, clarity: f64, coherence: f64, engagement: f64) -> EpistemicState {
        EpistemicState {
            know,
            uncertainty,
            clarity,
            coherence,
            completion: 0.5,
            engagement,
            confidence: 0.55,
        }
    }

    #[test]
    fn partition_by_tier() {
        let findings = vec![finding("fresh", 0.0), finding("aging", 10.0), finding("stale", 30.0)];
        let p = partition_findings(&findings, NOW, &NeverChanged);
        assert_eq!(p.knowledge.len(), 2);
        assert_eq!(p.knowledge[0].status, StalenessTier::Fresh);
        assert_eq!(p.knowledge[1].status, StalenessTier::Aging);
        assert_eq!(p.requires_verification.len(), 1);
        let v = &p.requires_verification[0];
        assert_eq!(v.finding, "stale");
        assert_eq!(v.days_stale, 30);
        assert!(v.confidence < 0.40);
        assert!(v.verify_command.starts_with("noetic verify --id "));
        assert_eq!(v.verify_command.len(), "noetic verify --id ".len() + 8);
    }

    #[test]
    fn changed_file_flags_verification() {
        let mut f = finding("pool size is 10", 12.0);
        f.subject = Some("src/pool.rs".into());
        f.subject_hash = Some("aaa".into());
        let mut snap = ChangeSnapshot::new();
        snap.insert("src/pool.rs", "bbb");

        let p = partition_findings(&[f], NOW, &snap);
        assert_eq!(p.requires_verification.len(), 1);
        assert!(p.requires_verification[0].file_changed);
        assert_eq!(p.requires_verification[0].scope.as_deref(), Some("src/pool.rs"));
    }

    #[test]
    fn short_ids_verify_by_text() {
        let mut f = finding("a rather long finding about the auth token layer", 0.0);
        f.id = "abc".into();
        assert_eq!(verify_command(&f), "noetic verify \"a rather long finding about...\"");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_text("héllo wörld", 8), "héllo...");
        assert_eq!(truncate_text("short", 30), "short");
    }

    #[test]
    fn investigate_lists_prerequisites() {
        let open = vec![Unknown::new("p", "s", "q1", 0.5, NOW), Unknown::new("p", "s", "q2", 0.5, NOW)];
        let g = build_guidance(&state(0.4, 0.7, 0.8, 0.9, 0.9), &[], &open, &[], NOW, &NeverChanged);
        assert_eq!(g.action, Action::Investigate);
        assert!(!g.ready_to_proceed);
        assert_eq!(
            g.prerequisites,
            vec![
                "Resolve 2 open question(s)".to_string(),
                "Log discoveries with `noetic learned`".to_string()
            ]
        );
    }

    #[test]
    fn verify_counts_stale_findings() {
        let findings = vec![finding("a", 30.0), finding("b", 40.0), finding("c", 0.0)];
        let s = synthesize_state(&findings, &[], &[], &[], NOW, NOW, &NeverChanged);
        let g = build_guidance(&s, &findings, &[], &[], NOW, &NeverChanged);
        assert_eq!(g.action, Action::Verify);
        assert_eq!(g.reason, "2 finding(s) may be outdated. Verify before relying on them.");
        assert_eq!(g.prerequisites, vec!["Verify stale findings with `noetic verify`".to_string()]);
    }

    #[test]
    fn reset_mentions_dead_ends() {
        let dead = vec![DeadEnd::new("p", "s", "x", "y", 0.5, NOW)];
        let g = build_guidance(&state(0.8, 0.2, 0.8, 0.3, 0.9), &[], &[], &dead, NOW, &NeverChanged);
        assert_eq!(g.action, Action::Reset);
        assert_eq!(g.prerequisites, vec!["Review 1 dead end(s) to avoid repeating mistakes".to_string()]);
    }

    #[test]
    fn stop_and_proceed_templates() {
        let g = build_guidance(&state(0.8, 0.2, 0.8, 0.9, 0.1), &[], &[], &[], NOW, &NeverChanged);
        assert_eq!(g.action, Action::Stop);
        assert!(g.reason.contains("engagement is too low"));
        assert!(g.prerequisites.is_empty());

        let g = build_guidance(&state(0.8, 0.2, 0.8, 0.9, 0.9), &[], &[], &[], NOW, &NeverChanged);
        assert_eq!(g.action, Action::Proceed);
        assert!(g.ready_to_proceed);
        assert_eq!(g.phase, ConfidencePhase::Moderate);
        assert_eq!(g.confidence_phase, "🌓");
    }
}
