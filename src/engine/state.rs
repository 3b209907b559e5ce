//! Session epistemic-state synthesis.
//!
//! Derives a coarse [`EpistemicState`] from breadcrumb counts and elapsed
//! time. This is calibrated separately from the 13-vector model in
//! [`crate::model::vectors`]; the two are never merged.

use serde::Serialize;

use super::decay::assess;
use super::oracle::FileChangeOracle;
use crate::model::types::{DeadEnd, Finding, StalenessTier, Unknown};
use crate::model::vectors::{
    Action, ConfidencePhase, ConfidenceSource, COHERENCE_MIN, ENGAGEMENT_THRESHOLD, KNOW_MIN,
    UNCERTAINTY_MAX,
};

/// Session engagement halves every two hours.
pub const ENGAGEMENT_HALF_LIFE_HOURS: f64 = 2.0;
/// Engagement never decays below this.
pub const ENGAGEMENT_FLOOR: f64 = 0.1;
/// Clarity below this recommends verification.
pub const CLARITY_MIN: f64 = 0.40;

const NEUTRAL: f64 = 0.5;

/// Derived, never persisted. Recompute on every call since finding confidence
/// decays with wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EpistemicState {
    pub know: f64,
    pub uncertainty: f64,
    pub clarity: f64,
    pub coherence: f64,
    pub completion: f64,
    pub engagement: f64,
    pub confidence: f64,
}

impl EpistemicState {
    pub fn passes_engagement_gate(&self) -> bool {
        self.engagement >= ENGAGEMENT_THRESHOLD
    }

    pub fn is_ready_to_proceed(&self) -> bool {
        self.passes_engagement_gate()
            && self.know >= KNOW_MIN
            && self.uncertainty <= UNCERTAINTY_MAX
    }

    pub fn needs_investigation(&self) -> bool {
        self.know < KNOW_MIN || self.uncertainty > UNCERTAINTY_MAX
    }

    /// Priority chain: stop, reset, verify, investigate, proceed.
    pub fn recommended_action(&self) -> Action {
        if !self.passes_engagement_gate() {
            Action::Stop
        } else if self.coherence < COHERENCE_MIN {
            Action::Reset
        } else if self.clarity < CLARITY_MIN {
            Action::Verify
        } else if self.needs_investigation() {
            Action::Investigate
        } else {
            Action::Proceed
        }
    }

    pub fn phase(&self) -> ConfidencePhase {
        ConfidencePhase::from_confidence(self.confidence)
    }
}

impl ConfidenceSource for EpistemicState {
    fn confidence(&self) -> f64 {
        self.confidence
    }

    fn ready_to_proceed(&self) -> bool {
        self.is_ready_to_proceed()
    }

    fn action(&self) -> Action {
        self.recommended_action()
    }
}

/// Engagement after `elapsed_hours`, in `[ENGAGEMENT_FLOOR, 1.0]`.
pub fn engagement_after(elapsed_hours: f64) -> f64 {
    let lambda = std::f64::consts::LN_2 / ENGAGEMENT_HALF_LIFE_HOURS;
    (-lambda * elapsed_hours).exp().clamp(ENGAGEMENT_FLOOR, 1.0)
}

/// Synthesize state from the current breadcrumb population.
///
/// `session_start` and `now` are Unix seconds. Every ratio has an explicit
/// fallback so empty history never divides by zero.
pub fn synthesize_state(
    findings: &[Finding],
    open_unknowns: &[Unknown],
    resolved_unknowns: &[Unknown],
    dead_ends: &[DeadEnd],
    session_start: f64,
    now: f64,
    oracle: &dyn FileChangeOracle,
) -> EpistemicState {
    let n_findings = findings.len() as f64;
    let n_open = open_unknowns.len() as f64;
    let n_resolved = resolved_unknowns.len() as f64;
    let n_dead = dead_ends.len() as f64;

    let know = (0.5 + 0.1 * n_findings + 0.15 * n_resolved).clamp(0.0, 1.0);
    let uncertainty = (0.5 + 0.1 * n_open - 0.1 * n_resolved).clamp(0.0, 1.0);

    let clarity = if findings.is_empty() {
        NEUTRAL
    } else {
        let fresh = findings
            .iter()
            .filter(|f| assess(f, now, oracle).tier == StalenessTier::Fresh)
            .count();
        fresh as f64 / n_findings
    };

    let total = n_findings + n_open + n_resolved + n_dead;
    let coherence = if total > 0.0 { 1.0 - n_dead / total } else { 1.0 };

    let unknowns = n_open + n_resolved;
    let completion = if unknowns > 0.0 {
        n_resolved / unknowns
    } else {
        NEUTRAL
    };

    let engagement = engagement_after((now - session_start) / 3600.0);

    let confidence = (0.30 * know + 0.20 * clarity + 0.20 * coherence + 0.15 * completion
        + 0.15 * engagement
        - 0.15 * uncertainty)
        .clamp(0.0, 1.0);

    EpistemicState {
        know,
        uncertainty,
        clarity,
        coherence,
        completion,
        engagement,
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::decay::SECONDS_PER_DAY;
    use crate::engine::oracle::{ChangeSnapshot, NeverChanged};

    const EPS: f64 = 1e-3;
    const NOW: f64 = 1_800_000_000.0;

    fn finding_aged(days: f64) -> Finding {
        Finding::new("p", "s", "fact", 0.5, NOW - days * SECONDS_PER_DAY)
    }

    fn unknown(resolved: bool) -> Unknown {
        let mut u = Unknown::new("p", "s", "q", 0.5, NOW);
        u.is_resolved = resolved;
        u
    }

    #[test]
    fn empty_history_is_neutral() {
        let s = synthesize_state(&[], &[], &[], &[], NOW, NOW, &NeverChanged);
        assert_eq!(s.know, 0.5);
        assert_eq!(s.uncertainty, 0.5);
        assert_eq!(s.clarity, 0.5);
        assert_eq!(s.coherence, 1.0);
        assert_eq!(s.completion, 0.5);
        assert_eq!(s.engagement, 1.0);
        assert!(s.confidence >= 0.0 && s.confidence <= 1.0);
        // 0.15 + 0.1 + 0.2 + 0.075 + 0.15 - 0.075
        assert!((s.confidence - 0.6).abs() < 1e-9);
        assert_eq!(s.recommended_action(), Action::Proceed);
    }

    #[test]
    fn mixed_session_recommends_proceed() {
        let findings = vec![finding_aged(0.0), finding_aged(1.0), finding_aged(30.0)];
        let open = vec![unknown(false), unknown(false)];
        let resolved = vec![unknown(true), unknown(true), unknown(true)];
        let dead = vec![DeadEnd::new("p", "s", "a", "b", 0.5, NOW)];

        let s = synthesize_state(&findings, &open, &resolved, &dead, NOW - 3600.0, NOW, &NeverChanged);
        assert!((s.know - 1.0).abs() < EPS);
        assert!((s.uncertainty - 0.4).abs() < EPS);
        assert!((s.coherence - 0.889).abs() < EPS);
        assert!((s.completion - 0.6).abs() < EPS);
        assert!((s.engagement - 0.707).abs() < EPS);
        assert!((s.clarity - 0.667).abs() < EPS);
        assert!(!s.needs_investigation());
        assert!(s.is_ready_to_proceed());
        assert_eq!(s.recommended_action(), Action::Proceed);
    }

    #[test]
    fn engagement_floor_and_ceiling() {
        assert_eq!(engagement_after(100.0), ENGAGEMENT_FLOOR);
        assert_eq!(engagement_after(-5.0), 1.0);
        assert!((engagement_after(2.0) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn stale_knowledge_recommends_verify() {
        let findings = vec![finding_aged(30.0), finding_aged(40.0), finding_aged(0.0)];
        let s = synthesize_state(&findings, &[], &[], &[], NOW, NOW, &NeverChanged);
        assert!(s.clarity < CLARITY_MIN);
        assert_eq!(s.recommended_action(), Action::Verify);
    }

    #[test]
    fn changed_files_reduce_clarity() {
        let mut f = finding_aged(0.0);
        f.subject = Some("src/lib.rs".into());
        f.subject_hash = Some("old".into());
        let mut snap = ChangeSnapshot::new();
        snap.insert("src/lib.rs", "new");

        let unchanged = synthesize_state(&[f.clone()], &[], &[], &[], NOW, NOW, &NeverChanged);
        let changed = synthesize_state(&[f], &[], &[], &[], NOW, NOW, &snap);
        assert_eq!(unchanged.clarity, 1.0);
        assert_eq!(changed.clarity, 0.0);
    }

    #[test]
    fn many_dead_ends_recommend_reset() {
        let dead: Vec<_> = (0..5)
            .map(|i| DeadEnd::new("p", "s", &format!("try {i}"), "no", 0.5, NOW))
            .collect();
        let findings = vec![finding_aged(0.0)];
        let s = synthesize_state(&findings, &[], &[], &dead, NOW, NOW, &NeverChanged);
        assert!(s.coherence < COHERENCE_MIN);
        assert_eq!(s.recommended_action(), Action::Reset);
    }

    #[test]
    fn stale_session_stops_even_when_incoherent() {
        let dead: Vec<_> = (0..5)
            .map(|_| DeadEnd::new("p", "s", "x", "y", 0.5, NOW))
            .collect();
        let s = synthesize_state(&[], &[], &[], &dead, NOW - 10.0 * 3600.0, NOW, &NeverChanged);
        assert!(!s.passes_engagement_gate());
        assert_eq!(s.recommended_action(), Action::Stop);
    }

    #[test]
    fn confidence_stays_in_range_for_extremes() {
        let findings: Vec<_> = (0..1000).map(|_| finding_aged(100.0)).collect();
        let open: Vec<_> = (0..1000).map(|_| unknown(false)).collect();
        let dead: Vec<_> = (0..1000)
            .map(|_| DeadEnd::new("p", "s", "x", "y", 0.5, NOW))
            .collect();
        let s = synthesize_state(&findings, &open, &[], &dead, NOW + 3600.0, NOW, &NeverChanged);
        assert!((0.0..=1.0).contains(&s.confidence));
        assert!((0.0..=1.0).contains(&s.engagement));
    }

    #[test]
    fn too_many_open_questions_recommend_investigate() {
        let open: Vec<_> = (0..3).map(|_| unknown(false)).collect();
        let s = synthesize_state(&[], &open, &[], &[], NOW, NOW, &NeverChanged);
        assert!((s.uncertainty - 0.8).abs() < 1e-9);
        assert_eq!(s.recommended_action(), Action::Investigate);
    }
}
