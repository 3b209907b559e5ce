//! The 13-dimension epistemic vector model.
//!
//! An [`EpistemicVectors`] value is an agent's explicit self-assessment,
//! submitted at checkpoints (preflight, check, postflight). Scores aggregate
//! into three tiers plus an engagement gate and an uncertainty penalty.

use serde::{Deserialize, Serialize};

/// Minimum engagement required before any other recommendation applies.
pub const ENGAGEMENT_THRESHOLD: f64 = 0.60;
/// `know` at or above this counts as sufficient knowledge.
pub const KNOW_MIN: f64 = 0.50;
/// `uncertainty` above this calls for investigation.
pub const UNCERTAINTY_MAX: f64 = 0.50;
/// `coherence` below this calls for a reset.
pub const COHERENCE_MIN: f64 = 0.50;
/// `density` above this means information overload.
pub const DENSITY_MAX: f64 = 0.90;

pub const FOUNDATION_WEIGHT: f64 = 0.35;
pub const COMPREHENSION_WEIGHT: f64 = 0.25;
pub const EXECUTION_WEIGHT: f64 = 0.25;
pub const ENGAGEMENT_WEIGHT: f64 = 0.15;
pub const UNCERTAINTY_PENALTY: f64 = 0.15;

/// All 13 dimension names in canonical order.
pub const FIELD_NAMES: [&str; 13] = [
    "engagement",
    "know",
    "do",
    "context",
    "clarity",
    "coherence",
    "signal",
    "density",
    "state",
    "change",
    "completion",
    "impact",
    "uncertainty",
];

/// A 13-dimension epistemic snapshot. Absent fields deserialize as `0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EpistemicVectors {
    /// Gate dimension.
    pub engagement: f64,

    // Foundation
    pub know: f64,
    #[serde(rename = "do")]
    pub do_: f64,
    pub context: f64,

    // Comprehension
    pub clarity: f64,
    pub coherence: f64,
    pub signal: f64,
    /// High means overload.
    pub density: f64,

    // Execution
    pub state: f64,
    pub change: f64,
    pub completion: f64,
    pub impact: f64,

    /// Explicit doubt; lower is better.
    pub uncertainty: f64,
}

impl EpistemicVectors {
    /// Moderate starting point: every dimension 0.5 except `completion` at 0.0.
    pub fn neutral() -> Self {
        Self {
            engagement: 0.5,
            know: 0.5,
            do_: 0.5,
            context: 0.5,
            clarity: 0.5,
            coherence: 0.5,
            signal: 0.5,
            density: 0.5,
            state: 0.5,
            change: 0.5,
            completion: 0.0,
            impact: 0.5,
            uncertainty: 0.5,
        }
    }

    pub fn foundation_score(&self) -> f64 {
        (self.know + self.do_ + self.context) / 3.0
    }

    pub fn comprehension_score(&self) -> f64 {
        (self.clarity + self.coherence + self.signal + self.density) / 4.0
    }

    pub fn execution_score(&self) -> f64 {
        (self.state + self.change + self.completion + self.impact) / 4.0
    }

    /// Weighted tier sum plus engagement, minus the uncertainty penalty,
    /// clamped to `[0, 1]`.
    pub fn overall_confidence(&self) -> f64 {
        let base = FOUNDATION_WEIGHT * self.foundation_score()
            + COMPREHENSION_WEIGHT * self.comprehension_score()
            + EXECUTION_WEIGHT * self.execution_score()
            + ENGAGEMENT_WEIGHT * self.engagement;
        (base - UNCERTAINTY_PENALTY * self.uncertainty).clamp(0.0, 1.0)
    }

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

    /// Priority chain: stop, reset, clarify, investigate, proceed.
    pub fn recommended_action(&self) -> Action {
        if !self.passes_engagement_gate() {
            Action::Stop
        } else if self.coherence < COHERENCE_MIN {
            Action::Reset
        } else if self.density > DENSITY_MAX {
            Action::Clarify
        } else if self.needs_investigation() {
            Action::Investigate
        } else {
            Action::Proceed
        }
    }

    /// Component-wise `self - other`.
    pub fn delta(&self, other: &Self) -> Self {
        let a = self.fields();
        let b = other.fields();
        let mut out = [0.0; 13];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = a[i] - b[i];
        }
        Self::from_fields(out)
    }

    /// Values in [`FIELD_NAMES`] order.
    pub fn fields(&self) -> [f64; 13] {
        [
            self.engagement,
            self.know,
            self.do_,
            self.context,
            self.clarity,
            self.coherence,
            self.signal,
            self.density,
            self.state,
            self.change,
            self.completion,
            self.impact,
            self.uncertainty,
        ]
    }

    /// Inverse of [`Self::fields`].
    pub fn from_fields(v: [f64; 13]) -> Self {
        Self {
            engagement: v[0],
            know: v[1],
            do_: v[2],
            context: v[3],
            clarity: v[4],
            coherence: v[5],
            signal: v[6],
            density: v[7],
            state: v[8],
            change: v[9],
            completion: v[10],
            impact: v[11],
            uncertainty: v[12],
        }
    }

    /// `(name, value)` pairs in canonical order.
    pub fn named(&self) -> impl Iterator<Item = (&'static str, f64)> {
        FIELD_NAMES.into_iter().zip(self.fields())
    }
}

/// Recommended next step for the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Proceed,
    Investigate,
    Clarify,
    Verify,
    Reset,
    Stop,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Proceed => "proceed",
            Self::Investigate => "investigate",
            Self::Clarify => "clarify",
            Self::Verify => "verify",
            Self::Reset => "reset",
            Self::Stop => "stop",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Five fixed confidence bands, each with a display marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidencePhase {
    Critical,
    Low,
    Moderate,
    Good,
    Excellent,
}

impl ConfidencePhase {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence < 0.25 {
            Self::Critical
        } else if confidence < 0.50 {
            Self::Low
        } else if confidence < 0.75 {
            Self::Moderate
        } else if confidence < 0.90 {
            Self::Good
        } else {
            Self::Excellent
        }
    }

    pub fn marker(&self) -> &'static str {
        match self {
            Self::Critical => "🌑",
            Self::Low => "🌒",
            Self::Moderate => "🌓",
            Self::Good => "🌔",
            Self::Excellent => "🌕",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::Good => "good",
            Self::Excellent => "excellent",
        }
    }
}

/// The shape shared by both scoring paths when a single surface needs to
/// show either one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConfidenceSummary {
    pub confidence: f64,
    pub phase: ConfidencePhase,
    pub ready_to_proceed: bool,
    pub action: Action,
}

/// A scoring strategy that can be summarized for presentation.
///
/// Implemented by [`EpistemicVectors`] (explicit self-assessment) and by
/// [`crate::engine::state::EpistemicState`] (breadcrumb-derived proxy). The
/// two are calibrated independently.
pub trait ConfidenceSource {
    fn confidence(&self) -> f64;
    fn ready_to_proceed(&self) -> bool;
    fn action(&self) -> Action;

    fn summary(&self) -> ConfidenceSummary {
        let confidence = self.confidence();
        ConfidenceSummary {
            confidence,
            phase: ConfidencePhase::from_confidence(confidence),
            ready_to_proceed: self.ready_to_proceed(),
            action: self.action(),
        }
    }
}

impl ConfidenceSource for EpistemicVectors {
    fn confidence(&self) -> f64 {
        self.overall_confidence()
    }

    fn ready_to_proceed(&self) -> bool {
        self.is_ready_to_proceed()
    }

    fn action(&self) -> Action {
        self.recommended_action()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn ready() -> EpistemicVectors {
        EpistemicVectors {
            engagement: 0.8,
            know: 0.7,
            coherence: 0.7,
            density: 0.5,
            uncertainty: 0.3,
            ..EpistemicVectors::neutral()
        }
    }

    #[test]
    fn tier_scores_are_means() {
        let v = EpistemicVectors {
            know: 0.3,
            do_: 0.6,
            context: 0.9,
            clarity: 0.4,
            coherence: 0.4,
            signal: 0.8,
            density: 0.8,
            state: 1.0,
            change: 0.0,
            completion: 0.5,
            impact: 0.5,
            ..Default::default()
        };
        assert!((v.foundation_score() - 0.6).abs() < EPS);
        assert!((v.comprehension_score() - 0.6).abs() < EPS);
        assert!((v.execution_score() - 0.5).abs() < EPS);
    }

    #[test]
    fn overall_confidence_weights() {
        let v = EpistemicVectors::from_fields([1.0; 13]);
        // 0.35 + 0.25 + 0.25 + 0.15 - 0.15
        assert!((v.overall_confidence() - 0.85).abs() < EPS);
    }

    #[test]
    fn overall_confidence_is_clamped() {
        let high = EpistemicVectors::from_fields([10.0; 13]);
        assert_eq!(high.overall_confidence(), 1.0);

        let low = EpistemicVectors {
            uncertainty: 5.0,
            ..Default::default()
        };
        assert_eq!(low.overall_confidence(), 0.0);
    }

    #[test]
    fn engagement_gate_is_inclusive() {
        let mut v = ready();
        v.engagement = 0.60;
        assert!(v.passes_engagement_gate());
        v.engagement = 0.5999;
        assert!(!v.passes_engagement_gate());
        assert!(!v.is_ready_to_proceed());
    }

    #[test]
    fn stop_dominates_reset() {
        let v = EpistemicVectors {
            engagement: 0.2,
            coherence: 0.1,
            density: 0.95,
            ..ready()
        };
        assert_eq!(v.recommended_action(), Action::Stop);
    }

    #[test]
    fn action_priority_chain() {
        let mut v = ready();
        assert_eq!(v.recommended_action(), Action::Proceed);

        v.know = 0.4;
        assert_eq!(v.recommended_action(), Action::Investigate);

        v.density = 0.95;
        assert_eq!(v.recommended_action(), Action::Clarify);

        v.coherence = 0.3;
        assert_eq!(v.recommended_action(), Action::Reset);
    }

    #[test]
    fn delta_of_self_is_zero() {
        let v = ready();
        assert_eq!(v.delta(&v).fields(), [0.0; 13]);
    }

    #[test]
    fn delta_is_componentwise() {
        let post = EpistemicVectors {
            know: 0.9,
            uncertainty: 0.2,
            ..Default::default()
        };
        let pre = EpistemicVectors {
            know: 0.4,
            uncertainty: 0.6,
            ..Default::default()
        };
        let d = post.delta(&pre);
        assert!((d.know - 0.5).abs() < EPS);
        assert!((d.uncertainty + 0.4).abs() < EPS);
        assert_eq!(d.engagement, 0.0);
    }

    #[test]
    fn serde_uses_do_and_defaults_missing_to_zero() {
        let v: EpistemicVectors = serde_json::from_str(r#"{"know":0.8,"do":0.6}"#).unwrap();
        assert_eq!(v.know, 0.8);
        assert_eq!(v.do_, 0.6);
        assert_eq!(v.engagement, 0.0);
        assert_eq!(v.uncertainty, 0.0);

        let json = serde_json::to_value(ready()).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 13);
        for name in FIELD_NAMES {
            assert!(obj.contains_key(name), "missing {name}");
        }
    }

    #[test]
    fn phase_bands() {
        assert_eq!(ConfidencePhase::from_confidence(0.0), ConfidencePhase::Critical);
        assert_eq!(ConfidencePhase::from_confidence(0.25), ConfidencePhase::Low);
        assert_eq!(ConfidencePhase::from_confidence(0.5), ConfidencePhase::Moderate);
        assert_eq!(ConfidencePhase::from_confidence(0.75), ConfidencePhase::Good);
        assert_eq!(ConfidencePhase::from_confidence(0.9), ConfidencePhase::Excellent);
        assert_eq!(ConfidencePhase::Excellent.marker(), "🌕");
    }

    #[test]
    fn summary_reflects_vector_model() {
        let s = ready().summary();
        assert_eq!(s.action, Action::Proceed);
        assert!(s.ready_to_proceed);
        assert_eq!(s.phase, ConfidencePhase::from_confidence(s.confidence));
    }
}
