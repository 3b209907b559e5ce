//! Time-decay confidence for findings.
//!
//! Confidence halves every [`HALF_LIFE_DAYS`] from the finding's base
//! timestamp (last verification, else creation). A changed subject file
//! multiplies the result by [`FILE_CHANGE_PENALTY`]. The tier is taken from the
//! penalized value.

use serde::Serialize;

use super::oracle::{finding_file_changed, FileChangeOracle};
use crate::model::types::{Finding, StalenessTier};

pub const HALF_LIFE_DAYS: f64 = 14.0;
pub const FILE_CHANGE_PENALTY: f64 = 0.5;
pub const FRESH_THRESHOLD: f64 = 0.70;
pub const AGING_THRESHOLD: f64 = 0.40;
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Decayed confidence in `(0, 1]`. Future base timestamps clamp to `1.0`.
pub fn decayed_confidence(base_timestamp: f64, now: f64, file_changed: bool) -> f64 {
    let days = (now - base_timestamp) / SECONDS_PER_DAY;
    let lambda = std::f64::consts::LN_2 / HALF_LIFE_DAYS;
    let confidence = (-lambda * days).exp().min(1.0);
    if file_changed {
        confidence * FILE_CHANGE_PENALTY
    } else {
        confidence
    }
}

/// Inclusive lower bounds: `0.70` is fresh, `0.40` is aging.
pub fn tier_for(confidence: f64) -> StalenessTier {
    if confidence >= FRESH_THRESHOLD {
        StalenessTier::Fresh
    } else if confidence >= AGING_THRESHOLD {
        StalenessTier::Aging
    } else {
        StalenessTier::Stale
    }
}

/// A finding's confidence and tier at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FindingConfidence {
    pub confidence: f64,
    pub tier: StalenessTier,
    pub file_changed: bool,
}

/// Score a finding whose file-change status is already known.
pub fn compute_confidence(finding: &Finding, now: f64, file_changed: bool) -> FindingConfidence {
    let confidence = decayed_confidence(finding.base_timestamp(), now, file_changed);
    FindingConfidence {
        confidence,
        tier: tier_for(confidence),
        file_changed,
    }
}

/// Score a finding, asking `oracle` about its subject file.
pub fn assess(finding: &Finding, now: f64, oracle: &dyn FileChangeOracle) -> FindingConfidence {
    compute_confidence(finding, now, finding_file_changed(finding, oracle))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;
    const DAY: f64 = SECONDS_PER_DAY;

    #[test]
    fn fresh_at_creation() {
        assert!((decayed_confidence(1000.0, 1000.0, false) - 1.0).abs() < EPS);
    }

    #[test]
    fn half_at_half_life() {
        let c = decayed_confidence(0.0, 14.0 * DAY, false);
        assert!((c - 0.5).abs() < EPS);
    }

    #[test]
    fn strictly_decreasing() {
        let mut prev = decayed_confidence(0.0, 0.0, false);
        for d in 1..60 {
            let c = decayed_confidence(0.0, d as f64 * DAY, false);
            assert!(c < prev, "day {d}: {c} !< {prev}");
            prev = c;
        }
    }

    #[test]
    fn file_change_halves_confidence() {
        for days in [0.0, 3.5, 14.0, 40.0] {
            let plain = decayed_confidence(0.0, days * DAY, false);
            let changed = decayed_confidence(0.0, days * DAY, true);
            assert!((changed - plain * 0.5).abs() < EPS);
        }
    }

    #[test]
    fn future_timestamp_clamps_to_one() {
        let c = decayed_confidence(10.0 * DAY, 0.0, false);
        assert_eq!(c, 1.0);
        assert_eq!(tier_for(c), StalenessTier::Fresh);
    }

    #[test]
    fn tier_boundaries() {
        assert_eq!(tier_for(0.70), StalenessTier::Fresh);
        assert_eq!(tier_for(0.6999), StalenessTier::Aging);
        assert_eq!(tier_for(0.40), StalenessTier::Aging);
        assert_eq!(tier_for(0.3999), StalenessTier::Stale);
    }

    #[test]
    fn changed_fresh_finding_lands_in_aging() {
        // ~0.95 before the penalty, ~0.475 after
        let days = -(0.95f64.ln()) * HALF_LIFE_DAYS / std::f64::consts::LN_2;
        let f = Finding::new("p", "s", "t", 0.5, 0.0);
        let scored = compute_confidence(&f, days * DAY, true);
        assert_eq!(scored.tier, StalenessTier::Aging);
        assert!((scored.confidence - 0.475).abs() < 1e-6);
    }

    #[test]
    fn verification_resets_decay() {
        let mut f = Finding::new("p", "s", "t", 0.5, 0.0);
        assert_eq!(compute_confidence(&f, 30.0 * DAY, false).tier, StalenessTier::Stale);
        f.last_verified_timestamp = Some(29.0 * DAY);
        assert_eq!(compute_confidence(&f, 30.0 * DAY, false).tier, StalenessTier::Fresh);
    }
}
