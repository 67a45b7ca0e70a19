//! Beta-distribution trust math: the posterior estimate backing
//! `Pattern::trust_score` and the ranker's Trust sub-score.

const WILSON_Z: f64 = 1.96;
const WILSON_DEFAULT: f64 = 0.3;

/// Deterministic posterior estimate for trust, given Beta(α, β) parameters.
///
/// This is the Wilson score lower bound treating `alpha` as successes and
/// `alpha + beta` as the number of observations — a conservative point
/// estimate that widens its penalty for small sample counts. Used both as
/// `Pattern::trust_score` (invariant: `0 ≤ trust_score ≤ 1`, pure function
/// of α/β) and as the ranker's Trust sub-score input (§4.6).
pub fn trust_score(alpha: f64, beta: f64) -> f64 {
    wilson_lower_bound(alpha, beta).clamp(0.0, 1.0)
}

/// Wilson score lower bound. Returns the configured default (0.3) when
/// there are no observations (`alpha + beta == 0`), matching the ranker's
/// documented fallback for freshly-minted patterns.
pub fn wilson_lower_bound(successes: f64, failures: f64) -> f64 {
    let n = successes + failures;
    if n <= 0.0 {
        return WILSON_DEFAULT;
    }
    let phat = successes / n;
    let z2 = WILSON_Z * WILSON_Z;

    let numerator = phat + z2 / (2.0 * n)
        - WILSON_Z * ((phat * (1.0 - phat) + z2 / (4.0 * n)) / n).sqrt();
    let denominator = 1.0 + z2 / n;

    (numerator / denominator).clamp(0.0, 1.0)
}

/// Outcome tag → (Δα, Δβ) mapping (§4.5 step 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    WorkedPerfectly,
    WorkedWithTweaks,
    PartialSuccess,
    FailedMinorIssues,
    FailedCompletely,
}

impl Outcome {
    pub fn deltas(self) -> (f64, f64) {
        match self {
            Outcome::WorkedPerfectly => (1.0, 0.0),
            Outcome::WorkedWithTweaks => (0.7, 0.3),
            Outcome::PartialSuccess => (0.5, 0.5),
            Outcome::FailedMinorIssues => (0.3, 0.7),
            Outcome::FailedCompletely => (0.0, 1.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wilson_matches_worked_example() {
        // spec.md §8 scenario 2: alpha=18, beta=3 => wilson ~= 0.654, points = round(30*w) = 20
        let w = wilson_lower_bound(18.0, 3.0);
        assert!((w - 0.6536).abs() < 0.001, "got {w}");
        let points = (30.0 * w).round() as i64;
        assert_eq!(points, 20);
    }

    #[test]
    fn wilson_default_for_no_observations() {
        assert_eq!(wilson_lower_bound(0.0, 0.0), 0.3);
    }

    #[test]
    fn trust_score_is_bounded() {
        for (a, b) in [(1.0, 1.0), (100.0, 1.0), (1.0, 100.0), (0.0, 0.0)] {
            let t = trust_score(a, b);
            assert!((0.0..=1.0).contains(&t));
        }
    }

    #[test]
    fn outcome_expansion_partial_success() {
        assert_eq!(Outcome::PartialSuccess.deltas(), (0.5, 0.5));
    }

    proptest::proptest! {
        #[test]
        fn trust_score_always_bounded(a in 0.0f64..1000.0, b in 0.0f64..1000.0) {
            let t = trust_score(a, b);
            proptest::prop_assert!((0.0..=1.0).contains(&t));
        }
    }
}
