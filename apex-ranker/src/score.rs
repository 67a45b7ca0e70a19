//! The five linear sub-scores of spec.md §4.6: Scope, Trust, Freshness,
//! Locality, Policy. Each function returns `(points, raw, rationale)` so
//! the caller can assemble a `SubScoreExplain` without recomputing.

use chrono::{DateTime, Utc};
use globset::Glob;

use apex_core::pattern::{Facets, Pattern, PatternType};

use crate::signals::{FrameworkSignal, RankSignals};

const SCOPE_MAX: f64 = 40.0;
const TRUST_MAX: f64 = 30.0;
const FRESHNESS_MAX: f64 = 20.0;
const LOCALITY_MAX: f64 = 10.0;
const POLICY_MAX: f64 = 20.0;

/// Best path-match tier between a pattern's declared paths and the
/// caller's signal paths: exact (40) > directory-glob containing `**`
/// (30) > bare wildcard (5). `None` when nothing matches.
pub fn path_match_tier(pattern_paths: &[String], signal_paths: &[String]) -> Option<(f64, &'static str)> {
    let mut best: Option<(f64, &'static str)> = None;
    for pattern_path in pattern_paths {
        for signal_path in signal_paths {
            if pattern_path == signal_path {
                return Some((40.0, "exact-file-path"));
            }
        }
        if !pattern_path.contains('*') {
            continue;
        }
        let glob = match Glob::new(pattern_path) {
            Ok(g) => g.compile_matcher(),
            Err(_) => continue,
        };
        let tier = if pattern_path.contains("**") {
            (30.0, "directory-glob")
        } else {
            (5.0, "wildcard")
        };
        if signal_paths.iter().any(|p| glob.is_match(p)) {
            best = match best {
                Some((points, _)) if points >= tier.0 => best,
                _ => Some(tier),
            };
        }
    }
    best
}

/// Best framework bonus: name+semver-range match (15) beats name-only (10).
pub fn framework_bonus(facets: &Facets, signals: &[FrameworkSignal]) -> Option<(f64, &'static str)> {
    let mut best: Option<(f64, &'static str)> = None;
    for framework_ref in &facets.frameworks {
        for signal in signals {
            if !framework_ref.name.eq_ignore_ascii_case(&signal.name) {
                continue;
            }
            let matched = match (&framework_ref.range, &signal.version) {
                (Some(range), Some(version)) => {
                    match (range.parse::<semver::VersionReq>(), version.parse::<semver::Version>()) {
                        (Ok(req), Ok(v)) if req.matches(&v) => Some((15.0, "framework-name+semver")),
                        _ => Some((10.0, "framework-name")),
                    }
                }
                _ => Some((10.0, "framework-name")),
            };
            best = match (best, matched) {
                (Some((bp, _)), Some((mp, _))) if bp >= mp => best,
                (_, m) => m,
            };
        }
    }
    best
}

/// Scope sub-score: path tier + language hit (+20) + framework hit, summed
/// and clamped to 40.
pub fn scope_subscore(pattern: &Pattern, signals: &RankSignals) -> (f64, f64, String) {
    let mut raw = 0.0;
    let mut parts = Vec::new();

    if let Some((points, reason)) = path_match_tier(&pattern.facets.paths, &signals.paths) {
        raw += points;
        parts.push(reason.to_string());
    }

    let language_hit = !pattern.facets.languages.is_empty()
        && pattern
            .facets
            .languages
            .iter()
            .any(|l| signals.languages.iter().any(|s| s.eq_ignore_ascii_case(l)));
    if language_hit {
        raw += 20.0;
        parts.push("language-hit".to_string());
    }

    if let Some((points, reason)) = framework_bonus(&pattern.facets, &signals.frameworks) {
        raw += points;
        parts.push(reason.to_string());
    }

    let points = raw.clamp(0.0, SCOPE_MAX);
    let rationale = if parts.is_empty() {
        "no scope signal matched".to_string()
    } else {
        parts.join(", ")
    };
    (points, raw, rationale)
}

/// Whether a pattern's declared scope matches the caller's signals at all,
/// used by the Policy sub-score. An empty scope (global pattern) counts as
/// matching everything.
pub fn scope_matches(pattern: &Pattern, signals: &RankSignals) -> bool {
    if pattern.facets.is_empty() {
        return true;
    }
    path_match_tier(&pattern.facets.paths, &signals.paths).is_some()
        || pattern
            .facets
            .languages
            .iter()
            .any(|l| signals.languages.iter().any(|s| s.eq_ignore_ascii_case(l)))
        || framework_bonus(&pattern.facets, &signals.frameworks).is_some()
}

/// Trust sub-score: `pattern.trust_score` already is the Wilson lower
/// bound (§4.5/§8 invariant); this just scales it into points.
pub fn trust_subscore(pattern: &Pattern) -> (f64, f64, String) {
    let wilson = pattern.trust_score;
    let points = (TRUST_MAX * wilson).round();
    (points, wilson, format!("wilson={wilson:.4}"))
}

/// Freshness sub-score: exponential decay from `updated_at`, half-life
/// from pattern metadata (default 90 days).
pub fn freshness_subscore(pattern: &Pattern, now: DateTime<Utc>, default_half_life_days: f64) -> (f64, f64, String) {
    let age_days = (now - pattern.updated_at).num_seconds() as f64 / 86_400.0;
    let age_days = age_days.max(0.0);
    let half_life = pattern.half_life_days.unwrap_or(default_half_life_days).max(0.001);
    let points = FRESHNESS_MAX * 2f64.powf(-age_days / half_life);
    (points.clamp(0.0, FRESHNESS_MAX), age_days, format!("age_days={age_days:.1}, half_life={half_life:.1}"))
}

/// Locality sub-score: same-repo (10) beats same-org via explicit org or
/// ID namespace prefix before the first `.` (5).
pub fn locality_subscore(pattern: &Pattern, signals: &RankSignals) -> (f64, f64, String) {
    if let Some(repo) = &signals.repo {
        if pattern.facets.repos.iter().any(|r| r == repo) {
            return (LOCALITY_MAX, 1.0, format!("same-repo={repo}"));
        }
    }
    if let Some(org) = &signals.org {
        if pattern.id.org_prefix().eq_ignore_ascii_case(org) {
            return (5.0, 0.5, format!("same-org={org}"));
        }
    }
    (0.0, 0.0, "no locality match".to_string())
}

/// Policy sub-score: full bonus iff the pattern is a POLICY pattern whose
/// scope matches the signals (or is global).
pub fn policy_subscore(pattern: &Pattern, signals: &RankSignals) -> (f64, f64, String) {
    if pattern.pattern_type == PatternType::Policy && scope_matches(pattern, signals) {
        (POLICY_MAX, 1.0, "policy scope matched".to_string())
    } else {
        (0.0, 0.0, "not a matching policy".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_path_beats_glob() {
        let pattern_paths = vec!["services/api/gateway.ts".to_string()];
        let signal_paths = vec!["services/api/gateway.ts".to_string()];
        assert_eq!(path_match_tier(&pattern_paths, &signal_paths), Some((40.0, "exact-file-path")));
    }

    #[test]
    fn directory_glob_match() {
        let pattern_paths = vec!["services/api/**".to_string()];
        let signal_paths = vec!["services/api/gateway.ts".to_string()];
        assert_eq!(path_match_tier(&pattern_paths, &signal_paths), Some((30.0, "directory-glob")));
    }

    #[test]
    fn bare_wildcard_match() {
        let pattern_paths = vec!["*.ts".to_string()];
        let signal_paths = vec!["gateway.ts".to_string()];
        assert_eq!(path_match_tier(&pattern_paths, &signal_paths), Some((5.0, "wildcard")));
    }

    #[test]
    fn no_match_returns_none() {
        let pattern_paths = vec!["services/web/**".to_string()];
        let signal_paths = vec!["services/api/gateway.ts".to_string()];
        assert_eq!(path_match_tier(&pattern_paths, &signal_paths), None);
    }

    #[test]
    fn framework_semver_range_beats_name_only() {
        let facets = Facets {
            frameworks: vec![apex_core::pattern::FrameworkRef {
                name: "express".to_string(),
                range: Some("^4.0.0".to_string()),
            }],
            ..Default::default()
        };
        let signals = vec![FrameworkSignal {
            name: "express".to_string(),
            version: Some("4.18.2".to_string()),
        }];
        assert_eq!(framework_bonus(&facets, &signals), Some((15.0, "framework-name+semver")));
    }

    #[test]
    fn framework_name_only_without_version() {
        let facets = Facets {
            frameworks: vec![apex_core::pattern::FrameworkRef {
                name: "express".to_string(),
                range: None,
            }],
            ..Default::default()
        };
        let signals = vec![FrameworkSignal {
            name: "express".to_string(),
            version: None,
        }];
        assert_eq!(framework_bonus(&facets, &signals), Some((10.0, "framework-name")));
    }

    fn pattern_with(trust_score: f64, age_days: f64, half_life_days: Option<f64>) -> Pattern {
        use apex_core::ids::PatternId;
        use apex_core::pattern::{Provenance, Semantics};
        let now = Utc::now();
        Pattern {
            id: PatternId::parse("TEST:PATTERN").unwrap(),
            schema_version: 1,
            pattern_version: 1,
            pattern_type: PatternType::Codebase,
            title: "t".into(),
            summary: "s".into(),
            trust_score,
            alpha: 1.0,
            beta: 1.0,
            usage_count: 0,
            success_count: 0,
            created_at: now,
            updated_at: now - chrono::Duration::seconds((age_days * 86_400.0) as i64),
            alias: None,
            provenance: Provenance::Manual,
            invalid: false,
            invalid_reason: None,
            pattern_digest: None,
            facets: Facets::default(),
            semantics: Semantics::default(),
            snippets: Vec::new(),
            half_life_days,
        }
    }

    proptest::proptest! {
        // spec.md §8: sub-scores are clamped to their documented maxima.
        #[test]
        fn freshness_points_stay_within_bounds(age_days in 0.0f64..5000.0, half_life in 0.1f64..1000.0) {
            let pattern = pattern_with(0.5, age_days, Some(half_life));
            let (points, _, _) = freshness_subscore(&pattern, Utc::now(), 90.0);
            proptest::prop_assert!((0.0..=FRESHNESS_MAX).contains(&points));
        }

        #[test]
        fn trust_points_stay_within_bounds(wilson in 0.0f64..1.0) {
            let pattern = pattern_with(wilson, 0.0, None);
            let (points, _, _) = trust_subscore(&pattern);
            proptest::prop_assert!((0.0..=TRUST_MAX).contains(&points));
        }
    }
}
