//! Pack assembly: partition, admit by quota, dedup, and trim to budget
//! (spec.md §4.7).

use std::collections::HashSet;

use apex_core::config::PackConfig;
use apex_core::pattern::{Pattern, PatternType};
use apex_ranker::RankedPattern;
use apex_storage::PatternRepository;

use crate::error::PackResult;
use crate::item::{Pack, PackItem, PackMeta};

pub struct PackBuilder<'a> {
    repository: &'a PatternRepository,
    config: PackConfig,
}

impl<'a> PackBuilder<'a> {
    pub fn new(repository: &'a PatternRepository, config: PackConfig) -> Self {
        Self { repository, config }
    }

    /// Build a deterministic, budget-trimmed pack from a ranked list
    /// (already sorted descending by score, ties broken by ID).
    pub fn build(&self, task: &str, ranked: &[RankedPattern], include_explain: bool) -> PackResult<Pack> {
        let total_ranked = ranked.len();
        let mut items = Vec::with_capacity(ranked.len());
        for rp in ranked {
            if let Some(pattern) = self.repository.get(&rp.pattern_id, false)? {
                items.push(to_pack_item(&pattern, rp.score));
            }
        }
        let considered = items.len();

        let (mut policies, mut anti_patterns, mut tests, mut candidates) = partition(items);
        attach_cross_references(&mut candidates, &anti_patterns, &tests);

        let mut admitted_policies = Vec::new();
        let mut admitted_candidates = Vec::new();
        let mut admitted_antis = Vec::new();
        let mut admitted_tests = Vec::new();
        let mut seen = HashSet::new();

        // Always admit every policy first, regardless of quota.
        for item in policies.drain(..) {
            if seen.insert(item.id.clone()) {
                admitted_policies.push(item);
            }
        }

        let high_score_cut = candidates
            .iter()
            .position(|c| c.score < self.config.high_score_threshold)
            .unwrap_or(candidates.len());
        let mut remaining_candidates: Vec<PackItem> = candidates.split_off(high_score_cut);
        let mut top_candidates = candidates;

        let top_quota_cut = top_candidates.len().min(self.config.top_candidates_quota);
        // High-scorers beyond the quota still outrank "remaining" — splice
        // them back in front so they're admitted next if budget allows.
        let overflow_top = top_candidates.split_off(top_quota_cut);
        remaining_candidates.splice(0..0, overflow_top);

        for item in top_candidates.drain(..) {
            if seen.insert(item.id.clone()) {
                admitted_candidates.push(item);
            }
        }
        for item in anti_patterns.drain(..anti_patterns.len().min(self.config.antis_quota)) {
            if seen.insert(item.id.clone()) {
                admitted_antis.push(item);
            }
        }
        for item in tests.drain(..tests.len().min(self.config.tests_quota)) {
            if seen.insert(item.id.clone()) {
                admitted_tests.push(item);
            }
        }
        for item in remaining_candidates.drain(..) {
            if seen.insert(item.id.clone()) {
                admitted_candidates.push(item);
            }
        }

        let included = admitted_policies.len() + admitted_candidates.len() + admitted_antis.len() + admitted_tests.len();

        let mut pack = Pack {
            task: task.to_string(),
            candidates: admitted_candidates,
            anti_patterns: admitted_antis,
            policies: admitted_policies,
            tests: admitted_tests,
            meta: PackMeta {
                total_ranked,
                considered,
                included,
                budget_bytes: self.config.budget_bytes,
                bytes: 0,
                gzip_bytes: None,
                explain: if include_explain { Some(true) } else { None },
                reasons: Vec::new(),
            },
        };

        trim_to_budget(&mut pack, self.config.snippet_lines_min)?;
        pack.meta.bytes = serde_json::to_vec(&pack)?.len();
        pack.meta.gzip_bytes = Some(gzip_len(&pack)?);
        pack.meta.included = pack.candidates.len() + pack.anti_patterns.len() + pack.policies.len() + pack.tests.len();

        Ok(pack)
    }
}

fn to_pack_item(pattern: &Pattern, score: f64) -> PackItem {
    PackItem {
        id: pattern.id.as_str().to_string(),
        title: pattern.title.clone(),
        summary: pattern.summary.clone(),
        pattern_type: pattern.pattern_type,
        trust_score: pattern.trust_score,
        score,
        snippets: pattern.snippets.clone(),
        cross_references: Vec::new(),
    }
}

fn partition(items: Vec<PackItem>) -> (Vec<PackItem>, Vec<PackItem>, Vec<PackItem>, Vec<PackItem>) {
    let mut policies = Vec::new();
    let mut anti_patterns = Vec::new();
    let mut tests = Vec::new();
    let mut candidates = Vec::new();
    for item in items {
        match item.pattern_type {
            PatternType::Policy => policies.push(item),
            PatternType::Anti => anti_patterns.push(item),
            PatternType::Test => tests.push(item),
            _ => candidates.push(item),
        }
    }
    (policies, anti_patterns, tests, candidates)
}

/// For each candidate, record the IDs of admitted anti-patterns/tests its
/// own title/summary mentions, so the caller never needs to re-emit their
/// bodies inline (§4.7 step 4).
fn attach_cross_references(candidates: &mut [PackItem], anti_patterns: &[PackItem], tests: &[PackItem]) {
    for candidate in candidates.iter_mut() {
        let haystack = format!("{} {}", candidate.title, candidate.summary);
        for referenced in anti_patterns.iter().chain(tests.iter()) {
            if haystack.contains(referenced.id.as_str()) {
                candidate.cross_references.push(referenced.id.clone());
            }
        }
    }
}

/// While the serialised pack exceeds budget: trim one line from the
/// middle of the largest remaining snippet down to `snippet_lines_min`;
/// once nothing can be trimmed further, drop the lowest-scored candidate
/// entirely (never a policy) and try again.
fn trim_to_budget(pack: &mut Pack, snippet_lines_min: usize) -> PackResult<()> {
    loop {
        let size = serde_json::to_vec(&pack)?.len();
        if size <= pack.meta.budget_bytes {
            return Ok(());
        }
        if trim_largest_snippet(pack, snippet_lines_min) {
            continue;
        }
        if drop_lowest_scored_candidate(pack) {
            continue;
        }
        pack.meta.reasons.push("budget exceeded after exhausting trim and drop options".to_string());
        return Ok(());
    }
}

/// Find the single largest snippet (by content bytes) still above
/// `min_lines` across every bucket, and remove one line from its middle.
/// Returns `false` once every snippet has been trimmed to the floor.
fn trim_largest_snippet(pack: &mut Pack, min_lines: usize) -> bool {
    let mut target: Option<(usize, &'static str, usize, usize)> = None; // (size, bucket, item_idx, snippet_idx)

    for (bucket_name, bucket) in [
        ("policies", &pack.policies),
        ("candidates", &pack.candidates),
        ("anti_patterns", &pack.anti_patterns),
        ("tests", &pack.tests),
    ] {
        for (item_idx, item) in bucket.iter().enumerate() {
            for (snippet_idx, snippet) in item.snippets.iter().enumerate() {
                if snippet.line_count() <= min_lines {
                    continue;
                }
                let size = snippet.content.len();
                if target.map(|(best_size, ..)| size > best_size).unwrap_or(true) {
                    target = Some((size, bucket_name, item_idx, snippet_idx));
                }
            }
        }
    }

    let Some((_, bucket_name, item_idx, snippet_idx)) = target else {
        return false;
    };
    let bucket = match bucket_name {
        "policies" => &mut pack.policies,
        "candidates" => &mut pack.candidates,
        "anti_patterns" => &mut pack.anti_patterns,
        _ => &mut pack.tests,
    };
    remove_middle_line(&mut bucket[item_idx].snippets[snippet_idx]);
    true
}

fn remove_middle_line(snippet: &mut apex_core::pattern::Snippet) {
    let mut lines: Vec<&str> = snippet.content.lines().collect();
    if lines.len() <= 1 {
        return;
    }
    let mid = lines.len() / 2;
    lines.remove(mid);
    snippet.content = lines.join("\n");
    snippet.size_bytes = snippet.content.len();
}

/// Drop the lowest-scored candidate (preferring the general candidates
/// bucket, then tests, then anti-patterns; policies are never dropped).
fn drop_lowest_scored_candidate(pack: &mut Pack) -> bool {
    if drop_lowest(&mut pack.candidates) {
        return true;
    }
    if drop_lowest(&mut pack.tests) {
        return true;
    }
    drop_lowest(&mut pack.anti_patterns)
}

fn drop_lowest(bucket: &mut Vec<PackItem>) -> bool {
    if bucket.is_empty() {
        return false;
    }
    let (worst_idx, _) = bucket
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal))
        .expect("bucket is non-empty");
    bucket.remove(worst_idx);
    true
}

fn gzip_len(pack: &Pack) -> PackResult<usize> {
    use std::io::Write;
    let bytes = serde_json::to_vec(pack)?;
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&bytes).expect("writing to an in-memory buffer cannot fail");
    let compressed = encoder.finish().expect("finishing an in-memory gzip stream cannot fail");
    Ok(compressed.len())
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use apex_core::pattern::{PatternType, Snippet};

    fn candidate(id: usize, score: f64, snippet_lines: usize) -> PackItem {
        let content = (0..snippet_lines).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        PackItem {
            id: format!("ITEM{id}"),
            title: format!("item {id}"),
            summary: "summary".to_string(),
            pattern_type: PatternType::Codebase,
            trust_score: 0.5,
            score,
            snippets: vec![Snippet {
                snippet_id: format!("snip{id}"),
                label: "example".into(),
                language: "rust".into(),
                file: None,
                line_start: None,
                line_end: None,
                size_bytes: content.len(),
                content,
            }],
            cross_references: Vec::new(),
        }
    }

    proptest::proptest! {
        // spec.md §8: serialised size <= budget_bytes whenever trimming can
        // achieve it; otherwise a reason is recorded explaining the excess.
        #[test]
        fn trim_to_budget_never_exceeds_budget_without_a_recorded_reason(
            count in 1usize..8,
            snippet_lines in 10usize..60,
            budget_bytes in 200usize..4000,
        ) {
            let mut pack = Pack {
                task: "task".to_string(),
                candidates: (0..count).map(|i| candidate(i, (count - i) as f64, snippet_lines)).collect(),
                anti_patterns: Vec::new(),
                policies: Vec::new(),
                tests: Vec::new(),
                meta: PackMeta {
                    total_ranked: count,
                    considered: count,
                    included: count,
                    budget_bytes,
                    bytes: 0,
                    gzip_bytes: None,
                    explain: None,
                    reasons: Vec::new(),
                },
            };
            trim_to_budget(&mut pack, 8).unwrap();
            let size = serde_json::to_vec(&pack).unwrap().len();
            proptest::prop_assert!(size <= budget_bytes || !pack.meta.reasons.is_empty());
        }
    }
}
