//! Task similarity: 30% task-type match + 70% title-token Jaccard (§4.9).

use std::collections::HashSet;

use apex_core::task::Task;

const TYPE_WEIGHT: f64 = 0.3;
const TITLE_WEIGHT: f64 = 0.7;

/// Weighted similarity between two tasks, in `[0, 1]`.
pub fn similarity(a: &Task, b: &Task) -> f64 {
    let type_score = if a.task_type.eq_ignore_ascii_case(&b.task_type) { 1.0 } else { 0.0 };
    let title_score = title_jaccard(&a.title, &b.title);
    TYPE_WEIGHT * type_score + TITLE_WEIGHT * title_score
}

/// Jaccard similarity over lowercased alphanumeric title tokens.
fn title_jaccard(a: &str, b: &str) -> f64 {
    let tokens_a = tokenize(a);
    let tokens_b = tokenize(b);
    if tokens_a.is_empty() && tokens_b.is_empty() {
        return 0.0;
    }
    let intersection = tokens_a.intersection(&tokens_b).count();
    let union = tokens_a.union(&tokens_b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

fn tokenize(title: &str) -> HashSet<String> {
    title
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_ascii_lowercase())
        .collect()
}
