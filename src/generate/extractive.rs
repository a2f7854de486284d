use std::collections::HashSet;

use crate::constants::EXTRACTIVE_MAX_SENTENCES;

pub const EXTRACTIVE_HEADER: &str = "Answer (extractive fallback):";

/// Deterministic answer built from context sentences.
///
/// Contexts are joined with a space and split on `". "`. Up to five sentences
/// sharing a whitespace token (case-insensitive, longer than two characters)
/// with the query are kept; with no match, the first five are used.
pub fn extractive_fallback(query: &str, contexts: &[String]) -> String {
    let joined = contexts.join(" ");
    let sentences: Vec<&str> = joined
        .split(". ")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    let query_words: HashSet<String> = query
        .split_whitespace()
        .filter(|w| w.chars().count() > 2)
        .map(str::to_lowercase)
        .collect();

    let mut picked: Vec<&str> = sentences
        .iter()
        .copied()
        .filter(|s| {
            s.split_whitespace()
                .any(|w| query_words.contains(&w.to_lowercase()))
        })
        .take(EXTRACTIVE_MAX_SENTENCES)
        .collect();

    if picked.is_empty() {
        picked = sentences.into_iter().take(EXTRACTIVE_MAX_SENTENCES).collect();
    }

    let mut answer = String::from(EXTRACTIVE_HEADER);
    answer.push('\n');
    let bullets: Vec<String> = picked.iter().map(|s| format!("- {s}")).collect();
    answer.push_str(&bullets.join("\n"));
    answer
}
