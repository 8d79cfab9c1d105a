//! Keyword extraction and keyword-set comparisons.

use crate::deliberation::{Participant, RoundTexts};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[a-z]+\b").expect("word pattern is valid"));

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "as", "is", "was", "are", "were", "be", "been", "being", "have", "has", "had", "do",
    "does", "did", "will", "would", "should", "could", "may", "might", "can", "this", "that",
    "these", "those", "i", "you", "he", "she", "it", "we", "they",
];

/// Lowercase alphabetic tokens longer than three characters, stop words removed.
///
/// Keeps duplicates and text order.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    WORD.find_iter(&lower)
        .map(|m| m.as_str())
        .filter(|w| w.len() > 3 && !STOP_WORDS.contains(w))
        .map(str::to_string)
        .collect()
}

pub fn keyword_set(text: &str) -> HashSet<String> {
    extract_keywords(text).into_iter().collect()
}

/// Average pairwise overlap (intersection over the smaller set) of the
/// responses' keyword sets; 0.0 with fewer than two responses.
pub fn keyword_overlap(responses: &RoundTexts) -> f64 {
    if responses.len() < 2 {
        return 0.0;
    }
    let sets: Vec<HashSet<String>> = responses.iter().map(|(_, t)| keyword_set(t)).collect();

    let mut overlaps = Vec::new();
    for i in 0..sets.len() {
        for j in (i + 1)..sets.len() {
            let (a, b) = (&sets[i], &sets[j]);
            if a.is_empty() || b.is_empty() {
                continue;
            }
            let shared = a.intersection(b).count() as f64;
            overlaps.push(shared / a.len().min(b.len()) as f64);
        }
    }
    mean(&overlaps).unwrap_or(0.0)
}

/// How much each backend's vocabulary carried over between the last two rounds.
///
/// 0.0 with fewer than two rounds; 0.5 when no backend has two comparable
/// responses.
pub fn stability(history: &[RoundTexts], participants: &[Participant]) -> f64 {
    let [.., previous, last] = history else {
        return 0.0;
    };

    let lookup = |round: &RoundTexts, id: &str| {
        round
            .iter()
            .find(|(backend, _)| backend == id)
            .map(|(_, text)| keyword_set(text))
    };

    let mut scores = Vec::new();
    for participant in participants {
        let (Some(now), Some(before)) = (lookup(last, &participant.id), lookup(previous, &participant.id))
        else {
            continue;
        };
        if now.is_empty() {
            continue;
        }
        scores.push(now.intersection(&before).count() as f64 / now.len() as f64);
    }
    mean(&scores).unwrap_or(0.5)
}

/// Keywords shared by at least half the responses (never fewer than two),
/// most frequent first, at most five.
pub fn common_themes(responses: &RoundTexts) -> Vec<String> {
    let threshold = (responses.len() / 2).max(2);

    // keyword -> (responses containing it, total occurrences, first seen)
    let mut stats: HashMap<String, (usize, usize, usize)> = HashMap::new();
    let mut order = 0;
    for (_, text) in responses {
        let keywords = extract_keywords(text);
        let mut seen_here = HashSet::new();
        for keyword in keywords {
            let entry = stats.entry(keyword.clone()).or_insert_with(|| {
                order += 1;
                (0, 0, order)
            });
            entry.1 += 1;
            if seen_here.insert(keyword) {
                entry.0 += 1;
            }
        }
    }

    let mut themes: Vec<(String, usize, usize)> = stats
        .into_iter()
        .filter(|(_, (docs, _, _))| *docs >= threshold)
        .map(|(k, (_, total, first))| (k, total, first))
        .collect();
    themes.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    themes.into_iter().take(5).map(|(k, _, _)| k).collect()
}

pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
