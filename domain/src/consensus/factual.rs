//! Factual agreement: shared dates, figures and named entities.
//!
//! Pattern coverage is narrow (English month names, `$`/`£`/`€`
//! and a handful of units). Widening it changes scores.

use crate::deliberation::RoundTexts;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

const MONTHS: &str =
    "january|february|march|april|may|june|july|august|september|october|november|december";

static ISO_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").expect("iso date pattern is valid")
});

static DMY_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})-(\d{1,2})-(\d{4})\b").expect("d-m-y pattern is valid")
});

static MONTH_DAY_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\b({MONTHS})\s+(\d{{1,2}}),?\s+(\d{{4}})\b"))
        .expect("month-day-year pattern is valid")
});

static DAY_MONTH_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\b(\d{{1,2}})\s+({MONTHS})\s+(\d{{4}})\b"))
        .expect("day-month-year pattern is valid")
});

static FIGURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)[$£€][\d,]+(?:\.\d+)?|\b\d+(?:\.\d+)?\s*(?:(?:dollars?|euros?|pounds?|km|miles?|percent)\b|%)",
    )
    .expect("figure pattern is valid")
});

static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Z][a-z]+(?:\s+[A-Z][a-z]+)*\b").expect("entity pattern is valid")
});

const COMMON_STARTS: &[&str] = &[
    "The", "This", "That", "These", "Those", "A", "An", "In", "On", "At", "To", "For",
];

const MAX_ENTITIES: usize = 10;

/// Normalized `YYYY-MM-DD` dates in text order
pub fn extract_dates(text: &str) -> Vec<String> {
    let mut found: Vec<(usize, String)> = Vec::new();

    for caps in ISO_DATE.captures_iter(text) {
        if let Some(date) = normalize(&caps[1], &caps[2], &caps[3]) {
            found.push((caps.get(0).map_or(0, |m| m.start()), date));
        }
    }
    for caps in DMY_DATE.captures_iter(text) {
        if let Some(date) = normalize(&caps[3], &caps[2], &caps[1]) {
            found.push((caps.get(0).map_or(0, |m| m.start()), date));
        }
    }
    for caps in MONTH_DAY_YEAR.captures_iter(text) {
        if let Some(month) = month_number(&caps[1])
            && let Some(date) = normalize(&caps[3], &month.to_string(), &caps[2])
        {
            found.push((caps.get(0).map_or(0, |m| m.start()), date));
        }
    }
    for caps in DAY_MONTH_YEAR.captures_iter(text) {
        if let Some(month) = month_number(&caps[2])
            && let Some(date) = normalize(&caps[3], &month.to_string(), &caps[1])
        {
            found.push((caps.get(0).map_or(0, |m| m.start()), date));
        }
    }

    found.sort_by_key(|(pos, _)| *pos);
    found.into_iter().map(|(_, date)| date).collect()
}

/// Currency amounts and quantities with units, lowercased
pub fn extract_figures(text: &str) -> Vec<String> {
    FIGURE
        .find_iter(text)
        .map(|m| m.as_str().split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase())
        .collect()
}

/// Capitalized phrases, minus bare articles and prepositions; first ten kept
pub fn extract_entities(text: &str) -> Vec<String> {
    ENTITY
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|e| !COMMON_STARTS.contains(e))
        .take(MAX_ENTITIES)
        .map(str::to_string)
        .collect()
}

/// Score agreement on concrete facts across a round's responses.
///
/// - 1.0: at least two responses lead with a date and all those dates match
/// - 0.95: one figure appears in at least 80% of responses
/// - 0.85: at least two entities each appear in at least 70% of responses
/// - 0.5 with fewer than two responses, otherwise 0.0
pub fn factual_agreement(responses: &RoundTexts) -> f64 {
    let n = responses.len();
    if n < 2 {
        return 0.5;
    }

    let first_dates: Vec<String> = responses
        .iter()
        .filter_map(|(_, text)| extract_dates(text).into_iter().next())
        .collect();
    if first_dates.len() >= 2 && first_dates.iter().all(|d| d == &first_dates[0]) {
        return 1.0;
    }

    let figure_counts = document_frequency(responses, extract_figures);
    if figure_counts
        .values()
        .any(|&count| count as f64 >= n as f64 * 0.8)
    {
        return 0.95;
    }

    let entity_counts = document_frequency(responses, extract_entities);
    let shared_entities = entity_counts
        .values()
        .filter(|&&count| count as f64 >= n as f64 * 0.7)
        .count();
    if shared_entities >= 2 {
        return 0.85;
    }

    0.0
}

/// Number of responses mentioning each extracted item
fn document_frequency<F>(responses: &RoundTexts, extract: F) -> HashMap<String, usize>
where
    F: Fn(&str) -> Vec<String>,
{
    let mut counts = HashMap::new();
    for (_, text) in responses {
        let unique: HashSet<String> = extract(text).into_iter().collect();
        for item in unique {
            *counts.entry(item).or_insert(0) += 1;
        }
    }
    counts
}

fn month_number(name: &str) -> Option<u32> {
    MONTHS
        .split('|')
        .position(|m| m.eq_ignore_ascii_case(name))
        .map(|i| i as u32 + 1)
}

fn normalize(year: &str, month: &str, day: &str) -> Option<String> {
    let year: u32 = year.parse().ok()?;
    let month: u32 = month.parse().ok()?;
    let day: u32 = day.parse().ok()?;
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return None;
    }
    Some(format!("{year:04}-{month:02}-{day:02}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(items: &[&str]) -> RoundTexts {
        items
            .iter()
            .enumerate()
            .map(|(i, t)| (format!("m{i}"), t.to_string()))
            .collect()
    }

    #[test]
    fn test_dates_normalized_across_formats() {
        assert_eq!(extract_dates("launched 2025-11-3"), vec!["2025-11-03"]);
        assert_eq!(extract_dates("launched 03-11-2025"), vec!["2025-11-03"]);
        assert_eq!(extract_dates("on November 3, 2025"), vec!["2025-11-03"]);
        assert_eq!(extract_dates("on 3 november 2025"), vec!["2025-11-03"]);
    }

    #[test]
    fn test_dates_in_text_order() {
        let dates = extract_dates("From 1 May 2020 until 2021-06-01.");
        assert_eq!(dates, vec!["2020-05-01", "2021-06-01"]);
    }

    #[test]
    fn test_invalid_dates_skipped() {
        assert!(extract_dates("version 2024-13-40").is_empty());
    }

    #[test]
    fn test_figures() {
        let figures = extract_figures("It costs $1,299.99 or about 1200 Euros, up 5 %.");
        assert_eq!(figures, vec!["$1,299.99", "1200 euros", "5 %"]);
    }

    #[test]
    fn test_entities_skip_common_starts() {
        let entities =
            extract_entities("The answer is Paris, and France agrees with Emmanuel Macron.");
        assert_eq!(entities, vec!["Paris", "France", "Emmanuel Macron"]);
    }

    #[test]
    fn test_matching_dates_score_one() {
        let responses = texts(&[
            "The event is on 2025-11-23.",
            "It happens November 23, 2025.",
            "Scheduled for 23 November 2025.",
        ]);
        assert_eq!(factual_agreement(&responses), 1.0);
    }

    #[test]
    fn test_conflicting_dates_fall_through() {
        let responses = texts(&["On 2025-11-23.", "On 2025-11-24."]);
        assert_eq!(factual_agreement(&responses), 0.0);
    }

    #[test]
    fn test_shared_figure_scores_095() {
        let responses = texts(&[
            "The price is $999 today.",
            "Expect to pay $999.",
            "Around $999 at launch.",
            "It retails for $999.",
            "I think it is $1,099.",
        ]);
        assert_eq!(factual_agreement(&responses), 0.95);
    }

    #[test]
    fn test_shared_entities_score_085() {
        let responses = texts(&[
            "Marie Curie worked in Paris.",
            "Paris is where Marie Curie lived.",
        ]);
        assert_eq!(factual_agreement(&responses), 0.85);
    }

    #[test]
    fn test_single_response_is_neutral() {
        assert_eq!(factual_agreement(&texts(&["2025-01-01"])), 0.5);
    }
}
