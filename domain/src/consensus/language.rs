//! Signals read from the wording of responses: agreement vocabulary,
//! references to peers, answer polarity and disagreement excerpts.

use super::factual::factual_agreement;
use crate::core::string::{ellipsize, prefix_chars};
use crate::deliberation::{Participant, RoundTexts};
use regex::Regex;
use std::sync::LazyLock;

static AGREEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:agree|consensus|concur|similarly|likewise|align|shared view|common ground|strong alignment|fully endorse|same conclusion|no disagreement|complete agreement|unanimously)\b",
    )
    .expect("agreement pattern is valid")
});

static DISAGREEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:disagree|however|although|different view|on the other hand|contrast|but|alternatively)\b",
    )
    .expect("disagreement pattern is valid")
});

const REFERENCE_TERMS: &[&str] = &[
    "agree",
    "mentioned",
    "pointed out",
    "noted",
    "building on",
    "as stated",
    "similarly",
    "likewise",
];

const AFFIRMATIVE_TERMS: &[&str] = &["yes", "correct", "true", "i can", "i am able"];
const NEGATIVE_TERMS: &[&str] = &["no", "not", "cannot", "unable", "don't", "do not"];
const HEDGING_TERMS: &[&str] = &["depends", "partially", "sometimes", "it varies"];

/// Only the opening of a response is inspected for its core answer
const ANSWER_WINDOW_CHARS: usize = 300;
const MAX_DISAGREEMENTS: usize = 3;
const EXCERPT_CHARS: usize = 100;

/// Density of explicit agreement vocabulary.
///
/// Each response scores `matches / max(words / 200, 1)` capped at 1.0; when
/// at least 60% of responses agree explicitly the total is boosted by 1.2.
pub fn agreement_language(responses: &RoundTexts) -> f64 {
    if responses.is_empty() {
        return 0.0;
    }

    let mut total = 0.0;
    let mut with_agreement = 0usize;
    for (_, text) in responses {
        let matches = AGREEMENT.find_iter(text).count();
        if matches == 0 {
            continue;
        }
        with_agreement += 1;
        let words = text.split_whitespace().count() as f64;
        total += (matches as f64 / (words / 200.0).max(1.0)).min(1.0);
    }

    let n = responses.len() as f64;
    if with_agreement as f64 >= n * 0.6 {
        total *= 1.2;
    }
    (total / n).min(1.0)
}

/// Fraction of responses after the first round that refer to peers' points
pub fn cross_reference(history: &[RoundTexts]) -> f64 {
    if history.len() < 2 {
        return 0.0;
    }

    let mut referencing = 0usize;
    let mut checked = 0usize;
    for round in &history[1..] {
        for (_, text) in round {
            checked += 1;
            let lower = text.to_lowercase();
            if REFERENCE_TERMS.iter().any(|term| lower.contains(term)) {
                referencing += 1;
            }
        }
    }

    if checked == 0 {
        0.0
    } else {
        referencing as f64 / checked as f64
    }
}

/// Leaning of a response's opening
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Polarity {
    Affirmative,
    Negative,
    Hedging,
    Neutral,
}

/// Occurrences of `terms` in `text`, counted as plain substrings
fn count_terms(text: &str, terms: &[&str]) -> usize {
    terms.iter().map(|term| text.matches(term).count()).sum()
}

/// Classify by the bucket with the most matches; ties favour affirmative,
/// then negative.
///
/// Terms are counted as substrings, so "nothing" counts towards negative
/// twice ("no", "not").
pub fn classify_polarity(text: &str) -> Polarity {
    let lower = text.to_lowercase();
    let opening = prefix_chars(&lower, ANSWER_WINDOW_CHARS);

    let yes = count_terms(opening, AFFIRMATIVE_TERMS);
    let no = count_terms(opening, NEGATIVE_TERMS);
    let maybe = count_terms(opening, HEDGING_TERMS);

    let best = yes.max(no).max(maybe);
    if best == 0 {
        Polarity::Neutral
    } else if yes == best {
        Polarity::Affirmative
    } else if no == best {
        Polarity::Negative
    } else {
        Polarity::Hedging
    }
}

/// Whether the responses give the same core answer.
///
/// Strong factual agreement (>= 0.9) is returned as is. Otherwise the share
/// of responses with the most common polarity, 1.0 when unanimous, or the
/// factual score if that is higher.
pub fn core_answer_consistency(responses: &RoundTexts) -> f64 {
    if responses.len() < 2 {
        return 0.5;
    }

    let factual = factual_agreement(responses);
    if factual >= 0.9 {
        return factual;
    }

    let polarities: Vec<Polarity> = responses
        .iter()
        .map(|(_, text)| classify_polarity(text))
        .collect();
    let most_common = [
        Polarity::Affirmative,
        Polarity::Negative,
        Polarity::Hedging,
        Polarity::Neutral,
    ]
    .iter()
    .map(|p| polarities.iter().filter(|q| *q == p).count())
    .max()
    .unwrap_or(0);

    let ratio = most_common as f64 / polarities.len() as f64;
    if ratio >= 1.0 {
        return 1.0;
    }
    ratio.max(factual)
}

/// Up to three `"<display name>: <sentence>"` excerpts of dissent
pub fn disagreements(responses: &RoundTexts, participants: &[Participant]) -> Vec<String> {
    let mut found = Vec::new();
    for (backend_id, text) in responses {
        if found.len() >= MAX_DISAGREEMENTS {
            break;
        }
        let Some(sentence) = text.split('.').find(|s| DISAGREEMENT.is_match(s)) else {
            continue;
        };
        let name = participants
            .iter()
            .find(|p| &p.id == backend_id)
            .map_or(backend_id.as_str(), |p| p.display_name.as_str());
        found.push(format!("{}: {}", name, ellipsize(sentence.trim(), EXCERPT_CHARS)));
    }
    found
}
