//! Recognition of non-substantive answers ("don't know", "no answer", blanks).

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::config::AggregationRules;

/// Answers that carry no information, in normalized form.
pub const NON_RESPONSES: &[&str] = &[
    "",
    "-",
    "--",
    ".",
    "?",
    "n/a",
    "na",
    "ns",
    "nc",
    "ns/nc",
    "ns-nc",
    "nsnc",
    "no sabe",
    "no se",
    "no sabe/no contesta",
    "no contesta",
    "no responde",
    "sin respuesta",
    "sin dato",
    "sin datos",
    "s/d",
    "s/r",
    "desconoce",
];

/// Lowercases, strips accents, and collapses inner whitespace.
pub fn normalize_answer(answer: &str) -> String {
    let folded: String = answer
        .trim()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase();
    folded.split_whitespace().collect::<Vec<&str>>().join(" ")
}

/// The normalized answer with every character that is not a letter or a digit removed.
fn squeeze(normalized: &str) -> String {
    normalized.chars().filter(|c| c.is_alphanumeric()).collect()
}

fn tokens(normalized: &str) -> impl Iterator<Item = &str> {
    normalized
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
}

/// Edit distance, giving up as soon as it exceeds `max_dist`.
fn bounded_levenshtein(value: &str, needle: &str, max_dist: usize) -> usize {
    let needle_chars: Vec<char> = needle.chars().collect();
    let n = needle_chars.len();
    if n == 0 {
        return value.chars().count();
    }
    let mut prev: Vec<usize> = (0..=n).collect();
    let mut curr: Vec<usize> = vec![0; n + 1];
    for (i, c) in value.chars().enumerate() {
        curr[0] = i + 1;
        let mut row_min = curr[0];
        for j in 1..=n {
            let cost = if c == needle_chars[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
            row_min = row_min.min(curr[j]);
        }
        if row_min > max_dist {
            return max_dist + 1;
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[n]
}

/// True if the answer is a recognized non-response.
///
/// Matching is done on the normalized answer: exact dictionary hits, hits once
/// punctuation is ignored ("NS - NC"), close misspellings of the longer entries
/// ("no sabee"), and the combined don't-know/won't-answer patterns.
pub fn is_invalid_answer(answer: &str, rules: &AggregationRules) -> bool {
    let normalized = normalize_answer(answer);
    if NON_RESPONSES.contains(&normalized.as_str()) {
        return true;
    }

    let squeezed = squeeze(&normalized);
    if NON_RESPONSES.iter().any(|entry| squeeze(entry) == squeezed) {
        return true;
    }

    if rules.typo_distance > 0 {
        let close = NON_RESPONSES
            .iter()
            .filter(|entry| entry.chars().count() >= rules.typo_min_length)
            .any(|entry| {
                bounded_levenshtein(&normalized, entry, rules.typo_distance) <= rules.typo_distance
            });
        if close {
            return true;
        }
    }

    if normalized.contains("no sabe") && normalized.contains("contesta") {
        return true;
    }

    // The short codes are only meaningful as words: "insuficiencia" contains both letter pairs.
    let mut has_ns = false;
    let mut has_nc = false;
    for t in tokens(&normalized) {
        has_ns |= t == "ns";
        has_nc |= t == "nc";
    }
    has_ns && has_nc
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invalid(s: &str) -> bool {
        is_invalid_answer(s, &AggregationRules::DEFAULT_RULES)
    }

    #[test]
    fn dictionary_entries() {
        for s in ["", "   ", "-", "No sabe", "NS/NC", "n/a", "Sin respuesta", "N/A "] {
            assert!(invalid(s), "{:?} should be invalid", s);
        }
    }

    #[test]
    fn punctuation_and_accents_are_ignored() {
        assert!(invalid("NS - NC"));
        assert!(invalid("No sé"));
        assert!(invalid("Sin  respuesta."));
    }

    #[test]
    fn close_misspellings() {
        assert!(invalid("no sabee"));
        assert!(invalid("sin respuest"));
        // Short entries are not fuzzy-matched.
        assert!(!invalid("no"));
        assert!(!invalid("si"));
    }

    #[test]
    fn combined_patterns() {
        assert!(invalid("No sabe / no contesta la pregunta"));
        assert!(invalid("ns o nc"));
        assert!(invalid("ns y nc"));
        assert!(invalid("NC, NS"));
        assert!(!invalid("Consultorio transnacional"));
    }

    #[test]
    fn substantive_answers() {
        for s in [
            "Sí",
            "No",
            "Insuficiencia cardíaca",
            "Consultorio",
            "3",
            "Hospital San Martín",
        ] {
            assert!(!invalid(s), "{:?} should be valid", s);
        }
    }

    #[test]
    fn typo_matching_can_be_disabled() {
        let rules = AggregationRules {
            typo_distance: 0,
            ..AggregationRules::DEFAULT_RULES
        };
        assert!(!is_invalid_answer("no sabee", &rules));
        assert!(is_invalid_answer("no sabe", &rules));
    }

    #[test]
    fn levenshtein_bounds() {
        assert_eq!(bounded_levenshtein("no sabe", "no sabe", 1), 0);
        assert_eq!(bounded_levenshtein("no sab", "no sabe", 1), 1);
        assert_eq!(bounded_levenshtein("hospital", "no sabe", 1), 2);
    }
}
