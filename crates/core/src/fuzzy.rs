//! Token-set fuzzy similarity.
//!
//! Scores are integers in 0..=100. `token_set_ratio` ignores word order and
//! repeated words, and a candidate that contains every wanted word (plus
//! extras) scores 100.

use std::collections::BTreeSet;

use rapidfuzz::fuzz;

/// Indel similarity of two strings, rounded to the nearest integer.
pub fn ratio(a: &str, b: &str) -> u8 {
    if a.is_empty() && b.is_empty() {
        return 100;
    }

    // Exact halves can land a hair under .5 in floating point
    let score = fuzz::ratio(a.chars(), b.chars()) * 100.0;
    (score + 1e-9).round().clamp(0.0, 100.0) as u8
}

/// Order-insensitive similarity over the distinct words of both strings.
///
/// Returns 0 when either side has no words or the two share no word.
pub fn token_set_ratio(a: &str, b: &str) -> u8 {
    let tokens_a = tokenize(a);
    let tokens_b = tokenize(b);

    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0;
    }

    let intersection: Vec<&str> = tokens_a.intersection(&tokens_b).map(String::as_str).collect();
    if intersection.is_empty() {
        return 0;
    }

    let diff_ab: Vec<&str> = tokens_a.difference(&tokens_b).map(String::as_str).collect();
    let diff_ba: Vec<&str> = tokens_b.difference(&tokens_a).map(String::as_str).collect();

    if diff_ab.is_empty() || diff_ba.is_empty() {
        return 100;
    }

    let sect = intersection.join(" ");
    let combined_ab = format!("{} {}", sect, diff_ab.join(" "));
    let combined_ba = format!("{} {}", sect, diff_ba.join(" "));

    ratio(&sect, &combined_ab)
        .max(ratio(&sect, &combined_ba))
        .max(ratio(&combined_ab, &combined_ba))
}

fn tokenize(text: &str) -> BTreeSet<String> {
    let processed: String = text
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .to_lowercase();

    processed.split_whitespace().map(str::to_string).collect()
}
