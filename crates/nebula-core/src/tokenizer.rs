use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::constants::{MIN_LINE_CHARS, MIN_WORD_LEN};

static LINE_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\n.]+").unwrap());
// ASCII word boundaries: an accented letter ends a word instead of extending it.
static SIGNIFICANT_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?-u:\b)[a-z]{{{MIN_WORD_LEN},}}(?-u:\b)")).unwrap()
});

/// Split text into remixable lines.
/// Breaks on runs of newlines/periods, trims, and drops anything shorter
/// than `MIN_LINE_CHARS` characters.
pub fn split_lines(text: &str) -> Vec<String> {
    LINE_BREAK
        .split(text)
        .map(str::trim)
        .filter(|line| line.chars().count() >= MIN_LINE_CHARS)
        .map(str::to_string)
        .collect()
}

/// Lower-cased alphabetic tokens of at least `MIN_WORD_LEN` letters, deduplicated.
pub fn significant_words(line: &str) -> HashSet<String> {
    let lower = line.to_lowercase();
    SIGNIFICANT_WORD
        .find_iter(&lower)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// True when the two lines share at least one significant word.
pub fn shares_vocabulary(words: &HashSet<String>, candidate: &str) -> bool {
    let candidate_words = significant_words(candidate);
    !words.is_disjoint(&candidate_words)
}

/// Case-insensitive substring containment. An empty needle matches nothing.
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
