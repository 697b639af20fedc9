use crate::TermCounts;
use lazy_static::lazy_static;
use regex::Regex;

/// Tokens must be strictly longer than this to be counted.
pub const MIN_TERM_LEN: usize = 3;

lazy_static! {
    static ref SEPARATORS: Regex = Regex::new(r"[^a-zA-Z0-9_-]+").expect("valid regex");
}

/// Splits `text` on runs of characters outside `[a-zA-Z0-9_-]`.
pub fn tokenize(text: &str) -> impl Iterator<Item = &str> {
    SEPARATORS.split(text).filter(|t| t.len() > MIN_TERM_LEN)
}

/// Case-sensitive term -> occurrence count for one document.
pub fn count_terms(text: &str) -> TermCounts {
    let mut counts = TermCounts::new();
    for token in tokenize(text) {
        *counts.entry(token.to_string()).or_insert(0) += 1;
    }
    counts
}
