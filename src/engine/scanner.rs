//! Placeholder scanner/matcher.
//!
//! Finds occurrences of a `{{name}}` placeholder inside a text body. The
//! canonical form tolerates whitespace immediately inside the braces:
//! `{{name}}`, `{{ name }}` and `{{  name  }}` all refer to `name`.
//!
//! Word-family documents additionally get a split-token heuristic: editors
//! sometimes persist a placeholder as several text runs, injecting unrelated
//! markup between the braces and the identifier. In `Relaxed` mode a span of
//! the form `{{<anything without a closing brace>}}` matches when the enclosed
//! text contains the parameter name as a substring. This trades strict
//! correctness for resilience to run fragmentation and can over-match when the
//! name happens to be a substring of unrelated brace-delimited content.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// A brace-delimited span with no closing brace inside.
    static ref PLACEHOLDER_SPAN: Regex = Regex::new(r"\{\{[^}]*\}\}").unwrap();
}

/// How strictly a span's interior must match the parameter name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Interior must be the name surrounded by optional whitespace.
    Exact,
    /// Interior must contain the name as a substring (split-token heuristic).
    Relaxed,
}

/// Byte-offset span of a placeholder match, delimiters included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// Lazily yield every placeholder span in `body` that refers to `name`.
///
/// Matching is literal and case-sensitive; there are no escaping rules and no
/// nested braces. The iterator is finite and a fresh call restarts the scan.
pub fn scan<'a>(body: &'a str, name: &'a str, mode: MatchMode) -> impl Iterator<Item = Span> + 'a {
    PLACEHOLDER_SPAN
        .find_iter(body)
        .filter(move |m| {
            let interior = &body[m.start() + 2..m.end() - 2];
            match mode {
                MatchMode::Exact => interior.trim() == name,
                MatchMode::Relaxed => interior.contains(name),
            }
        })
        .map(|m| Span {
            start: m.start(),
            end: m.end(),
        })
}
