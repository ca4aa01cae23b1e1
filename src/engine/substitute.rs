//! Substitution engine.
//!
//! Applies a validated value map to a decoded text body. All spans are
//! collected against the original body before any splicing happens, so a
//! replacement's value is never itself re-scanned - inserting a value that
//! happens to contain `{{...}}` text cannot trigger further substitution
//! within the same call.

use std::collections::HashMap;

use super::scanner::{scan, MatchMode, Span};

/// Replace every placeholder with a matching entry in `values`.
///
/// Placeholders with no corresponding entry are left untouched; unknown keys
/// in `values` that match nothing in the body are a no-op. Values are
/// inserted verbatim. With `MatchMode::Relaxed` two parameter names can claim
/// overlapping spans; names are scanned in sorted order and the earliest span
/// wins, so the result does not depend on map iteration order.
pub fn substitute(body: &str, values: &HashMap<String, String>, mode: MatchMode) -> String {
    let mut replacements: Vec<(Span, &str)> = Vec::new();

    let mut names: Vec<&String> = values.keys().collect();
    names.sort();

    for name in names {
        let value = values[name].as_str();
        for span in scan(body, name, mode) {
            replacements.push((span, value));
        }
    }

    replacements.sort_by_key(|(span, _)| (span.start, span.end));

    let mut output = String::with_capacity(body.len());
    let mut cursor = 0;
    for (span, value) in replacements {
        if span.start < cursor {
            // Overlapping relaxed-mode span already claimed by an earlier name.
            continue;
        }
        output.push_str(&body[cursor..span.start]);
        output.push_str(value);
        cursor = span.end;
    }
    output.push_str(&body[cursor..]);
    output
}
