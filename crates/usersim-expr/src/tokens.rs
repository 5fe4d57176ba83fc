//! Identifier scanning over rendered constraint text.
//!
//! Results documents carry only the rendered `expr` string of each
//! constraint, so anything that wants to know which facts a constraint
//! touches after the fact has to read identifiers back out of that text.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;

/// Call names and boolean literals of the formula grammar.
const RESERVED: &[&str] = &[
    "Implies", "And", "Or", "Not", "If", "true", "false", "True", "False",
];

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\b(?:P\.)?([A-Za-z_][A-Za-z0-9_]*)").expect("identifier pattern is valid")
    })
}

/// Fact identifiers appearing in `text`, excluding call names and boolean
/// literals. A `P.` prefix is stripped.
pub fn identifiers(text: &str) -> BTreeSet<String> {
    identifier_pattern()
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .filter(|word| !RESERVED.contains(word))
        .map(str::to_string)
        .collect()
}

/// Number of distinct identifiers in `text`.
pub fn identifier_count(text: &str) -> usize {
    identifiers(text).len()
}
