//! Placeholder extraction
//!
//! A placeholder is a `{token}` written into a recorded fill value, e.g.
//! `Hello {name}`. They mark fields a caller is expected to supply at replay.

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

use super::types::{Action, Step};

static PLACEHOLDER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^}]+)\}").expect("placeholder pattern is valid"));

/// Placeholder names in a single value, in order of appearance
pub fn placeholders_in(value: &str) -> impl Iterator<Item = &str> {
    PLACEHOLDER_PATTERN
        .captures_iter(value)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Every placeholder across all fill values of a step sequence
pub fn extract_placeholders(steps: &[Step]) -> BTreeSet<String> {
    steps
        .iter()
        .filter_map(|step| match &step.action {
            Action::Fill { value, .. } => Some(value.as_str()),
            _ => None,
        })
        .flat_map(placeholders_in)
        .map(str::to_string)
        .collect()
}
