//! Override values for fill steps
//!
//! An override map replaces recorded fill values by selector at replay time.
//! Selectors without an entry keep their recorded value.

use anyhow::{Context, Result};
use colored::Colorize;
use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::path::Path;

use crate::recipe::Recipe;

pub type Overrides = HashMap<String, String>;

/// Value a fill step should type: the override if there is one
pub fn resolve_fill_value<'a>(overrides: &'a Overrides, selector: &str, recorded: &'a str) -> &'a str {
    overrides.get(selector).map(String::as_str).unwrap_or(recorded)
}

/// Parse a `selector=value` assignment.
///
/// The split happens at the first `=` outside brackets and quotes, so
/// `[name="q"]=hello` maps `[name="q"]` to `hello`.
pub fn parse_assignment(assignment: &str) -> Result<(String, String)> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in assignment.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match (c, quote) {
            ('\\', _) => escaped = true,
            ('"' | '\'', None) => quote = Some(c),
            (c, Some(q)) if c == q => quote = None,
            (_, Some(_)) => {}
            ('[' | '(', None) => depth += 1,
            (']' | ')', None) => depth = depth.saturating_sub(1),
            ('=', None) if depth == 0 => {
                let selector = assignment[..i].trim();
                if selector.is_empty() {
                    anyhow::bail!("Missing selector in '{}'", assignment);
                }
                return Ok((selector.to_string(), assignment[i + 1..].to_string()));
            }
            _ => {}
        }
    }

    anyhow::bail!("Expected selector=value, got '{}'", assignment)
}

/// Read a JSON object of selector → value
pub fn load_overrides_file(path: &Path) -> Result<Overrides> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read overrides from {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Overrides in {} must be a JSON object of strings", path.display()))
}

/// Ask for a value per fill field, showing the current value as the default.
/// An empty answer keeps the default.
pub fn prompt_overrides<R: BufRead, W: Write>(
    recipe: &Recipe,
    current: &Overrides,
    input: &mut R,
    output: &mut W,
) -> Result<Overrides> {
    let mut result = current.clone();

    for (selector, recorded) in recipe.fill_fields() {
        let default = resolve_fill_value(current, selector, recorded).to_string();
        write!(output, "{} [{}]: ", selector.cyan(), default.dimmed())?;
        output.flush()?;

        let mut line = String::new();
        let read = input.read_line(&mut line)?;
        let answer = line.trim_end_matches(['\r', '\n']);

        let value = if read == 0 || answer.is_empty() {
            default
        } else {
            answer.to_string()
        };
        result.insert(selector.to_string(), value);
    }

    Ok(result)
}
