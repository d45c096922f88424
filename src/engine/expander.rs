use chrono::NaiveDateTime;
use regex::{Captures, Regex};
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::config::{PasteStyle, Snippet};
use crate::variables::expand_placeholders;

use super::index::TriggerIndex;
use super::matcher::MatchResult;

/// How many levels of nested references get inlined
pub const MAX_DEPTH: usize = 5;

/// `{<delimiter><trigger>}`, the delimiter being one non-word char such as `/`
static REFERENCE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([^\w\s{}])([^{}\s]+)\}").expect("Invalid reference regex")
});

/// Everything the output step needs for one expansion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpansionResult {
    /// The final text to emit
    pub text: String,
    /// Backspaces to send before emitting
    pub chars_before_cursor: usize,
    /// Forward deletes to send before emitting
    pub chars_after_cursor: usize,
    pub paste_style: PasteStyle,
    pub return_press: bool,
}

/// Resolve a match into the text that replaces it
pub fn expand_match(
    match_result: &MatchResult,
    index: &TriggerIndex,
    now: &NaiveDateTime,
) -> ExpansionResult {
    let snippet = &match_result.snippet;

    ExpansionResult {
        text: resolve_snippet(snippet, index, now),
        chars_before_cursor: match_result.chars_before_cursor(),
        chars_after_cursor: match_result.chars_after_cursor(),
        paste_style: snippet.paste_style,
        return_press: snippet.return_press,
    }
}

/// Fully resolve a snippet's template: placeholders first, then nested references
///
/// Always terminates. References that are unknown, cyclic or beyond
/// [`MAX_DEPTH`] stay in the output as literal text.
pub fn resolve_snippet(snippet: &Snippet, index: &TriggerIndex, now: &NaiveDateTime) -> String {
    let mut active = HashSet::from([snippet.trigger.clone()]);
    resolve_template(&snippet.snippet, index, now, &mut active, 0)
}

/// `active` holds the triggers on the current path from the root. Entries are
/// popped on the way back up so siblings may reference the same snippet.
fn resolve_template(
    template: &str,
    index: &TriggerIndex,
    now: &NaiveDateTime,
    active: &mut HashSet<String>,
    depth: usize,
) -> String {
    let text = expand_placeholders(template, now);

    REFERENCE_REGEX
        .replace_all(&text, |caps: &Captures| {
            let literal = caps[0].to_string();

            let Some(target) = lookup_reference(index, &caps[1], &caps[2]) else {
                log::debug!("Unknown nested reference {}", literal);
                return literal;
            };
            if active.contains(&target.trigger) {
                log::debug!("Circular reference {} left unresolved", literal);
                return literal;
            }
            if depth >= MAX_DEPTH {
                log::debug!("Nesting deeper than {} levels, {} left unresolved", MAX_DEPTH, literal);
                return literal;
            }

            active.insert(target.trigger.clone());
            let resolved = resolve_template(&target.snippet, index, now, active, depth + 1);
            active.remove(&target.trigger);
            resolved
        })
        .into_owned()
}

/// `{/sig}` names the trigger `sig`, or `/sig` when no bare `sig` exists
fn lookup_reference<'a>(index: &'a TriggerIndex, delimiter: &str, name: &str) -> Option<&'a Snippet> {
    index
        .get(name)
        .or_else(|| index.get(&format!("{delimiter}{name}")))
}

/// Triggers whose template can reach themselves through nested references
pub fn cyclic_triggers(index: &TriggerIndex) -> Vec<String> {
    let mut cyclic: Vec<String> = index
        .triggers()
        .filter(|trigger| {
            let mut visited = HashSet::new();
            reaches(index, trigger, trigger, &mut visited)
        })
        .map(str::to_string)
        .collect();
    cyclic.sort();
    cyclic
}

fn reaches(index: &TriggerIndex, from: &str, target: &str, visited: &mut HashSet<String>) -> bool {
    let Some(snippet) = index.get(from) else {
        return false;
    };

    for caps in REFERENCE_REGEX.captures_iter(&snippet.snippet) {
        let Some(next) = lookup_reference(index, &caps[1], &caps[2]) else {
            continue;
        };
        if next.trigger == target {
            return true;
        }
        if visited.insert(next.trigger.clone()) && reaches(index, &next.trigger, target, visited) {
            return true;
        }
    }

    false
}
