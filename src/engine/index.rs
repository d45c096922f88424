use std::collections::{HashMap, HashSet};

use crate::config::Snippet;

use super::expander::cyclic_triggers;
use super::trie::Trie;

/// Longest trigger accepted into the index, in chars
pub const MAX_TRIGGER_LEN: usize = 255;

/// Immutable lookup structure compiled from one snippet set
///
/// Never mutated after [`TriggerIndex::build`]; a refresh builds a new one and
/// swaps it in whole.
#[derive(Debug, Default)]
pub struct TriggerIndex {
    /// First char of every indexed trigger
    prefixes: HashSet<char>,
    snippets: HashMap<String, Snippet>,
    trie: Trie,
}

impl TriggerIndex {
    /// Compile an index from a snippet list
    ///
    /// Disabled snippets, malformed triggers and duplicate triggers are left
    /// out individually; the rest of the set still builds.
    pub fn build(snippets: impl IntoIterator<Item = Snippet>) -> Self {
        let mut index = Self::default();

        for snippet in snippets {
            if !snippet.enabled {
                continue;
            }

            let len = snippet.trigger.chars().count();
            if len == 0 || len > MAX_TRIGGER_LEN {
                log::warn!(
                    "Skipping snippet {:?}: trigger length {} outside 1..={}",
                    snippet.label.as_deref().unwrap_or(""),
                    len,
                    MAX_TRIGGER_LEN
                );
                continue;
            }

            if index.snippets.contains_key(&snippet.trigger) {
                log::warn!("Duplicate trigger '{}', keeping the first", snippet.trigger);
                continue;
            }

            if let Some(first) = snippet.trigger.chars().next() {
                index.prefixes.insert(first);
            }
            index.trie.insert(&snippet.trigger);
            index.snippets.insert(snippet.trigger.clone(), snippet);
        }

        let cyclic = cyclic_triggers(&index);
        if !cyclic.is_empty() {
            log::warn!(
                "Snippets with circular nested references (cycles will be cut): {}",
                cyclic.join(", ")
            );
        }

        index
    }

    /// Whether `ch` can start a trigger
    pub fn is_prefix(&self, ch: char) -> bool {
        self.prefixes.contains(&ch)
    }

    pub fn get(&self, trigger: &str) -> Option<&Snippet> {
        self.snippets.get(trigger)
    }

    /// Longest trigger that the char sequence ends with, and its length
    pub fn longest_suffix(&self, text: &[char]) -> Option<(&Snippet, usize)> {
        let (trigger, len) = self.trie.longest_suffix(text.iter().rev())?;
        self.snippets.get(trigger).map(|snippet| (snippet, len))
    }

    pub fn len(&self) -> usize {
        self.snippets.len()
    }

    pub(crate) fn triggers(&self) -> impl Iterator<Item = &str> {
        self.snippets.keys().map(String::as_str)
    }
}
