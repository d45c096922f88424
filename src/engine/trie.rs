use std::collections::HashMap;

#[derive(Debug, Default)]
struct TrieNode {
    children: HashMap<char, TrieNode>,
    /// Set when a trigger ends at this node
    trigger: Option<String>,
}

/// Suffix trie over triggers
///
/// Triggers are inserted reversed so that walking the typed text backwards
/// from its end visits every trigger that is a suffix of it, shortest first.
#[derive(Debug, Default)]
pub struct Trie {
    root: TrieNode,
}

impl Trie {
    pub fn insert(&mut self, trigger: &str) {
        let mut node = &mut self.root;
        for ch in trigger.chars().rev() {
            node = node.children.entry(ch).or_default();
        }
        node.trigger = Some(trigger.to_string());
    }

    /// Longest trigger that `text` ends with, and its length in chars
    pub fn longest_suffix<'a, I>(&self, text_rev: I) -> Option<(&str, usize)>
    where
        I: IntoIterator<Item = &'a char>,
    {
        let mut node = &self.root;
        let mut depth = 0;
        let mut best = None;

        for ch in text_rev {
            let Some(next) = node.children.get(ch) else {
                break;
            };
            node = next;
            depth += 1;

            // Keep walking; a deeper terminal is a longer match
            if let Some(trigger) = &node.trigger {
                best = Some((trigger.as_str(), depth));
            }
        }

        best
    }
}
