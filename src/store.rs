#[cfg(test)]
use std::sync::{Mutex, PoisonError};

use crate::config::Snippet;
use crate::error::EngineError;

/// Where the engine gets its snippets from
///
/// Called once when the engine is built and again on every refresh. The store
/// owns persistence; the engine only ever reads.
pub trait SnippetStore: Send + Sync {
    fn list_enabled_snippets(&self) -> Result<Vec<Snippet>, EngineError>;
}

/// A store kept entirely in memory
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStore {
    snippets: Mutex<Vec<Snippet>>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new(snippets: Vec<Snippet>) -> Self {
        Self {
            snippets: Mutex::new(snippets),
        }
    }

    /// Replace the whole snippet set
    pub fn replace(&self, snippets: Vec<Snippet>) {
        *self.snippets.lock().unwrap_or_else(PoisonError::into_inner) = snippets;
    }
}

#[cfg(test)]
impl SnippetStore for MemoryStore {
    fn list_enabled_snippets(&self) -> Result<Vec<Snippet>, EngineError> {
        let snippets = self.snippets.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(snippets.iter().filter(|s| s.enabled).cloned().collect())
    }
}
