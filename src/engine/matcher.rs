use crate::config::Snippet;

use super::buffer::EditBuffer;
use super::index::TriggerIndex;

/// A trigger found at the end of the edit buffer
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub snippet: Snippet,
    /// Char offset where the trigger starts in the buffer
    pub start: usize,
    /// Char offset one past the trigger's last char (always the buffer end)
    pub end: usize,
    /// Simulated cursor at match time
    pub cursor: usize,
}

impl MatchResult {
    /// Backspaces needed to erase the part of the trigger left of the cursor
    pub fn chars_before_cursor(&self) -> usize {
        self.cursor - self.start
    }

    /// Forward deletes needed to erase the part right of the cursor
    pub fn chars_after_cursor(&self) -> usize {
        self.end - self.cursor
    }
}

/// Look for the longest trigger the buffer text ends with
///
/// The char just typed sits left of the cursor, so a trigger only counts when
/// it starts before the cursor; a suffix that lies entirely right of the
/// cursor was not produced by this keystroke.
pub fn find_match(buffer: &EditBuffer, index: &TriggerIndex) -> Option<MatchResult> {
    let text = buffer.text();
    let (snippet, len) = index.longest_suffix(text)?;

    let end = text.len();
    let start = end - len;
    let cursor = buffer.cursor();
    if cursor <= start {
        return None;
    }

    Some(MatchResult {
        snippet: snippet.clone(),
        start,
        end,
        cursor,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(triggers: &[&str]) -> TriggerIndex {
        TriggerIndex::build(triggers.iter().map(|t| Snippet::new(*t, "content")))
    }

    fn typed(s: &str) -> EditBuffer {
        let mut buffer = EditBuffer::new();
        buffer.begin_trigger();
        for ch in s.chars() {
            buffer.insert(ch);
        }
        buffer
    }

    #[test]
    fn test_basic_match() {
        let index = index(&["/email"]);
        let result = find_match(&typed("/email"), &index).unwrap();

        assert_eq!(result.snippet.trigger, "/email");
        assert_eq!(result.start, 0);
        assert_eq!(result.end, 6);
        assert_eq!(result.chars_before_cursor(), 6);
        assert_eq!(result.chars_after_cursor(), 0);
    }

    #[test]
    fn test_no_match() {
        let index = index(&["/email"]);
        assert!(find_match(&typed("/emai"), &index).is_none());
        assert!(find_match(&typed("/emailx"), &index).is_none());
    }

    #[test]
    fn test_longest_suffix_wins() {
        let index = index(&["i", "/hi", "hi"]);
        let result = find_match(&typed("x/hi"), &index).unwrap();
        assert_eq!(result.snippet.trigger, "/hi");
        assert_eq!(result.start, 1);
    }

    #[test]
    fn test_cursor_mid_trigger() {
        let index = index(&["/hi"]);

        // Typed "/i", moved left, typed "h": buffer "/h|i"
        let mut buffer = typed("/i");
        buffer.move_left();
        buffer.insert('h');

        let result = find_match(&buffer, &index).unwrap();
        assert_eq!(result.chars_before_cursor(), 2);
        assert_eq!(result.chars_after_cursor(), 1);
    }

    #[test]
    fn test_trigger_right_of_cursor_is_ignored() {
        let index = index(&["/hi"]);

        let mut buffer = typed("/hi");
        for _ in 0..3 {
            buffer.move_left();
        }
        buffer.insert('a');
        assert_eq!(buffer.as_string(), "a/hi");
        assert!(find_match(&buffer, &index).is_none());
    }

    #[test]
    fn test_trimmed_trigger_no_longer_matches() {
        let index = index(&["/abc"]);

        let mut buffer = EditBuffer::with_capacity(3);
        buffer.begin_trigger();
        for ch in "/abc".chars() {
            buffer.insert(ch);
        }
        assert_eq!(buffer.as_string(), "abc");
        assert!(find_match(&buffer, &index).is_none());
    }
}
