/// Most chars the edit buffer holds before dropping from the front
pub const BUFFER_CAPACITY: usize = 255;

/// What the user has typed since a candidate trigger began, with a simulated cursor
///
/// Only the listener thread touches it. Whenever `in_trigger` is false the
/// text is empty.
#[derive(Debug, Clone)]
pub struct EditBuffer {
    text: Vec<char>,
    cursor: usize,
    in_trigger: bool,
    capacity: usize,
}

impl EditBuffer {
    pub fn new() -> Self {
        Self::with_capacity(BUFFER_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            text: Vec::with_capacity(capacity),
            cursor: 0,
            in_trigger: false,
            capacity,
        }
    }

    pub fn text(&self) -> &[char] {
        &self.text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.text.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn in_trigger(&self) -> bool {
        self.in_trigger
    }

    /// Mark the start of a candidate trigger sequence
    pub fn begin_trigger(&mut self) {
        self.in_trigger = true;
    }

    /// Insert at the cursor, then trim from the front down to capacity
    pub fn insert(&mut self, ch: char) {
        self.text.insert(self.cursor, ch);
        self.cursor += 1;

        if self.text.len() > self.capacity {
            let overflow = self.text.len() - self.capacity;
            self.text.drain(..overflow);
            self.cursor = self.cursor.saturating_sub(overflow);
        }
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.text.len());
    }

    /// Remove the char before the cursor
    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            self.text.remove(self.cursor);
        }
    }

    /// Remove the char after the cursor
    pub fn delete(&mut self) {
        if self.cursor < self.text.len() {
            self.text.remove(self.cursor);
        }
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
        self.in_trigger = false;
    }

    #[cfg(test)]
    pub fn as_string(&self) -> String {
        self.text.iter().collect()
    }
}

impl Default for EditBuffer {
    fn default() -> Self {
        Self::new()
    }
}
