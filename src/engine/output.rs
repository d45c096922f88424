use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::PasteStyle;
use crate::error::Result;
use crate::platform::{InputBackend, SyntheticKey};

use super::expander::ExpansionResult;

/// Holds the suspend flag for as long as it lives
///
/// Dropping it releases the flag on every path out of an expansion,
/// including early returns on error.
pub struct SuspendGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> SuspendGuard<'a> {
    pub fn engage(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self { flag }
    }
}

impl Drop for SuspendGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Replaces the typed trigger with the expansion through synthetic input
pub struct OutputEngine {
    backend: Arc<dyn InputBackend>,
}

impl OutputEngine {
    pub fn new(backend: Arc<dyn InputBackend>) -> Self {
        Self { backend }
    }

    /// Erase the trigger, emit the text, optionally press Enter
    ///
    /// `suspended` is raised for the duration so the engine ignores its own
    /// keystrokes.
    pub fn output_expansion(&self, expansion: &ExpansionResult, suspended: &AtomicBool) -> Result<()> {
        let _guard = SuspendGuard::engage(suspended);

        // Step 1: Delete the trigger on both sides of the cursor
        self.repeat(SyntheticKey::Backspace, expansion.chars_before_cursor)?;
        self.repeat(SyntheticKey::Delete, expansion.chars_after_cursor)?;

        // Step 2: Emit the replacement text
        match expansion.paste_style {
            PasteStyle::Clipboard => self.paste(&expansion.text)?,
            PasteStyle::Keystroke => self.type_text(&expansion.text)?,
        }

        // Step 3: Optional trailing Enter
        if expansion.return_press {
            self.backend.send_key(SyntheticKey::Enter)?;
        }

        Ok(())
    }

    fn repeat(&self, key: SyntheticKey, count: usize) -> Result<()> {
        for _ in 0..count {
            self.backend.send_key(key)?;
        }
        Ok(())
    }

    fn paste(&self, text: &str) -> Result<()> {
        self.backend.set_clipboard(text)?;
        self.backend
            .send_chord(SyntheticKey::paste_modifier(), SyntheticKey::Char('v'))
    }

    /// One key per char; newlines become Enter
    fn type_text(&self, text: &str) -> Result<()> {
        for ch in text.chars() {
            let key = match ch {
                '\n' => SyntheticKey::Enter,
                '\r' => continue,
                other => SyntheticKey::Char(other),
            };
            self.backend.send_key(key)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::fake::{Emitted, FakeBackend};

    fn expansion(text: &str, style: PasteStyle, before: usize, after: usize) -> ExpansionResult {
        ExpansionResult {
            text: text.to_string(),
            chars_before_cursor: before,
            chars_after_cursor: after,
            paste_style: style,
            return_press: false,
        }
    }

    #[test]
    fn test_keystroke_output() {
        let fake = FakeBackend::new();
        let output = OutputEngine::new(Arc::new(fake.clone()));
        let suspended = AtomicBool::new(false);

        output
            .output_expansion(&expansion("a\nb", PasteStyle::Keystroke, 2, 1), &suspended)
            .unwrap();

        assert_eq!(
            fake.emitted(),
            vec![
                Emitted::Key(SyntheticKey::Backspace),
                Emitted::Key(SyntheticKey::Backspace),
                Emitted::Key(SyntheticKey::Delete),
                Emitted::Key(SyntheticKey::Char('a')),
                Emitted::Key(SyntheticKey::Enter),
                Emitted::Key(SyntheticKey::Char('b')),
            ]
        );
        assert!(!suspended.load(Ordering::Acquire));
    }

    #[test]
    fn test_clipboard_output_with_return() {
        let fake = FakeBackend::new();
        let output = OutputEngine::new(Arc::new(fake.clone()));
        let suspended = AtomicBool::new(false);

        let mut exp = expansion("pasted", PasteStyle::Clipboard, 1, 0);
        exp.return_press = true;
        output.output_expansion(&exp, &suspended).unwrap();

        assert_eq!(
            fake.emitted(),
            vec![
                Emitted::Key(SyntheticKey::Backspace),
                Emitted::Clipboard("pasted".to_string()),
                Emitted::Chord(SyntheticKey::paste_modifier(), SyntheticKey::Char('v')),
                Emitted::Key(SyntheticKey::Enter),
            ]
        );
    }

    #[test]
    fn test_failure_releases_suspend_flag() {
        let fake = FakeBackend::new();
        fake.fail_after(2);
        let output = OutputEngine::new(Arc::new(fake.clone()));
        let suspended = AtomicBool::new(false);

        let result = output.output_expansion(&expansion("xyz", PasteStyle::Keystroke, 3, 0), &suspended);

        assert!(result.is_err());
        assert_eq!(fake.emitted().len(), 2);
        assert!(!suspended.load(Ordering::Acquire));
    }

    #[test]
    fn test_guard_raises_flag_while_alive() {
        let flag = AtomicBool::new(false);
        {
            let _guard = SuspendGuard::engage(&flag);
            assert!(flag.load(Ordering::Acquire));
        }
        assert!(!flag.load(Ordering::Acquire));
    }
}
