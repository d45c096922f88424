//! The OS-facing capability the engine runs on: a global key hook plus
//! synthetic input and clipboard access.

pub mod keymaps;
pub mod monitor;
pub mod ydotool;

#[cfg(test)]
pub mod fake;

pub use monitor::KeyboardMonitor;
pub use ydotool::YdotoolOutput;

use crate::error::Result;

/// A key press as the engine classifies it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyboardEvent {
    /// A printable character was typed
    Character(char),
    Left,
    Right,
    Backspace,
    Delete,
    Space,
    Enter,
    Tab,
    Shift,
    Control,
    /// Anything else (function keys, escape, chords, ...)
    Other,
}

/// A key the engine can synthesise
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntheticKey {
    Char(char),
    Backspace,
    Delete,
    Enter,
    Control,
    /// Command on macOS, Super elsewhere
    Meta,
}

impl SyntheticKey {
    /// Modifier of the platform's paste shortcut
    pub fn paste_modifier() -> Self {
        if cfg!(target_os = "macos") {
            SyntheticKey::Meta
        } else {
            SyntheticKey::Control
        }
    }
}

/// Callback invoked for every key event, in arrival order, on one thread
pub type KeyHandler = Box<dyn FnMut(KeyboardEvent) + Send + 'static>;

/// A live key-event subscription
pub trait Subscription: Send {
    /// Stop delivering events and release the hook
    fn unsubscribe(self: Box<Self>);
}

/// Global keyboard access
pub trait InputBackend: Send + Sync {
    /// Start delivering key events to `handler`
    fn subscribe(&self, handler: KeyHandler) -> Result<Box<dyn Subscription>>;

    /// Press and release one key
    fn send_key(&self, key: SyntheticKey) -> Result<()>;

    /// Hold `modifier`, press and release `key`, release `modifier`
    fn send_chord(&self, modifier: SyntheticKey, key: SyntheticKey) -> Result<()>;

    fn set_clipboard(&self, text: &str) -> Result<()>;
}

/// evdev for reading keys, ydotool and arboard for writing them
pub struct LinuxBackend {
    monitor: KeyboardMonitor,
    output: YdotoolOutput,
}

impl LinuxBackend {
    pub fn new(monitor: KeyboardMonitor, output: YdotoolOutput) -> Self {
        Self { monitor, output }
    }
}

impl InputBackend for LinuxBackend {
    fn subscribe(&self, handler: KeyHandler) -> Result<Box<dyn Subscription>> {
        self.monitor.subscribe(handler)
    }

    fn send_key(&self, key: SyntheticKey) -> Result<()> {
        self.output.send_key(key)
    }

    fn send_chord(&self, modifier: SyntheticKey, key: SyntheticKey) -> Result<()> {
        self.output.send_chord(modifier, key)
    }

    fn set_clipboard(&self, text: &str) -> Result<()> {
        self.output.set_clipboard(text)
    }
}
