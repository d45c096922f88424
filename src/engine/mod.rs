pub mod buffer;
pub mod expander;
pub mod index;
pub mod matcher;
pub mod output;
mod trie;

pub use buffer::EditBuffer;
pub use expander::expand_match;
pub use index::TriggerIndex;
pub use matcher::find_match;
pub use output::OutputEngine;

use chrono::{Local, NaiveDateTime};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use crate::error::Result;
use crate::platform::{InputBackend, KeyHandler, KeyboardEvent, Subscription};
use crate::store::SnippetStore;

/// Source of "now" for placeholders
pub type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

/// Where the engine is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Stopped,
    Running,
    Paused,
}

/// State read by the listener thread and written by control callers
struct Shared {
    /// Current index snapshot; replaced whole, never edited in place
    index: RwLock<Arc<TriggerIndex>>,
    paused: AtomicBool,
    /// Raised while the engine is emitting its own keystrokes
    suspended: AtomicBool,
    /// Ask the listener to empty its buffer before the next event
    reset_buffer: AtomicBool,
}

impl Shared {
    fn snapshot(&self) -> Arc<TriggerIndex> {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn publish(&self, index: TriggerIndex) {
        *self.index.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(index);
    }
}

/// The per-keystroke pipeline: buffer update, match, resolve, output
///
/// Owned by the handler closure, so only the listener thread ever runs it.
struct Pipeline {
    buffer: EditBuffer,
    shared: Arc<Shared>,
    output: OutputEngine,
    clock: Clock,
}

impl Pipeline {
    fn handle(&mut self, event: KeyboardEvent) {
        if self.shared.reset_buffer.swap(false, Ordering::AcqRel) {
            self.buffer.clear();
        }
        // Output runs on this thread, so the listener never sees `suspended`
        // raised; the engine's own keystrokes are kept out by the monitor
        // skipping ydotool's virtual device. The flag covers backends that
        // deliver events from another thread.
        if self.shared.paused.load(Ordering::Acquire) || self.shared.suspended.load(Ordering::Acquire) {
            return;
        }

        // One snapshot for the whole event, even if a refresh lands meanwhile
        let index = self.shared.snapshot();

        match event {
            KeyboardEvent::Left => self.buffer.move_left(),
            KeyboardEvent::Right => self.buffer.move_right(),
            KeyboardEvent::Backspace => self.buffer.backspace(),
            KeyboardEvent::Delete => self.buffer.delete(),
            KeyboardEvent::Character(ch) => {
                if !self.buffer.in_trigger() {
                    if !index.is_prefix(ch) {
                        self.buffer.clear();
                        return;
                    }
                    self.buffer.begin_trigger();
                }
                self.buffer.insert(ch);
                self.check_and_expand(&index);
            }
            // Triggers are unbroken tokens; anything else ends the sequence
            KeyboardEvent::Space
            | KeyboardEvent::Enter
            | KeyboardEvent::Tab
            | KeyboardEvent::Shift
            | KeyboardEvent::Control
            | KeyboardEvent::Other => self.buffer.clear(),
        }
    }

    fn check_and_expand(&mut self, index: &TriggerIndex) {
        let Some(match_result) = find_match(&self.buffer, index) else {
            return;
        };

        let now = (self.clock)();
        let expansion = expand_match(&match_result, index, &now);
        log::debug!(
            "Match found: '{}' -> <redacted len={}>",
            match_result.snippet.trigger,
            expansion.text.chars().count()
        );

        match self.output.output_expansion(&expansion, &self.shared.suspended) {
            Ok(()) => {
                self.buffer.clear();
                log::info!("Expanded trigger '{}'", match_result.snippet.trigger);
            }
            Err(e) => log::error!("Expansion of '{}' failed: {}", match_result.snippet.trigger, e),
        }
    }
}

/// Lifecycle controller for the expansion engine
///
/// Every method takes `&self` and may be called from any thread while the
/// listener is processing keys.
pub struct ExpansionEngine {
    store: Arc<dyn SnippetStore>,
    backend: Arc<dyn InputBackend>,
    shared: Arc<Shared>,
    subscription: Mutex<Option<Box<dyn Subscription>>>,
    clock: Clock,
}

impl ExpansionEngine {
    /// Create a stopped engine with an index built from the store
    pub fn new(store: Arc<dyn SnippetStore>, backend: Arc<dyn InputBackend>) -> Result<Self> {
        let index = TriggerIndex::build(store.list_enabled_snippets()?);
        log::info!("Loaded {} triggers into the index", index.len());

        Ok(Self {
            store,
            backend,
            shared: Arc::new(Shared {
                index: RwLock::new(Arc::new(index)),
                paused: AtomicBool::new(false),
                suspended: AtomicBool::new(false),
                reset_buffer: AtomicBool::new(false),
            }),
            subscription: Mutex::new(None),
            clock: Arc::new(|| Local::now().naive_local()),
        })
    }

    /// Replace the clock used for date/time placeholders
    #[cfg(test)]
    pub fn with_clock(mut self, clock: impl Fn() -> NaiveDateTime + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Subscribe to key events; a no-op when already running
    ///
    /// Fails only when the platform refuses the hook.
    pub fn start(&self) -> Result<()> {
        let mut subscription = self.lock_subscription();
        if subscription.is_some() {
            log::info!("Expansion engine already running");
            return Ok(());
        }

        self.shared.paused.store(false, Ordering::Release);
        self.shared.suspended.store(false, Ordering::Release);
        self.shared.reset_buffer.store(true, Ordering::Release);

        let mut pipeline = Pipeline {
            buffer: EditBuffer::new(),
            shared: self.shared.clone(),
            output: OutputEngine::new(self.backend.clone()),
            clock: self.clock.clone(),
        };
        let handler: KeyHandler = Box::new(move |event| pipeline.handle(event));

        *subscription = Some(self.backend.subscribe(handler)?);
        log::info!("Expansion engine started");
        Ok(())
    }

    /// Unsubscribe from key events; safe when not running
    pub fn stop(&self) {
        match self.lock_subscription().take() {
            Some(subscription) => {
                subscription.unsubscribe();
                log::info!("Expansion engine stopped");
            }
            None => log::debug!("Expansion engine not running, nothing to stop"),
        }
    }

    /// Ignore key events until [`resume`](Self::resume); the hook stays live
    pub fn pause(&self) {
        self.shared.reset_buffer.store(true, Ordering::Release);
        if !self.shared.paused.swap(true, Ordering::AcqRel) {
            log::info!("Expansion paused");
        }
    }

    pub fn resume(&self) {
        self.shared.reset_buffer.store(true, Ordering::Release);
        if self.shared.paused.swap(false, Ordering::AcqRel) {
            log::info!("Expansion resumed");
        }
    }

    /// Re-read the store and swap in a freshly built index
    ///
    /// On a store error the current index stays in place.
    pub fn refresh(&self) -> Result<usize> {
        let snippets = self.store.list_enabled_snippets()?;
        let index = TriggerIndex::build(snippets);
        let count = index.len();
        self.shared.publish(index);

        log::info!("Reloaded {} triggers", count);
        Ok(count)
    }

    /// Subscribed and not paused
    pub fn is_active(&self) -> bool {
        self.state() == EngineState::Running
    }

    pub fn state(&self) -> EngineState {
        if self.lock_subscription().is_none() {
            EngineState::Stopped
        } else if self.shared.paused.load(Ordering::Acquire) {
            EngineState::Paused
        } else {
            EngineState::Running
        }
    }

    fn lock_subscription(&self) -> MutexGuard<'_, Option<Box<dyn Subscription>>> {
        self.subscription.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ExpansionEngine {
    fn drop(&mut self) {
        self.stop();
    }
}
