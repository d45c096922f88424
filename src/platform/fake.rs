use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::{InputBackend, KeyHandler, KeyboardEvent, Subscription, SyntheticKey};
use crate::error::{EngineError, Result};

/// Everything the fake was asked to emit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Emitted {
    Key(SyntheticKey),
    Chord(SyntheticKey, SyntheticKey),
    Clipboard(String),
}

#[derive(Default)]
struct Inner {
    handler: Mutex<Option<KeyHandler>>,
    emitted: Mutex<Vec<Emitted>>,
    deny_subscribe: AtomicBool,
    /// Fail every synthetic key after this many have been sent
    fail_after: Mutex<Option<usize>>,
}

/// Backend that records output instead of performing it
///
/// Events pushed through [`FakeBackend::press`] run the subscribed handler
/// synchronously on the calling thread.
#[derive(Clone, Default)]
pub struct FakeBackend {
    inner: Arc<Inner>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `subscribe` fail like a denied hook
    pub fn deny_subscribe(&self) {
        self.inner.deny_subscribe.store(true, Ordering::SeqCst);
    }

    pub fn fail_after(&self, keys: usize) {
        *lock(&self.inner.fail_after) = Some(keys);
    }

    pub fn is_subscribed(&self) -> bool {
        lock(&self.inner.handler).is_some()
    }

    /// Deliver one event; dropped when nothing is subscribed
    pub fn press(&self, event: KeyboardEvent) {
        if let Some(handler) = lock(&self.inner.handler).as_mut() {
            handler(event);
        }
    }

    pub fn type_str(&self, text: &str) {
        for ch in text.chars() {
            self.press(KeyboardEvent::Character(ch));
        }
    }

    pub fn emitted(&self) -> Vec<Emitted> {
        lock(&self.inner.emitted).clone()
    }

    pub fn take_emitted(&self) -> Vec<Emitted> {
        std::mem::take(&mut *lock(&self.inner.emitted))
    }

    fn record(&self, emitted: Emitted) -> Result<()> {
        let mut log = lock(&self.inner.emitted);
        if let Some(limit) = *lock(&self.inner.fail_after) {
            if log.len() >= limit {
                return Err(EngineError::Output("fake output failure".to_string()));
            }
        }
        log.push(emitted);
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct FakeSubscription {
    inner: Arc<Inner>,
}

impl Subscription for FakeSubscription {
    fn unsubscribe(self: Box<Self>) {
        lock(&self.inner.handler).take();
    }
}

impl InputBackend for FakeBackend {
    fn subscribe(&self, handler: KeyHandler) -> Result<Box<dyn Subscription>> {
        if self.inner.deny_subscribe.load(Ordering::SeqCst) {
            return Err(EngineError::Subscription("permission denied".to_string()));
        }
        *lock(&self.inner.handler) = Some(handler);
        Ok(Box::new(FakeSubscription {
            inner: self.inner.clone(),
        }))
    }

    fn send_key(&self, key: SyntheticKey) -> Result<()> {
        self.record(Emitted::Key(key))
    }

    fn send_chord(&self, modifier: SyntheticKey, key: SyntheticKey) -> Result<()> {
        self.record(Emitted::Chord(modifier, key))
    }

    fn set_clipboard(&self, text: &str) -> Result<()> {
        self.record(Emitted::Clipboard(text.to_string()))
    }
}
